//! Constant-velocity Kalman filter over the SORT box state, using ndarray
//! with a nalgebra-based 4x4 inverse.
//!
//! State is `[cx, cy, s, r, vcx, vcy, vs]` where `s` is box area and `r` the
//! aspect ratio. The aspect ratio is treated as constant. Measurements are
//! `[cx, cy, s, r]`.

use ndarray::{Array1, Array2};

pub const STATE_DIM: usize = 7;
pub const MEASUREMENT_DIM: usize = 4;

/// Diagonal of the measurement noise covariance, uncertainties of (cx, cy, s, r).
const MEASUREMENT_VAR: [f64; MEASUREMENT_DIM] = [1.0, 1.0, 10.0, 10.0];
/// Diagonal of the initial state covariance. Unobserved velocities start very uncertain.
const INITIAL_VAR: [f64; STATE_DIM] = [10.0, 10.0, 10.0, 10.0, 1e4, 1e4, 1e4];
/// Diagonal of the process noise covariance.
const PROCESS_VAR: [f64; STATE_DIM] = [1.0, 1.0, 1.0, 1.0, 1e-2, 1e-2, 1e-4];

#[derive(Debug, Clone)]
pub struct KalmanFilter {
    motion_mat: Array2<f64>,
    update_mat: Array2<f64>,
    measurement_cov: Array2<f64>,
    process_cov: Array2<f64>,
}

impl Default for KalmanFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl KalmanFilter {
    pub fn new() -> Self {
        let mut motion_mat = Array2::eye(STATE_DIM);
        // cx, cy and s move with their velocities
        for i in 0..3 {
            motion_mat[[i, MEASUREMENT_DIM + i]] = 1.0;
        }

        let mut update_mat = Array2::zeros((MEASUREMENT_DIM, STATE_DIM));
        for i in 0..MEASUREMENT_DIM {
            update_mat[[i, i]] = 1.0;
        }

        Self {
            motion_mat,
            update_mat,
            measurement_cov: diag(&MEASUREMENT_VAR),
            process_cov: diag(&PROCESS_VAR),
        }
    }

    /// Create the track state from an unassociated measurement. Velocities start at zero.
    pub fn initiate(&self, measurement: [f64; MEASUREMENT_DIM]) -> (Array1<f64>, Array2<f64>) {
        let mut mean = Array1::zeros(STATE_DIM);
        for i in 0..MEASUREMENT_DIM {
            mean[i] = measurement[i];
        }
        (mean, diag(&INITIAL_VAR))
    }

    pub fn predict(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
    ) -> (Array1<f64>, Array2<f64>) {
        let new_mean = self.motion_mat.dot(mean);
        let new_covariance =
            self.motion_mat.dot(covariance).dot(&self.motion_mat.t()) + &self.process_cov;

        (new_mean, new_covariance)
    }

    /// Project the state distribution to measurement space.
    pub fn project(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
    ) -> (Array1<f64>, Array2<f64>) {
        let mean_proj = self.update_mat.dot(mean);
        let covariance_proj =
            self.update_mat.dot(covariance).dot(&self.update_mat.t()) + &self.measurement_cov;

        (mean_proj, covariance_proj)
    }

    /// Run the correction step. Returns `None` if the innovation covariance is singular.
    pub fn update(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
        measurement: [f64; MEASUREMENT_DIM],
    ) -> Option<(Array1<f64>, Array2<f64>)> {
        let (projected_mean, projected_cov) = self.project(mean, covariance);

        let measurement_arr = Array1::from_vec(measurement.to_vec());
        let innovation = measurement_arr - projected_mean;

        // K = P * H^T * S^-1
        // Since H is [I 0], P * H^T is the first 4 columns of P (7x4).
        let s_inv = invert_4x4(&projected_cov)?;

        let pht = covariance.dot(&self.update_mat.t()); // 7x4
        let kalman_gain = pht.dot(&s_inv); // 7x4

        let new_mean = mean + &kalman_gain.dot(&innovation);
        let new_covariance = covariance - &kalman_gain.dot(&projected_cov).dot(&kalman_gain.t());

        Some((new_mean, new_covariance))
    }
}

fn diag(values: &[f64]) -> Array2<f64> {
    Array2::from_diag(&Array1::from_vec(values.to_vec()))
}

/// Invert a 4x4 matrix using nalgebra (pure Rust).
fn invert_4x4(m: &Array2<f64>) -> Option<Array2<f64>> {
    let mut nm = nalgebra::Matrix4::zeros();
    for i in 0..4 {
        for j in 0..4 {
            nm[(i, j)] = m[[i, j]];
        }
    }
    let inv = nm.try_inverse()?;
    let mut res = Array2::zeros((4, 4));
    for i in 0..4 {
        for j in 0..4 {
            res[[i, j]] = inv[(i, j)];
        }
    }
    Some(res)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_initiate() {
        let kf = KalmanFilter::new();
        let (mean, cov) = kf.initiate([100.0, 200.0, 5000.0, 0.5]);
        assert_eq!(mean.len(), STATE_DIM);
        assert_eq!(mean[0], 100.0);
        assert_eq!(mean[3], 0.5);
        assert_eq!(mean[4], 0.0);
        assert_eq!(cov[[4, 4]], 1e4);
    }

    #[test]
    fn test_predict_applies_velocity() {
        let kf = KalmanFilter::new();
        let (mut mean, cov) = kf.initiate([100.0, 200.0, 5000.0, 0.5]);
        mean[4] = 3.0;
        mean[5] = -2.0;
        mean[6] = 10.0;

        let (pred, pred_cov) = kf.predict(&mean, &cov);
        assert_abs_diff_eq!(pred[0], 103.0);
        assert_abs_diff_eq!(pred[1], 198.0);
        assert_abs_diff_eq!(pred[2], 5010.0);
        // aspect ratio has no velocity
        assert_abs_diff_eq!(pred[3], 0.5);
        assert!(pred_cov[[0, 0]] > cov[[0, 0]]);
    }

    #[test]
    fn test_update_moves_toward_measurement() {
        let kf = KalmanFilter::new();
        let (mean, cov) = kf.initiate([100.0, 100.0, 400.0, 1.0]);
        let (mean, cov) = kf.predict(&mean, &cov);

        let (new_mean, new_cov) = kf.update(&mean, &cov, [110.0, 100.0, 400.0, 1.0]).unwrap();
        assert!(new_mean[0] > 100.0 && new_mean[0] < 110.0);
        assert!(new_cov[[0, 0]] < cov[[0, 0]]);
    }

    #[test]
    fn test_invert_singular() {
        assert!(invert_4x4(&Array2::zeros((4, 4))).is_none());
    }
}
