use ndarray::Array2;

/// Bounding box representation with format conversion utilities.
///
/// Supports the box formats used across the crate:
/// - TLWH: Top-Left X, Top-Left Y, Width, Height
/// - TLBR: Top-Left X, Top-Left Y, Bottom-Right X, Bottom-Right Y
/// - Z: Center X, Center Y, Scale (area), Aspect Ratio (w/h), the Kalman measurement space
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    /// Top-left x coordinate
    pub x: f32,
    /// Top-left y coordinate
    pub y: f32,
    /// Width of the bounding box
    pub width: f32,
    /// Height of the bounding box
    pub height: f32,
}

impl Rect {
    /// Create a new Rect from top-left coordinates and dimensions (TLWH format).
    #[inline]
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a Rect from TLBR format (top-left x, top-left y, bottom-right x, bottom-right y).
    #[inline]
    pub fn from_tlbr(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
        }
    }

    /// Create a Rect from center form (center x, center y, width, height).
    #[inline]
    pub fn from_xywh(cx: f32, cy: f32, width: f32, height: f32) -> Self {
        Self::from_tlbr(
            cx - width / 2.0,
            cy - height / 2.0,
            cx + width / 2.0,
            cy + height / 2.0,
        )
    }

    /// Create a Rect from Z format (center x, center y, scale, aspect ratio).
    ///
    /// Scale is the box area and aspect ratio is width / height. Non-positive
    /// scale or ratio yields NaN dimensions, callers clamp before converting.
    #[inline]
    pub fn from_z(z: [f64; 4]) -> Self {
        let width = (z[2] * z[3]).sqrt();
        let height = z[2] / width;
        Self::from_xywh(z[0] as f32, z[1] as f32, width as f32, height as f32)
    }

    /// Convert to TLBR format: (x1, y1, x2, y2).
    #[inline]
    pub fn to_tlbr(&self) -> [f32; 4] {
        [self.x, self.y, self.x + self.width, self.y + self.height]
    }

    /// Convert to TLWH format: (x, y, width, height).
    #[inline]
    pub fn to_tlwh(&self) -> [f32; 4] {
        [self.x, self.y, self.width, self.height]
    }

    /// Convert to Z format: (center_x, center_y, scale, aspect_ratio).
    #[inline]
    pub fn to_z(&self) -> [f64; 4] {
        let (cx, cy) = self.center();
        let width = self.width as f64;
        let height = self.height as f64;
        let aspect_ratio = if height > 0.0 { width / height } else { 0.0 };
        [cx as f64, cy as f64, width * height, aspect_ratio]
    }

    /// Get the center point of the bounding box.
    #[inline]
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Get the area of the bounding box.
    #[inline]
    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// True when all four coordinates are finite numbers.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.to_tlbr().iter().all(|v| v.is_finite())
    }

    /// True when `inner` lies strictly inside `self`. Shared or crossing edges do not count.
    #[inline]
    pub fn strictly_contains(&self, inner: &Rect) -> bool {
        let [ox1, oy1, ox2, oy2] = self.to_tlbr();
        let [ix1, iy1, ix2, iy2] = inner.to_tlbr();
        ix1 > ox1 && iy1 > oy1 && ix2 < ox2 && iy2 < oy2
    }

    /// Calculate Intersection over Union (IoU) with another bounding box.
    pub fn iou(&self, other: &Rect) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);

        let inter_width = (x2 - x1).max(0.0);
        let inter_height = (y2 - y1).max(0.0);
        let inter_area = inter_width * inter_height;

        let union_area = self.area() + other.area() - inter_area;

        if union_area > 0.0 {
            inter_area / union_area
        } else {
            0.0
        }
    }
}

/// Calculate IoU matrix between two sets of bounding boxes.
///
/// Returns a matrix of shape (M, N) where M is the length of `boxes_a`
/// and N is the length of `boxes_b`.
pub fn iou_batch(boxes_a: &[Rect], boxes_b: &[Rect]) -> Array2<f32> {
    let mut ious = Array2::zeros((boxes_a.len(), boxes_b.len()));
    for (i, a) in boxes_a.iter().enumerate() {
        for (j, b) in boxes_b.iter().enumerate() {
            ious[[i, j]] = a.iou(b);
        }
    }
    ious
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_rect_conversions() {
        let rect = Rect::new(10.0, 20.0, 30.0, 40.0);

        assert_eq!(rect.to_tlwh(), [10.0, 20.0, 30.0, 40.0]);
        assert_eq!(rect.to_tlbr(), [10.0, 20.0, 40.0, 60.0]);

        let z = rect.to_z();
        assert_eq!(z[0], 25.0); // cx
        assert_eq!(z[1], 40.0); // cy
        assert_eq!(z[2], 1200.0); // area
        assert_abs_diff_eq!(z[3], 0.75, epsilon = 1e-9); // 30/40
    }

    #[test]
    fn test_from_tlbr() {
        let rect = Rect::from_tlbr(10.0, 20.0, 40.0, 60.0);
        assert_eq!(rect.to_tlwh(), [10.0, 20.0, 30.0, 40.0]);
    }

    #[test]
    fn test_from_xywh() {
        let rect = Rect::from_xywh(50.0, 40.0, 20.0, 10.0);
        assert_eq!(rect.to_tlbr(), [40.0, 35.0, 60.0, 45.0]);
    }

    #[test]
    fn test_z_roundtrip() {
        let rect = Rect::from_tlbr(100.0, 50.0, 220.0, 130.0);
        let back = Rect::from_z(rect.to_z());
        for (a, b) in rect.to_tlbr().iter().zip(back.to_tlbr().iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_from_z_degenerate_is_not_finite() {
        assert!(!Rect::from_z([10.0, 10.0, -4.0, 1.0]).is_finite());
    }

    #[test]
    fn test_strict_containment() {
        let car = Rect::from_tlbr(0.0, 0.0, 100.0, 100.0);
        assert!(car.strictly_contains(&Rect::from_tlbr(10.0, 10.0, 90.0, 90.0)));
        // touching an edge is not containment
        assert!(!car.strictly_contains(&Rect::from_tlbr(0.0, 10.0, 90.0, 90.0)));
        assert!(!car.strictly_contains(&Rect::from_tlbr(10.0, 10.0, 100.0, 90.0)));
        assert!(!car.strictly_contains(&Rect::from_tlbr(50.0, 50.0, 150.0, 90.0)));
    }

    #[test]
    fn test_iou() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, 5.0, 10.0, 10.0);

        // Intersection: 5x5 = 25
        // Union: 100 + 100 - 25 = 175
        let iou = a.iou(&b);
        assert!((iou - 25.0 / 175.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_no_overlap() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(20.0, 20.0, 10.0, 10.0);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn test_iou_batch_shape() {
        let a = [Rect::new(0.0, 0.0, 10.0, 10.0)];
        let b = [Rect::new(0.0, 0.0, 10.0, 10.0), Rect::new(50.0, 50.0, 1.0, 1.0)];
        let ious = iou_batch(&a, &b);
        assert_eq!(ious.dim(), (1, 2));
        assert!((ious[[0, 0]] - 1.0).abs() < 1e-6);
        assert_eq!(ious[[0, 1]], 0.0);
    }
}
