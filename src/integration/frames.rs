//! Frame sources and sinks. Video containers are handled outside the crate;
//! here a video is a directory of numbered image files.

use std::fs;
use std::path::{Path, PathBuf};

use image::RgbImage;
use tracing::{debug, info};

use crate::error::Result;

const FRAME_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Sequential supplier of frames.
pub trait FrameSource {
    /// Next frame, or `None` once the stream is exhausted.
    fn next_frame(&mut self) -> Result<Option<RgbImage>>;
}

/// Consumer of annotated frames.
pub trait FrameSink {
    fn write_frame(&mut self, frame_nmr: u64, frame: &RgbImage) -> Result<()>;
}

impl<T: FrameSink + ?Sized> FrameSink for Box<T> {
    fn write_frame(&mut self, frame_nmr: u64, frame: &RgbImage) -> Result<()> {
        (**self).write_frame(frame_nmr, frame)
    }
}

/// Frames read in file-name order from a directory.
#[derive(Debug)]
pub struct ImageSequence {
    paths: Vec<PathBuf>,
    cursor: usize,
}

impl ImageSequence {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_frame_file(path))
            .collect();
        paths.sort();
        info!(dir = %dir.display(), frames = paths.len(), "opened image sequence");
        Ok(Self { paths, cursor: 0 })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

impl FrameSource for ImageSequence {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        let Some(path) = self.paths.get(self.cursor) else {
            return Ok(None);
        };
        self.cursor += 1;
        debug!(path = %path.display(), "reading frame");
        Ok(Some(image::open(path)?.to_rgb8()))
    }
}

/// Writes annotated frames as `frame_000000.png`, ... into a directory.
/// Frames keep the input resolution.
#[derive(Debug)]
pub struct ImageSequenceWriter {
    dir: PathBuf,
}

impl ImageSequenceWriter {
    pub fn create(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn frame_path(&self, frame_nmr: u64) -> PathBuf {
        self.dir.join(format!("frame_{frame_nmr:06}.png"))
    }
}

impl FrameSink for ImageSequenceWriter {
    fn write_frame(&mut self, frame_nmr: u64, frame: &RgbImage) -> Result<()> {
        frame.save(self.frame_path(frame_nmr))?;
        Ok(())
    }
}

/// Sink that drops every frame, for runs that only need the CSV.
#[derive(Debug, Default)]
pub struct DiscardFrames;

impl FrameSink for DiscardFrames {
    fn write_frame(&mut self, _frame_nmr: u64, _frame: &RgbImage) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_roundtrip_in_name_order() {
        let dir = std::env::temp_dir().join(format!("platetrack_frames_{}", std::process::id()));
        let mut writer = ImageSequenceWriter::create(&dir).unwrap();
        for n in [2u64, 0, 1] {
            let frame = RgbImage::from_pixel(8, 6, image::Rgb([n as u8 * 10, 0, 0]));
            writer.write_frame(n, &frame).unwrap();
        }
        fs::write(dir.join("notes.txt"), "not a frame").unwrap();

        let mut source = ImageSequence::open(&dir).unwrap();
        assert_eq!(source.len(), 3);
        let mut reds = Vec::new();
        while let Some(frame) = source.next_frame().unwrap() {
            assert_eq!(frame.dimensions(), (8, 6));
            reds.push(frame.get_pixel(0, 0)[0]);
        }
        fs::remove_dir_all(&dir).ok();
        assert_eq!(reds, vec![0, 10, 20]);
    }
}
