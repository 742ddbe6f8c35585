/// the shared, read-only target image every fitness job scores against
use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TargetError {
    #[error("failed to decode target image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("target image has zero extent")]
    Empty,
}

/// fixed-size un-premultiplied RGBA pixel grid. built once at startup and
/// shared across all worker jobs behind an `Arc`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl TargetImage {
    pub fn from_rgba(width: u32, height: u32, rgba: Vec<u8>) -> Self {
        debug_assert_eq!(rgba.len(), (width * height * 4) as usize);
        Self { width, height, rgba }
    }

    /// decode an image file and proportionally resize it to `target_width`,
    /// height = ceil(original_height / (original_width / target_width))
    pub fn load(path: &Path, target_width: u32) -> Result<Self, TargetError> {
        profiling::scope!("TargetImage::load");
        let decoded = image::open(path)?.to_rgba8();
        Self::from_decoded(decoded, target_width)
    }

    fn from_decoded(
        decoded: image::RgbaImage,
        target_width: u32,
    ) -> Result<Self, TargetError> {
        let (w, h) = decoded.dimensions();
        if w == 0 || h == 0 {
            return Err(TargetError::Empty);
        }

        let ratio = w as f64 / target_width as f64;
        let target_height = (h as f64 / ratio).ceil() as u32;

        let resized = image::imageops::resize(
            &decoded,
            target_width,
            target_height.max(1),
            image::imageops::FilterType::CatmullRom,
        );
        Ok(Self::from_rgba(
            target_width,
            target_height.max(1),
            resized.into_raw(),
        ))
    }
}
