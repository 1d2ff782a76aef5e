use std::path::Path;

use crate::media::domain::photo_reader::PhotoReader;
use crate::shared::bitmap::Bitmap;

/// Decodes photos with the `image` crate, dropping any alpha channel.
#[derive(Default)]
pub struct ImageFileReader;

impl ImageFileReader {
    pub fn new() -> Self {
        Self
    }
}

impl PhotoReader for ImageFileReader {
    fn read(&self, path: &Path) -> Result<Bitmap, Box<dyn std::error::Error + Send + Sync>> {
        let img = image::open(path)?.to_rgb8();
        if img.width() == 0 || img.height() == 0 {
            return Err(format!("{} has no pixels", path.display()).into());
        }
        Ok(Bitmap::from_rgb_image(img))
    }
}
