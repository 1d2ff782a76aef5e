use std::path::Path;

use crate::media::domain::image_writer::ImageWriter;
use crate::shared::bitmap::Bitmap;

/// Writes bitmaps with the `image` crate, creating parent directories.
#[derive(Default)]
pub struct ImageFileWriter;

impl ImageFileWriter {
    pub fn new() -> Self {
        Self
    }
}

impl ImageWriter for ImageFileWriter {
    fn write(
        &self,
        path: &Path,
        bitmap: &Bitmap,
        size: Option<(u32, u32)>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let resized;
        let source = match size {
            Some((w, h)) if (w, h) != (bitmap.width(), bitmap.height()) => {
                resized = bitmap.resized(w, h);
                &resized
            }
            _ => bitmap,
        };
        let img = source
            .to_rgb_image()
            .ok_or("bitmap data does not match its dimensions")?;
        img.save(path)?;
        Ok(())
    }
}
