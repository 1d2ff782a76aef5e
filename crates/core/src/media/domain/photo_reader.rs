use std::path::Path;

use crate::shared::bitmap::Bitmap;

/// Decodes a photo on disk into an RGB bitmap.
pub trait PhotoReader: Send + Sync {
    fn read(&self, path: &Path) -> Result<Bitmap, Box<dyn std::error::Error + Send + Sync>>;
}
