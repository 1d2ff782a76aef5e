use std::path::Path;

use crate::shared::bitmap::Bitmap;

/// Encodes a bitmap to an image file.
pub trait ImageWriter: Send + Sync {
    /// Writes `bitmap` to `path`, resized to `size` first when given.
    /// The format follows the file extension.
    fn write(
        &self,
        path: &Path,
        bitmap: &Bitmap,
        size: Option<(u32, u32)>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
