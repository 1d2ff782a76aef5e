use crate::recognition::domain::face_detector::FaceDetection;
use crate::shared::bitmap::Bitmap;

/// Produces the normalized face image fed to embedding extraction.
pub trait FaceAligner: Send + Sync {
    /// Returns `None` when no usable crop can be produced.
    fn align(&self, photo: &Bitmap, detection: &FaceDetection) -> Option<Bitmap>;
}
