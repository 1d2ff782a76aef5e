use std::path::Path;

use crate::shared::bounding_box::{BoundingBox, Point};

/// One face reported by a detector, in the photo's pixel coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceDetection {
    pub bounding_box: BoundingBox,
    pub left_eye: Option<Point>,
    pub right_eye: Option<Point>,
}

impl FaceDetection {
    pub fn new(bounding_box: BoundingBox) -> Self {
        Self {
            bounding_box,
            left_eye: None,
            right_eye: None,
        }
    }

    pub fn with_eyes(mut self, left: Point, right: Point) -> Self {
        self.left_eye = Some(left);
        self.right_eye = Some(right);
        self
    }

    /// Both eye landmarks, when the detector supplied them.
    pub fn eyes(&self) -> Option<(Point, Point)> {
        self.left_eye.zip(self.right_eye)
    }

    /// Same detection in a photo resized by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            bounding_box: self.bounding_box.scaled(factor),
            left_eye: self.left_eye.map(|p| p.scaled(factor)),
            right_eye: self.right_eye.map(|p| p.scaled(factor)),
        }
    }
}

/// Domain interface for face detection on a photo file.
///
/// Callers treat any error as "no faces"; implementations should still
/// report failures rather than hide them, so they can be logged.
pub trait FaceDetector: Send + Sync {
    fn detect(
        &self,
        photo: &Path,
    ) -> Result<Vec<FaceDetection>, Box<dyn std::error::Error + Send + Sync>>;
}
