use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::bounding_box::BoundingBox;

/// Stable identifier of one detected face. Generated once, never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FaceId(Uuid);

impl FaceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for FaceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for FaceId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// One face found in one photo.
///
/// The crop file at `face_image_path` is owned by the library; the source
/// photo is only referenced. `embedding` is present iff extraction succeeded.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FaceRecord {
    pub id: FaceId,
    pub face_image_path: PathBuf,
    pub source_photo_path: PathBuf,
    pub bounding_box: BoundingBox,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// Non-empty and free of NaN or infinity.
pub fn is_usable_embedding(embedding: &[f32]) -> bool {
    !embedding.is_empty() && embedding.iter().all(|v| v.is_finite())
}

impl FaceRecord {
    pub fn embedding(&self) -> Option<&[f32]> {
        self.embedding.as_deref().filter(|e| is_usable_embedding(e))
    }

    pub fn is_from(&self, photo: &Path) -> bool {
        self.source_photo_path == photo
    }
}
