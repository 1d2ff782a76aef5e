pub const EMBEDDING_MODEL_NAME: &str = "w600k_r50.onnx";
pub const EMBEDDING_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/w600k_r50.onnx";

/// Name given to every person nobody has renamed yet.
pub const DEFAULT_PERSON_NAME: &str = "Unnamed Person";

/// Incremental match bar: cosine similarity to a person's centroid must exceed this.
pub const MATCH_THRESHOLD: f64 = 0.45;

/// Most recent faces of a person that feed its centroid.
pub const MAX_CENTROID_FACES: usize = 25;

/// DBSCAN radius on `1 - cosine`.
pub const CLUSTER_EPS: f64 = 0.65;
pub const CLUSTER_MIN_POINTS: usize = 1;

/// Photos are downscaled so neither side exceeds this before cropping.
pub const MAX_WORKING_DIMENSION: u32 = 1600;

/// Side length of the square thumbnail saved for every face.
pub const THUMBNAIL_SIZE: u32 = 128;

/// Thumbnail crop side relative to the longer side of the face box.
pub const THUMBNAIL_SCALE: f64 = 1.4;

pub const DETECTOR_TIMEOUT_MS: u64 = 3000;

/// Folder name used under the platform config, data and cache dirs.
pub const APP_DIR_NAME: &str = "FaceVault";

pub const LIBRARY_FILE_NAME: &str = "library.json";
pub const FACES_DIR_NAME: &str = "faces";

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
