use crate::shared::bitmap::Bitmap;

/// Domain interface for identity embeddings of an aligned face.
///
/// Implementations return L2-normalized vectors of one fixed length per
/// deployment.
pub trait EmbeddingExtractor: Send + Sync {
    fn extract(&self, face: &Bitmap) -> Result<Vec<f32>, Box<dyn std::error::Error + Send + Sync>>;
}
