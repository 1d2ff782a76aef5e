//! ArcFace embeddings through ONNX Runtime.
use std::path::Path;
use std::sync::Mutex;

use crate::recognition::domain::embedding_extractor::EmbeddingExtractor;
use crate::recognition::domain::vector_math::l2_normalize;
use crate::recognition::infrastructure::execution_provider::preferred_execution_providers;
use crate::shared::bitmap::Bitmap;

const INPUT_SIZE: usize = 112;
const NORM_MEAN: f32 = 127.5;
const NORM_STD: f32 = 127.5;

/// Maps an aligned face to a unit-length ArcFace embedding.
///
/// The session is not reentrant, so concurrent workers take turns on it.
pub struct ArcFaceExtractor {
    session: Mutex<ort::session::Session>,
}

impl ArcFaceExtractor {
    pub fn new(model_path: &Path) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let session = build_session(model_path).map_err(|e| e.to_string())?;
        log::info!("Loaded embedding model {}", model_path.display());
        Ok(Self {
            session: Mutex::new(session),
        })
    }
}

fn build_session(model_path: &Path) -> Result<ort::session::Session, Box<dyn std::error::Error>> {
    let intra_threads = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let session = ort::session::Session::builder()?
        .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
        .with_inter_threads(1)?
        .with_intra_threads(intra_threads)?
        .with_execution_providers(preferred_execution_providers())?
        .commit_from_file(model_path)?;
    Ok(session)
}

impl ArcFaceExtractor {
    fn embed(&self, face: &Bitmap) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
        let input = ort::value::Tensor::from_array(preprocess(face))?;
        let mut session = self
            .session
            .lock()
            .map_err(|e| format!("Lock poisoned: {e}"))?;
        let outputs = session.run(ort::inputs![input])?;
        let array = outputs[0].try_extract_array::<f32>()?;
        Ok(array.iter().copied().collect())
    }
}

impl EmbeddingExtractor for ArcFaceExtractor {
    fn extract(&self, face: &Bitmap) -> Result<Vec<f32>, Box<dyn std::error::Error + Send + Sync>> {
        if face.is_empty() {
            return Err("cannot embed an empty face".into());
        }
        let mut embedding = self.embed(face).map_err(|e| e.to_string())?;
        if embedding.is_empty() {
            return Err("model returned an empty embedding".into());
        }
        l2_normalize(&mut embedding);
        Ok(embedding)
    }
}

/// Nearest-neighbour resize to 112x112, scale to [-1, 1], NCHW layout.
fn preprocess(face: &Bitmap) -> ndarray::Array4<f32> {
    let src_w = face.width() as usize;
    let src_h = face.height() as usize;
    let pixels = face.as_ndarray();

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, INPUT_SIZE, INPUT_SIZE));
    for y in 0..INPUT_SIZE {
        let sy = (((y as f64 + 0.5) * src_h as f64 / INPUT_SIZE as f64) as usize).min(src_h - 1);
        for x in 0..INPUT_SIZE {
            let sx =
                (((x as f64 + 0.5) * src_w as f64 / INPUT_SIZE as f64) as usize).min(src_w - 1);
            for c in 0..3 {
                tensor[[0, c, y, x]] = (pixels[[sy, sx, c]] as f32 - NORM_MEAN) / NORM_STD;
            }
        }
    }
    tensor
}
