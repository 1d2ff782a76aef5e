use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

use crate::library::domain::face_record::{is_usable_embedding, FaceId, FaceRecord};
use crate::library::domain::library_repository::LibraryError;
use crate::library::face_library::FaceLibrary;
use crate::media::domain::image_writer::ImageWriter;
use crate::media::domain::photo_reader::PhotoReader;
use crate::recognition::domain::embedding_extractor::EmbeddingExtractor;
use crate::recognition::domain::face_aligner::FaceAligner;
use crate::recognition::domain::face_detector::{FaceDetection, FaceDetector};
use crate::shared::bitmap::Bitmap;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::constants::{
    IMAGE_EXTENSIONS, MAX_WORKING_DIMENSION, THUMBNAIL_SCALE, THUMBNAIL_SIZE,
};

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("analysis cancelled")]
    Cancelled,
    #[error(transparent)]
    Library(#[from] LibraryError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnalysisOutcome {
    /// Not an image file; left unmarked.
    Unsupported,
    AlreadyAnalyzed,
    Analyzed {
        faces_detected: usize,
        faces_recorded: usize,
    },
}

/// Whether `path` has one of the still-image extensions we analyze.
pub fn is_analyzable(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.as_str()))
}

/// Detects faces in one photo, stores a thumbnail and record per face and
/// assigns each to a person.
///
/// External failures degrade: a failed detection counts as "no faces", an
/// unreadable photo yields no records and a failed embedding yields a
/// record without one. The photo is marked analyzed once detection has
/// run, so it is not retried.
pub struct AnalyzePhotoUseCase {
    library: Arc<FaceLibrary>,
    detector: Box<dyn FaceDetector>,
    aligner: Box<dyn FaceAligner>,
    extractor: Option<Box<dyn EmbeddingExtractor>>,
    reader: Box<dyn PhotoReader>,
    writer: Box<dyn ImageWriter>,
    max_working_dimension: u32,
    thumbnail_size: u32,
}

impl AnalyzePhotoUseCase {
    pub fn new(
        library: Arc<FaceLibrary>,
        detector: Box<dyn FaceDetector>,
        aligner: Box<dyn FaceAligner>,
        extractor: Option<Box<dyn EmbeddingExtractor>>,
        reader: Box<dyn PhotoReader>,
        writer: Box<dyn ImageWriter>,
    ) -> Self {
        Self {
            library,
            detector,
            aligner,
            extractor,
            reader,
            writer,
            max_working_dimension: MAX_WORKING_DIMENSION,
            thumbnail_size: THUMBNAIL_SIZE,
        }
    }

    pub fn with_max_working_dimension(mut self, max: u32) -> Self {
        self.max_working_dimension = max.max(1);
        self
    }

    pub fn with_thumbnail_size(mut self, size: u32) -> Self {
        self.thumbnail_size = size.max(1);
        self
    }

    pub fn library(&self) -> &Arc<FaceLibrary> {
        &self.library
    }

    /// Cancellation is checked before detection, after detection and
    /// before each face. Faces recorded before cancelling stay recorded.
    pub fn execute(
        &self,
        photo: &Path,
        cancelled: &AtomicBool,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        if !is_analyzable(photo) {
            return Ok(AnalysisOutcome::Unsupported);
        }
        if self.library.is_analyzed(photo) {
            return Ok(AnalysisOutcome::AlreadyAnalyzed);
        }
        check_cancelled(cancelled)?;

        let detections = self.detector.detect(photo).unwrap_or_else(|e| {
            log::warn!("Face detection failed for {}: {e}", photo.display());
            Vec::new()
        });
        check_cancelled(cancelled)?;
        if !self.library.mark_analyzed(photo)? {
            // Another worker finished this photo while we were detecting.
            return Ok(AnalysisOutcome::AlreadyAnalyzed);
        }

        let faces_detected = detections.len();
        if detections.is_empty() {
            return Ok(AnalysisOutcome::Analyzed {
                faces_detected,
                faces_recorded: 0,
            });
        }
        log::debug!("Found {faces_detected} faces in {}", photo.display());

        let full = match self.reader.read(photo) {
            Ok(bitmap) => bitmap,
            Err(e) => {
                log::warn!("Cannot decode {}: {e}", photo.display());
                return Ok(AnalysisOutcome::Analyzed {
                    faces_detected,
                    faces_recorded: 0,
                });
            }
        };
        let (working, scale) = full.downscaled_to(self.max_working_dimension);
        drop(full);

        let mut faces_recorded = 0;
        for detection in &detections {
            check_cancelled(cancelled)?;
            if let Some(record) = self.build_record(photo, &working, scale, detection) {
                self.library.record_face(record)?;
                faces_recorded += 1;
            }
        }

        Ok(AnalysisOutcome::Analyzed {
            faces_detected,
            faces_recorded,
        })
    }

    /// Crops, embeds and saves one face. `None` when no thumbnail can be made.
    fn build_record(
        &self,
        photo: &Path,
        working: &Bitmap,
        scale: f64,
        detection: &FaceDetection,
    ) -> Option<FaceRecord> {
        let scaled = detection.scaled(scale);
        let Some(thumb_rect) =
            square_thumbnail_rect(&scaled.bounding_box, working.width(), working.height())
        else {
            log::debug!(
                "Skipping face at {:?} in {}: no room for a thumbnail",
                detection.bounding_box,
                photo.display()
            );
            return None;
        };
        let thumbnail = working.crop(&thumb_rect)?;

        let embedding = self.embed(working, &scaled, photo);

        let id = FaceId::new();
        let face_image_path = self.library.crop_path(&id);
        let size = self.thumbnail_size;
        if let Err(e) = self.writer.write(&face_image_path, &thumbnail, Some((size, size))) {
            log::warn!("Cannot save face crop {}: {e}", face_image_path.display());
            return None;
        }

        Some(FaceRecord {
            id,
            face_image_path,
            source_photo_path: photo.to_path_buf(),
            bounding_box: detection.bounding_box,
            embedding,
        })
    }

    fn embed(&self, working: &Bitmap, detection: &FaceDetection, photo: &Path) -> Option<Vec<f32>> {
        let extractor = self.extractor.as_ref()?;
        let aligned = self.aligner.align(working, detection)?;
        match extractor.extract(&aligned) {
            Ok(embedding) if is_usable_embedding(&embedding) => Some(embedding),
            Ok(embedding) => {
                log::warn!(
                    "Discarding malformed embedding ({} values) for a face in {}",
                    embedding.len(),
                    photo.display()
                );
                None
            }
            Err(e) => {
                log::warn!("Embedding failed for a face in {}: {e}", photo.display());
                None
            }
        }
    }
}

fn check_cancelled(cancelled: &AtomicBool) -> Result<(), AnalysisError> {
    if cancelled.load(Ordering::Relaxed) {
        Err(AnalysisError::Cancelled)
    } else {
        Ok(())
    }
}

/// Square centred on the face, 1.4x its longer side, shrunk symmetrically
/// until it fits inside the photo.
fn square_thumbnail_rect(face: &BoundingBox, width: u32, height: u32) -> Option<BoundingBox> {
    let (cx, cy) = face.center();
    let side = (face.width.max(face.height) as f64 * THUMBNAIL_SCALE) as i32;
    let half = (side / 2)
        .min(cx)
        .min(cy)
        .min((width as i32).saturating_sub(cx))
        .min((height as i32).saturating_sub(cy));
    if half <= 0 {
        return None;
    }
    Some(BoundingBox::new(cx - half, cy - half, half * 2, half * 2))
}
