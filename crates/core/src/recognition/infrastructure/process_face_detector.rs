use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::recognition::domain::face_detector::{FaceDetection, FaceDetector};
use crate::shared::bounding_box::{BoundingBox, Point};

#[derive(Error, Debug)]
pub enum DetectorProcessError {
    #[error("photo {0} does not exist")]
    MissingPhoto(PathBuf),
    #[error("failed to start detector {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("detector timed out after {0:?}")]
    Timeout(Duration),
    #[error("detector exited with {0}")]
    Failed(std::process::ExitStatus),
    #[error("detector output is not valid JSON: {0}")]
    Parse(#[source] serde_json::Error),
}

/// One entry of the detector's JSON array.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDetection {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    left_eye_x: Option<f64>,
    left_eye_y: Option<f64>,
    right_eye_x: Option<f64>,
    right_eye_y: Option<f64>,
}

fn to_pixel(v: f64) -> Option<i32> {
    (v.is_finite() && v >= i32::MIN as f64 && v <= i32::MAX as f64).then_some(v as i32)
}

impl RawDetection {
    /// `None` for boxes that are empty or outside the `i32` pixel range.
    /// Eyes are kept only when all four coordinates fit an `f32`.
    fn into_detection(self) -> Option<FaceDetection> {
        let bounding_box = BoundingBox::new(
            to_pixel(self.x)?,
            to_pixel(self.y)?,
            to_pixel(self.width)?,
            to_pixel(self.height)?,
        );
        if bounding_box.is_empty() {
            return None;
        }
        let detection = FaceDetection::new(bounding_box);
        Some(match (self.left_eye_x, self.left_eye_y, self.right_eye_x, self.right_eye_y) {
            (Some(lx), Some(ly), Some(rx), Some(ry))
                if [lx, ly, rx, ry].iter().all(|&v| (v as f32).is_finite()) =>
            {
                detection.with_eyes(
                    Point::new(lx as f32, ly as f32),
                    Point::new(rx as f32, ry as f32),
                )
            }
            _ => detection,
        })
    }
}

/// Runs an external detector executable once per photo.
///
/// The photo path is passed as the last argument. The process must print a
/// JSON array of `{x, y, width, height}` objects, optionally with
/// `leftEyeX`, `leftEyeY`, `rightEyeX` and `rightEyeY`, in photo pixels.
/// A process still running after the timeout is killed.
pub struct ProcessFaceDetector {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl ProcessFaceDetector {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout,
        }
    }

    /// Arguments placed before the photo path.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    fn run(&self, photo: &Path) -> Result<String, DetectorProcessError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(photo)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| DetectorProcessError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let mut stdout = child.stdout.take();
        let (tx, rx) = crossbeam_channel::bounded(1);
        std::thread::spawn(move || {
            let mut output = String::new();
            let result = match stdout.as_mut() {
                Some(pipe) => pipe.read_to_string(&mut output).map(|_| output),
                None => Ok(output),
            };
            let _ = tx.send(result);
        });

        match rx.recv_timeout(self.timeout) {
            Ok(read) => {
                let status = child.wait().map_err(|source| DetectorProcessError::Spawn {
                    program: self.program.clone(),
                    source,
                })?;
                if !status.success() {
                    return Err(DetectorProcessError::Failed(status));
                }
                read.map_err(|source| DetectorProcessError::Spawn {
                    program: self.program.clone(),
                    source,
                })
            }
            Err(_) => {
                let _ = child.kill();
                let _ = child.wait();
                Err(DetectorProcessError::Timeout(self.timeout))
            }
        }
    }
}

/// Parses detector output; blank output means no faces.
fn parse_detections(output: &str) -> Result<Vec<FaceDetection>, DetectorProcessError> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let raw: Vec<RawDetection> =
        serde_json::from_str(trimmed).map_err(DetectorProcessError::Parse)?;
    let total = raw.len();
    let detections: Vec<FaceDetection> =
        raw.into_iter().filter_map(RawDetection::into_detection).collect();
    if detections.len() < total {
        log::warn!("Ignored {} invalid detector boxes", total - detections.len());
    }
    Ok(detections)
}

impl FaceDetector for ProcessFaceDetector {
    fn detect(
        &self,
        photo: &Path,
    ) -> Result<Vec<FaceDetection>, Box<dyn std::error::Error + Send + Sync>> {
        if !photo.is_file() {
            return Err(DetectorProcessError::MissingPhoto(photo.to_path_buf()).into());
        }
        let output = self.run(photo)?;
        let detections = parse_detections(&output)?;
        log::debug!("{} faces in {}", detections.len(), photo.display());
        Ok(detections)
    }
}
