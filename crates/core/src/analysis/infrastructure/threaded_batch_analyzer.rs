use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::analysis::analyze_photo_use_case::{
    AnalysisError, AnalysisOutcome, AnalyzePhotoUseCase,
};
use crate::library::domain::library_repository::LibraryError;
use crate::library::face_library::ClusterSummary;

/// Progress callback: `(photos_done, photos_total)`. Returning `false`
/// requests cancellation.
pub type ProgressFn = Box<dyn Fn(usize, usize) -> bool + Send>;

/// Tally of one batch run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub total: usize,
    pub analyzed: usize,
    pub skipped: usize,
    pub faces_found: usize,
    pub faces_recorded: usize,
    pub failures: usize,
    pub cancelled: bool,
    /// Present when clustering ran after the batch.
    pub clustered: Option<ClusterSummary>,
}

/// Analyzes many photos on a pool of worker threads.
///
/// Layout: `jobs → N workers [AnalyzePhotoUseCase] → results → caller`
///
/// Workers share the use case and therefore the library lock. Once every
/// worker has been joined, and unless the run was cancelled, people are
/// re-clustered if any photo was newly analyzed.
pub struct ThreadedBatchAnalyzer {
    use_case: Arc<AnalyzePhotoUseCase>,
    workers: usize,
    auto_cluster: bool,
}

impl ThreadedBatchAnalyzer {
    pub fn new(use_case: Arc<AnalyzePhotoUseCase>, workers: usize) -> Self {
        Self {
            use_case,
            workers: workers.max(1),
            auto_cluster: true,
        }
    }

    pub fn with_auto_cluster(mut self, enabled: bool) -> Self {
        self.auto_cluster = enabled;
        self
    }

    pub fn run(
        &self,
        photos: Vec<PathBuf>,
        cancelled: Arc<AtomicBool>,
        on_progress: Option<ProgressFn>,
    ) -> Result<BatchReport, LibraryError> {
        let total = photos.len();
        let mut report = BatchReport {
            total,
            ..BatchReport::default()
        };
        if total == 0 {
            return Ok(report);
        }

        let (job_tx, job_rx) = crossbeam_channel::unbounded::<PathBuf>();
        let (result_tx, result_rx) =
            crossbeam_channel::unbounded::<(PathBuf, Result<AnalysisOutcome, AnalysisError>)>();
        for photo in photos {
            // Receiver is alive until the workers below are done.
            let _ = job_tx.send(photo);
        }
        drop(job_tx);

        let worker_count = self.workers.min(total);
        log::info!("Analyzing {total} photos on {worker_count} workers");

        std::thread::scope(|scope| {
            for _ in 0..worker_count {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                let cancelled = &cancelled;
                let use_case = &self.use_case;
                scope.spawn(move || {
                    for photo in job_rx {
                        if cancelled.load(Ordering::Relaxed) {
                            break;
                        }
                        let result = use_case.execute(&photo, cancelled);
                        if result_tx.send((photo, result)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(result_tx);

            let mut done = 0;
            for (photo, result) in result_rx {
                done += 1;
                tally(&mut report, &photo, result);
                if let Some(ref callback) = on_progress {
                    if !callback(done, total) {
                        cancelled.store(true, Ordering::Relaxed);
                    }
                }
            }
        });

        report.cancelled = cancelled.load(Ordering::Relaxed);
        log::info!(
            "Batch finished: {} analyzed, {} skipped, {} faces, {} failures{}",
            report.analyzed,
            report.skipped,
            report.faces_recorded,
            report.failures,
            if report.cancelled { " (cancelled)" } else { "" }
        );

        if self.auto_cluster && !report.cancelled && report.analyzed > 0 {
            report.clustered = Some(self.use_case.library().cluster_people()?);
        }
        Ok(report)
    }
}

fn tally(
    report: &mut BatchReport,
    photo: &std::path::Path,
    result: Result<AnalysisOutcome, AnalysisError>,
) {
    match result {
        Ok(AnalysisOutcome::Analyzed {
            faces_detected,
            faces_recorded,
        }) => {
            report.analyzed += 1;
            report.faces_found += faces_detected;
            report.faces_recorded += faces_recorded;
        }
        Ok(AnalysisOutcome::AlreadyAnalyzed | AnalysisOutcome::Unsupported) => {
            report.skipped += 1;
        }
        Err(AnalysisError::Cancelled) => {}
        Err(e) => {
            log::error!("Analysis of {} failed: {e}", photo.display());
            report.failures += 1;
        }
    }
}
