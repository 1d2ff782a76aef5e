use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};

use facevault_core::analysis::analyze_photo_use_case::{is_analyzable, AnalyzePhotoUseCase};
use facevault_core::analysis::infrastructure::threaded_batch_analyzer::{
    ProgressFn, ThreadedBatchAnalyzer,
};
use facevault_core::library::domain::person::{Person, PersonId};
use facevault_core::library::face_library::FaceLibrary;
use facevault_core::media::infrastructure::image_file_reader::ImageFileReader;
use facevault_core::media::infrastructure::image_file_writer::ImageFileWriter;
use facevault_core::recognition::domain::embedding_extractor::EmbeddingExtractor;
use facevault_core::recognition::infrastructure::arcface_extractor::ArcFaceExtractor;
use facevault_core::recognition::infrastructure::eye_landmark_aligner::EyeLandmarkAligner;
use facevault_core::recognition::infrastructure::process_face_detector::ProcessFaceDetector;
use facevault_core::shared::constants::{EMBEDDING_MODEL_NAME, EMBEDDING_MODEL_URL};
use facevault_core::shared::model_resolver::{self, ModelSource};
use facevault_core::shared::settings::Settings;

/// Find and organise the people in a photo library.
#[derive(Parser)]
#[command(name = "facevault", version)]
struct Cli {
    /// Library directory (overrides the settings file).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Settings file to read instead of the per-user default.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Detect and recognise faces in photos or directories of photos.
    Analyze {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Worker threads (default: one per core).
        #[arg(long)]
        workers: Option<usize>,

        /// Detector executable (overrides the settings file).
        #[arg(long)]
        detector: Option<PathBuf>,

        /// Skip re-clustering after the batch.
        #[arg(long)]
        no_cluster: bool,
    },
    /// Rebuild every person from all stored embeddings.
    Cluster,
    /// List people.
    People,
    /// List the faces of a person.
    Faces { person: String },
    /// List the photos a person appears in.
    Photos { person: String },
    /// Rename a person.
    Rename { person: String, name: String },
    /// Move every face of SOURCE into TARGET and remove SOURCE.
    Merge { source: String, target: String },
    /// Remove a person; their faces stay in the library.
    Delete { person: String },
    /// Toggle the favorite flag of a photo.
    Favorite { path: PathBuf },
    /// Forget every person, face and analyzed photo.
    Purge {
        /// Confirm deleting the whole library.
        #[arg(long)]
        yes: bool,
    },
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let settings = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    };
    let data_dir = cli
        .data_dir
        .clone()
        .or_else(|| settings.resolved_data_dir())
        .ok_or("Could not determine a data directory; pass --data-dir")?;
    let library = Arc::new(FaceLibrary::open(&data_dir)?);

    match cli.command {
        Command::Analyze {
            paths,
            workers,
            detector,
            no_cluster,
        } => run_analyze(library, &settings, &paths, workers, detector, no_cluster),
        Command::Cluster => {
            let summary = library.cluster_people()?;
            println!(
                "{} faces in {} people (was {})",
                summary.faces_clustered, summary.people_after, summary.people_before
            );
            Ok(())
        }
        Command::People => {
            for person in library.list_people() {
                println!(
                    "{}  {}  ({} faces)",
                    person.id,
                    person.name,
                    person.face_ids.len()
                );
            }
            Ok(())
        }
        Command::Faces { person } => {
            let person = find_person(&library.list_people(), &person)?;
            for face in library.faces_of_person(&person.id) {
                let b = face.bounding_box;
                println!(
                    "{}  {}  [{},{} {}x{}]  {}",
                    face.id,
                    face.source_photo_path.display(),
                    b.x,
                    b.y,
                    b.width,
                    b.height,
                    face.face_image_path.display()
                );
            }
            Ok(())
        }
        Command::Photos { person } => {
            let person = find_person(&library.list_people(), &person)?;
            for photo in library.photos_of_person(&person.id) {
                let star = if library.is_favorite(&photo) { "*" } else { " " };
                println!("{star} {}", photo.display());
            }
            Ok(())
        }
        Command::Rename { person, name } => {
            let person = find_person(&library.list_people(), &person)?;
            library.rename_person(&person.id, &name)?;
            println!("Renamed {} to {name}", person.name);
            Ok(())
        }
        Command::Merge { source, target } => {
            let people = library.list_people();
            let source = find_person(&people, &source)?;
            let target = find_person(&people, &target)?;
            if !library.merge_people(&source.id, &target.id)? {
                return Err("Cannot merge a person into themselves".into());
            }
            println!("Merged {} into {}", source.name, target.name);
            Ok(())
        }
        Command::Delete { person } => {
            let person = find_person(&library.list_people(), &person)?;
            library.delete_person(&person.id)?;
            println!("Deleted {}", person.name);
            Ok(())
        }
        Command::Favorite { path } => {
            let path = absolute(&path);
            let favorite = library.toggle_favorite(&path)?;
            println!(
                "{} is {}a favorite",
                path.display(),
                if favorite { "" } else { "no longer " }
            );
            Ok(())
        }
        Command::Purge { yes } => {
            if !yes {
                return Err("Purging deletes the whole library; rerun with --yes".into());
            }
            library.purge_all()?;
            println!("Library purged");
            Ok(())
        }
    }
}

fn run_analyze(
    library: Arc<FaceLibrary>,
    settings: &Settings,
    paths: &[PathBuf],
    workers: Option<usize>,
    detector: Option<PathBuf>,
    no_cluster: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let detector_path = detector
        .or_else(|| settings.detector_path.clone())
        .ok_or("No face detector configured; pass --detector or set detector_path")?;
    let detector = ProcessFaceDetector::new(
        detector_path,
        Duration::from_millis(settings.detector_timeout_ms),
    );

    let photos = collect_photos(paths)?;
    if photos.is_empty() {
        return Err("No photos found".into());
    }

    let use_case = AnalyzePhotoUseCase::new(
        library,
        Box::new(detector),
        Box::new(EyeLandmarkAligner::default()),
        build_extractor(settings),
        Box::new(ImageFileReader::new()),
        Box::new(ImageFileWriter::new()),
    )
    .with_max_working_dimension(settings.max_working_dimension)
    .with_thumbnail_size(settings.thumbnail_size);

    let workers = workers.unwrap_or_else(|| settings.worker_count());
    let progress: ProgressFn = Box::new(|done, total| {
        eprint!("\rAnalyzed {done}/{total}");
        true
    });
    let report = ThreadedBatchAnalyzer::new(Arc::new(use_case), workers)
        .with_auto_cluster(!no_cluster)
        .run(photos, Arc::new(AtomicBool::new(false)), Some(progress))?;
    eprintln!();

    println!(
        "{} photos analyzed, {} skipped, {} faces recorded, {} failures",
        report.analyzed, report.skipped, report.faces_recorded, report.failures
    );
    if let Some(summary) = report.clustered {
        println!("{} people after clustering", summary.people_after);
    }
    Ok(())
}

/// Without a model, faces are still recorded but nobody is recognised.
fn build_extractor(settings: &Settings) -> Option<Box<dyn EmbeddingExtractor>> {
    let model = ModelSource {
        file_name: EMBEDDING_MODEL_NAME,
        url: EMBEDDING_MODEL_URL,
    };
    log::info!("Resolving model: {EMBEDDING_MODEL_NAME}");
    let path = match model_resolver::resolve(
        model,
        settings.embedding_model.as_deref(),
        Some(Box::new(download_progress)),
    ) {
        Ok(path) => path,
        Err(e) => {
            log::warn!("Face recognition disabled: {e}");
            return None;
        }
    };
    match ArcFaceExtractor::new(&path) {
        Ok(extractor) => Some(Box::new(extractor)),
        Err(e) => {
            log::warn!("Face recognition disabled: {e}");
            None
        }
    }
}

/// Expands directories recursively into the image files they contain.
fn collect_photos(paths: &[PathBuf]) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    let mut photos = Vec::new();
    for path in paths {
        let path = absolute(path);
        if path.is_dir() {
            walk(&path, &mut photos)?;
        } else if path.is_file() {
            photos.push(path);
        } else {
            return Err(format!("Input not found: {}", path.display()).into());
        }
    }
    photos.sort();
    photos.dedup();
    Ok(photos)
}

/// Symlinked directories are not followed, so link cycles cannot recurse.
fn walk(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_symlink() && path.is_dir() {
            log::debug!("Not following symlinked directory {}", path.display());
            continue;
        }
        if path.is_dir() {
            walk(&path, out)?;
        } else if is_analyzable(&path) {
            out.push(path);
        }
    }
    Ok(())
}

fn absolute(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Looks a person up by full id, unique id prefix or unique name.
fn find_person(people: &[Person], query: &str) -> Result<Person, Box<dyn std::error::Error>> {
    if let Ok(id) = query.parse::<PersonId>() {
        return people
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| format!("No person with id {id}").into());
    }

    let by_prefix: Vec<&Person> = people
        .iter()
        .filter(|p| p.id.to_string().starts_with(query))
        .collect();
    let by_name: Vec<&Person> = people
        .iter()
        .filter(|p| p.name.eq_ignore_ascii_case(query))
        .collect();
    match (by_prefix.as_slice(), by_name.as_slice()) {
        ([only], _) | ([], [only]) => Ok((*only).clone()),
        ([], []) => Err(format!("No person matches '{query}'").into()),
        _ => Err(format!("'{query}' matches several people; use the full id").into()),
    }
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading face recognition model... {pct}%");
    } else {
        eprint!("\rDownloading face recognition model... {downloaded} bytes");
    }
}
