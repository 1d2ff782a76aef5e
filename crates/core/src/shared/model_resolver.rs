use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shared::constants::APP_DIR_NAME;

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("configured model {0} does not exist")]
    MissingOverride(PathBuf),
    #[error("failed to create model directory {path}: {source}")]
    CacheDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to write model to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not determine cache directory")]
    NoCacheDir,
}

/// Progress callback: `(bytes_written, total_bytes)`, total is 0 when unknown.
pub type DownloadProgress = Box<dyn Fn(u64, u64) + Send>;

/// A model file and where to fetch it from.
#[derive(Clone, Copy, Debug)]
pub struct ModelSource<'a> {
    pub file_name: &'a str,
    pub url: &'a str,
}

/// Finds the model on disk, downloading it into the cache on first use.
///
/// An explicit `configured` path wins and must exist.
pub fn resolve(
    model: ModelSource<'_>,
    configured: Option<&Path>,
    progress: Option<DownloadProgress>,
) -> Result<PathBuf, ModelResolveError> {
    if let Some(path) = configured {
        return if path.is_file() {
            Ok(path.to_path_buf())
        } else {
            Err(ModelResolveError::MissingOverride(path.to_path_buf()))
        };
    }
    resolve_in(&model_cache_dir()?, model, progress)
}

/// Cache lookup and download against an explicit directory.
pub fn resolve_in(
    cache_dir: &Path,
    model: ModelSource<'_>,
    progress: Option<DownloadProgress>,
) -> Result<PathBuf, ModelResolveError> {
    let cached = cache_dir.join(model.file_name);
    if cached.is_file() {
        return Ok(cached);
    }

    fs::create_dir_all(cache_dir).map_err(|source| ModelResolveError::CacheDir {
        path: cache_dir.to_path_buf(),
        source,
    })?;
    log::info!("Downloading {} from {}", model.file_name, model.url);
    download(model.url, &cached, progress)?;
    Ok(cached)
}

/// Per-user model cache (`<cache>/FaceVault/models`, or the data dir on macOS).
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    #[cfg(target_os = "macos")]
    let base = dirs::data_dir();
    #[cfg(not(target_os = "macos"))]
    let base = dirs::cache_dir();

    base.map(|d| d.join(APP_DIR_NAME).join("models"))
        .ok_or(ModelResolveError::NoCacheDir)
}

fn download(
    url: &str,
    dest: &Path,
    progress: Option<DownloadProgress>,
) -> Result<(), ModelResolveError> {
    let download_error = |source: reqwest::Error| ModelResolveError::Download {
        url: url.to_string(),
        source,
    };
    let response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(download_error)?;
    let total = response.content_length().unwrap_or(0);
    let bytes = response.bytes().map_err(download_error)?;

    let part = dest.with_extension("part");
    let result = write_chunks(&part, &bytes, total, progress.as_deref())
        .and_then(|()| fs::rename(&part, dest));
    result.map_err(|source| {
        let _ = fs::remove_file(&part);
        ModelResolveError::Write {
            path: dest.to_path_buf(),
            source,
        }
    })
}

fn write_chunks(
    path: &Path,
    bytes: &[u8],
    total: u64,
    progress: Option<&(dyn Fn(u64, u64) + Send)>,
) -> std::io::Result<()> {
    const CHUNK: usize = 1024 * 1024;

    let mut file = fs::File::create(path)?;
    let mut written = 0u64;
    for chunk in bytes.chunks(CHUNK) {
        file.write_all(chunk)?;
        written += chunk.len() as u64;
        if let Some(cb) = progress {
            cb(written, total);
        }
    }
    file.sync_all()
}
