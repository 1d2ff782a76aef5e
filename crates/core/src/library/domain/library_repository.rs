use std::path::PathBuf;

use thiserror::Error;

use crate::library::domain::library_state::LibrarySnapshot;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode library: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("library file {path} is corrupt: {source}")]
    Deserialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Durable storage for the whole library.
///
/// `save` must be all-or-nothing: after a crash, `load` returns either the
/// previous or the new snapshot, never a mix.
pub trait LibraryRepository: Send + Sync {
    fn load(&self) -> Result<LibrarySnapshot, LibraryError>;
    fn save(&self, snapshot: &LibrarySnapshot) -> Result<(), LibraryError>;
}
