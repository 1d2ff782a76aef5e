use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::library::domain::library_repository::{LibraryError, LibraryRepository};
use crate::library::domain::library_state::LibrarySnapshot;

/// Stores the library as one JSON document.
///
/// Writes go to a sibling `.part` file that is renamed over the target, so
/// readers never see a half-written file.
pub struct JsonLibraryRepository {
    path: PathBuf,
}

impl JsonLibraryRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> LibraryError + '_ {
    move |source| LibraryError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl LibraryRepository for JsonLibraryRepository {
    fn load(&self) -> Result<LibrarySnapshot, LibraryError> {
        if !self.path.exists() {
            return Ok(LibrarySnapshot::default());
        }
        let json = fs::read_to_string(&self.path).map_err(io_error(&self.path))?;
        serde_json::from_str(&json).map_err(|source| LibraryError::Deserialize {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, snapshot: &LibrarySnapshot) -> Result<(), LibraryError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_error(parent))?;
        }

        let json = serde_json::to_vec(snapshot).map_err(LibraryError::Serialize)?;

        let temp_path = self.path.with_extension("json.part");
        let mut file = fs::File::create(&temp_path).map_err(io_error(&temp_path))?;
        file.write_all(&json).map_err(io_error(&temp_path))?;
        file.sync_all().map_err(io_error(&temp_path))?;
        drop(file);

        fs::rename(&temp_path, &self.path).map_err(io_error(&self.path))
    }
}
