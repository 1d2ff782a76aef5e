use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::library::domain::face_record::{FaceId, FaceRecord};
use crate::library::domain::library_repository::{LibraryError, LibraryRepository};
use crate::library::domain::library_state::{FaceAssignment, LibrarySnapshot, LibraryState};
use crate::library::domain::person::{Person, PersonId};
use crate::library::infrastructure::json_library_repository::JsonLibraryRepository;
use crate::recognition::domain::face_matcher::FaceMatcher;
use crate::recognition::domain::person_clusterer::PersonClusterer;
use crate::shared::constants::{FACES_DIR_NAME, LIBRARY_FILE_NAME};

/// Result of a full re-clustering run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClusterSummary {
    pub faces_clustered: usize,
    pub people_before: usize,
    pub people_after: usize,
    pub names_kept: usize,
}

/// Process-wide handle over people, faces, analyzed photos and favorites.
///
/// Built once at startup and shared as `Arc<FaceLibrary>`. A single mutex
/// guards all four collections; every mutation runs as one critical
/// section that writes the whole library before the change becomes
/// visible and before the lock is released.
pub struct FaceLibrary {
    state: Mutex<LibraryState>,
    repository: Box<dyn LibraryRepository>,
    faces_dir: PathBuf,
    matcher: FaceMatcher,
    clusterer: PersonClusterer,
}

impl FaceLibrary {
    /// Opens (or creates) the library stored under `data_dir`.
    pub fn open(data_dir: &Path) -> Result<Self, LibraryError> {
        let repository = JsonLibraryRepository::new(data_dir.join(LIBRARY_FILE_NAME));
        Self::with_repository(Box::new(repository), data_dir.join(FACES_DIR_NAME))
    }

    pub fn with_repository(
        repository: Box<dyn LibraryRepository>,
        faces_dir: PathBuf,
    ) -> Result<Self, LibraryError> {
        fs::create_dir_all(&faces_dir).map_err(|source| LibraryError::Io {
            path: faces_dir.clone(),
            source,
        })?;
        let snapshot = repository.load()?;
        log::debug!(
            "Loaded library: {} people, {} faces, {} analyzed photos",
            snapshot.people.len(),
            snapshot.faces.len(),
            snapshot.analyzed.len()
        );
        Ok(Self {
            state: Mutex::new(LibraryState::from_snapshot(snapshot)),
            repository,
            faces_dir,
            matcher: FaceMatcher::default(),
            clusterer: PersonClusterer::default(),
        })
    }

    /// Directory holding the owned face crops.
    pub fn faces_dir(&self) -> &Path {
        &self.faces_dir
    }

    /// Where the crop for `face_id` lives.
    pub fn crop_path(&self, face_id: &FaceId) -> PathBuf {
        self.faces_dir.join(format!("{face_id}.jpg"))
    }

    fn lock(&self) -> MutexGuard<'_, LibraryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `mutate` on a copy of the state under the lock and commits the
    /// copy only once it is persisted.
    ///
    /// `mutate` returns its result plus whether anything changed; unchanged
    /// state is not rewritten. A failed save leaves memory untouched.
    fn transact<T>(
        &self,
        mutate: impl FnOnce(&mut LibraryState) -> (T, bool),
    ) -> Result<T, LibraryError> {
        let mut state = self.lock();
        let mut next = state.clone();
        let (result, changed) = mutate(&mut next);
        if changed {
            self.repository.save(next.snapshot())?;
            *state = next;
        }
        Ok(result)
    }

    /// Stores a record without assigning it to anyone.
    pub fn add_face(&self, record: FaceRecord) -> Result<bool, LibraryError> {
        self.transact(|s| {
            let added = s.add_face(record);
            (added, added)
        })
    }

    /// Stores a new face and assigns it to the closest person (or a new one).
    pub fn record_face(&self, record: FaceRecord) -> Result<FaceAssignment, LibraryError> {
        self.transact(|s| {
            let face_id = record.id;
            let assignment = s.record_face(record, &self.matcher);
            log::debug!("Face {face_id}: {assignment:?}");
            (assignment, s.face(&face_id).is_some())
        })
    }

    pub fn get_face(&self, id: &FaceId) -> Option<FaceRecord> {
        self.lock().face(id).cloned()
    }

    pub fn faces_for_ids(&self, ids: &[FaceId]) -> Vec<FaceRecord> {
        self.lock().faces_for_ids(ids)
    }

    pub fn face_count(&self) -> usize {
        self.lock().faces().len()
    }

    pub fn has_faces_for_photo(&self, photo: &Path) -> bool {
        self.lock().has_faces_for_photo(photo)
    }

    /// Returns `false` if the photo was already marked.
    pub fn mark_analyzed(&self, photo: &Path) -> Result<bool, LibraryError> {
        self.transact(|s| {
            let inserted = s.mark_analyzed(photo);
            (inserted, inserted)
        })
    }

    pub fn is_analyzed(&self, photo: &Path) -> bool {
        self.lock().is_analyzed(photo)
    }

    /// Forgets everything and deletes every owned crop file.
    ///
    /// File deletion is best effort: failures are logged and skipped.
    pub fn purge_all(&self) -> Result<(), LibraryError> {
        let mut state = self.lock();
        self.repository.save(&LibrarySnapshot::default())?;
        state.clear();
        self.remove_crops();
        Ok(())
    }

    fn remove_crops(&self) {
        let entries = match fs::read_dir(&self.faces_dir) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("Cannot list {}: {e}", self.faces_dir.display());
                return;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if let Err(e) = fs::remove_file(&path) {
                log::warn!("Cannot delete face crop {}: {e}", path.display());
            }
        }
    }

    pub fn is_favorite(&self, photo: &Path) -> bool {
        self.lock().is_favorite(photo)
    }

    /// Flips the favorite flag and returns the new state.
    pub fn toggle_favorite(&self, photo: &Path) -> Result<bool, LibraryError> {
        self.transact(|s| (s.toggle_favorite(photo), true))
    }

    pub fn list_people(&self) -> Vec<Person> {
        self.lock().people().to_vec()
    }

    pub fn person(&self, id: &PersonId) -> Option<Person> {
        self.lock().person(id).cloned()
    }

    /// Records of a person's faces in the person's order; empty if unknown.
    pub fn faces_of_person(&self, id: &PersonId) -> Vec<FaceRecord> {
        let state = self.lock();
        state
            .person(id)
            .map(|p| state.faces_for_ids(&p.face_ids))
            .unwrap_or_default()
    }

    pub fn photos_of_person(&self, id: &PersonId) -> Vec<PathBuf> {
        self.lock().photos_of_person(id)
    }

    /// Returns `false` if the person does not exist.
    pub fn rename_person(&self, id: &PersonId, name: &str) -> Result<bool, LibraryError> {
        self.transact(|s| {
            let renamed = s.rename_person(id, name);
            (renamed, renamed)
        })
    }

    /// Removes the person; its faces remain available for clustering.
    pub fn delete_person(&self, id: &PersonId) -> Result<bool, LibraryError> {
        self.transact(|s| {
            let deleted = s.delete_person(id);
            (deleted, deleted)
        })
    }

    /// Moves `source`'s faces to `target` and removes `source`.
    ///
    /// No-op when either is missing or both are the same person.
    pub fn merge_people(&self, source: &PersonId, target: &PersonId) -> Result<bool, LibraryError> {
        self.transact(|s| {
            let merged = s.merge_people(source, target);
            (merged, merged)
        })
    }

    /// Rebuilds every person from all stored embeddings.
    ///
    /// Holds the lock for the whole run so no incremental match interleaves.
    /// The new person list replaces the old one in a single step; ids and
    /// representatives are regenerated and custom names carried over where
    /// clusters overlap the people that held them.
    pub fn cluster_people(&self) -> Result<ClusterSummary, LibraryError> {
        self.transact(|s| {
            let people_before = s.people().len();
            let people = {
                let faces = s.embedded_faces();
                self.clusterer.rebuild(&faces, s.people())
            };
            let summary = ClusterSummary {
                faces_clustered: people.iter().map(|p| p.face_ids.len()).sum(),
                people_before,
                people_after: people.len(),
                names_kept: people.iter().filter(|p| p.has_custom_name()).count(),
            };
            s.replace_people(people);
            log::info!(
                "Clustered {} faces into {} people (was {}, {} named)",
                summary.faces_clustered,
                summary.people_after,
                summary.people_before,
                summary.names_kept
            );
            (summary, true)
        })
    }
}
