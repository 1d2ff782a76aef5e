use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::library::domain::face_record::{is_usable_embedding, FaceId, FaceRecord};
use crate::library::domain::person::{Person, PersonId};
use crate::recognition::domain::face_matcher::FaceMatcher;

/// The four persisted collections, exactly as written to storage.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LibrarySnapshot {
    #[serde(default)]
    pub people: Vec<Person>,
    #[serde(default)]
    pub faces: Vec<FaceRecord>,
    #[serde(default)]
    pub analyzed: BTreeSet<PathBuf>,
    #[serde(default)]
    pub favorites: BTreeSet<PathBuf>,
}

/// Outcome of recording a new face.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaceAssignment {
    /// Appended to an existing person.
    Matched(PersonId),
    /// No person was close enough; a new one was created.
    NewPerson(PersonId),
    /// The face has no embedding and joins nobody.
    Unassigned,
}

impl FaceAssignment {
    pub fn person_id(&self) -> Option<PersonId> {
        match self {
            FaceAssignment::Matched(id) | FaceAssignment::NewPerson(id) => Some(*id),
            FaceAssignment::Unassigned => None,
        }
    }
}

/// In-memory library with an id index over the face list.
///
/// Pure data manipulation; locking and persistence belong to
/// [`crate::library::face_library::FaceLibrary`].
#[derive(Clone, Debug, Default)]
pub struct LibraryState {
    data: LibrarySnapshot,
    face_index: HashMap<FaceId, usize>,
}

impl LibraryState {
    /// Rebuilds the index. Later duplicates of a face id are dropped.
    pub fn from_snapshot(mut data: LibrarySnapshot) -> Self {
        let mut seen = HashSet::new();
        data.faces.retain(|f| seen.insert(f.id));
        let face_index = data
            .faces
            .iter()
            .enumerate()
            .map(|(i, f)| (f.id, i))
            .collect();
        Self { data, face_index }
    }

    pub fn snapshot(&self) -> &LibrarySnapshot {
        &self.data
    }

    pub fn clear(&mut self) {
        self.data = LibrarySnapshot::default();
        self.face_index.clear();
    }

    // ── Faces ────────────────────────────────────────────────────────

    /// Adds a record; returns `false` if its id is already present.
    ///
    /// An embedding that is empty or not finite is dropped, leaving a face
    /// without one.
    pub fn add_face(&mut self, mut record: FaceRecord) -> bool {
        if self.face_index.contains_key(&record.id) {
            return false;
        }
        if record.embedding.as_deref().is_some_and(|e| !is_usable_embedding(e)) {
            log::warn!("Dropping unusable embedding of face {}", record.id);
            record.embedding = None;
        }
        self.face_index.insert(record.id, self.data.faces.len());
        self.data.faces.push(record);
        true
    }

    pub fn face(&self, id: &FaceId) -> Option<&FaceRecord> {
        self.face_index.get(id).map(|&i| &self.data.faces[i])
    }

    pub fn faces(&self) -> &[FaceRecord] {
        &self.data.faces
    }

    /// Records for `ids` in the given order; unknown ids are skipped.
    pub fn faces_for_ids(&self, ids: &[FaceId]) -> Vec<FaceRecord> {
        ids.iter().filter_map(|id| self.face(id)).cloned().collect()
    }

    pub fn embedding_of(&self, id: &FaceId) -> Option<&[f32]> {
        self.face(id).and_then(FaceRecord::embedding)
    }

    /// Every face that carries an embedding, in insertion order.
    pub fn embedded_faces(&self) -> Vec<(FaceId, &[f32])> {
        self.data
            .faces
            .iter()
            .filter_map(|f| f.embedding().map(|e| (f.id, e)))
            .collect()
    }

    pub fn has_faces_for_photo(&self, photo: &Path) -> bool {
        self.data.faces.iter().any(|f| f.is_from(photo))
    }

    // ── Analyzed & favorites ─────────────────────────────────────────

    pub fn mark_analyzed(&mut self, photo: &Path) -> bool {
        self.data.analyzed.insert(photo.to_path_buf())
    }

    pub fn is_analyzed(&self, photo: &Path) -> bool {
        self.data.analyzed.contains(photo)
    }

    pub fn is_favorite(&self, photo: &Path) -> bool {
        self.data.favorites.contains(photo)
    }

    /// Flips the favorite flag and returns the new state.
    pub fn toggle_favorite(&mut self, photo: &Path) -> bool {
        if self.data.favorites.remove(photo) {
            false
        } else {
            self.data.favorites.insert(photo.to_path_buf());
            true
        }
    }

    // ── People ───────────────────────────────────────────────────────

    pub fn people(&self) -> &[Person] {
        &self.data.people
    }

    pub fn person(&self, id: &PersonId) -> Option<&Person> {
        self.data.people.iter().find(|p| p.id == *id)
    }

    fn person_mut(&mut self, id: &PersonId) -> Option<&mut Person> {
        self.data.people.iter_mut().find(|p| p.id == *id)
    }

    /// Stores a new face and assigns it to a person in one step.
    ///
    /// A face without an embedding is stored but joins nobody. A face whose
    /// id already exists is ignored and reported as unassigned.
    pub fn record_face(&mut self, record: FaceRecord, matcher: &FaceMatcher) -> FaceAssignment {
        let face_id = record.id;
        let embedding = record.embedding().map(<[f32]>::to_vec);
        if !self.add_face(record) {
            return FaceAssignment::Unassigned;
        }
        let Some(embedding) = embedding else {
            return FaceAssignment::Unassigned;
        };

        let best = matcher.find_match(&embedding, &self.data.people, |id| self.embedding_of(id));
        match best.map(|m| m.person_id) {
            Some(person_id) => {
                if let Some(person) = self.person_mut(&person_id) {
                    person.face_ids.push(face_id);
                }
                FaceAssignment::Matched(person_id)
            }
            None => {
                let person = Person::from_face(face_id);
                let id = person.id;
                self.data.people.push(person);
                FaceAssignment::NewPerson(id)
            }
        }
    }

    pub fn rename_person(&mut self, id: &PersonId, name: &str) -> bool {
        match self.person_mut(id) {
            Some(person) => {
                person.name = name.to_string();
                true
            }
            None => false,
        }
    }

    /// Removes the person only; its faces stay in the library.
    pub fn delete_person(&mut self, id: &PersonId) -> bool {
        let before = self.data.people.len();
        self.data.people.retain(|p| p.id != *id);
        self.data.people.len() != before
    }

    /// Moves every face of `source` to the end of `target` and drops `source`.
    pub fn merge_people(&mut self, source: &PersonId, target: &PersonId) -> bool {
        if source == target || self.person(target).is_none() {
            return false;
        }
        let Some(pos) = self.data.people.iter().position(|p| p.id == *source) else {
            return false;
        };
        let source = self.data.people.remove(pos);
        if let Some(target) = self.person_mut(target) {
            target.face_ids.extend(source.face_ids);
        }
        true
    }

    pub fn replace_people(&mut self, people: Vec<Person>) {
        self.data.people = people;
    }

    /// Distinct source photos of a person's faces, in first-seen order.
    pub fn photos_of_person(&self, id: &PersonId) -> Vec<PathBuf> {
        let Some(person) = self.person(id) else {
            return Vec::new();
        };
        let mut seen = HashSet::new();
        person
            .face_ids
            .iter()
            .filter_map(|fid| self.face(fid))
            .filter(|f| seen.insert(f.source_photo_path.clone()))
            .map(|f| f.source_photo_path.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::bounding_box::BoundingBox;
    use crate::shared::constants::DEFAULT_PERSON_NAME;

    fn record(photo: &str, embedding: Option<Vec<f32>>) -> FaceRecord {
        let id = FaceId::new();
        FaceRecord {
            id,
            face_image_path: PathBuf::from(format!("/faces/{id}.jpg")),
            source_photo_path: PathBuf::from(photo),
            bounding_box: BoundingBox::new(1, 2, 3, 4),
            embedding,
        }
    }

    fn unit_at(cos: f32) -> Vec<f32> {
        vec![cos, (1.0 - cos * cos).sqrt()]
    }

    #[test]
    fn test_add_and_get_face() {
        let mut state = LibraryState::default();
        let r = record("/a.jpg", None);
        assert!(state.add_face(r.clone()));
        assert_eq!(state.face(&r.id), Some(&r));
        assert!(!state.add_face(r.clone()));
        assert_eq!(state.faces().len(), 1);
    }

    #[test]
    fn test_faces_for_ids_skips_unknown_and_keeps_order() {
        let mut state = LibraryState::default();
        let a = record("/a.jpg", None);
        let b = record("/b.jpg", None);
        state.add_face(a.clone());
        state.add_face(b.clone());
        let got = state.faces_for_ids(&[b.id, FaceId::new(), a.id]);
        assert_eq!(got, vec![b, a]);
    }

    #[test]
    fn test_has_faces_for_photo() {
        let mut state = LibraryState::default();
        state.add_face(record("/a.jpg", None));
        assert!(state.has_faces_for_photo(Path::new("/a.jpg")));
        assert!(!state.has_faces_for_photo(Path::new("/b.jpg")));
    }

    #[test]
    fn test_mark_analyzed_once() {
        let mut state = LibraryState::default();
        assert!(state.mark_analyzed(Path::new("/a.jpg")));
        assert!(!state.mark_analyzed(Path::new("/a.jpg")));
        assert!(state.is_analyzed(Path::new("/a.jpg")));
    }

    #[test]
    fn test_toggle_favorite() {
        let mut state = LibraryState::default();
        let p = Path::new("/a.jpg");
        assert!(state.toggle_favorite(p));
        assert!(state.is_favorite(p));
        assert!(!state.toggle_favorite(p));
        assert!(!state.is_favorite(p));
    }

    #[test]
    fn test_from_snapshot_drops_duplicate_faces() {
        let r = record("/a.jpg", None);
        let mut dup = r.clone();
        dup.source_photo_path = PathBuf::from("/other.jpg");
        let state = LibraryState::from_snapshot(LibrarySnapshot {
            faces: vec![r.clone(), dup],
            ..Default::default()
        });
        assert_eq!(state.faces(), &[r.clone()]);
        assert_eq!(state.face(&r.id).unwrap().source_photo_path, PathBuf::from("/a.jpg"));
    }

    #[test]
    fn test_record_face_scenario_two_people() {
        let mut state = LibraryState::default();
        let matcher = FaceMatcher::default();
        let a = record("/1.jpg", Some(vec![1.0, 0.0, 0.0]));
        let a2 = record("/2.jpg", Some(vec![0.9, 0.19f32.sqrt(), 0.0]));
        let b = record("/3.jpg", Some(vec![0.1, 0.0, 0.99f32.sqrt()]));
        let (ida, ida2, idb) = (a.id, a2.id, b.id);

        let first = state.record_face(a, &matcher);
        let second = state.record_face(a2, &matcher);
        let third = state.record_face(b, &matcher);

        assert!(matches!(first, FaceAssignment::NewPerson(_)));
        assert_eq!(second, FaceAssignment::Matched(first.person_id().unwrap()));
        assert!(matches!(third, FaceAssignment::NewPerson(_)));

        let people = state.people();
        assert_eq!(people.len(), 2);
        assert_eq!(people[0].face_ids, vec![ida, ida2]);
        assert_eq!(people[1].face_ids, vec![idb]);
    }

    #[test]
    fn test_record_face_without_embedding_joins_nobody() {
        let mut state = LibraryState::default();
        let matcher = FaceMatcher::default();
        state.record_face(record("/1.jpg", Some(vec![1.0, 0.0])), &matcher);
        let r = record("/2.jpg", None);
        let id = r.id;

        assert_eq!(state.record_face(r, &matcher), FaceAssignment::Unassigned);
        assert!(state.face(&id).is_some());
        assert_eq!(state.people().len(), 1);
        assert!(state.people().iter().all(|p| !p.contains(&id)));
    }

    #[test]
    fn test_record_face_with_nan_embedding_is_stored_without_it() {
        let mut state = LibraryState::default();
        let r = record("/1.jpg", Some(vec![f32::NAN, 0.0]));
        let id = r.id;

        assert_eq!(
            state.record_face(r, &FaceMatcher::default()),
            FaceAssignment::Unassigned
        );
        assert_eq!(state.face(&id).unwrap().embedding, None);
        assert!(state.people().is_empty());
    }

    #[test]
    fn test_record_duplicate_face_is_ignored() {
        let mut state = LibraryState::default();
        let matcher = FaceMatcher::default();
        let r = record("/1.jpg", Some(vec![1.0, 0.0]));
        state.record_face(r.clone(), &matcher);
        assert_eq!(state.record_face(r, &matcher), FaceAssignment::Unassigned);
        assert_eq!(state.people().len(), 1);
        assert_eq!(state.people()[0].face_ids.len(), 1);
    }

    #[test]
    fn test_rename_person() {
        let mut state = LibraryState::default();
        let out = state.record_face(record("/1.jpg", Some(vec![1.0, 0.0])), &FaceMatcher::default());
        let id = out.person_id().unwrap();
        assert!(state.rename_person(&id, "Ada"));
        assert_eq!(state.person(&id).unwrap().name, "Ada");
        assert!(!state.rename_person(&PersonId::new(), "Nobody"));
    }

    #[test]
    fn test_delete_person_keeps_faces() {
        let mut state = LibraryState::default();
        let r = record("/1.jpg", Some(vec![1.0, 0.0]));
        let face_id = r.id;
        let id = state.record_face(r, &FaceMatcher::default()).person_id().unwrap();

        assert!(state.delete_person(&id));
        assert!(state.people().is_empty());
        assert!(state.face(&face_id).is_some());
        assert!(!state.delete_person(&id));
    }

    #[test]
    fn test_merge_people_appends_and_removes_source() {
        let mut state = LibraryState::default();
        let m = FaceMatcher::default();
        let a = record("/1.jpg", Some(vec![1.0, 0.0]));
        let b = record("/2.jpg", Some(vec![-1.0, 0.0]));
        let (fa, fb) = (a.id, b.id);
        let target = state.record_face(a, &m).person_id().unwrap();
        let source = state.record_face(b, &m).person_id().unwrap();

        assert!(state.merge_people(&source, &target));

        assert_eq!(state.people().len(), 1);
        let merged = state.person(&target).unwrap();
        assert_eq!(merged.face_ids, vec![fa, fb]);
        assert_eq!(merged.representative_face_id, Some(fa));
        assert!(state.person(&source).is_none());
    }

    #[test]
    fn test_merge_noops() {
        let mut state = LibraryState::default();
        let id = state
            .record_face(record("/1.jpg", Some(vec![1.0, 0.0])), &FaceMatcher::default())
            .person_id()
            .unwrap();
        assert!(!state.merge_people(&id, &id));
        assert!(!state.merge_people(&PersonId::new(), &id));
        assert!(!state.merge_people(&id, &PersonId::new()));
        assert_eq!(state.people().len(), 1);
    }

    #[test]
    fn test_photos_of_person_are_distinct() {
        let mut state = LibraryState::default();
        let m = FaceMatcher::default();
        let id = state
            .record_face(record("/1.jpg", Some(vec![1.0, 0.0])), &m)
            .person_id()
            .unwrap();
        state.record_face(record("/1.jpg", Some(unit_at(0.99))), &m);
        state.record_face(record("/2.jpg", Some(unit_at(0.98))), &m);

        assert_eq!(
            state.photos_of_person(&id),
            vec![PathBuf::from("/1.jpg"), PathBuf::from("/2.jpg")]
        );
        assert!(state.photos_of_person(&PersonId::new()).is_empty());
    }

    #[test]
    fn test_clear_empties_everything() {
        let mut state = LibraryState::default();
        let r = record("/1.jpg", Some(vec![1.0, 0.0]));
        let id = r.id;
        state.record_face(r, &FaceMatcher::default());
        state.mark_analyzed(Path::new("/1.jpg"));
        state.toggle_favorite(Path::new("/1.jpg"));

        state.clear();

        assert!(state.people().is_empty());
        assert!(state.face(&id).is_none());
        assert!(!state.is_analyzed(Path::new("/1.jpg")));
        assert!(!state.is_favorite(Path::new("/1.jpg")));
        assert_eq!(state.snapshot(), &LibrarySnapshot::default());
    }

    #[test]
    fn test_new_person_uses_default_name() {
        let mut state = LibraryState::default();
        let id = state
            .record_face(record("/1.jpg", Some(vec![1.0, 0.0])), &FaceMatcher::default())
            .person_id()
            .unwrap();
        assert_eq!(state.person(&id).unwrap().name, DEFAULT_PERSON_NAME);
    }
}
