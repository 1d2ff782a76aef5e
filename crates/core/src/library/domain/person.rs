use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::library::domain::face_record::FaceId;
use crate::shared::constants::DEFAULT_PERSON_NAME;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersonId(Uuid);

impl PersonId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PersonId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PersonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for PersonId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// A durable identity grouping face records by id.
///
/// `face_ids` keeps discovery order. The representative is a member when
/// the person is created; merges may leave it pointing at any face the
/// target already had.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub name: String,
    pub face_ids: Vec<FaceId>,
    pub representative_face_id: Option<FaceId>,
}

impl Person {
    /// A freshly discovered person seeded with a single face.
    pub fn from_face(face_id: FaceId) -> Self {
        Self::from_faces(vec![face_id], DEFAULT_PERSON_NAME.to_string())
    }

    /// A person over `face_ids`, represented by the first of them.
    pub fn from_faces(face_ids: Vec<FaceId>, name: String) -> Self {
        Self {
            id: PersonId::new(),
            name,
            representative_face_id: face_ids.first().copied(),
            face_ids,
        }
    }

    pub fn has_custom_name(&self) -> bool {
        self.name != DEFAULT_PERSON_NAME
    }

    pub fn contains(&self, face_id: &FaceId) -> bool {
        self.face_ids.contains(face_id)
    }

    /// The `limit` most recently added faces plus the representative.
    pub fn recent_faces(&self, limit: usize) -> Vec<FaceId> {
        let start = self.face_ids.len().saturating_sub(limit);
        let mut ids = self.face_ids[start..].to_vec();
        if let Some(rep) = self.representative_face_id {
            if !ids.contains(&rep) {
                ids.push(rep);
            }
        }
        ids
    }
}
