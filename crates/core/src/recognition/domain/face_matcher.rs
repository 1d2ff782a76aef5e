//! Greedy assignment of a new face to the closest existing person.
//!
//! Each person is summarised by the centroid of its most recent embeddings,
//! which keeps the per-person cost bounded as people accumulate faces.

use crate::library::domain::face_record::FaceId;
use crate::library::domain::person::{Person, PersonId};
use crate::recognition::domain::vector_math;
use crate::shared::constants::{MATCH_THRESHOLD, MAX_CENTROID_FACES};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PersonMatch {
    pub person_id: PersonId,
    pub similarity: f64,
}

pub struct FaceMatcher {
    threshold: f64,
    window: usize,
}

impl FaceMatcher {
    pub fn new(threshold: f64, window: usize) -> Self {
        Self { threshold, window }
    }

    /// Returns the best-scoring person whose centroid similarity strictly
    /// exceeds the threshold, or `None` if nobody qualifies.
    ///
    /// `embedding_of` resolves a face id to its stored embedding. Faces
    /// without one, or with a different dimensionality than
    /// `new_embedding`, are ignored.
    pub fn find_match<'a, F>(
        &self,
        new_embedding: &[f32],
        people: &[Person],
        embedding_of: F,
    ) -> Option<PersonMatch>
    where
        F: Fn(&FaceId) -> Option<&'a [f32]>,
    {
        if new_embedding.is_empty() {
            return None;
        }

        let mut best: Option<PersonMatch> = None;
        let mut best_similarity = self.threshold;

        for person in people {
            if person.face_ids.is_empty() {
                continue;
            }

            let embeddings: Vec<&[f32]> = person
                .recent_faces(self.window)
                .iter()
                .filter_map(|id| embedding_of(id))
                .filter(|e| e.len() == new_embedding.len())
                .collect();

            let Ok(centroid) = vector_math::centroid(&embeddings) else {
                continue;
            };
            let Ok(similarity) = vector_math::cosine_similarity(new_embedding, &centroid) else {
                continue;
            };

            if similarity > best_similarity {
                best_similarity = similarity;
                best = Some(PersonMatch {
                    person_id: person.id,
                    similarity,
                });
            }
        }

        best
    }
}

impl Default for FaceMatcher {
    fn default() -> Self {
        Self::new(MATCH_THRESHOLD, MAX_CENTROID_FACES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct Fixture {
        embeddings: HashMap<FaceId, Vec<f32>>,
        people: Vec<Person>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                embeddings: HashMap::new(),
                people: Vec::new(),
            }
        }

        fn face(&mut self, embedding: Vec<f32>) -> FaceId {
            let id = FaceId::new();
            self.embeddings.insert(id, embedding);
            id
        }

        fn person(&mut self, embeddings: Vec<Vec<f32>>) -> PersonId {
            let ids = embeddings.into_iter().map(|e| self.face(e)).collect();
            let person = Person::from_faces(ids, "p".into());
            let id = person.id;
            self.people.push(person);
            id
        }

        fn find(&self, matcher: &FaceMatcher, e: &[f32]) -> Option<PersonMatch> {
            matcher.find_match(e, &self.people, |id| {
                self.embeddings.get(id).map(|v| v.as_slice())
            })
        }
    }

    fn unit_at(cos: f32) -> Vec<f32> {
        vec![cos, (1.0 - cos * cos).sqrt()]
    }

    #[test]
    fn test_no_people_no_match() {
        let fx = Fixture::new();
        assert!(fx.find(&FaceMatcher::default(), &[1.0, 0.0]).is_none());
    }

    #[test]
    fn test_empty_embedding_never_matches() {
        let mut fx = Fixture::new();
        fx.person(vec![vec![1.0, 0.0]]);
        assert!(fx.find(&FaceMatcher::default(), &[]).is_none());
    }

    #[test]
    fn test_similarity_exactly_at_threshold_does_not_match() {
        let mut fx = Fixture::new();
        fx.person(vec![vec![1.0, 0.0]]);
        assert!(fx.find(&FaceMatcher::default(), &unit_at(0.45)).is_none());
    }

    #[test]
    fn test_similarity_just_above_threshold_matches() {
        let mut fx = Fixture::new();
        let id = fx.person(vec![vec![1.0, 0.0]]);
        let m = fx.find(&FaceMatcher::default(), &unit_at(0.450_000_1)).unwrap();
        assert_eq!(m.person_id, id);
        assert!(m.similarity > 0.45);
    }

    #[test]
    fn test_best_person_wins() {
        let mut fx = Fixture::new();
        let _far = fx.person(vec![unit_at(0.6)]);
        let near = fx.person(vec![unit_at(0.95)]);
        let m = fx.find(&FaceMatcher::default(), &[1.0, 0.0]).unwrap();
        assert_eq!(m.person_id, near);
    }

    #[test]
    fn test_tie_keeps_first_person() {
        let mut fx = Fixture::new();
        let first = fx.person(vec![vec![1.0, 0.0]]);
        let _second = fx.person(vec![vec![1.0, 0.0]]);
        let m = fx.find(&FaceMatcher::default(), &[1.0, 0.0]).unwrap();
        assert_eq!(m.person_id, first);
    }

    #[test]
    fn test_mismatched_dimensions_are_not_comparable() {
        let mut fx = Fixture::new();
        fx.person(vec![vec![1.0, 0.0, 0.0]]);
        assert!(fx.find(&FaceMatcher::default(), &[1.0, 0.0]).is_none());
    }

    #[test]
    fn test_person_without_embeddings_is_skipped() {
        let mut fx = Fixture::new();
        let ids = vec![FaceId::new()];
        fx.people.push(Person::from_faces(ids, "ghost".into()));
        assert!(fx.find(&FaceMatcher::default(), &[1.0, 0.0]).is_none());
    }

    #[test]
    fn test_person_with_no_faces_is_skipped() {
        let mut fx = Fixture::new();
        fx.people.push(Person::from_faces(Vec::new(), "empty".into()));
        assert!(fx.find(&FaceMatcher::default(), &[1.0, 0.0]).is_none());
    }

    #[test]
    fn test_centroid_uses_only_recent_window_and_representative() {
        let mut fx = Fixture::new();
        // Representative and two old faces point one way, recent faces another.
        let mut embeddings = vec![vec![0.0, 1.0]; 3];
        embeddings.extend(vec![vec![1.0, 0.0]; 2]);
        let id = fx.person(embeddings);

        // Window of 2 plus representative: centroid of [1,0],[1,0],[0,1].
        let matcher = FaceMatcher::new(0.45, 2);
        let m = fx.find(&matcher, &[1.0, 0.0]).unwrap();
        assert_eq!(m.person_id, id);
        let expected = 2.0 / 5.0f64.sqrt();
        assert!((m.similarity - expected).abs() < 1e-6);
    }

    #[test]
    fn test_matching_is_deterministic() {
        let mut fx = Fixture::new();
        fx.person(vec![unit_at(0.8)]);
        fx.person(vec![unit_at(0.7)]);
        let matcher = FaceMatcher::default();
        let a = fx.find(&matcher, &[1.0, 0.0]);
        let b = fx.find(&matcher, &[1.0, 0.0]);
        assert_eq!(a, b);
    }
}
