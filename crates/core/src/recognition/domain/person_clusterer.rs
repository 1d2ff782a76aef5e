//! Density-based re-clustering of the whole embedding population.
//!
//! DBSCAN over cosine distance (`1 - cosine`). Every run rebuilds the
//! person set from scratch; names survive through face overlap with the
//! previous set.

use std::collections::{HashSet, VecDeque};

use crate::library::domain::face_record::FaceId;
use crate::library::domain::person::Person;
use crate::recognition::domain::vector_math;
use crate::shared::constants::{CLUSTER_EPS, CLUSTER_MIN_POINTS, DEFAULT_PERSON_NAME};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClusterLabel {
    Noise,
    Cluster(usize),
}

pub struct PersonClusterer {
    eps: f64,
    min_points: usize,
}

impl PersonClusterer {
    pub fn new(eps: f64, min_points: usize) -> Self {
        Self { eps, min_points }
    }

    /// Assigns a label to every embedding, in input order.
    ///
    /// Points first marked noise are re-absorbed as border points when a
    /// later cluster expansion reaches them; they do not expand further.
    pub fn labels<V: AsRef<[f32]>>(&self, embeddings: &[V]) -> Vec<ClusterLabel> {
        let n = embeddings.len();
        let mut labels: Vec<Option<ClusterLabel>> = vec![None; n];
        let mut next_cluster = 0;

        for i in 0..n {
            if labels[i].is_some() {
                continue;
            }

            let neighbors = self.neighbors(i, embeddings);
            if neighbors.len() < self.min_points {
                labels[i] = Some(ClusterLabel::Noise);
                continue;
            }

            let cluster = ClusterLabel::Cluster(next_cluster);
            labels[i] = Some(cluster);
            let mut queue: VecDeque<usize> = neighbors.into();

            while let Some(j) = queue.pop_front() {
                match labels[j] {
                    Some(ClusterLabel::Noise) => {
                        labels[j] = Some(cluster);
                        continue;
                    }
                    Some(ClusterLabel::Cluster(_)) => continue,
                    None => {}
                }

                labels[j] = Some(cluster);
                let expansion = self.neighbors(j, embeddings);
                if expansion.len() >= self.min_points {
                    queue.extend(expansion);
                }
            }

            next_cluster += 1;
        }

        labels
            .into_iter()
            .map(|l| l.unwrap_or(ClusterLabel::Noise))
            .collect()
    }

    /// Builds a fresh person per cluster over `faces`.
    ///
    /// Members keep population order and the first member represents the
    /// person. A cluster inherits the first non-default name found among
    /// `previous` people sharing at least one of its faces.
    pub fn rebuild<V: AsRef<[f32]>>(&self, faces: &[(FaceId, V)], previous: &[Person]) -> Vec<Person> {
        let embeddings: Vec<&[f32]> = faces.iter().map(|(_, e)| e.as_ref()).collect();
        let labels = self.labels(&embeddings);

        let mut clusters: Vec<Vec<FaceId>> = Vec::new();
        for ((face_id, _), label) in faces.iter().zip(labels) {
            if let ClusterLabel::Cluster(c) = label {
                if clusters.len() <= c {
                    clusters.resize_with(c + 1, Vec::new);
                }
                clusters[c].push(*face_id);
            }
        }

        clusters
            .into_iter()
            .filter(|members| !members.is_empty())
            .map(|members| {
                let name = inherited_name(&members, previous)
                    .unwrap_or_else(|| DEFAULT_PERSON_NAME.to_string());
                Person::from_faces(members, name)
            })
            .collect()
    }

    /// Indices within `eps` of point `i`, always including `i` itself.
    ///
    /// Embeddings of a different dimensionality are never neighbors.
    fn neighbors<V: AsRef<[f32]>>(&self, i: usize, embeddings: &[V]) -> Vec<usize> {
        let a = embeddings[i].as_ref();
        embeddings
            .iter()
            .enumerate()
            .filter(|(j, b)| {
                *j == i
                    || vector_math::cosine_similarity(a, b.as_ref())
                        .is_ok_and(|sim| 1.0 - sim <= self.eps)
            })
            .map(|(j, _)| j)
            .collect()
    }
}

impl Default for PersonClusterer {
    fn default() -> Self {
        Self::new(CLUSTER_EPS, CLUSTER_MIN_POINTS)
    }
}

fn inherited_name(members: &[FaceId], previous: &[Person]) -> Option<String> {
    let members: HashSet<&FaceId> = members.iter().collect();
    previous
        .iter()
        .filter(|p| p.has_custom_name())
        .find(|p| p.face_ids.iter().any(|id| members.contains(id)))
        .map(|p| p.name.clone())
}
