use crate::error::IndexError;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    pub distance: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlatL2Index {
    dimension: usize,
    data: Vec<f32>,
}

impl FlatL2Index {
    pub fn new(dimension: usize) -> Result<Self, IndexError> {
        if dimension == 0 {
            return Err(IndexError::ZeroDimension);
        }
        Ok(Self {
            dimension,
            data: Vec::new(),
        })
    }

    pub fn from_raw(dimension: usize, data: Vec<f32>) -> Result<Self, IndexError> {
        if dimension == 0 {
            return Err(IndexError::ZeroDimension);
        }
        if data.len() % dimension != 0 {
            return Err(IndexError::Malformed(format!(
                "buffer of {} values is not a multiple of dimension {}",
                data.len(),
                dimension
            )));
        }
        Ok(Self { dimension, data })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.data.len() / self.dimension
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dimension)?;
        self.data.get(start..start.checked_add(self.dimension)?)
    }

    pub fn add(&mut self, vectors: &[Vec<f32>]) -> Result<(), IndexError> {
        if let Some(bad) = vectors.iter().find(|vector| vector.len() != self.dimension) {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: bad.len(),
            });
        }

        self.data.reserve(vectors.len() * self.dimension);
        for vector in vectors {
            self.data.extend_from_slice(vector);
        }
        Ok(())
    }

    /// Returns up to `k` positions nearest to `query`, closest first. Equal
    /// distances keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, IndexError> {
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(position, vector)| Neighbor {
                position,
                distance: squared_l2(query, vector),
            })
            .collect::<Vec<_>>();

        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, rank);
            scored.truncate(k);
        }
        scored.sort_by(rank);

        Ok(scored)
    }
}

fn rank(left: &Neighbor, right: &Neighbor) -> Ordering {
    left.distance
        .total_cmp(&right.distance)
        .then(left.position.cmp(&right.position))
}

pub fn squared_l2(left: &[f32], right: &[f32]) -> f32 {
    left.iter()
        .zip(right)
        .map(|(a, b)| {
            let delta = a - b;
            delta * delta
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> Result<FlatL2Index, IndexError> {
        let mut index = FlatL2Index::new(2)?;
        index.add(&[
            vec![0.0, 0.0],
            vec![3.0, 4.0],
            vec![1.0, 1.0],
            vec![-1.0, -1.0],
            vec![10.0, 0.0],
        ])?;
        Ok(index)
    }

    fn brute_force(index: &FlatL2Index, query: &[f32]) -> Vec<usize> {
        let mut all = (0..index.len())
            .filter_map(|i| index.vector(i).map(|v| (squared_l2(query, v), i)))
            .collect::<Vec<_>>();
        all.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        all.into_iter().map(|(_, i)| i).collect()
    }

    #[test]
    fn search_orders_by_distance_with_stable_ties() -> Result<(), IndexError> {
        let index = sample_index()?;
        let hits = index.search(&[0.0, 0.0], 3)?;

        let positions = hits.iter().map(|hit| hit.position).collect::<Vec<_>>();
        assert_eq!(positions, vec![0, 2, 3]);
        assert_eq!(hits[1].distance, hits[2].distance);
        for pair in hits.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
        Ok(())
    }

    #[test]
    fn search_matches_brute_force_ranking() -> Result<(), IndexError> {
        let index = sample_index()?;
        for query in [[0.5, 0.5], [9.0, 1.0], [-2.0, 3.0], [1.0, 1.0]] {
            let hits = index.search(&query, index.len())?;
            let positions = hits.iter().map(|hit| hit.position).collect::<Vec<_>>();
            assert_eq!(positions, brute_force(&index, &query));

            for k in 1..index.len() {
                let top = index.search(&query, k)?;
                assert_eq!(top.len(), k);
                assert_eq!(positions[..k].to_vec(), top.iter().map(|h| h.position).collect::<Vec<_>>());
            }
        }
        Ok(())
    }

    #[test]
    fn fewer_vectors_than_k_returns_all() -> Result<(), IndexError> {
        let index = sample_index()?;
        let hits = index.search(&[10.0, 0.0], 50)?;
        assert_eq!(hits.len(), 5);
        assert_eq!(hits[0].position, 4);
        assert_eq!(hits[0].distance, 0.0);
        Ok(())
    }

    #[test]
    fn empty_index_and_zero_k_return_nothing() -> Result<(), IndexError> {
        let empty = FlatL2Index::new(4)?;
        assert!(empty.search(&[0.0; 4], 3)?.is_empty());

        let index = sample_index()?;
        assert!(index.search(&[0.0, 0.0], 0)?.is_empty());
        Ok(())
    }

    #[test]
    fn mismatched_dimensions_are_rejected() -> Result<(), IndexError> {
        let mut index = sample_index()?;
        assert_eq!(
            index.search(&[0.0, 0.0, 0.0], 1),
            Err(IndexError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        );

        let before = index.len();
        let result = index.add(&[vec![1.0, 2.0], vec![1.0]]);
        assert!(result.is_err());
        assert_eq!(index.len(), before);
        Ok(())
    }

    #[test]
    fn zero_dimension_and_ragged_buffers_are_rejected() {
        assert_eq!(FlatL2Index::new(0), Err(IndexError::ZeroDimension));
        assert!(matches!(
            FlatL2Index::from_raw(3, vec![0.0; 4]),
            Err(IndexError::Malformed(_))
        ));
    }
}
