use indicatif::ParallelProgressIterator;
use instant_distance::{Builder, HnswMap, Search};
use ndarray::{ArrayView1, ArrayView2};
use rayon::prelude::*;

/// Beam width while searching; raised to `k + 1` for larger `k`
const MIN_EF_SEARCH: usize = 100;
const HNSW_SEED: u64 = 42;

/// A wrapper for `Vec<f32>` in the Euclidean space
#[derive(Clone, Debug)]
pub struct VecPoint {
    pub data: Vec<f32>,
}

pub trait MakeVecPoint {
    fn to_vp(&self) -> VecPoint;
}

impl MakeVecPoint for ArrayView1<'_, f32> {
    fn to_vp(&self) -> VecPoint {
        VecPoint {
            data: self.iter().cloned().collect(),
        }
    }
}

impl instant_distance::Point for VecPoint {
    fn distance(&self, other: &Self) -> f32 {
        self.data
            .iter()
            .zip(other.data.iter())
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f32>()
            .sqrt()
    }
}

/// HNSW index over the rows of a matrix, each row keyed by its position
pub struct RowDict {
    pub dict: HnswMap<VecPoint, usize>,
    pub data_vec: Vec<VecPoint>,
}

impl RowDict {
    pub fn from_ndarray_rows(data: ArrayView2<f32>, ef_search: usize) -> Self {
        let data_vec: Vec<VecPoint> = data.rows().into_iter().map(|r| r.to_vp()).collect();
        let names: Vec<usize> = (0..data_vec.len()).collect();
        let dict = Builder::default()
            .ef_search(ef_search.max(MIN_EF_SEARCH))
            .seed(HNSW_SEED)
            .build(data_vec.clone(), names);
        Self { dict, data_vec }
    }

    pub fn len(&self) -> usize {
        self.data_vec.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data_vec.is_empty()
    }

    /// `k` nearest other rows of row `i` as `(row, squared distance)`,
    /// closest first
    pub fn search_others(&self, i: usize, k: usize) -> Vec<(usize, f64)> {
        let mut search = Search::default();
        let mut ret: Vec<(usize, f64)> = self
            .dict
            .search(&self.data_vec[i], &mut search)
            .filter(|item| *item.value != i)
            .take(k)
            .map(|item| {
                let d = item.distance as f64;
                (*item.value, d * d)
            })
            .collect();

        ret.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        ret
    }
}

/// k-nearest-neighbour lists of every row against all other rows
///
/// * `data` - rows are points
/// * `knn` - number of neighbours per row (at most `nrows - 1`)
///
pub fn knn_rows(data: ArrayView2<f32>, knn: usize) -> Vec<Vec<(usize, f64)>> {
    let nn = data.nrows();
    let knn = knn.min(nn.saturating_sub(1));
    let dict = RowDict::from_ndarray_rows(data, knn + 1);

    (0..nn)
        .into_par_iter()
        .progress_count(nn as u64)
        .map(|i| dict.search_others(i, knn))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn brute_force(data: &Array2<f32>, i: usize, k: usize) -> Vec<usize> {
        let mut dist: Vec<(usize, f32)> = (0..data.nrows())
            .filter(|&j| j != i)
            .map(|j| {
                let d = (&data.row(i) - &data.row(j)).mapv(|x| x * x).sum();
                (j, d)
            })
            .collect();
        dist.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap().then(a.0.cmp(&b.0)));
        dist.into_iter().take(k).map(|x| x.0).collect()
    }

    #[test]
    fn small_data_matches_exact_search() {
        let data = Array2::from_shape_fn((40, 3), |(i, j)| ((i * 7 + j * 3) as f32).sin() * 5.0);
        let knn = knn_rows(data.view(), 5);
        assert_eq!(knn.len(), 40);
        for i in [0, 13, 39] {
            let mut found: Vec<usize> = knn[i].iter().map(|x| x.0).collect();
            let mut expected = brute_force(&data, i, 5);
            found.sort();
            expected.sort();
            assert_eq!(found, expected);
            assert!(knn[i].windows(2).all(|w| w[0].1 <= w[1].1));
        }
    }

    #[test]
    fn self_is_excluded_and_k_is_capped() {
        let data = Array2::from_shape_fn((4, 2), |(i, j)| (i + j) as f32);
        let knn = knn_rows(data.view(), 10);
        for (i, row) in knn.iter().enumerate() {
            assert_eq!(row.len(), 3);
            assert!(row.iter().all(|x| x.0 != i));
        }
    }
}
