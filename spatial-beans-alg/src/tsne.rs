use indicatif::ProgressBar;
use log::{debug, info};
use matrix_util::knn_match::knn_rows;
use matrix_util::traits::SampleOps;
use ndarray::{Array2, ArrayView2, Axis};
use rayon::prelude::*;
use std::collections::BTreeMap;

const MAX_BETA_SEARCH: usize = 100;
const ENTROPY_TOL: f64 = 1e-5;
const MIN_GAIN: f64 = 0.01;
const MAX_TREE_DEPTH: usize = 48;
const INIT_SD: f64 = 1e-4;

/// Barnes-Hut t-SNE on the rows of a dense matrix
///
/// Affinities come from the `3 * perplexity` nearest neighbours of
/// each row, found with an HNSW index; repulsive forces are
/// approximated with a quadtree.
#[derive(Clone, Debug)]
pub struct TSne {
    perplexity: f32,
    learning_rate: f32,
    n_iter: usize,
    early_exaggeration: f32,
    early_exaggeration_iter: usize,
    theta: f32,
    seed: Option<u64>,
}

impl Default for TSne {
    fn default() -> Self {
        Self {
            perplexity: 30.0,
            learning_rate: 1000.0,
            n_iter: 1000,
            early_exaggeration: 12.0,
            early_exaggeration_iter: 250,
            theta: 0.5,
            seed: None,
        }
    }
}

impl TSne {
    pub fn perplexity(mut self, p: f32) -> Self {
        self.perplexity = p;
        self
    }

    pub fn learning_rate(mut self, lr: f32) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn n_iter(mut self, n: usize) -> Self {
        self.n_iter = n;
        self
    }

    pub fn theta(mut self, theta: f32) -> Self {
        self.theta = theta;
        self
    }

    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Embed the rows of `data` into two dimensions.
    /// Returns `nrows x 2`.
    pub fn fit(&self, data: ArrayView2<f32>) -> anyhow::Result<Array2<f32>> {
        let n = data.nrows();

        anyhow::ensure!(n >= 2, "t-SNE needs at least two cells, found {}", n);
        anyhow::ensure!(self.perplexity > 0.0, "perplexity must be positive");
        anyhow::ensure!(
            (self.perplexity as f64) < n as f64,
            "perplexity ({}) must be less than the number of cells ({})",
            self.perplexity,
            n
        );
        anyhow::ensure!(
            data.iter().all(|x| x.is_finite()),
            "t-SNE input contains non-finite values"
        );

        let k = ((3.0 * self.perplexity).floor() as usize).clamp(1, n - 1);
        info!(
            "t-SNE on {} x {}: perplexity {}, {} neighbours, {} iterations",
            n,
            data.ncols(),
            self.perplexity,
            k,
            self.n_iter
        );

        let knn = knn_rows(data, k);
        let p = joint_probabilities(&knn, self.perplexity as f64);

        let y0 = Array2::<f64>::rnorm_seeded(n, 2, INIT_SD, self.seed);
        let y = self.optimize(&p, y0);

        Ok(y.mapv(|v| v as f32))
    }

    fn optimize(&self, p: &[Vec<(usize, f64)>], mut y: Array2<f64>) -> Array2<f64> {
        let n = y.nrows();
        let lr = self.learning_rate as f64;
        let theta = self.theta as f64;

        let mut update = Array2::<f64>::zeros((n, 2));
        let mut gains = Array2::<f64>::ones((n, 2));

        let pb = ProgressBar::new(self.n_iter as u64);

        for iter in 0..self.n_iter {
            let (exaggeration, momentum) = if iter < self.early_exaggeration_iter {
                (self.early_exaggeration as f64, 0.5)
            } else {
                (1.0, 0.8)
            };

            let grad = gradient(p, &y, theta, exaggeration);

            for ((g, u), gain) in grad.iter().zip(update.iter_mut()).zip(gains.iter_mut()) {
                if g * *u < 0.0 {
                    *gain += 0.2;
                } else {
                    *gain *= 0.8;
                }
                *gain = gain.max(MIN_GAIN);
                *u = momentum * *u - lr * *gain * g;
            }

            y += &update;

            if let Some(mean) = y.mean_axis(Axis(0)) {
                y -= &mean;
            }

            if (iter + 1) % 100 == 0 {
                let gnorm = grad.iter().map(|g| g * g).sum::<f64>().sqrt();
                debug!("t-SNE iteration {}: gradient norm {:.4e}", iter + 1, gnorm);
            }
            pb.inc(1);
        }
        pb.finish_and_clear();
        y
    }
}

/// Conditional `p(j|i)` over the neighbours of one row, with the
/// Gaussian precision tuned so the entropy matches `ln(perplexity)`
fn conditional_probabilities(dist: &[(usize, f64)], perplexity: f64) -> Vec<f64> {
    let target = perplexity.ln();

    // shifting by the minimum leaves p and the entropy unchanged
    let dmin = dist.iter().map(|x| x.1).fold(f64::INFINITY, f64::min);
    let d: Vec<f64> = dist.iter().map(|x| x.1 - dmin).collect();

    let mut p = vec![0.0; d.len()];
    let mut beta = 1.0;
    let (mut lo, mut hi) = (0.0_f64, f64::INFINITY);

    for _ in 0..MAX_BETA_SEARCH {
        let mut sum = 0.0;
        for (p_j, &d_j) in p.iter_mut().zip(&d) {
            *p_j = (-d_j * beta).exp();
            sum += *p_j;
        }

        let dp: f64 = p.iter().zip(&d).map(|(p_j, d_j)| p_j * d_j).sum();
        let entropy = sum.ln() + beta * dp / sum;
        p.iter_mut().for_each(|p_j| *p_j /= sum);

        let diff = entropy - target;
        if diff.abs() < ENTROPY_TOL {
            break;
        }

        if diff > 0.0 {
            lo = beta;
            beta = if hi.is_finite() {
                (beta + hi) / 2.0
            } else {
                beta * 2.0
            };
        } else {
            hi = beta;
            beta = (beta + lo) / 2.0;
        }
    }
    p
}

/// Symmetrized joint probabilities `(p(j|i) + p(i|j)) / sum`, as
/// sparse rows sorted by neighbour index
fn joint_probabilities(knn: &[Vec<(usize, f64)>], perplexity: f64) -> Vec<Vec<(usize, f64)>> {
    let cond: Vec<Vec<f64>> = knn
        .par_iter()
        .map(|row| conditional_probabilities(row, perplexity))
        .collect();

    let mut sym: Vec<BTreeMap<usize, f64>> = vec![BTreeMap::new(); knn.len()];
    for (i, (row, p_row)) in knn.iter().zip(&cond).enumerate() {
        for (&(j, _), &p_ij) in row.iter().zip(p_row) {
            *sym[i].entry(j).or_default() += p_ij;
            *sym[j].entry(i).or_default() += p_ij;
        }
    }

    let total: f64 = sym.iter().flat_map(|r| r.values()).sum();
    let total = if total > 0.0 { total } else { 1.0 };

    sym.into_iter()
        .map(|r| r.into_iter().map(|(j, v)| (j, v / total)).collect())
        .collect()
}

/// KL gradient w.r.t. the embedding
fn gradient(p: &[Vec<(usize, f64)>], y: &Array2<f64>, theta: f64, exaggeration: f64) -> Array2<f64> {
    let n = y.nrows();
    let tree = QuadTree::new(y);

    let repulsive: Vec<(f64, [f64; 2])> = (0..n)
        .into_par_iter()
        .map(|i| tree.repulsion([y[[i, 0]], y[[i, 1]]], i, theta))
        .collect();

    let z: f64 = repulsive
        .iter()
        .map(|r| r.0)
        .sum::<f64>()
        .max(f64::MIN_POSITIVE);

    let attractive: Vec<[f64; 2]> = p
        .par_iter()
        .enumerate()
        .map(|(i, row)| {
            let mut f = [0.0; 2];
            for &(j, p_ij) in row {
                let dx = y[[i, 0]] - y[[j, 0]];
                let dy = y[[i, 1]] - y[[j, 1]];
                let q = 1.0 / (1.0 + dx * dx + dy * dy);
                f[0] += p_ij * q * dx;
                f[1] += p_ij * q * dy;
            }
            f
        })
        .collect();

    let mut grad = Array2::<f64>::zeros((n, 2));
    for i in 0..n {
        for d in 0..2 {
            grad[[i, d]] = 4.0 * (exaggeration * attractive[i][d] - repulsive[i].1[d] / z);
        }
    }
    grad
}

struct QuadNode {
    com: [f64; 2],
    count: usize,
    width: f64,
    children: Vec<usize>,
    points: Vec<(usize, [f64; 2])>,
}

/// Quadtree over 2D points with centres of mass, root at index 0
struct QuadTree {
    nodes: Vec<QuadNode>,
}

impl QuadTree {
    fn new(y: &Array2<f64>) -> Self {
        let mut lo = [f64::INFINITY; 2];
        let mut hi = [f64::NEG_INFINITY; 2];
        for row in y.rows() {
            for d in 0..2 {
                lo[d] = lo[d].min(row[d]);
                hi[d] = hi[d].max(row[d]);
            }
        }

        let width = (hi[0] - lo[0]).max(hi[1] - lo[1]).max(1e-12);
        let center = [(lo[0] + hi[0]) / 2.0, (lo[1] + hi[1]) / 2.0];

        let mut tree = Self { nodes: vec![] };
        tree.add_node(y, (0..y.nrows()).collect(), center, width, 0);
        tree
    }

    fn add_node(
        &mut self,
        y: &Array2<f64>,
        idx: Vec<usize>,
        center: [f64; 2],
        width: f64,
        depth: usize,
    ) -> usize {
        let count = idx.len();
        let mut com = [0.0; 2];
        for &i in &idx {
            com[0] += y[[i, 0]];
            com[1] += y[[i, 1]];
        }
        if count > 0 {
            com[0] /= count as f64;
            com[1] /= count as f64;
        }

        let me = self.nodes.len();
        self.nodes.push(QuadNode {
            com,
            count,
            width,
            children: vec![],
            points: vec![],
        });

        if count <= 1 || depth >= MAX_TREE_DEPTH {
            self.nodes[me].points = idx.into_iter().map(|i| (i, [y[[i, 0]], y[[i, 1]]])).collect();
            return me;
        }

        let mut quads: [Vec<usize>; 4] = Default::default();
        for i in idx {
            let east = (y[[i, 0]] >= center[0]) as usize;
            let north = (y[[i, 1]] >= center[1]) as usize;
            quads[east + 2 * north].push(i);
        }

        let half = width / 2.0;
        let mut children = vec![];
        for (q, sub) in quads.into_iter().enumerate() {
            if sub.is_empty() {
                continue;
            }
            let cx = center[0] + if q & 1 == 1 { half / 2.0 } else { -half / 2.0 };
            let cy = center[1] + if q & 2 == 2 { half / 2.0 } else { -half / 2.0 };
            children.push(self.add_node(y, sub, [cx, cy], half, depth + 1));
        }
        self.nodes[me].children = children;
        me
    }

    /// Unnormalized repulsion on point `i` at `y_i`:
    /// `(sum_j q_ij, sum_j q_ij^2 (y_i - y_j))` with `q_ij = 1/(1 + d_ij^2)`
    fn repulsion(&self, y_i: [f64; 2], i: usize, theta: f64) -> (f64, [f64; 2]) {
        let mut sum_q = 0.0;
        let mut force = [0.0; 2];

        let mut stack = vec![0_usize];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id];
            if node.count == 0 {
                continue;
            }

            if node.children.is_empty() {
                for &(j, y_j) in &node.points {
                    if j == i {
                        continue;
                    }
                    let dx = y_i[0] - y_j[0];
                    let dy = y_i[1] - y_j[1];
                    let q = 1.0 / (1.0 + dx * dx + dy * dy);
                    sum_q += q;
                    force[0] += q * q * dx;
                    force[1] += q * q * dy;
                }
                continue;
            }

            let dx = y_i[0] - node.com[0];
            let dy = y_i[1] - node.com[1];
            let d2 = dx * dx + dy * dy;

            if node.width * node.width < theta * theta * d2 {
                let m = node.count as f64;
                let q = 1.0 / (1.0 + d2);
                sum_q += m * q;
                force[0] += m * q * q * dx;
                force[1] += m * q * q * dy;
            } else {
                stack.extend(node.children.iter().copied());
            }
        }
        (sum_q, force)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// two tight groups of `m` points each, far apart in 5 dimensions
    fn two_groups(m: usize) -> Array2<f32> {
        Array2::from_shape_fn((2 * m, 5), |(i, j)| {
            let offset = if i < m { 0.0 } else { 10.0 };
            offset + 0.3 * ((i * 7 + j * 13) as f32).sin()
        })
    }

    #[test]
    fn conditional_rows_hit_perplexity() {
        let dist: Vec<(usize, f64)> = (0..20).map(|j| (j, (j as f64) * 0.5)).collect();
        let p = conditional_probabilities(&dist, 5.0);
        assert_abs_diff_eq!(p.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
        let entropy: f64 = -p.iter().filter(|&&x| x > 0.0).map(|x| x * x.ln()).sum::<f64>();
        assert_abs_diff_eq!(entropy, 5_f64.ln(), epsilon = 1e-3);
    }

    #[test]
    fn exact_tree_matches_brute_force() {
        let y = Array2::from_shape_fn((30, 2), |(i, j)| ((i * 3 + j * 5) as f64).cos() * 4.0);
        let tree = QuadTree::new(&y);

        for i in [0, 7, 29] {
            let (sum_q, force) = tree.repulsion([y[[i, 0]], y[[i, 1]]], i, 0.0);

            let mut bf_q = 0.0;
            let mut bf_f = [0.0; 2];
            for j in 0..30 {
                if j == i {
                    continue;
                }
                let dx = y[[i, 0]] - y[[j, 0]];
                let dy = y[[i, 1]] - y[[j, 1]];
                let q = 1.0 / (1.0 + dx * dx + dy * dy);
                bf_q += q;
                bf_f[0] += q * q * dx;
                bf_f[1] += q * q * dy;
            }
            assert_abs_diff_eq!(sum_q, bf_q, epsilon = 1e-9);
            assert_abs_diff_eq!(force[0], bf_f[0], epsilon = 1e-9);
            assert_abs_diff_eq!(force[1], bf_f[1], epsilon = 1e-9);
        }
    }

    #[test]
    fn joint_probabilities_are_symmetric() {
        let data = two_groups(8);
        let knn = knn_rows(data.view(), 4);
        let p = joint_probabilities(&knn, 2.0);

        let total: f64 = p.iter().flatten().map(|x| x.1).sum();
        assert_abs_diff_eq!(total, 1.0, epsilon = 1e-9);

        for (i, row) in p.iter().enumerate() {
            for &(j, p_ij) in row {
                let p_ji = p[j].iter().find(|x| x.0 == i).map(|x| x.1);
                assert_eq!(p_ji, Some(p_ij));
            }
        }
    }

    #[test]
    fn neighbours_stay_within_groups() {
        let m = 150;
        let data = two_groups(m);
        let knn = knn_rows(data.view(), 30);
        for (i, row) in knn.iter().enumerate() {
            assert_eq!(row.len(), 30);
            assert!(row.iter().all(|&(j, _)| (j < m) == (i < m)));
        }
    }

    #[test]
    fn separates_two_groups() -> anyhow::Result<()> {
        let m = 20;
        let data = two_groups(m);
        let y = TSne::default()
            .perplexity(5.0)
            .learning_rate(100.0)
            .n_iter(500)
            .seed(Some(1))
            .fit(data.view())?;

        assert_eq!(y.dim(), (2 * m, 2));
        assert!(y.iter().all(|v| v.is_finite()));

        let centroid = |r: std::ops::Range<usize>| {
            let len = r.len() as f32;
            let mut c = [0.0_f32; 2];
            for i in r {
                c[0] += y[[i, 0]] / len;
                c[1] += y[[i, 1]] / len;
            }
            c
        };
        let spread = |r: std::ops::Range<usize>, c: [f32; 2]| {
            let len = r.len() as f32;
            r.map(|i| ((y[[i, 0]] - c[0]).powi(2) + (y[[i, 1]] - c[1]).powi(2)).sqrt())
                .sum::<f32>()
                / len
        };

        let (ca, cb) = (centroid(0..m), centroid(m..2 * m));
        let between = ((ca[0] - cb[0]).powi(2) + (ca[1] - cb[1]).powi(2)).sqrt();
        let within = spread(0..m, ca).max(spread(m..2 * m, cb));
        assert!(between > 1.5 * within, "between {} within {}", between, within);
        Ok(())
    }

    #[test]
    fn seeded_runs_repeat() -> anyhow::Result<()> {
        let data = two_groups(6);
        let tsne = TSne::default().perplexity(3.0).n_iter(50).seed(Some(42));
        let a = tsne.fit(data.view())?;
        let b = tsne.fit(data.view())?;
        assert_eq!(a, b);
        Ok(())
    }

    #[test]
    fn perplexity_must_fit_cells() {
        let data = two_groups(5);
        let ret = TSne::default().perplexity(10.0).fit(data.view());
        assert!(ret.is_err());
    }
}
