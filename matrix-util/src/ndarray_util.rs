use crate::traits::*;
use ndarray::parallel::prelude::*;
use ndarray::prelude::*;
use num_traits::{Float, FromPrimitive};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rayon::prelude::*;

/// Median of the strictly positive values, `None` if there are none
pub fn positive_median<T>(values: &[T]) -> Option<T>
where
    T: Float + FromPrimitive,
{
    let mut pos: Vec<T> = values
        .iter()
        .copied()
        .filter(|x| x.is_finite() && *x > T::zero())
        .collect();

    if pos.is_empty() {
        return None;
    }

    pos.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = pos.len();
    let two = T::from_f32(2.0)?;
    if n % 2 == 1 {
        Some(pos[n / 2])
    } else {
        Some((pos[n / 2 - 1] + pos[n / 2]) / two)
    }
}

impl<T> CountNormOps for Array2<T>
where
    T: Float + FromPrimitive + Send + Sync,
{
    type Scalar = T;

    fn row_sums(&self) -> Vec<T> {
        self.rows()
            .into_iter()
            .map(|row| row.iter().fold(T::zero(), |a, &b| a + b))
            .collect()
    }

    fn normalize_total_inplace(&mut self, target_sum: Option<T>) -> T {
        let sums = self.row_sums();
        let target = target_sum
            .or_else(|| positive_median(&sums))
            .unwrap_or_else(T::one);

        self.axis_iter_mut(Axis(0))
            .into_par_iter()
            .zip(sums.par_iter())
            .for_each(|(mut row, &s)| {
                if s > T::zero() {
                    let scale = target / s;
                    row.mapv_inplace(|x| x * scale);
                }
            });

        target
    }

    fn log1p_inplace(&mut self) {
        self.par_mapv_inplace(|x| x.ln_1p());
    }
}

impl<T> SampleOps for Array2<T>
where
    T: Float + FromPrimitive,
{
    type Mat = Self;
    type Scalar = T;

    fn rnorm_seeded(dd: usize, nn: usize, sd: T, seed: Option<u64>) -> Self::Mat {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Array2::from_shape_simple_fn((dd, nn), || {
            let z: f64 = rng.sample(StandardNormal);
            T::from_f64(z).unwrap_or_else(T::zero) * sd
        })
    }
}
