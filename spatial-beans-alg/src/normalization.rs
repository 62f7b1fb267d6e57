use log::{info, warn};
use matrix_util::traits::CountNormOps;
use spatial_beans::expr_container::ExprContainer;

/// Scale each cell so that its total matches a common target.
/// Without `target_sum` the median of the positive totals is used.
/// Returns the target that was applied.
pub fn normalize_total(adata: &mut ExprContainer, target_sum: Option<f32>) -> f32 {
    let x = adata.x_mut();

    let nzero = x.row_sums().iter().filter(|&&s| s <= 0.0).count();
    if nzero > 0 {
        warn!("{} cell(s) with zero total counts are left as is", nzero);
    }

    let target = x.normalize_total_inplace(target_sum);
    info!("normalized cell totals to {}", target);
    target
}

/// `x <- ln(1 + x)` over the expression matrix
pub fn log1p(adata: &mut ExprContainer) {
    adata.x_mut().log1p_inplace();
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn toy() -> ExprContainer {
        let x = array![[2_f32, 2., 0.], [0., 4., 4.], [0., 0., 0.], [1., 1., 10.]];
        let obs = (0..4).map(|i| format!("c{}", i).into()).collect();
        let var = (0..3).map(|j| format!("g{}", j).into()).collect();
        ExprContainer::new(x, obs, var).unwrap()
    }

    #[test]
    fn totals_match_median() {
        let mut adata = toy();
        let target = normalize_total(&mut adata, None);
        assert_abs_diff_eq!(target, 8.0);
        for (i, row) in adata.x().rows().into_iter().enumerate() {
            let expected = if i == 2 { 0.0 } else { 8.0 };
            assert_abs_diff_eq!(row.sum(), expected, epsilon = 1e-4);
        }
    }

    #[test]
    fn log1p_is_elementwise() {
        let mut adata = toy();
        log1p(&mut adata);
        assert_abs_diff_eq!(adata.x()[[3, 2]], 11_f32.ln(), epsilon = 1e-6);
        assert_abs_diff_eq!(adata.x()[[2, 0]], 0.0);
    }
}
