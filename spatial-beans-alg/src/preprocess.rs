use crate::normalization::{log1p, normalize_total};
use crate::tsne::TSne;
use log::info;
use spatial_beans::expr_container::ExprContainer;

/// Key of the t-SNE embedding
pub const TSNE_KEY: &str = "X_tsne";

#[derive(Clone, Debug, Default)]
pub struct PreprocessParams {
    /// `None` normalizes to the median cell total
    pub target_sum: Option<f32>,
    pub tsne: TSne,
}

/// Normalize, log-transform and embed, in this order. Not idempotent:
/// call it once per container.
pub fn preprocess(adata: &mut ExprContainer, params: &PreprocessParams) -> anyhow::Result<()> {
    normalize_total(adata, params.target_sum);
    log1p(adata);
    embed_tsne(adata, &params.tsne)?;
    Ok(())
}

/// Add `obsm["X_tsne"]` computed from the current expression matrix
pub fn embed_tsne(adata: &mut ExprContainer, tsne: &TSne) -> anyhow::Result<()> {
    let y = tsne.fit(adata.x().view())?;
    adata.add_obsm(TSNE_KEY, y)?;
    info!("added {} to obsm", TSNE_KEY);
    Ok(())
}
