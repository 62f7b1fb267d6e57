use crate::common::*;
use crate::config::{PipelineConfig, ZARR_NAME};
use crate::vitessce_config::VitessceConfig;
use spatial_beans::zarr_io::write_anndata_zarr;
use std::io::Write;

/// Files written for one area
///
/// ```text
/// {output_root}/{area}/
///     ├── anndata.zarr/
///     └── vitessce_config_{area}.json
/// ```
#[derive(Clone, Debug)]
pub struct ExportArtifact {
    pub area: Box<str>,
    pub area_dir: PathBuf,
    pub zarr_dir: PathBuf,
    pub manifest_path: PathBuf,
}

impl ExportArtifact {
    pub fn manifest_name(&self) -> anyhow::Result<&str> {
        self.manifest_path
            .file_name()
            .and_then(|x| x.to_str())
            .ok_or_else(|| anyhow::anyhow!("bad manifest path {}", self.manifest_path.display()))
    }
}

/// Write the zarr store and the view config under a new area
/// directory. Fails if the directory already exists.
pub fn export_local(
    adata: &ExprContainer,
    vc: &VitessceConfig,
    config: &PipelineConfig,
    area: &str,
) -> anyhow::Result<ExportArtifact> {
    let area_dir = io::create_new_dir(config.area_dir(area))?;

    let zarr_dir = area_dir.join(ZARR_NAME);
    write_anndata_zarr(adata, &zarr_dir)
        .with_context(|| format!("writing {}", zarr_dir.display()))?;

    let manifest_path = area_dir.join(config.manifest_name(area));
    let mut writer = io::open_buf_writer(&manifest_path)?;
    serde_json::to_writer_pretty(&mut writer, vc)?;
    writer.flush()?;

    info!("exported {} to {}", area, area_dir.display());

    Ok(ExportArtifact {
        area: area.into(),
        area_dir,
        zarr_dir,
        manifest_path,
    })
}
