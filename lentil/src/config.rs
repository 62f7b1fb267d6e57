use crate::common::*;

pub const DEFAULT_INPUT_DIR: &str = "./cell_by_feature_matrices";
pub const DEFAULT_OUTPUT_ROOT: &str = "./data/processed";
pub const DEFAULT_BUCKET: &str = "second-trimester-neocortex";
pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";
pub const DEFAULT_TITLE: &str = "Developing human neocortex: gestational week 20";

pub const VITESSCE_APP_URL: &str = "http://vitessce.io/";

/// Name of the zarr store inside an area directory
pub const ZARR_NAME: &str = "anndata.zarr";

/// Where the exported bundle is served from
#[derive(Clone, Debug, PartialEq)]
pub enum Destination {
    /// keep the bundle on disk, served at `base_url`
    Local { base_url: Box<str> },
    /// upload the bundle to an S3 bucket
    S3 { bucket: Box<str>, region: Box<str> },
}

/// Settings of one batch run, resolved once from the command line
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub input_dir: PathBuf,
    pub output_root: PathBuf,
    pub title: Box<str>,
    pub destination: Destination,
    pub preprocess: PreprocessParams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_dir: DEFAULT_INPUT_DIR.into(),
            output_root: DEFAULT_OUTPUT_ROOT.into(),
            title: DEFAULT_TITLE.into(),
            destination: Destination::S3 {
                bucket: DEFAULT_BUCKET.into(),
                region: DEFAULT_REGION.into(),
            },
            preprocess: PreprocessParams::default(),
        }
    }
}

impl PipelineConfig {
    /// `{output_root}/{area}`
    pub fn area_dir(&self, area: &str) -> PathBuf {
        self.output_root.join(area)
    }

    /// `vitessce_config_{area}.json`
    pub fn manifest_name(&self, area: &str) -> String {
        format!("vitessce_config_{}.json", area)
    }

    /// Root URL under which area directories are reachable
    pub fn served_root(&self) -> String {
        match &self.destination {
            Destination::Local { base_url } => base_url.trim_end_matches('/').to_string(),
            Destination::S3 { bucket, .. } => format!("https://{}.s3.amazonaws.com", bucket),
        }
    }

    /// URL of the zarr store as seen by the browser
    pub fn dataset_url(&self, area: &str) -> String {
        format!("{}/{}/{}", self.served_root(), area, ZARR_NAME)
    }

    /// URL of the manifest as seen by the browser
    pub fn manifest_url(&self, area: &str) -> String {
        format!("{}/{}/{}", self.served_root(), area, self.manifest_name(area))
    }

    /// Link that opens the manifest in the Vitessce web app
    pub fn vitessce_url(&self, area: &str) -> String {
        format!("{}?url={}", VITESSCE_APP_URL, self.manifest_url(area))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_names() {
        let config = PipelineConfig::default();
        assert_eq!(
            config.area_dir("sampleA"),
            Path::new("./data/processed/sampleA")
        );
        assert_eq!(
            config.manifest_name("sampleA"),
            "vitessce_config_sampleA.json"
        );
    }

    #[test]
    fn s3_urls() {
        let config = PipelineConfig::default();
        assert_eq!(
            config.dataset_url("A1"),
            "https://second-trimester-neocortex.s3.amazonaws.com/A1/anndata.zarr"
        );
        assert_eq!(
            config.vitessce_url("A1"),
            "http://vitessce.io/?url=https://second-trimester-neocortex.s3.amazonaws.com/A1/vitessce_config_A1.json"
        );
    }

    #[test]
    fn local_urls() {
        let config = PipelineConfig {
            destination: Destination::Local {
                base_url: "http://localhost:3000/".into(),
            },
            ..Default::default()
        };
        assert_eq!(
            config.vitessce_url("A1"),
            "http://vitessce.io/?url=http://localhost:3000/A1/vitessce_config_A1.json"
        );
    }
}
