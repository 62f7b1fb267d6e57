//! Vitessce view config for one exported area.
//!
//! ```text
//! +-------------+-------------+
//! | spatial     | scatterplot |
//! |             | (t-SNE)     |
//! +-------------+-------------+
//! | heatmap     | featureList |
//! +-------------+-------------+
//! ```

use crate::config::PipelineConfig;
use serde::Serialize;
use spatial_beans::expr_container::SPATIAL_KEY;
use spatial_beans_alg::preprocess::TSNE_KEY;
use std::collections::BTreeMap;

pub const CONFIG_VERSION: &str = "1.0.15";
pub const GRID_COLUMNS: usize = 12;
pub const GRID_ROWS: usize = 12;

/// Name of the t-SNE embedding in the viewer
pub const TSNE_EMBEDDING: &str = "t-SNE";

const DATASET_UID: &str = "A";
const FILE_TYPE: &str = "anndata.zarr";

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Component {
    Spatial,
    Scatterplot,
    Heatmap,
    FeatureList,
}

/// One panel before placement; `mapping` binds a scatterplot to an
/// embedding type
#[derive(Clone, Debug)]
pub struct ViewSpec {
    pub component: Component,
    pub mapping: Option<Box<str>>,
}

impl ViewSpec {
    pub fn new(component: Component) -> Self {
        Self {
            component,
            mapping: None,
        }
    }

    pub fn mapping(mut self, embedding_type: &str) -> Self {
        self.mapping = Some(embedding_type.into());
        self
    }
}

/// Nested layout: `View`s combined side by side or on top of each other
#[derive(Clone, Debug)]
pub enum Layout {
    View(ViewSpec),
    Hconcat(Vec<Layout>),
    Vconcat(Vec<Layout>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rect {
    pub x: usize,
    pub y: usize,
    pub w: usize,
    pub h: usize,
}

impl Layout {
    /// Place every view in `rect`, splitting space evenly between
    /// siblings. The last sibling absorbs the rounding remainder.
    pub fn resolve(&self, rect: Rect) -> Vec<(ViewSpec, Rect)> {
        let mut ret = vec![];
        self.place(rect, &mut ret);
        ret
    }

    fn place(&self, rect: Rect, out: &mut Vec<(ViewSpec, Rect)>) {
        match self {
            Layout::View(v) => out.push((v.clone(), rect)),
            Layout::Hconcat(children) => {
                let n = children.len().max(1);
                let step = rect.w / n;
                for (k, child) in children.iter().enumerate() {
                    let x = rect.x + k * step;
                    let w = if k + 1 == n { rect.x + rect.w - x } else { step };
                    child.place(Rect { x, w, ..rect }, out);
                }
            }
            Layout::Vconcat(children) => {
                let n = children.len().max(1);
                let step = rect.h / n;
                for (k, child) in children.iter().enumerate() {
                    let y = rect.y + k * step;
                    let h = if k + 1 == n { rect.y + rect.h - y } else { step };
                    child.place(Rect { y, h, ..rect }, out);
                }
            }
        }
    }
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct VitessceConfig {
    pub version: String,
    pub name: String,
    pub description: String,
    pub datasets: Vec<Dataset>,
    pub coordination_space: BTreeMap<String, BTreeMap<String, String>>,
    pub layout: Vec<ViewConfig>,
    pub init_strategy: String,
}

#[derive(Serialize, Clone, Debug)]
pub struct Dataset {
    pub uid: String,
    pub name: String,
    pub files: Vec<DatasetFile>,
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DatasetFile {
    pub file_type: String,
    pub url: String,
    pub options: AnnDataOptions,
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AnnDataOptions {
    pub obs_feature_matrix: PathOption,
    pub obs_embedding: Vec<EmbeddingOption>,
    pub obs_locations: PathOption,
}

#[derive(Serialize, Clone, Debug)]
pub struct PathOption {
    pub path: String,
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingOption {
    pub path: String,
    pub dims: [usize; 2],
    pub embedding_type: String,
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ViewConfig {
    pub component: Component,
    pub coordination_scopes: BTreeMap<String, String>,
    pub x: usize,
    pub y: usize,
    pub w: usize,
    pub h: usize,
}

/// `(spatial | t-SNE scatterplot) / (heatmap | feature list)`
pub fn default_layout() -> Layout {
    use Layout::*;
    Vconcat(vec![
        Hconcat(vec![
            View(ViewSpec::new(Component::Spatial)),
            View(ViewSpec::new(Component::Scatterplot).mapping(TSNE_EMBEDDING)),
        ]),
        Hconcat(vec![
            View(ViewSpec::new(Component::Heatmap)),
            View(ViewSpec::new(Component::FeatureList)),
        ]),
    ])
}

/// Config for one area whose zarr store sits at
/// `config.dataset_url(area)`
pub fn build_vitessce_config(config: &PipelineConfig, area: &str) -> VitessceConfig {
    let options = AnnDataOptions {
        obs_feature_matrix: PathOption { path: "X".into() },
        obs_embedding: vec![EmbeddingOption {
            path: format!("obsm/{}", TSNE_KEY),
            dims: [0, 1],
            embedding_type: TSNE_EMBEDDING.into(),
        }],
        obs_locations: PathOption {
            path: format!("obsm/{}", SPATIAL_KEY),
        },
    };

    let dataset = Dataset {
        uid: DATASET_UID.into(),
        name: area.into(),
        files: vec![DatasetFile {
            file_type: FILE_TYPE.into(),
            url: config.dataset_url(area),
            options,
        }],
    };

    let placed = default_layout().resolve(Rect {
        x: 0,
        y: 0,
        w: GRID_COLUMNS,
        h: GRID_ROWS,
    });

    // one scope per distinct embedding type, lettered in order of use
    let mut embedding_scopes: BTreeMap<String, String> = BTreeMap::new();
    let mut layout = Vec::with_capacity(placed.len());

    for (view, rect) in placed {
        let mut scopes = BTreeMap::new();
        scopes.insert("dataset".to_string(), DATASET_UID.to_string());

        if let Some(embedding_type) = view.mapping.as_deref() {
            let next = scope_name(embedding_scopes.len());
            let scope = embedding_scopes
                .entry(embedding_type.to_string())
                .or_insert(next)
                .clone();
            scopes.insert("embeddingType".to_string(), scope);
        }

        layout.push(ViewConfig {
            component: view.component,
            coordination_scopes: scopes,
            x: rect.x,
            y: rect.y,
            w: rect.w,
            h: rect.h,
        });
    }

    let mut coordination_space = BTreeMap::new();
    coordination_space.insert(
        "dataset".to_string(),
        BTreeMap::from([(DATASET_UID.to_string(), DATASET_UID.to_string())]),
    );
    if !embedding_scopes.is_empty() {
        coordination_space.insert(
            "embeddingType".to_string(),
            embedding_scopes
                .into_iter()
                .map(|(value, scope)| (scope, value))
                .collect(),
        );
    }

    VitessceConfig {
        version: CONFIG_VERSION.into(),
        name: config.title.to_string(),
        description: String::new(),
        datasets: vec![dataset],
        coordination_space,
        layout,
        init_strategy: "auto".into(),
    }
}

/// `A`, `B`, ..., `Z`, `AA`, ...
fn scope_name(k: usize) -> String {
    let letter = (b'A' + (k % 26) as u8) as char;
    if k < 26 {
        letter.to_string()
    } else {
        format!("{}{}", scope_name(k / 26 - 1), letter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Destination;

    fn placed() -> Vec<(Component, Rect)> {
        default_layout()
            .resolve(Rect {
                x: 0,
                y: 0,
                w: GRID_COLUMNS,
                h: GRID_ROWS,
            })
            .into_iter()
            .map(|(v, r)| (v.component, r))
            .collect()
    }

    #[test]
    fn two_by_two_grid() {
        let rect = |x, y| Rect { x, y, w: 6, h: 6 };
        assert_eq!(
            placed(),
            vec![
                (Component::Spatial, rect(0, 0)),
                (Component::Scatterplot, rect(6, 0)),
                (Component::Heatmap, rect(0, 6)),
                (Component::FeatureList, rect(6, 6)),
            ]
        );
    }

    #[test]
    fn uneven_split_fills_width() {
        let three = Layout::Hconcat(vec![
            Layout::View(ViewSpec::new(Component::Spatial)),
            Layout::View(ViewSpec::new(Component::Heatmap)),
            Layout::View(ViewSpec::new(Component::FeatureList)),
        ]);
        let widths: Vec<usize> = three
            .resolve(Rect { x: 0, y: 0, w: 10, h: 4 })
            .iter()
            .map(|(_, r)| r.w)
            .collect();
        assert_eq!(widths, vec![3, 3, 4]);
    }

    #[test]
    fn scatterplot_bound_to_tsne() {
        let config = PipelineConfig::default();
        let vc = build_vitessce_config(&config, "A1");
        let json = serde_json::to_value(&vc).unwrap();

        assert_eq!(json["version"], "1.0.15");
        assert_eq!(json["name"], "Developing human neocortex: gestational week 20");
        assert_eq!(json["datasets"][0]["name"], "A1");
        assert_eq!(json["coordinationSpace"]["embeddingType"]["A"], "t-SNE");

        let layout = json["layout"].as_array().unwrap();
        assert_eq!(layout.len(), 4);
        assert_eq!(layout[1]["component"], "scatterplot");
        assert_eq!(layout[1]["coordinationScopes"]["embeddingType"], "A");
        assert_eq!(layout[3]["component"], "featureList");
        assert!(layout[0]["coordinationScopes"]
            .get("embeddingType")
            .is_none());
    }

    #[test]
    fn dataset_points_at_zarr_store() {
        let config = PipelineConfig {
            destination: Destination::Local {
                base_url: "http://localhost:3000".into(),
            },
            ..Default::default()
        };
        let json = serde_json::to_value(build_vitessce_config(&config, "A1")).unwrap();
        let file = &json["datasets"][0]["files"][0];
        assert_eq!(file["fileType"], "anndata.zarr");
        assert_eq!(file["url"], "http://localhost:3000/A1/anndata.zarr");
        assert_eq!(file["options"]["obsEmbedding"][0]["path"], "obsm/X_tsne");
        assert_eq!(file["options"]["obsLocations"]["path"], "obsm/X_spatial");
        assert_eq!(file["options"]["obsFeatureMatrix"]["path"], "X");
    }

    #[test]
    fn scope_letters() {
        assert_eq!(scope_name(0), "A");
        assert_eq!(scope_name(25), "Z");
        assert_eq!(scope_name(26), "AA");
    }
}
