//! AnnData-style zarr store for an [`ExprContainer`].
//!
//! ```text
//! (root)                  encoding-type: anndata
//!     ├── X               dense n_obs x n_vars f32, chunked by features
//!     ├── obs             dataframe, index only
//!     │   └── _index      cell names
//!     ├── var             dataframe, index only
//!     │   └── _index      feature names
//!     ├── obsm            dict of n_obs x k arrays
//!     │   ├── X_spatial
//!     │   └── X_tsne
//!     └── uns             empty dict
//! ```
//!
//! Written as zarr v3 through `zarrs`; the readers below are used to
//! inspect what was written.

use crate::expr_container::{ExprContainer, ObsmArray};
use log::info;
use ndarray::{Array2, Ix2};
use serde_json::{json, Map, Value};
use std::path::Path;
use std::sync::Arc;
use zarrs::array::Array as ZArray;
use zarrs::array::{ArrayBuilder, DataType, FillValue};
use zarrs::filesystem::FilesystemStore;
use zarrs::group::{Group, GroupBuilder};
use zarrs::storage::ReadableWritableListableStorageTraits as ZStorageTraits;

/// Number of features per chunk of `X`, so a viewer can fetch a few
/// genes without pulling the whole matrix
pub const VAR_CHUNK_SIZE: usize = 10;

const NUM_CHUNKS: usize = 10_000;
const MIN_CHUNK_SIZE: usize = 8192;

pub const X_PATH: &str = "/X";
pub const OBS_INDEX_PATH: &str = "/obs/_index";
pub const VAR_INDEX_PATH: &str = "/var/_index";

fn encoding(kind: &str, version: &str) -> Map<String, Value> {
    let mut attrs = Map::new();
    attrs.insert("encoding-type".into(), json!(kind));
    attrs.insert("encoding-version".into(), json!(version));
    attrs
}

fn dataframe_encoding() -> Map<String, Value> {
    let mut attrs = encoding("dataframe", "0.2.0");
    attrs.insert("_index".into(), json!("_index"));
    attrs.insert("column-order".into(), json!([]));
    attrs
}

/// Open (or create) a zarr filesystem store rooted at `path`
pub fn open_zarr_store(path: impl AsRef<Path>) -> anyhow::Result<Arc<dyn ZStorageTraits>> {
    let store: Arc<dyn ZStorageTraits> = Arc::new(FilesystemStore::new(path.as_ref())?);
    Ok(store)
}

/// Write `adata` into a new zarr directory at `zarr_path`
pub fn write_anndata_zarr(adata: &ExprContainer, zarr_path: impl AsRef<Path>) -> anyhow::Result<()> {
    let zarr_path = zarr_path.as_ref();
    std::fs::create_dir_all(zarr_path)?;
    let store = open_zarr_store(zarr_path)?;

    write_group(&store, "/", encoding("anndata", "0.1.0"))?;

    let n_obs = adata.num_cells();
    write_ndarray(
        &store,
        X_PATH,
        DataType::Float32,
        FillValue::from(0_f32),
        adata.x(),
        [n_obs, VAR_CHUNK_SIZE],
    )?;

    write_group(&store, "/obs", dataframe_encoding())?;
    write_strings(&store, OBS_INDEX_PATH, adata.obs_names())?;

    write_group(&store, "/var", dataframe_encoding())?;
    write_strings(&store, VAR_INDEX_PATH, adata.var_names())?;

    write_group(&store, "/obsm", encoding("dict", "0.1.0"))?;
    for (key, arr) in adata.obsm_iter() {
        let path = format!("/obsm/{}", key);
        match arr {
            ObsmArray::UInt16(x) => write_ndarray(
                &store,
                &path,
                DataType::UInt16,
                FillValue::from(0_u16),
                x,
                [n_obs, x.ncols()],
            )?,
            ObsmArray::Float32(x) => write_ndarray(
                &store,
                &path,
                DataType::Float32,
                FillValue::from(0_f32),
                x,
                [n_obs, x.ncols()],
            )?,
        }
    }

    write_group(&store, "/uns", encoding("dict", "0.1.0"))?;

    info!(
        "Wrote {} x {} (+{} obsm) to {}",
        n_obs,
        adata.num_features(),
        adata.obsm_keys().count(),
        zarr_path.display()
    );
    Ok(())
}

fn write_group(
    store: &Arc<dyn ZStorageTraits>,
    path: &str,
    attrs: Map<String, Value>,
) -> anyhow::Result<()> {
    let group = GroupBuilder::new()
        .attributes(attrs)
        .build(store.clone(), path)?;
    group.store_metadata()?;
    Ok(())
}

/// Dense 2D array with `encoding-type: array`. Chunk sizes are
/// clipped to the array shape (and at least 1).
fn write_ndarray<V>(
    store: &Arc<dyn ZStorageTraits>,
    key: &str,
    dt: DataType,
    fill: FillValue,
    data: &Array2<V>,
    chunk: [usize; 2],
) -> anyhow::Result<()>
where
    V: zarrs::array::Element + Clone,
{
    let (nrow, ncol) = data.dim();
    let array_shape = vec![nrow as u64, ncol as u64];
    let chunk_shape = vec![
        chunk[0].min(nrow).max(1) as u64,
        chunk[1].min(ncol).max(1) as u64,
    ];

    let array = ArrayBuilder::new(array_shape, chunk_shape, dt, fill)
        .attributes(encoding("array", "0.2.0"))
        .build(store.clone(), key)?;
    array.store_metadata()?;

    if !data.is_empty() {
        array.store_array_subset_ndarray(array.subset_all().start(), data.to_owned())?;
    }
    Ok(())
}

fn write_strings(
    store: &Arc<dyn ZStorageTraits>,
    key: &str,
    names: &[Box<str>],
) -> anyhow::Result<()> {
    let nelem = names.len();
    let chunk_size = (nelem / NUM_CHUNKS).max(MIN_CHUNK_SIZE).min(nelem).max(1);

    let array = ArrayBuilder::new(
        vec![nelem as u64],
        vec![chunk_size as u64],
        DataType::String,
        FillValue::from(""),
    )
    .attributes(encoding("string-array", "0.2.0"))
    .build(store.clone(), key)?;
    array.store_metadata()?;

    if nelem > 0 {
        let values: Vec<String> = names.iter().map(|x| x.to_string()).collect();
        array.store_array_subset_elements::<String>(&array.subset_all(), &values)?;
    }
    Ok(())
}

/// Read a 2D numeric array as `f32`
pub fn read_zarr_f32(store: Arc<dyn ZStorageTraits>, key: &str) -> anyhow::Result<Array2<f32>> {
    let arr = ZArray::open(store, key)?;
    if let [nrow, ncol] = arr.shape() {
        if *nrow == 0 || *ncol == 0 {
            return Ok(Array2::zeros((*nrow as usize, *ncol as usize)));
        }
    }
    let subset = arr.subset_all();
    let data = match arr.data_type() {
        DataType::Float32 => arr.retrieve_array_subset_ndarray::<f32>(&subset)?,
        DataType::UInt16 => arr
            .retrieve_array_subset_ndarray::<u16>(&subset)?
            .mapv(|x| x as f32),
        dt => anyhow::bail!("unsupported zarr data type: {:?}", dt),
    };
    Ok(data.into_dimensionality::<Ix2>()?)
}

/// Read a string array
pub fn read_zarr_strings(
    store: Arc<dyn ZStorageTraits>,
    key: &str,
) -> anyhow::Result<Vec<Box<str>>> {
    let arr = ZArray::open(store, key)?;
    if arr.shape().iter().product::<u64>() == 0 {
        return Ok(vec![]);
    }
    Ok(arr
        .retrieve_array_subset_elements::<String>(&arr.subset_all())?
        .into_iter()
        .map(|x| x.into_boxed_str())
        .collect())
}

/// Attributes of an array or a group node
pub fn read_zarr_attrs(
    store: Arc<dyn ZStorageTraits>,
    key: &str,
) -> anyhow::Result<Map<String, Value>> {
    if let Ok(arr) = ZArray::open(store.clone(), key) {
        return Ok(arr.attributes().clone());
    }
    let group = Group::open(store, key)
        .map_err(|e| anyhow::anyhow!("no array or group at '{}': {}", key, e))?;
    Ok(group.attributes().clone())
}
