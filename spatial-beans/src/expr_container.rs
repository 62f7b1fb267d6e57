use log::info;
use matrix_util::table_io::DelimTable;
use ndarray::Array2;
use std::collections::BTreeMap;

/// Key of the spatial centroid embedding
pub const SPATIAL_KEY: &str = "X_spatial";

/// Leading metadata columns of an input table: an identifier-like
/// column followed by the x and y nucleus coordinates
pub const NUM_META_COLUMNS: usize = 3;

/// Positions of the x and y coordinates among the table columns
pub const COORD_COLUMNS: [usize; 2] = [1, 2];

/// A 2D per-cell array stored under `obsm`
#[derive(Clone, Debug, PartialEq)]
pub enum ObsmArray {
    UInt16(Array2<u16>),
    Float32(Array2<f32>),
}

impl ObsmArray {
    pub fn dim(&self) -> (usize, usize) {
        match self {
            ObsmArray::UInt16(x) => x.dim(),
            ObsmArray::Float32(x) => x.dim(),
        }
    }

    pub fn nrows(&self) -> usize {
        self.dim().0
    }
}

impl From<Array2<u16>> for ObsmArray {
    fn from(x: Array2<u16>) -> Self {
        ObsmArray::UInt16(x)
    }
}

impl From<Array2<f32>> for ObsmArray {
    fn from(x: Array2<f32>) -> Self {
        ObsmArray::Float32(x)
    }
}

/// Cells x features expression data with per-cell embeddings
///
/// ```text
/// X     : n_obs x n_vars (f32)
/// obs   : cell names (index only)
/// var   : feature names (index only)
/// obsm  : name -> n_obs x k
/// ```
///
#[derive(Clone, Debug)]
pub struct ExprContainer {
    x: Array2<f32>,
    obs_names: Vec<Box<str>>,
    var_names: Vec<Box<str>>,
    obsm: BTreeMap<Box<str>, ObsmArray>,
}

impl ExprContainer {
    pub fn new(
        x: Array2<f32>,
        obs_names: Vec<Box<str>>,
        var_names: Vec<Box<str>>,
    ) -> anyhow::Result<Self> {
        anyhow::ensure!(
            x.nrows() == obs_names.len(),
            "{} rows but {} cell names",
            x.nrows(),
            obs_names.len()
        );
        anyhow::ensure!(
            x.ncols() == var_names.len(),
            "{} columns but {} feature names",
            x.ncols(),
            var_names.len()
        );
        Ok(Self {
            x,
            obs_names,
            var_names,
            obsm: BTreeMap::new(),
        })
    }

    /// Split a loaded table into expression and spatial parts.
    ///
    /// * columns `3..` become `X`
    /// * columns `1` and `2` become `obsm["X_spatial"]` as `u16`
    ///
    /// With exactly three columns `X` has no features.
    pub fn from_table(table: &DelimTable) -> anyhow::Result<Self> {
        let ncols = table.ncols();
        anyhow::ensure!(
            ncols >= NUM_META_COLUMNS,
            "need at least {} columns (id, x, y), found {}",
            NUM_META_COLUMNS,
            ncols
        );

        let features: Vec<usize> = (NUM_META_COLUMNS..ncols).collect();
        let x = table.select_columns_ndarray::<f32>(&features)?;

        // truncate toward zero and saturate, as an unsigned pixel grid
        let spatial = table
            .select_columns_ndarray::<f32>(&COORD_COLUMNS)?
            .mapv(|v| v as u16);

        let var_names = table.cols[NUM_META_COLUMNS..].to_vec();
        let mut ret = Self::new(x, table.rows.clone(), var_names)?;
        ret.add_obsm(SPATIAL_KEY, spatial)?;

        info!(
            "Built {} cells x {} features, spatial from '{}', '{}'",
            ret.num_cells(),
            ret.num_features(),
            table.cols[COORD_COLUMNS[0]],
            table.cols[COORD_COLUMNS[1]]
        );
        Ok(ret)
    }

    pub fn num_cells(&self) -> usize {
        self.x.nrows()
    }

    pub fn num_features(&self) -> usize {
        self.x.ncols()
    }

    pub fn x(&self) -> &Array2<f32> {
        &self.x
    }

    pub fn x_mut(&mut self) -> &mut Array2<f32> {
        &mut self.x
    }

    pub fn obs_names(&self) -> &[Box<str>] {
        &self.obs_names
    }

    pub fn var_names(&self) -> &[Box<str>] {
        &self.var_names
    }

    /// Register (or replace) a per-cell embedding
    pub fn add_obsm(&mut self, key: &str, arr: impl Into<ObsmArray>) -> anyhow::Result<()> {
        let arr = arr.into();
        anyhow::ensure!(
            arr.nrows() == self.num_cells(),
            "obsm '{}' has {} rows, expected {}",
            key,
            arr.nrows(),
            self.num_cells()
        );
        self.obsm.insert(key.into(), arr);
        Ok(())
    }

    pub fn obsm(&self, key: &str) -> Option<&ObsmArray> {
        self.obsm.get(key)
    }

    pub fn obsm_keys(&self) -> impl Iterator<Item = &str> {
        self.obsm.keys().map(|k| k.as_ref())
    }

    pub fn obsm_iter(&self) -> impl Iterator<Item = (&str, &ObsmArray)> {
        self.obsm.iter().map(|(k, v)| (k.as_ref(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(ncols: usize, nrows: usize) -> DelimTable {
        let mut cols: Vec<Box<str>> = vec!["label".into(), "nucleus_x".into(), "nucleus_y".into()];
        cols.extend((3..ncols).map(|j| format!("g{}", j).into_boxed_str()));
        cols.truncate(ncols);

        let rows: Vec<Box<str>> = (0..nrows).map(|i| format!("cell{}", i).into()).collect();
        let mut cells = vec![];
        for i in 0..nrows {
            for j in 0..ncols {
                let v = match j {
                    0 => "ex".to_string(),
                    1 => format!("{}.7", 100 + i),
                    2 => format!("{}", 200 + i),
                    _ => format!("{}", i * j),
                };
                cells.push(v.into_boxed_str());
            }
        }
        DelimTable::from_parts(rows, cols, cells).unwrap()
    }

    #[test]
    fn shapes_follow_table() {
        for ncols in [4, 5, 12] {
            let adata = ExprContainer::from_table(&table(ncols, 7)).unwrap();
            assert_eq!(adata.num_cells(), 7);
            assert_eq!(adata.num_features(), ncols - 3);
            assert_eq!(adata.obsm(SPATIAL_KEY).unwrap().dim(), (7, 2));
        }
    }

    #[test]
    fn coordinates_from_columns_one_and_two() {
        for ncols in [4, 9] {
            let adata = ExprContainer::from_table(&table(ncols, 3)).unwrap();
            let Some(ObsmArray::UInt16(xy)) = adata.obsm(SPATIAL_KEY) else {
                panic!("spatial should be u16");
            };
            assert_eq!(xy[[2, 0]], 102);
            assert_eq!(xy[[2, 1]], 202);
        }
    }

    #[test]
    fn three_columns_leave_empty_matrix() {
        let adata = ExprContainer::from_table(&table(3, 4)).unwrap();
        assert_eq!(adata.x().dim(), (4, 0));
    }

    #[test]
    fn too_few_columns_fail() {
        assert!(ExprContainer::from_table(&table(2, 4)).is_err());
    }

    #[test]
    fn obsm_rows_must_match() {
        let mut adata = ExprContainer::from_table(&table(5, 4)).unwrap();
        assert!(adata.add_obsm("bad", Array2::<f32>::zeros((3, 2))).is_err());
        assert!(adata.add_obsm("ok", Array2::<f32>::zeros((4, 2))).is_ok());
        let keys: Vec<&str> = adata.obsm_keys().collect();
        assert_eq!(keys, vec![SPATIAL_KEY, "ok"]);
    }
}
