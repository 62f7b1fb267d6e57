use crate::common_io::{open_buf_reader, Delimiter};
use log::info;
use ndarray::Array2;
use std::fmt::Debug;
use std::path::Path;
use std::str::FromStr;

/// A delimited text table keyed by its first column
///
/// ```text
/// <index>, col_0, col_1, ..., col_{m-1}
/// row_0,   v,     v,     ..., v
/// ...
/// ```
///
/// * `rows` - values of the first (identifier) column
/// * `cols` - header names after the identifier column
/// * `cells` - row-major text values, `rows.len()` x `cols.len()`
#[derive(Clone, Debug)]
pub struct DelimTable {
    pub rows: Vec<Box<str>>,
    pub cols: Vec<Box<str>>,
    cells: Vec<Box<str>>,
}

impl DelimTable {
    /// Read a table with a header line. The first column is the row
    /// identifier. Gzipped files are decompressed on the fly.
    ///
    /// * `file` - file path
    /// * `delim` - field delimiter
    pub fn read_file_delim(
        file: impl AsRef<Path>,
        delim: impl Into<Delimiter>,
    ) -> anyhow::Result<Self> {
        let file = file.as_ref();
        let delim: Delimiter = delim.into();

        let buf = open_buf_reader(file)?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .delimiter(delim.as_byte())
            .from_reader(buf);

        let header = reader.headers()?.clone();
        if header.is_empty() {
            anyhow::bail!("empty header in {}", file.display());
        }

        // the first header field names the index (often empty)
        let cols: Vec<Box<str>> = header.iter().skip(1).map(|x| x.trim().into()).collect();
        let ncols = cols.len();

        let mut rows = vec![];
        let mut cells = vec![];

        for (i, record) in reader.records().enumerate() {
            let record = record
                .map_err(|e| anyhow::anyhow!("{}: line {}: {}", file.display(), i + 2, e))?;
            let mut fields = record.iter();
            let id = fields
                .next()
                .ok_or_else(|| anyhow::anyhow!("{}: empty line {}", file.display(), i + 2))?;
            rows.push(id.trim().into());
            cells.extend(fields.map(|x| x.trim().to_string().into_boxed_str()));
        }

        info!(
            "Read {} x {} table from {}",
            rows.len(),
            ncols,
            file.display()
        );

        Ok(Self { rows, cols, cells })
    }

    /// Read a comma-separated table
    pub fn from_csv(file: impl AsRef<Path>) -> anyhow::Result<Self> {
        Self::read_file_delim(file, Delimiter::Comma)
    }

    pub fn from_parts(
        rows: Vec<Box<str>>,
        cols: Vec<Box<str>>,
        cells: Vec<Box<str>>,
    ) -> anyhow::Result<Self> {
        anyhow::ensure!(
            rows.len() * cols.len() == cells.len(),
            "{} cells can't fill {} x {}",
            cells.len(),
            rows.len(),
            cols.len()
        );
        Ok(Self { rows, cols, cells })
    }

    pub fn nrows(&self) -> usize {
        self.rows.len()
    }

    pub fn ncols(&self) -> usize {
        self.cols.len()
    }

    pub fn get(&self, i: usize, j: usize) -> Option<&str> {
        if i < self.nrows() && j < self.ncols() {
            Some(self.cells[i * self.ncols() + j].as_ref())
        } else {
            None
        }
    }

    /// Parse the selected columns into a dense `rows x columns.len()`
    /// array. Empty cells are read as `"NaN"`.
    ///
    /// * `columns` - column positions (excluding the identifier column)
    pub fn select_columns_ndarray<T>(&self, columns: &[usize]) -> anyhow::Result<Array2<T>>
    where
        T: FromStr,
        <T as FromStr>::Err: Debug,
    {
        let nrows = self.nrows();
        let ncols = self.ncols();

        if let Some(&bad) = columns.iter().find(|&&j| j >= ncols) {
            anyhow::bail!("column index {} out of range ({} columns)", bad, ncols);
        }

        let mut data = Vec::with_capacity(nrows * columns.len());
        for i in 0..nrows {
            for &j in columns {
                let word = self.cells[i * ncols + j].as_ref();
                let word = if word.is_empty() { "NaN" } else { word };
                let v = word.parse::<T>().map_err(|e| {
                    anyhow::anyhow!(
                        "failed to parse '{}' at row '{}' column '{}': {:?}",
                        word,
                        self.rows[i],
                        self.cols[j],
                        e
                    )
                })?;
                data.push(v);
            }
        }

        Ok(Array2::from_shape_vec((nrows, columns.len()), data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_and_get() -> anyhow::Result<()> {
        let table = DelimTable::from_parts(
            vec!["c1".into(), "c2".into()],
            vec!["a".into(), "b".into()],
            vec!["1".into(), "".into(), "3.5".into(), "4".into()],
        )?;
        assert_eq!(table.get(1, 0), Some("3.5"));
        assert_eq!(table.get(2, 0), None);

        let x = table.select_columns_ndarray::<f32>(&[1, 0])?;
        assert_eq!(x.dim(), (2, 2));
        assert!(x[[0, 0]].is_nan());
        assert_eq!(x[[1, 1]], 3.5);

        assert!(table.select_columns_ndarray::<f32>(&[2]).is_err());
        Ok(())
    }

    #[test]
    fn mismatched_parts() {
        let ret = DelimTable::from_parts(vec!["c1".into()], vec!["a".into()], vec![]);
        assert!(ret.is_err());
    }
}
