pub mod common_io; // file and directory helpers
pub mod knn_match; // HNSW nearest neighbours over rows
pub mod ndarray_util; // row normalization and sampling on `ndarray`
pub mod table_io; // delimited tables keyed by the first column
pub mod traits;
