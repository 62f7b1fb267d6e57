pub mod expr_container; // cells x features matrix with named embeddings
pub mod zarr_io; // AnnData-style zarr store
