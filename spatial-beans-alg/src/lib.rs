pub mod normalization;
pub mod preprocess;
pub mod tsne;
