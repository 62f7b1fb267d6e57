#![allow(unused)]

pub use matrix_util::common_io as io;
pub use matrix_util::table_io::DelimTable;

pub use spatial_beans::expr_container::{ExprContainer, SPATIAL_KEY};
pub use spatial_beans_alg::preprocess::{preprocess, PreprocessParams, TSNE_KEY};
pub use spatial_beans_alg::tsne::TSne;

pub use clap::{Args, Parser, Subcommand};
pub use env_logger;

pub use anyhow::Context;
pub use log::{info, warn};
pub use std::path::{Path, PathBuf};
