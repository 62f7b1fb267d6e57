mod batch;
mod common;
mod config;
mod credentials;
mod export;
mod run_pipeline;
mod upload;
mod vitessce_config;

use crate::common::*;
use run_pipeline::*;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "LENTIL",
    long_about = "Turn spatial cell-by-feature tables into Vitessce bundles.\n\
		  Each table is normalized, log-transformed and embedded by t-SNE,\n\
		  then exported as an AnnData zarr store with a view config.",
    term_width = 80
)]
struct Cli {
    #[command(subcommand)]
    commands: Commands,

    /// verbosity
    #[arg(
        long,
        short,
        global = true,
        help = "verbosity",
        long_help = "Enable verbose output `RUST_LOG=info`"
    )]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Export every table and upload it to S3",
        long_about = "Export every table under `{output_root}/{area}` and upload\n\
		      the zarr store and view config to `s3://{bucket}/{area}/`.\n\
		      Reads AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY.\n",
        visible_alias = "run"
    )]
    Upload(UploadArgs),

    /// Export every table for a local web server
    ExportLocal(ExportLocalArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    match &cli.commands {
        Commands::Upload(args) => {
            run_upload(args)?;
        }
        Commands::ExportLocal(args) => {
            run_export_local(args)?;
        }
    }

    Ok(())
}
