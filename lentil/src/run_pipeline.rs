use crate::batch::*;
use crate::common::*;
use crate::config::*;
use crate::credentials::{CredentialSource, EnvCredentials};
use crate::export::export_local;
use crate::upload::{upload_artifact, ObjectSink, S3Sink};
use crate::vitessce_config::build_vitessce_config;
use matrix_util::common_io::Delimiter;

#[derive(Args, Debug)]
pub struct BatchArgs {
    /// directory of cell-by-feature tables (`.csv`, `.tsv`, optionally gzipped)
    #[arg(short, long, default_value = DEFAULT_INPUT_DIR)]
    input_dir: Box<str>,

    /// root of the local export; each table gets `{output_root}/{area}`
    #[arg(short, long, default_value = DEFAULT_OUTPUT_ROOT)]
    output_root: Box<str>,

    /// title shown in the viewer
    #[arg(long, default_value = DEFAULT_TITLE)]
    title: Box<str>,

    /// skip the first N files of the sorted listing
    #[arg(long, default_value_t = 0)]
    skip_leading: usize,

    /// skip these files (comma-separated names)
    #[arg(long, value_delimiter(','))]
    skip: Vec<Box<str>>,

    /// stop at the first failing file
    #[arg(long, default_value_t = false)]
    fail_fast: bool,

    /// target total per cell (default: median of cell totals)
    #[arg(long)]
    target_sum: Option<f32>,

    /// t-SNE perplexity
    #[arg(long, default_value_t = 30.0)]
    perplexity: f32,

    /// t-SNE iterations
    #[arg(long, default_value_t = 1000)]
    tsne_iter: usize,

    /// t-SNE learning rate
    #[arg(long, default_value_t = 1000.0)]
    learning_rate: f32,

    /// random seed for the t-SNE initialization
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Args, Debug)]
pub struct UploadArgs {
    #[command(flatten)]
    batch: BatchArgs,

    /// S3 bucket
    #[arg(short, long, default_value = DEFAULT_BUCKET)]
    bucket: Box<str>,

    /// S3 region
    #[arg(long, env = "AWS_DEFAULT_REGION", default_value = DEFAULT_REGION)]
    region: Box<str>,
}

#[derive(Args, Debug)]
pub struct ExportLocalArgs {
    #[command(flatten)]
    batch: BatchArgs,

    /// URL that will serve `output_root`
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: Box<str>,
}

impl BatchArgs {
    fn to_config(&self, destination: Destination) -> PipelineConfig {
        PipelineConfig {
            input_dir: self.input_dir.as_ref().into(),
            output_root: self.output_root.as_ref().into(),
            title: self.title.clone(),
            destination,
            preprocess: PreprocessParams {
                target_sum: self.target_sum,
                tsne: TSne::default()
                    .perplexity(self.perplexity)
                    .n_iter(self.tsne_iter)
                    .learning_rate(self.learning_rate)
                    .seed(self.seed),
            },
        }
    }

    fn skip_policy(&self) -> SkipPolicy {
        SkipPolicy {
            leading: self.skip_leading,
            names: self.skip.clone(),
        }
    }
}

/// Export every table and upload it to S3
pub fn run_upload(args: &UploadArgs) -> anyhow::Result<()> {
    upload_with(args, &EnvCredentials::default())
}

/// Credentials are resolved before any table is touched
pub fn upload_with(args: &UploadArgs, source: &dyn CredentialSource) -> anyhow::Result<()> {
    let creds = source.credentials()?;

    let config = args.batch.to_config(Destination::S3 {
        bucket: args.bucket.clone(),
        region: args.region.clone(),
    });
    let sink = S3Sink::new(&args.bucket, &args.region, &creds)?;

    let report = run_pipeline(
        &config,
        &args.batch.skip_policy(),
        args.batch.fail_fast,
        Some(&sink),
    )?;
    check_report(&report)
}

/// Export every table for a local web server
pub fn run_export_local(args: &ExportLocalArgs) -> anyhow::Result<()> {
    let config = args.batch.to_config(Destination::Local {
        base_url: args.base_url.clone(),
    });

    let report = run_pipeline(
        &config,
        &args.batch.skip_policy(),
        args.batch.fail_fast,
        None,
    )?;
    check_report(&report)
}

fn check_report(report: &BatchReport) -> anyhow::Result<()> {
    let nfailed = report.failed().count();
    anyhow::ensure!(nfailed == 0, "{} file(s) failed", nfailed);
    Ok(())
}

/// Process the selected tables of `config.input_dir` one by one
pub fn run_pipeline(
    config: &PipelineConfig,
    policy: &SkipPolicy,
    fail_fast: bool,
    sink: Option<&dyn ObjectSink>,
) -> anyhow::Result<BatchReport> {
    let listing = io::list_files(&config.input_dir)?;
    let files = policy.select(&listing);
    info!(
        "{} of {} file(s) in {} selected",
        files.len(),
        listing.len(),
        config.input_dir.display()
    );

    let report = run_batch(&files, fail_fast, |file| process_file(config, file, sink))?;
    report.log_summary();
    Ok(report)
}

/// Load, preprocess, export and (optionally) upload one table. Returns
/// the viewer URL, which is also printed.
pub fn process_file(
    config: &PipelineConfig,
    file: &str,
    sink: Option<&dyn ObjectSink>,
) -> anyhow::Result<Box<str>> {
    let area = area_name(file)?;
    let path = config.input_dir.join(file);

    let table = DelimTable::read_file_delim(&path, Delimiter::from_file_name(file))
        .with_context(|| format!("loading {}", path.display()))?;
    let mut adata = ExprContainer::from_table(&table)?;

    preprocess(&mut adata, &config.preprocess)?;

    let vc = build_vitessce_config(config, &area);
    let artifact = export_local(&adata, &vc, config, &area)?;

    if let Some(sink) = sink {
        upload_artifact(sink, &artifact)?;
    }

    let url = config.vitessce_url(&area);
    println!("{}", url);
    Ok(url.into())
}
