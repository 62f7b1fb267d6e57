use crate::common::*;
use crate::config::ZARR_NAME;
use crate::credentials::AwsCredentials;
use crate::export::ExportArtifact;
use indicatif::{ProgressBar, ProgressStyle};
use walkdir::WalkDir;

/// Destination of uploaded objects
pub trait ObjectSink {
    fn put_object(&self, key: &str, body: &[u8], content_type: &str) -> anyhow::Result<()>;
}

/// S3 bucket through the blocking `rust-s3` client
pub struct S3Sink {
    bucket: Box<s3::Bucket>,
}

impl S3Sink {
    pub fn new(bucket: &str, region: &str, creds: &AwsCredentials) -> anyhow::Result<Self> {
        let region: s3::Region = region
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid region {}: {:?}", region, e))?;
        let credentials = s3::creds::Credentials::new(
            Some(&*creds.access_key_id),
            Some(&*creds.secret_access_key),
            None,
            None,
            None,
        )?;
        let bucket = s3::Bucket::new(bucket, region, credentials)?;
        Ok(Self { bucket })
    }
}

impl ObjectSink for S3Sink {
    fn put_object(&self, key: &str, body: &[u8], content_type: &str) -> anyhow::Result<()> {
        let resp = self
            .bucket
            .put_object_with_content_type(key, body, content_type)
            .with_context(|| format!("PUT s3://{}/{}", self.bucket.name(), key))?;
        let status = resp.status_code();
        anyhow::ensure!(
            (200..300).contains(&status),
            "PUT s3://{}/{} returned status {}",
            self.bucket.name(),
            key,
            status
        );
        Ok(())
    }
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|x| x.to_str()) {
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}

/// `a/b/c` regardless of the platform separator
fn object_key(prefix: &str, rel: &Path) -> anyhow::Result<String> {
    let mut key = prefix.trim_end_matches('/').to_string();
    for comp in rel.components() {
        let comp = comp
            .as_os_str()
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("non-utf8 path: {}", rel.display()))?;
        key.push('/');
        key.push_str(comp);
    }
    Ok(key)
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UploadSummary {
    pub objects: usize,
    pub bytes: usize,
}

/// Upload the zarr store under `{area}/anndata.zarr/` and then the
/// manifest at `{area}/{manifest name}`.
pub fn upload_artifact(
    sink: &dyn ObjectSink,
    artifact: &ExportArtifact,
) -> anyhow::Result<UploadSummary> {
    let zarr_prefix = format!("{}/{}", artifact.area, ZARR_NAME);

    let mut files = vec![];
    for entry in WalkDir::new(&artifact.zarr_dir).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }

    let pb = ProgressBar::new(files.len() as u64);
    if let Ok(style) = ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(artifact.area.to_string());

    let mut summary = UploadSummary::default();
    for path in files.iter() {
        let rel = path.strip_prefix(&artifact.zarr_dir)?;
        let key = object_key(&zarr_prefix, rel)?;
        let body = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        sink.put_object(&key, &body, content_type(path))?;
        summary.objects += 1;
        summary.bytes += body.len();
        pb.inc(1);
    }
    pb.finish_and_clear();

    let manifest_key = format!("{}/{}", artifact.area, artifact.manifest_name()?);
    let body = std::fs::read(&artifact.manifest_path)
        .with_context(|| format!("reading {}", artifact.manifest_path.display()))?;
    sink.put_object(&manifest_key, &body, "application/json")?;
    summary.objects += 1;
    summary.bytes += body.len();

    info!(
        "uploaded {} objects ({} bytes) under {}/",
        summary.objects, summary.bytes, artifact.area
    );
    Ok(summary)
}
