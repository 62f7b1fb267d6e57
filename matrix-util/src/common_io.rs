use flate2::read::GzDecoder;
use std::ffi::OsStr;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tempfile::tempdir;

/// Field delimiter of a text table
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delimiter {
    Comma,
    Tab,
}

impl Delimiter {
    /// Guess from the file name: `.tsv` and `.tsv.gz` are tab-separated,
    /// everything else is comma-separated.
    pub fn from_file_name(file: &str) -> Self {
        let stripped = file.strip_suffix(".gz").unwrap_or(file);
        match extension(stripped).as_deref() {
            Ok("tsv") => Delimiter::Tab,
            _ => Delimiter::Comma,
        }
    }

    pub fn as_byte(&self) -> u8 {
        match self {
            Delimiter::Comma => b',',
            Delimiter::Tab => b'\t',
        }
    }
}

impl From<u8> for Delimiter {
    fn from(b: u8) -> Self {
        if b == b'\t' {
            Delimiter::Tab
        } else {
            Delimiter::Comma
        }
    }
}

///
/// Open a file for reading, and return a buffered reader
/// * `input_file` - file name--either gzipped or not
pub fn open_buf_reader(input_file: impl AsRef<Path>) -> anyhow::Result<Box<dyn BufRead>> {
    let input_file = input_file.as_ref();
    let ext = input_file.extension().and_then(|x| x.to_str());
    let file = File::open(input_file)
        .map_err(|e| anyhow::anyhow!("failed to open {}: {}", input_file.display(), e))?;
    match ext {
        Some("gz") => Ok(Box::new(BufReader::new(GzDecoder::new(file)))),
        _ => Ok(Box::new(BufReader::new(file))),
    }
}

///
/// Open a file for writing, and return a buffered writer
/// * `output_file` - file name--either gzipped or not
pub fn open_buf_writer(output_file: impl AsRef<Path>) -> anyhow::Result<Box<dyn std::io::Write>> {
    let output_file = output_file.as_ref();
    let ext = output_file.extension().and_then(|x| x.to_str());
    let file = File::create(output_file)
        .map_err(|e| anyhow::anyhow!("failed to create {}: {}", output_file.display(), e))?;
    match ext {
        Some("gz") => {
            let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
            Ok(Box::new(BufWriter::new(encoder)))
        }
        _ => Ok(Box::new(BufWriter::new(file))),
    }
}

///
/// Create a fresh directory. Parents are created as needed, but the
/// directory itself must not exist yet.
///
pub fn create_new_dir(dir: impl AsRef<Path>) -> anyhow::Result<PathBuf> {
    let dir = dir.as_ref();
    if let Some(parent) = dir.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::create_dir(dir).map_err(|e| {
        if e.kind() == std::io::ErrorKind::AlreadyExists {
            anyhow::anyhow!("directory {} already exists", dir.display())
        } else {
            anyhow::anyhow!("failed to create {}: {}", dir.display(), e)
        }
    })?;
    Ok(dir.to_path_buf())
}

///
/// List regular, non-hidden files in a directory, sorted by name
/// * `dir` - directory to scan
///
pub fn list_files(dir: impl AsRef<Path>) -> anyhow::Result<Vec<Box<str>>> {
    let dir = dir.as_ref();
    let mut ret = vec![];
    let entries = std::fs::read_dir(dir)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {}", dir.display(), e))?;
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_boxed_str()?;
        if name.starts_with('.') {
            continue;
        }
        ret.push(name);
    }
    ret.sort();
    Ok(ret)
}

trait ToBoxedStr {
    fn to_boxed_str(&self) -> anyhow::Result<Box<str>>;
}

impl ToBoxedStr for OsStr {
    fn to_boxed_str(&self) -> anyhow::Result<Box<str>> {
        self.to_str()
            .map(|x| x.to_string().into_boxed_str())
            .ok_or_else(|| anyhow::anyhow!("non-utf8 path: {:?}", self))
    }
}

///
/// Take the basename of a file
/// * `file` - file name
///
pub fn basename(file: &str) -> anyhow::Result<Box<str>> {
    match Path::new(file).file_stem() {
        Some(base) => base.to_boxed_str(),
        None => Err(anyhow::anyhow!("no file stem: {}", file)),
    }
}

///
/// Take the extension of a file
/// * `file` - file name
///
pub fn extension(file: &str) -> anyhow::Result<Box<str>> {
    match Path::new(file).extension() {
        Some(ext) => ext.to_boxed_str(),
        None => Err(anyhow::anyhow!("failed to extract extension")),
    }
}

///
/// Create a temporary directory and suggest a file name
/// * `suffix` - suffix of the file name
///
pub fn create_temp_dir_file(suffix: &str) -> anyhow::Result<PathBuf> {
    let temp_dir = tempdir()?.path().to_path_buf();
    std::fs::create_dir_all(&temp_dir)?;
    let temp_file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile_in(temp_dir)?
        .path()
        .to_owned();

    Ok(temp_file)
}
