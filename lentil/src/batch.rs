use crate::common::*;

/// Which entries of the sorted directory listing to leave out
#[derive(Clone, Debug, Default)]
pub struct SkipPolicy {
    /// drop this many entries from the front
    pub leading: usize,
    /// drop entries with these exact file names
    pub names: Vec<Box<str>>,
}

impl SkipPolicy {
    pub fn select(&self, listing: &[Box<str>]) -> Vec<Box<str>> {
        listing
            .iter()
            .skip(self.leading)
            .filter(|f| !self.names.contains(*f))
            .cloned()
            .collect()
    }
}

/// Area of an input file: the file name without `.gz` and extension,
/// e.g., `A1.csv.gz` -> `A1`
pub fn area_name(file: &str) -> anyhow::Result<Box<str>> {
    let name = Path::new(file)
        .file_name()
        .and_then(|x| x.to_str())
        .ok_or_else(|| anyhow::anyhow!("no file name: {}", file))?;
    let name = name.strip_suffix(".gz").unwrap_or(name);
    let area = io::basename(name)?;
    anyhow::ensure!(!area.is_empty(), "empty area name for {}", file);
    Ok(area)
}

#[derive(Clone, Debug)]
pub enum FileOutcome {
    Done { file: Box<str>, url: Box<str> },
    Failed { file: Box<str>, reason: Box<str> },
}

#[derive(Clone, Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<FileOutcome>,
}

impl BatchReport {
    pub fn num_done(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|x| matches!(x, FileOutcome::Done { .. }))
            .count()
    }

    pub fn failed(&self) -> impl Iterator<Item = (&str, &str)> {
        self.outcomes.iter().filter_map(|x| match x {
            FileOutcome::Failed { file, reason } => Some((file.as_ref(), reason.as_ref())),
            _ => None,
        })
    }

    /// `(file, url)` of every processed file
    pub fn done(&self) -> impl Iterator<Item = (&str, &str)> {
        self.outcomes.iter().filter_map(|x| match x {
            FileOutcome::Done { file, url } => Some((file.as_ref(), url.as_ref())),
            _ => None,
        })
    }

    pub fn is_success(&self) -> bool {
        self.failed().next().is_none()
    }

    pub fn log_summary(&self) {
        info!(
            "{} of {} file(s) processed",
            self.num_done(),
            self.outcomes.len()
        );
        for (file, url) in self.done() {
            info!("{}: {}", file, url);
        }
        for (file, reason) in self.failed() {
            warn!("{}: {}", file, reason);
        }
    }
}

/// Run `process` over `files` in order. A failure is recorded and the
/// batch goes on, unless `fail_fast` is set, in which case the first
/// error is returned.
pub fn run_batch<F>(files: &[Box<str>], fail_fast: bool, mut process: F) -> anyhow::Result<BatchReport>
where
    F: FnMut(&str) -> anyhow::Result<Box<str>>,
{
    let mut report = BatchReport::default();
    for file in files {
        info!("processing {}", file);
        match process(file) {
            Ok(url) => report.outcomes.push(FileOutcome::Done {
                file: file.clone(),
                url,
            }),
            Err(e) if fail_fast => return Err(e.context(format!("failed on {}", file))),
            Err(e) => {
                warn!("{} failed: {:#}", file, e);
                report.outcomes.push(FileOutcome::Failed {
                    file: file.clone(),
                    reason: format!("{:#}", e).into(),
                });
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(xs: &[&str]) -> Vec<Box<str>> {
        xs.iter().map(|&x| x.into()).collect()
    }

    #[test]
    fn skip_first_three() {
        let policy = SkipPolicy {
            leading: 3,
            ..Default::default()
        };
        let listing = names(&["a.csv", "b.csv", "c.csv", "d.csv", "e.csv"]);
        assert_eq!(policy.select(&listing), names(&["d.csv", "e.csv"]));
    }

    #[test]
    fn skip_by_name() {
        let policy = SkipPolicy {
            leading: 0,
            names: names(&["b.csv"]),
        };
        let listing = names(&["a.csv", "b.csv", "c.csv"]);
        assert_eq!(policy.select(&listing), names(&["a.csv", "c.csv"]));
        assert_eq!(SkipPolicy::default().select(&listing), listing);
    }

    #[test]
    fn area_from_file_name() {
        assert_eq!(&*area_name("A1.csv").unwrap(), "A1");
        assert_eq!(&*area_name("dir/PFC_B2.tsv.gz").unwrap(), "PFC_B2");
        assert_eq!(&*area_name("V1").unwrap(), "V1");
    }

    #[test]
    fn failures_are_isolated() {
        let files = names(&["a.csv", "bad.csv", "c.csv"]);
        let process = |f: &str| -> anyhow::Result<Box<str>> {
            anyhow::ensure!(f != "bad.csv", "cannot parse");
            Ok(format!("url/{}", f).into())
        };

        let report = run_batch(&files, false, process).unwrap();
        assert_eq!(report.num_done(), 2);
        let done: Vec<_> = report.done().collect();
        assert_eq!(done, vec![("a.csv", "url/a.csv"), ("c.csv", "url/c.csv")]);
        assert!(!report.is_success());
        let failed: Vec<_> = report.failed().collect();
        assert_eq!(failed, vec![("bad.csv", "cannot parse")]);
    }

    #[test]
    fn fail_fast_stops() {
        let files = names(&["a.csv", "bad.csv", "c.csv"]);
        let mut seen = vec![];
        let result = run_batch(&files, true, |f| {
            seen.push(f.to_string());
            anyhow::ensure!(f != "bad.csv", "cannot parse");
            Ok(f.into())
        });
        assert!(result.is_err());
        assert_eq!(seen, vec!["a.csv", "bad.csv"]);
    }
}
