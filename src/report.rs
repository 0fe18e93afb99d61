/// Report persistence: one timestamped file per run under `reports/`.
use crate::data_dir::DataDir;
use chrono::{DateTime, Local};
use std::io::Write;
use std::path::PathBuf;

/// File name format for report files.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Give up finding a free name after this many suffixes.
const MAX_NAME_ATTEMPTS: u32 = 100;

#[derive(Debug, Clone)]
pub struct Report {
    pub created_at: DateTime<Local>,
    pub content: String,
}

impl Report {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            created_at: Local::now(),
            content: content.into(),
        }
    }

    pub fn file_stem(&self) -> String {
        self.created_at.format(TIMESTAMP_FORMAT).to_string()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("failed to create reports directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write report in {}: {source}", dir.display())]
    Write {
        dir: PathBuf,
        source: std::io::Error,
    },
    #[error("no free report file name for {stem} in {}", dir.display())]
    NameExhausted { dir: PathBuf, stem: String },
}

/// Write `report` under the reports directory and return its path.
///
/// Content goes to a temp file in the same directory first and is then
/// linked into place without replacing anything, so a reader never sees a
/// partial report and earlier reports are never overwritten. A name clash
/// within the same second gets a `-1`, `-2`, ... suffix.
pub fn write_report(
    data_dir: &DataDir,
    report: &Report,
    extension: &str,
) -> Result<PathBuf, ReportError> {
    let dir = data_dir.reports_dir();
    std::fs::create_dir_all(&dir).map_err(|e| ReportError::CreateDir {
        path: dir.clone(),
        source: e,
    })?;

    let write_err = |e: std::io::Error| ReportError::Write {
        dir: dir.clone(),
        source: e,
    };
    let mut tmp = tempfile::Builder::new()
        .prefix(".report-")
        .tempfile_in(&dir)
        .map_err(write_err)?;
    tmp.write_all(report.content.as_bytes()).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;

    let stem = report.file_stem();
    for attempt in 0..MAX_NAME_ATTEMPTS {
        let name = if attempt == 0 {
            stem.clone()
        } else {
            format!("{stem}-{attempt}")
        };
        let path = data_dir.report_file(&name, extension);
        match tmp.persist_noclobber(&path) {
            Ok(_) => {
                tracing::info!(
                    path = %path.display(),
                    bytes = report.content.len(),
                    "report written"
                );
                return Ok(path);
            }
            Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
                tracing::debug!(path = %path.display(), "report name taken");
                tmp = e.file;
            }
            Err(e) => return Err(write_err(e.error)),
        }
    }
    Err(ReportError::NameExhausted { dir, stem })
}
