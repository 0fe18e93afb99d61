use std::path::{Path, PathBuf};

/// Manages the `data/` directory layout.
///
/// The agent runs with `data/` as its working directory so it can read
/// earlier reports; finished reports land in `data/reports/`.
#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    /// Create a new DataDir referencing the given root path.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory (e.g. `data/`).
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to the reports directory.
    pub fn reports_dir(&self) -> PathBuf {
        self.root.join("reports")
    }

    /// Path to a report file, e.g. `reports/2025-01-31_09-15-00.md`.
    pub fn report_file(&self, stem: &str, extension: &str) -> PathBuf {
        self.reports_dir().join(format!("{stem}.{extension}"))
    }

    /// Create the root directory if missing.
    /// Returns Ok(true) if it was created, Ok(false) if it already existed.
    ///
    /// The reports directory is left alone; it is created on first write.
    pub fn init(&self) -> std::io::Result<bool> {
        let created = !self.root.exists();
        std::fs::create_dir_all(&self.root)?;
        Ok(created)
    }
}
