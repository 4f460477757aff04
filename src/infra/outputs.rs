//! Directory the generator writes finished stereograms into.

use std::path::{Path, PathBuf};

/// Absolute output directory plus the URL segment it is served under.
#[derive(Debug, Clone)]
pub struct OutputDirectory {
    directory: PathBuf,
    public_path: String,
}

impl OutputDirectory {
    /// Create the directory if needed and resolve it to an absolute path.
    pub fn new(
        directory: impl Into<PathBuf>,
        public_path: impl Into<String>,
    ) -> Result<Self, std::io::Error> {
        let directory = directory.into();
        std::fs::create_dir_all(&directory)?;
        Ok(Self {
            directory: directory.canonicalize()?,
            public_path: public_path.into().trim_matches('/').to_string(),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn public_path(&self) -> &str {
        &self.public_path
    }

    /// Path of a generated file; `None` for anything but a plain, non-hidden file name.
    pub fn resolve(&self, file_name: &str) -> Option<PathBuf> {
        let valid = !file_name.is_empty()
            && !file_name.starts_with('.')
            && !file_name.contains(['/', '\\', '\0']);
        valid.then(|| self.directory.join(file_name))
    }
}
