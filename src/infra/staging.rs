//! Staging directory for uploaded depth maps and patterns.
//!
//! Uploads are spooled into a transient file inside the staging root while the
//! request body is read, then persisted under a stable, generated name once the
//! request has been validated. Transient files disappear on drop, so rejected
//! requests leave nothing behind.

use std::path::{Component, Path, PathBuf};

use slug::slugify;
use tempfile::NamedTempFile;
use thiserror::Error;
use tokio::{fs, io::AsyncWriteExt};
use uuid::Uuid;

use crate::{application::validation::DeclaredUpload, domain::file_name};

const TRANSIENT_PREFIX: &str = ".incoming-";
const MAX_STEM_CHARS: usize = 64;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("failed to create transient upload file: {0}")]
    Spool(#[source] std::io::Error),
    #[error("failed to write upload payload: {0}")]
    Write(#[source] std::io::Error),
    #[error("staged path escapes the staging directory")]
    OutsideStagingRoot,
    #[error("failed to move upload into the staging directory: {0}")]
    Persist(#[source] std::io::Error),
}

/// Filesystem staging area shared by all requests.
#[derive(Debug)]
pub struct StagingArea {
    root: PathBuf,
}

impl StagingArea {
    /// Initialise staging rooted at the provided directory, creating it if necessary.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, std::io::Error> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        let root = root.canonicalize()?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Open a transient file for an incoming file part.
    pub fn begin(&self, declared_name: &str) -> Result<IncomingUpload, UploadError> {
        let file = tempfile::Builder::new()
            .prefix(TRANSIENT_PREFIX)
            .tempfile_in(&self.root)
            .map_err(UploadError::Spool)?;
        let writer = file.reopen().map_err(UploadError::Spool)?;
        Ok(IncomingUpload {
            declared_name: declared_name.to_string(),
            file,
            writer: fs::File::from_std(writer),
            size_bytes: 0,
        })
    }

    /// Move a received upload to its stable path without overwriting anything.
    pub fn materialize(&self, upload: ReceivedUpload) -> Result<UploadedAsset, UploadError> {
        let file_name = stable_file_name(&upload.declared_name);
        let stable_path = self.confine(&file_name)?;
        let transient_path = upload.file.path().to_path_buf();

        upload
            .file
            .persist_noclobber(&stable_path)
            .map_err(|err| UploadError::Persist(err.error))?;

        Ok(UploadedAsset {
            original_name: upload.declared_name,
            transient_path,
            stable_path,
        })
    }

    /// Resolve a generated file name inside the staging root.
    fn confine(&self, file_name: &str) -> Result<PathBuf, UploadError> {
        let relative = Path::new(file_name);
        let mut components = relative.components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.root.join(relative)),
            _ => Err(UploadError::OutsideStagingRoot),
        }
    }
}

/// A file part being written to its transient location.
#[derive(Debug)]
pub struct IncomingUpload {
    declared_name: String,
    file: NamedTempFile,
    writer: fs::File,
    size_bytes: u64,
}

impl IncomingUpload {
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), UploadError> {
        if chunk.is_empty() {
            return Ok(());
        }
        self.writer
            .write_all(chunk)
            .await
            .map_err(UploadError::Write)?;
        self.size_bytes += chunk.len() as u64;
        Ok(())
    }

    /// Flush the payload. Empty parts yield `None` and their transient file is removed.
    pub async fn finish(mut self) -> Result<Option<ReceivedUpload>, UploadError> {
        self.writer.flush().await.map_err(UploadError::Write)?;
        drop(self.writer);

        if self.size_bytes == 0 {
            return Ok(None);
        }

        Ok(Some(ReceivedUpload {
            declared_name: self.declared_name,
            file: self.file,
            size_bytes: self.size_bytes,
        }))
    }
}

/// A fully received upload still at its transient location.
#[derive(Debug)]
pub struct ReceivedUpload {
    declared_name: String,
    file: NamedTempFile,
    size_bytes: u64,
}

impl ReceivedUpload {
    pub fn transient_path(&self) -> &Path {
        self.file.path()
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }
}

impl DeclaredUpload for ReceivedUpload {
    fn declared_name(&self) -> &str {
        &self.declared_name
    }
}

/// An upload persisted at a stable path the generator can read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedAsset {
    pub original_name: String,
    pub transient_path: PathBuf,
    pub stable_path: PathBuf,
}

impl AsRef<Path> for UploadedAsset {
    fn as_ref(&self) -> &Path {
        &self.stable_path
    }
}

/// `<uuid>-<slug>.<ext>`; the declared name contributes only a slug and an extension.
fn stable_file_name(declared: &str) -> String {
    let mut base = slugify(file_name::stem(declared));
    base.truncate(MAX_STEM_CHARS);
    let base = base.trim_end_matches('-');
    let base = if base.is_empty() { "upload" } else { base };

    let identifier = Uuid::new_v4();
    match file_name::extension(declared) {
        Some(ext) => format!("{identifier}-{base}.{ext}"),
        None => format!("{identifier}-{base}"),
    }
}
