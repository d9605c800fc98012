use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use siren_domain::ClassifyError;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// An uploaded file on disk for the duration of one request.
///
/// Every upload gets a unique name inside the upload directory. The file is
/// deleted when the guard is dropped, whichever way the request ends.
#[derive(Debug)]
pub struct TransientUpload {
    file: Option<NamedTempFile>,
    path: PathBuf,
}

impl TransientUpload {
    pub fn create(
        dir: &Path,
        original_name: Option<&str>,
        bytes: &[u8],
    ) -> Result<Self, ClassifyError> {
        fs::create_dir_all(dir)?;
        let suffix = original_name
            .and_then(safe_extension)
            .map(|ext| format!(".{ext}"))
            .unwrap_or_default();
        let mut file = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(&suffix)
            .tempfile_in(dir)?;
        file.write_all(bytes)?;
        file.flush()?;
        debug!(path = ?file.path(), size = bytes.len(), "stored transient upload");
        Ok(Self {
            path: file.path().to_path_buf(),
            file: Some(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Deletes the file now and reports whether that worked.
    pub fn remove(mut self) -> std::io::Result<()> {
        match self.file.take() {
            Some(file) => file.close(),
            None => Ok(()),
        }
    }
}

impl Drop for TransientUpload {
    fn drop(&mut self) {
        let Some(file) = self.file.take() else {
            return;
        };
        match file.close() {
            Ok(()) => debug!(path = ?self.path, "removed transient upload"),
            Err(err) => warn!(path = ?self.path, %err, "failed to remove transient upload"),
        }
    }
}

/// Lower-cased extension of a client supplied name, kept only as a format hint.
fn safe_extension(name: &str) -> Option<String> {
    let ext = Path::new(name).extension()?.to_str()?;
    if ext.is_empty() || ext.len() > 8 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
