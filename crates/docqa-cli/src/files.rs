//! Reading files from disk into uploads

use std::path::Path;
use tracing::debug;

use docqa_core::{Error, Result, UploadedFile};

/// Read a file, naming the upload after its file name
pub fn read_upload(path: &Path) -> Result<UploadedFile> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| Error::load(path.display().to_string(), "not a file path"))?;

    let bytes = std::fs::read(path)
        .map_err(|e| Error::load(path.display().to_string(), e.to_string()))?;
    debug!(file = %name, bytes = bytes.len(), "read upload");

    Ok(UploadedFile::new(name, bytes))
}

/// Read every path, separating readable uploads from failures
pub fn read_uploads<P: AsRef<Path>>(paths: &[P]) -> (Vec<UploadedFile>, Vec<Error>) {
    let mut uploads = Vec::new();
    let mut errors = Vec::new();
    for path in paths {
        match read_upload(path.as_ref()) {
            Ok(upload) => uploads.push(upload),
            Err(e) => errors.push(e),
        }
    }
    (uploads, errors)
}
