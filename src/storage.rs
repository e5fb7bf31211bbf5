//! Upload storage: a flat directory of CSV files keyed by sanitized filename.

use std::io::Write;
use std::path::PathBuf;

use thiserror::Error;

/// File extensions accepted for upload, lowercase.
pub const ALLOWED_EXTENSIONS: &[&str] = &["csv"];

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("refusing unsafe filename {0:?}")]
    UnsafeName(String),

    #[error("no uploaded file named {0:?}")]
    NotFound(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

type Result<T> = core::result::Result<T, StorageError>;

/// Whether `filename` carries an allowed extension (text after the last `.`,
/// compared case-insensitively).
pub fn allowed_file(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
}

/// Reduce a client-supplied filename to a safe storage key.
///
/// Non-ASCII characters are dropped, path separators become word breaks,
/// whitespace runs turn into a single `_`, anything outside
/// `[A-Za-z0-9_.-]` is removed and leading/trailing `.`/`_` are stripped.
/// The result may be empty.
pub fn secure_filename(filename: &str) -> String {
    let ascii: String = filename
        .chars()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let joined = ascii.split_whitespace().collect::<Vec<_>>().join("_");

    let cleaned: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();

    cleaned.trim_matches(|c| c == '.' || c == '_').to_string()
}

/// Directory-backed store for uploaded files.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    /// Open (and create if needed) the upload directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| StorageError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    /// On-disk location for a stored filename. Only names already in
    /// sanitized form are accepted.
    pub fn path_for(&self, filename: &str) -> Result<PathBuf> {
        if filename.is_empty() || secure_filename(filename) != filename {
            return Err(StorageError::UnsafeName(filename.to_string()));
        }
        Ok(self.dir.join(filename))
    }

    /// Write `bytes` under `filename`, replacing any previous file of the
    /// same name. Readers never observe a partially written file.
    pub fn save(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.path_for(filename)?;
        let io_err = |source| StorageError::Io {
            path: path.clone(),
            source,
        };

        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir).map_err(io_err)?;
        tmp.write_all(bytes).map_err(io_err)?;
        tmp.persist(&path).map_err(|e| io_err(e.error))?;

        log::debug!("stored {} bytes at {}", bytes.len(), path.display());
        Ok(path)
    }

    /// Read back a stored file.
    pub fn read(&self, filename: &str) -> Result<Vec<u8>> {
        let path = self.path_for(filename)?;
        std::fs::read(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(filename.to_string())
            } else {
                StorageError::Io { path, source }
            }
        })
    }
}
