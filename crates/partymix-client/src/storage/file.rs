//! JSON-file storage in the platform config directory.
//!
//! One file per key, holding the value as a JSON string:
//! - Linux: `~/.config/partymix/`
//! - macOS: `~/Library/Application Support/partymix/`
//! - Windows: `%APPDATA%\partymix\`

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use super::{Storage, StorageError};

/// Directory name under the platform config directory.
const APP_DIR: &str = "partymix";

/// File-backed storage.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Storage rooted at an explicit directory. Created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Storage under the platform config directory.
    pub fn platform_default() -> Result<Self, StorageError> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            StorageError::Unavailable("no config directory on this platform".to_owned())
        })?;
        Ok(Self::new(config_dir.join(APP_DIR)))
    }

    /// Directory holding the records.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe_key = key.replace(['/', '\\', ':', '*', '?', '"', '<', '>', '|', '.'], "_");
        self.root.join(format!("{safe_key}.json"))
    }
}

impl Storage for FileStorage {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StorageError::Io { path, source }),
        };

        serde_json::from_str::<String>(&contents)
            .map(Some)
            .map_err(|source| StorageError::Serialization { key: key.to_owned(), source })
    }

    fn store(&self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)
            .map_err(|source| StorageError::Io { path: self.root.clone(), source })?;

        let json = serde_json::to_string(value)
            .map_err(|source| StorageError::Serialization { key: key.to_owned(), source })?;

        // Write-then-rename so a crash never leaves a truncated record.
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|source| StorageError::Io { path: tmp.clone(), source })?;
        fs::rename(&tmp, &path).map_err(|source| StorageError::Io { path, source })
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }
}
