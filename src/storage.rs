use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::models::DataFile;

/// Well-known storage key; the blob lives in `<root>/<key>.json`.
pub const STORAGE_KEY: &str = "taskflow_data_v1";
const CORRUPT_SUFFIX: &str = "corrupt";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn ensure_dirs(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)?;
        Ok(())
    }

    pub fn data_path(&self) -> PathBuf {
        self.root.join(format!("{STORAGE_KEY}.json"))
    }

    pub fn load(&self) -> Result<DataFile, StorageError> {
        let mut file = File::open(self.data_path())?;
        let mut buf = String::new();
        file.read_to_string(&mut buf)?;
        Ok(serde_json::from_str(&buf)?)
    }

    /// Startup read: a missing blob yields defaults, a corrupt one is set aside
    /// so the next write cannot destroy it, then defaults are used.
    pub fn load_or_default(&self) -> DataFile {
        match self.load() {
            Ok(data) => data,
            Err(StorageError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
                log::info!("no stored data at {}, starting empty", self.data_path().display());
                DataFile::default()
            }
            Err(err) => {
                log::warn!("stored data unreadable, starting empty: {err}");
                if let Err(quarantine_err) = self.quarantine(&self.data_path()) {
                    log::warn!("failed to set aside unreadable data: {quarantine_err}");
                }
                DataFile::default()
            }
        }
    }

    pub fn save(&self, data: &DataFile) -> Result<(), StorageError> {
        self.write_atomic(self.data_path(), data)
    }

    fn write_atomic(&self, path: PathBuf, data: &DataFile) -> Result<(), StorageError> {
        let temp_path = path.with_extension("tmp");
        let json = serde_json::to_vec_pretty(data)?;
        {
            let mut file = File::create(&temp_path)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        fs::rename(temp_path, path)?;
        Ok(())
    }

    fn quarantine(&self, path: &Path) -> Result<PathBuf, StorageError> {
        let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S").to_string();
        let target = path.with_extension(format!("{CORRUPT_SUFFIX}-{stamp}.json"));
        fs::rename(path, &target)?;
        log::warn!("unreadable data moved to {}", target.display());
        Ok(target)
    }
}
