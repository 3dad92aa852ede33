//! Storage layout configuration

use std::path::PathBuf;

use crate::errors::DeployError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;

/// On-disk layout of the bootstrapper's working state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    /// Base directory for all storage
    pub base_dir: PathBuf,
}

impl StorageLayout {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn settings_file(&self) -> File {
        File::new(self.base_dir.join("settings.json"))
    }

    /// Remembers the deployment manifest between invocations
    pub fn user_config_file(&self) -> File {
        File::new(self.base_dir.join("config.json"))
    }

    pub fn blobs_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("blobs"))
    }

    /// Index of compiled job templates
    pub fn templates_index_file(&self) -> File {
        File::new(self.base_dir.join("templates.json"))
    }

    pub fn tmp_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("tmp"))
    }

    /// Installed CPI jobs and packages
    pub fn install_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("cpi"))
    }

    pub fn logs_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("logs"))
    }

    /// Create the layout's directories
    pub async fn setup(&self) -> Result<(), DeployError> {
        self.blobs_dir().create().await?;
        self.tmp_dir().create().await?;
        self.install_dir().create().await?;
        self.logs_dir().create().await?;
        Ok(())
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        let base_dir = std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".vmboot");

        Self::new(base_dir)
    }
}
