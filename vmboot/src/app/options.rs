//! Application configuration options

use tokio_util::sync::CancellationToken;

use crate::errors::DeployError;
use crate::logs::LogOptions;
use crate::storage::layout::StorageLayout;
use crate::storage::settings::Settings;

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    pub settings: Settings,

    /// Storage configuration
    pub layout: StorageLayout,

    /// Cancels in-flight CPI and agent calls
    pub cancel: CancellationToken,
}

impl AppOptions {
    pub fn new(settings: Settings) -> Self {
        let layout = settings
            .base_dir
            .clone()
            .map(StorageLayout::new)
            .unwrap_or_default();

        Self {
            settings,
            layout,
            cancel: CancellationToken::new(),
        }
    }

    /// Load the settings file kept in `layout`
    ///
    /// A `base_dir` set in that file moves the rest of the layout.
    pub async fn load(layout: StorageLayout) -> Result<Self, DeployError> {
        let settings = Settings::load(&layout.settings_file()).await?;
        let mut options = Self::new(settings);
        if options.settings.base_dir.is_none() {
            options.layout = layout;
        }
        Ok(options)
    }

    pub fn log_options(&self) -> LogOptions {
        LogOptions {
            log_level: self.settings.log_level,
            stdout: true,
            log_dir: self
                .settings
                .log_to_file
                .then(|| self.layout.logs_dir().path().to_path_buf()),
            json_format: self.settings.log_json,
        }
    }
}

impl Default for AppOptions {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}
