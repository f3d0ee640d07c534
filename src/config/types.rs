use galleria_core::{ImageStatus, CATEGORY_TEMPLATE};
use galleria_db::pool::PoolSettings;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub import: ImportConfig,

    #[serde(default)]
    pub moderation: ModerationConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Root directory for the database and uploaded assets
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Upload folder, relative to `data_dir`; also the web prefix for stored paths
    #[serde(default = "default_upload_folder")]
    pub upload_folder: String,

    /// SQLite file name, relative to `data_dir`
    #[serde(default = "default_db_file")]
    pub db_file: String,

    /// Connections kept in the SQLite pool (at least 2)
    #[serde(default = "default_db_pool_size")]
    pub db_pool_size: u32,

    /// How long a writer waits on a locked database, in milliseconds
    #[serde(default = "default_db_busy_timeout_ms")]
    pub db_busy_timeout_ms: u64,

    /// Largest single image accepted by the upload route, in megabytes
    #[serde(default = "default_max_image_mb")]
    pub max_image_mb: u64,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_upload_folder() -> String {
    "static/uploads".to_string()
}
fn default_db_file() -> String {
    "galleria.db".to_string()
}
fn default_db_pool_size() -> u32 {
    4
}
fn default_db_busy_timeout_ms() -> u64 {
    5000
}
fn default_max_image_mb() -> u64 {
    20
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            upload_folder: default_upload_folder(),
            db_file: default_db_file(),
            db_pool_size: default_db_pool_size(),
            db_busy_timeout_ms: default_db_busy_timeout_ms(),
            max_image_mb: default_max_image_mb(),
        }
    }
}

impl StorageConfig {
    /// Directory assets are written into.
    pub fn upload_root(&self) -> PathBuf {
        self.data_dir.join(self.upload_folder.trim_matches('/'))
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(&self.db_file)
    }

    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            max_connections: self.db_pool_size,
            busy_timeout: Duration::from_millis(self.db_busy_timeout_ms),
        }
    }

    pub fn max_image_bytes(&self) -> usize {
        mb_to_bytes(self.max_image_mb)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImportConfig {
    /// Pause after each processed or failed item, in milliseconds
    #[serde(default = "default_pace_ms")]
    pub pace_ms: u64,

    /// Where uploaded archives are staged (defaults to the OS temp dir)
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,

    /// Largest archive accepted over HTTP, in megabytes
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: u64,
}

fn default_pace_ms() -> u64 {
    10
}
fn default_max_upload_mb() -> u64 {
    512
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            pace_ms: default_pace_ms(),
            temp_dir: None,
            max_upload_mb: default_max_upload_mb(),
        }
    }
}

impl ImportConfig {
    pub fn pace(&self) -> Duration {
        Duration::from_millis(self.pace_ms)
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    pub fn max_upload_bytes(&self) -> usize {
        mb_to_bytes(self.max_upload_mb)
    }
}

fn mb_to_bytes(mb: u64) -> usize {
    usize::try_from(mb.saturating_mul(1024 * 1024)).unwrap_or(usize::MAX)
}

/// Moderation policy for single-image uploads and public listings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModerationConfig {
    /// Gallery uploads wait in the queue until approved
    #[serde(default = "default_true")]
    pub gallery_requires_approval: bool,

    /// Template uploads wait in the queue until approved
    #[serde(default = "default_true")]
    pub template_requires_approval: bool,

    /// Whether public visitors may opt in to images with sensitive tags
    #[serde(default = "default_true")]
    pub allow_sensitive_toggle: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            gallery_requires_approval: true,
            template_requires_approval: true,
            allow_sensitive_toggle: true,
        }
    }
}

impl ModerationConfig {
    /// Status a freshly uploaded image starts in.
    ///
    /// Unknown categories follow the gallery policy.
    pub fn initial_status(&self, category: &str) -> ImageStatus {
        let needs_approval = if category == CATEGORY_TEMPLATE {
            self.template_requires_approval
        } else {
            self.gallery_requires_approval
        };
        if needs_approval {
            ImageStatus::Pending
        } else {
            ImageStatus::Approved
        }
    }

    /// Whether a public request asking for sensitive images gets them.
    pub fn shows_sensitive(&self, requested: bool) -> bool {
        requested && self.allow_sensitive_toggle
    }
}
