mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::{Component, Path, PathBuf};

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let mut config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    expand_paths(&mut config);
    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./config.toml",
        "./galleria.toml",
        "~/.config/galleria/config.toml",
        "/etc/galleria/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

fn expand_paths(config: &mut Config) {
    config.storage.data_dir = expand(&config.storage.data_dir);
    if let Some(dir) = config.import.temp_dir.as_mut() {
        *dir = expand(dir);
    }
}

fn expand(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).as_ref())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    let folder = config.storage.upload_folder.trim_matches('/');
    if folder.is_empty() {
        anyhow::bail!("storage.upload_folder cannot be empty");
    }
    if Path::new(&config.storage.upload_folder).is_absolute() {
        anyhow::bail!(
            "storage.upload_folder must be relative to data_dir: {:?}",
            config.storage.upload_folder
        );
    }
    if Path::new(folder)
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        anyhow::bail!(
            "storage.upload_folder must not contain '..' or '.' components: {:?}",
            config.storage.upload_folder
        );
    }

    if config.storage.db_file.trim().is_empty() {
        anyhow::bail!("storage.db_file cannot be empty");
    }

    if config.storage.db_pool_size < 2 {
        anyhow::bail!("storage.db_pool_size must be at least 2");
    }

    if config.storage.max_image_mb == 0 {
        anyhow::bail!("storage.max_image_mb must be greater than 0");
    }

    if config.import.max_upload_mb == 0 {
        anyhow::bail!("import.max_upload_mb must be greater than 0");
    }

    if let Some(dir) = &config.import.temp_dir {
        if !dir.exists() {
            tracing::warn!("Import temp dir does not exist: {:?}", dir);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use galleria_core::ImageStatus;
    use std::io::Write;
    use std::time::Duration;

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        validate_config(&config).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.storage.upload_folder, "static/uploads");
        assert_eq!(config.import.pace_ms, 10);
        assert_eq!(
            config.storage.upload_root(),
            PathBuf::from("./data/static/uploads")
        );
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let file = write_config(
            r#"
            [storage]
            upload_folder = "uploads"

            [import]
            pace_ms = 0
            "#,
        );
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.storage.upload_folder, "uploads");
        assert_eq!(config.storage.db_file, "galleria.db");
        assert_eq!(config.import.pace_ms, 0);
        assert_eq!(config.import.max_upload_mb, 512);
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn rejects_traversing_upload_folder() {
        let mut config = Config::default();
        config.storage.upload_folder = "static/../../etc".into();
        assert!(validate_config(&config).is_err());

        config.storage.upload_folder = "/var/www".into();
        assert!(validate_config(&config).is_err());

        config.storage.upload_folder = "/".into();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn rejects_zero_port_and_upload_limit() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.import.max_upload_mb = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn rejects_undersized_pool() {
        let mut config = Config::default();
        config.storage.db_pool_size = 1;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn storage_section_drives_pool_settings() {
        let file = write_config(
            r#"
            [storage]
            db_pool_size = 8
            db_busy_timeout_ms = 250
            "#,
        );
        let config = load_config(file.path()).unwrap();
        let settings = config.storage.pool_settings();
        assert_eq!(settings.max_connections, 8);
        assert_eq!(settings.busy_timeout, Duration::from_millis(250));
    }

    #[test]
    fn moderation_policy_per_category() {
        let file = write_config(
            r#"
            [moderation]
            gallery_requires_approval = false
            allow_sensitive_toggle = false
            "#,
        );
        let config = load_config(file.path()).unwrap();
        let policy = &config.moderation;
        assert_eq!(policy.initial_status("gallery"), ImageStatus::Approved);
        assert_eq!(policy.initial_status("template"), ImageStatus::Pending);
        assert_eq!(policy.initial_status("other"), ImageStatus::Approved);
        assert!(!policy.shows_sensitive(true));

        let defaults = ModerationConfig::default();
        assert_eq!(defaults.initial_status("gallery"), ImageStatus::Pending);
        assert!(defaults.shows_sensitive(true));
        assert!(!defaults.shows_sensitive(false));
    }

    #[test]
    fn malformed_toml_reports_path() {
        let file = write_config("[server\nport = 1");
        let err = load_config(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse config file"));
    }

    #[test]
    fn staging_dir_falls_back_to_os_temp() {
        let config = ImportConfig::default();
        assert_eq!(config.staging_dir(), std::env::temp_dir());
        assert_eq!(config.max_upload_bytes(), 512 * 1024 * 1024);
    }
}
