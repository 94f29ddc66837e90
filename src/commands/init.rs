//! Init command implementation

use crate::config::Config;
use crate::error::{Error, Result};
use crate::store::SqliteStore;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

/// Where `init` put things
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitInfo {
    pub base_dir: String,
    pub config_path: String,
    pub db_path: String,
}

/// Write a default config and create the database schema.
///
/// An existing config file is only replaced when `force` is set.
pub async fn cmd_init(base_dir: PathBuf, config_path: PathBuf, force: bool) -> Result<InitInfo> {
    if config_path.exists() && !force {
        return Err(Error::Config(format!(
            "Config already exists at {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    let mut config = Config::default();
    config.paths.db_file = base_dir.join("sitegraph.db");
    config.paths.base_dir = base_dir;
    config.paths.config_file = config_path;

    config.validate()?;
    std::fs::create_dir_all(&config.paths.base_dir)?;
    config.save()?;

    let store = SqliteStore::connect(&config).await?;
    store.init_schema().await?;
    info!("Created database at {:?}", config.paths.db_file);

    Ok(InitInfo {
        base_dir: config.paths.base_dir.display().to_string(),
        config_path: config.paths.config_file.display().to_string(),
        db_path: config.paths.db_file.display().to_string(),
    })
}

pub fn print_init(info: &InitInfo) {
    println!("✓ Initialized sitegraph at {}", info.base_dir);
    println!("\nConfiguration: {}", info.config_path);
    println!("Database: {}", info.db_path);
    println!("\nNext steps:");
    println!("  sitegraph crawl https://example.com     # Crawl a site");
    println!("  sitegraph cluster --site example.com    # Group pages by topic");
    println!("  sitegraph rank --site example.com       # Score pages");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_creates_config_and_schema() {
        let tmp = TempDir::new().unwrap();
        let base = tmp.path().join("home");
        let config_path = base.join("config.toml");

        let info = cmd_init(base.clone(), config_path.clone(), false)
            .await
            .unwrap();
        assert!(config_path.exists());
        assert!(base.join("sitegraph.db").exists());
        assert!(info.db_path.ends_with("sitegraph.db"));

        let config = Config::load(&config_path).unwrap();
        let store = SqliteStore::connect(&config).await.unwrap();
        assert!(store.is_initialized().await.unwrap());
    }

    #[tokio::test]
    async fn test_init_refuses_overwrite_without_force() {
        let tmp = TempDir::new().unwrap();
        let base = tmp.path().to_path_buf();
        let config_path = base.join("config.toml");

        cmd_init(base.clone(), config_path.clone(), false)
            .await
            .unwrap();
        let err = cmd_init(base.clone(), config_path.clone(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        assert!(cmd_init(base, config_path, true).await.is_ok());
    }
}
