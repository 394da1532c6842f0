//! Configuration loader with inheritance support.
//!
//! Loads configuration from multiple sources and merges them:
//! 1. Global config: `~/.twingraph/config.toml`
//! 2. Local config: `.twingraph/config.toml` (in workspace)
//! 3. CLI overrides
//!
//! Later sources override earlier ones, key by key: any setting a file writes
//! replaces the inherited value, even when it equals the default.

use crate::error::{ConfigError, ConfigLayer};
use crate::{ConfigOverrides, TwinGraphConfig};
use std::path::{Path, PathBuf};
use toml::Table;
use tracing::{debug, trace};

/// Configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Configuration directory name, both under the home directory and in a workspace.
const CONFIG_DIR: &str = ".twingraph";

/// One parsed config file: typed settings plus the keys it actually wrote.
#[derive(Debug, Clone)]
struct LayerFile {
    config: TwinGraphConfig,
    table: Table,
}

/// Configuration loader with caching and inheritance support.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Global config directory (e.g., `~/.twingraph`)
    global_config_dir: Option<PathBuf>,

    /// Cached global config
    global_config: Option<LayerFile>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader.
    ///
    /// Automatically detects the global config directory (`~/.twingraph`).
    pub fn new() -> Self {
        let global_config_dir = dirs::home_dir().map(|h| h.join(CONFIG_DIR));

        Self {
            global_config_dir,
            global_config: None,
        }
    }

    /// Create a loader with a custom global config directory.
    pub fn with_global_dir(global_dir: impl Into<PathBuf>) -> Self {
        Self {
            global_config_dir: Some(global_dir.into()),
            global_config: None,
        }
    }

    pub fn global_config_path(&self) -> Option<PathBuf> {
        self.global_config_dir
            .as_ref()
            .map(|d| d.join(CONFIG_FILE_NAME))
    }

    pub fn local_config_path(&self, workspace_root: &Path) -> PathBuf {
        workspace_root.join(CONFIG_DIR).join(CONFIG_FILE_NAME)
    }

    /// Load configuration for a workspace with optional CLI overrides.
    ///
    /// Merges config in order: global → local → overrides, then validates.
    pub fn load(
        &mut self,
        workspace_root: &Path,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<TwinGraphConfig, ConfigError> {
        let mut merged = Table::new();

        if let Some(global) = self.global_layer()? {
            merge_tables(&mut merged, global.table);
        }

        if let Some(local) = self.local_layer(workspace_root)? {
            merge_tables(&mut merged, local.table);
        }

        let mut config: TwinGraphConfig = toml::Value::Table(merged)
            .try_into()
            .map_err(ConfigError::Merge)?;

        if let Some(ovr) = overrides {
            config.apply_overrides(ovr);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load only the global configuration.
    pub fn load_global(&mut self) -> Result<Option<TwinGraphConfig>, ConfigError> {
        Ok(self.global_layer()?.map(|layer| layer.config))
    }

    /// Load only the local configuration for a workspace.
    pub fn load_local(
        &self,
        workspace_root: &Path,
    ) -> Result<Option<TwinGraphConfig>, ConfigError> {
        Ok(self.local_layer(workspace_root)?.map(|layer| layer.config))
    }

    /// Save configuration to the local config file for a workspace.
    pub fn save_local(
        &self,
        workspace_root: &Path,
        config: &TwinGraphConfig,
    ) -> Result<(), ConfigError> {
        let local_path = self.local_config_path(workspace_root);
        save_config_file(&local_path, config)
    }

    /// Create `~/.twingraph/config.toml` with defaults if it does not exist.
    pub fn init_global(&self) -> Result<PathBuf, ConfigError> {
        let Some(ref global_dir) = self.global_config_dir else {
            return Err(ConfigError::NoHomeDir);
        };
        init_config_dir(global_dir)
    }

    /// Create `.twingraph/config.toml` in a workspace if it does not exist.
    pub fn init_local(&self, workspace_root: &Path) -> Result<PathBuf, ConfigError> {
        init_config_dir(&workspace_root.join(CONFIG_DIR))
    }

    /// Forces reload on next `load_global()` call.
    pub fn clear_cache(&mut self) {
        self.global_config = None;
    }

    fn global_layer(&mut self) -> Result<Option<LayerFile>, ConfigError> {
        if let Some(ref layer) = self.global_config {
            return Ok(Some(layer.clone()));
        }

        let Some(global_path) = self.global_config_path() else {
            debug!("No home directory found, skipping global config");
            return Ok(None);
        };

        if !global_path.exists() {
            trace!("Global config not found at {:?}", global_path);
            return Ok(None);
        }

        debug!("Loading global config from {:?}", global_path);
        let layer = read_layer(&global_path, ConfigLayer::Global)?;
        self.global_config = Some(layer.clone());

        Ok(Some(layer))
    }

    fn local_layer(&self, workspace_root: &Path) -> Result<Option<LayerFile>, ConfigError> {
        let local_path = self.local_config_path(workspace_root);

        if !local_path.exists() {
            trace!("Local config not found at {:?}", local_path);
            return Ok(None);
        }

        debug!("Loading local config from {:?}", local_path);
        read_layer(&local_path, ConfigLayer::Local).map(Some)
    }
}

fn init_config_dir(dir: &Path) -> Result<PathBuf, ConfigError> {
    if !dir.exists() {
        std::fs::create_dir_all(dir).map_err(|e| ConfigError::write(dir, e))?;
    }

    let config_path = dir.join(CONFIG_FILE_NAME);
    if !config_path.exists() {
        save_config_file(&config_path, &TwinGraphConfig::default())?;
    }

    Ok(config_path)
}

/// Read one config file, checking it against the settings schema on its own.
fn read_layer(path: &Path, layer: ConfigLayer) -> Result<LayerFile, ConfigError> {
    let content =
        std::fs::read_to_string(path).map_err(|e| ConfigError::read(layer, path, e))?;

    let config = toml::from_str(&content).map_err(|e| ConfigError::parse(layer, path, e))?;
    let table = toml::from_str(&content).map_err(|e| ConfigError::parse(layer, path, e))?;
    Ok(LayerFile { config, table })
}

fn save_config_file(path: &Path, config: &TwinGraphConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::write(parent, e))?;
        }
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| ConfigError::write(path, e))
}

/// Merge `overlay` into `base` key by key. Nested tables merge recursively;
/// any other value written by `overlay` replaces the one in `base`.
fn merge_tables(base: &mut Table, overlay: Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LogFormat;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn create_local_config(content: &str, workspace: &Path) -> PathBuf {
        let config_dir = workspace.join(CONFIG_DIR);
        std::fs::create_dir_all(&config_dir).unwrap();
        let path = config_dir.join(CONFIG_FILE_NAME);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn create_global_config(content: &str, global_dir: &Path) {
        std::fs::create_dir_all(global_dir).unwrap();
        std::fs::write(global_dir.join(CONFIG_FILE_NAME), content).unwrap();
    }

    #[test]
    fn test_load_default_config() {
        let temp = TempDir::new().unwrap();
        let mut loader = ConfigLoader::with_global_dir(temp.path().join("global"));

        let config = loader.load(temp.path(), None).unwrap();
        assert_eq!(config, TwinGraphConfig::default());
    }

    #[test]
    fn test_load_local_config() {
        let temp = TempDir::new().unwrap();
        let mut loader = ConfigLoader::with_global_dir(temp.path().join("global"));

        create_local_config(
            r#"
            [source]
            snapshot_path = "graph.json"

            [cache]
            eager_relationships = true
            "#,
            temp.path(),
        );

        let config = loader.load(temp.path(), None).unwrap();
        assert_eq!(
            config.source.snapshot_path,
            Some(PathBuf::from("graph.json"))
        );
        assert!(config.cache.eager_relationships);
    }

    #[test]
    fn test_local_overrides_global() {
        let temp = TempDir::new().unwrap();
        let global_dir = temp.path().join("global");

        create_global_config(
            r#"
            [logging]
            level = "debug"
            format = "json"

            [source]
            snapshot_path = "/global/graph.json"
            "#,
            &global_dir,
        );
        create_local_config(
            r#"
            [source]
            snapshot_path = "local.json"
            "#,
            temp.path(),
        );

        let mut loader = ConfigLoader::with_global_dir(&global_dir);
        let config = loader.load(temp.path(), None).unwrap();

        assert_eq!(
            config.source.snapshot_path,
            Some(PathBuf::from("local.json"))
        );
        // Global values the local file does not set are preserved
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_local_can_reset_global_to_default() {
        let temp = TempDir::new().unwrap();
        let global_dir = temp.path().join("global");

        create_global_config(
            r#"
            [cache]
            eager_relationships = true
            warn_on_dangling_extends = true

            [logging]
            level = "debug"
            format = "json"
            "#,
            &global_dir,
        );
        create_local_config(
            r#"
            [cache]
            eager_relationships = false

            [logging]
            level = "info"
            "#,
            temp.path(),
        );

        let mut loader = ConfigLoader::with_global_dir(&global_dir);
        let config = loader.load(temp.path(), None).unwrap();

        assert!(!config.cache.eager_relationships);
        assert_eq!(config.logging.level, "info");
        // Keys the local file leaves out are still inherited
        assert!(config.cache.warn_on_dangling_extends);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_global_reports_layer() {
        let temp = TempDir::new().unwrap();
        let global_dir = temp.path().join("global");
        create_global_config("[cache]\neager_relationships = \"yes\"\n", &global_dir);

        let mut loader = ConfigLoader::with_global_dir(&global_dir);
        let err = loader.load(temp.path(), None).unwrap_err();
        assert_eq!(err.layer(), Some(ConfigLayer::Global));
    }

    #[test]
    fn test_merge_tables_recurses_into_sections() {
        let mut base: Table = toml::from_str("[a]\nx = 1\ny = 2\n").unwrap();
        let overlay: Table = toml::from_str("[a]\ny = 3\n[b]\nz = true\n").unwrap();

        merge_tables(&mut base, overlay);

        let expected: Table = toml::from_str("[a]\nx = 1\ny = 3\n[b]\nz = true\n").unwrap();
        assert_eq!(base, expected);
    }

    #[test]
    fn test_cli_overrides_all() {
        let temp = TempDir::new().unwrap();
        create_local_config(
            r#"
            [logging]
            level = "warn"
            "#,
            temp.path(),
        );

        let mut loader = ConfigLoader::with_global_dir(temp.path().join("global"));
        let overrides = ConfigOverrides {
            log_level: Some("trace".to_string()),
            eager_relationships: Some(true),
            ..Default::default()
        };

        let config = loader.load(temp.path(), Some(&overrides)).unwrap();
        assert_eq!(config.logging.level, "trace");
        assert!(config.cache.eager_relationships);
    }

    #[test]
    fn test_invalid_toml_reports_path() {
        let temp = TempDir::new().unwrap();
        let path = create_local_config("[cache\neager = ", temp.path());

        let mut loader = ConfigLoader::with_global_dir(temp.path().join("global"));
        let err = loader.load(temp.path(), None).unwrap_err();

        assert!(matches!(
            err,
            ConfigError::Parse {
                layer: ConfigLayer::Local,
                ..
            }
        ));
        assert!(err.to_string().contains(&path.display().to_string()));
    }

    #[test]
    fn test_invalid_level_rejected_on_load() {
        let temp = TempDir::new().unwrap();
        create_local_config("[logging]\nlevel = \"chatty\"\n", temp.path());

        let mut loader = ConfigLoader::with_global_dir(temp.path().join("global"));
        let err = loader.load(temp.path(), None).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_save_and_load_config() {
        let temp = TempDir::new().unwrap();
        let loader = ConfigLoader::with_global_dir(temp.path().join("global"));

        let mut config = TwinGraphConfig::default();
        config.cache.warn_on_dangling_extends = true;
        config.logging.level = "warn".to_string();
        loader.save_local(temp.path(), &config).unwrap();

        let mut loader = ConfigLoader::with_global_dir(temp.path().join("global"));
        let loaded = loader.load(temp.path(), None).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_init_local_creates_config() {
        let temp = TempDir::new().unwrap();
        let loader = ConfigLoader::with_global_dir(temp.path().join("global"));

        let config_path = loader.init_local(temp.path()).unwrap();
        assert!(config_path.exists());
        assert!(config_path.ends_with(".twingraph/config.toml"));

        let content = std::fs::read_to_string(&config_path).unwrap();
        let _: TwinGraphConfig = toml::from_str(&content).unwrap();
    }

    #[test]
    fn test_init_global_keeps_existing_file() {
        let temp = TempDir::new().unwrap();
        let global_dir = temp.path().join("global");
        create_global_config("[logging]\nlevel = \"error\"\n", &global_dir);

        let loader = ConfigLoader::with_global_dir(&global_dir);
        let path = loader.init_global().unwrap();
        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.contains("error"));
    }

    #[test]
    fn test_cache_clearing() {
        let temp = TempDir::new().unwrap();
        let global_dir = temp.path().join("global");
        create_global_config("[logging]\nlevel = \"debug\"\n", &global_dir);

        let mut loader = ConfigLoader::with_global_dir(&global_dir);
        let _ = loader.load_global().unwrap();
        assert!(loader.global_config.is_some());

        loader.clear_cache();
        assert!(loader.global_config.is_none());
    }
}
