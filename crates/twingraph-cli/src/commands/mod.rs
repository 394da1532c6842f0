//! CLI command implementations
//!
//! This module contains all TwinGraph CLI command implementations.

pub mod config;
pub mod descendants;
pub mod load;
pub mod twin;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::Level;
use twingraph_config::{ConfigLoader, LogFormat, TwinGraphConfig};
use twingraph_core::{
    CacheLoader, CacheOptions, GraphCache, LoadOptions, LoadReport, SnapshotSource,
};

use crate::progress;
use crate::GlobalOptions;

/// Logging settings resolved before the subscriber is installed.
pub struct LoggingSettings {
    pub level: Level,
    pub format: LogFormat,
}

/// Read logging settings from configuration, falling back to defaults.
///
/// Configuration errors are reported later by the command itself.
pub fn logging_settings(global: &GlobalOptions) -> LoggingSettings {
    let config = resolve_workspace(global)
        .ok()
        .and_then(|ws| ConfigLoader::new().load(&ws, None).ok())
        .unwrap_or_default();

    LoggingSettings {
        level: config.logging.level.parse().unwrap_or(Level::INFO),
        format: config.logging.format,
    }
}

/// Resolve the workspace path from options or current directory.
pub fn resolve_workspace(global: &GlobalOptions) -> Result<PathBuf> {
    if let Some(ref ws) = global.workspace {
        anyhow::ensure!(ws.is_dir(), "Workspace '{}' is not a directory", ws.display());
        return Ok(ws.clone());
    }

    std::env::current_dir().context("Failed to get current directory")
}

/// Load the merged configuration (global, local, CLI overrides).
pub fn load_config(global: &GlobalOptions) -> Result<(PathBuf, TwinGraphConfig)> {
    let workspace = resolve_workspace(global)?;
    let config = ConfigLoader::new()
        .load(&workspace, Some(&global.to_config_overrides()))
        .context("Failed to load configuration")?;
    Ok((workspace, config))
}

/// A cache populated from a snapshot, with the source kept for lazy reads.
pub struct LoadedCache {
    pub cache: Arc<GraphCache>,
    pub source: Arc<SnapshotSource>,
    pub report: LoadReport,
}

/// Load a snapshot into a new cache.
///
/// `snapshot` takes precedence over `source.snapshot_path` from configuration.
pub async fn open_cache(global: &GlobalOptions, snapshot: Option<&Path>) -> Result<LoadedCache> {
    let (workspace, config) = load_config(global)?;

    let path = snapshot
        .map(Path::to_path_buf)
        .or_else(|| config.snapshot_path(&workspace))
        .context("No snapshot given; pass a path or set source.snapshot_path in config")?;

    let pb = progress::spinner(&format!("Loading {}", path.display()), global.quiet);

    let source = Arc::new(
        progress::warn_on_err(&pb, "Snapshot could not be opened", SnapshotSource::open(&path))
            .with_context(|| format!("Failed to open snapshot {}", path.display()))?,
    );
    let cache = Arc::new(GraphCache::with_options(CacheOptions {
        warn_on_dangling_extends: config.cache.warn_on_dangling_extends,
    }));

    let loaded = CacheLoader::new(Arc::clone(&cache), source.clone())
        .with_options(LoadOptions {
            eager_relationships: config.cache.eager_relationships,
        })
        .load()
        .await;
    let report = progress::warn_on_err(&pb, "Snapshot load failed", loaded)
        .context("Failed to load snapshot into cache")?;

    let summary = format!(
        "Loaded {} models, {} twins",
        report.models.model_count, report.twins
    );
    if report.models.is_clean() {
        progress::finish_spinner(pb, &summary);
    } else {
        progress::finish_spinner_warn(
            pb,
            &format!("{} ({} models rejected)", summary, report.models.failures.len()),
        );
    }

    Ok(LoadedCache {
        cache,
        source,
        report,
    })
}

/// Print an info message (respects quiet flag).
pub fn print_info(message: &str, quiet: bool) {
    if !quiet {
        eprintln!("{}", message);
    }
}
