//! Configuration for Orgi.
//!
//! Settings live in KDL files at two levels:
//! - System: `~/.config/orgi/config.kdl`
//! - Project: `.orgi.kdl` in the working directory
//!
//! Keys:
//! - `org-file` - path of the org document
//! - `extensions` - file extensions scanned for TODOs
//! - `exclude` - glob patterns excluded from scanning
//! - `backup-dir` / `backup-retention` - where source backups go and how many are kept
//! - `output-format` - "json" or "human"
//!
//! ## Precedence
//!
//! CLI flag > `ORGI_FILE` (document path only) > project > system > defaults.
//! Use the [`resolver`] module for resolution with source tracking.

pub mod resolver;
pub mod schema;

pub use resolver::{
    ConfigOverrides, ConfigSources, DEFAULT_ORG_FILE, Resolved, ResolvedConfig, ValueSource,
    resolve, resolve_config,
};
pub use schema::{OrgiConfig, OutputFormat};

use crate::{Error, Result};
use kdl::KdlDocument;
use std::path::{Path, PathBuf};

/// Environment variable overriding the document path.
pub const ORG_FILE_ENV: &str = "ORGI_FILE";

/// File name of the project-level config.
pub const PROJECT_CONFIG_FILE: &str = ".orgi.kdl";

/// `~/.config/orgi/config.kdl`, if a config directory is known.
pub fn system_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("orgi").join("config.kdl"))
}

pub fn project_config_path(project_dir: &Path) -> PathBuf {
    project_dir.join(PROJECT_CONFIG_FILE)
}

/// Load and validate a config file. A missing file is an empty config.
pub fn load_config_file(path: &Path) -> Result<OrgiConfig> {
    if !path.exists() {
        return Ok(OrgiConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
    let doc: KdlDocument = content
        .parse()
        .map_err(|e| Error::Config(format!("Failed to parse KDL in {}: {}", path.display(), e)))?;

    let config = OrgiConfig::from_kdl(&doc);
    config
        .validate()
        .map_err(|msg| Error::Config(format!("{}: {}", path.display(), msg)))?;
    Ok(config)
}
