//! Precedence resolution for configuration.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. CLI flags (passed at runtime)
//! 2. `ORGI_FILE` environment variable (document path only)
//! 3. Project `.orgi.kdl` in the working directory
//! 4. System `config.kdl` (`~/.config/orgi/config.kdl`)
//! 5. Built-in defaults

use super::schema::{OrgiConfig, OutputFormat};
use super::{ORG_FILE_ENV, load_config_file, project_config_path, system_config_path};
use crate::Result;
use crate::source::rewriter::DEFAULT_BACKUP_RETENTION;
use crate::source::{BackupPolicy, DEFAULT_EXCLUDES, DEFAULT_EXTENSIONS};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Document path used when nothing else is configured.
pub const DEFAULT_ORG_FILE: &str = "issues.org";

/// Tracks where a resolved value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    /// Value from environment variable
    EnvVar(String),
    /// Value from the project `.orgi.kdl`
    Project,
    /// Value from the system config.kdl
    System,
    /// Value from CLI flag
    CliFlag,
    /// Built-in default value
    Default,
}

impl std::fmt::Display for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueSource::EnvVar(name) => write!(f, "env:{}", name),
            ValueSource::Project => write!(f, "project"),
            ValueSource::System => write!(f, "system"),
            ValueSource::CliFlag => write!(f, "cli"),
            ValueSource::Default => write!(f, "default"),
        }
    }
}

impl Serialize for ValueSource {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

/// A resolved value with its source.
#[derive(Debug, Clone, Serialize)]
pub struct Resolved<T> {
    /// The resolved value
    pub value: T,
    /// Where the value came from
    pub source: ValueSource,
}

impl<T> Resolved<T> {
    pub fn new(value: T, source: ValueSource) -> Self {
        Self { value, source }
    }
}

/// Fully resolved configuration with source tracking.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    pub org_file: Resolved<PathBuf>,
    pub extensions: Resolved<Vec<String>>,
    pub exclude: Resolved<Vec<String>>,
    pub backup_dir: Option<Resolved<PathBuf>>,
    pub backup_retention: Resolved<usize>,
    pub output_format: Resolved<OutputFormat>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            org_file: Resolved::new(PathBuf::from(DEFAULT_ORG_FILE), ValueSource::Default),
            extensions: Resolved::new(
                DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
                ValueSource::Default,
            ),
            exclude: Resolved::new(
                DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect(),
                ValueSource::Default,
            ),
            backup_dir: None,
            backup_retention: Resolved::new(DEFAULT_BACKUP_RETENTION, ValueSource::Default),
            output_format: Resolved::new(OutputFormat::Json, ValueSource::Default),
        }
    }
}

impl ResolvedConfig {
    pub fn org_file(&self) -> &Path {
        &self.org_file.value
    }

    pub fn output_format(&self) -> OutputFormat {
        self.output_format.value
    }

    /// Backup settings for the source rewriter.
    pub fn backup_policy(&self) -> BackupPolicy {
        BackupPolicy {
            dir: self.backup_dir.as_ref().map(|r| r.value.clone()),
            retain: self.backup_retention.value,
        }
    }
}

/// CLI overrides for configuration resolution.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub org_file: Option<PathBuf>,
    pub output_format: Option<OutputFormat>,
}

impl ConfigOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_org_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.org_file = Some(path.into());
        self
    }

    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = Some(format);
        self
    }
}

/// The raw inputs of resolution, before precedence is applied.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    pub system: OrgiConfig,
    pub project: OrgiConfig,
    /// Directory relative project paths are resolved against
    pub project_dir: PathBuf,
    pub env_org_file: Option<String>,
}

impl ConfigSources {
    /// Read the system and project files and the environment for `project_dir`.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let system = match system_config_path() {
            Some(path) => load_config_file(&path)?,
            None => OrgiConfig::default(),
        };
        let project = load_config_file(&project_config_path(project_dir))?;
        let env_org_file = std::env::var(ORG_FILE_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty());
        Ok(Self {
            system,
            project,
            project_dir: project_dir.to_path_buf(),
            env_org_file,
        })
    }
}

fn pick<T: Clone>(
    cli: Option<&T>,
    project: Option<&T>,
    system: Option<&T>,
) -> Option<Resolved<T>> {
    if let Some(v) = cli {
        Some(Resolved::new(v.clone(), ValueSource::CliFlag))
    } else if let Some(v) = project {
        Some(Resolved::new(v.clone(), ValueSource::Project))
    } else {
        system.map(|v| Resolved::new(v.clone(), ValueSource::System))
    }
}

/// Apply precedence to already loaded sources.
pub fn resolve(sources: &ConfigSources, overrides: &ConfigOverrides) -> ResolvedConfig {
    let mut result = ResolvedConfig::default();
    let (project, system) = (&sources.project, &sources.system);

    let project_path = |p: &String| sources.project_dir.join(p);
    if let Some(ref file) = overrides.org_file {
        result.org_file = Resolved::new(file.clone(), ValueSource::CliFlag);
    } else if let Some(ref file) = sources.env_org_file {
        result.org_file = Resolved::new(
            PathBuf::from(file),
            ValueSource::EnvVar(ORG_FILE_ENV.to_string()),
        );
    } else if let Some(ref file) = project.org_file {
        result.org_file = Resolved::new(project_path(file), ValueSource::Project);
    } else if let Some(ref file) = system.org_file {
        result.org_file = Resolved::new(PathBuf::from(file), ValueSource::System);
    }

    if let Some(r) = pick(None, project.extensions.as_ref(), system.extensions.as_ref()) {
        result.extensions = r;
    }
    if let Some(r) = pick(None, project.exclude.as_ref(), system.exclude.as_ref()) {
        result.exclude = r;
    }
    if let Some(ref dir) = project.backup_dir {
        result.backup_dir = Some(Resolved::new(project_path(dir), ValueSource::Project));
    } else if let Some(ref dir) = system.backup_dir {
        result.backup_dir = Some(Resolved::new(PathBuf::from(dir), ValueSource::System));
    }
    if let Some(r) = pick(
        None,
        project.backup_retention.as_ref(),
        system.backup_retention.as_ref(),
    ) {
        result.backup_retention = r;
    }
    if let Some(r) = pick(
        overrides.output_format.as_ref(),
        project.output_format.as_ref(),
        system.output_format.as_ref(),
    ) {
        result.output_format = r;
    }

    result
}

/// Load every source for `project_dir` and resolve with the given overrides.
pub fn resolve_config(project_dir: &Path, overrides: &ConfigOverrides) -> Result<ResolvedConfig> {
    let sources = ConfigSources::load(project_dir)?;
    let resolved = resolve(&sources, overrides);
    tracing::debug!(
        org_file = %resolved.org_file.value.display(),
        source = %resolved.org_file.source,
        "resolved configuration"
    );
    Ok(resolved)
}
