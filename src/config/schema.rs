//! KDL schema for `config.kdl` / `.orgi.kdl`.
//!
//! This module provides:
//! - the [`OrgiConfig`] struct mirroring the KDL schema
//! - conversion to and from [`KdlDocument`]
//! - validation

use kdl::{KdlDocument, KdlEntry, KdlNode, KdlValue};
use serde::{Deserialize, Serialize};

/// Output format preference for CLI commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JSON output (default, machine-readable)
    #[default]
    Json,
    /// Human-readable output
    Human,
}

impl OutputFormat {
    /// Parse from string, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(OutputFormat::Json),
            "human" => Some(OutputFormat::Human),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Human => "human",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Settings read from a KDL config file. Every field is optional so files can
/// be layered.
///
/// # KDL Schema
///
/// ```kdl
/// org-file "issues.org"
/// extensions "rs" "py" "c"
/// exclude "**/target/**" "**/*.test.*"
/// backup-dir ".orgi-backup"
/// backup-retention 10
/// output-format "human"  // or "json"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgiConfig {
    /// Path of the org document
    pub org_file: Option<String>,

    /// File extensions scanned for TODOs
    pub extensions: Option<Vec<String>>,

    /// Glob patterns excluded from scanning
    pub exclude: Option<Vec<String>>,

    /// Directory that receives source backups
    pub backup_dir: Option<String>,

    /// Backups kept per file name
    pub backup_retention: Option<usize>,

    /// Default output format for CLI commands
    pub output_format: Option<OutputFormat>,
}

impl OrgiConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the config values.
    ///
    /// Returns an error message if any value is invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.backup_retention == Some(0) {
            return Err("backup-retention must be at least 1".to_string());
        }
        if let Some(file) = &self.org_file
            && file.trim().is_empty()
        {
            return Err("org-file must not be empty".to_string());
        }
        if let Some(extensions) = &self.extensions
            && extensions.iter().any(|e| e.trim_start_matches('.').is_empty())
        {
            return Err("extensions must not contain empty entries".to_string());
        }
        Ok(())
    }

    /// Parse config from a KDL document. Unknown nodes are ignored.
    pub fn from_kdl(doc: &KdlDocument) -> Self {
        let mut config = Self::new();

        if let Some(node) = doc.get("org-file") {
            config.org_file = first_string(node);
        }
        if let Some(node) = doc.get("extensions") {
            config.extensions = Some(all_strings(node));
        }
        if let Some(node) = doc.get("exclude") {
            config.exclude = Some(all_strings(node));
        }
        if let Some(node) = doc.get("backup-dir") {
            config.backup_dir = first_string(node);
        }
        if let Some(node) = doc.get("backup-retention")
            && let Some(entry) = node.entries().first()
            && let Some(i) = entry.value().as_integer()
            && i >= 0
        {
            config.backup_retention = usize::try_from(i).ok();
        }
        if let Some(node) = doc.get("output-format")
            && let Some(s) = first_string(node)
        {
            config.output_format = OutputFormat::parse(&s);
        }

        config
    }

    /// Convert config to a KDL document.
    pub fn to_kdl(&self) -> KdlDocument {
        let mut doc = KdlDocument::new();

        if let Some(ref file) = self.org_file {
            doc.nodes_mut().push(string_node("org-file", [file.as_str()]));
        }
        if let Some(ref extensions) = self.extensions {
            doc.nodes_mut()
                .push(string_node("extensions", extensions.iter().map(String::as_str)));
        }
        if let Some(ref exclude) = self.exclude {
            doc.nodes_mut()
                .push(string_node("exclude", exclude.iter().map(String::as_str)));
        }
        if let Some(ref dir) = self.backup_dir {
            doc.nodes_mut().push(string_node("backup-dir", [dir.as_str()]));
        }
        if let Some(retention) = self.backup_retention {
            let mut node = KdlNode::new("backup-retention");
            node.push(KdlEntry::new(KdlValue::Integer(retention as i128)));
            doc.nodes_mut().push(node);
        }
        if let Some(format) = self.output_format {
            doc.nodes_mut()
                .push(string_node("output-format", [format.as_str()]));
        }

        doc
    }
}

fn first_string(node: &KdlNode) -> Option<String> {
    node.entries()
        .first()
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

fn all_strings(node: &KdlNode) -> Vec<String> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .filter_map(|e| e.value().as_string())
        .map(|s| s.to_string())
        .collect()
}

fn string_node<'a>(name: &str, values: impl IntoIterator<Item = &'a str>) -> KdlNode {
    let mut node = KdlNode::new(name);
    for value in values {
        node.push(KdlEntry::new(KdlValue::String(value.to_string())));
    }
    node
}
