//! Command implementations for the Orgi CLI.
//!
//! Each command returns a serializable result implementing [`Output`], which
//! the binary prints as JSON (default) or as human-readable text.

use crate::config::{OrgiConfig, PROJECT_CONFIG_FILE, Resolved, ResolvedConfig};
use crate::models::{Issue, IssueState, Priority, SourceLocator};
use crate::org::writer::generate_id;
use crate::org::{Timestamp, append_issues, parse_file, set_state};
use crate::source::rewriter::DEFAULT_BACKUP_RETENTION;
use crate::sync::{
    Confirm, Decision, GatherResult, SyncAction, SyncResult, SyncStatus, Synchronizer,
    ValidationResult,
};
use crate::textfile::write_atomic;
use crate::{Error, Result};
use serde::Serialize;
use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

/// Command results that can be serialized to JSON or formatted for humans.
pub trait Output: Serialize {
    /// Serialize to a single-line JSON string.
    fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }).to_string())
    }

    /// Format for human-readable output.
    fn to_human(&self) -> String;
}

fn issue_line(issue: &Issue) -> String {
    let mut line = format!("{}  {}", issue.id, issue.state.keyword());
    if let Some(cookie) = issue.priority.cookie() {
        line.push(' ');
        line.push_str(&cookie);
    }
    line.push(' ');
    line.push_str(&issue.title);
    if !issue.tags.is_empty() {
        line.push_str(&format!(" :{}:", issue.tags.join(":")));
    }
    line
}

/// Synchronizer configured from resolved settings, relative to `base_dir`.
pub fn synchronizer(config: &ResolvedConfig, base_dir: &Path) -> Synchronizer {
    Synchronizer::new()
        .with_extensions(config.extensions.value.clone())
        .with_excludes(config.exclude.value.clone())
        .with_backups(config.backup_policy())
        .with_base_dir(base_dir)
}

// === init ===

#[derive(Debug, Serialize)]
pub struct InitResult {
    pub document: PathBuf,
    pub created_document: bool,
    pub config: PathBuf,
    pub created_config: bool,
}

impl Output for InitResult {
    fn to_human(&self) -> String {
        let describe = |created: bool, path: &Path| {
            if created {
                format!("Created {}", path.display())
            } else {
                format!("Exists  {}", path.display())
            }
        };
        format!(
            "{}\n{}",
            describe(self.created_document, &self.document),
            describe(self.created_config, &self.config)
        )
    }
}

/// Create an empty org document and a starter `.orgi.kdl` where missing.
pub fn init(project_dir: &Path, doc: &Path) -> Result<InitResult> {
    let created_document = !doc.exists();
    if created_document {
        if let Some(parent) = doc.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(doc, "#+TITLE: Issues\n")?;
    }

    let config = project_dir.join(PROJECT_CONFIG_FILE);
    let created_config = !config.exists();
    if created_config {
        let org_file = doc
            .strip_prefix(project_dir)
            .unwrap_or(doc)
            .to_string_lossy()
            .replace('\\', "/");
        let starter = OrgiConfig {
            org_file: Some(org_file),
            backup_retention: Some(DEFAULT_BACKUP_RETENTION),
            ..Default::default()
        };
        let mut kdl = starter.to_kdl();
        kdl.autoformat();
        write_atomic(&config, &kdl.to_string())?;
    }

    tracing::info!(doc = %doc.display(), created_document, created_config, "initialized");
    Ok(InitResult {
        document: doc.to_path_buf(),
        created_document,
        config,
        created_config,
    })
}

// === add / list / show / state ===

#[derive(Debug, Serialize)]
pub struct IssueCreated {
    pub issue: Issue,
}

impl Output for IssueCreated {
    fn to_human(&self) -> String {
        format!("Created {}", issue_line(&self.issue))
    }
}

/// Append a manually created issue.
pub fn add(
    doc: &Path,
    title: &str,
    priority: Option<&str>,
    tags: &[String],
    description: Option<&str>,
) -> Result<IssueCreated> {
    let title = title.trim();
    if title.is_empty() {
        return Err(Error::InvalidInput("title must not be empty".to_string()));
    }
    let priority = match priority {
        Some(p) => Priority::from_property(p)
            .ok_or_else(|| Error::InvalidInput(format!("invalid priority '{p}', use A, B or C")))?,
        None => Priority::None,
    };

    let existing = if doc.exists() {
        parse_file(doc)?
    } else {
        Vec::new()
    };
    let mut id = generate_id("orgi", title);
    let mut attempt = 0;
    while existing.iter().any(|i| i.id == id) {
        attempt += 1;
        id = generate_id("orgi", &format!("{title}#{attempt}"));
    }

    let mut issue = Issue::new(id, title.to_string(), Timestamp::now_inactive());
    issue.priority = priority;
    for tag in tags {
        issue.add_tag(tag.trim());
    }
    if let Some(description) = description {
        issue.description = description.to_string();
    }
    append_issues(doc, std::slice::from_ref(&issue))?;

    tracing::info!(id = %issue.id, "added issue");
    Ok(IssueCreated { issue })
}

#[derive(Debug, Serialize)]
pub struct IssueList {
    pub issues: Vec<Issue>,
    pub count: usize,
}

impl Output for IssueList {
    fn to_human(&self) -> String {
        if self.issues.is_empty() {
            return "No issues.".to_string();
        }
        let mut lines: Vec<String> = self.issues.iter().map(issue_line).collect();
        lines.push(format!("{} issue(s)", self.count));
        lines.join("\n")
    }
}

/// List issues, optionally filtered by state and tag. Parse errors are fatal.
pub fn list(doc: &Path, state: Option<&str>, tag: Option<&str>) -> Result<IssueList> {
    let state: Option<IssueState> = state
        .map(|s| s.parse().map_err(Error::InvalidInput))
        .transpose()?;
    let issues: Vec<Issue> = parse_file(doc)?
        .into_iter()
        .filter(|i| state.is_none_or(|s| i.state == s))
        .filter(|i| tag.is_none_or(|t| i.has_tag(t)))
        .collect();
    Ok(IssueList {
        count: issues.len(),
        issues,
    })
}

#[derive(Debug, Serialize)]
pub struct IssueDetail {
    pub issue: Issue,
}

impl Output for IssueDetail {
    fn to_human(&self) -> String {
        let issue = &self.issue;
        let mut lines = vec![
            issue_line(issue),
            format!("  Created: {}", issue.created_at),
            format!("  Line:    {}", issue.line),
        ];
        if let Some(location) = issue.source_reference() {
            lines.push(format!(
                "  Source:  {}:{}:{}",
                location.file, location.line, location.column
            ));
        }
        for (key, value) in issue.properties.iter() {
            lines.push(format!("  :{key}: {value}"));
        }
        if !issue.description.is_empty() {
            lines.push(String::new());
            lines.extend(issue.description.lines().map(|l| format!("  {l}")));
        }
        lines.join("\n")
    }
}

pub fn show(doc: &Path, id: &str) -> Result<IssueDetail> {
    parse_file(doc)?
        .into_iter()
        .find(|i| i.id == id)
        .map(|issue| IssueDetail { issue })
        .ok_or_else(|| Error::NotFound(id.to_string()))
}

#[derive(Debug, Serialize)]
pub struct StateChanged {
    pub issue: Issue,
}

impl Output for StateChanged {
    fn to_human(&self) -> String {
        format!("Updated {}", issue_line(&self.issue))
    }
}

/// Rewrite the state keyword of one issue.
pub fn change_state(doc: &Path, id: &str, state: &str) -> Result<StateChanged> {
    let state: IssueState = state.parse().map_err(Error::InvalidInput)?;
    let issue = set_state(doc, id, state)?;
    Ok(StateChanged { issue })
}

// === gather / sync / validate ===

impl Output for GatherResult {
    fn to_human(&self) -> String {
        let mut lines = Vec::new();
        let verb = if self.dry_run { "Would create" } else { "Created" };
        lines.push(format!(
            "Scanned {} file(s): {} new TODO(s), {} already tracked",
            self.files_scanned, self.todos_found, self.already_tracked
        ));
        for issue in &self.new_issues {
            let location = issue
                .source_reference()
                .map(|l| format!("{}:{}", l.file, l.line))
                .unwrap_or_default();
            lines.push(format!("  {verb} {}  ({location})", issue_line(issue)));
        }
        for rewrite in self.rewrites.iter().filter(|r| !r.success) {
            lines.push(format!(
                "  Failed to mark {}:{}: {}",
                rewrite.file.display(),
                rewrite.line_number,
                rewrite.message
            ));
        }
        for failure in &self.failures {
            lines.push(format!(
                "  Skipped {}: {}",
                failure.path.display(),
                failure.error
            ));
        }
        lines.join("\n")
    }
}

pub fn gather(
    synchronizer: &Synchronizer,
    dir: &Path,
    doc: &Path,
    dry_run: bool,
) -> Result<GatherResult> {
    synchronizer.gather(dir, doc, dry_run)
}

impl Output for SyncResult {
    fn to_human(&self) -> String {
        let verb = match self.action {
            SyncAction::Remove => "removed",
            SyncAction::CommentOut => "commented out",
        };
        let mut lines = vec![format!(
            "{} DONE issue(s) with source: {} {verb}, {} rejected, {} missing file, {} failed",
            self.candidates, self.changed, self.rejected, self.skipped_missing, self.failed
        )];
        for outcome in &self.outcomes {
            let status = match outcome.status {
                SyncStatus::Changed => verb,
                SyncStatus::Rejected => "rejected",
                SyncStatus::MissingFile => "missing file",
                SyncStatus::Duplicate => "duplicate",
                SyncStatus::Failed => "failed",
            };
            lines.push(format!(
                "  {} {}:{} {status}",
                outcome.issue_id, outcome.file, outcome.line
            ));
        }
        lines.join("\n")
    }
}

pub fn sync(
    synchronizer: &Synchronizer,
    doc: &Path,
    auto_confirm: bool,
    confirm: &mut dyn Confirm,
    action: SyncAction,
) -> Result<SyncResult> {
    synchronizer.sync(doc, auto_confirm, confirm, action)
}

impl Output for ValidationResult {
    fn to_human(&self) -> String {
        let mut lines = vec![format!(
            "{}: {} file(s), {} TODO(s), {} linked issue(s), {} finding(s)",
            if self.is_valid { "In sync" } else { "Out of sync" },
            self.files_scanned,
            self.todos_found,
            self.linked_issues,
            self.findings.len()
        )];
        lines.extend(self.findings.iter().map(|f| format!("  {f}")));
        lines.join("\n")
    }
}

pub fn validate(synchronizer: &Synchronizer, dir: &Path, doc: &Path) -> Result<ValidationResult> {
    synchronizer.validate(dir, doc)
}

// === config ===

#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct ConfigShow(pub ResolvedConfig);

impl Output for ConfigShow {
    fn to_human(&self) -> String {
        fn row<T: std::fmt::Display>(key: &str, r: &Resolved<T>) -> String {
            format!("{key:<17} {} ({})", r.value, r.source)
        }
        let c = &self.0;
        let mut lines = vec![
            format!(
                "{:<17} {} ({})",
                "org-file",
                c.org_file.value.display(),
                c.org_file.source
            ),
            format!(
                "{:<17} {} ({})",
                "extensions",
                c.extensions.value.join(" "),
                c.extensions.source
            ),
            format!(
                "{:<17} {} ({})",
                "exclude",
                c.exclude.value.join(" "),
                c.exclude.source
            ),
        ];
        match &c.backup_dir {
            Some(dir) => lines.push(format!(
                "{:<17} {} ({})",
                "backup-dir",
                dir.value.display(),
                dir.source
            )),
            None => lines.push(format!("{:<17} .orgi-backup beside each file (default)", "backup-dir")),
        }
        lines.push(row("backup-retention", &c.backup_retention));
        lines.push(row("output-format", &c.output_format));
        lines.join("\n")
    }
}

pub fn config_show(config: &ResolvedConfig) -> ConfigShow {
    ConfigShow(config.clone())
}

// === confirmation ===

/// Line-based prompt: `y` accepts, `a` accepts all, anything else (or EOF) rejects.
pub struct PromptConfirm<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> PromptConfirm<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> Confirm for PromptConfirm<R, W> {
    fn confirm(&mut self, issue: &Issue, location: &SourceLocator) -> Decision {
        let _ = write!(
            self.output,
            "{} \"{}\" is DONE. Update {}:{}? [y/N/a] ",
            issue.id, issue.title, location.file, location.line
        );
        let _ = self.output.flush();

        let mut answer = String::new();
        match self.input.read_line(&mut answer) {
            Ok(0) | Err(_) => Decision::Reject,
            Ok(_) => match answer.trim().to_ascii_lowercase().as_str() {
                "y" | "yes" => Decision::Accept,
                "a" | "all" => Decision::AcceptAll,
                _ => Decision::Reject,
            },
        }
    }
}
