//! Issue synchronization between source TODO comments and the org document.
//!
//! Three workflows share the same matching rule: a TODO reference and an issue
//! belong together when the issue's `SOURCE_FILE` equals the reference's path
//! relative to the base directory (compared case-insensitively, `/`-separated)
//! and `SOURCE_LINE` equals its line number.
//!
//! - [`Synchronizer::gather`] turns unmatched TODOs into new issues and marks
//!   their source lines with `[orgi:<id>]`
//! - [`Synchronizer::sync`] removes (or comments out) the source lines of
//!   issues that are `DONE`
//! - [`Synchronizer::validate`] reports drift in either direction

use crate::models::{
    Issue, IssueState, SOURCE_COLUMN, SOURCE_FILE, SOURCE_LINE, SOURCE_UUID, SourceLocator,
    SourceReference,
};
use crate::org::{Timestamp, append_issues, parse_file};
use crate::source::{
    BackupPolicy, FileFailure, MarkedLines, RewriteResult, Rewriter, discover, extract_all,
    extract_many,
};
use crate::{Error, Result};
use chrono::Local;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Property recording which keyword a gathered issue came from.
pub const TODO_KEYWORD: &str = "TODO_KEYWORD";

/// Tag put on every gathered issue.
pub const GATHERED_TAG: &str = "gathered";

/// Maximum title length in characters before truncation.
pub const MAX_TITLE_CHARS: usize = 50;

/// Answer to a per-issue confirmation prompt during sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accept,
    Reject,
    /// Accept this and every following issue without asking again
    AcceptAll,
}

/// Asks whether the source line of a completed issue may be changed.
pub trait Confirm {
    fn confirm(&mut self, issue: &Issue, location: &SourceLocator) -> Decision;
}

/// Confirms everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysAccept;

impl Confirm for AlwaysAccept {
    fn confirm(&mut self, _issue: &Issue, _location: &SourceLocator) -> Decision {
        Decision::AcceptAll
    }
}

/// What sync does to the source line of a completed issue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    #[default]
    Remove,
    CommentOut,
}

/// Result of a gather run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GatherResult {
    pub dry_run: bool,
    pub files_scanned: usize,
    /// TODOs found without an identity marker
    pub todos_found: usize,
    /// TODOs that already matched an issue by location
    pub already_tracked: usize,
    pub new_issues: Vec<Issue>,
    pub rewrites: Vec<RewriteResult>,
    pub failures: Vec<FileFailure>,
}

impl GatherResult {
    pub fn rewrite_failures(&self) -> usize {
        self.rewrites.iter().filter(|r| !r.success).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Changed,
    Rejected,
    MissingFile,
    Duplicate,
    Failed,
}

/// What happened to one completed issue during sync.
#[derive(Debug, Clone, Serialize)]
pub struct SyncOutcome {
    pub issue_id: String,
    pub file: String,
    pub line: usize,
    pub status: SyncStatus,
    pub message: String,
}

/// Result of a sync run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncResult {
    pub action: SyncAction,
    /// `DONE` issues with a complete source reference
    pub candidates: usize,
    /// Source lines removed or commented out
    pub changed: usize,
    pub rejected: usize,
    /// Skipped because the source file no longer exists
    pub skipped_missing: usize,
    pub failed: usize,
    pub modified_files: Vec<PathBuf>,
    pub outcomes: Vec<SyncOutcome>,
}

/// A disagreement between source and document found by validate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Finding {
    /// A source-linked issue whose TODO is no longer at its file and line
    SourceTodoMissing {
        issue_id: String,
        file: String,
        line: usize,
    },
    /// A TODO in source that no issue points at
    OrgiIssueMissing {
        file: String,
        line: usize,
        keyword: String,
        text: String,
    },
    /// An issue with only some of the `SOURCE_*` properties, or unparsable ones
    IncompleteSourceReference { issue_id: String },
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finding::SourceTodoMissing {
                issue_id,
                file,
                line,
            } => write!(f, "{issue_id}: TODO missing at {file}:{line}"),
            Finding::OrgiIssueMissing {
                file,
                line,
                keyword,
                text,
            } => write!(f, "{file}:{line}: {keyword} has no issue: {text}"),
            Finding::IncompleteSourceReference { issue_id } => {
                write!(f, "{issue_id}: incomplete SOURCE_* properties")
            }
        }
    }
}

/// Result of a validate run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub files_scanned: usize,
    pub todos_found: usize,
    pub linked_issues: usize,
    pub findings: Vec<Finding>,
    pub failures: Vec<FileFailure>,
}

/// Runs gather, sync and validate with one set of discovery and rewrite settings.
#[derive(Debug, Clone, Default)]
pub struct Synchronizer {
    extensions: Option<Vec<String>>,
    excludes: Option<Vec<String>>,
    rewriter: Rewriter,
    base_dir: Option<PathBuf>,
    ignore_closed: bool,
}

impl Synchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = Some(extensions);
        self
    }

    pub fn with_excludes(mut self, excludes: Vec<String>) -> Self {
        self.excludes = Some(excludes);
        self
    }

    pub fn with_backups(mut self, policy: BackupPolicy) -> Self {
        self.rewriter = Rewriter::new(policy);
        self
    }

    /// Directory that `SOURCE_FILE` paths are relative to. Defaults to the working directory.
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    /// Let validate skip `DONE`/`KILL` issues when looking for vanished TODOs.
    pub fn ignore_closed(mut self, ignore: bool) -> Self {
        self.ignore_closed = ignore;
        self
    }

    fn base_dir(&self) -> PathBuf {
        match &self.base_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    fn discover(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        discover(dir, self.extensions.as_deref(), self.excludes.as_deref())
    }

    /// `path` relative to the base directory, `/`-separated.
    pub fn relative_path(&self, path: &Path) -> String {
        let base = self.base_dir();
        let relative = if path.is_absolute() {
            match path.strip_prefix(&base) {
                Ok(rel) => rel.to_path_buf(),
                Err(_) => match (path.canonicalize(), base.canonicalize()) {
                    (Ok(p), Ok(b)) => p
                        .strip_prefix(&b)
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|_| path.to_path_buf()),
                    _ => path.to_path_buf(),
                },
            }
        } else {
            path.to_path_buf()
        };
        relative
            .components()
            .filter(|c| !matches!(c, Component::CurDir))
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/")
    }

    fn resolve(&self, file: &str) -> PathBuf {
        let path = Path::new(file);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir().join(file)
        }
    }

    /// The first issue whose source location equals the reference's.
    pub fn find_matching_issue<'a>(
        &self,
        reference: &SourceReference,
        issues: &'a [Issue],
    ) -> Option<&'a Issue> {
        let key = location_key(&self.relative_path(&reference.file_path));
        issues.iter().find(|issue| {
            issue.source_reference().is_some_and(|loc| {
                loc.line == reference.line_number && location_key(&loc.file) == key
            })
        })
    }

    /// Create issues for untracked TODOs in `dir` and mark their source lines.
    ///
    /// An unreadable or malformed document counts as having no issues.
    pub fn gather(&self, dir: &Path, doc: &Path, dry_run: bool) -> Result<GatherResult> {
        let files = self.discover(dir)?;
        let extraction = extract_many(&files, MarkedLines::Skip);
        let existing = match parse_file(doc) {
            Ok(issues) => issues,
            Err(Error::FileNotFound(_)) => Vec::new(),
            Err(e) => {
                tracing::warn!(doc = %doc.display(), error = %e, "treating document as empty");
                Vec::new()
            }
        };

        let mut result = GatherResult {
            dry_run,
            files_scanned: files.len(),
            todos_found: extraction.references.len(),
            failures: extraction.failures,
            ..Default::default()
        };

        let mut pending: Vec<&SourceReference> = Vec::new();
        for reference in &extraction.references {
            if self.find_matching_issue(reference, &existing).is_some() {
                result.already_tracked += 1;
                continue;
            }
            result.new_issues.push(self.issue_from_reference(reference));
            pending.push(reference);
        }

        tracing::info!(
            found = result.todos_found,
            tracked = result.already_tracked,
            new = result.new_issues.len(),
            dry_run,
            "gathered TODOs"
        );
        if dry_run || result.new_issues.is_empty() {
            return Ok(result);
        }

        append_issues(doc, &result.new_issues)?;
        for (reference, issue) in pending.into_iter().zip(&result.new_issues) {
            let outcome = self
                .rewriter
                .insert_identity(&reference.file_path, reference, &issue.id)
                .unwrap_or_else(|e| RewriteResult {
                    success: false,
                    changed: false,
                    file: reference.file_path.clone(),
                    line_number: reference.line_number,
                    message: e.to_string(),
                    backup: None,
                });
            result.rewrites.push(outcome);
        }
        Ok(result)
    }

    fn issue_from_reference(&self, reference: &SourceReference) -> Issue {
        let token = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();
        let id = format!("gather-{}-{}", Local::now().format("%Y%m%d%H%M%S"), token);
        let file = self.relative_path(&reference.file_path);

        let text = reference.todo_text.trim();
        let title = if text.is_empty() {
            format!("{} at {}:{}", reference.todo_keyword, file, reference.line_number)
        } else {
            truncate_title(text)
        };

        let mut issue = Issue::new(id, title, Timestamp::now_inactive());
        issue.priority = reference.todo_keyword.priority();
        issue.add_tag(GATHERED_TAG);
        issue.add_tag(reference.comment_style.to_lowercase());
        if text.chars().count() > MAX_TITLE_CHARS {
            issue.description = text.to_string();
        }
        issue.properties.insert(SOURCE_FILE, file);
        issue
            .properties
            .insert(SOURCE_LINE, reference.line_number.to_string());
        issue
            .properties
            .insert(SOURCE_COLUMN, reference.column_number.to_string());
        issue.properties.insert(SOURCE_UUID, token);
        issue
            .properties
            .insert(TODO_KEYWORD, reference.todo_keyword.as_str());
        issue
    }

    /// Apply `action` to the source line of every `DONE` issue with a complete source reference.
    ///
    /// Lines are handled per file from the bottom up so earlier edits never
    /// shift later targets. The document itself is not modified.
    pub fn sync(
        &self,
        doc: &Path,
        auto_confirm: bool,
        confirm: &mut dyn Confirm,
        action: SyncAction,
    ) -> Result<SyncResult> {
        let issues = parse_file(doc)?;
        let mut candidates: Vec<(&Issue, SourceLocator)> = issues
            .iter()
            .filter(|issue| issue.state == IssueState::Done)
            .filter_map(|issue| issue.source_reference().map(|loc| (issue, loc)))
            .collect();
        candidates.sort_by(|(_, a), (_, b)| {
            location_key(&a.file)
                .cmp(&location_key(&b.file))
                .then(b.line.cmp(&a.line))
        });

        let mut result = SyncResult {
            action,
            candidates: candidates.len(),
            ..Default::default()
        };
        let mut accept_all = auto_confirm;
        let mut seen: HashSet<(String, usize)> = HashSet::new();

        for (issue, location) in candidates {
            let mut outcome = SyncOutcome {
                issue_id: issue.id.clone(),
                file: location.file.clone(),
                line: location.line,
                status: SyncStatus::Changed,
                message: String::new(),
            };

            if !seen.insert((location_key(&location.file), location.line)) {
                outcome.status = SyncStatus::Duplicate;
                outcome.message = "another issue already handled this line".to_string();
                result.outcomes.push(outcome);
                continue;
            }

            let path = self.resolve(&location.file);
            if !path.exists() {
                tracing::warn!(id = %issue.id, file = %path.display(), "source file missing");
                result.skipped_missing += 1;
                outcome.status = SyncStatus::MissingFile;
                outcome.message = format!("{} does not exist", path.display());
                result.outcomes.push(outcome);
                continue;
            }

            if !accept_all {
                match confirm.confirm(issue, &location) {
                    Decision::Accept => {}
                    Decision::AcceptAll => accept_all = true,
                    Decision::Reject => {
                        result.rejected += 1;
                        outcome.status = SyncStatus::Rejected;
                        result.outcomes.push(outcome);
                        continue;
                    }
                }
            }

            let rewrite = match action {
                SyncAction::Remove => self.rewriter.remove_line(&path, location.line),
                SyncAction::CommentOut => self.rewriter.comment_out_line(
                    &path,
                    location.line,
                    &format!("orgi: {} done", issue.id),
                ),
            };
            match rewrite {
                Ok(r) if r.success && r.changed => {
                    result.changed += 1;
                    if !result.modified_files.contains(&path) {
                        result.modified_files.push(path);
                    }
                    outcome.message = r.message;
                }
                Ok(r) => {
                    result.failed += 1;
                    outcome.status = SyncStatus::Failed;
                    outcome.message = r.message;
                }
                Err(e) => {
                    tracing::warn!(id = %issue.id, error = %e, "sync rewrite failed");
                    result.failed += 1;
                    outcome.status = SyncStatus::Failed;
                    outcome.message = e.to_string();
                }
            }
            result.outcomes.push(outcome);
        }

        tracing::info!(
            candidates = result.candidates,
            changed = result.changed,
            rejected = result.rejected,
            missing = result.skipped_missing,
            failed = result.failed,
            "synced completed issues"
        );
        Ok(result)
    }

    /// Compare the TODOs in `dir` with the source-linked issues in `doc`. Nothing is written.
    ///
    /// Every source-linked issue is checked unless [`Synchronizer::ignore_closed`] is set.
    pub fn validate(&self, dir: &Path, doc: &Path) -> Result<ValidationResult> {
        let files = self.discover(dir)?;
        let extraction = extract_many(&files, MarkedLines::Include);
        let issues = match parse_file(doc) {
            Ok(issues) => issues,
            Err(Error::FileNotFound(_)) => Vec::new(),
            Err(e) => return Err(e),
        };

        let mut result = ValidationResult {
            files_scanned: files.len(),
            todos_found: extraction.references.len(),
            ..Default::default()
        };

        for issue in &issues {
            if issue.has_partial_source_reference() {
                result.findings.push(Finding::IncompleteSourceReference {
                    issue_id: issue.id.clone(),
                });
            }
        }

        let scanned: HashSet<String> = files
            .iter()
            .map(|f| location_key(&self.relative_path(f)))
            .collect();
        for issue in &issues {
            let Some(location) = issue.source_reference() else {
                continue;
            };
            result.linked_issues += 1;
            if self.ignore_closed && matches!(issue.state, IssueState::Done | IssueState::Kill) {
                continue;
            }
            let key = location_key(&location.file);
            let present = if scanned.contains(&key) {
                extraction.references.iter().any(|r| {
                    r.line_number == location.line
                        && location_key(&self.relative_path(&r.file_path)) == key
                })
            } else {
                extract_all(&self.resolve(&location.file))
                    .map(|refs| refs.iter().any(|r| r.line_number == location.line))
                    .unwrap_or(false)
            };
            if !present {
                result.findings.push(Finding::SourceTodoMissing {
                    issue_id: issue.id.clone(),
                    file: location.file,
                    line: location.line,
                });
            }
        }

        for reference in &extraction.references {
            let by_identity = reference
                .identity
                .as_deref()
                .is_some_and(|id| issues.iter().any(|i| i.id == id));
            if by_identity || self.find_matching_issue(reference, &issues).is_some() {
                continue;
            }
            result.findings.push(Finding::OrgiIssueMissing {
                file: self.relative_path(&reference.file_path),
                line: reference.line_number,
                keyword: reference.todo_keyword.to_string(),
                text: reference.todo_text.clone(),
            });
        }

        result.failures = extraction.failures;
        result.is_valid = result.findings.is_empty();
        tracing::info!(
            findings = result.findings.len(),
            valid = result.is_valid,
            "validated"
        );
        Ok(result)
    }
}

/// Normalized comparison key for a relative source path.
fn location_key(path: &str) -> String {
    path.replace('\\', "/")
        .trim_start_matches("./")
        .to_lowercase()
}

/// Keep the first [`MAX_TITLE_CHARS`] characters verbatim, then `...` when shortened.
pub fn truncate_title(text: &str) -> String {
    if text.chars().count() <= MAX_TITLE_CHARS {
        return text.to_string();
    }
    let cut: String = text.chars().take(MAX_TITLE_CHARS).collect();
    format!("{cut}...")
}
