//! Writing issues into an org document.
//!
//! Existing document content is never re-serialized: new issues are appended as
//! text, and state changes rewrite only the keyword of one headline line.

use super::parser::{CREATED_KEYS, is_headline, parse_str};
use crate::models::{Issue, IssueState};
use crate::textfile::{dominant_terminator, split_terminated, write_atomic};
use crate::{Error, Result};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::LazyLock;

static HEADLINE_KEYWORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\x{feff}?[ \t]*\*+[ \t]+)(\S+)").expect("headline keyword regex is valid")
});

/// Properties rendered from dedicated issue fields rather than copied through.
const FIELD_PROPERTIES: [&str; 6] = ["ID", "TITLE", "DESCRIPTION", "PRIORITY", "TAGS", "CREATED"];

/// Generate a unique ID for a manually created issue.
///
/// Format: `<prefix>-<4 hex chars>`
pub fn generate_id(prefix: &str, seed: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    hasher.update(
        chrono::Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or(0)
            .to_le_bytes(),
    );
    let hash = hasher.finalize();
    let hash_hex = format!("{:x}", hash);
    format!("{}-{}", prefix, &hash_hex[..4])
}

fn single_line(s: &str) -> String {
    s.split(['\r', '\n'])
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn sanitize_tag(tag: &str) -> String {
    tag.chars()
        .map(|c| if c == ':' || c.is_whitespace() { '_' } else { c })
        .collect()
}

/// Render an issue as an org entry, terminated by a newline.
pub fn render_issue(issue: &Issue) -> String {
    let mut out = String::new();

    out.push_str(&"*".repeat(issue.level.max(1)));
    out.push(' ');
    out.push_str(issue.state.keyword());
    if let Some(cookie) = issue.priority.cookie() {
        out.push(' ');
        out.push_str(&cookie);
    }
    out.push(' ');
    out.push_str(&single_line(&issue.title));
    if !issue.tags.is_empty() {
        let tags: Vec<String> = issue.tags.iter().map(|t| sanitize_tag(t)).collect();
        out.push_str(&format!(" :{}:", tags.join(":")));
    }
    out.push('\n');

    out.push_str(":PROPERTIES:\n");
    out.push_str(&format!(":ID: {}\n", single_line(&issue.id)));
    out.push_str(&format!(":CREATED: {}\n", issue.created_at));
    for (key, value) in issue.properties.iter() {
        let skip = FIELD_PROPERTIES
            .iter()
            .chain(CREATED_KEYS.iter())
            .any(|k| k.eq_ignore_ascii_case(key));
        if !skip {
            out.push_str(&format!(":{}: {}\n", key, single_line(value)));
        }
    }
    out.push_str(":END:\n");

    if !issue.description.is_empty() {
        for line in issue.description.split('\n') {
            let line = line.trim_end_matches('\r');
            if is_headline(line.trim_start_matches([' ', '\t'])) {
                out.push(',');
            }
            out.push_str(line);
            out.push('\n');
        }
    }

    out
}

/// Append issues to the end of the document, creating it if missing.
pub fn append_issues(path: &Path, issues: &[Issue]) -> Result<()> {
    if issues.is_empty() {
        return Ok(());
    }

    let existing = if path.exists() {
        fs::read_to_string(path)?
    } else {
        String::new()
    };

    let mut text = String::new();
    if !existing.is_empty() && !existing.ends_with(['\n', '\r']) {
        text.push('\n');
    }
    for issue in issues {
        text.push_str(&render_issue(issue));
    }

    let terminator = dominant_terminator(&existing);
    if terminator != "\n" {
        text = text.replace('\n', terminator);
    }

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(text.as_bytes())?;

    tracing::debug!(path = %path.display(), count = issues.len(), "appended issues");
    Ok(())
}

/// Change the state keyword of the issue with `id`, leaving every other byte intact.
///
/// Returns the issue as it reads after the change.
pub fn set_state(path: &Path, id: &str, state: IssueState) -> Result<Issue> {
    if !path.exists() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }
    let content = fs::read_to_string(path)?;
    let issues = parse_str(&content)?;
    let mut issue = issues
        .into_iter()
        .find(|i| i.id == id)
        .ok_or_else(|| Error::NotFound(id.to_string()))?;

    if issue.state == state {
        return Ok(issue);
    }

    let mut out = String::with_capacity(content.len());
    let mut rewritten = false;
    for (idx, (line, terminator)) in split_terminated(&content).into_iter().enumerate() {
        if idx + 1 == issue.line
            && let Some(caps) = HEADLINE_KEYWORD_RE.captures(line)
        {
            let keyword = caps.get(2).map_or(0..0, |m| m.range());
            out.push_str(&line[..keyword.start]);
            out.push_str(state.keyword());
            out.push_str(&line[keyword.end..]);
            rewritten = true;
        } else {
            out.push_str(line);
        }
        out.push_str(terminator);
    }
    if !rewritten {
        return Err(Error::InvalidOperation(format!(
            "no headline keyword for {} on line {} of {}",
            id,
            issue.line,
            path.display()
        )));
    }
    write_atomic(path, &out)?;

    tracing::info!(id, from = %issue.state, to = %state, "changed issue state");
    issue.state = state;
    Ok(issue)
}
