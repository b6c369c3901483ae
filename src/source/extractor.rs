//! TODO comment extraction.
//!
//! Each file is scanned line by line with the comment grammar chosen from its
//! extension. A line may yield several references (`// TODO: a // FIXME: b`).
//! Lines that already carry an `[orgi:<id>]` marker have been gathered before;
//! [`extract`] skips them while [`extract_all`] reports them with their id.

use super::grammar::{CommentGrammar, grammar_for_path};
use crate::models::{SourceReference, TodoKeyword};
use crate::textfile::split_lines;
use crate::{Error, Result};
use regex::Regex;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Marker prefix inserted into gathered TODO lines.
pub const MARKER_PREFIX: &str = "[orgi:";

static MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\[orgi:([^\]\s]+)\]").expect("marker regex is valid"));

/// Whether lines carrying an identity marker are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkedLines {
    Skip,
    Include,
}

/// Whether `line` already carries an `[orgi:` marker (case-insensitive).
pub fn has_marker(line: &str) -> bool {
    line.to_ascii_lowercase().contains(MARKER_PREFIX)
}

/// The id inside the first `[orgi:<id>]` marker of `line`.
pub fn marker_id(line: &str) -> Option<String> {
    MARKER_RE.captures(line).map(|c| c[1].to_string())
}

/// Extract TODO references that have not been gathered yet.
pub fn extract(path: &Path) -> Result<Vec<SourceReference>> {
    extract_file(path, MarkedLines::Skip)
}

/// Extract all TODO references, including already gathered ones.
pub fn extract_all(path: &Path) -> Result<Vec<SourceReference>> {
    extract_file(path, MarkedLines::Include)
}

fn extract_file(path: &Path, marked: MarkedLines) -> Result<Vec<SourceReference>> {
    if !path.exists() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }
    let content = fs::read_to_string(path)?;
    let references = extract_str(&content, path, grammar_for_path(path), marked);
    tracing::debug!(path = %path.display(), count = references.len(), "extracted TODOs");
    Ok(references)
}

/// A file that could not be scanned in a batch.
#[derive(Debug, Clone, Serialize)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: String,
}

/// References from many files plus the files that failed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Extraction {
    pub references: Vec<SourceReference>,
    pub failures: Vec<FileFailure>,
}

/// Extract from every path, isolating failures per file.
pub fn extract_many(paths: &[PathBuf], marked: MarkedLines) -> Extraction {
    let mut extraction = Extraction::default();
    for path in paths {
        match extract_file(path, marked) {
            Ok(refs) => extraction.references.extend(refs),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping file");
                extraction.failures.push(FileFailure {
                    path: path.clone(),
                    error: e.to_string(),
                });
            }
        }
    }
    extraction
}

/// Scan in-memory content as if it were the file at `path`.
pub fn extract_str(
    content: &str,
    path: &Path,
    grammar: &CommentGrammar,
    marked: MarkedLines,
) -> Vec<SourceReference> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut references = Vec::new();
    let mut block: Option<usize> = None;

    for (idx, line) in split_lines(content).into_iter().enumerate() {
        let in_block = block.is_some();
        block = next_block_state(grammar, line, block);

        let identity = marker_id(line);
        if has_marker(line) && marked == MarkedLines::Skip {
            continue;
        }

        let mut hits: Vec<(usize, usize, TodoKeyword)> = Vec::new();
        for caps in grammar.marker().captures_iter(line) {
            if let (Some(whole), Some(kw)) = (caps.get(0), caps.get(1))
                && let Some(keyword) = TodoKeyword::parse(kw.as_str())
            {
                hits.push((whole.start(), whole.end(), keyword));
            }
        }
        if in_block
            && hits.is_empty()
            && let Some(caps) = grammar.continuation().captures(line)
            && let (Some(whole), Some(kw)) = (caps.get(0), caps.get(1))
            && let Some(keyword) = TodoKeyword::parse(kw.as_str())
        {
            hits.push((kw.start(), whole.end(), keyword));
        }

        for (i, (start, end, keyword)) in hits.iter().enumerate() {
            let text_end = hits.get(i + 1).map(|h| h.0).unwrap_or(line.len());
            let mut text = grammar.trim_text(&line[*end..text_end]);
            if let Some(m) = MARKER_RE.find(text)
                && m.start() == 0
            {
                text = text[m.end()..].trim_start();
            }
            references.push(SourceReference {
                file_path: path.to_path_buf(),
                line_number: idx + 1,
                column_number: line[..*start].chars().count() + 1,
                original_line: line.to_string(),
                todo_keyword: *keyword,
                todo_text: text.to_string(),
                comment_style: grammar.name.to_string(),
                identity: identity.clone(),
            });
        }
    }

    references
}

/// Track which block comment (index into `grammar.blocks`) is open after `line`.
fn next_block_state(
    grammar: &CommentGrammar,
    line: &str,
    mut open: Option<usize>,
) -> Option<usize> {
    if grammar.blocks.is_empty() {
        return None;
    }
    let mut pos = 0;
    loop {
        match open {
            Some(idx) => {
                let (_, close) = grammar.blocks[idx];
                match line[pos..].find(close) {
                    Some(found) => {
                        pos += found + close.len();
                        open = None;
                    }
                    None => return open,
                }
            }
            None => {
                let line_comment = grammar
                    .line_tokens
                    .iter()
                    .filter_map(|t| line[pos..].find(t))
                    .min();
                let next_open = grammar
                    .blocks
                    .iter()
                    .enumerate()
                    .filter_map(|(i, (o, _))| line[pos..].find(o).map(|at| (at, i)))
                    .min();
                match next_open {
                    Some((at, i)) if line_comment.is_none_or(|lc| at < lc) => {
                        pos += at + grammar.blocks[i].0.len();
                        open = Some(i);
                    }
                    _ => return None,
                }
            }
        }
    }
}
