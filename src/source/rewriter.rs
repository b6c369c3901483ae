//! Line-level patching of source files.
//!
//! Every mutating call copies the file into a backup directory first and then
//! replaces it atomically. Only a missing file or an out-of-range line number
//! is returned as an error; anything else that goes wrong is reported in the
//! [`RewriteResult`] so a batch can carry on with the next file.

use super::extractor::has_marker;
use super::grammar::grammar_for_path;
use crate::models::SourceReference;
use crate::textfile::{split_terminated, write_atomic};
use crate::{Error, Result};
use chrono::Local;
use regex::Regex;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Name of the backup directory created next to rewritten files.
pub const BACKUP_DIR_NAME: &str = ".orgi-backup";

/// Backups kept per file name unless configured otherwise.
pub const DEFAULT_BACKUP_RETENTION: usize = 10;

static KEYWORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(TODO|FIXME|HACK|BUG|NOTE|XXX|REVIEW):[ \t]*")
        .expect("keyword regex is valid")
});

static BACKUP_STAMP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{17}-\d{3}$").expect("backup stamp regex is valid"));

/// Where backups go and how many are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupPolicy {
    /// Fixed backup directory; `None` means `.orgi-backup` beside each file
    pub dir: Option<PathBuf>,
    pub retain: usize,
}

impl Default for BackupPolicy {
    fn default() -> Self {
        Self {
            dir: None,
            retain: DEFAULT_BACKUP_RETENTION,
        }
    }
}

/// Outcome of one rewrite call.
#[derive(Debug, Clone, Serialize)]
pub struct RewriteResult {
    pub success: bool,
    /// Whether the file content was modified
    pub changed: bool,
    pub file: PathBuf,
    pub line_number: usize,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup: Option<PathBuf>,
}

impl RewriteResult {
    fn unchanged(file: &Path, line_number: usize, message: impl Into<String>) -> Self {
        Self {
            success: true,
            changed: false,
            file: file.to_path_buf(),
            line_number,
            message: message.into(),
            backup: None,
        }
    }

    fn failed(file: &Path, line_number: usize, message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::warn!(file = %file.display(), line = line_number, %message, "rewrite failed");
        Self {
            success: false,
            changed: false,
            file: file.to_path_buf(),
            line_number,
            message,
            backup: None,
        }
    }
}

enum Edit {
    Replace(String),
    Remove,
    Keep(String),
}

/// Applies single-line edits to source files.
#[derive(Debug, Clone, Default)]
pub struct Rewriter {
    backups: BackupPolicy,
}

impl Rewriter {
    pub fn new(backups: BackupPolicy) -> Self {
        Self { backups }
    }

    /// Insert `[orgi:<id>]` after the TODO keyword on the referenced line.
    pub fn insert_identity(
        &self,
        file: &Path,
        reference: &SourceReference,
        id: &str,
    ) -> Result<RewriteResult> {
        let keyword = reference.todo_keyword;
        let column = reference.column_number;
        self.apply(file, reference.line_number, |line| {
            if has_marker(line) {
                return Edit::Keep("already has reference".to_string());
            }
            let start = line
                .char_indices()
                .nth(column.saturating_sub(1))
                .map(|(i, _)| i)
                .unwrap_or(0);
            let found = KEYWORD_RE
                .captures_iter(line)
                .filter_map(|c| c.get(0).zip(c.get(1)))
                .find(|(whole, kw)| {
                    whole.start() >= start && kw.as_str().eq_ignore_ascii_case(keyword.as_str())
                });
            match found {
                Some((whole, kw)) => Edit::Replace(format!(
                    "{}{}: [orgi:{}] {}",
                    &line[..whole.start()],
                    kw.as_str(),
                    id,
                    &line[whole.end()..]
                )),
                None => Edit::Keep(format!("no {} marker on line, left unchanged", keyword)),
            }
        })
    }

    /// Delete the physical line `line_number` (1-based).
    pub fn remove_line(&self, file: &Path, line_number: usize) -> Result<RewriteResult> {
        self.apply(file, line_number, |_| Edit::Remove)
    }

    /// Comment out `line_number` with the file's comment token, appending `note`.
    pub fn comment_out_line(
        &self,
        file: &Path,
        line_number: usize,
        note: &str,
    ) -> Result<RewriteResult> {
        let (open, close) = grammar_for_path(file).comment_tokens();
        self.apply(file, line_number, |line| {
            let body = line.trim_start_matches([' ', '\t']);
            let indent = &line[..line.len() - body.len()];
            let note = note.trim();
            let replaced = match (close, note.is_empty()) {
                (None, true) => format!("{indent}{open} {body}"),
                (None, false) => format!("{indent}{open} {body}  {open} {note}"),
                (Some(close), true) => format!("{indent}{open} {body} {close}"),
                (Some(close), false) => {
                    format!("{indent}{open} {body} {close}  {open} {note} {close}")
                }
            };
            Edit::Replace(replaced)
        })
    }

    fn apply<F>(&self, file: &Path, line_number: usize, edit: F) -> Result<RewriteResult>
    where
        F: FnOnce(&str) -> Edit,
    {
        if !file.exists() {
            return Err(Error::FileNotFound(file.to_path_buf()));
        }
        let content = match fs::read_to_string(file) {
            Ok(content) => content,
            Err(e) => return Ok(RewriteResult::failed(file, line_number, e.to_string())),
        };
        let (bom, body) = match content.strip_prefix('\u{feff}') {
            Some(rest) => ("\u{feff}", rest),
            None => ("", content.as_str()),
        };
        let lines = split_terminated(body);
        if line_number == 0 || line_number > lines.len() {
            return Err(Error::InvalidOperation(format!(
                "line {} is out of range for {} ({} lines)",
                line_number,
                file.display(),
                lines.len()
            )));
        }
        let target = line_number - 1;

        let replacement = match edit(lines[target].0) {
            Edit::Keep(message) => {
                return Ok(RewriteResult::unchanged(file, line_number, message));
            }
            Edit::Replace(text) => Some(text),
            Edit::Remove => None,
        };

        let backup = match self.backup(file) {
            Ok(path) => path,
            Err(e) => {
                return Ok(RewriteResult::failed(
                    file,
                    line_number,
                    format!("backup failed: {e}"),
                ));
            }
        };

        let mut out = String::with_capacity(content.len() + 32);
        out.push_str(bom);
        for (idx, (line, terminator)) in lines.iter().enumerate() {
            if idx != target {
                out.push_str(line);
                out.push_str(terminator);
            } else if let Some(text) = &replacement {
                out.push_str(text);
                out.push_str(terminator);
            }
        }
        if let Err(e) = write_atomic(file, &out) {
            return Ok(RewriteResult::failed(file, line_number, e.to_string()));
        }

        let message = match replacement {
            Some(_) => "line rewritten",
            None => "line removed",
        };
        tracing::debug!(file = %file.display(), line = line_number, message, "rewrote source");
        Ok(RewriteResult {
            success: true,
            changed: true,
            file: file.to_path_buf(),
            line_number,
            message: message.to_string(),
            backup: Some(backup),
        })
    }

    fn backup_dir(&self, file: &Path) -> PathBuf {
        match &self.backups.dir {
            Some(dir) => dir.clone(),
            None => file
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(BACKUP_DIR_NAME),
        }
    }

    /// Copy `file` to `<backup dir>/<name>.<timestamp>-<seq>.bak`, then prune old copies.
    pub fn backup(&self, file: &Path) -> Result<PathBuf> {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::InvalidInput(format!("not a file: {}", file.display())))?;
        let dir = self.backup_dir(file);
        fs::create_dir_all(&dir)?;

        let stamp = Local::now().format("%Y%m%d%H%M%S%3f").to_string();
        let mut seq = 0;
        let target = loop {
            let candidate = dir.join(format!("{name}.{stamp}-{seq:03}.bak"));
            if !candidate.exists() {
                break candidate;
            }
            seq += 1;
            if seq > 999 {
                return Err(Error::Other(format!("too many backups of {name} at {stamp}")));
            }
        };
        fs::copy(file, &target)?;

        self.prune(&dir, &name);
        Ok(target)
    }

    /// Remove all but the newest `retain` backups of `name`. Failures are only logged.
    fn prune(&self, dir: &Path, name: &str) {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "cannot list backups");
                return;
            }
        };
        let prefix = format!("{name}.");
        let mut backups: Vec<(String, PathBuf)> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let file_name = entry.file_name().to_string_lossy().into_owned();
                let stamp = file_name.strip_prefix(&prefix)?.strip_suffix(".bak")?;
                BACKUP_STAMP_RE
                    .is_match(stamp)
                    .then(|| (file_name.clone(), entry.path()))
            })
            .collect();
        if backups.len() <= self.backups.retain {
            return;
        }
        backups.sort_by(|a, b| b.0.cmp(&a.0));
        for (_, path) in backups.into_iter().skip(self.backups.retain) {
            if let Err(e) = fs::remove_file(&path) {
                tracing::warn!(path = %path.display(), error = %e, "failed to prune backup");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TodoKeyword;
    use crate::source::extractor::extract;
    use crate::test_utils::TestEnv;

    fn backups(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_insert_identity() {
        let env = TestEnv::new();
        let file = env.write("main.c", "int x;\n    // todo: fix overflow\n");
        let reference = extract(&file).unwrap().remove(0);

        let result = Rewriter::default()
            .insert_identity(&file, &reference, "gather-1-abcd")
            .unwrap();
        assert!(result.success);
        assert!(result.changed);
        assert!(result.backup.as_ref().unwrap().exists());
        assert_eq!(
            env.read("main.c"),
            "int x;\n    // todo: [orgi:gather-1-abcd] fix overflow\n"
        );
        assert!(extract(&file).unwrap().is_empty());
    }

    #[test]
    fn test_insert_identity_twice_is_a_no_op() {
        let env = TestEnv::new();
        let file = env.write("main.c", "// TODO: once\n");
        let reference = extract(&file).unwrap().remove(0);
        let rewriter = Rewriter::default();

        rewriter.insert_identity(&file, &reference, "a").unwrap();
        let before = env.read("main.c");
        let again = rewriter.insert_identity(&file, &reference, "b").unwrap();

        assert!(again.success);
        assert!(!again.changed);
        assert!(again.message.contains("already has reference"));
        assert_eq!(env.read("main.c"), before);
    }

    #[test]
    fn test_insert_identity_without_keyword_is_unchanged() {
        let env = TestEnv::new();
        let file = env.write("main.c", "// TODO: moved away\n");
        let reference = extract(&file).unwrap().remove(0);
        env.write("main.c", "int y;\n");

        let result = Rewriter::default()
            .insert_identity(&file, &reference, "gather-1-abcd")
            .unwrap();
        assert!(result.success);
        assert!(!result.changed);
        assert!(result.backup.is_none());
        assert_eq!(env.read("main.c"), "int y;\n");
        assert!(!env.path().join(BACKUP_DIR_NAME).exists());
    }

    #[test]
    fn test_insert_identity_targets_the_referenced_match() {
        let env = TestEnv::new();
        let file = env.write("a.rs", "f(); // TODO: one // BUG: two\n");
        let refs = extract(&file).unwrap();
        assert_eq!(refs[1].todo_keyword, TodoKeyword::Bug);

        Rewriter::default()
            .insert_identity(&file, &refs[1], "x")
            .unwrap();
        assert_eq!(env.read("a.rs"), "f(); // TODO: one // BUG: [orgi:x] two\n");
    }

    #[test]
    fn test_remove_line_keeps_other_bytes() {
        let env = TestEnv::new();
        let file = env.write("a.py", "one\r\n# TODO: two\r\nthree");
        let result = Rewriter::default().remove_line(&file, 2).unwrap();
        assert!(result.success && result.changed);
        assert_eq!(env.read("a.py"), "one\r\nthree");
    }

    #[test]
    fn test_remove_line_out_of_range() {
        let env = TestEnv::new();
        let file = env.write("a.rs", "one\ntwo\n");
        let rewriter = Rewriter::default();
        assert!(matches!(
            rewriter.remove_line(&file, 3),
            Err(Error::InvalidOperation(_))
        ));
        assert!(matches!(
            rewriter.remove_line(&file, 0),
            Err(Error::InvalidOperation(_))
        ));
        assert_eq!(env.read("a.rs"), "one\ntwo\n");
    }

    #[test]
    fn test_missing_file() {
        let rewriter = Rewriter::default();
        let missing = Path::new("/no/such/file.rs");
        assert!(matches!(
            rewriter.remove_line(missing, 1),
            Err(Error::FileNotFound(_))
        ));
        assert!(matches!(
            rewriter.comment_out_line(missing, 1, "done"),
            Err(Error::FileNotFound(_))
        ));
    }

    #[test]
    fn test_comment_out_line() {
        let env = TestEnv::new();
        let rust = env.write("a.rs", "fn main() {\n    todo!(); // TODO: x\n}\n");
        let html = env.write("a.html", "  <p>hi</p>\n");
        let rewriter = Rewriter::default();

        rewriter.comment_out_line(&rust, 2, "orgi: done").unwrap();
        assert_eq!(
            env.read("a.rs"),
            "fn main() {\n    // todo!(); // TODO: x  // orgi: done\n}\n"
        );

        rewriter.comment_out_line(&html, 1, "").unwrap();
        assert_eq!(env.read("a.html"), "  <!-- <p>hi</p> -->\n");
    }

    #[test]
    fn test_byte_order_mark_stays_at_file_start() {
        let env = TestEnv::new();
        let c = env.write("a.c", "\u{feff}  int x; // TODO: y\nint z;\n");
        let py = env.write("a.py", "\u{feff}# TODO: drop\nx = 1\n");
        let rewriter = Rewriter::default();

        rewriter.comment_out_line(&c, 1, "done").unwrap();
        assert_eq!(
            env.read("a.c"),
            "\u{feff}  // int x; // TODO: y  // done\nint z;\n"
        );

        rewriter.remove_line(&py, 1).unwrap();
        assert_eq!(env.read("a.py"), "\u{feff}x = 1\n");
    }

    #[test]
    fn test_unreadable_file_is_a_failed_result() {
        let env = TestEnv::new();
        let file = env.path().join("bin.c");
        fs::write(&file, [0xff, 0xfe, 0x0a]).unwrap();
        let result = Rewriter::default().remove_line(&file, 1).unwrap();
        assert!(!result.success);
        assert!(!result.changed);
    }

    #[test]
    fn test_backups_are_pruned() {
        let env = TestEnv::new();
        let backup_dir = env.path().join("backups");
        let file = env.write("a.rs", &"x\n".repeat(10));
        let rewriter = Rewriter::new(BackupPolicy {
            dir: Some(backup_dir.clone()),
            retain: 3,
        });
        fs::create_dir_all(&backup_dir).unwrap();
        fs::write(backup_dir.join("unrelated.txt"), "keep").unwrap();

        for _ in 0..5 {
            assert!(rewriter.remove_line(&file, 1).unwrap().success);
        }

        let names = backups(&backup_dir);
        assert_eq!(names.len(), 4);
        assert!(names.contains(&"unrelated.txt".to_string()));
        assert_eq!(env.read("a.rs"), "x\n".repeat(5));
    }

    #[test]
    fn test_default_backup_location() {
        let env = TestEnv::new();
        let file = env.write("a.rs", "x\n");
        let result = Rewriter::default().remove_line(&file, 1).unwrap();
        let backup = result.backup.unwrap();
        assert_eq!(backup.parent().unwrap(), env.path().join(BACKUP_DIR_NAME));
        assert_eq!(fs::read_to_string(backup).unwrap(), "x\n");
    }
}
