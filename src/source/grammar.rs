//! Comment grammars per file extension.

use crate::models::TodoKeyword;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

/// How comments are written in one family of languages.
#[derive(Debug)]
pub struct CommentGrammar {
    /// Lowercase name, also used as a tag on gathered issues
    pub name: &'static str,
    /// Tokens that start a comment running to the end of the line
    pub line_tokens: &'static [&'static str],
    /// `(open, close)` delimiter pairs of block comments
    pub blocks: &'static [(&'static str, &'static str)],
    marker: LazyLock<Regex>,
    continuation: LazyLock<Regex>,
}

fn keyword_alternation() -> String {
    TodoKeyword::ALL
        .iter()
        .map(|k| k.as_str())
        .collect::<Vec<_>>()
        .join("|")
}

fn marker_regex(line_tokens: &[&str], blocks: &[(&str, &str)]) -> Regex {
    let openers: Vec<String> = line_tokens
        .iter()
        .copied()
        .chain(blocks.iter().map(|(open, _)| *open))
        .map(regex::escape)
        .collect();
    Regex::new(&format!(
        r"(?i)(?:{})[ \t!*/#-]*({}):[ \t]*",
        openers.join("|"),
        keyword_alternation()
    ))
    .expect("comment marker regex is valid")
}

fn continuation_regex() -> Regex {
    Regex::new(&format!(
        r"(?i)^[ \t]*[*#!]*[ \t]*({}):[ \t]*",
        keyword_alternation()
    ))
    .expect("block continuation regex is valid")
}

macro_rules! grammar {
    ($name:expr, $lines:expr, $blocks:expr) => {
        CommentGrammar {
            name: $name,
            line_tokens: $lines,
            blocks: $blocks,
            marker: LazyLock::new(|| marker_regex($lines, $blocks)),
            continuation: LazyLock::new(continuation_regex),
        }
    };
}

/// `//` and `/* ... */`
pub static C_FAMILY: CommentGrammar = grammar!("c", &["//"], &[("/*", "*/")]);
/// `#` and triple-quoted strings
pub static PYTHON: CommentGrammar =
    grammar!("python", &["#"], &[("\"\"\"", "\"\"\""), ("'''", "'''")]);
/// `#` only (Ruby, shell, Perl, ...)
pub static HASH: CommentGrammar = grammar!("hash", &["#"], &[]);
/// `--` (SQL, Lua)
pub static SQL: CommentGrammar = grammar!("sql", &["--"], &[]);
/// `<!-- ... -->` (HTML, XML)
pub static MARKUP: CommentGrammar = grammar!("markup", &[], &[("<!--", "-->")]);
/// `/* ... */` (CSS)
pub static CSS: CommentGrammar = grammar!("css", &[], &[("/*", "*/")]);

impl CommentGrammar {
    /// Matches a comment opener followed by `KEYWORD:`; group 1 is the keyword.
    pub fn marker(&self) -> &Regex {
        &self.marker
    }

    /// Matches `KEYWORD:` at the start of a line inside a block comment.
    pub fn continuation(&self) -> &Regex {
        &self.continuation
    }

    /// Tokens used to comment out a line: `(prefix, suffix)`.
    pub fn comment_tokens(&self) -> (&'static str, Option<&'static str>) {
        match (self.line_tokens.first(), self.blocks.first()) {
            (Some(token), _) => (*token, None),
            (None, Some((open, close))) => (*open, Some(*close)),
            (None, None) => ("//", None),
        }
    }

    /// Strip trailing block closers and whitespace from extracted comment text.
    pub fn trim_text<'a>(&self, text: &'a str) -> &'a str {
        let mut text = text.trim();
        loop {
            let before = text.len();
            for (_, close) in self.blocks {
                if let Some(stripped) = text.strip_suffix(*close) {
                    text = stripped.trim_end();
                }
            }
            if text.len() == before {
                return text;
            }
        }
    }
}

/// Pick the grammar for a file by its extension, case-insensitive.
///
/// Unknown or missing extensions fall back to the C family.
pub fn grammar_for_path(path: &Path) -> &'static CommentGrammar {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    grammar_for_extension(&ext)
}

pub fn grammar_for_extension(ext: &str) -> &'static CommentGrammar {
    match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
        "py" | "pyw" | "pyi" => &PYTHON,
        "rb" | "sh" | "bash" | "zsh" | "pl" | "pm" | "r" | "yaml" | "yml" | "toml" | "ps1" => {
            &HASH
        }
        "sql" | "lua" | "hs" => &SQL,
        "html" | "htm" | "xml" | "xhtml" | "svg" | "vue" => &MARKUP,
        "css" => &CSS,
        _ => &C_FAMILY,
    }
}
