//! Data models for Orgi entities.
//!
//! This module defines the core data structures:
//! - `Issue` - An entry of the org document with state, priority, tags and properties
//! - `OrgEntry` - The transient parse result a headline and its drawer are collected into
//! - `SourceReference` - A TODO comment found in a source file
//! - `SourceLocator` - The `SOURCE_*` properties linking a gathered issue back to its line

use crate::org::Timestamp;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;

/// Property holding the source file of a gathered issue.
pub const SOURCE_FILE: &str = "SOURCE_FILE";
/// Property holding the 1-based source line of a gathered issue.
pub const SOURCE_LINE: &str = "SOURCE_LINE";
/// Property holding the 1-based source column of a gathered issue.
pub const SOURCE_COLUMN: &str = "SOURCE_COLUMN";
/// Property holding the identity token written into the source marker.
pub const SOURCE_UUID: &str = "SOURCE_UUID";

/// All properties that together form a source reference.
pub const SOURCE_PROPERTIES: [&str; 4] = [SOURCE_FILE, SOURCE_LINE, SOURCE_COLUMN, SOURCE_UUID];

/// Issue state, written as the keyword after the headline stars.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueState {
    #[default]
    Todo,
    InProgress,
    Done,
    Kill,
}

impl IssueState {
    /// The keyword used in headlines.
    pub fn keyword(&self) -> &'static str {
        match self {
            IssueState::Todo => "TODO",
            IssueState::InProgress => "INPROGRESS",
            IssueState::Done => "DONE",
            IssueState::Kill => "KILL",
        }
    }

    /// Parse a headline keyword. Keywords are case-sensitive, as in org-mode.
    pub fn from_keyword(s: &str) -> Option<Self> {
        match s {
            "TODO" => Some(IssueState::Todo),
            "INPROGRESS" => Some(IssueState::InProgress),
            "DONE" => Some(IssueState::Done),
            "KILL" => Some(IssueState::Kill),
            _ => None,
        }
    }
}

impl fmt::Display for IssueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.keyword())
    }
}

impl std::str::FromStr for IssueState {
    type Err = String;

    /// Lenient parsing for user input (`done`, `in_progress`, `in-progress`, ...).
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_uppercase();
        IssueState::from_keyword(&normalized).ok_or_else(|| format!("Unknown state: {}", s))
    }
}

/// Issue priority, written as an `[#A]` cookie in headlines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Priority {
    #[default]
    None,
    A,
    B,
    C,
}

impl Priority {
    /// Parse a cookie letter (`A`, `B`, `C`). Other letters have no priority meaning.
    pub fn from_letter(c: char) -> Option<Self> {
        match c {
            'A' => Some(Priority::A),
            'B' => Some(Priority::B),
            'C' => Some(Priority::C),
            _ => None,
        }
    }

    /// Parse a `PRIORITY` property value: `A`, `#A` or `[#A]`, case-insensitive.
    pub fn from_property(value: &str) -> Option<Self> {
        let trimmed = value
            .trim()
            .trim_start_matches('[')
            .trim_end_matches(']')
            .trim_start_matches('#');
        let mut chars = trimmed.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Priority::from_letter(c.to_ascii_uppercase()),
            _ if trimmed.eq_ignore_ascii_case("none") => Some(Priority::None),
            _ => None,
        }
    }

    pub fn letter(&self) -> Option<char> {
        match self {
            Priority::None => None,
            Priority::A => Some('A'),
            Priority::B => Some('B'),
            Priority::C => Some('C'),
        }
    }

    /// The headline cookie, e.g. `[#A]`.
    pub fn cookie(&self) -> Option<String> {
        self.letter().map(|c| format!("[#{}]", c))
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.letter() {
            Some(c) => write!(f, "{}", c),
            None => write!(f, "none"),
        }
    }
}

/// Keywords recognized in source comments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TodoKeyword {
    Todo,
    Fixme,
    Hack,
    Bug,
    Note,
    Xxx,
    Review,
}

impl TodoKeyword {
    pub const ALL: [TodoKeyword; 7] = [
        TodoKeyword::Todo,
        TodoKeyword::Fixme,
        TodoKeyword::Hack,
        TodoKeyword::Bug,
        TodoKeyword::Note,
        TodoKeyword::Xxx,
        TodoKeyword::Review,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TodoKeyword::Todo => "TODO",
            TodoKeyword::Fixme => "FIXME",
            TodoKeyword::Hack => "HACK",
            TodoKeyword::Bug => "BUG",
            TodoKeyword::Note => "NOTE",
            TodoKeyword::Xxx => "XXX",
            TodoKeyword::Review => "REVIEW",
        }
    }

    /// Case-insensitive keyword lookup.
    pub fn parse(s: &str) -> Option<Self> {
        TodoKeyword::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
    }

    /// Priority assigned to issues gathered from this keyword.
    pub fn priority(&self) -> Priority {
        match self {
            TodoKeyword::Fixme | TodoKeyword::Bug => Priority::A,
            TodoKeyword::Todo => Priority::B,
            TodoKeyword::Hack => Priority::C,
            TodoKeyword::Note | TodoKeyword::Xxx | TodoKeyword::Review => Priority::None,
        }
    }
}

impl fmt::Display for TodoKeyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Insertion-ordered property map with case-insensitive keys.
///
/// The first spelling of a key is kept; later inserts under any casing replace the value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties(Vec<(String, String)>);

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// First present key among `keys`, in the order given.
    pub fn get_any(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|k| self.get(k))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(&key)) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Properties {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// A parsed headline: `*** DONE [#A] Title :tag1:tag2:`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Headline {
    /// Number of leading stars
    pub level: usize,
    pub state: IssueState,
    pub priority: Priority,
    pub title: String,
    pub tags: Vec<String>,
}

/// A headline plus everything collected under it, before validation into an [`Issue`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrgEntry {
    pub headline: Headline,
    pub properties: Properties,
    pub body: Vec<String>,
    /// 1-based line number of the headline
    pub line: usize,
}

/// An issue tracked in the org document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    /// Unique identifier from the `ID` property
    pub id: String,

    pub title: String,

    /// Body text (or the `DESCRIPTION` property)
    pub description: String,

    /// Creation timestamp
    pub created_at: Timestamp,

    pub state: IssueState,

    pub priority: Priority,

    /// Tags for categorization, in document order without duplicates
    pub tags: Vec<String>,

    /// All drawer properties, in document order
    pub properties: Properties,

    /// Headline nesting level (display only)
    pub level: usize,

    /// 1-based line number of the headline in the document
    pub line: usize,
}

impl Issue {
    /// Create a new level-1 TODO issue.
    pub fn new(id: String, title: String, created_at: Timestamp) -> Self {
        Self {
            id,
            title,
            description: String::new(),
            created_at,
            state: IssueState::default(),
            priority: Priority::default(),
            tags: Vec::new(),
            properties: Properties::new(),
            level: 1,
            line: 0,
        }
    }

    /// Add a tag unless already present.
    pub fn add_tag(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        if !tag.is_empty() && !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    /// The source locator, if all `SOURCE_*` properties are present and well-formed.
    pub fn source_reference(&self) -> Option<SourceLocator> {
        let file = self.properties.get(SOURCE_FILE)?.trim();
        let line = self.properties.get(SOURCE_LINE)?.trim().parse().ok()?;
        let column = self.properties.get(SOURCE_COLUMN)?.trim().parse().ok()?;
        let uuid = self.properties.get(SOURCE_UUID)?.trim();
        if file.is_empty() || uuid.is_empty() || line == 0 {
            return None;
        }
        Some(SourceLocator {
            file: file.to_string(),
            line,
            column,
            uuid: uuid.to_string(),
        })
    }

    /// True when some but not all source properties are set, or they do not parse.
    pub fn has_partial_source_reference(&self) -> bool {
        let any = SOURCE_PROPERTIES
            .iter()
            .any(|k| self.properties.contains_key(k));
        any && self.source_reference().is_none()
    }
}

/// Where a gathered issue came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceLocator {
    /// Path relative to the sync base directory, `/`-separated
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub uuid: String,
}

/// A TODO comment found in a source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceReference {
    pub file_path: PathBuf,
    /// 1-based line number
    pub line_number: usize,
    /// 1-based character column of the comment match
    pub column_number: usize,
    pub original_line: String,
    pub todo_keyword: TodoKeyword,
    pub todo_text: String,
    /// Name of the comment grammar that matched (e.g. `c`, `python`)
    pub comment_style: String,
    /// Id from an existing `[orgi:<id>]` marker on the line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
}
