//! Line-at-a-time parser turning an org document into [`Issue`]s.
//!
//! ```text
//! * TODO [#A] Title text :tag1:tag2:
//!   :PROPERTIES:
//!   :ID: abc
//!   :CREATED: [2024-01-15 Mon 10:30]
//!   :END:
//!   Body text until the next headline or end of file.
//! ```
//!
//! The parser is a small state machine. Each entry is collected into an
//! [`OrgEntry`] and validated into an [`Issue`] when the next headline or the end
//! of input is reached. Any error aborts the whole parse.

use super::ParseError;
use super::timestamp::Timestamp;
use crate::models::{Headline, Issue, IssueState, OrgEntry, Priority, Properties};
use crate::textfile::split_lines;
use crate::{Error, Result};
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

/// Keys accepted for the creation timestamp, first match wins.
pub const CREATED_KEYS: [&str; 2] = ["CREATED", "CREATED_AT"];

static TAGS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)(:(?:[^\s:]+:)+)\s*$").expect("tags regex is valid"));

static PROPERTY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^:([^:\s]+):(.*)$").expect("property regex is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    /// Outside any entry (before the first headline or after finalizing one)
    Unassigned,
    /// Directly after a headline line
    Headline,
    /// Inside a `:PROPERTIES:` drawer
    Properties,
    /// Collecting body lines
    Body,
}

/// Parser context, fed one physical line at a time.
#[derive(Debug)]
pub struct Parser {
    state: ParseState,
    pending: Option<OrgEntry>,
    drawer_line: usize,
    issues: Vec<Issue>,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    pub fn new() -> Self {
        Self {
            state: ParseState::Unassigned,
            pending: None,
            drawer_line: 0,
            issues: Vec::new(),
        }
    }

    /// Process one line. `line_no` is 1-based and used for error reporting.
    pub fn feed_line(&mut self, line_no: usize, line: &str) -> std::result::Result<(), ParseError> {
        let content = line.trim_start_matches([' ', '\t']);

        if is_headline(content) {
            if self.state == ParseState::Properties {
                return Err(ParseError::UnterminatedPropertiesDrawer {
                    line: self.drawer_line,
                });
            }
            self.finalize_pending()?;
            let headline = parse_headline(line_no, content)?;
            self.pending = Some(OrgEntry {
                headline,
                properties: Properties::new(),
                body: Vec::new(),
                line: line_no,
            });
            self.state = ParseState::Headline;
            return Ok(());
        }

        match self.state {
            ParseState::Unassigned => {}
            ParseState::Headline => {
                if is_drawer_marker(content, ":PROPERTIES:") {
                    self.state = ParseState::Properties;
                    self.drawer_line = line_no;
                } else {
                    self.state = ParseState::Body;
                    self.push_body(line);
                }
            }
            ParseState::Properties => {
                if is_drawer_marker(content, ":END:") {
                    self.state = ParseState::Body;
                } else if let Some((key, value)) = parse_property_line(line_no, content)?
                    && let Some(entry) = self.pending.as_mut()
                {
                    entry.properties.insert(key, value);
                }
            }
            ParseState::Body => self.push_body(line),
        }
        Ok(())
    }

    fn push_body(&mut self, line: &str) {
        if let Some(entry) = self.pending.as_mut() {
            entry.body.push(unescape_body_line(line).to_string());
        }
    }

    /// Validate the pending entry (if any) into an issue and return to `Unassigned`.
    pub fn finalize_pending(&mut self) -> std::result::Result<(), ParseError> {
        self.state = ParseState::Unassigned;
        if let Some(entry) = self.pending.take() {
            self.issues.push(entry_to_issue(entry)?);
        }
        Ok(())
    }

    /// Finish the parse at end of input.
    pub fn finish(mut self) -> std::result::Result<Vec<Issue>, ParseError> {
        if self.state == ParseState::Properties {
            return Err(ParseError::UnterminatedPropertiesDrawer {
                line: self.drawer_line,
            });
        }
        self.finalize_pending()?;
        Ok(self.issues)
    }
}

/// Parse a whole document.
pub fn parse_str(content: &str) -> std::result::Result<Vec<Issue>, ParseError> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut parser = Parser::new();
    for (idx, line) in split_lines(content).into_iter().enumerate() {
        parser.feed_line(idx + 1, line)?;
    }
    parser.finish()
}

/// Read and parse a document from disk.
pub fn parse_file(path: &Path) -> Result<Vec<Issue>> {
    if !path.exists() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }
    let content = fs::read_to_string(path)?;
    Ok(parse_str(&content)?)
}

/// A headline is a run of `*` followed by whitespace or the end of the line.
pub(crate) fn is_headline(content: &str) -> bool {
    let rest = content.trim_start_matches('*');
    rest.len() < content.len() && (rest.is_empty() || rest.starts_with([' ', '\t']))
}

fn is_drawer_marker(content: &str, marker: &str) -> bool {
    content.trim().eq_ignore_ascii_case(marker)
}

/// Body lines that would read as headlines are written with a leading `,`.
fn unescape_body_line(line: &str) -> &str {
    let content = line.trim_start_matches([' ', '\t']);
    match content.strip_prefix(',') {
        Some(rest) if is_headline(rest) => rest,
        _ => line,
    }
}

fn parse_headline(line_no: usize, content: &str) -> std::result::Result<Headline, ParseError> {
    let malformed = |reason: String| ParseError::MalformedHeadline {
        line: line_no,
        reason,
    };

    let rest = content.trim_start_matches('*');
    let level = content.len() - rest.len();
    let rest = rest.trim_start();

    let (keyword, after) = rest
        .split_once(char::is_whitespace)
        .unwrap_or((rest, ""));
    if keyword.is_empty() {
        return Err(malformed("missing state keyword".to_string()));
    }
    let state = IssueState::from_keyword(keyword)
        .ok_or_else(|| malformed(format!("unknown state keyword '{}'", keyword)))?;

    let mut text = after.trim_start();
    let mut priority = Priority::None;
    if let Some(cookie) = text.get(..4)
        && cookie.starts_with("[#")
        && cookie.ends_with(']')
        && let Some(p) = cookie.chars().nth(2).and_then(Priority::from_letter)
    {
        priority = p;
        text = text[4..].trim_start();
    }

    let mut tags = Vec::new();
    let mut title = text.trim_end();
    if let Some(caps) = TAGS_RE.captures(text)
        && let Some(group) = caps.get(1)
    {
        for tag in group.as_str().split(':').filter(|t| !t.is_empty()) {
            if !tags.iter().any(|t: &String| t == tag) {
                tags.push(tag.to_string());
            }
        }
        title = text[..group.start()].trim();
    }

    if title.is_empty() {
        return Err(malformed("empty title".to_string()));
    }

    Ok(Headline {
        level,
        state,
        priority,
        title: title.to_string(),
        tags,
    })
}

/// Parse `:KEY: value`. Returns `None` for lines that are not property-shaped.
fn parse_property_line(
    line_no: usize,
    content: &str,
) -> std::result::Result<Option<(String, String)>, ParseError> {
    let trimmed = content.trim();
    if !trimmed.starts_with(':') {
        return Ok(None);
    }
    match PROPERTY_RE.captures(trimmed) {
        Some(caps) => Ok(Some((caps[1].to_string(), caps[2].trim().to_string()))),
        None => Err(ParseError::InvalidPropertyLine {
            line: line_no,
            content: trimmed.to_string(),
        }),
    }
}

/// Split a `TAGS` property value on colons, commas or whitespace.
fn split_tag_property(value: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in value.split([':', ',', ' ', '\t']).filter(|t| !t.is_empty()) {
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}

fn entry_to_issue(entry: OrgEntry) -> std::result::Result<Issue, ParseError> {
    let OrgEntry {
        headline,
        properties,
        body,
        line,
    } = entry;

    let id = properties
        .get("ID")
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ParseError::MissingRequiredProperty {
            line,
            property: "ID".to_string(),
        })?
        .to_string();

    let created_raw =
        properties
            .get_any(&CREATED_KEYS)
            .ok_or_else(|| ParseError::MissingRequiredProperty {
                line,
                property: "CREATED".to_string(),
            })?;
    let created_at = Timestamp::parse(created_raw).map_err(|_| ParseError::InvalidTimestamp {
        line,
        value: created_raw.to_string(),
    })?;

    let title = properties
        .get("TITLE")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .unwrap_or(headline.title);

    let description = properties
        .get("DESCRIPTION")
        .map(str::to_string)
        .unwrap_or_else(|| body.join("\n"));

    let priority = properties
        .get("PRIORITY")
        .and_then(Priority::from_property)
        .unwrap_or(headline.priority);

    let tags = properties
        .get("TAGS")
        .map(split_tag_property)
        .unwrap_or(headline.tags);

    Ok(Issue {
        id,
        title,
        description,
        created_at,
        state: headline.state,
        priority,
        tags,
        properties,
        level: headline.level,
        line,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENTRY: &str = ":PROPERTIES:\n:ID: {id}\n:CREATED: [2024-01-15 Mon 10:30]\n:END:\n";

    fn entry(headline: &str, id: &str) -> String {
        format!("{}\n{}", headline, ENTRY.replace("{id}", id))
    }

    #[test]
    fn test_three_levels_in_document_order() {
        let doc = [
            entry("* TODO First", "a"),
            entry("** DONE Second", "b"),
            entry("*** INPROGRESS Third", "c"),
        ]
        .concat();

        let issues = parse_str(&doc).unwrap();
        assert_eq!(issues.len(), 3);
        assert_eq!(
            issues.iter().map(|i| i.id.as_str()).collect::<Vec<_>>(),
            vec!["a", "b", "c"]
        );
        assert_eq!(issues[0].state, IssueState::Todo);
        assert_eq!(issues[1].state, IssueState::Done);
        assert_eq!(issues[2].state, IssueState::InProgress);
        assert_eq!(issues[2].level, 3);
        assert_eq!(issues[1].line, 6);
    }

    #[test]
    fn test_headline_priority_title_and_tags() {
        let doc = entry("* TODO [#A] Fix the crash :bug:urgent:", "x");
        let issue = &parse_str(&doc).unwrap()[0];
        assert_eq!(issue.priority, Priority::A);
        assert_eq!(issue.title, "Fix the crash");
        assert_eq!(issue.tags, vec!["bug", "urgent"]);
    }

    #[test]
    fn test_unknown_priority_letter_stays_in_title() {
        let doc = entry("* TODO [#D] Someday", "x");
        let issue = &parse_str(&doc).unwrap()[0];
        assert_eq!(issue.priority, Priority::None);
        assert_eq!(issue.title, "[#D] Someday");
    }

    #[test]
    fn test_colons_inside_title_are_not_tags() {
        let doc = entry("* TODO Ratio 3:4 is wrong", "x");
        let issue = &parse_str(&doc).unwrap()[0];
        assert_eq!(issue.title, "Ratio 3:4 is wrong");
        assert!(issue.tags.is_empty());
    }

    #[test]
    fn test_malformed_headlines() {
        for headline in ["* WAITING Something", "*", "* TODO", "* TODO [#A] :tag:", "**   "] {
            let doc = entry(headline, "x");
            match parse_str(&doc) {
                Err(ParseError::MalformedHeadline { line, .. }) => assert_eq!(line, 1),
                other => panic!("{:?} should be malformed, got {:?}", headline, other),
            }
        }
    }

    #[test]
    fn test_bold_text_is_not_a_headline() {
        let doc = format!("{}*bold* text\n", entry("* TODO Title", "x"));
        let issue = &parse_str(&doc).unwrap()[0];
        assert_eq!(issue.description, "*bold* text");
    }

    #[test]
    fn test_unterminated_drawer_before_headline() {
        let doc = "* TODO One\n:PROPERTIES:\n:ID: a\n* TODO Two\n";
        assert_eq!(
            parse_str(doc),
            Err(ParseError::UnterminatedPropertiesDrawer { line: 2 })
        );
    }

    #[test]
    fn test_unterminated_drawer_at_eof() {
        let doc = "* TODO One\n  :PROPERTIES:\n  :ID: a\n";
        assert_eq!(
            parse_str(doc),
            Err(ParseError::UnterminatedPropertiesDrawer { line: 2 })
        );
    }

    #[test]
    fn test_missing_required_properties() {
        let doc = "* TODO One\n:PROPERTIES:\n:CREATED: <2024-01-15>\n:END:\n";
        assert!(matches!(
            parse_str(doc),
            Err(ParseError::MissingRequiredProperty { ref property, .. }) if property == "ID"
        ));

        let doc = "* TODO One\n:PROPERTIES:\n:ID: a\n:END:\n";
        assert!(matches!(
            parse_str(doc),
            Err(ParseError::MissingRequiredProperty { ref property, .. }) if property == "CREATED"
        ));

        // No drawer at all
        assert!(matches!(
            parse_str("* TODO One\n"),
            Err(ParseError::MissingRequiredProperty { .. })
        ));
    }

    #[test]
    fn test_created_key_variants() {
        for key in ["CREATED", "created", "CREATED_AT", "created_at"] {
            let doc = format!(
                "* TODO One\n:PROPERTIES:\n:ID: a\n:{}: <2024-01-15>\n:END:\n",
                key
            );
            assert_eq!(parse_str(&doc).unwrap().len(), 1, "{}", key);
        }
    }

    #[test]
    fn test_invalid_created_timestamp() {
        let doc = "* TODO One\n:PROPERTIES:\n:ID: a\n:CREATED: <2024-13-45>\n:END:\n";
        assert_eq!(
            parse_str(doc),
            Err(ParseError::InvalidTimestamp {
                line: 1,
                value: "<2024-13-45>".to_string()
            })
        );
    }

    #[test]
    fn test_invalid_property_line() {
        let doc = "* TODO One\n:PROPERTIES:\n:ID: a\n:OWNER alice\n:END:\n";
        assert!(matches!(
            parse_str(doc),
            Err(ParseError::InvalidPropertyLine { line: 4, .. })
        ));
    }

    #[test]
    fn test_property_values_keep_embedded_colons() {
        let doc = "* TODO One\n:PROPERTIES:\n:ID: a\n:CREATED: <2024-01-15>\n:URL:   http://host:8080/x  \n:END:\n";
        let issue = &parse_str(doc).unwrap()[0];
        assert_eq!(issue.properties.get("url"), Some("http://host:8080/x"));
    }

    #[test]
    fn test_nested_drawer_first_end_exits() {
        let doc = "* TODO One\n:PROPERTIES:\n:ID: a\n:CREATED: <2024-01-15>\n:CUSTOM_DRAWER:\n:NOTE: inner\n:END:\n:OUTER: value\n:END:\n";
        let issue = &parse_str(doc).unwrap()[0];
        assert_eq!(issue.properties.get("NOTE"), Some("inner"));
        assert!(!issue.properties.contains_key("OUTER"));
        assert_eq!(issue.description, ":OUTER: value\n:END:");
    }

    #[test]
    fn test_property_overrides() {
        let doc = "* TODO [#C] Headline title :a:\n:PROPERTIES:\n:ID: a\n:CREATED: <2024-01-15>\n:TITLE: Property title\n:DESCRIPTION: From property\n:PRIORITY: A\n:TAGS: x:y, z\n:END:\nbody\n";
        let issue = &parse_str(doc).unwrap()[0];
        assert_eq!(issue.title, "Property title");
        assert_eq!(issue.description, "From property");
        assert_eq!(issue.priority, Priority::A);
        assert_eq!(issue.tags, vec!["x", "y", "z"]);
    }

    #[test]
    fn test_body_is_verbatim_with_blank_lines() {
        let doc = format!("{}\n  first\n\nsecond\n\n", entry("* TODO One", "a"));
        let issue = &parse_str(&doc).unwrap()[0];
        assert_eq!(issue.description, "\n  first\n\nsecond\n");
    }

    #[test]
    fn test_escaped_headline_in_body() {
        let doc = format!("{},* not a headline\n", entry("* TODO One", "a"));
        let issues = parse_str(&doc).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].description, "* not a headline");
    }

    #[test]
    fn test_body_without_drawer_is_body() {
        let doc = "* TODO One\nsome text\n:PROPERTIES:\n:ID: a\n:END:\n";
        assert!(matches!(
            parse_str(doc),
            Err(ParseError::MissingRequiredProperty { .. })
        ));
    }

    #[test]
    fn test_whitespace_bom_and_line_endings() {
        let doc = "\u{feff}  * TODO One\r\n\t:properties:\r\n   :ID: a\r\n :CREATED: <2024-01-15>\r\n :end:\r\n\t* DONE Two\r:PROPERTIES:\r:ID: b\r:CREATED: [2024-01-16]\r:END:\r";
        let issues = parse_str(doc).unwrap();
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].title, "One");
        assert_eq!(issues[1].state, IssueState::Done);
    }

    #[test]
    fn test_comment_and_blank_only_document() {
        let doc = "#+TITLE: Issues\n\n# a comment\n   \n#another\n";
        assert!(parse_str(doc).unwrap().is_empty());
        assert!(parse_str("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_file_missing() {
        let err = parse_file(Path::new("/definitely/not/here.org")).unwrap_err();
        assert!(matches!(err, Error::FileNotFound(_)));
    }

    #[test]
    fn test_parser_is_fed_incrementally() {
        let mut parser = Parser::new();
        parser.feed_line(1, "* TODO One").unwrap();
        parser.feed_line(2, ":PROPERTIES:").unwrap();
        parser.feed_line(3, ":ID: a").unwrap();
        parser.feed_line(4, ":CREATED: <2024-01-15>").unwrap();
        parser.feed_line(5, ":END:").unwrap();
        parser.finalize_pending().unwrap();
        parser.feed_line(6, "stray text outside any entry").unwrap();
        let issues = parser.finish().unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].description, "");
    }
}
