//! Line splitting and whole-file replacement shared by the document and source writers.

use crate::Result;
use std::fs;
use std::io::Write;
use std::path::Path;

/// Split content into lines, accepting `\n`, `\r\n` and lone `\r` endings.
///
/// A trailing line ending does not produce an extra empty line.
pub(crate) fn split_lines(content: &str) -> Vec<&str> {
    split_terminated(content).into_iter().map(|(line, _)| line).collect()
}

/// Split content into `(line, terminator)` pairs so the exact bytes can be reassembled.
///
/// The terminator is `"\n"`, `"\r\n"`, `"\r"`, or `""` for an unterminated last line.
pub(crate) fn split_terminated(content: &str) -> Vec<(&str, &str)> {
    let mut lines = Vec::new();
    let mut rest = content;
    while !rest.is_empty() {
        match rest.find(['\r', '\n']) {
            Some(idx) => {
                let len = if rest[idx..].starts_with("\r\n") { 2 } else { 1 };
                lines.push((&rest[..idx], &rest[idx..idx + len]));
                rest = &rest[idx + len..];
            }
            None => {
                lines.push((rest, ""));
                break;
            }
        }
    }
    lines
}

/// Line terminator used by most lines of `content`, `"\n"` when there are none.
pub(crate) fn dominant_terminator(content: &str) -> &'static str {
    let (mut lf, mut crlf, mut cr) = (0, 0, 0);
    for (_, term) in split_terminated(content) {
        match term {
            "\r\n" => crlf += 1,
            "\r" => cr += 1,
            "\n" => lf += 1,
            _ => {}
        }
    }
    if crlf > lf && crlf >= cr {
        "\r\n"
    } else if cr > lf && cr > crlf {
        "\r"
    } else {
        "\n"
    }
}

/// Replace `path` with `content` through a temporary file in the same directory.
///
/// The original file's permissions are carried over.
pub(crate) fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let permissions = fs::metadata(path).ok().map(|m| m.permissions());

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.flush()?;
    if let Some(permissions) = permissions {
        fs::set_permissions(tmp.path(), permissions)?;
    }
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
