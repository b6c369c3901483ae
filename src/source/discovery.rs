//! Candidate source file enumeration.
//!
//! Discovery only looks at the top level of the given directory.

use crate::{Error, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Extensions scanned when no allow-list is configured.
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "rs", "c", "h", "cc", "cpp", "hpp", "cs", "java", "kt", "go", "swift", "scala", "js", "jsx",
    "ts", "tsx", "php", "py", "rb", "sh", "pl", "sql", "lua", "html", "xml", "css",
];

/// Exclusion globs applied when none are configured.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    "**/bin/**",
    "**/obj/**",
    "**/target/**",
    "**/build/**",
    "**/dist/**",
    "**/node_modules/**",
    "**/.git/**",
    "**/.svn/**",
    "**/.hg/**",
    "**/*.test.*",
    "**/*.spec.*",
];

/// Compiled exclusion globs, matched against `/`-separated relative paths.
///
/// `**` spans zero or more segments, `*` and `?` stay inside one segment,
/// and literals match case-insensitively.
#[derive(Debug, Clone)]
pub struct ExcludeSet {
    set: GlobSet,
}

impl ExcludeSet {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            let glob = GlobBuilder::new(&pattern.replace('\\', "/"))
                .literal_separator(true)
                .case_insensitive(true)
                .build()
                .map_err(|e| {
                    Error::InvalidInput(format!("invalid exclude pattern '{pattern}': {e}"))
                })?;
            builder.add(glob);
        }
        let set = builder
            .build()
            .map_err(|e| Error::InvalidInput(format!("invalid exclude patterns: {e}")))?;
        Ok(Self { set })
    }

    pub fn is_match(&self, relative: &str) -> bool {
        self.set.is_match(relative.replace('\\', "/"))
    }
}

fn has_extension(name: &str, extensions: &[String]) -> bool {
    let name = name.to_lowercase();
    extensions.iter().any(|ext| {
        let ext = ext.trim_start_matches('.').to_lowercase();
        !ext.is_empty() && name.len() > ext.len() && name.ends_with(&format!(".{ext}"))
    })
}

/// List the files directly inside `dir` that pass the extension filter and
/// no exclusion pattern, sorted lexicographically.
pub fn discover(
    dir: &Path,
    include_extensions: Option<&[String]>,
    exclude_patterns: Option<&[String]>,
) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(Error::DirectoryNotFound(dir.to_path_buf()));
    }

    let extensions: Vec<String> = match include_extensions {
        Some(list) => list.to_vec(),
        None => DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
    };
    let excludes = match exclude_patterns {
        Some(list) => ExcludeSet::new(list)?,
        None => ExcludeSet::new(DEFAULT_EXCLUDES)?,
    };

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            tracing::warn!(dir = %dir.display(), "permission denied, nothing discovered");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "skipping unreadable entry");
                continue;
            }
        };
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if !has_extension(&name, &extensions) {
            continue;
        }
        if excludes.is_match(&name) {
            tracing::debug!(file = %name, "excluded");
            continue;
        }
        files.push(path);
    }
    files.sort();

    tracing::debug!(dir = %dir.display(), count = files.len(), "discovered files");
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestEnv;

    fn names(files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_glob_segments() {
        let matches =
            |pattern: &str, path: &str| ExcludeSet::new(&[pattern]).unwrap().is_match(path);
        assert!(matches("**/target/**", "target/x.rs"));
        assert!(matches("**/target/**", "a/b/Target/x.rs"));
        assert!(!matches("**/target/**", "targets/x.rs"));
        assert!(matches("**/*.test.*", "app.test.js"));
        assert!(matches("**/*.test.*", "src/APP.TEST.TS"));
        assert!(!matches("**/*.test.*", "contest.js"));
        assert!(matches("*/x.rs", "src/x.rs"));
        assert!(!matches("*/x.rs", "x.rs"));
        assert!(!matches("*/x.rs", "a/b/x.rs"));
        assert!(matches("gen_?.rs", "gen_1.rs"));
        assert!(matches("src\\*.rs", "src/lib.rs"));
    }

    #[test]
    fn test_invalid_exclude_pattern() {
        let env = TestEnv::new();
        let excludes = vec!["[unclosed".to_string()];
        assert!(matches!(
            discover(env.path(), None, Some(&excludes)),
            Err(Error::InvalidInput(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_directory_is_empty() {
        use std::os::unix::fs::PermissionsExt;

        let env = TestEnv::new();
        env.write("locked/main.rs", "// TODO: hidden\n");
        let locked = env.path().join("locked");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // root ignores directory permissions
        if fs::read_dir(&locked).is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }
        let files = discover(&locked, None, None);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert!(files.unwrap().is_empty());
    }

    #[test]
    fn test_discover_filters_and_sorts() {
        let env = TestEnv::new();
        env.write("zeta.rs", "");
        env.write("Alpha.PY", "");
        env.write("notes.txt", "");
        env.write("widget.test.js", "");
        env.write("nested/deep.rs", "");

        let files = discover(env.path(), None, None).unwrap();
        assert_eq!(names(&files), vec!["Alpha.PY", "zeta.rs"]);
    }

    #[test]
    fn test_discover_custom_lists() {
        let env = TestEnv::new();
        env.write("a.rs", "");
        env.write("b.txt", "");
        env.write("skip_me.txt", "");

        let exts = vec![".txt".to_string()];
        let excludes = vec!["skip_*".to_string()];
        let files = discover(env.path(), Some(&exts), Some(&excludes)).unwrap();
        assert_eq!(names(&files), vec!["b.txt"]);
    }

    #[test]
    fn test_discover_missing_directory() {
        let err = discover(Path::new("/definitely/not/here"), None, None).unwrap_err();
        assert!(matches!(err, Error::DirectoryNotFound(_)));
    }

    #[test]
    fn test_extension_is_a_suffix_match() {
        let exts = vec!["rs".to_string()];
        assert!(has_extension("main.RS", &exts));
        assert!(!has_extension("rs", &exts));
        assert!(!has_extension("main.rsx", &exts));
    }
}
