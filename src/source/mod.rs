//! Source tree side of synchronization: discovery, TODO extraction and line rewriting.

pub mod discovery;
pub mod extractor;
pub mod grammar;
pub mod rewriter;

pub use discovery::{DEFAULT_EXCLUDES, DEFAULT_EXTENSIONS, ExcludeSet, discover};
pub use extractor::{Extraction, FileFailure, MarkedLines, extract, extract_all, extract_many};
pub use grammar::{CommentGrammar, grammar_for_path};
pub use rewriter::{BackupPolicy, RewriteResult, Rewriter};
