//! Shared declarative types for modgraph.
//!
//! This crate holds the vocabulary the resolution engine speaks: references
//! to desired artifacts, the rules that carry them, download hints for
//! out-of-band discovery, and the version-expression semantics (exact vs.
//! fuzzy matching, lenient coercion of real-world version strings).
//!
//! Everything here is plain data -- no IO, no async. The engine itself lives
//! in `modgraph-core`.

pub mod reference;
pub mod version;

// Re-exports
pub use reference::{
    DownloadHint, FileListItem, HintMode, ModReference, ModRule, RepoRef, RuleExtra, RuleKind,
};
pub use version::{coerce_to_semver, is_fuzzy_version, safe_coerce, version_satisfies};
