//! modgraph - dependency resolution engine
//!
//! Turns a package's declared requirement/recommendation rules into a
//! concrete, deduplicated list of artifacts to fetch and install.
//!
//! # Overview
//!
//! Given a set of root [`ModRule`](modgraph_schema::ModRule)s, the
//! [`Resolver`]:
//!
//! 1. finds already-available local matches (downloads and installed
//!    artifacts),
//! 2. falls back to hint-based discovery (direct urls, interactive browse)
//!    when nothing local exists,
//! 3. queries the metadata service and recursively expands each match's own
//!    transitive rules,
//! 4. tags nodes whose resolution is subsumed by another node as redundant,
//! 5. flattens the forest into a flat, duplicate-free, structurally ordered
//!    list.
//!
//! # Architecture
//!
//! - **Capability traits**: the metadata service, the interactive browser
//!   and error notification are injected through [`api`] traits; the engine
//!   defines only how their results are combined.
//! - **Shared gate**: a single [`ConcurrencyGate`] bounds simultaneous
//!   branch work across the entire call tree, however deep or wide.
//! - **Independent branches**: each rule is a failure boundary; a failing
//!   branch is dropped (reported, unless intentionally canceled) without
//!   affecting siblings or the overall resolution.

pub mod api;
pub mod dedup;
pub mod error;
pub mod gate;
mod graph;
pub mod hint;
pub mod local;
pub mod lookup;
pub mod matcher;
pub mod node;
pub mod resolver;

// Re-exports for convenience
pub use api::{Browser, LocalMatchFn, MetadataLookup, Notifier, ProgressFn};
pub use error::ResolveError;
pub use gate::{ConcurrencyGate, DEFAULT_GATE_LIMIT};
pub use hint::{HintSource, Rehint, ResolvedHint};
pub use local::{DownloadEntry, DownloadModInfo, DownloadState, LocalMod, LocalState};
pub use lookup::{LookupDetails, LookupInfo, LookupResult, SourceUri};
pub use matcher::{ModLookupInfo, SourceContext, test_mod_reference};
pub use node::{Dependency, DependencyNode};
pub use resolver::{Resolver, flatten};
