//! Dependency nodes and the public dependency output.

use modgraph_schema::{FileListItem, ModReference, RuleExtra};

use crate::hint::Rehint;
use crate::local::LocalMod;
use crate::lookup::LookupResult;

/// Working unit of the resolution graph.
///
/// Nodes are transient: built while expanding rules, tagged once by the
/// duplicate pass, read once by the flattener, then discarded.
#[derive(Debug, Clone, Default)]
pub struct DependencyNode {
    /// Id of an already-present download satisfying the reference.
    pub download_id: Option<String>,
    /// Already-installed artifact satisfying the reference.
    pub local_mod: Option<LocalMod>,
    /// The reference this node resolves.
    pub reference: ModReference,
    /// Candidate matches; index 0 is authoritative.
    pub lookup_results: Vec<LookupResult>,
    /// Resolved sub-dependencies.
    pub children: Vec<DependencyNode>,
    /// Set by the duplicate tagger when another node's resolution subsumes
    /// this one. Redundant nodes and their whole subtree are dropped from
    /// output.
    pub redundant: bool,
    /// Explicit install-file list from the rule.
    pub file_list: Option<Vec<FileListItem>>,
    /// Installer choices from the rule.
    pub installer_choices: Option<serde_json::Value>,
    /// Patches from the rule.
    pub patches: Option<serde_json::Value>,
    /// The rule's extra payload, passed through untouched.
    pub extra: Option<RuleExtra>,
    /// Install ordering phase.
    pub phase: u32,
    /// Capability to re-resolve an interactive download hint later.
    pub rehint: Option<Rehint>,
}

/// One resolved dependency, ready for the download/install orchestrator.
///
/// This is a [`DependencyNode`] with the tree-internal bookkeeping
/// (`children`, `redundant`) stripped.
#[derive(Debug, Clone)]
pub struct Dependency {
    /// Id of an already-present download satisfying the reference.
    pub download_id: Option<String>,
    /// Already-installed artifact satisfying the reference.
    pub local_mod: Option<LocalMod>,
    /// The reference this dependency resolves.
    pub reference: ModReference,
    /// Candidate matches; index 0 is authoritative.
    pub lookup_results: Vec<LookupResult>,
    /// Explicit install-file list from the rule.
    pub file_list: Option<Vec<FileListItem>>,
    /// Installer choices from the rule.
    pub installer_choices: Option<serde_json::Value>,
    /// Patches from the rule.
    pub patches: Option<serde_json::Value>,
    /// The rule's extra payload.
    pub extra: Option<RuleExtra>,
    /// Install ordering phase.
    pub phase: u32,
    /// Capability to re-resolve an interactive download hint later.
    pub rehint: Option<Rehint>,
}

impl From<&DependencyNode> for Dependency {
    fn from(node: &DependencyNode) -> Self {
        Self {
            download_id: node.download_id.clone(),
            local_mod: node.local_mod.clone(),
            reference: node.reference.clone(),
            lookup_results: node.lookup_results.clone(),
            file_list: node.file_list.clone(),
            installer_choices: node.installer_choices.clone(),
            patches: node.patches.clone(),
            extra: node.extra.clone(),
            phase: node.phase,
            rehint: node.rehint.clone(),
        }
    }
}
