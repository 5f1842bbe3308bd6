//! Resolution orchestrator and flattener.
//!
//! [`Resolver::resolve_all`] is the public entry point: it expands a set of
//! root rules into a forest of dependency nodes, tags duplicates, and
//! flattens the survivors into the ordered list handed to the download/
//! install orchestrator.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::future::join_all;
use modgraph_schema::{ModRule, RuleKind};

use crate::api::{Browser, LocalMatchFn, MetadataLookup, Notifier, ProgressFn};
use crate::dedup;
use crate::gate::ConcurrencyGate;
use crate::graph::Pass;
use crate::local::LocalState;
use crate::node::{Dependency, DependencyNode};

/// Depth-first, left-to-right walk of the forest, skipping unresolved
/// entries, redundant nodes and everything below a redundant node.
pub fn flatten(forest: &[Option<DependencyNode>]) -> Vec<&DependencyNode> {
    fn walk<'a>(node: &'a DependencyNode, out: &mut Vec<&'a DependencyNode>) {
        if node.redundant {
            return;
        }
        out.push(node);
        for child in &node.children {
            walk(child, out);
        }
    }

    let mut out = Vec::new();
    for node in forest.iter().flatten() {
        walk(node, &mut out);
    }
    out
}

/// The dependency resolution engine.
///
/// Holds the external capabilities and a snapshot of the local indices;
/// every call to [`resolve_all`](Self::resolve_all) works against that
/// snapshot.
pub struct Resolver {
    metadata: Arc<dyn MetadataLookup>,
    browser: Arc<dyn Browser>,
    notifier: Arc<dyn Notifier>,
    state: LocalState,
    gate: ConcurrencyGate,
}

impl Resolver {
    /// Create a resolver with the default concurrency gate.
    pub fn new(
        metadata: Arc<dyn MetadataLookup>,
        browser: Arc<dyn Browser>,
        notifier: Arc<dyn Notifier>,
        state: LocalState,
    ) -> Self {
        Self {
            metadata,
            browser,
            notifier,
            state,
            gate: ConcurrencyGate::default(),
        }
    }

    /// Replace the concurrency gate, e.g. to share it with other work or to
    /// change its capacity.
    pub fn with_gate(mut self, gate: ConcurrencyGate) -> Self {
        self.gate = gate;
        self
    }

    pub(crate) fn metadata(&self) -> &Arc<dyn MetadataLookup> {
        &self.metadata
    }

    pub(crate) fn browser(&self) -> &Arc<dyn Browser> {
        &self.browser
    }

    pub(crate) fn notifier(&self) -> &dyn Notifier {
        &*self.notifier
    }

    pub(crate) fn state(&self) -> &LocalState {
        &self.state
    }

    pub(crate) fn gate(&self) -> &ConcurrencyGate {
        &self.gate
    }

    /// From a set of requires/recommends rules, deduce which artifacts need
    /// to be downloaded and/or installed.
    ///
    /// Only rules of `kind` are expanded. `on_progress` fires once per
    /// settled root rule, in completion order; `on_local_match` fires for
    /// every rule (at any depth) satisfied by an existing download. Branch
    /// failures never fail the call: affected branches are simply absent
    /// from the result.
    pub async fn resolve_all(
        &self,
        rules: &[ModRule],
        kind: RuleKind,
        on_progress: Option<ProgressFn>,
        on_local_match: Option<LocalMatchFn>,
    ) -> Vec<Dependency> {
        let requirements: Vec<ModRule> =
            rules.iter().filter(|rule| rule.kind == kind).cloned().collect();
        let total = requirements.len();

        let pass = Pass {
            resolver: self,
            kind,
            on_local_match: on_local_match.as_ref(),
        };

        let completed = AtomicUsize::new(0);
        let roots = requirements.into_iter().map(|rule| {
            let pass = &pass;
            let completed = &completed;
            let on_progress = on_progress.as_ref();
            async move {
                let node = pass.resolve_rule(rule).await;
                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                if let Some(callback) = on_progress {
                    callback(done, total);
                }
                node
            }
        });

        let mut forest: Vec<Option<DependencyNode>> = join_all(roots).await;

        dedup::tag_duplicates(&mut forest);

        flatten(&forest).into_iter().map(Dependency::from).collect()
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("game_id", &self.state.game_id)
            .field("downloads", &self.state.downloads.len())
            .field("mods", &self.state.mods.len())
            .field("gate", &self.gate)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(name: &str) -> DependencyNode {
        DependencyNode {
            reference: modgraph_schema::ModReference {
                logical_file_name: Some(name.into()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn names(nodes: &[&DependencyNode]) -> Vec<String> {
        nodes
            .iter()
            .filter_map(|n| n.reference.logical_file_name.clone())
            .collect()
    }

    #[test]
    fn test_flatten_is_depth_first() {
        let mut root = leaf("root");
        let mut mid = leaf("mid");
        mid.children.push(leaf("deep"));
        root.children.push(mid);
        root.children.push(leaf("sibling"));

        let forest = vec![Some(root), None, Some(leaf("second"))];
        assert_eq!(names(&flatten(&forest)), vec!["root", "mid", "deep", "sibling", "second"]);
    }

    #[test]
    fn test_flatten_skips_redundant_subtrees() {
        let mut root = leaf("root");
        let mut absorbed = leaf("absorbed");
        absorbed.redundant = true;
        // the child is not itself redundant, but its parent is
        absorbed.children.push(leaf("orphan"));
        root.children.push(absorbed);
        root.children.push(leaf("kept"));

        let forest = vec![Some(root)];
        assert_eq!(names(&flatten(&forest)), vec!["root", "kept"]);
    }

    #[test]
    fn test_flatten_counts_reachable_nodes() {
        let mut root = leaf("root");
        root.children.push(leaf("a"));
        let mut b = leaf("b");
        b.redundant = true;
        b.children.push(leaf("b-child"));
        root.children.push(b);

        let forest = vec![Some(root), None];
        // root, a -- b and b-child are behind the redundant flag
        assert_eq!(flatten(&forest).len(), 2);
    }
}
