//! Duplicate tagging across the resolved forest.
//!
//! Different branches of the rule graph routinely resolve to the same
//! artifact (two mods both requiring the same library). After the forest is
//! built, every node's authoritative lookup is compared against every other
//! node's reference; nodes whose resolution is subsumed by another node are
//! tagged redundant and later dropped -- together with their subtree --
//! by the flattener.

use std::collections::HashSet;

use modgraph_schema::{ModReference, coerce_to_semver, version_satisfies};

use crate::lookup::LookupResult;
use crate::node::DependencyNode;

/// Whether a candidate lookup would satisfy `reference`.
///
/// Field-by-field comparison; unset reference fields are skipped. When the
/// reference pins a repository file id with exact version matching, a lookup
/// carrying a *different* file id never fulfills, whatever the other fields
/// say -- two files of the same module are distinct artifacts.
pub fn lookup_fulfills(lookup: Option<&LookupResult>, reference: &ModReference) -> bool {
    let Some(lookup) = lookup else {
        return false;
    };
    let value = &lookup.value;

    if let Some(repo) = &reference.repo {
        if let Some(ref_file_id) = &repo.file_id {
            if !reference.is_fuzzy() {
                if let Some(file_id) = &value.details.file_id {
                    if file_id != ref_file_id {
                        return false;
                    }
                }
            }
        }
    }

    reference
        .game_id
        .as_ref()
        .is_none_or(|game_id| value.game_id.as_ref() == Some(game_id))
        && reference
            .file_md5
            .as_ref()
            .is_none_or(|md5| value.file_md5.as_ref() == Some(md5))
        && reference
            .file_size
            .is_none_or(|size| value.file_size == Some(size))
        && reference
            .logical_file_name
            .as_ref()
            .is_none_or(|name| value.logical_file_name.as_ref() == Some(name))
        && reference.file_expression.as_ref().is_none_or(|expression| {
            value.file_name.as_deref().is_some_and(|file_name| {
                glob::Pattern::new(expression).is_ok_and(|pattern| pattern.matches(file_name))
            })
        })
        && reference.version_match.as_ref().is_none_or(|expression| {
            value
                .file_version
                .as_deref()
                .is_some_and(|version| version_satisfies(version, expression))
        })
}

fn sort_version(node: &DependencyNode) -> &str {
    node.lookup_results
        .first()
        .and_then(|lookup| lookup.value.file_version.as_deref())
        .unwrap_or("0.0.1")
}

/// Collect the taggable nodes with stable DFS ids.
///
/// Ids number *every* node so they stay aligned between collection and
/// application; nodes inside an already-redundant subtree are numbered but
/// not collected, mirroring what the flattener will keep.
fn collect<'a>(
    forest: &'a [Option<DependencyNode>],
) -> Vec<(usize, &'a DependencyNode)> {
    fn walk<'a>(
        node: &'a DependencyNode,
        next: &mut usize,
        blocked: bool,
        out: &mut Vec<(usize, &'a DependencyNode)>,
    ) {
        let id = *next;
        *next += 1;
        let blocked = blocked || node.redundant;
        if !blocked {
            out.push((id, node));
        }
        for child in &node.children {
            walk(child, next, blocked, out);
        }
    }

    let mut out = Vec::new();
    let mut next = 0;
    for root in forest.iter().flatten() {
        walk(root, &mut next, false, &mut out);
    }
    out
}

fn compute_redundant(candidates: &[(usize, &DependencyNode)]) -> HashSet<usize> {
    // for every node, the set of other nodes its authoritative lookup would
    // also satisfy
    let collateral: Vec<Vec<usize>> = candidates
        .iter()
        .map(|(id, node)| {
            candidates
                .iter()
                .enumerate()
                .filter(|(_, (other_id, other))| {
                    other_id != id && lookup_fulfills(node.lookup_results.first(), &other.reference)
                })
                .map(|(position, _)| position)
                .collect()
        })
        .collect();

    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by(|&lhs, &rhs| {
        collateral[rhs]
            .len()
            .cmp(&collateral[lhs].len())
            .then_with(|| {
                // within blocks of equal collateral count, prefer the newer
                // version
                let lhs_version = sort_version(candidates[lhs].1);
                let rhs_version = sort_version(candidates[rhs].1);
                match (coerce_to_semver(lhs_version), coerce_to_semver(rhs_version)) {
                    (Some(l), Some(r)) => r.cmp(&l),
                    _ => {
                        tracing::error!(lhs = lhs_version, rhs = rhs_version, "failed to compare versions");
                        rhs_version.cmp(lhs_version)
                    }
                }
            })
    });

    // greedy cover: the node with the largest collateral set is kept and
    // absorbs the others first; smaller sets may eliminate more in theory
    // but not in any graph seen in practice
    let mut redundant = HashSet::new();
    for &position in &order {
        if redundant.contains(&candidates[position].0) {
            continue;
        }
        for &absorbed in &collateral[position] {
            redundant.insert(candidates[absorbed].0);
        }
    }
    redundant
}

fn apply(forest: &mut [Option<DependencyNode>], redundant: &HashSet<usize>) {
    fn walk(node: &mut DependencyNode, next: &mut usize, redundant: &HashSet<usize>) {
        let id = *next;
        *next += 1;
        if redundant.contains(&id) {
            node.redundant = true;
        }
        for child in &mut node.children {
            walk(child, next, redundant);
        }
    }

    let mut next = 0;
    for root in forest.iter_mut().flatten() {
        walk(root, &mut next, redundant);
    }
}

/// Tag nodes whose resolution is subsumed by another node in the forest.
///
/// Idempotent: nodes already tagged (and their subtrees) are excluded from
/// the batch, and survivors of a previous pass never fulfill each other.
pub fn tag_duplicates(forest: &mut [Option<DependencyNode>]) {
    let candidates = collect(forest);
    let redundant = compute_redundant(&candidates);
    drop(candidates);
    if !redundant.is_empty() {
        apply(forest, &redundant);
    }
}
