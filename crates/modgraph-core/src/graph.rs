//! Recursive graph building: one rule in, one dependency node out.
//!
//! Every rule becomes its own branch. A branch looks for local matches,
//! resolves its download hint, asks the metadata service for candidates and
//! then expands the transitive rules of whatever it found, each gated by
//! the shared [`ConcurrencyGate`](crate::gate::ConcurrencyGate). Branches
//! fail independently: an error is reported (or, for intentional
//! cancellation, swallowed) and the branch resolves to `None` without
//! disturbing siblings or ancestors.

use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use modgraph_schema::{HintMode, ModReference, ModRule, RuleKind};

use crate::api::LocalMatchFn;
use crate::error::ResolveError;
use crate::hint::{Rehint, lookup_download_hint};
use crate::local::{find_download_by_ref, find_mod_by_ref};
use crate::lookup::{LookupDetails, LookupInfo, LookupResult, SourceUri};
use crate::node::DependencyNode;
use crate::resolver::Resolver;

/// One resolution pass over the rule graph: requires or recommends, never
/// both at once.
pub(crate) struct Pass<'a> {
    pub(crate) resolver: &'a Resolver,
    pub(crate) kind: RuleKind,
    pub(crate) on_local_match: Option<&'a LocalMatchFn>,
}

/// The rule's reference with the rule-level install payload folded in, as
/// used for matching against installed artifacts.
fn reference_with_payload(rule: &ModRule) -> ModReference {
    ModReference {
        file_list: rule.file_list.clone(),
        patches: rule.patches().cloned(),
        installer_choices: rule.installer_choices.clone(),
        ..rule.reference.clone()
    }
}

fn rule_context(rule: &ModRule) -> Option<&str> {
    rule.download_hint
        .as_ref()
        .and_then(|hint| hint.url.as_deref())
        .or(rule.comment.as_deref())
        .or(rule.reference.description.as_deref())
}

impl Pass<'_> {
    /// Resolve one rule into a node, recursing into its sub-rules.
    ///
    /// This is the branch boundary of the failure model: whatever goes wrong
    /// below resolves to `None` here and never propagates upward.
    pub(crate) fn resolve_rule(&self, rule: ModRule) -> BoxFuture<'_, Option<DependencyNode>> {
        async move {
            match self.resolve_rule_inner(&rule).await {
                Ok(node) => Some(node),
                Err(err) if err.is_silent() => None,
                Err(err) => {
                    self.resolver.notifier().notify_error(
                        "Failed to look up dependency",
                        &err,
                        rule_context(&rule),
                    );
                    tracing::error!(
                        error = %err,
                        reference = ?rule.reference.logical_file_name,
                        "failed to look up dependency"
                    );
                    None
                }
            }
        }
        .boxed()
    }

    async fn resolve_rule_inner(&self, rule: &ModRule) -> Result<DependencyNode, ResolveError> {
        let resolver = self.resolver;
        let state = resolver.state();

        // the permit covers this branch's own unit of work and is released
        // before descending into children
        let permit = resolver.gate().admit().await?;

        let download_id = find_download_by_ref(&rule.reference, &state.downloads);
        match &download_id {
            Some(id) => {
                if let Some(callback) = self.on_local_match {
                    callback(&state.downloads[id]);
                }
            }
            None => {
                tracing::debug!(
                    reference = ?rule.reference.logical_file_name,
                    "no matching download"
                );
            }
        }

        if rule.reference.file_md5.is_some() {
            // non-blocking warm-up; the discarded result primes the metadata
            // service's cache for the lookup below
            let metadata = resolver.metadata().clone();
            let warm = ModReference {
                file_md5: rule.reference.file_md5.clone(),
                game_id: rule.reference.game_id.clone(),
                file_size: rule.reference.file_size,
                ..Default::default()
            };
            tokio::spawn(async move {
                let _ = metadata.lookup(&warm, false).await;
            });
        }

        let local_mod = find_mod_by_ref(&reference_with_payload(rule), &state.mods).cloned();

        let hint_source = if download_id.is_none() {
            lookup_download_hint(resolver.browser(), rule.download_hint.as_ref()).await?
        } else {
            None
        };
        if hint_source.is_some() {
            tracing::info!(md5 = ?rule.reference.file_md5, "url from dependency hint");
        }

        let service_results = resolver
            .metadata()
            .lookup(&rule.reference, true)
            .await
            .map_err(ResolveError::lookup)?;

        drop(permit);

        let mut sub_rules: Vec<ModRule> = rule.nested_rules().to_vec();
        if let Some(authoritative) = service_results.first() {
            sub_rules.extend(authoritative.value.rules.iter().cloned());
        }
        sub_rules.retain(|sub| sub.kind == self.kind && !sub.ignored);

        let children: Vec<DependencyNode> =
            join_all(sub_rules.into_iter().map(|sub| self.resolve_rule(sub)))
                .await
                .into_iter()
                .flatten()
                .collect();

        let mut lookup_results: Vec<LookupResult> = match &hint_source {
            // the user's explicit pick beats whatever the service reported
            Some(source) => service_results
                .into_iter()
                .map(|result| result.with_hint_source(source))
                .collect(),
            None => service_results,
        };

        let mut rehint = None;
        if let (Some(source), Some(hint)) = (&hint_source, &rule.download_hint) {
            lookup_results.insert(
                0,
                LookupResult {
                    key: "from-download-hint".into(),
                    value: LookupInfo {
                        game_id: rule.reference.game_id.clone(),
                        file_md5: rule.reference.file_md5.clone(),
                        file_size: rule.reference.file_size,
                        file_name: rule.reference.logical_file_name.clone(),
                        file_version: None,
                        logical_file_name: None,
                        source: Some(SourceUri::Hint(source.clone())),
                        details: LookupDetails {
                            homepage: hint.url.clone(),
                            ..Default::default()
                        },
                        rules: Vec::new(),
                    },
                },
            );

            // the user may have picked the wrong link, which only becomes
            // apparent once the file is actually downloaded -- possibly
            // hours from now, after the source url expired
            if hint.mode == HintMode::Browse
                || (hint.mode == HintMode::Manual && hint.url.is_some())
            {
                rehint = Some(Rehint::new(resolver.browser().clone(), hint.clone()));
            }
        }

        Ok(DependencyNode {
            download_id,
            local_mod,
            reference: rule.reference.clone(),
            lookup_results,
            children,
            redundant: false,
            file_list: rule.file_list.clone(),
            installer_choices: rule.installer_choices.clone(),
            patches: rule.patches().cloned(),
            extra: rule.extra.clone(),
            phase: rule.phase(),
            rehint,
        })
    }
}
