//! Reference matching against local artifacts.
//!
//! Decides whether a candidate (an installed artifact or a finished
//! download) satisfies a [`ModReference`]. Matching is deliberately
//! defensive: a reference with no field that *could* identify the candidate
//! matches nothing, otherwise references consisting only of helper fields
//! would match arbitrary artifacts.

use std::path::Path;
use std::sync::OnceLock;

use modgraph_schema::{FileListItem, ModReference, safe_coerce, version_satisfies};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Normalized attribute view of a local artifact or download, as consumed by
/// the matcher.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModLookupInfo {
    /// Artifact id in the current setup, when known.
    pub id: Option<String>,
    /// Content hash of the archive.
    pub file_md5: Option<String>,
    /// Archive file name on disk.
    pub file_name: Option<String>,
    /// Display name.
    pub name: Option<String>,
    /// Repository-assigned logical name.
    pub logical_file_name: Option<String>,
    /// Further logical names the artifact is known under.
    pub additional_logical_file_names: Vec<String>,
    /// User-assigned name override.
    pub custom_file_name: Option<String>,
    /// Artifact version.
    pub version: Option<String>,
    /// Games the artifact is valid for.
    pub game: Vec<String>,
    /// Repository module id.
    pub mod_id: Option<String>,
    /// Repository file id.
    pub file_id: Option<String>,
    /// Repository the artifact came from.
    pub source: Option<String>,
    /// Tag stamped by a previous reference resolution.
    pub reference_tag: Option<String>,
    /// Installer choices the artifact was installed with.
    pub installer_choices: Option<serde_json::Value>,
    /// Patches the artifact was installed with.
    pub patches: Option<serde_json::Value>,
    /// File list the artifact was installed with.
    pub file_list: Option<Vec<FileListItem>>,
}

/// Identifies the artifact whose rule is being resolved, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceContext {
    /// Game of the declaring artifact.
    pub game_id: String,
    /// Id of the declaring artifact.
    pub mod_id: String,
}

fn trailing_counter_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\.\d+$").expect("static regex"))
}

fn browser_copy_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r" \(\d+\)$").expect("static regex"))
}

/// Reduce an archive file name to the form file expressions are written
/// against: no extension, no duplicate-download counters (`.1`, ` (1)`).
pub fn sanitize_expression(file_name: &str) -> String {
    let base = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);
    let base = trailing_counter_re().replace(base, "");
    browser_copy_re().replace(&base, "").into_owned()
}

fn has_identifying_marker(
    candidate: &ModLookupInfo,
    reference: &ModReference,
    fuzzy: bool,
    allow_tag: bool,
) -> bool {
    (reference.id.is_some() && candidate.id.is_some())
        || (!fuzzy && candidate.file_md5.is_some())
        || (reference.file_expression.is_some()
            && (candidate.file_name.is_some() || candidate.name.is_some()))
        || (reference.logical_file_name.is_some() && candidate.logical_file_name.is_some())
        || (reference.repo.is_some() && candidate.source.is_some())
        || (allow_tag && reference.tag.is_some() && candidate.reference_tag.is_some())
}

fn payload_set(value: Option<&serde_json::Value>) -> bool {
    match value {
        None => false,
        Some(serde_json::Value::Object(map)) => !map.is_empty(),
        Some(serde_json::Value::Null) => false,
        Some(_) => true,
    }
}

fn glob_matches(name: &str, expression: &str) -> bool {
    glob::Pattern::new(expression).is_ok_and(|pattern| pattern.matches(name))
}

/// Test whether `candidate` satisfies `reference`.
///
/// `fuzzy` is whether the reference's version expression is a range rather
/// than a pin; deriving it is not free, so callers doing many comparisons
/// against one reference compute it once and pass it in. `source` names the
/// artifact whose rule is being resolved and only affects diagnostics.
pub fn test_mod_reference(
    candidate: &ModLookupInfo,
    reference: &ModReference,
    source: Option<&SourceContext>,
    fuzzy: Option<bool>,
) -> bool {
    // if an id is set, it has to match
    if reference.id.is_some()
        && (candidate.id.is_some() || reference.is_id_only())
        && reference.id != candidate.id
    {
        return false;
    }

    let fuzzy = fuzzy.unwrap_or_else(|| reference.is_fuzzy());

    if !has_identifying_marker(candidate, reference, fuzzy, true) {
        return false;
    }

    if payload_set(reference.installer_choices.as_ref())
        && candidate.installer_choices != reference.installer_choices
    {
        return false;
    }

    if reference.file_list.as_ref().is_some_and(|list| !list.is_empty())
        && candidate.file_list != reference.file_list
    {
        return false;
    }

    if payload_set(reference.patches.as_ref())
        && reference.tag.is_some()
        && candidate.patches != reference.patches
        && candidate.patches.is_some()
        && candidate.reference_tag != reference.tag
    {
        return false;
    }

    if let Some(tag) = &reference.tag {
        if candidate.reference_tag.as_ref() == Some(tag) {
            return true;
        }
        // tags differ; without a stricter marker this would match any kind
        // of unrelated artifact
        if !has_identifying_marker(candidate, reference, fuzzy, false) {
            return false;
        }
    }

    // a reference by file hash with a pinned version requires the hash to
    // match; fuzzy references may legitimately resolve to a newer file
    if reference.file_md5.as_deref().is_some_and(|md5| !md5.is_empty())
        && !fuzzy
        && candidate.file_md5 != reference.file_md5
    {
        return false;
    }

    if let Some(repo) = &reference.repo {
        if Some(repo.repository.as_str()) != candidate.source.as_deref()
            || repo.mod_id != candidate.mod_id.as_deref().unwrap_or("-1")
        {
            return false;
        }
        if !fuzzy {
            // same repo and module; file id equality is definitive either way
            return repo.file_id.as_deref() == Some(candidate.file_id.as_deref().unwrap_or("-1"));
        }
    }

    if let Some(logical_name) = &reference.logical_file_name {
        let direct = candidate.logical_file_name.as_ref() == Some(logical_name)
            || candidate.custom_file_name.as_ref() == Some(logical_name)
            || candidate.additional_logical_file_names.contains(logical_name);
        if !direct && reference.file_expression.is_none() {
            return false;
        }
    }

    if let Some(expression) = &reference.file_expression {
        match &candidate.file_name {
            // no archive on record; the expression can only match the name
            // exactly
            None => {
                if candidate.name.as_ref() != Some(expression) {
                    return false;
                }
            }
            Some(file_name) => {
                let base = sanitize_expression(file_name);
                if &base != expression && !glob_matches(&base, expression) {
                    return false;
                }
            }
        }
    }

    if let Some(version_match) = &reference.version_match {
        let version = candidate.version.as_deref().unwrap_or("");
        if version_match != "*" && !version.is_empty() {
            let expression = version_match.split('+').next().unwrap_or(version_match);
            let hash_override =
                reference.file_md5.is_some() && reference.file_md5 == candidate.file_md5;
            let direct = version == version_match
                || safe_coerce(version) == safe_coerce(expression)
                || hash_override;
            if !direct && !version_satisfies(version, expression) {
                return false;
            }
        }
    }

    if let Some(game_id) = &reference.game_id {
        if !candidate.game.is_empty() && !candidate.game.contains(game_id) {
            return false;
        }
    }

    if let Some(context) = source {
        if candidate.id.is_some() && reference.id_hint != candidate.id {
            tracing::trace!(
                game = %context.game_id,
                declaring = %context.mod_id,
                resolved = ?candidate.id,
                "reference resolved to a different artifact than its id hint"
            );
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use modgraph_schema::RepoRef;

    fn candidate() -> ModLookupInfo {
        ModLookupInfo {
            id: Some("skyui".into()),
            file_md5: Some("aabbcc".into()),
            file_name: Some("SkyUI_5_1-3863-5-1.7z".into()),
            logical_file_name: Some("SkyUI".into()),
            version: Some("5.1.0".into()),
            game: vec!["skyrim".into()],
            mod_id: Some("3863".into()),
            file_id: Some("1000".into()),
            source: Some("nexus".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_sanitize_expression_strips_noise() {
        assert_eq!(sanitize_expression("SkyUI_5_1-3863-5-1.7z"), "SkyUI_5_1-3863-5-1");
        assert_eq!(sanitize_expression("SkyUI (2).zip"), "SkyUI");
        // one extension comes off, then a duplicate-download counter
        assert_eq!(sanitize_expression("Mod-1.2.7z"), "Mod-1");
    }

    #[test]
    fn test_unmarked_reference_matches_nothing() {
        let reference = ModReference {
            version_match: Some("^1.0".into()),
            ..Default::default()
        };
        assert!(!test_mod_reference(&candidate(), &reference, None, None));
    }

    #[test]
    fn test_logical_name_and_version_range() {
        let reference = ModReference {
            logical_file_name: Some("SkyUI".into()),
            version_match: Some("^5.0.0".into()),
            ..Default::default()
        };
        assert!(test_mod_reference(&candidate(), &reference, None, None));

        let too_new = ModReference {
            version_match: Some("^6.0.0".into()),
            ..reference
        };
        assert!(!test_mod_reference(&candidate(), &too_new, None, None));
    }

    #[test]
    fn test_file_expression_glob() {
        let reference = ModReference {
            file_expression: Some("SkyUI_5_1*".into()),
            version_match: Some("*".into()),
            ..Default::default()
        };
        assert!(test_mod_reference(&candidate(), &reference, None, None));

        let miss = ModReference {
            file_expression: Some("SomethingElse*".into()),
            ..Default::default()
        };
        assert!(!test_mod_reference(&candidate(), &miss, None, None));
    }

    #[test]
    fn test_pinned_version_requires_hash_match() {
        let reference = ModReference {
            logical_file_name: Some("SkyUI".into()),
            file_md5: Some("other".into()),
            version_match: Some("5.1.0".into()),
            ..Default::default()
        };
        assert!(!test_mod_reference(&candidate(), &reference, None, None));

        let fuzzy = ModReference {
            version_match: Some("^5.0.0".into()),
            ..reference
        };
        assert!(test_mod_reference(&candidate(), &fuzzy, None, None));
    }

    #[test]
    fn test_exact_repo_reference_decides_by_file_id() {
        let matching = ModReference {
            repo: Some(RepoRef {
                repository: "nexus".into(),
                mod_id: "3863".into(),
                file_id: Some("1000".into()),
            }),
            version_match: Some("5.1.0".into()),
            ..Default::default()
        };
        assert!(test_mod_reference(&candidate(), &matching, None, None));

        let other_file = ModReference {
            repo: Some(RepoRef {
                repository: "nexus".into(),
                mod_id: "3863".into(),
                file_id: Some("2000".into()),
            }),
            ..matching.clone()
        };
        assert!(!test_mod_reference(&candidate(), &other_file, None, None));

        // fuzzy references fall through to the version check instead
        let fuzzy = ModReference {
            version_match: Some("^5.0.0".into()),
            ..other_file
        };
        assert!(test_mod_reference(&candidate(), &fuzzy, None, None));
    }

    #[test]
    fn test_reference_tag_short_circuits() {
        let mut tagged = candidate();
        tagged.reference_tag = Some("tag-1".into());
        // version would not match, but the tag wins
        let reference = ModReference {
            tag: Some("tag-1".into()),
            logical_file_name: Some("SkyUI".into()),
            version_match: Some("9.9.9".into()),
            ..Default::default()
        };
        assert!(test_mod_reference(&tagged, &reference, None, None));
    }

    #[test]
    fn test_id_only_reference_matches_by_id() {
        let reference = ModReference {
            id: Some("skyui".into()),
            ..Default::default()
        };
        assert!(test_mod_reference(&candidate(), &reference, None, None));

        let other = ModReference {
            id: Some("someone-else".into()),
            ..Default::default()
        };
        assert!(!test_mod_reference(&candidate(), &other, None, None));
    }

    #[test]
    fn test_wrong_game_is_rejected() {
        let reference = ModReference {
            logical_file_name: Some("SkyUI".into()),
            game_id: Some("fallout4".into()),
            ..Default::default()
        };
        assert!(!test_mod_reference(&candidate(), &reference, None, None));
    }
}
