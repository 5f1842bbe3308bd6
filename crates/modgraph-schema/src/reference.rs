//! References, rules and download hints.
//!
//! A [`ModReference`] describes a desired artifact by whatever the rule
//! author knew about it: a content hash, a logical name, a glob over archive
//! names, a version expression, a repository coordinate -- any subset. A
//! [`ModRule`] wraps a reference with the relationship kind (required vs.
//! recommended) and optional discovery/install payload.

use serde::{Deserialize, Serialize};

use crate::version::is_fuzzy_version;

/// Repository coordinate of an artifact: which repository, which module in
/// it, and optionally which exact file of that module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoRef {
    /// Repository identifier (e.g. `nexus`).
    pub repository: String,
    /// Module id within the repository.
    pub mod_id: String,
    /// Exact file id within the module, when the rule pins one.
    pub file_id: Option<String>,
}

/// One entry of an explicit install-file list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileListItem {
    /// Path of the file inside the artifact.
    pub path: String,
    /// Expected content hash of that file.
    pub md5: Option<String>,
}

/// Specification of a desired artifact.
///
/// All fields are optional; matching skips unset fields. The `*_hint` fields
/// are not part of the artifact's identity -- they are fast-path bookmarks
/// from earlier resolutions and may be stale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModReference {
    /// Known artifact id in the current setup, when already resolved.
    pub id: Option<String>,
    /// Bookmark: id this reference resolved to in a previous run.
    pub id_hint: Option<String>,
    /// Bookmark: content hash to try before a full scan.
    pub md5_hint: Option<String>,
    /// Tag stamped onto an artifact when this reference first resolved.
    pub tag: Option<String>,
    /// Game the artifact belongs to.
    pub game_id: Option<String>,
    /// Content hash of the artifact archive.
    pub file_md5: Option<String>,
    /// Size of the artifact archive in bytes.
    pub file_size: Option<u64>,
    /// Repository-assigned logical name.
    pub logical_file_name: Option<String>,
    /// Glob-style expression over the (sanitized) archive file name.
    pub file_expression: Option<String>,
    /// Version match expression, pinned (`1.2.3`) or fuzzy (`^1.2`, `*`).
    pub version_match: Option<String>,
    /// Repository coordinate.
    pub repo: Option<RepoRef>,
    /// Human-readable description, used in error reporting.
    pub description: Option<String>,
    /// Installer choices the artifact must have been installed with.
    pub installer_choices: Option<serde_json::Value>,
    /// Patches the artifact must have been installed with.
    pub patches: Option<serde_json::Value>,
    /// Explicit file list the artifact must have been installed with.
    pub file_list: Option<Vec<FileListItem>>,
}

impl ModReference {
    /// Whether the version match expression (if any) is fuzzy.
    pub fn is_fuzzy(&self) -> bool {
        self.version_match.as_deref().is_some_and(is_fuzzy_version)
    }

    /// Whether this reference identifies its target by id alone.
    ///
    /// Such references are only meaningful in the setup that produced them,
    /// so id equality overrides everything else when testing them.
    pub fn is_id_only(&self) -> bool {
        self.id.is_some()
            && self.md5_hint.is_none()
            && self.tag.is_none()
            && self.game_id.is_none()
            && self.file_md5.is_none()
            && self.file_size.is_none()
            && self.logical_file_name.is_none()
            && self.file_expression.is_none()
            && self.repo.is_none()
    }
}

/// How a download hint expects the artifact to be obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HintMode {
    /// The url points straight at the file.
    Direct,
    /// The user picks the file interactively starting from the url.
    Browse,
    /// Manual acquisition; with a url this behaves like `Browse`, without
    /// one the branch cannot be resolved automatically at all.
    Manual,
}

/// Out-of-band instruction for finding an artifact's source when no local
/// copy exists and the metadata service has nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadHint {
    /// Acquisition mode.
    pub mode: HintMode,
    /// Starting point url, mandatory for `Direct`.
    pub url: Option<String>,
    /// Instructions shown to the user during interactive acquisition.
    pub instructions: Option<String>,
}

/// Relationship kind of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    /// The target is required for the declaring package to work.
    Requires,
    /// The target is suggested but optional.
    Recommends,
}

/// Free-form payload attached to a rule by the declaring package.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleExtra {
    /// Install ordering phase; lower phases install first.
    pub phase: Option<u32>,
    /// Patches to apply when installing the target.
    pub patches: Option<serde_json::Value>,
    /// Nested rules to expand in addition to whatever the metadata service
    /// reports for the target.
    pub rules: Vec<ModRule>,
}

/// A single requirement/recommendation declared by a package.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModRule {
    /// Relationship kind.
    pub kind: RuleKind,
    /// What the rule points at.
    pub reference: ModReference,
    /// Out-of-band discovery instruction.
    pub download_hint: Option<DownloadHint>,
    /// Installer choices to install the target with.
    pub installer_choices: Option<serde_json::Value>,
    /// Explicit file list to install the target with.
    pub file_list: Option<Vec<FileListItem>>,
    /// Rule author's comment, used in error reporting.
    pub comment: Option<String>,
    /// Explicitly disabled rules are never expanded.
    pub ignored: bool,
    /// Additional payload.
    pub extra: Option<RuleExtra>,
}

impl Default for RuleKind {
    fn default() -> Self {
        Self::Requires
    }
}

impl ModRule {
    /// Install ordering phase, defaulting to 0.
    pub fn phase(&self) -> u32 {
        self.extra.as_ref().and_then(|e| e.phase).unwrap_or(0)
    }

    /// Nested rules declared inline on this rule.
    pub fn nested_rules(&self) -> &[ModRule] {
        self.extra.as_ref().map_or(&[], |e| e.rules.as_slice())
    }

    /// Patches declared for the target.
    pub fn patches(&self) -> Option<&serde_json::Value> {
        self.extra.as_ref().and_then(|e| e.patches.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_only_reference() {
        let reference = ModReference {
            id: Some("abc".into()),
            id_hint: Some("abc".into()),
            version_match: Some("*".into()),
            ..Default::default()
        };
        assert!(reference.is_id_only());

        let with_md5 = ModReference {
            file_md5: Some("d41d8cd9".into()),
            ..reference
        };
        assert!(!with_md5.is_id_only());
    }

    #[test]
    fn test_reference_fuzziness() {
        let fuzzy = ModReference {
            version_match: Some("^1.0".into()),
            ..Default::default()
        };
        assert!(fuzzy.is_fuzzy());

        let pinned = ModReference {
            version_match: Some("1.0.0".into()),
            ..Default::default()
        };
        assert!(!pinned.is_fuzzy());

        assert!(!ModReference::default().is_fuzzy());
    }

    #[test]
    fn test_rule_phase_defaults() {
        let rule = ModRule::default();
        assert_eq!(rule.phase(), 0);
        assert!(rule.nested_rules().is_empty());

        let phased = ModRule {
            extra: Some(RuleExtra {
                phase: Some(2),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(phased.phase(), 2);
    }

    #[test]
    fn test_rule_roundtrip() {
        let rule = ModRule {
            kind: RuleKind::Recommends,
            reference: ModReference {
                logical_file_name: Some("Core Library".into()),
                version_match: Some("^2.0".into()),
                ..Default::default()
            },
            download_hint: Some(DownloadHint {
                mode: HintMode::Browse,
                url: Some("example.com/files".into()),
                instructions: Some("pick the main file".into()),
            }),
            ..Default::default()
        };

        let json = serde_json::to_string(&rule).unwrap();
        let back: ModRule = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rule);
    }
}
