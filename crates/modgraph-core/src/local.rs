//! Search over the local download and install indices.
//!
//! Before asking the metadata service about a reference, the engine checks
//! whether a matching archive is already downloaded or a matching artifact
//! already installed. The indices themselves are owned by the host
//! application and passed in as an immutable [`LocalState`] snapshot; this
//! module owns the search logic over them, including the hint-based fast
//! paths that avoid a full scan.

use std::collections::HashMap;

use modgraph_schema::{ModReference, coerce_to_semver};
use serde::{Deserialize, Serialize};

use crate::matcher::{ModLookupInfo, test_mod_reference};

/// Lifecycle state of a download.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadState {
    /// Download still running or paused.
    #[default]
    InProgress,
    /// Archive fully present on disk.
    Finished,
    /// Download failed; the entry is a tombstone.
    Failed,
}

/// Repository/metadata info attached to a download.
///
/// The original sources scatter these over several provenance-specific
/// shapes; the snapshot normalizes them into one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadModInfo {
    /// Artifact version, when known.
    pub version: Option<String>,
    /// Display/logical name, when known.
    pub name: Option<String>,
    /// Repository the download came from.
    pub source: Option<String>,
    /// Tag stamped by a previous reference resolution.
    pub reference_tag: Option<String>,
    /// Repository module id.
    pub mod_id: Option<String>,
    /// Repository file id.
    pub file_id: Option<String>,
}

/// One row of the download index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadEntry {
    /// Content hash of the archive.
    pub file_md5: Option<String>,
    /// Archive path relative to the download directory.
    pub local_path: Option<String>,
    /// Archive size in bytes.
    pub size: Option<u64>,
    /// Completion time, milliseconds since the epoch.
    pub file_time: i64,
    /// Lifecycle state.
    pub state: DownloadState,
    /// Games the archive is valid for.
    pub game: Vec<String>,
    /// Attached metadata.
    pub mod_info: DownloadModInfo,
}

/// One row of the install index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalMod {
    /// Artifact id.
    pub id: String,
    /// Matching attributes.
    pub attributes: ModLookupInfo,
}

impl LocalMod {
    fn lookup_info(&self) -> ModLookupInfo {
        ModLookupInfo {
            id: Some(self.id.clone()),
            ..self.attributes.clone()
        }
    }
}

/// Immutable snapshot of the local indices for one resolution pass.
#[derive(Debug, Clone, Default)]
pub struct LocalState {
    /// Game the resolution runs for.
    pub game_id: String,
    /// Download index, keyed by download id.
    pub downloads: HashMap<String, DownloadEntry>,
    /// Install index for the active game, keyed by artifact id.
    pub mods: HashMap<String, LocalMod>,
}

/// Matching view of a download entry.
pub fn lookup_from_download(download: &DownloadEntry) -> ModLookupInfo {
    ModLookupInfo {
        file_md5: download.file_md5.clone(),
        file_name: download.local_path.clone(),
        logical_file_name: download.mod_info.name.clone(),
        version: download.mod_info.version.clone(),
        game: download.game.clone(),
        source: download.mod_info.source.clone(),
        reference_tag: download.mod_info.reference_tag.clone(),
        mod_id: download.mod_info.mod_id.clone(),
        file_id: download.mod_info.file_id.clone(),
        ..Default::default()
    }
}

/// Order downloads newest-first: by coerced version when both sides have
/// one, by completion time otherwise.
fn newer_sort(lhs: &DownloadEntry, rhs: &DownloadEntry) -> std::cmp::Ordering {
    let lhs_version = lhs.mod_info.version.as_deref().and_then(coerce_to_semver);
    let rhs_version = rhs.mod_info.version.as_deref().and_then(coerce_to_semver);
    match (lhs_version, rhs_version) {
        (Some(l), Some(r)) => r.cmp(&l),
        _ => rhs.file_time.cmp(&lhs.file_time),
    }
}

fn sorted_keys<V>(map: &HashMap<String, V>) -> Vec<&String> {
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();
    keys
}

/// For fuzzy references that carry both a hash and a name, the hash pins one
/// specific (possibly outdated) file; demote it to a fast-path hint so the
/// name/version can match a newer file.
fn demote_hash_of_fuzzy(reference: &ModReference) -> ModReference {
    let mut reference = reference.clone();
    if reference.is_fuzzy()
        && reference.file_md5.is_some()
        && (reference.logical_file_name.is_some() || reference.file_expression.is_some())
    {
        if reference.md5_hint.is_none() {
            reference.md5_hint = reference.file_md5.clone();
        }
        reference.file_md5 = None;
    }
    reference
}

/// Find a download satisfying `reference`, returning its id.
pub fn find_download_by_ref(
    reference: &ModReference,
    downloads: &HashMap<String, DownloadEntry>,
) -> Option<String> {
    if let Some(hint) = &reference.md5_hint {
        let hit = sorted_keys(downloads)
            .into_iter()
            .find(|id| downloads[*id].file_md5.as_ref() == Some(hint));
        if let Some(id) = hit {
            return Some(id.clone());
        }
    }

    let reference = demote_hash_of_fuzzy(reference);
    let fuzzy = reference.is_fuzzy();

    let mut matching: Vec<&String> = downloads
        .iter()
        .filter(|(_, download)| {
            download.state != DownloadState::Failed
                && test_mod_reference(&lookup_from_download(download), &reference, None, Some(fuzzy))
        })
        .map(|(id, _)| id)
        .collect();
    matching.sort_by(|lhs, rhs| newer_sort(&downloads[*lhs], &downloads[*rhs]));
    matching.first().map(|id| (*id).clone())
}

/// Find an installed artifact satisfying `reference`.
pub fn find_mod_by_ref<'a>(
    reference: &ModReference,
    mods: &'a HashMap<String, LocalMod>,
) -> Option<&'a LocalMod> {
    let fuzzy = reference.is_fuzzy();

    // fast path if we have an id from a previous match
    if let Some(id_hint) = &reference.id_hint {
        if let Some(hit) = mods.get(id_hint) {
            if test_mod_reference(&hit.lookup_info(), reference, None, Some(fuzzy)) {
                return Some(hit);
            }
        }
    }

    let reference = demote_hash_of_fuzzy(reference);

    if reference.md5_hint.is_some()
        && reference.installer_choices.is_none()
        && reference.patches.is_none()
        && reference.file_list.is_none()
    {
        let hit = sorted_keys(mods)
            .into_iter()
            .find(|id| mods[*id].attributes.file_md5 == reference.md5_hint);
        if let Some(id) = hit {
            return mods.get(id);
        }
    }

    sorted_keys(mods)
        .into_iter()
        .map(|id| &mods[id])
        .find(|entry| test_mod_reference(&entry.lookup_info(), &reference, None, Some(fuzzy)))
}
