//! Candidate matches for a reference.
//!
//! A [`LookupResult`] is one candidate artifact for a reference, either
//! reported by the metadata service or synthesized from a download hint.
//! Within a dependency node the result at index 0 is authoritative; the
//! rest are alternates kept for diagnostics and manual overrides.

use modgraph_schema::ModRule;

use crate::error::ResolveError;
use crate::hint::HintSource;

/// Where a candidate can be fetched from.
///
/// Service-reported candidates carry a fixed url; hint-derived candidates
/// defer to the lazy [`HintSource`] so an interactive prompt only fires when
/// the url is actually needed.
#[derive(Debug, Clone)]
pub enum SourceUri {
    /// A url known up front, with an optional referer.
    Fixed {
        /// Download url.
        url: String,
        /// Referer to request it with.
        referer: Option<String>,
    },
    /// A lazily resolved hint source.
    Hint(HintSource),
}

impl SourceUri {
    /// Convenience constructor for a plain url.
    pub fn url(url: impl Into<String>) -> Self {
        Self::Fixed {
            url: url.into(),
            referer: None,
        }
    }

    /// Resolve the download url. May prompt the user on first read of a
    /// hint-derived source.
    pub async fn resolve_url(&self) -> Result<String, ResolveError> {
        match self {
            Self::Fixed { url, .. } => Ok(url.clone()),
            Self::Hint(source) => source.url().await,
        }
    }

    /// Resolve the referer, if any.
    pub async fn resolve_referer(&self) -> Result<Option<String>, ResolveError> {
        match self {
            Self::Fixed { referer, .. } => Ok(referer.clone()),
            Self::Hint(source) => source.referer().await,
        }
    }
}

/// Secondary identification data attached to a candidate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupDetails {
    /// Repository module id.
    pub mod_id: Option<String>,
    /// Repository file id, used to tell apart files of the same module.
    pub file_id: Option<String>,
    /// Project homepage.
    pub homepage: Option<String>,
}

/// Attributes of one candidate artifact.
#[derive(Debug, Clone, Default)]
pub struct LookupInfo {
    /// Game the artifact belongs to.
    pub game_id: Option<String>,
    /// Content hash of the archive.
    pub file_md5: Option<String>,
    /// Archive size in bytes.
    pub file_size: Option<u64>,
    /// Archive file name.
    pub file_name: Option<String>,
    /// Artifact version.
    pub file_version: Option<String>,
    /// Repository-assigned logical name.
    pub logical_file_name: Option<String>,
    /// Where to fetch the artifact.
    pub source: Option<SourceUri>,
    /// Secondary identification data.
    pub details: LookupDetails,
    /// Transitive rules the artifact declares.
    pub rules: Vec<ModRule>,
}

/// One candidate match: a stable key plus the candidate's attributes.
#[derive(Debug, Clone, Default)]
pub struct LookupResult {
    /// Identifies the candidate within the metadata service (or marks it as
    /// hint-derived).
    pub key: String,
    /// Candidate attributes.
    pub value: LookupInfo,
}

impl LookupResult {
    /// Override the candidate's source with a hint-derived one.
    ///
    /// When a download hint resolved, every candidate of the node defers to
    /// it -- the user's explicit pick beats whatever the service reported.
    pub(crate) fn with_hint_source(mut self, source: &HintSource) -> Self {
        self.value.source = Some(SourceUri::Hint(source.clone()));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixed_source_resolution() {
        let source = SourceUri::Fixed {
            url: "https://cdn.example.com/a.7z".into(),
            referer: Some("https://example.com".into()),
        };
        assert_eq!(source.resolve_url().await.unwrap(), "https://cdn.example.com/a.7z");
        assert_eq!(
            source.resolve_referer().await.unwrap().as_deref(),
            Some("https://example.com")
        );

        let plain = SourceUri::url("https://cdn.example.com/b.7z");
        assert_eq!(plain.resolve_referer().await.unwrap(), None);
    }
}
