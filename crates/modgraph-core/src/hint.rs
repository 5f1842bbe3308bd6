//! Download-hint resolution.
//!
//! A rule that cannot be satisfied locally may carry a [`DownloadHint`]
//! telling the engine where the artifact can be obtained. Direct hints
//! resolve to a fixed url; browse-style hints resolve to a *lazy* source
//! that opens the interactive browse prompt at most once, on first read,
//! and memoizes the outcome (success or failure) for every later reader.

use std::fmt;
use std::sync::Arc;

use modgraph_schema::{DownloadHint, HintMode};
use tokio::sync::OnceCell;
use url::Url;

use crate::api::Browser;
use crate::error::ResolveError;

/// A fully resolved source location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedHint {
    /// Direct download url.
    pub url: String,
    /// Referer the download must be requested with, if any.
    pub referer: Option<String>,
}

enum HintInner {
    Fixed(ResolvedHint),
    Interactive {
        browser: Arc<dyn Browser>,
        url: String,
        instructions: Option<String>,
        cell: OnceCell<Result<ResolvedHint, ResolveError>>,
    },
}

/// Lazily resolved source produced from a download hint.
///
/// Clones share the same underlying resolution; the interactive prompt is
/// triggered at most once per hint and only if the source is actually read.
#[derive(Clone)]
pub struct HintSource {
    inner: Arc<HintInner>,
}

impl HintSource {
    fn fixed(url: String) -> Self {
        Self {
            inner: Arc::new(HintInner::Fixed(ResolvedHint { url, referer: None })),
        }
    }

    fn interactive(browser: Arc<dyn Browser>, url: String, instructions: Option<String>) -> Self {
        Self {
            inner: Arc::new(HintInner::Interactive {
                browser,
                url,
                instructions,
                cell: OnceCell::new(),
            }),
        }
    }

    /// Resolve the source, prompting the user if this is an interactive hint
    /// that has not been read before.
    pub async fn resolve(&self) -> Result<ResolvedHint, ResolveError> {
        match &*self.inner {
            HintInner::Fixed(resolved) => Ok(resolved.clone()),
            HintInner::Interactive {
                browser,
                url,
                instructions,
                cell,
            } => cell
                .get_or_init(|| browse_once(Arc::clone(browser), url.clone(), instructions.clone()))
                .await
                .clone(),
        }
    }

    /// The source url.
    pub async fn url(&self) -> Result<String, ResolveError> {
        self.resolve().await.map(|r| r.url)
    }

    /// The referer to request the url with.
    pub async fn referer(&self) -> Result<Option<String>, ResolveError> {
        self.resolve().await.map(|r| r.referer)
    }
}

impl fmt::Debug for HintSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.inner {
            HintInner::Fixed(resolved) => f.debug_tuple("HintSource::Fixed").field(resolved).finish(),
            HintInner::Interactive { url, cell, .. } => f
                .debug_struct("HintSource::Interactive")
                .field("url", url)
                .field("resolved", &cell.get().is_some())
                .finish(),
        }
    }
}

async fn browse_once(
    browser: Arc<dyn Browser>,
    url: String,
    instructions: Option<String>,
) -> Result<ResolvedHint, ResolveError> {
    let response = browser
        .browse(&url, instructions.as_deref())
        .await
        .map_err(ResolveError::lookup)?;

    let Some(response) = response else {
        return Err(ResolveError::NotFound("no download found browsing url".into()));
    };

    if let Some(reason) = response.strip_prefix("err:") {
        return Err(match reason {
            "skip" => ResolveError::UserCanceled { skipped: true },
            "cancel" => ResolveError::UserCanceled { skipped: false },
            other => ResolveError::Lookup(other.to_string()),
        });
    }

    match response.split_once('<') {
        Some((picked, referer)) => Ok(ResolvedHint {
            url: picked.to_string(),
            referer: (!referer.is_empty()).then(|| referer.to_string()),
        }),
        None => Ok(ResolvedHint {
            url: response,
            referer: None,
        }),
    }
}

/// Normalize a hint url, defaulting the scheme to `https`.
fn normalize_url(input: Option<&str>) -> Result<String, ResolveError> {
    let raw = input.unwrap_or("").trim();
    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    };
    Url::parse(&with_scheme)
        .map(|url| url.to_string())
        .map_err(|_| {
            ResolveError::NotFound(format!(
                "invalid url set for external dependency: \"{}\"",
                input.unwrap_or("<unset>")
            ))
        })
}

/// Resolve a download hint into a (possibly lazy) source.
///
/// `None` hints resolve to `Ok(None)` immediately. A `Manual` hint without a
/// url is not resolvable without user interaction and raises
/// [`ResolveError::ProcessCanceled`], which callers drop silently.
pub async fn lookup_download_hint(
    browser: &Arc<dyn Browser>,
    hint: Option<&DownloadHint>,
) -> Result<Option<HintSource>, ResolveError> {
    let Some(hint) = hint else {
        return Ok(None);
    };

    match hint.mode {
        HintMode::Direct => {
            let url = normalize_url(hint.url.as_deref())?;
            Ok(Some(HintSource::fixed(url)))
        }
        HintMode::Browse => {
            let url = normalize_url(hint.url.as_deref())?;
            Ok(Some(HintSource::interactive(
                Arc::clone(browser),
                url,
                hint.instructions.clone(),
            )))
        }
        HintMode::Manual if hint.url.is_some() => {
            let url = normalize_url(hint.url.as_deref())?;
            Ok(Some(HintSource::interactive(
                Arc::clone(browser),
                url,
                hint.instructions.clone(),
            )))
        }
        HintMode::Manual => Err(ResolveError::ProcessCanceled(
            hint.instructions.clone().unwrap_or_default(),
        )),
    }
}

/// Capability to re-run hint resolution after the original source went
/// stale.
///
/// Browse-style source urls may expire between resolution and the actual
/// download (which can start hours later); holders of a dependency can use
/// this to obtain a fresh [`HintSource`] and swap it into the authoritative
/// lookup result.
#[derive(Clone)]
pub struct Rehint {
    browser: Arc<dyn Browser>,
    hint: DownloadHint,
}

impl Rehint {
    pub(crate) fn new(browser: Arc<dyn Browser>, hint: DownloadHint) -> Self {
        Self { browser, hint }
    }

    /// Re-run hint resolution from scratch, bypassing any memoized outcome.
    pub async fn resolve(&self) -> Result<HintSource, ResolveError> {
        lookup_download_hint(&self.browser, Some(&self.hint))
            .await?
            .ok_or_else(|| ResolveError::NotFound("download hint no longer resolvable".into()))
    }
}

impl fmt::Debug for Rehint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rehint").field("hint", &self.hint).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedBrowser {
        response: Option<String>,
        calls: AtomicUsize,
    }

    impl ScriptedBrowser {
        fn returning(response: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                response: response.map(String::from),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Browser for ScriptedBrowser {
        async fn browse(
            &self,
            _url: &str,
            _instructions: Option<&str>,
        ) -> anyhow::Result<Option<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.response.clone())
        }
    }

    fn browser_dyn(scripted: &Arc<ScriptedBrowser>) -> Arc<dyn Browser> {
        Arc::clone(scripted) as Arc<dyn Browser>
    }

    fn hint(mode: HintMode, url: Option<&str>) -> DownloadHint {
        DownloadHint {
            mode,
            url: url.map(String::from),
            instructions: None,
        }
    }

    #[tokio::test]
    async fn test_absent_hint_resolves_to_none() {
        let scripted = ScriptedBrowser::returning(None);
        let result = lookup_download_hint(&browser_dyn(&scripted), None).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_direct_hint_normalizes_scheme() {
        let scripted = ScriptedBrowser::returning(None);
        let source = lookup_download_hint(
            &browser_dyn(&scripted),
            Some(&hint(HintMode::Direct, Some("example.com/dl/mod.7z"))),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(source.url().await.unwrap(), "https://example.com/dl/mod.7z");
        assert_eq!(scripted.calls(), 0);
    }

    #[tokio::test]
    async fn test_direct_hint_invalid_url_is_not_found() {
        let scripted = ScriptedBrowser::returning(None);
        let err = lookup_download_hint(
            &browser_dyn(&scripted),
            Some(&hint(HintMode::Direct, Some("http://"))),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ResolveError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_manual_without_url_is_process_canceled() {
        let scripted = ScriptedBrowser::returning(None);
        let err = lookup_download_hint(&browser_dyn(&scripted), Some(&hint(HintMode::Manual, None)))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::ProcessCanceled(_)));
    }

    #[tokio::test]
    async fn test_browse_prompt_fires_once_and_memoizes() {
        let scripted = ScriptedBrowser::returning(Some("https://cdn.example.com/f.7z<https://example.com"));
        let source = lookup_download_hint(
            &browser_dyn(&scripted),
            Some(&hint(HintMode::Browse, Some("example.com"))),
        )
        .await
        .unwrap()
        .unwrap();

        // not prompted until first read
        assert_eq!(scripted.calls(), 0);

        let resolved = source.resolve().await.unwrap();
        assert_eq!(resolved.url, "https://cdn.example.com/f.7z");
        assert_eq!(resolved.referer.as_deref(), Some("https://example.com"));

        let clone = source.clone();
        assert_eq!(clone.url().await.unwrap(), "https://cdn.example.com/f.7z");
        assert_eq!(clone.referer().await.unwrap().as_deref(), Some("https://example.com"));
        assert_eq!(scripted.calls(), 1);
    }

    #[tokio::test]
    async fn test_browse_failures_are_memoized_too() {
        let scripted = ScriptedBrowser::returning(Some("err:skip"));
        let source = lookup_download_hint(
            &browser_dyn(&scripted),
            Some(&hint(HintMode::Browse, Some("example.com"))),
        )
        .await
        .unwrap()
        .unwrap();

        for _ in 0..3 {
            let err = source.resolve().await.unwrap_err();
            assert_eq!(err, ResolveError::UserCanceled { skipped: true });
        }
        assert_eq!(scripted.calls(), 1);
    }

    #[tokio::test]
    async fn test_browse_error_taxonomy() {
        for (response, expected_skipped) in [("err:skip", true), ("err:cancel", false)] {
            let scripted = ScriptedBrowser::returning(Some(response));
            let source = lookup_download_hint(
                &browser_dyn(&scripted),
                Some(&hint(HintMode::Browse, Some("example.com"))),
            )
            .await
            .unwrap()
            .unwrap();
            assert_eq!(
                source.resolve().await.unwrap_err(),
                ResolveError::UserCanceled {
                    skipped: expected_skipped
                }
            );
        }

        let scripted = ScriptedBrowser::returning(Some("err:no such page"));
        let source = lookup_download_hint(
            &browser_dyn(&scripted),
            Some(&hint(HintMode::Browse, Some("example.com"))),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(
            source.resolve().await.unwrap_err(),
            ResolveError::Lookup("no such page".into())
        );

        let scripted = ScriptedBrowser::returning(None);
        let source = lookup_download_hint(
            &browser_dyn(&scripted),
            Some(&hint(HintMode::Browse, Some("example.com"))),
        )
        .await
        .unwrap()
        .unwrap();
        assert!(matches!(
            source.resolve().await.unwrap_err(),
            ResolveError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_manual_with_url_behaves_like_browse() {
        let scripted = ScriptedBrowser::returning(Some("https://cdn.example.com/f.7z<"));
        let source = lookup_download_hint(
            &browser_dyn(&scripted),
            Some(&hint(HintMode::Manual, Some("example.com"))),
        )
        .await
        .unwrap()
        .unwrap();
        let resolved = source.resolve().await.unwrap();
        assert_eq!(resolved.url, "https://cdn.example.com/f.7z");
        assert_eq!(resolved.referer, None);
    }

    #[tokio::test]
    async fn test_rehint_resolves_fresh() {
        let scripted = ScriptedBrowser::returning(Some("https://cdn.example.com/f.7z<r"));
        let rehint = Rehint::new(browser_dyn(&scripted), hint(HintMode::Browse, Some("example.com")));

        let first = rehint.resolve().await.unwrap();
        first.resolve().await.unwrap();
        let second = rehint.resolve().await.unwrap();
        second.resolve().await.unwrap();

        // a fresh prompt per re-resolution, not a shared memo
        assert_eq!(scripted.calls(), 2);
    }
}
