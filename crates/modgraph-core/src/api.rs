//! External capabilities consumed by the engine.
//!
//! The engine never talks to the network or the user directly; it goes
//! through these traits. Implementations live in the host application --
//! the engine only defines how their results are combined, ordered and
//! deduplicated.

use std::sync::Arc;

use async_trait::async_trait;
use modgraph_schema::ModReference;

use crate::error::ResolveError;
use crate::local::DownloadEntry;
use crate::lookup::LookupResult;

/// Metadata service: maps a reference to candidate artifacts.
#[async_trait]
pub trait MetadataLookup: Send + Sync {
    /// Look up candidates for `reference`. With `require_url` set, only
    /// candidates with a resolvable source location are returned.
    async fn lookup(
        &self,
        reference: &ModReference,
        require_url: bool,
    ) -> anyhow::Result<Vec<LookupResult>>;
}

/// Interactive browse capability.
#[async_trait]
pub trait Browser: Send + Sync {
    /// Let the user pick a download starting from `url`.
    ///
    /// The protocol is inherited from the browse frontend: `Ok(Some)` carries
    /// either a `url<referer` encoded pick or an `err:<reason>` string
    /// (`err:skip`, `err:cancel`, or a free-form message); `Ok(None)` means
    /// the prompt closed without producing anything.
    async fn browse(&self, url: &str, instructions: Option<&str>) -> anyhow::Result<Option<String>>;
}

/// Fire-and-forget error reporting to the user.
pub trait Notifier: Send + Sync {
    /// Surface a non-fatal resolution error. `context` is whatever the rule
    /// offered to identify itself: hint url, comment or description.
    fn notify_error(&self, title: &str, error: &ResolveError, context: Option<&str>);
}

/// Progress callback: `(completed, total)` root rules, fired in completion
/// order.
pub type ProgressFn = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Callback fired whenever a rule matched an already-present download.
pub type LocalMatchFn = Arc<dyn Fn(&DownloadEntry) + Send + Sync>;
