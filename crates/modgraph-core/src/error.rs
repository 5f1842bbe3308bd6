//! Domain-specific errors for dependency resolution.
//!
//! Every branch of the resolution tree catches its own errors; the variants
//! here mostly encode *how* a branch failure is handled rather than carrying
//! rich diagnostics. The type is `Clone` because memoized hint resolutions
//! share their outcome, including failures, between readers.

use thiserror::Error;

/// Errors raised while resolving a single dependency branch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The user explicitly skipped or canceled an interactive browse prompt.
    /// Non-fatal; the branch is dropped.
    #[error("browse prompt dismissed by user (skipped={skipped})")]
    UserCanceled {
        /// `true` when the user skipped just this dependency, `false` when
        /// they canceled the surrounding flow.
        skipped: bool,
    },

    /// A manual download hint without a url cannot be resolved without user
    /// interaction. Intentional; the branch is dropped without notification.
    #[error("process canceled: {0}")]
    ProcessCanceled(String),

    /// A hint url was malformed, or interactive browsing yielded nothing.
    #[error("not found: {0}")]
    NotFound(String),

    /// Anything else from the metadata service or the matching logic.
    #[error("lookup failed: {0}")]
    Lookup(String),
}

impl ResolveError {
    /// Fold a foreign error into the generic lookup variant.
    pub fn lookup(err: impl std::fmt::Display) -> Self {
        Self::Lookup(err.to_string())
    }

    /// Whether this error is swallowed without notifying the user.
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::ProcessCanceled(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_distinguishes_skip_from_cancel() {
        let skipped = ResolveError::UserCanceled { skipped: true };
        let canceled = ResolveError::UserCanceled { skipped: false };
        assert!(skipped.to_string().contains("skipped=true"));
        assert!(canceled.to_string().contains("skipped=false"));
    }

    #[test]
    fn test_only_process_canceled_is_silent() {
        assert!(ResolveError::ProcessCanceled("manual".into()).is_silent());
        assert!(!ResolveError::NotFound("x".into()).is_silent());
        assert!(!ResolveError::UserCanceled { skipped: true }.is_silent());
        assert!(!ResolveError::lookup("boom").is_silent());
    }
}
