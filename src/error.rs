//! Error taxonomy for a sync run.
//!
//! Expected failures of external tools are not errors at the process layer:
//! callers inspect exit codes and map them onto the variants below.

use std::{io, path::PathBuf, time::Duration};

/// Errors that can occur while synchronizing translations.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Missing or invalid input. Raised before any repository is touched.
    #[error("configuration error: {0}")]
    Config(String),

    /// Bot-owned branches diverged or source and translations conflict.
    #[error("synchronization error: {0}")]
    Synchronization(String),

    /// The filtered rebase halted on something other than an empty pick.
    #[error("rebase failed for {language}: {message}")]
    Rebase { language: String, message: String },

    /// The todo filter could not rewrite git's instruction file.
    #[error("sequence editor failed: {0}")]
    SequenceEditor(String),

    #[error("reconciliation failed at {}: {source}", path.display())]
    Reconciliation {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Staging or committing a language's changes failed.
    #[error("commit failed: {0}")]
    Commit(String),

    /// Push, PR creation, or merge failed.
    #[error("pull request error: {0}")]
    PullRequest(String),

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{command} timed out after {}s", timeout.as_secs())]
    Timeout { command: String, timeout: Duration },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    /// Whether this error aborts the whole run rather than one language.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::Synchronization(_)
                | Self::SequenceEditor(_)
                | Self::Spawn { .. }
                | Self::Timeout { .. }
        )
    }
}

pub type Result<T> = core::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_level_errors_are_fatal() {
        assert!(SyncError::Config("missing bot".into()).is_fatal());
        assert!(SyncError::Synchronization("not fast-forward".into()).is_fatal());
    }

    #[test]
    fn language_level_errors_are_not_fatal() {
        let rebase = SyncError::Rebase {
            language: "fr".into(),
            message: "conflict".into(),
        };
        assert!(!rebase.is_fatal());
        assert!(!SyncError::PullRequest("push rejected".into()).is_fatal());
        assert!(!SyncError::Commit("hook rejected".into()).is_fatal());

        let reconcile = SyncError::Reconciliation {
            path: PathBuf::from("content/fr/a.md"),
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        };
        assert!(!reconcile.is_fatal());
        assert!(reconcile.to_string().contains("content/fr/a.md"));
    }
}
