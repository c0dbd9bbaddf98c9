//! Pull request lifecycle: push, open, verify, auto-merge.
//!
//! ```text
//! NoChanges                                   (nothing to publish)
//! Pushed → PullRequestOpened                  (auto-merge not requested)
//! Pushed → PullRequestOpened → SignatureChecked → AutoMergeTriggered
//!                                               → AutoMergeSkipped
//! ```
//!
//! Every step is safe to repeat: an existing pull request for the same head
//! counts as opened.

use serde::Serialize;

use crate::{
    error::{Result, SyncError},
    git::Repository,
    github::{Creation, GitHub, PullRequestRecord},
};

/// Terminal state of one lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LifecycleOutcome {
    NoChanges,
    PullRequestOpened,
    AutoMergeTriggered,
    /// Some commit was not signed by the bot; the pull request waits for a human.
    AutoMergeSkipped,
}

/// How a lifecycle publishes its branch.
#[derive(Debug, Clone)]
pub struct PublishOptions<'a> {
    pub push_remote: &'a str,
    /// Stable branch names are reused across runs and need a forced push.
    pub force_push: bool,
    /// Head as passed to `gh`: `branch` or `owner:branch` across forks.
    pub head: &'a str,
    pub body: &'a str,
    pub auto_merge: bool,
    /// Trust signatures without checking.
    pub run_local: bool,
    /// `name <email>` every commit must be signed as.
    pub signer: &'a str,
}

/// Push the current branch and carry its pull request through to auto-merge.
///
/// The caller has already decided there is something to publish.
pub fn publish(
    repo: &Repository<'_>,
    github: &GitHub<'_>,
    record: &PullRequestRecord,
    options: &PublishOptions<'_>,
) -> Result<LifecycleOutcome> {
    let cwd = repo.root();

    repo.push(options.push_remote, &record.head_branch, options.force_push)?
        .ok_or_else(|out| {
            SyncError::PullRequest(format!(
                "push {} to {} failed: {}",
                record.head_branch,
                options.push_remote,
                out.message()
            ))
        })?;
    tracing::info!(branch = %record.head_branch, remote = options.push_remote, "pushed");

    match github.create_pull_request(record, options.head, options.body, cwd)? {
        Creation::Created => tracing::info!(repo = %record.repo, "opened '{}'", record.title),
        Creation::AlreadyExists => {
            tracing::info!(repo = %record.repo, "'{}' is already open", record.title);
        }
    }

    if !options.auto_merge {
        return Ok(LifecycleOutcome::PullRequestOpened);
    }

    let verified = if options.run_local {
        tracing::warn!("run-local set: treating signatures as verified");
        true
    } else {
        github.verify_signatures(record, options.signer, cwd)?
    };

    if !verified {
        tracing::warn!(repo = %record.repo, "not all commits are signed; leaving for review");
        return Ok(LifecycleOutcome::AutoMergeSkipped);
    }

    github.enable_auto_merge(record, options.head, cwd)?;
    tracing::info!(repo = %record.repo, "auto-merge enabled for '{}'", record.title);
    Ok(LifecycleOutcome::AutoMergeTriggered)
}
