//! GitHub operations via the `gh` CLI.
//!
//! Authentication is whatever `gh` is already configured with (`GH_TOKEN`
//! or a logged-in `gh auth` session). Repository-scoped calls always pass the
//! repository explicitly, so the working directory only matters for clones.

use std::path::Path;

use serde::Deserialize;

use crate::{
    error::{Result, SyncError},
    process::{CommandOutput, Runner},
};

/// A pull request this tool opens. Identified by `(repo, head_branch, title)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestRecord {
    /// `owner/name` the pull request is opened against.
    pub repo: String,
    pub title: String,
    /// Branch name as GitHub reports it in `head.ref`.
    pub head_branch: String,
    pub base_branch: String,
}

/// Outcome of a create request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Creation {
    Created,
    /// A pull request for this head already exists. Not an error.
    AlreadyExists,
}

/// An open pull request, as much of it as we need.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub head: HeadRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HeadRef {
    #[serde(rename = "ref")]
    pub branch: String,
}

/// One commit on a pull request with its signature verification.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestCommit {
    pub sha: String,
    pub commit: CommitDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitDetail {
    pub verification: Verification,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Verification {
    pub verified: bool,
    pub payload: Option<String>,
}

/// GitHub client backed by `gh`.
pub struct GitHub<'r> {
    runner: &'r dyn Runner,
}

impl<'r> GitHub<'r> {
    pub fn new(runner: &'r dyn Runner) -> Self {
        Self { runner }
    }

    fn gh(&self, args: &[&str], cwd: &Path) -> Result<CommandOutput> {
        let mut argv = Vec::with_capacity(args.len() + 1);
        argv.push("gh");
        argv.extend_from_slice(args);
        self.runner.run(&argv, cwd)
    }

    fn gh_ok(&self, args: &[&str], cwd: &Path) -> Result<CommandOutput> {
        self.gh(args, cwd)?.ok_or_else(|out| {
            SyncError::PullRequest(format!("gh {}: {}", args.join(" "), out.message()))
        })
    }

    /// Clone `repo` into `dest`.
    pub fn clone_repo(&self, repo: &str, dest: &Path) -> Result<()> {
        let parent = dest.parent().unwrap_or_else(|| Path::new("."));
        let dest = dest.to_string_lossy();
        self.gh(&["repo", "clone", repo, &dest], parent)?
            .ok_or_else(|out| SyncError::Config(format!("failed to clone {repo}: {}", out.message())))?;
        Ok(())
    }

    /// Make sure the bot's fork of `repo` exists. Forking twice is harmless.
    pub fn fork(&self, repo: &str, cwd: &Path) -> Result<()> {
        self.gh_ok(&["repo", "fork", repo, "--clone=false", "--remote=false"], cwd)?;
        Ok(())
    }

    /// Open a pull request. `head` may be owner-qualified for cross-fork requests.
    pub fn create_pull_request(
        &self,
        record: &PullRequestRecord,
        head: &str,
        body: &str,
        cwd: &Path,
    ) -> Result<Creation> {
        let args = [
            "pr",
            "create",
            "--repo",
            &record.repo,
            "--base",
            &record.base_branch,
            "--head",
            head,
            "--title",
            &record.title,
            "--body",
            body,
        ];
        let out = self.gh(&args, cwd)?;
        if out.success() {
            return Ok(Creation::Created);
        }
        if out.combined().contains("already exists") {
            return Ok(Creation::AlreadyExists);
        }
        Err(SyncError::PullRequest(format!(
            "failed to open '{}' on {}: {}",
            record.title,
            record.repo,
            out.message()
        )))
    }

    /// Open pull requests, newest first.
    pub fn open_pull_requests(&self, repo: &str, cwd: &Path) -> Result<Vec<PullRequest>> {
        let endpoint =
            format!("repos/{repo}/pulls?state=open&sort=created&direction=desc&per_page=100");
        let out = self.gh_ok(&["api", &endpoint], cwd)?;
        Ok(serde_json::from_str(&out.stdout)?)
    }

    pub fn pull_request_commits(
        &self,
        repo: &str,
        number: u64,
        cwd: &Path,
    ) -> Result<Vec<PullRequestCommit>> {
        let endpoint = format!("repos/{repo}/pulls/{number}/commits?per_page=100");
        let out = self.gh_ok(&["api", &endpoint], cwd)?;
        Ok(serde_json::from_str(&out.stdout)?)
    }

    /// Whether every commit on the matching open pull request is signed by `signer`.
    ///
    /// `signer` is the `name <email>` string expected in the signature payload.
    /// No matching pull request, or one without commits, is never trusted.
    pub fn verify_signatures(
        &self,
        record: &PullRequestRecord,
        signer: &str,
        cwd: &Path,
    ) -> Result<bool> {
        let pulls = self.open_pull_requests(&record.repo, cwd)?;
        let Some(pr) = find_pull_request(&pulls, record) else {
            tracing::warn!(
                repo = %record.repo,
                head = %record.head_branch,
                "no open pull request titled '{}'",
                record.title
            );
            return Ok(false);
        };

        tracing::info!(repo = %record.repo, number = pr.number, "checking commit signatures");
        let commits = self.pull_request_commits(&record.repo, pr.number, cwd)?;
        Ok(all_signed_by(&commits, signer))
    }

    /// Queue a squash merge that lands once required checks pass.
    ///
    /// `head` selects the pull request the same way it was opened.
    pub fn enable_auto_merge(&self, record: &PullRequestRecord, head: &str, cwd: &Path) -> Result<()> {
        self.gh_ok(
            &[
                "pr",
                "merge",
                head,
                "--repo",
                &record.repo,
                "--auto",
                "--squash",
            ],
            cwd,
        )?;
        Ok(())
    }
}

/// The newest pull request matching the record's title and head branch.
pub fn find_pull_request<'p>(
    pulls: &'p [PullRequest],
    record: &PullRequestRecord,
) -> Option<&'p PullRequest> {
    pulls
        .iter()
        .find(|pr| pr.title == record.title && pr.head.branch == record.head_branch)
}

/// Every commit verified and signed as `signer`. False for an empty list.
pub fn all_signed_by(commits: &[PullRequestCommit], signer: &str) -> bool {
    !commits.is_empty()
        && commits.iter().all(|c| {
            let verification = &c.commit.verification;
            let signed = verification.verified
                && verification
                    .payload
                    .as_deref()
                    .is_some_and(|p| p.contains(signer));
            if !signed {
                tracing::warn!(sha = %c.sha, "commit not signed by {signer}");
            }
            signed
        })
}
