//! Git operations on one local clone.
//!
//! A [`Repository`] is bound to an explicit root directory; nothing here
//! relies on the process working directory. Most operations hand back the
//! raw [`CommandOutput`] because the exit code drives control flow upstream.

use std::path::{Path, PathBuf};

use crate::{
    error::{Result, SyncError},
    process::{CommandOutput, Runner},
};

/// A local clone and the runner used to drive git inside it.
pub struct Repository<'r> {
    root: PathBuf,
    runner: &'r dyn Runner,
}

impl<'r> Repository<'r> {
    pub fn new(root: impl Into<PathBuf>, runner: &'r dyn Runner) -> Self {
        Self {
            root: root.into(),
            runner,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Run `git <args>` in the repository root.
    pub fn git(&self, args: &[&str]) -> Result<CommandOutput> {
        let mut argv = Vec::with_capacity(args.len() + 1);
        argv.push("git");
        argv.extend_from_slice(args);
        self.runner.run(&argv, &self.root)
    }

    /// Run git and turn a non-zero exit into `err(message)`.
    fn git_ok(&self, args: &[&str], err: impl FnOnce(String) -> SyncError) -> Result<CommandOutput> {
        self.git(args)?
            .ok_or_else(|out| err(format!("git {}: {}", args.join(" "), out.message())))
    }

    // ── Branches ──

    pub fn current_branch(&self) -> Result<String> {
        let out = self.git_ok(&["rev-parse", "--abbrev-ref", "HEAD"], SyncError::Synchronization)?;
        Ok(out.stdout.trim().to_string())
    }

    pub fn checkout(&self, branch: &str) -> Result<CommandOutput> {
        self.git(&["checkout", branch])
    }

    /// Create `branch` at the current HEAD and switch to it.
    pub fn create_branch(&self, branch: &str) -> Result<CommandOutput> {
        self.git(&["checkout", "-b", branch])
    }

    /// Create or reset `branch` to `start` and switch to it.
    pub fn reset_branch(&self, branch: &str, start: &str) -> Result<CommandOutput> {
        self.git(&["checkout", "-B", branch, start])
    }

    pub fn reset_hard(&self, rev: &str) -> Result<CommandOutput> {
        self.git(&["reset", "--hard", rev])
    }

    /// Delete untracked files and directories under `path`.
    pub fn clean(&self, path: &Path) -> Result<CommandOutput> {
        let path = path.to_string_lossy();
        self.git(&["clean", "-fd", "--", &path])
    }

    /// Number of commits on HEAD that `base` does not have.
    pub fn commits_ahead(&self, base: &str) -> Result<usize> {
        let range = format!("{base}..HEAD");
        let out = self.git_ok(&["rev-list", "--count", &range], SyncError::Synchronization)?;
        out.stdout.trim().parse().map_err(|e| {
            SyncError::Synchronization(format!("unexpected rev-list output '{}': {e}", out.stdout.trim()))
        })
    }

    // ── Remotes ──

    pub fn fetch(&self, remote: &str) -> Result<CommandOutput> {
        self.git(&["fetch", remote])
    }

    /// Add `name` pointing at `url` unless a remote of that name exists.
    pub fn ensure_remote(&self, name: &str, url: &str) -> Result<()> {
        if self.git(&["remote", "get-url", name])?.success() {
            return Ok(());
        }
        self.git_ok(&["remote", "add", name, url], SyncError::Config)?;
        Ok(())
    }

    pub fn push(&self, remote: &str, branch: &str, force: bool) -> Result<CommandOutput> {
        let mut args = vec!["push", "-u"];
        if force {
            args.push("--force");
        }
        args.extend([remote, branch]);
        self.git(&args)
    }

    // ── Merging ──

    pub fn merge_ff_only(&self, rev: &str) -> Result<CommandOutput> {
        self.git(&["merge", "--ff-only", rev])
    }

    /// Trial merge that leaves the result uncommitted in the index.
    pub fn merge_no_commit(&self, rev: &str) -> Result<CommandOutput> {
        self.git(&["merge", "--no-commit", "--no-ff", rev])
    }

    pub fn merge_abort(&self) -> Result<CommandOutput> {
        self.git(&["merge", "--abort"])
    }

    // ── Rebasing ──

    /// Interactive rebase onto `onto` with `sequence_editor` rewriting the todo list.
    ///
    /// Cherry-picks already upstream are replayed rather than silently dropped,
    /// so every selected commit either lands or halts the rebase.
    pub fn rebase_interactive(&self, onto: &str, sequence_editor: &str) -> Result<CommandOutput> {
        let editor = format!("sequence.editor={sequence_editor}");
        self.git(&[
            "-c",
            &editor,
            "rebase",
            "--interactive",
            "--reapply-cherry-picks",
            onto,
        ])
    }

    pub fn rebase_skip(&self) -> Result<CommandOutput> {
        self.git(&["rebase", "--skip"])
    }

    pub fn rebase_abort(&self) -> Result<CommandOutput> {
        self.git(&["rebase", "--abort"])
    }

    // ── Staging and committing ──

    /// Stage everything under `path`, including deletions.
    pub fn add(&self, path: &Path) -> Result<()> {
        let path = path.to_string_lossy();
        self.git_ok(&["add", "--all", "--", &path], |msg| {
            SyncError::Commit(format!("failed to stage: {msg}"))
        })?;
        Ok(())
    }

    /// Whether the index differs from HEAD.
    pub fn has_staged_changes(&self) -> Result<bool> {
        let out = self.git(&["diff", "--staged", "--quiet"])?;
        match out.code {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(SyncError::Synchronization(format!(
                "git diff --staged: {}",
                out.message()
            ))),
        }
    }

    pub fn commit(&self, message: &str, sign: bool) -> Result<CommandOutput> {
        let mut args = vec!["commit"];
        if sign {
            args.push("-S");
        }
        args.extend(["-m", message]);
        self.git(&args)
    }

    /// Author commits in this clone as `name <email>`.
    pub fn set_identity(&self, name: &str, email: &str) -> Result<()> {
        self.git_ok(&["config", "user.name", name], SyncError::Config)?;
        self.git_ok(&["config", "user.email", email], SyncError::Config)?;
        Ok(())
    }
}

/// HTTPS clone URL for an `owner/name` GitHub repository.
pub fn github_url(repo: &str) -> String {
    format!("https://github.com/{repo}.git")
}
