//! Branch synchronization on the translations repository.
//!
//! The translation service commits to a long-lived translation branch while
//! the source branch keeps receiving upstream content. One cycle:
//!
//! 1. fast-forward both branches from upstream,
//! 2. probe for conflicts between them,
//! 3. replay only one language's commits onto the source branch.
//!
//! Steps 1 and 2 guard branches the bot owns; any surprise there is fatal
//! for the run. Step 3 can fail for one language without affecting others.

use std::path::Path;

use crate::{
    eligibility::LanguageTask,
    error::{Result, SyncError},
    git::Repository,
    process::CommandOutput,
};

/// Upper bound on consecutive empty picks skipped in one rebase.
const MAX_SKIPS: usize = 10_000;

/// The two long-lived branches and the remote they track.
#[derive(Debug, Clone, Copy)]
pub struct Branches<'a> {
    pub source: &'a str,
    pub translation: &'a str,
    pub upstream_remote: &'a str,
}

/// Fast-forward the source and translation branches from upstream.
pub fn fast_forward(repo: &Repository<'_>, branches: &Branches<'_>) -> Result<()> {
    checkout(repo, branches.source)?;
    fetch(repo, branches.upstream_remote)?;
    merge_ff_only(repo, branches.upstream_remote, branches.source)?;
    update_branch(repo, branches.upstream_remote, branches.translation)
}

pub fn fetch(repo: &Repository<'_>, remote: &str) -> Result<()> {
    repo.fetch(remote)?.ok_or_else(|out| {
        SyncError::Synchronization(format!("fetch {remote} failed: {}", out.message()))
    })?;
    Ok(())
}

/// Check out `branch` and fast-forward it to its already-fetched upstream.
pub fn update_branch(repo: &Repository<'_>, remote: &str, branch: &str) -> Result<()> {
    checkout(repo, branch)?;
    merge_ff_only(repo, remote, branch)
}

fn checkout(repo: &Repository<'_>, branch: &str) -> Result<()> {
    repo.checkout(branch)?.ok_or_else(|out| {
        SyncError::Synchronization(format!("checkout {branch} failed: {}", out.message()))
    })?;
    Ok(())
}

fn merge_ff_only(repo: &Repository<'_>, remote: &str, branch: &str) -> Result<()> {
    let upstream = format!("{remote}/{branch}");
    repo.merge_ff_only(&upstream)?.ok_or_else(|out| {
        SyncError::Synchronization(format!(
            "{branch} cannot be fast-forwarded to {upstream}: {}",
            out.message()
        ))
    })?;
    Ok(())
}

/// Put a clone back on `base` with no staged, modified, or untracked leftovers under `dir`.
///
/// Runs after a language fails partway, so the next language starts from the
/// same state a fresh run would. Failure to restore is fatal.
pub fn restore(repo: &Repository<'_>, dir: &Path, base: &str) -> Result<()> {
    let restore_error = |what: &str, out: &CommandOutput| {
        SyncError::Synchronization(format!(
            "cannot restore {} after a failed language ({what}): {}",
            repo.root().display(),
            out.message()
        ))
    };

    repo.reset_hard("HEAD")?
        .ok_or_else(|out| restore_error("reset", out))?;
    repo.clean(dir)?.ok_or_else(|out| restore_error("clean", out))?;
    repo.checkout(base)?
        .ok_or_else(|out| restore_error("checkout", out))?;
    tracing::info!(repo = %repo.root().display(), branch = base, "restored clean state");
    Ok(())
}

/// Abort an in-progress rebase. A clone left mid-rebase cannot serve the next language.
fn abort_rebase(repo: &Repository<'_>) -> Result<()> {
    repo.rebase_abort()?.ok_or_else(|out| {
        SyncError::Synchronization(format!("rebase --abort failed: {}", out.message()))
    })?;
    Ok(())
}

/// Trial-merge the translation branch into the source branch.
///
/// The merge is always aborted afterwards, exactly once, whatever its result.
/// A failed trial merge means the branches genuinely conflict.
pub fn probe_conflicts(repo: &Repository<'_>, branches: &Branches<'_>) -> Result<()> {
    checkout(repo, branches.source)?;

    let probe = repo.merge_no_commit(branches.translation);
    let abort = repo.merge_abort();

    let probe = probe?;
    match abort {
        // An up-to-date trial merge leaves nothing to abort.
        Ok(out) if !out.success() => {
            tracing::debug!("merge --abort: {}", out.message());
        }
        Ok(_) => {}
        Err(e) => return Err(e),
    }

    if probe.success() {
        Ok(())
    } else {
        Err(SyncError::Synchronization(format!(
            "{} conflicts with {}: {}",
            branches.translation,
            branches.source,
            probe.message()
        )))
    }
}

/// Fast-forward, then probe. Both failures abort the run.
pub fn synchronize(repo: &Repository<'_>, branches: &Branches<'_>) -> Result<()> {
    fast_forward(repo, branches)?;
    probe_conflicts(repo, branches)
}

/// The sequence editor git runs on the todo list: this binary's `filter-todo`.
#[derive(Debug, Clone)]
pub struct SequenceEditor {
    program: String,
}

impl SequenceEditor {
    pub fn new(program: &Path) -> Self {
        Self {
            program: program.to_string_lossy().into_owned(),
        }
    }

    /// Shell command line for one language. Git appends the todo path.
    pub fn command(&self, language: &str) -> String {
        format!(
            "{} filter-todo --language {}",
            shell_quote(&self.program),
            shell_quote(language)
        )
    }
}

/// Quote for `sh`: single quotes, with embedded quotes escaped.
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// The dated branch a language's filtered commits land on.
pub fn language_branch(translation_branch: &str, language_code: &str, stamp: &str) -> String {
    format!("{translation_branch}_{language_code}_{stamp}")
}

/// Replay the language's commits from the translation branch onto the source branch.
///
/// Leaves the repository on the new dated branch and returns its name. Empty
/// picks are skipped. Any other halt aborts the rebase and fails the language.
pub fn filtered_rebase(
    repo: &Repository<'_>,
    branches: &Branches<'_>,
    task: &LanguageTask,
    stamp: &str,
    editor: &SequenceEditor,
) -> Result<String> {
    let branch = language_branch(branches.translation, &task.code, stamp);
    let rebase_error = |message: String| SyncError::Rebase {
        language: task.code.clone(),
        message,
    };

    checkout(repo, branches.translation)?;
    repo.create_branch(&branch)?
        .ok_or_else(|out| rebase_error(format!("cannot create {branch}: {}", out.message())))?;

    tracing::info!(language = %task.code, %branch, "rebasing {} commits", task.name);
    let mut out = repo.rebase_interactive(branches.source, &editor.command(&task.name))?;

    if is_nothing_to_do(&out) {
        // No commits for this language: the branch is just the source branch.
        tracing::info!(language = %task.code, "no commits for {}", task.name);
        repo.reset_hard(branches.source)?
            .ok_or_else(|o| rebase_error(format!("reset to {}: {}", branches.source, o.message())))?;
        return Ok(branch);
    }

    let mut skips = 0;
    while !out.success() {
        if is_editor_failure(&out) {
            abort_rebase(repo)?;
            return Err(SyncError::SequenceEditor(out.message()));
        }
        if !is_empty_pick(&out) || skips >= MAX_SKIPS {
            abort_rebase(repo)?;
            return Err(rebase_error(out.message()));
        }
        skips += 1;
        tracing::info!(language = %task.code, "skipping empty pick");
        out = repo.rebase_skip()?;
    }

    Ok(branch)
}

/// Git refused to start because the filtered todo list was empty.
fn is_nothing_to_do(out: &CommandOutput) -> bool {
    !out.success() && out.combined().to_lowercase().contains("nothing to do")
}

/// The rebase halted on a pick that has nothing left to commit.
pub fn is_empty_pick(out: &CommandOutput) -> bool {
    let text = out.combined();
    text.contains("nothing to commit") || text.contains("previous cherry-pick is now empty")
}

fn is_editor_failure(out: &CommandOutput) -> bool {
    out.combined().contains("problem with the editor")
}
