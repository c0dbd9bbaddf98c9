//! The per-language sync pipeline and the content-sync flow.
//!
//! Languages run one at a time, in code order, against the same two clones.
//! A failure inside one language is recorded and the loop moves on; a
//! synchronization failure stops the run because the branches can no longer
//! be trusted.

use std::{collections::BTreeMap, path::Path};

use jiff::Timestamp;
use serde::Serialize;

use crate::{
    config::Config,
    eligibility::LanguageTask,
    error::{Result, SyncError},
    git::Repository,
    github::{GitHub, PullRequestRecord},
    lifecycle::{self, LifecycleOutcome, PublishOptions},
    reconcile,
    sync::{self, Branches, SequenceEditor},
    workspace::Workspace,
};

const UNTRANSLATED_COMMIT: &str = "Add untranslated files";
const TRANSLATIONS_BODY: &str =
    "Automated translation update from the translation-management service.";
const UPSTREAM_BODY: &str = "Automated pull request adding reviewed translations.";
const CONTENT_COMMIT: &str = "Update content.";
const CONTENT_TITLE: &str = "Update content";
const CONTENT_BODY: &str = "Automated content update.";

/// Where in the pipeline a language stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Rebase,
    Reconcile,
    Commit,
    PullRequest,
    /// Local I/O outside the named stages.
    Io,
}

impl Stage {
    /// The stage a language-level error belongs to. `None` for run-fatal errors.
    fn of(error: &SyncError) -> Option<Self> {
        match error {
            SyncError::Rebase { .. } => Some(Self::Rebase),
            SyncError::Reconciliation { .. } => Some(Self::Reconcile),
            SyncError::Commit(_) => Some(Self::Commit),
            // JSON only comes from decoding `gh api` responses.
            SyncError::PullRequest(_) | SyncError::Json(_) => Some(Self::PullRequest),
            SyncError::Io(_) => Some(Self::Io),
            SyncError::Config(_)
            | SyncError::Synchronization(_)
            | SyncError::SequenceEditor(_)
            | SyncError::Spawn { .. }
            | SyncError::Timeout { .. } => None,
        }
    }
}

/// Result of one lifecycle for one language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum StageResult {
    Completed {
        outcome: LifecycleOutcome,
        branch: String,
    },
    Failed {
        stage: Stage,
        message: String,
    },
}

impl StageResult {
    fn from_result(result: Result<(LifecycleOutcome, String)>) -> Result<Self> {
        match result {
            Ok((outcome, branch)) => Ok(Self::Completed { outcome, branch }),
            Err(e) => {
                let Some(stage) = Stage::of(&e) else {
                    return Err(e);
                };
                tracing::error!("{e}");
                Ok(Self::Failed {
                    stage,
                    message: e.to_string(),
                })
            }
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LanguageReport {
    pub code: String,
    pub name: String,
    pub translations: StageResult,
    /// `None` when upstream pull requests are disabled or the translations stage failed.
    pub upstream: Option<StageResult>,
}

/// Everything a run did, for display or `--out`.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: Timestamp,
    pub languages: Vec<LanguageReport>,
}

impl RunReport {
    pub fn failures(&self) -> usize {
        self.languages
            .iter()
            .flat_map(|l| std::iter::once(&l.translations).chain(l.upstream.as_ref()))
            .filter(|r| !r.is_completed())
            .count()
    }
}

/// One sync run over a prepared workspace.
pub struct Pipeline<'w, 'r> {
    config: &'w Config,
    workspace: &'w Workspace<'r>,
    github: &'w GitHub<'r>,
    editor: SequenceEditor,
    /// Suffix for the dated branches created during this run.
    stamp: String,
}

impl<'w, 'r> Pipeline<'w, 'r> {
    pub fn new(
        config: &'w Config,
        workspace: &'w Workspace<'r>,
        github: &'w GitHub<'r>,
        editor: SequenceEditor,
        stamp: impl Into<String>,
    ) -> Self {
        Self {
            config,
            workspace,
            github,
            editor,
            stamp: stamp.into(),
        }
    }

    fn branches(&self) -> Branches<'w> {
        Branches {
            source: &self.config.translations.source_branch,
            translation: &self.config.translations.translation_branch,
            upstream_remote: &self.config.upstream_remote,
        }
    }

    fn sign(&self) -> bool {
        self.config.sign_commits
    }

    fn signer(&self) -> String {
        self.config.bot.signer()
    }

    /// Sync every task, in code order.
    pub fn run(&self, tasks: &BTreeMap<String, LanguageTask>) -> Result<RunReport> {
        let started_at = Timestamp::now();
        let mut languages = Vec::with_capacity(tasks.len());

        for task in tasks.values() {
            let _span = tracing::info_span!("language", code = %task.code).entered();
            languages.push(self.sync_language(task)?);
        }

        Ok(RunReport {
            started_at,
            languages,
        })
    }

    /// Full cycle for one language. Only run-fatal errors are returned.
    pub fn sync_language(&self, task: &LanguageTask) -> Result<LanguageReport> {
        tracing::info!(
            "syncing {} ({}% translated, {}% approved)",
            task.name,
            task.translation_pct,
            task.approval_pct
        );
        let layout = &self.workspace.layout;
        sync::synchronize(&self.workspace.translations, &self.branches())?;

        let translations = settle(
            &self.workspace.translations,
            &layout.translation_dir_relative(task),
            &self.config.translations.source_branch,
            self.publish_translations(task),
        )?;

        let upstream = if self.config.source.create_pull_requests && translations.is_completed() {
            Some(settle(
                &self.workspace.source,
                &layout.upstream_dir_relative(task),
                &self.config.source.branch,
                self.publish_upstream(task),
            )?)
        } else {
            None
        };

        Ok(LanguageReport {
            code: task.code.clone(),
            name: task.name.clone(),
            translations,
            upstream,
        })
    }

    /// Filtered rebase, reconciliation, and the translations-repository pull request.
    fn publish_translations(&self, task: &LanguageTask) -> Result<(LifecycleOutcome, String)> {
        let repo = &self.workspace.translations;
        let layout = &self.workspace.layout;
        let branches = self.branches();

        let branch = sync::filtered_rebase(repo, &branches, task, &self.stamp, &self.editor)?;

        // The rebase may have changed tracked files, so the manifests are taken now.
        reconcile::reconcile(&layout.source_language_dir(), &layout.translation_dir(task))?;
        stage_and_commit(
            repo,
            &layout.translation_dir_relative(task),
            UNTRANSLATED_COMMIT,
            self.sign(),
        )?;

        if repo.commits_ahead(branches.source)? == 0 {
            tracing::info!("no changes for {}", task.name);
            return Ok((LifecycleOutcome::NoChanges, branch));
        }

        let record = PullRequestRecord {
            repo: self.config.translations.repo.clone(),
            title: format!("Update translations for {}", task.name),
            head_branch: branch.clone(),
            base_branch: branches.source.to_string(),
        };
        let signer = self.signer();
        let options = PublishOptions {
            push_remote: &self.config.push_remote,
            force_push: false,
            head: &branch,
            body: TRANSLATIONS_BODY,
            auto_merge: self.config.auto_merge,
            run_local: self.config.run_local,
            signer: &signer,
        };

        let outcome = lifecycle::publish(repo, self.github, &record, &options)?;
        Ok((outcome, branch))
    }

    /// Mirror the language into the source repository and open a pull request there.
    fn publish_upstream(&self, task: &LanguageTask) -> Result<(LifecycleOutcome, String)> {
        let repo = &self.workspace.source;
        let layout = &self.workspace.layout;
        let source = &self.config.source;
        let remote = &self.config.upstream_remote;
        let branch = upstream_branch(task);

        repo.fetch(remote)?.ok_or_else(|out| {
            SyncError::PullRequest(format!("fetch {remote} failed: {}", out.message()))
        })?;
        let start = format!("{remote}/{}", source.branch);
        repo.reset_branch(&branch, &start)?.ok_or_else(|out| {
            SyncError::PullRequest(format!("cannot reset {branch} to {start}: {}", out.message()))
        })?;

        reconcile::mirror(&layout.translation_dir(task), &layout.upstream_dir(task))?;
        let title = format!("Add translations for {}", task.name);
        let committed = stage_and_commit(
            repo,
            &layout.upstream_dir_relative(task),
            &title,
            self.sign(),
        )?;
        if !committed {
            tracing::info!("{} is already up to date in {}", task.name, source.repo);
            return Ok((LifecycleOutcome::NoChanges, branch));
        }

        // Validated at load: upstream pull requests require a fork owner.
        let owner = source.fork_owner.as_deref().ok_or_else(|| {
            SyncError::Config("source.fork-owner is required for upstream pull requests".into())
        })?;
        let head = format!("{owner}:{branch}");
        let record = PullRequestRecord {
            repo: source.repo.clone(),
            title,
            head_branch: branch.clone(),
            base_branch: source.branch.clone(),
        };
        let signer = self.signer();
        let options = PublishOptions {
            push_remote: &self.config.push_remote,
            force_push: true,
            head: &head,
            body: UPSTREAM_BODY,
            auto_merge: self.config.auto_merge,
            run_local: self.config.run_local,
            signer: &signer,
        };

        let outcome = lifecycle::publish(repo, self.github, &record, &options)?;
        Ok((outcome, branch))
    }

    /// Mirror source content into the translations repository and open a pull request.
    pub fn sync_content(&self) -> Result<StageResult> {
        let relative = self
            .workspace
            .layout
            .content_dir_relative()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        settle(
            &self.workspace.translations,
            &relative,
            &self.config.translations.source_branch,
            self.publish_content(),
        )
    }

    fn publish_content(&self) -> Result<(LifecycleOutcome, String)> {
        let layout = &self.workspace.layout;
        let (from, to) = layout.content_dirs().ok_or_else(|| {
            SyncError::Config("content-dir is not configured for sync-content".to_string())
        })?;
        let relative = layout
            .content_dir_relative()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let remote = &self.config.upstream_remote;
        let source_branch = &self.config.translations.source_branch;
        let source = &self.workspace.source;
        let repo = &self.workspace.translations;

        sync::fetch(source, remote)?;
        sync::update_branch(source, remote, &self.config.source.branch)?;
        sync::fetch(repo, remote)?;
        sync::update_branch(repo, remote, source_branch)?;

        let branch = format!("content-sync-{}", self.stamp);
        repo.create_branch(&branch)?.ok_or_else(|out| {
            SyncError::PullRequest(format!("cannot create {branch}: {}", out.message()))
        })?;

        reconcile::mirror(&from, &to)?;
        if !stage_and_commit(repo, &relative, CONTENT_COMMIT, self.sign())? {
            tracing::info!("no content changes");
            return Ok((LifecycleOutcome::NoChanges, branch));
        }

        let record = PullRequestRecord {
            repo: self.config.translations.repo.clone(),
            title: CONTENT_TITLE.to_string(),
            head_branch: branch.clone(),
            base_branch: source_branch.clone(),
        };
        let signer = self.signer();
        let options = PublishOptions {
            push_remote: &self.config.push_remote,
            force_push: false,
            head: &branch,
            body: CONTENT_BODY,
            auto_merge: self.config.auto_merge,
            run_local: self.config.run_local,
            signer: &signer,
        };

        let outcome = lifecycle::publish(repo, self.github, &record, &options)?;
        Ok((outcome, branch))
    }
}

/// Record a lifecycle result. After a language-level failure the clone is
/// restored so leftovers under `dir` cannot leak into the next language.
fn settle(
    repo: &Repository<'_>,
    dir: &Path,
    base: &str,
    result: Result<(LifecycleOutcome, String)>,
) -> Result<StageResult> {
    let stage = StageResult::from_result(result)?;
    if !stage.is_completed() {
        sync::restore(repo, dir, base)?;
    }
    Ok(stage)
}

/// Stable branch for a language's upstream pull request.
pub fn upstream_branch(task: &LanguageTask) -> String {
    format!("add/translations-{}", task.code)
}

/// Stage `relative` and commit it if the index changed. Returns whether it committed.
fn stage_and_commit(
    repo: &Repository<'_>,
    relative: &Path,
    message: &str,
    sign: bool,
) -> Result<bool> {
    // A directory that was never created has nothing to stage, and git rejects
    // pathspecs that match nothing.
    if repo.root().join(relative).exists() {
        repo.add(relative)?;
    }
    if !repo.has_staged_changes()? {
        return Ok(false);
    }

    repo.commit(message, sign)?.ok_or_else(|out| {
        SyncError::Commit(format!("'{message}' in {}: {}", relative.display(), out.message()))
    })?;
    Ok(true)
}
