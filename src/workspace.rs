//! The two local clones a run operates on, and where things live inside them.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use crate::{
    config::Config,
    eligibility::LanguageTask,
    error::{Result, SyncError},
    git::{Repository, github_url},
    github::GitHub,
    process::Runner,
};

const LANGUAGE_PLACEHOLDER: &str = "{language}";

/// Every path a run needs, computed once from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceLayout {
    pub source_root: PathBuf,
    pub translations_root: PathBuf,
    /// Source-language directory, relative to the translations root.
    source_dir: PathBuf,
    /// Per-language directory template, relative to the translations root.
    translation_dir: String,
    /// Per-language directory template, relative to the source root.
    upstream_dir: String,
    /// `sync-content` source and destination, relative to each root.
    content_dirs: Option<(PathBuf, PathBuf)>,
    /// Language code → directory name overrides.
    language_dirs: BTreeMap<String, String>,
}

impl WorkspaceLayout {
    pub fn from_config(config: &Config) -> Self {
        let content_dirs = match (&config.source.content_dir, &config.translations.content_dir) {
            (Some(from), Some(to)) => Some((PathBuf::from(from), PathBuf::from(to))),
            (Some(both), None) | (None, Some(both)) => {
                Some((PathBuf::from(both), PathBuf::from(both)))
            }
            (None, None) => None,
        };

        Self {
            source_root: config.source.root.clone(),
            translations_root: config.translations.root.clone(),
            source_dir: PathBuf::from(&config.translations.source_dir),
            translation_dir: config.translations.translation_dir.clone(),
            upstream_dir: config.source.translations_dir.clone(),
            content_dirs,
            language_dirs: config.languages.clone(),
        }
    }

    /// Directory name for a language: the configured override or the code itself.
    pub fn language_dir_name<'a>(&'a self, task: &'a LanguageTask) -> &'a str {
        self.language_dirs
            .get(&task.code)
            .map_or(task.code.as_str(), String::as_str)
    }

    fn expand(&self, template: &str, task: &LanguageTask) -> PathBuf {
        PathBuf::from(template.replace(LANGUAGE_PLACEHOLDER, self.language_dir_name(task)))
    }

    /// Source-language directory in the translations clone.
    pub fn source_language_dir(&self) -> PathBuf {
        self.translations_root.join(&self.source_dir)
    }

    /// Translation directory, relative to the translations root.
    pub fn translation_dir_relative(&self, task: &LanguageTask) -> PathBuf {
        self.expand(&self.translation_dir, task)
    }

    /// Translation directory in the translations clone.
    pub fn translation_dir(&self, task: &LanguageTask) -> PathBuf {
        self.translations_root
            .join(self.translation_dir_relative(task))
    }

    /// Upstream directory, relative to the source root.
    pub fn upstream_dir_relative(&self, task: &LanguageTask) -> PathBuf {
        self.expand(&self.upstream_dir, task)
    }

    /// Where a language's translations land in the source clone.
    pub fn upstream_dir(&self, task: &LanguageTask) -> PathBuf {
        self.source_root.join(self.upstream_dir_relative(task))
    }

    /// `(source clone dir, translations clone dir)` for `sync-content`, if configured.
    pub fn content_dirs(&self) -> Option<(PathBuf, PathBuf)> {
        self.content_dirs
            .as_ref()
            .map(|(from, to)| (self.source_root.join(from), self.translations_root.join(to)))
    }

    /// The `sync-content` destination, relative to the translations root.
    pub fn content_dir_relative(&self) -> Option<&Path> {
        self.content_dirs.as_ref().map(|(_, to)| to.as_path())
    }
}

/// Both clones, ready for git operations.
pub struct Workspace<'r> {
    pub layout: WorkspaceLayout,
    pub source: Repository<'r>,
    pub translations: Repository<'r>,
}

impl<'r> Workspace<'r> {
    pub fn new(layout: WorkspaceLayout, runner: &'r dyn Runner) -> Self {
        let source = Repository::new(layout.source_root.clone(), runner);
        let translations = Repository::new(layout.translations_root.clone(), runner);
        Self {
            layout,
            source,
            translations,
        }
    }

    /// Clone missing repositories, set the bot identity, wire up remotes.
    ///
    /// When upstream pull requests are enabled the source clone is the bot's
    /// fork, so `origin` is pushable and the upstream remote points at the
    /// canonical repository.
    pub fn prepare(&self, github: &GitHub<'_>, config: &Config) -> Result<()> {
        let source_clone = match (&config.source.fork_owner, config.source.create_pull_requests) {
            (Some(owner), true) => {
                github.fork(&config.source.repo, &parent_dir(self.source.root())?)?;
                fork_name(&config.source.repo, owner)?
            }
            _ => config.source.repo.clone(),
        };

        let clones = [
            (&self.source, source_clone.as_str(), config.source.repo.as_str()),
            (
                &self.translations,
                config.translations.repo.as_str(),
                config.translations.repo.as_str(),
            ),
        ];

        for (repo, clone_from, upstream) in clones {
            if !repo.root().join(".git").exists() {
                fs::create_dir_all(parent_dir(repo.root())?)?;
                tracing::info!(repo = clone_from, dest = %repo.root().display(), "cloning");
                github.clone_repo(clone_from, repo.root())?;
            }
            repo.set_identity(&config.bot.name, &config.bot.email)?;
            repo.ensure_remote(&config.upstream_remote, &github_url(upstream))?;
            tracing::info!(
                repo = upstream,
                branch = %repo.current_branch()?,
                "workspace ready"
            );
        }

        Ok(())
    }
}

fn parent_dir(path: &Path) -> Result<PathBuf> {
    path.parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| SyncError::Config(format!("{} has no parent directory", path.display())))
}

/// `owner/name` of `owner`'s fork of `repo`.
fn fork_name(repo: &str, owner: &str) -> Result<String> {
    let (_, name) = repo
        .split_once('/')
        .ok_or_else(|| SyncError::Config(format!("repository '{repo}' is not owner/name")))?;
    Ok(format!("{owner}/{name}"))
}
