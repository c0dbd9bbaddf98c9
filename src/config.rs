//! Transync configuration.
//!
//! Loaded from a TOML file, resolved through a chain:
//!
//! 1. `--config <path>` — explicit per-invocation file
//! 2. `./transync.toml` — project-local file
//! 3. `<config dir>/transync/config.toml` — per-user default
//!
//! The bot identity can be supplied by the environment instead
//! (`TRANSYNC_BOT_NAME`, `TRANSYNC_BOT_EMAIL`), which wins over the file.

use std::{
    collections::BTreeMap,
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;

use crate::error::{Result, SyncError};

pub const BOT_NAME_VAR: &str = "TRANSYNC_BOT_NAME";
pub const BOT_EMAIL_VAR: &str = "TRANSYNC_BOT_EMAIL";

const LOCAL_CONFIG: &str = "transync.toml";

/// Transync configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// JSON document with per-language progress.
    pub status_file: PathBuf,

    /// Minimum translation percentage, inclusive.
    #[serde(default)]
    pub min_translation: u8,

    /// Minimum approval percentage, inclusive.
    #[serde(default)]
    pub min_approval: u8,

    /// Enable auto-merge once every commit is verified as the bot's.
    #[serde(default)]
    pub auto_merge: bool,

    /// Treat signatures as verified. For local runs without signing keys.
    #[serde(default)]
    pub run_local: bool,

    /// Pass `-S` to every commit.
    #[serde(default)]
    pub sign_commits: bool,

    /// Kill any git or gh call running longer than this.
    pub command_timeout_secs: Option<u64>,

    /// Remote that tracks the canonical repositories.
    #[serde(default = "default_upstream_remote")]
    pub upstream_remote: String,

    /// Remote the bot pushes branches to.
    #[serde(default = "default_push_remote")]
    pub push_remote: String,

    #[serde(default)]
    pub bot: BotConfig,

    pub source: SourceConfig,

    pub translations: TranslationsConfig,

    /// Language code → directory name, for codes that differ on disk (`pt-BR` → `pt`).
    #[serde(default)]
    pub languages: BTreeMap<String, String>,
}

/// The identity commits are authored and signed as.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BotConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

impl BotConfig {
    /// The `name <email>` string expected in signature payloads.
    pub fn signer(&self) -> String {
        format!("{} <{}>", self.name, self.email)
    }
}

/// The repository the translated content finally lands in.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SourceConfig {
    /// `owner/name` on GitHub.
    pub repo: String,

    /// Local clone directory.
    pub root: PathBuf,

    #[serde(default = "default_branch")]
    pub branch: String,

    /// Per-language directory inside the repository; `{language}` is substituted.
    pub translations_dir: String,

    /// Owner of the bot's fork, which upstream branches are pushed to.
    pub fork_owner: Option<String>,

    /// Open "Add translations" pull requests against this repository.
    #[serde(default)]
    pub create_pull_requests: bool,

    /// Directory mirrored into the translations repository by `sync-content`.
    pub content_dir: Option<String>,
}

/// The repository the translation-management service commits to.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TranslationsConfig {
    pub repo: String,

    pub root: PathBuf,

    /// Branch holding untranslated source content.
    #[serde(default = "default_branch")]
    pub source_branch: String,

    /// Long-lived branch the translation service writes to.
    #[serde(default = "default_translation_branch")]
    pub translation_branch: String,

    /// Source-language directory, relative to the repository root.
    pub source_dir: String,

    /// Per-language directory; `{language}` is substituted.
    pub translation_dir: String,

    /// Destination of `sync-content`, relative to the repository root.
    pub content_dir: Option<String>,
}

fn default_upstream_remote() -> String {
    "upstream".to_string()
}

fn default_push_remote() -> String {
    "origin".to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_translation_branch() -> String {
    "l10n_main".to_string()
}

impl Config {
    /// Load config from the first file found in the resolution chain.
    ///
    /// Relative paths inside the file are resolved against the file's directory.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_path(explicit)?;

        let contents = fs::read_to_string(&path)
            .map_err(|e| SyncError::Config(format!("failed to read {}: {e}", path.display())))?;

        let mut config = Self::parse(&contents)
            .map_err(|e| SyncError::Config(format!("invalid config at {}: {e}", path.display())))?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.rebase_paths(base);
        config.apply_env(|key| env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    pub fn parse(contents: &str) -> core::result::Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    fn resolve_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            return Ok(path.to_path_buf());
        }

        let local = PathBuf::from(LOCAL_CONFIG);
        if local.is_file() {
            return Ok(local);
        }

        if let Some(user) = Self::user_path()
            && user.is_file()
        {
            return Ok(user);
        }

        Err(SyncError::Config(format!(
            "no config file found: pass --config <path>, create ./{LOCAL_CONFIG}, \
             or add one under your user config directory"
        )))
    }

    /// The per-user config file path: `<config dir>/transync/config.toml`.
    pub fn user_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("transync").join("config.toml"))
    }

    fn rebase_paths(&mut self, base: &Path) {
        for path in [
            &mut self.status_file,
            &mut self.source.root,
            &mut self.translations.root,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }

    /// Let the environment override the bot identity.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(name) = lookup(BOT_NAME_VAR).filter(|s| !s.is_empty()) {
            self.bot.name = name;
        }
        if let Some(email) = lookup(BOT_EMAIL_VAR).filter(|s| !s.is_empty()) {
            self.bot.email = email;
        }
    }

    /// Reject configurations that would fail halfway through a run.
    pub fn validate(&self) -> Result<()> {
        if self.bot.name.is_empty() || self.bot.email.is_empty() {
            return Err(SyncError::Config(format!(
                "bot identity required: set [bot] name and email, \
                 or {BOT_NAME_VAR} and {BOT_EMAIL_VAR}"
            )));
        }
        if self.min_translation > 100 || self.min_approval > 100 {
            return Err(SyncError::Config(
                "thresholds are percentages and must be at most 100".to_string(),
            ));
        }
        for template in [&self.translations.translation_dir, &self.source.translations_dir] {
            if !template.contains("{language}") {
                return Err(SyncError::Config(format!(
                    "directory template '{template}' must contain {{language}}"
                )));
            }
        }
        if self.source.create_pull_requests && self.source.fork_owner.is_none() {
            return Err(SyncError::Config(
                "source.fork-owner is required when source.create-pull-requests is set"
                    .to_string(),
            ));
        }
        Ok(())
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    const SAMPLE: &str = r#"
status-file = "status.json"
min-translation = 100
auto-merge = true
sign-commits = true

[bot]
name = "Translations Bot"
email = "bot@example.org"

[source]
repo = "org/website"
root = "website"
translations-dir = "content/{language}"
fork-owner = "translations-bot"
create-pull-requests = true

[translations]
repo = "org/website-translations"
root = "website-translations"
source-dir = "content/en"
translation-dir = "content/{language}"

[languages]
pt-BR = "pt"
"#;

    #[test]
    fn parses_sample_with_defaults() {
        let config = Config::parse(SAMPLE).unwrap();

        assert_eq!(config.min_translation, 100);
        assert_eq!(config.min_approval, 0);
        assert!(config.auto_merge);
        assert!(!config.run_local);
        assert_eq!(config.upstream_remote, "upstream");
        assert_eq!(config.push_remote, "origin");
        assert_eq!(config.source.branch, "main");
        assert_eq!(config.translations.source_branch, "main");
        assert_eq!(config.translations.translation_branch, "l10n_main");
        assert_eq!(config.languages["pt-BR"], "pt");
        assert!(config.command_timeout().is_none());
        config.validate().unwrap();
    }

    #[test]
    fn signer_formats_name_and_email() {
        let config = Config::parse(SAMPLE).unwrap();
        assert_eq!(config.bot.signer(), "Translations Bot <bot@example.org>");
    }

    #[test]
    fn env_overrides_bot_identity() {
        let mut config = Config::parse(SAMPLE).unwrap();
        config.apply_env(|key| match key {
            BOT_NAME_VAR => Some("Other Bot".to_string()),
            BOT_EMAIL_VAR => Some(String::new()),
            _ => None,
        });

        assert_eq!(config.bot.name, "Other Bot");
        // Empty values are ignored.
        assert_eq!(config.bot.email, "bot@example.org");
    }

    #[test]
    fn missing_bot_identity_is_rejected() {
        let mut config = Config::parse(SAMPLE).unwrap();
        config.bot = BotConfig::default();

        assert!(matches!(config.validate(), Err(SyncError::Config(_))));
    }

    #[test]
    fn template_without_placeholder_is_rejected() {
        let mut config = Config::parse(SAMPLE).unwrap();
        config.translations.translation_dir = "content/fr".to_string();

        assert!(config.validate().is_err());
    }

    #[test]
    fn upstream_pull_requests_need_a_fork_owner() {
        let mut config = Config::parse(SAMPLE).unwrap();
        config.source.fork_owner = None;

        assert!(config.validate().is_err());
    }

    #[test]
    fn load_resolves_relative_paths_against_config_dir() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("transync.toml");
        fs::write(&path, SAMPLE).unwrap();

        let config = Config::load(Some(&path)).unwrap();

        assert_eq!(config.status_file, dir.path().join("status.json"));
        assert_eq!(config.source.root, dir.path().join("website"));
        assert_eq!(config.translations.root, dir.path().join("website-translations"));
    }

    #[test]
    fn load_missing_explicit_file_fails() {
        let dir = TempDir::new().unwrap();
        let err = Config::load(Some(&dir.path().join("missing.toml"))).unwrap_err();

        assert!(matches!(err, SyncError::Config(_)));
    }
}
