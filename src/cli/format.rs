//! Output formatting for CLI display.

use std::{collections::BTreeMap, fmt::Write};

use crate::{
    eligibility::LanguageTask,
    lifecycle::LifecycleOutcome,
    pipeline::{RunReport, Stage, StageResult},
};

fn format_outcome(outcome: LifecycleOutcome) -> &'static str {
    match outcome {
        LifecycleOutcome::NoChanges => "no changes",
        LifecycleOutcome::PullRequestOpened => "pull request opened",
        LifecycleOutcome::AutoMergeTriggered => "auto-merge enabled",
        LifecycleOutcome::AutoMergeSkipped => "auto-merge skipped (unsigned commits)",
    }
}

fn format_stage_name(stage: Stage) -> &'static str {
    match stage {
        Stage::Rebase => "rebase",
        Stage::Reconcile => "reconcile",
        Stage::Commit => "commit",
        Stage::PullRequest => "pull request",
        Stage::Io => "local I/O",
    }
}

pub(super) fn format_stage(result: &StageResult) -> String {
    match result {
        StageResult::Completed { outcome, branch } => {
            format!("{} [{branch}]", format_outcome(*outcome))
        }
        StageResult::Failed { stage, message } => {
            format!("FAILED at {}: {message}", format_stage_name(*stage))
        }
    }
}

/// One block per language, then a totals line.
pub(super) fn format_report(report: &RunReport) -> String {
    if report.languages.is_empty() {
        return "No eligible languages\n".to_string();
    }

    let mut out = String::new();
    for language in &report.languages {
        let _ = writeln!(out, "{} ({})", language.name, language.code);
        let _ = writeln!(out, "  translations: {}", format_stage(&language.translations));
        if let Some(upstream) = &language.upstream {
            let _ = writeln!(out, "  upstream:     {}", format_stage(upstream));
        }
    }
    let _ = writeln!(
        out,
        "{} language(s), {} failure(s)",
        report.languages.len(),
        report.failures()
    );
    out
}

pub(super) fn format_tasks(tasks: &BTreeMap<String, LanguageTask>) -> String {
    let width = tasks.keys().map(String::len).max().unwrap_or(0);
    tasks.values().fold(String::new(), |mut out, t| {
        let _ = writeln!(
            out,
            "{:<width$}  {:>3}% translated  {:>3}% approved  {}",
            t.code, t.translation_pct, t.approval_pct, t.name
        );
        out
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use jiff::Timestamp;

    use crate::pipeline::LanguageReport;

    #[test]
    fn report_lists_each_language_and_totals() {
        let report = RunReport {
            started_at: Timestamp::UNIX_EPOCH,
            languages: vec![
                LanguageReport {
                    code: "de".into(),
                    name: "German".into(),
                    translations: StageResult::Failed {
                        stage: Stage::Rebase,
                        message: "conflict".into(),
                    },
                    upstream: None,
                },
                LanguageReport {
                    code: "fr".into(),
                    name: "French".into(),
                    translations: StageResult::Completed {
                        outcome: LifecycleOutcome::AutoMergeTriggered,
                        branch: "l10n_main_fr_x".into(),
                    },
                    upstream: Some(StageResult::Completed {
                        outcome: LifecycleOutcome::PullRequestOpened,
                        branch: "add/translations-fr".into(),
                    }),
                },
            ],
        };

        assert_eq!(
            format_report(&report),
            "German (de)\n  translations: FAILED at rebase: conflict\n\
             French (fr)\n  translations: auto-merge enabled [l10n_main_fr_x]\n\
             \x20 upstream:     pull request opened [add/translations-fr]\n\
             2 language(s), 1 failure(s)\n"
        );
    }

    #[test]
    fn empty_report() {
        let report = RunReport {
            started_at: Timestamp::UNIX_EPOCH,
            languages: Vec::new(),
        };
        assert_eq!(format_report(&report), "No eligible languages\n");
    }

    #[test]
    fn tasks_align_codes() {
        let tasks = BTreeMap::from([
            (
                "fr".to_string(),
                LanguageTask {
                    code: "fr".into(),
                    name: "French".into(),
                    translation_pct: 100,
                    approval_pct: 95,
                },
            ),
            (
                "pt-BR".to_string(),
                LanguageTask {
                    code: "pt-BR".into(),
                    name: "Portuguese, Brazilian".into(),
                    translation_pct: 100,
                    approval_pct: 100,
                },
            ),
        ]);

        assert_eq!(
            format_tasks(&tasks),
            "fr     100% translated   95% approved  French\n\
             pt-BR  100% translated  100% approved  Portuguese, Brazilian\n"
        );
    }
}
