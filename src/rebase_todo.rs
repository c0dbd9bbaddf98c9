//! Rebase todo filtering: keep only the commits that belong to one language.
//!
//! The translation-management service tags each commit subject with the
//! language name in parentheses, e.g. `New translations index.md (French)`.
//! During an interactive rebase git hands us its instruction list; we drop
//! every line except the `pick`s tagged for the language being synced.

use std::{fs, io, path::Path};

/// The instruction at the start of a todo line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Pick,
    /// Anything else (`noop`, `exec`, comments, ...). Never retained.
    Other(String),
}

/// One parsed line of a rebase instruction list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebaseEntry {
    pub action: Action,
    pub commit_id: String,
    pub subject: String,
    /// The line exactly as git wrote it.
    pub line: String,
}

impl RebaseEntry {
    /// Parse a todo line into at most three tokens: action, commit id, subject.
    ///
    /// Returns `None` for blank lines. Missing tokens become empty strings.
    pub fn parse(line: &str) -> Option<Self> {
        let mut tokens = line.trim_start().splitn(3, char::is_whitespace);
        let action = tokens.next().filter(|a| !a.is_empty())?;
        let commit_id = tokens.next().unwrap_or_default();
        let subject = tokens.next().unwrap_or_default().trim();

        Some(Self {
            action: match action {
                "pick" => Action::Pick,
                other => Action::Other(other.to_string()),
            },
            commit_id: commit_id.to_string(),
            subject: subject.to_string(),
            line: line.to_string(),
        })
    }

    /// Whether this entry picks a commit tagged for `language`.
    pub fn belongs_to(&self, language: &str) -> bool {
        self.action == Action::Pick && self.subject.contains(&language_marker(language))
    }
}

/// The subject tag the translation service puts on a language's commits.
pub fn language_marker(language: &str) -> String {
    format!("({language})")
}

/// Filter a todo list down to the picks tagged for `language`.
///
/// Retained lines keep their original order and text; each is newline-terminated.
/// No match yields an empty string.
pub fn filter_todo(todo: &str, language: &str) -> String {
    let mut out = String::new();
    for entry in todo.lines().filter_map(RebaseEntry::parse) {
        if entry.belongs_to(language) {
            out.push_str(&entry.line);
            out.push('\n');
        } else if let Action::Other(action) = &entry.action {
            tracing::trace!("dropping {action} instruction");
        } else {
            tracing::debug!(commit = %entry.commit_id, "dropping pick: {}", entry.subject);
        }
    }
    out
}

/// Rewrite a todo file in place. Returns how many picks were kept.
pub fn filter_todo_file(path: &Path, language: &str) -> io::Result<usize> {
    let todo = fs::read_to_string(path)?;
    let filtered = filter_todo(&todo, language);
    fs::write(path, &filtered)?;
    Ok(filtered.lines().count())
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;
    use tempfile::TempDir;

    #[test]
    fn keeps_only_picks_for_the_language() {
        let todo = "pick abc123 Fix typo (French)\npick def456 Update nav (German)\nnoop\n";

        assert_eq!(filter_todo(todo, "French"), "pick abc123 Fix typo (French)\n");
    }

    #[test]
    fn preserves_order_of_retained_picks() {
        let todo = "\
pick 111 New translations a.md (Spanish)
pick 222 New translations a.md (French)
pick 333 New translations b.md (Spanish)
pick 444 New translations c.md (Spanish)
";
        assert_eq!(
            filter_todo(todo, "Spanish"),
            "pick 111 New translations a.md (Spanish)\n\
             pick 333 New translations b.md (Spanish)\n\
             pick 444 New translations c.md (Spanish)\n"
        );
    }

    #[test]
    fn drops_comments_and_other_actions() {
        let todo = "\
# Rebase 1a2b..3c4d onto 1a2b (3 commands)
squash 999 Squash me (French)
exec make (French)
pick 123 Real one (French)
#
# Commands:
";
        assert_eq!(filter_todo(todo, "French"), "pick 123 Real one (French)\n");
    }

    #[test]
    fn no_match_is_empty() {
        let todo = "pick abc123 Update nav (German)\n";
        assert_eq!(filter_todo(todo, "French"), "");
        assert_eq!(filter_todo("", "French"), "");
    }

    #[test]
    fn marker_must_be_parenthesised() {
        let todo = "pick abc123 French typo fixes\npick def456 Fix (Frenchy)\n";
        assert_eq!(filter_todo(todo, "French"), "");
    }

    #[test]
    fn region_names_with_spaces_match() {
        let todo = "pick abc Update (Portuguese, Brazilian)\npick def Update (Portuguese)\n";
        assert_eq!(
            filter_todo(todo, "Portuguese, Brazilian"),
            "pick abc Update (Portuguese, Brazilian)\n"
        );
    }

    #[test]
    fn parse_short_lines() {
        let entry = RebaseEntry::parse("pick abc123").unwrap();
        assert_eq!(entry.action, Action::Pick);
        assert_eq!(entry.commit_id, "abc123");
        assert_eq!(entry.subject, "");
        assert!(!entry.belongs_to("French"));

        let entry = RebaseEntry::parse("noop").unwrap();
        assert_eq!(entry.action, Action::Other("noop".into()));
        assert_eq!(entry.commit_id, "");

        assert!(RebaseEntry::parse("   ").is_none());
    }

    #[test]
    fn parse_keeps_line_verbatim() {
        let line = "pick abc123 Fix  double  spaces (French)";
        let entry = RebaseEntry::parse(line).unwrap();
        assert_eq!(entry.line, line);
        assert_eq!(entry.subject, "Fix  double  spaces (French)");
    }

    #[test]
    fn rewrites_file_in_place() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("git-rebase-todo");
        fs::write(
            &path,
            "pick abc123 Fix typo (French)\npick def456 Update nav (German)\n",
        )
        .unwrap();

        let kept = filter_todo_file(&path, "German").unwrap();

        assert_eq!(kept, 1);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "pick def456 Update nav (German)\n"
        );
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(filter_todo_file(&dir.path().join("nope"), "French").is_err());
    }

    fn todo_line() -> impl Strategy<Value = String> {
        let action = prop_oneof![
            Just("pick"),
            Just("drop"),
            Just("noop"),
            Just("#"),
            Just("fixup")
        ];
        let language = prop_oneof![Just("French"), Just("German"), Just("Spanish")];
        (action, "[0-9a-f]{7}", "[A-Za-z ]{0,12}", language).prop_map(
            |(action, id, subject, language)| format!("{action} {id} {subject} ({language})"),
        )
    }

    proptest! {
        #[test]
        fn filtering_is_idempotent(lines in prop::collection::vec(todo_line(), 0..20)) {
            let todo = lines.join("\n");
            let once = filter_todo(&todo, "French");
            prop_assert_eq!(filter_todo(&once, "French"), once);
        }

        #[test]
        fn filtering_preserves_relative_order(lines in prop::collection::vec(todo_line(), 0..20)) {
            let todo = lines.join("\n");
            let expected: Vec<&str> = lines
                .iter()
                .map(String::as_str)
                .filter(|l| l.starts_with("pick ") && l.ends_with("(German)"))
                .collect();
            let filtered = filter_todo(&todo, "German");
            let kept: Vec<&str> = filtered.lines().collect();
            prop_assert_eq!(kept, expected);
        }
    }
}
