//! Language eligibility: which languages are ready to ship.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::status::LanguageStatus;

/// A language selected for one sync pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LanguageTask {
    pub code: String,
    pub name: String,
    pub translation_pct: u8,
    pub approval_pct: u8,
}

/// Select languages meeting both thresholds. Both bounds are inclusive.
///
/// The result is keyed by language code, so iteration order is stable.
pub fn eligible(
    statuses: &BTreeMap<String, LanguageStatus>,
    min_translation: u8,
    min_approval: u8,
) -> BTreeMap<String, LanguageTask> {
    statuses
        .iter()
        .filter(|(_, s)| s.translation_progress >= min_translation)
        .filter(|(_, s)| s.approval_progress >= min_approval)
        .map(|(code, s)| {
            let task = LanguageTask {
                code: code.clone(),
                name: s.name.clone(),
                translation_pct: s.translation_progress,
                approval_pct: s.approval_progress,
            };
            (code.clone(), task)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    fn status(name: &str, progress: u8, approval: u8) -> LanguageStatus {
        LanguageStatus {
            name: name.to_string(),
            translation_progress: progress,
            approval_progress: approval,
        }
    }

    #[test]
    fn filters_on_both_thresholds() {
        let statuses = BTreeMap::from([
            ("fr".to_string(), status("French", 80, 60)),
            ("de".to_string(), status("German", 40, 90)),
        ]);

        let result = eligible(&statuses, 70, 50);

        assert_eq!(result.keys().collect::<Vec<_>>(), ["fr"]);
        assert_eq!(result["fr"].name, "French");
        assert_eq!(result["fr"].translation_pct, 80);
        assert_eq!(result["fr"].approval_pct, 60);
    }

    #[test]
    fn thresholds_are_inclusive() {
        let statuses = BTreeMap::from([("es".to_string(), status("Spanish", 70, 50))]);

        assert!(eligible(&statuses, 70, 50).contains_key("es"));
        assert!(!eligible(&statuses, 71, 50).contains_key("es"));
        assert!(!eligible(&statuses, 70, 51).contains_key("es"));
    }

    #[test]
    fn iteration_is_sorted_by_code() {
        let statuses = BTreeMap::from([
            ("zh-CN".to_string(), status("Chinese Simplified", 100, 100)),
            ("ar".to_string(), status("Arabic", 100, 100)),
            ("ko".to_string(), status("Korean", 100, 100)),
        ]);

        let codes: Vec<_> = eligible(&statuses, 0, 0).into_keys().collect();
        assert_eq!(codes, ["ar", "ko", "zh-CN"]);
    }

    proptest! {
        #[test]
        fn exactly_the_languages_meeting_both_thresholds(
            entries in prop::collection::btree_map("[a-z]{2}", (0u8..=100, 0u8..=100), 0..12),
            min_translation in 0u8..=100,
            min_approval in 0u8..=100,
        ) {
            let statuses: BTreeMap<String, LanguageStatus> = entries
                .iter()
                .map(|(code, (p, a))| (code.clone(), status(code, *p, *a)))
                .collect();

            let result = eligible(&statuses, min_translation, min_approval);

            for (code, (p, a)) in &entries {
                let expected = *p >= min_translation && *a >= min_approval;
                prop_assert_eq!(result.contains_key(code), expected);
            }
            prop_assert!(result.len() <= entries.len());
        }
    }
}
