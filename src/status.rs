//! Translation status as reported by the translation-management service.
//!
//! The service query runs outside this tool; its result arrives as a JSON
//! object keyed by language code:
//!
//! ```json
//! { "fr": { "name": "French", "translationProgress": 80, "approvalProgress": 60 } }
//! ```

use std::{collections::BTreeMap, fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

/// Progress of one target language, in whole percent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageStatus {
    pub name: String,
    pub translation_progress: u8,
    pub approval_progress: u8,
}

/// Load per-language status from a JSON document.
pub fn load_statuses(path: &Path) -> Result<BTreeMap<String, LanguageStatus>> {
    let json = fs::read_to_string(path).map_err(|e| {
        SyncError::Config(format!("failed to read status file {}: {e}", path.display()))
    })?;
    parse_statuses(&json)
        .map_err(|e| SyncError::Config(format!("invalid status file {}: {e}", path.display())))
}

fn parse_statuses(json: &str) -> serde_json::Result<BTreeMap<String, LanguageStatus>> {
    serde_json::from_str(json)
}
