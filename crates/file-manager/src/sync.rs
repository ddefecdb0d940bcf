use crate::scanner::FileScanner;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FileSet {
    KeyFiles,
    DataFiles,
}

impl FileSet {
    const fn label(self) -> &'static str {
        match self {
            FileSet::KeyFiles => "key files",
            FileSet::DataFiles => "data files",
        }
    }
}

/// One recorded file set that no longer matches the filesystem.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct SyncReason {
    pub file_set: FileSet,
    /// On disk but not recorded.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub added: Vec<PathBuf>,
    /// Recorded but gone from disk.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removed: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct SyncAssessment {
    pub synced: bool,
    #[serde(default)]
    pub reasons: Vec<SyncReason>,
}

impl fmt::Display for SyncAssessment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.synced {
            return f.write_str("in sync");
        }
        let parts: Vec<String> = self
            .reasons
            .iter()
            .map(|reason| {
                format!(
                    "{} are not the same as in file manager ({} added, {} removed)",
                    reason.file_set.label(),
                    reason.added.len(),
                    reason.removed.len()
                )
            })
            .collect();
        f.write_str(&parts.join("; "))
    }
}

/// Compare recorded file sets with the files currently on disk.
#[must_use]
pub fn assess_sync(
    key_dir: &Path,
    recorded_keys: &[PathBuf],
    data_dir: &Path,
    recorded_data: &[PathBuf],
) -> SyncAssessment {
    let mut reasons = Vec::new();
    let live_keys = FileScanner::key_files(key_dir).scan();
    if let Some(reason) = compare(FileSet::KeyFiles, recorded_keys, &live_keys) {
        reasons.push(reason);
    }
    let live_data = FileScanner::data_files(data_dir).scan();
    if let Some(reason) = compare(FileSet::DataFiles, recorded_data, &live_data) {
        reasons.push(reason);
    }

    let synced = reasons.is_empty();
    SyncAssessment { synced, reasons }
}

fn compare(file_set: FileSet, recorded: &[PathBuf], live: &[PathBuf]) -> Option<SyncReason> {
    let recorded: BTreeSet<&PathBuf> = recorded.iter().collect();
    let live: BTreeSet<&PathBuf> = live.iter().collect();
    if recorded == live {
        return None;
    }
    Some(SyncReason {
        file_set,
        added: live.difference(&recorded).map(|p| (*p).clone()).collect(),
        removed: recorded.difference(&live).map(|p| (*p).clone()).collect(),
    })
}
