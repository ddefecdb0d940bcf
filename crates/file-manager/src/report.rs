use crate::binning::BinRange;
use crate::EventsType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Non-fatal finding raised while building a file manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BuildWarning {
    Gap {
        variable: String,
        before: BinRange,
        after: BinRange,
    },
    VariableMismatch {
        events_type: EventsType,
        expected: Vec<String>,
        found: Vec<String>,
    },
    NonEmptyDirectory {
        path: PathBuf,
    },
}

impl BuildWarning {
    /// Log the warning and hand it back, so call sites can `push(warn(..))`.
    pub(crate) fn emit(self) -> Self {
        log::warn!("{self}");
        self
    }
}

impl fmt::Display for BuildWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildWarning::Gap {
                variable,
                before,
                after,
            } => write!(
                f,
                "gap in bin structure found for binned variable '{variable}' between bin {before} and bin {after}"
            ),
            BuildWarning::VariableMismatch {
                events_type,
                expected,
                found,
            } => write!(
                f,
                "found different binning variables for events type '{events_type}': expected {expected:?}, found {found:?}"
            ),
            BuildWarning::NonEmptyDirectory { path } => {
                write!(f, "directory '{}' is not empty", path.display())
            }
        }
    }
}

/// Statistics about one build
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildReport {
    /// Data files found, over all events types
    pub data_files: usize,

    /// Key files parsed
    pub key_files: usize,

    pub waves: usize,

    pub bins: usize,

    pub amplitude_files: usize,

    pub integral_files: usize,

    /// Number of amplitude shard directories (0 when not sharded)
    pub shard_dirs: usize,

    /// Effective files-per-directory limit, `None` when unlimited
    pub limit_files_per_dir: Option<usize>,

    /// Time taken in milliseconds
    pub time_ms: u64,

    pub warnings: Vec<BuildWarning>,
}

impl BuildReport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append warnings, skipping ones already recorded by an earlier stage.
    pub fn add_warnings(&mut self, warnings: impl IntoIterator<Item = BuildWarning>) {
        for warning in warnings {
            if !self.warnings.contains(&warning) {
                self.warnings.push(warning);
            }
        }
    }

    #[must_use]
    pub fn gap_count(&self) -> usize {
        self.warnings
            .iter()
            .filter(|w| matches!(w, BuildWarning::Gap { .. }))
            .count()
    }
}
