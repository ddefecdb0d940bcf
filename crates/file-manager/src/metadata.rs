use crate::binning::{Bin, BinRange};
use crate::{FileManagerError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// What the file manager needs to know about one data file.
#[derive(Debug, Clone, PartialEq)]
pub struct DataFileMetadata {
    pub binning: Bin,
    /// Events type in the metadata's own integer scheme.
    pub events_type: i64,
}

/// Source of per-file binning metadata.
///
/// Implementations wrap whatever library understands the data-file format.
pub trait DataMetadataReader {
    fn read(&self, data_file: &Path) -> Result<DataFileMetadata>;
}

/// Reads metadata from a JSON sidecar next to each data file:
/// `events.root` is described by `events.root.json`.
///
/// ```json
/// {"events_type": 1, "binning": {"mass": [1000.0, 1050.0]}}
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct SidecarMetadataReader;

pub const SIDECAR_SUFFIX: &str = "json";

#[derive(Debug, Deserialize)]
struct RawSidecar {
    events_type: i64,
    #[serde(default)]
    binning: BTreeMap<String, [f64; 2]>,
}

impl SidecarMetadataReader {
    #[must_use]
    pub fn sidecar_path(data_file: &Path) -> PathBuf {
        let mut name = data_file.as_os_str().to_os_string();
        name.push(".");
        name.push(SIDECAR_SUFFIX);
        PathBuf::from(name)
    }
}

impl DataMetadataReader for SidecarMetadataReader {
    fn read(&self, data_file: &Path) -> Result<DataFileMetadata> {
        if !data_file.is_file() {
            return Err(FileManagerError::Scan(format!(
                "could not open event file '{}'",
                data_file.display()
            )));
        }
        let sidecar = Self::sidecar_path(data_file);
        let bytes = std::fs::read(&sidecar).map_err(|err| {
            FileManagerError::Scan(format!(
                "could not find metadata in event file '{}' ({}: {err})",
                data_file.display(),
                sidecar.display()
            ))
        })?;
        let raw: RawSidecar = serde_json::from_slice(&bytes).map_err(|err| {
            FileManagerError::Scan(format!(
                "malformed metadata for event file '{}': {err}",
                data_file.display()
            ))
        })?;

        let mut binning = Bin::new();
        for (variable, [lower, upper]) in raw.binning {
            let range = BinRange::new(lower, upper).map_err(|err| {
                FileManagerError::Scan(format!(
                    "invalid range for '{variable}' in event file '{}': {err}",
                    data_file.display()
                ))
            })?;
            binning.insert(variable, range);
        }
        Ok(DataFileMetadata {
            binning,
            events_type: raw.events_type,
        })
    }
}
