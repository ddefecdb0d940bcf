use crate::binning::Bin;
use crate::metadata::DataMetadataReader;
use crate::scanner::FileScanner;
use crate::{EventsType, FileManagerError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// One physical data file with its binning annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DataFileRecord {
    pub path: PathBuf,
    pub binning: Bin,
    pub events_type: EventsType,
}

pub type DataFiles = BTreeMap<EventsType, Vec<DataFileRecord>>;

/// Scan the data directory and group its files by events type.
///
/// Each file yields exactly one record; duplicate copies of the same bin are
/// kept as distinct records.
pub fn scan_data_files(data_dir: &Path, reader: &dyn DataMetadataReader) -> Result<DataFiles> {
    let paths = FileScanner::data_files(data_dir).scan();
    if paths.is_empty() {
        return Err(FileManagerError::Scan(format!(
            "no data files found in '{}'",
            data_dir.display()
        )));
    }

    let mut data_files = DataFiles::new();
    for path in paths {
        let meta = reader.read(&path)?;
        let events_type = EventsType::from_external(meta.events_type).map_err(|err| {
            FileManagerError::Scan(format!("event file '{}': {err}", path.display()))
        })?;
        log::debug!(
            "data file {} [{events_type}] {:?}",
            path.display(),
            meta.binning
        );
        data_files
            .entry(events_type)
            .or_default()
            .push(DataFileRecord {
                path,
                binning: meta.binning,
                events_type,
            });
    }

    for (events_type, records) in &data_files {
        if records.is_empty() {
            return Err(FileManagerError::Scan(format!(
                "no binning maps found for events type '{events_type}'"
            )));
        }
    }

    log::info!(
        "Found data files for events types {:?}",
        data_files.keys().map(|et| et.as_str()).collect::<Vec<_>>()
    );
    Ok(data_files)
}

#[must_use]
pub fn data_file_paths(data_files: &DataFiles) -> Vec<PathBuf> {
    data_files
        .values()
        .flatten()
        .map(|record| record.path.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::SidecarMetadataReader;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    fn write_data_file(dir: &Path, name: &str, events_type: i64, lower: f64, upper: f64) {
        let path = dir.join(name);
        fs::write(&path, b"").unwrap();
        let meta = format!(
            r#"{{"events_type": {events_type}, "binning": {{"mass": [{lower:?}, {upper:?}]}}}}"#
        );
        fs::write(SidecarMetadataReader::sidecar_path(&path), meta).unwrap();
    }

    #[test]
    fn groups_files_by_events_type() {
        let temp = tempdir().unwrap();
        write_data_file(temp.path(), "real_0.root", 1, 1000.0, 1100.0);
        write_data_file(temp.path(), "real_1.root", 1, 1100.0, 1200.0);
        write_data_file(temp.path(), "acc_0.root", 3, 1000.0, 1100.0);

        let files = scan_data_files(temp.path(), &SidecarMetadataReader).unwrap();
        assert_eq!(
            files.keys().copied().collect::<Vec<_>>(),
            vec![EventsType::Real, EventsType::Accepted]
        );
        assert_eq!(files[&EventsType::Real].len(), 2);
        assert_eq!(data_file_paths(&files).len(), 3);
    }

    #[test]
    fn empty_directory_is_a_scan_error() {
        let temp = tempdir().unwrap();
        let err = scan_data_files(temp.path(), &SidecarMetadataReader).unwrap_err();
        assert!(matches!(err, FileManagerError::Scan(_)));
    }

    #[test]
    fn unknown_events_type_is_a_scan_error() {
        let temp = tempdir().unwrap();
        write_data_file(temp.path(), "odd.root", 9, 1000.0, 1100.0);
        let err = scan_data_files(temp.path(), &SidecarMetadataReader).unwrap_err();
        assert!(matches!(err, FileManagerError::Scan(msg) if msg.contains("odd.root")));
    }
}
