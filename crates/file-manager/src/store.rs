use crate::additional_binning::{AddBinId, AdditionalBinning};
use crate::binning::{Bin, BinId, GlobalGrid};
use crate::catalog::{DataFileRecord, DataFiles};
use crate::config::Directories;
use crate::key_files::KeyFiles;
use crate::manager::FileManager;
use crate::path_scheme::{AmplitudePaths, FilesPerDirLimit, IntegralPaths};
use crate::{EventsType, FileManagerError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const FILE_MANAGER_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AmplitudeFileRecord {
    pub bin_id: BinId,
    pub wave_name: String,
    pub events_type: EventsType,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct IntegralFileRecord {
    pub bin_id: BinId,
    pub events_type: EventsType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_bin_id: Option<AddBinId>,
    pub path: String,
}

/// On-disk form of a [`FileManager`].
///
/// Tuple-keyed maps are flattened into record lists so the document stays
/// plain JSON.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PersistedFileManager {
    pub schema_version: u32,
    pub directories: Directories,
    pub limit_setting: FilesPerDirLimit,
    pub limit_files_per_dir: Option<usize>,
    pub grid: GlobalGrid,
    pub bins: Vec<Bin>,
    pub key_files: KeyFiles,
    pub data_files: Vec<DataFileRecord>,
    pub amplitude_files: Vec<AmplitudeFileRecord>,
    pub integral_files: Vec<IntegralFileRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_binning: Option<AdditionalBinning>,
}

impl From<&FileManager> for PersistedFileManager {
    fn from(manager: &FileManager) -> Self {
        Self {
            schema_version: FILE_MANAGER_SCHEMA_VERSION,
            directories: manager.directories.clone(),
            limit_setting: manager.limit_setting,
            limit_files_per_dir: manager.limit_files_per_dir,
            grid: manager.grid.clone(),
            bins: manager.bins.clone(),
            key_files: manager.key_files.clone(),
            data_files: manager.data_files.values().flatten().cloned().collect(),
            amplitude_files: manager
                .amplitude_files
                .iter()
                .map(|((bin_id, wave_name, events_type), path)| AmplitudeFileRecord {
                    bin_id: *bin_id,
                    wave_name: wave_name.clone(),
                    events_type: *events_type,
                    path: path.clone(),
                })
                .collect(),
            integral_files: manager
                .integral_files
                .iter()
                .map(
                    |((bin_id, events_type, additional_bin_id), path)| IntegralFileRecord {
                        bin_id: *bin_id,
                        events_type: *events_type,
                        additional_bin_id: *additional_bin_id,
                        path: path.clone(),
                    },
                )
                .collect(),
            additional_binning: manager.additional_binning.clone(),
        }
    }
}

impl PersistedFileManager {
    fn into_manager(self) -> FileManager {
        let mut data_files = DataFiles::new();
        for record in self.data_files {
            data_files
                .entry(record.events_type)
                .or_default()
                .push(record);
        }
        let amplitude_files: AmplitudePaths = self
            .amplitude_files
            .into_iter()
            .map(|r| ((r.bin_id, r.wave_name, r.events_type), r.path))
            .collect();
        let integral_files: IntegralPaths = self
            .integral_files
            .into_iter()
            .map(|r| ((r.bin_id, r.events_type, r.additional_bin_id), r.path))
            .collect();
        FileManager {
            directories: self.directories,
            limit_setting: self.limit_setting,
            limit_files_per_dir: self.limit_files_per_dir,
            grid: self.grid,
            bins: self.bins,
            key_files: self.key_files,
            data_files,
            amplitude_files,
            integral_files,
            additional_binning: self.additional_binning,
        }
    }
}

/// Write `manager` to `path`. An existing file is never overwritten.
pub fn save(manager: &FileManager, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if path.exists() {
        return Err(FileManagerError::AlreadyExists(path.to_path_buf()));
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let persisted = PersistedFileManager::from(manager);
    let bytes = serde_json::to_vec_pretty(&persisted)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    log::info!("file manager written to '{}'", path.display());
    Ok(())
}

/// Read a saved file manager and refuse it when the key or data files on
/// disk no longer match what was recorded.
pub fn load(path: impl AsRef<Path>) -> Result<FileManager> {
    let manager = load_unchecked(path)?;
    let assessment = manager.assess_sync();
    if !assessment.synced {
        log::error!("{assessment}");
        return Err(FileManagerError::Sync(assessment));
    }
    Ok(manager)
}

/// Read a saved file manager without comparing it to the filesystem.
pub fn load_unchecked(path: impl AsRef<Path>) -> Result<FileManager> {
    let path = path.as_ref();
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(FileManagerError::NotFound(path.to_path_buf()));
        }
        Err(err) => return Err(err.into()),
    };
    let value: serde_json::Value = serde_json::from_slice(&bytes)?;
    let found = value
        .get("schema_version")
        .and_then(serde_json::Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(0);
    if found != FILE_MANAGER_SCHEMA_VERSION {
        return Err(FileManagerError::SchemaMismatch {
            found,
            expected: FILE_MANAGER_SCHEMA_VERSION,
        });
    }
    let persisted: PersistedFileManager = serde_json::from_value(value)?;
    log::debug!("file manager read from '{}'", path.display());
    Ok(persisted.into_manager())
}
