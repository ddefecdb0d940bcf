use crate::sync::SyncAssessment;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FileManagerError>;

#[derive(Error, Debug)]
pub enum FileManagerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Scan error: {0}")]
    Scan(String),

    #[error("Binning consistency error: {0}")]
    BinningConsistency(String),

    #[error("duplicate wave name '{wave_name}' from files '{}' and '{}'", first.display(), second.display())]
    DuplicateWaveName {
        wave_name: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("file manager is desynchronized from the filesystem: {0}")]
    Sync(SyncAssessment),

    #[error("Unsupported file manager schema_version {found} (expected {expected})")]
    SchemaMismatch { found: u32, expected: u32 },

    #[error("file manager not found at '{}'", .0.display())]
    NotFound(PathBuf),

    #[error("cannot write file manager to '{}': file already exists", .0.display())]
    AlreadyExists(PathBuf),

    #[error("Lookup error: {0}")]
    Lookup(String),

    #[error("no additional binning available; set additional_binning_file in the config")]
    NoAdditionalBinning,
}
