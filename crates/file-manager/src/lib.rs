//! # PWA File Manager
//!
//! Workspace index for partial-wave analysis: which data file holds which
//! kinematic bin, which key file defines which wave, and where every
//! amplitude and integral file lives.
//!
//! ## Pipeline
//!
//! ```text
//! Config (TOML)
//!     │
//!     ├──> Data files (+ metadata)
//!     │      └─> Per-events-type axes ──> Global bin grid
//!     │
//!     ├──> Key files
//!     │      └─> Wave name registry
//!     │
//!     ├──> Additional binning (optional)
//!     │      └─> Coarse bin ──> fine bin map
//!     │
//!     └──> Path scheme
//!            └─> Amplitude + integral file paths ──> fm.json
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use pwa_file_manager::{store, EventsType, FileManager, FileManagerConfig};
//!
//! fn main() -> pwa_file_manager::Result<()> {
//!     let config = FileManagerConfig::load("pwa.toml")?;
//!     let built = FileManager::initialize(config.clone())?;
//!     store::save(&built.manager, &config.file_manager_path)?;
//!
//!     let manager = store::load(&config.file_manager_path)?;
//!     let path = manager.amplitude_file_path(0, "1-1++0+rho770_01_pi-.amp", EventsType::Real)?;
//!     println!("{}", path.display());
//!     Ok(())
//! }
//! ```

mod additional_binning;
mod binning;
mod catalog;
mod config;
mod error;
mod events_type;
mod key_files;
mod manager;
mod metadata;
mod path_scheme;
mod report;
mod scanner;
pub mod store;
mod sync;

pub use additional_binning::{
    bin_descriptor, build_bin_id_map, parse_additional_binning, AddBinId, AdditionalBin,
    AdditionalBinning, MASS_VARIABLE,
};
pub use binning::{combine_axes, derive_axes, Axis, AxisSet, Bin, BinId, BinRange, GlobalGrid};
pub use catalog::{data_file_paths, scan_data_files, DataFileRecord, DataFiles};
pub use config::{Directories, FileManagerConfig, MassScale, MassUnit};
pub use error::{FileManagerError, Result};
pub use events_type::{EventsType, INTEGRAL_EVENTS_TYPES};
pub use key_files::{
    key_file_paths, scan_key_files, AssignedWaves, AssignmentKeyFileParser, KeyFileEntry,
    KeyFileParser, KeyFiles, WaveDescription,
};
pub use manager::{BuildState, FileManager, FileManagerBuilder, Initialized};
pub use metadata::{DataFileMetadata, DataMetadataReader, SidecarMetadataReader};
pub use path_scheme::{
    amplitude_file_name, assign_amplitude_paths, assign_integral_paths, integral_dir_name,
    is_shard_limit_reached, AmplitudeAssignment, AmplitudeFileKey, AmplitudePaths,
    FilesPerDirLimit, IntegralFileKey, IntegralPaths,
};
pub use report::{BuildReport, BuildWarning};
pub use scanner::{FileScanner, DATA_FILE_EXTENSION, KEY_FILE_EXTENSION};
pub use store::{PersistedFileManager, FILE_MANAGER_SCHEMA_VERSION};
pub use sync::{assess_sync, FileSet, SyncAssessment, SyncReason};
