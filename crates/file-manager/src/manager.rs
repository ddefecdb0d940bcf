use crate::additional_binning::{AddBinId, AdditionalBin, AdditionalBinning};
use crate::binning::{combine_axes, derive_axes, Bin, BinId, GlobalGrid};
use crate::catalog::{data_file_paths, scan_data_files, DataFileRecord, DataFiles};
use crate::config::{Directories, FileManagerConfig};
use crate::key_files::{key_file_paths, scan_key_files, AssignmentKeyFileParser, KeyFileEntry};
use crate::key_files::{KeyFileParser, KeyFiles};
use crate::metadata::{DataMetadataReader, SidecarMetadataReader};
use crate::path_scheme::{
    assign_amplitude_paths, assign_integral_paths, is_shard_limit_reached, AmplitudePaths,
    FilesPerDirLimit, IntegralPaths,
};
use crate::report::BuildReport;
use crate::sync::{assess_sync, SyncAssessment};
use crate::{EventsType, FileManagerError, Result};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::Range;
use std::path::PathBuf;
use std::time::Instant;

/// Lifecycle of one build. `Failed` is terminal: start over with a new builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    Unbuilt,
    Building,
    Ready,
    Failed,
}

/// Index of a PWA workspace: binning grid, key files, data files and the
/// output path of every amplitude and integral file.
///
/// Immutable once built; lookups never touch the filesystem.
#[derive(Debug, Clone, PartialEq)]
pub struct FileManager {
    pub(crate) directories: Directories,
    pub(crate) limit_setting: FilesPerDirLimit,
    pub(crate) limit_files_per_dir: Option<usize>,
    pub(crate) grid: GlobalGrid,
    pub(crate) bins: Vec<Bin>,
    pub(crate) key_files: KeyFiles,
    pub(crate) data_files: DataFiles,
    pub(crate) amplitude_files: AmplitudePaths,
    pub(crate) integral_files: IntegralPaths,
    pub(crate) additional_binning: Option<AdditionalBinning>,
}

/// A freshly built file manager together with its build statistics.
#[derive(Debug)]
pub struct Initialized {
    pub manager: FileManager,
    pub report: BuildReport,
}

pub struct FileManagerBuilder {
    config: FileManagerConfig,
    metadata_reader: Box<dyn DataMetadataReader>,
    key_file_parser: Box<dyn KeyFileParser>,
    state: BuildState,
}

impl FileManagerBuilder {
    pub fn new(config: FileManagerConfig) -> Self {
        Self {
            config,
            metadata_reader: Box::new(SidecarMetadataReader),
            key_file_parser: Box::new(AssignmentKeyFileParser),
            state: BuildState::Unbuilt,
        }
    }

    #[must_use]
    pub fn metadata_reader(mut self, reader: impl DataMetadataReader + 'static) -> Self {
        self.metadata_reader = Box::new(reader);
        self
    }

    #[must_use]
    pub fn key_file_parser(mut self, parser: impl KeyFileParser + 'static) -> Self {
        self.key_file_parser = Box::new(parser);
        self
    }

    #[must_use]
    pub const fn state(&self) -> BuildState {
        self.state
    }

    /// Run the whole build. Only an `Unbuilt` builder may build.
    pub fn build(&mut self) -> Result<Initialized> {
        if self.state != BuildState::Unbuilt {
            return Err(FileManagerError::Configuration(format!(
                "file manager builder is {:?}; a build runs only once",
                self.state
            )));
        }
        self.state = BuildState::Building;
        match self.run() {
            Ok(initialized) => {
                self.state = BuildState::Ready;
                Ok(initialized)
            }
            Err(err) => {
                self.state = BuildState::Failed;
                log::error!("file manager build failed: {err}");
                Err(err)
            }
        }
    }

    fn run(&self) -> Result<Initialized> {
        let start = Instant::now();
        let mut report = BuildReport::new();
        let config = &self.config;
        let dirs = &config.directories;

        log::info!("data file dir: '{}'", dirs.data.display());
        log::info!("key file dir: '{}'", dirs.keys.display());
        log::info!("amplitude file dir: '{}'", dirs.amplitudes.display());
        log::info!("integral file dir: '{}'", dirs.integrals.display());
        if let Some(file) = &config.additional_binning_file {
            log::info!("additional binning file: '{}'", file.display());
        }
        config.validate()?;

        // 1. Data files and the binning grid
        let data_files = scan_data_files(&dirs.data, self.metadata_reader.as_ref())?;
        let mut per_type = Vec::with_capacity(data_files.len());
        for (events_type, records) in &data_files {
            let (axes, warnings) = derive_axes(records)?;
            report.add_warnings(warnings);
            per_type.push((*events_type, axes));
        }
        let (grid, warnings) = combine_axes(&per_type)?;
        report.add_warnings(warnings);
        let bins = grid.enumerate_bins();

        // 2. Key files
        let key_files = scan_key_files(&dirs.keys, self.key_file_parser.as_ref())?;

        // 3. Optional coarse binning
        let additional_binning = config
            .additional_binning_file
            .as_deref()
            .map(|file| AdditionalBinning::load(file, &bins, config.mass_scale))
            .transpose()?;

        // 4. Output paths
        let events_types: Vec<EventsType> = data_files.keys().copied().collect();
        let total = bins.len() * key_files.len() * events_types.len();
        let limit_files_per_dir = config.limit_files_per_dir.resolve(total);
        match limit_files_per_dir {
            Some(limit) => log::info!("limit for files per directory set to {limit}"),
            None => log::info!("limit for files per directory set to infinite"),
        }
        let amplitudes = assign_amplitude_paths(
            &dirs.amplitudes,
            bins.len(),
            key_files.keys(),
            &events_types,
            limit_files_per_dir,
        )?;
        report.add_warnings(amplitudes.warnings);
        log::info!("number of amplitude files: {}", amplitudes.paths.len());
        let integral_files =
            assign_integral_paths(&dirs.integrals, bins.len(), additional_binning.as_ref())?;
        log::info!("number of integral files: {}", integral_files.len());

        report.data_files = data_files.values().map(Vec::len).sum();
        report.key_files = key_file_paths(&key_files).len();
        report.waves = key_files.len();
        report.bins = bins.len();
        report.amplitude_files = amplitudes.paths.len();
        report.integral_files = integral_files.len();
        report.shard_dirs = amplitudes.shard_dirs;
        report.limit_files_per_dir = limit_files_per_dir;
        report.time_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        let manager = FileManager {
            directories: dirs.clone(),
            limit_setting: config.limit_files_per_dir,
            limit_files_per_dir,
            grid,
            bins,
            key_files,
            data_files,
            amplitude_files: amplitudes.paths,
            integral_files,
            additional_binning,
        };
        Ok(Initialized { manager, report })
    }
}

impl FileManager {
    /// Build with the default metadata reader and key-file parser.
    pub fn initialize(config: FileManagerConfig) -> Result<Initialized> {
        FileManagerBuilder::new(config).build()
    }

    #[must_use]
    pub const fn directories(&self) -> &Directories {
        &self.directories
    }

    #[must_use]
    pub const fn grid(&self) -> &GlobalGrid {
        &self.grid
    }

    #[must_use]
    pub fn bins(&self) -> &[Bin] {
        &self.bins
    }

    #[must_use]
    pub fn bin_ids(&self) -> Range<BinId> {
        0..self.bins.len()
    }

    pub fn bin(&self, bin_id: BinId) -> Result<&Bin> {
        self.bins
            .get(bin_id)
            .ok_or_else(|| FileManagerError::Lookup(format!("binID not found: {bin_id}")))
    }

    /// Bins containing `point`, bounds inclusive. A point on a shared edge
    /// belongs to both neighbours.
    pub fn bin_ids_containing(&self, point: &BTreeMap<String, f64>) -> Result<Vec<BinId>> {
        for variable in point.keys() {
            if self.grid.axis(variable).is_none() {
                return Err(FileManagerError::Lookup(format!(
                    "unknown binning variable '{variable}'"
                )));
            }
        }
        Ok(self
            .bins
            .iter()
            .enumerate()
            .filter(|(_, bin)| {
                point
                    .iter()
                    .all(|(variable, value)| bin.get(variable).is_some_and(|r| r.contains(*value)))
            })
            .map(|(bin_id, _)| bin_id)
            .collect())
    }

    #[must_use]
    pub fn events_types(&self) -> Vec<EventsType> {
        self.data_files.keys().copied().collect()
    }

    #[must_use]
    pub const fn data_files(&self) -> &DataFiles {
        &self.data_files
    }

    /// First data file of `events_type` whose binning equals the bin exactly.
    pub fn data_file(&self, bin_id: BinId, events_type: EventsType) -> Result<&DataFileRecord> {
        let bin = self.bin(bin_id)?;
        let records = self.data_files.get(&events_type).ok_or_else(|| {
            FileManagerError::Lookup(format!(
                "did not find data files with events type '{events_type}'"
            ))
        })?;
        records
            .iter()
            .find(|record| record.binning == *bin)
            .ok_or_else(|| {
                FileManagerError::Lookup(format!(
                    "no data file found for binID = {bin_id} and events type '{events_type}'"
                ))
            })
    }

    #[must_use]
    pub fn data_file_paths(&self) -> Vec<PathBuf> {
        data_file_paths(&self.data_files)
    }

    /// Bins for which at least one events type has no data file.
    #[must_use]
    pub fn missing_bins(&self) -> BTreeSet<BinId> {
        self.bin_ids()
            .filter(|&bin_id| {
                self.data_files.values().any(|records| {
                    !records
                        .iter()
                        .any(|record| record.binning == self.bins[bin_id])
                })
            })
            .collect()
    }

    #[must_use]
    pub const fn key_files(&self) -> &KeyFiles {
        &self.key_files
    }

    pub fn key_file(&self, wave_name: &str) -> Result<&KeyFileEntry> {
        self.key_files
            .get(wave_name)
            .ok_or_else(|| FileManagerError::Lookup(format!("unknown wave name '{wave_name}'")))
    }

    #[must_use]
    pub fn key_file_paths(&self) -> Vec<PathBuf> {
        key_file_paths(&self.key_files)
    }

    pub fn wave_names(&self) -> impl Iterator<Item = &str> {
        self.key_files.keys().map(String::as_str)
    }

    #[must_use]
    pub const fn amplitude_files(&self) -> &AmplitudePaths {
        &self.amplitude_files
    }

    pub fn amplitude_file_path(
        &self,
        bin_id: BinId,
        wave_name: &str,
        events_type: EventsType,
    ) -> Result<PathBuf> {
        self.bin(bin_id)?;
        self.key_file(wave_name)?;
        self.amplitude_files
            .get(&(bin_id, wave_name.to_string(), events_type))
            .map(|rel| self.directories.amplitudes.join(rel))
            .ok_or_else(|| {
                FileManagerError::Lookup(format!(
                    "no amplitude file for binID = {bin_id}, wave '{wave_name}', events type '{events_type}'"
                ))
            })
    }

    /// Amplitude files of one bin and events type, keyed by wave name.
    pub fn amplitude_file_paths(
        &self,
        bin_id: BinId,
        events_type: EventsType,
    ) -> Result<BTreeMap<String, PathBuf>> {
        self.bin(bin_id)?;
        Ok(self
            .key_files
            .keys()
            .filter_map(|wave| {
                self.amplitude_files
                    .get(&(bin_id, wave.clone(), events_type))
                    .map(|rel| (wave.clone(), self.directories.amplitudes.join(rel)))
            })
            .collect())
    }

    #[must_use]
    pub const fn integral_files(&self) -> &IntegralPaths {
        &self.integral_files
    }

    /// Integral file of one bin. `additional_bin` is required exactly when
    /// additional binning is configured.
    pub fn integral_file_path(
        &self,
        bin_id: BinId,
        events_type: EventsType,
        additional_bin: Option<AddBinId>,
    ) -> Result<PathBuf> {
        self.bin(bin_id)?;
        match (additional_bin, &self.additional_binning) {
            (Some(_), None) => return Err(FileManagerError::NoAdditionalBinning),
            (None, Some(_)) => {
                return Err(FileManagerError::Lookup(
                    "integral files are split by additional bin; pass an additional bin ID".into(),
                ))
            }
            _ => {}
        }
        self.integral_files
            .get(&(bin_id, events_type, additional_bin))
            .map(|rel| self.directories.integrals.join(rel))
            .ok_or_else(|| {
                FileManagerError::Lookup(format!(
                    "no integral file for binID = {bin_id}, events type '{events_type}', additional bin {additional_bin:?}"
                ))
            })
    }

    /// Integral file combining all fine bins of one additional bin.
    pub fn additional_integral_file_path(
        &self,
        additional_bin: AddBinId,
        events_type: EventsType,
    ) -> Result<PathBuf> {
        let descriptor = self.require_additional()?.descriptor(additional_bin)?;
        Ok(self
            .directories
            .integrals
            .join(format!("{descriptor}_{}.root", events_type.code())))
    }

    #[must_use]
    pub const fn additional_binning(&self) -> Option<&AdditionalBinning> {
        self.additional_binning.as_ref()
    }

    pub fn additional_bins(&self) -> Result<&[AdditionalBin]> {
        Ok(&self.require_additional()?.bins)
    }

    pub fn bin_ids_for_additional_bin(&self, additional_bin: AddBinId) -> Result<&BTreeSet<BinId>> {
        self.require_additional()?.bin_ids(additional_bin)
    }

    pub fn additional_bin_ids_for_bin(&self, bin_id: BinId) -> Result<Vec<AddBinId>> {
        let binning = self.require_additional()?;
        self.bin(bin_id)?;
        Ok(binning.additional_bin_ids(bin_id))
    }

    /// Bins covered by at least one additional bin.
    pub fn active_bins(&self) -> Result<Vec<BinId>> {
        let binning = self.require_additional()?;
        Ok(self
            .bin_ids()
            .filter(|&bin_id| !binning.additional_bin_ids(bin_id).is_empty())
            .collect())
    }

    fn require_additional(&self) -> Result<&AdditionalBinning> {
        self.additional_binning
            .as_ref()
            .ok_or(FileManagerError::NoAdditionalBinning)
    }

    #[must_use]
    pub const fn limit_setting(&self) -> FilesPerDirLimit {
        self.limit_setting
    }

    /// Effective files-per-directory limit, `None` when unlimited.
    #[must_use]
    pub const fn limit_files_per_dir(&self) -> Option<usize> {
        self.limit_files_per_dir
    }

    #[must_use]
    pub fn is_shard_limit_reached(&self) -> bool {
        let total = self.bins.len() * self.key_files.len() * self.data_files.len();
        is_shard_limit_reached(total, self.limit_files_per_dir)
    }

    /// Compare the recorded key and data files with the directories on disk.
    #[must_use]
    pub fn assess_sync(&self) -> SyncAssessment {
        assess_sync(
            &self.directories.keys,
            &self.key_file_paths(),
            &self.directories.data,
            &self.data_file_paths(),
        )
    }

    #[must_use]
    pub fn are_files_synced(&self) -> bool {
        self.assess_sync().synced
    }

    /// Stable 64-bit fingerprint of the bin list and path assignments.
    ///
    /// Two builds from unchanged inputs yield the same value.
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = Sha256::new();
        for (bin_id, bin) in self.bins.iter().enumerate() {
            hasher.update(format!("bin {bin_id} {bin:?}\n").as_bytes());
        }
        for ((bin_id, wave, events_type), rel) in &self.amplitude_files {
            hasher.update(format!("amp {bin_id} {wave} {events_type} {rel}\n").as_bytes());
        }
        for ((bin_id, events_type, add_bin), rel) in &self.integral_files {
            hasher.update(format!("int {bin_id} {events_type} {add_bin:?} {rel}\n").as_bytes());
        }
        let digest = hasher.finalize();
        u64::from_be_bytes([
            digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6], digest[7],
        ])
    }
}

impl fmt::Display for FileManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "keyfiles:")?;
        for (wave, entry) in &self.key_files {
            writeln!(
                f,
                "{wave} >> {} [{}]",
                entry.path.display(),
                entry.amplitude_index
            )?;
        }
        writeln!(f, "\ndatafiles:")?;
        for (events_type, records) in &self.data_files {
            for record in records {
                writeln!(
                    f,
                    "eventsType [{events_type}], bin [{:?}] >> {}",
                    record.binning,
                    record.path.display()
                )?;
            }
        }
        writeln!(f, "\nampfiles:")?;
        for ((bin_id, wave, events_type), rel) in &self.amplitude_files {
            writeln!(
                f,
                "eventsType [{events_type}], binID [{bin_id}], wavename [{wave}] >> {rel}"
            )?;
        }
        writeln!(f, "\nintfiles:")?;
        for ((bin_id, events_type, add_bin), rel) in &self.integral_files {
            match add_bin {
                Some(add_bin) => writeln!(
                    f,
                    "eventsType [{events_type}], binID [{bin_id}], addBinID [{add_bin}] >> {rel}"
                )?,
                None => writeln!(f, "eventsType [{events_type}], binID [{bin_id}] >> {rel}")?,
            }
        }
        Ok(())
    }
}
