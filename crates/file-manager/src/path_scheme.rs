use crate::additional_binning::{AddBinId, AdditionalBinning};
use crate::binning::BinId;
use crate::events_type::INTEGRAL_EVENTS_TYPES;
use crate::report::BuildWarning;
use crate::{EventsType, FileManagerError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

pub type AmplitudeFileKey = (BinId, String, EventsType);
pub type IntegralFileKey = (BinId, EventsType, Option<AddBinId>);

/// Relative paths below the amplitude directory.
pub type AmplitudePaths = BTreeMap<AmplitudeFileKey, String>;
/// Relative paths below the integral directory.
pub type IntegralPaths = BTreeMap<IntegralFileKey, String>;

/// Bound on the number of amplitude files per directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "mode", content = "value", rename_all = "snake_case")]
pub enum FilesPerDirLimit {
    /// `-1`: never shard.
    Unlimited,
    /// `0`: set to the exact number of amplitude files.
    Auto,
    Max(usize),
}

impl FilesPerDirLimit {
    pub fn from_config(raw: i64) -> Result<Self> {
        match raw {
            -1 => Ok(FilesPerDirLimit::Unlimited),
            0 => Ok(FilesPerDirLimit::Auto),
            n if n > 0 => usize::try_from(n)
                .map(FilesPerDirLimit::Max)
                .map_err(|_| FileManagerError::Configuration(format!("limit {n} is too large"))),
            n => Err(FileManagerError::Configuration(format!(
                "limit_files_per_dir must be -1, 0, or positive, got {n}"
            ))),
        }
    }

    /// Effective limit for `total` files; `None` means unlimited.
    #[must_use]
    pub const fn resolve(self, total: usize) -> Option<usize> {
        match self {
            FilesPerDirLimit::Unlimited => None,
            FilesPerDirLimit::Auto => Some(total),
            FilesPerDirLimit::Max(n) => Some(n),
        }
    }
}

/// Whether `total` files exceed the effective limit and must be sharded.
#[must_use]
pub fn is_shard_limit_reached(total: usize, limit: Option<usize>) -> bool {
    limit.is_some_and(|limit| total > limit)
}

#[must_use]
pub fn amplitude_file_name(wave_name: &str, bin_id: BinId, events_type: EventsType) -> String {
    format!("{wave_name}_binID-{bin_id}_{}.root", events_type.code())
}

pub struct AmplitudeAssignment {
    pub paths: AmplitudePaths,
    pub shard_dirs: usize,
    pub warnings: Vec<BuildWarning>,
}

/// Assign a relative path to every (bin, wave, events type) triple.
///
/// When the limit is reached files are spread over numbered subdirectories,
/// which are created when missing.
pub fn assign_amplitude_paths<'a>(
    amplitude_dir: &Path,
    bin_count: usize,
    wave_names: impl IntoIterator<Item = &'a String> + Clone,
    events_types: &[EventsType],
    limit: Option<usize>,
) -> Result<AmplitudeAssignment> {
    let wave_count = wave_names.clone().into_iter().count();
    let total = bin_count * wave_count * events_types.len();
    let shard_limit = limit.filter(|&limit| is_shard_limit_reached(total, Some(limit)));

    let mut paths = AmplitudePaths::new();
    let mut shards: BTreeSet<usize> = BTreeSet::new();
    let mut file_count = 0usize;
    for bin_id in 0..bin_count {
        for wave_name in wave_names.clone() {
            for &events_type in events_types {
                let file_name = amplitude_file_name(wave_name, bin_id, events_type);
                let rel = match shard_limit {
                    Some(limit) => {
                        let sub_dir = file_count / limit;
                        shards.insert(sub_dir);
                        format!("{sub_dir}/{file_name}")
                    }
                    None => file_name,
                };
                file_count += 1;
                paths.insert((bin_id, wave_name.clone(), events_type), rel);
            }
        }
    }

    let mut warnings = Vec::new();
    if shard_limit.is_some() {
        for sub_dir in &shards {
            let full = amplitude_dir.join(sub_dir.to_string());
            if ensure_dir(&full)? {
                log::info!("created folder for amplitude files: '{}'", full.display());
            } else if !is_dir_empty(&full)? {
                warnings.push(BuildWarning::NonEmptyDirectory { path: full }.emit());
            }
        }
    } else if !is_dir_empty(amplitude_dir)? {
        warnings.push(
            BuildWarning::NonEmptyDirectory {
                path: amplitude_dir.to_path_buf(),
            }
            .emit(),
        );
    }

    Ok(AmplitudeAssignment {
        paths,
        shard_dirs: shards.len(),
        warnings,
    })
}

#[must_use]
pub fn integral_dir_name(bin_id: BinId) -> String {
    format!("integral_binID-{bin_id}")
}

/// Assign a relative integral path per bin for the generated and accepted
/// samples, and per additional bin when a coarse binning is present.
pub fn assign_integral_paths(
    integral_dir: &Path,
    bin_count: usize,
    additional: Option<&AdditionalBinning>,
) -> Result<IntegralPaths> {
    let mut paths = IntegralPaths::new();
    for bin_id in 0..bin_count {
        match additional {
            Some(binning) => {
                let sub_dir = integral_dir_name(bin_id);
                if ensure_dir(&integral_dir.join(&sub_dir))? {
                    log::debug!("created folder for integral files of bin {bin_id}");
                }
                for add_bin_id in 0..binning.bins.len() {
                    let descriptor = binning.descriptor(add_bin_id)?;
                    for events_type in INTEGRAL_EVENTS_TYPES {
                        paths.insert(
                            (bin_id, events_type, Some(add_bin_id)),
                            format!("{sub_dir}/{descriptor}_{}.root", events_type.code()),
                        );
                    }
                }
            }
            None => {
                for events_type in INTEGRAL_EVENTS_TYPES {
                    paths.insert(
                        (bin_id, events_type, None),
                        format!("{}_{}.root", integral_dir_name(bin_id), events_type.code()),
                    );
                }
            }
        }
    }
    Ok(paths)
}

/// Create `dir` if missing. Returns whether it was created.
fn ensure_dir(dir: &Path) -> Result<bool> {
    if dir.is_dir() {
        return Ok(false);
    }
    std::fs::create_dir_all(dir)?;
    Ok(true)
}

fn is_dir_empty(dir: &Path) -> Result<bool> {
    Ok(std::fs::read_dir(dir)?.next().is_none())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binning::{Bin, BinRange};
    use crate::config::MassScale;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    fn waves(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("wave{i}")).collect()
    }

    const TYPES: [EventsType; 2] = [EventsType::Real, EventsType::Accepted];

    #[test]
    fn limit_parsing() {
        assert_eq!(
            FilesPerDirLimit::from_config(-1).unwrap(),
            FilesPerDirLimit::Unlimited
        );
        assert_eq!(FilesPerDirLimit::from_config(0).unwrap(), FilesPerDirLimit::Auto);
        assert_eq!(
            FilesPerDirLimit::from_config(7).unwrap(),
            FilesPerDirLimit::Max(7)
        );
        assert!(FilesPerDirLimit::from_config(-2).is_err());
    }

    #[test]
    fn shard_predicate() {
        assert!(!is_shard_limit_reached(24, None));
        assert!(!is_shard_limit_reached(24, FilesPerDirLimit::Auto.resolve(24)));
        assert!(!is_shard_limit_reached(24, Some(24)));
        assert!(is_shard_limit_reached(24, Some(23)));
    }

    #[test]
    fn unsharded_paths_are_flat() {
        let temp = tempdir().unwrap();
        let waves = waves(4);
        let out = assign_amplitude_paths(temp.path(), 3, &waves, &TYPES, None).unwrap();
        assert_eq!(out.paths.len(), 24);
        assert_eq!(out.shard_dirs, 0);
        assert!(out.warnings.is_empty());
        assert_eq!(
            out.paths[&(2, "wave1".to_string(), EventsType::Accepted)],
            "wave1_binID-2_3.root"
        );
        assert!(out.paths.values().all(|p| !p.contains('/')));
    }

    #[test]
    fn sharding_splits_into_ceil_total_over_limit_dirs() {
        let temp = tempdir().unwrap();
        let waves = waves(4);
        let limit = 5;
        let out = assign_amplitude_paths(temp.path(), 3, &waves, &TYPES, Some(limit)).unwrap();
        assert_eq!(out.paths.len(), 24);
        assert_eq!(out.shard_dirs, 24_usize.div_ceil(limit));

        let mut per_dir: BTreeMap<String, usize> = BTreeMap::new();
        for path in out.paths.values() {
            let (dir, _) = path.split_once('/').unwrap();
            *per_dir.entry(dir.to_string()).or_default() += 1;
        }
        assert_eq!(per_dir.len(), 5);
        assert!(per_dir.values().all(|&n| n <= limit));
        assert_eq!(per_dir["4"], 4);
        for dir in per_dir.keys() {
            assert!(temp.path().join(dir).is_dir());
        }
        assert_eq!(
            out.paths[&(0, "wave0".to_string(), EventsType::Real)],
            "0/wave0_binID-0_1.root"
        );
    }

    #[test]
    fn warns_on_non_empty_output_dirs() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("stale.root"), b"").unwrap();
        let waves = waves(1);
        let out = assign_amplitude_paths(temp.path(), 1, &waves, &TYPES, None).unwrap();
        assert_eq!(out.warnings.len(), 1);

        fs::create_dir_all(temp.path().join("0")).unwrap();
        fs::write(temp.path().join("0").join("old.root"), b"").unwrap();
        let out = assign_amplitude_paths(temp.path(), 1, &waves, &TYPES, Some(1)).unwrap();
        assert_eq!(out.shard_dirs, 2);
        assert_eq!(
            out.warnings,
            vec![BuildWarning::NonEmptyDirectory {
                path: temp.path().join("0")
            }]
        );
    }

    #[test]
    fn flat_integral_paths() {
        let temp = tempdir().unwrap();
        let paths = assign_integral_paths(temp.path(), 2, None).unwrap();
        assert_eq!(paths.len(), 4);
        assert_eq!(
            paths[&(1, EventsType::Generated, None)],
            "integral_binID-1_2.root"
        );
        assert_eq!(
            paths[&(0, EventsType::Accepted, None)],
            "integral_binID-0_3.root"
        );
    }

    #[test]
    fn additional_binned_integral_paths() {
        let temp = tempdir().unwrap();
        let mut add_bin = Bin::new();
        add_bin.insert("mass".to_string(), BinRange::new(1.0, 1.5).unwrap());
        add_bin.insert("tPrime".to_string(), BinRange::new(0.1, 1.0).unwrap());
        let binning = AdditionalBinning {
            bins: vec![add_bin],
            bin_id_map: vec![BTreeSet::from([0])],
            mass_scale: MassScale::default(),
        };
        let paths = assign_integral_paths(temp.path(), 1, Some(&binning)).unwrap();
        assert_eq!(paths.len(), 2);
        assert_eq!(
            paths[&(0, EventsType::Accepted, Some(0))],
            "integral_binID-0/mass:1.0-1.5_tPrime:0.1-1.0_3.root"
        );
        assert!(temp.path().join("integral_binID-0").is_dir());
    }
}
