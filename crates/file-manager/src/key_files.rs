use crate::scanner::FileScanner;
use crate::{FileManagerError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Location of one amplitude inside a key file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct KeyFileEntry {
    pub path: PathBuf,
    pub amplitude_index: usize,
}

pub type KeyFiles = BTreeMap<String, KeyFileEntry>;

/// A parsed key file: a list of amplitudes, each identified by a wave name.
pub trait WaveDescription {
    fn amplitude_count(&self) -> usize;

    /// Canonical wave name of the amplitude at `index`, derived from its decay topology.
    fn wave_name(&self, index: usize) -> Result<String>;
}

pub trait KeyFileParser {
    fn parse(&self, key_file: &Path) -> Result<Box<dyn WaveDescription>>;
}

/// Parser for libconfig-style assignments of the form `waveName = "<name>";`.
/// Each assignment declares one amplitude.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssignmentKeyFileParser;

const WAVE_NAME_KEY: &str = "waveName";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignedWaves {
    names: Vec<String>,
}

impl AssignedWaves {
    #[must_use]
    pub fn parse_content(content: &str) -> Self {
        let names = content
            .lines()
            .filter_map(|line| {
                let (key, value) = line.split_once('=')?;
                if key.trim() != WAVE_NAME_KEY {
                    return None;
                }
                Some(assigned_value(value).to_string())
            })
            .collect();
        Self { names }
    }
}

/// Value of one assignment: the quoted text if quoted, otherwise everything
/// before a trailing comment or `;`.
fn assigned_value(raw: &str) -> &str {
    let raw = raw.trim_start();
    if let Some(quoted) = raw.strip_prefix('"') {
        return quoted.split_once('"').map_or(quoted, |(name, _)| name);
    }
    let end = ["//", "/*", "#"]
        .iter()
        .filter_map(|marker| raw.find(marker))
        .min()
        .unwrap_or(raw.len());
    raw[..end].trim().trim_end_matches(';').trim_end()
}

impl WaveDescription for AssignedWaves {
    fn amplitude_count(&self) -> usize {
        self.names.len()
    }

    fn wave_name(&self, index: usize) -> Result<String> {
        let name = self.names.get(index).ok_or_else(|| {
            FileManagerError::Scan(format!("amplitude index {index} out of range"))
        })?;
        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(FileManagerError::Scan(format!(
                "invalid wave name '{name}' for amplitude {index}"
            )));
        }
        Ok(name.clone())
    }
}

impl KeyFileParser for AssignmentKeyFileParser {
    fn parse(&self, key_file: &Path) -> Result<Box<dyn WaveDescription>> {
        let content = std::fs::read_to_string(key_file).map_err(|err| {
            FileManagerError::Scan(format!(
                "could not read key file '{}': {err}",
                key_file.display()
            ))
        })?;
        Ok(Box::new(AssignedWaves::parse_content(&content)))
    }
}

/// Parse every key file in `key_dir` and register its waves.
pub fn scan_key_files(key_dir: &Path, parser: &dyn KeyFileParser) -> Result<KeyFiles> {
    let paths = FileScanner::key_files(key_dir).scan();
    if paths.is_empty() {
        return Err(FileManagerError::Scan(format!(
            "no key files found in '{}'",
            key_dir.display()
        )));
    }

    let mut key_files = KeyFiles::new();
    for path in paths {
        let description = parser.parse(&path)?;
        let count = description.amplitude_count();
        if count == 0 {
            return Err(FileManagerError::Scan(format!(
                "key file '{}' declares no amplitudes",
                path.display()
            )));
        }
        for amplitude_index in 0..count {
            let wave_name = description.wave_name(amplitude_index).map_err(|err| {
                FileManagerError::Scan(format!(
                    "could not construct decay topology for key file '{}': {err}",
                    path.display()
                ))
            })?;
            if let Some(existing) = key_files.get(&wave_name) {
                return Err(FileManagerError::DuplicateWaveName {
                    wave_name,
                    first: existing.path.clone(),
                    second: path,
                });
            }
            key_files.insert(
                wave_name,
                KeyFileEntry {
                    path: path.clone(),
                    amplitude_index,
                },
            );
        }
    }

    log::info!("Registered {} waves from key files", key_files.len());
    Ok(key_files)
}

#[must_use]
pub fn key_file_paths(key_files: &KeyFiles) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = key_files.values().map(|e| e.path.clone()).collect();
    paths.sort();
    paths.dedup();
    paths
}
