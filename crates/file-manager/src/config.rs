use crate::path_scheme::FilesPerDirLimit;
use crate::{FileManagerError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Unit of a mass-like binning value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum MassUnit {
    Kev,
    #[default]
    Mev,
    Gev,
}

impl MassUnit {
    const fn in_kev(self) -> f64 {
        match self {
            MassUnit::Kev => 1.0,
            MassUnit::Mev => 1.0e3,
            MassUnit::Gev => 1.0e6,
        }
    }
}

/// Conversion between the units of the fine (data-file) binning and the
/// additional binning file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MassScale {
    pub fine: MassUnit,
    pub additional: MassUnit,
}

impl Default for MassScale {
    fn default() -> Self {
        Self {
            fine: MassUnit::Mev,
            additional: MassUnit::Gev,
        }
    }
}

impl MassScale {
    /// Divisor that brings a fine-binning value into additional-binning units.
    #[must_use]
    pub fn factor(&self) -> f64 {
        self.additional.in_kev() / self.fine.in_kev()
    }

    #[must_use]
    pub fn to_additional(&self, fine_value: f64) -> f64 {
        fine_value / self.factor()
    }
}

/// Directories the file manager reads from and writes into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Directories {
    pub data: PathBuf,
    pub keys: PathBuf,
    pub amplitudes: PathBuf,
    pub integrals: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileManagerConfig {
    pub directories: Directories,
    pub file_manager_path: PathBuf,
    pub limit_files_per_dir: FilesPerDirLimit,
    pub additional_binning_file: Option<PathBuf>,
    pub mass_scale: MassScale,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    data_directory: Option<PathBuf>,
    key_directory: Option<PathBuf>,
    amplitude_directory: Option<PathBuf>,
    integral_directory: Option<PathBuf>,
    file_manager_path: Option<PathBuf>,
    limit_files_per_dir: Option<i64>,
    additional_binning_file: Option<PathBuf>,
    fine_mass_unit: Option<MassUnit>,
    additional_mass_unit: Option<MassUnit>,
}

impl FileManagerConfig {
    /// Load a config file (TOML, or JSON when the extension is `.json`).
    /// Relative paths are resolved against the config file's directory, so
    /// every resolved path is absolute.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| {
            FileManagerError::Configuration(format!(
                "cannot read config file '{}': {err}",
                path.display()
            ))
        })?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let raw: RawConfig = if is_json {
            serde_json::from_str(&text)?
        } else {
            toml::from_str(&text)?
        };
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_raw(raw, base)
    }

    /// Parse TOML config text, resolving relative paths against `base`.
    /// A relative `base` is taken from the working directory.
    pub fn from_toml_str(text: &str, base: &Path) -> Result<Self> {
        let raw: RawConfig = toml::from_str(text)?;
        Self::from_raw(raw, base)
    }

    fn from_raw(raw: RawConfig, base: &Path) -> Result<Self> {
        let base = absolute_base(base)?;
        let base = base.as_path();
        let resolve = |field: &str, value: Option<PathBuf>| -> Result<PathBuf> {
            let value = value.ok_or_else(|| {
                FileManagerError::Configuration(format!("missing required field '{field}'"))
            })?;
            Ok(resolve_path(base, value))
        };

        let directories = Directories {
            data: resolve("data_directory", raw.data_directory)?,
            keys: resolve("key_directory", raw.key_directory)?,
            amplitudes: resolve("amplitude_directory", raw.amplitude_directory)?,
            integrals: resolve("integral_directory", raw.integral_directory)?,
        };
        let file_manager_path = resolve("file_manager_path", raw.file_manager_path)?;
        let limit_raw = raw.limit_files_per_dir.ok_or_else(|| {
            FileManagerError::Configuration("missing required field 'limit_files_per_dir'".into())
        })?;

        let defaults = MassScale::default();
        Ok(Self {
            directories,
            file_manager_path,
            limit_files_per_dir: FilesPerDirLimit::from_config(limit_raw)?,
            additional_binning_file: raw.additional_binning_file.map(|p| resolve_path(base, p)),
            mass_scale: MassScale {
                fine: raw.fine_mass_unit.unwrap_or(defaults.fine),
                additional: raw.additional_mass_unit.unwrap_or(defaults.additional),
            },
        })
    }

    /// Check that every configured directory exists.
    pub fn validate(&self) -> Result<()> {
        let dirs = [
            ("data", &self.directories.data),
            ("key", &self.directories.keys),
            ("amplitude", &self.directories.amplitudes),
            ("integral", &self.directories.integrals),
        ];
        for (label, dir) in dirs {
            if !dir.is_dir() {
                return Err(FileManagerError::Configuration(format!(
                    "{label} directory '{}' does not exist",
                    dir.display()
                )));
            }
        }
        if let Some(file) = &self.additional_binning_file {
            if !file.is_file() {
                return Err(FileManagerError::Configuration(format!(
                    "additional binning file '{}' does not exist",
                    file.display()
                )));
            }
        }
        Ok(())
    }
}

fn absolute_base(base: &Path) -> Result<PathBuf> {
    let base = if base.as_os_str().is_empty() {
        Path::new(".")
    } else {
        base
    };
    std::path::absolute(base).map_err(|err| {
        FileManagerError::Configuration(format!(
            "cannot resolve config directory '{}': {err}",
            base.display()
        ))
    })
}

fn resolve_path(base: &Path, value: PathBuf) -> PathBuf {
    if value.is_relative() {
        base.join(value)
    } else {
        value
    }
}
