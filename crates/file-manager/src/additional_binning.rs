use crate::binning::{Bin, BinId, BinRange};
use crate::config::MassScale;
use crate::{FileManagerError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Variable the fine bins are matched against.
pub const MASS_VARIABLE: &str = "mass";

pub type AddBinId = usize;

/// A coarse bin from the additional binning file, one per non-blank line.
pub type AdditionalBin = Bin;

/// Coarse binning with its mapping onto the fine bins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AdditionalBinning {
    pub bins: Vec<AdditionalBin>,
    /// Fine bins overlapping each coarse bin, indexed by [`AddBinId`].
    pub bin_id_map: Vec<BTreeSet<BinId>>,
    pub mass_scale: MassScale,
}

impl AdditionalBinning {
    pub fn load(path: &Path, fine_bins: &[Bin], mass_scale: MassScale) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|err| {
            FileManagerError::Configuration(format!(
                "cannot read additional binning file '{}': {err}",
                path.display()
            ))
        })?;
        let bins = parse_additional_binning(&text)?;
        let bin_id_map = build_bin_id_map(fine_bins, &bins, mass_scale)?;
        log::info!(
            "additional binning '{}': {} bins",
            path.display(),
            bins.len()
        );
        Ok(Self {
            bins,
            bin_id_map,
            mass_scale,
        })
    }

    pub fn bin_ids(&self, add_bin_id: AddBinId) -> Result<&BTreeSet<BinId>> {
        self.bin_id_map.get(add_bin_id).ok_or_else(|| {
            FileManagerError::Lookup(format!("additional bin ID not found: {add_bin_id}"))
        })
    }

    /// Coarse bins that overlap `bin_id`, derived from the forward map.
    #[must_use]
    pub fn additional_bin_ids(&self, bin_id: BinId) -> Vec<AddBinId> {
        self.bin_id_map
            .iter()
            .enumerate()
            .filter(|(_, fine)| fine.contains(&bin_id))
            .map(|(add_id, _)| add_id)
            .collect()
    }

    pub fn descriptor(&self, add_bin_id: AddBinId) -> Result<String> {
        let bin = self.bins.get(add_bin_id).ok_or_else(|| {
            FileManagerError::Lookup(format!("additional bin ID not found: {add_bin_id}"))
        })?;
        Ok(bin_descriptor(bin))
    }
}

/// Parse lines of `variable;lower;upper` tokens. Blank lines are skipped.
pub fn parse_additional_binning(text: &str) -> Result<Vec<AdditionalBin>> {
    let mut bins = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let mut bin = AdditionalBin::new();
        for token in line.split_whitespace() {
            let (variable, range) = parse_token(token).map_err(|reason| {
                FileManagerError::Configuration(format!(
                    "additional binning line {}: token '{token}': {reason}",
                    line_no + 1
                ))
            })?;
            bin.insert(variable, range);
        }
        bins.push(bin);
    }
    Ok(bins)
}

fn parse_token(token: &str) -> std::result::Result<(String, BinRange), String> {
    let parts: Vec<&str> = token.split(';').collect();
    let [variable, lower, upper] = parts.as_slice() else {
        return Err("expected 'variable;lower;upper'".to_string());
    };
    if variable.is_empty() {
        return Err("empty variable name".to_string());
    }
    let lower: f64 = lower.parse().map_err(|e| format!("lower bound: {e}"))?;
    let upper: f64 = upper.parse().map_err(|e| format!("upper bound: {e}"))?;
    let range = BinRange::new(lower, upper).map_err(|e| e.to_string())?;
    Ok(((*variable).to_string(), range))
}

/// For every coarse bin, the fine bins whose mass range overlaps it.
///
/// Fine-bin bounds are converted with `mass_scale` before comparing.
pub fn build_bin_id_map(
    fine_bins: &[Bin],
    additional: &[AdditionalBin],
    mass_scale: MassScale,
) -> Result<Vec<BTreeSet<BinId>>> {
    let mut map = Vec::with_capacity(additional.len());
    for (add_id, add_bin) in additional.iter().enumerate() {
        let add_mass = add_bin.get(MASS_VARIABLE).ok_or_else(|| {
            FileManagerError::Configuration(format!(
                "additional bin {add_id} has no '{MASS_VARIABLE}' range"
            ))
        })?;
        let mut fine_ids = BTreeSet::new();
        for (bin_id, bin) in fine_bins.iter().enumerate() {
            let fine_mass = bin.get(MASS_VARIABLE).ok_or_else(|| {
                FileManagerError::Configuration(format!(
                    "bin {bin_id} has no '{MASS_VARIABLE}' range; additional binning needs it"
                ))
            })?;
            let fine_min = mass_scale.to_additional(fine_mass.lower());
            let fine_max = mass_scale.to_additional(fine_mass.upper());
            if !(fine_min >= add_mass.upper()) && !(fine_max <= add_mass.lower()) {
                fine_ids.insert(bin_id);
            }
        }
        map.push(fine_ids);
    }
    Ok(map)
}

/// `variable:lower-upper` for each variable in name order, joined by `_`.
#[must_use]
pub fn bin_descriptor(bin: &AdditionalBin) -> String {
    bin.iter()
        .map(|(variable, range)| format!("{variable}:{:?}-{:?}", range.lower(), range.upper()))
        .collect::<Vec<_>>()
        .join("_")
}
