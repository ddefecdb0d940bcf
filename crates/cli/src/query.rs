use anyhow::{Context as AnyhowContext, Result};
use clap::Subcommand;
use pwa_file_manager::{AddBinId, BinId, EventsType, FileManager};
use serde_json::{json, Value};
use std::collections::BTreeMap;

#[derive(Subcommand)]
pub enum QueryCommand {
    /// All bins with their IDs
    Bins,

    /// Ranges of one bin
    Bin { bin_id: BinId },

    /// Bins containing a point, given as `variable=value` pairs
    #[command(name = "find-bin")]
    FindBin {
        #[arg(required = true)]
        point: Vec<String>,
    },

    /// Data file holding a bin for one events type
    #[command(name = "data-file")]
    DataFile {
        bin_id: BinId,
        events_type: EventsType,
    },

    /// Amplitude file of one bin, wave and events type
    #[command(name = "amplitude-path")]
    AmplitudePath {
        bin_id: BinId,
        wave_name: String,
        events_type: EventsType,
    },

    /// Amplitude files of one bin and events type, keyed by wave
    #[command(name = "amplitude-paths")]
    AmplitudePaths {
        bin_id: BinId,
        events_type: EventsType,
    },

    /// Integral file of one bin
    #[command(name = "integral-path")]
    IntegralPath {
        bin_id: BinId,
        events_type: EventsType,

        /// Additional bin ID; required when additional binning is configured
        #[arg(long)]
        additional_bin: Option<AddBinId>,
    },

    /// Integral file combining all fine bins of one additional bin
    #[command(name = "additional-integral-path")]
    AdditionalIntegralPath {
        additional_bin: AddBinId,
        events_type: EventsType,
    },

    /// Key file and amplitude index defining a wave
    #[command(name = "key-file")]
    KeyFile { wave_name: String },

    /// Registered wave names
    Waves,

    /// Bins lacking a data file for at least one events type
    #[command(name = "missing-bins")]
    MissingBins,

    /// Bins covered by the additional binning
    #[command(name = "active-bins")]
    ActiveBins,

    #[command(name = "additional-bins-for-bin")]
    AdditionalBinsForBin { bin_id: BinId },

    #[command(name = "bins-for-additional-bin")]
    BinsForAdditionalBin { additional_bin: AddBinId },
}

pub fn execute(manager: &FileManager, what: &QueryCommand) -> Result<Value> {
    let value = match what {
        QueryCommand::Bins => {
            let bins: Vec<Value> = manager
                .bins()
                .iter()
                .enumerate()
                .map(|(bin_id, bin)| json!({ "bin_id": bin_id, "bin": bin }))
                .collect();
            Value::Array(bins)
        }
        QueryCommand::Bin { bin_id } => serde_json::to_value(manager.bin(*bin_id)?)?,
        QueryCommand::FindBin { point } => {
            let point = parse_point(point)?;
            serde_json::to_value(manager.bin_ids_containing(&point)?)?
        }
        QueryCommand::DataFile {
            bin_id,
            events_type,
        } => serde_json::to_value(manager.data_file(*bin_id, *events_type)?)?,
        QueryCommand::AmplitudePath {
            bin_id,
            wave_name,
            events_type,
        } => serde_json::to_value(manager.amplitude_file_path(*bin_id, wave_name, *events_type)?)?,
        QueryCommand::AmplitudePaths {
            bin_id,
            events_type,
        } => serde_json::to_value(manager.amplitude_file_paths(*bin_id, *events_type)?)?,
        QueryCommand::IntegralPath {
            bin_id,
            events_type,
            additional_bin,
        } => serde_json::to_value(manager.integral_file_path(*bin_id, *events_type, *additional_bin)?)?,
        QueryCommand::AdditionalIntegralPath {
            additional_bin,
            events_type,
        } => serde_json::to_value(manager.additional_integral_file_path(*additional_bin, *events_type)?)?,
        QueryCommand::KeyFile { wave_name } => serde_json::to_value(manager.key_file(wave_name)?)?,
        QueryCommand::Waves => serde_json::to_value(manager.wave_names().collect::<Vec<_>>())?,
        QueryCommand::MissingBins => serde_json::to_value(manager.missing_bins())?,
        QueryCommand::ActiveBins => serde_json::to_value(manager.active_bins()?)?,
        QueryCommand::AdditionalBinsForBin { bin_id } => {
            serde_json::to_value(manager.additional_bin_ids_for_bin(*bin_id)?)?
        }
        QueryCommand::BinsForAdditionalBin { additional_bin } => {
            serde_json::to_value(manager.bin_ids_for_additional_bin(*additional_bin)?)?
        }
    };
    Ok(value)
}

fn parse_point(pairs: &[String]) -> Result<BTreeMap<String, f64>> {
    let mut point = BTreeMap::new();
    for pair in pairs {
        let (variable, value) = pair
            .split_once('=')
            .with_context(|| format!("expected 'variable=value', got '{pair}'"))?;
        let value: f64 = value
            .trim()
            .parse()
            .with_context(|| format!("invalid value for '{variable}' in '{pair}'"))?;
        point.insert(variable.trim().to_string(), value);
    }
    Ok(point)
}
