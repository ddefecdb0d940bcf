use crate::catalog::DataFileRecord;
use crate::report::BuildWarning;
use crate::{EventsType, FileManagerError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

pub type BinId = usize;

/// One cell of the grid: a single range per binning variable.
pub type Bin = BTreeMap<String, BinRange>;

/// Axes of one events type, keyed by binning variable.
pub type AxisSet = BTreeMap<String, Vec<BinRange>>;

/// Range of one binning variable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BinRange {
    lower: f64,
    upper: f64,
}

impl BinRange {
    pub fn new(lower: f64, upper: f64) -> Result<Self> {
        if !lower.is_finite() || !upper.is_finite() {
            return Err(FileManagerError::BinningConsistency(format!(
                "bin bounds must be finite, got ({lower}, {upper})"
            )));
        }
        if lower >= upper {
            return Err(FileManagerError::BinningConsistency(format!(
                "bin lower bound {lower} must be below upper bound {upper}"
            )));
        }
        Ok(Self { lower, upper })
    }

    #[must_use]
    pub const fn lower(&self) -> f64 {
        self.lower
    }

    #[must_use]
    pub const fn upper(&self) -> f64 {
        self.upper
    }

    /// Point membership with both bounds inclusive.
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }

    fn sort_key(a: &BinRange, b: &BinRange) -> Ordering {
        a.lower
            .total_cmp(&b.lower)
            .then_with(|| a.upper.total_cmp(&b.upper))
    }
}

impl fmt::Display for BinRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:?}, {:?})", self.lower, self.upper)
    }
}

/// Sorted, non-overlapping ranges of one binning variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Axis {
    pub variable: String,
    pub bins: Vec<BinRange>,
}

/// Combined axes of all events types, ordered by variable name.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct GlobalGrid {
    axes: Vec<Axis>,
}

impl GlobalGrid {
    #[must_use]
    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    #[must_use]
    pub fn variables(&self) -> Vec<&str> {
        self.axes.iter().map(|axis| axis.variable.as_str()).collect()
    }

    #[must_use]
    pub fn axis(&self, variable: &str) -> Option<&Axis> {
        self.axes.iter().find(|axis| axis.variable == variable)
    }

    /// Product of the axis cardinalities.
    #[must_use]
    pub fn bin_count(&self) -> usize {
        self.axes.iter().map(|axis| axis.bins.len()).product()
    }

    /// All bins in canonical order: the first variable varies slowest.
    ///
    /// The position of a bin in the returned list is its [`BinId`].
    #[must_use]
    pub fn enumerate_bins(&self) -> Vec<Bin> {
        let dims: Vec<usize> = self.axes.iter().map(|axis| axis.bins.len()).collect();
        let total = self.bin_count();
        let mut bins = Vec::with_capacity(total);
        if total == 0 {
            return bins;
        }

        let mut indices = vec![0usize; dims.len()];
        loop {
            let bin: Bin = self
                .axes
                .iter()
                .zip(&indices)
                .map(|(axis, &idx)| (axis.variable.clone(), axis.bins[idx]))
                .collect();
            bins.push(bin);

            let mut carry = true;
            for i in (0..dims.len()).rev() {
                if carry {
                    indices[i] += 1;
                    if indices[i] >= dims[i] {
                        indices[i] = 0;
                    } else {
                        carry = false;
                    }
                }
            }
            if carry {
                break;
            }
        }
        bins
    }
}

/// Axes spanned by the data files of one events type.
///
/// Every record must carry the variable set of the first one. Gaps between
/// neighbouring ranges are reported as warnings, overlaps are errors.
pub fn derive_axes(records: &[DataFileRecord]) -> Result<(AxisSet, Vec<BuildWarning>)> {
    let first = records.first().ok_or_else(|| {
        FileManagerError::BinningConsistency("got no input files to derive bin axes from".into())
    })?;
    let variables: BTreeSet<&String> = first.binning.keys().collect();

    let mut axes: AxisSet = variables
        .iter()
        .map(|variable| ((*variable).clone(), Vec::new()))
        .collect();
    for record in records {
        let record_vars: BTreeSet<&String> = record.binning.keys().collect();
        if record_vars != variables {
            return Err(FileManagerError::BinningConsistency(format!(
                "data file '{}' seems to have different binning variables",
                record.path.display()
            )));
        }
        for (variable, range) in &record.binning {
            if let Some(axis) = axes.get_mut(variable) {
                if !axis.contains(range) {
                    axis.push(*range);
                }
            }
        }
    }

    let mut warnings = Vec::new();
    for (variable, bins) in &mut axes {
        warnings.extend(sort_and_check(variable, bins)?);
    }
    Ok((axes, warnings))
}

/// Merge the per-events-type axes into one grid.
///
/// The variable set of the first events type is authoritative; a different set
/// elsewhere is only a warning. Ranges overlapping across events types are an
/// error.
pub fn combine_axes(
    per_type: &[(EventsType, AxisSet)],
) -> Result<(GlobalGrid, Vec<BuildWarning>)> {
    let Some((_, first)) = per_type.first() else {
        return Err(FileManagerError::BinningConsistency("got no axes".into()));
    };
    let variables: Vec<String> = first.keys().cloned().collect();

    let mut warnings = Vec::new();
    for (events_type, axes) in per_type {
        let found: Vec<String> = axes.keys().cloned().collect();
        if found != variables {
            warnings.push(
                BuildWarning::VariableMismatch {
                    events_type: *events_type,
                    expected: variables.clone(),
                    found,
                }
                .emit(),
            );
        }
    }

    let mut grid = GlobalGrid::default();
    for variable in variables {
        let mut bins: Vec<BinRange> = Vec::new();
        for (_, axes) in per_type {
            let Some(axis) = axes.get(&variable) else {
                continue;
            };
            for range in axis {
                if !bins.contains(range) {
                    bins.push(*range);
                }
            }
        }
        warnings.extend(sort_and_check(&variable, &mut bins)?);
        grid.axes.push(Axis { variable, bins });
    }

    log::info!("combined bin axes: {:?}", grid.variables());
    Ok((grid, warnings))
}

fn sort_and_check(variable: &str, bins: &mut [BinRange]) -> Result<Vec<BuildWarning>> {
    if bins.is_empty() {
        return Err(FileManagerError::BinningConsistency(format!(
            "no bins found for variable '{variable}'"
        )));
    }
    bins.sort_by(BinRange::sort_key);

    let mut warnings = Vec::new();
    for pair in bins.windows(2) {
        let (before, after) = (pair[0], pair[1]);
        if before.upper > after.lower {
            return Err(FileManagerError::BinningConsistency(format!(
                "overlap in bin structure found for binned variable '{variable}' between bin {before} and bin {after}"
            )));
        }
        if before.upper < after.lower {
            warnings.push(
                BuildWarning::Gap {
                    variable: variable.to_string(),
                    before,
                    after,
                }
                .emit(),
            );
        }
    }
    Ok(warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn range(lower: f64, upper: f64) -> BinRange {
        BinRange::new(lower, upper).unwrap()
    }

    fn record(name: &str, events_type: EventsType, vars: &[(&str, f64, f64)]) -> DataFileRecord {
        DataFileRecord {
            path: PathBuf::from(name),
            binning: vars
                .iter()
                .map(|(v, lo, hi)| ((*v).to_string(), range(*lo, *hi)))
                .collect(),
            events_type,
        }
    }

    fn single_axis(lower: f64, upper: f64) -> AxisSet {
        AxisSet::from([("mass".to_string(), vec![range(lower, upper)])])
    }

    #[test]
    fn rejects_invalid_ranges() {
        assert!(BinRange::new(1.0, 1.0).is_err());
        assert!(BinRange::new(2.0, 1.0).is_err());
        assert!(BinRange::new(f64::NAN, 1.0).is_err());
    }

    #[test]
    fn derived_axes_are_sorted_and_deduplicated() {
        let records = vec![
            record("c", EventsType::Real, &[("mass", 1100.0, 1200.0), ("t", 0.1, 1.0)]),
            record("a", EventsType::Real, &[("mass", 1000.0, 1100.0), ("t", 0.1, 1.0)]),
            record("b", EventsType::Real, &[("mass", 1000.0, 1100.0), ("t", 0.1, 1.0)]),
        ];
        let (axes, warnings) = derive_axes(&records).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(
            axes["mass"],
            vec![range(1000.0, 1100.0), range(1100.0, 1200.0)]
        );
        assert_eq!(axes["t"], vec![range(0.1, 1.0)]);
    }

    #[test]
    fn derive_reports_gaps() {
        let records = vec![
            record("a", EventsType::Real, &[("mass", 0.0, 100.0)]),
            record("b", EventsType::Real, &[("mass", 150.0, 200.0)]),
        ];
        let (_, warnings) = derive_axes(&records).unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(matches!(&warnings[0], BuildWarning::Gap { variable, .. } if variable == "mass"));
    }

    #[test]
    fn derive_rejects_mismatched_variables() {
        let records = vec![
            record("a", EventsType::Real, &[("mass", 0.0, 100.0)]),
            record("b", EventsType::Real, &[("mass", 100.0, 200.0), ("t", 0.0, 1.0)]),
        ];
        let err = derive_axes(&records).unwrap_err();
        assert!(matches!(err, FileManagerError::BinningConsistency(msg) if msg.contains("'b'")));
    }

    #[test]
    fn derive_rejects_overlap_within_one_type() {
        let records = vec![
            record("a", EventsType::Real, &[("mass", 0.0, 100.0)]),
            record("b", EventsType::Real, &[("mass", 50.0, 150.0)]),
        ];
        assert!(derive_axes(&records).is_err());
    }

    #[test]
    fn combine_fails_on_overlap() {
        let per_type = vec![
            (EventsType::Real, single_axis(0.0, 100.0)),
            (EventsType::Generated, single_axis(50.0, 150.0)),
        ];
        let err = combine_axes(&per_type).unwrap_err();
        assert!(matches!(err, FileManagerError::BinningConsistency(_)));
    }

    #[test]
    fn combine_accepts_contiguous_axes_without_warning() {
        let per_type = vec![
            (EventsType::Real, single_axis(0.0, 100.0)),
            (EventsType::Generated, single_axis(100.0, 200.0)),
        ];
        let (grid, warnings) = combine_axes(&per_type).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(grid.bin_count(), 2);
    }

    #[test]
    fn combine_accepts_gap_with_warning() {
        let per_type = vec![
            (EventsType::Real, single_axis(0.0, 100.0)),
            (EventsType::Generated, single_axis(150.0, 200.0)),
        ];
        let (grid, warnings) = combine_axes(&per_type).unwrap();
        assert_eq!(grid.bin_count(), 2);
        assert_eq!(warnings.len(), 1);
        assert!(matches!(warnings[0], BuildWarning::Gap { .. }));
    }

    #[test]
    fn combine_dedupes_shared_ranges_and_warns_on_variable_mismatch() {
        let mut with_t = single_axis(0.0, 100.0);
        with_t.insert("t".to_string(), vec![range(0.0, 1.0)]);
        let per_type = vec![
            (EventsType::Real, single_axis(0.0, 100.0)),
            (EventsType::Generated, with_t),
        ];
        let (grid, warnings) = combine_axes(&per_type).unwrap();
        assert_eq!(grid.variables(), vec!["mass"]);
        assert_eq!(grid.bin_count(), 1);
        assert!(matches!(
            &warnings[0],
            BuildWarning::VariableMismatch { events_type: EventsType::Generated, .. }
        ));
    }

    #[test]
    fn enumeration_is_lexicographic_and_complete() {
        let mut axes = AxisSet::new();
        axes.insert(
            "mass".to_string(),
            vec![range(0.0, 1.0), range(1.0, 2.0), range(2.0, 3.0)],
        );
        axes.insert("tPrime".to_string(), vec![range(0.1, 0.5), range(0.5, 1.0)]);
        let (grid, _) = combine_axes(&[(EventsType::Real, axes)]).unwrap();

        let bins = grid.enumerate_bins();
        assert_eq!(bins.len(), grid.bin_count());
        assert_eq!(bins.len(), 6);
        assert_eq!(bins[0]["mass"], range(0.0, 1.0));
        assert_eq!(bins[0]["tPrime"], range(0.1, 0.5));
        assert_eq!(bins[1]["mass"], range(0.0, 1.0));
        assert_eq!(bins[1]["tPrime"], range(0.5, 1.0));
        assert_eq!(bins[5]["mass"], range(2.0, 3.0));
        assert_eq!(bins[5]["tPrime"], range(0.5, 1.0));

        let unique: BTreeSet<String> = bins.iter().map(|b| format!("{b:?}")).collect();
        assert_eq!(unique.len(), bins.len());
        assert_eq!(grid.enumerate_bins(), bins);
    }

    #[test]
    fn grid_without_variables_has_one_bin() {
        let (grid, _) = combine_axes(&[(EventsType::Real, AxisSet::new())]).unwrap();
        assert_eq!(grid.bin_count(), 1);
        assert_eq!(grid.enumerate_bins(), vec![Bin::new()]);
    }
}
