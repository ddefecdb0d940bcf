use crate::{FileManagerError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role of a data file in the analysis.
///
/// The discriminant is the internal code used in generated file names. The
/// metadata attached to data files uses its own integer scheme, translated by
/// [`EventsType::from_external`] and [`EventsType::to_external`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum EventsType {
    Other = 0,
    Real = 1,
    Generated = 2,
    Accepted = 3,
}

/// Event classes that carry normalization integrals.
pub const INTEGRAL_EVENTS_TYPES: [EventsType; 2] = [EventsType::Generated, EventsType::Accepted];

mod external {
    pub const OTHER: i64 = 0;
    pub const REAL: i64 = 1;
    pub const GENERATED: i64 = 2;
    pub const ACCEPTED: i64 = 3;
}

impl EventsType {
    pub const ALL: [EventsType; 4] = [
        EventsType::Other,
        EventsType::Real,
        EventsType::Generated,
        EventsType::Accepted,
    ];

    /// Internal code, as it appears in amplitude and integral file names.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            EventsType::Other => "other",
            EventsType::Real => "real",
            EventsType::Generated => "generated",
            EventsType::Accepted => "accepted",
        }
    }

    /// Translate the events type stored in data-file metadata.
    pub fn from_external(value: i64) -> Result<Self> {
        match value {
            external::OTHER => Ok(EventsType::Other),
            external::REAL => Ok(EventsType::Real),
            external::GENERATED => Ok(EventsType::Generated),
            external::ACCEPTED => Ok(EventsType::Accepted),
            other => Err(FileManagerError::Scan(format!(
                "unknown events type {other} in data file metadata"
            ))),
        }
    }

    #[must_use]
    pub const fn to_external(self) -> i64 {
        match self {
            EventsType::Other => external::OTHER,
            EventsType::Real => external::REAL,
            EventsType::Generated => external::GENERATED,
            EventsType::Accepted => external::ACCEPTED,
        }
    }
}

impl fmt::Display for EventsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventsType {
    type Err = FileManagerError;

    fn from_str(raw: &str) -> Result<Self> {
        let lowered = raw.trim().to_ascii_lowercase();
        if let Some(found) = Self::ALL.iter().find(|et| et.as_str() == lowered) {
            return Ok(*found);
        }
        match lowered.parse::<u8>() {
            Ok(code) => Self::ALL
                .iter()
                .find(|et| et.code() == code)
                .copied()
                .ok_or_else(|| FileManagerError::Lookup(format!("unknown events type '{raw}'"))),
            Err(_) => Err(FileManagerError::Lookup(format!(
                "unknown events type '{raw}'"
            ))),
        }
    }
}
