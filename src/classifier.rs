//! Decides whether scouting should be running for a given snapshot.
//!
//! Beam modes and DAQ states are compared case-insensitively: both the
//! allow-lists and the observed values are folded to uppercase.

use crate::snapshot::FacilitySnapshot;
use std::collections::HashSet;

/// A case-insensitive set of allowed values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    values: HashSet<String>,
}

impl AllowList {
    /// Build an allow-list, normalizing every entry.
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            values: values.into_iter().map(|v| normalize(v.as_ref())).collect(),
        }
    }

    /// Whether `value` is allowed, ignoring case and surrounding whitespace.
    pub fn contains(&self, value: &str) -> bool {
        self.values.contains(&normalize(value))
    }

    /// Number of distinct entries
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if nothing is allowed
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn normalize(value: &str) -> String {
    value.trim().to_uppercase()
}

/// True iff both the beam mode and the DAQ state of `snapshot` are allowed.
pub fn is_desired_active(
    snapshot: &FacilitySnapshot,
    allowed_beam_modes: &AllowList,
    allowed_daq_states: &AllowList,
) -> bool {
    allowed_beam_modes.contains(&snapshot.beam_mode)
        && allowed_daq_states.contains(&snapshot.daq_state)
}
