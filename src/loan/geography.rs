//! State code -> FIPS crosswalk

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::error::Result;
use crate::persist::read_rows;

#[derive(Debug, Deserialize)]
struct StateFipsRow {
    state: String,
    fips: u32,
}

/// Exact-match lookup from two-letter state codes to FIPS codes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeographyCrosswalk {
    fips_by_state: HashMap<String, u32>,
}

impl GeographyCrosswalk {
    /// Load a `(state, fips)` CSV
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let rows: Vec<StateFipsRow> = read_rows(path)?;
        Ok(rows.into_iter().map(|r| (r.state, r.fips)).collect())
    }

    pub fn fips_of(&self, state: &str) -> Option<u32> {
        self.fips_by_state.get(state).copied()
    }

    pub fn len(&self) -> usize {
        self.fips_by_state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fips_by_state.is_empty()
    }
}

impl FromIterator<(String, u32)> for GeographyCrosswalk {
    fn from_iter<I: IntoIterator<Item = (String, u32)>>(iter: I) -> Self {
        Self {
            fips_by_state: iter.into_iter().collect(),
        }
    }
}
