use serde::{Deserialize, Serialize};
use std::fmt;

/// Versioned key for a mitigation catalog (e.g., `crane_cell_v1`).
///
/// Reported alongside structured replies so consumers know which catalog
/// snapshot produced a record.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CatalogKey(pub String);

/// Discrete hazard category produced by a classifier.
///
/// Classifier outputs and catalog keys share this identifier space. Values
/// outside the catalog are legal at runtime; the resolver degrades them to
/// the undefined record instead of failing.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HazardCategory(pub u32);

impl fmt::Display for HazardCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for HazardCategory {
    fn from(value: u32) -> Self {
        HazardCategory(value)
    }
}
