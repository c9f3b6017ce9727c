//! Per-run pipeline configuration.
//!
//! An explicit structure with enumerated fields and defaulting rules, in
//! place of a loosely-typed parameter dictionary. Validation that depends
//! on the AOI (acreage bounds) happens at run time in the orchestrator;
//! everything here is plain data.

use std::path::PathBuf;

use cn_generator_models::{HsgPolicy, OutputSelection};
use serde::{Deserialize, Serialize};

/// Default lower acreage bound for an AOI.
pub const DEFAULT_MIN_ACRES: f64 = 1.0;

/// Default upper acreage bound for an AOI. The soil service rejects
/// anything much larger anyway; this bound fails fast before any fetch.
pub const DEFAULT_MAX_ACRES: f64 = 500_000.0;

/// NLCD grid cell size in meters.
pub const DEFAULT_CELL_SIZE: f64 = 30.0;

/// Configuration for a single pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Which of the four outputs to produce.
    pub outputs: OutputSelection,
    /// How dual hydrologic soil group codes collapse.
    pub policy: HsgPolicy,
    /// User-supplied lookup table; `None` substitutes the bundled default.
    pub lookup_path: Option<PathBuf>,
    /// Inclusive lower bound on AOI area, in acres.
    pub min_acres: f64,
    /// Inclusive upper bound on AOI area, in acres.
    pub max_acres: f64,
    /// Coverage grid cell size in map units (meters in EPSG:5070).
    pub cell_size: f64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            outputs: OutputSelection::default(),
            policy: HsgPolicy::default(),
            lookup_path: None,
            min_acres: DEFAULT_MIN_ACRES,
            max_acres: DEFAULT_MAX_ACRES,
            cell_size: DEFAULT_CELL_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = RunConfig::default();
        assert!(config.min_acres < config.max_acres);
        assert!((config.cell_size - 30.0).abs() < f64::EPSILON);
        assert_eq!(config.policy, HsgPolicy::Undrained);
        assert!(config.lookup_path.is_none());
        assert!(!config.outputs.any());
    }
}
