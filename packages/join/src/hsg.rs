//! Hydrologic soil group derivation.
//!
//! SSURGO assigns some soils a dual code like `"A/D"`: group A when the
//! soil is drained, group D undrained. The run-wide drainage policy
//! collapses every dual code to a single letter before the join.

use cn_generator_models::{HsgPolicy, SoilPolygon};

/// Collapses a possibly-dual hydrologic soil group code to one letter.
///
/// Single codes pass through under either policy; empty codes collapse to
/// `None` (the composite key falls back to the open-water check).
#[must_use]
pub fn collapse_hsg(dual: &str, policy: HsgPolicy) -> Option<String> {
    let code = dual.trim();
    if code.is_empty() {
        return None;
    }

    match code.split_once('/') {
        None => Some(code.to_string()),
        Some((drained, undrained)) => {
            let selected = match policy {
                HsgPolicy::Drained => drained,
                HsgPolicy::Undrained => undrained,
            };
            let selected = selected.trim();
            if selected.is_empty() {
                None
            } else {
                Some(selected.to_string())
            }
        }
    }
}

/// Applies the drainage policy to a whole soil layer, filling
/// `hsg_single` on each polygon.
#[must_use]
pub fn apply_policy(soils: Vec<SoilPolygon>, policy: HsgPolicy) -> Vec<SoilPolygon> {
    soils
        .into_iter()
        .map(|mut soil| {
            soil.hsg_single = collapse_hsg(&soil.hydgrp_dual, policy);
            soil
        })
        .collect()
}
