//! Admission control on AOI size.
//!
//! Remote services charge cost proportional to request area, so the
//! acreage check is the only gate between a user's click and a fleet of
//! coverage requests. It must run before any network call.

use crate::PipelineError;

/// Validates that the AOI area lies within the inclusive configured range.
///
/// # Errors
///
/// Returns [`PipelineError::AreaOutOfBounds`] when outside the range.
pub fn check_area_limits(
    area_acres: f64,
    min_acres: f64,
    max_acres: f64,
) -> Result<(), PipelineError> {
    if area_acres < min_acres || area_acres > max_acres {
        return Err(PipelineError::AreaOutOfBounds {
            acres: area_acres,
            min: min_acres,
            max: max_acres,
        });
    }
    Ok(())
}
