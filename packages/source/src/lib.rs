#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Remote data source traits and fetchers.
//!
//! Two federal services feed the pipeline: the MRLC coverage service for
//! NLCD rasters ([`nlcd`]) and the USDA soil-survey service for SSURGO
//! polygons ([`ssurgo`], with a primary bulk-query path and a paged WFS
//! fallback). Both are exposed behind traits so the orchestrator can be
//! exercised with fakes. Fetchers never branch on failure themselves —
//! retry of transient transport errors lives in [`retry`], and the
//! primary/fallback selection is the orchestrator's call.

pub mod nlcd;
pub mod retry;
pub mod ssurgo;
pub mod warp;

use async_trait::async_trait;
use cn_generator_models::{BoundingBox, CoverageRequest, RasterTile, SoilPolygon};
use geo::MultiPolygon;

/// Errors that can occur during remote source operations.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error (temp file write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Coverage payload could not be decoded as a raster.
    #[error("Raster decode error: {0}")]
    Tiff(#[from] tiff::TiffError),

    /// Reprojection of a fetched layer failed.
    #[error("Projection error: {0}")]
    Projection(#[from] cn_generator_projection::ProjectionError),

    /// The remote service answered, but not usefully.
    #[error("Remote service error: {message}")]
    Service {
        /// Human-readable diagnostic, including probable causes.
        message: String,
    },

    /// The response arrived but its content was malformed.
    #[error("Malformed payload: {message}")]
    Payload {
        /// Description of what was wrong with the payload.
        message: String,
    },
}

/// A source of classified raster coverages.
#[async_trait]
pub trait RasterSource: Send + Sync {
    /// Fetches one coverage tile for the request's bounding box.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the service is unreachable or the
    /// payload cannot be decoded. Never retried here beyond transient
    /// transport retry — failure handling belongs to the caller.
    async fn fetch(&self, request: &CoverageRequest) -> Result<RasterTile, SourceError>;
}

/// A source of soil-survey polygons.
///
/// Two retrieval paths over the same dataset. The primary bulk query is
/// fast but rejects large AOIs; the fallback is slower but reliable. The
/// caller decides when to fall back and owns the warning.
#[async_trait]
pub trait SoilSource: Send + Sync {
    /// Bulk spatial query for the AOI polygon (geographic coordinates).
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] on any failure, including payload-too-large
    /// rejections for large AOIs. The caller is expected to fall back to
    /// [`SoilSource::fetch_fallback`].
    async fn fetch_primary(
        &self,
        aoi_wgs84: &MultiPolygon<f64>,
    ) -> Result<Vec<SoilPolygon>, SourceError>;

    /// Paged feature retrieval for the AOI extent (geographic coordinates).
    ///
    /// The endpoint transposes X/Y: returned geometry has latitude in X
    /// and longitude in Y. Callers MUST swap axes exactly once before any
    /// further use.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if any page request fails.
    async fn fetch_fallback(
        &self,
        extent_wgs84: &BoundingBox,
    ) -> Result<Vec<SoilPolygon>, SourceError>;
}
