#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Coordinate reference system registry and layer reprojection.
//!
//! The pipeline works in exactly three reference frames: the AOI's native
//! CRS, NAD83 / Conus Albers (EPSG:5070) for equal-area extent and acreage
//! math, and WGS84 geographic (EPSG:4326) for the soil service. Transforms
//! run through `proj4rs` (pure Rust); geographic CRSs convert through
//! radians on both sides.

use cn_generator_models::{BoundingBox, Epsg};
use geo::{Coord, MapCoords, MultiPolygon};
use proj4rs::proj::Proj;

/// Errors that can occur while building or applying a transform.
#[derive(Debug, thiserror::Error)]
pub enum ProjectionError {
    /// The EPSG code is not in the supported registry.
    #[error("{0} is not a supported coordinate reference system")]
    UnsupportedCrs(Epsg),

    /// `proj4rs` rejected the projection definition or the coordinates.
    #[error("Projection error: {0}")]
    Proj(#[from] proj4rs::errors::Error),
}

/// Proj definition string for a supported EPSG code, or `None`.
///
/// The registry is intentionally tiny: the pipeline's working frames plus
/// Web Mercator for AOIs exported from web tools.
#[must_use]
pub fn proj_string(crs: Epsg) -> Option<&'static str> {
    match crs {
        Epsg(4326) => Some("+proj=longlat +datum=WGS84 +no_defs"),
        Epsg(3857) => Some(
            "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 \
             +k=1 +units=m +nadgrids=@null +no_defs",
        ),
        Epsg(5070) => Some(
            "+proj=aea +lat_0=23 +lon_0=-96 +lat_1=29.5 +lat_2=45.5 +x_0=0 +y_0=0 \
             +datum=NAD83 +units=m +no_defs",
        ),
        Epsg(_) => None,
    }
}

/// Whether a supported CRS is geographic (degree units).
#[must_use]
pub const fn is_geographic(crs: Epsg) -> bool {
    matches!(crs, Epsg(4326))
}

/// A reusable transform between two registered coordinate systems.
pub struct CoordTransformer {
    source: Proj,
    target: Proj,
    source_geographic: bool,
    target_geographic: bool,
}

impl std::fmt::Debug for CoordTransformer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordTransformer")
            .field("source_geographic", &self.source_geographic)
            .field("target_geographic", &self.target_geographic)
            .finish_non_exhaustive()
    }
}

impl CoordTransformer {
    /// Builds a transformer from `from` to `to`.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::UnsupportedCrs`] when either code is
    /// outside the registry, or [`ProjectionError::Proj`] when the
    /// definition fails to parse.
    pub fn new(from: Epsg, to: Epsg) -> Result<Self, ProjectionError> {
        let source_str = proj_string(from).ok_or(ProjectionError::UnsupportedCrs(from))?;
        let target_str = proj_string(to).ok_or(ProjectionError::UnsupportedCrs(to))?;

        Ok(Self {
            source: Proj::from_proj_string(source_str)?,
            target: Proj::from_proj_string(target_str)?,
            source_geographic: is_geographic(from),
            target_geographic: is_geographic(to),
        })
    }

    /// Transforms a single coordinate pair.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::Proj`] when the point cannot be
    /// transformed (e.g. outside the projection's valid domain).
    pub fn transform(&self, x: f64, y: f64) -> Result<(f64, f64), ProjectionError> {
        let mut point = if self.source_geographic {
            (x.to_radians(), y.to_radians(), 0.0)
        } else {
            (x, y, 0.0)
        };

        proj4rs::transform::transform(&self.source, &self.target, &mut point)?;

        if self.target_geographic {
            Ok((point.0.to_degrees(), point.1.to_degrees()))
        } else {
            Ok((point.0, point.1))
        }
    }
}

/// Reprojects a multipolygon, vertex by vertex.
///
/// # Errors
///
/// Returns [`ProjectionError`] if the transformer cannot be built or any
/// vertex fails to transform.
pub fn reproject_multi_polygon(
    geometry: &MultiPolygon<f64>,
    from: Epsg,
    to: Epsg,
) -> Result<MultiPolygon<f64>, ProjectionError> {
    if from == to {
        return Ok(geometry.clone());
    }
    let transformer = CoordTransformer::new(from, to)?;
    geometry.try_map_coords(|coord| {
        let (x, y) = transformer.transform(coord.x, coord.y)?;
        Ok::<Coord<f64>, ProjectionError>(Coord { x, y })
    })
}

/// Reprojects a bounding box by transforming its four corners and taking
/// the envelope of the results.
///
/// # Errors
///
/// Returns [`ProjectionError`] if the transformer cannot be built or a
/// corner fails to transform.
pub fn reproject_bbox(
    bbox: &BoundingBox,
    from: Epsg,
    to: Epsg,
) -> Result<BoundingBox, ProjectionError> {
    if from == to {
        return Ok(*bbox);
    }
    let transformer = CoordTransformer::new(from, to)?;
    let corners = [
        (bbox.min_x, bbox.min_y),
        (bbox.min_x, bbox.max_y),
        (bbox.max_x, bbox.min_y),
        (bbox.max_x, bbox.max_y),
    ];

    let mut out = BoundingBox::new(
        f64::INFINITY,
        f64::INFINITY,
        f64::NEG_INFINITY,
        f64::NEG_INFINITY,
    );
    for (x, y) in corners {
        let (tx, ty) = transformer.transform(x, y)?;
        out.min_x = out.min_x.min(tx);
        out.min_y = out.min_y.min(ty);
        out.max_x = out.max_x.max(tx);
        out.max_y = out.max_y.max(ty);
    }
    Ok(out)
}
