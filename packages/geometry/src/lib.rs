#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Polygon repair, axis correction, clipping, and extent math.
//!
//! Soil-service polygons are frequently malformed at tile seams
//! (self-intersections, unclosed or degenerate rings), so every vector
//! layer passes through [`repair`] before any boolean operation. The WFS
//! fallback endpoint transposes X and Y; [`swap_xy`] undoes that.

use cn_generator_models::{BoundingBox, GridShape};
use geo::orient::{Direction, Orient};
use geo::{
    Area, BooleanOps, BoundingRect, Coord, LineString, MapCoords, MultiPolygon, Polygon,
    Validation, unary_union,
};

/// Square meters per acre.
const SQ_M_PER_ACRE: f64 = 4_046.856_422_4;

/// Errors produced by extent computation.
#[derive(Debug, thiserror::Error)]
pub enum GeometryError {
    /// A layer had no coordinates to derive an extent from.
    #[error("Cannot compute an extent for an empty geometry ({context})")]
    EmptyGeometry {
        /// Which layer was empty.
        context: String,
    },
}

/// Swaps the X and Y of every coordinate.
///
/// The soil WFS endpoint is misconfigured to return latitude in X and
/// longitude in Y; fallback-sourced geometry must pass through here
/// exactly once. Swapping twice is the identity.
#[must_use]
pub fn swap_xy(geometry: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    geometry.map_coords(|Coord { x, y }| Coord { x: y, y: x })
}

/// Repairs invalid polygon geometry.
///
/// Drops degenerate rings (fewer than three distinct vertices), removes
/// consecutive duplicate coordinates, closes open rings, fixes ring
/// orientation, and dissolves self-intersections with a self-union.
/// An empty result simply yields an empty multipolygon; emptiness is the
/// caller's concern.
#[must_use]
pub fn repair(geometry: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    let mut cleaned: Vec<Polygon<f64>> = Vec::new();

    for polygon in geometry {
        let Some(exterior) = clean_ring(polygon.exterior()) else {
            continue;
        };
        let interiors: Vec<LineString<f64>> = polygon
            .interiors()
            .iter()
            .filter_map(clean_ring)
            .collect();
        cleaned.push(Polygon::new(exterior, interiors));
    }

    if cleaned.is_empty() {
        return MultiPolygon(Vec::new());
    }

    let oriented = MultiPolygon(cleaned).orient(Direction::Default);
    if oriented.is_valid() {
        oriented
    } else {
        // Self-union resolves self-intersections and overlapping rings.
        log::debug!("geometry still invalid after ring cleaning; dissolving");
        unary_union(oriented.iter())
    }
}

/// Removes consecutive duplicate coordinates and closes the ring.
/// Returns `None` for rings with fewer than three distinct vertices.
fn clean_ring(ring: &LineString<f64>) -> Option<LineString<f64>> {
    let mut coords: Vec<Coord<f64>> = Vec::with_capacity(ring.0.len());
    for &coord in &ring.0 {
        if coords.last() != Some(&coord) {
            coords.push(coord);
        }
    }
    // An explicitly closed input leaves first == last; strip it so the
    // distinct-vertex count below is honest, then re-close.
    if coords.len() > 1 && coords.first() == coords.last() {
        coords.pop();
    }
    if coords.len() < 3 {
        return None;
    }
    coords.push(coords[0]);
    Some(LineString::from(coords))
}

/// Clips `subject` to the AOI boundary.
///
/// Removes slivers that fall outside the exact AOI after geographic
/// operations. Both inputs are expected to be repaired already.
#[must_use]
pub fn clip(subject: &MultiPolygon<f64>, boundary: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    subject.intersection(boundary)
}

/// The axis-aligned extent of a layer.
///
/// # Errors
///
/// Returns [`GeometryError::EmptyGeometry`] when the layer has no
/// coordinates.
pub fn extent(
    geometry: &MultiPolygon<f64>,
    context: &str,
) -> Result<BoundingBox, GeometryError> {
    let rect = geometry
        .bounding_rect()
        .ok_or_else(|| GeometryError::EmptyGeometry {
            context: context.to_string(),
        })?;
    Ok(BoundingBox::new(
        rect.min().x,
        rect.min().y,
        rect.max().x,
        rect.max().y,
    ))
}

/// Planar area of a layer in acres.
///
/// Only meaningful when the layer is in an equal-area projection
/// (EPSG:5070 in this pipeline).
#[must_use]
pub fn area_acres(geometry: &MultiPolygon<f64>) -> f64 {
    geometry.unsigned_area() / SQ_M_PER_ACRE
}

/// Derives the coverage request box and grid dimensions for an extent.
///
/// The box is expanded by one grid cell on each side so the returned
/// raster never clips the AOI edge when cell alignment differs between
/// the service grid and the request, then the cell counts are rounded up
/// to cover the expanded box completely.
#[must_use]
pub fn coverage_grid(extent: &BoundingBox, cell_size: f64) -> (BoundingBox, GridShape) {
    let buffered = extent.expanded(cell_size);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let shape = GridShape {
        width: (buffered.width() / cell_size).ceil() as u32,
        height: (buffered.height() / cell_size).ceil() as u32,
    };
    (buffered, shape)
}

#[cfg(test)]
mod tests {
    use geo::polygon;

    use super::*;

    fn square(min: f64, max: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![polygon![
            (x: min, y: min),
            (x: max, y: min),
            (x: max, y: max),
            (x: min, y: max),
            (x: min, y: min),
        ]])
    }

    #[test]
    fn swap_xy_twice_is_identity() {
        let mp = square(2.0, 7.0);
        let swapped = swap_xy(&mp);
        assert_ne!(swapped, mp);
        assert_eq!(swap_xy(&swapped), mp);
    }

    #[test]
    fn swap_xy_transposes_coordinates() {
        let mp = MultiPolygon(vec![polygon![
            (x: 1.0, y: 10.0),
            (x: 2.0, y: 10.0),
            (x: 2.0, y: 20.0),
            (x: 1.0, y: 10.0),
        ]]);
        let swapped = swap_xy(&mp);
        let first = swapped.0[0].exterior().0[0];
        assert!((first.x - 10.0).abs() < f64::EPSILON);
        assert!((first.y - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn repair_closes_open_rings() {
        let open = MultiPolygon(vec![Polygon::new(
            LineString::from(vec![(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0)]),
            vec![],
        )]);
        let fixed = repair(&open);
        let ring = fixed.0[0].exterior();
        assert_eq!(ring.0.first(), ring.0.last());
    }

    #[test]
    fn repair_drops_degenerate_rings() {
        let degenerate = MultiPolygon(vec![Polygon::new(
            LineString::from(vec![(0.0, 0.0), (1.0, 1.0), (0.0, 0.0)]),
            vec![],
        )]);
        assert!(repair(&degenerate).0.is_empty());
    }

    #[test]
    fn repair_removes_duplicate_vertices() {
        let dupes = MultiPolygon(vec![Polygon::new(
            LineString::from(vec![
                (0.0, 0.0),
                (0.0, 0.0),
                (4.0, 0.0),
                (4.0, 4.0),
                (4.0, 4.0),
                (0.0, 4.0),
                (0.0, 0.0),
            ]),
            vec![],
        )]);
        let fixed = repair(&dupes);
        assert_eq!(fixed.0[0].exterior().0.len(), 5);
    }

    #[test]
    fn repair_resolves_bowtie_self_intersection() {
        // Classic figure-eight: two triangles crossing at (2, 2).
        let bowtie = MultiPolygon(vec![Polygon::new(
            LineString::from(vec![
                (0.0, 0.0),
                (4.0, 4.0),
                (4.0, 0.0),
                (0.0, 4.0),
                (0.0, 0.0),
            ]),
            vec![],
        )]);
        let fixed = repair(&bowtie);
        assert!(fixed.is_valid());
        assert!(fixed.unsigned_area() > 0.0);
    }

    #[test]
    fn clip_truncates_to_boundary() {
        let subject = square(0.0, 10.0);
        let boundary = square(5.0, 15.0);
        let clipped = clip(&subject, &boundary);
        assert!((clipped.unsigned_area() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn extent_of_empty_layer_errors() {
        let empty = MultiPolygon::<f64>(Vec::new());
        assert!(extent(&empty, "soil").is_err());
    }

    #[test]
    fn acreage_of_known_square() {
        // ~636 m sides -> 404 685.64 m² -> exactly 100 acres.
        let side = (100.0 * SQ_M_PER_ACRE).sqrt();
        let mp = square(0.0, side);
        assert!((area_acres(&mp) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn coverage_grid_buffers_one_cell_each_side() {
        let ext = BoundingBox::new(0.0, 0.0, 90.0, 60.0);
        let (bbox, shape) = coverage_grid(&ext, 30.0);
        assert!((bbox.min_x - -30.0).abs() < f64::EPSILON);
        assert!((bbox.max_y - 90.0).abs() < f64::EPSILON);
        assert_eq!(shape, GridShape {
            width: 5,
            height: 4
        });
    }

    #[test]
    fn coverage_grid_rounds_partial_cells_up() {
        let ext = BoundingBox::new(0.0, 0.0, 45.0, 15.0);
        let (_, shape) = coverage_grid(&ext, 30.0);
        // 105 / 30 = 3.5 -> 4; 75 / 30 = 2.5 -> 3.
        assert_eq!(shape, GridShape {
            width: 4,
            height: 3
        });
    }
}
