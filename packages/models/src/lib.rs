#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared value types for the curve number pipeline.
//!
//! Every stage of the pipeline (remote fetch, reprojection, geometry
//! repair, polygonization, the curve number join) exchanges these types.
//! They carry no behavior beyond simple derivations; all algorithms live
//! in the downstream crates.

use std::path::PathBuf;

use geo::MultiPolygon;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// An EPSG coordinate reference system code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Epsg(pub u32);

impl Epsg {
    /// WGS84 geographic (longitude/latitude in degrees).
    pub const WGS84: Self = Self(4326);
    /// Web Mercator.
    pub const WEB_MERCATOR: Self = Self(3857);
    /// NAD83 / Conus Albers equal-area, the continental working CRS in
    /// which areas and request extents are computed.
    pub const CONUS_ALBERS: Self = Self(5070);
}

impl std::fmt::Display for Epsg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

/// An axis-aligned bounding box in an unspecified CRS.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    #[must_use]
    pub const fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Returns a copy grown by `margin` on every side.
    #[must_use]
    pub fn expanded(&self, margin: f64) -> Self {
        Self {
            min_x: self.min_x - margin,
            min_y: self.min_y - margin,
            max_x: self.max_x + margin,
            max_y: self.max_y + margin,
        }
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Comma-joined `minx,miny,maxx,maxy` as coverage services expect it.
    #[must_use]
    pub fn to_query_string(&self) -> String {
        format!(
            "{},{},{},{}",
            self.min_x, self.min_y, self.max_x, self.max_y
        )
    }
}

/// Raster grid dimensions in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridShape {
    pub width: u32,
    pub height: u32,
}

/// The user's input polygon(s) with their coordinate reference system.
///
/// Immutable once validated. Reprojected copies are derived values, never
/// in-place mutations.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaOfInterest {
    pub geometry: MultiPolygon<f64>,
    pub crs: Epsg,
}

impl AreaOfInterest {
    #[must_use]
    pub const fn new(geometry: MultiPolygon<f64>, crs: Epsg) -> Self {
        Self { geometry, crs }
    }
}

/// Which NLCD coverage a raster request targets.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum NlcdDataset {
    /// NLCD 2019 classified land cover.
    LandCover2019,
    /// NLCD 2019 fractional impervious surface.
    Impervious2019,
}

impl NlcdDataset {
    /// The coverage identifier on the MRLC `GeoServer`.
    #[must_use]
    pub const fn coverage_id(self) -> &'static str {
        match self {
            Self::LandCover2019 => "NLCD_2019_Land_Cover_L48",
            Self::Impervious2019 => "NLCD_2019_Impervious_L48",
        }
    }
}

/// Parameters for one coverage (raster) request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageRequest {
    pub dataset: NlcdDataset,
    pub crs: Epsg,
    pub shape: GridShape,
    pub bbox: BoundingBox,
}

/// A fetched raster tile: a row-major grid of classified cell values.
///
/// Values are land-cover class codes or imperviousness percentages
/// depending on [`RasterTile::dataset`]. Georeferencing comes from the
/// request bounding box, not from the file's embedded tags.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterTile {
    pub dataset: NlcdDataset,
    pub crs: Epsg,
    pub bbox: BoundingBox,
    pub cell_size: f64,
    pub width: u32,
    pub height: u32,
    /// Row-major cell values, row 0 at the top (north) edge.
    pub values: Vec<u16>,
    /// Where the raw downloaded coverage was written.
    pub raw_path: PathBuf,
}

impl RasterTile {
    /// The value at `(row, col)`, or `None` when out of bounds.
    #[must_use]
    pub fn value(&self, row: u32, col: u32) -> Option<u16> {
        if row >= self.height || col >= self.width {
            return None;
        }
        self.values.get((row * self.width + col) as usize).copied()
    }

    /// X coordinate of the left edge of column `col`.
    #[must_use]
    pub fn x_at(&self, col: u32) -> f64 {
        self.cell_size.mul_add(f64::from(col), self.bbox.min_x)
    }

    /// Y coordinate of the top edge of row `row`.
    #[must_use]
    pub fn y_at(&self, row: u32) -> f64 {
        self.cell_size.mul_add(-f64::from(row), self.bbox.max_y)
    }
}

/// A soil-survey map unit polygon.
///
/// `hydgrp_dual` may be a dual code of the form `"A/D"`: hydrologic soil
/// group A under drained conditions, D undrained. `hsg_single` is filled in
/// by the join stage after the drainage policy collapses the dual code.
#[derive(Debug, Clone, PartialEq)]
pub struct SoilPolygon {
    pub geometry: MultiPolygon<f64>,
    /// Map-unit symbol (e.g. `"W"` for water).
    pub musym: String,
    /// Map-unit name.
    pub muname: String,
    /// Hydrologic soil group code, possibly dual, possibly empty.
    pub hydgrp_dual: String,
    /// Single-letter group after the drainage policy is applied.
    pub hsg_single: Option<String>,
}

/// One polygon produced by polygonizing a classified raster.
#[derive(Debug, Clone, PartialEq)]
pub struct LandCoverPolygon {
    pub geometry: MultiPolygon<f64>,
    pub land_cover: u16,
}

/// Whether dual-category soils are assumed drained or undrained.
///
/// Applied consistently across a single pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HsgPolicy {
    /// Dual soils take their drained group (the letter before the slash).
    Drained,
    /// Dual soils take group D (the letter after the slash).
    #[default]
    Undrained,
}

/// One fragment of the curve number layer: the intersection of a land
/// cover polygon and a soil polygon, carrying the full audit attribute set.
#[derive(Debug, Clone, PartialEq)]
pub struct CurveNumberFragment {
    pub geometry: MultiPolygon<f64>,
    pub musym: String,
    pub muname: String,
    pub hydgrp_dual: String,
    pub hsg_single: Option<String>,
    pub land_cover: u16,
    /// Derived composite lookup key, e.g. `"21_C"` or `"11_"`.
    pub gd_code: String,
    /// Joined curve number. `None` when `gd_code` is absent from the
    /// lookup table; such fragments are reported, never dropped.
    pub curve_number: Option<u16>,
}

/// The assembled curve number output layer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CurveNumberLayer {
    pub fragments: Vec<CurveNumberFragment>,
    /// How many fragments had no match in the lookup table.
    pub lookup_misses: u64,
}

/// Which of the four independent outputs a run should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::struct_excessive_bools)]
pub struct OutputSelection {
    pub land_cover: bool,
    pub impervious: bool,
    pub soils: bool,
    pub curve_number: bool,
}

impl OutputSelection {
    /// The land cover sub-pipeline runs when the raster itself or the
    /// curve number layer was requested.
    #[must_use]
    pub const fn needs_land_cover(&self) -> bool {
        self.land_cover || self.curve_number
    }

    /// The soil sub-pipeline runs when the soil layer or the curve number
    /// layer was requested.
    #[must_use]
    pub const fn needs_soils(&self) -> bool {
        self.soils || self.curve_number
    }

    #[must_use]
    pub const fn any(&self) -> bool {
        self.land_cover || self.impervious || self.soils || self.curve_number
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bbox_expansion_is_symmetric() {
        let bbox = BoundingBox::new(10.0, 20.0, 40.0, 50.0);
        let grown = bbox.expanded(30.0);
        assert!((grown.min_x - -20.0).abs() < f64::EPSILON);
        assert!((grown.max_y - 80.0).abs() < f64::EPSILON);
        assert!((grown.width() - bbox.width() - 60.0).abs() < f64::EPSILON);
    }

    #[test]
    fn bbox_query_string_is_comma_joined() {
        let bbox = BoundingBox::new(1.0, 2.0, 3.0, 4.0);
        assert_eq!(bbox.to_query_string(), "1,2,3,4");
    }

    #[test]
    fn tile_value_bounds_checked() {
        let tile = RasterTile {
            dataset: NlcdDataset::LandCover2019,
            crs: Epsg::CONUS_ALBERS,
            bbox: BoundingBox::new(0.0, 0.0, 60.0, 30.0),
            cell_size: 30.0,
            width: 2,
            height: 1,
            values: vec![21, 42],
            raw_path: PathBuf::new(),
        };
        assert_eq!(tile.value(0, 1), Some(42));
        assert_eq!(tile.value(1, 0), None);
        assert_eq!(tile.value(0, 2), None);
    }

    #[test]
    fn tile_georeferencing_runs_north_down() {
        let tile = RasterTile {
            dataset: NlcdDataset::LandCover2019,
            crs: Epsg::CONUS_ALBERS,
            bbox: BoundingBox::new(100.0, 200.0, 190.0, 260.0),
            cell_size: 30.0,
            width: 3,
            height: 2,
            values: vec![0; 6],
            raw_path: PathBuf::new(),
        };
        assert!((tile.x_at(0) - 100.0).abs() < f64::EPSILON);
        assert!((tile.x_at(3) - 190.0).abs() < f64::EPSILON);
        assert!((tile.y_at(0) - 260.0).abs() < f64::EPSILON);
        assert!((tile.y_at(2) - 200.0).abs() < f64::EPSILON);
    }

    #[test]
    fn curve_number_requires_land_cover_and_soils() {
        let sel = OutputSelection {
            curve_number: true,
            ..OutputSelection::default()
        };
        assert!(sel.needs_land_cover());
        assert!(sel.needs_soils());
        assert!(sel.any());
    }

    #[test]
    fn epsg_displays_with_authority_prefix() {
        assert_eq!(Epsg::CONUS_ALBERS.to_string(), "EPSG:5070");
    }
}
