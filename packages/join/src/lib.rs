#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! The curve number fusion algorithm.
//!
//! Takes the polygonized land cover layer and the policy-collapsed soil
//! layer, intersects them into fragments, derives each fragment's
//! composite `GDCode` key, and joins the key against the lookup table.
//! Fragments whose key is absent get no curve number and are counted
//! rather than dropped, so the caller can surface a miss summary.

pub mod hsg;
pub mod polygonize;

use cn_generator_lookup::LookupTable;
use cn_generator_models::{
    CurveNumberFragment, CurveNumberLayer, LandCoverPolygon, SoilPolygon,
};
use geo::{Area, BooleanOps, BoundingRect, Intersects, MultiPolygon};
use rstar::{AABB, RTree, RTreeObject};

/// NLCD class code for open water, forced onto fragments whose soil
/// record denotes water but carries no hydrologic group.
const OPEN_WATER_CLASS: u16 = 11;

/// Fragments smaller than this (in squared map units) are boundary
/// artifacts of the overlay, not real area.
const MIN_FRAGMENT_AREA: f64 = 1e-6;

/// A soil polygon stored in the R-tree with its envelope.
struct SoilEntry<'a> {
    soil: &'a SoilPolygon,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for SoilEntry<'_> {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Derives the composite lookup key for one fragment.
///
/// Group present: `<class>_<letter>`. No group but the soil record
/// denotes open water: the forced water key `11_`. Otherwise the class
/// with an empty group suffix, which generally misses the lookup and is
/// reported as such.
#[must_use]
pub fn composite_key(
    land_cover: u16,
    hsg_single: Option<&str>,
    musym: &str,
    muname: &str,
) -> String {
    match hsg_single {
        Some(group) if !group.is_empty() => format!("{land_cover}_{group}"),
        _ if denotes_open_water(musym, muname) => format!("{OPEN_WATER_CLASS}_"),
        _ => format!("{land_cover}_"),
    }
}

/// Whether a soil record denotes open water.
#[must_use]
pub fn denotes_open_water(musym: &str, muname: &str) -> bool {
    musym == "W"
        || musym.eq_ignore_ascii_case("water")
        || muname == "W"
        || muname.eq_ignore_ascii_case("water")
}

/// Intersects land cover with soils and joins curve numbers.
///
/// Every fragment is the set intersection of one land cover polygon and
/// one soil polygon and inherits the full attribute set of both sides.
#[must_use]
pub fn generate_curve_number_layer(
    land_cover: &[LandCoverPolygon],
    soils: &[SoilPolygon],
    lookup: &LookupTable,
) -> CurveNumberLayer {
    let entries: Vec<SoilEntry<'_>> = soils
        .iter()
        .filter_map(|soil| {
            soil.geometry.bounding_rect().map(|rect| SoilEntry {
                soil,
                envelope: AABB::from_corners(
                    [rect.min().x, rect.min().y],
                    [rect.max().x, rect.max().y],
                ),
            })
        })
        .collect();
    let index = RTree::bulk_load(entries);

    let mut fragments = Vec::new();
    let mut lookup_misses = 0u64;

    for cover in land_cover {
        let Some(rect) = cover.geometry.bounding_rect() else {
            continue;
        };
        let query = AABB::from_corners(
            [rect.min().x, rect.min().y],
            [rect.max().x, rect.max().y],
        );

        for entry in index.locate_in_envelope_intersecting(&query) {
            if !cover.geometry.intersects(&entry.soil.geometry) {
                continue;
            }
            let geometry: MultiPolygon<f64> =
                cover.geometry.intersection(&entry.soil.geometry);
            if geometry.unsigned_area() < MIN_FRAGMENT_AREA {
                continue;
            }

            let soil = entry.soil;
            let gd_code = composite_key(
                cover.land_cover,
                soil.hsg_single.as_deref(),
                &soil.musym,
                &soil.muname,
            );
            let curve_number = lookup.get(&gd_code);
            if curve_number.is_none() {
                lookup_misses += 1;
            }

            fragments.push(CurveNumberFragment {
                geometry,
                musym: soil.musym.clone(),
                muname: soil.muname.clone(),
                hydgrp_dual: soil.hydgrp_dual.clone(),
                hsg_single: soil.hsg_single.clone(),
                land_cover: cover.land_cover,
                gd_code,
                curve_number,
            });
        }
    }

    if lookup_misses > 0 {
        log::warn!(
            "{lookup_misses} of {} fragments had no lookup match",
            fragments.len()
        );
    }

    CurveNumberLayer {
        fragments,
        lookup_misses,
    }
}
