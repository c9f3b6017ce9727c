//! AOI loading from `GeoJSON`.
//!
//! Accepts a feature collection, a single feature, or a bare geometry;
//! every `Polygon`/`MultiPolygon` found is merged into one multipolygon.

use std::path::Path;

use cn_generator_models::{AreaOfInterest, Epsg};
use geo::{MultiPolygon, Polygon};

/// Reads an AOI file.
///
/// # Errors
///
/// Returns an error when the file cannot be read, is not `GeoJSON`, or
/// contains no polygon geometry.
pub fn load_aoi(path: &Path, crs: Epsg) -> Result<AreaOfInterest, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)?;
    let geojson: geojson::GeoJson = text.parse()?;

    let polygons = collect_polygons(&geojson);
    if polygons.is_empty() {
        return Err(format!("no polygon geometry in {}", path.display()).into());
    }

    log::info!(
        "Loaded AOI from {} ({} polygon(s), {crs})",
        path.display(),
        polygons.len()
    );
    Ok(AreaOfInterest::new(MultiPolygon(polygons), crs))
}

/// Gathers every polygon in the document, whatever its framing.
fn collect_polygons(geojson: &geojson::GeoJson) -> Vec<Polygon<f64>> {
    match geojson {
        geojson::GeoJson::FeatureCollection(collection) => collection
            .features
            .iter()
            .filter_map(|f| f.geometry.as_ref())
            .flat_map(geometry_polygons)
            .collect(),
        geojson::GeoJson::Feature(feature) => feature
            .geometry
            .as_ref()
            .map(geometry_polygons)
            .unwrap_or_default(),
        geojson::GeoJson::Geometry(geometry) => geometry_polygons(geometry),
    }
}

fn geometry_polygons(geometry: &geojson::Geometry) -> Vec<Polygon<f64>> {
    let Ok(geo_geom) = geo::Geometry::<f64>::try_from(geometry.clone()) else {
        return Vec::new();
    };
    match geo_geom {
        geo::Geometry::Polygon(p) => vec![p],
        geo::Geometry::MultiPolygon(mp) => mp.0,
        _ => Vec::new(),
    }
}
