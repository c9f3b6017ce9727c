//! Output writers for terminal layers.
//!
//! Vector layers go out as `GeoJSON` feature collections with the full
//! audit attribute set; rasters as `GeoTIFF` plus an ESRI world file
//! carrying the georeferencing. Style sidecars are written next to vector
//! outputs (`<name>.style.json`).

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use cn_generator_models::{CurveNumberLayer, RasterTile, SoilPolygon};
use geojson::{Feature, FeatureCollection, JsonObject};

use crate::PipelineError;
use crate::style::StyleDescriptor;

/// Writes the soil layer as a `GeoJSON` feature collection.
///
/// # Errors
///
/// Returns [`PipelineError`] on serialization or file I/O failure.
pub fn write_soils_geojson(path: &Path, soils: &[SoilPolygon]) -> Result<(), PipelineError> {
    let features = soils
        .iter()
        .map(|soil| {
            let mut properties = JsonObject::new();
            properties.insert("musym".to_string(), soil.musym.clone().into());
            properties.insert("muname".to_string(), soil.muname.clone().into());
            properties.insert("hydgrpdcd".to_string(), soil.hydgrp_dual.clone().into());
            feature(&soil.geometry, properties)
        })
        .collect();
    write_collection(path, features)
}

/// Writes the curve number layer as a `GeoJSON` feature collection.
///
/// Fragments without a lookup match keep a `null` curve number so the
/// misses stay visible in the output.
///
/// # Errors
///
/// Returns [`PipelineError`] on serialization or file I/O failure.
pub fn write_curve_number_geojson(
    path: &Path,
    layer: &CurveNumberLayer,
) -> Result<(), PipelineError> {
    let features = layer
        .fragments
        .iter()
        .map(|fragment| {
            let mut properties = JsonObject::new();
            properties.insert("musym".to_string(), fragment.musym.clone().into());
            properties.insert("muname".to_string(), fragment.muname.clone().into());
            properties.insert(
                "hydgrpdcd".to_string(),
                fragment.hydgrp_dual.clone().into(),
            );
            properties.insert(
                "hsg_single".to_string(),
                fragment
                    .hsg_single
                    .clone()
                    .map_or(serde_json::Value::Null, Into::into),
            );
            properties.insert("land_cover".to_string(), fragment.land_cover.into());
            properties.insert("gd_code".to_string(), fragment.gd_code.clone().into());
            properties.insert(
                "curve_number".to_string(),
                fragment
                    .curve_number
                    .map_or(serde_json::Value::Null, Into::into),
            );
            feature(&fragment.geometry, properties)
        })
        .collect();
    write_collection(path, features)
}

/// Writes a raster tile as a 16-bit grayscale `GeoTIFF` with an ESRI
/// world file (`.tfw`) next to it.
///
/// # Errors
///
/// Returns [`PipelineError`] on encoding or file I/O failure.
pub fn write_raster(path: &Path, tile: &RasterTile) -> Result<(), PipelineError> {
    let file = BufWriter::new(File::create(path)?);
    let mut encoder = tiff::encoder::TiffEncoder::new(file)?;
    encoder.write_image::<tiff::encoder::colortype::Gray16>(
        tile.width,
        tile.height,
        &tile.values,
    )?;

    let cell_x = tile.bbox.width() / f64::from(tile.width);
    let cell_y = tile.bbox.height() / f64::from(tile.height);
    let world = format!(
        "{cell_x}\n0.0\n0.0\n{}\n{}\n{}\n",
        -cell_y,
        cell_x.mul_add(0.5, tile.bbox.min_x),
        cell_y.mul_add(-0.5, tile.bbox.max_y),
    );
    std::fs::write(path.with_extension("tfw"), world)?;

    log::info!(
        "wrote {} ({}x{} cells, {})",
        path.display(),
        tile.width,
        tile.height,
        tile.crs
    );
    Ok(())
}

/// Writes a style descriptor sidecar next to an output layer.
///
/// # Errors
///
/// Returns [`PipelineError`] on serialization or file I/O failure.
pub fn write_style_sidecar(
    layer_path: &Path,
    style: &StyleDescriptor,
) -> Result<(), PipelineError> {
    let sidecar = sidecar_path(layer_path);
    let json = serde_json::to_string_pretty(style)?;
    std::fs::write(sidecar, json)?;
    Ok(())
}

/// `<name>.style.json` next to the layer file.
fn sidecar_path(layer_path: &Path) -> std::path::PathBuf {
    let stem = layer_path
        .file_stem()
        .map_or_else(|| "layer".into(), |s| s.to_string_lossy().into_owned());
    layer_path.with_file_name(format!("{stem}.style.json"))
}

fn feature(geometry: &geo::MultiPolygon<f64>, properties: JsonObject) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::new(geojson::Value::from(geometry))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

fn write_collection(path: &Path, features: Vec<Feature>) -> Result<(), PipelineError> {
    let collection = FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    };
    std::fs::write(path, collection.to_string())?;
    log::info!("wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use cn_generator_models::{BoundingBox, CurveNumberFragment, Epsg, NlcdDataset};
    use geo::{MultiPolygon, polygon};

    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("cn_output_tests_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    fn unit_square() -> MultiPolygon<f64> {
        MultiPolygon(vec![polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
            (x: 0.0, y: 0.0),
        ]])
    }

    #[test]
    fn soils_geojson_round_trips() {
        let path = temp_path("soils.geojson");
        let soils = vec![SoilPolygon {
            geometry: unit_square(),
            musym: "MoB".to_string(),
            muname: "Morley silt loam".to_string(),
            hydgrp_dual: "C/D".to_string(),
            hsg_single: None,
        }];
        write_soils_geojson(&path, &soils).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let parsed: geojson::FeatureCollection = text.parse().unwrap();
        assert_eq!(parsed.features.len(), 1);
        let props = parsed.features[0].properties.as_ref().unwrap();
        assert_eq!(props["musym"], "MoB");
        assert_eq!(props["hydgrpdcd"], "C/D");
    }

    #[test]
    fn curve_number_misses_serialize_as_null() {
        let path = temp_path("cn.geojson");
        let layer = CurveNumberLayer {
            fragments: vec![CurveNumberFragment {
                geometry: unit_square(),
                musym: "XX".to_string(),
                muname: "Unknown".to_string(),
                hydgrp_dual: String::new(),
                hsg_single: None,
                land_cover: 99,
                gd_code: "99_".to_string(),
                curve_number: None,
            }],
            lookup_misses: 1,
        };
        write_curve_number_geojson(&path, &layer).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let parsed: geojson::FeatureCollection = text.parse().unwrap();
        let props = parsed.features[0].properties.as_ref().unwrap();
        assert!(props["curve_number"].is_null());
        assert_eq!(props["gd_code"], "99_");
    }

    #[test]
    fn raster_write_produces_world_file() {
        let path = temp_path("tile.tif");
        let tile = RasterTile {
            dataset: NlcdDataset::LandCover2019,
            crs: Epsg::CONUS_ALBERS,
            bbox: BoundingBox::new(0.0, 0.0, 120.0, 60.0),
            cell_size: 30.0,
            width: 4,
            height: 2,
            values: vec![11, 21, 22, 23, 24, 31, 41, 42],
            raw_path: std::path::PathBuf::new(),
        };
        write_raster(&path, &tile).unwrap();

        let world = std::fs::read_to_string(path.with_extension("tfw")).unwrap();
        let lines: Vec<&str> = world.lines().collect();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], "30");
        assert_eq!(lines[3], "-30");
        assert_eq!(lines[4], "15"); // center of the top-left cell
        assert_eq!(lines[5], "45");
    }

    #[test]
    fn style_sidecar_lands_next_to_the_layer() {
        let path = temp_path("cn_layer.geojson");
        std::fs::write(&path, "{}").unwrap();
        write_style_sidecar(&path, &crate::style::curve_number_style()).unwrap();
        assert!(path.with_file_name("cn_layer.style.json").exists());
    }
}
