//! SSURGO soil-survey polygon retrieval.
//!
//! Two paths over the same dataset, both in geographic coordinates:
//!
//! * **Primary** — one bulk spatial query `POST`ed to the Soil Data Access
//!   tabular service, AOI inlined as WKT. Fast, but the service rejects
//!   large AOIs (payload-too-large and query-timeout failures), and those
//!   rejections are the dominant failure mode.
//! * **Fallback** — paged `GetFeature` requests against the spatial WFS.
//!   Slower but reliable for large extents. The endpoint is misconfigured
//!   to speak latitude-first: the `BBOX` parameter goes out lat-first and
//!   returned coordinates arrive transposed, so callers MUST swap X/Y
//!   exactly once before using fallback geometry.
//!
//! Neither path falls back by itself; the orchestrator owns that branch.

use async_trait::async_trait;
use cn_generator_models::{BoundingBox, SoilPolygon};
use geo::MultiPolygon;
use wkt::{ToWkt, TryFromWkt};

use crate::{SoilSource, SourceError, retry};

/// Soil Data Access tabular query endpoint.
const SDA_URL: &str = "https://sdmdataaccess.sc.egov.usda.gov/Tabular/post.rest";

/// Soil Data Access spatial WFS endpoint (WGS84 geographic).
const WFS_URL: &str = "https://sdmdataaccess.sc.egov.usda.gov/Spatial/SDMWGS84Geographic.wfs";

/// Feature type exposing map-unit polygons with aggregated attributes.
const WFS_TYPE_NAME: &str = "mapunitpolyextended";

/// Page size for the fallback retrieval.
const WFS_PAGE_SIZE: usize = 1_000;

/// Bulk query template. `{wkt}` is replaced with the AOI polygon in
/// geographic coordinates.
const SDA_QUERY: &str = "SELECT mu.musym, mu.muname, mag.hydgrpdcd, \
                         mup.mupolygongeo.STAsText() AS wktgeom \
                         FROM mupolygon mup \
                         INNER JOIN mapunit mu ON mu.mukey = mup.mukey \
                         LEFT JOIN muaggatt mag ON mag.mukey = mu.mukey \
                         WHERE mup.mupolygongeo.STIntersects(\
                         geometry::STGeomFromText('{wkt}', 4326)) = 1";

/// Fetches SSURGO polygons from the USDA Soil Data Access service.
pub struct SdaSoilSource {
    client: reqwest::Client,
}

impl SdaSoilSource {
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for SdaSoilSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SoilSource for SdaSoilSource {
    async fn fetch_primary(
        &self,
        aoi_wgs84: &MultiPolygon<f64>,
    ) -> Result<Vec<SoilPolygon>, SourceError> {
        let query = SDA_QUERY.replace("{wkt}", &aoi_wgs84.wkt_string());
        let payload = serde_json::json!({
            "query": query,
            "format": "JSON+COLUMNNAME",
        });

        log::info!("SSURGO: bulk spatial query against Soil Data Access");
        let body = retry::send_json(|| self.client.post(SDA_URL).json(&payload)).await?;

        let polygons = parse_sda_table(&body)?;
        log::info!("SSURGO: primary query returned {} polygons", polygons.len());
        Ok(polygons)
    }

    async fn fetch_fallback(
        &self,
        extent_wgs84: &BoundingBox,
    ) -> Result<Vec<SoilPolygon>, SourceError> {
        let mut polygons: Vec<SoilPolygon> = Vec::new();
        let mut offset = 0usize;

        loop {
            let url = wfs_page_url(extent_wgs84, WFS_PAGE_SIZE, offset);
            log::info!(
                "SSURGO: WFS page at offset {offset} ({} features so far)",
                polygons.len()
            );

            let body = retry::send_json(|| self.client.get(&url)).await?;
            let page = parse_wfs_features(&body)?;
            let page_len = page.len();
            polygons.extend(page);

            // A short page means the server ran out of features.
            if page_len < WFS_PAGE_SIZE {
                break;
            }
            offset += page_len;
        }

        log::info!("SSURGO: fallback retrieval returned {} polygons", polygons.len());
        Ok(polygons)
    }
}

/// Builds one paged `GetFeature` URL.
///
/// The endpoint speaks latitude-first, so the `BBOX` parameter is written
/// lat-first as well.
#[must_use]
pub fn wfs_page_url(extent: &BoundingBox, page_size: usize, offset: usize) -> String {
    format!(
        "{WFS_URL}?SERVICE=WFS&VERSION=1.1.0&REQUEST=GetFeature\
         &TYPENAME={WFS_TYPE_NAME}&SRSNAME=EPSG:4326&OUTPUTFORMAT=application/json\
         &BBOX={},{},{},{}&MAXFEATURES={page_size}&STARTINDEX={offset}",
        extent.min_y, extent.min_x, extent.max_y, extent.max_x
    )
}

/// Parses the Soil Data Access tabular response.
///
/// The payload is `{"Table": [[...], ...]}` where the first row carries
/// column names (the `JSON+COLUMNNAME` format). Anything else, including
/// the error documents the service produces for oversized AOIs, is a
/// [`SourceError::Payload`], which the orchestrator treats as the cue to
/// fall back.
fn parse_sda_table(body: &serde_json::Value) -> Result<Vec<SoilPolygon>, SourceError> {
    let rows = body
        .get("Table")
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| SourceError::Payload {
            message: "no 'Table' in Soil Data Access response".to_string(),
        })?;

    let Some((header, data)) = rows.split_first() else {
        return Ok(Vec::new());
    };

    let columns: Vec<String> = header
        .as_array()
        .map(|cells| {
            cells
                .iter()
                .map(|c| c.as_str().unwrap_or("").to_ascii_lowercase())
                .collect()
        })
        .unwrap_or_default();

    let col = |name: &str| columns.iter().position(|c| c.as_str() == name);
    let (Some(musym_idx), Some(muname_idx), Some(hsg_idx), Some(geom_idx)) = (
        col("musym"),
        col("muname"),
        col("hydgrpdcd"),
        col("wktgeom"),
    ) else {
        return Err(SourceError::Payload {
            message: format!("unexpected Soil Data Access columns: {columns:?}"),
        });
    };

    let mut polygons = Vec::with_capacity(data.len());
    for row in data {
        let cells = row.as_array().cloned().unwrap_or_default();
        let cell = |idx: usize| {
            cells
                .get(idx)
                .and_then(serde_json::Value::as_str)
                .unwrap_or("")
                .to_string()
        };

        let wktgeom = cell(geom_idx);
        let Some(geometry) = parse_wkt_multi_polygon(&wktgeom) else {
            log::warn!("SSURGO: skipping row with unparseable geometry");
            continue;
        };

        polygons.push(SoilPolygon {
            geometry,
            musym: cell(musym_idx),
            muname: cell(muname_idx),
            hydgrp_dual: cell(hsg_idx),
            hsg_single: None,
        });
    }

    Ok(polygons)
}

/// Parses one WFS `GetFeature` page (GeoJSON output format).
///
/// Coordinates are left exactly as the service sent them — transposed.
fn parse_wfs_features(body: &serde_json::Value) -> Result<Vec<SoilPolygon>, SourceError> {
    let collection: geojson::FeatureCollection = serde_json::from_value(body.clone())
        .map_err(|e| SourceError::Payload {
            message: format!("WFS response is not a feature collection: {e}"),
        })?;

    let mut polygons = Vec::with_capacity(collection.features.len());
    for feature in collection.features {
        let Some(geometry) = feature.geometry.and_then(geojson_to_multi_polygon) else {
            log::warn!("SSURGO: skipping WFS feature without polygon geometry");
            continue;
        };

        let prop = |key: &str| {
            feature
                .properties
                .as_ref()
                .and_then(|p| p.get(key).or_else(|| p.get(key.to_ascii_uppercase().as_str())))
                .and_then(serde_json::Value::as_str)
                .unwrap_or("")
                .to_string()
        };

        polygons.push(SoilPolygon {
            geometry,
            musym: prop("musym"),
            muname: prop("muname"),
            hydgrp_dual: prop("hydgrpdcd"),
            hsg_single: None,
        });
    }

    Ok(polygons)
}

/// Parses a WKT string into a [`MultiPolygon`]. Handles both `POLYGON`
/// and `MULTIPOLYGON` geometries.
fn parse_wkt_multi_polygon(wktgeom: &str) -> Option<MultiPolygon<f64>> {
    let geometry: geo::Geometry<f64> = geo::Geometry::try_from_wkt_str(wktgeom).ok()?;
    match geometry {
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        geo::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
        _ => None,
    }
}

/// Converts a `GeoJSON` geometry into a [`MultiPolygon`]. Handles both
/// `Polygon` and `MultiPolygon` geometry types.
fn geojson_to_multi_polygon(geometry: geojson::Geometry) -> Option<MultiPolygon<f64>> {
    let geo_geom: geo::Geometry<f64> = geometry.try_into().ok()?;
    match geo_geom {
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        geo::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
        _ => None,
    }
}
