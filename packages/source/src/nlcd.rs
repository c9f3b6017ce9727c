//! NLCD coverage fetcher for the MRLC `GeoServer`.
//!
//! Requests one `GetCoverage` tile (classified land cover or fractional
//! impervious surface, 2019 vintage) for a bounding box, writes the raw
//! `GeoTIFF` to a temporary file, and decodes it into a [`RasterTile`].
//! Georeferencing comes from the request itself — bounding box and cell
//! size are already known, so the file's embedded tags are not consulted.

use std::io::Cursor;
use std::path::PathBuf;

use async_trait::async_trait;
use cn_generator_models::{CoverageRequest, NlcdDataset, RasterTile};
use tiff::decoder::{Decoder, DecodingResult};

use crate::{RasterSource, SourceError, retry};

/// Query-string template for a WCS 1.0.0 `GetCoverage` request.
///
/// Interpolated with the coverage identifier, CRS authority code, the
/// comma-joined bounding box, and the output grid dimensions in cells.
const COVERAGE_QUERY: &str = "service=WCS&version=1.0.0&request=GetCoverage\
                              &coverage={coverage}&crs={crs}&bbox={bbox}\
                              &width={width}&height={height}&format=GeoTIFF";

/// Diagnostic appended to raster fetch failures. Outages and certificate
/// problems on the MRLC side are the two causes seen in practice.
const MRLC_DIAGNOSTIC: &str =
    "Error requesting land use data from 'www.mrlc.gov'. Most probably either their \
     server is down or there is a certification issue. This should be temporary; \
     try again later.";

/// Builds the full `GetCoverage` URL for a request.
#[must_use]
pub fn coverage_url(request: &CoverageRequest) -> String {
    let query = COVERAGE_QUERY
        .replace("{coverage}", request.dataset.coverage_id())
        .replace("{crs}", &request.crs.to_string())
        .replace("{bbox}", &request.bbox.to_query_string())
        .replace("{width}", &request.shape.width.to_string())
        .replace("{height}", &request.shape.height.to_string());
    format!(
        "https://www.mrlc.gov/geoserver/mrlc_display/{}/ows?{query}",
        request.dataset.coverage_id()
    )
}

/// Fetches NLCD coverages from the MRLC `GeoServer`.
pub struct MrlcRasterSource {
    client: reqwest::Client,
    temp_dir: PathBuf,
}

impl MrlcRasterSource {
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            temp_dir: std::env::temp_dir(),
        }
    }

    /// Overrides where raw coverage downloads are written.
    #[must_use]
    pub fn with_temp_dir(mut self, temp_dir: PathBuf) -> Self {
        self.temp_dir = temp_dir;
        self
    }
}

impl Default for MrlcRasterSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RasterSource for MrlcRasterSource {
    async fn fetch(&self, request: &CoverageRequest) -> Result<RasterTile, SourceError> {
        let url = coverage_url(request);
        log::info!(
            "{}: requesting {}x{} cells at {}",
            request.dataset,
            request.shape.width,
            request.shape.height,
            request.crs
        );

        let bytes = retry::send_bytes(|| self.client.get(&url))
            .await
            .map_err(|e| SourceError::Service {
                message: format!("{MRLC_DIAGNOSTIC}\nCaused by: {e}"),
            })?;

        // GeoServer reports some errors as a 200 with an XML body.
        if bytes.starts_with(b"<?xml") || bytes.starts_with(b"<ServiceException") {
            let preview = String::from_utf8_lossy(&bytes[..bytes.len().min(300)]).to_string();
            return Err(SourceError::Service {
                message: format!("{MRLC_DIAGNOSTIC}\nService response: {preview}"),
            });
        }

        let raw_path = self.temp_dir.join(format!(
            "{}_{}.tif",
            request.dataset.coverage_id(),
            uuid::Uuid::new_v4()
        ));
        std::fs::write(&raw_path, &bytes)?;
        log::debug!("{}: raw coverage written to {}", request.dataset, raw_path.display());

        decode_coverage(request.dataset, &bytes, request, raw_path)
    }
}

/// Decodes the downloaded `GeoTIFF` into a [`RasterTile`].
fn decode_coverage(
    dataset: NlcdDataset,
    bytes: &[u8],
    request: &CoverageRequest,
    raw_path: PathBuf,
) -> Result<RasterTile, SourceError> {
    let mut decoder = Decoder::new(Cursor::new(bytes))?;
    let (width, height) = decoder.dimensions()?;

    let values: Vec<u16> = match decoder.read_image()? {
        DecodingResult::U8(v) => v.into_iter().map(u16::from).collect(),
        DecodingResult::U16(v) => v,
        other => {
            return Err(SourceError::Payload {
                message: format!(
                    "unexpected sample format in {dataset} coverage: {:?}",
                    std::mem::discriminant(&other)
                ),
            });
        }
    };

    if values.len() != (width as usize) * (height as usize) {
        return Err(SourceError::Payload {
            message: format!(
                "coverage size mismatch: {}x{width}x{height} cells, {} samples",
                dataset,
                values.len()
            ),
        });
    }

    let cell_size = request.bbox.width() / f64::from(width);

    Ok(RasterTile {
        dataset,
        crs: request.crs,
        bbox: request.bbox,
        cell_size,
        width,
        height,
        values,
        raw_path,
    })
}
