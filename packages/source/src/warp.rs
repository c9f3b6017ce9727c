//! Raster reprojection (warp) for terminal raster outputs.
//!
//! Rasters are fetched in the continental equal-area CRS and handed back
//! to the caller in the AOI's original CRS. The warp projects the tile's
//! bounding box into the target CRS, then fills the target grid by
//! inverse-projecting each cell center and sampling the nearest source
//! cell. Nearest-neighbour is the only defensible resampling for
//! classified data — interpolating class codes would invent classes.

use cn_generator_models::{Epsg, RasterTile};
use cn_generator_projection::{CoordTransformer, reproject_bbox};

use crate::SourceError;

/// Reprojects a tile to `target` CRS with nearest-neighbour sampling.
///
/// Cells that inverse-project outside the source tile become 0 (nodata).
/// The grid dimensions are preserved; cell sizes change with the target
/// extent.
///
/// # Errors
///
/// Returns [`SourceError::Projection`] when either CRS is unsupported or
/// the extent cannot be transformed.
pub fn warp(tile: &RasterTile, target: Epsg) -> Result<RasterTile, SourceError> {
    if tile.crs == target {
        return Ok(tile.clone());
    }

    let target_bbox = reproject_bbox(&tile.bbox, tile.crs, target)?;
    let inverse = CoordTransformer::new(target, tile.crs)?;

    let width = tile.width;
    let height = tile.height;
    let cell_x = target_bbox.width() / f64::from(width);
    let cell_y = target_bbox.height() / f64::from(height);

    let mut values = vec![0u16; (width as usize) * (height as usize)];
    for row in 0..height {
        let y = cell_y.mul_add(-(f64::from(row) + 0.5), target_bbox.max_y);
        for col in 0..width {
            let x = cell_x.mul_add(f64::from(col) + 0.5, target_bbox.min_x);

            let Ok((src_x, src_y)) = inverse.transform(x, y) else {
                continue;
            };

            let src_col = (src_x - tile.bbox.min_x) / tile.cell_size;
            let src_row = (tile.bbox.max_y - src_y) / tile.cell_size;
            if src_col < 0.0 || src_row < 0.0 {
                continue;
            }
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let (src_col, src_row) = (src_col as u32, src_row as u32);

            if let Some(value) = tile.value(src_row, src_col) {
                values[(row * width + col) as usize] = value;
            }
        }
    }

    Ok(RasterTile {
        dataset: tile.dataset,
        crs: target,
        bbox: target_bbox,
        cell_size: cell_x,
        width,
        height,
        values,
        raw_path: tile.raw_path.clone(),
    })
}
