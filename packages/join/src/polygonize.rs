//! Classified raster to vector conversion.
//!
//! Converts a raster tile into one multipolygon per contiguous
//! same-value region (rook adjacency), georeferenced from the tile's
//! bounding box. Cell value 0 is nodata and produces no polygon.

use cn_generator_models::{LandCoverPolygon, RasterTile};
use geo::{LineString, Polygon, unary_union};

/// Polygonizes a classified raster.
///
/// Each connected component of equal-valued cells becomes one
/// [`LandCoverPolygon`] whose geometry is the union of its cell squares.
#[must_use]
pub fn polygonize(tile: &RasterTile) -> Vec<LandCoverPolygon> {
    let width = tile.width as usize;
    let height = tile.height as usize;
    let mut visited = vec![false; width * height];
    let mut polygons = Vec::new();

    for start in 0..width * height {
        if visited[start] {
            continue;
        }
        let value = tile.values[start];
        if value == 0 {
            visited[start] = true;
            continue;
        }

        // Flood-fill the component with rook (edge) adjacency.
        let mut component = Vec::new();
        let mut stack = vec![start];
        visited[start] = true;
        while let Some(idx) = stack.pop() {
            component.push(idx);
            let (row, col) = (idx / width, idx % width);

            let mut push = |r: usize, c: usize| {
                let n = r * width + c;
                if !visited[n] && tile.values[n] == value {
                    visited[n] = true;
                    stack.push(n);
                }
            };
            if col > 0 {
                push(row, col - 1);
            }
            if col + 1 < width {
                push(row, col + 1);
            }
            if row > 0 {
                push(row - 1, col);
            }
            if row + 1 < height {
                push(row + 1, col);
            }
        }

        let cells: Vec<Polygon<f64>> = component
            .iter()
            .map(|&idx| {
                #[allow(clippy::cast_possible_truncation)]
                let (row, col) = ((idx / width) as u32, (idx % width) as u32);
                cell_polygon(tile, row, col)
            })
            .collect();

        polygons.push(LandCoverPolygon {
            geometry: unary_union(cells.iter()),
            land_cover: value,
        });
    }

    log::debug!(
        "polygonized {}x{} tile into {} regions",
        tile.width,
        tile.height,
        polygons.len()
    );
    polygons
}

/// The square covered by one raster cell.
fn cell_polygon(tile: &RasterTile, row: u32, col: u32) -> Polygon<f64> {
    let x0 = tile.x_at(col);
    let x1 = tile.x_at(col + 1);
    let y0 = tile.y_at(row + 1);
    let y1 = tile.y_at(row);
    Polygon::new(
        LineString::from(vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1), (x0, y0)]),
        vec![],
    )
}
