#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Step-counted, cancellable orchestration of the curve number pipeline.
//!
//! Sequences extent validation, the raster and soil fetches, geometry
//! repair, reprojection, and the curve number join. Sub-pipelines are
//! skipped entirely when no requested output needs them. Progress flows
//! through a [`progress::ProgressFeedback`] sink that is polled for
//! cancellation at every step boundary; on cancellation the run returns
//! an empty result immediately. Every terminal output is reprojected back
//! to the AOI's original CRS.

pub mod config;
pub mod guard;
pub mod output;
pub mod progress;
pub mod style;
pub mod telemetry;

use cn_generator_geometry::{GeometryError, area_acres, clip, coverage_grid, extent, repair, swap_xy};
use cn_generator_join::{generate_curve_number_layer, hsg::apply_policy, polygonize::polygonize};
use cn_generator_lookup::{LookupError, LookupTable};
use cn_generator_models::{
    AreaOfInterest, CoverageRequest, CurveNumberLayer, Epsg, NlcdDataset, OutputSelection,
    RasterTile, SoilPolygon,
};
use cn_generator_projection::{ProjectionError, reproject_multi_polygon};
use cn_generator_source::{RasterSource, SoilSource, SourceError, warp::warp};

use crate::config::RunConfig;
use crate::progress::{ProgressFeedback, StepTracker};
use crate::telemetry::{NullTelemetry, Telemetry};

/// Errors that can abort a pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// AOI area outside the configured acreage bounds. Raised before any
    /// remote call is issued.
    #[error(
        "Area of interest is {acres:.1} acres, outside the allowed range \
         [{min:.0}, {max:.0}] acres"
    )]
    AreaOutOfBounds {
        /// The AOI's area.
        acres: f64,
        /// Configured inclusive lower bound.
        min: f64,
        /// Configured inclusive upper bound.
        max: f64,
    },

    /// A remote fetch failed fatally.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// A reprojection failed.
    #[error(transparent)]
    Projection(#[from] ProjectionError),

    /// A geometry operation failed beyond repair.
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    /// The lookup table could not be loaded.
    #[error(transparent)]
    Lookup(#[from] LookupError),

    /// I/O error writing outputs.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error writing outputs.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Raster encoding error writing outputs.
    #[error("Raster encode error: {0}")]
    Tiff(#[from] tiff::TiffError),
}

/// The result of one pipeline run.
///
/// Outputs are present only when requested and produced; a cancelled run
/// carries no outputs at all.
#[derive(Debug, Default)]
pub struct PipelineRun {
    /// Land cover raster, in the AOI's original CRS.
    pub land_cover: Option<RasterTile>,
    /// Impervious surface raster, in the AOI's original CRS.
    pub impervious: Option<RasterTile>,
    /// Repaired, clipped soil polygons, in the AOI's original CRS.
    pub soils: Option<Vec<SoilPolygon>>,
    /// The joined curve number layer, in the AOI's original CRS.
    pub curve_number: Option<CurveNumberLayer>,
    /// AOI area in acres, as validated.
    pub area_acres: f64,
    /// Whether the run stopped at a cancellation poll.
    pub cancelled: bool,
    /// How many steps actually completed.
    pub steps_completed: u32,
}

impl PipelineRun {
    fn cancelled_at(steps: u32) -> Self {
        Self {
            cancelled: true,
            steps_completed: steps,
            ..Self::default()
        }
    }
}

/// The worst-case step total declared for a given output selection.
///
/// Includes the fallback soil-retrieval steps that may never run, so
/// observed advances can equal but never exceed the declared total.
#[must_use]
pub fn declared_total_steps(outputs: &OutputSelection) -> u32 {
    if !outputs.any() {
        return 0;
    }
    let mut total = 1; // extent validation
    if outputs.impervious {
        total += 2; // fetch, warp
    }
    if outputs.needs_land_cover() {
        total += 2; // fetch, warp
    }
    if outputs.needs_soils() {
        total += 7; // reproject, primary, fallback, swap, repair, clip, reproject back
    }
    if outputs.curve_number {
        total += 4; // polygonize, repair, collapse, join
    }
    total
}

/// Sequences the pipeline components over injected data sources.
pub struct Pipeline<'a> {
    raster: &'a dyn RasterSource,
    soil: &'a dyn SoilSource,
    telemetry: &'a dyn Telemetry,
}

impl<'a> Pipeline<'a> {
    #[must_use]
    pub const fn new(raster: &'a dyn RasterSource, soil: &'a dyn SoilSource) -> Self {
        Self {
            raster,
            soil,
            telemetry: &NullTelemetry,
        }
    }

    /// Replaces the no-op telemetry collaborator.
    #[must_use]
    pub const fn with_telemetry(mut self, telemetry: &'a dyn Telemetry) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Runs the pipeline for one AOI.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] for fatal conditions: the AOI outside the
    /// acreage bounds (before any network traffic), a failed raster fetch,
    /// a failed fallback soil fetch, an unloadable lookup table, or an
    /// unsupported CRS. Cancellation is not an error; it produces an empty
    /// [`PipelineRun`] with `cancelled` set.
    #[allow(clippy::too_many_lines, clippy::future_not_send)]
    pub async fn run(
        &self,
        aoi: &AreaOfInterest,
        run_config: &RunConfig,
        feedback: &dyn ProgressFeedback,
    ) -> Result<PipelineRun, PipelineError> {
        let outputs = run_config.outputs;
        feedback.set_total_steps(declared_total_steps(&outputs));

        let mut run = PipelineRun::default();
        if !outputs.any() {
            return Ok(run);
        }

        // The lookup table loads before any network work so a bad user
        // table fails fast.
        let lookup = if outputs.curve_number {
            Some(match &run_config.lookup_path {
                Some(path) => LookupTable::from_path(path)?,
                None => LookupTable::bundled()?,
            })
        } else {
            None
        };

        let mut steps = StepTracker::new(feedback);

        // ── Extent validation ────────────────────────────────────────
        let aoi_albers =
            reproject_multi_polygon(&aoi.geometry, aoi.crs, Epsg::CONUS_ALBERS)?;
        let acres = area_acres(&aoi_albers);
        guard::check_area_limits(acres, run_config.min_acres, run_config.max_acres)?;
        run.area_acres = acres;
        log::info!("AOI area: {acres:.1} acres");
        if !steps.advance() {
            return Ok(PipelineRun::cancelled_at(steps.completed()));
        }

        let extent_albers = extent(&aoi_albers, "area of interest")?;
        let (bbox, shape) = coverage_grid(&extent_albers, run_config.cell_size);

        // ── Impervious surface ───────────────────────────────────────
        if outputs.impervious {
            let tile = self
                .raster
                .fetch(&CoverageRequest {
                    dataset: NlcdDataset::Impervious2019,
                    crs: Epsg::CONUS_ALBERS,
                    shape,
                    bbox,
                })
                .await?;
            if !steps.advance() {
                return Ok(PipelineRun::cancelled_at(steps.completed()));
            }

            run.impervious = Some(warp(&tile, aoi.crs)?);
            if !steps.advance() {
                return Ok(PipelineRun::cancelled_at(steps.completed()));
            }
        }

        // ── Land cover ───────────────────────────────────────────────
        let mut land_cover_tile: Option<RasterTile> = None;
        if outputs.needs_land_cover() {
            let tile = self
                .raster
                .fetch(&CoverageRequest {
                    dataset: NlcdDataset::LandCover2019,
                    crs: Epsg::CONUS_ALBERS,
                    shape,
                    bbox,
                })
                .await?;
            if !steps.advance() {
                return Ok(PipelineRun::cancelled_at(steps.completed()));
            }

            let warped = warp(&tile, aoi.crs)?;
            if outputs.land_cover {
                run.land_cover = Some(warped.clone());
            }
            land_cover_tile = Some(warped);
            if !steps.advance() {
                return Ok(PipelineRun::cancelled_at(steps.completed()));
            }
        }

        // ── Soils ────────────────────────────────────────────────────
        let mut soil_layer: Option<Vec<SoilPolygon>> = None;
        if outputs.needs_soils() {
            let aoi_wgs84 =
                reproject_multi_polygon(&aoi.geometry, aoi.crs, Epsg::WGS84)?;
            if !steps.advance() {
                return Ok(PipelineRun::cancelled_at(steps.completed()));
            }

            let mut soils = match self.soil.fetch_primary(&aoi_wgs84).await {
                Ok(soils) => {
                    if !steps.advance() {
                        return Ok(PipelineRun::cancelled_at(steps.completed()));
                    }
                    soils
                }
                Err(e) => {
                    feedback.push_warning(&format!(
                        "Soil bulk query failed ({e}). The area of interest may be \
                         too large for the primary service; retrying with the paged \
                         WFS download, which is slower but more reliable."
                    ));

                    let extent_wgs84 = extent(&aoi_wgs84, "area of interest")?;
                    let raw = self.soil.fetch_fallback(&extent_wgs84).await?;
                    if !steps.advance() {
                        return Ok(PipelineRun::cancelled_at(steps.completed()));
                    }

                    // The WFS endpoint transposes axes; swap exactly once.
                    let swapped: Vec<SoilPolygon> = raw
                        .into_iter()
                        .map(|mut soil| {
                            soil.geometry = swap_xy(&soil.geometry);
                            soil
                        })
                        .collect();
                    if !steps.advance() {
                        return Ok(PipelineRun::cancelled_at(steps.completed()));
                    }
                    swapped
                }
            };

            // Soil polygons are frequently malformed at survey tile seams.
            for soil in &mut soils {
                soil.geometry = repair(&soil.geometry);
            }
            if !steps.advance() {
                return Ok(PipelineRun::cancelled_at(steps.completed()));
            }

            // Clip to the exact AOI, dropping slivers outside it.
            soils = soils
                .into_iter()
                .filter_map(|mut soil| {
                    soil.geometry = clip(&soil.geometry, &aoi_wgs84);
                    if soil.geometry.0.is_empty() {
                        None
                    } else {
                        Some(soil)
                    }
                })
                .collect();
            if !steps.advance() {
                return Ok(PipelineRun::cancelled_at(steps.completed()));
            }

            // Back to the AOI's CRS, with a final repair pass after the
            // transform.
            for soil in &mut soils {
                soil.geometry = repair(&reproject_multi_polygon(
                    &soil.geometry,
                    Epsg::WGS84,
                    aoi.crs,
                )?);
            }
            if !steps.advance() {
                return Ok(PipelineRun::cancelled_at(steps.completed()));
            }

            if outputs.soils {
                run.soils = Some(soils.clone());
            }
            soil_layer = Some(soils);
        }

        // ── Curve number ─────────────────────────────────────────────
        if outputs.curve_number
            && let (Some(tile), Some(soils), Some(lookup)) =
                (land_cover_tile.as_ref(), soil_layer.take(), lookup.as_ref())
        {
            let land_cover = polygonize(tile);
            if !steps.advance() {
                return Ok(PipelineRun::cancelled_at(steps.completed()));
            }

            let land_cover: Vec<_> = land_cover
                .into_iter()
                .map(|mut polygon| {
                    polygon.geometry = repair(&polygon.geometry);
                    polygon
                })
                .collect();
            if !steps.advance() {
                return Ok(PipelineRun::cancelled_at(steps.completed()));
            }

            let soils = apply_policy(soils, run_config.policy);
            if !steps.advance() {
                return Ok(PipelineRun::cancelled_at(steps.completed()));
            }

            let layer: CurveNumberLayer =
                generate_curve_number_layer(&land_cover, &soils, lookup);
            if layer.lookup_misses > 0 {
                feedback.push_warning(&format!(
                    "{} of {} curve number fragments had no match in the lookup \
                     table and carry no curve number",
                    layer.lookup_misses,
                    layer.fragments.len()
                ));
            }
            run.curve_number = Some(layer);
            if !steps.advance() {
                return Ok(PipelineRun::cancelled_at(steps.completed()));
            }
        }

        run.steps_completed = steps.completed();
        self.telemetry.record_run();
        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use cn_generator_models::{BoundingBox, HsgPolicy};
    use geo::{MultiPolygon, polygon};

    use super::*;

    /// ~10,000 acre square near Aurora, IL, in EPSG:4326.
    fn test_aoi() -> AreaOfInterest {
        AreaOfInterest::new(
            MultiPolygon(vec![polygon![
                (x: -88.30, y: 41.800),
                (x: -88.23, y: 41.800),
                (x: -88.23, y: 41.857),
                (x: -88.30, y: 41.857),
                (x: -88.30, y: 41.800),
            ]]),
            Epsg::WGS84,
        )
    }

    /// East/west halves of the test AOI, as the soil service would
    /// return them (already lon/lat).
    fn test_soils() -> Vec<SoilPolygon> {
        let west = polygon![
            (x: -88.30, y: 41.800),
            (x: -88.265, y: 41.800),
            (x: -88.265, y: 41.857),
            (x: -88.30, y: 41.857),
            (x: -88.30, y: 41.800),
        ];
        let east = polygon![
            (x: -88.265, y: 41.800),
            (x: -88.23, y: 41.800),
            (x: -88.23, y: 41.857),
            (x: -88.265, y: 41.857),
            (x: -88.265, y: 41.800),
        ];
        vec![
            SoilPolygon {
                geometry: MultiPolygon(vec![west]),
                musym: "MoB".to_string(),
                muname: "Morley silt loam".to_string(),
                hydgrp_dual: "B".to_string(),
                hsg_single: None,
            },
            SoilPolygon {
                geometry: MultiPolygon(vec![east]),
                musym: "DrC".to_string(),
                muname: "Drummer silty clay loam".to_string(),
                hydgrp_dual: "C/D".to_string(),
                hsg_single: None,
            },
        ]
    }

    struct FakeRasterSource {
        calls: AtomicU32,
    }

    impl FakeRasterSource {
        fn new() -> Self {
            Self {
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl RasterSource for FakeRasterSource {
        async fn fetch(&self, request: &CoverageRequest) -> Result<RasterTile, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            // A small uniform cultivated-crops tile covering the request.
            let (width, height) = (4u32, 2u32);
            Ok(RasterTile {
                dataset: request.dataset,
                crs: request.crs,
                bbox: request.bbox,
                cell_size: request.bbox.width() / f64::from(width),
                width,
                height,
                values: vec![82; (width * height) as usize],
                raw_path: std::path::PathBuf::new(),
            })
        }
    }

    struct FakeSoilSource {
        fail_primary: bool,
        primary_calls: AtomicU32,
        fallback_calls: AtomicU32,
    }

    impl FakeSoilSource {
        fn new(fail_primary: bool) -> Self {
            Self {
                fail_primary,
                primary_calls: AtomicU32::new(0),
                fallback_calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl SoilSource for FakeSoilSource {
        async fn fetch_primary(
            &self,
            _aoi_wgs84: &MultiPolygon<f64>,
        ) -> Result<Vec<SoilPolygon>, SourceError> {
            self.primary_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_primary {
                return Err(SourceError::Payload {
                    message: "request size exceeds the allowed limit".to_string(),
                });
            }
            Ok(test_soils())
        }

        async fn fetch_fallback(
            &self,
            _extent_wgs84: &BoundingBox,
        ) -> Result<Vec<SoilPolygon>, SourceError> {
            self.fallback_calls.fetch_add(1, Ordering::SeqCst);
            // The fallback endpoint transposes axes.
            Ok(test_soils()
                .into_iter()
                .map(|mut soil| {
                    soil.geometry = cn_generator_geometry::swap_xy(&soil.geometry);
                    soil
                })
                .collect())
        }
    }

    #[derive(Default)]
    struct RecordingFeedback {
        total: AtomicU32,
        steps: Mutex<Vec<u32>>,
        warnings: Mutex<Vec<String>>,
        cancel_at: Option<u32>,
    }

    impl RecordingFeedback {
        fn cancelling_after(step: u32) -> Self {
            Self {
                cancel_at: Some(step),
                ..Self::default()
            }
        }

        fn recorded_steps(&self) -> Vec<u32> {
            self.steps.lock().unwrap().clone()
        }
    }

    impl ProgressFeedback for RecordingFeedback {
        fn set_total_steps(&self, total: u32) {
            self.total.store(total, Ordering::SeqCst);
        }

        fn set_current_step(&self, step: u32) {
            self.steps.lock().unwrap().push(step);
        }

        fn push_warning(&self, message: &str) {
            self.warnings.lock().unwrap().push(message.to_string());
        }

        fn is_cancelled(&self) -> bool {
            self.cancel_at.is_some_and(|limit| {
                self.steps.lock().unwrap().last().copied().unwrap_or(0) >= limit
            })
        }
    }

    fn all_outputs() -> OutputSelection {
        OutputSelection {
            land_cover: true,
            impervious: true,
            soils: true,
            curve_number: true,
        }
    }

    #[test]
    fn declared_totals_grow_with_the_output_set() {
        let soils_only = OutputSelection {
            soils: true,
            ..OutputSelection::default()
        };
        let nothing = OutputSelection::default();
        assert_eq!(declared_total_steps(&nothing), 0);
        assert_eq!(declared_total_steps(&soils_only), 8);
        assert_eq!(declared_total_steps(&all_outputs()), 16);
        assert!(declared_total_steps(&soils_only) < declared_total_steps(&all_outputs()));
    }

    #[tokio::test]
    async fn out_of_bounds_aoi_aborts_before_any_fetch() {
        let raster = FakeRasterSource::new();
        let soil = FakeSoilSource::new(false);
        let feedback = RecordingFeedback::default();
        let config = RunConfig {
            outputs: all_outputs(),
            max_acres: 1.0,
            ..RunConfig::default()
        };

        let err = Pipeline::new(&raster, &soil)
            .run(&test_aoi(), &config, &feedback)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::AreaOutOfBounds { .. }));
        assert_eq!(raster.calls.load(Ordering::SeqCst), 0);
        assert_eq!(soil.primary_calls.load(Ordering::SeqCst), 0);
        assert_eq!(soil.fallback_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn full_run_produces_all_outputs_with_monotonic_steps() {
        let raster = FakeRasterSource::new();
        let soil = FakeSoilSource::new(false);
        let feedback = RecordingFeedback::default();
        let config = RunConfig {
            outputs: all_outputs(),
            ..RunConfig::default()
        };

        let run = Pipeline::new(&raster, &soil)
            .run(&test_aoi(), &config, &feedback)
            .await
            .unwrap();

        assert!(!run.cancelled);
        assert!(run.land_cover.is_some());
        assert!(run.impervious.is_some());
        assert!(run.soils.is_some());
        assert!(run.curve_number.is_some());
        assert!(run.area_acres > 5_000.0 && run.area_acres < 20_000.0);

        // Primary soil path: no fallback, no warnings.
        assert_eq!(soil.primary_calls.load(Ordering::SeqCst), 1);
        assert_eq!(soil.fallback_calls.load(Ordering::SeqCst), 0);
        assert!(feedback.warnings.lock().unwrap().is_empty());

        // Steps advance strictly by one and never pass the declared total.
        let steps = feedback.recorded_steps();
        let expected: Vec<u32> = (1..=14).collect();
        assert_eq!(steps, expected);
        assert!(run.steps_completed <= feedback.total.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn primary_failure_engages_fallback_and_swaps_once() {
        let raster = FakeRasterSource::new();
        let soil = FakeSoilSource::new(true);
        let feedback = RecordingFeedback::default();
        let config = RunConfig {
            outputs: OutputSelection {
                soils: true,
                ..OutputSelection::default()
            },
            ..RunConfig::default()
        };

        let run = Pipeline::new(&raster, &soil)
            .run(&test_aoi(), &config, &feedback)
            .await
            .unwrap();

        assert_eq!(soil.primary_calls.load(Ordering::SeqCst), 1);
        assert_eq!(soil.fallback_calls.load(Ordering::SeqCst), 1);
        assert_eq!(feedback.warnings.lock().unwrap().len(), 1);

        // After the single mandatory swap the soils land back in lon/lat
        // and survive the AOI clip.
        let soils = run.soils.unwrap();
        assert_eq!(soils.len(), 2);
        for soil in &soils {
            let rect = geo::BoundingRect::bounding_rect(&soil.geometry).unwrap();
            assert!(rect.min().x < -88.0, "x must be longitude");
            assert!(rect.min().y > 41.0, "y must be latitude");
        }
    }

    #[tokio::test]
    async fn cancellation_halts_further_fetches() {
        let raster = FakeRasterSource::new();
        let soil = FakeSoilSource::new(false);
        let feedback = RecordingFeedback::cancelling_after(1);
        let config = RunConfig {
            outputs: all_outputs(),
            ..RunConfig::default()
        };

        let run = Pipeline::new(&raster, &soil)
            .run(&test_aoi(), &config, &feedback)
            .await
            .unwrap();

        assert!(run.cancelled);
        assert_eq!(run.steps_completed, 1);
        assert!(run.land_cover.is_none());
        assert!(run.curve_number.is_none());
        assert_eq!(raster.calls.load(Ordering::SeqCst), 0);
        assert_eq!(soil.primary_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn curve_number_scenario_runs_end_to_end() {
        let raster = FakeRasterSource::new();
        let soil = FakeSoilSource::new(false);
        let feedback = RecordingFeedback::default();
        let config = RunConfig {
            outputs: OutputSelection {
                curve_number: true,
                ..OutputSelection::default()
            },
            policy: HsgPolicy::Undrained,
            ..RunConfig::default()
        };

        let run = Pipeline::new(&raster, &soil)
            .run(&test_aoi(), &config, &feedback)
            .await
            .unwrap();

        // One raster fetch (land cover only), one primary soil fetch.
        assert_eq!(raster.calls.load(Ordering::SeqCst), 1);
        assert_eq!(soil.primary_calls.load(Ordering::SeqCst), 1);
        assert_eq!(soil.fallback_calls.load(Ordering::SeqCst), 0);

        // Uniform cultivated crops over two soils: two fragments, both
        // joined (82_B = 78, 82_D = 89 via the undrained policy).
        let layer = run.curve_number.unwrap();
        assert_eq!(layer.lookup_misses, 0);
        assert_eq!(layer.fragments.len(), 2);
        let mut numbers: Vec<u16> = layer
            .fragments
            .iter()
            .map(|f| f.curve_number.unwrap())
            .collect();
        numbers.sort_unstable();
        assert_eq!(numbers, vec![78, 89]);

        // Intermediate-only outputs are not emitted.
        assert!(run.land_cover.is_none());
        assert!(run.soils.is_none());
    }
}
