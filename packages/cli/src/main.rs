#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line front end for the curve number generator.
//!
//! Loads an AOI from `GeoJSON`, runs the pipeline against the live MRLC
//! and Soil Data Access services, and writes the requested outputs to
//! disk. Ctrl-C flips the shared cancellation flag; the pipeline notices
//! at the next step boundary and exits cleanly with no outputs.
//!
//! Uses `indicatif-log-bridge` to route `log` output through
//! `indicatif::MultiProgress` so log lines and the step bar never fight
//! for the terminal.

mod aoi;
mod progress;
mod usage;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use cn_generator_models::{Epsg, HsgPolicy, OutputSelection};
use cn_generator_pipeline::config::{
    DEFAULT_MAX_ACRES, DEFAULT_MIN_ACRES, RunConfig,
};
use cn_generator_pipeline::{Pipeline, output, style};
use cn_generator_source::nlcd::MrlcRasterSource;
use cn_generator_source::ssurgo::SdaSoilSource;
use indicatif::MultiProgress;

/// Generates a hydrologic curve number layer for an area of interest
/// within the contiguous United States.
#[derive(Debug, Parser)]
#[command(name = "cn-generator")]
#[allow(clippy::struct_excessive_bools)]
struct Args {
    /// AOI polygon(s) as a GeoJSON file.
    #[arg(long)]
    aoi: PathBuf,

    /// EPSG code of the AOI coordinates.
    #[arg(long, default_value_t = 4326)]
    crs: u32,

    /// Emit the NLCD land cover raster.
    #[arg(long)]
    land_cover: bool,

    /// Emit the NLCD impervious surface raster.
    #[arg(long)]
    impervious: bool,

    /// Emit the SSURGO soil layer.
    #[arg(long)]
    soils: bool,

    /// Emit the curve number layer (default when nothing is selected).
    #[arg(long)]
    curve_number: bool,

    /// Custom lookup table CSV with `GDCode` and `CN_Join` columns.
    #[arg(long)]
    lookup: Option<PathBuf>,

    /// Assume dual-category soils are drained (group A/B/C instead of D).
    #[arg(long)]
    drained: bool,

    /// Inclusive lower bound on AOI area, in acres.
    #[arg(long, default_value_t = DEFAULT_MIN_ACRES)]
    min_acres: f64,

    /// Inclusive upper bound on AOI area, in acres.
    #[arg(long, default_value_t = DEFAULT_MAX_ACRES)]
    max_acres: f64,

    /// Directory the outputs are written into.
    #[arg(long, default_value = "cn_output")]
    output_dir: PathBuf,
}

impl Args {
    fn output_selection(&self) -> OutputSelection {
        let mut outputs = OutputSelection {
            land_cover: self.land_cover,
            impervious: self.impervious,
            soils: self.soils,
            curve_number: self.curve_number,
        };
        if !outputs.any() {
            log::info!("No outputs selected; defaulting to the curve number layer");
            outputs.curve_number = true;
        }
        outputs
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = init_logger();
    let args = Args::parse();

    let area = aoi::load_aoi(&args.aoi, Epsg(args.crs))?;

    let config = RunConfig {
        outputs: args.output_selection(),
        policy: if args.drained {
            HsgPolicy::Drained
        } else {
            HsgPolicy::Undrained
        },
        lookup_path: args.lookup.clone(),
        min_acres: args.min_acres,
        max_acres: args.max_acres,
        ..RunConfig::default()
    };

    std::fs::create_dir_all(&args.output_dir)?;

    // Ctrl-C flips the flag; the pipeline polls it at step boundaries.
    let cancelled = Arc::new(AtomicBool::new(false));
    {
        let cancelled = Arc::clone(&cancelled);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("Cancellation requested; stopping at the next step...");
                cancelled.store(true, Ordering::SeqCst);
            }
        });
    }

    let feedback = progress::IndicatifFeedback::new(&multi, cancelled);
    let raster_source = MrlcRasterSource::new();
    let soil_source = SdaSoilSource::new();
    let telemetry = usage::UsageCounter::new(args.output_dir.join(".usage_count"));

    let run = Pipeline::new(&raster_source, &soil_source)
        .with_telemetry(&telemetry)
        .run(&area, &config, &feedback)
        .await?;

    if run.cancelled {
        feedback.finish("Cancelled");
        log::warn!(
            "Run cancelled after {} step(s); no outputs written",
            run.steps_completed
        );
        return Ok(());
    }

    if let Some(tile) = &run.land_cover {
        let path = args.output_dir.join("land_cover.tif");
        output::write_raster(&path, tile)?;
        output::write_style_sidecar(&path, &style::land_cover_style())?;
    }
    if let Some(tile) = &run.impervious {
        output::write_raster(&args.output_dir.join("impervious.tif"), tile)?;
    }
    if let Some(soils) = &run.soils {
        output::write_soils_geojson(&args.output_dir.join("soils.geojson"), soils)?;
    }
    if let Some(layer) = &run.curve_number {
        let path = args.output_dir.join("curve_number.geojson");
        output::write_curve_number_geojson(&path, layer)?;
        output::write_style_sidecar(&path, &style::curve_number_style())?;

        log::info!(
            "Curve number layer: {} fragments, {} without a lookup match",
            layer.fragments.len(),
            layer.lookup_misses
        );
    }

    feedback.finish("Done");
    log::info!(
        "Pipeline complete: {:.1} acres, {} step(s)",
        run.area_acres,
        run.steps_completed
    );
    Ok(())
}

/// Initializes the global logger wrapped in `indicatif-log-bridge` so
/// `log::info!` and friends are suspended while the step bar redraws.
fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok();

    log::set_max_level(level);

    multi
}
