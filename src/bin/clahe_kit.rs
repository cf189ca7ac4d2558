// src/bin/clahe_kit.rs
//
// Equalize an image file with CLAHE.
//
// Usage:
//   clahe-kit input.png output.png
//   clahe-kit input.png output.png --clip-limit 2.0 --tile-grid 4x6
//   clahe-kit input.tiff output.tiff --channels color --config clahe.toml -v
//
// Parameters come from the built-in defaults, then --config, then the
// command-line flags.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use log::{debug, info};
use serde_json::{json, Value};

use clahe_kit::args::resolve_size;
use clahe_kit::convert;
use clahe_kit::settings::Loader;
use clahe_kit::Mat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Channels {
    /// Convert to 8-bit luma and equalize one plane.
    Gray,
    /// Keep the file's channels and depth; equalize each channel.
    Color,
}

#[derive(Debug, Parser)]
#[command(name = "clahe-kit", version, about = "Contrast-limited adaptive histogram equalization")]
struct Cli {
    /// Image to read.
    input: PathBuf,

    /// Where to write the equalized image; format follows the extension.
    output: PathBuf,

    /// Clip limit (multiple of the uniform bin height; 0 disables clipping).
    #[arg(long)]
    clip_limit: Option<f64>,

    /// Tile grid as N or WxH.
    #[arg(long)]
    tile_grid: Option<String>,

    /// TOML file layered over the built-in defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Channels::Gray)]
    channels: Channels,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Turn "8" or "4x6" into a dynamic size value and resolve it the same way
/// the binding does.
fn parse_tile_grid(text: &str) -> Result<(u32, u32)> {
    let value: Value = match text.split_once(['x', 'X']) {
        Some((w, h)) => json!([w.trim().parse::<f64>()?, h.trim().parse::<f64>()?]),
        None => json!(text.trim().parse::<f64>()?),
    };
    match resolve_size(&value, Default::default()) {
        Some(grid) => Ok((grid.width, grid.height)),
        None => bail!("Unable to parse tileGridSize '{text}'"),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut loader = Loader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_file(path);
    }
    if let Some(clip) = cli.clip_limit {
        loader = loader.set_override("clip_limit", clip)?;
    }
    if let Some(text) = &cli.tile_grid {
        let (w, h) =
            parse_tile_grid(text).with_context(|| format!("invalid --tile-grid '{text}'"))?;
        loader = loader
            .set_override("tile_grid.width", w as i64)?
            .set_override("tile_grid.height", h as i64)?;
    }
    let config = loader.build().context("failed to load configuration")?;
    debug!("configuration: {config:?}");

    let img = ::image::open(&cli.input)
        .with_context(|| format!("failed to read {}", cli.input.display()))?;
    let src = match cli.channels {
        Channels::Gray => Mat::gray8(convert::luma8_from_dynamic(&img)),
        Channels::Color => convert::mat_from_dynamic(&img)?,
    };
    info!(
        "loaded {} ({}x{}, {} channel(s), {})",
        cli.input.display(),
        src.width(),
        src.height(),
        src.channels(),
        src.depth()
    );

    let mut clahe = config.build();
    let t0 = Instant::now();
    let out = clahe.apply(&src)?;
    info!(
        "equalized with clip_limit={} tile_grid={}x{} in {:.1} ms",
        clahe.clip_limit(),
        clahe.tiles_grid_size().width,
        clahe.tiles_grid_size().height,
        t0.elapsed().as_secs_f64() * 1e3
    );

    convert::mat_to_dynamic(&out)?
        .save(&cli.output)
        .with_context(|| format!("failed to write {}", cli.output.display()))?;
    info!("wrote {}", cli.output.display());
    Ok(())
}
