//! Binary entrypoint for style-studio.
//!
//! Delegates all logic to the library crate; no local modules here.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use image::RgbaImage;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Level, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use style_studio::config::{self, Configuration};
use style_studio::error::Error;
use style_studio::events::StylizeStyle;
use style_studio::processing::blend::interpolate;
use style_studio::processing::buffer::PixelBuffer;
use style_studio::processing::gradient::{Axis, GradientSpec, apply_gradient};
use style_studio::processing::normalize;
use style_studio::session::BlendSession;
use style_studio::stylize::{MomentTransfer, StyleTransfer};
use style_studio::tasks::stylizer;

/// Simple CLI
#[derive(Debug, Parser)]
#[command(
    name = "style-studio",
    about = "Blend one or more photo styles onto a content photograph"
)]
struct Cli {
    /// Content photograph to stylize
    content: PathBuf,

    /// Style image file (repeatable)
    #[arg(long = "style", value_name = "FILE")]
    styles: Vec<PathBuf>,

    /// Directory of style images, scanned recursively
    #[arg(long, value_name = "DIR")]
    styles_dir: Option<PathBuf>,

    /// Blend weight in [0,1] for the style at the same position;
    /// missing weights default to 1.0
    #[arg(long = "weight", value_name = "W")]
    weights: Vec<f32>,

    /// Horizontal gradient endpoints, e.g. 0.0,1.0
    #[arg(long, value_name = "LEFT,RIGHT", value_parser = parse_axis)]
    gradient_horizontal: Option<Axis>,

    /// Vertical gradient endpoints
    #[arg(long, value_name = "TOP,BOTTOM", value_parser = parse_axis)]
    gradient_vertical: Option<Axis>,

    /// Radial gradient endpoints
    #[arg(long, value_name = "CENTER,EDGE", value_parser = parse_axis)]
    gradient_radial: Option<Axis>,

    /// Output path
    #[arg(short, long, value_name = "FILE", default_value = "stylized.png")]
    output: PathBuf,

    /// Path to YAML config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn parse_axis(raw: &str) -> Result<Axis, String> {
    let (start, end) = raw
        .split_once(',')
        .ok_or_else(|| format!("expected two comma-separated values, got {raw:?}"))?;
    let start: f32 = start
        .trim()
        .parse()
        .map_err(|_| format!("bad gradient endpoint {start:?}"))?;
    let end: f32 = end
        .trim()
        .parse()
        .map_err(|_| format!("bad gradient endpoint {end:?}"))?;
    Ok(Axis::new(start, end))
}

fn init_tracing(verbosity: u8) {
    // map -v to log level
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("style_studio={level}").parse().unwrap());
    fmt().with_env_filter(filter).with_target(true).init();
}

fn is_image_file(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref(),
        Some("jpg" | "jpeg" | "png" | "webp" | "gif")
    )
}

fn collect_style_paths(explicit: &[PathBuf], dir: Option<&Path>) -> Result<Vec<PathBuf>, Error> {
    let mut paths: Vec<PathBuf> = explicit.to_vec();
    if let Some(dir) = dir {
        let mut scanned: Vec<PathBuf> = walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file() && is_image_file(entry.path()))
            .map(|entry| entry.into_path())
            .collect();
        scanned.sort();
        paths.extend(scanned);
    }
    if paths.is_empty() {
        return Err(Error::EmptyStyleSet);
    }
    Ok(paths)
}

/// Stylizes every style path against the content image concurrently,
/// skipping variants whose decode or inference fails. Returns the
/// surviving variants in style order.
async fn stylize_batch(
    backend: Arc<dyn StyleTransfer>,
    content: Arc<RgbaImage>,
    style_paths: &[PathBuf],
    cfg: &Configuration,
) -> Result<Vec<(usize, RgbaImage)>> {
    let capacity = style_paths.len().max(1);
    let (req_tx, req_rx) = mpsc::channel(capacity);
    let (ready_tx, mut ready_rx) = mpsc::channel(capacity);
    let (failed_tx, mut failed_rx) = mpsc::channel(capacity);
    let cancel = CancellationToken::new();

    let worker = tokio::spawn(stylizer::run(
        backend,
        content,
        cfg.style_size,
        req_rx,
        ready_tx,
        failed_tx,
        cancel.clone(),
        cfg.max_in_flight,
    ));

    for (index, path) in style_paths.iter().enumerate() {
        req_tx
            .send(StylizeStyle {
                index,
                path: path.clone(),
            })
            .await
            .context("stylizer task stopped early")?;
    }
    drop(req_tx);

    worker.await.context("stylizer task panicked")??;

    let mut failed = 0usize;
    while let Ok(event) = failed_rx.try_recv() {
        warn!(path = %event.path.display(), "style variant unavailable");
        failed += 1;
    }

    let mut variants = Vec::new();
    while let Ok(event) = ready_rx.try_recv() {
        variants.push((event.index, event.image));
    }
    variants.sort_by_key(|(index, _)| *index);

    if variants.is_empty() {
        return Err(Error::EmptyStyleSet.into());
    }
    if failed > 0 {
        info!(
            ok = variants.len(),
            failed, "continuing with a reduced style set"
        );
    }
    Ok(variants)
}

fn resolve_weights(cli_weights: &[f32], style_count: usize) -> Vec<f32> {
    let mut weights: Vec<f32> = cli_weights
        .iter()
        .map(|w| w.clamp(0.0, 1.0))
        .take(style_count)
        .collect();
    if cli_weights.len() > style_count {
        warn!(
            given = cli_weights.len(),
            styles = style_count,
            "ignoring extra weights"
        );
    }
    // The app starts every slider at full strength.
    weights.resize(style_count, 1.0);
    weights
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = match &cli.config {
        Some(path) => config::from_yaml_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Configuration::default(),
    };
    cfg.validate().context("validating configuration")?;

    let style_paths = collect_style_paths(&cli.styles, cli.styles_dir.as_deref())?;
    info!(count = style_paths.len(), "collected style images");

    let source = stylizer::decode_rgba8_apply_exif(&cli.content)
        .map_err(|err| Error::BadContentImage(format!("{}: {err:#}", cli.content.display())))?;
    let (source_w, source_h) = source.dimensions();
    let content = normalize::fit_within(&source, cfg.working_max_dim)?;
    info!(
        source_w,
        source_h,
        working_w = content.width(),
        working_h = content.height(),
        "normalized content image"
    );

    let backend: Arc<dyn StyleTransfer> = Arc::new(MomentTransfer);
    let variants = stylize_batch(backend, Arc::new(content.clone()), &style_paths, &cfg).await?;

    let all_weights = resolve_weights(&cli.weights, style_paths.len());
    let weights: Vec<f32> = variants
        .iter()
        .map(|(index, _)| all_weights[*index])
        .collect();

    let content_buf =
        PixelBuffer::from_rgba(&content).context("content image failed to decode to a buffer")?;

    let blended = if variants.len() == 1 {
        // Single-style fast path: the before/after strength slider case.
        let (_, variant) = &variants[0];
        let variant_buf =
            PixelBuffer::from_rgba(variant).context("variant failed to decode to a buffer")?;
        interpolate(&content_buf, &variant_buf, weights[0])
            .context("strength interpolation failed")?
    } else {
        let images: Vec<RgbaImage> = variants.into_iter().map(|(_, image)| image).collect();
        let mut session = BlendSession::new(content.clone(), images);
        let mut results = session.subscribe();
        session.schedule(weights, cfg.debounce);
        results
            .changed()
            .await
            .context("blend session closed without a result")?;
        let outcome = results
            .borrow()
            .clone()
            .context("blend session published nothing")?;
        session.teardown();
        outcome.image.context("weighted blend failed")?
    };

    let spec = GradientSpec {
        horizontal: cli.gradient_horizontal,
        vertical: cli.gradient_vertical,
        radial: cli.gradient_radial,
    };
    let composited = if spec.any_enabled() {
        apply_gradient(&content_buf, &blended, &spec).context("gradient compositing failed")?
    } else {
        blended
    };

    let working = composited
        .into_rgba()
        .context("composite failed to encode back to an image")?;
    let restored = normalize::restore(&working, source_w, source_h)?;

    match restored.save(&cli.output) {
        Ok(()) => {
            println!("Saved stylized image to {}", cli.output.display());
            Ok(())
        }
        Err(err) => {
            println!("Could not save stylized image: {err}");
            std::process::exit(1);
        }
    }
}
