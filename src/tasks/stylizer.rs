use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use image::RgbaImage;
use tokio::select;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::events::{StylizeStyle, VariantFailed, VariantReady};
use crate::processing::normalize::style_square;
use crate::stylize::StyleTransfer;

/// Decodes an image to RGBA8 and applies EXIF orientation if available.
/// Orientation handling is best-effort; with no metadata the original
/// orientation is kept.
pub fn decode_rgba8_apply_exif(path: &Path) -> Result<RgbaImage> {
    let img = image::ImageReader::open(path)?
        .with_guessed_format()?
        .decode()?;
    let mut img = img.to_rgba8();

    let orientation: u16 = read_orientation(path).unwrap_or(1);
    match orientation {
        1 => {}
        2 => img = image::imageops::flip_horizontal(&img),
        3 => img = image::imageops::rotate180(&img),
        4 => img = image::imageops::flip_vertical(&img),
        5 => {
            img = image::imageops::rotate90(&img);
            img = image::imageops::flip_horizontal(&img);
        }
        6 => img = image::imageops::rotate90(&img),
        7 => {
            img = image::imageops::rotate270(&img);
            img = image::imageops::flip_horizontal(&img);
        }
        8 => img = image::imageops::rotate270(&img),
        _ => {}
    }

    Ok(img)
}

fn read_orientation(path: &Path) -> Option<u16> {
    let file = File::open(path).ok()?;
    let mut buf = BufReader::new(file);
    let exif = exif::Reader::new().read_from_container(&mut buf).ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    let value = field.value.get_uint(0)? as u16;
    debug!("exif orientation {} for {}", value, path.display());
    Some(value)
}

fn stylize_one(
    backend: &dyn StyleTransfer,
    content: &RgbaImage,
    path: &Path,
    style_edge: u32,
) -> Result<RgbaImage> {
    let style = decode_rgba8_apply_exif(path)?;
    let style = style_square(&style, style_edge)?;
    backend.stylize(content, &style)
}

/// Runs the style batch: each incoming request is decoded, normalized to
/// the backend's square input edge, and stylized against the shared
/// content image on a blocking worker. At most `max_in_flight` inference
/// calls run concurrently. A failed variant is reported and skipped —
/// the rest of the batch keeps going, so the caller ends up with a
/// reduced result set rather than a wholesale failure.
pub async fn run(
    backend: Arc<dyn StyleTransfer>,
    content: Arc<RgbaImage>,
    style_edge: u32,
    mut requests: Receiver<StylizeStyle>,
    ready_tx: Sender<VariantReady>,
    failed_tx: Sender<VariantFailed>,
    cancel: CancellationToken,
    max_in_flight: usize,
) -> Result<()> {
    let mut in_flight = 0usize;
    // Set once the request channel closes; the task exits after the
    // remaining in-flight work drains.
    let mut draining = false;
    let mut tasks: JoinSet<(StylizeStyle, Result<RgbaImage>)> = JoinSet::new();

    loop {
        select! {
            _ = cancel.cancelled() => break,

            maybe_request = requests.recv(), if !draining && in_flight < max_in_flight => {
                let Some(request) = maybe_request else {
                    if in_flight == 0 {
                        break;
                    }
                    draining = true;
                    continue;
                };
                in_flight += 1;
                let backend = Arc::clone(&backend);
                let content = Arc::clone(&content);
                let index = request.index;
                let path = request.path.clone();
                tasks.spawn(async move {
                    let join = tokio::task::spawn_blocking(move || {
                        stylize_one(backend.as_ref(), &content, &request.path, style_edge)
                    })
                    .await;
                    let outcome = match join {
                        Ok(done) => done,
                        Err(join_err) => Err(anyhow::anyhow!("stylize worker died: {join_err}")),
                    };
                    (StylizeStyle { index, path }, outcome)
                });
            }

            Some(join_res) = tasks.join_next() => {
                in_flight = in_flight.saturating_sub(1);
                let finished = draining && in_flight == 0;
                let Ok((request, outcome)) = join_res else {
                    if finished {
                        break;
                    }
                    continue;
                };
                match outcome {
                    Ok(image) => {
                        debug!(
                            index = request.index,
                            path = %request.path.display(),
                            "stylized variant ready"
                        );
                        let ready = VariantReady { index: request.index, image };
                        if ready_tx.send(ready).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        warn!(
                            index = request.index,
                            path = %request.path.display(),
                            "skipping unavailable style variant: {err:#}"
                        );
                        let failed = VariantFailed { index: request.index, path: request.path };
                        let _ = failed_tx.send(failed).await;
                    }
                }
                if finished {
                    break;
                }
            }
        }
    }
    Ok(())
}
