use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use image::RgbaImage;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::cache::{BlendCache, BufferKey};
use crate::processing::blend::blend_weighted;
use crate::processing::buffer::PixelBuffer;

/// One published blend result. The generation is the schedule call that
/// produced it; `image` is `None` when the engine rejected the request,
/// in which case the previous good preview stays on screen.
#[derive(Debug, Clone)]
pub struct BlendOutcome {
    pub generation: u64,
    pub image: Option<PixelBuffer>,
}

struct Pending {
    handle: JoinHandle<()>,
    started: Arc<AtomicBool>,
}

/// Owns one blending session: the content image, its stylized variants,
/// the decoded-buffer cache, and the debounce timer that coalesces
/// rapid weight changes into at most one engine run per quiescence
/// window.
///
/// Scheduling is last-write-wins: a new `schedule` call aborts a pending
/// timer that has not fired yet, and a generation guard keeps a slower
/// in-flight computation from overwriting a newer published result. An
/// in-flight computation itself is never preempted, only its publish.
pub struct BlendSession {
    content: Arc<RgbaImage>,
    variants: Vec<Arc<RgbaImage>>,
    cache: Arc<BlendCache>,
    publish: watch::Sender<Option<BlendOutcome>>,
    pending: Option<Pending>,
    generation: u64,
    torn_down: bool,
    latest_published: Arc<AtomicU64>,
    engine_runs: Arc<AtomicU64>,
}

impl BlendSession {
    pub fn new(content: RgbaImage, variants: Vec<RgbaImage>) -> Self {
        let (publish, _) = watch::channel(None);
        Self {
            content: Arc::new(content),
            variants: variants.into_iter().map(Arc::new).collect(),
            cache: Arc::new(BlendCache::new()),
            publish,
            pending: None,
            generation: 0,
            torn_down: false,
            latest_published: Arc::new(AtomicU64::new(0)),
            engine_runs: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Observer for published blend outcomes. Starts at `None`.
    pub fn subscribe(&self) -> watch::Receiver<Option<BlendOutcome>> {
        self.publish.subscribe()
    }

    pub fn variant_count(&self) -> usize {
        self.variants.len()
    }

    /// Number of times the blend engine actually ran. Debounced-away
    /// schedules and the all-weights-zero short-circuit do not count.
    pub fn engine_runs(&self) -> u64 {
        self.engine_runs.load(Ordering::SeqCst)
    }

    /// Arms the debounce timer for a recompute with `weights`. Any
    /// previously scheduled-but-unstarted computation is dropped; there
    /// is no queue. A torn-down session ignores further schedules so
    /// its freed buffers stay freed.
    pub fn schedule(&mut self, weights: Vec<f32>, delay: Duration) {
        if self.torn_down {
            debug!("ignoring schedule on torn-down session");
            return;
        }
        self.supersede_pending();
        self.generation += 1;
        let generation = self.generation;

        let started = Arc::new(AtomicBool::new(false));
        let task_started = Arc::clone(&started);
        let content = Arc::clone(&self.content);
        let variants = self.variants.clone();
        let cache = Arc::clone(&self.cache);
        let publish = self.publish.clone();
        let latest = Arc::clone(&self.latest_published);
        let engine_runs = Arc::clone(&self.engine_runs);

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task_started.store(true, Ordering::SeqCst);

            let image = tokio::task::spawn_blocking(move || {
                compute(&content, &variants, &weights, &cache, &engine_runs)
            })
            .await
            .ok()
            .flatten();

            // Publish only if nothing newer got there first.
            let prev = latest.fetch_max(generation, Ordering::SeqCst);
            if prev < generation {
                debug!(generation, ok = image.is_some(), "publishing blend outcome");
                let _ = publish.send(Some(BlendOutcome { generation, image }));
            } else {
                debug!(generation, "suppressing stale blend outcome");
            }
        });

        self.pending = Some(Pending { handle, started });
    }

    /// Drops the pending timer, if it has not fired. An already-started
    /// computation is unaffected.
    pub fn cancel(&mut self) {
        if let Some(pending) = &self.pending {
            if !pending.started.load(Ordering::SeqCst) {
                pending.handle.abort();
                self.pending = None;
            }
        }
    }

    /// Ends the session: cancels the timer, suppresses any in-flight
    /// publish, and frees the decoded buffers. The session is inert
    /// afterwards; `schedule` becomes a no-op.
    pub fn teardown(&mut self) {
        if let Some(pending) = self.pending.take() {
            if !pending.started.load(Ordering::SeqCst) {
                pending.handle.abort();
            }
        }
        self.torn_down = true;
        self.latest_published.store(u64::MAX, Ordering::SeqCst);
        self.cache.clear();
    }

    fn supersede_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            if !pending.started.load(Ordering::SeqCst) {
                pending.handle.abort();
            }
        }
    }
}

impl Drop for BlendSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn compute(
    content: &RgbaImage,
    variants: &[Arc<RgbaImage>],
    weights: &[f32],
    cache: &BlendCache,
    engine_runs: &AtomicU64,
) -> Option<PixelBuffer> {
    let content_buf =
        cache.get_or_insert_with(BufferKey::Content, || PixelBuffer::from_rgba(content))?;

    // All weights at zero is not an error: hand back the unblended
    // content without touching the engine.
    if !weights.is_empty() && weights.len() == variants.len() && weights.iter().all(|w| *w <= 0.0)
    {
        return Some(content_buf.as_ref().clone());
    }

    let mut decoded = Vec::with_capacity(variants.len());
    for (index, variant) in variants.iter().enumerate() {
        let buf = cache
            .get_or_insert_with(BufferKey::Variant(index), || PixelBuffer::from_rgba(variant))?;
        decoded.push(buf);
    }

    engine_runs.fetch_add(1, Ordering::SeqCst);
    let refs: Vec<&PixelBuffer> = decoded.iter().map(|b| b.as_ref()).collect();
    blend_weighted(&content_buf, &refs, weights)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn session(variant_colors: &[[u8; 4]]) -> BlendSession {
        let content = RgbaImage::from_pixel(16, 16, Rgba([128, 128, 128, 255]));
        let variants = variant_colors
            .iter()
            .map(|c| RgbaImage::from_pixel(16, 16, Rgba(*c)))
            .collect();
        BlendSession::new(content, variants)
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_schedules_runs_engine_once_with_last_weights() {
        let mut session = session(&[[255, 0, 0, 255]]);
        let mut rx = session.subscribe();

        for step in 1..=10u32 {
            session.schedule(vec![step as f32 / 20.0], Duration::from_millis(50));
        }

        rx.changed().await.unwrap();
        let outcome = rx.borrow().clone().unwrap();
        assert_eq!(outcome.generation, 10);
        assert_eq!(session.engine_runs(), 1);

        // Last event's weight was 0.5: 128*0.5 + 255*0.5 = 191.5 -> 192.
        let image = outcome.image.unwrap();
        assert_eq!(&image.data()[..4], &[192, 64, 64, 255]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_the_pending_timer() {
        let mut session = session(&[[255, 0, 0, 255]]);
        let rx = session.subscribe();

        session.schedule(vec![0.5], Duration::from_millis(50));
        session.cancel();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!rx.has_changed().unwrap());
        assert_eq!(session.engine_runs(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn all_zero_weights_short_circuit_without_engine_run() {
        let mut session = session(&[[255, 0, 0, 255], [0, 0, 255, 255]]);
        let mut rx = session.subscribe();

        session.schedule(vec![0.0, 0.0], Duration::from_millis(10));
        rx.changed().await.unwrap();

        let outcome = rx.borrow().clone().unwrap();
        let image = outcome.image.unwrap();
        assert_eq!(&image.data()[..4], &[128, 128, 128, 255]);
        assert_eq!(session.engine_runs(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn mismatched_weights_publish_no_image() {
        let mut session = session(&[[255, 0, 0, 255]]);
        let mut rx = session.subscribe();

        session.schedule(vec![0.5, 0.5], Duration::from_millis(10));
        rx.changed().await.unwrap();

        let outcome = rx.borrow().clone().unwrap();
        assert!(outcome.image.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_clears_cache_and_suppresses_late_publishes() {
        let mut session = session(&[[255, 0, 0, 255]]);
        let mut rx = session.subscribe();

        session.schedule(vec![0.5], Duration::from_millis(10));
        rx.changed().await.unwrap();
        session.teardown();

        session.schedule(vec![0.9], Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(200)).await;
        // The post-teardown schedule is a no-op: nothing published and
        // no further engine run, so the freed cache stays freed.
        assert!(!rx.has_changed().unwrap());
        assert_eq!(session.engine_runs(), 1);
    }
}
