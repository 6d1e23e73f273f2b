//! Background detection producer.
//!
//! Spawns a thread that owns the camera and the detection service, and
//! publishes every detected object into a newest-wins mailbox. The thread is
//! stopped and joined when the `DetectionSampler` is dropped.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use sorter_traits::clock::Clock;
use sorter_traits::{Camera, DetectedObject, DetectionService};

use crate::mailbox::Publisher;

pub struct DetectionSampler {
    published: Arc<AtomicU64>,
    capture_errors: Arc<AtomicU64>,
    shutdown: Arc<AtomicBool>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl DetectionSampler {
    pub fn spawn<Cam, Det, C>(
        mut camera: Cam,
        mut detector: Det,
        publisher: Publisher<DetectedObject>,
        hz: u32,
        timeout: Duration,
        clock: C,
    ) -> Self
    where
        Cam: Camera + Send + 'static,
        Det: DetectionService + Send + 'static,
        C: Clock + Send + Sync + 'static,
    {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let published = Arc::new(AtomicU64::new(0));
        let published_clone = published.clone();
        let capture_errors = Arc::new(AtomicU64::new(0));
        let capture_errors_clone = capture_errors.clone();
        let period = Duration::from_millis(crate::util::period_ms(hz));

        let join_handle = std::thread::spawn(move || {
            loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    tracing::debug!("detection thread received shutdown signal");
                    break;
                }
                let started: Instant = clock.now();

                match camera.capture(timeout) {
                    Ok(frame) => {
                        if let Some(obj) = detector.detect(&frame) {
                            let obj = DetectedObject {
                                angle_deg: DetectedObject::normalize_angle(obj.angle_deg),
                                ..obj
                            };
                            publisher.publish(obj);
                            published_clone.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                    Err(e) => {
                        let n = capture_errors_clone.fetch_add(1, Ordering::Relaxed) + 1;
                        tracing::debug!(error = %e, errors = n, "frame capture failed");
                    }
                }

                if shutdown_clone.load(Ordering::Relaxed) {
                    break;
                }
                let spent = clock.now().saturating_duration_since(started);
                clock.sleep(period.saturating_sub(spent));
            }
            tracing::trace!("detection thread exiting cleanly");
        });

        Self {
            published,
            capture_errors,
            shutdown,
            join_handle: Some(join_handle),
        }
    }

    /// Detections published so far.
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    pub fn capture_errors(&self) -> u64 {
        self.capture_errors.load(Ordering::Relaxed)
    }
}

impl Drop for DetectionSampler {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        // The thread exits after its current capture returns (bounded by the capture timeout).
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!("detection thread joined"),
                Err(e) => tracing::warn!(?e, "detection thread panicked during shutdown"),
            }
        }
    }
}
