//! Height sensor calibration and rolling average.

use std::collections::VecDeque;

use crate::config::HeightCfg;
use crate::util::round1;

/// Fixed-capacity FIFO of calibrated height samples.
///
/// Samples above `max_valid_mm` are discarded; negative ones clamp to 0.
/// The average is undefined until the first sample is admitted.
#[derive(Debug, Clone)]
pub struct HeightBuffer {
    cfg: HeightCfg,
    buf: VecDeque<f32>,
    average: Option<f32>,
}

impl HeightBuffer {
    pub fn new(cfg: HeightCfg) -> Self {
        let cap = cfg.window.max(1);
        Self {
            cfg: HeightCfg { window: cap, ..cfg },
            buf: VecDeque::with_capacity(cap),
            average: None,
        }
    }

    /// Calibrate `raw`, admit it if valid and return the current average.
    #[allow(clippy::cast_precision_loss)]
    pub fn update(&mut self, raw: i32) -> Option<f32> {
        let calibrated = self.cfg.scale * raw as f32 + self.cfg.offset;
        if !calibrated.is_finite() || calibrated > self.cfg.max_valid_mm {
            tracing::trace!(raw, calibrated, "height sample out of range; dropped");
            return self.average;
        }
        let v = calibrated.max(0.0);
        if self.buf.len() == self.cfg.window {
            self.buf.pop_front();
        }
        self.buf.push_back(v);
        let sum: f32 = self.buf.iter().sum();
        self.average = Some(round1(sum / self.buf.len() as f32));
        self.average
    }

    pub fn get_latest(&self) -> Option<f32> {
        self.average
    }

    /// Admitted samples, oldest first.
    pub fn samples(&self) -> impl Iterator<Item = f32> + '_ {
        self.buf.iter().copied()
    }

    pub fn capacity(&self) -> usize {
        self.cfg.window
    }

    pub fn max_valid_mm(&self) -> f32 {
        self.cfg.max_valid_mm
    }
}
