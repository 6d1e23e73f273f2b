//! Runtime configuration for the cell.
//!
//! These are the structs the core actually runs on. They are separate from
//! the TOML schema in `sorter_config`; see `conversions` for the mapping.

use std::time::Duration;

/// Height sensor calibration and smoothing.
#[derive(Debug, Clone, PartialEq)]
pub struct HeightCfg {
    /// calibrated = scale * raw + offset
    pub scale: f32,
    pub offset: f32,
    /// Calibrated samples above this are dropped.
    pub max_valid_mm: f32,
    /// FIFO capacity for the rolling average.
    pub window: usize,
}

impl Default for HeightCfg {
    fn default() -> Self {
        Self {
            scale: -1.305,
            offset: 382.4,
            max_valid_mm: 100.0,
            window: 10,
        }
    }
}

/// Fixed strokes and dwell times of the orientation sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionCfg {
    pub staging_mm: f32,
    pub handoff_mm: f32,
    pub full_travel_mm: f32,
    pub pusher_max_mm: f32,
    pub clearance_margin_mm: f32,
    pub settle: Duration,
    pub flip_dwell: Duration,
    pub conveyor2_direct: Duration,
    pub conveyor2_after_flip: Duration,
    /// Objects whose centre Y passes this line are fully staged.
    pub frame_mid_y_px: f32,
}

impl Default for MotionCfg {
    fn default() -> Self {
        Self {
            staging_mm: 250.0,
            handoff_mm: 250.0,
            full_travel_mm: 250.0,
            pusher_max_mm: 300.0,
            clearance_margin_mm: 5.0,
            settle: Duration::from_millis(500),
            flip_dwell: Duration::from_millis(5000),
            conveyor2_direct: Duration::from_millis(2000),
            conveyor2_after_flip: Duration::from_millis(1000),
            frame_mid_y_px: 540.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MatchMode {
    #[default]
    Footprint,
    SortedDimensions,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchCfg {
    /// Fractional tolerance (0.10 = ±10 %).
    pub tolerance: f32,
    pub status_filter: String,
    pub mode: MatchMode,
}

impl Default for MatchCfg {
    fn default() -> Self {
        Self {
            tolerance: 0.10,
            status_filter: "pending".to_string(),
            mode: MatchMode::Footprint,
        }
    }
}
