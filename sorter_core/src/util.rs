//! Time and distance helpers shared by the gateway, planner and samplers.

use std::time::Duration;

/// Number of milliseconds in one second.
pub const MILLIS_PER_SEC: u64 = 1_000;

/// Compute the period in milliseconds for a given rate in Hz.
/// - Clamps `hz` to at least 1 to avoid division by zero.
/// - Ensures result is at least 1 millisecond.
#[inline]
pub fn period_ms(hz: u32) -> u64 {
    (MILLIS_PER_SEC / u64::from(hz.max(1))).max(1)
}

/// Drive time for an open-loop stroke: `round(distance / speed * 1000)` ms.
///
/// Non-positive speeds and distances yield zero.
#[inline]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn stroke_ms(distance_mm: f32, mm_per_s: f32) -> u64 {
    if !(distance_mm > 0.0 && mm_per_s > 0.0) {
        return 0;
    }
    (f64::from(distance_mm) / f64::from(mm_per_s) * 1000.0).round() as u64
}

#[inline]
pub fn stroke_duration(distance_mm: f32, mm_per_s: f32) -> Duration {
    Duration::from_millis(stroke_ms(distance_mm, mm_per_s))
}

/// Round to one decimal place.
#[inline]
pub fn round1(x: f32) -> f32 {
    (x * 10.0).round() / 10.0
}
