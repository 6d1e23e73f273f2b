//! `From` implementations bridging `sorter_config` types to `sorter_core` types.

use std::time::Duration;

use sorter_config::ActuatorEntry;

use crate::actuators::{ActuatorTable, FlipperSpec, PusherSpec};
use crate::config::{HeightCfg, MatchCfg, MatchMode, MotionCfg};
use crate::error::BuildError;
use crate::planner::PlannerCfg;

// ── HeightCfg ────────────────────────────────────────────────────────────────

impl From<&sorter_config::HeightCfg> for HeightCfg {
    fn from(c: &sorter_config::HeightCfg) -> Self {
        Self {
            scale: c.scale,
            offset: c.offset,
            max_valid_mm: c.max_valid_mm,
            window: c.window,
        }
    }
}

// ── MotionCfg ────────────────────────────────────────────────────────────────

impl From<&sorter_config::Config> for MotionCfg {
    #[allow(clippy::cast_precision_loss)]
    fn from(c: &sorter_config::Config) -> Self {
        let m = &c.motion;
        Self {
            staging_mm: m.staging_mm,
            handoff_mm: m.handoff_mm,
            full_travel_mm: m.full_travel_mm,
            pusher_max_mm: m.pusher_max_distance_mm,
            clearance_margin_mm: m.clearance_margin_mm,
            settle: Duration::from_millis(m.settle_ms),
            flip_dwell: Duration::from_millis(m.flip_dwell_ms),
            conveyor2_direct: Duration::from_millis(m.conveyor2_direct_ms),
            conveyor2_after_flip: Duration::from_millis(m.conveyor2_after_flip_ms),
            frame_mid_y_px: c.camera.frame_height_px as f32 / 2.0,
        }
    }
}

// ── MatchCfg ─────────────────────────────────────────────────────────────────

impl From<sorter_config::MatchMode> for MatchMode {
    fn from(m: sorter_config::MatchMode) -> Self {
        match m {
            sorter_config::MatchMode::Footprint => MatchMode::Footprint,
            sorter_config::MatchMode::SortedDimensions => MatchMode::SortedDimensions,
        }
    }
}

impl From<&sorter_config::MatchingCfg> for MatchCfg {
    fn from(c: &sorter_config::MatchingCfg) -> Self {
        Self {
            tolerance: c.tolerance,
            status_filter: c.status_filter.clone(),
            mode: c.mode.into(),
        }
    }
}

// ── ActuatorTable ────────────────────────────────────────────────────────────

impl TryFrom<&[ActuatorEntry]> for ActuatorTable {
    type Error = BuildError;

    fn try_from(entries: &[ActuatorEntry]) -> Result<Self, Self::Error> {
        let table = entries
            .iter()
            .fold(ActuatorTable::default(), |t, e| match *e {
                ActuatorEntry::Conveyor { id, servo } => t.with_conveyor(id, servo),
                ActuatorEntry::Pusher { id, servo, mm_per_s } => {
                    t.with_pusher(id, PusherSpec { servo, mm_per_s })
                }
                ActuatorEntry::Rotator { id, servo } => t.with_rotator(id, servo),
                ActuatorEntry::Flipper {
                    id,
                    servo,
                    clear,
                    enter,
                    exit,
                } => t.with_flipper(
                    id,
                    FlipperSpec {
                        servo,
                        clear,
                        enter,
                        exit,
                    },
                ),
            });
        table.ensure_complete()?;
        Ok(table)
    }
}

// ── PlannerCfg ───────────────────────────────────────────────────────────────

impl TryFrom<&sorter_config::Config> for PlannerCfg {
    type Error = BuildError;

    fn try_from(c: &sorter_config::Config) -> Result<Self, Self::Error> {
        let table = ActuatorTable::try_from(c.actuators.as_slice())?;
        PlannerCfg::from_table(MotionCfg::from(c), &table)
    }
}

impl PlannerCfg {
    /// Take pusher speeds from the actuator table.
    pub fn from_table(motion: MotionCfg, table: &ActuatorTable) -> Result<Self, BuildError> {
        let speed = |id| {
            table
                .pusher(id)
                .map(|p| p.mm_per_s)
                .ok_or(BuildError::InvalidConfig("pusher 1 and 2 must be configured"))
        };
        Ok(Self {
            motion,
            pusher1_mm_per_s: speed(1)?,
            pusher2_mm_per_s: speed(2)?,
        })
    }
}
