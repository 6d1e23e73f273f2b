//! Type-state builder for `Cell`.
//!
//! `build()` only exists once a transport and a catalog are provided.
//! `try_build()` is always available and reports what is missing.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use sorter_traits::clock::{Clock, MonotonicClock};
use sorter_traits::{Catalog, Transport};

use crate::actuators::ActuatorTable;
use crate::config::{HeightCfg, MatchCfg, MotionCfg};
use crate::error::{BuildError, Result};
use crate::gateway::ActuatorGateway;
use crate::height::HeightBuffer;
use crate::mailbox::Mailbox;
use crate::matcher::Matcher;
use crate::planner::{Planner, PlannerCfg};
use crate::runner::Cell;
use crate::sensors::SensorState;

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

/// Builder for `Cell`. Everything is validated on `build()`.
pub struct CellBuilder<T, C> {
    transport: Option<Box<dyn Transport>>,
    catalog: Option<Box<dyn Catalog>>,
    table: Option<ActuatorTable>,
    motion: Option<MotionCfg>,
    height: Option<HeightCfg>,
    matching: Option<MatchCfg>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    tick_period: Option<Duration>,
    _t: PhantomData<T>,
    _c: PhantomData<C>,
}

impl Default for CellBuilder<Missing, Missing> {
    fn default() -> Self {
        Self {
            transport: None,
            catalog: None,
            table: None,
            motion: None,
            height: None,
            matching: None,
            clock: None,
            tick_period: None,
            _t: PhantomData,
            _c: PhantomData,
        }
    }
}

impl Cell {
    /// Start building a Cell.
    pub fn builder() -> CellBuilder<Missing, Missing> {
        CellBuilder::default()
    }
}

fn invalid(msg: &'static str) -> eyre::Report {
    eyre::Report::new(BuildError::InvalidConfig(msg))
}

/// Single place where the assembled pieces are checked.
fn validate(
    table: &ActuatorTable,
    motion: &MotionCfg,
    height: &HeightCfg,
    matching: &MatchCfg,
    tick_period: Duration,
) -> Result<()> {
    table.ensure_complete().map_err(eyre::Report::new)?;
    if table.interlock_clear().is_none() {
        return Err(invalid("flipper 2 must define a clear setpoint"));
    }
    if !(motion.pusher_max_mm > 0.0) {
        return Err(invalid("pusher_max_mm must be > 0"));
    }
    for d in [motion.staging_mm, motion.handoff_mm, motion.full_travel_mm] {
        if !(0.0..=motion.pusher_max_mm).contains(&d) {
            return Err(invalid("pusher strokes must lie within [0, pusher_max_mm]"));
        }
    }
    if motion.clearance_margin_mm.is_sign_negative() {
        return Err(invalid("clearance_margin_mm must be >= 0"));
    }
    if height.window == 0 {
        return Err(invalid("height window must be >= 1"));
    }
    if !(height.max_valid_mm > 0.0) {
        return Err(invalid("height max_valid_mm must be > 0"));
    }
    if !(0.0..1.0).contains(&matching.tolerance) {
        return Err(invalid("match tolerance must be in [0, 1)"));
    }
    if tick_period.is_zero() {
        return Err(invalid("tick period must be > 0"));
    }
    Ok(())
}

impl<T, C> CellBuilder<T, C> {
    /// Fallible build available in any type-state; returns detailed error for missing pieces.
    pub fn try_build(self) -> Result<Cell> {
        let transport = self
            .transport
            .ok_or_else(|| eyre::Report::new(BuildError::MissingTransport))?;
        let catalog = self
            .catalog
            .ok_or_else(|| eyre::Report::new(BuildError::MissingCatalog))?;
        let table = self
            .table
            .ok_or_else(|| eyre::Report::new(BuildError::MissingActuators))?;
        let motion = self.motion.unwrap_or_default();
        let height = self.height.unwrap_or_default();
        let matching = self.matching.unwrap_or_default();
        let tick_period = self.tick_period.unwrap_or(Duration::from_millis(20));

        validate(&table, &motion, &height, &matching, tick_period)?;

        let clock: Arc<dyn Clock + Send + Sync> = match self.clock {
            Some(c) => c,
            None => Arc::new(MonotonicClock::new()),
        };
        let planner_cfg = PlannerCfg::from_table(motion, &table).map_err(eyre::Report::new)?;
        let pusher_max_mm = planner_cfg.motion.pusher_max_mm;

        Ok(Cell {
            gateway: ActuatorGateway::new(transport, table, pusher_max_mm),
            catalog,
            matcher: Matcher::new(matching),
            planner: Planner::new(planner_cfg),
            sensors: SensorState::default(),
            height: HeightBuffer::new(height),
            detections: Mailbox::new(),
            sampler: None,
            clock,
            tick_period,
            ticks: 0,
            processed: 0,
            catalog_faults: 0,
            stalled: None,
        })
    }

    /// Take every runtime setting from a loaded configuration file.
    pub fn with_config(mut self, cfg: &sorter_config::Config) -> Result<Self> {
        let table = ActuatorTable::try_from(cfg.actuators.as_slice()).map_err(eyre::Report::new)?;
        self.table = Some(table);
        self.motion = Some(MotionCfg::from(cfg));
        self.height = Some(HeightCfg::from(&cfg.height));
        self.matching = Some(MatchCfg::from(&cfg.matching));
        self.tick_period = Some(Duration::from_millis(cfg.runner.tick_ms));
        Ok(self)
    }

    pub fn with_actuators(mut self, table: ActuatorTable) -> Self {
        self.table = Some(table);
        self
    }
    pub fn with_motion(mut self, motion: MotionCfg) -> Self {
        self.motion = Some(motion);
        self
    }
    pub fn with_height(mut self, height: HeightCfg) -> Self {
        self.height = Some(height);
        self
    }
    pub fn with_matching(mut self, matching: MatchCfg) -> Self {
        self.matching = Some(matching);
        self
    }
    pub fn with_tick_period(mut self, period: Duration) -> Self {
        self.tick_period = Some(period);
        self
    }
    /// Provide a custom clock; defaults to `MonotonicClock`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }
}

// Setters that advance type-state
impl<C> CellBuilder<Missing, C> {
    pub fn with_transport(self, transport: impl Transport + 'static) -> CellBuilder<Set, C> {
        CellBuilder {
            transport: Some(Box::new(transport)),
            catalog: self.catalog,
            table: self.table,
            motion: self.motion,
            height: self.height,
            matching: self.matching,
            clock: self.clock,
            tick_period: self.tick_period,
            _t: PhantomData,
            _c: PhantomData,
        }
    }
}

impl<T> CellBuilder<T, Missing> {
    pub fn with_catalog(self, catalog: impl Catalog + 'static) -> CellBuilder<T, Set> {
        CellBuilder {
            transport: self.transport,
            catalog: Some(Box::new(catalog)),
            table: self.table,
            motion: self.motion,
            height: self.height,
            matching: self.matching,
            clock: self.clock,
            tick_period: self.tick_period,
            _t: PhantomData,
            _c: PhantomData,
        }
    }
}

impl CellBuilder<Set, Set> {
    /// Validate and build. Only available once transport and catalog are set.
    pub fn build(self) -> Result<Cell> {
        self.try_build()
    }
}
