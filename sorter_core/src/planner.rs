//! Orientation planner: the tick-driven state machine that walks one object
//! through the cell.
//!
//! `plan` is pure. It reads the current state, the per-object context, the
//! sensors and the clock, and returns the next state together with the
//! actuator requests that state emits. Nothing is sent from here; the runner
//! dispatches the requests and only then calls `apply`, so a refused command
//! leaves the machine where it was and the step is retried next tick.
//!
//! No watchdog: a guard whose sensor event never arrives parks the machine
//! in that state.

use std::fmt;
use std::time::{Duration, Instant};

use sorter_traits::DetectedObject;
use tracing::info;

use crate::actuators::FlipperPos;
use crate::config::MotionCfg;
use crate::gateway::ActuatorRequest;
use crate::matcher::MatchResult;
use crate::protocol::{Direction, Spin};
use crate::sensors::SensorState;
use crate::util::stroke_duration;

const CONVEYOR1: u8 = 1;
const CONVEYOR2: u8 = 2;
const PUSHER1: u8 = 1;
const PUSHER2: u8 = 2;
const ROTATOR1: u8 = 1;
const ROTATOR2: u8 = 2;
const FLIPPER1: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PlannerState {
    #[default]
    Idle,
    Loading,
    Pushing1,
    WaitForPushing1,
    WaitForClearance,
    Rotating,
    WaitForRotation,
    PreparingFlip,
    Pushing2,
    WaitForPushing2,
    WaitForPushing3,
    Flipping,
    WaitForFlip,
    WaitForConveyor2,
    Pushing3,
    WaitForPushing4,
    WaitForClearance2,
    RotatingSecondTable,
    WaitForRotation2,
    WaitForPushing5,
}

impl PlannerState {
    pub const fn as_str(self) -> &'static str {
        match self {
            PlannerState::Idle => "IDLE",
            PlannerState::Loading => "LOADING",
            PlannerState::Pushing1 => "PUSHING1",
            PlannerState::WaitForPushing1 => "WAIT_FOR_PUSHING1",
            PlannerState::WaitForClearance => "WAIT_FOR_CLEARANCE",
            PlannerState::Rotating => "ROTATING",
            PlannerState::WaitForRotation => "WAIT_FOR_ROTATION",
            PlannerState::PreparingFlip => "PREPARING_FLIP",
            PlannerState::Pushing2 => "PUSHING2",
            PlannerState::WaitForPushing2 => "WAIT_FOR_PUSHING2",
            PlannerState::WaitForPushing3 => "WAIT_FOR_PUSHING3",
            PlannerState::Flipping => "FLIPPING",
            PlannerState::WaitForFlip => "WAIT_FOR_FLIP",
            PlannerState::WaitForConveyor2 => "WAIT_FOR_CONVEYOR2",
            PlannerState::Pushing3 => "PUSHING3",
            PlannerState::WaitForPushing4 => "WAIT_FOR_PUSHING4",
            PlannerState::WaitForClearance2 => "WAIT_FOR_CLEARANCE2",
            PlannerState::RotatingSecondTable => "ROTATING_SECOND_TABLE",
            PlannerState::WaitForRotation2 => "WAIT_FOR_ROTATION2",
            PlannerState::WaitForPushing5 => "WAIT_FOR_PUSHING5",
        }
    }

    /// States in which detections and match results are still absorbed.
    pub const fn accepts_measurements(self) -> bool {
        matches!(
            self,
            PlannerState::Pushing1 | PlannerState::WaitForPushing1 | PlannerState::WaitForClearance
        )
    }
}

impl fmt::Display for PlannerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Measured axis of the object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Length,
    Width,
    Height,
}

/// Which measured axis ends up as the target's length, width and height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimAssignment {
    pub length: Axis,
    pub width: Axis,
    pub height: Axis,
}

impl DimAssignment {
    /// Greedy pairing: measured length, then width, each takes the nearest
    /// unclaimed target dimension; measured height takes what is left.
    pub fn resolve(measured: [f32; 3], target: [f32; 3]) -> Self {
        const AXES: [Axis; 3] = [Axis::Length, Axis::Width, Axis::Height];
        let mut owner: [Option<Axis>; 3] = [None; 3];
        for (axis, value) in AXES.into_iter().zip(measured).take(2) {
            let slot = (0..3)
                .filter(|&i| owner[i].is_none())
                .min_by(|&a, &b| (target[a] - value).abs().total_cmp(&(target[b] - value).abs()));
            if let Some(i) = slot {
                owner[i] = Some(axis);
            }
        }
        let pick = |i: usize| owner[i].unwrap_or(Axis::Height);
        Self {
            length: pick(0),
            width: pick(1),
            height: pick(2),
        }
    }

    pub fn need_to_flip(&self) -> bool {
        self.height != Axis::Height
    }

    pub fn need_to_rotate_first_table(&self) -> bool {
        self.height == Axis::Width
    }

    pub fn need_to_rotate_second_table(&self) -> bool {
        if self.need_to_flip() {
            self.height == Axis::Width
        } else {
            self.length != Axis::Length
        }
    }
}

/// Monotonic one-shot timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timer {
    pub start: Instant,
    pub duration: Duration,
}

impl Timer {
    pub const fn new(start: Instant, duration: Duration) -> Self {
        Self { start, duration }
    }

    pub fn elapsed(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.start) >= self.duration
    }
}

/// Per-object planning context; reset on every return to IDLE.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlannerContext {
    pub object: Option<DetectedObject>,
    pub target: Option<MatchResult>,
    pub target_id: Option<String>,
    pub assignment: Option<DimAssignment>,
    pub need_to_flip: bool,
    pub need_to_rotate_first_table: bool,
    pub need_to_rotate_second_table: bool,
    /// Yaw measured at assignment time.
    pub angle_deg: f32,
    /// Pusher 1 travel derived in WAIT_FOR_PUSHING1, reused for pusher 2.
    pub travel_mm: f32,
    pub timer: Option<Timer>,
    pub conveyor1_started: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlannerAction {
    Actuate(ActuatorRequest),
    MarkProcessed(String),
}

/// Everything one tick knows about the world.
#[derive(Debug, Clone, Copy)]
pub struct TickInput<'a> {
    /// New detection since the last tick, if any.
    pub detected: Option<DetectedObject>,
    /// Result of a match attempt made this tick, if any.
    pub matched: Option<&'a MatchResult>,
    pub sensors: &'a SensorState,
    pub now: Instant,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub from: PlannerState,
    pub next: PlannerState,
    pub ctx: PlannerContext,
    pub actions: Vec<PlannerAction>,
}

impl Transition {
    pub fn requests(&self) -> impl Iterator<Item = &ActuatorRequest> {
        self.actions.iter().filter_map(|a| match a {
            PlannerAction::Actuate(r) => Some(r),
            PlannerAction::MarkProcessed(_) => None,
        })
    }
}

/// Speeds and distances the planner needs to turn strokes into timers.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannerCfg {
    pub motion: MotionCfg,
    pub pusher1_mm_per_s: f32,
    pub pusher2_mm_per_s: f32,
}

#[derive(Debug, Clone)]
pub struct Planner {
    cfg: PlannerCfg,
    state: PlannerState,
    ctx: PlannerContext,
}

fn conveyor(id: u8, dir: Direction) -> PlannerAction {
    PlannerAction::Actuate(ActuatorRequest::Conveyor { id, dir })
}

fn pusher_fwd(id: u8, distance_mm: f32) -> PlannerAction {
    PlannerAction::Actuate(ActuatorRequest::Pusher {
        id,
        dir: Direction::Fwd,
        distance_mm: Some(distance_mm),
    })
}

fn pusher_rev(id: u8) -> PlannerAction {
    PlannerAction::Actuate(ActuatorRequest::Pusher {
        id,
        dir: Direction::Rev,
        distance_mm: None,
    })
}

fn flipper(id: u8, pos: FlipperPos) -> PlannerAction {
    PlannerAction::Actuate(ActuatorRequest::Flipper { id, pos })
}

fn rotate(id: u8, degrees: f32, dir: Spin) -> PlannerAction {
    PlannerAction::Actuate(ActuatorRequest::Rotator { id, degrees, dir })
}

fn timer_elapsed(ctx: &PlannerContext, now: Instant) -> bool {
    ctx.timer.is_some_and(|t| t.elapsed(now))
}

impl Planner {
    pub fn new(cfg: PlannerCfg) -> Self {
        Self {
            cfg,
            state: PlannerState::Idle,
            ctx: PlannerContext::default(),
        }
    }

    pub fn state(&self) -> PlannerState {
        self.state
    }

    pub fn context(&self) -> &PlannerContext {
        &self.ctx
    }

    pub fn cfg(&self) -> &PlannerCfg {
        &self.cfg
    }

    /// Whether a match attempt this tick would be used.
    pub fn wants_target(&self) -> bool {
        self.state.accepts_measurements()
    }

    /// Plan one tick without committing it.
    #[allow(clippy::too_many_lines)]
    pub fn plan(&self, input: &TickInput<'_>) -> Transition {
        use PlannerState as S;

        let m = &self.cfg.motion;
        let now = input.now;
        let sensors = input.sensors;
        let mut ctx = self.ctx.clone();
        let mut actions = Vec::new();

        if self.state.accepts_measurements() {
            if let Some(obj) = input.detected {
                ctx.object = Some(obj);
            }
            if let Some(r) = input.matched.filter(|r| r.found()) {
                ctx.target = Some(r.clone());
            }
        }

        let next = match self.state {
            S::Idle => {
                if !ctx.conveyor1_started {
                    actions.push(conveyor(CONVEYOR1, Direction::Fwd));
                    ctx.conveyor1_started = true;
                }
                if sensors.beam2_is_broken() {
                    S::Loading
                } else {
                    S::Idle
                }
            }
            S::Loading => {
                if sensors.beam2_is_clear() {
                    actions.push(conveyor(CONVEYOR1, Direction::Stop));
                    S::Pushing1
                } else {
                    S::Loading
                }
            }
            S::Pushing1 => {
                actions.push(pusher_fwd(PUSHER1, m.staging_mm));
                ctx.timer = Some(Timer::new(
                    now,
                    stroke_duration(m.staging_mm, self.cfg.pusher1_mm_per_s),
                ));
                S::WaitForPushing1
            }
            S::WaitForPushing1 => match (ctx.object, ctx.timer) {
                (Some(obj), Some(push)) if obj.center_y > m.frame_mid_y_px => {
                    let elapsed = now.saturating_duration_since(push.start).as_secs_f32();
                    ctx.travel_mm = (elapsed * self.cfg.pusher1_mm_per_s).clamp(0.0, m.pusher_max_mm);
                    actions.push(pusher_rev(PUSHER1));
                    let clearance = obj.half_diagonal_mm() + m.clearance_margin_mm;
                    ctx.timer = Some(Timer::new(
                        now,
                        stroke_duration(clearance, self.cfg.pusher1_mm_per_s),
                    ));
                    S::WaitForClearance
                }
                _ => S::WaitForPushing1,
            },
            S::WaitForClearance => {
                let ready = timer_elapsed(&ctx, now);
                match (ready, ctx.object, ctx.target.as_ref()) {
                    (true, Some(obj), Some(target)) => {
                        let a = DimAssignment::resolve(
                            [obj.length_mm, obj.width_mm, obj.height_mm],
                            [
                                target.target_length_mm,
                                target.target_width_mm,
                                target.target_height_mm,
                            ],
                        );
                        ctx.need_to_flip = a.need_to_flip();
                        ctx.need_to_rotate_first_table = a.need_to_rotate_first_table();
                        ctx.need_to_rotate_second_table = a.need_to_rotate_second_table();
                        ctx.assignment = Some(a);
                        ctx.angle_deg = obj.angle_deg;
                        ctx.target_id = Some(target.target_id.clone());
                        ctx.object = None;
                        ctx.timer = None;
                        S::Rotating
                    }
                    _ => S::WaitForClearance,
                }
            }
            S::Rotating => {
                let mut angle = ctx.angle_deg;
                if ctx.need_to_rotate_first_table {
                    angle += 90.0;
                }
                if angle.round() != 0.0 {
                    let dir = if angle > 0.0 { Spin::Fwd } else { Spin::Rev };
                    actions.push(rotate(ROTATOR1, angle.abs(), dir));
                }
                ctx.timer = Some(Timer::new(now, m.settle));
                S::WaitForRotation
            }
            S::WaitForRotation => {
                if timer_elapsed(&ctx, now) && sensors.limit1_is_pressed() {
                    S::PreparingFlip
                } else {
                    S::WaitForRotation
                }
            }
            S::PreparingFlip => {
                if ctx.need_to_flip {
                    actions.push(flipper(FLIPPER1, FlipperPos::Enter));
                }
                S::Pushing2
            }
            S::Pushing2 => {
                actions.push(pusher_fwd(PUSHER1, m.handoff_mm));
                actions.push(conveyor(CONVEYOR2, Direction::Fwd));
                ctx.timer = Some(Timer::new(
                    now,
                    stroke_duration(m.handoff_mm, self.cfg.pusher1_mm_per_s),
                ));
                S::WaitForPushing2
            }
            S::WaitForPushing2 => {
                if timer_elapsed(&ctx, now) {
                    actions.push(pusher_rev(PUSHER1));
                    S::WaitForPushing3
                } else {
                    S::WaitForPushing2
                }
            }
            S::WaitForPushing3 => {
                if !sensors.limit1_is_pressed() {
                    S::WaitForPushing3
                } else if ctx.need_to_flip {
                    S::Flipping
                } else {
                    ctx.timer = Some(Timer::new(now, m.conveyor2_direct));
                    S::WaitForConveyor2
                }
            }
            S::Flipping => {
                actions.push(flipper(FLIPPER1, FlipperPos::Exit));
                ctx.timer = Some(Timer::new(now, m.flip_dwell));
                S::WaitForFlip
            }
            S::WaitForFlip => {
                if timer_elapsed(&ctx, now) {
                    actions.push(flipper(FLIPPER1, FlipperPos::Clear));
                    ctx.timer = Some(Timer::new(now, m.conveyor2_after_flip));
                    S::WaitForConveyor2
                } else {
                    S::WaitForFlip
                }
            }
            S::WaitForConveyor2 => {
                if timer_elapsed(&ctx, now) {
                    actions.push(conveyor(CONVEYOR2, Direction::Stop));
                    S::Pushing3
                } else {
                    S::WaitForConveyor2
                }
            }
            S::Pushing3 => {
                let distance = if ctx.need_to_rotate_second_table {
                    ctx.travel_mm
                } else {
                    m.full_travel_mm
                };
                actions.push(pusher_fwd(PUSHER2, distance));
                ctx.timer = Some(Timer::new(
                    now,
                    stroke_duration(distance, self.cfg.pusher2_mm_per_s),
                ));
                if ctx.need_to_rotate_second_table {
                    S::WaitForPushing4
                } else {
                    S::WaitForPushing5
                }
            }
            S::WaitForPushing4 => {
                if timer_elapsed(&ctx, now) {
                    actions.push(pusher_rev(PUSHER2));
                    S::WaitForClearance2
                } else {
                    S::WaitForPushing4
                }
            }
            S::WaitForClearance2 => {
                if sensors.limit2_is_pressed() {
                    S::RotatingSecondTable
                } else {
                    S::WaitForClearance2
                }
            }
            S::RotatingSecondTable => {
                if ctx.need_to_rotate_second_table {
                    actions.push(rotate(ROTATOR2, 90.0, Spin::Fwd));
                }
                ctx.timer = Some(Timer::new(now, m.settle));
                S::WaitForRotation2
            }
            S::WaitForRotation2 => {
                if timer_elapsed(&ctx, now) {
                    actions.push(pusher_fwd(PUSHER2, m.full_travel_mm));
                    ctx.timer = Some(Timer::new(
                        now,
                        stroke_duration(m.full_travel_mm, self.cfg.pusher2_mm_per_s),
                    ));
                    S::WaitForPushing5
                } else {
                    S::WaitForRotation2
                }
            }
            S::WaitForPushing5 => {
                if timer_elapsed(&ctx, now) {
                    actions.push(pusher_rev(PUSHER2));
                    if let Some(id) = ctx.target_id.take() {
                        actions.push(PlannerAction::MarkProcessed(id));
                    }
                    ctx = PlannerContext::default();
                    S::Idle
                } else {
                    S::WaitForPushing5
                }
            }
        };

        Transition {
            from: self.state,
            next,
            ctx,
            actions,
        }
    }

    /// Commit a transition produced by `plan`.
    pub fn apply(&mut self, t: Transition) {
        if t.next != self.state {
            info!(from = %self.state, to = %t.next, "planner transition");
        }
        self.ctx = t.ctx;
        self.state = t.next;
    }

    /// Plan and commit in one step, returning the emitted actions.
    pub fn tick(&mut self, input: &TickInput<'_>) -> Vec<PlannerAction> {
        let t = self.plan(input);
        let actions = t.actions.clone();
        self.apply(t);
        actions
    }

    /// Drop any in-flight object and return to IDLE.
    pub fn reset(&mut self) {
        self.state = PlannerState::Idle;
        self.ctx = PlannerContext::default();
    }
}
