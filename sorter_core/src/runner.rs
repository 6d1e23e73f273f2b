//! The tick loop that ties sensors, matching, planning and actuation together.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use sorter_traits::clock::Clock;
use sorter_traits::{Catalog, DetectedObject, Transport};
use tracing::{debug, error, info, trace, warn};

use crate::actuators::FlipperPos;
use crate::detection::DetectionSampler;
use crate::error::{Rejection, SorterError};
use crate::gateway::{ActuatorGateway, ActuatorRequest};
use crate::height::HeightBuffer;
use crate::mailbox::{Mailbox, Publisher};
use crate::matcher::{MatchResult, Matcher};
use crate::planner::{Planner, PlannerAction, PlannerState, TickInput, Transition};
use crate::protocol::{Command, Direction, parse_line};
use crate::sensors::SensorState;
use crate::status::{RunSummary, TickReport};

/// Requests that put the cell in a safe, known position at startup.
pub const HOME_SEQUENCE: [ActuatorRequest; 3] = [
    ActuatorRequest::Flipper {
        id: 1,
        pos: FlipperPos::Clear,
    },
    ActuatorRequest::Flipper {
        id: 2,
        pos: FlipperPos::Clear,
    },
    ActuatorRequest::Conveyor {
        id: 2,
        dir: Direction::Stop,
    },
];

/// Requests issued on shutdown, whatever the planner was doing.
pub const DRAIN_SEQUENCE: [ActuatorRequest; 6] = [
    ActuatorRequest::Conveyor {
        id: 1,
        dir: Direction::Stop,
    },
    ActuatorRequest::Conveyor {
        id: 2,
        dir: Direction::Stop,
    },
    ActuatorRequest::Pusher {
        id: 1,
        dir: Direction::Rev,
        distance_mm: None,
    },
    ActuatorRequest::Pusher {
        id: 2,
        dir: Direction::Rev,
        distance_mm: None,
    },
    ActuatorRequest::Flipper {
        id: 1,
        pos: FlipperPos::Clear,
    },
    ActuatorRequest::Flipper {
        id: 2,
        pos: FlipperPos::Clear,
    },
];

/// A transition whose requests were only partly written.
#[derive(Debug)]
pub(crate) struct Stalled {
    transition: Transition,
    /// Requests already on the wire; never re-sent.
    sent: usize,
}

/// A fully wired work cell.
pub struct Cell {
    pub(crate) gateway: ActuatorGateway<Box<dyn Transport>>,
    pub(crate) catalog: Box<dyn Catalog>,
    pub(crate) matcher: Matcher,
    pub(crate) planner: Planner,
    pub(crate) sensors: SensorState,
    pub(crate) height: HeightBuffer,
    pub(crate) detections: Mailbox<DetectedObject>,
    pub(crate) sampler: Option<DetectionSampler>,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) tick_period: Duration,
    pub(crate) ticks: u64,
    pub(crate) processed: u64,
    pub(crate) catalog_faults: u64,
    pub(crate) stalled: Option<Stalled>,
}

impl core::fmt::Debug for Cell {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Cell")
            .field("state", &self.planner.state())
            .field("sensors", &self.sensors)
            .field("ticks", &self.ticks)
            .field("processed", &self.processed)
            .finish_non_exhaustive()
    }
}

fn rejection_to_error(r: Rejection) -> SorterError {
    match r {
        Rejection::WriteFailed(s) => SorterError::Transport(s),
        other => SorterError::State(other.to_string()),
    }
}

impl Cell {
    /// Put flippers in their clear positions and stop conveyor 2.
    ///
    /// If a step fails the drain sequence is issued before the error is returned.
    pub fn home(&mut self) -> Result<(), SorterError> {
        for req in &HOME_SEQUENCE {
            if let Err(r) = self.gateway.dispatch(req) {
                error!(request = ?req, reason = %r, "homing failed, draining");
                self.shutdown();
                return Err(rejection_to_error(r));
            }
        }
        info!("cell homed");
        Ok(())
    }

    /// One control cycle.
    pub fn tick(&mut self) -> TickReport {
        let from = self.planner.state();
        let mut report = TickReport {
            from,
            state: from,
            events: 0,
            commands: 0,
            rejected: None,
            processed: None,
        };
        self.ticks += 1;

        match self.gateway.poll_lines() {
            Ok(lines) => {
                for line in lines {
                    match parse_line(&line) {
                        Some(ev) => {
                            debug!(?ev, "telemetry");
                            self.sensors.apply(ev, &mut self.height);
                            report.events += 1;
                        }
                        None => trace!(%line, "telemetry line skipped"),
                    }
                }
            }
            Err(e) => warn!(error = %e, "telemetry poll failed"),
        }

        let (transition, already_sent) = match self.stalled.take() {
            Some(Stalled { transition, sent }) => {
                debug!(state = %from, sent, "resuming partly written transition");
                (transition, sent)
            }
            None => (self.plan_next(), 0),
        };

        let mut sent = already_sent;
        let mut rejected = None;
        for req in transition.requests().skip(already_sent) {
            match self.gateway.dispatch(req) {
                Ok(_) => {
                    report.commands += 1;
                    sent += 1;
                }
                Err(r) => {
                    rejected = Some(r);
                    break;
                }
            }
        }
        if let Some(r) = rejected {
            if sent > 0 {
                self.stalled = Some(Stalled { transition, sent });
            }
            report.rejected = Some(r);
            return report;
        }

        for action in &transition.actions {
            if let PlannerAction::MarkProcessed(id) = action {
                match self.matcher.mark_processed(self.catalog.as_mut(), id) {
                    Ok(()) => {
                        self.processed += 1;
                        report.processed = Some(id.clone());
                    }
                    Err(e) => {
                        self.catalog_faults += 1;
                        error!(target_id = %id, error = %e, "could not mark target processed");
                    }
                }
            }
        }

        self.planner.apply(transition);
        report.state = self.planner.state();
        report
    }

    /// Match any fresh detection and plan the next transition without committing it.
    fn plan_next(&mut self) -> Transition {
        let detected = self
            .detections
            .take()
            .map(|d| d.with_height(self.sensors.height_mm));
        let matched: Option<MatchResult> = match detected {
            Some(obj) if self.planner.wants_target() && self.sensors.height_mm.is_some() => {
                match self.matcher.find(self.catalog.as_mut(), &obj) {
                    Ok(r) => Some(r),
                    Err(e) => {
                        self.catalog_faults += 1;
                        warn!(error = %e, "catalog lookup failed");
                        None
                    }
                }
            }
            _ => None,
        };

        self.planner.plan(&TickInput {
            detected,
            matched: matched.as_ref(),
            sensors: &self.sensors,
            now: self.clock.now(),
        })
    }

    /// Leave the hardware safe: stop conveyors, retract pushers, clear flippers.
    ///
    /// Every step is attempted even if an earlier one fails. Returns how many
    /// commands were written.
    pub fn shutdown(&mut self) -> usize {
        let mut sent = 0;
        for req in &DRAIN_SEQUENCE {
            if self.gateway.dispatch(req).is_ok() {
                sent += 1;
            }
        }
        if sent < DRAIN_SEQUENCE.len() {
            error!(sent, expected = DRAIN_SEQUENCE.len(), "drain sequence incomplete");
        } else {
            info!(state = %self.planner.state(), "drain sequence sent");
        }
        self.stalled = None;
        self.planner.reset();
        sent
    }

    /// Tick until `stop` is raised or `max_ticks` ticks have run (0 = unbounded),
    /// then issue the drain sequence.
    pub fn run(&mut self, stop: &AtomicBool, max_ticks: u64) -> RunSummary {
        let start_ticks = self.ticks;
        info!(tick_ms = self.tick_period.as_millis(), max_ticks, "cell running");
        while !stop.load(Ordering::Relaxed)
            && (max_ticks == 0 || self.ticks - start_ticks < max_ticks)
        {
            let started = self.clock.now();
            self.tick();
            let spent = self.clock.now().saturating_duration_since(started);
            self.clock.sleep(self.tick_period.saturating_sub(spent));
        }
        let final_state = self.planner.state();
        let drained = self.shutdown();
        RunSummary {
            ticks: self.ticks - start_ticks,
            processed: self.processed,
            final_state,
            drained,
        }
    }

    /// Handle for a detection producer.
    pub fn publisher(&self) -> Publisher<DetectedObject> {
        self.detections.publisher()
    }

    /// Keep a detection thread alive for as long as the cell.
    pub fn attach_sampler(&mut self, sampler: DetectionSampler) {
        self.sampler = Some(sampler);
    }

    pub fn state(&self) -> PlannerState {
        self.planner.state()
    }

    pub fn planner(&self) -> &Planner {
        &self.planner
    }

    pub fn sensors(&self) -> &SensorState {
        &self.sensors
    }

    pub fn gateway(&self) -> &ActuatorGateway<Box<dyn Transport>> {
        &self.gateway
    }

    /// Validate a raw protocol line against the table and interlocks, then send it.
    pub fn send_raw(&mut self, line: &str) -> Result<String, Rejection> {
        let cmd = Command::parse(line).map_err(|e| Rejection::Malformed(e.to_string()))?;
        let req = self.gateway.request_for(&cmd)?;
        self.gateway.dispatch(&req).map(|c| c.to_string())
    }

    /// Detections the attached producer has published.
    pub fn detections_published(&self) -> u64 {
        self.sampler.as_ref().map_or(0, DetectionSampler::published)
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn catalog_faults(&self) -> u64 {
        self.catalog_faults
    }
}
