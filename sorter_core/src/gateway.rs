//! Typed command surface over the line protocol.
//!
//! The gateway owns the transport. Every request is validated against the
//! actuator table, the travel limit and the pusher 2 interlock before a
//! single byte is written; a refused request changes nothing.

use std::collections::BTreeMap;

use sorter_traits::Transport;
use tracing::{debug, warn};

use crate::actuators::{ActuatorTable, DeviceKind, FlipperPos};
use crate::error::{Rejection, SorterError};
use crate::hw_error::map_hw_error;
use crate::protocol::{Command, Direction, Spin};
use crate::util::stroke_ms;

/// One actuator operation, addressed by logical id.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActuatorRequest {
    Conveyor { id: u8, dir: Direction },
    Pusher { id: u8, dir: Direction, distance_mm: Option<f32> },
    Rotator { id: u8, degrees: f32, dir: Spin },
    Flipper { id: u8, pos: FlipperPos },
}

pub struct ActuatorGateway<T> {
    transport: T,
    table: ActuatorTable,
    pusher_max_mm: f32,
    flipper_setpoints: BTreeMap<u8, u16>,
    pusher_positions: BTreeMap<u8, f32>,
    write_faults: u64,
}

impl<T: Transport> ActuatorGateway<T> {
    pub fn new(transport: T, table: ActuatorTable, pusher_max_mm: f32) -> Self {
        Self {
            transport,
            table,
            pusher_max_mm,
            flipper_setpoints: BTreeMap::new(),
            pusher_positions: BTreeMap::new(),
            write_faults: 0,
        }
    }

    pub fn move_conveyor(&mut self, id: u8, dir: Direction) -> Result<Command, Rejection> {
        let servo = self.table.conveyor(id).ok_or(Rejection::UnknownActuator {
            kind: DeviceKind::Conveyor.as_str(),
            id,
        })?;
        self.write(Command::Set {
            servo,
            dir,
            duration_ms: None,
        })
    }

    pub fn move_pusher(
        &mut self,
        id: u8,
        dir: Direction,
        distance_mm: Option<f32>,
    ) -> Result<Command, Rejection> {
        let spec = self.table.pusher(id).ok_or(Rejection::UnknownActuator {
            kind: DeviceKind::Pusher.as_str(),
            id,
        })?;

        if dir != Direction::Fwd {
            let cmd = self.write(Command::Set {
                servo: spec.servo,
                dir,
                duration_ms: None,
            })?;
            self.pusher_positions.insert(id, 0.0);
            return Ok(cmd);
        }

        let distance_mm = distance_mm.ok_or(Rejection::MissingDistance { id })?;
        if !(0.0..=self.pusher_max_mm).contains(&distance_mm) {
            return Err(Rejection::DistanceOutOfRange {
                id,
                distance_mm,
                max_mm: self.pusher_max_mm,
            });
        }
        if id == 2 {
            self.check_interlock()?;
        }

        let cmd = self.write(Command::Set {
            servo: spec.servo,
            dir,
            duration_ms: Some(stroke_ms(distance_mm, spec.mm_per_s)),
        })?;
        *self.pusher_positions.entry(id).or_insert(0.0) += distance_mm;
        Ok(cmd)
    }

    pub fn rotate_rotator(&mut self, id: u8, degrees: f32, dir: Spin) -> Result<Command, Rejection> {
        let servo = self.table.rotator(id).ok_or(Rejection::UnknownActuator {
            kind: DeviceKind::Rotator.as_str(),
            id,
        })?;
        if !(0.0..=360.0).contains(&degrees) {
            return Err(Rejection::AngleOutOfRange { id, degrees });
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let degrees = degrees.round() as u16;
        self.write(Command::Rotate {
            servo,
            degrees,
            dir,
        })
    }

    pub fn move_flipper(&mut self, id: u8, pos: FlipperPos) -> Result<Command, Rejection> {
        let spec = self.table.flipper(id).ok_or(Rejection::UnknownActuator {
            kind: DeviceKind::Flipper.as_str(),
            id,
        })?;
        let setpoint = spec.setpoint(pos);
        let cmd = self.write(Command::Pos {
            servo: spec.servo,
            setpoint,
        })?;
        self.flipper_setpoints.insert(id, setpoint);
        Ok(cmd)
    }

    pub fn dispatch(&mut self, req: &ActuatorRequest) -> Result<Command, Rejection> {
        let res = match *req {
            ActuatorRequest::Conveyor { id, dir } => self.move_conveyor(id, dir),
            ActuatorRequest::Pusher {
                id,
                dir,
                distance_mm,
            } => self.move_pusher(id, dir, distance_mm),
            ActuatorRequest::Rotator { id, degrees, dir } => self.rotate_rotator(id, degrees, dir),
            ActuatorRequest::Flipper { id, pos } => self.move_flipper(id, pos),
        };
        if let Err(ref r) = res {
            warn!(request = ?req, reason = %r, "command rejected");
        }
        res
    }

    /// Translate a raw protocol command into the request it stands for.
    pub fn request_for(&self, cmd: &Command) -> Result<ActuatorRequest, Rejection> {
        let (kind, id) = self
            .table
            .by_servo(cmd.servo())
            .ok_or(Rejection::UnknownServo(cmd.servo()))?;
        match (kind, *cmd) {
            (DeviceKind::Conveyor, Command::Set { dir, .. }) => {
                Ok(ActuatorRequest::Conveyor { id, dir })
            }
            (DeviceKind::Pusher, Command::Set { dir, duration_ms, .. }) => {
                let distance_mm = match (dir, duration_ms, self.table.pusher(id)) {
                    #[allow(clippy::cast_precision_loss)]
                    (Direction::Fwd, Some(ms), Some(p)) => Some(ms as f32 / 1000.0 * p.mm_per_s),
                    _ => None,
                };
                Ok(ActuatorRequest::Pusher {
                    id,
                    dir,
                    distance_mm,
                })
            }
            (DeviceKind::Rotator, Command::Rotate { degrees, dir, .. }) => {
                Ok(ActuatorRequest::Rotator {
                    id,
                    degrees: f32::from(degrees),
                    dir,
                })
            }
            (DeviceKind::Flipper, Command::Pos { setpoint, .. }) => self
                .table
                .flipper(id)
                .and_then(|f| f.position_of(setpoint))
                .map(|pos| ActuatorRequest::Flipper { id, pos })
                .ok_or_else(|| {
                    Rejection::Malformed(format!(
                        "setpoint {setpoint} is not a calibrated position of flipper {id}"
                    ))
                }),
            (kind, cmd) => Err(Rejection::Malformed(format!(
                "'{cmd}' does not apply to a {}",
                kind.as_str()
            ))),
        }
    }

    /// Drain inbound telemetry lines from the transport.
    pub fn poll_lines(&mut self) -> Result<Vec<String>, SorterError> {
        self.transport
            .poll_lines()
            .map_err(|e| map_hw_error(&*e))
    }

    /// Last commanded setpoint of a flipper, if any.
    pub fn flipper_setpoint(&self, id: u8) -> Option<u16> {
        self.flipper_setpoints.get(&id).copied()
    }

    /// Open-loop estimate of how far a pusher has extended.
    pub fn pusher_position_mm(&self, id: u8) -> f32 {
        self.pusher_positions.get(&id).copied().unwrap_or(0.0)
    }

    pub fn write_faults(&self) -> u64 {
        self.write_faults
    }

    pub fn table(&self) -> &ActuatorTable {
        &self.table
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    fn check_interlock(&self) -> Result<(), Rejection> {
        let actual = self.flipper_setpoint(2);
        match self.table.interlock_clear() {
            Some(required) if actual == Some(required) => Ok(()),
            Some(required) => Err(Rejection::Interlock { required, actual }),
            None => Err(Rejection::UnknownActuator {
                kind: DeviceKind::Flipper.as_str(),
                id: 2,
            }),
        }
    }

    fn write(&mut self, cmd: Command) -> Result<Command, Rejection> {
        let line = cmd.to_string();
        match self.transport.send(&line) {
            Ok(()) => {
                debug!(%line, "command sent");
                Ok(cmd)
            }
            Err(e) => {
                self.write_faults += 1;
                let err = map_hw_error(&*e);
                warn!(%line, error = %err, faults = self.write_faults, "transport write failed");
                Err(Rejection::WriteFailed(err.to_string()))
            }
        }
    }
}
