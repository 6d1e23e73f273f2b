//! Static actuator table keyed by `(kind, logical id)`.

use std::collections::BTreeMap;

pub use sorter_config::DeviceKind;

use crate::error::BuildError;

/// Named flipper positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlipperPos {
    Clear,
    Enter,
    Exit,
}

impl FlipperPos {
    pub const fn as_str(self) -> &'static str {
        match self {
            FlipperPos::Clear => "CLEAR",
            FlipperPos::Enter => "ENTER",
            FlipperPos::Exit => "EXIT",
        }
    }
}

impl std::str::FromStr for FlipperPos {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CLEAR" => Ok(FlipperPos::Clear),
            "ENTER" => Ok(FlipperPos::Enter),
            "EXIT" => Ok(FlipperPos::Exit),
            _ => Err(format!("unknown flipper position '{s}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PusherSpec {
    pub servo: u8,
    pub mm_per_s: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlipperSpec {
    pub servo: u8,
    pub clear: u16,
    pub enter: u16,
    pub exit: u16,
}

impl FlipperSpec {
    pub const fn setpoint(&self, pos: FlipperPos) -> u16 {
        match pos {
            FlipperPos::Clear => self.clear,
            FlipperPos::Enter => self.enter,
            FlipperPos::Exit => self.exit,
        }
    }

    pub fn position_of(&self, setpoint: u16) -> Option<FlipperPos> {
        [FlipperPos::Clear, FlipperPos::Enter, FlipperPos::Exit]
            .into_iter()
            .find(|p| self.setpoint(*p) == setpoint)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActuatorTable {
    pub(crate) conveyors: BTreeMap<u8, u8>,
    pub(crate) pushers: BTreeMap<u8, PusherSpec>,
    pub(crate) rotators: BTreeMap<u8, u8>,
    pub(crate) flippers: BTreeMap<u8, FlipperSpec>,
}

impl ActuatorTable {
    /// The cell's stock wiring: conveyors on 0/5, pushers on 2/6,
    /// turntables on 1/7, flippers on 3/4.
    pub fn stock(pusher1_mm_per_s: f32, pusher2_mm_per_s: f32) -> Self {
        Self::default()
            .with_conveyor(1, 0)
            .with_conveyor(2, 5)
            .with_pusher(1, PusherSpec { servo: 2, mm_per_s: pusher1_mm_per_s })
            .with_pusher(2, PusherSpec { servo: 6, mm_per_s: pusher2_mm_per_s })
            .with_rotator(1, 1)
            .with_rotator(2, 7)
            .with_flipper(1, FlipperSpec { servo: 3, clear: 0, enter: 110, exit: 185 })
            .with_flipper(2, FlipperSpec { servo: 4, clear: 200, enter: 10, exit: 100 })
    }

    pub fn with_conveyor(mut self, id: u8, servo: u8) -> Self {
        self.conveyors.insert(id, servo);
        self
    }
    pub fn with_pusher(mut self, id: u8, spec: PusherSpec) -> Self {
        self.pushers.insert(id, spec);
        self
    }
    pub fn with_rotator(mut self, id: u8, servo: u8) -> Self {
        self.rotators.insert(id, servo);
        self
    }
    pub fn with_flipper(mut self, id: u8, spec: FlipperSpec) -> Self {
        self.flippers.insert(id, spec);
        self
    }

    pub fn conveyor(&self, id: u8) -> Option<u8> {
        self.conveyors.get(&id).copied()
    }
    pub fn pusher(&self, id: u8) -> Option<PusherSpec> {
        self.pushers.get(&id).copied()
    }
    pub fn rotator(&self, id: u8) -> Option<u8> {
        self.rotators.get(&id).copied()
    }
    pub fn flipper(&self, id: u8) -> Option<FlipperSpec> {
        self.flippers.get(&id).copied()
    }

    /// Reverse lookup from a servo channel to its `(kind, id)`.
    pub fn by_servo(&self, servo: u8) -> Option<(DeviceKind, u8)> {
        let hit = |kind, m: &BTreeMap<u8, u8>| {
            m.iter().find(|(_, s)| **s == servo).map(|(id, _)| (kind, *id))
        };
        hit(DeviceKind::Conveyor, &self.conveyors)
            .or_else(|| hit(DeviceKind::Rotator, &self.rotators))
            .or_else(|| {
                self.pushers
                    .iter()
                    .find(|(_, p)| p.servo == servo)
                    .map(|(id, _)| (DeviceKind::Pusher, *id))
            })
            .or_else(|| {
                self.flippers
                    .iter()
                    .find(|(_, f)| f.servo == servo)
                    .map(|(id, _)| (DeviceKind::Flipper, *id))
            })
    }

    /// Flipper 2's clear setpoint, the precondition for pusher 2 forward moves.
    pub fn interlock_clear(&self) -> Option<u16> {
        self.flipper(2).map(|f| f.clear)
    }

    /// Check that every device the orientation sequence drives is wired.
    pub fn ensure_complete(&self) -> Result<(), BuildError> {
        let ok = [1, 2].iter().all(|id| {
            self.conveyors.contains_key(id)
                && self.pushers.contains_key(id)
                && self.rotators.contains_key(id)
                && self.flippers.contains_key(id)
        });
        if ok {
            Ok(())
        } else {
            Err(BuildError::InvalidConfig(
                "actuator table must define conveyor, pusher, rotator and flipper 1 and 2",
            ))
        }
    }
}
