//! Line protocol spoken with the servo controller.
//!
//! Inbound, one event per line:
//!
//! | line            | event                     |
//! |-----------------|---------------------------|
//! | `b10` / `b11`   | beam 1 clear / broken     |
//! | `b20` / `b21`   | beam 2 clear / broken     |
//! | `STOP2` / `GO2` | limit 1 pressed / released|
//! | `STOP6` / `GO6` | limit 2 pressed / released|
//! | `HT <int>`      | raw height sample         |
//!
//! Outbound: `SET <servo> FWD|REV|STOP [<ms>]`, `ROTATE <servo> <deg> FWD|REV`,
//! `POS <servo> <setpoint>`. Anything else inbound is ignored.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryEvent {
    Beam1 { broken: bool },
    Beam2 { broken: bool },
    Limit1 { pressed: bool },
    Limit2 { pressed: bool },
    Height { raw: i32 },
}

/// Decode one inbound line; unrecognised lines yield `None`.
pub fn parse_line(line: &str) -> Option<TelemetryEvent> {
    let line = line.trim();
    let ev = match line {
        "b10" => TelemetryEvent::Beam1 { broken: false },
        "b11" => TelemetryEvent::Beam1 { broken: true },
        "b20" => TelemetryEvent::Beam2 { broken: false },
        "b21" => TelemetryEvent::Beam2 { broken: true },
        "STOP2" => TelemetryEvent::Limit1 { pressed: true },
        "GO2" => TelemetryEvent::Limit1 { pressed: false },
        "STOP6" => TelemetryEvent::Limit2 { pressed: true },
        "GO6" => TelemetryEvent::Limit2 { pressed: false },
        _ => {
            let raw = line.strip_prefix("HT ")?.trim().parse::<i32>().ok()?;
            TelemetryEvent::Height { raw }
        }
    };
    Some(ev)
}

/// Drive direction of conveyors and pushers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Fwd,
    Rev,
    Stop,
}

impl Direction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Direction::Fwd => "FWD",
            Direction::Rev => "REV",
            Direction::Stop => "STOP",
        }
    }
}

impl FromStr for Direction {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FWD" => Ok(Direction::Fwd),
            "REV" => Ok(Direction::Rev),
            "STOP" => Ok(Direction::Stop),
            other => Err(ProtocolError::BadToken(other.to_string())),
        }
    }
}

/// Turntable direction; `Fwd` is clockwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Spin {
    Fwd,
    Rev,
}

impl Spin {
    pub const fn as_str(self) -> &'static str {
        match self {
            Spin::Fwd => "FWD",
            Spin::Rev => "REV",
        }
    }
}

impl FromStr for Spin {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FWD" => Ok(Spin::Fwd),
            "REV" => Ok(Spin::Rev),
            other => Err(ProtocolError::BadToken(other.to_string())),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("empty command")]
    Empty,
    #[error("unknown command '{0}' (expected SET, ROTATE or POS)")]
    UnknownVerb(String),
    #[error("unexpected token '{0}'")]
    BadToken(String),
    #[error("wrong number of arguments for {0}")]
    Arity(&'static str),
    #[error("degrees must be in 0..=360, got {0}")]
    Degrees(u16),
}

/// One outbound command, rendered without its line terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Set {
        servo: u8,
        dir: Direction,
        duration_ms: Option<u64>,
    },
    Rotate {
        servo: u8,
        degrees: u16,
        dir: Spin,
    },
    Pos {
        servo: u8,
        setpoint: u16,
    },
}

impl Command {
    pub const fn servo(&self) -> u8 {
        match *self {
            Command::Set { servo, .. } | Command::Rotate { servo, .. } | Command::Pos { servo, .. } => {
                servo
            }
        }
    }

    /// Parse the outbound grammar (used for manual commands and by simulators).
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let (verb, args) = parts.split_first().ok_or(ProtocolError::Empty)?;
        match *verb {
            "SET" => match args {
                [servo, dir] => Ok(Command::Set {
                    servo: num(servo)?,
                    dir: dir.parse()?,
                    duration_ms: None,
                }),
                [servo, dir, ms] => Ok(Command::Set {
                    servo: num(servo)?,
                    dir: dir.parse()?,
                    duration_ms: Some(num(ms)?),
                }),
                _ => Err(ProtocolError::Arity("SET")),
            },
            "ROTATE" => match args {
                [servo, deg, dir] => {
                    let degrees: u16 = num(deg)?;
                    if degrees > 360 {
                        return Err(ProtocolError::Degrees(degrees));
                    }
                    Ok(Command::Rotate {
                        servo: num(servo)?,
                        degrees,
                        dir: dir.parse()?,
                    })
                }
                _ => Err(ProtocolError::Arity("ROTATE")),
            },
            "POS" => match args {
                [servo, setpoint] => Ok(Command::Pos {
                    servo: num(servo)?,
                    setpoint: num(setpoint)?,
                }),
                _ => Err(ProtocolError::Arity("POS")),
            },
            other => Err(ProtocolError::UnknownVerb(other.to_string())),
        }
    }
}

fn num<T: FromStr>(s: &str) -> Result<T, ProtocolError> {
    s.parse().map_err(|_| ProtocolError::BadToken(s.to_string()))
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Set {
                servo,
                dir,
                duration_ms: Some(ms),
            } => write!(f, "SET {servo} {} {ms}", dir.as_str()),
            Command::Set {
                servo,
                dir,
                duration_ms: None,
            } => write!(f, "SET {servo} {}", dir.as_str()),
            Command::Rotate {
                servo,
                degrees,
                dir,
            } => write!(f, "ROTATE {servo} {degrees} {}", dir.as_str()),
            Command::Pos { servo, setpoint } => write!(f, "POS {servo} {setpoint}"),
        }
    }
}
