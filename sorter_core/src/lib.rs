#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core sorting-cell logic (hardware-agnostic).
//!
//! This crate drives the work cell: it turns telemetry lines into sensor
//! state, matches camera detections against the catalog, and steps the
//! orientation planner that decides which actuator to move next. All I/O goes
//! through the `sorter_traits` seams (`Transport`, `Catalog`, `Camera`,
//! `DetectionService`).
//!
//! ## Architecture
//!
//! - **Protocol**: telemetry parsing and command encoding (`protocol`)
//! - **Sensors**: beam/limit flags and the smoothed height (`sensors`, `height`)
//! - **Gateway**: the only writer to the controller; enforces the
//!   pusher 2 / flipper 2 interlock and stroke limits (`gateway`)
//! - **Matching**: tolerance-based catalog lookup (`matcher`)
//! - **Planning**: the 20-state orientation sequence (`planner`)
//! - **Runner**: the cooperative tick loop tying it all together (`runner`)
//!
//! Detections arrive through a newest-wins `mailbox`, optionally fed by a
//! background `detection` sampler thread.

pub mod actuators;
pub mod builder;
pub mod config;
pub mod conversions;
pub mod detection;
pub mod error;
pub mod gateway;
pub mod height;
pub mod hw_error;
pub mod mailbox;
pub mod matcher;
pub mod mocks;
pub mod planner;
pub mod protocol;
pub mod runner;
pub mod sensors;
pub mod status;
pub mod util;

pub use actuators::{ActuatorTable, DeviceKind, FlipperPos, FlipperSpec, PusherSpec};
pub use builder::{CellBuilder, Missing, Set};
pub use config::{HeightCfg, MatchCfg, MatchMode, MotionCfg};
pub use detection::DetectionSampler;
pub use error::{BuildError, Rejection, Report, Result, SorterError};
pub use gateway::{ActuatorGateway, ActuatorRequest};
pub use height::HeightBuffer;
pub use mailbox::{Mailbox, Publisher};
pub use matcher::{MatchResult, Matcher, match_object};
pub use planner::{Planner, PlannerAction, PlannerCfg, PlannerState, TickInput, Transition};
pub use protocol::{Command, Direction, Spin, TelemetryEvent, parse_line};
pub use runner::{Cell, DRAIN_SEQUENCE, HOME_SEQUENCE};
pub use sensors::SensorState;
pub use status::{RunSummary, TickReport};
