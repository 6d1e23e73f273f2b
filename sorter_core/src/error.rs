use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SorterError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("could not connect to the actuator controller: {0}")]
    TransportConnect(String),
    #[error("catalog error: {0}")]
    Catalog(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("timeout waiting for the controller")]
    Timeout,
    #[error("invalid state: {0}")]
    State(String),
}

/// A command the gateway refused to send. The caller treats it as "did not happen".
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Rejection {
    #[error("pusher 2 interlock: flipper 2 is at {actual:?}, forward moves need {required}")]
    Interlock { required: u16, actual: Option<u16> },
    #[error("pusher {id}: distance {distance_mm} mm outside [0, {max_mm}]")]
    DistanceOutOfRange { id: u8, distance_mm: f32, max_mm: f32 },
    #[error("pusher {id}: forward move needs a distance")]
    MissingDistance { id: u8 },
    #[error("rotator {id}: {degrees} degrees outside [0, 360]")]
    AngleOutOfRange { id: u8, degrees: f32 },
    #[error("unknown {kind} {id}")]
    UnknownActuator { kind: &'static str, id: u8 },
    #[error("no actuator on servo {0}")]
    UnknownServo(u8),
    #[error("{0}")]
    Malformed(String),
    #[error("transport write failed: {0}")]
    WriteFailed(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing transport")]
    MissingTransport,
    #[error("missing catalog")]
    MissingCatalog,
    #[error("missing actuator table")]
    MissingActuators,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
