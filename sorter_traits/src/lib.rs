//! Hardware and collaborator seams for the box-sorting cell.
//!
//! Everything the controller talks to (serial link, catalog, camera, vision)
//! goes through the traits below, so the core stays testable without a rig.

pub mod clock;
pub mod types;

pub use clock::{Clock, MonotonicClock};
pub use types::{DetectedObject, Frame, Shape, TargetSpec, TargetStatus};

/// Boxed error used at every trait boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Line-oriented, fire-and-forget link to the actuator controller.
pub trait Transport {
    /// Write one command line. Implementations append the line terminator.
    fn send(&mut self, line: &str) -> Result<(), BoxError>;
    /// Drain every complete inbound line received since the last poll.
    fn poll_lines(&mut self) -> Result<Vec<String>, BoxError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, line: &str) -> Result<(), BoxError> {
        (**self).send(line)
    }
    fn poll_lines(&mut self) -> Result<Vec<String>, BoxError> {
        (**self).poll_lines()
    }
}

/// Store of target box specifications and their processing status.
pub trait Catalog {
    fn fetch_pending(&mut self, status_filter: &str) -> Result<Vec<TargetSpec>, BoxError>;
    fn mark_processed(&mut self, common_id: &str) -> Result<(), BoxError>;
}

impl<C: Catalog + ?Sized> Catalog for Box<C> {
    fn fetch_pending(&mut self, status_filter: &str) -> Result<Vec<TargetSpec>, BoxError> {
        (**self).fetch_pending(status_filter)
    }
    fn mark_processed(&mut self, common_id: &str) -> Result<(), BoxError> {
        (**self).mark_processed(common_id)
    }
}

/// Raw frame acquisition.
pub trait Camera {
    fn capture(&mut self, timeout: std::time::Duration) -> Result<Frame, BoxError>;
}

/// Frame to footprint: shape, dimensions, centre and yaw of the nearest object.
pub trait DetectionService {
    fn detect(&mut self, frame: &Frame) -> Option<DetectedObject>;
}
