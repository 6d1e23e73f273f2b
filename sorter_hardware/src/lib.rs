//! Concrete collaborators for the sorting cell: the simulated plant, the
//! catalogs and (with `--features hardware`) the serial link to the servo
//! controller.

pub mod catalog;
pub mod error;
#[cfg(all(feature = "hardware", unix))]
pub mod serial;
pub mod sim;
pub mod util;

pub use catalog::{CatalogRecord, MemoryCatalog, SqliteCatalog};
pub use error::HwError;
#[cfg(all(feature = "hardware", unix))]
pub use serial::SerialTransport;
pub use sim::{SimCamera, SimConfig, SimDetector, SimObject, SimPlant, SimTransport};
