//! Maps `Box<dyn Error>` from trait boundaries to typed `SorterError`.
//!
//! Transports and catalogs return `Box<dyn Error + Send + Sync>`; this module
//! turns those into the core's error enum, downcasting
//! `sorter_hardware::HwError` when the `hardware-errors` feature is on.

use crate::error::SorterError;

/// Map a transport-side error to a typed `SorterError`.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> SorterError {
    #[cfg(feature = "hardware-errors")]
    {
        use sorter_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::Timeout => SorterError::Timeout,
                HwError::Catalog(_) | HwError::Sqlite(_) => SorterError::Catalog(hw.to_string()),
                HwError::Serial(_) | HwError::Io(_) => SorterError::Transport(hw.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        SorterError::Timeout
    } else {
        SorterError::Transport(s)
    }
}

/// Same as [`map_hw_error`], but anything not recognised is attributed to the catalog.
pub fn map_catalog_error(e: &(dyn std::error::Error + 'static)) -> SorterError {
    match map_hw_error(e) {
        SorterError::Transport(s) => SorterError::Catalog(s),
        other => other,
    }
}
