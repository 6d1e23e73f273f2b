//! Human-readable error descriptions and structured JSON error formatting.

use sorter_core::error::{BuildError, Rejection, SorterError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingTransport => {
                "What happened: No transport was provided to the cell.\nLikely causes: The controller link failed to open or was not wired into the builder.\nHow to fix: Ensure the serial port (or --sim) is set up and passed via with_transport(...).".to_string()
            }
            BuildError::MissingCatalog => {
                "What happened: No catalog was provided to the cell.\nLikely causes: The catalog backend failed to open or was not wired into the builder.\nHow to fix: Check the [catalog] section and pass the catalog via with_catalog(...).".to_string()
            }
            BuildError::MissingActuators => {
                "What happened: No actuator table was provided to the cell.\nLikely causes: The [[actuators]] entries were not loaded.\nHow to fix: Add the actuator table to the config and build the cell with with_config(...).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun. See etc/sorter_config.toml for a sample."
            ),
        };
    }

    if let Some(se) = err.downcast_ref::<SorterError>() {
        return match se {
            SorterError::Config(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing section, unknown key, or out-of-range value in the TOML.\nHow to fix: Edit the config file, then rerun. See etc/sorter_config.toml for a sample."
            ),
            SorterError::TransportConnect(msg) => format!(
                "What happened: Could not connect to the actuator controller ({msg}).\nLikely causes: Wrong serial.port, controller unplugged, missing permissions on the tty, or a build without the hardware feature.\nHow to fix: Check the cable and serial.port, add your user to the dialout group, or rerun with --sim."
            ),
            SorterError::Catalog(msg) if msg.to_ascii_lowercase().contains("must have headers") => {
                "What happened: Invalid headers in catalog CSV.\nLikely causes: Columns renamed or missing.\nHow to fix: Use the header 'common_id,length,width,height,shape,status'.".to_string()
            }
            SorterError::Catalog(msg) => format!(
                "What happened: The catalog could not be read ({msg}).\nLikely causes: Wrong catalog.path, malformed rows, or a locked database.\nHow to fix: Check the [catalog] section and the file it points to."
            ),
            SorterError::Timeout => {
                "What happened: Timed out waiting for the controller.\nLikely causes: Controller busy or disconnected.\nHow to fix: Check the serial link and rerun.".to_string()
            }
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    if let Some(r) = err.downcast_ref::<Rejection>() {
        return match r {
            Rejection::Interlock { required, actual } => format!(
                "What happened: Pusher 2 forward was refused by the interlock.\nLikely causes: Flipper 2 is at {actual:?}, not its clear setpoint {required}.\nHow to fix: Send flipper 2 to {required} first (e.g. `sorter send \"POS <servo> {required}\"`)."
            ),
            Rejection::Malformed(msg) => format!(
                "What happened: The command line is not valid ({msg}).\nLikely causes: Typo or unsupported verb.\nHow to fix: Use SET <servo> FWD|REV|STOP [ms], POS <servo> <setpoint> or ROTATE <servo> <deg> FWD|REV."
            ),
            other => format!(
                "What happened: Command rejected ({other}).\nLikely causes: The value is outside what the actuator table allows.\nHow to fix: Check the [[actuators]] and [motion] sections for the allowed range."
            ),
        };
    }

    // Generic fallback
    let msg = err.to_string();
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: 2 config, 3 controller connection, 4 catalog, 1 anything else.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if err.downcast_ref::<BuildError>().is_some() {
        return 2;
    }
    match err.downcast_ref::<SorterError>() {
        Some(SorterError::Config(_)) => 2,
        Some(SorterError::TransportConnect(_)) => 3,
        Some(SorterError::Catalog(_)) => 4,
        _ => 1,
    }
}

fn reason_name(err: &eyre::Report) -> &'static str {
    if err.downcast_ref::<BuildError>().is_some() {
        return "Config";
    }
    if err.downcast_ref::<Rejection>().is_some() {
        return "Rejected";
    }
    match err.downcast_ref::<SorterError>() {
        Some(SorterError::Config(_)) => "Config",
        Some(SorterError::TransportConnect(_)) => "TransportConnect",
        Some(SorterError::Catalog(_)) => "Catalog",
        Some(SorterError::Timeout) => "Timeout",
        _ => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({ "reason": reason_name(err), "message": humanize(err) }).to_string()
}
