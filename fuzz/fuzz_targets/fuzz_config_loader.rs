#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse and validation errors are fine; panics are not.
    if let Ok(cfg) = toml::from_str::<sorter_config::Config>(data) {
        if cfg.validate().is_ok() {
            // A validated table must always convert.
            let table = sorter_core::ActuatorTable::try_from(cfg.actuators.as_slice());
            assert!(table.is_ok(), "validated actuator table rejected: {table:?}");
            assert!(cfg.interlock_clear_setpoint().is_some());
        }
    }
});
