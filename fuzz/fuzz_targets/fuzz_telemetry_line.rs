#![no_main]
use libfuzzer_sys::fuzz_target;
use sorter_core::{Command, parse_line};

fuzz_target!(|data: &str| {
    let _ = parse_line(data);

    // Anything the command grammar accepts renders back to itself.
    if let Ok(cmd) = Command::parse(data) {
        let rendered = cmd.to_string();
        assert_eq!(Command::parse(&rendered).ok(), Some(cmd));
    }
});
