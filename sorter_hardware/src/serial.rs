use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::time::Duration;

use nix::sys::termios::{
    BaudRate, FlushArg, SetArg, SpecialCharacterIndices, cfmakeraw, cfsetspeed, tcflush,
    tcgetattr, tcsetattr,
};
use sorter_traits::{BoxError, Transport};
use tracing::{debug, trace};

use crate::error::{HwError, Result};
use crate::util::LineBuffer;

/// The microcontroller resets when the port opens; give it time to boot.
pub const RESET_DELAY: Duration = Duration::from_secs(2);

fn baud_rate(baud: u32) -> Result<BaudRate> {
    Ok(match baud {
        9600 => BaudRate::B9600,
        19200 => BaudRate::B19200,
        38400 => BaudRate::B38400,
        57600 => BaudRate::B57600,
        115_200 => BaudRate::B115200,
        other => return Err(HwError::Serial(format!("unsupported baud rate {other}"))),
    })
}

fn serial_err(what: &str, e: nix::Error) -> HwError {
    HwError::Serial(format!("{what}: {e}"))
}

/// Raw 8N1 link to the servo controller over a tty.
pub struct SerialTransport {
    file: File,
    lines: LineBuffer,
}

impl SerialTransport {
    /// Open and configure `port`, then wait out the controller reset.
    pub fn open(port: impl AsRef<Path>, baud: u32) -> Result<Self> {
        let port = port.as_ref();
        let speed = baud_rate(baud)?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(nix::libc::O_NOCTTY | nix::libc::O_NONBLOCK)
            .open(port)?;

        let mut tio = tcgetattr(&file).map_err(|e| serial_err("tcgetattr", e))?;
        cfmakeraw(&mut tio);
        cfsetspeed(&mut tio, speed).map_err(|e| serial_err("cfsetspeed", e))?;
        tio.control_chars[SpecialCharacterIndices::VMIN as usize] = 0;
        tio.control_chars[SpecialCharacterIndices::VTIME as usize] = 0;
        tcsetattr(&file, SetArg::TCSANOW, &tio).map_err(|e| serial_err("tcsetattr", e))?;

        debug!(port = %port.display(), baud, "serial port configured; waiting for controller reset");
        std::thread::sleep(RESET_DELAY);
        tcflush(&file, FlushArg::TCIFLUSH).map_err(|e| serial_err("tcflush", e))?;

        Ok(Self {
            file,
            lines: LineBuffer::new(),
        })
    }
}

impl Transport for SerialTransport {
    fn send(&mut self, line: &str) -> std::result::Result<(), BoxError> {
        let framed = format!("{}\r\n", line.trim());
        self.file.write_all(framed.as_bytes()).map_err(HwError::from)?;
        trace!(line = line.trim(), "serial -> controller");
        Ok(())
    }

    fn poll_lines(&mut self) -> std::result::Result<Vec<String>, BoxError> {
        let mut out = Vec::new();
        let mut chunk = [0u8; 256];
        loop {
            match self.file.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => out.extend(self.lines.push(&chunk[..n])),
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(HwError::from(e).into()),
            }
        }
        for l in &out {
            trace!(line = %l, "serial <- controller");
        }
        Ok(out)
    }
}
