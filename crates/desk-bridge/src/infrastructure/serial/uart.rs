//! UART access through the `serialport` crate.
//!
//! One device is opened once and cloned into a reading half and a writing
//! half, so the controller pump can read the controller line while the bus
//! writes to it.

use std::io::{self, Read, Write};
use std::time::Duration;

use serialport::SerialPort;
use tracing::debug;

use desk_core::Frame;

use crate::application::ports::{ByteSink, ByteSource};

/// Upper bound on a single blocking read or write.
const IO_TIMEOUT: Duration = Duration::from_millis(100);

/// Opens `path` at `baud`, 8N1, and splits it into reader and writer.
///
/// # Errors
///
/// Returns the driver's error when the device cannot be opened or cloned.
pub fn open_uart(path: &str, baud: u32) -> io::Result<(UartReader, UartWriter)> {
    let port = serialport::new(path, baud)
        .data_bits(serialport::DataBits::Eight)
        .parity(serialport::Parity::None)
        .stop_bits(serialport::StopBits::One)
        .flow_control(serialport::FlowControl::None)
        .timeout(IO_TIMEOUT)
        .open()?;
    let writer = port.try_clone()?;
    debug!(path, baud, "uart opened");
    Ok((UartReader { port }, UartWriter { port: writer }))
}

/// Receiving half of a UART.
pub struct UartReader {
    port: Box<dyn SerialPort>,
}

impl ByteSource for UartReader {
    fn available(&mut self) -> io::Result<usize> {
        Ok(self.port.bytes_to_read()? as usize)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.port.read(buf) {
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            other => other,
        }
    }
}

/// Transmitting half of a UART.
pub struct UartWriter {
    port: Box<dyn SerialPort>,
}

impl ByteSink for UartWriter {
    fn write_frame(&mut self, frame: &Frame) -> io::Result<()> {
        self.port.write_all(frame.as_bytes())?;
        self.port.flush()
    }
}
