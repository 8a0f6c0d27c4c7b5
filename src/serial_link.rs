use serialport::SerialPort;
use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use crate::transport::{Transport, TransportError, DEFAULT_MAX_TRANSFER_UNIT};

/// Settings of the USB FIFO serial link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkConfig {
    pub baud_rate: u32,
    /// Per-transfer timeout for reads and writes
    pub timeout: Duration,
    pub max_transfer_unit: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            baud_rate: 3_000_000,
            timeout: Duration::from_millis(10),
            max_transfer_unit: DEFAULT_MAX_TRANSFER_UNIT,
        }
    }
}

/// [`Transport`] over a serial port
pub struct SerialLink {
    serial: Box<dyn SerialPort>,
    config: LinkConfig,
}

impl std::fmt::Debug for SerialLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialLink")
            .field("port", &self.serial.name())
            .field("config", &self.config)
            .finish()
    }
}

impl SerialLink {
    /// Open `port` and discard anything left in its buffers
    pub fn new(port: &str, config: LinkConfig) -> Result<Self, TransportError> {
        let serial = serialport::new(port, config.baud_rate)
            .timeout(config.timeout)
            .open()?;

        let mut link = Self { serial, config };

        link.flush()?;
        Ok(link)
    }

    /// Flush the serial buffers
    pub fn flush(&mut self) -> Result<(), TransportError> {
        self.serial.clear(serialport::ClearBuffer::All)?;
        Ok(())
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }
}

impl Transport for SerialLink {
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let mut offset = 0;
        let start = Instant::now();

        while offset < data.len() {
            match self.serial.write(&data[offset..]) {
                Ok(0) => {
                    return Err(TransportError::ShortWrite {
                        expected: data.len(),
                        actual: offset,
                    })
                }
                Ok(written) => {
                    log::trace!("Wrote {} bytes", written);
                    offset += written;
                }
                Err(e) if e.kind() == ErrorKind::TimedOut => {
                    if start.elapsed() >= self.config.timeout {
                        return Err(TransportError::ShortWrite {
                            expected: data.len(),
                            actual: offset,
                        });
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
        self.serial.flush()?;
        Ok(())
    }

    fn receive(&mut self, len: usize) -> Result<Vec<u8>, TransportError> {
        let mut response = vec![0u8; len];
        let mut received = 0;
        let start = Instant::now();

        while received < len {
            match self.serial.read(&mut response[received..]) {
                Ok(0) => {}
                Ok(count) => received += count,
                Err(e) if e.kind() == ErrorKind::TimedOut => {}
                Err(e) => return Err(e.into()),
            }

            if received < len && start.elapsed() >= self.config.timeout {
                return Err(if received == 0 {
                    TransportError::Timeout {
                        elapsed_ms: start.elapsed().as_millis(),
                    }
                } else {
                    TransportError::ShortRead {
                        expected: len,
                        actual: received,
                    }
                });
            }
        }

        Ok(response)
    }

    fn max_transfer_unit(&self) -> usize {
        self.config.max_transfer_unit
    }
}
