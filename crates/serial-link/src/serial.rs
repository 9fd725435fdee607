use crate::{Connector, LineBuffer, LineSource, LinkError, PortInfo, PortKind, Result};
use serialport::{DataBits, FlowControl, Parity, SerialPort, SerialPortType, StopBits};
use std::io::{ErrorKind, Read};
use std::time::Duration;

/// Serial ports through the `serialport` crate, 8N1 with no flow control.
pub struct SerialConnector {
    read_timeout: Duration,
}

impl SerialConnector {
    pub fn new(read_timeout: Duration) -> Self {
        Self { read_timeout }
    }
}

impl Default for SerialConnector {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000))
    }
}

impl Connector for SerialConnector {
    fn list(&self) -> Result<Vec<PortInfo>> {
        let ports = serialport::available_ports().map_err(|e| LinkError::Io(e.to_string()))?;
        Ok(ports
            .into_iter()
            .map(|p| PortInfo {
                name: p.port_name,
                kind: match p.port_type {
                    SerialPortType::UsbPort(u) => PortKind::Usb {
                        vid: u.vid,
                        pid: u.pid,
                        manufacturer: u.manufacturer,
                        product: u.product,
                    },
                    _ => PortKind::Other,
                },
            })
            .collect())
    }

    fn open(&self, path: &str, baud_rate: u32) -> Result<Box<dyn LineSource>> {
        let port = serialport::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(self.read_timeout)
            .open()
            .map_err(|e| match e.kind() {
                serialport::ErrorKind::NoDevice => LinkError::PortNotFound(path.to_string()),
                serialport::ErrorKind::Io(ErrorKind::NotFound) => {
                    LinkError::PortNotFound(path.to_string())
                }
                _ => LinkError::open_failure(path, &e.to_string()),
            })?;
        tracing::info!("opened serial port {} at {} baud", path, baud_rate);
        Ok(Box::new(SerialLine {
            name: path.to_string(),
            port,
            buf: LineBuffer::new(),
        }))
    }
}

struct SerialLine {
    name: String,
    port: Box<dyn SerialPort>,
    buf: LineBuffer,
}

impl LineSource for SerialLine {
    fn port_name(&self) -> &str {
        &self.name
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        if let Some(line) = self.buf.next_line() {
            return Ok(Some(line));
        }
        let mut chunk = [0u8; 128];
        match self.port.read(&mut chunk) {
            // A tty that reads zero bytes without a timeout has gone away
            Ok(0) => Err(LinkError::Closed),
            Ok(n) => {
                self.buf.extend(&chunk[..n]);
                Ok(self.buf.next_line())
            }
            Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => {
                Ok(None)
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => Ok(None),
            Err(e) => Err(LinkError::Io(e.to_string())),
        }
    }
}
