//! Serial transport to the RGA head over the `serialport` crate.

use std::io::{Read, Write};
use std::time::Duration;

use rgams_traits::{BoxError, SerialLink};
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, SerialPortType};
use tracing::{debug, info};

use crate::error::{HwError, Result};
use crate::{BAUD_RATE, READ_TIMEOUT_MS};

/// Exclusive handle on the instrument's serial port (28800 baud, 8N2).
pub struct SerialPortLink {
    port: Box<dyn SerialPort>,
}

impl SerialPortLink {
    /// Open `path` with the instrument's fixed framing and flush both directions.
    pub fn open(path: &str) -> Result<Self> {
        Self::open_with(path, BAUD_RATE, Duration::from_millis(READ_TIMEOUT_MS))
    }

    pub fn open_with(path: &str, baud: u32, read_timeout: Duration) -> Result<Self> {
        let port = serialport::new(path, baud)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(crate::STOP_BITS)
            .flow_control(FlowControl::None)
            .timeout(read_timeout)
            .open()?;
        port.clear(ClearBuffer::All)?;
        info!(path, baud, "serial port opened");
        Ok(Self { port })
    }
}

impl SerialLink for SerialPortLink {
    fn bytes_available(&mut self) -> std::result::Result<usize, BoxError> {
        let n = self.port.bytes_to_read().map_err(HwError::from)?;
        Ok(n as usize)
    }

    fn write_all(&mut self, data: &[u8]) -> std::result::Result<(), BoxError> {
        self.port.write_all(data).map_err(HwError::from_io)?;
        self.port.flush().map_err(HwError::from_io)?;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> std::result::Result<usize, BoxError> {
        Ok(self.port.read(buf).map_err(HwError::from_io)?)
    }
}

/// A serial port found on the host.
#[derive(Debug, Clone)]
pub struct PortSummary {
    pub name: String,
    pub kind: &'static str,
    pub description: Option<String>,
}

/// Enumerate serial ports, USB adapters first.
pub fn available_ports() -> Result<Vec<PortSummary>> {
    let mut ports: Vec<PortSummary> = serialport::available_ports()?
        .into_iter()
        .map(|p| {
            let (kind, description) = match &p.port_type {
                SerialPortType::UsbPort(info) => ("USB", info.product.clone()),
                SerialPortType::BluetoothPort => ("Bluetooth", None),
                SerialPortType::PciPort => ("PCI", None),
                SerialPortType::Unknown => ("Unknown", None),
            };
            PortSummary {
                name: p.port_name,
                kind,
                description,
            }
        })
        .collect();
    ports.sort_by_key(|p| p.kind != "USB");
    debug!(count = ports.len(), "enumerated serial ports");
    Ok(ports)
}
