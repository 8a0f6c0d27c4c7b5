use serialport::{SerialPortInfo, SerialPortType};

use crate::logic_analyser::{AnalyserError, IdleLogicAnalyser};
use crate::serial_link::{LinkConfig, SerialLink};
use crate::transport::TransportError;

/// USB product string of the analyser's FIFO bridge
pub const DEFAULT_DEVICE_NAME: &str = "Fast Logic Analyser";

/// FT2232H bridge variants the analyser ships with
const VALID_VENDOR_PRODUCT_IDS: [(u16, u16); 2] = [(0x0403, 0x6010), (0x0403, 0x6014)];

#[derive(Debug, Clone)]
pub struct LaDevice {
    pub name: String,
    pub port: String,
    pub serial_number: Option<String>,
}

impl LaDevice {
    pub fn new(name: String, port: String, serial_number: Option<String>) -> Self {
        Self {
            name,
            port,
            serial_number,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Serial port error: {0}")]
    SerialPort(#[from] serialport::Error),

    #[error("Port {port} is not the analyser you're looking for")]
    InvalidPort { port: String },

    #[error("No analyser {name} found. Please connect an analyser or specify the port manually")]
    DeviceNotFound { name: String },

    #[error("Found {count} analysers named {name}. Please specify the port")]
    AmbiguousDevice { name: String, count: usize },

    #[error("Analyser did not answer the connection probe: {0}")]
    Probe(#[from] AnalyserError),
}

pub struct LaConnector;

impl LaConnector {
    /// Connect to an analyser and probe its version and geometry.
    ///
    /// Without a `port` exactly one matching device must be present.
    pub fn connect(
        name: Option<&str>,
        port: Option<&str>,
        config: LinkConfig,
    ) -> Result<IdleLogicAnalyser<SerialLink>, ConnectorError> {
        let port = if let Some(port) = port {
            log::debug!("Connecting to analyser on port {}", port);
            Self::validate_port(name, port)?;
            port.to_string()
        } else {
            Self::get_device_port(name)?
        };

        let link = SerialLink::new(&port, config)?;
        Ok(IdleLogicAnalyser::probe(link)?)
    }

    /// Validate that a given port belongs to an analyser
    fn validate_port(name: Option<&str>, port: &str) -> Result<(), ConnectorError> {
        let devices = Self::get_available_devices(name)?;

        if !devices.iter().any(|d| d.port == port) {
            return Err(ConnectorError::InvalidPort {
                port: port.to_string(),
            });
        }

        Ok(())
    }

    /// Check whether a serial port is an analyser
    fn validate_device(name: Option<&str>, info: &SerialPortInfo) -> Option<LaDevice> {
        let SerialPortType::UsbPort(usb) = &info.port_type else {
            return None;
        };

        let product = usb.product.clone().unwrap_or_default();
        let is_valid_variant = VALID_VENDOR_PRODUCT_IDS
            .iter()
            .any(|&(vid, pid)| usb.vid == vid && usb.pid == pid);

        // The FT2232H exposes one port per channel; channel A carries the FIFO
        let is_named = product.starts_with(name.unwrap_or(DEFAULT_DEVICE_NAME));
        if !is_named && !(name.is_none() && is_valid_variant && product.is_empty()) {
            return None;
        }

        Some(LaDevice::new(
            product,
            info.port_name.clone(),
            usb.serial_number.clone(),
        ))
    }

    /// Get all available analysers
    pub fn get_available_devices(name: Option<&str>) -> Result<Vec<LaDevice>, ConnectorError> {
        let devices = serialport::available_ports()?
            .iter()
            .filter_map(|info| Self::validate_device(name, info))
            .collect();
        Ok(devices)
    }

    /// Port of the single device named `name`
    fn get_device_port(name: Option<&str>) -> Result<String, ConnectorError> {
        let mut devices = Self::get_available_devices(name)?;
        let name = name.unwrap_or(DEFAULT_DEVICE_NAME);
        log::debug!("Found {} analyser(s) named {}", devices.len(), name);

        match devices.len() {
            0 => Err(ConnectorError::DeviceNotFound {
                name: name.to_string(),
            }),
            1 => Ok(devices.remove(0).port),
            count => Err(ConnectorError::AmbiguousDevice {
                name: name.to_string(),
                count,
            }),
        }
    }
}
