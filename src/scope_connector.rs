use crate::channel_settings::DEFAULT_TRIGGER_LEVEL;
use crate::serial_terminal::ScopeTerminal;
use serialport::{SerialPortInfo, SerialPortType};
use std::time::Duration;

#[cfg(unix)]
pub const DEFAULT_DEVICE: &str = "/dev/ttyUSB0";
#[cfg(windows)]
pub const DEFAULT_DEVICE: &str = "COM1";

pub const DEFAULT_BAUD_RATE: u32 = 115_200;
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(2);

/// Timeout of a single read on the port. The overall response deadline is
/// enforced by the terminal on top of this.
const READ_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Everything needed to bring up a scope connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeConfig {
    pub device: String,
    pub baud_rate: u32,
    pub read_timeout: Duration,
    pub trigger_level: u16,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            device: DEFAULT_DEVICE.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: DEFAULT_READ_TIMEOUT,
            trigger_level: DEFAULT_TRIGGER_LEVEL,
        }
    }
}

impl ScopeConfig {
    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = device.into();
        self
    }

    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    pub fn with_trigger_level(mut self, trigger_level: u16) -> Self {
        self.trigger_level = trigger_level;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeDevice {
    pub name: String,
    pub port: String,
}

impl ScopeDevice {
    pub fn new(name: String, port: String) -> Self {
        Self { name, port }
    }

    fn from_port_info(info: SerialPortInfo) -> Self {
        let name = match info.port_type {
            SerialPortType::UsbPort(usb) => usb
                .product
                .unwrap_or_else(|| format!("USB serial {:04x}:{:04x}", usb.vid, usb.pid)),
            SerialPortType::PciPort => "PCI serial".to_string(),
            SerialPortType::BluetoothPort => "Bluetooth serial".to_string(),
            _ => "Serial port".to_string(),
        };
        Self::new(name, info.port_name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    #[error("Serial port error: {0}")]
    SerialPort(#[from] serialport::Error),

    #[error("Could not open {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },
}

pub struct ScopeConnector;

impl ScopeConnector {
    /// Open the configured serial device.
    pub fn connect(config: &ScopeConfig) -> Result<ScopeTerminal, ConnectorError> {
        log::debug!(
            "Connecting to scope on {} at {} baud",
            config.device,
            config.baud_rate
        );
        let port = serialport::new(&config.device, config.baud_rate)
            .timeout(READ_POLL_INTERVAL)
            .open()
            .map_err(|source| ConnectorError::Open {
                port: config.device.clone(),
                source,
            })?;

        port.clear(serialport::ClearBuffer::All)?;
        Ok(ScopeTerminal::new(port, config.read_timeout))
    }

    /// Serial ports the scope could be attached to, USB adapters first.
    pub fn available_devices() -> Result<Vec<ScopeDevice>, ConnectorError> {
        let mut ports = serialport::available_ports()?;
        sort_usb_first(&mut ports);
        Ok(ports.into_iter().map(ScopeDevice::from_port_info).collect())
    }
}

fn sort_usb_first(ports: &mut [SerialPortInfo]) {
    ports.sort_by_key(|info| !matches!(info.port_type, SerialPortType::UsbPort(_)));
}
