//! Serial port discovery and monitor capture

use serde::Serialize;
use tokio_serial::{SerialPortInfo, SerialPortType};
use tracing::{debug, warn};

use super::serial_flags;
use crate::error::Result;

/// Known USB-UART bridges found on ESP32 boards: (vid, pid, name)
const BRIDGE_CHIPS: &[(u16, u16, &str)] = &[
    (0x10c4, 0xea60, "CP210x"),
    (0x1a86, 0x7523, "CH340"),
    (0x1a86, 0x55d4, "CH9102"),
    (0x0403, 0x6001, "FT232R"),
    (0x0403, 0x6010, "FT2232"),
    (0x303a, 0x1001, "ESP USB-Serial/JTAG"),
    (0x303a, 0x0002, "ESP USB-OTG CDC"),
];

/// Ports tried when enumeration finds nothing
const COMMON_PORTS: &[&str] = &[
    "COM1",
    "COM2",
    "COM3",
    "COM4",
    "COM5",
    "COM6",
    "/dev/ttyUSB0",
    "/dev/ttyUSB1",
    "/dev/ttyACM0",
    "/dev/ttyACM1",
    "/dev/cu.SLAB_USBtoUART",
    "/dev/cu.usbserial-0001",
];

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct DetectedDevice {
    pub port: String,
    /// USB VID:PID (e.g., "303a:1001")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vid_pid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bridge_chip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PortListing {
    /// "enumerated" or "fallback"
    pub source: &'static str,
    pub ports: Vec<DetectedDevice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

pub fn bridge_chip(vid: u16, pid: u16) -> Option<&'static str> {
    BRIDGE_CHIPS
        .iter()
        .find(|(v, p, _)| *v == vid && *p == pid)
        .map(|(_, _, name)| *name)
}

fn describe(info: SerialPortInfo) -> DetectedDevice {
    match info.port_type {
        SerialPortType::UsbPort(usb) => {
            let description = match (usb.manufacturer, usb.product) {
                (Some(m), Some(p)) => Some(format!("{} {}", m, p)),
                (m, p) => m.or(p),
            };
            DetectedDevice {
                port: info.port_name,
                vid_pid: Some(format!("{:04x}:{:04x}", usb.vid, usb.pid)),
                bridge_chip: bridge_chip(usb.vid, usb.pid).map(str::to_string),
                description,
            }
        }
        SerialPortType::BluetoothPort => DetectedDevice {
            port: info.port_name,
            vid_pid: None,
            bridge_chip: None,
            description: Some("Bluetooth serial".to_string()),
        },
        _ => DetectedDevice {
            port: info.port_name,
            vid_pid: None,
            bridge_chip: None,
            description: None,
        },
    }
}

/// Common port names that exist on this host; on Windows, where COM ports
/// are not files, every candidate is listed
fn fallback_ports() -> Vec<DetectedDevice> {
    COMMON_PORTS
        .iter()
        .filter(|p| cfg!(windows) == p.starts_with("COM"))
        .filter(|p| cfg!(windows) || std::path::Path::new(p).exists())
        .map(|p| DetectedDevice {
            port: p.to_string(),
            vid_pid: None,
            bridge_chip: None,
            description: None,
        })
        .collect()
}

/// Enumerate serial ports, falling back to the common-port list when
/// enumeration fails or comes back empty
pub fn list_ports() -> PortListing {
    match tokio_serial::available_ports() {
        Ok(ports) if !ports.is_empty() => {
            debug!("Enumerated {} serial ports", ports.len());
            let mut ports: Vec<DetectedDevice> = ports.into_iter().map(describe).collect();
            // boards with a known bridge first
            ports.sort_by_key(|d| d.bridge_chip.is_none());
            PortListing {
                source: "enumerated",
                ports,
                note: None,
            }
        }
        Ok(_) => PortListing {
            source: "fallback",
            ports: fallback_ports(),
            note: Some("No serial ports enumerated; listing common port names".to_string()),
        },
        Err(e) => {
            warn!("Serial port enumeration failed: {}", e);
            PortListing {
                source: "fallback",
                ports: fallback_ports(),
                note: Some(format!("Enumeration failed ({}); listing common port names", e)),
            }
        }
    }
}

/// `idf.py [-p port] [-b baud] monitor --no-reset`
pub fn monitor(port: Option<&str>, baud: Option<u32>) -> Result<Vec<String>> {
    let mut args = serial_flags(port, baud)?;
    args.extend(["monitor".to_string(), "--no-reset".to_string()]);
    Ok(args)
}
