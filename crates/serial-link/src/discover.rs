//! Picks the station's serial port.
//!
//! Resolution order: operator override, then the first discovered port that
//! looks like a USB-serial adapter, then [`FALLBACK_PORT`].

use crate::{Connector, PortInfo};
use tracing::{debug, warn};

/// Case-insensitive substrings of device paths or USB vendor strings that
/// identify the adapters the station bridge ships with.
pub const KNOWN_ADAPTERS: &[&str] = &[
    "usbserial",
    "usbmodem",
    "ttyusb",
    "ttyacm",
    "wchusbserial",
    "slab_usbtouart",
    "ch340",
    "ch341",
    "cp210",
    "ftdi",
    "silicon labs",
    "prolific",
    "pl2303",
    "wch",
    "espressif",
];

#[cfg(target_os = "macos")]
pub const FALLBACK_PORT: &str = "/dev/cu.usbserial";
#[cfg(windows)]
pub const FALLBACK_PORT: &str = "COM3";
#[cfg(not(any(target_os = "macos", windows)))]
pub const FALLBACK_PORT: &str = "/dev/ttyUSB0";

/// Where a resolved port came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PortChoice {
    Override(String),
    Discovered(String),
    Fallback(String),
}

impl PortChoice {
    pub fn path(&self) -> &str {
        match self {
            PortChoice::Override(p) | PortChoice::Discovered(p) | PortChoice::Fallback(p) => p,
        }
    }
}

/// First port matching a known adapter, call-up (`/dev/cu.*`) paths first.
pub fn select_port(ports: &[PortInfo]) -> Option<&PortInfo> {
    let mut ordered: Vec<&PortInfo> = ports.iter().collect();
    // stable sort keeps host order within each group
    ordered.sort_by_key(|p| call_up_rank(&p.name));
    ordered.into_iter().find(|p| is_known_adapter(p))
}

/// Apply the full resolution order against `connector`'s port list.
pub fn resolve_port(port_override: Option<&str>, connector: &dyn Connector) -> PortChoice {
    if let Some(path) = port_override {
        return PortChoice::Override(path.to_string());
    }
    match connector.list() {
        Ok(ports) => {
            if let Some(port) = select_port(&ports) {
                debug!("discovered station port {}", port);
                return PortChoice::Discovered(port.name.clone());
            }
            debug!("no known adapter among {} ports", ports.len());
        }
        Err(e) => warn!("port listing failed: {}", e),
    }
    PortChoice::Fallback(FALLBACK_PORT.to_string())
}

fn call_up_rank(name: &str) -> u8 {
    if name.starts_with("/dev/cu.") {
        0
    } else if name.starts_with("/dev/tty.") {
        2
    } else {
        1
    }
}

fn is_known_adapter(port: &PortInfo) -> bool {
    let name = port.name.to_ascii_lowercase();
    let manufacturer = port.manufacturer().unwrap_or_default().to_ascii_lowercase();
    let product = port.product().unwrap_or_default().to_ascii_lowercase();
    KNOWN_ADAPTERS
        .iter()
        .any(|id| name.contains(id) || manufacturer.contains(id) || product.contains(id))
}

#[cfg(all(test, feature = "mock"))]
mod tests {
    use super::*;
    use crate::MockConnector;

    #[test]
    fn test_call_up_preferred_over_tty() {
        let ports = vec![
            PortInfo::other("/dev/tty.usbserial-1410"),
            PortInfo::other("/dev/cu.usbserial-1410"),
        ];
        let chosen = select_port(&ports).map(|p| p.name.as_str());
        assert_eq!(chosen, Some("/dev/cu.usbserial-1410"));
    }

    #[test]
    fn test_manufacturer_match_is_case_insensitive() {
        let ports = vec![
            PortInfo::other("/dev/ttyS0"),
            PortInfo::usb("/dev/serial7", Some("Silicon Labs")),
        ];
        assert_eq!(
            select_port(&ports).map(|p| p.name.as_str()),
            Some("/dev/serial7")
        );
    }

    #[test]
    fn test_no_known_adapter() {
        let ports = vec![PortInfo::other("/dev/ttyS0"), PortInfo::other("/dev/ttyS1")];
        assert!(select_port(&ports).is_none());
    }

    #[test]
    fn test_resolution_order() {
        let connector = MockConnector::new(vec![PortInfo::other("/dev/ttyACM0")]);
        assert_eq!(
            resolve_port(Some("/dev/custom"), &connector),
            PortChoice::Override("/dev/custom".to_string())
        );
        assert_eq!(
            resolve_port(None, &connector),
            PortChoice::Discovered("/dev/ttyACM0".to_string())
        );

        let empty = MockConnector::new(Vec::new());
        let choice = resolve_port(None, &empty);
        assert_eq!(choice, PortChoice::Fallback(FALLBACK_PORT.to_string()));
        assert_eq!(choice.path(), FALLBACK_PORT);
    }
}
