use core::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PortKind {
    Usb {
        vid: u16,
        pid: u16,
        manufacturer: Option<String>,
        product: Option<String>,
    },
    Other,
}

/// A serial device reported by the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortInfo {
    pub name: String,
    pub kind: PortKind,
}

impl PortInfo {
    pub fn other(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: PortKind::Other,
        }
    }

    pub fn usb(name: &str, manufacturer: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            kind: PortKind::Usb {
                vid: 0,
                pid: 0,
                manufacturer: manufacturer.map(str::to_string),
                product: None,
            },
        }
    }

    pub fn manufacturer(&self) -> Option<&str> {
        match &self.kind {
            PortKind::Usb { manufacturer, .. } => manufacturer.as_deref(),
            PortKind::Other => None,
        }
    }

    pub fn product(&self) -> Option<&str> {
        match &self.kind {
            PortKind::Usb { product, .. } => product.as_deref(),
            PortKind::Other => None,
        }
    }
}

impl fmt::Display for PortInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            PortKind::Usb {
                vid,
                pid,
                manufacturer,
                product,
            } => write!(
                f,
                "{} (usb {vid:04x}:{pid:04x} {} {})",
                self.name,
                manufacturer.as_deref().unwrap_or("-"),
                product.as_deref().unwrap_or("-")
            ),
            PortKind::Other => write!(f, "{}", self.name),
        }
    }
}
