use thiserror::Error;

pub type Result<T, E = LinkError> = core::result::Result<T, E>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LinkError {
    #[error("port not found: {0}")]
    PortNotFound(String),
    #[error("port {0} is held by another process")]
    PortBusy(String),
    #[error("I/O error: {0}")]
    Io(String),
    #[error("connection closed")]
    Closed,
    #[error("operation not supported on this backend: {0}")]
    Unsupported(&'static str),
}

impl LinkError {
    pub fn is_busy(&self) -> bool {
        matches!(self, LinkError::PortBusy(_))
    }

    /// Classify an open failure from its OS message.
    pub fn open_failure(path: &str, message: &str) -> Self {
        if looks_busy(message) {
            LinkError::PortBusy(path.to_string())
        } else {
            LinkError::Io(format!("{path}: {message}"))
        }
    }
}

// EBUSY on unix, ERROR_ACCESS_DENIED on windows when another handle is open
fn looks_busy(message: &str) -> bool {
    let m = message.to_ascii_lowercase();
    m.contains("busy") || m.contains("access is denied") || m.contains("in use")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_classification() {
        let e = LinkError::open_failure("/dev/ttyUSB0", "Device or resource busy");
        assert_eq!(e, LinkError::PortBusy("/dev/ttyUSB0".to_string()));
        assert!(e.is_busy());

        let e = LinkError::open_failure("COM3", "Access is denied.");
        assert!(e.is_busy());

        let e = LinkError::open_failure("/dev/ttyUSB0", "Permission denied");
        assert!(!e.is_busy());
        assert_eq!(e.to_string(), "I/O error: /dev/ttyUSB0: Permission denied");
    }
}
