use crate::{PortInfo, Result};

/// An open connection yielding text lines. Blocking.
pub trait LineSource: Send {
    /// Name of the port this source was opened on.
    fn port_name(&self) -> &str;

    /// Block until one line arrives, terminator removed.
    ///
    /// `Ok(None)` means the read timed out with the link still healthy.
    /// Any `Err` ends the connection.
    fn read_line(&mut self) -> Result<Option<String>>;
}

/// Lists ports and opens line sources on them.
pub trait Connector: Send + Sync {
    /// Attempt to list serial devices visible to this backend.
    fn list(&self) -> Result<Vec<PortInfo>>;

    /// Open `path` at `baud_rate`.
    fn open(&self, path: &str, baud_rate: u32) -> Result<Box<dyn LineSource>>;
}
