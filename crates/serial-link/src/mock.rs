use crate::{Connector, LineSource, LinkError, PortInfo, Result};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

/// Outcome of one scripted `open` call.
#[derive(Clone, Debug)]
pub enum MockOpen {
    Fail(LinkError),
    /// Yield these lines, then report the connection closed.
    Lines(Vec<String>),
    /// Yield these lines, then stay open and idle.
    LinesThenIdle(Vec<String>),
}

/// In-process connector driven by a script. Once the script runs out every
/// open fails with `PortNotFound`.
pub struct MockConnector {
    ports: Vec<PortInfo>,
    script: Mutex<VecDeque<MockOpen>>,
    attempts: Mutex<Vec<(String, u32)>>,
}

impl MockConnector {
    pub fn new(ports: Vec<PortInfo>) -> Self {
        Self {
            ports,
            script: Mutex::new(VecDeque::new()),
            attempts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_script(ports: Vec<PortInfo>, script: Vec<MockOpen>) -> Self {
        Self {
            ports,
            script: Mutex::new(script.into()),
            attempts: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, outcome: MockOpen) {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(outcome);
    }

    /// Every `(path, baud)` passed to `open`, in order.
    pub fn attempts(&self) -> Vec<(String, u32)> {
        self.attempts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Connector for MockConnector {
    fn list(&self) -> Result<Vec<PortInfo>> {
        Ok(self.ports.clone())
    }

    fn open(&self, path: &str, baud_rate: u32) -> Result<Box<dyn LineSource>> {
        self.attempts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((path.to_string(), baud_rate));
        let next = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        match next {
            Some(MockOpen::Fail(e)) => Err(e),
            Some(MockOpen::Lines(lines)) => Ok(Box::new(MockLine::new(path, lines, false))),
            Some(MockOpen::LinesThenIdle(lines)) => {
                Ok(Box::new(MockLine::new(path, lines, true)))
            }
            None => Err(LinkError::PortNotFound(path.to_string())),
        }
    }
}

struct MockLine {
    name: String,
    lines: VecDeque<String>,
    idle: bool,
}

impl MockLine {
    fn new(name: &str, lines: Vec<String>, idle: bool) -> Self {
        Self {
            name: name.to_string(),
            lines: lines.into(),
            idle,
        }
    }
}

impl LineSource for MockLine {
    fn port_name(&self) -> &str {
        &self.name
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        if let Some(line) = self.lines.pop_front() {
            return Ok(Some(line));
        }
        if self.idle {
            // Behave like a read timeout on a quiet port
            thread::sleep(Duration::from_millis(5));
            return Ok(None);
        }
        Err(LinkError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_then_exhausted() -> anyhow::Result<()> {
        let connector = MockConnector::with_script(
            vec![],
            vec![
                MockOpen::Fail(LinkError::PortBusy("/dev/mock".into())),
                MockOpen::Lines(vec!["one".into()]),
            ],
        );

        assert!(matches!(
            connector.open("/dev/mock", 9600),
            Err(LinkError::PortBusy(_))
        ));

        let mut line = connector.open("/dev/mock", 9600)?;
        assert_eq!(line.port_name(), "/dev/mock");
        assert_eq!(line.read_line()?, Some("one".to_string()));
        assert_eq!(line.read_line(), Err(LinkError::Closed));

        assert!(matches!(
            connector.open("/dev/mock", 9600),
            Err(LinkError::PortNotFound(_))
        ));
        assert_eq!(connector.attempts().len(), 3);
        Ok(())
    }
}
