use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

#[derive(Clone)]
pub struct StationMetrics {
    pub lines: IntCounter,
    pub rejected: IntCounter,
    pub readings: IntCounter,
    pub persist_failures: IntCounter,
    pub prunes: IntCounter,
    pub open_failures: IntCounter,
    pub subscribers: IntGauge,
    pub link_open: IntGauge,
}

#[derive(Clone)]
pub struct MetricsHub {
    pub registry: Registry,
    pub station: StationMetrics,
}

impl MetricsHub {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let station = StationMetrics {
            lines: IntCounter::new("wx_lines_total", "Lines read from the serial link")?,
            rejected: IntCounter::new(
                "wx_packets_rejected_total",
                "Lines that did not decode as packets",
            )?,
            readings: IntCounter::new("wx_readings_total", "Readings decoded and published")?,
            persist_failures: IntCounter::new(
                "wx_persist_failures_total",
                "Readings that could not be stored",
            )?,
            prunes: IntCounter::new("wx_prunes_total", "Retention prunes executed")?,
            open_failures: IntCounter::new(
                "wx_open_failures_total",
                "Failed attempts to open the serial port",
            )?,
            subscribers: IntGauge::new("wx_subscribers", "Live stream subscribers")?,
            link_open: IntGauge::new("wx_link_open", "1 while the serial link is open")?,
        };
        registry.register(Box::new(station.lines.clone()))?;
        registry.register(Box::new(station.rejected.clone()))?;
        registry.register(Box::new(station.readings.clone()))?;
        registry.register(Box::new(station.persist_failures.clone()))?;
        registry.register(Box::new(station.prunes.clone()))?;
        registry.register(Box::new(station.open_failures.clone()))?;
        registry.register(Box::new(station.subscribers.clone()))?;
        registry.register(Box::new(station.link_open.clone()))?;
        Ok(Self { registry, station })
    }

    pub fn encode_text(&self) -> String {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buf) {
            return format!("error encoding metrics: {e}");
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}
