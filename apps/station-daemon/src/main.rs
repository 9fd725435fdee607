use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use serial_link::{resolve_port, Connector, MockConnector, MockOpen, PortChoice, PortInfo};
use station_core::{
    spawn_persist_worker, Broadcaster, Ingestor, JsonlStore, MemoryStore, MetricsHub,
    ReadingStore, StationConfig, SubscriptionServer, Supervisor, DEFAULT_BAUD_RATE,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const PERSIST_QUEUE: usize = 1024;

#[derive(Parser, Debug)]
#[command(
    name = "station-daemon",
    version,
    about = "SEN0186 weather station daemon",
    disable_help_subcommand = true
)]
struct Cli {
    /// Use the scripted mock serial backend instead of hardware
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    mock: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ingest from the station and serve the event stream
    Run {
        /// JSON config file; flags below override it
        #[arg(long)]
        config: Option<PathBuf>,
        /// Serial port override (skips discovery)
        #[arg(long)]
        port: Option<String>,
        #[arg(long)]
        baud: Option<u32>,
        /// Address for the HTTP endpoint
        #[arg(long)]
        listen: Option<String>,
        /// JSON-lines history file
        #[arg(long)]
        data: Option<PathBuf>,
        /// Keep history in memory only
        #[arg(long, action = ArgAction::SetTrue)]
        memory: bool,
    },
    /// List serial ports and show which one would be used
    Ports {
        #[arg(long)]
        port: Option<String>,
    },
    /// Decode one packet line and print it as JSON
    Decode { line: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            port,
            baud,
            listen,
            data,
            memory,
        } => {
            let mut station = match config {
                Some(path) => StationConfig::load(&path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => StationConfig::default(),
            };
            if port.is_some() {
                station.serial_port = port;
            }
            if baud.is_some() {
                station.baud_rate = baud;
            }
            if let Some(addr) = listen {
                station.listen_addr = addr;
            }
            if let Some(path) = data {
                station.data_path = path;
            }
            station.validate()?;
            run(station, connector(cli.mock)?, memory).await
        }
        Commands::Ports { port } => {
            let connector = connector(cli.mock)?;
            let ports = connector.list()?;
            if ports.is_empty() {
                println!("no serial ports found");
            }
            for p in &ports {
                println!("{}", p);
            }
            match resolve_port(port.as_deref(), connector.as_ref()) {
                PortChoice::Override(p) => println!("selected: {} (override)", p),
                PortChoice::Discovered(p) => println!("selected: {} (discovered)", p),
                PortChoice::Fallback(p) => println!("selected: {} (fallback)", p),
            }
            Ok(())
        }
        Commands::Decode { line } => {
            let reading = weather_packet::decode(&line)
                .map_err(|e| anyhow::anyhow!("rejected: {}", e))?;
            println!("{}", serde_json::to_string_pretty(&reading)?);
            Ok(())
        }
    }
}

async fn run(config: StationConfig, connector: Arc<dyn Connector>, memory: bool) -> Result<()> {
    info!(
        "station daemon starting (port: {}, baud: {})",
        config.serial_port.as_deref().unwrap_or("auto"),
        config.baud_rate.unwrap_or(DEFAULT_BAUD_RATE)
    );

    let metrics = MetricsHub::new()?;
    let broadcaster = Arc::new(Broadcaster::with_metrics(&metrics));

    let store: Arc<dyn ReadingStore> = if memory {
        info!("keeping readings in memory");
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(JsonlStore::open(&config.data_path).await?)
    };
    let (persist, persist_task) =
        spawn_persist_worker(store, config.retention(), metrics.clone(), PERSIST_QUEUE);

    let ingestor = Ingestor::new(broadcaster.clone(), persist, metrics.clone());
    let supervisor = Supervisor::new(connector, config.supervisor(), metrics.clone());
    let server = Arc::new(SubscriptionServer::new(
        broadcaster,
        supervisor.subscribe_status(),
        metrics,
        config.endpoint(),
    ));

    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;

    tokio::select! {
        res = supervisor.run(ingestor) => res?,
        res = server.serve(listener) => {
            if let Err(e) = res {
                error!("endpoint stopped: {}", e);
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => info!("shutdown requested"),
    }

    // the ingestor went with the supervisor future; let queued writes land
    if tokio::time::timeout(Duration::from_secs(5), persist_task)
        .await
        .is_err()
    {
        warn!("persistence worker did not drain in time");
    }
    info!("station daemon stopped");
    Ok(())
}

fn connector(mock: bool) -> Result<Arc<dyn Connector>> {
    if mock {
        return Ok(Arc::new(MockConnector::with_script(
            vec![PortInfo::usb("/dev/ttyUSB0", Some("FTDI"))],
            vec![MockOpen::LinesThenIdle(vec![
                "[RAW] c090s002g007t074r010p010h46b09960*30".to_string(),
                "c135s000g005t073r000p000h45b09960*3A".to_string(),
            ])],
        )));
    }
    serial_connector()
}

#[cfg(feature = "serial")]
fn serial_connector() -> Result<Arc<dyn Connector>> {
    Ok(Arc::new(serial_link::SerialConnector::default()))
}

#[cfg(not(feature = "serial"))]
fn serial_connector() -> Result<Arc<dyn Connector>> {
    anyhow::bail!("built without serial support; pass --mock")
}

fn setup_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
