//! Binary entrypoint for the ekey-gateway CLI.
//!
//! Commands:
//! - `run [--udp-port <n>] [--serial-port <path>]` - listen for terminal traffic and
//!   print state updates as JSON lines until Ctrl-C
//! - `init` - create a starter `config.toml`
//! - `decode --protocol <p> (--hex <bytes> | --text <msg>)` - decode one datagram offline
//! - `list-ports` - list serial ports visible to this host
//!
//! See the library crate docs for module-level details: `ekey_gateway::`.
use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};
use log::{error, info, warn};
use tokio::sync::mpsc;

use ekey_gateway::config::Config;
use ekey_gateway::dispatch::{ControlMessage, DeviceRegistry, Dispatcher, StateUpdate};
use ekey_gateway::logutil;
use ekey_gateway::metrics;
use ekey_gateway::protocol::{self, Protocol};
use ekey_gateway::udp::UdpListener;

#[derive(Parser)]
#[command(name = "ekey-gateway")]
#[command(about = "Decoder for ekey fingerprint terminal traffic")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Listen for terminal traffic
    Run {
        /// Override the configured UDP port
        #[arg(long)]
        udp_port: Option<u16>,

        /// Serial converter port (e.g., /dev/ttyUSB0); enables the serial link
        #[arg(long)]
        serial_port: Option<String>,
    },
    /// Write a default configuration file
    Init,
    /// Decode a single datagram and print the result as JSON
    Decode {
        /// Protocol variant: HOME, MULTI, RARE or NET
        #[arg(short, long)]
        protocol: String,

        /// Datagram bytes as hex (whitespace allowed)
        #[arg(long, conflicts_with = "text", required_unless_present = "text")]
        hex: Option<String>,

        /// Datagram as text
        #[arg(long)]
        text: Option<String>,
    },
    /// List serial ports
    ListPorts,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let pre_config = match cli.command {
        Commands::Init => None,
        _ => Config::load(&cli.config).await.ok(),
    };
    init_logging(&pre_config, cli.verbose);

    match cli.command {
        Commands::Run {
            udp_port,
            serial_port,
        } => {
            let mut config = match pre_config {
                Some(config) => config,
                None => Config::load(&cli.config).await?,
            };
            if let Some(port) = udp_port {
                config.udp.port = port;
            }
            if let Some(path) = serial_port {
                config.serial.port = path;
                config.serial.enabled = true;
            }
            info!("Starting ekey-gateway v{}", env!("CARGO_PKG_VERSION"));
            run(config).await?;
        }
        Commands::Init => {
            info!("Initializing new gateway configuration");
            Config::create_default(&cli.config).await?;
            info!("Configuration file created at {}", cli.config);
        }
        Commands::Decode {
            protocol,
            hex: hex_arg,
            text,
        } => {
            let protocol: Protocol = protocol.parse()?;
            let data = match (hex_arg, text) {
                (Some(h), _) => parse_hex(&h)?,
                (None, Some(t)) => t.into_bytes(),
                (None, None) => bail!("either --hex or --text is required"),
            };
            let payload = match protocol::decode(protocol, &data) {
                Ok(record) => serde_json::json!({
                    "status": "ok",
                    "protocol": protocol,
                    "record": record,
                }),
                Err(failure) => serde_json::json!({
                    "status": "error",
                    "protocol": protocol,
                    "reason": failure.reason.to_string(),
                    "raw": logutil::hex(&failure.raw),
                }),
            };
            println!("{}", payload);
        }
        Commands::ListPorts => {
            #[cfg(feature = "serial")]
            {
                let ports = ekey_gateway::serial::list_ports()?;
                if ports.is_empty() {
                    println!("No serial ports found");
                }
                for port in ports {
                    println!("{}", port);
                }
            }
            #[cfg(not(feature = "serial"))]
            {
                error!("list-ports requires the 'serial' feature");
                std::process::exit(2);
            }
        }
    }

    Ok(())
}

async fn run(config: Config) -> Result<()> {
    let registry = DeviceRegistry::from_config(&config.devices)?;
    info!("{} terminal(s) configured", registry.len());
    let dispatcher = Dispatcher::new(registry);

    let (update_tx, mut update_rx) = mpsc::unbounded_channel::<StateUpdate>();
    let mut controls: Vec<mpsc::UnboundedSender<ControlMessage>> = Vec::new();
    let mut tasks = Vec::new();

    if config.udp.enabled {
        let listener = UdpListener::from_config(&config.udp).await?;
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        controls.push(control_tx);
        tasks.push(tokio::spawn(listener.run(
            dispatcher.clone(),
            update_tx.clone(),
            control_rx,
        )));
    }

    if config.serial.enabled {
        #[cfg(feature = "serial")]
        match ekey_gateway::serial::SerialLink::open(&config.serial) {
            Ok(link) => {
                let (control_tx, control_rx) = mpsc::unbounded_channel();
                controls.push(control_tx);
                tasks.push(tokio::spawn(link.run(
                    dispatcher.clone(),
                    update_tx.clone(),
                    control_rx,
                )));
            }
            Err(e) => warn!("{} (gateway continuing without serial link)", e),
        };
        #[cfg(not(feature = "serial"))]
        warn!("Serial link configured but the 'serial' feature is disabled");
    }
    drop(update_tx);

    if tasks.is_empty() {
        bail!("no transport could be started; enable [udp] or [serial] in the config");
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested");
                break;
            }
            update = update_rx.recv() => {
                match update {
                    Some(update) => print_update(&update),
                    None => {
                        warn!("All transports stopped");
                        break;
                    }
                }
            }
        }
    }

    for control in &controls {
        let _ = control.send(ControlMessage::Shutdown);
    }
    for task in tasks {
        match task.await {
            Ok(Err(e)) => error!("Transport task failed: {}", e),
            Err(e) => error!("Transport task panicked: {}", e),
            Ok(Ok(())) => {}
        }
    }
    while let Ok(update) = update_rx.try_recv() {
        print_update(&update);
    }

    match serde_json::to_string(&metrics::snapshot()) {
        Ok(json) => info!("Counters at shutdown: {}", json),
        Err(e) => warn!("Failed to serialize counters: {}", e),
    }
    Ok(())
}

fn print_update(update: &StateUpdate) {
    let line = serde_json::json!({
        "id": update.state_id(),
        "value": update.value,
        "timestamp": update.timestamp,
    });
    println!("{}", line);
}

fn parse_hex(input: &str) -> Result<Vec<u8>> {
    let digits: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    ::hex::decode(&digits).map_err(|e| anyhow!("bad hex: {}", e))
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the configured level
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .and_then(|c| c.logging.level.parse().ok())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    let log_file = config.as_ref().and_then(|c| c.logging.file.clone());
    let opened = log_file.and_then(|file| {
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(file)
            .ok()
    });

    if let Some(f) = opened {
        let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
        // Echo to the console only when attached to a terminal
        let is_tty = atty::is(atty::Stream::Stderr);
        builder.format(move |fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            let line = format!("{} [{}] {}", ts, record.level(), record.args());
            if let Ok(mut guard) = write_mutex.lock() {
                let _ = writeln!(guard, "{}", line);
            }
            if is_tty {
                writeln!(fmt, "{}", line)
            } else {
                Ok(())
            }
        });
    } else {
        builder.format(|fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
        });
    }
    let _ = builder.try_init();
}
