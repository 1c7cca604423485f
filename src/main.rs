use anyhow::Context;
use clap::{Parser, Subcommand};
use sml_bridge::bridge::{
    connect_broker, drive_event_loop, until_signal, Device, Incoming, JsonLinesPublisher,
    LogPublisher, Poller, Publisher,
};
use sml_bridge::config::{Config, PublisherKind};
use sml_bridge::constants::{DEFAULT_BAUDRATE, DEFAULT_READ_TIMEOUT_MS, DEFAULT_SCAN_MAX_OFFSET};
use sml_bridge::logging::{init_logger_with_default, log_info, log_warn, verbosity_to_filter};
use sml_bridge::scan::{run_scan, ScanOptions};
use sml_bridge::util::hex::pretty_hex;
use sml_bridge::{connect, MeterStateTracker, SerialConfig};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;

/// Bus messages waiting for the polling loop
const INBOUND_CAPACITY: usize = 32;

/// How long the MQTT connection gets to deliver the final messages
const MQTT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "sml-bridge")]
#[command(about = "Publish SML smart-meter readings to a home-automation bus")]
struct Cli {
    /// Increase log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the meter and publish readings
    Run {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Write every integer field of each message to a JSON file
    Scan {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long, default_value = "raw")]
        out: PathBuf,
        /// Number of messages to record
        #[arg(short = 'n', long)]
        count: Option<usize>,
        #[arg(long, default_value_t = DEFAULT_SCAN_MAX_OFFSET)]
        max_offset: usize,
    },
    /// Read one message and print a hex dump
    Read {
        #[arg(short, long)]
        port: String,
        #[arg(short, long, default_value_t = DEFAULT_BAUDRATE)]
        baudrate: u32,
        #[arg(short, long, default_value_t = DEFAULT_READ_TIMEOUT_MS)]
        timeout_ms: u64,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logger_with_default(verbosity_to_filter(cli.verbose));

    match cli.command {
        Commands::Run { config } => {
            let config = Config::load(&config)?;
            let device = Device::new(&config.device, &config.entities);
            match config.publisher {
                PublisherKind::Mqtt => run_mqtt_bridge(&config, device).await?,
                PublisherKind::JsonLines => {
                    run_bridge(&config, device, JsonLinesPublisher::stdout(), None).await?
                }
                PublisherKind::Log => run_bridge(&config, device, LogPublisher::new(), None).await?,
            }
        }
        Commands::Scan {
            config,
            out,
            count,
            max_offset,
        } => {
            let config = Config::load(&config)?;
            let mut reader = connect(&config.serial_config())?;
            let options = ScanOptions {
                out_dir: out,
                offsets: 0..max_offset,
                count,
                interval: config.poll_interval(),
                max_failures: 10,
            };
            let written = run_scan(&mut reader, &options).await?;
            log_info(&format!("Wrote {} scan records", written.len()));
        }
        Commands::Read {
            port,
            baudrate,
            timeout_ms,
        } => {
            let serial = SerialConfig {
                port,
                baudrate,
                timeout: Duration::from_millis(timeout_ms),
            };
            let mut reader = connect(&serial)?;
            let message = reader
                .read_message()
                .await
                .with_context(|| format!("no SML message on {}", serial.port))?;
            println!("{} bytes", message.len());
            println!("{}", pretty_hex(&message, 16));
        }
    }

    Ok(())
}

async fn run_bridge<P: Publisher>(
    config: &Config,
    device: Device,
    publisher: P,
    inbound: Option<mpsc::Receiver<Incoming>>,
) -> anyhow::Result<()> {
    let reader = connect(&config.serial_config())?;
    let tracker = MeterStateTracker::new(config.entity_descriptors(), config.max_interval());

    log_info(&format!(
        "Polling {} every {:?} for {} entities",
        config.serial.port,
        config.poll_interval(),
        config.entities.len()
    ));

    let mut poller = Poller::new(reader, tracker, device, publisher, config.poll_interval());
    let shutdown = until_signal(tokio::signal::ctrl_c());
    match inbound {
        Some(inbound) => poller.run_with_inbound(shutdown, inbound).await?,
        None => poller.run(shutdown).await?,
    }
    Ok(())
}

async fn run_mqtt_bridge(config: &Config, device: Device) -> anyhow::Result<()> {
    let broker = config
        .broker
        .as_ref()
        .context("publisher mqtt needs a broker section")?;

    let (publisher, eventloop) = connect_broker(broker, &device);
    let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);
    let events = tokio::spawn(drive_event_loop(
        eventloop,
        publisher.client(),
        device.subscriptions(),
        inbound_tx,
    ));

    run_bridge(config, device, publisher, Some(inbound_rx)).await?;

    // the event loop ends once the disconnect queued by the poller is sent
    match tokio::time::timeout(MQTT_CLOSE_TIMEOUT, events).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => log_warn(&format!("MQTT event loop failed: {e}")),
        Err(_) => log_warn("MQTT connection did not close in time"),
    }
    Ok(())
}
