use anyhow::{Context, Result, bail};
use bpod_core::{
    BpodDriver, DiscoveryOptions, DriverConfig, PortProvider, SystemPorts, identify_ports,
};
use clap::Parser;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Bpod state machine probe", long_about = None)]
struct Args {
    /// Primary serial port (e.g. /dev/ttyACM0, COM3). Identified automatically if omitted
    #[arg(short, long)]
    port: Option<String>,

    /// Baud rate
    #[arg(long)]
    baud: Option<u32>,

    /// Driver configuration file (TOML)
    #[arg(short, long)]
    config: Option<String>,

    /// Write the effective configuration to this file and exit
    #[arg(long)]
    save_config: Option<String>,

    /// List serial ports and exit
    #[arg(long)]
    list: bool,

    /// Identify primary, secondary and analog ports and exit
    #[arg(long)]
    discover: bool,

    /// Send the configured input enable lists after negotiation
    #[arg(long)]
    enable_ports: bool,

    /// Send the configured sync channel and mode after negotiation
    #[arg(long)]
    sync: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(if args.verbose {
                    tracing::Level::DEBUG.into()
                } else {
                    tracing::Level::INFO.into()
                })
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    if let Err(e) = run(args) {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn load_config(args: &Args) -> Result<DriverConfig> {
    let mut config = match &args.config {
        Some(path) => DriverConfig::load_from_file(path)
            .with_context(|| format!("loading configuration from {}", path))?,
        None => DriverConfig::default(),
    };
    if let Some(port) = &args.port {
        config.serial_port = Some(port.clone());
    }
    if let Some(baud) = args.baud {
        config.baud_rate = baud;
    }
    Ok(config)
}

fn run(args: Args) -> Result<()> {
    let config = load_config(&args)?;

    if let Some(path) = &args.save_config {
        config.save_to_file(path)?;
        info!(path = %path, "Configuration saved");
        return Ok(());
    }

    if args.list {
        for port in SystemPorts.list_ports() {
            println!("{}", port);
        }
        return Ok(());
    }

    if args.discover {
        let options = DiscoveryOptions {
            primary: config.serial_port.clone(),
            baud_rate: config.baud_rate,
            probe_timeout: config.probe_timeout(),
        };
        let found = identify_ports(&SystemPorts, &options);
        let show = |port: &Option<String>| port.clone().unwrap_or_else(|| "-".to_string());
        println!("Primary:   {}", show(&found.primary));
        println!("Secondary: {}", show(&found.secondary));
        println!("Analog:    {}", show(&found.analog));
        if found.primary.is_none() {
            bail!("no state machine found");
        }
        return Ok(());
    }

    info!("Starting Bpod probe (serialport backend)...");
    let mut driver = BpodDriver::open(&SystemPorts, &config)?;

    if let Some(hw) = driver.hardware() {
        println!("{}", hw);
    }

    if args.enable_ports && !driver.enable_ports(&config.ports_enabled())? {
        warn!("State machine rejected the input enable bitmap");
    }
    if args.sync && !driver.set_sync_channel_and_mode(config.sync_channel, config.sync_mode)? {
        warn!("State machine rejected the sync configuration");
    }

    if !driver.disconnect()? {
        warn!("No disconnect confirmation");
    }
    Ok(())
}
