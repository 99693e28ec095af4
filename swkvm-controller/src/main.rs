//! Software KVM controller: grabs physical input devices and dispatches
//! events to controlled peers over datagram sockets.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use swkvm_wire::Envelope;
use tracing::{error, info, warn};

mod cli;
mod config;
mod dispatch;
mod switch;
mod transport;

use cli::Cli;
use config::ControllerConfig;
use switch::SwitchController;
use transport::PeerTransport;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    let config_path = cli.config.unwrap_or_else(ControllerConfig::default_path);
    info!("loading config from {config_path:?}");
    let config = ControllerConfig::load(&config_path).context("failed to load controller config")?;

    let envelope = if config.crypto.enabled {
        let key = swkvm_wire::read_key(&config.crypto.key_path).context("failed to read encryption key")?;
        let context = config.crypto.context_bytes().context("invalid encryption context")?;
        info!("encryption enabled, time_division={}", config.crypto.time_division);
        Some(Envelope::new(&key, context, config.crypto.time_division).context("failed to build encryption envelope")?)
    } else {
        warn!("encryption disabled; frames are sent in plaintext");
        None
    };

    let peers: Vec<PeerTransport> = config
        .peers
        .iter()
        .map(PeerTransport::open)
        .collect::<Result<_, _>>()
        .context("failed to open peer transports")?;
    if peers.is_empty() {
        anyhow::bail!("at least one peer must be configured");
    }
    if config.hotkey.passthrough_client >= peers.len() {
        anyhow::bail!("passthrough_client index is out of range");
    }

    let switch = Arc::new(SwitchController::new(
        peers,
        envelope,
        config.hotkey.switchable_device,
        config.hotkey.switch_modifier,
        config.hotkey.switch_key,
    ));
    let hotkey = Arc::new(config.hotkey);

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        ctrlc::set_handler(move || {
            info!("shutdown requested");
            shutdown.store(true, Ordering::Relaxed);
        })
        .context("failed to install signal handler")?;
    }

    let mut readers = Vec::new();
    for device in config.devices {
        let switch = Arc::clone(&switch);
        let hotkey = Arc::clone(&hotkey);
        let shutdown = Arc::clone(&shutdown);
        readers.push(thread::spawn(move || {
            if let Err(e) = dispatch::run_device_reader(&device.device_path, device.device_id, switch, hotkey, shutdown) {
                error!("device reader for {} exited: {e}", device.device_path);
            }
        }));
    }

    info!("controller running with {} peer(s)", switch.peer_count());

    for reader in readers {
        let _ = reader.join();
    }

    info!("controller shut down");
    Ok(())
}
