//! Software KVM controlled-side daemon: listens for wire frames from a
//! controller and replays them onto synthetic input devices.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use swkvm_wire::Envelope;
use tracing::{error, info, warn};

mod cli;
mod config;
mod replay;
mod transport;

use cli::Cli;
use config::PeerdConfig;
use transport::{FrameListener, RecvError};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    let config_path = cli.config.unwrap_or_else(PeerdConfig::default_path);
    info!("loading config from {config_path:?}");
    let config = PeerdConfig::load(&config_path).context("failed to load peer config")?;

    let envelope = if config.crypto.enabled {
        let key = swkvm_wire::read_key(&config.crypto.key_path).context("failed to read encryption key")?;
        let context = config.crypto.context_bytes().context("invalid encryption context")?;
        info!("encryption enabled, time_division={}", config.crypto.time_division);
        Some(Envelope::new(&key, context, config.crypto.time_division).context("failed to build encryption envelope")?)
    } else {
        warn!("encryption disabled; frames are accepted in plaintext");
        None
    };

    let mut devices = replay::build_devices(&config.devices).context("failed to create synthetic devices")?;
    info!("created {} synthetic device(s)", config.devices.len());

    let listener = FrameListener::bind(&config.listen, envelope).context("failed to bind listener")?;

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        ctrlc::set_handler(move || {
            info!("shutdown requested");
            shutdown.store(true, Ordering::Relaxed);
        })
        .context("failed to install signal handler")?;
    }

    info!("peer daemon listening");

    let mut fatal: Option<anyhow::Error> = None;
    while !shutdown.load(Ordering::Relaxed) {
        let frame = match listener.recv() {
            Ok(frame) => frame,
            Err(RecvError::TimedOut) => continue,
            Err(RecvError::Io(e)) => {
                error!("fatal transport read error: {e}");
                fatal = Some(e.into());
                break;
            }
            Err(e) => {
                warn!("dropping malformed or unreadable datagram: {e}");
                continue;
            }
        };

        if let Err(e) = replay::replay_frame(&mut devices, &frame) {
            error!("fatal replay error: {e}");
            fatal = Some(e.into());
            break;
        }
    }

    // Single exit path for clean shutdown and fatal errors alike, matching
    // controlled.c's close_socket() call at the end of main.
    listener.close();

    if let Some(e) = fatal {
        return Err(e);
    }

    info!("peer daemon shut down");
    Ok(())
}
