use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "swkvm-peerd")]
#[command(about = "Receives wire frames from a controller and replays them onto synthetic input devices")]
pub struct Cli {
    /// Config file path (default: /etc/swkvm/peerd.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}
