use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "swkvm-controller")]
#[command(about = "Captures physical input and dispatches it to controlled peers")]
pub struct Cli {
    /// Config file path (default: /etc/swkvm/controller.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}
