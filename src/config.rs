//! Command line configuration for both binaries

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::signaling::DEFAULT_SIGNALING_PORT;

#[derive(Debug, Parser)]
#[command(name = "tandem", about = "Rendezvous server for two-party WebRTC rooms")]
pub struct ServerArgs {
    /// Address to listen on
    #[arg(long, default_value_t = format!("0.0.0.0:{}", DEFAULT_SIGNALING_PORT))]
    pub bind: String,
}

#[derive(Debug, Parser)]
#[command(name = "tandem-chat", about = "Join a room and chat with the other peer")]
pub struct ChatArgs {
    /// Rendezvous server URL
    #[arg(long, default_value_t = format!("ws://127.0.0.1:{}", DEFAULT_SIGNALING_PORT))]
    pub server: String,

    #[arg(long, default_value = "default")]
    pub room: String,

    /// Label for your own chat lines
    #[arg(long, default_value = "You")]
    pub name: String,

    /// STUN/TURN server URL, repeatable
    #[arg(long = "ice-server")]
    pub ice_servers: Vec<String>,
}

/// Install the fmt subscriber; RUST_LOG overrides the `info` default
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
