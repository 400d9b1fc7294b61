use clap::Parser;
use std::time::Duration;

/// Default address the node listens on.
pub const DEFAULT_ADDR: &str = ":1337";

/// Default directory for stored blobs.
pub const DEFAULT_PATH: &str = blobnet_store::fs::DEFAULT_PATH;

/// Node configuration, parsed from the command line.
#[derive(Parser, Debug, Clone)]
#[command(name = "blobnet", about = "Peer to peer blob node")]
pub struct Config {
    /// Address to listen on. `:PORT` listens on every interface.
    #[arg(long, default_value = DEFAULT_ADDR)]
    pub addr: String,

    /// Directory blobs are stored in.
    #[arg(long, default_value = DEFAULT_PATH)]
    pub path: String,

    /// Comma separated addresses of nodes to connect to on start.
    #[arg(long, value_delimiter = ',', value_parser = parse_node)]
    pub nodes: Vec<String>,

    /// Seconds to wait for a graceful close before giving up.
    #[arg(long, default_value_t = 5)]
    pub shutdown_timeout: u64,

    /// Seconds a single handshake may take.
    #[arg(long, default_value_t = 10)]
    pub handshake_timeout: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            path: DEFAULT_PATH.to_string(),
            nodes: Vec::new(),
            shutdown_timeout: 5,
            handshake_timeout: 10,
        }
    }
}

impl Config {
    /// Bootstrap nodes with blank entries dropped.
    pub fn bootstrap_nodes(&self) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|node| !node.is_empty())
            .cloned()
            .collect()
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout)
    }
}

fn parse_node(node: &str) -> Result<String, String> {
    Ok(node.trim().to_string())
}

/// Address to bind for `addr`. A bare `:PORT` binds every interface.
pub fn listen_addr(addr: &str) -> String {
    match addr.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{}", port),
        None => addr.to_string(),
    }
}

/// Address to connect to for `addr`. A bare `:PORT` means this host.
pub fn dial_addr(addr: &str) -> String {
    match addr.strip_prefix(':') {
        Some(port) => format!("127.0.0.1:{}", port),
        None => addr.to_string(),
    }
}
