//! Command line interface for the `gbxremote` binary.
//!
//! Kept free of library types so `build.rs` can render the man page from
//! the same definition.

use std::net::SocketAddr;

use clap::Parser;

/// Command line arguments for the `gbxremote` binary.
#[derive(Debug, Parser)]
#[command(
    name = "gbxremote",
    version,
    about = "Call methods on a GBXRemote 2 dedicated server"
)]
pub struct Cli {
    /// Server host name or address.
    #[arg(long, env = "GBXREMOTE_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Server control port.
    #[arg(short, long, env = "GBXREMOTE_PORT", default_value_t = 5000)]
    pub port: u16,

    /// Log in as this user before calling anything.
    #[arg(short, long, env = "GBXREMOTE_USER")]
    pub user: Option<String>,

    /// Password for `--user`.
    #[arg(long, env = "GBXREMOTE_PASSWORD", requires = "user", hide_env_values = true)]
    pub password: Option<String>,

    /// Seconds to wait for the server greeting.
    #[arg(long, default_value_t = 10)]
    pub handshake_timeout: u64,

    /// Stay connected and print callbacks until interrupted.
    #[arg(short, long)]
    pub listen: bool,

    /// Serve Prometheus metrics on this address.
    #[arg(long, env = "GBXREMOTE_METRICS_ADDR")]
    pub metrics_addr: Option<SocketAddr>,

    /// Method to call, e.g. `GetVersion`.
    pub method: Option<String>,

    /// Method parameters. Integers, `true`/`false` and decimals are sent
    /// typed; anything else is sent as a string.
    #[arg(requires = "method")]
    pub params: Vec<String>,
}
