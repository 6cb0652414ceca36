//! `gbxremote` command line client.
//!
//! Connects, optionally authenticates, calls one method and prints the
//! result. With `--listen` it enables callbacks and prints every
//! notification until Ctrl-C.

mod cli;

use std::{process::ExitCode, time::Duration};

use clap::Parser;
use gbxremote::{ClientError, GbxRemoteClient, Interest, Notification, Value};
use log::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    // Applications embedding the library should install their own subscriber.
    tracing_subscriber::fmt::init();

    let cli = cli::Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("gbxremote failed: error={e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: cli::Cli) -> Result<(), ClientError> {
    if let Some(addr) = cli.metrics_addr {
        install_metrics(addr);
    }

    let client = GbxRemoteClient::builder()
        .nodelay(true)
        .handshake_timeout(Duration::from_secs(cli.handshake_timeout))
        .connect_host(&cli.host, cli.port)
        .await?;

    if let Some(user) = &cli.user {
        client
            .authenticate(user, cli.password.as_deref().unwrap_or_default())
            .await?;
        info!("authenticated: user={user}");
    }

    if cli.listen {
        client.register_callback_handler(Interest::All, print_notification);
        client.enable_callbacks().await?;
    }

    if let Some(method) = &cli.method {
        let params: Vec<Value> = cli.params.iter().map(|raw| parse_param(raw)).collect();
        let result = client.execute(method, &params).await?;
        println!("{result}");
    }

    if cli.listen {
        tokio::signal::ctrl_c().await?;
    }
    client.close().await;
    Ok(())
}

fn print_notification(notification: &Notification) {
    let args = Value::Array(notification.params.clone());
    println!("{} {args}", notification.method);
}

/// Interpret a command line parameter as the most specific XML-RPC type.
fn parse_param(raw: &str) -> Value {
    if let Ok(int) = raw.parse::<i64>() {
        return Value::Int(int);
    }
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => raw
            .parse::<f64>()
            .ok()
            .filter(|d| d.is_finite())
            .map_or_else(|| Value::from(raw), Value::Double),
    }
}

#[cfg(feature = "metrics")]
fn install_metrics(addr: std::net::SocketAddr) {
    match metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
    {
        Ok(()) => info!("serving metrics: addr={addr}"),
        Err(e) => log::warn!("failed to install metrics exporter: error={e}"),
    }
}

#[cfg(not(feature = "metrics"))]
fn install_metrics(addr: std::net::SocketAddr) {
    log::warn!("metrics feature disabled; ignoring --metrics-addr {addr}");
}
