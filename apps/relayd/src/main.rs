//! DevicePulse relay server binary.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use devicepulse_relay::{RelayConfig, RelayServer};

#[derive(Parser, Debug)]
#[command(name = "devicepulse-relayd", version, about = "Telemetry relay server")]
struct Args {
    /// Address to bind.
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// TCP port to listen on.
    #[arg(long, default_value_t = 8000)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let server = RelayServer::new(RelayConfig {
        host: args.host,
        port: args.port,
    });

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received Ctrl-C, shutting down");
            server.shutdown();
        }
    }
    Ok(())
}
