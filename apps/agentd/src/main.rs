//! DevicePulse agent binary.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use devicepulse_agent::sampler::{Sampler, SyntheticSampler, SystemSampler};
use devicepulse_agent::{AgentConfig, AgentLink, default_device_id};

#[derive(Parser, Debug)]
#[command(name = "devicepulse-agentd", version, about = "Telemetry agent")]
struct Args {
    /// Relay address, e.g. http://localhost:8000
    #[arg(long)]
    server: String,

    /// Device identifier (defaults to this machine's hostname).
    #[arg(long)]
    device: Option<String>,

    /// Seconds between telemetry ticks.
    #[arg(long, default_value_t = 2)]
    interval: u64,

    /// Publish generated values instead of live system metrics.
    #[arg(long)]
    synthetic: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let device_id = args.device.unwrap_or_else(default_device_id);
    tracing::info!(%device_id, synthetic = args.synthetic, "devicepulse agent starting");

    let mut config = AgentConfig::new(args.server, device_id);
    config.interval_secs = args.interval;

    let sampler: Box<dyn Sampler> = if args.synthetic {
        Box::new(SyntheticSampler::new())
    } else {
        Box::new(SystemSampler::new())
    };

    AgentLink::new(config, sampler).run().await?;
    Ok(())
}
