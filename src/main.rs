use std::sync::Arc;

use broker_probe::broker::MemoryBroker;
use broker_probe::config::Config;
use broker_probe::server;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = Config::resolve()?;

    let broker = Arc::new(MemoryBroker::new(cfg.wait_timeout()));
    broker.seed(&cfg.topology);

    tokio::select! {
        res = server::listener::run(&cfg, broker) => {
            res?;
        }

        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
