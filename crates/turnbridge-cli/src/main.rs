//! Tail a terminal transcript and bridge it to a WebSocket endpoint.
//!
//! Run with: `turnbridge [URL]`
//!
//! Everything else comes from `TURNBRIDGE_*` environment variables.

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use turnbridge_session::{BridgeConfig, DEFAULT_URL};

#[derive(Debug, Parser)]
#[command(name = "turnbridge", version, about)]
struct Args {
    /// Endpoint to connect to.
    #[arg(env = "TURNBRIDGE_URL", default_value = DEFAULT_URL)]
    url: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let config = BridgeConfig::from_env(Some(args.url)).context("invalid configuration")?;

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_interrupt(tokio::signal::ctrl_c(), shutdown.clone()));

    turnbridge_session::run(config, shutdown)
        .await
        .context("bridge stopped with an error")?;

    tracing::info!("Bridge stopped");
    Ok(())
}

/// Cancel `shutdown` once `interrupt` fires. If the handler cannot be
/// installed the bridge keeps running.
async fn cancel_on_interrupt<F>(interrupt: F, shutdown: CancellationToken)
where
    F: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = interrupt.await {
        tracing::error!(error = %e, "Cannot listen for interrupt, Ctrl-C will not stop cleanly");
        return;
    }
    tracing::info!("Interrupt received, stopping");
    shutdown.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_interrupt_cancels() {
        let shutdown = CancellationToken::new();
        cancel_on_interrupt(async { Ok::<(), std::io::Error>(()) }, shutdown.clone()).await;
        assert!(shutdown.is_cancelled());
    }

    #[tokio::test]
    async fn test_failed_handler_keeps_running() {
        let shutdown = CancellationToken::new();
        let failed = async { Err::<(), _>(std::io::Error::other("no signal support")) };
        cancel_on_interrupt(failed, shutdown.clone()).await;
        assert!(!shutdown.is_cancelled());
    }
}
