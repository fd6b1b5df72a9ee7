use std::net::TcpListener;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use live_events::config::Args;
use live_events::events::Broker;
use live_events::server::serve;
use live_events::shared::types::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "live_events=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let (broker, dispatcher) = Broker::start(&args.broker_config());
    let state = AppState {
        broker: broker.clone(),
        session: args.session_config(),
    };

    let listener = TcpListener::bind(args.addr)
        .with_context(|| format!("failed to bind {}", args.addr))?;
    info!("Listening at http://{}", args.addr);

    let shutdown = async move {
        match signal::ctrl_c().await {
            Ok(()) => info!("shutting down"),
            Err(err) => warn!(error = %err, "failed to listen for ctrl-c, shutting down"),
        }
        // closes every stream, which lets hyper finish its graceful shutdown
        broker.shutdown();
    };
    serve(listener, state, shutdown).await?;

    dispatcher.await.context("broker dispatcher panicked")?;
    Ok(())
}
