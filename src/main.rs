use std::env;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use offer_scout::schedule::{spawn_trigger_loop, RunConsumer};
use offer_scout::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    info!("Starting offer-scout scheduler");

    // Create HTTP client
    let http_timeout = env::var("HTTP_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(120);
    let connect_timeout = env::var("HTTP_CONNECT_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(10);
    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(http_timeout))
        .connect_timeout(Duration::from_secs(connect_timeout))
        .build()?;

    let state = AppState::new(http_client);

    if !state.llm.credential_configured() {
        warn!(
            "no language-service credential configured — scheduled runs will fail fast \
             until OPENAI_API_KEY or offer-scout.json llm.api_key is set"
        );
    }

    // Trigger evaluator → per-user run consumer.
    let tick = Duration::from_secs(state.config.resolve_tick_secs());
    info!("trigger evaluator cadence: {:?}", tick);
    let events = spawn_trigger_loop(Arc::clone(&state.profiles), tick);
    let consumer = RunConsumer::new(
        Arc::clone(&state.sessions),
        Arc::clone(&state.llm),
        Arc::clone(&state.profiles),
        Arc::clone(&state.offers),
        Arc::clone(&state.statuses),
    );
    let consumer_task = tokio::spawn(consumer.run_loop(events));

    shutdown_signal().await;
    info!("shutdown requested — closing browser sessions");
    consumer_task.abort();
    state.sessions.shutdown_all().await;

    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).ok();

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = async {
                if let Some(ref mut s) = sigterm {
                    s.recv().await;
                } else {
                    futures::future::pending::<()>().await;
                }
            } => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
