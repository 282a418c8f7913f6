mod api;
mod config;
mod metrics;

use std::sync::Arc;

use bridge_kernel::state::BridgeState;
use bridge_kernel::types::Cause;
use config::HostConfig;
use tokio::sync::{mpsc, Mutex};

fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main())
}

async fn async_main() -> eyre::Result<()> {
    init_logging();

    tracing::info!("starting bridge kernel host");

    let config = HostConfig::load()?;
    tracing::info!(?config, "configuration loaded");

    let state = BridgeState::genesis(config.node.clone(), config.constants);
    let kernel = Arc::new(Mutex::new(state));

    let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        let _ = shutdown_tx.send(()).await;
    });

    let api_state = api::ApiState {
        kernel: kernel.clone(),
    };
    let metrics_addr = config.metrics_addr;
    tokio::spawn(async move {
        if let Err(e) = api::serve(metrics_addr, api_state).await {
            tracing::error!(error = %e, "api server error");
        }
    });

    // The event loop itself: an external driver (a Nock/Base chain
    // watcher, not part of this kernel) feeds `Cause`s down this
    // channel. This binary only demonstrates the wiring; see
    // `bridge_kernel::dispatcher::dispatch` for the actual state
    // transition.
    // Held for the process lifetime so `cause_rx` doesn't see the
    // channel close; a real driver would clone this sender into its own
    // chain-watcher tasks instead.
    let (_cause_tx, mut cause_rx) = mpsc::channel::<Cause>(256);

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                tracing::info!("shutdown signal received");
                break;
            }
            maybe_cause = cause_rx.recv() => {
                let Some(cause) = maybe_cause else {
                    tracing::info!("cause channel closed, stopping event loop");
                    break;
                };
                process_cause(&kernel, cause).await;
            }
        }
    }

    tracing::info!("bridge kernel host stopped");
    Ok(())
}

async fn process_cause(kernel: &Arc<Mutex<BridgeState>>, cause: Cause) {
    let cause_name = cause.name();
    let mut guard = kernel.lock().await;
    let current = guard.clone();
    let (effects, new_state) = bridge_kernel::dispatch(current, cause);
    let outcome = if new_state.stop.is_some() { "stop" } else { "ok" };
    metrics::CAUSES_PROCESSED
        .with_label_values(&[cause_name, outcome])
        .inc();
    metrics::observe(&new_state);
    for effect in &effects {
        tracing::info!(?effect, "emitting effect");
    }
    *guard = new_state;
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,bridge_kernel_host=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(filter)
        .init();
}

async fn wait_for_shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
