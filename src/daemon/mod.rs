use std::sync::Arc;

use anyhow::Result;
use collection::{
    idle::IdleEvaluator,
    probe::ActivityProbe,
    runner::{CollectorRunner, ProbeFactory},
};
use storage::EventStore;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    config::{AppContext, CollectorSettings},
    server::{routes::AppState, serve},
    window_api::GenericWindowManager,
};

pub mod collection;
pub mod processing;
pub mod shutdown;
pub mod storage;

/// Probes the foreground window of the platform the binary was built for.
pub fn platform_probe_factory(settings: CollectorSettings) -> ProbeFactory {
    Box::new(move || -> Result<ActivityProbe> {
        Ok(ActivityProbe::new(
            Box::new(GenericWindowManager::new()?),
            IdleEvaluator::new(settings.idle_threshold),
        ))
    })
}

/// Runs only the collector until Ctrl+C.
pub async fn run_collector(context: AppContext) -> Result<()> {
    let store = EventStore::open(context.db_path.clone())?;
    let shutdown_token = CancellationToken::new();
    let runner = CollectorRunner::new(
        context.clone(),
        store,
        platform_probe_factory(context.settings),
        shutdown_token.clone(),
    );

    runner.start()?;
    info!("Recording activity into {}", context.db_path.display());
    shutdown::detect_shutdown(shutdown_token).await;
    runner.stop().await
}

/// Runs the collector in the background and serves the query API until Ctrl+C. A collector that
/// can't start doesn't prevent the API from serving already recorded data.
pub async fn run_web(context: AppContext, listener: TcpListener) -> Result<()> {
    let store = EventStore::open(context.db_path.clone())?;
    let shutdown_token = CancellationToken::new();
    let runner = Arc::new(CollectorRunner::new(
        context.clone(),
        store.clone(),
        platform_probe_factory(context.settings),
        shutdown_token.clone(),
    ));

    if let Err(e) = runner.start() {
        error!("Collector couldn't start, serving recorded data only {e:?}");
    }

    let state = AppState::new(context, store, runner.clone());
    let server_token = shutdown_token.clone();
    let (_, serve_result) = tokio::join!(
        shutdown::detect_shutdown(shutdown_token),
        async move {
            let result = serve(listener, state, server_token.clone()).await;
            // A failed server stops the collector as well.
            server_token.cancel();
            result
        },
    );

    let stop_result = runner.stop().await;
    serve_result?;
    stop_result
}
