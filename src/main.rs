use std::{future::IntoFuture, process, sync::Arc, time::Duration};

use tokio::{sync::Notify, task::JoinHandle};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use vetrina::{
    application::{
        catalog::CatalogService, error::AppError, events::ChangeFeed, repos::CatalogRepo,
    },
    cache::{CacheConfig, CacheInvalidator, MemoryStore, ResponseCache},
    config,
    infra::{
        db::{PostgresCatalog, spawn_change_listener},
        error::InfraError,
        http::{self, HttpState},
        memory::InMemoryCatalog,
        telemetry,
    },
    presentation::views::AskamaRenderer,
};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
    }
}

/// Catalog backend chosen at startup plus the tasks that feed it changes.
struct CatalogBackend {
    repo: Arc<dyn CatalogRepo>,
    db: Option<Arc<PostgresCatalog>>,
    listener: Option<JoinHandle<()>>,
}

async fn init_catalog(
    settings: &config::Settings,
    feed: Arc<ChangeFeed>,
) -> Result<CatalogBackend, AppError> {
    let Some(database_url) = settings.database.url.as_ref() else {
        warn!(
            target = "vetrina::startup",
            "No database url configured; serving an in-memory catalog"
        );
        return Ok(CatalogBackend {
            repo: Arc::new(InMemoryCatalog::new(feed)),
            db: None,
            listener: None,
        });
    };

    let pool = PostgresCatalog::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    PostgresCatalog::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    let listener = spawn_change_listener(&pool, feed)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    let catalog = Arc::new(PostgresCatalog::new(pool));
    Ok(CatalogBackend {
        repo: catalog.clone(),
        db: Some(catalog),
        listener: Some(listener),
    })
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let feed = Arc::new(ChangeFeed::new());
    let backend = init_catalog(&settings, feed.clone()).await?;

    let cache_config = CacheConfig::from(&settings.cache);
    let store = Arc::new(MemoryStore::new(&cache_config));
    let cache = Arc::new(ResponseCache::new(store, cache_config));

    let invalidator = Arc::new(CacheInvalidator::new(cache.clone()));
    feed.subscribe(invalidator.clone());
    let worker = invalidator.spawn_worker();

    let catalog = Arc::new(CatalogService::new(
        backend.repo,
        Arc::new(AskamaRenderer::new()),
        cache,
    ));
    let state = HttpState {
        catalog,
        db: backend.db,
    };

    let result = serve_http(&settings, state).await;

    if let Some(listener) = backend.listener {
        listener.abort();
        let _ = listener.await;
    }

    let flushed = invalidator.flush().await;
    worker.abort();
    let _ = worker.await;
    info!(target = "vetrina::shutdown", flushed, "Invalidation worker stopped");

    result
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state);
    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "vetrina::startup",
        addr = %settings.server.addr,
        "Listening for catalog requests"
    );

    let draining = Arc::new(Notify::new());
    let signal = {
        let draining = draining.clone();
        async move {
            wait_for_shutdown().await;
            draining.notify_one();
        }
    };

    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(signal)
        .into_future();
    tokio::pin!(server);

    let grace = settings.server.graceful_shutdown;
    tokio::select! {
        result = &mut server => {
            result.map_err(|err| AppError::from(InfraError::from(err)))?;
        }
        () = drain_deadline(&draining, grace) => {
            warn!(
                target = "vetrina::shutdown",
                grace_ms = grace.as_millis() as u64,
                "Graceful shutdown timed out; dropping open connections"
            );
        }
    }

    Ok(())
}

async fn drain_deadline(draining: &Notify, grace: Duration) {
    draining.notified().await;
    tokio::time::sleep(grace).await;
}

async fn wait_for_shutdown() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!(target = "vetrina::shutdown", "Shutdown signal received"),
        Err(err) => {
            error!(error = %err, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}
