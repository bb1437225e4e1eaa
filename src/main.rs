use std::{process, sync::Arc};

use lectern::{
    application::{
        error::AppError, observe::RequestObserver, repos::ContentStore, resolver::Resolver,
    },
    cache::{CacheBackend, CacheConfig, CacheStore, DisabledCache, MemoryCache},
    config,
    infra::{
        cache::RedisCache,
        db::PostgresRepositories,
        error::InfraError,
        http::{self, HttpState},
        telemetry::{self, MetricsObserver},
    },
};
use tokio::signal;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

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
        config::Command::Migrate(_) => run_migrate(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories =
        init_repositories(&settings.database, settings.database.run_migrations).await?;

    let cache_config = CacheConfig::from(&settings.cache);
    if cache_config.enabled && cache_config.list_outlives_items() {
        warn!(
            target = "lectern::cache",
            list_ttl_secs = cache_config.list_ttl.as_secs(),
            item_ttl_secs = cache_config.item_ttl.as_secs(),
            "article listing outlives article entries and may serve stale items"
        );
    }
    let (cache, cache_config) = init_cache(cache_config).await;

    let store: Arc<dyn ContentStore> = repositories;
    let observer: Arc<dyn RequestObserver> = Arc::new(MetricsObserver);
    let resolver = Resolver::new(store.clone(), cache.clone(), cache_config);

    let state = HttpState {
        resolver,
        store,
        cache,
        observer,
    };

    serve_http(&settings, state).await
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    init_repositories(&settings.database, true).await?;
    info!(target = "lectern::db", "migrations applied");
    Ok(())
}

async fn init_repositories(
    database: &config::DatabaseSettings,
    run_migrations: bool,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PostgresRepositories::connect(database_url, database)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    if run_migrations {
        PostgresRepositories::run_migrations(&pool)
            .await
            .map_err(|err| AppError::from(InfraError::from(err)))?;
    }

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

/// Build the cache backend. An unreachable Redis server is not fatal: the
/// process serves from the store alone until restarted.
async fn init_cache(mut config: CacheConfig) -> (Arc<dyn CacheStore>, CacheConfig) {
    if !config.enabled {
        info!(target = "lectern::cache", "caching disabled by configuration");
        return (Arc::new(DisabledCache), config);
    }

    match config.backend {
        CacheBackend::Memory => {
            info!(
                target = "lectern::cache",
                backend = "memory",
                capacity = config.memory_capacity.get(),
                "using in-process cache"
            );
            (Arc::new(MemoryCache::new(&config)), config)
        }
        CacheBackend::Redis => match RedisCache::connect(&config).await {
            Ok(cache) => (Arc::new(cache), config),
            Err(err) => {
                warn!(
                    target = "lectern::cache",
                    backend = "redis",
                    error = %err,
                    "cache server unreachable, serving without cache"
                );
                config.enabled = false;
                (Arc::new(DisabledCache), config)
            }
        },
    }
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "lectern::http",
        addr = %settings.server.addr,
        "listening"
    );

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    info!(target = "lectern::http", "server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "failed to install ctrl-c handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!(target = "lectern::http", "shutdown signal received");
}
