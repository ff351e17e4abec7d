mod catalog;
mod config;
mod db;
mod entities;
mod error;
mod models;
mod routes;
mod scheduler;
mod store;
mod sync;
mod tmdb;

use std::sync::Arc;

use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    config::Config, scheduler::Scheduler, store::MovieStore, sync::SyncOrchestrator,
    tmdb::TmdbClient,
};

pub struct AppState {
    pub store: MovieStore,
    pub scheduler: Arc<Scheduler>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,popmovies_sync=debug,sqlx=warn".to_string()),
        )
        .init();

    let config = Config::from_env()?;

    let http = reqwest::Client::builder()
        .user_agent("popmovies-sync/0.1")
        .timeout(config.fetch_timeout)
        .build()?;

    let db = db::connect_and_migrate(&config.database_url).await?;
    let store = MovieStore::new(db);

    let tmdb = TmdbClient::new(
        http,
        config.tmdb_api_key.clone(),
        config.tmdb_base_url.clone(),
        config.tmdb_rps,
    )
    .with_list_pages(config.tmdb_list_pages)
    .with_fetch_timeout(config.fetch_timeout);

    let orchestrator = Arc::new(SyncOrchestrator::new(
        Arc::new(tmdb),
        store.clone(),
        config.max_concurrent,
        config.fetch_timeout,
    ));
    let scheduler = Arc::new(Scheduler::new(orchestrator, config.sync_interval, config.sync_flex));

    if config.sync_on_startup {
        scheduler.spawn_immediate();
    }
    Arc::clone(&scheduler).spawn_periodic();

    let state = Arc::new(AppState { store, scheduler });

    let app = routes::router(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    tracing::info!(addr = %config.addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
