use std::{net::SocketAddr, time::Duration};

use anyhow::Context;

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub tmdb_api_key: String,
    pub tmdb_base_url: String,
    pub database_url: String,
    pub tmdb_rps: u32,
    pub tmdb_list_pages: u32,
    pub max_concurrent: usize,
    pub fetch_timeout: Duration,
    pub sync_interval: Duration,
    pub sync_flex: Duration,
    pub sync_on_startup: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 =
            std::env::var("PORT").unwrap_or_else(|_| "3000".to_string()).parse().context("PORT")?;

        let tmdb_api_key = std::env::var("TMDB_API_KEY").unwrap_or_else(|_| "".to_string());
        let tmdb_base_url = std::env::var("TMDB_BASE_URL")
            .unwrap_or_else(|_| "https://api.themoviedb.org/3".to_string());

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://popmovies.db?mode=rwc".to_string());

        let tmdb_rps: u32 =
            std::env::var("TMDB_RPS").ok().and_then(|s| s.parse().ok()).unwrap_or(4);

        let tmdb_list_pages: u32 =
            std::env::var("TMDB_LIST_PAGES").ok().and_then(|s| s.parse().ok()).unwrap_or(1);

        let max_concurrent: usize =
            std::env::var("MAX_CONCURRENT_REQUESTS").ok().and_then(|s| s.parse().ok()).unwrap_or(5);

        let fetch_timeout_secs: u64 =
            std::env::var("FETCH_TIMEOUT_SECS").ok().and_then(|s| s.parse().ok()).unwrap_or(30);

        let sync_interval_secs: u64 = std::env::var("SYNC_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(24 * 60 * 60);

        let sync_flex_secs: u64 = std::env::var("SYNC_FLEX_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(sync_interval_secs / 3)
            .min(sync_interval_secs);

        let sync_on_startup = std::env::var("SYNC_ON_STARTUP")
            .map(|s| !matches!(s.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no"))
            .unwrap_or(true);

        anyhow::ensure!(sync_interval_secs > 0, "SYNC_INTERVAL_SECS must be positive");

        Ok(Self {
            addr: format!("{host}:{port}").parse().context("HOST/PORT")?,
            tmdb_api_key,
            tmdb_base_url,
            database_url,
            tmdb_rps,
            tmdb_list_pages: tmdb_list_pages.max(1),
            max_concurrent: max_concurrent.max(1),
            fetch_timeout: Duration::from_secs(fetch_timeout_secs.max(1)),
            sync_interval: Duration::from_secs(sync_interval_secs),
            sync_flex: Duration::from_secs(sync_flex_secs),
            sync_on_startup,
        })
    }
}
