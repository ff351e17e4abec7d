use std::{num::NonZeroU32, sync::Arc, time::Duration};

use async_trait::async_trait;
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use serde::{Deserialize, de::DeserializeOwned};
use tracing::debug;

use crate::{
    catalog::MovieCatalog,
    error::SyncError,
    models::{Category, MovieRecord, ReviewRecord, VideoRecord},
};

pub struct TmdbClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    list_pages: u32,
    fetch_timeout: Duration,
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl TmdbClient {
    pub fn new(client: reqwest::Client, api_key: String, base_url: String, rps: u32) -> Self {
        if api_key.trim().is_empty() {
            tracing::warn!("no TMDB_API_KEY provided, catalog requests will be rejected");
        }

        let quota = Quota::per_second(NonZeroU32::new(rps).unwrap_or(NonZeroU32::MIN));
        Self {
            client,
            api_key,
            base_url,
            list_pages: 1,
            fetch_timeout: Duration::from_secs(30),
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    pub fn with_list_pages(mut self, pages: u32) -> Self {
        self.list_pages = pages.max(1);
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Fetches one `results` page. The response is fully consumed or dropped
    /// before returning, so the pooled connection is always released.
    async fn get_page<T: DeserializeOwned>(
        &self,
        path: &str,
        page: Option<u32>,
    ) -> Result<ResultsPage<T>, SyncError> {
        self.limiter.until_ready().await;

        let url = format!("{}{}", self.base_url.trim_end_matches('/'), path);
        let mut req = self
            .client
            .get(url)
            .query(&[("api_key", self.api_key.as_str())])
            .timeout(self.fetch_timeout);
        if let Some(page) = page {
            req = req.query(&[("page", page)]);
        }

        debug!(path = %path, page = ?page, "requesting catalog");
        let resp = req.send().await.map_err(|e| self.transport_error(e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SyncError::HttpStatus { status: status.as_u16(), path: path.to_string() });
        }

        let body = resp.bytes().await.map_err(|e| self.transport_error(e))?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(SyncError::EmptyBody { path: path.to_string() });
        }

        Ok(serde_json::from_slice(&body)?)
    }

    fn transport_error(&self, err: reqwest::Error) -> SyncError {
        if err.is_timeout() {
            SyncError::Timeout(self.fetch_timeout)
        } else {
            // The request URL carries the api key.
            SyncError::Network(err.without_url())
        }
    }
}

#[async_trait]
impl MovieCatalog for TmdbClient {
    async fn fetch_list(&self, category: Category) -> Result<Vec<MovieRecord>, SyncError> {
        let path = format!("/movie/{}", category.as_path());
        let mut out = Vec::new();

        for page in 1..=self.list_pages {
            let resp: ResultsPage<TmdbMovie> = self.get_page(&path, Some(page)).await?;
            let last_page = resp.total_pages.unwrap_or(page);
            out.extend(resp.results.into_iter().map(MovieRecord::from));
            if page >= last_page {
                break;
            }
        }

        debug!(category = category.as_path(), movies = out.len(), "fetched movie list");
        Ok(out)
    }

    async fn fetch_videos(&self, movie_id: i64) -> Result<Vec<VideoRecord>, SyncError> {
        let resp: ResultsPage<TmdbVideo> =
            self.get_page(&format!("/movie/{movie_id}/videos"), None).await?;
        Ok(resp.results.into_iter().map(VideoRecord::from).collect())
    }

    async fn fetch_reviews(&self, movie_id: i64) -> Result<Vec<ReviewRecord>, SyncError> {
        let resp: ResultsPage<TmdbReview> =
            self.get_page(&format!("/movie/{movie_id}/reviews"), None).await?;
        Ok(resp.results.into_iter().map(ReviewRecord::from).collect())
    }
}

#[derive(Debug, Deserialize)]
struct ResultsPage<T> {
    results: Vec<T>,
    total_pages: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct TmdbMovie {
    id: i64,
    title: Option<String>,
    overview: Option<String>,
    poster_path: Option<String>,
    release_date: Option<String>,
    vote_average: Option<f64>,
}

impl From<TmdbMovie> for MovieRecord {
    fn from(m: TmdbMovie) -> Self {
        Self {
            movie_id: m.id,
            title: m.title.unwrap_or_default(),
            overview: m.overview.unwrap_or_default(),
            poster_path: m.poster_path.filter(|p| !p.trim().is_empty()),
            release_date: m.release_date.filter(|d| !d.trim().is_empty()),
            rating: m.vote_average.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TmdbVideo {
    id: String,
    key: String,
    name: Option<String>,
    site: Option<String>,
}

impl From<TmdbVideo> for VideoRecord {
    fn from(v: TmdbVideo) -> Self {
        Self { video_id: v.id, video_key: v.key, name: v.name, site: v.site }
    }
}

#[derive(Debug, Deserialize)]
struct TmdbReview {
    id: String,
    author: Option<String>,
    content: Option<String>,
    url: Option<String>,
}

impl From<TmdbReview> for ReviewRecord {
    fn from(r: TmdbReview) -> Self {
        Self {
            review_id: r.id,
            author: r.author.unwrap_or_default(),
            content: r.content.unwrap_or_default(),
            url: r.url,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use axum::{
        Json, Router,
        extract::{Path, Query},
        http::StatusCode,
        response::{IntoResponse, Response},
        routing::get,
    };
    use serde_json::json;

    use super::*;

    const KEY: &str = "test-key";

    fn authorized(q: &HashMap<String, String>) -> bool {
        q.get("api_key").map(String::as_str) == Some(KEY)
    }

    async fn popular(Query(q): Query<HashMap<String, String>>) -> Response {
        if !authorized(&q) {
            return StatusCode::UNAUTHORIZED.into_response();
        }
        let page: u32 = q.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
        let results = match page {
            1 => json!([{
                "id": 550,
                "title": "Fight Club",
                "overview": "An insomniac office worker...",
                "poster_path": "/pB8BM7pdSp6B6Ih7QZ4DrQ3PmJK.jpg",
                "release_date": "1999-10-15",
                "vote_average": 8.4
            }]),
            _ => json!([{
                "id": 13,
                "title": "Forrest Gump",
                "poster_path": null,
                "release_date": ""
            }]),
        };
        Json(json!({ "page": page, "results": results, "total_pages": 2 })).into_response()
    }

    async fn top_rated() -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    async fn videos(Path(id): Path<i64>) -> Response {
        match id {
            550 => Json(json!({
                "id": 550,
                "results": [
                    {
                        "id": "abc",
                        "key": "SUXWAEX2jlg",
                        "name": "Trailer",
                        "site": "YouTube",
                        "type": "Trailer"
                    },
                    { "id": "def", "key": "qtRKdVHc-cE" }
                ]
            }))
            .into_response(),
            1 => "{\"results\": [".into_response(),
            _ => "  ".into_response(),
        }
    }

    async fn reviews(Path(id): Path<i64>) -> Response {
        if id == 3 {
            tokio::time::sleep(Duration::from_secs(2)).await;
        }
        Json(json!({
            "results": [{
                "id": "r1",
                "author": "Goddard",
                "content": "Pretty awesome movie.",
                "url": "https://www.themoviedb.org/review/r1"
            }]
        }))
        .into_response()
    }

    async fn serve() -> String {
        let app = Router::new()
            .route("/movie/popular", get(popular))
            .route("/movie/top_rated", get(top_rated))
            .route("/movie/{id}/videos", get(videos))
            .route("/movie/{id}/reviews", get(reviews));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{addr}")
    }

    fn client(base_url: String, key: &str) -> TmdbClient {
        TmdbClient::new(reqwest::Client::new(), key.to_string(), base_url, 100)
            .with_fetch_timeout(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn fetch_list_follows_pages_up_to_total() {
        let tmdb = client(serve().await, KEY).with_list_pages(5);
        let movies = tmdb.fetch_list(Category::Popular).await.unwrap();

        assert_eq!(movies.iter().map(|m| m.movie_id).collect::<Vec<_>>(), vec![550, 13]);
        assert_eq!(movies[0].title, "Fight Club");
        assert_eq!(movies[0].release_date.as_deref(), Some("1999-10-15"));
        assert!((movies[0].rating - 8.4).abs() < f64::EPSILON);
        assert_eq!(movies[1].poster_path, None);
        assert_eq!(movies[1].release_date, None);
    }

    #[tokio::test]
    async fn fetch_list_reads_first_page_by_default() {
        let tmdb = client(serve().await, KEY);
        let movies = tmdb.fetch_list(Category::Popular).await.unwrap();
        assert_eq!(movies.len(), 1);
    }

    #[tokio::test]
    async fn rejected_key_is_http_status_without_leaking_key() {
        let tmdb = client(serve().await, "wrong-key");
        let err = tmdb.fetch_list(Category::Popular).await.unwrap_err();

        assert!(matches!(err, SyncError::HttpStatus { status: 401, .. }));
        assert_eq!(err.kind(), "fetch_failed");
        assert!(!err.to_string().contains("wrong-key"));
    }

    #[tokio::test]
    async fn server_error_is_fetch_failed() {
        let tmdb = client(serve().await, KEY);
        let err = tmdb.fetch_list(Category::TopRated).await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::HttpStatus { status: 500, ref path } if path == "/movie/top_rated"
        ));
    }

    #[tokio::test]
    async fn fetch_videos_decodes_results() {
        let tmdb = client(serve().await, KEY);
        let videos = tmdb.fetch_videos(550).await.unwrap();

        assert_eq!(videos.len(), 2);
        assert_eq!(videos[0].video_id, "abc");
        assert_eq!(videos[0].video_key, "SUXWAEX2jlg");
        assert_eq!(videos[0].site.as_deref(), Some("YouTube"));
        assert_eq!(videos[1].name, None);
    }

    #[tokio::test]
    async fn malformed_payload_is_parse_error() {
        let tmdb = client(serve().await, KEY);
        let err = tmdb.fetch_videos(1).await.unwrap_err();
        assert!(matches!(err, SyncError::Parse(_)));
    }

    #[tokio::test]
    async fn blank_body_is_empty_body_error() {
        let tmdb = client(serve().await, KEY);
        let err = tmdb.fetch_videos(2).await.unwrap_err();
        assert!(matches!(err, SyncError::EmptyBody { .. }));
    }

    #[tokio::test]
    async fn fetch_reviews_decodes_results() {
        let tmdb = client(serve().await, KEY);
        let reviews = tmdb.fetch_reviews(550).await.unwrap();
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].author, "Goddard");
        assert_eq!(reviews[0].url.as_deref(), Some("https://www.themoviedb.org/review/r1"));
    }

    #[tokio::test]
    async fn slow_response_times_out() {
        let tmdb = client(serve().await, KEY).with_fetch_timeout(Duration::from_millis(100));
        let err = tmdb.fetch_reviews(3).await.unwrap_err();
        assert!(matches!(err, SyncError::Timeout(_)));
        assert_eq!(err.kind(), "network");
    }

    #[tokio::test]
    async fn unreachable_host_is_network_error() {
        let tmdb = client("http://127.0.0.1:1".to_string(), KEY);
        let err = tmdb.fetch_videos(550).await.unwrap_err();
        assert!(matches!(err, SyncError::Network(_)));
    }
}
