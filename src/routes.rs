use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use crate::{
    AppState,
    error::{AppError, AppResult},
    models::{MovieDetail, MovieListFilter, MovieSummary, ReviewRecord, VideoRecord},
    scheduler::SchedulerStatus,
};

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/movies", get(list_movies))
        .route("/movies/{movie_id}", get(movie_detail))
        .route("/movies/{movie_id}/favorite", post(toggle_favorite))
        .route("/sync", get(sync_status).post(trigger_sync))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    category: Option<MovieListFilter>,
}

pub async fn list_movies(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ListQuery>,
) -> AppResult<Json<Vec<MovieSummary>>> {
    let filter = q.category.unwrap_or(MovieListFilter::Popular);
    let movies = state.store.list_movies(filter).await?;
    Ok(Json(movies.into_iter().map(MovieSummary::from).collect()))
}

pub async fn movie_detail(
    State(state): State<Arc<AppState>>,
    Path(movie_id): Path<i64>,
) -> AppResult<Json<MovieDetail>> {
    let Some((movie, videos, reviews)) = state.store.movie_detail(movie_id).await? else {
        return Err(AppError::not_found(format!("movie {movie_id} not found")));
    };

    Ok(Json(MovieDetail {
        movie: movie.into(),
        videos: videos.into_iter().map(VideoRecord::from).collect(),
        reviews: reviews.into_iter().map(ReviewRecord::from).collect(),
    }))
}

#[derive(Debug, Serialize)]
pub struct FavoriteResponse {
    movie_id: i64,
    favorite: bool,
}

pub async fn toggle_favorite(
    State(state): State<Arc<AppState>>,
    Path(movie_id): Path<i64>,
) -> AppResult<Json<FavoriteResponse>> {
    let Some(favorite) = state.store.toggle_favorite(movie_id).await? else {
        return Err(AppError::not_found(format!("movie {movie_id} not found")));
    };
    Ok(Json(FavoriteResponse { movie_id, favorite }))
}

#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    started: bool,
}

pub async fn trigger_sync(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<TriggerResponse>) {
    let started = state.scheduler.spawn_immediate();
    (StatusCode::ACCEPTED, Json(TriggerResponse { started }))
}

pub async fn sync_status(State(state): State<Arc<AppState>>) -> Json<SchedulerStatus> {
    Json(state.scheduler.status())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::{
        body::{Body, to_bytes},
        http::Request,
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::{
        catalog::fake::FakeCatalog,
        db::test_db,
        models::Category,
        scheduler::Scheduler,
        store::{
            MovieStore,
            tests::{movie, video},
        },
        sync::SyncOrchestrator,
    };

    async fn app() -> (Router, MovieStore) {
        let store = MovieStore::new(test_db().await);
        let orchestrator = Arc::new(SyncOrchestrator::new(
            Arc::new(FakeCatalog::default()),
            store.clone(),
            2,
            Duration::from_secs(5),
        ));
        let scheduler = Arc::new(Scheduler::new(
            orchestrator,
            Duration::from_secs(3600),
            Duration::from_secs(600),
        ));
        let state = Arc::new(AppState { store: store.clone(), scheduler });
        (router(state), store)
    }

    async fn send(app: Router, method: &str, uri: &str) -> (StatusCode, Value) {
        let req = Request::builder().method(method).uri(uri).body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn favorite_endpoint_toggles_and_lists() {
        let (app, store) = app().await;
        store.upsert_movies(Category::Popular, &[movie(550, "Fight Club", 8.4)]).await.unwrap();

        let (status, body) = send(app.clone(), "POST", "/movies/550/favorite").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["favorite"], true);

        let (_, favorites) = send(app.clone(), "GET", "/movies?category=favorites").await;
        assert_eq!(favorites.as_array().unwrap().len(), 1);
        assert_eq!(favorites[0]["year"], 1999);

        let (_, body) = send(app, "POST", "/movies/550/favorite").await;
        assert_eq!(body["favorite"], false);
    }

    #[tokio::test]
    async fn unknown_movie_is_not_found() {
        let (app, _) = app().await;
        let (status, body) = send(app.clone(), "POST", "/movies/404/favorite").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("404"));

        let (status, _) = send(app, "GET", "/movies/404").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn detail_includes_videos_and_poster_url() {
        let (app, store) = app().await;
        store.upsert_movies(Category::TopRated, &[movie(550, "Fight Club", 8.4)]).await.unwrap();
        let key = store.list_all_movies().await.unwrap()[0].row_id;
        store.insert_videos_if_absent(key, &[video("abc")]).await.unwrap();

        let (status, body) = send(app, "GET", "/movies/550").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Fight Club");
        assert_eq!(body["poster_url"], "https://image.tmdb.org/t/p/w185/550.jpg");
        assert_eq!(body["videos"][0]["video_id"], "abc");
        assert_eq!(body["reviews"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn sync_endpoint_starts_a_background_pass() {
        let (app, _) = app().await;
        let (status, body) = send(app.clone(), "POST", "/sync").await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["started"], true);

        let (status, body) = send(app, "GET", "/sync").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["interval_secs"], 3600);
    }
}
