use serde::{Deserialize, Serialize};

use crate::entities::{movie, review, video};

pub const POSTER_BASE_URL: &str = "https://image.tmdb.org/t/p/w185";

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Popular,
    TopRated,
}

impl Category {
    /// Path segment under `/movie/` on the catalog API.
    pub fn as_path(self) -> &'static str {
        match self {
            Category::Popular => "popular",
            Category::TopRated => "top_rated",
        }
    }
}

/// A movie as returned by a list endpoint, before reconciliation.
#[derive(Clone, Debug, PartialEq)]
pub struct MovieRecord {
    pub movie_id: i64,
    pub title: String,
    pub overview: String,
    pub poster_path: Option<String>,
    pub release_date: Option<String>,
    pub rating: f64,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct VideoRecord {
    pub video_id: String,
    pub video_key: String,
    pub name: Option<String>,
    pub site: Option<String>,
}

impl From<video::Model> for VideoRecord {
    fn from(model: video::Model) -> Self {
        Self {
            video_id: model.video_id,
            video_key: model.video_key,
            name: model.name,
            site: model.site,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ReviewRecord {
    pub review_id: String,
    pub author: String,
    pub content: String,
    pub url: Option<String>,
}

impl From<review::Model> for ReviewRecord {
    fn from(model: review::Model) -> Self {
        Self {
            review_id: model.review_id,
            author: model.author,
            content: model.content,
            url: model.url,
        }
    }
}

/// Surrogate and natural key of a stored movie.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MovieRef {
    pub row_id: i32,
    pub movie_id: i64,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct UpsertCount {
    pub inserted: u64,
    pub updated: u64,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovieListFilter {
    Popular,
    TopRated,
    Favorites,
}

#[derive(Clone, Debug, Serialize)]
pub struct MovieSummary {
    pub movie_id: i64,
    pub title: String,
    pub overview: String,
    pub poster_url: Option<String>,
    pub release_date: Option<String>,
    pub year: Option<i16>,
    pub rating: f64,
    pub popular: bool,
    pub top_rated: bool,
    pub favorite: bool,
}

impl From<movie::Model> for MovieSummary {
    fn from(model: movie::Model) -> Self {
        let year = model.release_date.as_deref().and_then(release_year);
        let poster_url = model.poster_path.as_deref().and_then(poster_url);
        Self {
            movie_id: model.movie_id,
            title: model.title,
            overview: model.overview,
            poster_url,
            release_date: model.release_date,
            year,
            rating: model.rating,
            popular: model.popular,
            top_rated: model.top_rated,
            favorite: model.favorite,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct MovieDetail {
    #[serde(flatten)]
    pub movie: MovieSummary,
    pub videos: Vec<VideoRecord>,
    pub reviews: Vec<ReviewRecord>,
}

/// Release dates are ISO `YYYY-MM-DD`; the year is the leading four characters.
pub fn release_year(release_date: &str) -> Option<i16> {
    release_date.get(..4)?.parse().ok()
}

pub fn poster_url(poster_path: &str) -> Option<String> {
    let path = poster_path.trim();
    if path.is_empty() {
        return None;
    }
    if path.starts_with('/') {
        Some(format!("{POSTER_BASE_URL}{path}"))
    } else {
        Some(format!("{POSTER_BASE_URL}/{path}"))
    }
}
