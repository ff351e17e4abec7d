use async_trait::async_trait;

use crate::{
    error::SyncError,
    models::{Category, MovieRecord, ReviewRecord, VideoRecord},
};

/// Read side of the remote movie catalog.
#[async_trait]
pub trait MovieCatalog: Send + Sync {
    async fn fetch_list(&self, category: Category) -> Result<Vec<MovieRecord>, SyncError>;

    async fn fetch_videos(&self, movie_id: i64) -> Result<Vec<VideoRecord>, SyncError>;

    async fn fetch_reviews(&self, movie_id: i64) -> Result<Vec<ReviewRecord>, SyncError>;
}

#[cfg(test)]
pub(crate) mod fake {
    use std::{
        collections::{HashMap, HashSet},
        sync::{
            Arc, Mutex,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };

    use tokio::sync::Semaphore;

    use super::*;

    /// Scripted catalog: canned responses, per-movie failures and stalls,
    /// and an optional gate that holds list fetches until a permit is added.
    #[derive(Default)]
    pub(crate) struct FakeCatalog {
        lists: Mutex<HashMap<Category, Vec<MovieRecord>>>,
        videos: Mutex<HashMap<i64, Vec<VideoRecord>>>,
        reviews: Mutex<HashMap<i64, Vec<ReviewRecord>>>,
        failing_reviews: Mutex<HashSet<i64>>,
        stalled_reviews: Mutex<HashSet<i64>>,
        failing_lists: Mutex<HashSet<Category>>,
        gate: Option<Arc<Semaphore>>,
        list_calls: AtomicUsize,
    }

    impl FakeCatalog {
        pub(crate) fn gated(gate: Arc<Semaphore>) -> Self {
            Self { gate: Some(gate), ..Default::default() }
        }

        pub(crate) fn set_list(&self, category: Category, movies: Vec<MovieRecord>) {
            self.lists.lock().unwrap().insert(category, movies);
        }

        pub(crate) fn set_videos(&self, movie_id: i64, videos: Vec<VideoRecord>) {
            self.videos.lock().unwrap().insert(movie_id, videos);
        }

        pub(crate) fn set_reviews(&self, movie_id: i64, reviews: Vec<ReviewRecord>) {
            self.reviews.lock().unwrap().insert(movie_id, reviews);
        }

        pub(crate) fn fail_reviews(&self, movie_id: i64) {
            self.failing_reviews.lock().unwrap().insert(movie_id);
        }

        pub(crate) fn stall_reviews(&self, movie_id: i64) {
            self.stalled_reviews.lock().unwrap().insert(movie_id);
        }

        pub(crate) fn fail_list(&self, category: Category) {
            self.failing_lists.lock().unwrap().insert(category);
        }

        pub(crate) fn list_calls(&self) -> usize {
            self.list_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MovieCatalog for FakeCatalog {
        async fn fetch_list(&self, category: Category) -> Result<Vec<MovieRecord>, SyncError> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                let _permit = gate.acquire().await.expect("gate closed");
            }
            if self.failing_lists.lock().unwrap().contains(&category) {
                return Err(SyncError::HttpStatus {
                    status: 503,
                    path: format!("/movie/{}", category.as_path()),
                });
            }
            Ok(self.lists.lock().unwrap().get(&category).cloned().unwrap_or_default())
        }

        async fn fetch_videos(&self, movie_id: i64) -> Result<Vec<VideoRecord>, SyncError> {
            Ok(self.videos.lock().unwrap().get(&movie_id).cloned().unwrap_or_default())
        }

        async fn fetch_reviews(&self, movie_id: i64) -> Result<Vec<ReviewRecord>, SyncError> {
            if self.failing_reviews.lock().unwrap().contains(&movie_id) {
                return Err(SyncError::Timeout(Duration::from_millis(1)));
            }
            let stalled = self.stalled_reviews.lock().unwrap().contains(&movie_id);
            if stalled {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            Ok(self.reviews.lock().unwrap().get(&movie_id).cloned().unwrap_or_default())
        }
    }
}
