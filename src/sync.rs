use std::{fmt, sync::Arc, time::Duration};

use futures::{StreamExt, stream};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    catalog::MovieCatalog,
    error::SyncError,
    models::{Category, MovieRef, UpsertCount},
    store::MovieStore,
};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTrigger {
    Periodic,
    Immediate,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SyncJobKind {
    PopularList,
    TopRatedList,
    VideosForMovie(MovieRef),
    ReviewsForMovie(MovieRef),
}

impl fmt::Display for SyncJobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncJobKind::PopularList => f.write_str("popular list"),
            SyncJobKind::TopRatedList => f.write_str("top rated list"),
            SyncJobKind::VideosForMovie(m) => write!(f, "videos for movie {}", m.movie_id),
            SyncJobKind::ReviewsForMovie(m) => write!(f, "reviews for movie {}", m.movie_id),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Reconciled {
    Movies(UpsertCount),
    Videos(u64),
    Reviews(u64),
}

#[derive(Debug)]
pub struct JobOutcome {
    pub kind: SyncJobKind,
    pub result: Result<Reconciled, SyncError>,
}

/// One fetch-and-reconcile unit. A failed fetch leaves the store untouched.
#[derive(Clone, Copy, Debug)]
pub struct SyncJob {
    kind: SyncJobKind,
}

impl SyncJob {
    pub fn new(kind: SyncJobKind) -> Self {
        Self { kind }
    }

    pub async fn run(
        &self,
        catalog: &dyn MovieCatalog,
        store: &MovieStore,
        fetch_timeout: Duration,
    ) -> JobOutcome {
        let result = self.fetch_and_reconcile(catalog, store, fetch_timeout).await;

        match &result {
            Ok(reconciled) => debug!(job = %self.kind, result = ?reconciled, "sync job finished"),
            Err(err) => warn!(job = %self.kind, kind = err.kind(), error = %err, "sync job failed"),
        }

        JobOutcome { kind: self.kind, result }
    }

    async fn fetch_and_reconcile(
        &self,
        catalog: &dyn MovieCatalog,
        store: &MovieStore,
        fetch_timeout: Duration,
    ) -> Result<Reconciled, SyncError> {
        match self.kind {
            SyncJobKind::PopularList => {
                sync_list(catalog, store, Category::Popular, fetch_timeout).await
            },
            SyncJobKind::TopRatedList => {
                sync_list(catalog, store, Category::TopRated, fetch_timeout).await
            },
            SyncJobKind::VideosForMovie(movie) => {
                let videos = bounded(fetch_timeout, catalog.fetch_videos(movie.movie_id)).await?;
                Ok(Reconciled::Videos(store.insert_videos_if_absent(movie.row_id, &videos).await?))
            },
            SyncJobKind::ReviewsForMovie(movie) => {
                let reviews = bounded(fetch_timeout, catalog.fetch_reviews(movie.movie_id)).await?;
                let inserted = store.insert_reviews_if_absent(movie.row_id, &reviews).await?;
                Ok(Reconciled::Reviews(inserted))
            },
        }
    }
}

async fn sync_list(
    catalog: &dyn MovieCatalog,
    store: &MovieStore,
    category: Category,
    fetch_timeout: Duration,
) -> Result<Reconciled, SyncError> {
    let movies = bounded(fetch_timeout, catalog.fetch_list(category)).await?;
    Ok(Reconciled::Movies(store.upsert_movies(category, &movies).await?))
}

async fn bounded<T>(
    timeout: Duration,
    fetch: impl Future<Output = Result<T, SyncError>>,
) -> Result<T, SyncError> {
    tokio::time::timeout(timeout, fetch).await.map_err(|_| SyncError::Timeout(timeout))?
}

#[derive(Clone, Debug, Serialize)]
pub struct JobFailure {
    pub job: String,
    pub kind: &'static str,
    pub error: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct SyncSummary {
    pub trigger: SyncTrigger,
    pub started_at: jiff::Timestamp,
    pub finished_at: jiff::Timestamp,
    pub jobs_succeeded: usize,
    pub jobs_failed: usize,
    pub movies_inserted: u64,
    pub movies_updated: u64,
    pub videos_inserted: u64,
    pub reviews_inserted: u64,
    pub failures: Vec<JobFailure>,
}

impl SyncSummary {
    fn start(trigger: SyncTrigger) -> Self {
        let now = jiff::Timestamp::now();
        Self {
            trigger,
            started_at: now,
            finished_at: now,
            jobs_succeeded: 0,
            jobs_failed: 0,
            movies_inserted: 0,
            movies_updated: 0,
            videos_inserted: 0,
            reviews_inserted: 0,
            failures: Vec::new(),
        }
    }

    fn record(&mut self, outcome: JobOutcome) {
        match outcome.result {
            Ok(Reconciled::Movies(count)) => {
                self.jobs_succeeded += 1;
                self.movies_inserted += count.inserted;
                self.movies_updated += count.updated;
            },
            Ok(Reconciled::Videos(n)) => {
                self.jobs_succeeded += 1;
                self.videos_inserted += n;
            },
            Ok(Reconciled::Reviews(n)) => {
                self.jobs_succeeded += 1;
                self.reviews_inserted += n;
            },
            Err(err) => self.record_failure(outcome.kind.to_string(), &err),
        }
    }

    fn record_failure(&mut self, job: String, err: &SyncError) {
        self.jobs_failed += 1;
        self.failures.push(JobFailure { job, kind: err.kind(), error: err.to_string() });
    }
}

/// Drives one full sync pass: list jobs first, then per-movie jobs for every
/// stored movie with bounded concurrency.
pub struct SyncOrchestrator {
    catalog: Arc<dyn MovieCatalog>,
    store: MovieStore,
    max_concurrent: usize,
    fetch_timeout: Duration,
}

impl SyncOrchestrator {
    pub fn new(
        catalog: Arc<dyn MovieCatalog>,
        store: MovieStore,
        max_concurrent: usize,
        fetch_timeout: Duration,
    ) -> Self {
        Self { catalog, store, max_concurrent: max_concurrent.max(1), fetch_timeout }
    }

    /// Never fails; partial failures are reported in the summary.
    pub async fn run_sync(&self, trigger: SyncTrigger) -> SyncSummary {
        let mut summary = SyncSummary::start(trigger);
        info!(trigger = ?trigger, "sync pass started");

        for kind in [SyncJobKind::PopularList, SyncJobKind::TopRatedList] {
            let outcome = SyncJob::new(kind)
                .run(self.catalog.as_ref(), &self.store, self.fetch_timeout)
                .await;
            summary.record(outcome);
        }

        let movies = match self.store.list_all_movies().await {
            Ok(movies) => movies,
            Err(err) => {
                let err = SyncError::from(err);
                warn!(error = %err, "failed to enumerate movies");
                summary.record_failure("enumerate movies".to_string(), &err);
                return self.finish(summary);
            },
        };

        debug!(
            movies = movies.len(),
            max_concurrent = self.max_concurrent,
            "running per-movie jobs"
        );

        let jobs = movies.into_iter().flat_map(|movie| {
            [
                SyncJob::new(SyncJobKind::VideosForMovie(movie)),
                SyncJob::new(SyncJobKind::ReviewsForMovie(movie)),
            ]
        });

        let outcomes: Vec<JobOutcome> = stream::iter(jobs)
            .map(|job| {
                let catalog = Arc::clone(&self.catalog);
                let store = self.store.clone();
                let fetch_timeout = self.fetch_timeout;
                async move { job.run(catalog.as_ref(), &store, fetch_timeout).await }
            })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;

        for outcome in outcomes {
            summary.record(outcome);
        }

        self.finish(summary)
    }

    fn finish(&self, mut summary: SyncSummary) -> SyncSummary {
        summary.finished_at = jiff::Timestamp::now();
        info!(
            succeeded = summary.jobs_succeeded,
            failed = summary.jobs_failed,
            movies_inserted = summary.movies_inserted,
            movies_updated = summary.movies_updated,
            videos_inserted = summary.videos_inserted,
            reviews_inserted = summary.reviews_inserted,
            "sync pass completed"
        );
        summary
    }
}
