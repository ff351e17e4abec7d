use std::collections::BTreeMap;

use sea_orm::{
    ActiveValue::Set, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, ModelTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
    sea_query::{Expr, OnConflict},
};

use crate::{
    entities::{movie, review, video},
    models::{
        Category, MovieListFilter, MovieRecord, MovieRef, ReviewRecord, UpsertCount, VideoRecord,
    },
};

// Keeps multi-row inserts well under SQLite's bound-parameter limit.
const INSERT_CHUNK: usize = 200;

#[derive(Clone)]
pub struct MovieStore {
    db: DatabaseConnection,
}

impl MovieStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Inserts new movies and refreshes known ones, keyed by `movie_id`.
    ///
    /// `favorite` and the membership flag of the other category are never part
    /// of the update set, so user toggles survive any number of re-syncs.
    pub async fn upsert_movies(
        &self,
        category: Category,
        records: &[MovieRecord],
    ) -> Result<UpsertCount, DbErr> {
        let by_id: BTreeMap<i64, &MovieRecord> = records.iter().map(|r| (r.movie_id, r)).collect();
        if by_id.is_empty() {
            return Ok(UpsertCount::default());
        }

        let now = now_sec();
        let category_column = match category {
            Category::Popular => movie::Column::Popular,
            Category::TopRated => movie::Column::TopRated,
        };

        let models: Vec<movie::ActiveModel> = by_id
            .values()
            .map(|r| movie::ActiveModel {
                id: Default::default(),
                movie_id: Set(r.movie_id),
                title: Set(r.title.clone()),
                overview: Set(r.overview.clone()),
                poster_path: Set(r.poster_path.clone()),
                release_date: Set(r.release_date.clone()),
                rating: Set(r.rating),
                popular: Set(category == Category::Popular),
                top_rated: Set(category == Category::TopRated),
                favorite: Set(false),
                updated_at: Set(now),
            })
            .collect();

        let txn = self.db.begin().await?;

        let existing = movie::Entity::find()
            .filter(movie::Column::MovieId.is_in(by_id.keys().copied()))
            .count(&txn)
            .await?;

        for chunk in models.chunks(INSERT_CHUNK) {
            movie::Entity::insert_many(chunk.to_vec())
                .on_conflict(
                    OnConflict::column(movie::Column::MovieId)
                        .update_columns([
                            movie::Column::Title,
                            movie::Column::Overview,
                            movie::Column::PosterPath,
                            movie::Column::ReleaseDate,
                            movie::Column::Rating,
                            category_column,
                            movie::Column::UpdatedAt,
                        ])
                        .to_owned(),
                )
                .exec_without_returning(&txn)
                .await?;
        }

        txn.commit().await?;

        let total = by_id.len() as u64;
        Ok(UpsertCount { inserted: total.saturating_sub(existing), updated: existing })
    }

    /// Inserts videos whose `video_id` is not yet stored for this movie.
    /// Returns the number of rows actually inserted.
    pub async fn insert_videos_if_absent(
        &self,
        movie_key: i32,
        records: &[VideoRecord],
    ) -> Result<u64, DbErr> {
        if records.is_empty() {
            return Ok(0);
        }

        let models: Vec<video::ActiveModel> = records
            .iter()
            .map(|v| video::ActiveModel {
                id: Default::default(),
                movie_key: Set(movie_key),
                video_id: Set(v.video_id.clone()),
                video_key: Set(v.video_key.clone()),
                name: Set(v.name.clone()),
                site: Set(v.site.clone()),
            })
            .collect();

        let txn = self.db.begin().await?;
        let mut inserted = 0;
        for chunk in models.chunks(INSERT_CHUNK) {
            inserted += video::Entity::insert_many(chunk.to_vec())
                .on_conflict(
                    OnConflict::columns([video::Column::MovieKey, video::Column::VideoId])
                        .do_nothing()
                        .to_owned(),
                )
                .exec_without_returning(&txn)
                .await?;
        }
        txn.commit().await?;

        Ok(inserted)
    }

    /// Inserts reviews whose `review_id` is not yet stored for this movie.
    /// Returns the number of rows actually inserted.
    pub async fn insert_reviews_if_absent(
        &self,
        movie_key: i32,
        records: &[ReviewRecord],
    ) -> Result<u64, DbErr> {
        if records.is_empty() {
            return Ok(0);
        }

        let models: Vec<review::ActiveModel> = records
            .iter()
            .map(|r| review::ActiveModel {
                id: Default::default(),
                movie_key: Set(movie_key),
                review_id: Set(r.review_id.clone()),
                author: Set(r.author.clone()),
                content: Set(r.content.clone()),
                url: Set(r.url.clone()),
            })
            .collect();

        let txn = self.db.begin().await?;
        let mut inserted = 0;
        for chunk in models.chunks(INSERT_CHUNK) {
            inserted += review::Entity::insert_many(chunk.to_vec())
                .on_conflict(
                    OnConflict::columns([review::Column::MovieKey, review::Column::ReviewId])
                        .do_nothing()
                        .to_owned(),
                )
                .exec_without_returning(&txn)
                .await?;
        }
        txn.commit().await?;

        Ok(inserted)
    }

    pub async fn list_all_movies(&self) -> Result<Vec<MovieRef>, DbErr> {
        let rows: Vec<(i32, i64)> = movie::Entity::find()
            .select_only()
            .column(movie::Column::Id)
            .column(movie::Column::MovieId)
            .order_by_asc(movie::Column::Id)
            .into_tuple()
            .all(&self.db)
            .await?;

        Ok(rows.into_iter().map(|(row_id, movie_id)| MovieRef { row_id, movie_id }).collect())
    }

    /// Flips `favorite` in a single statement and returns the new value,
    /// or `None` when no movie has this id.
    pub async fn toggle_favorite(&self, movie_id: i64) -> Result<Option<bool>, DbErr> {
        let txn = self.db.begin().await?;

        let res = movie::Entity::update_many()
            .col_expr(movie::Column::Favorite, Expr::col(movie::Column::Favorite).not())
            .filter(movie::Column::MovieId.eq(movie_id))
            .exec(&txn)
            .await?;

        if res.rows_affected == 0 {
            return Ok(None);
        }

        let favorite: Option<bool> = movie::Entity::find()
            .select_only()
            .column(movie::Column::Favorite)
            .filter(movie::Column::MovieId.eq(movie_id))
            .into_tuple()
            .one(&txn)
            .await?;

        txn.commit().await?;

        tracing::debug!(movie_id = movie_id, favorite = ?favorite, "toggled favorite");
        Ok(favorite)
    }

    pub async fn find_movie(&self, movie_id: i64) -> Result<Option<movie::Model>, DbErr> {
        movie::Entity::find().filter(movie::Column::MovieId.eq(movie_id)).one(&self.db).await
    }

    pub async fn list_movies(&self, filter: MovieListFilter) -> Result<Vec<movie::Model>, DbErr> {
        let column = match filter {
            MovieListFilter::Popular => movie::Column::Popular,
            MovieListFilter::TopRated => movie::Column::TopRated,
            MovieListFilter::Favorites => movie::Column::Favorite,
        };

        movie::Entity::find()
            .filter(column.eq(true))
            .order_by_desc(movie::Column::Rating)
            .order_by_asc(movie::Column::Title)
            .all(&self.db)
            .await
    }

    pub async fn movie_detail(
        &self,
        movie_id: i64,
    ) -> Result<Option<(movie::Model, Vec<video::Model>, Vec<review::Model>)>, DbErr> {
        let Some(movie) = self.find_movie(movie_id).await? else {
            return Ok(None);
        };

        let videos = movie
            .find_related(video::Entity)
            .order_by_asc(video::Column::Id)
            .all(&self.db)
            .await?;
        let reviews = movie
            .find_related(review::Entity)
            .order_by_asc(review::Column::Id)
            .all(&self.db)
            .await?;

        Ok(Some((movie, videos, reviews)))
    }
}

fn now_sec() -> i64 {
    jiff::Timestamp::now().as_second()
}
