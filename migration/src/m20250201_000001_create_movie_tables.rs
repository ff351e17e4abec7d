use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Movie::Table)
                    .if_not_exists()
                    .col(pk_auto(Movie::Id))
                    .col(big_integer_uniq(Movie::MovieId))
                    .col(string(Movie::Title))
                    .col(text(Movie::Overview))
                    .col(string_null(Movie::PosterPath))
                    .col(string_null(Movie::ReleaseDate))
                    .col(double(Movie::Rating))
                    .col(boolean(Movie::Popular).default(false))
                    .col(boolean(Movie::TopRated).default(false))
                    .col(boolean(Movie::Favorite).default(false))
                    .col(big_integer(Movie::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Video::Table)
                    .if_not_exists()
                    .col(pk_auto(Video::Id))
                    .col(integer(Video::MovieKey))
                    .col(string(Video::VideoId))
                    .col(string(Video::VideoKey))
                    .col(string_null(Video::Name))
                    .col(string_null(Video::Site))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_video_movie")
                            .from(Video::Table, Video::MovieKey)
                            .to(Movie::Table, Movie::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Review::Table)
                    .if_not_exists()
                    .col(pk_auto(Review::Id))
                    .col(integer(Review::MovieKey))
                    .col(string(Review::ReviewId))
                    .col(string(Review::Author))
                    .col(text(Review::Content))
                    .col(string_null(Review::Url))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_review_movie")
                            .from(Review::Table, Review::MovieKey)
                            .to(Movie::Table, Movie::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_movie_favorite")
                    .table(Movie::Table)
                    .col(Movie::Favorite)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_video_movie_video_unique")
                    .table(Video::Table)
                    .col(Video::MovieKey)
                    .col(Video::VideoId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_review_movie_review_unique")
                    .table(Review::Table)
                    .col(Review::MovieKey)
                    .col(Review::ReviewId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Review::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Video::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Movie::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Movie {
    Table,
    Id,
    MovieId,
    Title,
    Overview,
    PosterPath,
    ReleaseDate,
    Rating,
    Popular,
    TopRated,
    Favorite,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Video {
    Table,
    Id,
    MovieKey,
    VideoId,
    VideoKey,
    Name,
    Site,
}

#[derive(DeriveIden)]
enum Review {
    Table,
    Id,
    MovieKey,
    ReviewId,
    Author,
    Content,
    Url,
}
