use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::{
        Category, CategoryFilter, CreateMediaRequest, LedgerChange, MediaItem, MediaItemView,
        UserVote, VoteDirection, VoteOutcome, VoteRecord, VoteState,
    },
    repository::MediaRepository,
};

#[derive(Clone)]
pub struct PgMediaRepository {
    db: PgPool,
}

impl PgMediaRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[derive(Debug, FromRow)]
struct MediaItemRow {
    id: Uuid,
    title: String,
    url: String,
    description: String,
    category: Category,
    image_url: Option<String>,
    vote_count: i32,
    user_vote_value: Option<i16>,
}

impl From<MediaItemRow> for MediaItemView {
    fn from(row: MediaItemRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            url: row.url,
            description: row.description,
            category: row.category,
            image: row.image_url,
            vote_count: row.vote_count,
            current_user_vote: row
                .user_vote_value
                .and_then(|v| VoteDirection::from_value(i64::from(v))),
        }
    }
}

#[async_trait]
impl MediaRepository for PgMediaRepository {
    async fn cast_vote(
        &self,
        user_id: Uuid,
        media_id: Uuid,
        direction: VoteDirection,
    ) -> Result<VoteOutcome> {
        let mut tx = self.db.begin().await.map_err(AppError::from_store)?;

        // Row lock on the item serializes every writer of its aggregate until commit.
        let locked: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM media_items WHERE id = $1 FOR UPDATE")
                .bind(media_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(AppError::from_store)?;

        if locked.is_none() {
            return Err(AppError::NotFound("Media item not found".to_string()));
        }

        let existing = sqlx::query_as::<_, VoteRecord>(
            "SELECT * FROM user_votes WHERE user_id = $1 AND media_id = $2",
        )
        .bind(user_id)
        .bind(media_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(AppError::from_store)?;

        let state = existing
            .as_ref()
            .map(VoteRecord::state)
            .unwrap_or(VoteState::NoVote);
        let transition = state.apply(direction);
        let now = chrono::Utc::now();

        match (transition.change, existing) {
            (LedgerChange::Insert, _) => {
                sqlx::query(
                    r#"
                    INSERT INTO user_votes (id, user_id, media_id, vote_value, created_at, updated_at)
                    VALUES ($1, $2, $3, $4, $5, $5)
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(user_id)
                .bind(media_id)
                .bind(direction.value())
                .bind(now)
                .execute(&mut *tx)
                .await
                .map_err(AppError::from_store)?;
            }
            (LedgerChange::Delete, Some(record)) => {
                sqlx::query("DELETE FROM user_votes WHERE id = $1")
                    .bind(record.id)
                    .execute(&mut *tx)
                    .await
                    .map_err(AppError::from_store)?;
            }
            (LedgerChange::Switch, Some(record)) => {
                sqlx::query("UPDATE user_votes SET vote_value = $1, updated_at = $2 WHERE id = $3")
                    .bind(direction.value())
                    .bind(now)
                    .bind(record.id)
                    .execute(&mut *tx)
                    .await
                    .map_err(AppError::from_store)?;
            }
            (change, None) => {
                return Err(AppError::Internal(format!(
                    "{:?} transition without a stored vote",
                    change
                )));
            }
        }

        let vote_count: i32 = sqlx::query_scalar(
            r#"
            UPDATE media_items
            SET vote_count = vote_count + $2, updated_at = $3
            WHERE id = $1
            RETURNING vote_count
            "#,
        )
        .bind(media_id)
        .bind(transition.delta)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::from_store)?;

        tx.commit().await.map_err(AppError::from_store)?;

        tracing::debug!(
            %user_id,
            %media_id,
            delta = transition.delta,
            vote_count,
            "vote applied"
        );

        Ok(VoteOutcome {
            accepted: true,
            delta: transition.delta,
            vote_count,
            user_vote: transition.to.direction(),
        })
    }

    async fn fetch_items_with_votes(
        &self,
        viewer: Option<Uuid>,
        filter: CategoryFilter,
    ) -> Result<Vec<MediaItemView>> {
        let rows = sqlx::query_as::<_, MediaItemRow>(
            r#"
            SELECT
                m.id, m.title, m.url, m.description, m.category, m.image_url, m.vote_count,
                uv.vote_value AS user_vote_value
            FROM media_items m
            LEFT JOIN user_votes uv ON uv.media_id = m.id AND uv.user_id = $1
            WHERE ($2::media_category IS NULL OR m.category = $2)
            ORDER BY m.vote_count DESC, m.created_at DESC
            "#,
        )
        .bind(viewer)
        .bind(filter.category())
        .fetch_all(&self.db)
        .await
        .map_err(AppError::from_store)?;

        Ok(rows.into_iter().map(MediaItemView::from).collect())
    }

    async fn create_item(&self, owner: Uuid, item: &CreateMediaRequest) -> Result<MediaItem> {
        let now = chrono::Utc::now();

        let media = sqlx::query_as::<_, MediaItem>(
            r#"
            INSERT INTO media_items (
                id, user_id, title, url, description, category, image_url,
                vote_count, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, 0, $8, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(owner)
        .bind(&item.title)
        .bind(&item.url)
        .bind(&item.description)
        .bind(item.category)
        .bind(&item.image)
        .bind(now)
        .fetch_one(&self.db)
        .await
        .map_err(AppError::from_store)?;

        Ok(media)
    }

    async fn user_votes(&self, user_id: Uuid) -> Result<Vec<UserVote>> {
        let records = sqlx::query_as::<_, VoteRecord>(
            "SELECT * FROM user_votes WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await
        .map_err(AppError::from_store)?;

        Ok(records
            .into_iter()
            .filter_map(|r| {
                VoteDirection::from_value(i64::from(r.vote_value)).map(|vote_type| UserVote {
                    media_id: r.media_id,
                    vote_type,
                })
            })
            .collect())
    }
}
