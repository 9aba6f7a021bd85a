use uuid::Uuid;
use validator::Validate;

use crate::{
    error::Result,
    models::{CategoryFilter, CreateMediaRequest, MediaItem, MediaItemView, UserVote},
    repository::MediaRepository,
};

pub async fn list_media(
    repo: &dyn MediaRepository,
    viewer: Option<Uuid>,
    filter: CategoryFilter,
) -> Result<Vec<MediaItemView>> {
    repo.fetch_items_with_votes(viewer, filter).await
}

pub async fn create_media(
    repo: &dyn MediaRepository,
    owner: Uuid,
    payload: &CreateMediaRequest,
) -> Result<MediaItem> {
    payload.validate()?;

    let media = repo.create_item(owner, payload).await?;
    tracing::info!(media_id = %media.id, %owner, "media item created");

    Ok(media)
}

pub async fn votes_of(repo: &dyn MediaRepository, user_id: Uuid) -> Result<Vec<UserVote>> {
    repo.user_votes(user_id).await
}
