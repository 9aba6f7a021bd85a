//! Typed access to the vote ledger and media items.
//!
//! Both backends keep `media_items.vote_count` equal to the sum of the item's
//! ledger rows: every ledger mutation and its aggregate delta commit together,
//! and writers on the same item are serialized for the duration.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    error::Result,
    models::{
        CategoryFilter, CreateMediaRequest, MediaItem, MediaItemView, UserVote, VoteDirection,
        VoteOutcome,
    },
};

pub use memory::MemoryMediaRepository;
pub use postgres::PgMediaRepository;

#[async_trait]
pub trait MediaRepository: Send + Sync {
    /// Applies one vote for `user_id` on `media_id` and the matching aggregate delta.
    ///
    /// Returns `NotFound` for an unknown item and `Conflict` when the backend
    /// detected contention it could not serialize; nothing is written in either case.
    async fn cast_vote(
        &self,
        user_id: Uuid,
        media_id: Uuid,
        direction: VoteDirection,
    ) -> Result<VoteOutcome>;

    /// All items ordered by `vote_count` descending, each carrying only the
    /// viewer's own vote.
    async fn fetch_items_with_votes(
        &self,
        viewer: Option<Uuid>,
        filter: CategoryFilter,
    ) -> Result<Vec<MediaItemView>>;

    async fn create_item(&self, owner: Uuid, item: &CreateMediaRequest) -> Result<MediaItem>;

    async fn user_votes(&self, user_id: Uuid) -> Result<Vec<UserVote>>;
}
