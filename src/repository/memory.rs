use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::{
        CategoryFilter, CreateMediaRequest, LedgerChange, MediaItem, MediaItemView, UserVote,
        VoteDirection, VoteOutcome, VoteRecord, VoteState,
    },
    repository::MediaRepository,
};

/// One item together with its slice of the ledger, guarded by a single lock.
#[derive(Debug)]
struct Entry {
    item: MediaItem,
    ledger: HashMap<Uuid, VoteRecord>,
}

/// Process-local backend. Votes on different items only contend on the
/// shared map's read lock.
#[derive(Debug, Default)]
pub struct MemoryMediaRepository {
    items: RwLock<HashMap<Uuid, Arc<Mutex<Entry>>>>,
}

impl MemoryMediaRepository {
    pub fn new() -> Self {
        Self::default()
    }

    async fn entry(&self, media_id: Uuid) -> Result<Arc<Mutex<Entry>>> {
        self.items
            .read()
            .await
            .get(&media_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("Media item not found".to_string()))
    }

    /// Stored aggregate and ledger sum for an item, for consistency audits.
    pub async fn audit(&self, media_id: Uuid) -> Result<(i32, i32)> {
        let entry = self.entry(media_id).await?;
        let entry = entry.lock().await;
        let sum = entry
            .ledger
            .values()
            .map(|r| i32::from(r.vote_value))
            .sum();
        Ok((entry.item.vote_count, sum))
    }
}

#[async_trait]
impl MediaRepository for MemoryMediaRepository {
    async fn cast_vote(
        &self,
        user_id: Uuid,
        media_id: Uuid,
        direction: VoteDirection,
    ) -> Result<VoteOutcome> {
        let entry = self.entry(media_id).await?;
        let mut entry = entry.lock().await;

        let state = entry
            .ledger
            .get(&user_id)
            .map(VoteRecord::state)
            .unwrap_or(VoteState::NoVote);
        let transition = state.apply(direction);
        let now = Utc::now();

        match transition.change {
            LedgerChange::Insert => {
                entry.ledger.insert(
                    user_id,
                    VoteRecord {
                        id: Uuid::new_v4(),
                        user_id,
                        media_id,
                        vote_value: direction.value(),
                        created_at: now,
                        updated_at: now,
                    },
                );
            }
            LedgerChange::Delete => {
                entry.ledger.remove(&user_id);
            }
            LedgerChange::Switch => {
                if let Some(record) = entry.ledger.get_mut(&user_id) {
                    record.vote_value = direction.value();
                    record.updated_at = now;
                }
            }
        }

        entry.item.vote_count += transition.delta;
        entry.item.updated_at = now;

        tracing::debug!(
            %user_id,
            %media_id,
            delta = transition.delta,
            vote_count = entry.item.vote_count,
            "vote applied"
        );

        Ok(VoteOutcome {
            accepted: true,
            delta: transition.delta,
            vote_count: entry.item.vote_count,
            user_vote: transition.to.direction(),
        })
    }

    async fn fetch_items_with_votes(
        &self,
        viewer: Option<Uuid>,
        filter: CategoryFilter,
    ) -> Result<Vec<MediaItemView>> {
        let entries: Vec<_> = self.items.read().await.values().cloned().collect();

        let mut rows = Vec::with_capacity(entries.len());
        for entry in entries {
            let entry = entry.lock().await;
            if !filter.matches(entry.item.category) {
                continue;
            }
            let vote = viewer
                .and_then(|user_id| entry.ledger.get(&user_id))
                .and_then(|r| VoteDirection::from_value(i64::from(r.vote_value)));
            rows.push((
                entry.item.created_at,
                MediaItemView::from_item(&entry.item, vote),
            ));
        }

        rows.sort_by(|(a_created, a), (b_created, b)| {
            b.vote_count
                .cmp(&a.vote_count)
                .then_with(|| b_created.cmp(a_created))
        });

        Ok(rows.into_iter().map(|(_, view)| view).collect())
    }

    async fn create_item(&self, owner: Uuid, item: &CreateMediaRequest) -> Result<MediaItem> {
        let now = Utc::now();
        let media = MediaItem {
            id: Uuid::new_v4(),
            user_id: owner,
            title: item.title.clone(),
            url: item.url.clone(),
            description: item.description.clone(),
            category: item.category,
            image_url: item.image.clone(),
            vote_count: 0,
            created_at: now,
            updated_at: now,
        };

        self.items.write().await.insert(
            media.id,
            Arc::new(Mutex::new(Entry {
                item: media.clone(),
                ledger: HashMap::new(),
            })),
        );

        Ok(media)
    }

    async fn user_votes(&self, user_id: Uuid) -> Result<Vec<UserVote>> {
        let entries: Vec<_> = self.items.read().await.values().cloned().collect();

        let mut votes = Vec::new();
        for entry in entries {
            let entry = entry.lock().await;
            if let Some(record) = entry.ledger.get(&user_id) {
                if let Some(vote_type) = VoteDirection::from_value(i64::from(record.vote_value)) {
                    votes.push((record.created_at, UserVote {
                        media_id: record.media_id,
                        vote_type,
                    }));
                }
            }
        }

        votes.sort_by(|(a, _), (b, _)| b.cmp(a));
        Ok(votes.into_iter().map(|(_, v)| v).collect())
    }
}
