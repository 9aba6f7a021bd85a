use std::{sync::Arc, time::Duration};

use rand::Rng;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::{VoteDirection, VoteOutcome},
    repository::MediaRepository,
};

const BACKOFF_BASE_MS: u64 = 5;

/// Server side of voting: checks the caller, parses the direction and drives
/// the repository transaction, retrying contention a bounded number of times.
pub struct VoteReconciler {
    repo: Arc<dyn MediaRepository>,
    max_retries: u32,
}

impl VoteReconciler {
    pub fn new(repo: Arc<dyn MediaRepository>, max_retries: u32) -> Self {
        Self { repo, max_retries }
    }

    pub async fn cast_vote(
        &self,
        identity: Option<Uuid>,
        media_id: Uuid,
        direction: &Value,
    ) -> Result<VoteOutcome> {
        let user_id =
            identity.ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))?;
        let direction = VoteDirection::from_json(direction)?;

        self.cast(user_id, media_id, direction).await
    }

    pub async fn cast(
        &self,
        user_id: Uuid,
        media_id: Uuid,
        direction: VoteDirection,
    ) -> Result<VoteOutcome> {
        let mut attempt = 0;
        loop {
            match self.repo.cast_vote(user_id, media_id, direction).await {
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(%media_id, attempt, "vote contention, retrying: {}", e);
                    tokio::time::sleep(backoff(attempt)).await;
                }
                Err(e) => {
                    if e.is_retryable() {
                        tracing::error!(%media_id, attempt, "vote retries exhausted: {}", e);
                    }
                    return Err(e);
                }
                Ok(outcome) => return Ok(outcome),
            }
        }
    }
}

fn backoff(attempt: u32) -> Duration {
    let exp = BACKOFF_BASE_MS << attempt.min(6);
    let jitter = rand::rng().random_range(0..BACKOFF_BASE_MS);
    Duration::from_millis(exp + jitter)
}
