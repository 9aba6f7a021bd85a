//! Client side of voting: an optimistic cache in front of a [`VoteTransport`].
//!
//! The cache lock is only taken for bookkeeping and never held while a
//! request is outstanding, so a slow vote on one item never stalls reads or
//! votes on the rest of the list.

pub mod cache;
pub mod transport;

use thiserror::Error;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::models::{CategoryFilter, MediaItemView, VoteDirection, VoteOutcome};

pub use cache::{SyncStatus, VoteCache, VoteSnapshot, VoteTicket};
pub use transport::{HttpTransport, InProcessTransport, VoteTransport};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("You must be signed in to vote")]
    Unauthorized,

    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("HTTP client error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Unknown media item: {0}")]
    UnknownItem(Uuid),
}

/// Identity handed over by the authentication provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub token: String,
}

struct Session {
    identity: Option<Identity>,
    fetch: CancellationToken,
}

pub struct MediaClient<T> {
    transport: T,
    cache: Mutex<VoteCache>,
    session: Mutex<Session>,
}

impl<T: VoteTransport> MediaClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            cache: Mutex::new(VoteCache::new()),
            session: Mutex::new(Session {
                identity: None,
                fetch: CancellationToken::new(),
            }),
        }
    }

    /// Switches the viewing identity. Any list fetch still running for the
    /// previous identity is cancelled and the cache is emptied.
    pub async fn set_identity(&self, identity: Option<Identity>) {
        let mut session = self.session.lock().await;
        session.fetch.cancel();
        session.fetch = CancellationToken::new();
        session.identity = identity;
        drop(session);

        self.cache.lock().await.clear();
    }

    /// Cancels outstanding list fetches; call when the view goes away.
    pub async fn teardown(&self) {
        self.session.lock().await.fetch.cancel();
    }

    pub async fn identity(&self) -> Option<Identity> {
        self.session.lock().await.identity.clone()
    }

    /// Loads the list for the current identity and installs it as the
    /// confirmed baseline.
    pub async fn refresh(&self) -> Result<(), ClientError> {
        let (identity, token) = {
            let session = self.session.lock().await;
            (session.identity.clone(), session.fetch.clone())
        };

        let items = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(ClientError::Cancelled),
            result = self.transport.fetch_items(identity.as_ref()) => result?,
        };

        // Checked again under the cache lock: an identity switch clears the
        // cache after cancelling, so this result must not land afterwards.
        let mut cache = self.cache.lock().await;
        if token.is_cancelled() {
            return Err(ClientError::Cancelled);
        }
        tracing::debug!(count = items.len(), "media list refreshed");
        cache.replace(items);
        Ok(())
    }

    /// Votes on one item: applied locally at once, then reconciled with the
    /// server answer or rolled back on error. The error is always returned.
    pub async fn vote(
        &self,
        media_id: Uuid,
        direction: VoteDirection,
    ) -> Result<VoteOutcome, ClientError> {
        let identity = self.identity().await.ok_or(ClientError::Unauthorized)?;

        let ticket = self.cache.lock().await.begin_vote(media_id, direction)?;

        match self.transport.cast_vote(&identity, media_id, direction).await {
            Ok(outcome) => {
                self.cache.lock().await.confirm(&ticket, &outcome);
                Ok(outcome)
            }
            Err(e) => {
                tracing::warn!(%media_id, seq = ticket.seq, "vote failed, rolling back: {}", e);
                self.cache.lock().await.fail(&ticket, &e);
                Err(e)
            }
        }
    }

    pub async fn items(&self, filter: CategoryFilter) -> Vec<MediaItemView> {
        self.cache.lock().await.view(filter)
    }

    pub async fn item(&self, media_id: Uuid) -> Option<MediaItemView> {
        self.cache.lock().await.item(media_id).cloned()
    }

    pub async fn status(&self, media_id: Uuid) -> Option<SyncStatus> {
        self.cache.lock().await.status(media_id).cloned()
    }
}
