use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::{
    client::{ClientError, Identity},
    error::AppError,
    models::{CategoryFilter, MediaItemView, MediaListResponse, VoteDirection, VoteOutcome},
    repository::MediaRepository,
    services::vote_service::VoteReconciler,
};

/// How the client reaches the vote service.
#[async_trait]
pub trait VoteTransport: Send + Sync {
    async fn fetch_items(&self, identity: Option<&Identity>) -> Result<Vec<MediaItemView>, ClientError>;

    async fn cast_vote(
        &self,
        identity: &Identity,
        media_id: Uuid,
        direction: VoteDirection,
    ) -> Result<VoteOutcome, ClientError>;
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::UNAUTHORIZED {
            return Err(ClientError::Unauthorized);
        }

        let message = response
            .json::<ErrorBody>()
            .await
            .map(|b| b.error)
            .unwrap_or_else(|_| status.to_string());

        Err(ClientError::Server {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl VoteTransport for HttpTransport {
    async fn fetch_items(&self, identity: Option<&Identity>) -> Result<Vec<MediaItemView>, ClientError> {
        let mut request = self.http.get(format!("{}/api/media", self.base_url));
        if let Some(identity) = identity {
            request = request.bearer_auth(&identity.token);
        }

        let response = Self::check(request.send().await?).await?;
        let body: MediaListResponse = response.json().await?;
        Ok(body.media)
    }

    async fn cast_vote(
        &self,
        identity: &Identity,
        media_id: Uuid,
        direction: VoteDirection,
    ) -> Result<VoteOutcome, ClientError> {
        let response = self
            .http
            .post(format!("{}/api/media/vote", self.base_url))
            .bearer_auth(&identity.token)
            .json(&json!({ "media_id": media_id, "direction": direction }))
            .send()
            .await?;

        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }
}

/// Talks to the reconciler directly, for embedding the service in-process.
pub struct InProcessTransport {
    repo: Arc<dyn MediaRepository>,
    votes: Arc<VoteReconciler>,
}

impl InProcessTransport {
    pub fn new(repo: Arc<dyn MediaRepository>, votes: Arc<VoteReconciler>) -> Self {
        Self { repo, votes }
    }
}

impl From<AppError> for ClientError {
    fn from(error: AppError) -> Self {
        let status = match &error {
            AppError::Unauthorized(_) | AppError::Jwt(_) => return ClientError::Unauthorized,
            AppError::NotFound(_) => 404,
            AppError::InvalidArgument(_) => 400,
            AppError::Conflict(_) => 409,
            AppError::RateLimit => 429,
            AppError::TransientStoreFailure(_) => 503,
            _ => 500,
        };
        ClientError::Server {
            status,
            message: error.to_string(),
        }
    }
}

#[async_trait]
impl VoteTransport for InProcessTransport {
    async fn fetch_items(&self, identity: Option<&Identity>) -> Result<Vec<MediaItemView>, ClientError> {
        Ok(self
            .repo
            .fetch_items_with_votes(identity.map(|i| i.user_id), CategoryFilter::All)
            .await?)
    }

    async fn cast_vote(
        &self,
        identity: &Identity,
        media_id: Uuid,
        direction: VoteDirection,
    ) -> Result<VoteOutcome, ClientError> {
        Ok(self.votes.cast(identity.user_id, media_id, direction).await?)
    }
}
