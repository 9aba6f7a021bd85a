pub mod auth;
pub mod client;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod models;
pub mod redis;
pub mod repository;
pub mod services;

use axum::{
    Router,
    http::{
        HeaderValue, Method,
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{get, post},
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    config::Config, redis::RedisClient, repository::MediaRepository,
    services::vote_service::VoteReconciler,
};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn MediaRepository>,
    pub votes: Arc<VoteReconciler>,
    pub redis: Option<Arc<RedisClient>>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(
        repo: Arc<dyn MediaRepository>,
        redis: Option<Arc<RedisClient>>,
        config: Config,
    ) -> Self {
        let votes = Arc::new(VoteReconciler::new(repo.clone(), config.vote_max_retries));
        Self {
            repo,
            votes,
            redis,
            config: Arc::new(config),
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(
            state
                .config
                .allowed_origins
                .iter()
                .filter_map(|origin| origin.parse::<HeaderValue>().ok())
                .collect::<Vec<_>>(),
        )
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE]);

    // Identity is optional here; it only fills in `current_user_vote`
    let public_routes = Router::new()
        .route("/health", get(handlers::media::health))
        .route("/api/media", get(handlers::media::get_media));

    let protected_routes = Router::new()
        .route("/api/media", post(handlers::media::create_media))
        .route("/api/media/vote", post(handlers::media::vote_media))
        .route("/api/media/votes", get(handlers::media::get_my_votes));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
