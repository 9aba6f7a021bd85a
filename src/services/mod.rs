pub mod media_service;
pub mod vote_service;
