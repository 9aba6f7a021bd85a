use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::models::VoteDirection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "media_category", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Category {
    News,
    Tutorial,
    Course,
    Podcast,
    Video,
    Blog,
    Other,
}

impl FromStr for Category {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "news" | "News" => Ok(Category::News),
            "tutorial" | "Tutorial" => Ok(Category::Tutorial),
            "course" | "Course" => Ok(Category::Course),
            "podcast" | "Podcast" => Ok(Category::Podcast),
            "video" | "Video" => Ok(Category::Video),
            "blog" | "Blog" => Ok(Category::Blog),
            "other" | "Other" => Ok(Category::Other),
            _ => Err(format!("Unknown Category: {}", s)),
        }
    }
}

/// Category selection for list reads. `all` (or nothing) disables filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Category),
}

impl CategoryFilter {
    pub fn matches(self, category: Category) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(c) => c == category,
        }
    }

    pub fn category(self) -> Option<Category> {
        match self {
            CategoryFilter::All => None,
            CategoryFilter::Only(c) => Some(c),
        }
    }
}

impl FromStr for CategoryFilter {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "all" | "All" => Ok(CategoryFilter::All),
            other => other.parse().map(CategoryFilter::Only),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MediaItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub url: String,
    pub description: String,
    pub category: Category,
    pub image_url: Option<String>,
    pub vote_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Create media request
#[derive(Debug, Clone, Validate, Serialize, Deserialize)]
pub struct CreateMediaRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(url)]
    pub url: String,
    #[validate(length(max = 2000))]
    pub description: String,
    pub category: Category,
    #[validate(url)]
    pub image: Option<String>,
}

/// An item as one caller sees it: the aggregate plus that caller's own vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItemView {
    pub id: Uuid,
    pub title: String,
    pub url: String,
    pub description: String,
    pub category: Category,
    pub image: Option<String>,
    pub vote_count: i32,
    pub current_user_vote: Option<VoteDirection>,
}

impl MediaItemView {
    pub fn from_item(item: &MediaItem, current_user_vote: Option<VoteDirection>) -> Self {
        Self {
            id: item.id,
            title: item.title.clone(),
            url: item.url.clone(),
            description: item.description.clone(),
            category: item.category,
            image: item.image_url.clone(),
            vote_count: item.vote_count,
            current_user_vote,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MediaListResponse {
    pub media: Vec<MediaItemView>,
}
