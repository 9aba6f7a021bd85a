use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteDirection {
    Up,
    Down,
}

impl VoteDirection {
    /// Signed ledger value: +1 for up, -1 for down.
    pub fn value(self) -> i16 {
        match self {
            VoteDirection::Up => 1,
            VoteDirection::Down => -1,
        }
    }

    pub fn from_value(value: i64) -> Option<Self> {
        match value {
            1 => Some(VoteDirection::Up),
            -1 => Some(VoteDirection::Down),
            _ => None,
        }
    }

    /// Accepts `"up"`/`"down"` or `1`/`-1`, the two shapes clients send.
    pub fn from_json(value: &Value) -> Result<Self> {
        let direction = match value {
            Value::String(s) => s.parse().ok(),
            Value::Number(n) => n.as_i64().and_then(Self::from_value),
            _ => None,
        };

        direction.ok_or_else(|| {
            AppError::InvalidArgument("direction must be \"up\" or \"down\"".to_string())
        })
    }
}

impl FromStr for VoteDirection {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "up" => Ok(VoteDirection::Up),
            "down" => Ok(VoteDirection::Down),
            _ => Err(format!("Unknown VoteDirection: {}", s)),
        }
    }
}

/// What a single user holds on a single item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VoteState {
    #[default]
    NoVote,
    Up,
    Down,
}

/// How the ledger row changes for a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerChange {
    Insert,
    Delete,
    Switch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteTransition {
    pub from: VoteState,
    pub to: VoteState,
    pub change: LedgerChange,
    pub delta: i32,
}

impl VoteState {
    pub fn from_direction(direction: Option<VoteDirection>) -> Self {
        match direction {
            None => VoteState::NoVote,
            Some(VoteDirection::Up) => VoteState::Up,
            Some(VoteDirection::Down) => VoteState::Down,
        }
    }

    pub fn direction(self) -> Option<VoteDirection> {
        match self {
            VoteState::NoVote => None,
            VoteState::Up => Some(VoteDirection::Up),
            VoteState::Down => Some(VoteDirection::Down),
        }
    }

    fn value(self) -> i32 {
        self.direction().map_or(0, |d| i32::from(d.value()))
    }

    /// Derives the transition for `requested` from the stored state.
    ///
    /// Repeating the held direction removes the vote, the opposite direction
    /// switches it in place and anything else inserts a new one. The delta is
    /// always the difference of the signed values, so a switch moves by 2.
    pub fn apply(self, requested: VoteDirection) -> VoteTransition {
        let (to, change) = match (self.direction(), requested) {
            (None, _) => (VoteState::from_direction(Some(requested)), LedgerChange::Insert),
            (Some(held), requested) if held == requested => {
                (VoteState::NoVote, LedgerChange::Delete)
            }
            (Some(_), requested) => (
                VoteState::from_direction(Some(requested)),
                LedgerChange::Switch,
            ),
        };

        VoteTransition {
            from: self,
            to,
            change,
            delta: to.value() - self.value(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct VoteRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub media_id: Uuid,
    pub vote_value: i16, // -1 for downvote, 1 for upvote
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VoteRecord {
    pub fn state(&self) -> VoteState {
        VoteState::from_direction(VoteDirection::from_value(i64::from(self.vote_value)))
    }
}

// Vote request
#[derive(Debug, Serialize, Deserialize)]
pub struct VoteRequest {
    pub media_id: Uuid,
    #[serde(default)]
    pub direction: Value,
}

/// Result of one reconciled vote; also the wire response of `POST /api/media/vote`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteOutcome {
    pub accepted: bool,
    #[serde(rename = "new_delta")]
    pub delta: i32,
    pub vote_count: i32,
    pub user_vote: Option<VoteDirection>,
}

// The caller's own vote on one item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserVote {
    pub media_id: Uuid,
    pub vote_type: VoteDirection,
}
