//! Tagged request boundary.
//!
//! External layers hand the core one of a closed set of request variants;
//! `validate` runs before any core logic. Idempotent no-ops are successful
//! responses carrying `created = false` / `removed = false`, never errors.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::LimitsConfig;
use crate::error::{EngagementError, EngagementResult};
use crate::models::{Comment, FeedPage};

/// Requests accepted at the core boundary
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngagementRequest {
    Follow {
        follower_id: Uuid,
        followee_id: Uuid,
    },
    Unfollow {
        follower_id: Uuid,
        followee_id: Uuid,
    },
    Like {
        post_id: Uuid,
        account_id: Uuid,
    },
    Unlike {
        post_id: Uuid,
        account_id: Uuid,
    },
    AddComment {
        post_id: Uuid,
        author_id: Uuid,
        body: String,
    },
    DeleteComment {
        comment_id: Uuid,
        requester_id: Uuid,
    },
    Feed {
        viewer_id: Uuid,
        cursor: Option<String>,
        limit: Option<i64>,
    },
}

impl EngagementRequest {
    /// Boundary validation; malformed payloads never reach the core.
    pub fn validate(&self, limits: &LimitsConfig) -> EngagementResult<()> {
        match self {
            EngagementRequest::AddComment { body, .. } => {
                if body.trim().is_empty() {
                    return Err(EngagementError::InvalidInput(
                        "comment body must not be empty".into(),
                    ));
                }
                if body.chars().count() > limits.max_comment_length {
                    return Err(EngagementError::InvalidInput(format!(
                        "comment body exceeds {} characters",
                        limits.max_comment_length
                    )));
                }
                Ok(())
            }
            EngagementRequest::Feed { limit, .. } => {
                if let Some(limit) = limit {
                    if *limit < 1 {
                        return Err(EngagementError::InvalidInput(
                            "feed limit must be positive".into(),
                        ));
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// Structured outcomes returned to external callers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngagementResponse {
    /// Outcome of follow/like: whether a new record came into existence
    Created { created: bool },
    /// Outcome of unfollow/unlike/deleteComment
    Removed { removed: bool },
    Comment { comment: Comment },
    Feed { page: FeedPage },
}
