//! Feed assembly: the canonical read path.
//!
//! A feed page is the posts authored by the viewer and the accounts they
//! follow, ordered by (created_at desc, post_id desc), resumed from an
//! opaque cursor. Feed reads never write; they tolerate counter staleness of
//! one in-flight transaction but never membership staleness.

use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use moka::future::Cache;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::FeedConfig;
use crate::error::{EngagementError, EngagementResult};
use crate::models::{FeedPage, FeedPost, Page};
use crate::store::{EngagementStore, PostReader, RelationshipStore};

/// Position in the (created_at desc, post_id desc) feed order.
/// Encoded as base64("{created_at_micros}:{post_id}"); opaque to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedCursor {
    pub created_at: DateTime<Utc>,
    pub post_id: Uuid,
}

impl FeedCursor {
    pub fn encode(&self) -> String {
        general_purpose::STANDARD.encode(format!(
            "{}:{}",
            self.created_at.timestamp_micros(),
            self.post_id
        ))
    }

    pub fn decode(raw: &str) -> EngagementResult<Self> {
        let invalid = || EngagementError::InvalidInput("malformed feed cursor".into());
        let decoded = general_purpose::STANDARD.decode(raw).map_err(|_| invalid())?;
        let text = String::from_utf8(decoded).map_err(|_| invalid())?;
        let (micros, post_id) = text.split_once(':').ok_or_else(invalid)?;
        let micros: i64 = micros.parse().map_err(|_| invalid())?;
        let created_at = DateTime::from_timestamp_micros(micros).ok_or_else(invalid)?;
        let post_id = Uuid::parse_str(post_id).map_err(|_| invalid())?;
        Ok(Self {
            created_at,
            post_id,
        })
    }
}

/// Assembles paginated feeds from the relationship store and post reader,
/// annotating each post from cached aggregates.
pub struct FeedAssembler<S, P> {
    store: Arc<S>,
    posts: Arc<P>,
    config: FeedConfig,
    /// Following-set snapshots for high fan-out viewers
    snapshots: Cache<Uuid, Arc<Vec<Uuid>>>,
}

impl<S, P> FeedAssembler<S, P>
where
    S: RelationshipStore + EngagementStore,
    P: PostReader,
{
    pub fn new(store: Arc<S>, posts: Arc<P>, config: FeedConfig) -> Self {
        let snapshots = Cache::builder()
            .max_capacity(config.snapshot_capacity)
            .time_to_live(Duration::from_secs(config.snapshot_ttl_secs))
            .build();
        Self {
            store,
            posts,
            config,
            snapshots,
        }
    }

    /// One feed page for `viewer_id`, resumed from `cursor` when present.
    pub async fn get_feed(
        &self,
        viewer_id: Uuid,
        cursor: Option<&str>,
        limit: Option<i64>,
    ) -> EngagementResult<FeedPage> {
        let limit = match limit {
            Some(value) if value >= 1 => value.min(self.config.max_limit),
            _ => self.config.default_limit,
        };
        let before = cursor
            .map(FeedCursor::decode)
            .transpose()?
            .map(|c| (c.created_at, c.post_id));

        let authors = self.author_set(viewer_id).await?;

        // Fetch one extra row to detect whether another page exists
        let mut posts = self
            .posts
            .list_by_authors(&authors, before, limit + 1)
            .await?;
        let has_more = posts.len() as i64 > limit;
        posts.truncate(limit as usize);

        let post_ids: Vec<Uuid> = posts.iter().map(|p| p.id).collect();
        let engagement = self.store.batch_post_engagement(&post_ids).await?;
        let liked = self.store.liked_set(viewer_id, &post_ids).await?;

        let next_cursor = if has_more {
            posts.last().map(|p| {
                FeedCursor {
                    created_at: p.created_at,
                    post_id: p.id,
                }
                .encode()
            })
        } else {
            None
        };

        let posts = posts
            .into_iter()
            .map(|post| {
                let counts = engagement.get(&post.id).copied().unwrap_or_default();
                let viewer_has_liked = liked.contains(&post.id);
                FeedPost {
                    like_count: counts.like_count,
                    comment_count: counts.comment_count,
                    viewer_has_liked,
                    post,
                }
            })
            .collect();

        debug!(%viewer_id, page_len = post_ids.len(), has_more, "feed page assembled");
        Ok(FeedPage { posts, next_cursor })
    }

    /// The viewer plus their following set, bounded by `max_fan_out`.
    async fn author_set(&self, viewer_id: Uuid) -> EngagementResult<Vec<Uuid>> {
        let fan_out = self.config.max_fan_out as i64;
        let stats = self.store.follow_stats(viewer_id).await?;

        let following = if stats.following > fan_out {
            // Degrade to a cached snapshot of the most recent followees
            // instead of failing or scanning the full set on every read.
            warn!(
                %viewer_id,
                following = stats.following,
                max_fan_out = fan_out,
                "following set exceeds fan-out bound, using snapshot"
            );
            self.following_snapshot(viewer_id).await?
        } else {
            Arc::new(
                self.store
                    .list_following(viewer_id, Page::new(fan_out, 0))
                    .await?,
            )
        };

        let mut authors = Vec::with_capacity(following.len() + 1);
        authors.push(viewer_id);
        authors.extend(following.iter().copied());
        Ok(authors)
    }

    async fn following_snapshot(&self, viewer_id: Uuid) -> EngagementResult<Arc<Vec<Uuid>>> {
        let store = self.store.clone();
        let fan_out = self.config.max_fan_out as i64;
        self.snapshots
            .try_get_with(viewer_id, async move {
                store
                    .list_following(viewer_id, Page::new(fan_out, 0))
                    .await
                    .map(Arc::new)
            })
            .await
            .map_err(|e: Arc<EngagementError>| {
                EngagementError::Internal(format!("following snapshot load failed: {e}"))
            })
    }
}
