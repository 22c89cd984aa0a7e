//! Service facade: wires the idempotency guard, stores, counter protocol and
//! feed assembler into the operation surface consumed by external layers.
//!
//! Every identity arriving here is already authenticated; every payload has
//! passed the request boundary. Mutations run under the per-transition-key
//! guard so concurrent duplicates collapse into one effective transition.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::config::{CoreConfig, LimitsConfig};
use crate::error::{EngagementError, EngagementResult};
use crate::feed::FeedAssembler;
use crate::guard::{IdempotencyGuard, TransitionKey};
use crate::models::{Comment, FeedPage, FollowStats, Like, Page, PostEngagement};
use crate::requests::{EngagementRequest, EngagementResponse};
use crate::store::{EngagementStore, PostReader, RelationshipStore};

pub struct EngagementService<S, P> {
    store: Arc<S>,
    posts: Arc<P>,
    guard: IdempotencyGuard,
    feed: FeedAssembler<S, P>,
    limits: LimitsConfig,
}

impl<S, P> EngagementService<S, P>
where
    S: RelationshipStore + EngagementStore + 'static,
    P: PostReader + 'static,
{
    pub fn new(store: Arc<S>, posts: Arc<P>, config: CoreConfig) -> Self {
        let feed = FeedAssembler::new(store.clone(), posts.clone(), config.feed);
        Self {
            store,
            posts,
            guard: IdempotencyGuard::new(),
            feed,
            limits: config.limits,
        }
    }

    // ========== Follow graph ==========

    /// Idempotent follow; true when a new edge was created.
    pub async fn follow(&self, follower_id: Uuid, followee_id: Uuid) -> EngagementResult<bool> {
        if follower_id == followee_id {
            return Err(EngagementError::SelfFollow(follower_id));
        }
        let store = self.store.clone();
        let created = self
            .guard
            .serialize(
                TransitionKey::Follow {
                    follower_id,
                    followee_id,
                },
                async move { store.insert_follow_edge(follower_id, followee_id).await },
            )
            .await?;
        if created {
            info!(%follower_id, %followee_id, "follow created");
        }
        Ok(created)
    }

    /// Idempotent unfollow; true when an edge was removed.
    pub async fn unfollow(&self, follower_id: Uuid, followee_id: Uuid) -> EngagementResult<bool> {
        let store = self.store.clone();
        let removed = self
            .guard
            .serialize(
                TransitionKey::Unfollow {
                    follower_id,
                    followee_id,
                },
                async move { store.delete_follow_edge(follower_id, followee_id).await },
            )
            .await?;
        if removed {
            info!(%follower_id, %followee_id, "follow removed");
        }
        Ok(removed)
    }

    pub async fn is_following(
        &self,
        follower_id: Uuid,
        followee_id: Uuid,
    ) -> EngagementResult<bool> {
        self.store.is_following(follower_id, followee_id).await
    }

    pub async fn get_followers(&self, account_id: Uuid, page: Page) -> EngagementResult<Vec<Uuid>> {
        self.store
            .list_followers(account_id, self.sanitize(page))
            .await
    }

    pub async fn get_following(&self, account_id: Uuid, page: Page) -> EngagementResult<Vec<Uuid>> {
        self.store
            .list_following(account_id, self.sanitize(page))
            .await
    }

    pub async fn get_follow_stats(&self, account_id: Uuid) -> EngagementResult<FollowStats> {
        self.store.follow_stats(account_id).await
    }

    // ========== Likes ==========

    /// Idempotent like; true when a new like record was created.
    pub async fn like(&self, post_id: Uuid, account_id: Uuid) -> EngagementResult<bool> {
        self.require_post(post_id).await?;
        let store = self.store.clone();
        self.guard
            .serialize(
                TransitionKey::Like {
                    post_id,
                    account_id,
                },
                async move { store.insert_like(post_id, account_id).await },
            )
            .await
    }

    /// Idempotent unlike; true when a like record was removed. Works even
    /// when the post itself is gone.
    pub async fn unlike(&self, post_id: Uuid, account_id: Uuid) -> EngagementResult<bool> {
        let store = self.store.clone();
        self.guard
            .serialize(
                TransitionKey::Unlike {
                    post_id,
                    account_id,
                },
                async move { store.delete_like(post_id, account_id).await },
            )
            .await
    }

    pub async fn has_liked(&self, post_id: Uuid, account_id: Uuid) -> EngagementResult<bool> {
        self.store.has_liked(post_id, account_id).await
    }

    pub async fn get_post_likes(&self, post_id: Uuid, page: Page) -> EngagementResult<Vec<Like>> {
        self.store
            .list_post_likes(post_id, self.sanitize(page))
            .await
    }

    /// Current like/comment counts, served from aggregates.
    pub async fn get_post_engagement(&self, post_id: Uuid) -> EngagementResult<PostEngagement> {
        self.store.post_engagement(post_id).await
    }

    // ========== Comments ==========

    pub async fn add_comment(
        &self,
        post_id: Uuid,
        author_id: Uuid,
        body: String,
    ) -> EngagementResult<Comment> {
        let request = EngagementRequest::AddComment {
            post_id,
            author_id,
            body: body.clone(),
        };
        request.validate(&self.limits)?;
        self.require_post(post_id).await?;
        self.store.insert_comment(post_id, author_id, body).await
    }

    /// Remove a comment; only its author may do so.
    pub async fn delete_comment(
        &self,
        comment_id: Uuid,
        requester_id: Uuid,
    ) -> EngagementResult<bool> {
        let comment = self
            .store
            .get_comment(comment_id)
            .await?
            .ok_or_else(|| EngagementError::NotFound(format!("comment {comment_id}")))?;
        if comment.author_id != requester_id {
            return Err(EngagementError::Forbidden(format!(
                "account {requester_id} does not own comment {comment_id}"
            )));
        }
        self.store.delete_comment(comment_id, requester_id).await
    }

    pub async fn get_post_comments(
        &self,
        post_id: Uuid,
        page: Page,
    ) -> EngagementResult<Vec<Comment>> {
        self.store.list_comments(post_id, self.sanitize(page)).await
    }

    // ========== Feed ==========

    pub async fn get_feed(
        &self,
        viewer_id: Uuid,
        cursor: Option<&str>,
        limit: Option<i64>,
    ) -> EngagementResult<FeedPage> {
        self.feed.get_feed(viewer_id, cursor, limit).await
    }

    // ========== Request boundary ==========

    /// Dispatch one validated tagged request to the matching operation.
    pub async fn dispatch(
        &self,
        request: EngagementRequest,
    ) -> EngagementResult<EngagementResponse> {
        request.validate(&self.limits)?;
        match request {
            EngagementRequest::Follow {
                follower_id,
                followee_id,
            } => Ok(EngagementResponse::Created {
                created: self.follow(follower_id, followee_id).await?,
            }),
            EngagementRequest::Unfollow {
                follower_id,
                followee_id,
            } => Ok(EngagementResponse::Removed {
                removed: self.unfollow(follower_id, followee_id).await?,
            }),
            EngagementRequest::Like {
                post_id,
                account_id,
            } => Ok(EngagementResponse::Created {
                created: self.like(post_id, account_id).await?,
            }),
            EngagementRequest::Unlike {
                post_id,
                account_id,
            } => Ok(EngagementResponse::Removed {
                removed: self.unlike(post_id, account_id).await?,
            }),
            EngagementRequest::AddComment {
                post_id,
                author_id,
                body,
            } => Ok(EngagementResponse::Comment {
                comment: self.add_comment(post_id, author_id, body).await?,
            }),
            EngagementRequest::DeleteComment {
                comment_id,
                requester_id,
            } => Ok(EngagementResponse::Removed {
                removed: self.delete_comment(comment_id, requester_id).await?,
            }),
            EngagementRequest::Feed {
                viewer_id,
                cursor,
                limit,
            } => Ok(EngagementResponse::Feed {
                page: self.get_feed(viewer_id, cursor.as_deref(), limit).await?,
            }),
        }
    }

    async fn require_post(&self, post_id: Uuid) -> EngagementResult<()> {
        match self.posts.get_post(post_id).await? {
            Some(_) => Ok(()),
            None => Err(EngagementError::NotFound(format!("post {post_id}"))),
        }
    }

    fn sanitize(&self, page: Page) -> Page {
        let limit = if page.limit < 1 {
            self.limits.default_page_limit
        } else {
            page.limit.min(self.limits.max_page_limit)
        };
        Page {
            limit,
            offset: page.offset.max(0),
        }
    }
}
