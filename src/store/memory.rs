//! Embedded in-memory backend.
//!
//! Used by the test suite and by single-process deployments that do not need
//! durability. A single mutex over the whole state makes every record
//! mutation + counter delta pair atomic relative to concurrent transitions;
//! no method awaits while holding it.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::counters::{self, CounterKind, Transition};
use crate::error::EngagementResult;
use crate::models::{Comment, FollowStats, Like, Page, Post, PostEngagement};
use crate::store::{EngagementStore, PostReader, RelationshipStore};

#[derive(Default)]
struct State {
    /// (follower_id, followee_id) -> edge creation time
    edges: BTreeMap<(Uuid, Uuid), DateTime<Utc>>,
    /// (post_id, account_id) -> like creation time
    likes: BTreeMap<(Uuid, Uuid), DateTime<Utc>>,
    comments: BTreeMap<Uuid, Comment>,
    counters: HashMap<(Uuid, CounterKind), i64>,
}

impl State {
    fn apply(&mut self, transition: Transition) {
        for delta in counters::deltas_for(transition) {
            let entry = self
                .counters
                .entry((delta.entity_id, delta.kind))
                .or_insert(0);
            *entry = counters::apply_checked(delta.entity_id, delta.kind, *entry, delta.delta);
        }
    }

    fn counter(&self, entity_id: Uuid, kind: CounterKind) -> i64 {
        self.counters.get(&(entity_id, kind)).copied().unwrap_or(0)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn paginate(mut entries: Vec<(DateTime<Utc>, Uuid)>, page: Page) -> Vec<Uuid> {
    // (created_at desc, id desc), matching the Postgres listing order
    entries.sort_by(|a, b| b.cmp(a));
    entries
        .into_iter()
        .skip(page.offset.max(0) as usize)
        .take(page.limit.max(0) as usize)
        .map(|(_, id)| id)
        .collect()
}

#[async_trait]
impl RelationshipStore for MemoryStore {
    async fn insert_follow_edge(
        &self,
        follower_id: Uuid,
        followee_id: Uuid,
    ) -> EngagementResult<bool> {
        let mut state = self.state.lock().await;
        if state.edges.contains_key(&(follower_id, followee_id)) {
            return Ok(false);
        }
        state.edges.insert((follower_id, followee_id), Utc::now());
        state.apply(Transition::FollowCreated {
            follower_id,
            followee_id,
        });
        Ok(true)
    }

    async fn delete_follow_edge(
        &self,
        follower_id: Uuid,
        followee_id: Uuid,
    ) -> EngagementResult<bool> {
        let mut state = self.state.lock().await;
        if state.edges.remove(&(follower_id, followee_id)).is_none() {
            return Ok(false);
        }
        state.apply(Transition::FollowRemoved {
            follower_id,
            followee_id,
        });
        Ok(true)
    }

    async fn is_following(&self, follower_id: Uuid, followee_id: Uuid) -> EngagementResult<bool> {
        let state = self.state.lock().await;
        Ok(state.edges.contains_key(&(follower_id, followee_id)))
    }

    async fn list_followers(&self, account_id: Uuid, page: Page) -> EngagementResult<Vec<Uuid>> {
        let state = self.state.lock().await;
        let entries = state
            .edges
            .iter()
            .filter(|((_, followee), _)| *followee == account_id)
            .map(|((follower, _), created_at)| (*created_at, *follower))
            .collect();
        Ok(paginate(entries, page))
    }

    async fn list_following(&self, account_id: Uuid, page: Page) -> EngagementResult<Vec<Uuid>> {
        let state = self.state.lock().await;
        let entries = state
            .edges
            .range((account_id, Uuid::nil())..=(account_id, Uuid::max()))
            .map(|((_, followee), created_at)| (*created_at, *followee))
            .collect();
        Ok(paginate(entries, page))
    }

    async fn follow_stats(&self, account_id: Uuid) -> EngagementResult<FollowStats> {
        let state = self.state.lock().await;
        Ok(FollowStats {
            followers: state.counter(account_id, CounterKind::Followers),
            following: state.counter(account_id, CounterKind::Following),
        })
    }
}

#[async_trait]
impl EngagementStore for MemoryStore {
    async fn insert_like(&self, post_id: Uuid, account_id: Uuid) -> EngagementResult<bool> {
        let mut state = self.state.lock().await;
        if state.likes.contains_key(&(post_id, account_id)) {
            return Ok(false);
        }
        state.likes.insert((post_id, account_id), Utc::now());
        state.apply(Transition::LikeCreated { post_id });
        Ok(true)
    }

    async fn delete_like(&self, post_id: Uuid, account_id: Uuid) -> EngagementResult<bool> {
        let mut state = self.state.lock().await;
        if state.likes.remove(&(post_id, account_id)).is_none() {
            return Ok(false);
        }
        state.apply(Transition::LikeRemoved { post_id });
        Ok(true)
    }

    async fn has_liked(&self, post_id: Uuid, account_id: Uuid) -> EngagementResult<bool> {
        let state = self.state.lock().await;
        Ok(state.likes.contains_key(&(post_id, account_id)))
    }

    async fn liked_set(
        &self,
        account_id: Uuid,
        post_ids: &[Uuid],
    ) -> EngagementResult<HashSet<Uuid>> {
        let state = self.state.lock().await;
        Ok(post_ids
            .iter()
            .filter(|post_id| state.likes.contains_key(&(**post_id, account_id)))
            .copied()
            .collect())
    }

    async fn list_post_likes(&self, post_id: Uuid, page: Page) -> EngagementResult<Vec<Like>> {
        let state = self.state.lock().await;
        let mut likes: Vec<Like> = state
            .likes
            .range((post_id, Uuid::nil())..=(post_id, Uuid::max()))
            .map(|((post_id, account_id), created_at)| Like {
                post_id: *post_id,
                account_id: *account_id,
                created_at: *created_at,
            })
            .collect();
        likes.sort_by(|a, b| (b.created_at, b.account_id).cmp(&(a.created_at, a.account_id)));
        Ok(likes
            .into_iter()
            .skip(page.offset.max(0) as usize)
            .take(page.limit.max(0) as usize)
            .collect())
    }

    async fn insert_comment(
        &self,
        post_id: Uuid,
        author_id: Uuid,
        body: String,
    ) -> EngagementResult<Comment> {
        let mut state = self.state.lock().await;
        let comment = Comment {
            id: Uuid::new_v4(),
            post_id,
            author_id,
            body,
            created_at: Utc::now(),
        };
        state.comments.insert(comment.id, comment.clone());
        state.apply(Transition::CommentAdded { post_id });
        Ok(comment)
    }

    async fn get_comment(&self, comment_id: Uuid) -> EngagementResult<Option<Comment>> {
        let state = self.state.lock().await;
        Ok(state.comments.get(&comment_id).cloned())
    }

    async fn delete_comment(&self, comment_id: Uuid, author_id: Uuid) -> EngagementResult<bool> {
        let mut state = self.state.lock().await;
        let owned = state
            .comments
            .get(&comment_id)
            .map(|c| c.author_id == author_id)
            .unwrap_or(false);
        if !owned {
            return Ok(false);
        }
        let comment = state
            .comments
            .remove(&comment_id)
            .ok_or_else(|| crate::error::EngagementError::Internal("comment vanished".into()))?;
        state.apply(Transition::CommentRemoved {
            post_id: comment.post_id,
        });
        Ok(true)
    }

    async fn list_comments(&self, post_id: Uuid, page: Page) -> EngagementResult<Vec<Comment>> {
        let state = self.state.lock().await;
        let mut comments: Vec<Comment> = state
            .comments
            .values()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect();
        comments.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        Ok(comments
            .into_iter()
            .skip(page.offset.max(0) as usize)
            .take(page.limit.max(0) as usize)
            .collect())
    }

    async fn post_engagement(&self, post_id: Uuid) -> EngagementResult<PostEngagement> {
        let state = self.state.lock().await;
        Ok(PostEngagement {
            like_count: state.counter(post_id, CounterKind::PostLikes),
            comment_count: state.counter(post_id, CounterKind::PostComments),
        })
    }

    async fn batch_post_engagement(
        &self,
        post_ids: &[Uuid],
    ) -> EngagementResult<HashMap<Uuid, PostEngagement>> {
        let state = self.state.lock().await;
        Ok(post_ids
            .iter()
            .map(|post_id| {
                (
                    *post_id,
                    PostEngagement {
                        like_count: state.counter(*post_id, CounterKind::PostLikes),
                        comment_count: state.counter(*post_id, CounterKind::PostComments),
                    },
                )
            })
            .collect())
    }
}

/// Embedded stand-in for the external post subsystem. Tests and
/// single-process deployments seed it with fixture posts.
#[derive(Default)]
pub struct MemoryPosts {
    posts: Mutex<BTreeMap<Uuid, Post>>,
}

impl MemoryPosts {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, post: Post) {
        self.posts.lock().await.insert(post.id, post);
    }
}

#[async_trait]
impl PostReader for MemoryPosts {
    async fn get_post(&self, post_id: Uuid) -> EngagementResult<Option<Post>> {
        Ok(self.posts.lock().await.get(&post_id).cloned())
    }

    async fn list_by_authors(
        &self,
        authors: &[Uuid],
        before: Option<(DateTime<Utc>, Uuid)>,
        limit: i64,
    ) -> EngagementResult<Vec<Post>> {
        let posts = self.posts.lock().await;
        let author_set: HashSet<Uuid> = authors.iter().copied().collect();
        let mut matched: Vec<Post> = posts
            .values()
            .filter(|p| author_set.contains(&p.author_id))
            .filter(|p| match before {
                Some((created_at, post_id)) => (p.created_at, p.id) < (created_at, post_id),
                None => true,
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        matched.truncate(limit.max(0) as usize);
        Ok(matched)
    }
}
