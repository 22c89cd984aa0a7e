//! Counter maintenance: the delta protocol that keeps aggregate counters
//! consistent with the underlying record sets.
//!
//! Every effective state transition (a mutation that actually created or
//! removed a record) maps to a fixed set of ±1 deltas. Store backends apply
//! those deltas inside the same atomic unit of work as the record mutation;
//! no-op transitions never produce deltas. A decrement that would drive a
//! counter negative means the counter desynchronized from its records: it is
//! logged as a conflict and clamped to zero so the caller can still succeed.

use tracing::error;
use uuid::Uuid;

/// Counter kinds persisted as `counters(entity_id, kind, value)` rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CounterKind {
    /// Accounts following `entity_id`
    Followers,
    /// Accounts `entity_id` follows
    Following,
    /// Likes on post `entity_id`
    PostLikes,
    /// Comments on post `entity_id`
    PostComments,
}

impl CounterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CounterKind::Followers => "followers",
            CounterKind::Following => "following",
            CounterKind::PostLikes => "post_likes",
            CounterKind::PostComments => "post_comments",
        }
    }
}

/// A single adjustment to one counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterDelta {
    pub entity_id: Uuid,
    pub kind: CounterKind,
    pub delta: i64,
}

/// Effective state transitions that adjust counters
#[derive(Debug, Clone, Copy)]
pub enum Transition {
    FollowCreated { follower_id: Uuid, followee_id: Uuid },
    FollowRemoved { follower_id: Uuid, followee_id: Uuid },
    LikeCreated { post_id: Uuid },
    LikeRemoved { post_id: Uuid },
    CommentAdded { post_id: Uuid },
    CommentRemoved { post_id: Uuid },
}

/// Deltas for one effective transition. A follow touches two counters (the
/// followee's follower count and the follower's following count); engagement
/// transitions touch one.
pub fn deltas_for(transition: Transition) -> Vec<CounterDelta> {
    match transition {
        Transition::FollowCreated {
            follower_id,
            followee_id,
        } => vec![
            CounterDelta {
                entity_id: followee_id,
                kind: CounterKind::Followers,
                delta: 1,
            },
            CounterDelta {
                entity_id: follower_id,
                kind: CounterKind::Following,
                delta: 1,
            },
        ],
        Transition::FollowRemoved {
            follower_id,
            followee_id,
        } => vec![
            CounterDelta {
                entity_id: followee_id,
                kind: CounterKind::Followers,
                delta: -1,
            },
            CounterDelta {
                entity_id: follower_id,
                kind: CounterKind::Following,
                delta: -1,
            },
        ],
        Transition::LikeCreated { post_id } => vec![CounterDelta {
            entity_id: post_id,
            kind: CounterKind::PostLikes,
            delta: 1,
        }],
        Transition::LikeRemoved { post_id } => vec![CounterDelta {
            entity_id: post_id,
            kind: CounterKind::PostLikes,
            delta: -1,
        }],
        Transition::CommentAdded { post_id } => vec![CounterDelta {
            entity_id: post_id,
            kind: CounterKind::PostComments,
            delta: 1,
        }],
        Transition::CommentRemoved { post_id } => vec![CounterDelta {
            entity_id: post_id,
            kind: CounterKind::PostComments,
            delta: -1,
        }],
    }
}

/// Surface a counter underflow to operators. The user-facing call is allowed
/// to proceed on the clamped value; the desynchronization itself is never
/// silent.
pub fn record_underflow(entity_id: Uuid, kind: CounterKind, observed: i64) {
    error!(
        entity_id = %entity_id,
        kind = kind.as_str(),
        observed,
        "counter underflow: aggregate desynchronized from record set, clamping to zero"
    );
}

/// Apply `delta` to `current`, enforcing the non-negative invariant
pub fn apply_checked(entity_id: Uuid, kind: CounterKind, current: i64, delta: i64) -> i64 {
    let next = current + delta;
    if next < 0 {
        record_underflow(entity_id, kind, next);
        0
    } else {
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follow_adjusts_both_counters() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let deltas = deltas_for(Transition::FollowCreated {
            follower_id: a,
            followee_id: b,
        });
        assert_eq!(deltas.len(), 2);
        assert!(deltas
            .iter()
            .any(|d| d.entity_id == b && d.kind == CounterKind::Followers && d.delta == 1));
        assert!(deltas
            .iter()
            .any(|d| d.entity_id == a && d.kind == CounterKind::Following && d.delta == 1));
    }

    #[test]
    fn engagement_transitions_touch_one_counter() {
        let p = Uuid::new_v4();
        let deltas = deltas_for(Transition::LikeRemoved { post_id: p });
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].kind, CounterKind::PostLikes);
        assert_eq!(deltas[0].delta, -1);
    }

    #[test]
    fn underflow_clamps_to_zero() {
        let p = Uuid::new_v4();
        assert_eq!(apply_checked(p, CounterKind::PostLikes, 0, -1), 0);
        assert_eq!(apply_checked(p, CounterKind::PostLikes, 3, -1), 2);
        assert_eq!(apply_checked(p, CounterKind::PostLikes, 0, 1), 1);
    }
}
