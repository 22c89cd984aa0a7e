//! Property tests for the relationship/engagement mutation path, run against
//! the embedded store.

use std::sync::Arc;

use chrono::DateTime;
use uuid::Uuid;

use engagement_core::config::CoreConfig;
use engagement_core::models::{Page, Post};
use engagement_core::requests::{EngagementRequest, EngagementResponse};
use engagement_core::store::{MemoryPosts, MemoryStore};
use engagement_core::{EngagementService, ErrorKind};

type Service = EngagementService<MemoryStore, MemoryPosts>;

fn new_service() -> (Arc<Service>, Arc<MemoryPosts>) {
    let store = Arc::new(MemoryStore::new());
    let posts = Arc::new(MemoryPosts::new());
    let service = Arc::new(EngagementService::new(
        store,
        posts.clone(),
        CoreConfig::default(),
    ));
    (service, posts)
}

async fn seed_post(posts: &MemoryPosts, author_id: Uuid, ts_micros: i64) -> Post {
    let post = Post {
        id: Uuid::new_v4(),
        author_id,
        body: "post body".into(),
        created_at: DateTime::from_timestamp_micros(ts_micros).unwrap(),
    };
    posts.insert(post.clone()).await;
    post
}

#[tokio::test]
async fn follow_is_idempotent() {
    let (svc, _) = new_service();
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

    assert!(svc.follow(a, b).await.unwrap());
    assert!(!svc.follow(a, b).await.unwrap());

    let followers = svc.get_followers(b, Page::new(10, 0)).await.unwrap();
    assert_eq!(followers, vec![a]);
    assert_eq!(svc.get_follow_stats(b).await.unwrap().followers, 1);
    assert_eq!(svc.get_follow_stats(a).await.unwrap().following, 1);
}

#[tokio::test]
async fn self_follow_is_rejected_without_mutation() {
    let (svc, _) = new_service();
    let a = Uuid::new_v4();

    let err = svc.follow(a, a).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SelfFollow);

    let stats = svc.get_follow_stats(a).await.unwrap();
    assert_eq!((stats.followers, stats.following), (0, 0));
    assert!(!svc.is_following(a, a).await.unwrap());
}

#[tokio::test]
async fn unfollow_then_follow_round_trip() {
    let (svc, _) = new_service();
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

    assert!(svc.follow(a, b).await.unwrap());
    assert!(svc.unfollow(a, b).await.unwrap());
    assert!(svc.follow(a, b).await.unwrap());

    assert_eq!(svc.get_followers(b, Page::new(10, 0)).await.unwrap().len(), 1);
    assert_eq!(svc.get_follow_stats(b).await.unwrap().followers, 1);
}

#[tokio::test]
async fn unfollow_of_missing_edge_is_a_noop() {
    let (svc, _) = new_service();
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

    assert!(!svc.unfollow(a, b).await.unwrap());
    assert_eq!(svc.get_follow_stats(b).await.unwrap().followers, 0);
}

#[tokio::test]
async fn counters_match_record_sets_at_quiescence() {
    let (svc, posts) = new_service();
    let author = Uuid::new_v4();
    let viewers: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
    let post = seed_post(&posts, author, 1_000_000).await;

    for v in &viewers {
        assert!(svc.follow(*v, author).await.unwrap());
        assert!(svc.like(post.id, *v).await.unwrap());
    }
    svc.add_comment(post.id, viewers[0], "first".into())
        .await
        .unwrap();
    svc.add_comment(post.id, viewers[1], "second".into())
        .await
        .unwrap();
    assert!(svc.unfollow(viewers[3], author).await.unwrap());
    assert!(svc.unlike(post.id, viewers[3]).await.unwrap());

    let stats = svc.get_follow_stats(author).await.unwrap();
    let followers = svc.get_followers(author, Page::new(50, 0)).await.unwrap();
    assert_eq!(stats.followers, followers.len() as i64);

    let engagement = svc.get_post_engagement(post.id).await.unwrap();
    let likes = svc.get_post_likes(post.id, Page::new(50, 0)).await.unwrap();
    let comments = svc
        .get_post_comments(post.id, Page::new(50, 0))
        .await
        .unwrap();
    assert_eq!(engagement.like_count, likes.len() as i64);
    assert_eq!(engagement.comment_count, comments.len() as i64);
    assert_eq!((engagement.like_count, engagement.comment_count), (3, 2));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_duplicate_likes_collapse() {
    let (svc, posts) = new_service();
    let account = Uuid::new_v4();
    let post = seed_post(&posts, Uuid::new_v4(), 1_000_000).await;

    let mut handles = Vec::new();
    for _ in 0..16 {
        let svc = svc.clone();
        let post_id = post.id;
        handles.push(tokio::spawn(
            async move { svc.like(post_id, account).await },
        ));
    }

    let mut created = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap() {
            created += 1;
        }
    }

    assert_eq!(created, 1);
    assert_eq!(svc.get_post_engagement(post.id).await.unwrap().like_count, 1);
    assert_eq!(
        svc.get_post_likes(post.id, Page::new(50, 0))
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_duplicate_follows_collapse() {
    let (svc, _) = new_service();
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

    let mut handles = Vec::new();
    for _ in 0..16 {
        let svc = svc.clone();
        handles.push(tokio::spawn(async move { svc.follow(a, b).await }));
    }

    let mut created = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap() {
            created += 1;
        }
    }

    assert_eq!(created, 1);
    assert_eq!(svc.get_follow_stats(b).await.unwrap().followers, 1);
}

#[tokio::test]
async fn like_of_missing_post_is_not_found() {
    let (svc, _) = new_service();
    let err = svc.like(Uuid::new_v4(), Uuid::new_v4()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn comment_on_missing_post_is_not_found() {
    let (svc, _) = new_service();
    let err = svc
        .add_comment(Uuid::new_v4(), Uuid::new_v4(), "hello".into())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn comment_deletion_requires_ownership() {
    let (svc, posts) = new_service();
    let author = Uuid::new_v4();
    let stranger = Uuid::new_v4();
    let post = seed_post(&posts, Uuid::new_v4(), 1_000_000).await;

    let comment = svc.add_comment(post.id, author, "mine".into()).await.unwrap();
    assert_eq!(svc.get_post_engagement(post.id).await.unwrap().comment_count, 1);

    let err = svc.delete_comment(comment.id, stranger).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
    assert_eq!(svc.get_post_engagement(post.id).await.unwrap().comment_count, 1);

    assert!(svc.delete_comment(comment.id, author).await.unwrap());
    assert_eq!(svc.get_post_engagement(post.id).await.unwrap().comment_count, 0);

    let err = svc.delete_comment(comment.id, author).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(svc.get_post_engagement(post.id).await.unwrap().comment_count, 0);
}

#[tokio::test]
async fn unlike_survives_post_removal() {
    let (svc, posts) = new_service();
    let account = Uuid::new_v4();
    let post = seed_post(&posts, Uuid::new_v4(), 1_000_000).await;

    assert!(svc.like(post.id, account).await.unwrap());
    // The post subsystem may drop the post; the like record is still ours
    // to clean up.
    assert!(svc.unlike(post.id, account).await.unwrap());
    assert!(!svc.unlike(post.id, account).await.unwrap());
    assert_eq!(svc.get_post_engagement(post.id).await.unwrap().like_count, 0);
}

#[tokio::test]
async fn dispatch_reports_structured_outcomes() {
    let (svc, _) = new_service();
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

    let first = svc
        .dispatch(EngagementRequest::Follow {
            follower_id: a,
            followee_id: b,
        })
        .await
        .unwrap();
    assert!(matches!(first, EngagementResponse::Created { created: true }));

    let second = svc
        .dispatch(EngagementRequest::Follow {
            follower_id: a,
            followee_id: b,
        })
        .await
        .unwrap();
    assert!(matches!(second, EngagementResponse::Created { created: false }));

    let removed = svc
        .dispatch(EngagementRequest::Unfollow {
            follower_id: a,
            followee_id: b,
        })
        .await
        .unwrap();
    assert!(matches!(removed, EngagementResponse::Removed { removed: true }));
}
