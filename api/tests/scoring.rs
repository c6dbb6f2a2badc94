mod common;

use chrono::{Duration, Utc};
use common::Harness;
use engage_api::EngageError;
use engage_shared::VoteDirection;

#[tokio::test]
async fn comment_vote_walkthrough() {
    let h = Harness::new();
    let author = h.user("author");
    let a = h.user("a");
    let b = h.user("b");
    let post = h.post(None, author, "post", Utc::now());
    let comment = h.comment(post, author, 0);

    let s = &h.service;
    assert_eq!(s.cast_comment_vote(a, comment, "up").await.unwrap().score, 1);
    assert_eq!(s.cast_comment_vote(a, comment, "up").await.unwrap().score, 0);
    assert_eq!(s.cast_comment_vote(b, comment, "down").await.unwrap().score, -1);

    let last = s.cast_comment_vote(a, comment, "up").await.unwrap();
    assert_eq!(last.score, 0);
    assert_eq!(last.user_vote, Some(VoteDirection::Up));

    let views = s.comments_for_post(post, Some(b)).await.unwrap();
    assert_eq!((views[0].comment.up_votes, views[0].comment.down_votes), (1, 1));
    assert_eq!(views[0].user_vote, Some(VoteDirection::Down));
}

#[tokio::test]
async fn post_vote_magnitudes() {
    let h = Harness::new();
    let author = h.user("author");
    let voter = h.user("voter");
    let post = h.post(None, author, "post", Utc::now());
    let s = &h.service;

    let up = s.cast_post_vote(voter, post, "up").await.unwrap();
    let flipped = s.cast_post_vote(voter, post, "down").await.unwrap();
    assert_eq!(flipped.rating - up.rating, -2);

    let back_up = s.cast_post_vote(voter, post, "up").await.unwrap();
    let withdrawn = s.cast_post_vote(voter, post, "up").await.unwrap();
    assert_eq!(withdrawn.rating - back_up.rating, -1);
    assert_eq!(withdrawn.user_vote, None);
    assert_eq!(s.post_rating(post).await.unwrap(), 0);
}

#[tokio::test]
async fn votes_on_missing_targets_fail() {
    let h = Harness::new();
    let voter = h.user("voter");

    assert!(matches!(
        h.service.cast_comment_vote(voter, 77, "up").await,
        Err(EngageError::NotFound("comment"))
    ));
    assert!(matches!(
        h.service.cast_post_vote(voter, 77, "up").await,
        Err(EngageError::NotFound("post"))
    ));
}

#[tokio::test]
async fn two_day_old_post_ranks_by_decayed_weight() {
    let h = Harness::new();
    let author = h.user("author");
    let now = Utc::now();
    let old = h.post(None, author, "old but loved", now - Duration::hours(48));
    h.set_post_rating(old, 10);
    let fresh = h.post(None, author, "fresh", now - Duration::hours(1));

    let page = h
        .service
        .rank_posts(None, None, "ratinga", now, 1, 10)
        .await
        .unwrap();
    // old: 25 + ln(11) * 20 ~ 72.96, fresh: ~97.1
    assert_eq!(page.items.iter().map(|p| p.id).collect::<Vec<_>>(), vec![fresh, old]);

    let reversed = h
        .service
        .rank_posts(None, None, "ratingd", now, 1, 10)
        .await
        .unwrap();
    assert_eq!(reversed.items[0].id, old);
}

#[tokio::test]
async fn expert_title_on_fifth_qualifying_comment() {
    let mut h = Harness::new();
    let author = h.user("author");
    let voter = h.user("voter");
    let topic = h.topic("Photography");
    let post = h.post(Some(topic), author, "lenses", Utc::now());

    for _ in 0..4 {
        h.comment(post, author, 4);
    }
    let borderline = h.comment(post, author, 3);

    // A comment in another topic never counts.
    let elsewhere = h.topic("Cycling");
    let other_post = h.post(Some(elsewhere), author, "gears", Utc::now());
    let other = h.comment(other_post, author, 9);
    h.service.cast_comment_vote(voter, other, "up").await.unwrap();
    assert!(h.service.user_titles(author).await.unwrap().is_empty());

    h.service.cast_comment_vote(voter, borderline, "up").await.unwrap();
    let titles = h.service.user_titles(author).await.unwrap();
    assert_eq!(titles.len(), 1);
    assert_eq!(titles[0].title, "Photography Expert");
    assert_eq!(titles[0].topic_id, topic);

    let n = h.notifications.try_recv().unwrap();
    assert_eq!(n.user_id, author);
    assert_eq!(n.message, "You earned the title 'Photography Expert'");

    // Withdrawing the vote drops the comment back to 3; the title stays.
    h.service.cast_comment_vote(voter, borderline, "up").await.unwrap();
    assert_eq!(h.service.user_titles(author).await.unwrap().len(), 1);
    assert!(h.notifications.try_recv().is_err());
}
