//! Entry points used by the HTTP handlers.
//!
//! Each operation borrows one pooled connection on the blocking pool, the
//! same way every handler in this service talks to SQLite.

use chrono::{DateTime, Utc};
use engage_shared::{
    Comment, CommentView, CommentVoteResponse, Notification, Paginated, Post, PostVoteResponse,
    UserTitle, VoteDirection,
};
use rusqlite::{params, Connection};

use crate::db::{comment_from_row, post_from_row, COMMENT_COLUMNS, POST_COLUMNS};
use crate::error::EngageError;
use crate::notify::{self, NewNotification, Notifier};
use crate::ranking::{self, SortKey, Viewer};
use crate::{ledger, titles, DbPool};

#[derive(Clone)]
pub struct EngagementService {
    pool: DbPool,
    notifier: Notifier,
    strict_directions: bool,
}

impl EngagementService {
    pub fn new(pool: DbPool, notifier: Notifier, strict_directions: bool) -> Self {
        Self {
            pool,
            notifier,
            strict_directions,
        }
    }

    pub fn parse_direction(&self, raw: &str) -> Result<VoteDirection, EngageError> {
        if self.strict_directions {
            Ok(raw.parse()?)
        } else {
            Ok(VoteDirection::parse_lenient(raw))
        }
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, EngageError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, EngageError> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            f(&mut conn)
        })
        .await?
    }

    /// Casts, flips or withdraws a comment vote, then re-checks the author's
    /// title for the comment's topic. Title failures never fail the vote.
    pub async fn cast_comment_vote(
        &self,
        voter_id: i64,
        comment_id: i64,
        direction: &str,
    ) -> Result<CommentVoteResponse, EngageError> {
        let direction = self.parse_direction(direction)?;
        let notifier = self.notifier.clone();

        self.with_conn(move |conn| {
            let now = Utc::now();
            let outcome = ledger::cast_comment_vote(conn, voter_id, comment_id, direction, now)?;

            if let Some(topic_id) = outcome.topic_id {
                match titles::evaluate_in_transaction(conn, outcome.author_id, topic_id, now) {
                    Ok(Some(title)) => notifier.dispatch(NewNotification::title_granted(&title)),
                    Ok(None) => {}
                    Err(e) => tracing::warn!(
                        error = %e,
                        user_id = outcome.author_id,
                        topic_id,
                        "title evaluation failed"
                    ),
                }
            }

            Ok(CommentVoteResponse {
                score: outcome.score(),
                user_vote: outcome.transition.to.direction(),
            })
        })
        .await
    }

    pub async fn cast_post_vote(
        &self,
        voter_id: i64,
        post_id: i64,
        direction: &str,
    ) -> Result<PostVoteResponse, EngageError> {
        let direction = self.parse_direction(direction)?;

        self.with_conn(move |conn| {
            let outcome = ledger::cast_post_vote(conn, voter_id, post_id, direction, Utc::now())?;
            Ok(PostVoteResponse {
                rating: outcome.rating.0,
                user_vote: outcome.transition.to.direction(),
            })
        })
        .await
    }

    /// Ranks every post (or one topic's posts) for `viewer_id` at `now`.
    pub async fn rank_posts(
        &self,
        viewer_id: Option<i64>,
        topic_id: Option<i64>,
        sort_key: &str,
        now: DateTime<Utc>,
        page: i64,
        page_size: i64,
    ) -> Result<Paginated<Post>, EngageError> {
        let key = SortKey::parse(sort_key);

        let (posts, viewer) = self
            .with_conn(move |conn| {
                let posts = load_posts(conn, topic_id)?;
                let viewer = match viewer_id {
                    Some(user_id) => Viewer::subscribed_to(subscribed_topics(conn, user_id)?),
                    None => Viewer::anonymous(),
                };
                Ok((posts, viewer))
            })
            .await?;

        Ok(ranking::rank_posts(posts, &viewer, key, now, page, page_size))
    }

    pub async fn post_rating(&self, post_id: i64) -> Result<i64, EngageError> {
        self.with_conn(move |conn| {
            conn.query_row("SELECT rating FROM posts WHERE id = ?1", [post_id], |row| {
                row.get(0)
            })
            .map_err(EngageError::missing("post"))
        })
        .await
    }

    /// Comments of a post in creation order, with the viewer's own votes.
    pub async fn comments_for_post(
        &self,
        post_id: i64,
        viewer_id: Option<i64>,
    ) -> Result<Vec<CommentView>, EngageError> {
        self.with_conn(move |conn| {
            ensure_post(conn, post_id)?;

            let sql = format!(
                "SELECT {COMMENT_COLUMNS} FROM comments c
                 WHERE c.post_id = ?1 ORDER BY c.created_at ASC, c.id ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let comments = stmt
                .query_map([post_id], comment_from_row)?
                .collect::<Result<Vec<_>, _>>()?;

            let ids: Vec<i64> = comments.iter().map(|c| c.id).collect();
            let votes = match viewer_id {
                Some(user_id) => ledger::comment_votes_by_user(conn, user_id, &ids)?,
                None => Default::default(),
            };

            Ok(comments
                .into_iter()
                .map(|comment| CommentView {
                    score: comment.score(),
                    user_vote: votes.get(&comment.id).copied(),
                    comment,
                })
                .collect())
        })
        .await
    }

    /// Adds a comment and tells the post's other subscribers about it.
    pub async fn add_comment(&self, user_id: i64, post_id: i64, body: &str) -> Result<Comment, EngageError> {
        let body = ammonia::clean(body);
        if body.trim().is_empty() {
            return Err(EngageError::InvalidArgument("comment body is empty".to_string()));
        }

        let (comment, notifications) = self
            .with_conn(move |conn| {
                let tx = conn.transaction()?;
                let post_title: String = tx
                    .query_row("SELECT title FROM posts WHERE id = ?1", [post_id], |row| {
                        row.get(0)
                    })
                    .map_err(EngageError::missing("post"))?;

                tx.execute(
                    "INSERT INTO comments (post_id, user_id, body, created_at) VALUES (?1, ?2, ?3, ?4)",
                    params![post_id, user_id, body, Utc::now()],
                )?;
                let id = tx.last_insert_rowid();
                let sql = format!("SELECT {COMMENT_COLUMNS} FROM comments c WHERE c.id = ?1");
                let comment = tx.query_row(&sql, [id], comment_from_row)?;

                let notifications = {
                    let mut stmt = tx.prepare(
                        "SELECT user_id FROM post_subscriptions WHERE post_id = ?1 AND user_id != ?2",
                    )?;
                    let subscribers = stmt
                        .query_map(params![post_id, user_id], |row| row.get::<_, i64>(0))?
                        .collect::<Result<Vec<_>, _>>()?;
                    subscribers
                        .into_iter()
                        .map(|subscriber| NewNotification::new_comment(subscriber, post_id, &post_title))
                        .collect::<Vec<_>>()
                };
                tx.commit()?;
                Ok((comment, notifications))
            })
            .await?;

        for notification in notifications {
            self.notifier.dispatch(notification);
        }
        Ok(comment)
    }

    pub async fn set_topic_subscription(
        &self,
        user_id: i64,
        topic_id: i64,
        subscribed: bool,
    ) -> Result<(), EngageError> {
        self.with_conn(move |conn| {
            conn.query_row("SELECT id FROM topics WHERE id = ?1", [topic_id], |row| {
                row.get::<_, i64>(0)
            })
            .map_err(EngageError::missing("topic"))?;

            if subscribed {
                conn.execute(
                    "INSERT OR IGNORE INTO topic_subscriptions (user_id, topic_id) VALUES (?1, ?2)",
                    params![user_id, topic_id],
                )?;
            } else {
                conn.execute(
                    "DELETE FROM topic_subscriptions WHERE user_id = ?1 AND topic_id = ?2",
                    params![user_id, topic_id],
                )?;
            }
            Ok(())
        })
        .await
    }

    pub async fn set_post_subscription(
        &self,
        user_id: i64,
        post_id: i64,
        subscribed: bool,
    ) -> Result<(), EngageError> {
        self.with_conn(move |conn| {
            ensure_post(conn, post_id)?;

            if subscribed {
                conn.execute(
                    "INSERT OR IGNORE INTO post_subscriptions (user_id, post_id) VALUES (?1, ?2)",
                    params![user_id, post_id],
                )?;
            } else {
                conn.execute(
                    "DELETE FROM post_subscriptions WHERE user_id = ?1 AND post_id = ?2",
                    params![user_id, post_id],
                )?;
            }
            Ok(())
        })
        .await
    }

    pub async fn user_titles(&self, user_id: i64) -> Result<Vec<UserTitle>, EngageError> {
        self.with_conn(move |conn| titles::titles_for_user(conn, user_id))
            .await
    }

    pub async fn notifications(&self, user_id: i64) -> Result<Vec<Notification>, EngageError> {
        self.with_conn(move |conn| notify::notifications_for_user(conn, user_id))
            .await
    }
}

fn ensure_post(conn: &Connection, post_id: i64) -> Result<(), EngageError> {
    conn.query_row("SELECT id FROM posts WHERE id = ?1", [post_id], |row| {
        row.get::<_, i64>(0)
    })
    .map_err(EngageError::missing("post"))?;
    Ok(())
}

/// Posts in creation order, which is the tie-break order for ranking.
fn load_posts(conn: &Connection, topic_id: Option<i64>) -> Result<Vec<Post>, EngageError> {
    let sql = format!(
        "SELECT {POST_COLUMNS} FROM posts p
         WHERE ?1 IS NULL OR p.topic_id = ?1
         ORDER BY p.id ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let posts = stmt
        .query_map([topic_id], post_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(posts)
}

fn subscribed_topics(conn: &Connection, user_id: i64) -> Result<Vec<i64>, EngageError> {
    let mut stmt = conn.prepare("SELECT topic_id FROM topic_subscriptions WHERE user_id = ?1")?;
    let topics = stmt
        .query_map([user_id], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(topics)
}
