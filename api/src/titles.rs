//! Topic expert titles.
//!
//! A user earns `"<Topic> Expert"` the first time they have at least
//! [`REQUIRED_COMMENTS`] comments in that topic scoring above
//! [`QUALIFYING_SCORE`]. Titles are never revoked or re-granted.

use chrono::{DateTime, Utc};
use engage_shared::{Comment, Topic, UserTitle};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use crate::db::{comment_from_row, COMMENT_COLUMNS};
use crate::error::EngageError;

pub const QUALIFYING_SCORE: i64 = 3;
pub const REQUIRED_COMMENTS: usize = 5;

/// Reads and writes the title evaluation needs.
pub trait TitleStore {
    fn has_title(&self, user_id: i64, topic_id: i64) -> Result<bool, EngageError>;

    fn comments_by_user_in_topic(&self, user_id: i64, topic_id: i64) -> Result<Vec<Comment>, EngageError>;

    fn topic(&self, topic_id: i64) -> Result<Option<Topic>, EngageError>;

    /// Inserts the title unless one already exists for (user, topic). Returns whether it was inserted.
    fn grant_title(&self, title: &UserTitle) -> Result<bool, EngageError>;
}

pub fn qualifies<'a>(comments: impl IntoIterator<Item = &'a Comment>) -> bool {
    comments
        .into_iter()
        .filter(|c| c.score() > QUALIFYING_SCORE)
        .count()
        >= REQUIRED_COMMENTS
}

pub fn title_for(topic: &Topic) -> String {
    format!("{} Expert", topic.name)
}

/// Grants the topic title if the user has just qualified. `Ok(None)` covers
/// "already titled", "not qualified" and "topic missing".
pub fn evaluate<S: TitleStore + ?Sized>(
    store: &S,
    user_id: i64,
    topic_id: i64,
    now: DateTime<Utc>,
) -> Result<Option<UserTitle>, EngageError> {
    if store.has_title(user_id, topic_id)? {
        return Ok(None);
    }

    let comments = store.comments_by_user_in_topic(user_id, topic_id)?;
    if !qualifies(&comments) {
        return Ok(None);
    }

    let Some(topic) = store.topic(topic_id)? else {
        return Ok(None);
    };

    let title = UserTitle {
        user_id,
        topic_id,
        title: title_for(&topic),
        acquired_at: now,
    };
    if store.grant_title(&title)? {
        tracing::info!(user_id, topic_id, title = %title.title, "title granted");
        Ok(Some(title))
    } else {
        Ok(None)
    }
}

/// Runs [`evaluate`] inside its own write transaction so the existence check
/// and the insert cannot interleave with another evaluation.
pub fn evaluate_in_transaction(
    conn: &mut Connection,
    user_id: i64,
    topic_id: i64,
    now: DateTime<Utc>,
) -> Result<Option<UserTitle>, EngageError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let granted = evaluate(&*tx, user_id, topic_id, now)?;
    tx.commit()?;
    Ok(granted)
}

impl TitleStore for Connection {
    fn has_title(&self, user_id: i64, topic_id: i64) -> Result<bool, EngageError> {
        let found = self
            .query_row(
                "SELECT 1 FROM user_titles WHERE user_id = ?1 AND topic_id = ?2",
                params![user_id, topic_id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn comments_by_user_in_topic(&self, user_id: i64, topic_id: i64) -> Result<Vec<Comment>, EngageError> {
        let sql = format!(
            "SELECT {COMMENT_COLUMNS}
             FROM comments c
             JOIN posts p ON c.post_id = p.id
             WHERE c.user_id = ?1 AND p.topic_id = ?2"
        );
        let mut stmt = self.prepare(&sql)?;
        let rows = stmt.query_map(params![user_id, topic_id], comment_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn topic(&self, topic_id: i64) -> Result<Option<Topic>, EngageError> {
        Ok(self
            .query_row(
                "SELECT id, name FROM topics WHERE id = ?1",
                [topic_id],
                |row| {
                    Ok(Topic {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?)
    }

    fn grant_title(&self, title: &UserTitle) -> Result<bool, EngageError> {
        let inserted = self.execute(
            "INSERT OR IGNORE INTO user_titles (user_id, topic_id, title, acquired_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![title.user_id, title.topic_id, title.title, title.acquired_at],
        )?;
        Ok(inserted == 1)
    }
}

pub fn titles_for_user(conn: &Connection, user_id: i64) -> Result<Vec<UserTitle>, EngageError> {
    let mut stmt = conn.prepare(
        "SELECT user_id, topic_id, title, acquired_at FROM user_titles
         WHERE user_id = ?1 ORDER BY acquired_at ASC",
    )?;
    let rows = stmt.query_map([user_id], |row| {
        Ok(UserTitle {
            user_id: row.get(0)?,
            topic_id: row.get(1)?,
            title: row.get(2)?,
            acquired_at: row.get(3)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}
