//! Best-effort notification dispatch.
//!
//! Callers hand notifications to a bounded channel and move on; a background
//! task persists them. A full or closed channel drops the notification with a
//! warning, it never fails the caller.

use engage_shared::{Notification, UserTitle};
use rusqlite::{params, Connection};
use tokio::sync::mpsc;

use crate::{error::EngageError, DbPool};

#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub user_id: i64,
    pub message: String,
    pub post_id: Option<i64>,
    pub topic_id: Option<i64>,
}

impl NewNotification {
    pub fn title_granted(title: &UserTitle) -> Self {
        Self {
            user_id: title.user_id,
            message: format!("You earned the title '{}'", title.title),
            post_id: None,
            topic_id: Some(title.topic_id),
        }
    }

    pub fn new_comment(subscriber_id: i64, post_id: i64, post_title: &str) -> Self {
        Self {
            user_id: subscriber_id,
            message: format!("New comment on post '{post_title}' you're subscribed to"),
            post_id: Some(post_id),
            topic_id: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::Sender<NewNotification>,
}

impl Notifier {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<NewNotification>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    pub fn dispatch(&self, notification: NewNotification) {
        if let Err(e) = self.tx.try_send(notification) {
            tracing::warn!(error = %e, "notification dropped");
        }
    }
}

/// Drains the channel until every `Notifier` is dropped.
pub async fn run_dispatcher(pool: DbPool, mut rx: mpsc::Receiver<NewNotification>) {
    while let Some(notification) = rx.recv().await {
        let pool = pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            store(&conn, &notification)
        })
        .await;

        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "failed to persist notification"),
            Err(e) => tracing::warn!(error = %e, "notification task failed"),
        }
    }
    tracing::info!("notification dispatcher stopped");
}

pub fn store(conn: &Connection, n: &NewNotification) -> Result<(), EngageError> {
    conn.execute(
        "INSERT INTO notifications (user_id, message, post_id, topic_id) VALUES (?1, ?2, ?3, ?4)",
        params![n.user_id, n.message, n.post_id, n.topic_id],
    )?;
    Ok(())
}

pub fn notifications_for_user(conn: &Connection, user_id: i64) -> Result<Vec<Notification>, EngageError> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, message, post_id, topic_id, is_read, created_at
         FROM notifications WHERE user_id = ?1
         ORDER BY created_at DESC, id DESC",
    )?;
    let rows = stmt.query_map([user_id], |row| {
        Ok(Notification {
            id: row.get(0)?,
            user_id: row.get(1)?,
            message: row.get(2)?,
            post_id: row.get(3)?,
            topic_id: row.get(4)?,
            is_read: row.get(5)?,
            created_at: row.get(6)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}
