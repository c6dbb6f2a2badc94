use std::time::Duration;

use engage_shared::{Comment, Post};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Row;

use crate::{error::EngageError, DbPool};

/// Column list matching [`post_from_row`].
pub const POST_COLUMNS: &str = "p.id, p.topic_id, p.user_id, p.title, p.body, p.rating, p.created_at";

/// Column list matching [`comment_from_row`].
pub const COMMENT_COLUMNS: &str =
    "c.id, c.post_id, c.user_id, c.body, c.up_votes, c.down_votes, c.created_at";

pub fn post_from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        topic_id: row.get(1)?,
        user_id: row.get(2)?,
        title: row.get(3)?,
        body: row.get(4)?,
        rating: row.get(5)?,
        created_at: row.get(6)?,
    })
}

pub fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        post_id: row.get(1)?,
        user_id: row.get(2)?,
        body: row.get(3)?,
        up_votes: row.get(4)?,
        down_votes: row.get(5)?,
        created_at: row.get(6)?,
    })
}

pub fn build_pool(database_url: &str, busy_timeout: Duration) -> Result<DbPool, EngageError> {
    let manager = SqliteConnectionManager::file(database_url).with_init(move |conn| {
        conn.busy_timeout(busy_timeout)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
        Ok(())
    });
    Ok(r2d2::Pool::new(manager)?)
}

pub fn run_migrations(pool: &DbPool) -> Result<(), EngageError> {
    let conn = pool.get()?;

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            username    TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS topics (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            name        TEXT UNIQUE NOT NULL
        );

        CREATE TABLE IF NOT EXISTS topic_subscriptions (
            user_id     INTEGER NOT NULL REFERENCES users(id),
            topic_id    INTEGER NOT NULL REFERENCES topics(id),
            PRIMARY KEY (user_id, topic_id)
        );

        CREATE TABLE IF NOT EXISTS posts (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            topic_id    INTEGER REFERENCES topics(id),
            user_id     INTEGER REFERENCES users(id),
            title       TEXT NOT NULL,
            body        TEXT NOT NULL DEFAULT '',
            rating      INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_posts_topic ON posts(topic_id);

        CREATE TABLE IF NOT EXISTS post_subscriptions (
            user_id     INTEGER NOT NULL REFERENCES users(id),
            post_id     INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
            PRIMARY KEY (user_id, post_id)
        );

        CREATE TABLE IF NOT EXISTS comments (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            post_id     INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
            user_id     INTEGER NOT NULL REFERENCES users(id),
            body        TEXT NOT NULL,
            up_votes    INTEGER NOT NULL DEFAULT 0,
            down_votes  INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id);
        CREATE INDEX IF NOT EXISTS idx_comments_user ON comments(user_id);

        CREATE TABLE IF NOT EXISTS comment_votes (
            user_id     INTEGER NOT NULL REFERENCES users(id),
            comment_id  INTEGER NOT NULL REFERENCES comments(id) ON DELETE CASCADE,
            direction   TEXT NOT NULL CHECK (direction IN ('up', 'down')),
            cast_at     TEXT NOT NULL,
            UNIQUE(user_id, comment_id)
        );

        CREATE TABLE IF NOT EXISTS post_votes (
            user_id     INTEGER NOT NULL REFERENCES users(id),
            post_id     INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
            direction   TEXT NOT NULL CHECK (direction IN ('up', 'down')),
            cast_at     TEXT NOT NULL,
            UNIQUE(user_id, post_id)
        );

        CREATE TABLE IF NOT EXISTS user_titles (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id     INTEGER NOT NULL REFERENCES users(id),
            topic_id    INTEGER NOT NULL REFERENCES topics(id),
            title       TEXT NOT NULL,
            acquired_at TEXT NOT NULL,
            UNIQUE(user_id, topic_id)
        );

        CREATE TABLE IF NOT EXISTS notifications (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id     INTEGER NOT NULL REFERENCES users(id),
            message     TEXT NOT NULL,
            post_id     INTEGER,
            topic_id    INTEGER,
            is_read     INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications(user_id);
        ",
    )?;

    Ok(())
}
