#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use engage_api::{
    config::Config,
    db,
    notify::{NewNotification, Notifier},
    DbPool, EngagementService,
};
use tokio::sync::mpsc;

static NEXT: AtomicUsize = AtomicUsize::new(0);

pub struct Harness {
    pub pool: DbPool,
    pub service: EngagementService,
    pub notifications: mpsc::Receiver<NewNotification>,
    path: PathBuf,
}

impl Harness {
    pub fn new() -> Self {
        let config = Config::default();
        let path = std::env::temp_dir().join(format!(
            "engage-it-{}-{}.db",
            std::process::id(),
            NEXT.fetch_add(1, Ordering::SeqCst)
        ));
        let _ = std::fs::remove_file(&path);

        let pool = db::build_pool(path.to_str().unwrap(), config.busy_timeout).unwrap();
        db::run_migrations(&pool).unwrap();
        let (notifier, notifications) = Notifier::channel(config.notify_queue);
        let service = EngagementService::new(pool.clone(), notifier, config.strict_vote_direction);

        Self {
            pool,
            service,
            notifications,
            path,
        }
    }

    pub fn user(&self, name: &str) -> i64 {
        let conn = self.pool.get().unwrap();
        conn.execute("INSERT INTO users (username) VALUES (?1)", [name])
            .unwrap();
        conn.last_insert_rowid()
    }

    pub fn topic(&self, name: &str) -> i64 {
        let conn = self.pool.get().unwrap();
        conn.execute("INSERT INTO topics (name) VALUES (?1)", [name])
            .unwrap();
        conn.last_insert_rowid()
    }

    pub fn post(&self, topic_id: Option<i64>, author: i64, title: &str, created_at: DateTime<Utc>) -> i64 {
        let conn = self.pool.get().unwrap();
        conn.execute(
            "INSERT INTO posts (topic_id, user_id, title, created_at) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![topic_id, author, title, created_at],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    pub fn set_post_rating(&self, post_id: i64, rating: i64) {
        self.pool
            .get()
            .unwrap()
            .execute("UPDATE posts SET rating = ?2 WHERE id = ?1", [post_id, rating])
            .unwrap();
    }

    pub fn comment(&self, post_id: i64, author: i64, up_votes: i64) -> i64 {
        let conn = self.pool.get().unwrap();
        conn.execute(
            "INSERT INTO comments (post_id, user_id, body, up_votes) VALUES (?1, ?2, 'text', ?3)",
            [post_id, author, up_votes],
        )
        .unwrap();
        conn.last_insert_rowid()
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut p = self.path.clone().into_os_string();
            p.push(suffix);
            let _ = std::fs::remove_file(p);
        }
    }
}
