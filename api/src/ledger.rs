//! One live vote per (voter, target) for comments and posts.
//!
//! Casting the direction a voter already holds withdraws the vote; casting the
//! other direction flips it. The vote row and the target's counters are written
//! in a single `BEGIN IMMEDIATE` transaction so concurrent casts on the same
//! target serialise on SQLite's write lock instead of losing updates.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use engage_shared::VoteDirection;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use crate::error::EngageError;
use crate::rating::{CommentTally, PostRating};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteState {
    NoVote,
    VotedUp,
    VotedDown,
}

impl VoteState {
    pub fn from_direction(direction: Option<VoteDirection>) -> Self {
        match direction {
            None => VoteState::NoVote,
            Some(VoteDirection::Up) => VoteState::VotedUp,
            Some(VoteDirection::Down) => VoteState::VotedDown,
        }
    }

    pub fn direction(self) -> Option<VoteDirection> {
        match self {
            VoteState::NoVote => None,
            VoteState::VotedUp => Some(VoteDirection::Up),
            VoteState::VotedDown => Some(VoteDirection::Down),
        }
    }
}

/// Result of casting one vote: the next state and the counter adjustments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: VoteState,
    pub to: VoteState,
    pub delta_up: i64,
    pub delta_down: i64,
}

pub fn transition(current: VoteState, cast: VoteDirection) -> Transition {
    let (to, delta_up, delta_down) = match (current, cast) {
        (VoteState::NoVote, VoteDirection::Up) => (VoteState::VotedUp, 1, 0),
        (VoteState::NoVote, VoteDirection::Down) => (VoteState::VotedDown, 0, 1),
        (VoteState::VotedUp, VoteDirection::Up) => (VoteState::NoVote, -1, 0),
        (VoteState::VotedUp, VoteDirection::Down) => (VoteState::VotedDown, -1, 1),
        (VoteState::VotedDown, VoteDirection::Up) => (VoteState::VotedUp, 1, -1),
        (VoteState::VotedDown, VoteDirection::Down) => (VoteState::NoVote, 0, -1),
    };
    Transition {
        from: current,
        to,
        delta_up,
        delta_down,
    }
}

#[derive(Debug, Clone, Copy)]
enum VoteTable {
    Comments,
    Posts,
}

impl VoteTable {
    fn table(self) -> &'static str {
        match self {
            VoteTable::Comments => "comment_votes",
            VoteTable::Posts => "post_votes",
        }
    }

    fn target_column(self) -> &'static str {
        match self {
            VoteTable::Comments => "comment_id",
            VoteTable::Posts => "post_id",
        }
    }

    fn current(self, conn: &Connection, voter_id: i64, target_id: i64) -> Result<VoteState, EngageError> {
        let sql = format!(
            "SELECT direction FROM {} WHERE user_id = ?1 AND {} = ?2",
            self.table(),
            self.target_column()
        );
        let stored: Option<String> = conn
            .query_row(&sql, params![voter_id, target_id], |row| row.get(0))
            .optional()?;
        let direction = stored.map(|s| s.parse::<VoteDirection>()).transpose()?;
        Ok(VoteState::from_direction(direction))
    }

    fn record(
        self,
        conn: &Connection,
        voter_id: i64,
        target_id: i64,
        transition: &Transition,
        now: DateTime<Utc>,
    ) -> Result<(), EngageError> {
        match transition.to.direction() {
            None => {
                let sql = format!(
                    "DELETE FROM {} WHERE user_id = ?1 AND {} = ?2",
                    self.table(),
                    self.target_column()
                );
                conn.execute(&sql, params![voter_id, target_id])?;
            }
            Some(direction) => {
                let sql = format!(
                    "INSERT INTO {table} (user_id, {col}, direction, cast_at)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(user_id, {col}) DO UPDATE SET direction = excluded.direction",
                    table = self.table(),
                    col = self.target_column()
                );
                conn.execute(&sql, params![voter_id, target_id, direction.as_str(), now])?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CommentVoteOutcome {
    pub comment_id: i64,
    pub author_id: i64,
    /// Topic of the post the comment belongs to, if the post has one.
    pub topic_id: Option<i64>,
    pub tally: CommentTally,
    pub transition: Transition,
}

impl CommentVoteOutcome {
    pub fn score(&self) -> i64 {
        self.tally.score()
    }
}

pub fn cast_comment_vote(
    conn: &mut Connection,
    voter_id: i64,
    comment_id: i64,
    direction: VoteDirection,
    now: DateTime<Utc>,
) -> Result<CommentVoteOutcome, EngageError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let (author_id, topic_id, up, down): (i64, Option<i64>, i64, i64) = tx
        .query_row(
            "SELECT c.user_id, p.topic_id, c.up_votes, c.down_votes
             FROM comments c JOIN posts p ON c.post_id = p.id
             WHERE c.id = ?1",
            [comment_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .map_err(EngageError::missing("comment"))?;

    let current = VoteTable::Comments.current(&tx, voter_id, comment_id)?;
    let transition = transition(current, direction);
    VoteTable::Comments.record(&tx, voter_id, comment_id, &transition, now)?;

    let (tally, delta) = CommentTally::new(up, down).apply(&transition);
    tx.execute(
        "UPDATE comments SET up_votes = ?2, down_votes = ?3 WHERE id = ?1",
        params![comment_id, tally.up, tally.down],
    )?;
    tx.commit()?;

    tracing::debug!(
        voter_id,
        comment_id,
        from = ?transition.from,
        to = ?transition.to,
        delta,
        "comment vote cast"
    );

    Ok(CommentVoteOutcome {
        comment_id,
        author_id,
        topic_id,
        tally,
        transition,
    })
}

#[derive(Debug, Clone)]
pub struct PostVoteOutcome {
    pub post_id: i64,
    pub rating: PostRating,
    pub transition: Transition,
}

pub fn cast_post_vote(
    conn: &mut Connection,
    voter_id: i64,
    post_id: i64,
    direction: VoteDirection,
    now: DateTime<Utc>,
) -> Result<PostVoteOutcome, EngageError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let rating: i64 = tx
        .query_row("SELECT rating FROM posts WHERE id = ?1", [post_id], |row| {
            row.get(0)
        })
        .map_err(EngageError::missing("post"))?;

    let current = VoteTable::Posts.current(&tx, voter_id, post_id)?;
    let transition = transition(current, direction);
    VoteTable::Posts.record(&tx, voter_id, post_id, &transition, now)?;

    let (rating, delta) = PostRating(rating).apply(&transition);
    tx.execute(
        "UPDATE posts SET rating = ?2 WHERE id = ?1",
        params![post_id, rating.0],
    )?;
    tx.commit()?;

    tracing::debug!(
        voter_id,
        post_id,
        from = ?transition.from,
        to = ?transition.to,
        delta,
        "post vote cast"
    );

    Ok(PostVoteOutcome {
        post_id,
        rating,
        transition,
    })
}

/// The voter's live direction for each of `comment_ids`; comments without a vote are absent.
pub fn comment_votes_by_user(
    conn: &Connection,
    voter_id: i64,
    comment_ids: &[i64],
) -> Result<HashMap<i64, VoteDirection>, EngageError> {
    let mut stmt = conn.prepare(
        "SELECT direction FROM comment_votes WHERE user_id = ?1 AND comment_id = ?2",
    )?;
    let mut votes = HashMap::new();
    for &comment_id in comment_ids {
        let stored: Option<String> = stmt
            .query_row(params![voter_id, comment_id], |row| row.get(0))
            .optional()?;
        if let Some(direction) = stored {
            votes.insert(comment_id, direction.parse()?);
        }
    }
    Ok(votes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::TestDb;
    use engage_shared::VoteDirection::{Down, Up};

    #[test]
    fn transition_table() {
        let cases = [
            (VoteState::NoVote, Up, VoteState::VotedUp, 1, 0),
            (VoteState::NoVote, Down, VoteState::VotedDown, 0, 1),
            (VoteState::VotedUp, Up, VoteState::NoVote, -1, 0),
            (VoteState::VotedUp, Down, VoteState::VotedDown, -1, 1),
            (VoteState::VotedDown, Up, VoteState::VotedUp, 1, -1),
            (VoteState::VotedDown, Down, VoteState::NoVote, 0, -1),
        ];
        for (from, cast, to, du, dd) in cases {
            let t = transition(from, cast);
            assert_eq!((t.to, t.delta_up, t.delta_down), (to, du, dd), "{from:?} + {cast}");
        }
    }

    #[test]
    fn same_direction_twice_returns_to_no_vote() {
        for cast in [Up, Down] {
            let first = transition(VoteState::NoVote, cast);
            let second = transition(first.to, cast);
            assert_eq!(second.to, VoteState::NoVote);
            assert_eq!(first.delta_up + second.delta_up, 0);
            assert_eq!(first.delta_down + second.delta_down, 0);
        }
    }

    #[test]
    fn comment_vote_walkthrough() {
        let db = TestDb::new();
        let author = db.user("author");
        let a = db.user("a");
        let b = db.user("b");
        let post = db.post(None, author, "p", Utc::now());
        let comment = db.comment(post, author);
        let mut conn = db.pool.get().unwrap();
        let now = Utc::now();

        assert_eq!(cast_comment_vote(&mut conn, a, comment, Up, now).unwrap().score(), 1);
        assert_eq!(cast_comment_vote(&mut conn, a, comment, Up, now).unwrap().score(), 0);
        assert_eq!(cast_comment_vote(&mut conn, b, comment, Down, now).unwrap().score(), -1);
        let last = cast_comment_vote(&mut conn, a, comment, Up, now).unwrap();
        assert_eq!(last.score(), 0);
        assert_eq!(last.tally, CommentTally::new(1, 1));

        let votes: i64 = conn
            .query_row("SELECT COUNT(*) FROM comment_votes WHERE comment_id = ?1", [comment], |r| r.get(0))
            .unwrap();
        assert_eq!(votes, 2);
    }

    #[test]
    fn flip_matches_direct_down_vote() {
        let db = TestDb::new();
        let author = db.user("author");
        let a = db.user("a");
        let b = db.user("b");
        let post = db.post(None, author, "p", Utc::now());
        let flipped = db.comment(post, author);
        let direct = db.comment(post, author);
        let mut conn = db.pool.get().unwrap();
        let now = Utc::now();

        cast_comment_vote(&mut conn, a, flipped, Up, now).unwrap();
        let after_flip = cast_comment_vote(&mut conn, a, flipped, Down, now).unwrap();
        let after_direct = cast_comment_vote(&mut conn, b, direct, Down, now).unwrap();

        assert_eq!(after_flip.tally, after_direct.tally);
        assert_eq!(after_flip.transition.to, VoteState::VotedDown);
    }

    #[test]
    fn unknown_comment_is_not_found() {
        let db = TestDb::new();
        let a = db.user("a");
        let mut conn = db.pool.get().unwrap();
        let err = cast_comment_vote(&mut conn, a, 999, Up, Utc::now()).unwrap_err();
        assert!(matches!(err, EngageError::NotFound("comment")));
    }

    #[test]
    fn post_flip_and_withdraw_magnitudes() {
        let db = TestDb::new();
        let author = db.user("author");
        let a = db.user("a");
        let post = db.post(None, author, "p", Utc::now());
        let mut conn = db.pool.get().unwrap();
        let now = Utc::now();

        let up = cast_post_vote(&mut conn, a, post, Up, now).unwrap();
        assert_eq!(up.rating, PostRating(1));
        let down = cast_post_vote(&mut conn, a, post, Down, now).unwrap();
        assert_eq!(down.rating.0 - up.rating.0, -2);
        let up_again = cast_post_vote(&mut conn, a, post, Up, now).unwrap();
        let withdrawn = cast_post_vote(&mut conn, a, post, Up, now).unwrap();
        assert_eq!(withdrawn.rating.0 - up_again.rating.0, -1);
        assert_eq!(withdrawn.rating, PostRating(0));
    }

    #[test]
    fn unknown_post_is_not_found() {
        let db = TestDb::new();
        let a = db.user("a");
        let mut conn = db.pool.get().unwrap();
        let err = cast_post_vote(&mut conn, a, 42, Down, Utc::now()).unwrap_err();
        assert!(matches!(err, EngageError::NotFound("post")));
    }

    #[test]
    fn viewer_votes_cover_only_voted_comments() {
        let db = TestDb::new();
        let author = db.user("author");
        let a = db.user("a");
        let post = db.post(None, author, "p", Utc::now());
        let c1 = db.comment(post, author);
        let c2 = db.comment(post, author);
        let mut conn = db.pool.get().unwrap();
        cast_comment_vote(&mut conn, a, c1, Down, Utc::now()).unwrap();

        let votes = comment_votes_by_user(&conn, a, &[c1, c2]).unwrap();
        assert_eq!(votes.get(&c1), Some(&Down));
        assert_eq!(votes.get(&c2), None);
    }

    #[test]
    fn held_write_lock_is_a_conflict() {
        let db = TestDb::with_busy_timeout(std::time::Duration::from_millis(50));
        let author = db.user("author");
        let voter = db.user("voter");
        let post = db.post(None, author, "post", Utc::now());
        let comment = db.comment(post, author);

        let holder = db.pool.get().unwrap();
        holder.execute_batch("BEGIN IMMEDIATE").unwrap();

        let mut conn = db.pool.get().unwrap();
        let err = cast_comment_vote(&mut conn, voter, comment, Up, Utc::now()).unwrap_err();
        assert!(matches!(err, EngageError::Conflict), "got {err:?}");

        holder.execute_batch("ROLLBACK").unwrap();
        let outcome = cast_comment_vote(&mut conn, voter, comment, Up, Utc::now()).unwrap();
        assert_eq!(outcome.score(), 1);
    }
}
