//! Applies vote transitions to the denormalised counters on comments and posts.

use crate::ledger::Transition;

/// Up/down counters carried by a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommentTally {
    pub up: i64,
    pub down: i64,
}

impl CommentTally {
    pub fn new(up: i64, down: i64) -> Self {
        Self { up, down }
    }

    pub fn score(&self) -> i64 {
        self.up - self.down
    }

    /// Returns the new tally and the change in score. Counters floor at zero.
    pub fn apply(self, transition: &Transition) -> (CommentTally, i64) {
        let next = CommentTally {
            up: (self.up + transition.delta_up).max(0),
            down: (self.down + transition.delta_down).max(0),
        };
        (next, next.score() - self.score())
    }
}

/// Signed running total carried by a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PostRating(pub i64);

impl PostRating {
    /// A flip moves the total by two, a fresh vote or a withdrawal by one.
    pub fn apply(self, transition: &Transition) -> (PostRating, i64) {
        let delta = transition.delta_up - transition.delta_down;
        (PostRating(self.0 + delta), delta)
    }
}
