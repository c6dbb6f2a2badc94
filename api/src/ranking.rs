//! Post ranking: a composite weight of subscription bonus, rating and recency,
//! plus the sort policies and pagination used by post listings.

use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::{DateTime, Utc};
use engage_shared::{Paginated, Post};

pub const SUBSCRIPTION_BONUS: f64 = 50.0;
pub const RATING_SCALE: f64 = 20.0;
pub const FRESHNESS_PEAK: f64 = 100.0;
pub const HALF_LIFE_HOURS: f64 = 24.0;

pub fn subscription_weight(subscribed: bool) -> f64 {
    if subscribed {
        SUBSCRIPTION_BONUS
    } else {
        0.0
    }
}

/// Negative ratings contribute nothing rather than pulling the weight down.
pub fn rating_weight(rating: i64) -> f64 {
    (rating.max(0) as f64 + 1.0).ln() * RATING_SCALE
}

pub fn time_weight(created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let age_hours = (now - created_at).num_milliseconds() as f64 / 3_600_000.0;
    FRESHNESS_PEAK * 0.5_f64.powf(age_hours / HALF_LIFE_HOURS)
}

pub fn weight(post: &Post, subscribed: bool, now: DateTime<Utc>) -> f64 {
    subscription_weight(subscribed) + rating_weight(post.rating) + time_weight(post.created_at, now)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    TitleAsc,
    TitleDesc,
    /// `ratinga`: highest weight first.
    WeightDesc,
    /// `ratingd`: lowest weight first.
    WeightAsc,
    Newest,
    Oldest,
}

impl SortKey {
    pub const DEFAULT_KEY: &'static str = "ratinga";

    /// Unknown keys fall back to highest weight first.
    pub fn parse(key: &str) -> Self {
        match key.to_ascii_lowercase().as_str() {
            "titlea" => SortKey::TitleAsc,
            "titled" => SortKey::TitleDesc,
            "ratingd" => SortKey::WeightAsc,
            "newest" => SortKey::Newest,
            "oldest" => SortKey::Oldest,
            _ => SortKey::WeightDesc,
        }
    }
}

/// Which topics the viewer is subscribed to; empty for anonymous viewers.
#[derive(Debug, Clone, Default)]
pub struct Viewer {
    subscribed_topics: HashSet<i64>,
}

impl Viewer {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn subscribed_to(topics: impl IntoIterator<Item = i64>) -> Self {
        Self {
            subscribed_topics: topics.into_iter().collect(),
        }
    }

    pub fn is_subscribed(&self, topic_id: Option<i64>) -> bool {
        topic_id.is_some_and(|id| self.subscribed_topics.contains(&id))
    }
}

/// Sorts `posts` under `key` and cuts out one page.
///
/// The sort is stable, so equal keys keep their input order. `page` is clamped
/// to `[1, max(1, total_pages)]` and a non-positive `page_size` is treated as 1.
pub fn rank_posts(
    posts: Vec<Post>,
    viewer: &Viewer,
    key: SortKey,
    now: DateTime<Utc>,
    page: i64,
    page_size: i64,
) -> Paginated<Post> {
    let mut weighted: Vec<(Post, f64)> = posts
        .into_iter()
        .map(|post| {
            let w = weight(&post, viewer.is_subscribed(post.topic_id), now);
            (post, w)
        })
        .collect();

    weighted.sort_by(|(a, wa), (b, wb)| compare(key, a, *wa, b, *wb));

    let per_page = page_size.max(1);
    let total = weighted.len() as i64;
    let total_pages = if total == 0 { 0 } else { (total - 1) / per_page + 1 };
    let page = page.clamp(1, total_pages.max(1));
    let offset = ((page - 1) * per_page) as usize;

    let items = weighted
        .into_iter()
        .skip(offset)
        .take(per_page as usize)
        .map(|(post, _)| post)
        .collect();

    Paginated {
        items,
        total,
        page,
        per_page,
        total_pages,
    }
}

fn compare(key: SortKey, a: &Post, wa: f64, b: &Post, wb: f64) -> Ordering {
    match key {
        SortKey::TitleAsc => a.title.cmp(&b.title),
        SortKey::TitleDesc => b.title.cmp(&a.title),
        SortKey::WeightDesc => wb.total_cmp(&wa),
        SortKey::WeightAsc => wa.total_cmp(&wb),
        SortKey::Newest => b.created_at.cmp(&a.created_at),
        SortKey::Oldest => a.created_at.cmp(&b.created_at),
    }
}
