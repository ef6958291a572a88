use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::str::FromStr;

use crate::db::models::Post;

/// Exponent applied to a post's age in the hot formula.
pub const HOT_GRAVITY: f64 = 1.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Hot,
    New,
    Top,
}

impl FromStr for SortOrder {
    type Err = std::convert::Infallible;

    /// Unknown values fall back to `Hot`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "new" => SortOrder::New,
            "top" => SortOrder::Top,
            _ => SortOrder::Hot,
        })
    }
}

/// `score / (age_hours + 2)^1.8`
pub fn hot_score(score: i64, created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let age_hours = (now - created_at).num_seconds().max(0) as f64 / 3600.0;
    score as f64 / (age_hours + 2.0).powf(HOT_GRAVITY)
}

fn parse_time(raw: &str, fallback: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(fallback)
}

/// Sort posts hottest first; equal heat goes to the newer post.
pub fn rank_hot(posts: &mut [Post], now: DateTime<Utc>) {
    let mut keyed: Vec<(f64, usize)> = posts
        .iter()
        .enumerate()
        .map(|(i, p)| (hot_score(p.score, parse_time(&p.created_at, now), now), i))
        .collect();

    keyed.sort_by(|(a_heat, a), (b_heat, b)| {
        b_heat
            .partial_cmp(a_heat)
            .unwrap_or(Ordering::Equal)
            .then_with(|| posts[*b].created_at.cmp(&posts[*a].created_at))
    });

    let order: Vec<usize> = keyed.into_iter().map(|(_, i)| i).collect();
    apply_permutation(posts, order);
}

fn apply_permutation<T>(items: &mut [T], order: Vec<usize>) {
    // order[k] is the current index of the item that belongs at position k
    let mut position: Vec<usize> = vec![0; order.len()];
    for (k, &i) in order.iter().enumerate() {
        position[i] = k;
    }
    for i in 0..items.len() {
        while position[i] != i {
            let target = position[i];
            items.swap(i, target);
            position.swap(i, target);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::votes::VoteSets;
    use chrono::Duration;

    fn post(id: &str, score: i64, created_at: DateTime<Utc>) -> Post {
        Post {
            id: id.to_string(),
            title: id.to_string(),
            content: None,
            image: None,
            author_id: "u1".into(),
            author_username: "alice".into(),
            community_id: "c1".into(),
            community_name: "rust".into(),
            score,
            comment_count: 0,
            is_deleted: false,
            version: 0,
            created_at: created_at.to_rfc3339(),
            updated_at: created_at.to_rfc3339(),
            votes: VoteSets::new(),
        }
    }

    #[test]
    fn parse_sort_order() {
        assert_eq!("new".parse::<SortOrder>().unwrap(), SortOrder::New);
        assert_eq!("TOP".parse::<SortOrder>().unwrap(), SortOrder::Top);
        assert_eq!("hot".parse::<SortOrder>().unwrap(), SortOrder::Hot);
        assert_eq!("whatever".parse::<SortOrder>().unwrap(), SortOrder::Hot);
    }

    #[test]
    fn hot_score_decays_with_age() {
        let now = Utc::now();
        let fresh = hot_score(10, now, now);
        let day_old = hot_score(10, now - Duration::hours(24), now);
        assert!(fresh > day_old);
        assert!((fresh - 10.0 / 2f64.powf(HOT_GRAVITY)).abs() < 1e-9);
    }

    #[test]
    fn future_timestamps_count_as_brand_new() {
        let now = Utc::now();
        assert_eq!(
            hot_score(5, now + Duration::hours(3), now),
            hot_score(5, now, now)
        );
    }

    #[test]
    fn rank_hot_prefers_fresh_activity() {
        let now = Utc::now();
        let mut posts = vec![
            post("old-popular", 50, now - Duration::days(3)),
            post("fresh-modest", 5, now - Duration::minutes(30)),
            post("fresh-zero", 0, now - Duration::minutes(5)),
            post("stale-zero", 0, now - Duration::days(1)),
        ];

        rank_hot(&mut posts, now);
        let order: Vec<&str> = posts.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(
            order,
            vec!["fresh-modest", "old-popular", "fresh-zero", "stale-zero"]
        );
    }
}
