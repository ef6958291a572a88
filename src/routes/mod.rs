pub mod auth;
pub mod comments;
pub mod communities;
pub mod home;
pub mod posts;
pub mod users;

use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::votes::{Direction, LedgerError};

/// Assemble the full application: HTML pages plus the JSON API.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home::index))
        .route("/c/{name}", get(home::community))
        .route("/p/{id}", get(home::post))
        .merge(auth::router())
        .merge(users::router())
        .merge(communities::router())
        .merge(posts::router())
        .merge(comments::router())
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// Body of a post or comment vote. Older clients send `type`.
#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    #[serde(alias = "type")]
    pub direction: String,
}

impl VoteRequest {
    pub fn direction(&self) -> Result<Direction, LedgerError> {
        self.direction.parse()
    }
}

/// 1-based page number into a row offset.
pub(crate) fn offset(page: Option<u32>, limit: u32) -> u32 {
    page.unwrap_or(1).max(1).saturating_sub(1).saturating_mul(limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_is_one_based() {
        assert_eq!(offset(None, 20), 0);
        assert_eq!(offset(Some(0), 20), 0);
        assert_eq!(offset(Some(1), 20), 0);
        assert_eq!(offset(Some(3), 20), 40);
    }

    #[test]
    fn vote_request_accepts_legacy_field() {
        let req: VoteRequest = serde_json::from_str(r#"{"type":"down"}"#).unwrap();
        assert_eq!(req.direction().unwrap(), Direction::Down);

        let req: VoteRequest = serde_json::from_str(r#"{"direction":"sideways"}"#).unwrap();
        assert!(req.direction().is_err());
    }
}
