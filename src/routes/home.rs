use askama::Template;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::db::models::Post;
use crate::db::queries;
use crate::error::{AppError, AppResult};
use crate::extractors::MaybeUser;
use crate::ranking::SortOrder;
use crate::routes::posts::{feed, live_post, FeedFilter};
use crate::state::AppState;
use crate::threads::{self, CommentNode};

/// Left margin per reply level on the post page.
const INDENT_REM: usize = 2;

// -- Templates --

#[derive(Template)]
#[template(path = "pages/home.html")]
pub struct HomeTemplate {
    pub viewer: Option<String>,
    pub posts: Vec<PostRow>,
}

#[derive(Template)]
#[template(path = "pages/community.html")]
pub struct CommunityTemplate {
    pub viewer: Option<String>,
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub member_count: i64,
    pub rules: Vec<String>,
    pub sort: String,
    pub posts: Vec<PostRow>,
}

#[derive(Template)]
#[template(path = "pages/post.html")]
pub struct PostTemplate {
    pub viewer: Option<String>,
    pub post: PostRow,
    pub content: String,
    pub comments: Vec<ThreadLine>,
}

/// A post as listed on a page.
pub struct PostRow {
    pub id: String,
    pub title: String,
    pub community_name: String,
    pub author_username: String,
    pub score: i64,
    pub comment_count: i64,
    pub age: String,
}

impl From<&Post> for PostRow {
    fn from(post: &Post) -> Self {
        Self {
            id: post.id.clone(),
            title: post.title.clone(),
            community_name: post.community_name.clone(),
            author_username: post.author_username.clone(),
            score: post.score,
            comment_count: post.comment_count,
            age: parse_and_format_time(&post.created_at),
        }
    }
}

/// One comment of a thread, flattened in display order.
pub struct ThreadLine {
    pub indent: usize,
    pub author_username: String,
    pub content: Option<String>,
    pub score: i64,
    pub age: String,
}

/// Wrapper to render askama templates as axum responses
pub struct Html<T: Template>(pub T);

impl<T: Template> IntoResponse for Html<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                body,
            )
                .into_response(),
            Err(e) => {
                tracing::error!("Template render error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
            }
        }
    }
}

#[derive(Deserialize, Default)]
pub struct PageParams {
    pub sort: Option<String>,
}

/// GET / - front page, hottest posts across every community
pub async fn index(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let posts = feed(
        &conn,
        &FeedFilter::default(),
        SortOrder::Hot,
        state.config.feed.default_limit,
        0,
        state.config.feed.hot_window,
    )?;

    Ok(Html(HomeTemplate {
        viewer: viewer.map(|u| u.username),
        posts: posts.iter().map(PostRow::from).collect(),
    })
    .into_response())
}

/// GET /c/{name}
pub async fn community(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(name): Path<String>,
    Query(params): Query<PageParams>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let community = queries::find_community_by_name(&conn, &name)?.ok_or(AppError::NotFound)?;

    let sort: SortOrder = params.sort.as_deref().unwrap_or("hot").parse().unwrap_or_default();
    let filter = FeedFilter {
        community_id: Some(community.id.clone()),
        search: None,
    };
    let posts = feed(
        &conn,
        &filter,
        sort,
        state.config.feed.default_limit,
        0,
        state.config.feed.hot_window,
    )?;

    Ok(Html(CommunityTemplate {
        viewer: viewer.map(|u| u.username),
        name: community.name,
        display_name: community.display_name,
        description: community.description,
        member_count: community.member_count,
        rules: community.rules,
        sort: sort_label(sort).to_string(),
        posts: posts.iter().map(PostRow::from).collect(),
    })
    .into_response())
}

/// GET /p/{id}
pub async fn post(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let post = {
        let conn = state.db.get()?;
        live_post(&conn, &id)?
    };
    let thread = threads::load_thread(state.comments.as_ref(), &post.id).await?;

    Ok(Html(PostTemplate {
        viewer: viewer.map(|u| u.username),
        content: post.content.clone().unwrap_or_default(),
        post: PostRow::from(&post),
        comments: flatten_thread(thread),
    })
    .into_response())
}

fn sort_label(sort: SortOrder) -> &'static str {
    match sort {
        SortOrder::Hot => "hot",
        SortOrder::New => "new",
        SortOrder::Top => "top",
    }
}

/// Walk the tree depth-first into display order. Indentation follows the
/// position in the tree, so it stays correct even for re-rooted orphans.
pub fn flatten_thread(roots: Vec<CommentNode>) -> Vec<ThreadLine> {
    let mut lines = Vec::new();
    let mut stack: Vec<(usize, CommentNode)> = roots.into_iter().rev().map(|n| (0, n)).collect();

    while let Some((level, mut node)) = stack.pop() {
        let children = std::mem::take(&mut node.children);
        stack.extend(children.into_iter().rev().map(|c| (level + 1, c)));

        lines.push(ThreadLine {
            indent: level * INDENT_REM,
            author_username: std::mem::take(&mut node.author_username),
            content: node.content.take(),
            score: node.score,
            age: parse_and_format_time(&node.created_at),
        });
    }

    lines
}

/// Format a timestamp as relative time (e.g., "2m ago", "3h ago", "Jan 5").
pub fn format_relative_time(dt: &DateTime<Utc>) -> String {
    let diff = Utc::now().signed_duration_since(*dt);

    let seconds = diff.num_seconds();
    if seconds < 60 {
        return "just now".to_string();
    }

    let minutes = diff.num_minutes();
    if minutes < 60 {
        return format!("{}m ago", minutes);
    }

    let hours = diff.num_hours();
    if hours < 24 {
        return format!("{}h ago", hours);
    }

    let days = diff.num_days();
    if days < 7 {
        return format!("{}d ago", days);
    }

    dt.format("%b %-d, %Y").to_string()
}

/// Parse a stored RFC 3339 timestamp and format it; unparsable input is shown raw.
pub fn parse_and_format_time(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => format_relative_time(&dt.with_timezone(&Utc)),
        Err(_) => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn node(id: &str, depth: i64, children: Vec<CommentNode>) -> CommentNode {
        CommentNode {
            id: id.to_string(),
            parent_id: None,
            depth,
            author_id: "u1".to_string(),
            author_username: id.to_string(),
            content: Some(format!("{} says hi", id)),
            score: 0,
            is_deleted: false,
            created_at: "2025-01-15T12:00:00.000Z".to_string(),
            children,
        }
    }

    #[test]
    fn format_relative_time_just_now() {
        assert_eq!(format_relative_time(&Utc::now()), "just now");
    }

    #[test]
    fn format_relative_time_minutes() {
        let dt = Utc::now() - Duration::minutes(5);
        assert_eq!(format_relative_time(&dt), "5m ago");
    }

    #[test]
    fn format_relative_time_hours() {
        let dt = Utc::now() - Duration::hours(3);
        assert_eq!(format_relative_time(&dt), "3h ago");
    }

    #[test]
    fn format_relative_time_old_date() {
        let dt = Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap();
        assert_eq!(format_relative_time(&dt), "Jan 15, 2025");
    }

    #[test]
    fn parse_and_format_bad_input_returns_raw() {
        assert_eq!(parse_and_format_time("not-a-date"), "not-a-date");
    }

    #[test]
    fn flatten_thread_is_depth_first_with_indent() {
        let tree = vec![
            node("a", 0, vec![node("b", 1, vec![node("c", 2, vec![])]), node("d", 1, vec![])]),
            node("e", 0, vec![]),
        ];

        let lines = flatten_thread(tree);
        let order: Vec<(&str, usize)> = lines
            .iter()
            .map(|l| (l.author_username.as_str(), l.indent))
            .collect();
        assert_eq!(
            order,
            vec![("a", 0), ("b", 2), ("c", 4), ("d", 2), ("e", 0)]
        );
    }

    #[test]
    fn flatten_keeps_tombstones() {
        let mut gone = node("gone", 0, vec![node("reply", 1, vec![])]);
        gone.content = None;
        gone.is_deleted = true;

        let lines = flatten_thread(vec![gone]);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].content.is_none());
        assert_eq!(lines[1].indent, INDENT_REM);
    }
}
