use serde::{Deserialize, Serialize};

use crate::votes::VoteSets;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: String,
    pub display_name: String,
    pub bio: Option<String>,
    pub avatar: Option<String>,
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,
    pub karma: i64,
    pub created_at: String,
}

/// Public view of a user, embedded in posts and communities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Community {
    pub id: String,
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub avatar: Option<String>,
    pub banner: Option<String>,
    pub creator_id: String,
    pub member_count: i64,
    pub rules: Vec<String>,
    pub is_private: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub title: String,
    pub content: Option<String>,
    pub image: Option<String>,
    pub author_id: String,
    pub author_username: String,
    pub community_id: String,
    pub community_name: String,
    pub score: i64,
    pub comment_count: i64,
    pub is_deleted: bool,
    #[serde(skip)]
    pub version: i64,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip)]
    pub votes: VoteSets,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub parent_id: Option<String>,
    pub author_id: String,
    pub content: String,
    pub depth: i64,
    pub score: i64,
    pub is_deleted: bool,
    #[serde(skip)]
    pub version: i64,
    pub created_at: String,
    #[serde(skip)]
    pub votes: VoteSets,
}
