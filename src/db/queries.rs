// Row loaders shared by repositories and route handlers
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeSet;

use crate::db::models::{Comment, Community, Post, User, UserSummary};
use crate::votes::{SubjectKind, VoteSets};

const USER_COLUMNS: &str =
    "id, email, username, display_name, bio, avatar, password_hash, karma, created_at";

fn map_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        username: row.get(2)?,
        display_name: row.get(3)?,
        bio: row.get(4)?,
        avatar: row.get(5)?,
        password_hash: row.get(6)?,
        karma: row.get(7)?,
        created_at: row.get(8)?,
    })
}

pub fn find_user_by_id(conn: &Connection, id: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
        params![id],
        map_user,
    )
    .optional()
}

pub fn find_user_by_email(conn: &Connection, email: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS),
        params![email.to_lowercase()],
        map_user,
    )
    .optional()
}

pub fn find_user_by_username(conn: &Connection, username: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS),
        params![username],
        map_user,
    )
    .optional()
}

/// Columns written when an account is created.
pub struct NewUser<'a> {
    pub id: &'a str,
    pub email: &'a str,
    pub username: &'a str,
    pub display_name: &'a str,
    pub password_hash: &'a str,
    pub created_at: &'a str,
}

/// Insert a user. Returns `false` when the email or username is already taken.
pub fn insert_user(conn: &Connection, user: &NewUser<'_>) -> rusqlite::Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO users (id, email, username, display_name, password_hash, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            user.id,
            user.email,
            user.username,
            user.display_name,
            user.password_hash,
            user.created_at
        ],
    )?;
    Ok(inserted > 0)
}

pub const COMMUNITY_COLUMNS: &str = "id, name, display_name, description, avatar, banner, creator_id, \
     member_count, rules_json, is_private, created_at, updated_at";

pub fn map_community(row: &Row<'_>) -> rusqlite::Result<Community> {
    let rules_json: String = row.get(8)?;
    Ok(Community {
        id: row.get(0)?,
        name: row.get(1)?,
        display_name: row.get(2)?,
        description: row.get(3)?,
        avatar: row.get(4)?,
        banner: row.get(5)?,
        creator_id: row.get(6)?,
        member_count: row.get(7)?,
        rules: serde_json::from_str(&rules_json).unwrap_or_default(),
        is_private: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

pub fn find_community_by_name(
    conn: &Connection,
    name: &str,
) -> rusqlite::Result<Option<Community>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM communities WHERE name = ?1",
            COMMUNITY_COLUMNS
        ),
        params![name.to_lowercase()],
        map_community,
    )
    .optional()
}

pub fn find_community_by_id(conn: &Connection, id: &str) -> rusqlite::Result<Option<Community>> {
    conn.query_row(
        &format!("SELECT {} FROM communities WHERE id = ?1", COMMUNITY_COLUMNS),
        params![id],
        map_community,
    )
    .optional()
}

pub struct NewCommunity<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub display_name: &'a str,
    pub description: &'a str,
    pub avatar: Option<&'a str>,
    pub banner: Option<&'a str>,
    pub creator_id: &'a str,
    pub rules_json: &'a str,
    pub is_private: bool,
    pub created_at: &'a str,
}

/// Insert a community with its creator counted as the first member.
/// Returns `false` when the name is already taken.
pub fn insert_community(conn: &Connection, community: &NewCommunity<'_>) -> rusqlite::Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO communities
            (id, name, display_name, description, avatar, banner, creator_id,
             member_count, rules_json, is_private, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8, ?9, ?10, ?10)",
        params![
            community.id,
            community.name,
            community.display_name,
            community.description,
            community.avatar,
            community.banner,
            community.creator_id,
            community.rules_json,
            community.is_private,
            community.created_at
        ],
    )?;
    Ok(inserted > 0)
}

/// Add a membership row. Returns `false` when the user already belongs.
pub fn add_member(
    conn: &Connection,
    community_id: &str,
    user_id: &str,
    is_moderator: bool,
) -> rusqlite::Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO community_members (community_id, user_id, is_moderator)
         VALUES (?1, ?2, ?3)",
        params![community_id, user_id, is_moderator],
    )?;
    Ok(inserted > 0)
}

pub fn is_member(conn: &Connection, community_id: &str, user_id: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM community_members WHERE community_id = ?1 AND user_id = ?2",
        params![community_id, user_id],
        |r| r.get(0),
    )
}

pub fn is_moderator(
    conn: &Connection,
    community_id: &str,
    user_id: &str,
) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM community_members
         WHERE community_id = ?1 AND user_id = ?2 AND is_moderator = 1",
        params![community_id, user_id],
        |r| r.get(0),
    )
}

pub fn is_banned(conn: &Connection, community_id: &str, user_id: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM community_bans WHERE community_id = ?1 AND user_id = ?2",
        params![community_id, user_id],
        |r| r.get(0),
    )
}

pub fn moderators(conn: &Connection, community_id: &str) -> rusqlite::Result<Vec<UserSummary>> {
    let mut stmt = conn.prepare(
        "SELECT u.id, u.username, u.display_name, u.avatar
         FROM community_members m
         JOIN users u ON u.id = m.user_id
         WHERE m.community_id = ?1 AND m.is_moderator = 1
         ORDER BY m.joined_at ASC",
    )?;
    let rows = stmt.query_map(params![community_id], |row| {
        Ok(UserSummary {
            id: row.get(0)?,
            username: row.get(1)?,
            display_name: row.get(2)?,
            avatar: row.get(3)?,
        })
    })?;
    rows.collect()
}

pub fn load_vote_sets(
    conn: &Connection,
    kind: SubjectKind,
    subject_id: &str,
) -> rusqlite::Result<VoteSets> {
    let mut stmt = conn.prepare(
        "SELECT voter_id, direction FROM votes WHERE subject_kind = ?1 AND subject_id = ?2",
    )?;
    let rows = stmt.query_map(params![kind.as_str(), subject_id], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut up = BTreeSet::new();
    let mut down = BTreeSet::new();
    for row in rows {
        let (voter, direction) = row?;
        if direction == "up" {
            up.insert(voter);
        } else {
            down.insert(voter);
        }
    }
    Ok(VoteSets::from_sets(up, down))
}

pub const POST_SELECT: &str = "SELECT p.id, p.title, p.content, p.image, p.author_id, u.username,
            p.community_id, c.name, p.score, p.comment_count, p.is_deleted, p.version,
            p.created_at, p.updated_at
     FROM posts p
     JOIN users u ON u.id = p.author_id
     JOIN communities c ON c.id = p.community_id";

/// Maps a row produced by [`POST_SELECT`]; vote sets are left empty.
pub fn map_post(row: &Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        image: row.get(3)?,
        author_id: row.get(4)?,
        author_username: row.get(5)?,
        community_id: row.get(6)?,
        community_name: row.get(7)?,
        score: row.get(8)?,
        comment_count: row.get(9)?,
        is_deleted: row.get(10)?,
        version: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
        votes: VoteSets::new(),
    })
}

/// Load a post with its vote sets. Deleted posts are returned too.
pub fn load_post(conn: &Connection, id: &str) -> rusqlite::Result<Option<Post>> {
    let post = conn
        .query_row(
            &format!("{} WHERE p.id = ?1", POST_SELECT),
            params![id],
            map_post,
        )
        .optional()?;

    match post {
        Some(mut post) => {
            post.votes = load_vote_sets(conn, SubjectKind::Post, &post.id)?;
            Ok(Some(post))
        }
        None => Ok(None),
    }
}

/// Load a comment with its vote sets. Deleted comments are returned too.
pub fn load_comment(conn: &Connection, id: &str) -> rusqlite::Result<Option<Comment>> {
    let comment = conn
        .query_row(
            "SELECT id, post_id, parent_id, author_id, content, depth, score, is_deleted,
                    version, created_at
             FROM comments WHERE id = ?1",
            params![id],
            |row| {
                Ok(Comment {
                    id: row.get(0)?,
                    post_id: row.get(1)?,
                    parent_id: row.get(2)?,
                    author_id: row.get(3)?,
                    content: row.get(4)?,
                    depth: row.get(5)?,
                    score: row.get(6)?,
                    is_deleted: row.get(7)?,
                    version: row.get(8)?,
                    created_at: row.get(9)?,
                    votes: VoteSets::new(),
                })
            },
        )
        .optional()?;

    match comment {
        Some(mut comment) => {
            comment.votes = load_vote_sets(conn, SubjectKind::Comment, &comment.id)?;
            Ok(Some(comment))
        }
        None => Ok(None),
    }
}
