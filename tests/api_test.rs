/// End-to-end tests against a real server bound to an ephemeral port
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tempfile::TempDir;

use agora::config::Config;
use agora::db;
use agora::routes;
use agora::state::AppState;

struct TestServer {
    base: String,
    _dir: TempDir,
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }
}

async fn spawn_server() -> TestServer {
    spawn_server_with(|_| {}).await
}

async fn spawn_server_with(tweak: impl FnOnce(&mut Config)) -> TestServer {
    let dir = tempfile::tempdir().unwrap();

    let mut config = Config::default();
    config.auth.bcrypt_cost = 4;
    config.database.path = Some(dir.path().join("agora.db"));
    tweak(&mut config);

    let pool = db::create_pool(config.db_path()).unwrap();
    db::run_migrations(&pool).unwrap();
    let app = routes::router(AppState::new(pool, config));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        base: format!("http://{}", addr),
        _dir: dir,
    }
}

/// Sign up and log in; the returned client carries the session cookie.
async fn login_as(server: &TestServer, username: &str) -> (Client, String) {
    let client = Client::builder().cookie_store(true).build().unwrap();

    let res = client
        .post(server.url("/api/auth/signup"))
        .json(&json!({
            "email": format!("{}@example.com", username),
            "username": username,
            "displayName": username.to_uppercase(),
            "password": "correct-horse",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    let user_id = body["user"]["id"].as_str().unwrap().to_string();

    let res = client
        .post(server.url("/api/auth/login"))
        .json(&json!({
            "email": format!("{}@example.com", username),
            "password": "correct-horse",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    (client, user_id)
}

async fn create_community(server: &TestServer, client: &Client, name: &str) -> String {
    let res = client
        .post(server.url("/api/communities"))
        .json(&json!({
            "name": name,
            "displayName": "Rustaceans",
            "description": "All things Rust",
            "rules": ["Be kind"],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    body["community"]["id"].as_str().unwrap().to_string()
}

async fn create_post(server: &TestServer, client: &Client, community_id: &str) -> String {
    let res = client
        .post(server.url("/api/posts"))
        .json(&json!({
            "title": "Borrow checker appreciation thread",
            "content": "It caught a bug today.",
            "communityId": community_id,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    body["post"]["id"].as_str().unwrap().to_string()
}

async fn comment(
    server: &TestServer,
    client: &Client,
    post_id: &str,
    content: &str,
    parent_id: Option<&str>,
) -> Value {
    let res = client
        .post(server.url(&format!("/api/posts/{}/comments", post_id)))
        .json(&json!({ "content": content, "parentId": parent_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    body["comment"].clone()
}

async fn vote(server: &TestServer, client: &Client, path: &str, body: Value) -> (StatusCode, Value) {
    let res = client
        .post(server.url(path))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = res.status();
    let body = res.json().await.unwrap_or(Value::Null);
    (status, body)
}

async fn karma_of(server: &TestServer, username: &str) -> i64 {
    let body: Value = Client::new()
        .get(server.url(&format!("/api/users/{}", username)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    body["user"]["karma"].as_i64().unwrap()
}

#[tokio::test]
async fn signup_rejects_invalid_and_duplicate_input() {
    let server = spawn_server().await;
    let client = Client::new();

    let res = client
        .post(server.url("/api/auth/signup"))
        .json(&json!({
            "email": "x@example.com",
            "username": "ab",
            "displayName": "X",
            "password": "secret1",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("Username"));

    login_as(&server, "alice").await;
    let res = client
        .post(server.url("/api/auth/signup"))
        .json(&json!({
            "email": "ALICE@example.com",
            "username": "alice2",
            "displayName": "Alice",
            "password": "secret1",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let server = spawn_server().await;
    login_as(&server, "alice").await;

    let res = Client::new()
        .post(server.url("/api/auth/login"))
        .json(&json!({ "email": "alice@example.com", "password": "wrong-horse" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn posting_requires_membership() {
    let server = spawn_server().await;
    let (alice, _) = login_as(&server, "alice").await;
    let (bob, _) = login_as(&server, "bob").await;
    let community_id = create_community(&server, &alice, "rust").await;

    let res = bob
        .post(server.url("/api/posts"))
        .json(&json!({ "title": "hello", "communityId": community_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = bob
        .post(server.url("/api/communities/rust/join"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = bob
        .post(server.url("/api/communities/rust/join"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    create_post(&server, &bob, &community_id).await;

    let body: Value = bob
        .get(server.url("/api/communities/rust"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["community"]["memberCount"], 2);
    assert_eq!(body["isMember"], true);
    assert_eq!(body["isModerator"], false);
}

#[tokio::test]
async fn comment_thread_is_nested_by_parent() {
    let server = spawn_server().await;
    let (alice, _) = login_as(&server, "alice").await;
    let (bob, _) = login_as(&server, "bob").await;
    let community_id = create_community(&server, &alice, "rust").await;
    let post_id = create_post(&server, &alice, &community_id).await;

    let root = comment(&server, &bob, &post_id, "first!", None).await;
    assert_eq!(root["depth"], 0);
    let root_id = root["id"].as_str().unwrap();

    let reply = comment(&server, &alice, &post_id, "welcome", Some(root_id)).await;
    assert_eq!(reply["depth"], 1);
    let reply_id = reply["id"].as_str().unwrap();

    let nested = comment(&server, &bob, &post_id, "thanks", Some(reply_id)).await;
    assert_eq!(nested["depth"], 2);

    // A parent that does not exist places the comment at the root
    let stray = comment(&server, &bob, &post_id, "lost", Some("no-such-comment")).await;
    assert_eq!(stray["depth"], 0);
    assert!(stray["parentId"].is_null());

    let body: Value = Client::new()
        .get(server.url(&format!("/api/posts/{}/comments", post_id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let roots = body["comments"].as_array().unwrap();
    assert_eq!(roots.len(), 2);
    assert_eq!(roots[0]["content"], "first!");
    assert_eq!(roots[0]["children"][0]["content"], "welcome");
    assert_eq!(roots[0]["children"][0]["children"][0]["content"], "thanks");
    assert_eq!(roots[0]["children"][0]["children"][0]["depth"], 2);
    assert_eq!(roots[1]["content"], "lost");

    let post: Value = Client::new()
        .get(server.url(&format!("/api/posts/{}", post_id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(post["post"]["commentCount"], 4);
}

#[tokio::test]
async fn deleted_comment_stays_as_tombstone() {
    let server = spawn_server().await;
    let (alice, _) = login_as(&server, "alice").await;
    let (bob, _) = login_as(&server, "bob").await;
    let community_id = create_community(&server, &alice, "rust").await;
    let post_id = create_post(&server, &alice, &community_id).await;

    let root = comment(&server, &bob, &post_id, "regrettable", None).await;
    let root_id = root["id"].as_str().unwrap();
    comment(&server, &alice, &post_id, "reply survives", Some(root_id)).await;

    // Only the author or a moderator may delete
    let (carol, _) = login_as(&server, "carol").await;
    let res = carol
        .delete(server.url(&format!("/api/comments/{}", root_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = bob
        .delete(server.url(&format!("/api/comments/{}", root_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body: Value = Client::new()
        .get(server.url(&format!("/api/posts/{}/comments", post_id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let roots = body["comments"].as_array().unwrap();
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0]["isDeleted"], true);
    assert!(roots[0]["content"].is_null());
    assert_eq!(roots[0]["children"][0]["content"], "reply survives");
}

#[tokio::test]
async fn voting_toggles_switches_and_credits_author() {
    let server = spawn_server().await;
    let (alice, _) = login_as(&server, "alice").await;
    let (bob, _) = login_as(&server, "bob").await;
    let community_id = create_community(&server, &alice, "rust").await;
    let post_id = create_post(&server, &alice, &community_id).await;
    let path = format!("/api/posts/{}/vote", post_id);

    let (status, body) = vote(&server, &bob, &path, json!({ "direction": "up" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "score": 1, "hasUpvoted": true, "hasDownvoted": false }));
    assert_eq!(karma_of(&server, "alice").await, 1);

    // Same direction again removes the vote
    let (_, body) = vote(&server, &bob, &path, json!({ "direction": "up" })).await;
    assert_eq!(body, json!({ "score": 0, "hasUpvoted": false, "hasDownvoted": false }));
    assert_eq!(karma_of(&server, "alice").await, 0);

    // Legacy field name still works
    let (_, body) = vote(&server, &bob, &path, json!({ "type": "down" })).await;
    assert_eq!(body["score"], -1);
    assert_eq!(body["hasDownvoted"], true);

    // Switching sides moves the score by two
    let (_, body) = vote(&server, &bob, &path, json!({ "direction": "up" })).await;
    assert_eq!(body["score"], 1);
    assert_eq!(karma_of(&server, "alice").await, 1);
    assert_eq!(karma_of(&server, "bob").await, 0);

    let post: Value = bob
        .get(server.url(&format!("/api/posts/{}", post_id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(post["post"]["score"], 1);
    assert_eq!(post["post"]["hasUpvoted"], true);
}

#[tokio::test]
async fn comment_votes_credit_the_comment_author() {
    let server = spawn_server().await;
    let (alice, _) = login_as(&server, "alice").await;
    let (bob, _) = login_as(&server, "bob").await;
    let community_id = create_community(&server, &alice, "rust").await;
    let post_id = create_post(&server, &alice, &community_id).await;

    let c = comment(&server, &bob, &post_id, "nice", None).await;
    let path = format!("/api/comments/{}/vote", c["id"].as_str().unwrap());

    let (status, body) = vote(&server, &alice, &path, json!({ "direction": "down" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["score"], -1);
    assert_eq!(karma_of(&server, "bob").await, -1);
    assert_eq!(karma_of(&server, "alice").await, 0);
}

#[tokio::test]
async fn bad_votes_are_rejected() {
    let server = spawn_server().await;
    let (alice, _) = login_as(&server, "alice").await;
    let community_id = create_community(&server, &alice, "rust").await;
    let post_id = create_post(&server, &alice, &community_id).await;
    let path = format!("/api/posts/{}/vote", post_id);

    let (status, _) = vote(&server, &alice, &path, json!({ "direction": "sideways" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = vote(&server, &Client::new(), &path, json!({ "direction": "up" })).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = vote(
        &server,
        &alice,
        "/api/posts/missing/vote",
        json!({ "direction": "up" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Deleted posts cannot be voted on
    let res = alice
        .delete(server.url(&format!("/api/posts/{}", post_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let (status, _) = vote(&server, &alice, &path, json!({ "direction": "up" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn logout_ends_the_session() {
    let server = spawn_server().await;
    let (alice, _) = login_as(&server, "alice").await;

    let res = alice
        .post(server.url("/api/auth/logout"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = alice
        .put(server.url("/api/users/me"))
        .json(&json!({ "displayName": "Alice" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn feed_sorts_and_filters() {
    let server = spawn_server().await;
    let (alice, _) = login_as(&server, "alice").await;
    let (bob, _) = login_as(&server, "bob").await;
    let community_id = create_community(&server, &alice, "rust").await;

    let first = create_post(&server, &alice, &community_id).await;
    let second = create_post(&server, &alice, &community_id).await;
    vote(
        &server,
        &bob,
        &format!("/api/posts/{}/vote", first),
        json!({ "direction": "up" }),
    )
    .await;

    let ids = |body: &Value| -> Vec<String> {
        body["posts"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["id"].as_str().unwrap().to_string())
            .collect()
    };

    let top: Value = Client::new()
        .get(server.url("/api/posts?sort=top"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(ids(&top), vec![first.clone(), second.clone()]);

    let new: Value = Client::new()
        .get(server.url("/api/posts?sort=new&community=rust"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(ids(&new), vec![second.clone(), first.clone()]);

    let hot: Value = Client::new()
        .get(server.url("/api/posts"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(ids(&hot)[0], first);

    let paged: Value = Client::new()
        .get(server.url("/api/posts?sort=new&limit=1&page=2"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(ids(&paged), vec![first]);
}

#[tokio::test]
async fn pages_render_feed_and_thread() {
    let server = spawn_server().await;
    let (alice, _) = login_as(&server, "alice").await;
    let community_id = create_community(&server, &alice, "rust").await;
    let post_id = create_post(&server, &alice, &community_id).await;
    comment(&server, &alice, &post_id, "a comment worth reading", None).await;

    let home = alice.get(server.url("/")).send().await.unwrap();
    assert_eq!(home.status(), StatusCode::OK);
    let html = home.text().await.unwrap();
    assert!(html.contains("Borrow checker appreciation thread"));
    assert!(html.contains("signed in as alice"));

    let page = Client::new()
        .get(server.url(&format!("/p/{}", post_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(page.status(), StatusCode::OK);
    assert!(page.text().await.unwrap().contains("a comment worth reading"));

    let missing = Client::new()
        .get(server.url("/c/nowhere"))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reply_chain_is_capped_at_max_depth() {
    let server = spawn_server_with(|config| config.threads.max_depth = 3).await;
    let (client, _) = login_as(&server, "alice").await;
    let community_id = create_community(&server, &client, "rust").await;
    let post_id = create_post(&server, &client, &community_id).await;

    let root = comment(&server, &client, &post_id, "level 0", None).await;
    let mut parent = root["id"].as_str().unwrap().to_string();
    let mut depths = Vec::new();
    for i in 1..=6 {
        let reply = comment(&server, &client, &post_id, &format!("reply {}", i), Some(&parent)).await;
        depths.push(reply["depth"].as_i64().unwrap());
        parent = reply["id"].as_str().unwrap().to_string();
    }
    assert_eq!(depths, vec![1, 2, 3, 3, 3, 3]);

    let res = client
        .get(server.url(&format!("/api/posts/{}/comments", post_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();

    let mut deepest = 0;
    let mut count = 0;
    let mut stack: Vec<(&Value, usize)> = body["comments"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| (c, 0))
        .collect();
    while let Some((node, level)) = stack.pop() {
        count += 1;
        deepest = deepest.max(level);
        stack.extend(node["children"].as_array().unwrap().iter().map(|c| (c, level + 1)));
    }
    assert_eq!(count, 7);
    assert_eq!(deepest, 3);
}

#[tokio::test]
async fn concurrent_duplicates_are_bad_requests() {
    let server = spawn_server().await;
    let (alice, _) = login_as(&server, "alice").await;
    let (bob, _) = login_as(&server, "bob").await;

    let create = |client: &Client| {
        client
            .post(server.url("/api/communities"))
            .json(&json!({
                "name": "rust",
                "displayName": "Rust",
                "description": "All things Rust",
            }))
            .send()
    };
    let (first, second) = tokio::join!(create(&alice), create(&bob));
    let mut statuses = vec![first.unwrap().status(), second.unwrap().status()];
    statuses.sort();
    assert_eq!(statuses, vec![StatusCode::CREATED, StatusCode::BAD_REQUEST]);

    let (carol, _) = login_as(&server, "carol").await;
    let join = || carol.post(server.url("/api/communities/rust/join")).send();
    let (first, second) = tokio::join!(join(), join());
    let mut statuses = vec![first.unwrap().status(), second.unwrap().status()];
    statuses.sort();
    assert_eq!(statuses, vec![StatusCode::OK, StatusCode::BAD_REQUEST]);

    let body: Value = Client::new()
        .get(server.url("/api/communities/rust"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["community"]["memberCount"], 2);

    let signup = || {
        Client::new()
            .post(server.url("/api/auth/signup"))
            .json(&json!({
                "email": "dave@example.com",
                "username": "dave",
                "displayName": "Dave",
                "password": "correct-horse",
            }))
            .send()
    };
    let (first, second) = tokio::join!(signup(), signup());
    let mut statuses = vec![first.unwrap().status(), second.unwrap().status()];
    statuses.sort();
    assert_eq!(statuses, vec![StatusCode::CREATED, StatusCode::BAD_REQUEST]);
}
