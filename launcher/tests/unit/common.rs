//! Shared fixtures: a mocked GitHub and a wired server state

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use xylo_launcher::deploy::DeployOptions;
use xylo_launcher::github::oauth::OAuthApp;
use xylo_launcher::github::GitHubApi;
use xylo_launcher::relay::{self, RelayHub};
use xylo_launcher::server::state::ServerState;
use xylo_launcher::session::{SessionStore, SESSION_COOKIE};
use xylo_launcher::storage::memory::MemoryStore;
use xylo_launcher::storage::DeploymentStore;

pub const LOGIN: &str = "octocat";
pub const UPSTREAM_OWNER: &str = "xylo-dev";
pub const REPO: &str = "xylo-bot";

pub fn deploy_options() -> DeployOptions {
    DeployOptions {
        owner: UPSTREAM_OWNER.to_string(),
        repo: REPO.to_string(),
        fork_poll_attempts: 3,
        fork_poll_interval: Duration::ZERO,
        index_delay: Duration::ZERO,
        dispatch_retry_delay: Duration::ZERO,
        ..Default::default()
    }
}

pub fn repository_json(owner: &str, name: &str) -> Value {
    json!({
        "id": 42,
        "name": name,
        "full_name": format!("{}/{}", owner, name),
        "owner": { "login": owner },
        "fork": true,
        "default_branch": "main",
        "html_url": format!("https://github.com/{}/{}", owner, name),
        "parent": { "full_name": format!("{}/{}", UPSTREAM_OWNER, REPO) }
    })
}

fn repo_path(suffix: &str) -> String {
    format!("/repos/{}/{}{}", LOGIN, REPO, suffix)
}

pub async fn mount_user(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "login": LOGIN,
            "id": 1,
            "name": "The Octocat"
        })))
        .mount(server)
        .await;
}

pub async fn mount_existing_fork(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(repo_path("")))
        .respond_with(ResponseTemplate::new(200).set_body_json(repository_json(LOGIN, REPO)))
        .mount(server)
        .await;
}

pub async fn mount_actions(server: &MockServer, enabled: bool) {
    Mock::given(method("GET"))
        .and(path(repo_path("/actions/permissions")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "enabled": enabled,
            "allowed_actions": "all"
        })))
        .mount(server)
        .await;
}

pub async fn mount_base_branch(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(repo_path("/git/ref/heads/main")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ref": "refs/heads/main",
            "object": { "sha": "4b825dc6", "type": "commit" }
        })))
        .mount(server)
        .await;
}

pub async fn mount_create_ref(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(repo_path("/git/refs")))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "ref": "refs/heads/created",
            "object": { "sha": "4b825dc6", "type": "commit" }
        })))
        .mount(server)
        .await;
}

pub async fn mount_put_contents(server: &MockServer) {
    Mock::given(method("PUT"))
        .and(wiremock::matchers::path_regex(r"^/repos/octocat/xylo-bot/contents/.+$"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "content": { "sha": "f00d", "path": "file" }
        })))
        .mount(server)
        .await;
}

pub async fn mount_dispatch(server: &MockServer, status: u16) {
    Mock::given(method("POST"))
        .and(path(repo_path("/actions/workflows/deploy.yml/dispatches")))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Everything a first deployment onto an existing fork needs
pub async fn mount_happy_path(server: &MockServer) {
    mount_user(server).await;
    mount_existing_fork(server).await;
    mount_actions(server, true).await;
    mount_base_branch(server).await;
    mount_create_ref(server).await;
    mount_put_contents(server).await;
    mount_dispatch(server, 204).await;
}

pub fn test_state(github: &MockServer) -> Arc<ServerState> {
    test_state_with(github, relay::Options::default())
}

pub fn test_state_with(github: &MockServer, relay_options: relay::Options) -> Arc<ServerState> {
    let store: Arc<dyn DeploymentStore> = Arc::new(MemoryStore::new());
    let api = GitHubApi::new(&github.uri(), &github.uri()).unwrap();
    let sessions = Arc::new(SessionStore::new(
        &SecretString::from("test-session-secret".to_string()),
        Duration::from_secs(3600),
        false,
    ));
    let relay = Arc::new(RelayHub::new(relay_options, store.clone()));

    Arc::new(ServerState::new(
        store,
        api,
        OAuthApp {
            client_id: "Iv1.test".to_string(),
            client_secret: SecretString::from("shh".to_string()),
            redirect_uri: Some("http://localhost:5000/api/auth/github/callback".to_string()),
        },
        sessions,
        relay,
        deploy_options(),
        "/".to_string(),
    ))
}

/// Create an authenticated session and return its `Cookie` header value
pub async fn login_cookie(state: &ServerState, login: &str) -> String {
    let id = state.sessions.create().await;
    state
        .sessions
        .authenticate(&id, login, SecretString::from("gho_test".to_string()))
        .await
        .unwrap();
    format!("{}={}", SESSION_COOKIE, state.sessions.issue_token(&id).unwrap())
}
