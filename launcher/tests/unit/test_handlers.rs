//! HTTP API tests

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{json, Value};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use xylo_launcher::models::deployment::NewDeployment;
use xylo_launcher::server::serve::router;

use crate::common::*;

/// `name=value` part of a `Set-Cookie` header
fn cookie_pair(set_cookie: &str) -> String {
    set_cookie.split(';').next().unwrap_or_default().to_string()
}

#[tokio::test]
async fn test_health() {
    let github = MockServer::start().await;
    let server = TestServer::new(router(test_state(&github), None)).unwrap();

    let response = server.get("/health").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "xylo-launcher");
}

#[tokio::test]
async fn test_auth_status_without_cookie() {
    let github = MockServer::start().await;
    let server = TestServer::new(router(test_state(&github), None)).unwrap();

    let response = server.get("/api/auth/status").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["authenticated"], false);
    assert!(body.get("user").is_none());
}

#[tokio::test]
async fn test_oauth_login_flow() {
    let github = MockServer::start().await;
    mount_user(&github).await;
    Mock::given(method("POST"))
        .and(path("/login/oauth/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "gho_fresh",
            "token_type": "bearer",
            "scope": "repo,workflow"
        })))
        .expect(1)
        .mount(&github)
        .await;

    let server = TestServer::new(router(test_state(&github), None)).unwrap();

    // Login redirects to GitHub and sets the session cookie
    let response = server.get("/api/auth/github").await;
    response.assert_status(StatusCode::FOUND);
    let location = Url::parse(response.header("location").to_str().unwrap()).unwrap();
    assert_eq!(location.path(), "/login/oauth/authorize");
    let oauth_state = location
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .unwrap();
    let set_cookie = response.header("set-cookie").to_str().unwrap().to_string();
    assert!(set_cookie.contains("HttpOnly"));
    let cookie = cookie_pair(&set_cookie);

    // Callback exchanges the code and sends the browser to the frontend
    let response = server
        .get(&format!("/api/auth/github/callback?code=c0de&state={}", oauth_state))
        .add_header("cookie", &cookie)
        .await;
    response.assert_status(StatusCode::FOUND);
    assert_eq!(response.header("location"), "/");

    let response = server.get("/api/auth/status").add_header("cookie", &cookie).await;
    let body: Value = response.json();
    assert_eq!(body["authenticated"], true);
    assert_eq!(body["user"]["login"], LOGIN);

    // Logout drops the session and expires the cookie
    let response = server.post("/api/auth/logout").add_header("cookie", &cookie).await;
    response.assert_status_ok();
    assert!(response
        .header("set-cookie")
        .to_str()
        .unwrap()
        .contains("Max-Age=0"));

    let response = server.get("/api/auth/status").add_header("cookie", &cookie).await;
    let body: Value = response.json();
    assert_eq!(body["authenticated"], false);
}

#[tokio::test]
async fn test_oauth_callback_rejects_wrong_state() {
    let github = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login/oauth/access_token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&github)
        .await;

    let server = TestServer::new(router(test_state(&github), None)).unwrap();

    let response = server.get("/api/auth/github").await;
    let cookie = cookie_pair(response.header("set-cookie").to_str().unwrap());

    let response = server
        .get("/api/auth/github/callback?code=c0de&state=forged")
        .add_header("cookie", &cookie)
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["error"], "unauthenticated");
}

#[tokio::test]
async fn test_api_requires_session() {
    let github = MockServer::start().await;
    let server = TestServer::new(router(test_state(&github), None)).unwrap();

    let response = server
        .post("/api/deploy")
        .json(&json!({ "sessionId": "abc123" }))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    let response = server
        .get("/api/deployments")
        .add_header("cookie", "xylo_session=not-a-token")
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_deploy_and_read_back() {
    let github = MockServer::start().await;
    mount_happy_path(&github).await;

    let state = test_state(&github);
    let cookie = login_cookie(&state, LOGIN).await;
    let server = TestServer::new(router(state, None)).unwrap();

    let response = server
        .post("/api/deploy")
        .add_header("cookie", &cookie)
        .json(&json!({ "sessionId": "abc123" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["workflowUrl"], "https://github.com/octocat/xylo-bot/actions");
    let deployment_id = body["deploymentId"].as_str().unwrap().to_string();
    let branch = body["branchName"].as_str().unwrap().to_string();
    assert!(branch.starts_with("xylo-"));

    let response = server.get("/api/deployments").add_header("cookie", &cookie).await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["total"], 1);
    let listed = &body["deployments"][0];
    assert_eq!(listed["id"], deployment_id.as_str());
    assert_eq!(listed["status"], "running");
    assert_eq!(listed["githubUsername"], LOGIN);
    assert_eq!(listed["branchName"], branch.as_str());
    // The session identifier stays on the server
    assert!(!body.to_string().contains("abc123"));

    let response = server
        .get(&format!("/api/deployments/{}/logs", deployment_id))
        .add_header("cookie", &cookie)
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["deploymentId"], deployment_id.as_str());
    let logs = body["logs"].as_array().unwrap();
    assert_eq!(logs.len(), 16);
    assert_eq!(logs[0]["step"], "authenticate");
    assert_eq!(logs[15]["step"], "dispatch");
    assert_eq!(logs[15]["status"], "success");
}

#[tokio::test]
async fn test_deploy_rejects_bad_input() {
    let github = MockServer::start().await;
    let state = test_state(&github);
    let cookie = login_cookie(&state, LOGIN).await;
    let server = TestServer::new(router(state.clone(), None)).unwrap();

    let response = server
        .post("/api/deploy")
        .add_header("cookie", &cookie)
        .json(&json!({ "sessionId": "   " }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .post("/api/deploy")
        .add_header("cookie", &cookie)
        .json(&json!({ "sessionId": "abc123", "branchName": "-oops" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    // Nothing was recorded for rejected requests
    assert!(state.store.list_deployments(LOGIN).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_deploy_conflict_reports_deployment() {
    let github = MockServer::start().await;
    mount_user(&github).await;
    mount_existing_fork(&github).await;
    mount_actions(&github, true).await;
    Mock::given(method("GET"))
        .and(path("/repos/octocat/xylo-bot/git/ref/heads/xylo-taken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ref": "refs/heads/xylo-taken",
            "object": { "sha": "abc", "type": "commit" }
        })))
        .mount(&github)
        .await;

    let state = test_state(&github);
    let cookie = login_cookie(&state, LOGIN).await;
    let server = TestServer::new(router(state.clone(), None)).unwrap();

    let response = server
        .post("/api/deploy")
        .add_header("cookie", &cookie)
        .json(&json!({ "sessionId": "abc123", "branchName": "xylo-taken" }))
        .await;
    response.assert_status(StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    let deployment_id = body["deploymentId"].as_str().unwrap();
    assert!(body["message"].as_str().unwrap().contains("xylo-taken"));

    let response = server
        .get(&format!("/api/deployments/{}", deployment_id))
        .add_header("cookie", &cookie)
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "failed");
}

#[tokio::test]
async fn test_deployments_of_other_users_are_hidden() {
    let github = MockServer::start().await;
    let state = test_state(&github);
    let deployment = state
        .store
        .create_deployment(NewDeployment {
            session_id: "abc123".to_string(),
            branch_name: None,
            github_login: LOGIN.to_string(),
            repo_name: REPO.to_string(),
        })
        .await
        .unwrap();

    let intruder = login_cookie(&state, "mallory").await;
    let server = TestServer::new(router(state, None)).unwrap();

    let response = server
        .get(&format!("/api/deployments/{}", deployment.id))
        .add_header("cookie", &intruder)
        .await;
    response.assert_status(StatusCode::NOT_FOUND);

    let response = server
        .get(&format!("/api/deployments/{}/logs", deployment.id))
        .add_header("cookie", &intruder)
        .await;
    response.assert_status(StatusCode::NOT_FOUND);

    let response = server.get("/api/deployments").add_header("cookie", &intruder).await;
    let body: Value = response.json();
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn test_repository_setup_uses_existing_fork() {
    let github = MockServer::start().await;
    mount_existing_fork(&github).await;

    let state = test_state(&github);
    let cookie = login_cookie(&state, LOGIN).await;
    let server = TestServer::new(router(state, None)).unwrap();

    let response = server
        .post("/api/repository/setup")
        .add_header("cookie", &cookie)
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["created"], false);
    assert_eq!(body["repoName"], REPO);
    assert_eq!(body["repoUrl"], "https://github.com/octocat/xylo-bot");
}

#[tokio::test]
async fn test_workflow_verify_reports_disabled_actions() {
    let github = MockServer::start().await;
    mount_existing_fork(&github).await;
    mount_actions(&github, false).await;

    let state = test_state(&github);
    let cookie = login_cookie(&state, LOGIN).await;
    let server = TestServer::new(router(state, None)).unwrap();

    let response = server
        .get("/api/workflow/verify")
        .add_header("cookie", &cookie)
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["forkExists"], true);
    assert_eq!(body["actionsEnabled"], false);
    assert_eq!(body["actionsUrl"], "https://github.com/octocat/xylo-bot/actions");
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("https://github.com/octocat/xylo-bot/actions"));
}

#[tokio::test]
async fn test_repository_setup_refuses_non_fork() {
    let github = MockServer::start().await;
    let mut repo = repository_json(LOGIN, REPO);
    repo["fork"] = json!(false);
    Mock::given(method("GET"))
        .and(path("/repos/octocat/xylo-bot"))
        .respond_with(ResponseTemplate::new(200).set_body_json(repo))
        .mount(&github)
        .await;

    let state = test_state(&github);
    let cookie = login_cookie(&state, LOGIN).await;
    let server = TestServer::new(router(state, None)).unwrap();

    let response = server
        .post("/api/repository/setup")
        .add_header("cookie", &cookie)
        .await;
    response.assert_status(StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["error"], "conflict");
}
