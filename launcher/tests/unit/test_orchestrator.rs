//! Deployment orchestrator tests against a mocked GitHub

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use regex::Regex;
use serde_json::{json, Value};
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use xylo_launcher::deploy::Orchestrator;
use xylo_launcher::errors::LauncherError;
use xylo_launcher::github::GitHubApi;
use xylo_launcher::models::deployment::{
    Deployment, DeploymentStatus, LogStatus, NewDeployment,
};
use xylo_launcher::storage::memory::MemoryStore;
use xylo_launcher::storage::DeploymentStore;

use crate::common::*;

async fn new_deployment(store: &MemoryStore, branch_name: Option<&str>) -> Deployment {
    store
        .create_deployment(NewDeployment {
            session_id: "abc123".to_string(),
            branch_name: branch_name.map(str::to_string),
            github_login: LOGIN.to_string(),
            repo_name: REPO.to_string(),
        })
        .await
        .unwrap()
}

async fn put_body(server: &MockServer, file: &str) -> Option<Value> {
    let wanted = format!("/repos/{}/{}/contents/{}", LOGIN, REPO, file);
    let requests = server.received_requests().await?;
    requests
        .iter()
        .rev()
        .find(|r| r.method.as_str() == "PUT" && r.url.path() == wanted)
        .map(|r| serde_json::from_slice(&r.body).unwrap())
}

fn decoded_content(body: &Value) -> String {
    let bytes = STANDARD.decode(body["content"].as_str().unwrap()).unwrap();
    String::from_utf8(bytes).unwrap()
}

#[tokio::test]
async fn test_deploy_to_existing_fork() {
    let server = MockServer::start().await;
    mount_happy_path(&server).await;

    let store = MemoryStore::new();
    let deployment = new_deployment(&store, None).await;
    let github = GitHubApi::new(&server.uri(), &server.uri())
        .unwrap()
        .client("gho_test");
    let options = deploy_options();

    let outcome = Orchestrator::new(&github, &store, &options)
        .run(&deployment)
        .await
        .unwrap();

    let branch_pattern = Regex::new(r"^xylo-[a-z0-9]{6}$").unwrap();
    assert!(branch_pattern.is_match(&outcome.branch_name), "{}", outcome.branch_name);
    assert_eq!(outcome.repo_name, REPO);
    assert_eq!(outcome.workflow_url, "https://github.com/octocat/xylo-bot/actions");

    let stored = store.get_deployment(&deployment.id).await.unwrap().unwrap();
    assert_eq!(stored.status, DeploymentStatus::Running);
    assert_eq!(stored.message, "Workflow dispatched");
    assert_eq!(stored.branch_name.as_deref(), Some(outcome.branch_name.as_str()));
    assert_eq!(stored.workflow_url.as_deref(), Some(outcome.workflow_url.as_str()));

    // Each step logs running then exactly one terminal entry
    let logs = store.list_logs(&deployment.id).await.unwrap();
    let steps = [
        "authenticate",
        "fork",
        "actions",
        "branch",
        "config",
        "env",
        "workflow",
        "dispatch",
    ];
    assert_eq!(logs.len(), steps.len() * 2);
    for (pair, step) in logs.chunks(2).zip(steps) {
        assert_eq!(pair[0].step, step);
        assert_eq!(pair[0].status, LogStatus::Running);
        assert_eq!(pair[1].step, step);
        assert_eq!(pair[1].status, LogStatus::Success);
    }
    assert!(logs.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

    // Fresh files: the env file holds only the session identifier
    let env = put_body(&server, ".env").await.unwrap();
    assert_eq!(decoded_content(&env), "SESSION_ID=abc123\n");
    assert_eq!(env["branch"], outcome.branch_name.as_str());
    assert!(env.get("sha").is_none());

    let config = put_body(&server, "config.js").await.unwrap();
    assert!(decoded_content(&config).contains("\"abc123\""));

    let workflow = put_body(&server, ".github/workflows/deploy.yml").await.unwrap();
    assert!(decoded_content(&workflow).contains(&outcome.branch_name));
}

#[tokio::test]
async fn test_existing_files_are_patched_in_place() {
    let server = MockServer::start().await;
    mount_happy_path(&server).await;
    Mock::given(method("GET"))
        .and(path("/repos/octocat/xylo-bot/contents/.env"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sha": "envsha",
            "path": ".env",
            "content": STANDARD.encode("PREFIX=.\nSESSION_ID=old\n"),
            "encoding": "base64"
        })))
        .mount(&server)
        .await;

    let store = MemoryStore::new();
    let deployment = new_deployment(&store, Some("xylo-custom")).await;
    let github = GitHubApi::new(&server.uri(), &server.uri())
        .unwrap()
        .client("gho_test");
    let options = deploy_options();

    let outcome = Orchestrator::new(&github, &store, &options)
        .run(&deployment)
        .await
        .unwrap();
    assert_eq!(outcome.branch_name, "xylo-custom");

    let env = put_body(&server, ".env").await.unwrap();
    assert_eq!(env["sha"], "envsha");
    assert_eq!(decoded_content(&env), "PREFIX=.\nSESSION_ID=abc123\n");
}

#[tokio::test]
async fn test_existing_branch_is_a_conflict() {
    let server = MockServer::start().await;
    mount_user(&server).await;
    mount_existing_fork(&server).await;
    mount_actions(&server, true).await;
    Mock::given(method("GET"))
        .and(path("/repos/octocat/xylo-bot/git/ref/heads/xylo-taken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ref": "refs/heads/xylo-taken",
            "object": { "sha": "abc", "type": "commit" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/repos/octocat/xylo-bot/git/refs"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path_regex(r"/contents/"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path_regex(r"/dispatches$"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let store = MemoryStore::new();
    let deployment = new_deployment(&store, Some("xylo-taken")).await;
    let github = GitHubApi::new(&server.uri(), &server.uri())
        .unwrap()
        .client("gho_test");
    let options = deploy_options();

    let err = Orchestrator::new(&github, &store, &options)
        .run(&deployment)
        .await
        .unwrap_err();
    assert!(matches!(err, LauncherError::Conflict(_)), "{:?}", err);

    let stored = store.get_deployment(&deployment.id).await.unwrap().unwrap();
    assert_eq!(stored.status, DeploymentStatus::Failed);
    assert!(stored.message.contains("xylo-taken"));

    let logs = store.list_logs(&deployment.id).await.unwrap();
    let last = logs.last().unwrap();
    assert_eq!(last.step, "branch");
    assert_eq!(last.status, LogStatus::Failed);
}

#[tokio::test]
async fn test_invalid_branch_name_is_rejected() {
    let server = MockServer::start().await;
    mount_happy_path(&server).await;

    let store = MemoryStore::new();
    let deployment = new_deployment(&store, Some("bad..name")).await;
    let github = GitHubApi::new(&server.uri(), &server.uri())
        .unwrap()
        .client("gho_test");
    let options = deploy_options();

    let err = Orchestrator::new(&github, &store, &options)
        .run(&deployment)
        .await
        .unwrap_err();
    assert!(matches!(err, LauncherError::ValidationError(_)), "{:?}", err);
}

#[tokio::test]
async fn test_dispatch_not_found_twice_points_to_actions() {
    let server = MockServer::start().await;
    mount_user(&server).await;
    mount_existing_fork(&server).await;
    mount_actions(&server, true).await;
    mount_base_branch(&server).await;
    mount_create_ref(&server).await;
    mount_put_contents(&server).await;
    Mock::given(method("POST"))
        .and(path("/repos/octocat/xylo-bot/actions/workflows/deploy.yml/dispatches"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not Found"})))
        .expect(2)
        .mount(&server)
        .await;

    let store = MemoryStore::new();
    let deployment = new_deployment(&store, None).await;
    let github = GitHubApi::new(&server.uri(), &server.uri())
        .unwrap()
        .client("gho_test");
    let options = deploy_options();

    let err = Orchestrator::new(&github, &store, &options)
        .run(&deployment)
        .await
        .unwrap_err();
    match &err {
        LauncherError::PermissionError(message) => {
            assert!(message.contains("https://github.com/octocat/xylo-bot/actions"));
        }
        other => panic!("unexpected error: {:?}", other),
    }

    let stored = store.get_deployment(&deployment.id).await.unwrap().unwrap();
    assert_eq!(stored.status, DeploymentStatus::Failed);
}

#[tokio::test]
async fn test_actions_check_failure_only_warns() {
    let server = MockServer::start().await;
    mount_user(&server).await;
    mount_existing_fork(&server).await;
    Mock::given(method("GET"))
        .and(path("/repos/octocat/xylo-bot/actions/permissions"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"message": "boom"})))
        .mount(&server)
        .await;
    mount_base_branch(&server).await;
    mount_create_ref(&server).await;
    mount_put_contents(&server).await;
    mount_dispatch(&server, 204).await;

    let store = MemoryStore::new();
    let deployment = new_deployment(&store, None).await;
    let github = GitHubApi::new(&server.uri(), &server.uri())
        .unwrap()
        .client("gho_test");
    let options = deploy_options();

    Orchestrator::new(&github, &store, &options)
        .run(&deployment)
        .await
        .unwrap();

    let logs = store.list_logs(&deployment.id).await.unwrap();
    let actions = logs
        .iter()
        .filter(|l| l.step == "actions")
        .map(|l| l.status)
        .collect::<Vec<_>>();
    assert_eq!(actions, vec![LogStatus::Running, LogStatus::Warning]);
}

#[tokio::test]
async fn test_fork_is_created_and_awaited() {
    let server = MockServer::start().await;
    mount_user(&server).await;
    // First lookup misses, GitHub then takes a moment to expose the fork
    Mock::given(method("GET"))
        .and(path("/repos/octocat/xylo-bot"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not Found"})))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    mount_existing_fork(&server).await;
    Mock::given(method("POST"))
        .and(path("/repos/xylo-dev/xylo-bot/forks"))
        .respond_with(ResponseTemplate::new(202).set_body_json(repository_json(LOGIN, REPO)))
        .expect(1)
        .mount(&server)
        .await;
    mount_actions(&server, false).await;
    Mock::given(method("PUT"))
        .and(path("/repos/octocat/xylo-bot/actions/permissions"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    mount_base_branch(&server).await;
    mount_create_ref(&server).await;
    mount_put_contents(&server).await;
    mount_dispatch(&server, 204).await;

    let store = MemoryStore::new();
    let deployment = new_deployment(&store, None).await;
    let github = GitHubApi::new(&server.uri(), &server.uri())
        .unwrap()
        .client("gho_test");
    let options = deploy_options();

    Orchestrator::new(&github, &store, &options)
        .run(&deployment)
        .await
        .unwrap();

    let logs = store.list_logs(&deployment.id).await.unwrap();
    let fork_done = logs
        .iter()
        .find(|l| l.step == "fork" && l.status == LogStatus::Success)
        .unwrap();
    assert!(fork_done.message.starts_with("Created fork"));
    let actions_done = logs
        .iter()
        .find(|l| l.step == "actions" && l.status == LogStatus::Success)
        .unwrap();
    assert_eq!(actions_done.message, "GitHub Actions enabled");
}

async fn assert_fork_step_conflict(repo: Value) {
    let server = MockServer::start().await;
    mount_user(&server).await;
    Mock::given(method("GET"))
        .and(path("/repos/octocat/xylo-bot"))
        .respond_with(ResponseTemplate::new(200).set_body_json(repo))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path_regex(r"/(forks|git/refs|dispatches)$"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let store = MemoryStore::new();
    let deployment = new_deployment(&store, None).await;
    let github = GitHubApi::new(&server.uri(), &server.uri())
        .unwrap()
        .client("gho_test");
    let options = deploy_options();

    let err = Orchestrator::new(&github, &store, &options)
        .run(&deployment)
        .await
        .unwrap_err();
    assert!(matches!(err, LauncherError::Conflict(_)), "{:?}", err);
    assert!(err.user_message().contains("not a fork of xylo-dev/xylo-bot"));

    let logs = store.list_logs(&deployment.id).await.unwrap();
    let last = logs.last().unwrap();
    assert_eq!(last.step, "fork");
    assert_eq!(last.status, LogStatus::Failed);
}

#[tokio::test]
async fn test_unrelated_repository_is_left_alone() {
    let mut repo = repository_json(LOGIN, REPO);
    repo["fork"] = json!(false);
    repo["parent"] = Value::Null;
    assert_fork_step_conflict(repo).await;
}

#[tokio::test]
async fn test_fork_of_another_upstream_is_left_alone() {
    let mut repo = repository_json(LOGIN, REPO);
    repo["parent"] = json!({ "full_name": "someone-else/xylo-bot" });
    assert_fork_step_conflict(repo).await;
}
