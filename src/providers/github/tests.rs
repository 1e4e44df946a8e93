//! End-to-end collection against a fake GitHub API.

use std::fs;
use std::time::Duration;

use chrono::{DateTime, Utc};
use mockito::{Matcher, Mock, ServerGuard};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio_test::assert_err;

use super::{GitHubClient, RetryPolicy};
use crate::auth::Token;
use crate::collector::{CollectOptions, Collector};
use crate::config::OutputFiles;
use crate::error::ActionboardError;
use crate::storage::DataStore;

const ORG: &str = "acme";

fn now() -> DateTime<Utc> {
    "2024-01-01T12:00:00Z".parse().unwrap()
}

fn collector(server: &ServerGuard) -> Collector {
    let client = GitHubClient::new(
        &server.url(),
        &Token::from("test-token"),
        RetryPolicy {
            max_attempts: 1,
            base_delay: Duration::from_millis(1),
        },
    )
    .unwrap();
    Collector::new(client, ORG, CollectOptions::default())
}

fn store(dir: &TempDir) -> DataStore {
    DataStore::new(dir.path().join("data"), OutputFiles::default())
}

fn read_json(dir: &TempDir, file: &str) -> Value {
    let raw = fs::read_to_string(dir.path().join("data").join(file)).unwrap();
    serde_json::from_str(&raw).unwrap()
}

async fn mock_repositories(server: &mut ServerGuard, body: &str) -> Mock {
    server
        .mock("GET", "/orgs/acme/repos")
        .match_query(Matcher::UrlEncoded("per_page".into(), "100".into()))
        .with_header("x-ratelimit-remaining", "4990")
        .with_body(body)
        .create_async()
        .await
}

async fn mock_runs(server: &mut ServerGuard, repo: &str, runs: Value) -> Mock {
    server
        .mock("GET", format!("/repos/acme/{repo}/actions/runs").as_str())
        .match_query(Matcher::Any)
        .with_header("x-ratelimit-remaining", "4980")
        .with_body(json!({ "total_count": 1, "workflow_runs": runs }).to_string())
        .create_async()
        .await
}

async fn mock_timing(server: &mut ServerGuard, repo: &str, run_id: u64, body: &str, hits: usize) -> Mock {
    server
        .mock(
            "GET",
            format!("/repos/acme/{repo}/actions/runs/{run_id}/timing").as_str(),
        )
        .with_body(body)
        .expect(hits)
        .create_async()
        .await
}

/// Two repositories: `A` with a ten minute successful run, `B` with a failed
/// run that reports no billable data.
async fn two_repository_org(server: &mut ServerGuard, timing_hits: usize) -> Vec<Mock> {
    vec![
        mock_repositories(
            server,
            r#"[{"name": "A", "owner": {"login": "acme"}}, {"name": "B", "owner": {"login": "acme"}}]"#,
        )
        .await,
        mock_runs(
            server,
            "A",
            json!([{
                "id": 1,
                "name": "CI",
                "status": "completed",
                "conclusion": "success",
                "created_at": "2024-01-01T10:00:00Z",
                "html_url": "https://github.com/acme/A/actions/runs/1"
            }]),
        )
        .await,
        mock_runs(
            server,
            "B",
            json!([{
                "id": 2,
                "name": "Deploy",
                "status": "completed",
                "conclusion": "failure",
                "created_at": "2024-01-01T11:00:00Z",
                "html_url": "https://github.com/acme/B/actions/runs/2"
            }]),
        )
        .await,
        mock_timing(
            server,
            "A",
            1,
            r#"{"billable": {"UBUNTU": {"total_ms": 600000, "jobs": 1}}, "run_duration_ms": 610000}"#,
            timing_hits,
        )
        .await,
        mock_timing(server, "B", 2, "{}", timing_hits).await,
    ]
}

#[tokio::test]
async fn test_first_collection_writes_every_artifact() {
    let mut server = mockito::Server::new_async().await;
    let mocks = two_repository_org(&mut server, 1).await;
    let dir = TempDir::new().unwrap();

    let report = collector(&server)
        .run(&store(&dir), now())
        .await
        .unwrap()
        .unwrap();

    for mock in &mocks {
        mock.assert_async().await;
    }

    assert_eq!(report.repositories, 2);
    assert_eq!(report.new_runs, 2);
    assert_eq!(report.new_failures, 1);
    assert_eq!(report.remaining_api_calls.map(|n| n <= 4990), Some(true));

    let runs = read_json(&dir, "workflow_runs.json");
    let runs = runs.as_array().unwrap();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0]["run_id"], 1);
    assert_eq!(runs[0]["total_time_minutes"], 10.0);
    assert_eq!(runs[1]["run_id"], 2);
    assert_eq!(runs[1]["total_time_minutes"], 0.0);

    let failed = read_json(&dir, "failed_runs.json");
    assert_eq!(failed.as_array().unwrap().len(), 1);
    assert_eq!(failed[0]["repo"], "B");

    assert_eq!(
        read_json(&dir, "daily_trend.json"),
        json!([{"date": "2024-01-01", "totalMinutes": 10.0}])
    );
    assert_eq!(
        read_json(&dir, "os_usage.json"),
        json!({"2024-01-01": {"UBUNTU": 600000}})
    );
    assert_eq!(read_json(&dir, "processed_runs.json"), json!([1, 2]));
    assert_eq!(
        read_json(&dir, "last_processed.json"),
        json!({"lastProcessedTime": "2024-01-01T11:00:00Z"})
    );
}

#[tokio::test]
async fn test_second_collection_adds_nothing() {
    let mut server = mockito::Server::new_async().await;
    // Timing is fetched once per run across both passes.
    let mocks = two_repository_org(&mut server, 1).await;
    let dir = TempDir::new().unwrap();
    let collector = collector(&server);

    collector.run(&store(&dir), now()).await.unwrap();
    let trend_before = read_json(&dir, "daily_trend.json");

    let report = collector.run(&store(&dir), now()).await.unwrap().unwrap();

    mocks[3].assert_async().await;
    mocks[4].assert_async().await;
    assert_eq!(report.new_runs, 0);
    assert!(report.minutes_by_day.is_empty());
    assert_eq!(read_json(&dir, "workflow_runs.json").as_array().unwrap().len(), 2);
    assert_eq!(read_json(&dir, "failed_runs.json").as_array().unwrap().len(), 1);
    assert_eq!(read_json(&dir, "daily_trend.json"), trend_before);
}

#[tokio::test]
async fn test_processed_runs_are_not_fetched_again() {
    let mut server = mockito::Server::new_async().await;
    let _repos = mock_repositories(&mut server, r#"[{"name": "A"}]"#).await;
    let _runs = mock_runs(
        &mut server,
        "A",
        json!([
            {"id": 1, "name": "CI", "conclusion": "success", "created_at": "2024-01-01T09:00:00Z"},
            {"id": 3, "name": "CI", "conclusion": "success", "created_at": "2024-01-01T09:30:00Z"}
        ]),
    )
    .await;
    let seen = mock_timing(&mut server, "A", 1, "{}", 0).await;
    let fresh = mock_timing(
        &mut server,
        "A",
        3,
        r#"{"billable": {"MACOS": {"total_ms": 90000}}}"#,
        1,
    )
    .await;

    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("data")).unwrap();
    fs::write(dir.path().join("data/processed_runs.json"), "[1]").unwrap();

    let report = collector(&server)
        .run(&store(&dir), now())
        .await
        .unwrap()
        .unwrap();

    seen.assert_async().await;
    fresh.assert_async().await;
    assert_eq!(report.new_runs, 1);
    assert_eq!(report.skipped_runs, 1);
    assert_eq!(read_json(&dir, "processed_runs.json"), json!([1, 3]));
    assert_eq!(
        read_json(&dir, "daily_trend.json"),
        json!([{"date": "2024-01-01", "totalMinutes": 1.5}])
    );
}

#[tokio::test]
async fn test_empty_organization_writes_nothing() {
    let mut server = mockito::Server::new_async().await;
    let repos = mock_repositories(&mut server, "[]").await;
    let dir = TempDir::new().unwrap();

    let report = collector(&server).run(&store(&dir), now()).await.unwrap();

    repos.assert_async().await;
    assert!(report.is_none());
    assert!(!dir.path().join("data").exists());
}

#[tokio::test]
async fn test_unavailable_organization_is_an_error() {
    let mut server = mockito::Server::new_async().await;
    let _repos = server
        .mock("GET", "/orgs/acme/repos")
        .match_query(Matcher::Any)
        .with_status(404)
        .with_body(r#"{"message": "Not Found"}"#)
        .create_async()
        .await;
    let dir = TempDir::new().unwrap();

    let result = collector(&server).run(&store(&dir), now()).await;

    let err = assert_err!(result);
    assert!(matches!(err, ActionboardError::RepositoriesUnavailable(org) if org == ORG));
    assert!(!dir.path().join("data").exists());
}

#[tokio::test]
async fn test_unsaved_runs_are_collected_again() {
    let mut server = mockito::Server::new_async().await;
    // Both passes fetch timing, since the first pass records nothing.
    let _mocks = two_repository_org(&mut server, 2).await;
    let dir = TempDir::new().unwrap();
    let collector = collector(&server);

    // A non-empty directory where the runs file belongs makes its save fail.
    let blocker = dir.path().join("data/workflow_runs.json");
    fs::create_dir_all(blocker.join("locked")).unwrap();

    collector.run(&store(&dir), now()).await.unwrap();

    assert!(!dir.path().join("data/processed_runs.json").exists());
    assert!(!dir.path().join("data/last_processed.json").exists());

    fs::remove_dir_all(&blocker).unwrap();
    let report = collector.run(&store(&dir), now()).await.unwrap().unwrap();

    assert_eq!(report.new_runs, 2);
    assert_eq!(report.skipped_runs, 0);
    assert_eq!(read_json(&dir, "workflow_runs.json").as_array().unwrap().len(), 2);
    assert_eq!(read_json(&dir, "processed_runs.json"), json!([1, 2]));
}

#[tokio::test]
async fn test_failed_run_listing_keeps_watermark() {
    let mut server = mockito::Server::new_async().await;
    let _repos = mock_repositories(
        &mut server,
        r#"[{"name": "A", "owner": {"login": "acme"}}, {"name": "B", "owner": {"login": "acme"}}]"#,
    )
    .await;
    let _failing = server
        .mock("GET", "/repos/acme/A/actions/runs")
        .match_query(Matcher::Any)
        .with_status(500)
        .create_async()
        .await;
    let _runs = mock_runs(
        &mut server,
        "B",
        json!([{"id": 2, "name": "Deploy", "conclusion": "success", "created_at": "2024-01-01T11:00:00Z"}]),
    )
    .await;
    let _timing = mock_timing(&mut server, "B", 2, "{}", 1).await;
    let dir = TempDir::new().unwrap();

    let report = collector(&server)
        .run(&store(&dir), now())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.new_runs, 1);
    assert_eq!(report.watermark, None);
    assert_eq!(read_json(&dir, "processed_runs.json"), json!([2]));
    assert_eq!(
        read_json(&dir, "last_processed.json"),
        json!({"lastProcessedTime": null})
    );
}
