mod common;

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{header, StatusCode};
use serde_json::{json, Value};

/// Read the event stream until `needle` shows up or the timeout passes.
async fn read_until(resp: &mut reqwest::Response, needle: &str) -> Result<String> {
    let mut seen = String::new();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !seen.contains(needle) {
        let chunk = tokio::time::timeout_at(deadline, resp.chunk())
            .await
            .with_context(|| format!("timed out waiting for {needle:?}; got {seen:?}"))??
            .context("stream ended")?;
        seen.push_str(&String::from_utf8_lossy(&chunk));
    }
    Ok(seen)
}

#[tokio::test]
async fn stream_requires_a_session() -> Result<()> {
    let app = common::TestApp::spawn().await?;

    let resp = app.client.get(app.url("/api/notifications/stream")).send().await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn stream_starts_with_snapshot_then_pushes_changes() -> Result<()> {
    let app = common::TestApp::spawn().await?;
    let org = app.signup("listener@example.com", "organization").await?;
    let expert = app.signup("applicant@example.com", "expert").await?;

    let mut stream = app
        .client
        .get(app.url("/api/notifications/stream"))
        .bearer_auth(&org.token)
        .send()
        .await?;
    assert_eq!(stream.status(), StatusCode::OK);
    assert!(stream.headers()[header::CONTENT_TYPE]
        .to_str()?
        .starts_with("text/event-stream"));

    // The welcome notification from registration is already there
    let snapshot = read_until(&mut stream, "event: snapshot").await?;
    assert!(snapshot.contains("welcome"));

    let resp = app
        .client
        .post(app.url("/api/campaigns"))
        .bearer_auth(&org.token)
        .json(&json!({ "title": "Realtime", "description": "Watch this", "status": "open" }))
        .send()
        .await?;
    let body: Value = resp.json().await?;
    let campaign_id = body["data"]["id"].as_str().context("campaign id")?.to_string();

    app.client
        .post(app.url(&format!("/api/campaigns/{}/proposals", campaign_id)))
        .bearer_auth(&expert.token)
        .json(&json!({ "cover_letter": "Pick me" }))
        .send()
        .await?;

    let pushed = read_until(&mut stream, "event: insert").await?;
    assert!(pushed.contains("proposal_received"));

    let resp = app
        .client
        .post(app.url("/api/notifications/read-all"))
        .bearer_auth(&org.token)
        .send()
        .await?;
    let body: Value = resp.json().await?;
    assert_eq!(body["data"]["updated"], 2);

    let updated = read_until(&mut stream, "event: update").await?;
    assert!(updated.contains("\"read\":true"));
    Ok(())
}

#[tokio::test]
async fn streams_only_carry_the_callers_notifications() -> Result<()> {
    let app = common::TestApp::spawn().await?;
    let watcher = app.signup("watcher@example.com", "expert").await?;

    let mut stream = app
        .client
        .get(app.url("/api/notifications/stream"))
        .bearer_auth(&watcher.token)
        .send()
        .await?;
    read_until(&mut stream, "event: snapshot").await?;

    // Another registration produces a welcome notification for someone else
    app.signup("stranger@example.com", "expert").await?;

    let outcome =
        tokio::time::timeout(Duration::from_millis(1500), read_until(&mut stream, "event: insert"))
            .await;
    assert!(matches!(outcome, Err(_) | Ok(Err(_))));
    Ok(())
}
