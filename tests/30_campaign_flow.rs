mod common;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::{json, Value};

async fn create_open_campaign(app: &common::TestApp, org: &common::TestUser) -> Result<String> {
    let resp = app
        .client
        .post(app.url("/api/campaigns"))
        .bearer_auth(&org.token)
        .json(&json!({
            "title": "Data platform audit",
            "description": "Review our warehouse and pipelines",
            "budget": "12000.00",
            "status": "open",
        }))
        .send()
        .await?;
    anyhow::ensure!(
        resp.status() == StatusCode::CREATED,
        "create campaign returned {}",
        resp.status()
    );
    let body: Value = resp.json().await?;
    Ok(body["data"]["id"].as_str().context("campaign id")?.to_string())
}

#[tokio::test]
async fn proposal_lifecycle_notifies_both_parties() -> Result<()> {
    let app = common::TestApp::spawn().await?;
    let org = app.signup("org@example.com", "organization").await?;
    let expert = app.signup("expert@example.com", "expert").await?;
    let campaign_id = create_open_campaign(&app, &org).await?;

    let resp = app
        .client
        .post(app.url(&format!("/api/campaigns/{}/proposals", campaign_id)))
        .bearer_auth(&expert.token)
        .json(&json!({ "cover_letter": "I have audited three warehouses", "proposed_rate": "150" }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = resp.json().await?;
    let proposal_id = body["data"]["id"].as_str().context("proposal id")?.to_string();
    assert_eq!(body["data"]["status"], "pending");

    // One proposal per expert and campaign
    let resp = app
        .client
        .post(app.url(&format!("/api/campaigns/{}/proposals", campaign_id)))
        .bearer_auth(&expert.token)
        .json(&json!({ "cover_letter": "Again" }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    // The organization heard about the proposal
    let resp = app
        .client
        .get(app.url("/api/notifications"))
        .bearer_auth(&org.token)
        .send()
        .await?;
    let body: Value = resp.json().await?;
    let kinds: Vec<_> = body["data"]["notifications"]
        .as_array()
        .context("notifications")?
        .iter()
        .filter_map(|n| n["kind"].as_str().map(str::to_string))
        .collect();
    assert!(kinds.contains(&"proposal_received".to_string()));

    // Experts cannot accept their own proposal
    let resp = app
        .client
        .patch(app.url(&format!("/api/proposals/{}/status", proposal_id)))
        .bearer_auth(&expert.token)
        .json(&json!({ "status": "accepted" }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = app
        .client
        .patch(app.url(&format!("/api/proposals/{}/status", proposal_id)))
        .bearer_auth(&org.token)
        .json(&json!({ "status": "accepted" }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);

    // Decisions are final
    let resp = app
        .client
        .patch(app.url(&format!("/api/proposals/{}/status", proposal_id)))
        .bearer_auth(&org.token)
        .json(&json!({ "status": "rejected" }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = app
        .client
        .get(app.url("/api/notifications"))
        .bearer_auth(&expert.token)
        .send()
        .await?;
    let body: Value = resp.json().await?;
    let accepted = body["data"]["notifications"]
        .as_array()
        .context("notifications")?
        .iter()
        .any(|n| n["kind"] == "proposal_accepted" && n["read"] == false);
    assert!(accepted);
    Ok(())
}

#[tokio::test]
async fn roles_gate_campaign_actions() -> Result<()> {
    let app = common::TestApp::spawn().await?;
    let org = app.signup("owner@example.com", "organization").await?;
    let other_org = app.signup("rival@example.com", "organization").await?;
    let expert = app.signup("solo@example.com", "expert").await?;

    let resp = app
        .client
        .post(app.url("/api/campaigns"))
        .bearer_auth(&expert.token)
        .json(&json!({ "title": "Nope", "description": "Experts do not post campaigns" }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let campaign_id = create_open_campaign(&app, &org).await?;

    let resp = app
        .client
        .patch(app.url(&format!("/api/campaigns/{}", campaign_id)))
        .bearer_auth(&other_org.token)
        .json(&json!({ "title": "Hijacked" }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = app
        .client
        .patch(app.url(&format!("/api/campaigns/{}", campaign_id)))
        .bearer_auth(&org.token)
        .json(&json!({ "status": "draft" }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = app
        .client
        .post(app.url("/api/campaigns"))
        .bearer_auth(&org.token)
        .json(&json!({ "title": "", "description": "" }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await?;
    assert!(body["field_errors"]["title"].is_string());
    Ok(())
}

#[tokio::test]
async fn drafts_are_hidden_from_other_users() -> Result<()> {
    let app = common::TestApp::spawn().await?;
    let org = app.signup("drafter@example.com", "organization").await?;
    let expert = app.signup("browser@example.com", "expert").await?;

    let resp = app
        .client
        .post(app.url("/api/campaigns"))
        .bearer_auth(&org.token)
        .json(&json!({ "title": "Secret", "description": "Not ready yet" }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = resp.json().await?;
    assert_eq!(body["data"]["status"], "draft");
    let id = body["data"]["id"].as_str().context("campaign id")?.to_string();

    let resp = app
        .client
        .get(app.url(&format!("/api/campaigns/{}", id)))
        .bearer_auth(&expert.token)
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = app
        .client
        .get(app.url(&format!("/api/campaigns/{}", id)))
        .bearer_auth(&org.token)
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn hidden_drafts_do_not_shrink_a_page() -> Result<()> {
    let app = common::TestApp::spawn().await?;
    let drafter = app.signup("planner@example.com", "organization").await?;
    let publisher = app.signup("publisher@example.com", "organization").await?;
    let expert = app.signup("reader@example.com", "expert").await?;

    let open_id = create_open_campaign(&app, &publisher).await?;
    let resp = app
        .client
        .post(app.url("/api/campaigns"))
        .bearer_auth(&drafter.token)
        .json(&json!({ "title": "Unannounced", "description": "Still scoping" }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = app
        .client
        .get(app.url("/api/campaigns?limit=1"))
        .bearer_auth(&expert.token)
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await?;
    let listed = body["data"].as_array().context("campaign list")?;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["id"], open_id.as_str());
    Ok(())
}

#[tokio::test]
async fn task_assignee_must_exist() -> Result<()> {
    let app = common::TestApp::spawn().await?;
    let org = app.signup("board@example.com", "organization").await?;
    let campaign_id = create_open_campaign(&app, &org).await?;

    let resp = app
        .client
        .post(app.url(&format!("/api/campaigns/{}/tasks", campaign_id)))
        .bearer_auth(&org.token)
        .json(&json!({
            "title": "Kickoff call",
            "assignee_id": "00000000-0000-4000-8000-000000000001",
        }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = app
        .client
        .post(app.url(&format!("/api/campaigns/{}/tasks", campaign_id)))
        .bearer_auth(&org.token)
        .json(&json!({ "title": "Kickoff call", "assignee_id": org.id }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    Ok(())
}
