//! Integration test: start the backend server and verify API endpoints.

use std::sync::Arc;
use std::time::Duration;

use sopforge_core::db::Database;
use sopforge_core::llm::{LlmClient, LlmConfig};
use sopforge_core::upload::FileStorage;
use sopforge_server::state::{AppState, AppStateInner};

async fn boot() -> (String, reqwest::Client, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open_in_memory().unwrap();
    let files = FileStorage::new(dir.path().join("uploads"), 1024 * 1024).unwrap();
    let llm = LlmClient::new(LlmConfig::default());
    let state: AppState = Arc::new(AppStateInner::new(db, files, llm));

    let app = axum::Router::new()
        .merge(sopforge_server::api::api_router())
        .route(
            "/api/health",
            axum::routing::get(|| async { axum::Json(serde_json::json!({"status": "ok"})) }),
        )
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    (format!("http://{}", addr), reqwest::Client::new(), dir)
}

async fn create_workflow(client: &reqwest::Client, base: &str, name: &str) -> serde_json::Value {
    let resp = client
        .post(format!("{}/api/workflows", base))
        .json(&serde_json::json!({ "name": name }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    resp.json().await.unwrap()
}

#[tokio::test]
async fn test_health_and_workflow_crud() {
    let (base, client, _dir) = boot().await;

    let resp = client.get(format!("{}/api/health", base)).send().await.unwrap();
    assert_eq!(resp.status(), 200);

    // Create
    let workflow = create_workflow(&client, &base, "Meter inspection").await;
    let id = workflow["id"].as_str().unwrap().to_string();
    assert_eq!(workflow["status"], "draft");

    // List
    let resp = client.get(format!("{}/api/workflows", base)).send().await.unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["total"], 1);
    assert_eq!(body["page"], 1);
    assert_eq!(body["items"][0]["name"], "Meter inspection");

    // Update
    let resp = client
        .put(format!("{}/api/workflows/{}", base, id))
        .json(&serde_json::json!({ "description": "daily rounds" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["description"], "daily rounds");

    // Get aggregate shape
    let resp = client
        .get(format!("{}/api/workflows/{}", base, id))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["steps"].as_array().unwrap().is_empty());
    assert!(body["tasks"].as_array().unwrap().is_empty());

    // Unknown id is a 404
    let resp = client
        .get(format!("{}/api/workflows/does-not-exist", base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    // Delete
    let resp = client
        .delete(format!("{}/api/workflows/{}", base, id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);
    let resp = client
        .get(format!("{}/api/workflows/{}", base, id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_status_flow_endpoints() {
    let (base, client, _dir) = boot().await;
    let workflow = create_workflow(&client, &base, "wf").await;
    let id = workflow["id"].as_str().unwrap().to_string();

    // Draft may only move to worker_done
    let resp = client
        .get(format!("{}/api/status/workflow/{}", base, id))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "draft");
    assert_eq!(body["color"], "slate");
    assert_eq!(
        body["allowed_transitions"],
        serde_json::json!(["worker_done"])
    );

    // Rollback at the initial state fails without mutating
    let resp = client
        .post(format!("{}/api/status/workflow/{}/rollback", base, id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "already at initial status");
    assert_eq!(body["status"], "draft");

    // Advance: draft → worker_done
    let resp = client
        .post(format!("{}/api/status/workflow/{}/advance", base, id))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["previous_status"], "draft");
    assert_eq!(body["status"], "worker_done");

    // Advance again: worker_done → expert_done
    let resp = client
        .post(format!("{}/api/status/workflow/{}/advance", base, id))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "expert_done");

    // Illegal jump expert_done → confirmed is a domain rejection, not an
    // HTTP error; the status must stay put.
    let resp = client
        .post(format!("{}/api/status/workflow/{}/transition", base, id))
        .json(&serde_json::json!({ "new_status": "confirmed" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(
        body["allowed_transitions"],
        serde_json::json!(["worker_done", "analyzed"])
    );
    let resp = client
        .get(format!("{}/api/status/workflow/{}", base, id))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "expert_done");

    // Legal explicit transition forward
    let resp = client
        .post(format!("{}/api/status/workflow/{}/transition", base, id))
        .json(&serde_json::json!({ "new_status": "analyzed" }))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["status"], "analyzed");
    assert_eq!(body["color"], "purple");

    // Rollback: analyzed → expert_done
    let resp = client
        .post(format!("{}/api/status/workflow/{}/rollback", base, id))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["status"], "expert_done");

    // Unknown workflow is a 404
    let resp = client
        .get(format!("{}/api/status/workflow/missing", base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_step_crud_and_renumbering() {
    let (base, client, _dir) = boot().await;
    let workflow = create_workflow(&client, &base, "wf").await;
    let id = workflow["id"].as_str().unwrap().to_string();

    // Auto-append order
    let mut step_ids = Vec::new();
    for name in ["one", "two", "three"] {
        let resp = client
            .post(format!("{}/api/workflows/{}/steps", base, id))
            .json(&serde_json::json!({ "name": name }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
        let body: serde_json::Value = resp.json().await.unwrap();
        step_ids.push(body["id"].as_str().unwrap().to_string());
    }

    // Explicit duplicate order conflicts
    let resp = client
        .post(format!("{}/api/workflows/{}/steps", base, id))
        .json(&serde_json::json!({ "name": "dup", "step_order": 2 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);

    // Update a step's logic block via the nested route
    let resp = client
        .put(format!("{}/api/workflows/{}/steps/{}", base, id, step_ids[0]))
        .json(&serde_json::json!({
            "logic_strategy": "few_shot",
            "extraction_keywords": ["color", "size"],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["logic_strategy"], "few_shot");

    // Delete the middle step; the rest renumber
    let resp = client
        .delete(format!("{}/api/workflows/{}/steps/{}", base, id, step_ids[1]))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    let resp = client
        .get(format!("{}/api/workflows/{}/steps", base, id))
        .send()
        .await
        .unwrap();
    let steps: serde_json::Value = resp.json().await.unwrap();
    let steps = steps.as_array().unwrap();
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0]["step_order"], 1);
    assert_eq!(steps[1]["step_order"], 2);
    assert_eq!(steps[1]["name"], "three");

    // Routing branches via the nested route
    let resp = client
        .post(format!(
            "{}/api/workflows/{}/steps/{}/branches",
            base, id, step_ids[0]
        ))
        .json(&serde_json::json!({
            "condition_result": "FAIL",
            "action_type": "retry",
            "next_step_id": "1",
        }))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    let branches = body["routing_branches"].as_array().unwrap();
    assert_eq!(branches.len(), 1);
    let branch_id = branches[0]["id"].as_str().unwrap();

    let resp = client
        .delete(format!(
            "{}/api/workflows/{}/steps/{}/branches/{}",
            base, id, step_ids[0], branch_id
        ))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["routing_branches"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_tasks_and_flat_steps() {
    let (base, client, _dir) = boot().await;
    let workflow = create_workflow(&client, &base, "wf").await;
    let id = workflow["id"].as_str().unwrap().to_string();

    // Create two tasks; orders auto-append
    let resp = client
        .post(format!("{}/api/tasks/workflow/{}", base, id))
        .json(&serde_json::json!({ "name": "Collect" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let task_a: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(task_a["task_order"], 1);

    let resp = client
        .post(format!("{}/api/tasks/workflow/{}", base, id))
        .json(&serde_json::json!({ "name": "Report" }))
        .send()
        .await
        .unwrap();
    let task_b: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(task_b["task_order"], 2);

    // Step under a task via the flat route; order is workflow-wide
    let resp = client
        .post(format!(
            "{}/api/steps/task/{}",
            base,
            task_a["id"].as_str().unwrap()
        ))
        .json(&serde_json::json!({ "name": "photo" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let step: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(step["step_order"], 1);
    let step_id = step["id"].as_str().unwrap().to_string();

    // Patch it through the flat route
    let resp = client
        .patch(format!("{}/api/steps/{}", base, step_id))
        .json(&serde_json::json!({ "expert_notes": "verified on site" }))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["expert_notes"], "verified on site");

    // Reorder tasks
    let resp = client
        .post(format!("{}/api/tasks/workflow/{}/reorder", base, id))
        .json(&serde_json::json!({
            "task_ids": [task_b["id"], task_a["id"]],
        }))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["items"][0]["name"], "Report");
    assert_eq!(body["items"][1]["name"], "Collect");

    // Task aggregate carries its steps
    let resp = client
        .get(format!(
            "{}/api/tasks/{}",
            base,
            task_a["id"].as_str().unwrap()
        ))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["steps"].as_array().unwrap().len(), 1);

    // Deleting the task cascades to its step
    let resp = client
        .delete(format!(
            "{}/api/tasks/{}",
            base,
            task_a["id"].as_str().unwrap()
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let resp = client
        .get(format!("{}/api/steps/{}", base, step_id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_examples_notes_and_protocol_export() {
    let (base, client, _dir) = boot().await;
    let workflow = create_workflow(&client, &base, "Quality check").await;
    let id = workflow["id"].as_str().unwrap().to_string();

    let resp = client
        .post(format!("{}/api/workflows/{}/steps", base, id))
        .json(&serde_json::json!({
            "name": "Judge the surface",
            "context_type": "image",
            "context_description": "Look at the coating finish",
            "extraction_keywords": ["color", "size"],
            "logic_strategy": "few_shot",
            "routing_default_next": "step-2",
        }))
        .send()
        .await
        .unwrap();
    let step: serde_json::Value = resp.json().await.unwrap();
    let step_id = step["id"].as_str().unwrap().to_string();

    // One PASS and one FAIL example
    for (content, label) in [("smooth finish", "PASS"), ("visible scratches", "FAIL")] {
        let resp = client
            .post(format!("{}/api/steps/{}/examples", base, step_id))
            .json(&serde_json::json!({ "content": content, "label": label }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
    }

    // Label filter
    let resp = client
        .get(format!("{}/api/steps/{}/examples?label=PASS", base, step_id))
        .send()
        .await
        .unwrap();
    let passing: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(passing.as_array().unwrap().len(), 1);

    let resp = client
        .get(format!("{}/api/steps/{}/examples?label=bogus", base, step_id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    // Notes
    let resp = client
        .post(format!("{}/api/notes/step/{}", base, step_id))
        .json(&serde_json::json!({
            "content_type": "voice",
            "content": "/uploads/memo.ogg",
            "voice_transcript": "check the edges too",
            "created_by": "expert",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let note: serde_json::Value = resp.json().await.unwrap();

    let resp = client
        .patch(format!(
            "{}/api/notes/{}",
            base,
            note["id"].as_str().unwrap()
        ))
        .json(&serde_json::json!({ "content": "/uploads/memo-2.ogg" }))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["content"], "/uploads/memo-2.ogg");

    // Protocol export
    let resp = client
        .get(format!("{}/api/protocol/{}", base, id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let protocol: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(protocol["workflow_id"], id.as_str());
    assert_eq!(protocol["workflow_name"], "Quality check");

    let step = &protocol["steps"][0];
    assert_eq!(step["step_id"], step_id.as_str());
    assert_eq!(step["business_domain"], "Look at the coating finish");
    assert_eq!(step["input_spec"]["data_source"], "image");
    assert_eq!(
        step["input_spec"]["context_description"],
        "Look at the coating finish [Keywords: color, size]"
    );
    assert_eq!(step["logic_config"]["logic_strategy"], "SEMANTIC_SIMILARITY");
    let examples = step["logic_config"]["few_shot_examples"].as_array().unwrap();
    assert_eq!(examples.len(), 2);
    assert_eq!(examples[0]["label"], "PASS");
    assert_eq!(examples[1]["label"], "FAIL");
    assert_eq!(step["routing_map"]["default_next"], "step-2");
    let fields = step["output_schema"]["fields"].as_array().unwrap();
    assert_eq!(fields.len(), 3);
    assert_eq!(fields[0]["name"], "color");
    assert_eq!(fields[2]["name"], "judgment_result");
    assert_eq!(fields[2]["type"], "string");

    // Unknown workflow is a 404
    let resp = client
        .get(format!("{}/api/protocol/missing", base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_templates_flow() {
    let (base, client, _dir) = boot().await;

    let resp = client
        .post(format!("{}/api/templates/init", base))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["created"], 3);

    let resp = client.get(format!("{}/api/templates", base)).send().await.unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["total"], 3);
    let template_id = body["items"][0]["id"].as_str().unwrap().to_string();

    let resp = client
        .post(format!("{}/api/templates/{}/create", base, template_id))
        .json(&serde_json::json!({ "name": "My inspection round" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let workflow: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(workflow["name"], "My inspection round");
    assert_eq!(workflow["is_template"], false);
    assert_eq!(workflow["template_id"], template_id.as_str());
    assert_eq!(workflow["tasks"].as_array().unwrap().len(), 3);
    assert_eq!(workflow["steps"].as_array().unwrap().len(), 6);

    let resp = client
        .post(format!("{}/api/templates/missing/create", base))
        .json(&serde_json::json!({ "name": "x" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_file_upload_and_delete() {
    let (base, client, _dir) = boot().await;

    let form = reqwest::multipart::Form::new().part(
        "file",
        reqwest::multipart::Part::bytes(b"fake-image-bytes".to_vec())
            .file_name("photo.png")
            .mime_str("image/png")
            .unwrap(),
    );
    let resp = client
        .post(format!("{}/api/files/upload", base))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: serde_json::Value = resp.json().await.unwrap();
    let url = body["url"].as_str().unwrap().to_string();
    assert!(url.starts_with("/uploads/"));
    assert_eq!(body["size"], 16);

    // Disallowed extension is rejected
    let form = reqwest::multipart::Form::new().part(
        "file",
        reqwest::multipart::Part::bytes(b"#!/bin/sh".to_vec()).file_name("script.sh"),
    );
    let resp = client
        .post(format!("{}/api/files/upload", base))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = client
        .delete(format!("{}/api/files?url={}", base, url))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["deleted"], true);

    let resp = client
        .delete(format!("{}/api/files?url={}", base, url))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["deleted"], false);
}

#[tokio::test]
async fn test_analysis_endpoints_with_llm_disabled() {
    let (base, client, _dir) = boot().await;

    let resp = client
        .get(format!("{}/api/analysis/status", base))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["enabled"], false);

    let workflow = create_workflow(&client, &base, "wf").await;
    let id = workflow["id"].as_str().unwrap().to_string();
    let resp = client
        .post(format!("{}/api/workflows/{}/steps", base, id))
        .json(&serde_json::json!({ "name": "s" }))
        .send()
        .await
        .unwrap();
    let step: serde_json::Value = resp.json().await.unwrap();

    let resp = client
        .post(format!(
            "{}/api/analysis/steps/{}/analyze",
            base,
            step["id"].as_str().unwrap()
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 503);
}
