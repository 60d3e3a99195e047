//! Integration tests for the history views and `POST /annotate`.

mod common;

use axum::http::StatusCode;
use common::{body_json, multipart_body, multipart_content_type, TestApp};
use plm_core::document_id::encode_document_id;
use serde_json::json;

async fn converted(app: &TestApp, filename: &str, project_id: &str) {
    let response = app
        .convert(
            filename,
            &[
                ("project_id", project_id),
                ("owner", "kim"),
                ("tags", "floor;draft"),
                ("revision_note", "first cut"),
            ],
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

// ---------------------------------------------------------------------------
// Test: annotating an unknown document is a 404
// ---------------------------------------------------------------------------

#[tokio::test]
async fn annotate_before_convert_is_not_found() {
    let app = TestApp::new().await;
    let response = app
        .post_json(
            "/annotate",
            json!({"project_id": "alpha", "document_label": "plan.dxf", "annotation_text": "hi"}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error_code"], "DOCUMENT_NOT_FOUND");
    assert_eq!(app.state.history.len().await, 0);
}

// ---------------------------------------------------------------------------
// Test: annotations accumulate as new history entries
// ---------------------------------------------------------------------------

#[tokio::test]
async fn annotate_appends_annotation_event() {
    let app = TestApp::new().await;
    converted(&app, "plan.dxf", "alpha").await;
    let document_id = encode_document_id("alpha", "plan.dxf");

    let response = app
        .post_json(
            "/annotate",
            json!({
                "document_id": document_id,
                "annotation_text": "dimensions checked",
                "annotation_author": "lee",
                "annotation_kind": "review",
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["document_id"], document_id.as_str());
    assert_eq!(json["entry"]["event"], "annotation");
    assert_eq!(json["entry"]["state"], "done");
    assert_eq!(json["entry"]["owner"], "kim");
    assert_eq!(json["entry"]["annotations"][0]["kind"], "review");

    let form = "project_id=alpha&document_label=plan.dxf&annotation_text=second&owner=sam";
    let response = app
        .post(
            "/annotate",
            "application/x-www-form-urlencoded",
            form.as_bytes().to_vec(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["entry"]["owner"], "sam");
    assert_eq!(json["entry"]["annotations"].as_array().unwrap().len(), 2);

    let versions = body_json(app.get(&format!("/documents/{document_id}/versions")).await).await;
    assert_eq!(versions["status"], "ok");
    assert_eq!(versions["count"], 3);
    assert_eq!(versions["items"][0]["event"], "annotation");
    assert_eq!(versions["items"][2]["event"], "convert");
    assert!(versions["items"][2]["annotations"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn annotate_accepts_multipart_fields() {
    let app = TestApp::new().await;
    converted(&app, "plan.dxf", "alpha").await;

    let body = multipart_body(
        &[
            ("project_id", "alpha"),
            ("document_label", "plan.dxf"),
            ("annotations", r#"[{"message": "from multipart"}]"#),
        ],
        None,
    );
    let response = app.post("/annotate", &multipart_content_type(), body).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["entry"]["annotations"][0]["message"], "from multipart");
}

#[tokio::test]
async fn annotate_rejects_bad_bodies() {
    let app = TestApp::new().await;

    let response = app
        .post("/annotate", "text/plain", b"hello".to_vec())
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error_code"], "INVALID_BODY");

    let response = app.post_json("/annotate", json!(["not", "an", "object"])).await;
    assert_eq!(body_json(response).await["error_code"], "INVALID_BODY");

    let response = app
        .post_json("/annotate", json!({"project_id": "alpha", "annotation_text": "x"}))
        .await;
    assert_eq!(
        body_json(response).await["error_code"],
        "MISSING_DOCUMENT_IDENTITY"
    );

    let response = app
        .post_json("/annotate", json!({"project_id": "alpha", "document_label": "d"}))
        .await;
    assert_eq!(body_json(response).await["error_code"], "MISSING_ANNOTATIONS");

    let response = app
        .post_json("/annotate", json!({"document_id": "!!", "annotation_text": "x"}))
        .await;
    assert_eq!(body_json(response).await["error_code"], "INVALID_DOCUMENT_ID");
}

// ---------------------------------------------------------------------------
// Test: list endpoints share the filter set and the envelope
// ---------------------------------------------------------------------------

#[tokio::test]
async fn history_views_aggregate_and_filter() {
    let app = TestApp::new().await;
    converted(&app, "plan.dxf", "alpha").await;
    converted(&app, "section.dxf", "alpha").await;
    converted(&app, "site.dxf", "beta").await;

    let history = body_json(app.get("/history").await).await;
    assert_eq!(history["count"], 3);
    assert_eq!(history["items"][0]["document_label"], "site.dxf");

    let limited = body_json(app.get("/history?limit=1").await).await;
    assert_eq!(limited["count"], 1);
    let unparsable = body_json(app.get("/history?limit=lots").await).await;
    assert_eq!(unparsable["count"], 3);

    let alpha = body_json(app.get("/history?project_id=alpha").await).await;
    assert_eq!(alpha["count"], 2);
    let tagged = body_json(app.get("/history?tag=DRAFT&owner=KIM").await).await;
    assert_eq!(tagged["count"], 3);
    let missing_tag = body_json(app.get("/history?tags=final").await).await;
    assert_eq!(missing_tag["count"], 0);
    let revision = body_json(app.get("/history?revision_note=first").await).await;
    assert_eq!(revision["count"], 3);
    let failed = body_json(app.get("/history?state=error").await).await;
    assert_eq!(failed["count"], 0);

    let projects = body_json(app.get("/projects").await).await;
    assert_eq!(projects["count"], 2);
    assert_eq!(projects["items"][0]["project_id"], "beta");
    assert_eq!(projects["items"][1]["project_id"], "alpha");
    assert_eq!(projects["items"][1]["document_count"], 2);

    let documents = body_json(app.get("/projects/alpha/documents").await).await;
    assert_eq!(documents["count"], 2);
    assert_eq!(documents["items"][0]["document_label"], "section.dxf");
    assert_eq!(
        documents["items"][0]["document_id"],
        encode_document_id("alpha", "section.dxf")
    );
}

#[tokio::test]
async fn versions_reject_invalid_document_id() {
    let app = TestApp::new().await;
    let response = app.get("/documents/!!!/versions").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error_code"], "INVALID_DOCUMENT_ID");
}

#[tokio::test]
async fn documents_require_a_project_id() {
    let app = TestApp::new().await;
    let response = app.get("/projects/%20/documents").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error_code"], "MISSING_PROJECT_ID");
}
