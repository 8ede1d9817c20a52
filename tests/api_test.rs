mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::*;
use loanflow::api::{self, AppState};
use loanflow::gateway::{DocumentStore, Notifier};
use loanflow::orchestration::Policy;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt;

fn app(env: &TestEnv) -> axum::Router {
    let store: Arc<dyn DocumentStore> = env.store.clone();
    let notifier: Arc<dyn Notifier> = env.notifier.clone();
    api::create_router(AppState::new(env.repo.clone(), store, notifier, Policy::default()))
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_json(uri: &str, user: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-user-id", user)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str, user: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-user-id", user)
        .body(Body::empty())
        .unwrap()
}

fn create_body() -> Value {
    json!({
        "sponsor1Id": "sponsor1",
        "sponsor2Id": "sponsor2",
        "loanType": "Project",
        "loanTerm": "Short",
        "amount": 12000,
        "termMonths": 12,
        "employmentStatus": "employed",
        "documents": [
            {"documentType": "ID Card", "fileName": "id.txt", "content": "ID 1234"}
        ]
    })
}

#[tokio::test]
async fn test_health_and_ready() {
    let env = setup().await;
    let app = app(&env);

    let (status, body) = send(&app, Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = send(&app, Request::get("/ready").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_create_then_consent_over_http() {
    let env = setup().await;
    let app = app(&env);

    let (status, created) = send(&app, post_json("/v1/contracts", "borrower1", create_body())).await;
    assert_eq!(status, StatusCode::CREATED, "{}", created);
    assert_eq!(created["status"], "pending_sponsor_approval");
    assert_eq!(created["sponsor1Approved"], false);
    assert_eq!(created["documents"].as_array().unwrap().len(), 1);
    let id = created["id"].as_str().unwrap().to_string();

    let decision_uri = format!("/v1/contracts/{}/sponsor-decision", id);
    let (status, _) = send(&app, post_json(&decision_uri, "sponsor1", json!({"decision": "approve"}))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(&app, post_json(&decision_uri, "sponsor2", json!({"decision": "approve"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "pending");
    assert_eq!(body["sponsor2Approved"], true);

    let (status, _) = send(&app, post_json(&decision_uri, "sponsor2", json!({"decision": "approve"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, fetched) = send(&app, get(&format!("/v1/contracts/{}", id), "sponsor1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], id.as_str());

    let (status, _) = send(&app, get(&format!("/v1/contracts/{}", id), "borrower9")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_request_errors_map_to_status_codes() {
    let env = setup().await;
    let app = app(&env);

    let no_caller = Request::builder()
        .method("POST")
        .uri("/v1/contracts")
        .header("content-type", "application/json")
        .body(Body::from(create_body().to_string()))
        .unwrap();
    assert_eq!(send(&app, no_caller).await.0, StatusCode::UNAUTHORIZED);

    let mut same_sponsor = create_body();
    same_sponsor["sponsor2Id"] = json!("sponsor1");
    assert_eq!(
        send(&app, post_json("/v1/contracts", "borrower1", same_sponsor)).await.0,
        StatusCode::BAD_REQUEST
    );

    let mut unknown_type = create_body();
    unknown_type["loanType"] = json!("Housing");
    assert_eq!(
        send(&app, post_json("/v1/contracts", "borrower1", unknown_type)).await.0,
        StatusCode::NOT_FOUND
    );

    let mut bad_amount = create_body();
    bad_amount["amount"] = json!("lots");
    assert_eq!(
        send(&app, post_json("/v1/contracts", "borrower1", bad_amount)).await.0,
        StatusCode::BAD_REQUEST
    );

    let mut nan_amount = create_body();
    nan_amount["amount"] = json!("NaN");
    assert_eq!(
        send(&app, post_json("/v1/contracts", "borrower1", nan_amount)).await.0,
        StatusCode::BAD_REQUEST
    );

    assert_eq!(
        send(&app, get("/v1/contracts/not-a-uuid", "borrower1")).await.0,
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        send(&app, get(&format!("/v1/contracts/{}", uuid::Uuid::new_v4()), "borrower1")).await.0,
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_upload_review_and_loan_endpoints() {
    let env = setup().await;
    let app = app(&env);

    let (_, created) = send(&app, post_json("/v1/contracts", "borrower1", create_body())).await;
    let id = created["id"].as_str().unwrap().to_string();

    let upload = Request::builder()
        .method("POST")
        .uri(format!("/v1/contracts/{}/documents?documentType=Payslip&fileName=pay.txt", id))
        .header("x-user-id", "borrower1")
        .body(Body::from("march payslip"))
        .unwrap();
    let (status, doc) = send(&app, upload).await;
    assert_eq!(status, StatusCode::CREATED, "{}", doc);
    assert_eq!(doc["status"], "pending");
    let doc_id = doc["id"].as_str().unwrap().to_string();

    let review_uri = format!("/v1/documents/{}/review", doc_id);
    let (status, _) = send(&app, post_json(&review_uri, "borrower1", json!({"decision": "approve"}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin_review = Request::builder()
        .method("POST")
        .uri(&review_uri)
        .header("content-type", "application/json")
        .header("x-user-id", "ops")
        .header("x-user-role", "admin")
        .body(Body::from(json!({"decision": "approve", "note": "ok"}).to_string()))
        .unwrap();
    let (status, reviewed) = send(&app, admin_review).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reviewed["status"], "approved");

    // Drive the contract to approval, then read the loan over HTTP.
    let contract_id = id.parse().unwrap();
    env.approve_documents(&contract_id, t0()).await;
    env.consent(&contract_id, "sponsor1", "sponsor2", t0()).await;
    env.evaluator.evaluate(&contract_id, t0()).await.unwrap();
    let loan_id = env.repo.get_contract(&contract_id).await.unwrap().unwrap().loan_id.unwrap();

    let (status, loan) = send(&app, get(&format!("/v1/loans/{}", loan_id), "borrower1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(loan["payments"].as_array().unwrap().len(), 12);
    let payment_id = loan["payments"][0]["id"].as_str().unwrap().to_string();

    let pay = Request::builder()
        .method("POST")
        .uri(format!("/v1/payments/{}/pay", payment_id))
        .header("x-user-id", "borrower1")
        .body(Body::empty())
        .unwrap();
    let (status, paid) = send(&app, pay).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(paid["status"], "paid");
}
