use axum::body::{to_bytes, Body};
use axum::http::{header::CONTENT_TYPE, Request, StatusCode};
use serde_json::{json, Value};
use tower::util::ServiceExt;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use doctor_cell::router::doctor_routes;
use shared_models::auth::Role;
use shared_utils::test_utils::{MockDocuments, TestConfig};

const DOC_ID: &str = "doc-1";
const USER_ID: &str = "user-1";

async fn response_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn appointment_doc(id: &str, status: &str, paid: bool, amount: i64) -> Value {
    json!({
        "_id": id,
        "user_id": USER_ID,
        "doc_id": DOC_ID,
        "slot_date": "2024-01-01",
        "slot_time": "10:00",
        "amount": amount,
        "user_data": { "name": "Test Patient" },
        "doc_data": { "name": "Dr. Test" },
        "status": status,
        "paid": paid,
        "created_at": "2024-01-01T00:00:00Z",
        "updated_at": "2024-01-01T00:00:00Z"
    })
}

#[tokio::test]
async fn dashboard_requires_doctor_token() {
    let server = MockServer::start().await;
    let app = doctor_routes(TestConfig::with_data_api_url(&server.uri()).to_arc());

    let request = Request::get("/dashboard-data").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn dashboard_reports_earnings_with_or_semantics() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/action/find"))
        .and(body_partial_json(json!({
            "collection": "appointments",
            "filter": { "doc_id": DOC_ID }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockDocuments::find(vec![
            appointment_doc("appt-a", "completed", false, 100),
            appointment_doc("appt-b", "booked", true, 50),
        ])))
        .mount(&server)
        .await;

    let config = TestConfig::with_data_api_url(&server.uri());
    let token = config.token_for(DOC_ID, Role::Doctor);
    let app = doctor_routes(config.to_arc());

    let request = Request::get("/dashboard-data")
        .header("dtoken", token)
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["dashboard"]["earnings"], json!(150));
    assert_eq!(body["dashboard"]["appointments"], json!(2));
    assert_eq!(body["dashboard"]["patients"], json!(1));
}

#[tokio::test]
async fn completing_someone_elses_appointment_is_unauthorized() {
    let server = MockServer::start().await;

    let mut foreign = appointment_doc("appt-x", "booked", false, 100);
    foreign["doc_id"] = json!("another-doctor");

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .and(body_partial_json(json!({ "collection": "appointments" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockDocuments::find_one(Some(foreign))))
        .mount(&server)
        .await;

    let config = TestConfig::with_data_api_url(&server.uri());
    let token = config.token_for(DOC_ID, Role::Doctor);
    let app = doctor_routes(config.to_arc());

    let request = Request::post("/complete-appointment")
        .header("dtoken", token)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "appointment_id": "appt-x" }).to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn doctor_can_cancel_own_appointment() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .and(body_partial_json(json!({ "collection": "appointments" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(MockDocuments::find_one(Some(appointment_doc(
                    "appt-1", "booked", false, 100,
                )))),
        )
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/action/updateOne"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockDocuments::updated(1, 1)))
        .mount(&server)
        .await;

    let config = TestConfig::with_data_api_url(&server.uri());
    let token = config.token_for(DOC_ID, Role::Doctor);
    let app = doctor_routes(config.to_arc());

    let request = Request::post("/cancel-appointment")
        .header("dtoken", token)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "appointment_id": "appt-1" }).to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["success"], json!(true));
}
