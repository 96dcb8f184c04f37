use std::sync::Arc;

use assert_matches::assert_matches;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::models::BookingError;
use appointment_cell::services::ledger::SlotLedgerService;
use shared_database::DocumentClient;
use shared_utils::test_utils::{MockDocuments, TestConfig};

const DOC_ID: &str = "doc-1";

fn ledger_service(server: &MockServer) -> SlotLedgerService {
    let config = TestConfig::with_data_api_url(&server.uri()).to_app_config();
    SlotLedgerService::new(Arc::new(DocumentClient::new(&config)))
}

#[tokio::test]
async fn reserve_succeeds_when_slot_is_free() {
    let server = MockServer::start().await;

    // The conditional filter carries the "not already present" clause; a
    // matched document means the reservation won.
    Mock::given(method("POST"))
        .and(path("/action/updateOne"))
        .and(body_partial_json(json!({
            "collection": "doctors",
            "filter": { "_id": DOC_ID, "slots_booked.2024-01-01": { "$ne": "10:00" } },
            "update": { "$push": { "slots_booked.2024-01-01": "10:00" } }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockDocuments::updated(1, 1)))
        .expect(1)
        .mount(&server)
        .await;

    let ledger = ledger_service(&server);
    ledger.reserve(DOC_ID, "2024-01-01", "10:00").await.unwrap();
}

#[tokio::test]
async fn reserve_conflicts_when_slot_is_taken() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/action/updateOne"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockDocuments::updated(0, 0)))
        .mount(&server)
        .await;

    let ledger = ledger_service(&server);
    let result = ledger.reserve(DOC_ID, "2024-01-01", "10:00").await;

    assert_matches!(result, Err(BookingError::SlotUnavailable));
}

#[tokio::test]
async fn release_is_idempotent() {
    let server = MockServer::start().await;

    // Second call matches the doctor but pulls nothing; still a success.
    Mock::given(method("POST"))
        .and(path("/action/updateOne"))
        .and(body_partial_json(json!({
            "collection": "doctors",
            "update": { "$pull": { "slots_booked.2024-01-01": "10:00" } }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockDocuments::updated(1, 0)))
        .expect(2)
        .mount(&server)
        .await;

    let ledger = ledger_service(&server);
    ledger.release(DOC_ID, "2024-01-01", "10:00").await.unwrap();
    ledger.release(DOC_ID, "2024-01-01", "10:00").await.unwrap();
}

#[tokio::test]
async fn release_of_unknown_doctor_is_a_noop() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/action/updateOne"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockDocuments::updated(0, 0)))
        .mount(&server)
        .await;

    let ledger = ledger_service(&server);
    ledger.release("no-such-doctor", "2024-01-01", "10:00").await.unwrap();
}

#[tokio::test]
async fn is_reserved_reflects_ledger_membership() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .and(body_partial_json(json!({
            "collection": "doctors",
            "filter": { "_id": DOC_ID, "slots_booked.2024-01-01": "10:00" }
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(MockDocuments::find_one(Some(MockDocuments::doctor(DOC_ID, 100, true)))),
        )
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockDocuments::find_one(None)))
        .mount(&server)
        .await;

    let ledger = ledger_service(&server);
    assert!(ledger.is_reserved(DOC_ID, "2024-01-01", "10:00").await.unwrap());
    assert!(!ledger.is_reserved(DOC_ID, "2024-01-01", "11:00").await.unwrap());
}
