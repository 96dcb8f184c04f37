use assert_matches::assert_matches;
use chrono::Duration;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use payment_cell::models::PaymentError;
use payment_cell::services::reconciliation::PaymentService;
use shared_utils::test_utils::{sign_webhook_payload, MockDocuments, TestConfig};

const USER_ID: &str = "user-1";
const APPOINTMENT_ID: &str = "appt-1";
const ORDER_ID: &str = "order-1";
const WEBHOOK_SECRET: &str = "whsec_test_123";

struct Harness {
    data_api: MockServer,
    stripe: MockServer,
    paystack: MockServer,
    service: PaymentService,
}

async fn harness() -> Harness {
    let data_api = MockServer::start().await;
    let stripe = MockServer::start().await;
    let paystack = MockServer::start().await;

    let mut config = TestConfig::with_data_api_url(&data_api.uri()).to_app_config();
    config.stripe_api_url = stripe.uri();
    config.paystack_api_url = paystack.uri();

    let service = PaymentService::new(&config);

    Harness {
        data_api,
        stripe,
        paystack,
        service,
    }
}

async fn mount_user_and_appointment(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .and(body_partial_json(json!({ "collection": "users" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(MockDocuments::find_one(Some(MockDocuments::user(USER_ID)))),
        )
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .and(body_partial_json(json!({ "collection": "appointments" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockDocuments::find_one(Some(
            MockDocuments::appointment(APPOINTMENT_ID, USER_ID, "doc-1", "2024-01-01", "10:00", 100),
        ))))
        .mount(server)
        .await;
}

fn settled_event_body() -> String {
    json!({
        "id": "evt_1",
        "type": "checkout.session.completed",
        "data": {
            "object": {
                "id": "cs_1",
                "metadata": {
                    "order_id": ORDER_ID,
                    "appointment_id": APPOINTMENT_ID
                }
            }
        }
    })
    .to_string()
}

// ==============================================================================
// CHECKOUT INITIATION
// ==============================================================================

#[tokio::test]
async fn stripe_checkout_places_order_and_returns_redirect() {
    let h = harness().await;
    mount_user_and_appointment(&h.data_api).await;

    Mock::given(method("POST"))
        .and(path("/action/insertOne"))
        .and(body_partial_json(json!({ "collection": "orders" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockDocuments::inserted(ORDER_ID)))
        .expect(1)
        .mount(&h.data_api)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/checkout/sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cs_1",
            "url": "https://checkout.example.com/cs_1"
        })))
        .expect(1)
        .mount(&h.stripe)
        .await;

    let url = h
        .service
        .stripe_checkout(USER_ID, APPOINTMENT_ID)
        .await
        .unwrap();

    assert_eq!(url, "https://checkout.example.com/cs_1");
}

#[tokio::test]
async fn failed_checkout_leaves_no_dangling_order() {
    let h = harness().await;
    mount_user_and_appointment(&h.data_api).await;

    Mock::given(method("POST"))
        .and(path("/action/insertOne"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockDocuments::inserted(ORDER_ID)))
        .expect(1)
        .mount(&h.data_api)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/checkout/sessions"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&h.stripe)
        .await;

    // The placed order must be removed once the gateway fails to produce a
    // redirect target.
    Mock::given(method("POST"))
        .and(path("/action/deleteOne"))
        .and(body_partial_json(json!({ "collection": "orders" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockDocuments::deleted(1)))
        .expect(1)
        .mount(&h.data_api)
        .await;

    let result = h.service.stripe_checkout(USER_ID, APPOINTMENT_ID).await;
    assert_matches!(result, Err(PaymentError::Gateway(_)));
}

#[tokio::test]
async fn checkout_for_missing_appointment_fails() {
    let h = harness().await;

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .and(body_partial_json(json!({ "collection": "users" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(MockDocuments::find_one(Some(MockDocuments::user(USER_ID)))),
        )
        .mount(&h.data_api)
        .await;

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .and(body_partial_json(json!({ "collection": "appointments" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockDocuments::find_one(None)))
        .mount(&h.data_api)
        .await;

    let result = h.service.stripe_checkout(USER_ID, "no-such-appointment").await;
    assert_matches!(result, Err(PaymentError::AppointmentNotFound));
}

// ==============================================================================
// WEBHOOK CONFIRMATION
// ==============================================================================

#[tokio::test]
async fn webhook_with_bad_signature_mutates_nothing() {
    let h = harness().await;

    // Zero expected calls: the signature check runs before any persistence.
    Mock::given(method("POST"))
        .and(path_regex("/action/.*"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&h.data_api)
        .await;

    let body = settled_event_body();
    let (_, signature) = sign_webhook_payload(&body, "wrong-secret", Duration::zero());

    let result = h
        .service
        .handle_stripe_webhook(body.as_bytes(), &signature)
        .await;

    assert_matches!(result, Err(PaymentError::InvalidSignature));
}

#[tokio::test]
async fn webhook_with_stale_timestamp_is_rejected() {
    let h = harness().await;

    let body = settled_event_body();
    let (_, signature) = sign_webhook_payload(&body, WEBHOOK_SECRET, Duration::minutes(10));

    let result = h
        .service
        .handle_stripe_webhook(body.as_bytes(), &signature)
        .await;

    assert_matches!(result, Err(PaymentError::InvalidSignature));
}

#[tokio::test]
async fn webhook_confirmation_settles_order_and_appointment() {
    let h = harness().await;

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .and(body_partial_json(json!({ "collection": "orders" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockDocuments::find_one(Some(
            MockDocuments::order(ORDER_ID, APPOINTMENT_ID, USER_ID, 100),
        ))))
        .mount(&h.data_api)
        .await;

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .and(body_partial_json(json!({ "collection": "appointments" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockDocuments::find_one(Some(
            MockDocuments::appointment(APPOINTMENT_ID, USER_ID, "doc-1", "2024-01-01", "10:00", 100),
        ))))
        .mount(&h.data_api)
        .await;

    // Order flip is conditioned on still being placed.
    Mock::given(method("POST"))
        .and(path("/action/updateOne"))
        .and(body_partial_json(json!({
            "collection": "orders",
            "filter": { "_id": ORDER_ID, "status": "placed" },
            "update": { "$set": { "status": "paid" } }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockDocuments::updated(1, 1)))
        .expect(1)
        .mount(&h.data_api)
        .await;

    Mock::given(method("POST"))
        .and(path("/action/updateOne"))
        .and(body_partial_json(json!({
            "collection": "appointments",
            "update": { "$set": { "paid": true } }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockDocuments::updated(1, 1)))
        .expect(1)
        .mount(&h.data_api)
        .await;

    let body = settled_event_body();
    let (_, signature) = sign_webhook_payload(&body, WEBHOOK_SECRET, Duration::zero());

    h.service
        .handle_stripe_webhook(body.as_bytes(), &signature)
        .await
        .unwrap();
}

#[tokio::test]
async fn webhook_replay_applies_no_second_side_effect() {
    let h = harness().await;

    let mut paid_order = MockDocuments::order(ORDER_ID, APPOINTMENT_ID, USER_ID, 100);
    paid_order["status"] = json!("paid");

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .and(body_partial_json(json!({ "collection": "orders" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockDocuments::find_one(Some(paid_order))))
        .mount(&h.data_api)
        .await;

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .and(body_partial_json(json!({ "collection": "appointments" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockDocuments::find_one(Some(
            MockDocuments::appointment(APPOINTMENT_ID, USER_ID, "doc-1", "2024-01-01", "10:00", 100),
        ))))
        .mount(&h.data_api)
        .await;

    // The conditional flip misses; the appointment must not be touched again.
    Mock::given(method("POST"))
        .and(path("/action/updateOne"))
        .and(body_partial_json(json!({ "collection": "orders" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockDocuments::updated(0, 0)))
        .expect(1)
        .mount(&h.data_api)
        .await;

    Mock::given(method("POST"))
        .and(path("/action/updateOne"))
        .and(body_partial_json(json!({ "collection": "appointments" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockDocuments::updated(1, 1)))
        .expect(0)
        .mount(&h.data_api)
        .await;

    let body = settled_event_body();
    let (_, signature) = sign_webhook_payload(&body, WEBHOOK_SECRET, Duration::zero());

    h.service
        .handle_stripe_webhook(body.as_bytes(), &signature)
        .await
        .unwrap();
}

#[tokio::test]
async fn unrecognized_event_types_are_accepted_and_ignored() {
    let h = harness().await;

    Mock::given(method("POST"))
        .and(path_regex("/action/.*"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&h.data_api)
        .await;

    let body = json!({
        "id": "evt_2",
        "type": "invoice.created",
        "data": { "object": {} }
    })
    .to_string();
    let (_, signature) = sign_webhook_payload(&body, WEBHOOK_SECRET, Duration::zero());

    h.service
        .handle_stripe_webhook(body.as_bytes(), &signature)
        .await
        .unwrap();
}

// ==============================================================================
// VERIFY-BY-REFERENCE GATEWAY
// ==============================================================================

#[tokio::test]
async fn paystack_checkout_returns_authorization_url() {
    let h = harness().await;
    mount_user_and_appointment(&h.data_api).await;

    Mock::given(method("POST"))
        .and(path("/action/insertOne"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockDocuments::inserted(ORDER_ID)))
        .mount(&h.data_api)
        .await;

    Mock::given(method("POST"))
        .and(path("/transaction/initialize"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": true,
            "data": {
                "authorization_url": "https://pay.example.com/ref-1",
                "reference": "ref-1"
            }
        })))
        .mount(&h.paystack)
        .await;

    let url = h
        .service
        .paystack_checkout(USER_ID, APPOINTMENT_ID)
        .await
        .unwrap();

    assert_eq!(url, "https://pay.example.com/ref-1");
}

#[tokio::test]
async fn verify_settled_transaction_confirms_payment() {
    let h = harness().await;

    Mock::given(method("GET"))
        .and(path("/transaction/verify/ref-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": true,
            "data": {
                "status": "success",
                "metadata": {
                    "order_id": ORDER_ID,
                    "appointment_id": APPOINTMENT_ID
                }
            }
        })))
        .mount(&h.paystack)
        .await;

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .and(body_partial_json(json!({ "collection": "orders" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockDocuments::find_one(Some(
            MockDocuments::order(ORDER_ID, APPOINTMENT_ID, USER_ID, 100),
        ))))
        .mount(&h.data_api)
        .await;

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .and(body_partial_json(json!({ "collection": "appointments" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockDocuments::find_one(Some(
            MockDocuments::appointment(APPOINTMENT_ID, USER_ID, "doc-1", "2024-01-01", "10:00", 100),
        ))))
        .mount(&h.data_api)
        .await;

    Mock::given(method("POST"))
        .and(path("/action/updateOne"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockDocuments::updated(1, 1)))
        .mount(&h.data_api)
        .await;

    let paid = h.service.verify_paystack("ref-1").await.unwrap();
    assert!(paid);
}

#[tokio::test]
async fn verify_unsettled_transaction_changes_nothing() {
    let h = harness().await;

    Mock::given(method("GET"))
        .and(path("/transaction/verify/ref-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": true,
            "data": { "status": "abandoned", "metadata": null }
        })))
        .mount(&h.paystack)
        .await;

    Mock::given(method("POST"))
        .and(path_regex("/action/.*"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&h.data_api)
        .await;

    let paid = h.service.verify_paystack("ref-2").await.unwrap();
    assert!(!paid);
}
