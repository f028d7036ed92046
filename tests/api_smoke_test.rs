mod common;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::TestApp;
use stockcore_api::tenant::{ACTOR_HEADER, COMPANY_HEADER};

fn router(app: &TestApp) -> axum::Router {
    stockcore_api::api_v1_routes().with_state(app.state.clone())
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body read failed");
    serde_json::from_slice(&bytes).expect("body is not JSON")
}

#[tokio::test]
async fn status_endpoint_reports_ok() {
    let app = TestApp::new().await;

    let response = router(&app)
        .oneshot(Request::get("/status").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let payload = body_json(response).await;
    assert_eq!(payload["data"]["status"], "ok");
}

#[tokio::test]
async fn tenant_headers_are_required() {
    let app = TestApp::new().await;

    let response = router(&app)
        .oneshot(
            Request::get("/inventory/levels")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn adjustment_round_trips_through_the_http_surface() {
    let app = TestApp::new().await;
    let w = app.create_warehouse("W1").await;
    let l = app.create_location(w.id, "L1").await;
    let p = app.create_product("P-100").await;

    let request = Request::post("/inventory/adjustments")
        .header(COMPANY_HEADER, app.ctx.company_id.to_string())
        .header(ACTOR_HEADER, app.ctx.actor_id.to_string())
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "product_id": p.id,
                "location_id": l.id,
                "delta": "42",
                "notes": "cycle count"
            })
            .to_string(),
        ))
        .unwrap();

    let response = router(&app).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let movement = body_json(response).await;
    assert_eq!(movement["movement_type"], "adjustment");
    assert_eq!(movement["to_location_id"], json!(l.id));
    assert_eq!(movement["from_location_id"], Value::Null);

    assert_eq!(app.quantity(p.id, l.id).await, dec!(42));

    // The read surface sees the new balance
    let response = router(&app)
        .oneshot(
            Request::get(format!("/inventory/levels?product_id={}", p.id))
                .header(COMPANY_HEADER, app.ctx.company_id.to_string())
                .header(ACTOR_HEADER, app.ctx.actor_id.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let levels = body_json(response).await;
    assert_eq!(levels["pagination"]["total"], 1);
    assert_eq!(levels["data"][0]["quantity"], "42");
}

#[tokio::test]
async fn insufficient_adjustment_maps_to_unprocessable_entity() {
    let app = TestApp::new().await;
    let w = app.create_warehouse("W1").await;
    let l = app.create_location(w.id, "L1").await;
    let p = app.create_product("P-100").await;
    app.stock(p.id, l.id, dec!(5)).await;

    let request = Request::post("/inventory/adjustments")
        .header(COMPANY_HEADER, app.ctx.company_id.to_string())
        .header(ACTOR_HEADER, app.ctx.actor_id.to_string())
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "product_id": p.id,
                "location_id": l.id,
                "delta": "-10"
            })
            .to_string(),
        ))
        .unwrap();

    let response = router(&app).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let payload = body_json(response).await;
    let message = payload["message"].as_str().unwrap_or_default();
    assert!(message.contains("P-100"), "missing product: {}", message);
    assert!(message.contains("L1"), "missing location: {}", message);
}
