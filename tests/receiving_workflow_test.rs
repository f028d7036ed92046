mod common;

use assert_matches::assert_matches;
use rust_decimal_macros::dec;
use stockcore_api::{
    entities::purchase_order::PurchaseOrderStatus,
    errors::ServiceError,
    services::{
        purchasing::{NewPurchaseOrder, NewPurchaseOrderItem},
        receiving::ReceiveLine,
    },
    tenant::TenantContext,
};
use uuid::Uuid;

use common::{date, TestApp};

async fn ordered_po(
    app: &TestApp,
    ctx: TenantContext,
    supplier_id: Uuid,
    items: Vec<NewPurchaseOrderItem>,
) -> Uuid {
    let order = app
        .services()
        .purchasing
        .create(
            ctx,
            NewPurchaseOrder {
                order_number: format!("PO-{}", Uuid::new_v4().simple()),
                supplier_id,
                order_date: date("2025-03-01"),
                expected_delivery: Some(date("2025-03-15")),
                notes: None,
                items,
            },
        )
        .await
        .expect("purchase order creation failed");

    for status in [
        PurchaseOrderStatus::Pending,
        PurchaseOrderStatus::Approved,
        PurchaseOrderStatus::Ordered,
    ] {
        app.services()
            .purchasing
            .transition(ctx, order.id, status)
            .await
            .expect("lifecycle transition failed");
    }

    order.id
}

fn po_item(product_id: Uuid, location_id: Uuid, quantity: rust_decimal::Decimal) -> NewPurchaseOrderItem {
    NewPurchaseOrderItem {
        product_id,
        quantity,
        unit_price: dec!(9.50),
        tax_rate: dec!(0),
        location_id,
        notes: None,
    }
}

#[tokio::test]
async fn full_receipt_credits_stock_and_completes_the_order() {
    let app = TestApp::new().await;
    let w = app.create_warehouse("W1").await;
    let l = app.create_location(w.id, "L1").await;
    let p = app.create_product("P-100").await;
    let supplier = app.create_supplier("SUP1").await;

    let order_id = ordered_po(
        &app,
        app.ctx,
        supplier,
        vec![po_item(p.id, l.id, dec!(50))],
    )
    .await;

    let outcome = app
        .services()
        .receiving
        .receive(app.ctx, order_id, None)
        .await
        .expect("receiving should succeed");

    assert_eq!(outcome.status, PurchaseOrderStatus::Received);
    assert_eq!(outcome.lines.len(), 1);
    assert_eq!(outcome.lines[0].quantity, dec!(50));
    assert_eq!(app.quantity(p.id, l.id).await, dec!(50));

    let (_, items) = app
        .services()
        .purchasing
        .get(app.ctx, order_id)
        .await
        .unwrap();
    assert_eq!(items[0].received, dec!(50));
}

#[tokio::test]
async fn second_receive_reports_already_received() {
    let app = TestApp::new().await;
    let w = app.create_warehouse("W1").await;
    let l = app.create_location(w.id, "L1").await;
    let p = app.create_product("P-100").await;
    let supplier = app.create_supplier("SUP1").await;

    let order_id = ordered_po(
        &app,
        app.ctx,
        supplier,
        vec![po_item(p.id, l.id, dec!(50))],
    )
    .await;

    app.services()
        .receiving
        .receive(app.ctx, order_id, None)
        .await
        .expect("first receive should succeed");

    let err = app
        .services()
        .receiving
        .receive(app.ctx, order_id, None)
        .await
        .expect_err("second receive must be rejected");
    assert_matches!(err, ServiceError::AlreadyReceived(_));

    // The rejected call left no trace
    assert_eq!(app.quantity(p.id, l.id).await, dec!(50));
}

#[tokio::test]
async fn partial_receipt_accumulates_and_flips_status() {
    let app = TestApp::new().await;
    let w = app.create_warehouse("W1").await;
    let l = app.create_location(w.id, "L1").await;
    let p = app.create_product("P-100").await;
    let supplier = app.create_supplier("SUP1").await;

    let order_id = ordered_po(
        &app,
        app.ctx,
        supplier,
        vec![po_item(p.id, l.id, dec!(50))],
    )
    .await;

    let (_, items) = app
        .services()
        .purchasing
        .get(app.ctx, order_id)
        .await
        .unwrap();
    let item_id = items[0].id;

    let outcome = app
        .services()
        .receiving
        .receive(
            app.ctx,
            order_id,
            Some(vec![ReceiveLine {
                item_id,
                quantity: dec!(20),
                batch: None,
                expiry_date: None,
            }]),
        )
        .await
        .expect("partial receive should succeed");
    assert_eq!(outcome.status, PurchaseOrderStatus::Partial);
    assert_eq!(app.quantity(p.id, l.id).await, dec!(20));

    // Receiving more than outstanding is rejected
    let err = app
        .services()
        .receiving
        .receive(
            app.ctx,
            order_id,
            Some(vec![ReceiveLine {
                item_id,
                quantity: dec!(31),
                batch: None,
                expiry_date: None,
            }]),
        )
        .await
        .expect_err("over-receipt must fail");
    assert_matches!(err, ServiceError::ValidationError(_));

    // The remainder completes the order
    let outcome = app
        .services()
        .receiving
        .receive(app.ctx, order_id, None)
        .await
        .expect("closing receive should succeed");
    assert_eq!(outcome.status, PurchaseOrderStatus::Received);
    assert_eq!(app.quantity(p.id, l.id).await, dec!(50));
}

#[tokio::test]
async fn batched_receipt_creates_distinct_balance_rows() {
    let app = TestApp::new().await;
    let w = app.create_warehouse("W1").await;
    let l = app.create_location(w.id, "L1").await;
    let p = app.create_product("P-100").await;
    let supplier = app.create_supplier("SUP1").await;

    let order_id = ordered_po(
        &app,
        app.ctx,
        supplier,
        vec![po_item(p.id, l.id, dec!(30))],
    )
    .await;

    let (_, items) = app
        .services()
        .purchasing
        .get(app.ctx, order_id)
        .await
        .unwrap();
    let item_id = items[0].id;

    app.services()
        .receiving
        .receive(
            app.ctx,
            order_id,
            Some(vec![ReceiveLine {
                item_id,
                quantity: dec!(10),
                batch: Some("LOT-A".to_string()),
                expiry_date: Some(date("2026-01-31")),
            }]),
        )
        .await
        .expect("first lot should land");

    app.services()
        .receiving
        .receive(
            app.ctx,
            order_id,
            Some(vec![ReceiveLine {
                item_id,
                quantity: dec!(20),
                batch: Some("LOT-B".to_string()),
                expiry_date: None,
            }]),
        )
        .await
        .expect("second lot should land");

    let lot_a = app.level(p.id, l.id, "LOT-A").await.unwrap();
    assert_eq!(lot_a.quantity, dec!(10));
    assert_eq!(lot_a.expiry_date, Some(date("2026-01-31")));
    let lot_b = app.level(p.id, l.id, "LOT-B").await.unwrap();
    assert_eq!(lot_b.quantity, dec!(20));
}

#[tokio::test]
async fn draft_orders_cannot_be_received() {
    let app = TestApp::new().await;
    let w = app.create_warehouse("W1").await;
    let l = app.create_location(w.id, "L1").await;
    let p = app.create_product("P-100").await;
    let supplier = app.create_supplier("SUP1").await;

    let order = app
        .services()
        .purchasing
        .create(
            app.ctx,
            NewPurchaseOrder {
                order_number: "PO-DRAFT".to_string(),
                supplier_id: supplier,
                order_date: date("2025-03-01"),
                expected_delivery: None,
                notes: None,
                items: vec![po_item(p.id, l.id, dec!(10))],
            },
        )
        .await
        .unwrap();

    let err = app
        .services()
        .receiving
        .receive(app.ctx, order.id, None)
        .await
        .expect_err("draft order must not be receivable");
    assert_matches!(err, ServiceError::InvalidStatusTransition(_));
}

#[tokio::test]
async fn multi_item_order_derives_status_from_all_items() {
    let app = TestApp::new().await;
    let w = app.create_warehouse("W1").await;
    let l = app.create_location(w.id, "L1").await;
    let a = app.create_product("P-A").await;
    let b = app.create_product("P-B").await;
    let supplier = app.create_supplier("SUP1").await;

    let order_id = ordered_po(
        &app,
        app.ctx,
        supplier,
        vec![po_item(a.id, l.id, dec!(10)), po_item(b.id, l.id, dec!(5))],
    )
    .await;

    let (_, items) = app
        .services()
        .purchasing
        .get(app.ctx, order_id)
        .await
        .unwrap();
    let first = items.iter().find(|i| i.product_id == a.id).unwrap();

    // Receiving only the first item leaves the order partial
    let outcome = app
        .services()
        .receiving
        .receive(
            app.ctx,
            order_id,
            Some(vec![ReceiveLine {
                item_id: first.id,
                quantity: dec!(10),
                batch: None,
                expiry_date: None,
            }]),
        )
        .await
        .unwrap();
    assert_eq!(outcome.status, PurchaseOrderStatus::Partial);

    // The outstanding item closes it
    let outcome = app
        .services()
        .receiving
        .receive(app.ctx, order_id, None)
        .await
        .unwrap();
    assert_eq!(outcome.status, PurchaseOrderStatus::Received);
    assert_eq!(app.quantity(a.id, l.id).await, dec!(10));
    assert_eq!(app.quantity(b.id, l.id).await, dec!(5));
}
