mod common;

use assert_matches::assert_matches;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use stockcore_api::{
    entities::{stock_movement::MovementType, transfer::TransferStatus},
    errors::ServiceError,
    services::{
        adjustments::AdjustmentRequest,
        ledger::MovementFilter,
        transfers::{NewTransfer, NewTransferItem},
    },
};

use common::TestApp;

#[tokio::test]
async fn adjustment_debits_and_guards_against_negative_balance() {
    let app = TestApp::new().await;
    let w1 = app.create_warehouse("W1").await;
    let l1 = app.create_location(w1.id, "L1").await;
    let p = app.create_product("P-100").await;

    app.stock(p.id, l1.id, dec!(100)).await;
    assert_eq!(app.quantity(p.id, l1.id).await, dec!(100));

    // -30 succeeds, leaving 70
    app.services()
        .adjustments
        .adjust(
            app.ctx,
            AdjustmentRequest {
                product_id: p.id,
                location_id: l1.id,
                batch: String::new(),
                delta: dec!(-30),
                notes: None,
            },
        )
        .await
        .expect("downward adjustment within stock should succeed");
    assert_eq!(app.quantity(p.id, l1.id).await, dec!(70));

    // -80 fails and the balance stays at 70
    let err = app
        .services()
        .adjustments
        .adjust(
            app.ctx,
            AdjustmentRequest {
                product_id: p.id,
                location_id: l1.id,
                batch: String::new(),
                delta: dec!(-80),
                notes: None,
            },
        )
        .await
        .expect_err("overdraw must fail");
    assert_matches!(err, ServiceError::InsufficientStock(_));
    assert_eq!(app.quantity(p.id, l1.id).await, dec!(70));
}

#[tokio::test]
async fn insufficient_stock_error_names_product_and_location() {
    let app = TestApp::new().await;
    let w1 = app.create_warehouse("W1").await;
    let l1 = app.create_location(w1.id, "A-01-01").await;
    let p = app.create_product("WIDGET-1").await;

    app.stock(p.id, l1.id, dec!(5)).await;

    let err = app
        .services()
        .adjustments
        .adjust(
            app.ctx,
            AdjustmentRequest {
                product_id: p.id,
                location_id: l1.id,
                batch: String::new(),
                delta: dec!(-10),
                notes: None,
            },
        )
        .await
        .expect_err("overdraw must fail");

    let message = err.to_string();
    assert!(message.contains("WIDGET-1"), "missing product: {}", message);
    assert!(message.contains("A-01-01"), "missing location: {}", message);
}

#[tokio::test]
async fn zero_adjustment_is_rejected_without_a_movement() {
    let app = TestApp::new().await;
    let w1 = app.create_warehouse("W1").await;
    let l1 = app.create_location(w1.id, "L1").await;
    let p = app.create_product("P-100").await;

    let err = app
        .services()
        .adjustments
        .adjust(
            app.ctx,
            AdjustmentRequest {
                product_id: p.id,
                location_id: l1.id,
                batch: String::new(),
                delta: Decimal::ZERO,
                notes: None,
            },
        )
        .await
        .expect_err("zero delta must be rejected");
    assert_matches!(err, ServiceError::InvalidQuantity(_));

    let (movements, total) = app
        .services()
        .ledger
        .list_movements(app.ctx, MovementFilter::default(), 1, 20)
        .await
        .expect("listing movements");
    assert_eq!(total, 0);
    assert!(movements.is_empty());
}

#[tokio::test]
async fn transfer_moves_stock_between_warehouses() {
    let app = TestApp::new().await;
    let w1 = app.create_warehouse("W1").await;
    let l1 = app.create_location(w1.id, "L1").await;
    let w2 = app.create_warehouse("W2").await;
    let l2 = app.create_location(w2.id, "L2").await;
    let p = app.create_product("P-100").await;

    app.stock(p.id, l1.id, dec!(70)).await;

    let transfer = app
        .services()
        .transfers
        .create(
            app.ctx,
            NewTransfer {
                from_warehouse_id: w1.id,
                to_warehouse_id: w2.id,
                reference: "TR-0001".to_string(),
                notes: None,
                items: vec![NewTransferItem {
                    product_id: p.id,
                    quantity: dec!(20),
                    from_location_id: None,
                    to_location_id: None,
                    batch: None,
                }],
            },
        )
        .await
        .expect("transfer creation failed");
    assert_eq!(transfer.status, TransferStatus::Pending);

    let completed = app
        .services()
        .transfers
        .process(app.ctx, transfer.id)
        .await
        .expect("processing should succeed");
    assert_eq!(completed.status, TransferStatus::Completed);

    assert_eq!(app.quantity(p.id, l1.id).await, dec!(50));
    assert_eq!(app.quantity(p.id, l2.id).await, dec!(20));

    // One transfer-typed movement carrying both locations
    let (movements, _) = app
        .services()
        .ledger
        .list_movements(
            app.ctx,
            MovementFilter {
                movement_type: Some(MovementType::Transfer),
                ..Default::default()
            },
            1,
            20,
        )
        .await
        .expect("listing movements");
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0].from_location_id, Some(l1.id));
    assert_eq!(movements[0].to_location_id, Some(l2.id));
    assert_eq!(movements[0].quantity, dec!(20));
}

#[tokio::test]
async fn transfer_is_all_or_nothing() {
    let app = TestApp::new().await;
    let w1 = app.create_warehouse("W1").await;
    let l1 = app.create_location(w1.id, "L1").await;
    let w2 = app.create_warehouse("W2").await;
    let _l2 = app.create_location(w2.id, "L2").await;
    let a = app.create_product("P-A").await;
    let b = app.create_product("P-B").await;

    app.stock(a.id, l1.id, dec!(10)).await;
    app.stock(b.id, l1.id, dec!(3)).await;

    let transfer = app
        .services()
        .transfers
        .create(
            app.ctx,
            NewTransfer {
                from_warehouse_id: w1.id,
                to_warehouse_id: w2.id,
                reference: "TR-0002".to_string(),
                notes: None,
                items: vec![
                    NewTransferItem {
                        product_id: a.id,
                        quantity: dec!(10),
                        from_location_id: None,
                        to_location_id: None,
                        batch: None,
                    },
                    NewTransferItem {
                        product_id: b.id,
                        quantity: dec!(5),
                        from_location_id: None,
                        to_location_id: None,
                        batch: None,
                    },
                ],
            },
        )
        .await
        .expect("transfer creation failed");

    let err = app
        .services()
        .transfers
        .process(app.ctx, transfer.id)
        .await
        .expect_err("short item must fail the whole transfer");
    assert_matches!(err, ServiceError::InsufficientStock(_));

    // Neither product moved, and the transfer stayed pending
    assert_eq!(app.quantity(a.id, l1.id).await, dec!(10));
    assert_eq!(app.quantity(b.id, l1.id).await, dec!(3));

    let (reloaded, _) = app
        .services()
        .transfers
        .get(app.ctx, transfer.id)
        .await
        .expect("transfer lookup failed");
    assert_eq!(reloaded.status, TransferStatus::Pending);
}

#[tokio::test]
async fn processed_transfers_reject_reprocessing() {
    let app = TestApp::new().await;
    let w1 = app.create_warehouse("W1").await;
    let l1 = app.create_location(w1.id, "L1").await;
    let w2 = app.create_warehouse("W2").await;
    let _l2 = app.create_location(w2.id, "L2").await;
    let p = app.create_product("P-100").await;

    app.stock(p.id, l1.id, dec!(30)).await;

    let transfer = app
        .services()
        .transfers
        .create(
            app.ctx,
            NewTransfer {
                from_warehouse_id: w1.id,
                to_warehouse_id: w2.id,
                reference: "TR-0003".to_string(),
                notes: None,
                items: vec![NewTransferItem {
                    product_id: p.id,
                    quantity: dec!(10),
                    from_location_id: None,
                    to_location_id: None,
                    batch: None,
                }],
            },
        )
        .await
        .expect("transfer creation failed");

    app.services()
        .transfers
        .process(app.ctx, transfer.id)
        .await
        .expect("first processing should succeed");

    let err = app
        .services()
        .transfers
        .process(app.ctx, transfer.id)
        .await
        .expect_err("second processing must be rejected");
    assert_matches!(err, ServiceError::AlreadyProcessed(_));

    // Quantities unchanged by the rejected second run
    assert_eq!(app.quantity(p.id, l1.id).await, dec!(20));
}

#[tokio::test]
async fn transfer_honors_pinned_source_location_and_batch() {
    let app = TestApp::new().await;
    let w1 = app.create_warehouse("W1").await;
    let l1a = app.create_location(w1.id, "L1A").await;
    let l1b = app.create_location(w1.id, "L1B").await;
    let w2 = app.create_warehouse("W2").await;
    let l2 = app.create_location(w2.id, "L2").await;
    let p = app.create_product("P-100").await;

    app.stock_batch(p.id, l1a.id, "LOT-A", dec!(50)).await;
    app.stock_batch(p.id, l1b.id, "LOT-B", dec!(50)).await;

    let transfer = app
        .services()
        .transfers
        .create(
            app.ctx,
            NewTransfer {
                from_warehouse_id: w1.id,
                to_warehouse_id: w2.id,
                reference: "TR-0004".to_string(),
                notes: None,
                items: vec![NewTransferItem {
                    product_id: p.id,
                    quantity: dec!(15),
                    from_location_id: Some(l1b.id),
                    to_location_id: Some(l2.id),
                    batch: Some("LOT-B".to_string()),
                }],
            },
        )
        .await
        .expect("transfer creation failed");

    app.services()
        .transfers
        .process(app.ctx, transfer.id)
        .await
        .expect("processing should succeed");

    // Only the pinned row was debited
    let untouched = app.level(p.id, l1a.id, "LOT-A").await.unwrap();
    assert_eq!(untouched.quantity, dec!(50));
    let debited = app.level(p.id, l1b.id, "LOT-B").await.unwrap();
    assert_eq!(debited.quantity, dec!(35));
    let credited = app.level(p.id, l2.id, "LOT-B").await.unwrap();
    assert_eq!(credited.quantity, dec!(15));
}

#[tokio::test]
async fn replaying_movements_reproduces_every_balance() {
    let app = TestApp::new().await;
    let w1 = app.create_warehouse("W1").await;
    let l1 = app.create_location(w1.id, "L1").await;
    let w2 = app.create_warehouse("W2").await;
    let l2 = app.create_location(w2.id, "L2").await;
    let p = app.create_product("P-100").await;

    app.stock(p.id, l1.id, dec!(100)).await;

    // A mixed history: adjustment down, transfer out, adjustment up
    app.services()
        .adjustments
        .adjust(
            app.ctx,
            AdjustmentRequest {
                product_id: p.id,
                location_id: l1.id,
                batch: String::new(),
                delta: dec!(-25),
                notes: None,
            },
        )
        .await
        .unwrap();

    let transfer = app
        .services()
        .transfers
        .create(
            app.ctx,
            NewTransfer {
                from_warehouse_id: w1.id,
                to_warehouse_id: w2.id,
                reference: "TR-0005".to_string(),
                notes: None,
                items: vec![NewTransferItem {
                    product_id: p.id,
                    quantity: dec!(40),
                    from_location_id: None,
                    to_location_id: None,
                    batch: None,
                }],
            },
        )
        .await
        .unwrap();
    app.services()
        .transfers
        .process(app.ctx, transfer.id)
        .await
        .unwrap();

    app.services()
        .adjustments
        .adjust(
            app.ctx,
            AdjustmentRequest {
                product_id: p.id,
                location_id: l2.id,
                batch: String::new(),
                delta: dec!(2),
                notes: None,
            },
        )
        .await
        .unwrap();

    for location in [l1.id, l2.id] {
        let level = app.level(p.id, location, "").await.unwrap();
        let audit = app
            .services()
            .ledger
            .audit_level(level.id)
            .await
            .expect("audit failed");
        assert!(
            audit.consistent,
            "replayed {} but balance is {}",
            audit.replayed_quantity, audit.balance_quantity
        );
    }

    assert_eq!(app.quantity(p.id, l1.id).await, dec!(35));
    assert_eq!(app.quantity(p.id, l2.id).await, dec!(42));
}

#[tokio::test]
async fn concurrent_reservations_never_oversubscribe_a_row() {
    let app = TestApp::new().await;
    let w1 = app.create_warehouse("W1").await;
    let l1 = app.create_location(w1.id, "L1").await;
    let p = app.create_product("P-100").await;

    app.stock(p.id, l1.id, dec!(10)).await;

    // 20 tasks each try to reserve 1 unit; only 10 can win.
    let mut tasks = Vec::new();
    for _ in 0..20 {
        let ledger = app.services().ledger.clone();
        let db = app.state.db.clone();
        let product_id = p.id;
        let location_id = l1.id;
        tasks.push(tokio::spawn(async move {
            ledger
                .reserve(db.as_ref(), product_id, location_id, "", dec!(1))
                .await
                .is_ok()
        }));
    }

    let mut granted = 0;
    for task in tasks {
        if task.await.unwrap_or(false) {
            granted += 1;
        }
    }
    assert_eq!(granted, 10, "exactly 10 reservations should succeed");

    let level = app.level(p.id, l1.id, "").await.unwrap();
    assert_eq!(level.reserved, dec!(10));
    assert_eq!(level.quantity, dec!(10));
}

#[tokio::test]
async fn tenants_cannot_touch_each_others_documents() {
    let app = TestApp::new().await;
    let w1 = app.create_warehouse("W1").await;
    let l1 = app.create_location(w1.id, "L1").await;
    let w2 = app.create_warehouse("W2").await;
    let _l2 = app.create_location(w2.id, "L2").await;
    let p = app.create_product("P-100").await;

    app.stock(p.id, l1.id, dec!(50)).await;

    let transfer = app
        .services()
        .transfers
        .create(
            app.ctx,
            NewTransfer {
                from_warehouse_id: w1.id,
                to_warehouse_id: w2.id,
                reference: "TR-0006".to_string(),
                notes: None,
                items: vec![NewTransferItem {
                    product_id: p.id,
                    quantity: dec!(10),
                    from_location_id: None,
                    to_location_id: None,
                    batch: None,
                }],
            },
        )
        .await
        .unwrap();

    let stranger = app.other_tenant();
    let err = app
        .services()
        .transfers
        .process(stranger, transfer.id)
        .await
        .expect_err("foreign tenant must not process the transfer");
    assert_matches!(err, ServiceError::NotFound(_));
}
