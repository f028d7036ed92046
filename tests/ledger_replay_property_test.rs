mod common;

use proptest::prelude::*;
use rust_decimal::Decimal;
use stockcore_api::{errors::ServiceError, services::adjustments::AdjustmentRequest};

use common::TestApp;

/// For any sequence of signed adjustments, the ledger must (a) never let a
/// balance go negative, (b) keep the balance equal to the sum of the
/// adjustments it accepted, and (c) reproduce the balance by replaying the
/// movement log.
fn run_sequence(deltas: Vec<i64>) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime");

    rt.block_on(async move {
        let app = TestApp::new().await;
        let w = app.create_warehouse("W1").await;
        let l = app.create_location(w.id, "L1").await;
        let p = app.create_product("P-PROP").await;

        let mut expected = Decimal::ZERO;

        for raw in deltas {
            if raw == 0 {
                continue;
            }
            let delta = Decimal::from(raw);
            let result = app
                .services()
                .adjustments
                .adjust(
                    app.ctx,
                    AdjustmentRequest {
                        product_id: p.id,
                        location_id: l.id,
                        batch: String::new(),
                        delta,
                        notes: None,
                    },
                )
                .await;

            match result {
                Ok(_) => expected += delta,
                Err(ServiceError::InsufficientStock(_)) => {
                    // Only a debit past the balance may be refused
                    assert!(delta < Decimal::ZERO);
                    assert!(expected + delta < Decimal::ZERO);
                }
                Err(other) => panic!("unexpected error: {}", other),
            }

            let quantity = app.quantity(p.id, l.id).await;
            assert!(quantity >= Decimal::ZERO, "negative balance {}", quantity);
            assert_eq!(quantity, expected);
        }

        if let Some(level) = app.level(p.id, l.id, "").await {
            let audit = app
                .services()
                .ledger
                .audit_level(level.id)
                .await
                .expect("audit failed");
            assert!(
                audit.consistent,
                "replay {} != balance {}",
                audit.replayed_quantity, audit.balance_quantity
            );
        }
    });
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn replaying_random_histories_matches_balances(
        deltas in proptest::collection::vec(-60i64..120, 1..24)
    ) {
        run_sequence(deltas);
    }
}
