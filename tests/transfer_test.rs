//! Transfer recorder and pending-transfer lifecycle tests.

mod common;

use assert_matches::assert_matches;
use chrono::Utc;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use vaxstock::entities::stock_lot::LotStatus;
use vaxstock::entities::{pending_stock_transfer, stock_lot};
use vaxstock::{CreateLotInput, LotAllocation, StockError, StockOwner};

const VACCINE: i64 = 10;

async fn destination_lots(
    state: &vaxstock::AppState,
    owner: StockOwner,
) -> Vec<stock_lot::Model> {
    stock_lot::Entity::find()
        .filter(stock_lot::Column::OwnerType.eq(owner.level.as_str()))
        .filter(stock_lot::Column::OwnerId.eq(owner.id.unwrap()))
        .all(&*state.db)
        .await
        .unwrap()
}

#[tokio::test]
async fn record_transfer_with_no_allocations_is_not_recorded() {
    let state = common::setup().await;

    let recorded = state
        .services
        .transfers
        .record_transfer(
            VACCINE,
            StockOwner::national(),
            StockOwner::regional(1),
            &[],
        )
        .await
        .unwrap();
    assert_eq!(recorded, None);
}

#[tokio::test]
async fn record_transfer_sums_line_quantities_and_normalizes_owners() {
    let state = common::setup().await;
    let owner = StockOwner::national();

    let first = state
        .services
        .lots
        .create_lot(CreateLotInput::new(
            VACCINE,
            owner,
            100,
            common::iso_date_in(30),
        ))
        .await
        .unwrap();
    let second = state
        .services
        .lots
        .create_lot(CreateLotInput::new(
            VACCINE,
            owner,
            100,
            common::iso_date_in(60),
        ))
        .await
        .unwrap();

    let allocations = vec![
        LotAllocation {
            lot_id: first.id,
            quantity: 20,
            expiration: first.expiration,
            status: LotStatus::Valid,
        },
        LotAllocation {
            lot_id: second.id,
            quantity: 10,
            expiration: second.expiration,
            status: LotStatus::Valid,
        },
    ];

    // a hand-built national owner with a spurious id is re-normalized
    let denormalized = StockOwner {
        level: vaxstock::OwnerLevel::National,
        id: Some(9),
    };
    let transfer = state
        .services
        .transfers
        .record_transfer(VACCINE, denormalized, StockOwner::district(3), &allocations)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(transfer.quantity, 30);
    assert_eq!(transfer.from_type, "NATIONAL");
    assert_eq!(transfer.from_id, None);
    assert_eq!(transfer.to_id, Some(3));

    let (_, lines) = state
        .services
        .transfers
        .find_transfer(transfer.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines.iter().map(|l| l.quantity).sum::<i32>(), 30);
}

#[tokio::test]
async fn initiate_and_confirm_transfer_moves_stock() {
    let state = common::setup().await;
    let source = StockOwner::health_center(1);
    let destination = StockOwner::health_center(2);

    state
        .services
        .levels
        .ensure_level(VACCINE, source, 100)
        .await
        .unwrap();
    let lot = state
        .services
        .lots
        .create_lot(CreateLotInput::new(
            VACCINE,
            source,
            100,
            common::iso_date_in(30),
        ))
        .await
        .unwrap();

    let pending = state
        .services
        .transfers
        .initiate_transfer(VACCINE, source, destination, 30)
        .await
        .unwrap();
    assert_eq!(pending.quantity, 30);

    // source debited, doses in flight
    let reloaded = state.services.lots.get_lot(lot.id).await.unwrap().unwrap();
    assert_eq!(reloaded.remaining_quantity, 70);
    assert_eq!(
        state
            .services
            .levels
            .quantity_on_hand(VACCINE, source)
            .await
            .unwrap(),
        Some(70)
    );

    // an empty pending lot waits at the destination
    let parked = destination_lots(&state, destination).await;
    assert_eq!(parked.len(), 1);
    assert_eq!(parked[0].status, LotStatus::Pending.as_str());
    assert_eq!(parked[0].quantity, 0);
    assert_eq!(parked[0].remaining_quantity, 0);
    assert_eq!(parked[0].source_lot_id, Some(lot.id));
    assert_eq!(parked[0].expiration, lot.expiration);

    let transfer = state
        .services
        .transfers
        .confirm_transfer(pending.id)
        .await
        .unwrap();
    assert_eq!(transfer.quantity, 30);

    // destination lot filled and valid
    let filled = destination_lots(&state, destination).await;
    assert_eq!(filled.len(), 1);
    assert_eq!(filled[0].status, LotStatus::Valid.as_str());
    assert_eq!(filled[0].quantity, 30);
    assert_eq!(filled[0].remaining_quantity, 30);

    // destination counter auto-created on first receipt
    assert_eq!(
        state
            .services
            .levels
            .quantity_on_hand(VACCINE, destination)
            .await
            .unwrap(),
        Some(30)
    );

    // the movement record references the consumed source lot
    let (_, lines) = state
        .services
        .transfers
        .find_transfer(transfer.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].lot_id, lot.id);
    assert_eq!(lines[0].quantity, 30);

    // pending rows pruned
    assert_eq!(
        pending_stock_transfer::Entity::find_by_id(pending.id)
            .one(&*state.db)
            .await
            .unwrap(),
        None
    );

    let err = state
        .services
        .transfers
        .confirm_transfer(pending.id)
        .await
        .unwrap_err();
    assert_matches!(err, StockError::NotFound(_));
}

#[tokio::test]
async fn confirmed_transfer_of_stale_lot_arrives_expired() {
    let state = common::setup().await;
    let source = StockOwner::district(1);
    let destination = StockOwner::health_center(2);

    state
        .services
        .levels
        .ensure_level(VACCINE, source, 50)
        .await
        .unwrap();
    // valid now, expires today: still consumable until the sweep runs, but
    // it must not arrive VALID at the destination
    common::insert_lot(&state.db, VACCINE, source, 50, 50, 0, LotStatus::Valid).await;

    let pending = state
        .services
        .transfers
        .initiate_transfer(VACCINE, source, destination, 20)
        .await
        .unwrap();
    state
        .services
        .transfers
        .confirm_transfer(pending.id)
        .await
        .unwrap();

    let arrived = destination_lots(&state, destination).await;
    assert_eq!(arrived.len(), 1);
    assert_eq!(arrived[0].status, LotStatus::Expired.as_str());
}

#[tokio::test]
async fn initiate_transfer_requires_available_stock() {
    let state = common::setup().await;
    let source = StockOwner::health_center(1);

    state
        .services
        .lots
        .create_lot(CreateLotInput::new(
            VACCINE,
            source,
            10,
            common::iso_date_in(30),
        ))
        .await
        .unwrap();

    let err = state
        .services
        .transfers
        .initiate_transfer(VACCINE, source, StockOwner::health_center(2), 25)
        .await
        .unwrap_err();
    assert_matches!(
        err,
        StockError::InsufficientStock {
            requested: 25,
            available: 10
        }
    );

    let err = state
        .services
        .transfers
        .initiate_transfer(VACCINE, source, StockOwner::health_center(2), 0)
        .await
        .unwrap_err();
    assert_matches!(err, StockError::InvalidQuantity(0));
}

#[tokio::test]
async fn cancel_transfer_restores_source_stock() {
    let state = common::setup().await;
    let source = StockOwner::health_center(1);
    let destination = StockOwner::health_center(2);

    state
        .services
        .levels
        .ensure_level(VACCINE, source, 100)
        .await
        .unwrap();
    let lot = state
        .services
        .lots
        .create_lot(CreateLotInput::new(
            VACCINE,
            source,
            100,
            common::iso_date_in(30),
        ))
        .await
        .unwrap();

    let pending = state
        .services
        .transfers
        .initiate_transfer(VACCINE, source, destination, 30)
        .await
        .unwrap();

    let cancelled = state
        .services
        .transfers
        .cancel_transfer(pending.id)
        .await
        .unwrap();
    assert!(cancelled);

    let reloaded = state.services.lots.get_lot(lot.id).await.unwrap().unwrap();
    assert_eq!(reloaded.remaining_quantity, 100);
    assert_eq!(
        state
            .services
            .levels
            .quantity_on_hand(VACCINE, source)
            .await
            .unwrap(),
        Some(100)
    );
    assert!(destination_lots(&state, destination).await.is_empty());
    assert_eq!(
        pending_stock_transfer::Entity::find_by_id(pending.id)
            .one(&*state.db)
            .await
            .unwrap(),
        None
    );

    // already gone: silent no-op
    let again = state
        .services
        .transfers
        .cancel_transfer(pending.id)
        .await
        .unwrap();
    assert!(!again);

    // the restored stock is usable again today
    let today = Utc::now().date_naive();
    let reloaded = state.services.lots.get_lot(lot.id).await.unwrap().unwrap();
    assert!(reloaded.expiration > today);
}
