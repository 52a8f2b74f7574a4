//! Cascade deletion tests: child-before-parent ordering, counter reversal,
//! dependent-row cleanup, and pending-transfer pruning.

mod common;

use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use vaxstock::entities::{
    pending_stock_transfer, pending_stock_transfer_lot, stock_lot, stock_transfer_line,
};
use vaxstock::{CreateLotInput, LotAllocation, ReserveDoseInput, StockOwner};

const VACCINE: i64 = 10;

#[tokio::test]
async fn cascade_deletes_children_before_parents_and_reverses_counters() {
    let state = common::setup().await;
    let owner = StockOwner::health_center(1);

    state
        .services
        .levels
        .ensure_level(VACCINE, owner, 100)
        .await
        .unwrap();
    let parent = state
        .services
        .lots
        .create_lot(CreateLotInput::new(
            VACCINE,
            owner,
            40,
            common::iso_date_in(30),
        ))
        .await
        .unwrap();
    let mut child_input = CreateLotInput::new(VACCINE, owner, 10, common::iso_date_in(30));
    child_input.source_lot_id = Some(parent.id);
    let child = state.services.lots.create_lot(child_input).await.unwrap();

    let deleted = state
        .services
        .cascade
        .delete_lot_cascade(parent.id)
        .await
        .unwrap();
    assert_eq!(deleted, vec![child.id, parent.id]);

    assert_eq!(state.services.lots.get_lot(parent.id).await.unwrap(), None);
    assert_eq!(state.services.lots.get_lot(child.id).await.unwrap(), None);

    // 100 - 40 - 10 remaining doses reversed
    assert_eq!(
        state
            .services
            .levels
            .quantity_on_hand(VACCINE, owner)
            .await
            .unwrap(),
        Some(50)
    );
}

#[tokio::test]
async fn cascade_on_missing_lot_returns_empty() {
    let state = common::setup().await;

    let deleted = state
        .services
        .cascade
        .delete_lot_cascade(424242)
        .await
        .unwrap();
    assert!(deleted.is_empty());
}

#[tokio::test]
async fn cascade_deletes_reservations_and_transfer_lines() {
    let state = common::setup().await;
    let owner = StockOwner::health_center(1);

    state
        .services
        .levels
        .ensure_level(VACCINE, owner, 100)
        .await
        .unwrap();
    let lot = state
        .services
        .lots
        .create_lot(CreateLotInput::new(
            VACCINE,
            owner,
            50,
            common::iso_date_in(30),
        ))
        .await
        .unwrap();

    state
        .services
        .reservations
        .reserve_for_schedule(ReserveDoseInput::single(VACCINE, 1), 31)
        .await
        .unwrap();

    let transfer = state
        .services
        .transfers
        .record_transfer(
            VACCINE,
            owner,
            StockOwner::district(2),
            &[LotAllocation {
                lot_id: lot.id,
                quantity: 5,
                expiration: lot.expiration,
                status: vaxstock::LotStatus::Valid,
            }],
        )
        .await
        .unwrap()
        .unwrap();

    let deleted = state
        .services
        .cascade
        .delete_lot_cascade(lot.id)
        .await
        .unwrap();
    assert_eq!(deleted, vec![lot.id]);

    // reservation and transfer-line rows are gone, the immutable transfer
    // header stays
    assert!(state
        .services
        .reservations
        .reservations_for_lot(lot.id)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(
        stock_transfer_line::Entity::find()
            .filter(stock_transfer_line::Column::LotId.eq(lot.id))
            .count(&*state.db)
            .await
            .unwrap(),
        0
    );
    assert!(state
        .services
        .transfers
        .find_transfer(transfer.id)
        .await
        .unwrap()
        .is_some());

    // counter: 100 - 1 reserved, then - 49 remaining at deletion
    assert_eq!(
        state
            .services
            .levels
            .quantity_on_hand(VACCINE, owner)
            .await
            .unwrap(),
        Some(50)
    );
}

#[tokio::test]
async fn cascade_prunes_pending_transfer_with_no_other_lines() {
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

    // deleting the source sweeps up the in-flight destination lot and the
    // now-orphaned pending transfer
    let deleted = state
        .services
        .cascade
        .delete_lot_cascade(lot.id)
        .await
        .unwrap();
    assert_eq!(deleted.len(), 2);
    assert_eq!(deleted[1], lot.id);

    assert_eq!(
        pending_stock_transfer::Entity::find_by_id(pending.id)
            .one(&*state.db)
            .await
            .unwrap(),
        None
    );
    assert_eq!(
        pending_stock_transfer_lot::Entity::find()
            .filter(pending_stock_transfer_lot::Column::PendingTransferId.eq(pending.id))
            .count(&*state.db)
            .await
            .unwrap(),
        0
    );
    assert_eq!(
        stock_lot::Entity::find().count(&*state.db).await.unwrap(),
        0
    );

    // initiate debited 30, deletion reversed the remaining 70
    assert_eq!(
        state
            .services
            .levels
            .quantity_on_hand(VACCINE, source)
            .await
            .unwrap(),
        Some(0)
    );
}

#[tokio::test]
async fn cascade_keeps_pending_transfer_with_remaining_lines() {
    let state = common::setup().await;
    let source = StockOwner::health_center(1);
    let destination = StockOwner::health_center(2);

    state
        .services
        .levels
        .ensure_level(VACCINE, source, 50)
        .await
        .unwrap();
    let first = state
        .services
        .lots
        .create_lot(CreateLotInput::new(
            VACCINE,
            source,
            20,
            common::iso_date_in(10),
        ))
        .await
        .unwrap();
    let second = state
        .services
        .lots
        .create_lot(CreateLotInput::new(
            VACCINE,
            source,
            30,
            common::iso_date_in(20),
        ))
        .await
        .unwrap();

    // consumes both source lots, leaving two pending lines
    let pending = state
        .services
        .transfers
        .initiate_transfer(VACCINE, source, destination, 40)
        .await
        .unwrap();
    assert_eq!(
        pending_stock_transfer_lot::Entity::find()
            .filter(pending_stock_transfer_lot::Column::PendingTransferId.eq(pending.id))
            .count(&*state.db)
            .await
            .unwrap(),
        2
    );

    let deleted = state
        .services
        .cascade
        .delete_lot_cascade(first.id)
        .await
        .unwrap();
    assert_eq!(deleted.len(), 2);

    // one line survives, so the pending transfer stays
    assert!(pending_stock_transfer::Entity::find_by_id(pending.id)
        .one(&*state.db)
        .await
        .unwrap()
        .is_some());
    assert_eq!(
        pending_stock_transfer_lot::Entity::find()
            .filter(pending_stock_transfer_lot::Column::PendingTransferId.eq(pending.id))
            .count(&*state.db)
            .await
            .unwrap(),
        1
    );
    assert!(state
        .services
        .lots
        .get_lot(second.id)
        .await
        .unwrap()
        .is_some());
}
