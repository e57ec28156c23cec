//! Core deposit tests: owed/credited state machine, refund line generation,
//! and the double-count guards around the core aggregate.

mod common;

use assert_matches::assert_matches;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use common::TestShop;
use shopcore::models::{CoreStatus, LineKind};
use shopcore::ServiceError;

#[test]
fn core_state_is_stamped_at_line_creation() {
    let shop = TestShop::new();
    let alternator = shop.seed_core_part("ALT", dec!(180), dec!(35), 4);
    let plain = shop.seed_part("BELT", dec!(20), 10);
    let wo = shop.work_order();

    let core_line = shop
        .engine
        .orders
        .add_part_line(wo.id, alternator.id, 1, None)
        .unwrap();
    assert_eq!(core_line.core_status, CoreStatus::CoreOwed);
    assert_eq!(core_line.core_charge, dec!(35));

    let plain_line = shop
        .engine
        .orders
        .add_part_line(wo.id, plain.id, 1, None)
        .unwrap();
    assert_eq!(plain_line.core_status, CoreStatus::NotApplicable);
    assert_eq!(plain_line.core_charge, Decimal::ZERO);
}

#[test]
fn owed_cores_bill_into_the_order_total() {
    let shop = TestShop::new();
    let starter = shop.seed_core_part("STR", dec!(100), dec!(25), 5);
    let wo = shop.work_order();
    shop.engine
        .orders
        .add_part_line(wo.id, starter.id, 2, None)
        .unwrap();

    let order = shop.engine.orders.get_order(wo.id).unwrap();
    assert_eq!(order.parts_subtotal, dec!(200));
    assert_eq!(order.core_charges_total, dec!(50));
    assert_eq!(order.total, dec!(250));
}

#[test]
fn returning_a_core_credits_exactly_once() {
    let shop = TestShop::new();
    let starter = shop.seed_core_part("STR", dec!(100), dec!(25), 5);
    let wo = shop.work_order();
    let line = shop
        .engine
        .orders
        .add_part_line(wo.id, starter.id, 2, None)
        .unwrap();

    let refund = shop.engine.cores.mark_core_returned(line.id).unwrap();
    assert_eq!(refund.unit_price, dec!(-25));
    assert_eq!(refund.quantity, 2);
    assert_eq!(refund.line_total, dec!(-50));
    assert!(refund.description.contains("Core Refund"));
    assert_matches!(refund.kind, LineKind::CoreRefund { parent_line_id } if parent_line_id == line.id);

    let lines = shop.engine.orders.part_lines(wo.id);
    assert_eq!(lines.len(), 2);
    let parent = lines.iter().find(|l| l.id == line.id).unwrap();
    assert_eq!(parent.core_status, CoreStatus::CoreCredited);
    assert!(parent.core_returned_at.is_some());

    // Deposit charged, then refunded: the order nets back to parts only,
    // and the outstanding-core aggregate is empty.
    let order = shop.engine.orders.get_order(wo.id).unwrap();
    assert_eq!(order.core_charges_total, Decimal::ZERO);
    assert_eq!(order.parts_subtotal, dec!(150));
    assert_eq!(order.total, dec!(150));

    let err = shop.engine.cores.mark_core_returned(line.id).unwrap_err();
    assert_matches!(err, ServiceError::CoreAlreadyProcessed(id) if id == line.id);
    assert_eq!(shop.engine.orders.part_lines(wo.id).len(), 2);
}

#[test]
fn lines_without_cores_cannot_be_returned() {
    let shop = TestShop::new();
    let belt = shop.seed_part("BELT", dec!(20), 10);
    let wo = shop.work_order();
    let line = shop
        .engine
        .orders
        .add_part_line(wo.id, belt.id, 1, None)
        .unwrap();

    assert_matches!(
        shop.engine.cores.mark_core_returned(line.id),
        Err(ServiceError::InvalidInput(_))
    );
}

#[test]
fn refund_lines_are_inert() {
    let shop = TestShop::new();
    let starter = shop.seed_core_part("STR", dec!(100), dec!(25), 5);
    let wo = shop.work_order();
    let line = shop
        .engine
        .orders
        .add_part_line(wo.id, starter.id, 1, None)
        .unwrap();
    let refund = shop.engine.cores.mark_core_returned(line.id).unwrap();

    assert_matches!(
        shop.engine.cores.mark_core_returned(refund.id),
        Err(ServiceError::InvalidInput(_))
    );
    assert_matches!(
        shop.engine.orders.update_part_qty(refund.id, 2),
        Err(ServiceError::InvalidInput(_))
    );
    assert_matches!(
        shop.engine.orders.remove_part_line(refund.id),
        Err(ServiceError::InvalidInput(_))
    );
    assert_matches!(
        shop.engine.orders.toggle_warranty(refund.id),
        Err(ServiceError::InvalidInput(_))
    );
    assert_matches!(
        shop.engine.orders.update_line_unit_price(refund.id, dec!(1)),
        Err(ServiceError::InvalidInput(_))
    );

    // The credited parent is pinned too, so the pair stays consistent.
    assert_matches!(
        shop.engine.orders.remove_part_line(line.id),
        Err(ServiceError::InvalidInput(_))
    );
}

#[test]
fn credited_parents_keep_their_quantity_pinned_to_the_refund() {
    let shop = TestShop::new();
    let starter = shop.seed_core_part("STR", dec!(100), dec!(25), 10);
    let wo = shop.work_order();
    let line = shop
        .engine
        .orders
        .add_part_line(wo.id, starter.id, 2, None)
        .unwrap();
    let refund = shop.engine.cores.mark_core_returned(line.id).unwrap();

    // Resizing the credited parent would desync it from its refund line.
    assert_matches!(
        shop.engine.orders.update_part_qty(line.id, 5),
        Err(ServiceError::InvalidInput(_))
    );

    // Adding the part again starts a fresh line with its own deposit
    // instead of merging into the credited one.
    let fresh = shop
        .engine
        .orders
        .add_part_line(wo.id, starter.id, 3, None)
        .unwrap();
    assert_ne!(fresh.id, line.id);
    assert_eq!(fresh.quantity, 3);
    assert_eq!(fresh.core_status, CoreStatus::CoreOwed);
    assert_eq!(fresh.core_charge, dec!(25));

    let lines = shop.engine.orders.part_lines(wo.id);
    let parent = lines.iter().find(|l| l.id == line.id).unwrap();
    assert_eq!(parent.quantity, refund.quantity);

    // Only the fresh line's deposit is outstanding.
    let order = shop.engine.orders.get_order(wo.id).unwrap();
    assert_eq!(order.core_charges_total, dec!(75));
}

#[test]
fn core_returns_are_rejected_on_locked_orders() {
    let shop = TestShop::new();
    let starter = shop.seed_core_part("STR", dec!(100), dec!(25), 5);
    let so = shop.sales_order();
    let line = shop
        .engine
        .orders
        .add_part_line(so.id, starter.id, 1, None)
        .unwrap();
    shop.engine.status.invoice(so.id).unwrap();

    assert_matches!(
        shop.engine.cores.mark_core_returned(line.id),
        Err(ServiceError::LockedOrder(_))
    );
    assert_eq!(shop.engine.orders.part_lines(so.id).len(), 1);
}

#[test]
fn core_returns_have_no_inventory_effect() {
    let shop = TestShop::new();
    let starter = shop.seed_core_part("STR", dec!(100), dec!(25), 5);
    let wo = shop.work_order();
    let line = shop
        .engine
        .orders
        .add_part_line(wo.id, starter.id, 1, None)
        .unwrap();
    assert_eq!(shop.qoh(starter.id), 4);

    shop.engine.cores.mark_core_returned(line.id).unwrap();
    assert_eq!(shop.qoh(starter.id), 4);
    assert_eq!(shop.engine.inventory.movements_for_part(starter.id).len(), 2);
}
