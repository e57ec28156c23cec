//! Totals calculator: a pure, idempotent function of an order's current
//! lines, invoked after every mutation that can change what the customer
//! owes (lines, customer tax attributes, shop tax rate).

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::{ChargeLine, Customer, LaborLine, Order, OrderLine, ShopSettings};
use crate::store::Store;

#[derive(Clone, Debug, PartialEq)]
pub struct OrderTotals {
    pub parts_subtotal: Decimal,
    pub labor_subtotal: Decimal,
    pub charge_subtotal: Decimal,
    pub core_charges_total: Decimal,
    pub tax_rate: Decimal,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
}

/// Tax resolution: exempt customers pay zero; a non-negative per-customer
/// override beats the shop default.
pub fn resolve_tax_rate(customer: Option<&Customer>, settings: &ShopSettings) -> Decimal {
    match customer {
        Some(c) if c.tax_exempt => Decimal::ZERO,
        Some(c) => match c.tax_rate_override {
            Some(rate) if rate >= Decimal::ZERO => rate,
            _ => settings.default_tax_rate,
        },
        None => settings.default_tax_rate,
    }
}

/// Computes totals from the current lines. Order-independent: every term is
/// a sum, so shuffling the inputs cannot change the result.
pub fn compute(
    part_lines: &[&OrderLine],
    labor_lines: &[&LaborLine],
    charge_lines: &[&ChargeLine],
    customer: Option<&Customer>,
    settings: &ShopSettings,
) -> OrderTotals {
    // Warranty lines contribute zero; core refund lines contribute their
    // negative total like any other line.
    let parts_subtotal: Decimal = part_lines.iter().map(|l| l.billable_total()).sum();
    let labor_subtotal: Decimal = labor_lines.iter().map(|l| l.billable_total()).sum();
    let charge_subtotal: Decimal = charge_lines.iter().map(|l| l.total_price).sum();

    // Outstanding deposits only: credited cores and the refund lines
    // themselves are excluded so the deposit is never counted twice.
    let core_charges_total: Decimal = part_lines
        .iter()
        .filter(|l| {
            l.core_charge > Decimal::ZERO
                && l.core_status != crate::models::CoreStatus::CoreCredited
                && !l.is_core_refund()
        })
        .map(|l| l.core_charge * Decimal::from(l.quantity))
        .sum();

    let tax_rate = resolve_tax_rate(customer, settings);
    let subtotal = parts_subtotal + labor_subtotal + charge_subtotal + core_charges_total;
    let tax_amount = (subtotal * tax_rate / Decimal::ONE_HUNDRED).round_dp(2);

    OrderTotals {
        parts_subtotal,
        labor_subtotal,
        charge_subtotal,
        core_charges_total,
        tax_rate,
        subtotal,
        tax_amount,
        total: subtotal + tax_amount,
    }
}

/// Recomputes and stamps totals onto the order.
pub(crate) fn recalculate(store: &mut Store, order_id: Uuid) -> Result<(), ServiceError> {
    let order = store
        .order(order_id)
        .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
    let customer = store.customer(order.customer_id);

    let totals = compute(
        &store.part_lines_for_order(order_id),
        &store.labor_lines_for_order(order_id),
        &store.charge_lines_for_order(order_id),
        customer,
        store.settings(),
    );

    let order = store
        .order_mut(order_id)
        .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
    apply(order, &totals);
    Ok(())
}

fn apply(order: &mut Order, totals: &OrderTotals) {
    order.parts_subtotal = totals.parts_subtotal;
    order.labor_subtotal = totals.labor_subtotal;
    order.charge_subtotal = totals.charge_subtotal;
    order.core_charges_total = totals.core_charges_total;
    order.tax_rate = totals.tax_rate;
    order.subtotal = totals.subtotal;
    order.tax_amount = totals.tax_amount;
    order.total = totals.total;
    order.updated_at = Some(Utc::now());
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use test_case::test_case;

    use crate::models::{CoreStatus, LineKind, NegativeInventoryPolicy};

    fn settings(tax: Decimal) -> ShopSettings {
        ShopSettings {
            default_tax_rate: tax,
            default_labor_rate: dec!(95),
            negative_inventory_policy: NegativeInventoryPolicy::Warn,
        }
    }

    fn line(quantity: i32, unit_price: Decimal) -> OrderLine {
        OrderLine {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            part_id: Uuid::new_v4(),
            description: "part".into(),
            quantity,
            unit_price,
            line_total: unit_price * Decimal::from(quantity),
            is_warranty: false,
            core_charge: Decimal::ZERO,
            core_status: CoreStatus::NotApplicable,
            core_returned_at: None,
            kind: LineKind::Normal,
            job_ref: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn customer(tax_exempt: bool, tax_rate_override: Option<Decimal>) -> Customer {
        Customer {
            id: Uuid::new_v4(),
            name: "c".into(),
            tax_exempt,
            tax_rate_override,
            price_level: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn computing_twice_yields_identical_totals() {
        let l1 = line(3, dec!(10));
        let l2 = line(1, dec!(4.50));
        let lines = vec![&l1, &l2];
        let s = settings(dec!(8.25));

        let first = compute(&lines, &[], &[], None, &s);
        let second = compute(&lines, &[], &[], None, &s);
        assert_eq!(first, second);
    }

    #[test]
    fn warranty_lines_contribute_zero() {
        let mut l = line(3, dec!(10));
        l.is_warranty = true;
        let s = settings(Decimal::ZERO);

        let totals = compute(&[&l], &[], &[], None, &s);
        assert_eq!(totals.parts_subtotal, Decimal::ZERO);
        assert_eq!(totals.total, Decimal::ZERO);
    }

    #[test]
    fn refund_lines_subtract_and_skip_core_aggregate() {
        let mut parent = line(2, dec!(50));
        parent.core_charge = dec!(15);
        parent.core_status = CoreStatus::CoreCredited;
        parent.core_returned_at = Some(Utc::now());

        let mut refund = line(2, dec!(-15));
        refund.kind = LineKind::CoreRefund {
            parent_line_id: parent.id,
        };

        let s = settings(Decimal::ZERO);
        let totals = compute(&[&parent, &refund], &[], &[], None, &s);

        // 2 x 50 - 2 x 15, and no outstanding deposit remains.
        assert_eq!(totals.parts_subtotal, dec!(70));
        assert_eq!(totals.core_charges_total, Decimal::ZERO);
    }

    #[test]
    fn owed_cores_are_charged_per_unit() {
        let mut l = line(3, dec!(20));
        l.core_charge = dec!(10);
        l.core_status = CoreStatus::CoreOwed;

        let s = settings(Decimal::ZERO);
        let totals = compute(&[&l], &[], &[], None, &s);
        assert_eq!(totals.core_charges_total, dec!(30));
        assert_eq!(totals.subtotal, dec!(90));
    }

    #[test_case(false, None => dec!(8.25); "shop default")]
    #[test_case(true, None => Decimal::ZERO; "tax exempt")]
    #[test_case(false, Some(dec!(5)) => dec!(5); "customer override")]
    #[test_case(false, Some(dec!(-1)) => dec!(8.25); "negative override ignored")]
    fn tax_rate_resolution(tax_exempt: bool, tax_rate_override: Option<Decimal>) -> Decimal {
        let c = customer(tax_exempt, tax_rate_override);
        resolve_tax_rate(Some(&c), &settings(dec!(8.25)))
    }

    #[test]
    fn tax_is_applied_to_the_full_subtotal() {
        let l = line(1, dec!(100));
        let labor = LaborLine {
            id: Uuid::new_v4(),
            order_id: l.order_id,
            description: "labor".into(),
            hours: dec!(1),
            rate: dec!(50),
            line_total: dec!(50),
            is_warranty: false,
            created_at: Utc::now(),
            updated_at: None,
        };
        let s = settings(dec!(10));

        let totals = compute(&[&l], &[&labor], &[], None, &s);
        assert_eq!(totals.subtotal, dec!(150));
        assert_eq!(totals.tax_amount, dec!(15));
        assert_eq!(totals.total, dec!(165));
    }
}
