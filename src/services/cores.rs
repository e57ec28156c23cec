//! Core deposit tracker.
//!
//! Parts flagged `core_required` carry a refundable deposit per unit. The
//! deposit is billed while the old unit ("core") is outstanding; when it
//! comes back, the original line is credited exactly once by generating a
//! sibling refund line at the negative deposit price.

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{CoreStatus, LineKind, OrderLine, Part};
use crate::services::totals;
use crate::store::{self, SharedStore};

/// Stamps the initial core state onto a freshly created part line.
pub(crate) fn init_core_state(part: &Part, line: &mut OrderLine) {
    if part.core_applies() {
        line.core_charge = part.core_charge;
        line.core_status = CoreStatus::CoreOwed;
    } else {
        line.core_charge = Decimal::ZERO;
        line.core_status = CoreStatus::NotApplicable;
    }
}

#[derive(Clone)]
pub struct CoreService {
    store: SharedStore,
    event_sender: EventSender,
}

impl CoreService {
    pub fn new(store: SharedStore, event_sender: EventSender) -> Self {
        Self {
            store,
            event_sender,
        }
    }

    /// Records the return of a core against an owed line.
    ///
    /// Transitions the line CORE_OWED → CORE_CREDITED and creates the refund
    /// line: same quantity, unit price of minus the deposit. A second call
    /// for the same line fails with `CoreAlreadyProcessed`.
    #[instrument(skip(self), fields(line_id = %line_id))]
    pub fn mark_core_returned(&self, line_id: Uuid) -> Result<OrderLine, ServiceError> {
        let mut store = store::write(&self.store);

        let line = store
            .part_line(line_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("Line {} not found", line_id)))?;

        if line.is_core_refund() {
            return Err(ServiceError::InvalidInput(
                "Core refund lines cannot themselves be returned".to_string(),
            ));
        }

        let order = store
            .order(line.order_id)
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", line.order_id)))?;
        if order.is_locked() {
            return Err(ServiceError::LockedOrder(format!(
                "{} is {}",
                order.order_number, order.status
            )));
        }

        match line.core_status {
            CoreStatus::CoreOwed => {}
            CoreStatus::CoreCredited => {
                return Err(ServiceError::CoreAlreadyProcessed(line_id));
            }
            CoreStatus::NotApplicable => {
                return Err(ServiceError::InvalidInput(format!(
                    "Line {} has no core charge",
                    line_id
                )));
            }
        }

        let part_description = store
            .part(line.part_id)
            .map(|p| p.description.clone())
            .unwrap_or_else(|| line.description.clone());

        let now = Utc::now();
        let unit_price = -line.core_charge;
        let refund = OrderLine {
            id: Uuid::new_v4(),
            order_id: line.order_id,
            part_id: line.part_id,
            description: format!("Core Refund ({})", part_description),
            quantity: line.quantity,
            unit_price,
            line_total: unit_price * Decimal::from(line.quantity),
            is_warranty: false,
            core_charge: Decimal::ZERO,
            core_status: CoreStatus::NotApplicable,
            core_returned_at: None,
            kind: LineKind::CoreRefund {
                parent_line_id: line_id,
            },
            job_ref: None,
            created_at: now,
            updated_at: None,
        };

        {
            let parent = store
                .part_line_mut(line_id)
                .ok_or_else(|| ServiceError::NotFound(format!("Line {} not found", line_id)))?;
            parent.core_status = CoreStatus::CoreCredited;
            parent.core_returned_at = Some(now);
            parent.updated_at = Some(now);
        }
        store.insert_part_line(refund.clone());
        totals::recalculate(&mut store, line.order_id)?;
        drop(store);

        info!(line_id = %line_id, refund_line_id = %refund.id, "Core returned and refund line issued");
        self.event_sender.emit(Event::CoreReturned {
            line_id,
            refund_line_id: refund.id,
        });

        Ok(refund)
    }
}
