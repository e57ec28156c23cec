use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Technician time-clock collaborator. Invoicing a work order closes any
/// open time entry on it; the time clock itself lives outside the engine.
pub trait TimeClock: Send + Sync {
    fn clock_out_open_entries(&self, order_id: Uuid, at: DateTime<Utc>);
}

/// No-op clock for deployments without technician tracking, and for tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTimeClock;

impl TimeClock for NoopTimeClock {
    fn clock_out_open_entries(&self, _order_id: Uuid, _at: DateTime<Utc>) {}
}
