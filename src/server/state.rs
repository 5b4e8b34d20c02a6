use crate::metrics::Metrics;
use crate::pool::AddressPool;

/// Shared admin state, cheaply cloneable.
///
/// `metrics` is `None` when no recorder is installed (tests, embedding), in
/// which case `/metrics` renders an empty body.
#[derive(Clone)]
pub struct AdminState {
    pub pool: AddressPool,
    pub metrics: Option<Metrics>,
}

impl AdminState {
    pub fn new(pool: AddressPool, metrics: Option<Metrics>) -> Self {
        Self { pool, metrics }
    }
}
