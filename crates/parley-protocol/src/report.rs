use serde::{Deserialize, Serialize};
use std::ops::AddAssign;

/// Outcome counters for one fan-out.
///
/// `attempted` counts connections that were open at check time and had a
/// send issued; `skipped` counts connections found closed before sending.
/// Informational only: failed sends are never retried.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReport {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl DeliveryReport {
    pub fn is_empty(&self) -> bool {
        self.attempted == 0 && self.skipped == 0
    }
}

impl AddAssign for DeliveryReport {
    fn add_assign(&mut self, rhs: Self) {
        self.attempted += rhs.attempted;
        self.delivered += rhs.delivered;
        self.failed += rhs.failed;
        self.skipped += rhs.skipped;
    }
}
