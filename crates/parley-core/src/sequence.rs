use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{ParleyError, Result};

/// 2024-01-01T00:00:00Z in Unix milliseconds.
pub const EPOCH_MS: u64 = 1_704_067_200_000;

const WORKER_BITS: u32 = 10;
const SEQUENCE_BITS: u32 = 12;

pub const MAX_WORKER_ID: u16 = (1 << WORKER_BITS) - 1;
const SEQUENCE_MASK: u64 = (1 << SEQUENCE_BITS) - 1;
const WORKER_SHIFT: u32 = SEQUENCE_BITS;
const TIMESTAMP_SHIFT: u32 = SEQUENCE_BITS + WORKER_BITS;

/// Snowflake-style message id generator.
///
/// Layout, high to low: 41 bits of milliseconds since [`EPOCH_MS`], 10 bits of
/// worker id, 12 bits of per-millisecond sequence. Ids from one instance are
/// strictly increasing for its whole lifetime: if the wall clock stalls or
/// steps backwards the generator keeps counting from the last issued id, and
/// when a millisecond's sequence space is exhausted it borrows the next
/// millisecond rather than waiting for the clock.
#[derive(Debug)]
pub struct SequenceGenerator {
    worker_id: u16,
    last: AtomicU64,
}

impl SequenceGenerator {
    pub fn new(worker_id: u16) -> Result<Self> {
        if worker_id > MAX_WORKER_ID {
            return Err(ParleyError::InvalidWorkerId {
                id: worker_id,
                max: MAX_WORKER_ID,
            });
        }
        Ok(Self {
            worker_id,
            last: AtomicU64::new(0),
        })
    }

    pub fn worker_id(&self) -> u16 {
        self.worker_id
    }

    /// Next unique id. Lock-free; safe from any number of threads.
    pub fn next_id(&self) -> u64 {
        self.next_id_at(now_ms())
    }

    pub(crate) fn next_id_at(&self, now_ms: u64) -> u64 {
        let mut last = self.last.load(Ordering::Acquire);
        loop {
            let next = self.successor(last, now_ms);
            match self
                .last
                .compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return next,
                Err(actual) => last = actual,
            }
        }
    }

    fn successor(&self, last: u64, now_ms: u64) -> u64 {
        let fresh = self.compose(now_ms.saturating_sub(EPOCH_MS), 0);
        if fresh > last {
            return fresh;
        }
        let (timestamp, _, sequence) = decompose(last);
        if sequence < SEQUENCE_MASK {
            last + 1
        } else {
            self.compose(timestamp + 1, 0)
        }
    }

    fn compose(&self, timestamp: u64, sequence: u64) -> u64 {
        (timestamp << TIMESTAMP_SHIFT) | ((self.worker_id as u64) << WORKER_SHIFT) | sequence
    }
}

/// Split an id into `(ms since EPOCH_MS, worker id, sequence)`.
pub fn decompose(id: u64) -> (u64, u16, u64) {
    let timestamp = id >> TIMESTAMP_SHIFT;
    let worker = ((id >> WORKER_SHIFT) & MAX_WORKER_ID as u64) as u16;
    (timestamp, worker, id & SEQUENCE_MASK)
}

fn now_ms() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}
