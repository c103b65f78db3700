//! Bounded record of processed command ids.
//!
//! A ring buffer keeps insertion order and a hash index gives O(1)
//! membership. Ids that are mid-flight through the gate are tracked as
//! reservations so two concurrent submissions of one id cannot both pass.

use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

pub const DEFAULT_LEDGER_CAPACITY: usize = 1000;

#[derive(Debug)]
struct LedgerInner {
    order: VecDeque<Uuid>,
    index: HashSet<Uuid>,
    pending: HashSet<Uuid>,
    capacity: usize,
}

impl LedgerInner {
    fn record(&mut self, id: Uuid) {
        if self.capacity == 0 || !self.index.insert(id) {
            return;
        }
        self.order.push_back(id);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.index.remove(&oldest);
            }
        }
    }
}

#[derive(Debug)]
pub struct ProcessedLedger {
    inner: Mutex<LedgerInner>,
}

impl Default for ProcessedLedger {
    fn default() -> Self {
        Self::new(DEFAULT_LEDGER_CAPACITY)
    }
}

impl ProcessedLedger {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(LedgerInner {
                order: VecDeque::with_capacity(capacity),
                index: HashSet::with_capacity(capacity),
                pending: HashSet::new(),
                capacity,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LedgerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Atomically check `id` and reserve it. Returns `None` if the id was
    /// already processed or is currently reserved by another submission.
    pub fn reserve(&self, id: Uuid) -> Option<Reservation<'_>> {
        let mut inner = self.lock();
        if inner.index.contains(&id) || !inner.pending.insert(id) {
            return None;
        }
        Some(Reservation {
            ledger: self,
            id,
            committed: false,
        })
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.lock().index.contains(id)
    }

    pub fn len(&self) -> usize {
        self.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.lock().capacity
    }

    /// Keep only the `max_age` most recent ids and use that as the new
    /// capacity. Zero empties the ledger and disables recording.
    pub fn resize(&self, max_age: usize) {
        let mut inner = self.lock();
        while inner.order.len() > max_age {
            if let Some(oldest) = inner.order.pop_front() {
                inner.index.remove(&oldest);
            }
        }
        inner.capacity = max_age;
    }
}

/// An id held between the duplicate check and the final verdict.
/// Dropping it without [`Reservation::commit`] releases the id.
#[derive(Debug)]
pub struct Reservation<'a> {
    ledger: &'a ProcessedLedger,
    id: Uuid,
    committed: bool,
}

impl Reservation<'_> {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Record the id as processed.
    pub fn commit(mut self) {
        let mut inner = self.ledger.lock();
        inner.pending.remove(&self.id);
        inner.record(self.id);
        self.committed = true;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.ledger.lock().pending.remove(&self.id);
        }
    }
}
