//! The in-flight cancellation table.
//!
//! One table per interceptor instance, keyed by pending-event-name. Entry
//! lifecycle: created when a cancellable operation starts, overwritten
//! (after cancelling the prior holder) by a same-name cancellable operation,
//! removed when the owning operation settles.
//!
//! Entries carry a generation token so a superseded operation's settlement
//! cannot evict the entry its successor now owns.

use flowstate_core::intent::Canceller;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

struct Entry {
    token: u64,
    canceller: Canceller,
}

/// Proof of table ownership handed to the operation that created an entry.
#[derive(Debug)]
pub(crate) struct Lease {
    name: String,
    token: u64,
}

/// Mapping from pending-event-name to the in-flight cancellable operation.
///
/// Mutex-guarded: mutated both from the dispatch path and from settlement
/// tasks.
#[derive(Clone, Default)]
pub(crate) struct InflightTable {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    next_token: Arc<AtomicU64>,
}

impl InflightTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register a cancellable operation under `name`, best-effort-cancelling
    /// any operation currently holding that slot.
    pub(crate) fn begin(&self, name: String, canceller: Canceller) -> Lease {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let previous = {
            let mut entries = self
                .entries
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            entries.insert(name.clone(), Entry { token, canceller })
        };

        // The canceller is arbitrary user code and may re-enter this table,
        // so it must run with the guard released.
        if let Some(previous) = previous {
            tracing::debug!(event = %name, "cancelling superseded in-flight operation");
            metrics::counter!("flowstate.operations.cancelled_previous").increment(1);
            previous.canceller.cancel();
        }

        Lease { name, token }
    }

    /// Remove the entry for a settled operation, but only if it still owns
    /// its slot. A superseded operation settling late must not evict its
    /// successor.
    pub(crate) fn settle(&self, lease: &Lease) {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if entries
            .get(&lease.name)
            .is_some_and(|entry| entry.token == lease.token)
        {
            entries.remove(&lease.name);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counted() -> (Canceller, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let canceller = {
            let count = Arc::clone(&count);
            Canceller::new(move || {
                count.fetch_add(1, Ordering::SeqCst);
            })
        };
        (canceller, count)
    }

    #[test]
    fn begin_cancels_previous_holder_once() {
        let table = InflightTable::new();
        let (first, first_count) = counted();
        let (second, second_count) = counted();

        let _a = table.begin("FETCH_PENDING".to_owned(), first);
        assert_eq!(first_count.load(Ordering::SeqCst), 0);

        let _b = table.begin("FETCH_PENDING".to_owned(), second);
        assert_eq!(first_count.load(Ordering::SeqCst), 1);
        assert_eq!(second_count.load(Ordering::SeqCst), 0);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn distinct_names_do_not_collide() {
        let table = InflightTable::new();
        let (a, a_count) = counted();
        let (b, _) = counted();

        let _a = table.begin("A_PENDING".to_owned(), a);
        let _b = table.begin("B_PENDING".to_owned(), b);

        assert_eq!(a_count.load(Ordering::SeqCst), 0);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn settle_removes_own_entry() {
        let table = InflightTable::new();
        let (canceller, _) = counted();

        let lease = table.begin("FETCH_PENDING".to_owned(), canceller);
        table.settle(&lease);

        assert_eq!(table.len(), 0);
    }

    #[test]
    fn canceller_may_reenter_the_table() {
        let table = InflightTable::new();
        let reentered = Arc::new(AtomicUsize::new(0));

        // Cancellation triggering a follow-up registration on the same table
        // must not deadlock on the entries lock.
        let reentrant = {
            let table = table.clone();
            let reentered = Arc::clone(&reentered);
            Canceller::new(move || {
                reentered.fetch_add(1, Ordering::SeqCst);
                let _ = table.begin("CLEANUP_PENDING".to_owned(), Canceller::new(|| {}));
            })
        };

        let _a = table.begin("FETCH_PENDING".to_owned(), reentrant);
        let (second, _) = counted();
        let _b = table.begin("FETCH_PENDING".to_owned(), second);

        assert_eq!(reentered.load(Ordering::SeqCst), 1);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn superseded_settlement_leaves_successor_entry() {
        let table = InflightTable::new();
        let (first, _) = counted();
        let (second, second_count) = counted();
        let (third, _) = counted();

        let stale = table.begin("FETCH_PENDING".to_owned(), first);
        let _current = table.begin("FETCH_PENDING".to_owned(), second);

        // The cancelled operation settles late; the successor's entry stays.
        table.settle(&stale);
        assert_eq!(table.len(), 1);

        // A third dispatch still cancels the second holder.
        let _next = table.begin("FETCH_PENDING".to_owned(), third);
        assert_eq!(second_count.load(Ordering::SeqCst), 1);
    }
}
