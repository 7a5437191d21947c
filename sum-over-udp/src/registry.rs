//! Server-side client registry and request deduplication.
//!
//! The registry maps each client's network address to a [`ClientRecord`]
//! and owns the global [`Aggregate`].  Both sit behind one mutex: deciding
//! whether a request is a duplicate and folding it into the aggregate happen
//! in the same critical section, so concurrent handlers can never apply the
//! same sequence number twice or expose a count without its matching sum.
//!
//! Clients are keyed by full socket address (IP and port), not by IP alone,
//! so two clients on the same host keep separate sequence spaces.
//!
//! The lock is never held across an `.await`; every operation here is
//! synchronous and short.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::aggregate::Aggregate;

/// Per-client state, created on the client's first Discover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientRecord {
    pub address: SocketAddr,
    /// Highest request sequence number applied for this client.  Never
    /// decreases.
    pub highest_seq_seen: u32,
    /// Aggregate sum right after this client's last applied request.
    pub last_known_sum: u64,
}

impl ClientRecord {
    fn new(address: SocketAddr) -> Self {
        Self {
            address,
            highest_seq_seen: 0,
            last_known_sum: 0,
        }
    }
}

/// Result of [`ClientRegistry::register_or_lookup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    pub record: ClientRecord,
    /// `true` if this call created the record.
    pub created: bool,
}

/// Outcome of a request that passed the registration check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Acceptance {
    /// The sequence number was at or below the client's highest seen, so the
    /// aggregate was left untouched.
    pub duplicate: bool,
    /// Aggregate count after this call.
    pub request_count: u32,
    /// Aggregate sum after this call.
    pub total_sum: u64,
}

/// Thread-safe client registry sharing one lock with the aggregate.
#[derive(Clone, Default)]
pub struct ClientRegistry {
    inner: Arc<Mutex<Ledger>>,
}

#[derive(Default)]
struct Ledger {
    clients: HashMap<SocketAddr, ClientRecord>,
    aggregate: Aggregate,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Ledger> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the record for `address`, creating a zeroed one if absent.
    pub fn register_or_lookup(&self, address: SocketAddr) -> Registration {
        let mut ledger = self.lock();
        let mut created = false;
        let record = *ledger.clients.entry(address).or_insert_with(|| {
            created = true;
            ClientRecord::new(address)
        });
        Registration { record, created }
    }

    /// Deduplicate and apply one request.
    ///
    /// Returns `None` when `address` never completed discovery; the request
    /// must then be dropped without a reply.
    pub fn accept_request(&self, address: SocketAddr, seq: u32, value: u32) -> Option<Acceptance> {
        let mut guard = self.lock();
        let ledger = &mut *guard;
        let record = ledger.clients.get_mut(&address)?;

        let duplicate = seq <= record.highest_seq_seen;
        if !duplicate {
            ledger.aggregate.apply(value);
            record.highest_seq_seen = seq;
            record.last_known_sum = ledger.aggregate.total_sum;
        }

        Some(Acceptance {
            duplicate,
            request_count: ledger.aggregate.request_count,
            total_sum: ledger.aggregate.total_sum,
        })
    }

    pub fn lookup(&self, address: SocketAddr) -> Option<ClientRecord> {
        self.lock().clients.get(&address).copied()
    }

    /// Consistent snapshot of the aggregate.
    pub fn aggregate(&self) -> Aggregate {
        self.lock().aggregate
    }

    /// Number of registered clients.
    pub fn len(&self) -> usize {
        self.lock().clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
