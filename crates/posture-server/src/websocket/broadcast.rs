//! Best-effort fan-out of posture updates to observers.

use std::sync::Arc;

use metrics::counter;
use tracing::{debug, warn};

use super::connection::{ClientConnection, DeliveryError, Role};
use super::registry::ConnectionRegistry;
use crate::metrics::{BROADCAST_DELIVERIES_TOTAL, BROADCAST_DROPS_TOTAL, BROADCAST_EVICTIONS_TOTAL};
use crate::protocol::PostureUpdate;

/// Why an observer was evicted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EvictionReason {
    /// Its writer is gone.
    Closed,
    /// It reached the drop budget.
    TooManyDrops {
        /// Drops at eviction time.
        drops: u64,
    },
}

/// Result of one delivery attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Enqueued.
    Delivered,
    /// Queue full; the observer missed this message but stays registered.
    Dropped {
        /// Drops so far for this observer.
        total_drops: u64,
    },
    /// Removed from the registry and signalled to close.
    Evicted {
        /// Reason for eviction.
        reason: EvictionReason,
    },
}

/// Per-observer outcomes of one broadcast, in snapshot order.
#[derive(Clone, Debug, Default)]
pub struct BroadcastReport {
    /// `(connection id, outcome)` pairs.
    pub outcomes: Vec<(String, DeliveryOutcome)>,
}

impl BroadcastReport {
    /// Observers attempted.
    pub fn recipients(&self) -> usize {
        self.outcomes.len()
    }

    /// Observers that got the message.
    pub fn delivered(&self) -> usize {
        self.count(|o| matches!(o, DeliveryOutcome::Delivered))
    }

    /// Observers that missed it on a full queue.
    pub fn dropped(&self) -> usize {
        self.count(|o| matches!(o, DeliveryOutcome::Dropped { .. }))
    }

    /// Observers evicted during this broadcast.
    pub fn evicted(&self) -> usize {
        self.count(|o| matches!(o, DeliveryOutcome::Evicted { .. }))
    }

    /// Outcome for a given connection id.
    pub fn outcome(&self, id: &str) -> Option<&DeliveryOutcome> {
        self.outcomes
            .iter()
            .find(|(conn_id, _)| conn_id == id)
            .map(|(_, outcome)| outcome)
    }

    fn count(&self, pred: impl Fn(&DeliveryOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| pred(o)).count()
    }
}

/// Delivers updates to every registered observer without blocking.
#[derive(Debug)]
pub struct BroadcastFanout {
    registry: Arc<ConnectionRegistry>,
    max_observer_drops: u64,
}

impl BroadcastFanout {
    /// Fan out over `registry`'s observers, evicting any that accumulate
    /// `max_observer_drops` drops.
    pub fn new(registry: Arc<ConnectionRegistry>, max_observer_drops: u64) -> Self {
        Self {
            registry,
            max_observer_drops: max_observer_drops.max(1),
        }
    }

    /// Send `update` to every observer in the current snapshot.
    ///
    /// Never fails from the caller's point of view; per-observer failures
    /// are reported in the returned [`BroadcastReport`].
    pub fn broadcast(&self, update: &PostureUpdate) -> BroadcastReport {
        let json = match serde_json::to_string(update) {
            Ok(j) => Arc::new(j),
            Err(e) => {
                warn!(error = %e, "failed to serialize posture update");
                return BroadcastReport::default();
            }
        };

        let observers = self.registry.snapshot(Role::Observer);
        let mut report = BroadcastReport {
            outcomes: Vec::with_capacity(observers.len()),
        };
        // A member that started teardown after the snapshot is skipped.
        for conn in observers.iter().filter(|c| c.is_open()) {
            let outcome = self.deliver(conn, Arc::clone(&json));
            report.outcomes.push((conn.id().to_string(), outcome));
        }

        debug!(
            posture = %update.posture,
            recipients = report.recipients(),
            delivered = report.delivered(),
            dropped = report.dropped(),
            evicted = report.evicted(),
            "broadcast posture update"
        );
        report
    }

    fn deliver(&self, conn: &ClientConnection, json: Arc<String>) -> DeliveryOutcome {
        match conn.send(json) {
            Ok(()) => {
                counter!(BROADCAST_DELIVERIES_TOTAL).increment(1);
                DeliveryOutcome::Delivered
            }
            Err(DeliveryError::QueueFull) => {
                counter!(BROADCAST_DROPS_TOTAL).increment(1);
                let drops = conn.drop_count();
                if drops >= self.max_observer_drops {
                    warn!(conn_id = conn.id(), drops, "evicting slow observer");
                    self.evict(conn, EvictionReason::TooManyDrops { drops })
                } else {
                    debug!(conn_id = conn.id(), total_drops = drops, "observer queue full, update dropped");
                    DeliveryOutcome::Dropped { total_drops: drops }
                }
            }
            Err(DeliveryError::Closed | DeliveryError::Encode(_)) => {
                debug!(conn_id = conn.id(), "observer writer gone, evicting");
                self.evict(conn, EvictionReason::Closed)
            }
        }
    }

    fn evict(&self, conn: &ClientConnection, reason: EvictionReason) -> DeliveryOutcome {
        let _ = self.registry.unregister(conn.id(), Role::Observer);
        conn.evict();
        counter!(BROADCAST_EVICTIONS_TOTAL).increment(1);
        DeliveryOutcome::Evicted { reason }
    }
}
