//! Membership sets for the two connection roles.
//!
//! Each role has its own lock-guarded list kept in registration order.
//! Broadcasts iterate a [`snapshot`](ConnectionRegistry::snapshot) copied
//! under the read lock, so concurrent register/unregister never tears an
//! iteration and no member is visited twice.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use super::connection::{ClientConnection, Role};

/// Current senders and observers.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    senders: RwLock<Vec<Arc<ClientConnection>>>,
    observers: RwLock<Vec<Arc<ClientConnection>>>,
}

impl ConnectionRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn members(&self, role: Role) -> &RwLock<Vec<Arc<ClientConnection>>> {
        match role {
            Role::Sender => &self.senders,
            Role::Observer => &self.observers,
        }
    }

    /// Add `conn` to the set for its role.
    ///
    /// Refused (returns `false`) if the connection is no longer open or is
    /// already a member.
    pub fn register(&self, conn: Arc<ClientConnection>) -> bool {
        let mut members = self.members(conn.role()).write();
        if !conn.is_open() || members.iter().any(|c| c.id() == conn.id()) {
            return false;
        }
        debug!(conn_id = conn.id(), role = %conn.role(), "registered");
        members.push(conn);
        true
    }

    /// Remove the member with `id`. A non-member is a no-op.
    pub fn unregister(&self, id: &str, role: Role) -> Option<Arc<ClientConnection>> {
        let mut members = self.members(role).write();
        let index = members.iter().position(|c| c.id() == id)?;
        let removed = members.remove(index);
        debug!(conn_id = id, %role, "unregistered");
        Some(removed)
    }

    /// Point-in-time copy of the members of `role`, in registration order.
    pub fn snapshot(&self, role: Role) -> Vec<Arc<ClientConnection>> {
        self.members(role).read().clone()
    }

    /// Whether `id` is a member of `role`.
    pub fn contains(&self, id: &str, role: Role) -> bool {
        self.members(role).read().iter().any(|c| c.id() == id)
    }

    /// Number of members of `role`.
    pub fn count(&self, role: Role) -> usize {
        self.members(role).read().len()
    }

    /// Members of both roles.
    pub fn total(&self) -> usize {
        self.count(Role::Sender) + self.count(Role::Observer)
    }

    /// Register `conn` and return a guard that unregisters it when dropped.
    pub fn enroll(self: &Arc<Self>, conn: &Arc<ClientConnection>) -> Option<RegistrationGuard> {
        self.register(Arc::clone(conn)).then(|| RegistrationGuard {
            registry: Arc::clone(self),
            conn: Arc::clone(conn),
            released: false,
        })
    }
}

/// Scoped registry membership.
///
/// [`release`](Self::release) moves the connection to Closing and removes it
/// from the registry as soon as teardown starts. Dropping the guard (normal
/// return, error, panic unwind or task abort) releases if that has not
/// happened yet and marks the connection Closed.
#[derive(Debug)]
pub struct RegistrationGuard {
    registry: Arc<ConnectionRegistry>,
    conn: Arc<ClientConnection>,
    released: bool,
}

impl RegistrationGuard {
    /// The guarded connection.
    pub fn connection(&self) -> &Arc<ClientConnection> {
        &self.conn
    }

    /// Begin teardown: leave Open and unregister. Idempotent.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let _ = self.conn.begin_close();
        let _ = self.registry.unregister(self.conn.id(), self.conn.role());
    }
}

impl Drop for RegistrationGuard {
    fn drop(&mut self) {
        self.release();
        self.conn.mark_closed();
    }
}
