//! Synchronous, ordered event publication.
//!
//! Listeners are called in subscription order on the emitting task. The
//! listener list is snapshotted before calling out, so a listener may
//! subscribe or unsubscribe without deadlocking.

use crate::extractor::IdentifierSource;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tenantable_models::Tenant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

static LISTENER_ID: AtomicU64 = AtomicU64::new(1);

fn next_listener_id() -> ListenerId {
    ListenerId(LISTENER_ID.fetch_add(1, Ordering::Relaxed))
}

/// Identifier that matched nothing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unresolved {
    pub identifier: String,
    pub source: IdentifierSource,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TenantEvent {
    TenantResolved(Tenant),
    TenantNotResolved(Unresolved),
    SetActiveTenant(Tenant),
}

impl TenantEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::TenantResolved(_) => "tenant.resolved",
            Self::TenantNotResolved(_) => "tenant.not_resolved",
            Self::SetActiveTenant(_) => "tenant.activated",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleEvent {
    /// A command re-run in bulk mode raised an error
    Exception {
        command: String,
        tenant: String,
        message: String,
    },
}

pub type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

pub struct Dispatcher<E> {
    listeners: Arc<RwLock<Vec<(ListenerId, Listener<E>)>>>,
}

// Manual impls: `E` itself need not be Clone or Default.
impl<E> Clone for Dispatcher<E> {
    fn clone(&self) -> Self {
        Self {
            listeners: self.listeners.clone(),
        }
    }
}

impl<E> Default for Dispatcher<E> {
    fn default() -> Self {
        Self {
            listeners: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl<E> std::fmt::Debug for Dispatcher<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("listeners", &self.len())
            .finish()
    }
}

impl<E> Dispatcher<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = next_listener_id();
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        before != listeners.len()
    }

    pub fn len(&self) -> usize {
        self.listeners.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver `event` to every listener, in subscription order.
    pub fn emit(&self, event: &E) {
        let snapshot: Vec<Listener<E>> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        for listener in snapshot {
            listener(event);
        }
    }
}

/// Resolution events (`TenantResolved`, `TenantNotResolved`, `SetActiveTenant`)
pub type EventBus = Dispatcher<TenantEvent>;

/// Console lifecycle events
pub type ConsoleDispatcher = Dispatcher<ConsoleEvent>;
