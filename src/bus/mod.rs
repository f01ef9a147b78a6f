//! Inter-task message bus.
//!
//! Each logical endpoint owns exactly one bounded FIFO mailbox; the bus
//! is the registry mapping [`TaskId`] to that mailbox plus the
//! send/receive operations over it.
//!
//! ```text
//! ┌───────────┐ send(env, t)  ┌─────────────────────────────┐
//! │ Sequencer │──────────────▶│  MessageBus                 │
//! └───────────┘               │  TaskId → Mailbox (bounded) │
//! ┌───────────┐ receive(id,t) │                             │
//! │  Worker   │◀──────────────│  FIFO per mailbox           │
//! └───────────┘               └─────────────────────────────┘
//! ```
//!
//! Delivery guarantees: per-mailbox FIFO, no cross-mailbox ordering, no
//! priority between kinds. `send` applies backpressure — a mailbox that
//! stays full for the whole timeout fails the send without enqueuing;
//! the bus never retries on the caller's behalf.
//!
//! The bus is an explicit handle constructed once at process start and
//! passed (as `Arc<MessageBus>`) to every worker and the sequencer.
//! There is no teardown: mailboxes live until power loss or reset.

pub mod envelope;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use log::{error, info, warn};

use crate::error::BusError;
pub use envelope::{BoundedText, Envelope, MsgKind};

// ---------------------------------------------------------------------------
// Task identity
// ---------------------------------------------------------------------------

/// Logical endpoint names. Closed set; each identity maps to at most
/// one mailbox for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TaskId {
    Main = 0,
    Wifi = 1,
    MessageBroker = 2,
    Http = 3,
    NetworkStack = 4,
    OtaUpdater = 5,
    ExternalDevice = 6,
    Display = 7,
    Indicator = 8,
    Input = 9,
}

impl TaskId {
    /// Total number of identities — sizes the registry table.
    pub const COUNT: usize = 10;

    /// Every identity, in registry order.
    pub const ALL: [TaskId; Self::COUNT] = [
        TaskId::Main,
        TaskId::Wifi,
        TaskId::MessageBroker,
        TaskId::Http,
        TaskId::NetworkStack,
        TaskId::OtaUpdater,
        TaskId::ExternalDevice,
        TaskId::Display,
        TaskId::Indicator,
        TaskId::Input,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// Mailbox
// ---------------------------------------------------------------------------

/// Bounded FIFO channel for one endpoint.
///
/// Capacity is chosen at registration and never changes; the backing
/// queue is allocated once and the send path enforces the bound. Both
/// operations block the calling context at most for the supplied
/// timeout.
pub struct Mailbox {
    capacity: usize,
    inner: Mutex<VecDeque<Envelope>>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl Mailbox {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Pending envelope count. Snapshot only — may be stale by return.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Envelope>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, env: Envelope, destination: TaskId, timeout: Duration) -> Result<(), BusError> {
        let deadline = Instant::now() + timeout;
        let mut queue = self.lock();
        while queue.len() >= self.capacity {
            let now = Instant::now();
            if now >= deadline {
                return Err(BusError::Full(destination));
            }
            let (guard, _) = self
                .timed_wait(&self.not_full, queue, deadline - now);
            queue = guard;
        }
        queue.push_back(env);
        drop(queue);
        self.not_empty.notify_one();
        Ok(())
    }

    fn pop(&self, timeout: Duration) -> Result<Envelope, BusError> {
        let deadline = Instant::now() + timeout;
        let mut queue = self.lock();
        loop {
            if let Some(env) = queue.pop_front() {
                drop(queue);
                self.not_full.notify_one();
                return Ok(env);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(BusError::Timeout);
            }
            let (guard, _) = self.timed_wait(&self.not_empty, queue, deadline - now);
            queue = guard;
        }
    }

    fn timed_wait<'a>(
        &self,
        cv: &Condvar,
        guard: std::sync::MutexGuard<'a, VecDeque<Envelope>>,
        remaining: Duration,
    ) -> (
        std::sync::MutexGuard<'a, VecDeque<Envelope>>,
        std::sync::WaitTimeoutResult,
    ) {
        cv.wait_timeout(guard, remaining)
            .unwrap_or_else(PoisonError::into_inner)
    }
}

// ---------------------------------------------------------------------------
// Message bus
// ---------------------------------------------------------------------------

/// The registry and send/receive API over all mailboxes.
pub struct MessageBus {
    initialized: AtomicBool,
    registry: Mutex<[Option<Arc<Mailbox>>; TaskId::COUNT]>,
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageBus {
    pub fn new() -> Self {
        Self {
            initialized: AtomicBool::new(false),
            registry: Mutex::new([const { None }; TaskId::COUNT]),
        }
    }

    /// One-time initialization: resets the registry on the first call,
    /// no-op success on every call after.
    pub fn initialize(&self) {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut table = self.registry_lock();
        table.iter_mut().for_each(|slot| *slot = None);
        drop(table);
        info!("message bus initialized");
    }

    /// Register the mailbox for `identity` with the given capacity.
    ///
    /// Idempotent: a second registration for the same identity succeeds
    /// without touching the existing mailbox (its capacity included).
    pub fn register(&self, identity: TaskId, capacity: usize) -> Result<(), BusError> {
        if !self.initialized.load(Ordering::SeqCst) {
            error!("register failed: bus not initialized (identity={identity:?})");
            return Err(BusError::NotInitialized);
        }
        if capacity == 0 {
            error!("register failed: invalid capacity=0 (identity={identity:?})");
            return Err(BusError::InvalidCapacity);
        }

        let mut table = self.registry_lock();
        if table[identity.index()].is_some() {
            warn!("register skipped: {identity:?} already registered");
            return Ok(());
        }
        table[identity.index()] = Some(Arc::new(Mailbox::new(capacity)));
        drop(table);
        info!("mailbox registered: identity={identity:?} capacity={capacity}");
        Ok(())
    }

    /// Enqueue `env` into its destination mailbox, waiting at most
    /// `timeout` for space. A full mailbox fails the send without
    /// enqueuing — retry policy, if any, belongs to the caller.
    pub fn send(&self, env: Envelope, timeout: Duration) -> Result<(), BusError> {
        if !self.initialized.load(Ordering::SeqCst) {
            error!("send failed: bus not initialized");
            return Err(BusError::NotInitialized);
        }
        let destination = env.destination;
        let Some(mailbox) = self.mailbox(destination) else {
            error!(
                "send failed: destination mailbox missing (destination={destination:?} kind={:?})",
                env.kind
            );
            return Err(BusError::MailboxMissing(destination));
        };
        mailbox.push(env, destination, timeout).inspect_err(|_| {
            error!("send failed: mailbox full for whole timeout (destination={destination:?})");
        })
    }

    /// Dequeue the oldest envelope addressed to `identity`, waiting at
    /// most `timeout` for one to arrive.
    pub fn receive(&self, identity: TaskId, timeout: Duration) -> Result<Envelope, BusError> {
        if !self.initialized.load(Ordering::SeqCst) {
            error!("receive failed: bus not initialized");
            return Err(BusError::NotInitialized);
        }
        let Some(mailbox) = self.mailbox(identity) else {
            error!("receive failed: mailbox missing (identity={identity:?})");
            return Err(BusError::MailboxMissing(identity));
        };
        mailbox.pop(timeout)
    }

    /// Whether a mailbox exists for `identity`.
    pub fn is_registered(&self, identity: TaskId) -> bool {
        self.mailbox(identity).is_some()
    }

    fn mailbox(&self, identity: TaskId) -> Option<Arc<Mailbox>> {
        self.registry_lock()[identity.index()].clone()
    }

    fn registry_lock(
        &self,
    ) -> std::sync::MutexGuard<'_, [Option<Arc<Mailbox>>; TaskId::COUNT]> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
