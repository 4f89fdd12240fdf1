//! Signal/slot system for Horizon Grid.
//!
//! Models, headers and sort descriptions announce their changes through
//! [`Signal`]s. Connected slots (callbacks) are invoked synchronously, in
//! connection order, on the thread that emits.
//!
//! # Key Types
//!
//! - [`Signal<Args>`] - The main signal type for emitting notifications
//! - [`ConnectionId`] - Unique identifier returned when connecting a slot
//! - [`ConnectionSet`] - Owned group of connections that disconnects on drop
//!
//! # Re-entrancy
//!
//! The connection table is snapshotted before slots run and the lock is
//! released, so a slot may connect, disconnect, or emit again (even on the
//! same signal) without deadlocking. A slot disconnected during an emit
//! still receives that emit.
//!
//! # Example
//!
//! ```
//! use horizon_grid_core::Signal;
//!
//! let rows_inserted = Signal::<(usize, usize)>::new();
//!
//! let id = rows_inserted.connect(|&(row, count)| {
//!     println!("{count} rows inserted at {row}");
//! });
//!
//! rows_inserted.emit((3, 2));
//! rows_inserted.disconnect(id);
//! ```

use std::sync::Arc;
use std::sync::Weak;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

use crate::logging::targets;

new_key_type! {
    /// A unique identifier for a signal-slot connection.
    ///
    /// Use this ID to disconnect a specific connection via [`Signal::disconnect`].
    /// The ID remains valid until the connection is explicitly disconnected or
    /// the signal is dropped.
    pub struct ConnectionId;
}

type Slot<Args> = Arc<dyn Fn(&Args) + Send + Sync>;

/// A type-safe signal that can have multiple connected slots.
///
/// # Type Parameter
///
/// - `Args`: The argument type passed to connected slots. Use `()` for signals
///   with no arguments, or a tuple like `(usize, usize)` for several.
pub struct Signal<Args> {
    /// All active connections.
    connections: Mutex<SlotMap<ConnectionId, Slot<Args>>>,
    /// Whether signal emission is temporarily blocked.
    blocked: AtomicBool,
}

impl<Args: 'static> Default for Signal<Args> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Args: 'static> std::fmt::Debug for Signal<Args> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("connections", &self.connection_count())
            .field("blocked", &self.is_blocked())
            .finish()
    }
}

impl<Args: 'static> Signal<Args> {
    /// Create a new signal with no connections.
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(SlotMap::with_key()),
            blocked: AtomicBool::new(false),
        }
    }

    /// Connect a slot (closure) to this signal.
    ///
    /// Returns a `ConnectionId` that can be used to disconnect the slot later.
    pub fn connect<F>(&self, slot: F) -> ConnectionId
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        self.connections.lock().insert(Arc::new(slot))
    }

    /// Disconnect a specific slot by its connection ID.
    ///
    /// Returns `true` if the connection was found and removed, `false` otherwise.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        self.connections.lock().remove(id).is_some()
    }

    /// Disconnect all slots from this signal.
    pub fn disconnect_all(&self) {
        self.connections.lock().clear();
    }

    /// Get the number of connected slots.
    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Block signal emission temporarily.
    ///
    /// While blocked, calls to `emit()` do nothing.
    pub fn set_blocked(&self, blocked: bool) {
        self.blocked.store(blocked, Ordering::SeqCst);
    }

    /// Check if signal emission is currently blocked.
    pub fn is_blocked(&self) -> bool {
        self.blocked.load(Ordering::SeqCst)
    }

    /// Emit the signal, invoking all connected slots in connection order.
    #[tracing::instrument(skip_all, target = "horizon_grid_core::signal", level = "trace")]
    pub fn emit(&self, args: Args) {
        if self.is_blocked() {
            tracing::trace!(target: targets::SIGNAL, "signal blocked, skipping emit");
            return;
        }

        let slots: Vec<Slot<Args>> = self.connections.lock().values().cloned().collect();
        tracing::trace!(target: targets::SIGNAL, connection_count = slots.len(), "emitting signal");

        for slot in slots {
            slot(&args);
        }
    }
}

impl<Args: Send + Sync + 'static> Signal<Args> {
    /// Connect a slot whose disconnection is owned by a [`ConnectionSet`].
    ///
    /// The set only holds a weak reference to the signal, so dropping the
    /// signal first is harmless.
    pub fn connect_in<F>(self: &Arc<Self>, set: &mut ConnectionSet, slot: F) -> ConnectionId
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        let id = self.connect(slot);
        let weak: Weak<Self> = Arc::downgrade(self);
        set.push(move || {
            if let Some(signal) = weak.upgrade() {
                signal.disconnect(id);
            }
        });
        id
    }
}

/// A group of connections that are disconnected together when the set is
/// dropped (or [`clear`](Self::clear)ed).
///
/// Components that observe collaborators they do not own keep one of these
/// so their slots never outlive them.
#[derive(Default)]
pub struct ConnectionSet {
    disconnectors: Vec<Box<dyn FnOnce() + Send + Sync>>,
}

impl ConnectionSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a disconnect action.
    pub fn push<F>(&mut self, disconnect: F)
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        self.disconnectors.push(Box::new(disconnect));
    }

    /// Number of connections held.
    pub fn len(&self) -> usize {
        self.disconnectors.len()
    }

    /// Whether the set holds no connections.
    pub fn is_empty(&self) -> bool {
        self.disconnectors.is_empty()
    }

    /// Disconnect everything now.
    pub fn clear(&mut self) {
        for disconnect in self.disconnectors.drain(..) {
            disconnect();
        }
    }
}

impl std::fmt::Debug for ConnectionSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSet").field("len", &self.len()).finish()
    }
}

impl Drop for ConnectionSet {
    fn drop(&mut self) {
        self.clear();
    }
}

static_assertions::assert_impl_all!(Signal<(usize, usize)>: Send, Sync);
static_assertions::assert_impl_all!(ConnectionSet: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_signal_connect_emit() {
        let signal = Signal::<i32>::new();
        let received = Arc::new(Mutex::new(Vec::new()));

        let received_clone = received.clone();
        signal.connect(move |&value| {
            received_clone.lock().push(value);
        });

        signal.emit(42);
        signal.emit(100);

        assert_eq!(*received.lock(), vec![42, 100]);
    }

    #[test]
    fn test_signal_disconnect() {
        let signal = Signal::<i32>::new();
        let received = Arc::new(Mutex::new(Vec::new()));

        let received_clone = received.clone();
        let conn_id = signal.connect(move |&value| {
            received_clone.lock().push(value);
        });

        signal.emit(1);
        assert!(signal.disconnect(conn_id));
        assert!(!signal.disconnect(conn_id));
        signal.emit(2);

        assert_eq!(*received.lock(), vec![1]);
    }

    #[test]
    fn test_signal_blocked() {
        let signal = Signal::<i32>::new();
        let received = Arc::new(Mutex::new(Vec::new()));

        let received_clone = received.clone();
        signal.connect(move |&value| {
            received_clone.lock().push(value);
        });

        signal.emit(1);
        signal.set_blocked(true);
        signal.emit(2);
        signal.set_blocked(false);
        signal.emit(3);

        assert_eq!(*received.lock(), vec![1, 3]);
    }

    #[test]
    fn test_slots_run_in_connection_order() {
        let signal = Signal::<()>::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for n in 0..3 {
            let order = order.clone();
            signal.connect(move |_| order.lock().push(n));
        }

        assert_eq!(signal.connection_count(), 3);
        signal.emit(());
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_disconnect_all() {
        let signal = Signal::<()>::new();
        for _ in 0..5 {
            signal.connect(|_| {});
        }
        assert_eq!(signal.connection_count(), 5);
        signal.disconnect_all();
        assert_eq!(signal.connection_count(), 0);
    }

    #[test]
    fn test_reentrant_emit_and_disconnect() {
        let signal = Arc::new(Signal::<u32>::new());
        let received = Arc::new(Mutex::new(Vec::new()));

        let inner = signal.clone();
        let received_clone = received.clone();
        signal.connect(move |&depth| {
            received_clone.lock().push(depth);
            if depth < 2 {
                inner.emit(depth + 1);
            }
        });

        let inner = signal.clone();
        let self_id = Arc::new(Mutex::new(None));
        let self_id_clone = self_id.clone();
        let id = signal.connect(move |_| {
            if let Some(id) = self_id_clone.lock().take() {
                inner.disconnect(id);
            }
        });
        *self_id.lock() = Some(id);

        signal.emit(0);
        assert_eq!(*received.lock(), vec![0, 1, 2]);
        assert_eq!(signal.connection_count(), 1);
    }

    #[test]
    fn test_connection_set_disconnects_on_drop() {
        let signal = Arc::new(Signal::<i32>::new());
        let received = Arc::new(Mutex::new(Vec::new()));

        {
            let mut set = ConnectionSet::new();
            let received_clone = received.clone();
            signal.connect_in(&mut set, move |&value| received_clone.lock().push(value));
            assert_eq!(set.len(), 1);
            signal.emit(1);
        }

        signal.emit(2);
        assert_eq!(*received.lock(), vec![1]);
        assert_eq!(signal.connection_count(), 0);
    }

    #[test]
    fn test_connection_set_outlives_signal() {
        let mut set = ConnectionSet::new();
        {
            let signal = Arc::new(Signal::<()>::new());
            signal.connect_in(&mut set, |_| {});
        }
        set.clear();
        assert!(set.is_empty());
    }

    #[test]
    fn test_emit_from_multiple_threads() {
        let signal = Arc::new(Signal::<usize>::new());
        let total = Arc::new(Mutex::new(0usize));

        let total_clone = total.clone();
        signal.connect(move |&n| *total_clone.lock() += n);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let signal = signal.clone();
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        signal.emit(1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(*total.lock(), 40);
    }
}
