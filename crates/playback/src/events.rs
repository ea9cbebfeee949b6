//! Synchronous event bus for clock and per-cell notifications.
//!
//! # Design
//!
//! [`EventBus`] is a plain observer list in shared, reference-counted storage.
//! [`EventBus::emit`] copies the listener list before iterating, so listeners
//! may subscribe, unsubscribe, or call back into the engine while an event is
//! being delivered.
//!
//! # Failure Modes
//!
//! - **Panicking listener**: caught per listener and logged; the remaining
//!   listeners still receive the event.
//! - **Runaway re-entrancy**: a listener that emits from inside its own
//!   callback nests dispatch. Nesting deeper than [`MAX_DISPATCH_DEPTH`] is
//!   refused with an error log instead of recursing without bound.

use std::cell::{Cell, RefCell};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use pc_common::{CellId, TimeCode};
use serde::Serialize;
use tracing::{error, warn};

/// Deepest nested dispatch allowed before events are refused.
pub const MAX_DISPATCH_DEPTH: usize = 16;

/// Notification broadcast to every listener.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum PlaybackEvent {
    /// Fired once per tick, playing or not.
    FrameUpdate,
    Play,
    Pause,
    SpeedChanged { speed: f64 },
    ReverseToggled { is_reversing: bool },
    LoopToggled { is_looping: bool },
    TimeSet { time: TimeCode },
    CellFrameNext { cell_id: CellId },
    CellFramePrev { cell_id: CellId },
    CellIndependenceChanged { cell_id: CellId, is_independent: bool },
    MeshPlay { cell_id: CellId },
    MeshPause { cell_id: CellId },
    MeshFrameNext { cell_id: CellId },
    MeshFramePrev { cell_id: CellId },
    MeshSpeedChanged { cell_id: CellId, speed: f64 },
    MeshTimeSet { cell_id: CellId, time: TimeCode },
}

impl PlaybackEvent {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FrameUpdate => "frameUpdate",
            Self::Play => "play",
            Self::Pause => "pause",
            Self::SpeedChanged { .. } => "speedChanged",
            Self::ReverseToggled { .. } => "reverseToggled",
            Self::LoopToggled { .. } => "loopToggled",
            Self::TimeSet { .. } => "timeSet",
            Self::CellFrameNext { .. } => "cellFrameNext",
            Self::CellFramePrev { .. } => "cellFramePrev",
            Self::CellIndependenceChanged { .. } => "cellIndependenceChanged",
            Self::MeshPlay { .. } => "meshPlay",
            Self::MeshPause { .. } => "meshPause",
            Self::MeshFrameNext { .. } => "meshFrameNext",
            Self::MeshFramePrev { .. } => "meshFramePrev",
            Self::MeshSpeedChanged { .. } => "meshSpeedChanged",
            Self::MeshTimeSet { .. } => "meshTimeSet",
        }
    }

    /// The cell this event concerns, for per-cell events.
    pub fn cell_id(&self) -> Option<&CellId> {
        match self {
            Self::CellFrameNext { cell_id }
            | Self::CellFramePrev { cell_id }
            | Self::CellIndependenceChanged { cell_id, .. }
            | Self::MeshPlay { cell_id }
            | Self::MeshPause { cell_id }
            | Self::MeshFrameNext { cell_id }
            | Self::MeshFramePrev { cell_id }
            | Self::MeshSpeedChanged { cell_id, .. }
            | Self::MeshTimeSet { cell_id, .. } => Some(cell_id),
            _ => None,
        }
    }
}

/// Identifier of one subscription.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

type Listener = Rc<dyn Fn(&PlaybackEvent)>;

struct BusShared {
    listeners: RefCell<Vec<(ListenerId, Listener)>>,
    next_id: Cell<u64>,
    depth: Cell<usize>,
}

impl BusShared {
    fn remove(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(l, _)| *l != id);
        listeners.len() != before
    }

    fn contains(&self, id: ListenerId) -> bool {
        self.listeners.borrow().iter().any(|(l, _)| *l == id)
    }
}

/// Synchronous, in-order observer list.
///
/// Cloning an `EventBus` yields another handle to the same listener list.
#[derive(Clone)]
pub struct EventBus {
    shared: Rc<BusShared>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .field("depth", &self.shared.depth.get())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            shared: Rc::new(BusShared {
                listeners: RefCell::new(Vec::new()),
                next_id: Cell::new(0),
                depth: Cell::new(0),
            }),
        }
    }

    /// Register a listener. It stays subscribed until the returned guard is
    /// dropped or [`Subscription::unsubscribe`] is called.
    pub fn subscribe(&self, listener: impl Fn(&PlaybackEvent) + 'static) -> Subscription {
        let id = ListenerId(self.shared.next_id.get());
        self.shared.next_id.set(id.0 + 1);
        self.shared
            .listeners
            .borrow_mut()
            .push((id, Rc::new(listener)));
        Subscription {
            bus: Rc::downgrade(&self.shared),
            id,
            active: true,
        }
    }

    pub fn listener_count(&self) -> usize {
        self.shared.listeners.borrow().len()
    }

    /// Deliver `event` to every listener, in subscription order.
    ///
    /// Returns the number of listeners that returned normally.
    pub fn emit(&self, event: &PlaybackEvent) -> usize {
        let depth = self.shared.depth.get();
        if depth >= MAX_DISPATCH_DEPTH {
            error!(
                event = event.kind(),
                depth, "Refusing nested dispatch; a listener is re-emitting from its callback"
            );
            return 0;
        }
        self.shared.depth.set(depth + 1);

        let snapshot: Vec<(ListenerId, Listener)> = self.shared.listeners.borrow().clone();
        let mut delivered = 0;
        for (id, listener) in snapshot {
            // Unsubscribed by an earlier listener during this dispatch.
            if !self.shared.contains(id) {
                continue;
            }
            match catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(()) => delivered += 1,
                Err(payload) => {
                    warn!(
                        listener = id.0,
                        event = event.kind(),
                        panic = panic_message(payload.as_ref()),
                        "Listener panicked; continuing dispatch"
                    );
                }
            }
        }

        self.shared.depth.set(depth);
        delivered
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "<non-string panic payload>"
    }
}

/// Guard for one listener registration.
///
/// Dropping the guard unsubscribes; call [`detach`](Self::detach) to keep the
/// listener for the lifetime of the bus.
#[must_use = "dropping a Subscription unsubscribes the listener immediately"]
pub struct Subscription {
    bus: Weak<BusShared>,
    id: ListenerId,
    active: bool,
}

impl Subscription {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Remove the listener now. Safe to call from inside a dispatch.
    pub fn unsubscribe(mut self) {
        self.remove();
    }

    /// Keep the listener registered without holding the guard.
    pub fn detach(mut self) {
        self.active = false;
    }

    fn remove(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        if let Some(bus) = self.bus.upgrade() {
            bus.remove(self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.remove();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.active)
            .finish()
    }
}
