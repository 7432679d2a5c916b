//! Lifecycle Events
//!
//! Minimal pub/sub between the controller and the embedding page. Handlers
//! run synchronously, in registration order, on the thread that emits.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::props::Completion;

/// Event names the host can subscribe to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Ready,
    Closed,
    Completed,
    Failed,
}

impl EventKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Closed => "closed",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ready" => Ok(Self::Ready),
            "closed" => Ok(Self::Closed),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown event: {other}")),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An emitted event with its payload
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CheckoutEvent {
    /// Frame rendered and content revealed
    Ready,
    /// Session fully torn down
    Closed,
    /// Remote page reported a finished order
    Completed(Completion),
    /// Frame failed to render; a `Closed` follows
    Failed { reason: String },
}

impl CheckoutEvent {
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Ready => EventKind::Ready,
            Self::Closed => EventKind::Closed,
            Self::Completed(_) => EventKind::Completed,
            Self::Failed { .. } => EventKind::Failed,
        }
    }
}

/// Identifies one registration, for [`EventEmitter::off`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);


type Handler = Rc<dyn Fn(&CheckoutEvent)>;

/// Handler registry keyed by event kind
#[derive(Default)]
pub struct EventEmitter {
    listeners: RefCell<HashMap<EventKind, Vec<(ListenerId, Handler)>>>,
    next_id: Cell<u64>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler
    pub fn on(&self, kind: EventKind, handler: impl Fn(&CheckoutEvent) + 'static) -> ListenerId {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(id.0 + 1);

        self.listeners
            .borrow_mut()
            .entry(kind)
            .or_default()
            .push((id, Rc::new(handler)));

        id
    }

    /// Remove a handler. Returns whether anything was removed.
    pub fn off(&self, kind: EventKind, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let Some(handlers) = listeners.get_mut(&kind) else {
            return false;
        };

        let before = handlers.len();
        handlers.retain(|(existing, _)| *existing != id);
        handlers.len() != before
    }

    /// Number of handlers for `kind`
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.borrow().get(&kind).map_or(0, Vec::len)
    }

    /// Call every handler for the event's kind. Returns how many ran to completion.
    ///
    /// The handler list is snapshotted first, so handlers may freely
    /// subscribe, unsubscribe or drive the controller.
    pub fn emit(&self, event: &CheckoutEvent) -> usize {
        let kind = event.kind();
        let handlers: Vec<Handler> = self
            .listeners
            .borrow()
            .get(&kind)
            .map(|handlers| handlers.iter().map(|(_, h)| Rc::clone(h)).collect())
            .unwrap_or_default();

        tracing::debug!(event = %kind, handlers = handlers.len(), "Emitting checkout event");

        let mut delivered = 0;
        for handler in handlers {
            match panic::catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(()) => delivered += 1,
                Err(_) => tracing::error!(event = %kind, "Checkout event handler panicked"),
            }
        }
        delivered
    }
}

impl fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<EventKind, usize> = self
            .listeners
            .borrow()
            .iter()
            .map(|(kind, handlers)| (*kind, handlers.len()))
            .collect();
        f.debug_struct("EventEmitter").field("listeners", &counts).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Rc<RefCell<Vec<String>>>, impl Fn(&str) -> Box<dyn Fn(&CheckoutEvent)>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        let make = move |name: &str| -> Box<dyn Fn(&CheckoutEvent)> {
            let sink = sink.clone();
            let name = name.to_string();
            Box::new(move |_| sink.borrow_mut().push(name.clone()))
        };
        (log, make)
    }

    #[test]
    fn test_emit_in_registration_order() {
        let emitter = EventEmitter::new();
        let (log, make) = recorder();

        emitter.on(EventKind::Ready, make("first"));
        emitter.on(EventKind::Ready, make("second"));
        emitter.on(EventKind::Closed, make("closed"));

        assert_eq!(emitter.emit(&CheckoutEvent::Ready), 2);
        assert_eq!(*log.borrow(), ["first", "second"]);
    }

    #[test]
    fn test_off_removes_by_identity() {
        let emitter = EventEmitter::new();
        let (log, make) = recorder();

        let a = emitter.on(EventKind::Closed, make("a"));
        emitter.on(EventKind::Closed, make("b"));

        assert!(emitter.off(EventKind::Closed, a));
        assert!(!emitter.off(EventKind::Closed, a));
        assert!(!emitter.off(EventKind::Ready, a));

        emitter.emit(&CheckoutEvent::Closed);
        assert_eq!(*log.borrow(), ["b"]);
        assert_eq!(emitter.listener_count(EventKind::Closed), 1);
    }

    #[test]
    fn test_emit_without_listeners() {
        let emitter = EventEmitter::new();
        assert_eq!(emitter.emit(&CheckoutEvent::Closed), 0);
    }

    #[test]
    fn test_panicking_handler_does_not_stop_fan_out() {
        let emitter = EventEmitter::new();
        let (log, make) = recorder();

        emitter.on(EventKind::Ready, |_| panic!("host bug"));
        emitter.on(EventKind::Ready, make("after"));

        assert_eq!(emitter.emit(&CheckoutEvent::Ready), 1);
        assert_eq!(*log.borrow(), ["after"]);
    }

    #[test]
    fn test_off_during_emit_keeps_snapshot() {
        let emitter = Rc::new(EventEmitter::new());
        let (log, make) = recorder();

        let second = Rc::new(Cell::new(None));
        let (inner, slot) = (emitter.clone(), second.clone());
        emitter.on(EventKind::Ready, move |_| {
            if let Some(id) = slot.get() {
                inner.off(EventKind::Ready, id);
            }
        });
        second.set(Some(emitter.on(EventKind::Ready, make("second"))));

        emitter.emit(&CheckoutEvent::Ready);
        assert_eq!(*log.borrow(), ["second"]);

        emitter.emit(&CheckoutEvent::Ready);
        assert_eq!(*log.borrow(), ["second"]);
    }

    #[test]
    fn test_completed_payload() {
        let emitter = EventEmitter::new();
        let seen = Rc::new(RefCell::new(None));
        let sink = seen.clone();
        emitter.on(EventKind::Completed, move |event| {
            if let CheckoutEvent::Completed(done) = event {
                *sink.borrow_mut() = Some(done.order_id.clone());
            }
        });

        emitter.emit(&CheckoutEvent::Completed(Completion::new("ord_1")));
        assert_eq!(seen.borrow().as_deref(), Some("ord_1"));
    }

    #[test]
    fn test_event_kind_parse() {
        assert_eq!("completed".parse::<EventKind>(), Ok(EventKind::Completed));
        assert!("opened".parse::<EventKind>().is_err());
        assert_eq!(CheckoutEvent::Failed { reason: "x".into() }.kind(), EventKind::Failed);
    }
}
