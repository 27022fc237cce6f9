use std::cell::RefCell;
use std::rc::Rc;

/// Broadcast signals raised by the core subsystems. Payloads are kept
/// minimal on purpose: listeners re-query whatever they need instead of
/// relying on a delta travelling with the signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// The state store mutated. No payload; re-read the store.
    StateChanged,
    /// The designated base menu is about to open.
    BaseMenuOpening,
    /// The designated base menu was popped off the stack.
    BaseMenuClosed,
    DialogueOpened,
    DialogueClosed,
    /// A named event raised from inside a running script.
    ScriptEvent(String),
    Interacted(String),
    Selected(String),
    Deselected(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriberId(u64);

type Listener = Rc<dyn Fn(&Signal)>;

#[derive(Default)]
struct BusInner {
    next_id: u64,
    listeners: Vec<(u64, Listener)>,
}

/// Explicit publish/subscribe channel shared by the core subsystems.
/// Cloneable handle; all clones observe the same listener set.
///
/// Emission snapshots the listener list before invoking anything, so a
/// listener may subscribe, unsubscribe, or emit again without upsetting
/// the interior borrow.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Rc<RefCell<BusInner>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriberId
    where
        F: Fn(&Signal) + 'static,
    {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.listeners.push((id, Rc::new(listener)));
        SubscriberId(id)
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        self.inner
            .borrow_mut()
            .listeners
            .retain(|(existing, _)| *existing != id.0);
    }

    pub fn emit(&self, signal: &Signal) {
        let snapshot: Vec<Listener> = self
            .inner
            .borrow()
            .listeners
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in snapshot {
            listener(signal);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.borrow().listeners.len()
    }
}
