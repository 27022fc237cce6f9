use std::cell::RefCell;
use std::rc::Rc;

use log::{error, warn};
use serde::Serialize;

use crate::events::{EventBus, Signal};

/// A named progress counter. Amounts are signed and unbounded; counters
/// are created on first add and never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Counter {
    pub id: String,
    pub amount: i64,
}

/// A required minimum read against a counter. Structurally a counter,
/// semantically "current amount must be at least this".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub id: String,
    pub amount: i64,
}

impl Condition {
    pub fn new(id: impl Into<String>, amount: i64) -> Self {
        Condition {
            id: id.into(),
            amount,
        }
    }
}

#[derive(Default)]
struct StoreInner {
    counters: Vec<Counter>,
}

impl StoreInner {
    fn position(&self, id: &str) -> Option<usize> {
        self.counters.iter().position(|counter| counter.id == id)
    }

    /// Applies a single mutation. Returns whether anything changed.
    fn apply(&mut self, id: &str, amount: i64) -> bool {
        if id.trim().is_empty() {
            error!("state store: rejecting add with empty counter id");
            return false;
        }
        if amount == 0 {
            warn!("state store: add of 0 to {id:?} is a no-op");
            return false;
        }
        match self.position(id) {
            Some(index) => self.counters[index].amount += amount,
            None => self.counters.push(Counter {
                id: id.to_string(),
                amount,
            }),
        }
        true
    }
}

/// Ordered collection of named counters; the shared mutable state of the
/// whole flow core. Cloneable handle; every mutation that should be
/// observable raises a single `StateChanged` broadcast after the interior
/// borrow is released, so listeners can re-read the store immediately.
#[derive(Clone, Default)]
pub struct StateStore {
    inner: Rc<RefCell<StoreInner>>,
    bus: EventBus,
}

impl StateStore {
    pub fn new(bus: EventBus) -> Self {
        StateStore {
            inner: Rc::new(RefCell::new(StoreInner::default())),
            bus,
        }
    }

    pub fn get(&self, id: &str) -> Option<Counter> {
        let inner = self.inner.borrow();
        inner
            .position(id)
            .map(|index| inner.counters[index].clone())
    }

    /// Current amount for `id`, treating a missing counter as 0.
    pub fn amount(&self, id: &str) -> i64 {
        self.get(id).map(|counter| counter.amount).unwrap_or(0)
    }

    /// Adds `amount` to the counter `id`, creating it if absent. Empty
    /// ids and zero amounts are logged no-ops; negative totals are fine.
    pub fn add(&self, id: &str, amount: i64, notify: bool) {
        let changed = self.inner.borrow_mut().apply(id, amount);
        if changed && notify {
            self.bus.emit(&Signal::StateChanged);
        }
    }

    /// Applies every entry without notifying, then raises one
    /// `StateChanged` for the whole batch. A batch that changes nothing,
    /// the empty batch included, stays silent.
    pub fn add_batch<'a, I>(&self, entries: I)
    where
        I: IntoIterator<Item = (&'a str, i64)>,
    {
        let mut touched = false;
        {
            let mut inner = self.inner.borrow_mut();
            for (id, amount) in entries {
                touched |= inner.apply(id, amount);
            }
        }
        if touched {
            self.bus.emit(&Signal::StateChanged);
        }
    }

    /// AND-combines the conditions, short-circuiting on the first
    /// failure. A missing counter reads as 0; an empty list passes.
    pub fn check_conditions(&self, conditions: &[Condition]) -> bool {
        let inner = self.inner.borrow();
        conditions.iter().all(|condition| {
            let current = inner
                .position(&condition.id)
                .map(|index| inner.counters[index].amount)
                .unwrap_or(0);
            current >= condition.amount
        })
    }

    pub fn counters(&self) -> Vec<Counter> {
        self.inner.borrow().counters.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().counters.is_empty()
    }
}
