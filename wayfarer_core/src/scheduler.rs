use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

struct Deferred {
    cancelled: Rc<Cell<bool>>,
    action: Box<dyn FnOnce()>,
}

/// Cancellation token for a deferred continuation. Cancelling after the
/// continuation has run is a harmless no-op.
#[derive(Clone)]
pub struct TickToken {
    cancelled: Rc<Cell<bool>>,
}

impl TickToken {
    pub fn cancel(&self) {
        self.cancelled.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }
}

/// Next-tick queue for frame-deferred work (focus restoration, initial
/// selection highlighting). Continuations queued while `run_pending` is
/// draining wait for the following tick, so a continuation that defers
/// more work cannot starve the frame.
#[derive(Clone, Default)]
pub struct TickScheduler {
    pending: Rc<RefCell<VecDeque<Deferred>>>,
}

impl TickScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule<F>(&self, action: F) -> TickToken
    where
        F: FnOnce() + 'static,
    {
        let cancelled = Rc::new(Cell::new(false));
        self.pending.borrow_mut().push_back(Deferred {
            cancelled: cancelled.clone(),
            action: Box::new(action),
        });
        TickToken { cancelled }
    }

    /// Runs every continuation queued before this call, skipping the
    /// cancelled ones.
    pub fn run_pending(&self) {
        let batch = self.pending.borrow().len();
        for _ in 0..batch {
            let entry = match self.pending.borrow_mut().pop_front() {
                Some(entry) => entry,
                None => break,
            };
            if entry.cancelled.get() {
                continue;
            }
            (entry.action)();
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.borrow().len()
    }
}
