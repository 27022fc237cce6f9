use std::cell::RefCell;
use std::rc::Rc;

use log::error;

use crate::events::{EventBus, Signal};

/// One step in an interactable's activation chain. `next` points at the
/// sibling (by declaration index) armed once this step executes; the
/// effect is wired in at construction and runs after the follow-up has
/// been armed.
pub struct InteractionStep {
    pub next: Option<usize>,
    pub effect: Option<Rc<dyn Fn()>>,
}

impl InteractionStep {
    pub fn new(next: Option<usize>) -> Self {
        InteractionStep { next, effect: None }
    }

    pub fn with_effect<F>(next: Option<usize>, effect: F) -> Self
    where
        F: Fn() + 'static,
    {
        InteractionStep {
            next,
            effect: Some(Rc::new(effect)),
        }
    }
}

struct InteractableInner {
    name: String,
    steps: Vec<InteractionStep>,
    /// The single active step. Owning the index here (instead of a flag
    /// on each step) makes "at most one active" true by construction.
    active: Option<usize>,
}

/// A world object the player can interact with. Cloneable handle over
/// the shared interior, so effect closures can retarget the chain while
/// an `interact` call is still on the stack.
#[derive(Clone)]
pub struct Interactable {
    inner: Rc<RefCell<InteractableInner>>,
    bus: EventBus,
}

impl Interactable {
    /// The first declared step starts active; with no steps the object
    /// only ever relays notifications.
    pub fn new(name: impl Into<String>, steps: Vec<InteractionStep>, bus: EventBus) -> Self {
        let active = if steps.is_empty() { None } else { Some(0) };
        Interactable {
            inner: Rc::new(RefCell::new(InteractableInner {
                name: name.into(),
                steps,
                active,
            })),
            bus,
        }
    }

    pub fn name(&self) -> String {
        self.inner.borrow().name.clone()
    }

    pub fn active_step(&self) -> Option<usize> {
        self.inner.borrow().active
    }

    /// Executes the active step: the follow-up is armed first, then the
    /// step's effect runs, then `Interacted` fires. An effect may
    /// retarget the chain via `set_active`, and that later activation
    /// wins over the armed follow-up. With no active step only the
    /// notification fires.
    pub fn interact(&self) {
        let (name, effect) = {
            let mut inner = self.inner.borrow_mut();
            let effect = match inner.active {
                Some(index) => {
                    inner.active = inner.steps[index].next;
                    inner.steps[index].effect.clone()
                }
                None => None,
            };
            (inner.name.clone(), effect)
        };
        if let Some(effect) = effect {
            effect();
        }
        self.bus.emit(&Signal::Interacted(name));
    }

    /// External reset/override of the chain. Out-of-range indices are
    /// logged and ignored.
    pub fn set_active(&self, step: Option<usize>) {
        let mut inner = self.inner.borrow_mut();
        if let Some(index) = step {
            if index >= inner.steps.len() {
                error!(
                    "interactable {:?}: step {index} out of range ({} steps)",
                    inner.name,
                    inner.steps.len()
                );
                return;
            }
        }
        inner.active = step;
    }

    pub fn select(&self) {
        let name = self.inner.borrow().name.clone();
        self.bus.emit(&Signal::Selected(name));
    }

    pub fn deselect(&self) {
        let name = self.inner.borrow().name.clone();
        self.bus.emit(&Signal::Deselected(name));
    }
}
