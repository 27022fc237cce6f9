use std::cell::{Cell, RefCell};
use std::rc::Rc;

use log::{debug, error};

use crate::events::{EventBus, Signal};
use crate::scheduler::TickScheduler;

/// Presentation collaborator for one overlay panel. `open`/`close` kick
/// off visual transitions and are fire-and-forget; `show`/`hide` flip
/// plain visibility for the hide-previous policy. The authoritative
/// open/closed state lives in the stack, never in the panel.
pub trait MenuPanel {
    fn name(&self) -> &str;
    fn open(&self);
    fn close(&self);
    fn show(&self);
    fn hide(&self);
    fn focused_control(&self) -> Option<String>;
    fn focus_control(&self, control: &str);
    /// Highlight the panel's initial selection, deferred one tick after
    /// opening so the presentation layer has rendered a frame.
    fn focus_default(&self);
}

#[derive(Debug, Clone, Copy)]
pub struct MenuPolicies {
    /// Visually hide the panel underneath when a new one opens.
    pub hide_previous: bool,
    /// Refuse to pop the base panel when it is the only entry left.
    pub prevent_base_closing: bool,
}

impl Default for MenuPolicies {
    fn default() -> Self {
        MenuPolicies {
            hide_previous: true,
            prevent_base_closing: true,
        }
    }
}

struct StackEntry {
    panel: Rc<dyn MenuPanel>,
    /// Focus captured from the panel underneath when this one opened,
    /// restored there one tick after this one closes.
    saved_focus: Option<String>,
    /// Shared validity flag for deferred continuations targeting this
    /// entry; flipped off synchronously when the entry pops.
    open_flag: Rc<Cell<bool>>,
}

struct StackInner {
    entries: Vec<StackEntry>,
    base: Option<Rc<dyn MenuPanel>>,
    policies: MenuPolicies,
    input_enabled: bool,
}

/// LIFO record of currently open overlay panels. Cloneable handle; all
/// signal emission happens after the interior borrow is released so the
/// mode controller can call back in while an open/close is in flight.
#[derive(Clone)]
pub struct MenuStack {
    inner: Rc<RefCell<StackInner>>,
    bus: EventBus,
    ticks: TickScheduler,
}

impl MenuStack {
    pub fn new(bus: EventBus, ticks: TickScheduler, policies: MenuPolicies) -> Self {
        MenuStack {
            inner: Rc::new(RefCell::new(StackInner {
                entries: Vec::new(),
                base: None,
                policies,
                input_enabled: true,
            })),
            bus,
            ticks,
        }
    }

    /// Designates the distinguished base panel (pause/main). Opening and
    /// closing it raises the base signals the mode controller listens
    /// for.
    pub fn set_base(&self, panel: Rc<dyn MenuPanel>) {
        self.inner.borrow_mut().base = Some(panel);
    }

    pub fn set_input_enabled(&self, enabled: bool) {
        self.inner.borrow_mut().input_enabled = enabled;
    }

    pub fn input_enabled(&self) -> bool {
        self.inner.borrow().input_enabled
    }

    pub fn depth(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    pub fn top_name(&self) -> Option<String> {
        self.inner
            .borrow()
            .entries
            .last()
            .map(|entry| entry.panel.name().to_string())
    }

    pub fn is_base_open(&self) -> bool {
        let inner = self.inner.borrow();
        match inner.base.as_ref() {
            Some(base) => inner
                .entries
                .iter()
                .any(|entry| Rc::ptr_eq(&entry.panel, base)),
            None => false,
        }
    }

    pub fn open_menu(&self, panel: Rc<dyn MenuPanel>) {
        let is_base = {
            let inner = self.inner.borrow();
            inner
                .base
                .as_ref()
                .map(|base| Rc::ptr_eq(base, &panel))
                .unwrap_or(false)
        };
        if is_base {
            // Raised before the panel opens so the mode controller has
            // already frozen the clock by the time it becomes visible.
            self.bus.emit(&Signal::BaseMenuOpening);
        }

        let (saved_focus, to_hide) = {
            let inner = self.inner.borrow();
            let top = inner.entries.last();
            let saved = top.and_then(|entry| entry.panel.focused_control());
            let hide = if inner.policies.hide_previous {
                top.map(|entry| entry.panel.clone())
            } else {
                None
            };
            (saved, hide)
        };
        if let Some(previous) = to_hide {
            previous.hide();
        }

        let open_flag = Rc::new(Cell::new(true));
        self.inner.borrow_mut().entries.push(StackEntry {
            panel: panel.clone(),
            saved_focus,
            open_flag: open_flag.clone(),
        });
        panel.open();

        let highlight = panel.clone();
        self.ticks.schedule(move || {
            if open_flag.get() {
                highlight.focus_default();
            }
        });
    }

    pub fn close_menu(&self) {
        let popped = {
            let mut inner = self.inner.borrow_mut();
            if inner.entries.is_empty() {
                return;
            }
            let last_is_lone_base = inner.entries.len() == 1
                && inner
                    .base
                    .as_ref()
                    .map(|base| Rc::ptr_eq(base, &inner.entries[0].panel))
                    .unwrap_or(false);
            if inner.policies.prevent_base_closing && last_is_lone_base {
                debug!("menu stack: refusing to close the base menu");
                return;
            }
            let entry = inner.entries.pop().expect("stack checked non-empty");
            entry.open_flag.set(false);
            entry
        };
        let was_base = {
            let inner = self.inner.borrow();
            inner
                .base
                .as_ref()
                .map(|base| Rc::ptr_eq(base, &popped.panel))
                .unwrap_or(false)
        };

        popped.panel.close();

        let (revealed, reshow) = {
            let inner = self.inner.borrow();
            let top = inner
                .entries
                .last()
                .map(|entry| (entry.panel.clone(), entry.open_flag.clone()));
            (top, inner.policies.hide_previous)
        };
        if reshow {
            if let Some((panel, _)) = revealed.as_ref() {
                panel.show();
            }
        }

        // Restore the focus captured when the popped panel opened, one
        // tick later so the closing transition has rendered a frame. The
        // continuation no-ops if the target has closed meanwhile.
        if let (Some(control), Some((target, guard))) = (popped.saved_focus, revealed) {
            self.ticks.schedule(move || {
                if guard.get() {
                    target.focus_control(&control);
                }
            });
        }

        if was_base {
            self.bus.emit(&Signal::BaseMenuClosed);
        }
    }

    /// Go-back semantics for the input layer: opens the base menu when
    /// it is not open, otherwise closes whatever is on top. Ignored
    /// while menu input is disabled (dialogue and cutscene modes).
    pub fn toggle_menu(&self) {
        if !self.input_enabled() {
            debug!("menu stack: toggle ignored while input is disabled");
            return;
        }
        if self.is_base_open() {
            self.close_menu();
            return;
        }
        let base = self.inner.borrow().base.clone();
        match base {
            Some(panel) => self.open_menu(panel),
            None => error!("menu stack: toggle with no base menu configured"),
        }
    }
}
