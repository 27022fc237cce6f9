use std::rc::Rc;

use thiserror::Error;

use crate::dialogue::{DialogueFlow, DialoguePresenter, ScriptExternals, ScriptInterpreter};
use crate::events::{EventBus, SubscriberId};
use crate::menus::{MenuPanel, MenuPolicies, MenuStack};
use crate::modes::{GameShell, ModeController};
use crate::scheduler::TickScheduler;
use crate::state::StateStore;

#[derive(Debug, Error)]
pub enum WiringError {
    #[error("missing collaborator: {0}")]
    MissingCollaborator(&'static str),
}

/// Construction-time dependency injection for the whole flow core.
/// Collaborators are handed in explicitly; a missing one fails the
/// build instead of surfacing later as a dead lookup.
#[derive(Default)]
pub struct GameFlowBuilder {
    shell: Option<Rc<dyn GameShell>>,
    presenter: Option<Rc<dyn DialoguePresenter>>,
    interpreter: Option<Box<dyn ScriptInterpreter>>,
    base_menu: Option<Rc<dyn MenuPanel>>,
    policies: MenuPolicies,
    seed_counters: Vec<(String, i64)>,
}

impl GameFlowBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shell(mut self, shell: Rc<dyn GameShell>) -> Self {
        self.shell = Some(shell);
        self
    }

    pub fn presenter(mut self, presenter: Rc<dyn DialoguePresenter>) -> Self {
        self.presenter = Some(presenter);
        self
    }

    pub fn interpreter(mut self, interpreter: Box<dyn ScriptInterpreter>) -> Self {
        self.interpreter = Some(interpreter);
        self
    }

    pub fn base_menu(mut self, panel: Rc<dyn MenuPanel>) -> Self {
        self.base_menu = Some(panel);
        self
    }

    pub fn menu_policies(mut self, policies: MenuPolicies) -> Self {
        self.policies = policies;
        self
    }

    /// Scene-configured initial counter values, applied without raising
    /// `StateChanged`.
    pub fn seed_counter(mut self, id: impl Into<String>, amount: i64) -> Self {
        self.seed_counters.push((id.into(), amount));
        self
    }

    pub fn build(self) -> Result<GameFlow, WiringError> {
        let shell = self
            .shell
            .ok_or(WiringError::MissingCollaborator("game shell"))?;
        let presenter = self
            .presenter
            .ok_or(WiringError::MissingCollaborator("dialogue presenter"))?;
        let mut interpreter = self
            .interpreter
            .ok_or(WiringError::MissingCollaborator("script interpreter"))?;
        let base_menu = self
            .base_menu
            .ok_or(WiringError::MissingCollaborator("base menu panel"))?;

        let bus = EventBus::new();
        let ticks = TickScheduler::new();
        let state = StateStore::new(bus.clone());
        for (id, amount) in &self.seed_counters {
            state.add(id, *amount, false);
        }

        interpreter.bind_externals(ScriptExternals::new(state.clone(), bus.clone()));

        let menus = MenuStack::new(bus.clone(), ticks.clone(), self.policies);
        menus.set_base(base_menu);

        let dialogue = DialogueFlow::new(interpreter, presenter, bus.clone());
        let modes = ModeController::new(shell, menus.clone(), dialogue.clone());
        let subscriptions = modes.connect(&bus);
        modes.enter_play_mode();

        Ok(GameFlow {
            bus,
            ticks,
            state,
            menus,
            modes,
            dialogue,
            subscriptions,
        })
    }
}

/// The assembled flow core. Fields are cloneable handles; the struct
/// only pins their shared lifetime and the wired mode subscriptions.
pub struct GameFlow {
    bus: EventBus,
    ticks: TickScheduler,
    state: StateStore,
    menus: MenuStack,
    modes: ModeController,
    dialogue: DialogueFlow,
    #[allow(dead_code)]
    subscriptions: Vec<SubscriberId>,
}

impl GameFlow {
    pub fn builder() -> GameFlowBuilder {
        GameFlowBuilder::new()
    }

    pub fn bus(&self) -> EventBus {
        self.bus.clone()
    }

    pub fn ticks(&self) -> TickScheduler {
        self.ticks.clone()
    }

    pub fn state(&self) -> StateStore {
        self.state.clone()
    }

    pub fn menus(&self) -> MenuStack {
        self.menus.clone()
    }

    pub fn modes(&self) -> ModeController {
        self.modes.clone()
    }

    pub fn dialogue(&self) -> DialogueFlow {
        self.dialogue.clone()
    }
}
