//! Gameplay-flow and narrative-orchestration core: progress counters,
//! chained interactions on world objects, a branching-dialogue flow
//! engine around an opaque script interpreter, the play/dialogue/
//! cutscene/pause mode arbiter and the LIFO menu stack.
//!
//! Everything is single-threaded and cooperative. Subsystems are
//! cloneable handles over `Rc<RefCell<..>>` interiors; cross-subsystem
//! coordination travels over the [`events::EventBus`], and frame-deferred
//! work goes through the [`scheduler::TickScheduler`].

pub mod dialogue;
pub mod events;
pub mod interact;
pub mod menus;
pub mod modes;
pub mod scheduler;
pub mod state;
pub mod wiring;

pub use dialogue::{
    parse_dialogue_line, Choice, DialogueFlow, DialogueLine, DialoguePresenter, DialogueState,
    ReportSeverity, ScriptError, ScriptExternals, ScriptInterpreter,
};
pub use events::{EventBus, Signal, SubscriberId};
pub use interact::{Interactable, InteractionStep};
pub use menus::{MenuPanel, MenuPolicies, MenuStack};
pub use modes::{GameShell, Mode, ModeController};
pub use scheduler::{TickScheduler, TickToken};
pub use state::{Condition, Counter, StateStore};
pub use wiring::{GameFlow, GameFlowBuilder, WiringError};
