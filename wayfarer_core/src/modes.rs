use std::cell::Cell;
use std::rc::Rc;

use log::debug;

use crate::dialogue::DialogueFlow;
use crate::events::{EventBus, Signal, SubscriberId};
use crate::menus::MenuStack;

/// The exclusive high-level input/UI state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Play,
    Dialogue,
    Cutscene,
    Pause,
}

impl Mode {
    pub fn label(self) -> &'static str {
        match self {
            Mode::Play => "play",
            Mode::Dialogue => "dialogue",
            Mode::Cutscene => "cutscene",
            Mode::Pause => "pause",
        }
    }
}

/// Host-side effect axes the mode table drives: the simulation clock,
/// pointer capture and player locomotion input. Menu input is the
/// fourth axis and belongs to the menu stack.
pub trait GameShell {
    fn set_clock_frozen(&self, frozen: bool);
    fn set_pointer_captured(&self, captured: bool);
    fn set_player_input_enabled(&self, enabled: bool);
}

/// Arbitrates which mode is active. Every transition is an
/// unconditional reset of all four effect axes rather than a guarded
/// table walk, so re-entering the current mode is always safe.
#[derive(Clone)]
pub struct ModeController {
    shell: Rc<dyn GameShell>,
    menus: MenuStack,
    dialogue: DialogueFlow,
    current: Rc<Cell<Mode>>,
}

impl ModeController {
    pub fn new(shell: Rc<dyn GameShell>, menus: MenuStack, dialogue: DialogueFlow) -> Self {
        ModeController {
            shell,
            menus,
            dialogue,
            current: Rc::new(Cell::new(Mode::Play)),
        }
    }

    pub fn current(&self) -> Mode {
        self.current.get()
    }

    fn apply(&self, mode: Mode) {
        let (clock_frozen, pointer_captured, player_input, menu_input) = match mode {
            Mode::Play => (false, true, true, true),
            Mode::Dialogue => (false, true, false, false),
            Mode::Cutscene => (false, true, false, false),
            Mode::Pause => (true, false, false, true),
        };
        self.shell.set_clock_frozen(clock_frozen);
        self.shell.set_pointer_captured(pointer_captured);
        self.shell.set_player_input_enabled(player_input);
        self.menus.set_input_enabled(menu_input);
        self.current.set(mode);
        debug!("mode controller: entered {}", mode.label());
    }

    pub fn enter_play_mode(&self) {
        self.apply(Mode::Play);
    }

    pub fn enter_dialogue_mode(&self) {
        self.apply(Mode::Dialogue);
    }

    pub fn enter_cutscene_mode(&self) {
        self.apply(Mode::Cutscene);
    }

    pub fn enter_pause_mode(&self) {
        self.apply(Mode::Pause);
    }

    /// Convenience entry point for interaction effects: switches to
    /// dialogue mode and hands the path to the flow engine.
    pub fn start_dialogue(&self, path: &str) {
        self.enter_dialogue_mode();
        self.dialogue.start_dialogue(path);
    }

    /// Wires the fixed signal responses: base menu opening pauses the
    /// game, base menu closed and dialogue closed both return to play.
    pub fn connect(&self, bus: &EventBus) -> Vec<SubscriberId> {
        let on_base_opening = self.clone();
        let on_base_closed = self.clone();
        let on_dialogue_closed = self.clone();
        vec![
            bus.subscribe(move |signal| {
                if *signal == Signal::BaseMenuOpening {
                    on_base_opening.enter_pause_mode();
                }
            }),
            bus.subscribe(move |signal| {
                if *signal == Signal::BaseMenuClosed {
                    on_base_closed.enter_play_mode();
                }
            }),
            bus.subscribe(move |signal| {
                if *signal == Signal::DialogueClosed {
                    on_dialogue_closed.enter_play_mode();
                }
            }),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::{GameShell, Mode, ModeController};
    use crate::dialogue::{
        DialogueFlow, DialogueLine, DialoguePresenter, ScriptError, ScriptExternals,
        ScriptInterpreter,
    };
    use crate::events::EventBus;
    use crate::menus::{MenuPanel, MenuPolicies, MenuStack};
    use crate::scheduler::TickScheduler;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    #[derive(Default)]
    struct RecordingShell {
        axes: RefCell<Vec<String>>,
    }

    impl GameShell for RecordingShell {
        fn set_clock_frozen(&self, frozen: bool) {
            self.axes.borrow_mut().push(format!("clock_frozen={frozen}"));
        }

        fn set_pointer_captured(&self, captured: bool) {
            self.axes
                .borrow_mut()
                .push(format!("pointer_captured={captured}"));
        }

        fn set_player_input_enabled(&self, enabled: bool) {
            self.axes
                .borrow_mut()
                .push(format!("player_input={enabled}"));
        }
    }

    struct SilentPanel;

    impl MenuPanel for SilentPanel {
        fn name(&self) -> &str {
            "pause"
        }
        fn open(&self) {}
        fn close(&self) {}
        fn show(&self) {}
        fn hide(&self) {}
        fn focused_control(&self) -> Option<String> {
            None
        }
        fn focus_control(&self, _control: &str) {}
        fn focus_default(&self) {}
    }

    struct SilentPresenter;

    impl DialoguePresenter for SilentPresenter {
        fn open(&self) {}
        fn close(&self) {}
        fn display_line(&self, _line: &DialogueLine) {}
    }

    #[derive(Default)]
    struct ScriptedInterpreter {
        lines: VecDeque<String>,
    }

    impl ScriptInterpreter for ScriptedInterpreter {
        fn load_script(&mut self, _source: &[u8]) -> Result<(), ScriptError> {
            Ok(())
        }
        fn jump_to(&mut self, _path: &str) -> Result<(), ScriptError> {
            Ok(())
        }
        fn can_continue(&self) -> bool {
            !self.lines.is_empty()
        }
        fn continue_line(&mut self) -> String {
            self.lines.pop_front().unwrap_or_default()
        }
        fn current_choices(&self) -> Vec<String> {
            Vec::new()
        }
        fn choose_choice(&mut self, _index: usize) {}
        fn current_tags(&self) -> Vec<String> {
            Vec::new()
        }
        fn bind_externals(&mut self, _externals: ScriptExternals) {}
    }

    struct Fixture {
        bus: EventBus,
        modes: ModeController,
        menus: MenuStack,
        shell: Rc<RecordingShell>,
        dialogue: DialogueFlow,
        base: Rc<SilentPanel>,
    }

    fn fixture(lines: &[&str]) -> Fixture {
        let bus = EventBus::new();
        let ticks = TickScheduler::new();
        let shell = Rc::new(RecordingShell::default());
        let menus = MenuStack::new(
            bus.clone(),
            ticks,
            MenuPolicies {
                hide_previous: true,
                prevent_base_closing: false,
            },
        );
        let base = Rc::new(SilentPanel);
        menus.set_base(base.clone());

        let interpreter = ScriptedInterpreter {
            lines: lines.iter().map(|line| line.to_string()).collect(),
        };
        let dialogue = DialogueFlow::new(
            Box::new(interpreter),
            Rc::new(SilentPresenter),
            bus.clone(),
        );
        let modes = ModeController::new(shell.clone(), menus.clone(), dialogue.clone());
        modes.connect(&bus);
        Fixture {
            bus,
            modes,
            menus,
            shell,
            dialogue,
            base,
        }
    }

    #[test]
    fn pause_mode_freezes_clock_and_releases_pointer() {
        let fx = fixture(&[]);
        fx.shell.axes.borrow_mut().clear();

        fx.modes.enter_pause_mode();
        assert_eq!(fx.modes.current(), Mode::Pause);
        assert_eq!(
            *fx.shell.axes.borrow(),
            vec!["clock_frozen=true", "pointer_captured=false", "player_input=false"]
        );
        assert!(fx.menus.input_enabled());
    }

    #[test]
    fn reentering_a_mode_is_idempotent() {
        let fx = fixture(&[]);
        fx.modes.enter_play_mode();
        let first = fx.shell.axes.borrow().clone();
        fx.shell.axes.borrow_mut().clear();
        fx.modes.enter_play_mode();
        assert_eq!(*fx.shell.axes.borrow(), first);
    }

    #[test]
    fn cutscene_mode_blocks_player_and_menu_input() {
        let fx = fixture(&[]);
        fx.modes.enter_cutscene_mode();
        assert_eq!(fx.modes.current(), Mode::Cutscene);
        assert!(!fx.menus.input_enabled());

        fx.menus.toggle_menu();
        assert_eq!(fx.menus.depth(), 0);
    }

    #[test]
    fn base_menu_signals_drive_pause_and_play() {
        let fx = fixture(&[]);
        fx.modes.enter_play_mode();

        fx.menus.open_menu(fx.base.clone());
        assert_eq!(fx.modes.current(), Mode::Pause);

        fx.menus.close_menu();
        assert_eq!(fx.modes.current(), Mode::Play);
    }

    #[test]
    fn dialogue_mode_disables_menu_input_until_the_script_ends() {
        let fx = fixture(&["Guide: Follow the lanterns."]);
        fx.modes.start_dialogue("intro");

        assert_eq!(fx.modes.current(), Mode::Dialogue);
        assert!(!fx.menus.input_enabled());

        fx.dialogue.on_continue_pressed();
        assert_eq!(fx.modes.current(), Mode::Play);
        assert!(fx.menus.input_enabled());
    }

    #[test]
    fn immediately_ending_dialogue_lands_back_in_play() {
        let fx = fixture(&[]);
        fx.modes.start_dialogue("intro");
        assert_eq!(fx.modes.current(), Mode::Play);
        // The bus kept the wiring alive for the whole round trip.
        assert!(fx.bus.listener_count() >= 3);
    }
}
