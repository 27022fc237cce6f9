use std::cell::{Cell, RefCell};
use std::rc::Rc;

use log::{debug, error, warn};
use thiserror::Error;

use crate::events::{EventBus, Signal};
use crate::state::StateStore;

/// Separator between a speaker name and the spoken text in raw script
/// output. A doubled separator escapes a literal one.
pub const SPEAKER_SEPARATOR: char = ':';

/// Script tag marking a line as inner monologue; the text is wrapped in
/// italic markers for the presentation surface.
pub const THOUGHT_TAG: &str = "thought";

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("script failed to load: {0}")]
    Load(String),
    #[error("unknown dialogue path {0:?}")]
    UnknownPath(String),
    #[error("script runtime failure: {0}")]
    Runtime(String),
}

/// Severity attached to interpreter-reported problems. None of them
/// abort a dialogue session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportSeverity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub text: String,
    /// Position in the interpreter's current choice list; resubmitted
    /// verbatim on selection.
    pub index: usize,
}

/// One structured line handed to the presentation surface. `speaker` is
/// `None` to keep the previously shown speaker and `Some("")` to clear
/// it explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogueLine {
    pub speaker: Option<String>,
    pub text: String,
    pub choices: Vec<Choice>,
}

/// Functions the embedded interpreter may call back into while it is
/// being advanced. Cloneable so a host can hand one copy to each bound
/// script function.
#[derive(Clone)]
pub struct ScriptExternals {
    state: StateStore,
    bus: EventBus,
}

impl ScriptExternals {
    pub fn new(state: StateStore, bus: EventBus) -> Self {
        ScriptExternals { state, bus }
    }

    /// Raises a named event for arbitrary external listeners.
    pub fn raise_event(&self, name: &str) {
        self.bus.emit(&Signal::ScriptEvent(name.to_string()));
    }

    /// Current amount of a progress counter, 0 when absent.
    pub fn state_amount(&self, id: &str) -> i64 {
        self.state.amount(id)
    }

    pub fn add_state(&self, id: &str, amount: i64) {
        self.state.add(id, amount, true);
    }

    /// Tri-level interpreter error channel: informational reports are
    /// dropped to debug logging, warnings and hard errors are logged and
    /// execution continues either way.
    pub fn report(&self, message: &str, severity: ReportSeverity) {
        match severity {
            ReportSeverity::Info => debug!("script: {message}"),
            ReportSeverity::Warning => warn!("script: {message}"),
            ReportSeverity::Error => error!("script: {message}"),
        }
    }
}

/// Contract of the embedded narrative-script interpreter. The flow
/// engine treats the script language itself as opaque; it only drives
/// this surface.
pub trait ScriptInterpreter {
    fn load_script(&mut self, source: &[u8]) -> Result<(), ScriptError>;
    fn jump_to(&mut self, path: &str) -> Result<(), ScriptError>;
    fn can_continue(&self) -> bool;
    fn continue_line(&mut self) -> String;
    /// Texts of the currently offered choices, in order.
    fn current_choices(&self) -> Vec<String>;
    fn choose_choice(&mut self, index: usize);
    /// Tags attached to the most recently produced line.
    fn current_tags(&self) -> Vec<String>;
    fn bind_externals(&mut self, externals: ScriptExternals);
}

/// Presentation surface collaborator. Visual opening/closing is its
/// responsibility; the engine only issues the triggers and is driven
/// back through `on_continue_pressed` / `on_choice_selected`.
pub trait DialoguePresenter {
    fn open(&self);
    fn close(&self);
    fn display_line(&self, line: &DialogueLine);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogueState {
    Idle,
    /// A line is on screen, waiting for a continue press.
    Presenting,
    /// Choices are on screen; continue presses are invalid.
    AwaitingChoice,
}

/// Splits on unescaped separators, restoring `::` escapes. Always
/// yields at least one part.
fn split_speaker(raw: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = raw.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == SPEAKER_SEPARATOR {
            if chars.peek() == Some(&SPEAKER_SEPARATOR) {
                chars.next();
                current.push(SPEAKER_SEPARATOR);
            } else {
                parts.push(std::mem::take(&mut current));
            }
        } else {
            current.push(ch);
        }
    }
    parts.push(current);
    parts
}

/// Parses one raw interpreter line into speaker/text. One part means no
/// speaker marker at all (keep whatever is shown); a speaker side that
/// trims to nothing is an explicit clear. More than one unescaped
/// separator is malformed input: only the first stays significant and
/// the remainder is rejoined as text.
pub fn parse_dialogue_line(raw: &str) -> DialogueLine {
    let parts = split_speaker(raw);
    let (speaker, text) = match parts.as_slice() {
        [only] => (None, only.trim().to_string()),
        [speaker, text] => (Some(speaker.trim().to_string()), text.trim().to_string()),
        [speaker, rest @ ..] => {
            warn!(
                "dialogue: {} separators in one line, keeping the first: {raw:?}",
                parts.len() - 1
            );
            let text = rest.join(&SPEAKER_SEPARATOR.to_string());
            (Some(speaker.trim().to_string()), text.trim().to_string())
        }
        [] => (None, String::new()),
    };
    DialogueLine {
        speaker,
        text,
        choices: Vec::new(),
    }
}

enum StepOutcome {
    Skip,
    Display(DialogueLine),
    Finished,
}

/// Orchestrator around the embedded interpreter: pulls raw output,
/// parses it, drives the continue/choice protocol and announces session
/// boundaries on the bus. Cloneable handle; the session state lives in a
/// `Cell` and every interpreter borrow is scoped to a single trait call,
/// so interpreter externals may query the flow while a line is being
/// produced.
#[derive(Clone)]
pub struct DialogueFlow {
    interpreter: Rc<RefCell<Box<dyn ScriptInterpreter>>>,
    presenter: Rc<dyn DialoguePresenter>,
    state: Rc<Cell<DialogueState>>,
    bus: EventBus,
}

impl DialogueFlow {
    pub fn new(
        interpreter: Box<dyn ScriptInterpreter>,
        presenter: Rc<dyn DialoguePresenter>,
        bus: EventBus,
    ) -> Self {
        DialogueFlow {
            interpreter: Rc::new(RefCell::new(interpreter)),
            presenter,
            state: Rc::new(Cell::new(DialogueState::Idle)),
            bus,
        }
    }

    pub fn state(&self) -> DialogueState {
        self.state.get()
    }

    pub fn is_active(&self) -> bool {
        self.state.get() != DialogueState::Idle
    }

    pub fn load_script(&self, source: &[u8]) -> Result<(), ScriptError> {
        self.interpreter.borrow_mut().load_script(source)
    }

    /// Opens the presentation surface, jumps the interpreter to `path`
    /// and performs one advance step. A failed jump is logged and the
    /// session closes through the normal end path instead of aborting.
    pub fn start_dialogue(&self, path: &str) {
        if self.state.get() != DialogueState::Idle {
            warn!("dialogue: start_dialogue({path:?}) while a session is active");
            return;
        }
        self.state.set(DialogueState::Presenting);
        self.presenter.open();
        self.bus.emit(&Signal::DialogueOpened);

        if let Err(err) = self.interpreter.borrow_mut().jump_to(path) {
            error!("dialogue: {err}");
        }
        self.advance();
    }

    /// Continue/choice-resolution loop. Empty raw lines are skipped
    /// without being shown; a continue-exhausted interpreter with
    /// pending choices produces a synthesized empty line carrying only
    /// those choices; a fully exhausted interpreter ends the session.
    fn advance(&self) {
        loop {
            let outcome = if self.interpreter.borrow().can_continue() {
                let raw = self.interpreter.borrow_mut().continue_line();
                if raw.trim().is_empty() {
                    StepOutcome::Skip
                } else {
                    let mut line = parse_dialogue_line(&raw);
                    let is_thought = self
                        .interpreter
                        .borrow()
                        .current_tags()
                        .iter()
                        .any(|tag| tag == THOUGHT_TAG);
                    if is_thought {
                        line.text = format!("[i]{}[/i]", line.text);
                    }
                    line.choices = collect_choices(self.interpreter.borrow().current_choices());
                    StepOutcome::Display(line)
                }
            } else {
                let choices = collect_choices(self.interpreter.borrow().current_choices());
                if choices.is_empty() {
                    StepOutcome::Finished
                } else {
                    StepOutcome::Display(DialogueLine {
                        speaker: None,
                        text: String::new(),
                        choices,
                    })
                }
            };

            match outcome {
                StepOutcome::Skip => continue,
                StepOutcome::Display(line) => {
                    self.state.set(if line.choices.is_empty() {
                        DialogueState::Presenting
                    } else {
                        DialogueState::AwaitingChoice
                    });
                    self.presenter.display_line(&line);
                    return;
                }
                StepOutcome::Finished => {
                    self.state.set(DialogueState::Idle);
                    self.presenter.close();
                    self.bus.emit(&Signal::DialogueClosed);
                    return;
                }
            }
        }
    }

    /// Valid only while a plain line is on screen; a press with choices
    /// pending (or no session at all) is logged and ignored.
    pub fn on_continue_pressed(&self) {
        match self.state.get() {
            DialogueState::Presenting => self.advance(),
            DialogueState::AwaitingChoice => {
                warn!("dialogue: continue pressed while a choice is pending");
            }
            DialogueState::Idle => {
                debug!("dialogue: continue pressed with no session active");
            }
        }
    }

    pub fn on_choice_selected(&self, index: usize) {
        if self.state.get() == DialogueState::AwaitingChoice {
            self.interpreter.borrow_mut().choose_choice(index);
            self.advance();
        } else {
            warn!("dialogue: choice {index} selected with none pending");
        }
    }
}

fn collect_choices(texts: Vec<String>) -> Vec<Choice> {
    texts
        .into_iter()
        .enumerate()
        .map(|(index, text)| Choice { text, index })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{
        parse_dialogue_line, DialogueFlow, DialogueLine, DialoguePresenter, DialogueState,
        ScriptError, ScriptExternals, ScriptInterpreter,
    };
    use crate::events::{EventBus, Signal};
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    #[derive(Clone)]
    struct StubLine {
        text: String,
        tags: Vec<String>,
    }

    fn line(text: &str) -> StubLine {
        StubLine {
            text: text.to_string(),
            tags: Vec::new(),
        }
    }

    fn tagged(text: &str, tag: &str) -> StubLine {
        StubLine {
            text: text.to_string(),
            tags: vec![tag.to_string()],
        }
    }

    /// Scripted interpreter: plays `lines`, then offers `choices`; any
    /// selection continues with `after_choice`.
    #[derive(Default)]
    struct StubInterpreter {
        lines: VecDeque<StubLine>,
        choices: Vec<String>,
        after_choice: VecDeque<StubLine>,
        tags: Vec<String>,
        chosen: Rc<RefCell<Vec<usize>>>,
    }

    impl ScriptInterpreter for StubInterpreter {
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
            match self.lines.pop_front() {
                Some(line) => {
                    self.tags = line.tags;
                    line.text
                }
                None => String::new(),
            }
        }

        fn current_choices(&self) -> Vec<String> {
            if self.lines.is_empty() {
                self.choices.clone()
            } else {
                Vec::new()
            }
        }

        fn choose_choice(&mut self, index: usize) {
            self.chosen.borrow_mut().push(index);
            self.choices.clear();
            self.lines = std::mem::take(&mut self.after_choice);
        }

        fn current_tags(&self) -> Vec<String> {
            self.tags.clone()
        }

        fn bind_externals(&mut self, _externals: ScriptExternals) {}
    }

    #[derive(Default)]
    struct RecordingPresenter {
        opens: RefCell<u32>,
        closes: RefCell<u32>,
        lines: RefCell<Vec<DialogueLine>>,
    }

    impl DialoguePresenter for RecordingPresenter {
        fn open(&self) {
            *self.opens.borrow_mut() += 1;
        }

        fn close(&self) {
            *self.closes.borrow_mut() += 1;
        }

        fn display_line(&self, line: &DialogueLine) {
            self.lines.borrow_mut().push(line.clone());
        }
    }

    fn flow_with(
        interpreter: StubInterpreter,
    ) -> (DialogueFlow, Rc<RecordingPresenter>, EventBus) {
        let bus = EventBus::new();
        let presenter = Rc::new(RecordingPresenter::default());
        let flow = DialogueFlow::new(Box::new(interpreter), presenter.clone(), bus.clone());
        (flow, presenter, bus)
    }

    #[test]
    fn parses_speaker_and_text() {
        let parsed = parse_dialogue_line("Alice: Hello");
        assert_eq!(parsed.speaker.as_deref(), Some("Alice"));
        assert_eq!(parsed.text, "Hello");
    }

    #[test]
    fn bare_line_keeps_previous_speaker() {
        let parsed = parse_dialogue_line("Hello");
        assert_eq!(parsed.speaker, None);
        assert_eq!(parsed.text, "Hello");
    }

    #[test]
    fn empty_speaker_side_clears_the_speaker() {
        let parsed = parse_dialogue_line(" : narration resumes");
        assert_eq!(parsed.speaker.as_deref(), Some(""));
        assert_eq!(parsed.text, "narration resumes");
    }

    #[test]
    fn doubled_separator_escapes_a_literal_one() {
        let parsed = parse_dialogue_line("Time::now: tick");
        assert_eq!(parsed.speaker.as_deref(), Some("Time:now"));
        assert_eq!(parsed.text, "tick");
    }

    #[test]
    fn extra_separators_fall_back_to_the_first() {
        let parsed = parse_dialogue_line("Guard: halt: who goes there");
        assert_eq!(parsed.speaker.as_deref(), Some("Guard"));
        assert_eq!(parsed.text, "halt: who goes there");
    }

    #[test]
    fn immediately_ending_script_opens_and_closes_once() {
        let (flow, presenter, bus) = flow_with(StubInterpreter::default());
        let closed = Rc::new(RefCell::new(0u32));
        let probe = closed.clone();
        bus.subscribe(move |signal| {
            if *signal == Signal::DialogueClosed {
                *probe.borrow_mut() += 1;
            }
        });

        flow.start_dialogue("intro");

        assert_eq!(*presenter.opens.borrow(), 1);
        assert_eq!(*presenter.closes.borrow(), 1);
        assert!(presenter.lines.borrow().is_empty());
        assert_eq!(*closed.borrow(), 1);
        assert_eq!(flow.state(), DialogueState::Idle);
    }

    #[test]
    fn blank_lines_are_never_shown() {
        let interpreter = StubInterpreter {
            lines: VecDeque::from([line(""), line("   "), line("Greeter: Welcome")]),
            ..StubInterpreter::default()
        };
        let (flow, presenter, _bus) = flow_with(interpreter);

        flow.start_dialogue("intro");
        let lines = presenter.lines.borrow();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "Welcome");
    }

    #[test]
    fn thought_tag_wraps_text_in_italics() {
        let interpreter = StubInterpreter {
            lines: VecDeque::from([tagged("Maybe I should leave.", "thought")]),
            ..StubInterpreter::default()
        };
        let (flow, presenter, _bus) = flow_with(interpreter);

        flow.start_dialogue("intro");
        assert_eq!(
            presenter.lines.borrow()[0].text,
            "[i]Maybe I should leave.[/i]"
        );
    }

    #[test]
    fn choices_attach_to_the_last_line_and_resolve() {
        let chosen = Rc::new(RefCell::new(Vec::new()));
        let interpreter = StubInterpreter {
            lines: VecDeque::from([line("Keeper: Which way?")]),
            choices: vec!["Left".to_string(), "Right".to_string()],
            after_choice: VecDeque::from([line("Keeper: Safe travels.")]),
            chosen: chosen.clone(),
            ..StubInterpreter::default()
        };
        let (flow, presenter, _bus) = flow_with(interpreter);

        flow.start_dialogue("crossroads");
        {
            let lines = presenter.lines.borrow();
            assert_eq!(lines[0].choices.len(), 2);
            assert_eq!(lines[0].choices[1].text, "Right");
            assert_eq!(lines[0].choices[1].index, 1);
        }
        assert_eq!(flow.state(), DialogueState::AwaitingChoice);

        // Continue is invalid while the choice is pending.
        flow.on_continue_pressed();
        assert_eq!(flow.state(), DialogueState::AwaitingChoice);

        flow.on_choice_selected(1);
        assert_eq!(*chosen.borrow(), vec![1]);
        assert_eq!(presenter.lines.borrow()[1].text, "Safe travels.");

        flow.on_continue_pressed();
        assert_eq!(flow.state(), DialogueState::Idle);
        assert_eq!(*presenter.closes.borrow(), 1);
    }

    #[test]
    fn choice_only_step_synthesizes_an_empty_line() {
        let interpreter = StubInterpreter {
            choices: vec!["Yes".to_string(), "No".to_string()],
            ..StubInterpreter::default()
        };
        let (flow, presenter, _bus) = flow_with(interpreter);

        flow.start_dialogue("prompt");
        let lines = presenter.lines.borrow();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].speaker, None);
        assert!(lines[0].text.is_empty());
        assert_eq!(lines[0].choices.len(), 2);
    }

    #[test]
    fn listener_may_reenter_the_flow_while_a_line_is_produced() {
        // Emits through its externals from inside continue_line, the way
        // a script host does when a script mutates a counter mid-line.
        struct EmittingInterpreter {
            externals: Option<ScriptExternals>,
            remaining: u32,
        }

        impl ScriptInterpreter for EmittingInterpreter {
            fn load_script(&mut self, _source: &[u8]) -> Result<(), ScriptError> {
                Ok(())
            }
            fn jump_to(&mut self, _path: &str) -> Result<(), ScriptError> {
                Ok(())
            }
            fn can_continue(&self) -> bool {
                self.remaining > 0
            }
            fn continue_line(&mut self) -> String {
                self.remaining -= 1;
                if let Some(externals) = &self.externals {
                    externals.add_state("lines_spoken", 1);
                }
                "Guide: Onward.".to_string()
            }
            fn current_choices(&self) -> Vec<String> {
                Vec::new()
            }
            fn choose_choice(&mut self, _index: usize) {}
            fn current_tags(&self) -> Vec<String> {
                Vec::new()
            }
            fn bind_externals(&mut self, externals: ScriptExternals) {
                self.externals = Some(externals);
            }
        }

        let bus = EventBus::new();
        let store = crate::state::StateStore::new(bus.clone());
        let mut interpreter = EmittingInterpreter {
            externals: None,
            remaining: 1,
        };
        interpreter.bind_externals(ScriptExternals::new(store, bus.clone()));
        let presenter = Rc::new(RecordingPresenter::default());
        let flow = DialogueFlow::new(Box::new(interpreter), presenter.clone(), bus.clone());

        let observed = Rc::new(RefCell::new(Vec::new()));
        let probe = observed.clone();
        let reentrant = flow.clone();
        bus.subscribe(move |signal| {
            if *signal == Signal::StateChanged {
                probe.borrow_mut().push(reentrant.state());
                // Guarded re-entry while the line is still in flight.
                reentrant.start_dialogue("again");
            }
        });

        flow.start_dialogue("intro");

        assert_eq!(*observed.borrow(), vec![DialogueState::Presenting]);
        assert_eq!(*presenter.opens.borrow(), 1);
        assert_eq!(presenter.lines.borrow().len(), 1);
    }

    #[test]
    fn stray_input_while_idle_is_ignored() {
        let (flow, presenter, _bus) = flow_with(StubInterpreter::default());
        flow.on_continue_pressed();
        flow.on_choice_selected(0);
        assert_eq!(*presenter.opens.borrow(), 0);
        assert_eq!(flow.state(), DialogueState::Idle);
    }
}
