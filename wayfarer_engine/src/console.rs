use std::cell::RefCell;

use wayfarer_core::{DialogueLine, DialoguePresenter, GameShell, MenuPanel};

use crate::journal::Journal;

/// Console rendition of the dialogue presentation surface. Keeps the
/// previously shown speaker across `speaker: None` lines and records a
/// transcript for the regression tests.
pub struct ConsolePresenter {
    journal: Journal,
    speaker: RefCell<Option<String>>,
    transcript: RefCell<Vec<String>>,
    quiet: bool,
}

impl ConsolePresenter {
    pub fn new(journal: Journal) -> Self {
        ConsolePresenter {
            journal,
            speaker: RefCell::new(None),
            transcript: RefCell::new(Vec::new()),
            quiet: false,
        }
    }

    /// Transcript-only presenter for tests.
    pub fn quiet(journal: Journal) -> Self {
        ConsolePresenter {
            quiet: true,
            ..ConsolePresenter::new(journal)
        }
    }

    pub fn transcript(&self) -> Vec<String> {
        self.transcript.borrow().clone()
    }

    fn render(&self, line: &DialogueLine) -> String {
        match &line.speaker {
            Some(name) if name.is_empty() => *self.speaker.borrow_mut() = None,
            Some(name) => *self.speaker.borrow_mut() = Some(name.clone()),
            None => {}
        }
        match self.speaker.borrow().as_deref() {
            Some(name) if !line.text.is_empty() => format!("{name}: {}", line.text),
            _ => line.text.clone(),
        }
    }
}

impl DialoguePresenter for ConsolePresenter {
    fn open(&self) {
        self.journal.record("presenter.open");
    }

    fn close(&self) {
        self.journal.record("presenter.close");
        *self.speaker.borrow_mut() = None;
    }

    fn display_line(&self, line: &DialogueLine) {
        let rendered = self.render(line);
        if !rendered.is_empty() {
            if !self.quiet {
                println!("{rendered}");
            }
            self.transcript.borrow_mut().push(rendered);
        }
        for choice in &line.choices {
            let entry = format!("  {}) {}", choice.index + 1, choice.text);
            if !self.quiet {
                println!("{entry}");
            }
        }
    }
}

/// Effect-axis sink: the host has no real clock or pointer, so mode
/// transitions land in the journal instead.
pub struct JournalShell {
    journal: Journal,
}

impl JournalShell {
    pub fn new(journal: Journal) -> Self {
        JournalShell { journal }
    }
}

impl GameShell for JournalShell {
    fn set_clock_frozen(&self, frozen: bool) {
        self.journal
            .record(format!("shell.clock {}", if frozen { "frozen" } else { "running" }));
    }

    fn set_pointer_captured(&self, captured: bool) {
        self.journal.record(format!(
            "shell.pointer {}",
            if captured { "captured" } else { "released" }
        ));
    }

    fn set_player_input_enabled(&self, enabled: bool) {
        self.journal.record(format!(
            "shell.player_input {}",
            if enabled { "on" } else { "off" }
        ));
    }
}

/// Journal-backed stand-in for an overlay panel.
pub struct JournalPanel {
    name: String,
    journal: Journal,
}

impl JournalPanel {
    pub fn new(name: &str, journal: Journal) -> Self {
        JournalPanel {
            name: name.to_string(),
            journal,
        }
    }

    fn record(&self, action: &str) {
        self.journal.record(format!("panel.{} {}", action, self.name));
    }
}

impl MenuPanel for JournalPanel {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self) {
        self.record("open");
    }

    fn close(&self) {
        self.record("close");
    }

    fn show(&self) {
        self.record("show");
    }

    fn hide(&self) {
        self.record("hide");
    }

    fn focused_control(&self) -> Option<String> {
        None
    }

    fn focus_control(&self, control: &str) {
        self.journal
            .record(format!("panel.focus {} {}", self.name, control));
    }

    fn focus_default(&self) {
        self.record("focus_default");
    }
}
