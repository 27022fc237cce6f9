use std::cell::RefCell;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use anyhow::{Context, Result};
use serde::Serialize;
use wayfarer_core::{Counter, EventBus, Signal, SubscriberId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JournalEntry {
    pub sequence: u32,
    pub label: String,
}

#[derive(Debug, Serialize)]
pub struct JournalReport {
    pub events: Vec<JournalEntry>,
    /// Final counter values at the time the report was taken.
    pub counters: Vec<Counter>,
}

/// Ordered record of everything observable a run produced: bus signals
/// plus host-side effect-axis changes. One journal per run, shared by
/// handle between the shell, the panels and the bus listener.
#[derive(Clone, Default)]
pub struct Journal {
    labels: Rc<RefCell<Vec<String>>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, label: impl Into<String>) {
        self.labels.borrow_mut().push(label.into());
    }

    /// Mirrors every bus signal into the journal.
    pub fn attach(&self, bus: &EventBus) -> SubscriberId {
        let journal = self.clone();
        bus.subscribe(move |signal| journal.record(signal_label(signal)))
    }

    pub fn labels(&self) -> Vec<String> {
        self.labels.borrow().clone()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels.borrow().iter().any(|entry| entry == label)
    }

    pub fn report(&self, counters: Vec<Counter>) -> JournalReport {
        JournalReport {
            events: self
                .labels
                .borrow()
                .iter()
                .enumerate()
                .map(|(sequence, label)| JournalEntry {
                    sequence: sequence as u32,
                    label: label.clone(),
                })
                .collect(),
            counters,
        }
    }

    pub fn write_json(&self, path: &Path, counters: Vec<Counter>) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.report(counters))
            .context("serializing run journal to JSON")?;
        fs::write(path, &json)
            .with_context(|| format!("writing run journal to {}", path.display()))?;
        Ok(())
    }
}

fn signal_label(signal: &Signal) -> String {
    match signal {
        Signal::StateChanged => "state.changed".to_string(),
        Signal::BaseMenuOpening => "menu.base_opening".to_string(),
        Signal::BaseMenuClosed => "menu.base_closed".to_string(),
        Signal::DialogueOpened => "dialogue.opened".to_string(),
        Signal::DialogueClosed => "dialogue.closed".to_string(),
        Signal::ScriptEvent(name) => format!("script.event {name}"),
        Signal::Interacted(name) => format!("interact.execute {name}"),
        Signal::Selected(name) => format!("interact.select {name}"),
        Signal::Deselected(name) => format!("interact.deselect {name}"),
    }
}
