use std::fs;
use std::rc::Rc;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use wayfarer_core::{DialogueState, GameFlow, Interactable, InteractionStep, MenuPolicies};
use wayfarer_engine::cli::Args;
use wayfarer_engine::console::{ConsolePresenter, JournalPanel, JournalShell};
use wayfarer_engine::journal::Journal;
use wayfarer_engine::lua_host::LuaInterpreter;

fn main() -> Result<()> {
    let args = Args::parse();
    let mut logger = env_logger::Builder::from_default_env();
    if args.verbose {
        logger.filter_level(log::LevelFilter::Debug);
    }
    logger.init();

    let journal = Journal::new();
    let presenter = if args.quiet {
        Rc::new(ConsolePresenter::quiet(journal.clone()))
    } else {
        Rc::new(ConsolePresenter::new(journal.clone()))
    };
    let interpreter =
        LuaInterpreter::new().context("initializing the dialogue interpreter")?;

    // The pause demo pops the lone base menu again, which the default
    // prevent-base-closing policy would refuse.
    let policies = MenuPolicies {
        hide_previous: true,
        prevent_base_closing: !args.pause_demo,
    };
    let mut builder = GameFlow::builder()
        .shell(Rc::new(JournalShell::new(journal.clone())))
        .presenter(presenter)
        .interpreter(Box::new(interpreter))
        .base_menu(Rc::new(JournalPanel::new("pause", journal.clone())))
        .menu_policies(policies);
    for (id, amount) in &args.seed {
        builder = builder.seed_counter(id.clone(), *amount);
    }
    let flow = builder.build().context("wiring the gameplay flow")?;
    journal.attach(&flow.bus());

    if args.pause_demo {
        run_pause_demo(&flow);
    }
    if args.chain_demo {
        run_chain_demo(&flow);
    }

    let source = fs::read(&args.script)
        .with_context(|| format!("reading dialogue script {}", args.script.display()))?;
    flow.dialogue()
        .load_script(&source)
        .with_context(|| format!("loading dialogue script {}", args.script.display()))?;

    flow.modes().start_dialogue(&args.start);
    drive_dialogue(&flow, &args.choose);

    for counter in flow.state().counters() {
        info!("counter {} = {}", counter.id, counter.amount);
    }
    if let Some(path) = &args.journal_json {
        flow.ticks().run_pending();
        journal.write_json(path, flow.state().counters())?;
        info!("journal written to {}", path.display());
    }
    Ok(())
}

/// Pumps the dialogue to completion, answering each menu from the
/// queued picks and defaulting to the first option once they run out.
fn drive_dialogue(flow: &GameFlow, picks: &[usize]) {
    let dialogue = flow.dialogue();
    let mut picks = picks.iter().copied();
    while dialogue.is_active() {
        flow.ticks().run_pending();
        match dialogue.state() {
            DialogueState::Presenting => dialogue.on_continue_pressed(),
            DialogueState::AwaitingChoice => {
                dialogue.on_choice_selected(picks.next().unwrap_or(0));
            }
            DialogueState::Idle => break,
        }
    }
    flow.ticks().run_pending();
}

/// Opens and closes the base menu once, showing the pause round trip in
/// the journal.
fn run_pause_demo(flow: &GameFlow) {
    let menus = flow.menus();
    menus.toggle_menu();
    flow.ticks().run_pending();
    menus.toggle_menu();
    flow.ticks().run_pending();
}

/// Walks a three-step interactable chain, each step bumping a counter
/// before handing off to the next.
fn run_chain_demo(flow: &GameFlow) {
    let state = flow.state();
    let steps = vec![
        InteractionStep::with_effect(Some(1), {
            let state = state.clone();
            move || state.add("signpost_reads", 1, true)
        }),
        InteractionStep::with_effect(Some(2), {
            let state = state.clone();
            move || state.add("signpost_reads", 1, true)
        }),
        InteractionStep::with_effect(None, {
            let state = state.clone();
            move || state.add("signpost_reads", 1, true)
        }),
    ];
    let signpost = Interactable::new("signpost", steps, flow.bus());
    signpost.select();
    signpost.interact();
    signpost.interact();
    signpost.interact();
    signpost.deselect();
}
