use clap::Parser;
use std::path::PathBuf;

/// Console host for wayfarer dialogue scripts.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Args {
    /// Lua dialogue script to load
    #[arg(long, default_value = "scripts/lantern_keeper.lua")]
    pub script: PathBuf,

    /// Dialogue path (global Lua function) to start from
    #[arg(long, default_value = "main")]
    pub start: String,

    /// Seed a state counter before the script runs, as ID=AMOUNT
    #[arg(long, value_name = "ID=AMOUNT", value_parser = parse_seed)]
    pub seed: Vec<(String, i64)>,

    /// Answer for each choice menu in order, 0-based; unanswered menus
    /// take the first option
    #[arg(long, value_name = "INDEX")]
    pub choose: Vec<usize>,

    /// Write the session journal as JSON to this path
    #[arg(long, value_name = "PATH")]
    pub journal_json: Option<PathBuf>,

    /// Suppress the console transcript, keep the journal
    #[arg(long)]
    pub quiet: bool,

    /// Log at debug level regardless of RUST_LOG
    #[arg(long)]
    pub verbose: bool,

    /// Open and close the pause menu once before the dialogue starts
    #[arg(long)]
    pub pause_demo: bool,

    /// Run a three-step interactable chain before the dialogue starts
    #[arg(long)]
    pub chain_demo: bool,
}

fn parse_seed(raw: &str) -> Result<(String, i64), String> {
    let (id, amount) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected ID=AMOUNT, got {raw:?}"))?;
    let id = id.trim();
    if id.is_empty() {
        return Err(format!("empty counter id in {raw:?}"));
    }
    let amount = amount
        .trim()
        .parse::<i64>()
        .map_err(|err| format!("bad amount in {raw:?}: {err}"))?;
    Ok((id.to_string(), amount))
}
