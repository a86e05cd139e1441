// Entrypoint for the CLI application.
// - Without a subcommand, runs the interactive action menu.
// - `register` / `update` run a single action and exit non-zero on failure.

use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use model_register::{
    api::ApiClient,
    config::{Overrides, Settings},
    logs::init_logging,
    ui::{main_menu, run_register, run_update, LinePrompt, TerminalPrompt},
};
use tracing::debug;

#[derive(Parser)]
#[command(name = "model-register")]
#[command(version, about = "Register or update model variants in the meta-manager API")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Base URL of the meta-manager API
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// JSON config file (defaults to <config dir>/model-register/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Register a new manual variant
    Register,

    /// Update the serving configuration of an existing model
    Update {
        /// Model to update
        #[arg(long)]
        model_id: Option<String>,
    },
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let model_id = match &cli.command {
        Some(Command::Update { model_id }) => model_id.clone(),
        _ => None,
    };
    let flags = Overrides {
        api_url: cli.api_url,
        model_id,
        timeout_secs: cli.timeout,
    };
    let settings =
        Settings::load(cli.config.as_deref(), &flags).context("Failed to load settings")?;
    debug!(?settings, "resolved settings");

    let api = ApiClient::new(&settings)?;
    let mut stdout = io::stdout();

    let ok = match cli.command {
        Some(Command::Register) => run_register(&api, &mut stdout)?,
        Some(Command::Update { .. }) => run_update(&api, &settings.model_id, &mut stdout)?,
        None => {
            if io::stdin().is_terminal() {
                main_menu(&api, &settings.model_id, &mut TerminalPrompt, &mut stdout)?;
            } else {
                let mut prompt = LinePrompt::new(io::stdin().lock(), io::stdout());
                main_menu(&api, &settings.model_id, &mut prompt, &mut stdout)?;
            }
            true
        }
    };

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
