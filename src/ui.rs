// UI layer: the numbered action menu and the register/update flows.
// Output goes to any `Write` so the same flows serve the interactive menu,
// the one-shot subcommands and the tests.

use crate::api::{ApiClient, Outcome};
use crate::model::{ModelConfig, UpdateRequest};
use anyhow::{Context, Result};
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{BufRead, Write};
use std::time::Duration;

const RULE: &str = "==================================================";

/// One entry of the action menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Register,
    Update,
    Exit,
}

impl MenuChoice {
    /// Accepts `1`, `2` or `3`, ignoring surrounding whitespace.
    pub fn parse(input: &str) -> Option<MenuChoice> {
        match input.trim() {
            "1" => Some(MenuChoice::Register),
            "2" => Some(MenuChoice::Update),
            "3" => Some(MenuChoice::Exit),
            _ => None,
        }
    }
}

/// Source of menu answers. `None` means input is exhausted.
pub trait Prompt {
    fn choice(&mut self, prompt: &str) -> Result<Option<String>>;
}

/// Prompt backed by `dialoguer` for interactive terminals.
pub struct TerminalPrompt;

impl Prompt for TerminalPrompt {
    fn choice(&mut self, prompt: &str) -> Result<Option<String>> {
        let answer: String = Input::new()
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()
            .context("Failed to read menu choice")?;
        Ok(Some(answer))
    }
}

/// Prompt reading one line per answer, used when stdin is piped.
pub struct LinePrompt<R, W> {
    reader: R,
    echo: W,
}

impl<R: BufRead, W: Write> LinePrompt<R, W> {
    pub fn new(reader: R, echo: W) -> Self {
        LinePrompt { reader, echo }
    }
}

impl<R: BufRead, W: Write> Prompt for LinePrompt<R, W> {
    fn choice(&mut self, prompt: &str) -> Result<Option<String>> {
        write!(self.echo, "\n{}: ", prompt)?;
        self.echo.flush()?;
        let mut line = String::new();
        let read = self
            .reader
            .read_line(&mut line)
            .context("Failed to read menu choice")?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line))
    }
}

/// Main menu loop. Runs until the user picks "Exit" or input ends.
pub fn main_menu<P: Prompt, W: Write>(
    api: &ApiClient,
    model_id: &str,
    prompt: &mut P,
    out: &mut W,
) -> Result<()> {
    writeln!(out, "🤖 MANUAL MODEL DEPLOYMENT")?;
    writeln!(out, "Register or update models in the meta-manager from this machine.")?;
    writeln!(out, "{}", "=".repeat(60))?;

    loop {
        writeln!(out, "\nChoose an action:")?;
        writeln!(out, "1. Register new model")?;
        writeln!(out, "2. Update existing model")?;
        writeln!(out, "3. Exit")?;
        out.flush()?;

        let raw = match prompt.choice("Enter your choice (1-3)")? {
            Some(raw) => raw,
            None => {
                writeln!(out, "\n👋 Goodbye!")?;
                break;
            }
        };

        match MenuChoice::parse(&raw) {
            Some(MenuChoice::Register) => {
                writeln!(out)?;
                if run_register(api, out)? {
                    writeln!(out, "\n🎉 Model registration completed!")?;
                } else {
                    writeln!(out, "\n❌ Model registration failed!")?;
                }
            }
            Some(MenuChoice::Update) => {
                writeln!(out)?;
                if run_update(api, model_id, out)? {
                    writeln!(out, "\n🎉 Model update completed!")?;
                } else {
                    writeln!(out, "\n❌ Model update failed!")?;
                }
            }
            Some(MenuChoice::Exit) => {
                writeln!(out, "\n👋 Goodbye!")?;
                break;
            }
            None => writeln!(out, "❌ Invalid choice. Please enter 1, 2, or 3.")?,
        }
    }
    Ok(())
}

/// Register a fresh manual variant and report the result. Returns whether
/// the registration counts as successful.
pub fn run_register<W: Write>(api: &ApiClient, out: &mut W) -> Result<bool> {
    let config = ModelConfig::manual_now();

    writeln!(out, "🚀 MANUAL MODEL REGISTRATION")?;
    writeln!(out, "{}", RULE)?;
    writeln!(out, "Model: {}", config.model_name)?;
    writeln!(out, "Variant: {}", config.variant)?;
    writeln!(out, "API URL: {}", api.register_url())?;
    writeln!(out)?;
    writeln!(out, "Registering model...")?;
    out.flush()?;

    let spinner = spinner("Registering...");
    let outcome = api.register_model(&config);
    spinner.finish_and_clear();

    report(&outcome, out)?;
    Ok(outcome.is_success())
}

/// Push the scaled serving configuration to `model_id` and report the
/// result.
pub fn run_update<W: Write>(api: &ApiClient, model_id: &str, out: &mut W) -> Result<bool> {
    let update = UpdateRequest::scaled_serving();

    writeln!(out, "🔄 MANUAL MODEL UPDATE")?;
    writeln!(out, "{}", RULE)?;
    writeln!(out, "Model ID: {}", model_id)?;
    writeln!(out, "API URL: {}", api.update_url(model_id))?;
    writeln!(out)?;
    writeln!(out, "Updating model...")?;
    out.flush()?;

    let spinner = spinner("Updating...");
    let outcome = api.update_model(model_id, &update);
    spinner.finish_and_clear();

    report(&outcome, out)?;
    Ok(outcome.is_success())
}

/// Print the status line and the success/failure details of an outcome.
pub fn report<W: Write>(outcome: &Outcome, out: &mut W) -> Result<()> {
    if let Some(status) = outcome.status() {
        writeln!(out, "📊 Response Status: {}", status.as_u16())?;
    }
    match outcome {
        Outcome::Registered { model_id, .. } => {
            writeln!(out, "✅ SUCCESS: Model registered successfully!")?;
            writeln!(out, "📋 Model ID: {}", model_id.as_deref().unwrap_or("Unknown"))?;
        }
        Outcome::AlreadyExists { .. } => {
            writeln!(out, "ℹ️ Model variant already exists - this is normal")?;
            writeln!(out, "✅ SUCCESS: Registration completed (model exists)")?;
        }
        Outcome::Updated { .. } => {
            writeln!(out, "✅ SUCCESS: Model updated successfully!")?;
        }
        Outcome::Rejected { status, body } => {
            writeln!(out, "❌ FAILED: Status {}", status.as_u16())?;
            writeln!(out, "Response: {}", body)?;
        }
        Outcome::Transport(err) => {
            writeln!(out, "❌ FAILED: Request error: {}", err)?;
        }
    }
    Ok(())
}

// Draws on stderr and stays hidden when stderr is not a terminal.
fn spinner(msg: &'static str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(msg);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}
