//! Interactive console host
//!
//! Stands in for a mixer surface: gestures are typed at a rustyline prompt and
//! display changes are printed as they happen.

use anyhow::{anyhow, bail, Result};
use colored::*;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{ControlEvent, ControlHandle, DisplayCallback, DisplayUpdate};
use crate::entity::{ControlKind, RemoteEntity};
use crate::registry::ControlRegistry;

const PROMPT: &str = "hass> ";

/// Parsed console line
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    List,
    Gesture(ControlEvent),
    Poll,
    Help,
    Quit,
}

/// Parse one console line
pub fn parse_command(line: &str) -> Result<ConsoleCommand> {
    let mut parts = line.split_whitespace();
    let Some(verb) = parts.next() else {
        bail!("empty command");
    };
    let args: Vec<&str> = parts.collect();

    let command = match (verb.to_ascii_lowercase().as_str(), args.as_slice()) {
        ("list" | "ls", []) => ConsoleCommand::List,
        ("poll", []) => ConsoleCommand::Poll,
        ("help" | "?", []) => ConsoleCommand::Help,
        ("quit" | "exit", []) => ConsoleCommand::Quit,
        ("mute", [id]) => ConsoleCommand::Gesture(ControlEvent::MutePressed {
            id: id.to_string(),
        }),
        ("press", [id]) => ConsoleCommand::Gesture(ControlEvent::Pressed { id: id.to_string() }),
        ("vol", [id, level]) => {
            let level: f32 = level
                .parse()
                .map_err(|_| anyhow!("invalid level '{}', expected 0..1", level))?;
            if !(0.0..=1.0).contains(&level) {
                bail!("level {} out of range 0..1", level);
            }
            ConsoleCommand::Gesture(ControlEvent::VolumeChanged {
                id: id.to_string(),
                level,
            })
        }
        ("mute" | "press", _) => bail!("usage: {} <entity_id>", verb),
        ("vol", _) => bail!("usage: vol <entity_id> <0..1>"),
        _ => bail!("unknown command '{}' (try 'help')", verb),
    };
    Ok(command)
}

/// Start the prompt on its own thread
///
/// rustyline blocks, so lines are forwarded over a channel. The channel closes
/// after `quit`, Ctrl-D or Ctrl-C.
pub fn spawn_repl() -> Result<mpsc::UnboundedReceiver<ConsoleCommand>> {
    let (tx, rx) = mpsc::unbounded_channel();

    std::thread::Builder::new()
        .name("console".to_string())
        .spawn(move || {
            let mut editor = match DefaultEditor::new() {
                Ok(editor) => editor,
                Err(e) => {
                    warn!("Console unavailable: {}", e);
                    let _ = tx.send(ConsoleCommand::Quit);
                    return;
                }
            };
            read_lines(&mut editor, &tx);
        })?;

    debug!("Console prompt started");
    Ok(rx)
}

fn read_lines(editor: &mut DefaultEditor, tx: &mpsc::UnboundedSender<ConsoleCommand>) {
    loop {
        match editor.readline(PROMPT) {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => {
                let _ = editor.add_history_entry(line.as_str());
                match parse_command(&line) {
                    Ok(command) => {
                        let quit = command == ConsoleCommand::Quit;
                        if tx.send(command).is_err() || quit {
                            return;
                        }
                    }
                    Err(e) => println!("{} {}", "✗".red(), e),
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => {
                let _ = tx.send(ConsoleCommand::Quit);
                return;
            }
            Err(e) => {
                warn!("Console read error: {}", e);
                let _ = tx.send(ConsoleCommand::Quit);
                return;
            }
        }
    }
}

/// Display callback that prints every change
pub fn display_printer() -> DisplayCallback {
    Arc::new(|update: &DisplayUpdate| {
        println!(
            "{} {}",
            chrono::Local::now().format("%H:%M:%S%.3f").to_string().dimmed(),
            format_update(update)
        );
    })
}

fn format_update(update: &DisplayUpdate) -> String {
    match update {
        DisplayUpdate::Muted { id, muted } => {
            let led = if *muted { "MUTED".red() } else { "live".green() };
            format!("🎚  {} mute → {}", id.bright_white(), led)
        }
        DisplayUpdate::Volume { id, volume } => {
            format!("🎚  {} level → {}%", id.bright_white(), (volume * 100.0).round())
        }
        DisplayUpdate::Active { id, active } => {
            let led = if *active { "ON".green() } else { "off".dimmed() };
            format!("🔘 {} → {}", id.bright_white(), led)
        }
    }
}

fn format_handle(handle: &ControlHandle) -> String {
    match handle {
        ControlHandle::Fader(fader) => {
            let state = fader.snapshot();
            format!(
                "  {:<7} {:<32} {:<24} {} {:>3}%",
                "fader".cyan(),
                fader.id(),
                fader.display_name(),
                if state.muted { "MUTED".red() } else { "live ".green() },
                (state.volume * 100.0).round()
            )
        }
        ControlHandle::Button(button) => format!(
            "  {:<7} {:<32} {:<24} {}",
            "button".yellow(),
            button.id(),
            button.display_name(),
            if button.active() { "ON".green() } else { "off".dimmed() }
        ),
    }
}

/// Print every registered control with its displayed state
pub fn print_controls(registry: &ControlRegistry) {
    println!("\n{} ({})", "Controls".bold(), registry.len());
    for handle in registry.handles() {
        println!("{}", format_handle(&handle));
    }
    println!();
}

/// Print a discovery snapshot with the classification of each entity
pub fn print_entities(entities: &[RemoteEntity]) {
    println!("\n{}", "=== Home Assistant entities ===".bold().cyan());
    let mut sorted: Vec<&RemoteEntity> = entities.iter().collect();
    sorted.sort_by(|a, b| a.id().cmp(b.id()));

    for entity in sorted {
        let kind = match entity.kind() {
            ControlKind::Fader => "fader".cyan(),
            ControlKind::Button => "button".yellow(),
            ControlKind::Ignore => "-".dimmed(),
        };
        println!(
            "  {:<7} {:<40} {:<8} {}",
            kind,
            entity.id(),
            entity.state,
            entity.display_name()
        );
    }
    println!();
}

pub fn print_help() {
    println!("\n{}", "Commands:".bold());
    println!("  {:<22} show controls", "list".green());
    println!("  {:<22} press the mute button of a fader", "mute <id>".green());
    println!("  {:<22} move a fader", "vol <id> <0..1>".green());
    println!("  {:<22} press a button", "press <id>".green());
    println!("  {:<22} poll Home Assistant now", "poll".green());
    println!("  {:<22} leave", "quit".green());
    println!();
}
