//! Iterate terminal driver.
//!
//! Plays one chat turn against the scripted panel and prints the timeline as
//! it unfolds.
//!
//! Usage:
//!   iterate chat "build me a dashboard"
//!   iterate chat --attach mock.png --attach brief.pdf "make it look like this"
//!   iterate chat --seed 7 --json "same answer every time"
//!   iterate scenarios
//!   iterate flags --toggle debug_mode

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast::Receiver;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use iterate_kernel::{
    BlobUrlBackend, CardKey, ChatPanel, PanelConfig, RevealCard, RevealEvent, RevealIcon,
    RevealState, ScenarioCatalog, StaticCatalog, TimelineEvent,
};
use iterate_types::{ACCEPTED_FILE_TYPES, ChangeSet, Message, RawAttachment, Role, ScenarioStep};

/// Scripted AI chat panel in the terminal.
#[derive(Parser, Debug)]
#[command(name = "iterate")]
#[command(about = "Scripted AI coding-assistant chat panel")]
struct Args {
    /// Config file (default: $XDG_CONFIG_HOME/iterate/config.ron)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Scenario catalog in RON (default: $XDG_CONFIG_HOME/iterate/scenarios.ron, else built-in)
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send one message and watch the scripted reply
    Chat {
        /// Attach a file (repeatable, at most three per message)
        #[arg(short, long = "attach", value_name = "PATH")]
        attachments: Vec<PathBuf>,

        /// Fix scenario selection
        #[arg(long)]
        seed: Option<u64>,

        /// Print the final timeline as JSON
        #[arg(long)]
        json: bool,

        /// Message text
        text: Vec<String>,
    },
    /// List the scenarios in the catalog
    Scenarios,
    /// Show feature flags, or toggle one and save the config
    Flags {
        #[arg(long, value_name = "NAME")]
        toggle: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => PanelConfig::default_path().context("no config directory on this platform")?,
    };
    let config = PanelConfig::load(&config_path)?;
    init_tracing(config.flags.debug_mode);

    match args.command {
        Command::Chat {
            attachments,
            seed,
            json,
            text,
        } => {
            let catalog = load_catalog(args.catalog.as_deref())?;
            let config = PanelConfig {
                seed: seed.or(config.seed),
                ..config
            };
            cmd_chat(&config, catalog, &attachments, &text.join(" "), json).await
        }
        Command::Scenarios => cmd_scenarios(load_catalog(args.catalog.as_deref())?.as_ref()),
        Command::Flags { toggle } => cmd_flags(config, &config_path, toggle.as_deref()),
    }
}

fn init_tracing(debug_mode: bool) {
    let default = if debug_mode { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_catalog(path: Option<&Path>) -> Result<Arc<dyn ScenarioCatalog>> {
    let user_catalog = dirs::config_dir()
        .map(|d| d.join("iterate").join("scenarios.ron"))
        .filter(|p| p.exists());

    let catalog = match path.map(Path::to_path_buf).or(user_catalog) {
        Some(path) => StaticCatalog::load(&path)
            .with_context(|| format!("loading catalog {}", path.display()))?,
        None => StaticCatalog::builtin().context("built-in catalog")?,
    };
    Ok(Arc::new(catalog))
}

// ============================================================================
// chat
// ============================================================================

async fn cmd_chat(
    config: &PanelConfig,
    catalog: Arc<dyn ScenarioCatalog>,
    paths: &[PathBuf],
    text: &str,
    json: bool,
) -> Result<()> {
    let backend = Arc::new(BlobUrlBackend::new());
    let mut panel = ChatPanel::new(config, catalog, backend);
    let printer = tokio::spawn(print_events(panel.subscribe(), panel.subscribe_reveals()));

    for message in panel.messages() {
        print_message(&message);
    }

    for path in paths {
        let raw = read_attachment(path)?;
        if !iterate_types::is_accepted(&raw.name, &raw.mime_type) {
            eprintln!("skipping {}: only {ACCEPTED_FILE_TYPES} can be attached", path.display());
            continue;
        }
        if let Err(e) = panel.add_attachment(raw) {
            eprintln!("skipping {}: {e}", path.display());
        }
    }

    if panel.submit(text).is_none() {
        eprintln!("nothing to send");
        return Ok(());
    }

    tokio::select! {
        _ = settle(&mut panel) => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted");
        }
    }
    panel.teardown();

    let transcript = json.then(|| panel.transcript_json()).transpose()?;
    drop(panel);
    printer.await.context("event printer")?;

    if let Some(transcript) = transcript {
        println!("{transcript}");
    }
    Ok(())
}

/// Wait for the playback and every card reveal to finish.
async fn settle(panel: &mut ChatPanel) {
    panel.wait_idle().await;
    let keys: Vec<CardKey> = panel
        .messages()
        .iter()
        .flat_map(|m| {
            (0..m.changes().len()).map(|index| CardKey {
                message: m.id,
                index,
            })
        })
        .collect();
    for key in keys {
        while panel.reveal_card(key).is_some_and(|c| !c.is_complete()) {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
    }
}

fn read_attachment(path: &Path) -> Result<RawAttachment> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    Ok(RawAttachment::new(name, mime.essence_str(), bytes))
}

/// Print timeline and reveal events until both channels close.
async fn print_events(mut timeline: Receiver<TimelineEvent>, mut reveals: Receiver<RevealEvent>) {
    let mut cards: HashMap<CardKey, RevealCard> = HashMap::new();
    let mut timeline_open = true;
    let mut reveals_open = true;

    while timeline_open || reveals_open {
        // Timeline first: a card must be known before its reveal events
        tokio::select! {
            biased;
            event = timeline.recv(), if timeline_open => match event {
                Ok(TimelineEvent::Appended(message)) if message.changes().is_empty() => {
                    print_message(&message);
                }
                Ok(TimelineEvent::Appended(message)) => {
                    for (index, change) in message.changes().iter().enumerate() {
                        let key = CardKey { message: message.id, index };
                        cards.insert(key, RevealCard::new(change.clone()));
                    }
                }
                Ok(TimelineEvent::Removed(_)) => {}
                Err(RecvError::Lagged(n)) => tracing::warn!("printer lagged, {n} events dropped"),
                Err(RecvError::Closed) => timeline_open = false,
            },
            event = reveals.recv(), if reveals_open => match event {
                Ok(RevealEvent::Started(key)) => {
                    if let Some(card) = cards.get_mut(&key) {
                        card.start();
                    }
                    if let Some(card) = cards.get(&key).filter(|c| !c.is_complete()) {
                        println!("{} {} {}", icon(card), card.action_label(), card.display_filename());
                    }
                }
                Ok(RevealEvent::LineRevealed { key, index, line }) => {
                    if let Some(card) = cards.get_mut(&key) {
                        card.advance(RevealState::Revealing(index + 1));
                        println!("{}", revealed_line(card, &line));
                    }
                }
                Ok(RevealEvent::Completed(key)) => {
                    if let Some(card) = cards.get_mut(&key) {
                        card.advance(RevealState::Complete);
                        println!("{} {} {}", icon(card), card.action_label(), card.display_filename());
                    }
                }
                Err(RecvError::Lagged(n)) => tracing::warn!("printer lagged, {n} reveal events dropped"),
                Err(RecvError::Closed) => reveals_open = false,
            },
        }
    }
}

fn print_message(message: &Message) {
    match (&message.file_changes, message.role) {
        (Some(ChangeSet::Placeholder), _) => println!("  ... thinking"),
        (_, Role::User) => {
            println!("> {}", message.content);
            for attachment in message.attachments.iter().flatten() {
                println!("  [{}] {} ({} bytes)", attachment.mime_type, attachment.name, attachment.byte_size);
            }
        }
        (_, Role::Assistant) => println!("{}", message.content),
    }
}

/// One revealed change-log line, tagged with its card's file.
fn revealed_line(card: &RevealCard, line: &str) -> String {
    format!("    {} + {line}", card.display_filename())
}

fn icon(card: &RevealCard) -> &'static str {
    match card.icon() {
        RevealIcon::Spinner => "◌",
        RevealIcon::Pen => "✎",
        RevealIcon::Trash => "✗",
    }
}

// ============================================================================
// scenarios / flags
// ============================================================================

fn cmd_scenarios(catalog: &dyn ScenarioCatalog) -> Result<()> {
    for (i, scenario) in catalog.scenarios().iter().enumerate() {
        let headline = scenario.summary.lines().next().unwrap_or_default();
        println!("{i}: {headline}");
        for step in &scenario.steps {
            match step {
                ScenarioStep::Thinking(text) => println!("     thinking: {text}"),
                ScenarioStep::FileChanges(changes) => {
                    for change in changes {
                        println!("     {:<9} {}", change.action.as_str(), change.filename);
                    }
                }
            }
        }
    }
    Ok(())
}

fn cmd_flags(mut config: PanelConfig, path: &Path, toggle: Option<&str>) -> Result<()> {
    if let Some(name) = toggle {
        let value = config.flags.toggle(name)?;
        config
            .save(path)
            .with_context(|| format!("saving {}", path.display()))?;
        tracing::info!(flag = name, value, path = %path.display(), "flag toggled");
    }
    for (name, value) in config.flags.iter() {
        println!("{name:<24} {value}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use iterate_types::{FileAction, FileChange};

    #[test]
    fn test_revealed_lines_name_their_card() {
        let card = |path: &str| {
            RevealCard::new(FileChange::new("1", path, FileAction::Creating, vec!["x".into()]))
        };
        let header = card("src/components/Header.tsx");
        let footer = card("src/components/Footer.tsx");

        let a = revealed_line(&header, "export function Header()");
        let b = revealed_line(&footer, "export function Footer()");
        assert_eq!(a, "    .../components/Header.tsx + export function Header()");
        assert!(b.contains(".../components/Footer.tsx"));
        assert_ne!(a, revealed_line(&footer, "export function Header()"));
    }
}
