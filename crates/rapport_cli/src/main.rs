//! `rapport`: drive the decision core from a terminal or a pipe.
//!
//! Each input line is one fragment:
//!
//! ```text
//! g1/u42 (Rohit): kya scene hai
//! > g1/u42: sahi        # a reply to the agent's last message
//! ```
//!
//! Decisions, replies and topic announcements are printed as they happen.
//! Pacing delays are reported, not slept.

use chrono::{DateTime, Utc};
use clap::Parser;
use rapport_core::{InboundMessage, PersonaProfile, RapportConfig, RelationshipStore, ReplyContext};
use rapport_memory::{InMemoryRelationshipStore, SqliteRelationshipStore};
use rapport_reasoning::{providers, DecisionOutcome, Orchestrator, OutboundEvent};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the config file
    #[arg(short, long, default_value = "rapport.toml")]
    config: PathBuf,

    /// Persona file, overrides `persona_path` from the config
    #[arg(short, long)]
    persona: Option<PathBuf>,

    /// Relationship database; relationships live in memory when unset
    #[arg(short, long)]
    db: Option<PathBuf>,

    /// Print one JSON object per event
    #[arg(long)]
    json: bool,

    /// Seed the response sampler for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, env = "RAPPORT_LOG", default_value = "warn")]
    log: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log.as_str().into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = RapportConfig::load_or_default(&args.config);
    if let Some(db) = args.db {
        config.store.db_path = Some(db);
    }
    if let Some(persona) = args.persona {
        config.persona_path = Some(persona);
    }
    config.validate()?;

    let persona = Arc::new(match &config.persona_path {
        Some(path) => PersonaProfile::load(path)?,
        None => PersonaProfile::default(),
    });

    let store: Arc<dyn RelationshipStore> = match &config.store.db_path {
        Some(path) => {
            info!("Opening relationship store at {}", path.display());
            Arc::new(SqliteRelationshipStore::new(path).await?)
        }
        None => Arc::new(InMemoryRelationshipStore::new()),
    };
    let generator = providers::from_config(&config.generation)?;

    let mut orchestrator = Orchestrator::new(config, persona, store, generator);
    if let Some(seed) = args.seed {
        orchestrator = orchestrator.with_seed(seed);
    }
    let orchestrator = Arc::new(orchestrator);

    let (event_tx, mut event_rx) = mpsc::channel(64);
    let background = orchestrator.clone().spawn_background(event_tx);
    let mut line_rx = spawn_reader();

    loop {
        tokio::select! {
            line = line_rx.recv() => {
                let Some(line) = line else { break };
                let trimmed = line.trim();
                if trimmed == "quit" || trimmed == "exit" {
                    break;
                }
                if trimmed.is_empty() {
                    continue;
                }
                match parse_line(trimmed, Utc::now()) {
                    Some(message) => {
                        if let Some(outcome) = orchestrator.ingest(message).await {
                            report(&orchestrator, outcome, args.json).await;
                        }
                    }
                    None => println!("? expected `conversation/sender: text`"),
                }
            }
            Some(event) = event_rx.recv() => emit(&orchestrator, event, args.json).await,
        }
    }

    // input is done: decide whatever is still buffered
    background.abort();
    while let Ok(event) = event_rx.try_recv() {
        emit(&orchestrator, event, args.json).await;
    }
    let drain_at = Utc::now() + chrono::Duration::hours(1);
    for event in orchestrator.flush_tick(drain_at).await {
        emit(&orchestrator, event, args.json).await;
    }
    Ok(())
}

/// Read lines on a plain thread; rustyline blocks.
fn spawn_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        let mut editor = match DefaultEditor::new() {
            Ok(editor) => editor,
            Err(e) => {
                error!("Failed to open line editor: {}", e);
                return;
            }
        };
        loop {
            match editor.readline("") {
                Ok(line) => {
                    let _ = editor.add_history_entry(line.as_str());
                    if tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
                Err(e) => {
                    error!("Input error: {}", e);
                    break;
                }
            }
        }
    });
    rx
}

/// `[>] conversation/sender[ (Name)]: text`
fn parse_line(line: &str, now: DateTime<Utc>) -> Option<InboundMessage> {
    let (is_reply, line) = match line.strip_prefix('>') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, line),
    };
    let (head, text) = line.split_once(':')?;
    let (conversation_id, who) = head.trim().split_once('/')?;
    let (sender_id, sender_name) = match who.split_once('(') {
        Some((id, name)) => (id.trim(), Some(name.trim_end_matches(')').trim().to_string())),
        None => (who.trim(), None),
    };
    if conversation_id.trim().is_empty() || sender_id.is_empty() {
        return None;
    }

    Some(InboundMessage {
        conversation_id: conversation_id.trim().to_string(),
        sender_id: sender_id.to_string(),
        sender_name: sender_name.filter(|n| !n.is_empty()),
        text: text.trim().to_string(),
        received_at: now,
        reply_context: is_reply.then(|| ReplyContext {
            from_agent: true,
            quoted_text: None,
        }),
    })
}

async fn emit(orchestrator: &Orchestrator, event: OutboundEvent, json: bool) {
    match event {
        OutboundEvent::Decision(outcome) => report(orchestrator, outcome, json).await,
        OutboundEvent::Announcement(announcement) => {
            if json {
                println!("{}", serde_json::json!({ "announcement": announcement }));
            } else {
                println!(
                    "[{}/{}] {}",
                    announcement.conversation_id,
                    announcement.sender_id,
                    announcement.text()
                );
            }
        }
    }
}

async fn report(orchestrator: &Orchestrator, outcome: DecisionOutcome, json: bool) {
    let reply = if outcome.should_respond() {
        orchestrator.respond_or_fallback(&outcome).await
    } else {
        None
    };
    let pacing = reply.as_deref().map(|text| {
        let humanizer = orchestrator.humanizer();
        let mut rng = rand::thread_rng();
        (
            humanizer.initial_delay(Utc::now(), &mut rng),
            humanizer.typing_duration(text, &mut rng),
        )
    });

    if json {
        let line = serde_json::json!({
            "decision": outcome.decision,
            "announcement": outcome.announcement,
            "reply": reply,
            "delay_secs": pacing.map(|(d, _)| d.as_secs_f64()),
            "typing_secs": pacing.map(|(_, t)| t.as_secs_f64()),
        });
        println!("{}", line);
        return;
    }

    let decision = &outcome.decision;
    let target = decision
        .utterance_for_generation
        .as_ref()
        .map(|u| format!("{}/{}", u.conversation_id, u.sender_id))
        .unwrap_or_else(|| "-".to_string());
    println!(
        "[{}] {} ({:?}, {:?})",
        target,
        if decision.should_respond { "respond" } else { "quiet" },
        decision.mode,
        decision.reason
    );
    if let (Some(text), Some((delay, typing))) = (&reply, pacing) {
        println!(
            "  {} (after {:.1}s, typing {:.1}s): {}",
            orchestrator.persona().display_name,
            delay.as_secs_f64(),
            typing.as_secs_f64(),
            text
        );
    }
    if let Some(announcement) = &outcome.announcement {
        println!("  {}", announcement.text());
    }
}
