// ─────────────────────────────────────────────────────────────────────
// Truthal — Operator Commands
// ─────────────────────────────────────────────────────────────────────

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use truthal_core::{
    verify_entries, AuditSink, BranchAgreementVerifier, DisseminationEngine, MemorySink,
};
use truthal_types::{Dissemination, Evidence, GateConfig, GateError};

use crate::audit_files::DailyAuditSink;
use crate::snapshot::{load_snapshot, save_snapshot};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Triage, evaluate and route a JSON array of evidence
    Replay {
        /// File holding a JSON array of evidence records
        #[arg(long)]
        input: PathBuf,
        /// Gate configuration (JSON); defaults apply when omitted
        #[arg(long)]
        config: Option<PathBuf>,
        /// Directory of daily audit files to restore and extend
        #[arg(long)]
        audit_dir: Option<PathBuf>,
        /// Human decisions applied to the approval queue, e.g. y,n,y
        #[arg(long, value_delimiter = ',')]
        decisions: Vec<String>,
        /// Enable the override and spend it on this actor's behalf
        #[arg(long)]
        override_actor: Option<String>,
        /// Seed for the branch-agreement verifier
        #[arg(long)]
        seed: Option<u64>,
        /// Write an engine snapshot to this directory when done
        #[arg(long)]
        snapshot_dir: Option<PathBuf>,
    },
    /// Verify the hash chain stored in an audit directory
    Verify {
        #[arg(long)]
        audit_dir: PathBuf,
    },
    /// Print a saved engine snapshot
    ShowSnapshot {
        #[arg(long)]
        dir: PathBuf,
        #[arg(long)]
        name: String,
    },
    /// Print the effective gate configuration
    ShowConfig {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

pub struct ReplayArgs {
    pub input: PathBuf,
    pub config: Option<PathBuf>,
    pub audit_dir: Option<PathBuf>,
    pub decisions: Vec<bool>,
    pub override_actor: Option<String>,
    pub seed: Option<u64>,
    pub snapshot_dir: Option<PathBuf>,
}

pub fn run() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Replay {
            input,
            config,
            audit_dir,
            decisions,
            override_actor,
            seed,
            snapshot_dir,
        } => {
            let decisions = decisions
                .iter()
                .map(|d| parse_decision(d))
                .collect::<Result<Vec<_>>>()?;
            let report = replay(&ReplayArgs {
                input,
                config,
                audit_dir,
                decisions,
                override_actor,
                seed,
                snapshot_dir,
            })?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Verify { audit_dir } => {
            let count = verify_dir(&audit_dir)?;
            println!("audit chain intact: {count} entries");
        }
        Commands::ShowSnapshot { dir, name } => {
            let snapshot = load_snapshot(&dir, &name)?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        Commands::ShowConfig { config } => {
            let config = load_config(config.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }
    Ok(())
}

fn parse_decision(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" | "approve" | "true" => Ok(true),
        "n" | "no" | "deny" | "false" => Ok(false),
        other => bail!("unrecognized decision '{other}' (expected y or n)"),
    }
}

pub fn load_config(path: Option<&Path>) -> Result<GateConfig> {
    let Some(path) = path else {
        return Ok(GateConfig::default());
    };
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(GateConfig::from_json(&text)?)
}

pub fn replay(args: &ReplayArgs) -> Result<Value> {
    let config = load_config(args.config.as_deref())?;
    let text = fs::read_to_string(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    let items: Vec<Evidence> =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", args.input.display()))?;

    let verifier = Arc::new(match args.seed {
        Some(seed) => BranchAgreementVerifier::with_seed(config.consensus_floor, seed),
        None => BranchAgreementVerifier::new(config.consensus_floor),
    });
    let sink: Arc<dyn AuditSink> = match &args.audit_dir {
        Some(dir) => Arc::new(DailyAuditSink::open(dir)?),
        None => Arc::new(MemorySink::new()),
    };
    let engine = DisseminationEngine::with_sink(config, verifier, sink)?;
    if engine.audit_halted() {
        log::warn!("Restored audit chain failed verification; automatic release is halted");
    }

    if let Some(actor) = &args.override_actor {
        let response = engine.enable_override("operator replay", actor);
        if !response.is_success() {
            log::warn!("Override not enabled: {}", response.message);
        }
    }

    log::info!("Replaying {} evidence items", items.len());
    for evidence in items {
        engine.submit(evidence);
    }

    let mut disseminations = Vec::new();
    while engine.triage_len() > 0 {
        for id in engine.process_triage_batch() {
            let result = match &args.override_actor {
                Some(actor) => engine.disseminate_with_override(&id, actor),
                None => engine.disseminate(&id),
            };
            match result {
                Ok(d) => disseminations.push(d),
                Err(GateError::NotFound(missing)) => {
                    log::warn!("Evidence {missing} vanished before routing");
                    disseminations.push(Dissemination::not_found(missing));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    let outcomes = engine.resolve_batch(&args.decisions);
    let snapshot = engine.snapshot();
    if let Some(dir) = &args.snapshot_dir {
        save_snapshot(dir, None, &snapshot)?;
    }

    Ok(json!({
        "disseminations": disseminations,
        "approvals": outcomes,
        "pending": engine.pending_approvals(),
        "state": engine.get_system_state(),
        "audit_head": engine.last_audit_hash(),
    }))
}

/// Verify an audit directory, returning the entry count when intact.
pub fn verify_dir(dir: &Path) -> Result<usize> {
    let sink = DailyAuditSink::open(dir)?;
    let entries = sink.read_all()?;
    verify_entries(&entries).context("audit chain verification failed")?;
    Ok(entries.len())
}
