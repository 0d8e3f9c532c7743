//! auditrail operator CLI
//!
//! Runs the buffered tool-call scenario, demonstrates tamper detection, and
//! inspects JSON-lines audit stores written by the `file` storage backend.
//!
//! Usage:
//!   cargo run -p auditrail-cli -- scenario
//!   cargo run -p auditrail-cli -- tamper
//!   cargo run -p auditrail-cli -- verify --file audit.jsonl
//!   cargo run -p auditrail-cli -- query --file audit.jsonl --trace-id t1
//!   cargo run -p auditrail-cli -- cleanup --file audit.jsonl --older-than-days 30

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use auditrail::{
    load_config_file, AuditConfig, AuditLogger, AuditResult, AuditTrailBuilder, DestinationConfig,
    EventType, HashMode, LogOptions, Outcome, QueryFilter, StorageConfig, Target,
    VerificationReport,
};

// ── CLI definition ────────────────────────────────────────────────────────────

/// auditrail: tamper-evident, hash-chained audit trail.
#[derive(Parser)]
#[command(
    name = "auditrail",
    about = "Tamper-evident audit trail tools",
    long_about = "Demonstrates the buffered, hash-chained audit logger and verifies,\n\
                  queries and prunes JSON-lines audit stores."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log three tool calls with a buffer of two, then query and verify.
    Scenario {
        /// TOML configuration to start from instead of the built-in one.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Log a short chain, alter one event, and show what verification finds.
    Tamper,
    /// Verify the hash chain of a JSONL store.
    Verify {
        #[arg(long)]
        file: PathBuf,
        #[command(flatten)]
        chain: ChainArgs,
    },
    /// Print matching events of a JSONL store, one JSON object per line.
    Query {
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        trace_id: Option<String>,
        /// Event type, e.g. `tool.call`.  Repeat for several.
        #[arg(long = "type")]
        types: Vec<EventType>,
        #[arg(long, default_value_t = 100)]
        limit: usize,
        /// Newest first.
        #[arg(long)]
        desc: bool,
        #[command(flatten)]
        chain: ChainArgs,
    },
    /// Delete events older than N days and record a `system.retention` event.
    Cleanup {
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        older_than_days: u32,
        #[command(flatten)]
        chain: ChainArgs,
    },
}

/// How the store was chained.
#[derive(clap::Args)]
struct ChainArgs {
    /// The store uses the FNV-1a checksum chain instead of SHA-256.
    #[arg(long)]
    checksum: bool,
    /// HMAC key the entries were signed with.
    #[arg(long)]
    signing_key: Option<String>,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Set RUST_LOG=debug for the pipeline's own tracing output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Scenario { config } => run_scenario(config.as_deref()).await,
        Command::Tamper => run_tamper().await,
        Command::Verify { file, chain } => run_verify(file, &chain).await,
        Command::Query {
            file,
            trace_id,
            types,
            limit,
            desc,
            chain,
        } => {
            let mut filter = QueryFilter::new().limit(limit);
            if let Some(trace_id) = trace_id {
                filter = filter.trace(trace_id);
            }
            if !types.is_empty() {
                filter = filter.types(types);
            }
            if desc {
                filter = filter.descending();
            }
            run_query(file, &chain, &filter).await
        }
        Command::Cleanup {
            file,
            older_than_days,
            chain,
        } => run_cleanup(file, &chain, older_than_days).await,
    };

    if let Err(e) = result {
        eprintln!("auditrail error: {}", e);
        std::process::exit(1);
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

async fn run_scenario(config_path: Option<&Path>) -> AuditResult<()> {
    let config = match config_path {
        Some(path) => load_config_file(path)?,
        None => AuditConfig {
            service_name: "auditrail-demo".to_string(),
            buffer_size: 2,
            hash_sensitive_data: false,
            destinations: vec![DestinationConfig::Console {
                enabled: true,
                pretty: true,
                filter: None,
            }],
            ..AuditConfig::default()
        },
    };
    let logger = AuditTrailBuilder::new(config).build()?;

    println!("Logging three tool calls under trace t1 (buffer size {}):", logger.config().buffer_size);
    for (n, tool) in ["search", "fetch", "summarize"].into_iter().enumerate() {
        logger
            .log(
                EventType::ToolCall,
                LogOptions::new()
                    .target(Target::new("tool", tool))
                    .detail("step", n + 1)
                    .trace("t1"),
            )
            .await?;
        println!("  after call {}: {} buffered", n + 1, logger.pending());
    }

    let report = logger.flush().await?;
    println!("Flushed {} event(s), {} delivery failure(s).", report.flushed, report.failures.len());

    let events = logger.query(&QueryFilter::new().trace("t1"))?;
    println!("Query trace=t1 returned {} event(s).", events.len());

    print_report(&logger.verify_integrity(None)?);
    logger.close().await?;
    Ok(())
}

async fn run_tamper() -> AuditResult<()> {
    let logger = AuditTrailBuilder::new(AuditConfig {
        service_name: "auditrail-demo".to_string(),
        ..AuditConfig::default()
    })
    .without_timer()
    .build()?;

    for amount in [10, 20, 30] {
        logger
            .log(
                EventType::ToolResult,
                LogOptions::new()
                    .target(Target::new("tool", "payments"))
                    .detail("amount", amount),
            )
            .await?;
    }
    logger.flush().await?;

    let mut events = logger.query(&QueryFilter::new())?;
    println!("Untouched chain:");
    print_report(&logger.verify_integrity(Some(&events))?);

    if let Some(victim) = events.get_mut(1) {
        println!("Rewriting event {}: amount 20 -> 2000, outcome -> failure", victim.id);
        victim.details.insert("amount".to_string(), serde_json::json!(2000));
        victim.outcome = Outcome::Failure;
    }
    println!("Tampered chain:");
    print_report(&logger.verify_integrity(Some(&events))?);

    logger.close().await?;
    Ok(())
}

async fn run_verify(file: PathBuf, chain: &ChainArgs) -> AuditResult<()> {
    let logger = open_store(file, chain)?;
    let report = logger.verify_integrity(None)?;
    print_report(&report);
    logger.close().await?;
    if report.valid {
        Ok(())
    } else {
        Err(auditrail::AuditError::Storage {
            reason: format!("{} integrity finding(s)", report.errors.len()),
        })
    }
}

async fn run_query(file: PathBuf, chain: &ChainArgs, filter: &QueryFilter) -> AuditResult<()> {
    let logger = open_store(file, chain)?;
    let total = logger.count(filter)?;
    for event in logger.query(filter)? {
        println!("{}", serde_json::to_string(&event)?);
    }
    info!(total, "query complete");
    logger.close().await?;
    Ok(())
}

async fn run_cleanup(file: PathBuf, chain: &ChainArgs, older_than_days: u32) -> AuditResult<()> {
    let logger = open_store(file, chain)?;
    let deleted = logger.cleanup(older_than_days).await?;
    logger.close().await?;
    println!("Deleted {} event(s) older than {} day(s).", deleted, older_than_days);
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// A logger over an existing JSONL store, with no destinations or timer.
fn open_store(file: PathBuf, chain: &ChainArgs) -> AuditResult<AuditLogger> {
    let config = AuditConfig {
        service_name: "auditrail-cli".to_string(),
        hash_algorithm: if chain.checksum {
            HashMode::Checksum
        } else {
            HashMode::Sha256
        },
        sign_entries: chain.signing_key.is_some(),
        signing_key: chain.signing_key.clone(),
        storage: StorageConfig::File { path: file },
        ..AuditConfig::default()
    };
    AuditTrailBuilder::new(config).without_timer().build()
}

fn print_report(report: &VerificationReport) {
    let verdict = if report.valid { "VALID" } else { "INVALID" };
    println!(
        "  {} ({} event(s), mode {}{})",
        verdict,
        report.checked,
        report.mode.as_str(),
        if report.cryptographic { "" } else { ", not cryptographic" },
    );
    for error in &report.errors {
        println!("    - {}", error);
    }
}
