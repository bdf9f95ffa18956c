//! auditchain — tamper-evident database audit-log pipeline CLI.
//!
//! Subcommands:
//!   auditchain parse   --db-system <postgres|mysql> --input <raw.log> --output <events.ndjson>
//!   auditchain enrich  [--config <run.yaml>] --input <events.ndjson> --output <enriched.ndjson>
//!   auditchain verify  [--config <run.yaml>] --state <state.json> --input <enriched.ndjson> [--output <annotated.ndjson>] [--checkpoint]
//!   auditchain dict validate --path <dictionary.json>
//!   auditchain version
//!
//! `verify` runs in hash mode (chaining enriched events into annotated ones)
//! when `--output` is given, and in verify mode (checking an existing
//! annotated stream for tampering) otherwise.

mod config;
mod run_log;

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use auditchain_chain::checkpoint::{checkpoint_file_name, load_signing_key, load_verifying_key, sign};
use auditchain_chain::{chain, state, CanonicalError};
use auditchain_classify::{RiskPolicy, SchemaCatalog, SensitivityDictionary};
use auditchain_core::enricher::{EnrichOutcome, Enricher};
use auditchain_model::error::{AuditError, AuditResult};
use auditchain_model::event::{AnnotatedEvent, DbSystem, EnrichedEvent, Event};
use auditchain_parsers::{ParseOutcome, ParserRegistry};
use auditchain_verify::engine::{verify_stream, verify_stream_with_checkpoint, Outcome};
use chrono::Utc;
use clap::{Parser, Subcommand};
use config::RunConfig;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const EXIT_OK: u8 = 0;
const EXIT_FATAL: u8 = 1;
const EXIT_TAMPER: u8 = 2;

#[derive(Parser)]
#[command(
    name = "auditchain",
    about = "Tamper-evident database audit-log pipeline",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Optional YAML run configuration providing defaults for any flag below.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a raw database audit log into the uniform NDJSON event schema.
    Parse {
        #[arg(long)]
        db_system: String,
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Classify events against the sensitivity dictionary and risk policy.
    Enrich {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long)]
        dictionary: Option<PathBuf>,
        #[arg(long)]
        risk_policy: Option<PathBuf>,
        #[arg(long)]
        schema: Option<PathBuf>,
        #[arg(long)]
        emit_unknown: bool,
        #[arg(long)]
        bulk_row_threshold: Option<u64>,
        #[arg(long)]
        case_insensitive: Option<bool>,
        /// Treat an unresolved schema type as a fatal enrichment error
        /// instead of classifying the column with no type hint.
        #[arg(long)]
        schema_miss_fatal: Option<bool>,
    },
    /// Hash-chain enriched events (with `--output`) or verify an annotated
    /// stream for tampering (without it).
    Verify {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long)]
        state: Option<PathBuf>,
        #[arg(long)]
        checkpoint: bool,
        #[arg(long)]
        checkpoint_dir: Option<PathBuf>,
        #[arg(long)]
        signing_key: Option<PathBuf>,
        #[arg(long)]
        verifying_key: Option<PathBuf>,
    },
    /// Validate a sensitivity dictionary file without processing any events.
    Dict {
        #[command(subcommand)]
        action: DictCommand,
    },
    /// Print version information and exit.
    Version,
}

#[derive(Subcommand)]
enum DictCommand {
    Validate {
        #[arg(long)]
        path: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match RunConfig::from_yaml_path(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("{e}");
                return ExitCode::from(EXIT_FATAL);
            }
        },
        None => RunConfig::default(),
    };

    let default_filter = config.log_level.clone().unwrap_or_else(|| "warn".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with_target(false)
        .compact()
        .init();

    let result = match cli.command {
        Command::Parse {
            db_system,
            input,
            output,
        } => run_parse(&config, &db_system, &input, &output).map(|_| EXIT_OK),
        Command::Enrich {
            input,
            output,
            dictionary,
            risk_policy,
            schema,
            emit_unknown,
            bulk_row_threshold,
            case_insensitive,
            schema_miss_fatal,
        } => run_enrich(
            &config,
            input,
            output,
            dictionary,
            risk_policy,
            schema,
            emit_unknown,
            bulk_row_threshold,
            case_insensitive,
            schema_miss_fatal,
        )
        .map(|_| EXIT_OK),
        Command::Verify {
            input,
            output,
            state,
            checkpoint,
            checkpoint_dir,
            signing_key,
            verifying_key,
        } => run_verify(
            &config,
            input,
            output,
            state,
            checkpoint,
            checkpoint_dir,
            signing_key,
            verifying_key,
        ),
        Command::Dict {
            action: DictCommand::Validate { path },
        } => run_dict_validate(&path).map(|_| EXIT_OK),
        Command::Version => {
            println!("auditchain {}", env!("CARGO_PKG_VERSION"));
            Ok(EXIT_OK)
        }
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{e}");
            ExitCode::from(EXIT_FATAL)
        }
    }
}

fn run_dict_validate(path: &Path) -> AuditResult<()> {
    let json = std::fs::read_to_string(path)?;
    let dict = SensitivityDictionary::from_json(&json)?;
    info!(
        categories = dict.categories.len(),
        negative_rules = dict.negative.len(),
        "sensitivity dictionary is valid"
    );
    Ok(())
}

fn run_parse(config: &RunConfig, db_system: &str, input: &Path, output: &Path) -> AuditResult<()> {
    let registry = ParserRegistry::with_builtins();
    let reader = BufReader::new(File::open(input)?);
    let mut writer = BufWriter::new(File::create(output)?);
    let system = db_system_of(db_system)?;

    let started_at = Utc::now();
    let mut events_in = 0u64;
    let mut events_out = 0u64;
    let mut errors = 0u64;
    for line in reader.lines() {
        let line = line?;
        events_in += 1;
        match registry.parse_line(db_system, &line) {
            ParseOutcome::Event(event) => {
                writeln!(writer, "{}", serde_json::to_string(&event)?)?;
                events_out += 1;
            }
            ParseOutcome::Skip => {}
            ParseOutcome::Error { message } => {
                warn!(%message, "parse error, emitting error event");
                let error_event =
                    Event::error_event(String::new(), String::new(), system, None, Some(line), "parse", &message);
                writeln!(writer, "{}", serde_json::to_string(&error_event)?)?;
                errors += 1;
                events_out += 1;
            }
        }
    }
    writer.flush()?;

    run_log::record(
        config.run_log_path.as_deref(),
        &run_log::StageSummary {
            stage: "parse",
            started_at,
            finished_at: Utc::now(),
            events_in,
            events_out,
            errors,
            chain_index_before: None,
            chain_index_after: None,
        },
    )?;

    info!(events_in, events_out, errors, "parse complete");
    Ok(())
}

fn db_system_of(name: &str) -> AuditResult<DbSystem> {
    match name {
        "postgres" => Ok(DbSystem::Postgres),
        "mysql" => Ok(DbSystem::Mysql),
        other => Err(AuditError::Config {
            reason: format!("unknown db_system '{other}'"),
        }),
    }
}

#[allow(clippy::too_many_arguments)]
fn run_enrich(
    config: &RunConfig,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    dictionary: Option<PathBuf>,
    risk_policy: Option<PathBuf>,
    schema: Option<PathBuf>,
    emit_unknown_flag: bool,
    bulk_row_threshold: Option<u64>,
    case_insensitive: Option<bool>,
    schema_miss_fatal: Option<bool>,
) -> AuditResult<()> {
    let input = config::require(input, config.source.clone(), "input")?;
    let output = config::require(output, config.output.clone(), "output")?;
    let dictionary_path = config::require(dictionary, config.dictionary_path.clone(), "dictionary")?;
    let risk_policy_path = config::require(risk_policy, config.risk_policy_path.clone(), "risk_policy")?;
    let schema_path = config::require(schema, config.schema_path.clone(), "schema")?;
    let emit_unknown = emit_unknown_flag || config.emit_unknown.unwrap_or(false);
    let bulk_row_threshold = config::resolve(bulk_row_threshold, config.bulk_row_threshold, 1000);
    let case_insensitive = config::resolve(case_insensitive, config.case_insensitive, true);
    let schema_miss_fatal = config::resolve(schema_miss_fatal, config.schema_miss_fatal, false);

    let dictionary = SensitivityDictionary::from_json(&std::fs::read_to_string(&dictionary_path)?)?;
    let risk_policy = RiskPolicy::from_json(&std::fs::read_to_string(&risk_policy_path)?)?;
    if !risk_policy.covers(dictionary.categories.keys()) {
        return Err(AuditError::Config {
            reason: "risk policy base levels do not cover every dictionary category".to_string(),
        });
    }
    let schema_catalog = SchemaCatalog::from_csv_path(&schema_path, case_insensitive)?;
    let enricher = Enricher::new(
        &dictionary,
        &risk_policy,
        &schema_catalog,
        bulk_row_threshold,
        emit_unknown,
        schema_miss_fatal,
    );

    let reader = BufReader::new(File::open(&input)?);
    let mut writer = BufWriter::new(File::create(&output)?);

    let started_at = Utc::now();
    let mut events_in = 0u64;
    let mut events_out = 0u64;
    let mut errors = 0u64;

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        events_in += 1;
        let event: Event = match serde_json::from_str(&line) {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "malformed event line during enrichment");
                errors += 1;
                continue;
            }
        };

        match enricher.enrich(event) {
            EnrichOutcome::Enriched(enriched) => {
                writeln!(writer, "{}", serde_json::to_string(&enriched)?)?;
                events_out += 1;
            }
            EnrichOutcome::Dropped => {}
            EnrichOutcome::Error(error_event) => {
                writeln!(writer, "{}", serde_json::to_string(&error_event)?)?;
                errors += 1;
                events_out += 1;
            }
        }
    }
    writer.flush()?;

    run_log::record(
        config.run_log_path.as_deref(),
        &run_log::StageSummary {
            stage: "enrich",
            started_at,
            finished_at: Utc::now(),
            events_in,
            events_out,
            errors,
            chain_index_before: None,
            chain_index_after: None,
        },
    )?;

    info!(events_in, events_out, errors, "enrich complete");
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_verify(
    config: &RunConfig,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    state_path: Option<PathBuf>,
    checkpoint_requested: bool,
    checkpoint_dir: Option<PathBuf>,
    signing_key: Option<PathBuf>,
    verifying_key: Option<PathBuf>,
) -> AuditResult<u8> {
    let input = config::require(input, config.source.clone(), "input")?;
    let state_path = config::require(state_path, config.state_path.clone(), "state")?;
    let output = output.or_else(|| config.output.clone());

    match output {
        Some(output) => run_chain(
            config,
            &input,
            &output,
            &state_path,
            checkpoint_requested,
            checkpoint_dir,
            signing_key,
        )
        .map(|_| EXIT_OK),
        None => run_verify_mode(&input, &state_path, checkpoint_dir, verifying_key, config),
    }
}

fn run_chain(
    config: &RunConfig,
    input: &Path,
    output: &Path,
    state_path: &Path,
    checkpoint_requested: bool,
    checkpoint_dir: Option<PathBuf>,
    signing_key: Option<PathBuf>,
) -> AuditResult<()> {
    let signing_key_path = signing_key.or_else(|| config.signing_key_path.clone());
    if checkpoint_requested && signing_key_path.is_none() {
        return Err(AuditError::Config {
            reason: "--checkpoint requested but no signing key configured".to_string(),
        });
    }
    let checkpoint_dir = if checkpoint_requested {
        Some(
            checkpoint_dir
                .or_else(|| config.checkpoint_dir.clone())
                .ok_or_else(|| AuditError::Config {
                    reason: "--checkpoint requested but no checkpoint directory configured".to_string(),
                })?,
        )
    } else {
        None
    };

    let started_at = Utc::now();
    let current_state = state::load(state_path)?;
    let chain_index_before = current_state.last_chain_index;

    let reader = BufReader::new(File::open(input)?);
    let events: Vec<EnrichedEvent> = reader
        .lines()
        .filter(|l| l.as_ref().map(|s| !s.trim().is_empty()).unwrap_or(true))
        .map(|line| -> AuditResult<EnrichedEvent> { Ok(serde_json::from_str(&line?)?) })
        .collect::<AuditResult<Vec<_>>>()?;
    let events_in = events.len() as u64;

    let mut writer = BufWriter::new(File::create(output)?);
    let mut io_error: Option<std::io::Error> = None;
    let (new_state, count) = chain::compute(events, current_state, |annotated: AnnotatedEvent| {
        let line = serde_json::to_string(&annotated).map_err(CanonicalError::from)?;
        if let Err(e) = writeln!(writer, "{line}") {
            io_error = Some(e);
        }
        Ok(())
    })
    .map_err(|e| AuditError::Canonicalisation { reason: e.to_string() })?;
    if let Some(e) = io_error {
        return Err(AuditError::Io(e));
    }
    writer.flush()?;

    state::save(state_path, &new_state)?;

    if checkpoint_requested {
        let key_pem = std::fs::read_to_string(signing_key_path.unwrap())?;
        let key = load_signing_key(&key_pem)?;
        let created_at = Utc::now();
        let checkpoint = sign(new_state.last_chain_index, &new_state.last_head_hash, created_at, &key)?;
        let checkpoint_dir = checkpoint_dir.unwrap();
        std::fs::create_dir_all(&checkpoint_dir)?;
        let file_name = checkpoint_file_name(new_state.last_chain_index, created_at);
        std::fs::write(checkpoint_dir.join(file_name), serde_json::to_vec_pretty(&checkpoint)?)?;
    }

    run_log::record(
        config.run_log_path.as_deref(),
        &run_log::StageSummary {
            stage: "verify",
            started_at,
            finished_at: Utc::now(),
            events_in,
            events_out: count,
            errors: 0,
            chain_index_before: Some(chain_index_before),
            chain_index_after: Some(new_state.last_chain_index),
        },
    )?;

    info!(events_in, count, "chain compute complete");
    Ok(())
}

fn run_verify_mode(
    input: &Path,
    state_path: &Path,
    checkpoint_dir: Option<PathBuf>,
    verifying_key: Option<PathBuf>,
    config: &RunConfig,
) -> AuditResult<u8> {
    let started_at = Utc::now();
    let starting_state = state::load(state_path)?;
    let reader = BufReader::new(File::open(input)?);
    let events: Vec<AnnotatedEvent> = reader
        .lines()
        .filter(|l| l.as_ref().map(|s| !s.trim().is_empty()).unwrap_or(true))
        .map(|line| -> AuditResult<AnnotatedEvent> { Ok(serde_json::from_str(&line?)?) })
        .collect::<AuditResult<Vec<_>>>()?;
    let events_in = events.len() as u64;

    let checkpoint_dir = checkpoint_dir.or_else(|| config.checkpoint_dir.clone());
    let verifying_key_path = verifying_key.or_else(|| config.verifying_key_path.clone());

    let (outcome, tampered_count) = match (checkpoint_dir, verifying_key_path) {
        (Some(dir), Some(key_path)) => {
            let checkpoint_path = latest_checkpoint(&dir)?;
            let checkpoint: auditchain_model::chain::SignedCheckpoint =
                serde_json::from_str(&std::fs::read_to_string(checkpoint_path)?)?;
            let key_pem = std::fs::read_to_string(key_path)?;
            let key = load_verifying_key(&key_pem)?;
            let report = verify_stream_with_checkpoint(events, &starting_state, &checkpoint, &key);
            info!(?report, "verification complete");
            (report.outcome, report.tampered.len() as u64)
        }
        _ => {
            let report = verify_stream(events, &starting_state);
            info!(?report, "verification complete (no checkpoint supplied)");
            (report.outcome, report.tampered.len() as u64)
        }
    };

    run_log::record(
        config.run_log_path.as_deref(),
        &run_log::StageSummary {
            stage: "verify",
            started_at,
            finished_at: Utc::now(),
            events_in,
            events_out: events_in,
            errors: tampered_count,
            chain_index_before: Some(starting_state.last_chain_index),
            chain_index_after: None,
        },
    )?;

    Ok(match outcome {
        Outcome::Ok => EXIT_OK,
        Outcome::TamperDetected | Outcome::CheckpointMismatch | Outcome::ForgedCheckpoint => EXIT_TAMPER,
    })
}

fn latest_checkpoint(dir: &Path) -> AuditResult<PathBuf> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().map(|ext| ext == "json").unwrap_or(false))
        .collect();
    entries.sort();
    entries.pop().ok_or_else(|| AuditError::Config {
        reason: format!("no checkpoint files found in {}", dir.display()),
    })
}
