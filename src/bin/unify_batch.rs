//! Batch unification CLI.
//!
//! Reads a JSON array of `{"platform": "...", "records": [...]}` batches,
//! ingests them in order and prints the unified graph as JSON.

use std::path::PathBuf;
use std::process::ExitCode;

use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use entity_unify::{
    DataAnomaly, DataRelationship, IngestReport, RawRecord, UnificationEngine, UnificationStats,
    UnifiedEntity, UnifyError, ValidationError,
};

/// CLI configuration
struct Config {
    /// Input file holding the batches
    input: PathBuf,
    /// Run anomaly detection after ingestion
    anomalies: bool,
    /// Optional search query to run after ingestion
    search: Option<String>,
}

fn print_help() {
    println!("unify_batch - cross-platform entity unification");
    println!();
    println!("USAGE:");
    println!("    unify_batch <FILE> [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -a, --anomalies           Run anomaly detection after ingestion");
    println!("    -s, --search <QUERY>      Search the unified entities");
    println!("    -h, --help                Print help information");
    println!();
    println!("ENVIRONMENT:");
    println!("    RUST_LOG                  Log filter [default: info]");
}

fn parse_args() -> Config {
    let args: Vec<String> = std::env::args().collect();
    let mut input = None;
    let mut anomalies = false;
    let mut search = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--anomalies" | "-a" => {
                anomalies = true;
                i += 1;
            }
            "--search" | "-s" => {
                if i + 1 < args.len() {
                    search = Some(args[i + 1].clone());
                    i += 2;
                } else {
                    eprintln!("error: --search requires a value");
                    std::process::exit(1);
                }
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            arg if arg.starts_with('-') => {
                eprintln!("error: unknown argument: {arg}");
                eprintln!("For more information, try '--help'");
                std::process::exit(1);
            }
            path => {
                if input.is_some() {
                    eprintln!("error: only one input file may be given");
                    std::process::exit(1);
                }
                input = Some(PathBuf::from(path));
                i += 1;
            }
        }
    }

    let Some(input) = input else {
        eprintln!("error: missing input file");
        eprintln!("For more information, try '--help'");
        std::process::exit(1);
    };

    Config {
        input,
        anomalies,
        search,
    }
}

/// One platform's records as read from the input file.
struct Batch {
    platform: String,
    records: Vec<RawRecord>,
}

fn parse_batches(json: &serde_json::Value) -> Result<Vec<Batch>, UnifyError> {
    let serde_json::Value::Array(items) = json else {
        return Err(ValidationError::InvalidConfig {
            reason: "input must be a JSON array of batches".to_string(),
        }
        .into());
    };

    items
        .iter()
        .enumerate()
        .map(|(n, item)| {
            let platform = item
                .get("platform")
                .and_then(serde_json::Value::as_str)
                .ok_or_else(|| ValidationError::InvalidConfig {
                    reason: format!("batch {n}: missing string field 'platform'"),
                })?;
            let records = item
                .get("records")
                .and_then(serde_json::Value::as_array)
                .ok_or_else(|| ValidationError::InvalidConfig {
                    reason: format!("batch {n}: missing array field 'records'"),
                })?
                .iter()
                .map(RawRecord::from_json)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Batch {
                platform: platform.to_string(),
                records,
            })
        })
        .collect()
}

#[derive(Serialize)]
struct Output<'a> {
    reports: Vec<BatchSummary>,
    entities: Vec<&'a UnifiedEntity>,
    relationships: Vec<&'a DataRelationship>,
    stats: UnificationStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    anomalies: Option<Vec<DataAnomaly>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    search_results: Option<Vec<&'a UnifiedEntity>>,
}

#[derive(Serialize)]
struct BatchSummary {
    platform: String,
    ingested: usize,
    unknown_records: usize,
    failures: Vec<entity_unify::RecordFailure>,
    relationships_created: usize,
}

impl BatchSummary {
    fn new(platform: String, report: IngestReport) -> Self {
        Self {
            platform,
            ingested: report.entities.len(),
            unknown_records: report.unknown_records,
            failures: report.failures,
            relationships_created: report.relationships_created,
        }
    }
}

fn run(config: &Config) -> Result<String, UnifyError> {
    let raw = std::fs::read_to_string(&config.input).map_err(|e| {
        UnifyError::internal(format!("failed to read {}: {e}", config.input.display()))
    })?;
    let json: serde_json::Value = serde_json::from_str(&raw).map_err(|e| ValidationError::InvalidConfig {
        reason: format!("invalid JSON input: {e}"),
    })?;
    let batches = parse_batches(&json)?;

    let mut engine = UnificationEngine::new();
    let reports = batches
        .into_iter()
        .map(|batch| {
            let report = engine.ingest_platform_data_with_report(&batch.platform, &batch.records);
            BatchSummary::new(batch.platform, report)
        })
        .collect();

    let output = Output {
        reports,
        entities: engine.entities().collect(),
        relationships: engine.relationships().collect(),
        stats: engine.stats(),
        anomalies: config.anomalies.then(|| engine.detect_anomalies()),
        search_results: config
            .search
            .as_deref()
            .map(|q| engine.search_unified_entities(q, None)),
    };

    serde_json::to_string_pretty(&output)
        .map_err(|e| UnifyError::internal(format!("failed to encode output: {e}")))
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = parse_args();
    info!(input = %config.input.display(), "starting batch unification");

    match run(&config) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "batch unification failed");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
