use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{ArgGroup, Parser};

use trialscope::config::{self, AppConfig};
use trialscope::db::SqliteTrialStore;
use trialscope::llm::build_client;
use trialscope::pipeline::diagnostic::DiagnosticDump;
use trialscope::pipeline::{PipelineError, TrialOutcome, TrialPipeline};
use trialscope::source::registry::{RegistryClient, DEFAULT_REGISTRY_URL};

#[derive(Parser, Debug)]
#[command(
    name = "trialscope",
    version,
    about = "Extract, analyze, flatten and store ClinicalTrials.gov trial records"
)]
#[command(group(ArgGroup::new("input").required(true).args(["file", "dir", "fetch"])))]
struct Args {
    /// Registry document (JSON) to process
    #[arg(long)]
    file: Option<PathBuf>,

    /// Directory of registry documents; every *.json file is processed
    #[arg(long)]
    dir: Option<PathBuf>,

    /// Fetch a trial from the registry by identifier, e.g. NCT04000001
    #[arg(long)]
    fetch: Option<String>,

    /// Registry API base URL used by --fetch
    #[arg(long, env = "TRIALSCOPE_REGISTRY_URL", default_value = DEFAULT_REGISTRY_URL)]
    registry_url: String,

    /// Where `<stem>_extracted.json` and `<stem>_analyzed.json` are written
    #[arg(long)]
    output: Option<PathBuf>,

    /// SQLite database path (defaults to TRIALSCOPE_DB or the app data directory)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Skip persistence
    #[arg(long)]
    no_db: bool,

    /// Stop after extraction; no model is contacted
    #[arg(long)]
    extraction_only: bool,

    /// Dump every intermediate artifact under this directory
    #[arg(long)]
    dump_dir: Option<PathBuf>,
}

fn main() -> ExitCode {
    trialscope::init_tracing();
    let args = Args::parse();
    let config = AppConfig::from_env();
    tracing::info!(version = config::APP_VERSION, provider = ?config.provider, "TrialScope starting");

    match run(&args, &config) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(stage = e.stage(), error = %e, "Run failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args, config: &AppConfig) -> Result<ExitCode, PipelineError> {
    let store = if args.no_db || args.extraction_only {
        None
    } else {
        let path = args.db.clone().unwrap_or_else(|| config.database_path.clone());
        tracing::info!(path = %path.display(), "Opening trial database");
        Some(SqliteTrialStore::open(&path)?)
    };

    let dump_dir = args.dump_dir.clone().or_else(|| config.dump_dir.clone());
    let dump = dump_dir.map(DiagnosticDump::new);

    // Fail fast on a misconfigured model before touching any input.
    let llm = if args.extraction_only {
        None
    } else {
        Some(build_client(config)?)
    };

    let mut pipeline = match &llm {
        Some(llm) => TrialPipeline::new(llm.as_ref(), config.analysis.clone()),
        None => TrialPipeline::extraction_only(),
    };
    if let Some(store) = &store {
        pipeline = pipeline.with_store(store);
    }
    if let Some(dump) = &dump {
        pipeline = pipeline.with_observer(dump);
    }
    if let Some(output) = &args.output {
        pipeline = pipeline.with_output_dir(output);
    }

    if let Some(dir) = &args.dir {
        let summary = pipeline.process_directory(dir)?;
        println!(
            "processed {} trial(s): {} extracted, {} analyzed, {} persisted, {} failed",
            summary.total,
            summary.extracted,
            summary.analyzed,
            summary.persisted,
            summary.failures.len()
        );
        for failure in &summary.failures {
            println!("  {} [{}]: {}", failure.path.display(), failure.stage, failure.error);
        }
        return Ok(if summary.failures.is_empty() { ExitCode::SUCCESS } else { ExitCode::FAILURE });
    }

    let outcome = if let Some(file) = &args.file {
        pipeline.process_file(file)?
    } else if let Some(nct_id) = &args.fetch {
        let timeout = config.request_timeout_secs.map(Duration::from_secs);
        let registry = RegistryClient::new(&args.registry_url, timeout)?;
        pipeline.process_source(&registry, nct_id)?
    } else {
        return Ok(ExitCode::FAILURE);
    };

    report(&outcome);
    Ok(ExitCode::SUCCESS)
}

fn report(outcome: &TrialOutcome) {
    let id = outcome.nct_id.as_deref().unwrap_or("unknown");
    match &outcome.analysis {
        Some(analysis) => {
            let score = analysis
                .validation
                .score()
                .map_or_else(|| "n/a".to_string(), |s| format!("{s}/{}", trialscope::models::MAX_SCORE));
            println!(
                "{id}: analyzed (score {score}, {} degradation(s), {} warning(s)){}",
                analysis.degradations.len(),
                analysis.warnings.len(),
                if outcome.persisted { ", persisted" } else { "" }
            );
        }
        None => println!("{id}: extracted"),
    }
    for path in &outcome.outputs {
        println!("  wrote {}", path.display());
    }
}
