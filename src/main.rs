use std::io::BufRead;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use auditscore::Config;
use auditscore::catalog;
use auditscore::core::pipeline::{PipelineOutput, SummaryRequest, run_pipeline};
use auditscore::core::{HealthBand, RawCheckResult, SummaryRecord};
use auditscore::db::SharedDatabase;
use auditscore::engine::SummaryEngine;
use auditscore::scoring::ScoringEngine;
use auditscore::scoring::trend;

#[derive(Parser, Debug)]
#[command(name = "auditscore", version, about = "Website audit scoring engine")]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, global = true, default_value = "auditscore.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate (or refresh) the summary for an audit
    Summarize { audit_id: String },
    /// Print the stored summary for an audit
    Show { audit_id: String },
    /// Recent summaries for a website with score changes
    History {
        website_id: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Store raw check results from a JSON array
    Import { audit_id: String, file: PathBuf },
    /// Load the check catalog (built-in unless a CSV is given or configured)
    Seed {
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Read audit ids from stdin and summarize them one at a time
    Queue,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("auditscore=info".parse()?))
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config);
    tracing::debug!("Config: {:?}", config);

    let db_path = Path::new(&config.database.path);
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating database directory {}", parent.display()))?;
    }
    let db = SharedDatabase::open(db_path)
        .with_context(|| format!("opening database at {}", config.database.path))?;

    let scoring = ScoringEngine::new(config.scoring.weight_table(), config.scoring.duplicate_policy);
    if scoring.weights().is_empty() {
        tracing::warn!("Weight table is empty, every overall score will be 0");
    }

    match cli.command {
        Command::Summarize { audit_id } => {
            let engine = SummaryEngine::new(db.clone(), scoring);
            let outcome = engine.summarize(&audit_id)?;
            let record = db
                .get_summary(&audit_id)?
                .context("summary missing right after commit")?;
            print_summary(&record, &config);
            tracing::debug!(summary_id = %outcome.summary_id, "Done");
        }
        Command::Show { audit_id } => match db.get_summary(&audit_id)? {
            Some(record) => print_summary(&record, &config),
            None => bail!("no summary for audit '{audit_id}'"),
        },
        Command::History { website_id, limit } => {
            let records = db.recent_summaries_for_website(&website_id, limit)?;
            if records.is_empty() {
                println!("No summaries for website '{website_id}'");
            }
            for (idx, record) in records.iter().enumerate() {
                let change = records
                    .get(idx + 1)
                    .map(|older| format!("{:+}", trend::compare(older, record).overall_delta))
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{}  {:<24} {:>3} ({change})",
                    record.summary.completed_at.format("%Y-%m-%d %H:%M"),
                    record.summary.audit_id,
                    record.summary.overall_score,
                );
            }
        }
        Command::Import { audit_id, file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let mut results: Vec<RawCheckResult> = serde_json::from_str(&content)
                .with_context(|| format!("parsing {}", file.display()))?;
            for r in &mut results {
                if r.audit_id.is_empty() {
                    r.audit_id = audit_id.clone();
                }
            }
            db.store_results_batch(&results)?;
            tracing::info!("Stored {} results for audit {audit_id}", results.len());
        }
        Command::Seed { csv } => {
            let csv = csv.or_else(|| config.database.catalog_csv.as_ref().map(PathBuf::from));
            let count = match csv {
                Some(path) => db.load_catalog_from_csv(&path)?,
                None => db.seed_catalog(&catalog::default_seed())?,
            };
            tracing::info!("Catalog seeded with {count} checks");
        }
        Command::Queue => run_queue(db, scoring, &config)?,
    }

    Ok(())
}

fn run_queue(db: SharedDatabase, scoring: ScoringEngine, config: &Config) -> Result<()> {
    let (req_tx, req_rx) = mpsc::unbounded_channel();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel();

    // stdin is blocking, so read it on its own thread
    let reader = std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            let audit_id = line.trim();
            if audit_id.is_empty() {
                continue;
            }
            if req_tx.send(SummaryRequest { audit_id: audit_id.to_string() }).is_err() {
                break;
            }
        }
    });

    let rt = tokio::runtime::Runtime::new().context("creating tokio runtime")?;
    let engine = SummaryEngine::new(db, scoring);
    let bands = config.bands.clone();
    let failures = rt.block_on(async move {
        let pipeline = tokio::spawn(run_pipeline(req_rx, out_tx, engine, bands));
        let mut failures = 0usize;
        while let Some(output) = out_rx.recv().await {
            match output {
                PipelineOutput::Completed { audit_id, overall_score, band } => {
                    println!("{audit_id}\t{overall_score}\t{}", band.label());
                }
                PipelineOutput::Failed { audit_id, error, .. } => {
                    failures += 1;
                    eprintln!("{audit_id}\tfailed\t{error}");
                }
            }
        }
        if let Err(e) = pipeline.await {
            tracing::error!("Pipeline task failed: {e}");
        }
        failures
    });

    if reader.join().is_err() {
        tracing::warn!("stdin reader thread panicked");
    }
    if failures > 0 {
        bail!("{failures} audit(s) failed to summarize");
    }
    Ok(())
}

fn print_summary(record: &SummaryRecord, config: &Config) {
    let s = &record.summary;
    let band = HealthBand::from_score(s.overall_score, &config.bands);
    println!("Audit {}  (summary #{})", s.audit_id, record.id);
    println!("  Overall score: {} ({})", s.overall_score, band.label());
    println!("  Pages: {}  Issues: {}", s.total_pages, s.total_issues);
    println!(
        "  Severity: high {}  medium {}  low {}",
        s.high_severity_issues, s.medium_severity_issues, s.low_severity_issues
    );
    println!("  Completed: {}", s.completed_at.to_rfc3339());
    for c in &record.categories {
        println!(
            "  {:<16} {:>3}  passed {:>3}  warnings {:>3}  errors {:>3}",
            c.category_slug, c.score, c.passed_count, c.warning_count, c.error_count
        );
    }
}
