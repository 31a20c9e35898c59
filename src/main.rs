use anyhow::{Context, Result};
use serde_json::json;
use clap::Parser;
use std::io::{self, Read, Write};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use numbreacher::batch::{self, NumberEntry};
use numbreacher::cli::{BulkOptions, Cli, Commands};
use numbreacher::config::{validate_workers, AppConfig, ConfigError};
use numbreacher::engine::{self, EngineKind};
use numbreacher::logger::{RunLogger, VerbosityLevel};
use numbreacher::owner::OwnerResolver;
use numbreacher::phone;
use numbreacher::scanner;
use numbreacher::task::TaskResult;
use numbreacher::workers::{OwnerLookupWorker, ScanWorker, Worker, WorkerRequest};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbosity = VerbosityLevel::from_verbose_count(cli.verbose);
    init_tracing(verbosity);

    // Isolated worker mode: stdin/stdout are a JSON channel, nothing else runs
    if let Some(Commands::Worker) = &cli.command {
        return run_worker_process();
    }

    if cli.init {
        match AppConfig::create_default_config() {
            Ok(path) => {
                println!("✅ Created default configuration file at: {}", path.display());
                println!("   Edit this file to customize settings, then run numbreacher again.");
                return Ok(());
            }
            Err(e) => {
                eprintln!("❌ Failed to create configuration file: {}", e);
                std::process::exit(1);
            }
        }
    }

    if let Err(e) = cli.validate() {
        eprintln!("❌ {}", e);
        std::process::exit(1);
    }

    let app_config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let logger = match &cli.log_file {
        Some(path) => RunLogger::with_log_file(verbosity, path),
        None => RunLogger::new(verbosity),
    };

    let outcome = match cli.command {
        Some(Commands::Scan { number, no_owner_lookup, json }) => {
            run_scan(&app_config, &number, !no_owner_lookup, json)
        }
        Some(Commands::Validate { number, json }) => run_validate(&number, json),
        Some(Commands::Owner { number, json }) => run_owner(&app_config, &number, json),
        Some(Commands::Bulk { options, no_owner_lookup }) => {
            run_bulk(&app_config, &logger, &options, BulkMode::Scan { owner_lookup: !no_owner_lookup })
        }
        Some(Commands::OwnerBulk { options }) => run_bulk(&app_config, &logger, &options, BulkMode::Owner),
        Some(Commands::Engines) => {
            print_engines(&app_config);
            Ok(())
        }
        Some(Commands::Worker) | None => Ok(()),
    };

    if let Err(e) = &outcome {
        logger.error(&format!("{:#}", e));
    }

    if logger.is_log_export_enabled() {
        if let Err(e) = logger.export_logs() {
            eprintln!("⚠️  Failed to write log file: {}", e);
        }
    }

    if outcome.is_err() {
        std::process::exit(1);
    }
    Ok(())
}

/// Log to stderr; RUST_LOG overrides the -v level
fn init_tracing(verbosity: VerbosityLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("numbreacher={}", verbosity.tracing_directive())));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .try_init();
}

fn load_config(cli: &Cli) -> Result<AppConfig, ConfigError> {
    match &cli.config {
        Some(path) => AppConfig::load_from_path(path),
        None => AppConfig::load_or_default(),
    }
}

/// Read one `WorkerRequest` from stdin and answer with one `TaskResult` on stdout
fn run_worker_process() -> Result<()> {
    let mut input = String::new();
    io::stdin()
        .read_to_string(&mut input)
        .context("Failed to read worker request from stdin")?;

    let request: WorkerRequest = serde_json::from_str(&input).context("Failed to decode worker request")?;
    debug!("Worker process handling {}", request.task.number);

    let result = request.execute()?;

    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, &result).context("Failed to encode worker result")?;
    stdout.flush().context("Failed to flush worker result")?;
    Ok(())
}

fn run_scan(config: &AppConfig, number: &str, owner_lookup: bool, json: bool) -> Result<()> {
    let descriptor = match phone::parse_number(number.trim()) {
        Ok(descriptor) => descriptor,
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    };

    let resolver = if owner_lookup && config.owner_lookup.enabled {
        Some(OwnerResolver::from_config(&config.owner_lookup)?)
    } else {
        None
    };

    let report = scanner::scan_number(&descriptor, resolver.as_ref());
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.render());
    }
    info!("Scanned {} (risk {})", report.number, report.risk);
    Ok(())
}

fn run_validate(number: &str, json: bool) -> Result<()> {
    let descriptor = match phone::parse_number(number.trim()) {
        Ok(descriptor) => descriptor,
        Err(e) => {
            if json {
                println!("{}", json!({ "input": number.trim(), "valid": false, "error": e.to_string() }));
            }
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    };

    if json {
        let report = json!({ "input": descriptor.raw, "valid": true, "formats": descriptor.formats });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("\nNumber Validation");
    println!("{}", "-".repeat(40));
    println!("Input      : {}", descriptor.raw);
    println!("Valid      : Yes");
    for (label, value) in descriptor.formats.labeled() {
        println!("{:11}: {}", label, value);
    }
    Ok(())
}

fn run_owner(config: &AppConfig, number: &str, json: bool) -> Result<()> {
    let descriptor = match phone::parse_number(number.trim()) {
        Ok(descriptor) => descriptor,
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    };

    let resolver = OwnerResolver::from_config(&config.owner_lookup)?;
    let profile = if config.owner_lookup.enabled {
        resolver.lookup_owner_name(&descriptor).as_ref().clone()
    } else {
        numbreacher::owner::OwnerProfile::disabled()
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&profile)?);
    } else {
        println!("Number     : {}", descriptor.raw);
        println!("Owner      : {}", profile.name);
        println!("Confidence : {}", profile.confidence);
        if !profile.candidates.is_empty() {
            println!("Candidates : {}", profile.candidates.join(", "));
        }
        println!("Method     : {}", profile.method);
        println!("Notes      : {}", profile.notes);
    }
    Ok(())
}

#[derive(Debug, Clone, Copy)]
enum BulkMode {
    Scan { owner_lookup: bool },
    Owner,
}

fn run_bulk(config: &AppConfig, logger: &RunLogger, options: &BulkOptions, mode: BulkMode) -> Result<()> {
    let engine_name = options.engine.as_deref().unwrap_or(config.engine.name.as_str());
    let kind = EngineKind::parse(engine_name)?;
    let workers = validate_workers(options.workers.unwrap_or(config.engine.max_workers))?;
    let engine = kind.build();

    let entries = batch::parse_number_file(&options.file)?;
    let (entries, skipped): (Vec<NumberEntry>, usize) = if config.bulk.dedupe && !options.no_dedupe {
        batch::dedupe_numbers(entries)
    } else {
        (entries, 0)
    };
    logger.log_dedupe(skipped);

    let resolver = Arc::new(OwnerResolver::from_config(&config.owner_lookup)?);
    let (worker, owner_lookup): (Arc<dyn Worker>, bool) = match mode {
        BulkMode::Scan { owner_lookup } => (
            Arc::new(ScanWorker::new(resolver.clone(), config.owner_lookup.clone())),
            owner_lookup,
        ),
        BulkMode::Owner => (
            Arc::new(OwnerLookupWorker::new(resolver.clone(), config.owner_lookup.clone())),
            true,
        ),
    };
    let tasks = batch::build_tasks(&entries, owner_lookup);

    let mut summary = batch::new_batch_summary(engine.name(), workers);
    summary.skipped = skipped;

    logger.log_bulk_start(tasks.len(), engine.name(), workers);
    logger.start_progress(&format!("Processing {} numbers...", tasks.len()));
    let started = Instant::now();
    let results = engine.run(worker, &tasks, workers);
    let elapsed = started.elapsed().as_secs_f64();
    logger.finish_progress(&format!("Processed {} numbers in {:.2}s", results.len(), elapsed));

    if kind == EngineKind::Threading || kind == EngineKind::Async {
        let stats = resolver.cache_stats();
        logger.debug(&format!(
            "Owner cache: {} entries, {} hits, {} misses",
            stats.entries, stats.hits, stats.misses
        ));
    }

    print_results(logger, &results, options.json)?;

    batch::record_results(&mut summary, &entries, &results);
    batch::finalize_batch_summary(&mut summary, elapsed);
    if summary.failed > 0 {
        logger.warn(&format!("{} of {} numbers failed", summary.failed, summary.total));
    }
    logger.print_bulk_summary(&summary);

    if let Some(path) = &options.summary_out {
        batch::export_batch_summary(&summary, path)?;
        logger.log_summary_export(path);
    }

    Ok(())
}

fn print_results(logger: &RunLogger, results: &[TaskResult], json: bool) -> Result<()> {
    let mut stdout = io::stdout().lock();
    for result in results {
        if json {
            serde_json::to_writer(&mut stdout, result)?;
            writeln!(stdout)?;
            continue;
        }

        match (result.report(), result.owner(), result.error()) {
            (Some(report), _, _) => writeln!(
                stdout,
                "✅ {}  risk={}  owner={}  line={}",
                report.number, report.risk, report.owner.name, report.line_type
            )?,
            (None, Some(owner), _) => writeln!(
                stdout,
                "✅ {}  owner={}  confidence={}",
                result.number(),
                owner.name,
                owner.confidence
            )?,
            (None, None, Some(error)) => {
                writeln!(stdout, "❌ {}  {}", result.number(), error)?;
                logger.debug(&format!("Task for {} failed: {}", result.number(), error));
            }
            (None, None, None) => {}
        }
    }
    Ok(())
}

fn print_engines(config: &AppConfig) {
    for name in engine::available_engines() {
        let marker = match EngineKind::parse(&config.engine.name) {
            Ok(kind) if kind.as_str() == name => " (configured)",
            _ => "",
        };
        let description = EngineKind::parse(name).map(|kind| kind.describe()).unwrap_or("");
        println!("{:<10} {}{}", name, description, marker);
    }
}
