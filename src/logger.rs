//! User-facing run output: verbosity-gated messages, a spinner while a batch
//! runs, and the final bulk summary.
//!
//! Diagnostic logging inside the library goes through `tracing`; this logger
//! is only for what the operator sees.

use crate::batch::BatchSummary;
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub enum VerbosityLevel {
    Summary = 0,  // High-level progress (default)
    Detailed = 1, // Per-number results and warnings
    Debug = 2,    // Everything
}

impl VerbosityLevel {
    pub fn from_verbose_count(count: u8) -> Self {
        match count {
            0 => VerbosityLevel::Summary,
            1 => VerbosityLevel::Detailed,
            2.. => VerbosityLevel::Debug,
        }
    }

    /// Default `tracing` filter directive for this verbosity
    pub fn tracing_directive(&self) -> &'static str {
        match self {
            VerbosityLevel::Summary => "warn",
            VerbosityLevel::Detailed => "info",
            VerbosityLevel::Debug => "debug",
        }
    }
}

#[derive(Clone)]
pub struct RunLogger {
    verbosity: VerbosityLevel,
    spinner: Arc<Mutex<Option<ProgressBar>>>,
    log_buffer: Arc<Mutex<Vec<String>>>,
    log_file_path: Option<PathBuf>,
}

impl RunLogger {
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self {
            verbosity,
            spinner: Arc::new(Mutex::new(None)),
            log_buffer: Arc::new(Mutex::new(Vec::new())),
            log_file_path: None,
        }
    }

    pub fn with_log_file(verbosity: VerbosityLevel, log_file_path: impl Into<PathBuf>) -> Self {
        Self {
            log_file_path: Some(log_file_path.into()),
            ..Self::new(verbosity)
        }
    }

    pub fn info(&self, message: &str) {
        self.print_message("INFO", message);
    }

    pub fn warn(&self, message: &str) {
        if self.verbosity >= VerbosityLevel::Detailed {
            self.print_message("WARN", message);
        }
    }

    /// Errors are shown at every verbosity
    pub fn error(&self, message: &str) {
        self.print_message("ERROR", message);
    }

    pub fn debug(&self, message: &str) {
        if self.verbosity >= VerbosityLevel::Debug {
            self.print_message("DEBUG", message);
        }
    }

    fn print_message(&self, level: &str, message: &str) {
        let msg = format!("[{}] {}: {}", Utc::now().format("%H:%M:%S%.3f"), level, message);

        if self.log_file_path.is_some() {
            if let Ok(mut buffer) = self.log_buffer.lock() {
                buffer.push(msg.clone());
            }
        }

        // print above an active spinner so it does not get overwritten
        if let Ok(guard) = self.spinner.try_lock() {
            if let Some(pb) = guard.as_ref() {
                pb.println(msg);
                return;
            }
        }

        eprintln!("{}", msg);
    }

    /// Show a spinner until [`finish_progress`](Self::finish_progress)
    pub fn start_progress(&self, message: &str) {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(120));

        if let Ok(mut guard) = self.spinner.lock() {
            *guard = Some(pb);
        }
    }

    pub fn finish_progress(&self, final_message: &str) {
        if let Ok(mut guard) = self.spinner.lock() {
            if let Some(pb) = guard.take() {
                pb.finish_and_clear();
            }
        }
        self.info(final_message);
    }

    pub fn log_bulk_start(&self, count: usize, engine: &str, workers: usize) {
        self.info(&format!("Dispatching {} numbers on the {} engine ({} workers)", count, engine, workers));
    }

    pub fn log_dedupe(&self, removed: usize) {
        if removed > 0 {
            self.info(&format!("Removed {} duplicate numbers", removed));
        }
    }

    pub fn log_summary_export(&self, path: &Path) {
        self.info(&format!("Batch summary written to {}", path.display()));
    }

    /// Always printed to stdout, whatever the verbosity
    pub fn print_bulk_summary(&self, summary: &BatchSummary) {
        println!("\n=== BULK SUMMARY ===");
        println!("Engine: {} ({} workers)", summary.engine, summary.workers);
        println!("Duration: {:.2}s", summary.total_duration_secs);
        println!("Numbers: {} ({} duplicates skipped)", summary.total, summary.skipped);
        println!("Succeeded: {}", summary.successful);
        println!("Failed: {}", summary.failed);
        for (risk, count) in &summary.risk_counts {
            println!("Risk {}: {}", risk, count);
        }
        for (country, count) in &summary.country_counts {
            println!("Country {}: {}", country, count);
        }
        println!("Owners resolved: {}", summary.owner_resolved);
        if !summary.top_risks.is_empty() {
            println!("Most suspicious: {}", summary.top_risks.join(", "));
        }
        println!("====================\n");

        if self.verbosity >= VerbosityLevel::Detailed {
            for failure in &summary.failures {
                println!("  {} -> {}", failure.number, failure.error);
            }
        }
    }

    /// Write every collected message to the log file, if one was configured
    pub fn export_logs(&self) -> std::io::Result<()> {
        let Some(path) = &self.log_file_path else {
            return Ok(());
        };
        let Ok(buffer) = self.log_buffer.lock() else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        for entry in buffer.iter() {
            writeln!(file, "{}", entry)?;
        }
        file.flush()
    }

    pub fn is_log_export_enabled(&self) -> bool {
        self.log_file_path.is_some()
    }

    pub fn get_log_count(&self) -> usize {
        self.log_buffer.lock().map(|buffer| buffer.len()).unwrap_or(0)
    }
}
