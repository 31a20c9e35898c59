//! Bulk input parsing and batch summaries
//!
//! Supports:
//! - Text files with one number per line (`#` comments and blank lines skipped)
//! - CSV files with a "number" column header (and optional "label" column)
//! - JSON files with an array of number strings or objects with a "number" field
//! - Order-preserving dedupe
//! - Summaries of engine runs (risk and country distribution) exported as JSON

use crate::owner::is_unresolved_name;
use crate::risk::RiskLevel;
use crate::scanner::UNKNOWN_CARRIER;
use crate::task::{Task, TaskResult};
use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

/// How many numbers the summary lists as most suspicious
pub const TOP_RISK_LIMIT: usize = 10;

/// A phone number read from a bulk input file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NumberEntry {
    /// Number exactly as written (trimmed); validated later by the worker
    pub number: String,
    /// Optional label for the number (e.g., contact name or ticket id)
    #[serde(default)]
    pub label: Option<String>,
}

impl NumberEntry {
    pub fn new(number: impl Into<String>) -> Self {
        Self {
            number: number.into(),
            label: None,
        }
    }

    pub fn with_label(number: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            number: number.into(),
            label: Some(label.into()),
        }
    }
}

/// Input format for bulk number files
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputFormat {
    /// Plain text or CSV
    Text,
    Json,
}

impl InputFormat {
    /// Detect format from file extension; anything but .json is read as text
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()).map(|e| e.to_lowercase()).as_deref() {
            Some("json") => Self::Json,
            _ => Self::Text,
        }
    }
}

/// Parse a number list from a file. A file without any numbers is an error.
pub fn parse_number_file(path: &Path) -> Result<Vec<NumberEntry>> {
    let content = fs::read_to_string(path)
        .context(format!("Failed to read input file: {}", path.display()))?;

    let entries = match InputFormat::from_path(path) {
        InputFormat::Text => parse_text_numbers(&content)?,
        InputFormat::Json => parse_json_numbers(&content)?,
    };

    if entries.is_empty() {
        bail!("Input file contains no numbers: {}", path.display());
    }
    Ok(entries)
}

/// Parse numbers from text or CSV content
///
/// Supports two layouts:
/// 1. One number per line; with commas, the first column is the number
/// 2. CSV with a "number" column header (and optional "label" column)
pub fn parse_text_numbers(content: &str) -> Result<Vec<NumberEntry>> {
    let mut numbers = Vec::new();

    let first_line = content
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'));
    let Some(first_line) = first_line else {
        return Ok(numbers);
    };

    let has_header = first_line
        .split(',')
        .any(|h| h.trim().eq_ignore_ascii_case("number"));

    if has_header {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .comment(Some(b'#'))
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());

        let headers = reader.headers().context("Failed to read CSV headers")?.clone();

        let number_idx = headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case("number"))
            .context("CSV must have a 'number' column when using headers")?;
        let label_idx = headers.iter().position(|h| h.eq_ignore_ascii_case("label"));

        for result in reader.records() {
            let record = result.context("Failed to parse CSV record")?;

            let number = record
                .get(number_idx)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty());

            if let Some(number) = number {
                let label = label_idx
                    .and_then(|idx| record.get(idx))
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty());

                numbers.push(NumberEntry { number, label });
            }
        }
    } else {
        for line in content.lines() {
            let number = line.split(',').next().unwrap_or(line).trim();

            if number.is_empty() || number.starts_with('#') {
                continue;
            }

            numbers.push(NumberEntry::new(number));
        }
    }

    Ok(numbers)
}

/// Parse numbers from JSON content
///
/// Supports three layouts:
/// 1. Array of number strings: ["+14155552671", "+447400123456"]
/// 2. Array of objects: [{"number": "+14155552671", "label": "front desk"}]
/// 3. Object with a "numbers" array of either of the above
pub fn parse_json_numbers(content: &str) -> Result<Vec<NumberEntry>> {
    let value: serde_json::Value =
        serde_json::from_str(content).context("Failed to parse JSON content")?;

    let entries = match &value {
        serde_json::Value::Array(arr) => parse_json_array(arr),
        serde_json::Value::Object(obj) => match obj.get("numbers") {
            Some(serde_json::Value::Array(arr)) => parse_json_array(arr),
            Some(_) => bail!("'numbers' field must be an array"),
            None => bail!("JSON object must have a 'numbers' array field"),
        },
        _ => bail!("JSON must be an array of numbers or an object with 'numbers' field"),
    };

    Ok(entries)
}

fn parse_json_array(arr: &[serde_json::Value]) -> Vec<NumberEntry> {
    let mut entries = Vec::new();

    for item in arr {
        match item {
            serde_json::Value::String(number) => {
                let number = number.trim();
                if !number.is_empty() {
                    entries.push(NumberEntry::new(number));
                }
            }
            serde_json::Value::Object(obj) => {
                if let Some(serde_json::Value::String(number)) = obj.get("number") {
                    let number = number.trim();
                    if !number.is_empty() {
                        let label = obj
                            .get("label")
                            .and_then(|v| v.as_str())
                            .map(|s| s.trim().to_string())
                            .filter(|s| !s.is_empty());

                        entries.push(NumberEntry {
                            number: number.to_string(),
                            label,
                        });
                    }
                }
            }
            // bare numerics lose leading '+' and zeros
            _ => {}
        }
    }

    entries
}

/// Drop repeated numbers, keeping the first occurrence.
/// Returns the kept entries and how many were removed.
pub fn dedupe_numbers(entries: Vec<NumberEntry>) -> (Vec<NumberEntry>, usize) {
    let before = entries.len();
    let mut seen = HashSet::new();
    let unique: Vec<NumberEntry> = entries
        .into_iter()
        .filter(|entry| seen.insert(entry.number.trim().to_string()))
        .collect();
    let removed = before - unique.len();
    (unique, removed)
}

/// Turn parsed entries into engine tasks
pub fn build_tasks(entries: &[NumberEntry], enable_owner_lookup: bool) -> Vec<Task> {
    entries
        .iter()
        .map(|entry| {
            Task::new(entry.number.clone())
                .with_owner_lookup(enable_owner_lookup)
                .with_render_output(false)
        })
        .collect()
}

/// Per-number line in a batch summary
#[derive(Debug, Clone, Serialize)]
pub struct NumberOutcome {
    pub number: String,
    pub label: Option<String>,
    pub success: bool,
    pub error: Option<String>,
    pub risk: Option<RiskLevel>,
    pub country: Option<String>,
    pub owner: Option<String>,
}

/// A failed task in a batch summary
#[derive(Debug, Clone, Serialize)]
pub struct FailedNumber {
    pub number: String,
    pub error: String,
}

/// Summary of a bulk run
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    /// Engine that executed the batch
    pub engine: String,
    /// Concurrency bound in effect
    pub workers: usize,
    /// Tasks dispatched (after dedupe)
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    /// Duplicates removed before dispatch
    pub skipped: usize,
    /// Successful scans per risk tier
    pub risk_counts: BTreeMap<String, usize>,
    /// Successful scans per region code
    pub country_counts: BTreeMap<String, usize>,
    /// Successes whose owner name was resolved
    pub owner_resolved: usize,
    pub failures: Vec<FailedNumber>,
    /// Most suspicious numbers first
    pub top_risks: Vec<String>,
    pub results: Vec<NumberOutcome>,
    pub total_duration_secs: f64,
    pub started_at: String,
    pub completed_at: String,
}

/// Create a new batch summary
pub fn new_batch_summary(engine: &str, workers: usize) -> BatchSummary {
    BatchSummary {
        engine: engine.to_string(),
        workers,
        total: 0,
        successful: 0,
        failed: 0,
        skipped: 0,
        risk_counts: BTreeMap::new(),
        country_counts: BTreeMap::new(),
        owner_resolved: 0,
        failures: Vec::new(),
        top_risks: Vec::new(),
        results: Vec::new(),
        total_duration_secs: 0.0,
        started_at: Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        completed_at: String::new(),
    }
}

/// Append engine results, pairing each with the entry it came from
pub fn record_results(summary: &mut BatchSummary, entries: &[NumberEntry], results: &[TaskResult]) {
    for (entry, result) in entries.iter().zip(results) {
        summary.results.push(NumberOutcome {
            number: result.number().to_string(),
            label: entry.label.clone(),
            success: result.is_ok(),
            error: result.error().map(str::to_string),
            risk: result.report().map(|report| report.risk),
            country: result.report().map(|report| report.geo.country.clone()),
            owner: result.owner().map(|owner| owner.name.clone()),
        });
    }
    summary.top_risks = top_risks(results, TOP_RISK_LIMIT)
        .into_iter()
        .map(|result| result.number().to_string())
        .collect();
}

/// Finalize a batch summary with end time and totals
pub fn finalize_batch_summary(summary: &mut BatchSummary, duration_secs: f64) {
    summary.completed_at = Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();
    summary.total_duration_secs = duration_secs;
    summary.total = summary.results.len();
    summary.successful = summary.results.iter().filter(|r| r.success).count();
    summary.failed = summary.total - summary.successful;

    summary.risk_counts.clear();
    for risk in summary.results.iter().filter_map(|r| r.risk) {
        *summary.risk_counts.entry(risk.to_string()).or_insert(0) += 1;
    }

    summary.country_counts.clear();
    for country in summary.results.iter().filter_map(|r| r.country.as_deref()) {
        *summary.country_counts.entry(country.to_string()).or_insert(0) += 1;
    }

    summary.owner_resolved = summary
        .results
        .iter()
        .filter(|r| r.success)
        .filter_map(|r| r.owner.as_deref())
        .filter(|name| !is_unresolved_name(name))
        .count();

    summary.failures = summary
        .results
        .iter()
        .filter_map(|r| {
            r.error.as_ref().map(|error| FailedNumber {
                number: r.number.clone(),
                error: error.clone(),
            })
        })
        .collect();
}

/// Export batch summary to JSON file
pub fn export_batch_summary(summary: &BatchSummary, output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(summary).context("Failed to serialize batch summary")?;

    fs::write(output_path, json)
        .context(format!("Failed to write batch summary to: {}", output_path.display()))?;

    Ok(())
}

/// Suspicion score used to order bulk results
fn suspicion_score(result: &TaskResult) -> u32 {
    let mut score = 0;

    if let Some(report) = result.report() {
        score += match report.risk {
            RiskLevel::High => 300,
            RiskLevel::Medium => 200,
            RiskLevel::Low => 100,
        };
        if report.carrier.eq_ignore_ascii_case(UNKNOWN_CARRIER) {
            score += 15;
        }
        if report.voip {
            score += 20;
        }
    }
    if let Some(owner) = result.owner() {
        if !owner.is_resolved() {
            score += 20;
        }
    }

    score
}

/// Successful results ranked by suspicion, highest first; ties keep input order
pub fn top_risks(results: &[TaskResult], limit: usize) -> Vec<&TaskResult> {
    let mut scored: Vec<(u32, &TaskResult)> = results
        .iter()
        .filter(|r| r.is_ok())
        .map(|r| (suspicion_score(r), r))
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.into_iter().take(limit.max(1)).map(|(_, r)| r).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::owner::OwnerProfile;
    use crate::phone::NumberDescriptor;
    use crate::scanner::scan_number;
    use crate::task::TaskPayload;

    // ============ Text / CSV Parsing Tests ============

    #[test]
    fn test_parse_one_number_per_line() {
        let content = "+14155552671\n+447400123456\n  +33612345678  ";
        let result = parse_text_numbers(content).unwrap();

        assert_eq!(result.len(), 3);
        assert_eq!(result[0].number, "+14155552671");
        assert_eq!(result[2].number, "+33612345678");
        assert!(result.iter().all(|e| e.label.is_none()));
    }

    #[test]
    fn test_parse_skips_comments_and_blank_lines() {
        let content = "# numbers from ticket 42\n\n+14155552671\n# trailing note\ninvalid\n";
        let result = parse_text_numbers(content).unwrap();

        // invalid numbers are kept; they fail per task
        assert_eq!(result, vec![NumberEntry::new("+14155552671"), NumberEntry::new("invalid")]);
    }

    #[test]
    fn test_parse_csv_with_header() {
        let content = "label,number\nFront desk,+14155552671\n# skipped\nOn call, +447400123456\nEmpty,\n";
        let result = parse_text_numbers(content).unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result[0], NumberEntry::with_label("+14155552671", "Front desk"));
        assert_eq!(result[1], NumberEntry::with_label("+447400123456", "On call"));
    }

    #[test]
    fn test_parse_csv_without_header_uses_first_column() {
        let content = "+14155552671,Front desk\n+447400123456,On call";
        let result = parse_text_numbers(content).unwrap();

        assert_eq!(result[0].number, "+14155552671");
        assert_eq!(result[1].number, "+447400123456");
        assert!(result[0].label.is_none());
    }

    #[test]
    fn test_number_file_without_numbers_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("numbers.txt");
        fs::write(&path, "# nothing yet\n\n").unwrap();

        let err = parse_number_file(&path).unwrap_err();
        assert!(err.to_string().contains("contains no numbers"), "{}", err);

        let json = dir.path().join("numbers.json");
        fs::write(&json, "[]").unwrap();
        assert!(parse_number_file(&json).is_err());

        fs::write(&path, "+14155552671\n").unwrap();
        assert_eq!(parse_number_file(&path).unwrap().len(), 1);
    }

    #[test]
    fn test_parse_empty() {
        assert!(parse_text_numbers("").unwrap().is_empty());
        assert!(parse_text_numbers("# only a comment\n\n").unwrap().is_empty());
    }

    // ============ JSON Parsing Tests ============

    #[test]
    fn test_parse_json_layouts() {
        let strings = parse_json_numbers(r#"["+14155552671", " +447400123456 "]"#).unwrap();
        assert_eq!(strings[1].number, "+447400123456");

        let objects = parse_json_numbers(r#"[{"number": "+14155552671", "label": "desk"}, {"label": "x"}]"#).unwrap();
        assert_eq!(objects, vec![NumberEntry::with_label("+14155552671", "desk")]);

        let wrapped = parse_json_numbers(r#"{"numbers": ["+14155552671", 4155552671, null]}"#).unwrap();
        assert_eq!(wrapped, vec![NumberEntry::new("+14155552671")]);
    }

    #[test]
    fn test_parse_json_invalid() {
        assert!(parse_json_numbers("not json").is_err());
        assert!(parse_json_numbers(r#"{"numbers": "+1"}"#).is_err());
        assert!(parse_json_numbers(r#"{"phones": []}"#).is_err());
    }

    #[test]
    fn test_input_format_detection() {
        assert_eq!(InputFormat::from_path(Path::new("numbers.json")), InputFormat::Json);
        assert_eq!(InputFormat::from_path(Path::new("numbers.JSON")), InputFormat::Json);
        assert_eq!(InputFormat::from_path(Path::new("numbers.csv")), InputFormat::Text);
        assert_eq!(InputFormat::from_path(Path::new("numbers")), InputFormat::Text);
    }

    // ============ Dedupe Tests ============

    #[test]
    fn test_dedupe_preserves_first_occurrence_order() {
        let entries = vec![
            NumberEntry::new("+2"),
            NumberEntry::with_label("+1", "first"),
            NumberEntry::new("+2"),
            NumberEntry::with_label(" +1", "second"),
            NumberEntry::new("+3"),
        ];
        let (unique, removed) = dedupe_numbers(entries);

        assert_eq!(removed, 2);
        let numbers: Vec<&str> = unique.iter().map(|e| e.number.as_str()).collect();
        assert_eq!(numbers, vec!["+2", "+1", "+3"]);
        assert_eq!(unique[1].label.as_deref(), Some("first"));
    }

    #[test]
    fn test_build_tasks_disables_rendering() {
        let tasks = build_tasks(&[NumberEntry::new("+14155552671")], false);
        assert_eq!(tasks.len(), 1);
        assert!(!tasks[0].enable_owner_lookup);
        assert!(!tasks[0].render_output);
    }

    // ============ Summary Tests ============

    fn scan_result(cc: u16, national: u64) -> TaskResult {
        let number = NumberDescriptor::from_parts(cc, national);
        let report = scan_number(&number, None);
        TaskResult::success(
            number.raw.clone(),
            TaskPayload::Scan {
                report: Box::new(report),
                output: String::new(),
            },
        )
    }

    #[test]
    fn test_batch_summary_finalize() {
        let entries = vec![
            NumberEntry::with_label("+14155552671", "desk"),
            NumberEntry::new("invalid"),
            NumberEntry::new("+447400123456"),
        ];
        let results = vec![
            scan_result(1, 4155552671),
            TaskResult::failure("invalid", "Invalid number: invalid"),
            TaskResult::success(
                "+447400123456",
                TaskPayload::Owner {
                    owner: OwnerProfile {
                        name: "Jane Roe".to_string(),
                        ..OwnerProfile::disabled()
                    },
                },
            ),
        ];

        let mut summary = new_batch_summary("threading", 4);
        summary.skipped = 1;
        record_results(&mut summary, &entries, &results);
        finalize_batch_summary(&mut summary, 1.5);

        assert_eq!(summary.engine, "threading");
        assert_eq!(summary.total, 3);
        assert_eq!(summary.successful, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.owner_resolved, 1);
        assert_eq!(summary.risk_counts.get("Medium"), Some(&1));
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].error, "Invalid number: invalid");
        assert_eq!(summary.results[0].label.as_deref(), Some("desk"));
        assert_eq!(summary.top_risks, vec!["+14155552671", "+447400123456"]);
        assert!(!summary.completed_at.is_empty());
    }

    #[test]
    fn test_country_distribution_counts_scans_only() {
        let parsed = crate::phone::parse_number("+447400123456").unwrap();
        let gb = TaskResult::success(
            parsed.raw.clone(),
            TaskPayload::Scan {
                report: Box::new(scan_number(&parsed, None)),
                output: String::new(),
            },
        );
        let entries = vec![
            NumberEntry::new("+447400123456"),
            NumberEntry::new("+14155552671"),
            NumberEntry::new("+447400123456"),
            NumberEntry::new("oops"),
        ];
        let results = vec![
            gb.clone(),
            scan_result(1, 4155552671),
            gb,
            TaskResult::failure("oops", "Invalid number: oops"),
        ];

        let mut summary = new_batch_summary("threading", 2);
        record_results(&mut summary, &entries, &results);
        finalize_batch_summary(&mut summary, 0.1);

        assert_eq!(summary.country_counts.get("GB"), Some(&2));
        assert_eq!(summary.country_counts.get("Unknown"), Some(&1));
        assert_eq!(summary.country_counts.values().sum::<usize>(), 3);
        assert_eq!(summary.results[0].country.as_deref(), Some("GB"));
        assert_eq!(summary.results[3].country, None);
    }

    #[test]
    fn test_export_batch_summary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");
        let mut summary = new_batch_summary("async", 2);
        finalize_batch_summary(&mut summary, 0.0);

        export_batch_summary(&summary, &path).unwrap();
        let written: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["engine"], "async");
        assert_eq!(written["total"], 0);
    }
}
