//! Owner-name resolution from public search snippets
//!
//! For a phone number, two search queries are issued and the result titles are
//! scanned for Title-Case personal names. Names are tallied across all titles
//! and the most frequent one wins, with a confidence tier derived from its vote
//! count. Results are cached per resolver instance.
//!
//! The network sits behind [`SearchBackend`] so the voting logic can run
//! against canned pages in tests.

use crate::config::{ConfigError, OwnerLookupConfig};
use crate::phone::NumberDescriptor;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Label recorded in every profile produced by the snippet heuristic
pub const LOOKUP_METHOD: &str = "DuckDuckGo search-snippet heuristic";

/// Disambiguating terms paired with the number, one query each
const QUERY_TERMS: [&str; 2] = ["Truecaller", "phone owner"];

const NOTE_GUESS: &str = "Heuristic guess from public indexed pages. Verify manually.";
const NOTE_NO_NAME: &str = "No reliable owner name discovered in indexed public snippets.";
const NOTE_UNAVAILABLE: &str = "Owner lookup sources were unavailable.";

/// Names that mean "we do not know who owns this number"
const UNRESOLVED_NAMES: [&str; 3] = ["unknown", "", "lookup disabled"];

const MAX_CANDIDATES: usize = 3;

static NAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Z][a-z]{2,}(?: [A-Z][a-z]{2,}){1,2}\b").unwrap()
});

static RESULT_TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("a.result__a").unwrap());

/// Words that disqualify a Title-Case sequence from being a person's name
static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "truecaller", "telegram", "whatsapp", "facebook", "google", "duckduckgo",
        "search", "number", "phone", "caller", "owner", "unknown", "mobile",
        "contact", "lookup", "directory",
    ]
    .into_iter()
    .collect()
});

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("non-success status {status} for {url}")]
    Status { status: u16, url: String },

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

/// Source of search-result pages
pub trait SearchBackend: Send + Sync {
    /// Fetch the HTML body behind `url`. One call is one network request.
    fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Blocking HTTP backend with a fixed per-request timeout and no retries
pub struct HttpSearchBackend {
    client: reqwest::blocking::Client,
}

impl HttpSearchBackend {
    pub fn new(config: &OwnerLookupConfig) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

impl SearchBackend for HttpSearchBackend {
    fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let response = self.client.get(url).send().map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(url.to_string())
            } else {
                FetchError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        response.text().map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(url.to_string())
            } else {
                FetchError::Transport(e.to_string())
            }
        })
    }
}

/// How far a guessed name can be trusted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn from_votes(votes: usize) -> Self {
        match votes {
            0 | 1 => Confidence::Low,
            2 => Confidence::Medium,
            _ => Confidence::High,
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confidence::Low => write!(f, "Low"),
            Confidence::Medium => write!(f, "Medium"),
            Confidence::High => write!(f, "High"),
        }
    }
}

/// Best-guess owner of a number
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnerProfile {
    pub name: String,
    pub confidence: Confidence,
    pub method: String,
    pub notes: String,
    /// Query URLs attempted, successful or not
    pub sources: Vec<String>,
    /// Up to three distinct names, most votes first
    pub candidates: Vec<String>,
}

impl OwnerProfile {
    /// Placeholder used when the caller switched owner lookup off
    pub fn disabled() -> Self {
        Self {
            name: "Lookup disabled".to_string(),
            confidence: Confidence::Low,
            method: "Disabled by user setting".to_string(),
            notes: "Enable owner lookup in the configuration or drop --no-owner-lookup.".to_string(),
            sources: Vec::new(),
            candidates: Vec::new(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        !is_unresolved_name(&self.name)
    }
}

/// True for "Unknown", "Lookup disabled" and blank names (case-insensitive)
pub fn is_unresolved_name(name: &str) -> bool {
    let normalized = name.trim().to_lowercase();
    UNRESOLVED_NAMES.contains(&normalized.as_str())
}

/// Snapshot of cache activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

type Slot = Arc<OnceLock<Arc<OwnerProfile>>>;

/// Per-resolver owner cache.
///
/// Created together with its [`OwnerResolver`] and lives exactly as long as it.
/// The key map is guarded by a mutex; each key owns a once-cell, so concurrent
/// lookups of the same number resolve it once and everyone else waits for
/// that result.
#[derive(Debug, Default)]
pub struct OwnerCache {
    entries: Mutex<HashMap<String, Slot>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl OwnerCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached profile for `key`, computing it with `resolve` on a miss
    pub fn get_or_resolve<F>(&self, key: &str, resolve: F) -> Arc<OwnerProfile>
    where
        F: FnOnce() -> OwnerProfile,
    {
        let slot = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(entries.entry(key.to_string()).or_default())
        };

        let mut resolved_here = false;
        let profile = slot.get_or_init(|| {
            resolved_here = true;
            Arc::new(resolve())
        });

        if resolved_here {
            self.misses.fetch_add(1, Ordering::Relaxed);
        } else {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        Arc::clone(profile)
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        CacheStats {
            entries: entries.values().filter(|slot| slot.get().is_some()).count(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Drop every entry and reset the counters
    pub fn clear(&self) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}

/// Frequency count that remembers first-seen order for tie-breaking
#[derive(Debug, Default)]
struct VoteTally {
    order: Vec<String>,
    counts: HashMap<String, usize>,
}

impl VoteTally {
    fn add(&mut self, name: String) {
        match self.counts.get_mut(&name) {
            Some(count) => *count += 1,
            None => {
                self.counts.insert(name.clone(), 1);
                self.order.push(name);
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Names by descending vote count; equal counts keep first-seen order
    fn ranked(&self) -> Vec<(&str, usize)> {
        let mut ranked: Vec<(&str, usize)> = self
            .order
            .iter()
            .map(|name| (name.as_str(), self.counts.get(name).copied().unwrap_or(0)))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked
    }
}

/// Turns numbers into owner-name guesses, caching every answer
pub struct OwnerResolver {
    backend: Arc<dyn SearchBackend>,
    search_url: Url,
    max_titles: usize,
    cache: OwnerCache,
}

impl OwnerResolver {
    pub fn new(backend: Arc<dyn SearchBackend>, config: &OwnerLookupConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let search_url = Url::parse(&config.search_url).map_err(|_| ConfigError::InvalidUrl {
            field: "owner_lookup.search_url".to_string(),
            url: config.search_url.clone(),
        })?;

        Ok(Self {
            backend,
            search_url,
            max_titles: config.max_titles_per_query,
            cache: OwnerCache::new(),
        })
    }

    /// Resolver backed by the real HTTP search endpoint
    pub fn from_config(config: &OwnerLookupConfig) -> anyhow::Result<Self> {
        let backend = HttpSearchBackend::new(config)?;
        Ok(Self::new(Arc::new(backend), config)?)
    }

    /// Cached or freshly computed owner guess for `number`
    pub fn lookup_owner_name(&self, number: &NumberDescriptor) -> Arc<OwnerProfile> {
        let key = number.key();
        self.cache.get_or_resolve(&key, || self.resolve(&key))
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    fn query_url(&self, query: &str) -> String {
        let mut url = self.search_url.clone();
        url.query_pairs_mut().append_pair("q", query);
        url.to_string()
    }

    fn resolve(&self, key: &str) -> OwnerProfile {
        let mut tally = VoteTally::default();
        let mut sources = Vec::with_capacity(QUERY_TERMS.len());
        let mut failed_queries = 0;

        for term in QUERY_TERMS {
            let url = self.query_url(&format!("\"{}\" \"{}\"", key, term));
            sources.push(url.clone());

            match self.backend.fetch(&url) {
                Ok(body) => {
                    for title in extract_titles(&body, self.max_titles) {
                        for name in extract_candidate_names(&title) {
                            tally.add(name);
                        }
                    }
                }
                Err(e) => {
                    failed_queries += 1;
                    debug!("Owner lookup query failed for {}: {}", key, e);
                }
            }
        }

        if tally.is_empty() {
            let notes = if failed_queries == QUERY_TERMS.len() {
                NOTE_UNAVAILABLE
            } else {
                NOTE_NO_NAME
            };
            debug!("No owner candidates for {} ({} failed queries)", key, failed_queries);
            return OwnerProfile {
                name: "Unknown".to_string(),
                confidence: Confidence::Low,
                method: LOOKUP_METHOD.to_string(),
                notes: notes.to_string(),
                sources,
                candidates: Vec::new(),
            };
        }

        let ranked = tally.ranked();
        let (best_name, votes) = ranked[0];
        debug!("Owner guess for {}: {} ({} votes)", key, best_name, votes);

        OwnerProfile {
            name: best_name.to_string(),
            confidence: Confidence::from_votes(votes),
            method: LOOKUP_METHOD.to_string(),
            notes: NOTE_GUESS.to_string(),
            sources,
            candidates: ranked
                .iter()
                .take(MAX_CANDIDATES)
                .map(|(name, _)| name.to_string())
                .collect(),
        }
    }
}

/// Text of the first `limit` result titles, markup stripped and entities decoded.
/// Every tag boundary counts as a word break.
fn extract_titles(html: &str, limit: usize) -> Vec<String> {
    let document = Html::parse_document(html);
    document
        .select(&RESULT_TITLE)
        .take(limit)
        .map(|anchor| {
            let text = anchor.text().collect::<Vec<_>>().join(" ");
            text.split_whitespace().collect::<Vec<_>>().join(" ")
        })
        .collect()
}

/// Title-Case runs of two or three words that survive the stopword filter
fn extract_candidate_names(text: &str) -> Vec<String> {
    NAME_PATTERN
        .find_iter(text)
        .map(|m| m.as_str())
        .filter(|candidate| is_likely_name(candidate))
        .map(str::to_string)
        .collect()
}

fn is_likely_name(candidate: &str) -> bool {
    let words: Vec<&str> = candidate.split_whitespace().collect();
    if words.len() < 2 {
        return false;
    }
    words
        .iter()
        .all(|word| !STOPWORDS.contains(word.to_lowercase().as_str()))
}
