//! Phone-number reconnaissance library.
//!
//! A batch of [`Task`]s is fanned out by an [`Engine`] to a [`Worker`], which
//! parses the number, asks the [`OwnerResolver`] for an owner guess and scores
//! the result. Every task yields exactly one [`TaskResult`], in input order.

pub mod batch;
pub mod cli;
pub mod config;
pub mod engine;
pub mod logger;
pub mod owner;
pub mod phone;
pub mod risk;
pub mod scanner;
pub mod task;
pub mod workers;

pub use config::{AppConfig, ConfigError, OwnerLookupConfig};
pub use engine::{available_engines, create_engine, Engine, EngineKind};
pub use owner::{OwnerProfile, OwnerResolver};
pub use phone::{parse_number, NumberDescriptor};
pub use risk::RiskLevel;
pub use scanner::{scan_number, ScanReport};
pub use task::{Task, TaskPayload, TaskResult};
pub use workers::{OwnerLookupWorker, ScanWorker, Worker};
