//! sweepctl library
//!
//! Scan-filter-act operations over AWS accounts: tag, schedule and clean up
//! resources, and report on costs, right-sizing and unused resources.

pub mod config;
pub mod error;
pub mod exit_codes;
pub mod export;
pub mod handler;
pub mod metrics;
pub mod pipeline;
pub mod provider;
pub mod providers;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use error::{Result, SweepError};
pub use pipeline::{Finding, Pipeline, Policy, UnusedReport};
pub use provider::{ComputeApi, CostApi, MetricsApi, ResourceKind, ResourceRecord};
