//! Operational units
//!
//! Each unit wires one or more pipeline runs for a single job. Settings are
//! built from `Config` once at the boundary and passed in by value.

pub mod auto_tagger;
pub mod cost_analysis;
pub mod rightsizing;
pub mod scheduler;
pub mod snapshot_cleanup;
pub mod unused_resources;

pub use auto_tagger::{tag_resources, TaggedResources, TaggerSettings};
pub use cost_analysis::{CostAnalyzer, CostReport, CostSettings};
pub use rightsizing::{recommend, RightsizingSettings};
pub use scheduler::{run_schedule, ScheduleAction, ScheduleResult, SchedulerSettings};
pub use snapshot_cleanup::{cleanup_snapshots, CleanupReport, SnapshotSettings};
pub use unused_resources::{scan_regions, UnusedScanner, UnusedSettings};
