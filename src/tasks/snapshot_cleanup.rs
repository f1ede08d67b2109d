//! Delete owned snapshots past the retention window

use crate::config::Config;
use crate::error::Result;
use crate::pipeline::{Action, Pipeline, Policy, Predicate};
use crate::provider::{ComputeApi, ListQuery, ResourceId, ResourceKind};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct SnapshotSettings {
    pub retention_days: u32,
    /// Tag key that protects a snapshot from deletion
    pub retain_tag: String,
    pub dry_run: bool,
}

impl SnapshotSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            retention_days: config.snapshots.retention_days,
            retain_tag: config.snapshots.retain_tag.clone(),
            dry_run: config.snapshots.dry_run,
        }
    }

    pub fn predicate(&self) -> Predicate {
        Predicate::OlderThan {
            max_age: Duration::days(i64::from(self.retention_days)),
            override_tag: Some(self.retain_tag.clone()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleanupReport {
    /// Deleted, or eligible for deletion in a dry run. Failed deletes are
    /// not listed.
    #[serde(rename = "DeletedSnapshots")]
    pub deleted: Vec<ResourceId>,
    #[serde(rename = "DryRun")]
    pub dry_run: bool,
    #[serde(skip)]
    pub failed: Vec<(ResourceId, String)>,
}

pub async fn cleanup_snapshots(
    compute: &dyn ComputeApi,
    settings: SnapshotSettings,
    now: DateTime<Utc>,
) -> Result<CleanupReport> {
    let account_id = compute.account_id().await?;
    let policy = Policy::new(
        ResourceKind::Snapshot,
        ListQuery::new().owned_by(account_id),
        settings.predicate(),
        Action::Delete,
    );

    let summary = Pipeline::new(compute, now)
        .dry_run(settings.dry_run)
        .run(&policy)
        .await?;

    let outcome = summary.outcome;
    if !outcome.failed.is_empty() {
        warn!("{} snapshot deletes failed", outcome.failed.len());
    }
    info!(
        "{} {} snapshots older than {} days",
        if settings.dry_run { "Would delete" } else { "Deleted" },
        outcome.affected.len(),
        settings.retention_days
    );

    Ok(CleanupReport {
        deleted: outcome.affected,
        dry_run: settings.dry_run,
        failed: outcome.failed,
    })
}
