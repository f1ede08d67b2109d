//! Action executor
//!
//! Turns a list of matched records into remote calls. Bulk actions (tag,
//! stop, start) are issued once per batch and their failures abort the run.
//! Deletes are issued per item and a failure only removes that item from the
//! result.

use crate::error::Result;
use crate::pipeline::policy::{tag_delta, Action};
use crate::provider::{ComputeApi, ResourceId, ResourceRecord, TagSet};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Outcome of one per-item call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Applied,
    /// Dry run: the call was not issued
    WouldApply,
    Failed { reason: String },
}

/// Result of executing one action over a batch
#[derive(Debug, Clone, Default, Serialize)]
pub struct ActionOutcome {
    pub action: String,
    pub dry_run: bool,
    /// Resources acted upon, or that would have been in a dry run
    pub affected: Vec<ResourceId>,
    /// Per-item failures (delete only)
    pub failed: Vec<(ResourceId, String)>,
    /// Tags added per resource (tag action only)
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub tags_added: BTreeMap<ResourceId, TagSet>,
}

impl ActionOutcome {
    fn new(action: &Action, dry_run: bool) -> Self {
        Self {
            action: action.name().to_string(),
            dry_run,
            ..Default::default()
        }
    }

    fn record(&mut self, id: ResourceId, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Applied | ItemOutcome::WouldApply => self.affected.push(id),
            ItemOutcome::Failed { reason } => self.failed.push((id, reason)),
        }
    }
}

pub struct ActionExecutor<'a> {
    api: &'a dyn ComputeApi,
    dry_run: bool,
}

impl<'a> ActionExecutor<'a> {
    pub fn new(api: &'a dyn ComputeApi, dry_run: bool) -> Self {
        Self { api, dry_run }
    }

    /// Execute `action` over `matches`. No remote call is made when
    /// `matches` is empty or the executor is in dry-run mode.
    pub async fn execute(&self, action: &Action, matches: &[ResourceRecord]) -> Result<ActionOutcome> {
        let mut outcome = ActionOutcome::new(action, self.dry_run);
        if matches.is_empty() {
            return Ok(outcome);
        }

        match action {
            Action::ReportOnly => {
                outcome.affected = matches.iter().map(|r| r.id.clone()).collect();
            }
            Action::MergeTags(desired) => self.merge_tags(desired, matches, &mut outcome).await?,
            Action::Stop | Action::Start => {
                let ids: Vec<ResourceId> = matches.iter().map(|r| r.id.clone()).collect();
                if self.dry_run {
                    info!("(Dry Run) Would {} instances: {:?}", action.name(), ids);
                } else if matches!(action, Action::Stop) {
                    info!("Stopping instances: {:?}", ids);
                    self.api.stop_instances(&ids).await?;
                } else {
                    info!("Starting instances: {:?}", ids);
                    self.api.start_instances(&ids).await?;
                }
                outcome.affected = ids;
            }
            Action::Delete => {
                for record in matches {
                    let item = self.delete_one(record).await;
                    outcome.record(record.id.clone(), item);
                }
            }
        }

        Ok(outcome)
    }

    /// Applies only the missing tags. Resources that need the same delta
    /// share one create-tags call.
    async fn merge_tags(
        &self,
        desired: &TagSet,
        matches: &[ResourceRecord],
        outcome: &mut ActionOutcome,
    ) -> Result<()> {
        let mut batches: BTreeMap<TagSet, Vec<ResourceId>> = BTreeMap::new();
        for record in matches {
            let delta = tag_delta(&record.tags, desired);
            if delta.is_empty() {
                continue;
            }
            info!("Tagging {} {} with: {:?}", record.kind, record.id, delta);
            batches.entry(delta.clone()).or_default().push(record.id.clone());
            outcome.affected.push(record.id.clone());
            outcome.tags_added.insert(record.id.clone(), delta);
        }

        if self.dry_run {
            return Ok(());
        }
        for (delta, ids) in &batches {
            self.api.create_tags(ids, delta).await?;
        }
        Ok(())
    }

    async fn delete_one(&self, record: &ResourceRecord) -> ItemOutcome {
        if self.dry_run {
            info!("(Dry Run) Would have deleted {}: {}", record.kind, record.id);
            return ItemOutcome::WouldApply;
        }
        match self.api.delete(record.kind, &record.id).await {
            Ok(()) => {
                info!("Deleted {}: {}", record.kind, record.id);
                ItemOutcome::Applied
            }
            Err(e) => {
                warn!("Error deleting {} {}: {}", record.kind, record.id, e);
                ItemOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}
