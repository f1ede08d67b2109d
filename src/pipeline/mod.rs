//! Scan-filter-act pipeline
//!
//! Every unit in `crate::tasks` is one or more runs of the same linear pass:
//!
//! ```text
//! List (paginated) -> Filter (predicate + optional metric) -> Report | Act -> Return
//! ```
//!
//! There is no state carried between runs and nothing is retried.

pub mod action;
pub mod lister;
pub mod policy;
pub mod report;

pub use action::{ActionExecutor, ActionOutcome, ItemOutcome};
pub use lister::Lister;
pub use policy::{tag_delta, Action, Policy, Predicate};
pub use report::{Finding, UnusedReport};

use crate::error::Result;
use crate::metrics::MetricProbe;
use crate::provider::{ComputeApi, ListQuery, ResourceId, ResourceKind, ResourceRecord};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use serde::Serialize;
use tracing::{debug, info, warn};

/// A record that satisfied the predicate, with the sample it was judged on
#[derive(Debug, Clone)]
pub struct Match {
    pub record: ResourceRecord,
    pub metric: Option<f64>,
}

/// Result of one full pass
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub kind: ResourceKind,
    /// Every record the predicate selected, in listing order
    pub matched: Vec<ResourceId>,
    pub outcome: ActionOutcome,
}

pub struct Pipeline<'a> {
    compute: &'a dyn ComputeApi,
    probe: Option<&'a dyn MetricProbe>,
    dry_run: bool,
    now: DateTime<Utc>,
}

impl<'a> Pipeline<'a> {
    /// `now` is the reference time for every age comparison in this run
    pub fn new(compute: &'a dyn ComputeApi, now: DateTime<Utc>) -> Self {
        Self {
            compute,
            probe: None,
            dry_run: false,
            now,
        }
    }

    pub fn with_probe(mut self, probe: &'a dyn MetricProbe) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn region(&self) -> &str {
        self.compute.region()
    }

    /// List and filter. Metric samples are only requested for records that
    /// pass the non-metric part of the predicate.
    pub async fn scan(
        &self,
        kind: ResourceKind,
        query: &ListQuery,
        predicate: &Predicate,
    ) -> Result<Vec<Match>> {
        let needs_metric = predicate.needs_metric();
        if needs_metric && self.probe.is_none() {
            warn!("Predicate needs a metric sample but no probe is configured; nothing will match");
        }

        let mut matches = Vec::new();
        let mut records = Lister::new(self.compute).stream(kind, query.clone());
        while let Some(record) = records.try_next().await? {
            if !predicate.prefilter(&record, self.now) {
                debug!("Skipping {} {}", kind, record.id);
                continue;
            }
            let metric = match (needs_metric, self.probe) {
                (true, Some(probe)) => probe.sample(&record).await?,
                _ => None,
            };
            if predicate.evaluate(&record, metric, self.now) {
                debug!("{} {} matched (metric: {:?})", kind, record.id, metric);
                matches.push(Match { record, metric });
            }
        }
        Ok(matches)
    }

    /// Scan, then act on the matches
    pub async fn run(&self, policy: &Policy) -> Result<RunSummary> {
        let matches = self.scan(policy.kind, &policy.query, &policy.predicate).await?;
        if self.dry_run && policy.action.is_mutating() {
            info!(
                "(Dry Run) {} {}(s) matched for {}, no changes will be made",
                matches.len(),
                policy.kind,
                policy.action.name()
            );
        }
        let records: Vec<ResourceRecord> = matches.into_iter().map(|m| m.record).collect();
        let outcome = ActionExecutor::new(self.compute, self.dry_run)
            .execute(&policy.action, &records)
            .await?;
        Ok(RunSummary {
            kind: policy.kind,
            matched: records.into_iter().map(|r| r.id).collect(),
            outcome,
        })
    }
}
