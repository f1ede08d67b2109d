//! In-memory fakes of the remote APIs
//!
//! `FakeCloud` implements `ComputeApi`, `MetricsApi` and `CostApi` over a
//! fixed set of records and records every call it receives, so tests can
//! assert on exactly which remote calls a run issued.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;
use sweepctl::error::{Result, SweepError};
use sweepctl::provider::*;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    List {
        kind: ResourceKind,
        token: Option<String>,
    },
    CreateTags {
        ids: Vec<ResourceId>,
        tags: TagSet,
    },
    Stop(Vec<ResourceId>),
    Start(Vec<ResourceId>),
    Delete(ResourceKind, ResourceId),
    AccountId,
    ListRegions,
    Statistics {
        metric_name: String,
        instance_id: String,
    },
    CostAndUsage(CostQuery),
}

impl Call {
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Call::CreateTags { .. } | Call::Stop(_) | Call::Start(_) | Call::Delete(..)
        )
    }
}

pub struct FakeCloud {
    region: String,
    records: Vec<ResourceRecord>,
    page_size: usize,
    /// metric name -> instance id -> datapoint values
    metrics: HashMap<String, HashMap<String, Vec<f64>>>,
    cost_periods: Vec<CostPeriod>,
    failing_deletes: BTreeSet<ResourceId>,
    fail_listing: bool,
    calls: Mutex<Vec<Call>>,
}

impl FakeCloud {
    pub fn new(region: &str) -> Self {
        Self {
            region: region.to_string(),
            records: Vec::new(),
            page_size: 100,
            metrics: HashMap::new(),
            cost_periods: Vec::new(),
            failing_deletes: BTreeSet::new(),
            fail_listing: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_records(mut self, records: Vec<ResourceRecord>) -> Self {
        self.records.extend(records);
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_metric(mut self, metric_name: &str, instance_id: &str, values: &[f64]) -> Self {
        self.metrics
            .entry(metric_name.to_string())
            .or_default()
            .insert(instance_id.to_string(), values.to_vec());
        self
    }

    pub fn with_cost_periods(mut self, periods: Vec<CostPeriod>) -> Self {
        self.cost_periods = periods;
        self
    }

    pub fn failing_delete(mut self, id: &str) -> Self {
        self.failing_deletes.insert(id.to_string());
        self
    }

    pub fn failing_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn mutating_calls(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutating).collect()
    }

    pub fn list_calls(&self, kind: ResourceKind) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::List { kind: k, .. } if *k == kind))
            .count()
    }

    fn log(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

fn state_name(state: &ResourceState) -> &'static str {
    match state {
        ResourceState::Running => "running",
        ResourceState::Starting => "pending",
        ResourceState::Stopped => "stopped",
        ResourceState::Terminating => "shutting-down",
        ResourceState::Terminated => "terminated",
        ResourceState::Available => "available",
        ResourceState::InUse => "in-use",
        ResourceState::Pending => "pending",
        ResourceState::Completed => "completed",
        ResourceState::Error(_) => "error",
        ResourceState::Unknown => "unknown",
    }
}

/// Server-side filter semantics for the filter names the crate sends
fn matches_filter(record: &ResourceRecord, filter: &Filter) -> bool {
    let value = if let Some(key) = filter.name.strip_prefix("tag:") {
        record.tags.get(key).cloned()
    } else {
        match filter.name.as_str() {
            "instance-state-name" | "status" => record.state().map(|s| state_name(s).to_string()),
            _ => return true,
        }
    };
    value.map(|v| filter.values.contains(&v)).unwrap_or(false)
}

#[async_trait]
impl ComputeApi for FakeCloud {
    fn region(&self) -> &str {
        &self.region
    }

    async fn list_page(
        &self,
        kind: ResourceKind,
        query: &ListQuery,
        token: Option<String>,
    ) -> Result<Page> {
        self.log(Call::List {
            kind,
            token: token.clone(),
        });
        if self.fail_listing {
            return Err(SweepError::query("describe", "simulated outage"));
        }

        let matching: Vec<ResourceRecord> = self
            .records
            .iter()
            .filter(|r| r.kind == kind)
            .filter(|r| query.filters.iter().all(|f| matches_filter(r, f)))
            .cloned()
            .collect();

        if !kind.is_paginated() {
            return Ok(Page {
                records: matching,
                next_token: None,
            });
        }

        let start: usize = token.as_deref().map(|t| t.parse().unwrap()).unwrap_or(0);
        let end = (start + self.page_size).min(matching.len());
        Ok(Page {
            records: matching[start..end].to_vec(),
            next_token: (end < matching.len()).then(|| end.to_string()),
        })
    }

    async fn create_tags(&self, resource_ids: &[ResourceId], tags: &TagSet) -> Result<()> {
        self.log(Call::CreateTags {
            ids: resource_ids.to_vec(),
            tags: tags.clone(),
        });
        Ok(())
    }

    async fn stop_instances(&self, instance_ids: &[ResourceId]) -> Result<()> {
        self.log(Call::Stop(instance_ids.to_vec()));
        Ok(())
    }

    async fn start_instances(&self, instance_ids: &[ResourceId]) -> Result<()> {
        self.log(Call::Start(instance_ids.to_vec()));
        Ok(())
    }

    async fn delete(&self, kind: ResourceKind, resource_id: &str) -> Result<()> {
        self.log(Call::Delete(kind, resource_id.to_string()));
        if self.failing_deletes.contains(resource_id) {
            return Err(SweepError::action(
                "delete_snapshot",
                Some(resource_id),
                "InvalidSnapshot.InUse",
            ));
        }
        Ok(())
    }

    async fn account_id(&self) -> Result<String> {
        self.log(Call::AccountId);
        Ok("123456789012".to_string())
    }

    async fn list_regions(&self) -> Result<Vec<String>> {
        self.log(Call::ListRegions);
        Ok(vec![self.region.clone()])
    }
}

#[async_trait]
impl MetricsApi for FakeCloud {
    async fn statistics(&self, query: &MetricQuery) -> Result<Vec<Datapoint>> {
        self.log(Call::Statistics {
            metric_name: query.metric_name.clone(),
            instance_id: query.dimension_value.clone(),
        });
        let values = self
            .metrics
            .get(&query.metric_name)
            .and_then(|by_instance| by_instance.get(&query.dimension_value))
            .cloned()
            .unwrap_or_default();
        Ok(values
            .into_iter()
            .map(|value| Datapoint {
                timestamp: None,
                value,
            })
            .collect())
    }
}

#[async_trait]
impl CostApi for FakeCloud {
    async fn cost_and_usage(&self, query: &CostQuery) -> Result<Vec<CostPeriod>> {
        self.log(Call::CostAndUsage(query.clone()));
        Ok(self.cost_periods.clone())
    }
}

pub fn tags(pairs: &[(&str, &str)]) -> TagSet {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn default_tags() -> TagSet {
    tags(&[("Environment", "Untagged"), ("Owner", "Unknown")])
}

pub fn instance(id: &str, state: ResourceState, tag_pairs: &[(&str, &str)]) -> ResourceRecord {
    ResourceRecord {
        id: id.to_string(),
        kind: ResourceKind::Instance,
        tags: tags(tag_pairs),
        attributes: ResourceAttributes::Instance {
            state,
            instance_type: "m5.large".to_string(),
            launch_time: None,
        },
    }
}

pub fn volume(id: &str, state: ResourceState, tag_pairs: &[(&str, &str)]) -> ResourceRecord {
    ResourceRecord {
        id: id.to_string(),
        kind: ResourceKind::Volume,
        tags: tags(tag_pairs),
        attributes: ResourceAttributes::Volume {
            state,
            size_gib: 100,
            volume_type: Some("gp3".to_string()),
            create_time: None,
        },
    }
}

pub fn snapshot(
    id: &str,
    age_days: i64,
    tag_pairs: &[(&str, &str)],
    now: DateTime<Utc>,
) -> ResourceRecord {
    ResourceRecord {
        id: id.to_string(),
        kind: ResourceKind::Snapshot,
        tags: tags(tag_pairs),
        attributes: ResourceAttributes::Snapshot {
            volume_id: Some("vol-source".to_string()),
            volume_size_gib: Some(8),
            start_time: Some(now - Duration::days(age_days)),
        },
    }
}

pub fn address(id: &str, instance_id: Option<&str>, eni: Option<&str>) -> ResourceRecord {
    ResourceRecord {
        id: id.to_string(),
        kind: ResourceKind::Address,
        tags: TagSet::new(),
        attributes: ResourceAttributes::Address {
            public_ip: Some("203.0.113.10".to_string()),
            instance_id: instance_id.map(str::to_string),
            network_interface_id: eni.map(str::to_string),
        },
    }
}
