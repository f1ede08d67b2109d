//! Provider-agnostic data model and remote API traits
//!
//! Everything the scan-filter-act pipeline touches is expressed here as a
//! typed record. The AWS implementation in `providers::aws` decodes SDK
//! responses into these types immediately after each call, so the rest of
//! the crate never sees SDK shapes.
//!
//! The three traits are the seams between the pipeline and the outside
//! world: `ComputeApi` (list, tag, stop/start, delete), `MetricsApi`
//! (datapoint queries) and `CostApi` (grouped cost and usage).

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Resource identifier (instance ID, volume ID, snapshot ID, allocation ID)
pub type ResourceId = String;

/// Tag set of a resource. Keys are unique; iteration order is stable.
pub type TagSet = BTreeMap<String, String>;

/// Kinds of resources the pipeline can enumerate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Instance,
    Volume,
    Snapshot,
    Address,
}

impl ResourceKind {
    /// Whether the listing API for this kind follows page tokens
    pub fn is_paginated(self) -> bool {
        !matches!(self, ResourceKind::Address)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceKind::Instance => "instance",
            ResourceKind::Volume => "volume",
            ResourceKind::Snapshot => "snapshot",
            ResourceKind::Address => "address",
        };
        f.write_str(s)
    }
}

/// Resource states across all kinds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceState {
    Running,
    Starting,
    Stopped,
    Terminating,
    Terminated,
    /// Volume not attached to anything
    Available,
    /// Volume attached to an instance
    InUse,
    /// Snapshot still being written
    Pending,
    Completed,
    Error(String),
    Unknown,
}

/// Helper to convert API state strings to ResourceState
pub fn normalize_state(state_str: &str) -> ResourceState {
    let state_lower = state_str.to_lowercase();
    match state_lower.as_str() {
        "running" => ResourceState::Running,
        "starting" => ResourceState::Starting,
        "stopping" | "stopped" => ResourceState::Stopped,
        "shutting-down" | "terminating" | "deleting" => ResourceState::Terminating,
        "terminated" | "deleted" => ResourceState::Terminated,
        "available" => ResourceState::Available,
        "in-use" => ResourceState::InUse,
        "pending" | "creating" => ResourceState::Pending,
        "completed" => ResourceState::Completed,
        _ if state_lower.contains("error") || state_lower.contains("failed") => {
            ResourceState::Error(state_str.to_string())
        }
        _ => ResourceState::Unknown,
    }
}

/// Kind-specific attributes captured at scan time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceAttributes {
    Instance {
        state: ResourceState,
        instance_type: String,
        launch_time: Option<DateTime<Utc>>,
    },
    Volume {
        state: ResourceState,
        size_gib: i32,
        volume_type: Option<String>,
        create_time: Option<DateTime<Utc>>,
    },
    Snapshot {
        volume_id: Option<String>,
        volume_size_gib: Option<i32>,
        start_time: Option<DateTime<Utc>>,
    },
    Address {
        public_ip: Option<String>,
        instance_id: Option<String>,
        network_interface_id: Option<String>,
    },
}

/// Immutable snapshot of one remote resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub id: ResourceId,
    pub kind: ResourceKind,
    pub tags: TagSet,
    pub attributes: ResourceAttributes,
}

impl ResourceRecord {
    /// Creation time: launch time for instances, create time for volumes,
    /// start time for snapshots. Addresses have none.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        match &self.attributes {
            ResourceAttributes::Instance { launch_time, .. } => *launch_time,
            ResourceAttributes::Volume { create_time, .. } => *create_time,
            ResourceAttributes::Snapshot { start_time, .. } => *start_time,
            ResourceAttributes::Address { .. } => None,
        }
    }

    pub fn state(&self) -> Option<&ResourceState> {
        match &self.attributes {
            ResourceAttributes::Instance { state, .. } | ResourceAttributes::Volume { state, .. } => {
                Some(state)
            }
            _ => None,
        }
    }

    pub fn instance_type(&self) -> Option<&str> {
        match &self.attributes {
            ResourceAttributes::Instance { instance_type, .. } => Some(instance_type),
            _ => None,
        }
    }

    pub fn has_tag(&self, key: &str) -> bool {
        self.tags.contains_key(key)
    }
}

/// Server-side filter (`Name` / `Values` pair)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub name: String,
    pub values: Vec<String>,
}

impl Filter {
    pub fn new<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

/// Server-side query for one listing call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub filters: Vec<Filter>,
    /// Restrict snapshots to these owners
    pub owner_ids: Vec<String>,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// `instance-state-name in states`
    pub fn instance_states(self, states: &[&str]) -> Self {
        self.filter(Filter::new("instance-state-name", states.iter().copied()))
    }

    /// `tag:<key> = value`
    pub fn tag_equals(self, key: &str, value: &str) -> Self {
        self.filter(Filter::new(format!("tag:{}", key), [value]))
    }

    /// Volume `status = available`
    pub fn volume_status(self, status: &str) -> Self {
        self.filter(Filter::new("status", [status]))
    }

    pub fn owned_by(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_ids.push(owner_id.into());
        self
    }
}

/// One page of a listing
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub records: Vec<ResourceRecord>,
    pub next_token: Option<String>,
}

/// Statistic requested from the metrics API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Statistic {
    Average,
    Maximum,
    Minimum,
    Sum,
}

/// Metric statistics query for a single resource dimension
#[derive(Debug, Clone, PartialEq)]
pub struct MetricQuery {
    pub namespace: String,
    pub metric_name: String,
    pub dimension_name: String,
    pub dimension_value: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub period_secs: i32,
    pub statistic: Statistic,
}

/// One datapoint, carrying the requested statistic
#[derive(Debug, Clone, PartialEq)]
pub struct Datapoint {
    pub timestamp: Option<DateTime<Utc>>,
    pub value: f64,
}

/// Cost Explorer time granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Granularity {
    Daily,
    Monthly,
    Hourly,
}

/// Cost and usage query
#[derive(Debug, Clone, PartialEq)]
pub struct CostQuery {
    /// Inclusive start date
    pub start: NaiveDate,
    /// Exclusive end date
    pub end: NaiveDate,
    pub granularity: Granularity,
    /// Dimension key to group by (SERVICE, REGION, ...)
    pub group_by: Option<String>,
    pub metric: String,
}

/// Amount for one group within one period
#[derive(Debug, Clone, PartialEq)]
pub struct CostGroup {
    pub keys: Vec<String>,
    pub amount: f64,
    pub unit: String,
}

/// Grouped amounts for one time period
#[derive(Debug, Clone, PartialEq)]
pub struct CostPeriod {
    pub start: String,
    pub end: String,
    pub groups: Vec<CostGroup>,
}

/// Remote resource API (list, tag, stop/start, delete)
#[async_trait]
pub trait ComputeApi: Send + Sync {
    /// Region this client talks to
    fn region(&self) -> &str;

    /// Fetch one page of a listing. `token` is `None` for the first page.
    async fn list_page(
        &self,
        kind: ResourceKind,
        query: &ListQuery,
        token: Option<String>,
    ) -> Result<Page>;

    /// Add tags to resources. Additive: never removes or rewrites other keys.
    async fn create_tags(&self, resource_ids: &[ResourceId], tags: &TagSet) -> Result<()>;

    async fn stop_instances(&self, instance_ids: &[ResourceId]) -> Result<()>;

    async fn start_instances(&self, instance_ids: &[ResourceId]) -> Result<()>;

    /// Delete a single resource. Individually fallible.
    async fn delete(&self, kind: ResourceKind, resource_id: &str) -> Result<()>;

    /// Account that owns the credentials in use
    async fn account_id(&self) -> Result<String>;

    /// Regions enabled for the account
    async fn list_regions(&self) -> Result<Vec<String>>;
}

/// Metrics API
#[async_trait]
pub trait MetricsApi: Send + Sync {
    /// Datapoints for the query. An empty vector means "no data", not an error.
    async fn statistics(&self, query: &MetricQuery) -> Result<Vec<Datapoint>>;
}

/// Cost and usage API
#[async_trait]
pub trait CostApi: Send + Sync {
    async fn cost_and_usage(&self, query: &CostQuery) -> Result<Vec<CostPeriod>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_state() {
        assert_eq!(normalize_state("running"), ResourceState::Running);
        assert_eq!(normalize_state("stopped"), ResourceState::Stopped);
        assert_eq!(normalize_state("stopping"), ResourceState::Stopped);
        assert_eq!(normalize_state("shutting-down"), ResourceState::Terminating);
        assert_eq!(normalize_state("terminated"), ResourceState::Terminated);
        assert_eq!(normalize_state("available"), ResourceState::Available);
        assert_eq!(normalize_state("in-use"), ResourceState::InUse);
        assert_eq!(normalize_state("completed"), ResourceState::Completed);
        assert!(matches!(normalize_state("error"), ResourceState::Error(_)));
        assert_eq!(normalize_state("mystery"), ResourceState::Unknown);
    }

    #[test]
    fn test_list_query_builders() {
        let q = ListQuery::new()
            .tag_equals("AutoScheduler", "stop")
            .instance_states(&["running"]);
        assert_eq!(q.filters.len(), 2);
        assert_eq!(q.filters[0].name, "tag:AutoScheduler");
        assert_eq!(q.filters[0].values, vec!["stop"]);
        assert_eq!(q.filters[1].name, "instance-state-name");

        let q = ListQuery::new().owned_by("123456789012");
        assert_eq!(q.owner_ids, vec!["123456789012"]);
    }

    #[test]
    fn test_created_at_per_kind() {
        let now = Utc::now();
        let snap = ResourceRecord {
            id: "snap-1".into(),
            kind: ResourceKind::Snapshot,
            tags: TagSet::new(),
            attributes: ResourceAttributes::Snapshot {
                volume_id: None,
                volume_size_gib: None,
                start_time: Some(now),
            },
        };
        assert_eq!(snap.created_at(), Some(now));

        let eip = ResourceRecord {
            id: "eipalloc-1".into(),
            kind: ResourceKind::Address,
            tags: TagSet::new(),
            attributes: ResourceAttributes::Address {
                public_ip: Some("203.0.113.1".into()),
                instance_id: None,
                network_interface_id: None,
            },
        };
        assert_eq!(eip.created_at(), None);
        assert!(!ResourceKind::Address.is_paginated());
    }
}
