//! Findings and cost records
//!
//! Data only. Rendering to files lives in `crate::export`.

use crate::provider::{CostPeriod, ResourceId, ResourceKind, ResourceRecord};
use crate::utils::round2;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;

/// One flagged resource
///
/// Serialized as a flat object: a kind-specific id key (`InstanceId`,
/// `VolumeId`, `SnapshotId` or `AllocationId`), `Region`, `Finding`, the
/// optional `Metric`/`Value` pair, each detail as its own key, then
/// `Recommendation`.
#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    pub resource_id: ResourceId,
    pub kind: ResourceKind,
    pub region: String,
    /// Short description, e.g. "Idle EC2 Instance"
    pub finding: String,
    pub recommendation: String,
    /// What the value measures, e.g. "Max CPU Utilization (14d)"
    pub metric: Option<String>,
    /// Rendered metric value, e.g. "3.00%"
    pub value: Option<String>,
    /// Kind-specific context (instance type, size, public IP, ...)
    pub details: BTreeMap<String, String>,
}

impl Finding {
    pub fn new(
        record: &ResourceRecord,
        region: &str,
        finding: impl Into<String>,
        recommendation: impl Into<String>,
    ) -> Self {
        Self {
            resource_id: record.id.clone(),
            kind: record.kind,
            region: region.to_string(),
            finding: finding.into(),
            recommendation: recommendation.into(),
            metric: None,
            value: None,
            details: BTreeMap::new(),
        }
    }

    pub fn with_metric(mut self, metric: impl Into<String>, value: impl Into<String>) -> Self {
        self.metric = Some(metric.into());
        self.value = Some(value.into());
        self
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<String>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    pub fn id_key(&self) -> &'static str {
        match self.kind {
            ResourceKind::Instance => "InstanceId",
            ResourceKind::Volume => "VolumeId",
            ResourceKind::Snapshot => "SnapshotId",
            ResourceKind::Address => "AllocationId",
        }
    }
}

impl Serialize for Finding {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let id_key = self.id_key();
        // Addresses without an allocation id are keyed by their public IP alone
        let id_is_ip = self.kind == ResourceKind::Address
            && self.details.get("PublicIp") == Some(&self.resource_id);

        let mut map = serializer.serialize_map(None)?;
        if !id_is_ip {
            map.serialize_entry(id_key, &self.resource_id)?;
        }
        map.serialize_entry("Region", &self.region)?;
        map.serialize_entry("Finding", &self.finding)?;
        if let Some(metric) = &self.metric {
            map.serialize_entry("Metric", metric)?;
        }
        if let Some(value) = &self.value {
            map.serialize_entry("Value", value)?;
        }
        for (key, value) in self.details.iter().filter(|(k, _)| k.as_str() != id_key) {
            map.serialize_entry(key, value)?;
        }
        map.serialize_entry("Recommendation", &self.recommendation)?;
        map.end()
    }
}

/// Per-category findings of an unused-resource scan
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UnusedReport {
    #[serde(rename = "IdleEC2Instances")]
    pub idle_instances: Vec<Finding>,
    #[serde(rename = "UnattachedEBSVolumes")]
    pub unattached_volumes: Vec<Finding>,
    #[serde(rename = "UnusedElasticIPs")]
    pub unused_addresses: Vec<Finding>,
    #[serde(rename = "OldEBSSnapshots")]
    pub old_snapshots: Vec<Finding>,
}

impl UnusedReport {
    /// Append another region's findings, category by category
    pub fn merge(&mut self, other: UnusedReport) {
        self.idle_instances.extend(other.idle_instances);
        self.unattached_volumes.extend(other.unattached_volumes);
        self.unused_addresses.extend(other.unused_addresses);
        self.old_snapshots.extend(other.old_snapshots);
    }

    pub fn total(&self) -> usize {
        self.idle_instances.len()
            + self.unattached_volumes.len()
            + self.unused_addresses.len()
            + self.old_snapshots.len()
    }

    pub fn categories(&self) -> [(&'static str, &[Finding]); 4] {
        [
            ("Idle EC2 instances", self.idle_instances.as_slice()),
            ("Unattached EBS volumes", self.unattached_volumes.as_slice()),
            ("Unused Elastic IPs", self.unused_addresses.as_slice()),
            ("Old EBS snapshots", self.old_snapshots.as_slice()),
        ]
    }
}

/// Cost of one group in one period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CostRecord {
    pub period_start: String,
    pub period_end: String,
    pub dimension: String,
    pub value: String,
    /// Rounded to two decimals
    pub cost: f64,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
}

/// Flatten grouped periods into records. Groups without keys are reported
/// under "Total".
pub fn cost_records(periods: &[CostPeriod], dimension: &str) -> Vec<CostRecord> {
    periods
        .iter()
        .flat_map(|period| {
            period.groups.iter().map(move |group| CostRecord {
                period_start: period.start.clone(),
                period_end: period.end.clone(),
                dimension: dimension.to_string(),
                value: group
                    .keys
                    .first()
                    .cloned()
                    .unwrap_or_else(|| "Total".to_string()),
                cost: round2(group.amount),
                currency: group.unit.clone(),
                percentage: None,
            })
        })
        .collect()
}

/// Sort by cost, highest first. Equal costs keep their input order.
pub fn rank_by_cost(records: &mut [CostRecord]) {
    records.sort_by(|a, b| b.cost.total_cmp(&a.cost));
}

pub fn total_cost(records: &[CostRecord]) -> f64 {
    records.iter().map(|r| r.cost).sum()
}

/// Fill in each record's share of the total, rounded to two decimals.
/// Left unset when the total is zero.
pub fn apply_percentages(records: &mut [CostRecord]) {
    let total = total_cost(records);
    if total == 0.0 {
        return;
    }
    for record in records.iter_mut() {
        record.percentage = Some(round2(record.cost / total * 100.0));
    }
}
