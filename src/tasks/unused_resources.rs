//! Unused resource scan: idle instances, unattached volumes, unassociated
//! Elastic IPs and old snapshots

use crate::config::Config;
use crate::error::Result;
use crate::metrics::{UtilizationProbe, DAILY};
use crate::pipeline::{Finding, Pipeline, Predicate, UnusedReport};
use crate::provider::{
    ComputeApi, ListQuery, MetricsApi, ResourceAttributes, ResourceKind, Statistic,
};
use crate::utils::{age_days, format_percent};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use std::future::Future;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct UnusedSettings {
    pub cpu_threshold: f64,
    pub ec2_days: u32,
    pub snapshot_days: u32,
    pub retain_tag: String,
}

impl UnusedSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            cpu_threshold: config.idle.cpu_threshold,
            ec2_days: config.idle.days,
            snapshot_days: config.snapshots.retention_days,
            retain_tag: config.snapshots.retain_tag.clone(),
        }
    }
}

/// Read-only scanner for one region
pub struct UnusedScanner<'a> {
    compute: &'a dyn ComputeApi,
    metrics: &'a dyn MetricsApi,
    settings: UnusedSettings,
    now: DateTime<Utc>,
}

impl<'a> UnusedScanner<'a> {
    pub fn new(
        compute: &'a dyn ComputeApi,
        metrics: &'a dyn MetricsApi,
        settings: UnusedSettings,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            compute,
            metrics,
            settings,
            now,
        }
    }

    fn region(&self) -> &str {
        self.compute.region()
    }

    /// Running instances whose highest daily CPU average is under the threshold
    pub async fn idle_instances(&self) -> Result<Vec<Finding>> {
        let probe = UtilizationProbe::cpu(
            self.metrics,
            Duration::days(i64::from(self.settings.ec2_days)),
            DAILY,
            Statistic::Average,
            self.now,
        );
        let matches = Pipeline::new(self.compute, self.now)
            .with_probe(&probe)
            .scan(
                ResourceKind::Instance,
                &ListQuery::new().instance_states(&["running"]),
                &Predicate::MetricBelow {
                    threshold: self.settings.cpu_threshold,
                },
            )
            .await?;

        let metric_label = format!("Max CPU Utilization ({}d)", self.settings.ec2_days);
        Ok(matches
            .into_iter()
            .map(|m| {
                Finding::new(&m.record, self.region(), "Idle EC2 Instance", "Stop or terminate instance")
                    .with_metric(metric_label.clone(), format_percent(m.metric.unwrap_or_default()))
                    .with_detail("InstanceType", m.record.instance_type().unwrap_or("unknown"))
            })
            .collect())
    }

    pub async fn unattached_volumes(&self) -> Result<Vec<Finding>> {
        let matches = Pipeline::new(self.compute, self.now)
            .scan(
                ResourceKind::Volume,
                &ListQuery::new().volume_status("available"),
                &Predicate::Always,
            )
            .await?;

        Ok(matches
            .into_iter()
            .map(|m| {
                let mut finding = Finding::new(
                    &m.record,
                    self.region(),
                    "Unattached EBS Volume",
                    "Delete volume or attach to an instance",
                );
                if let ResourceAttributes::Volume {
                    size_gib,
                    volume_type,
                    ..
                } = &m.record.attributes
                {
                    finding = finding.with_detail("Size", size_gib.to_string());
                    if let Some(volume_type) = volume_type {
                        finding = finding.with_detail("VolumeType", volume_type.clone());
                    }
                }
                finding
            })
            .collect())
    }

    pub async fn unused_addresses(&self) -> Result<Vec<Finding>> {
        let matches = Pipeline::new(self.compute, self.now)
            .scan(ResourceKind::Address, &ListQuery::new(), &Predicate::Unassociated)
            .await?;

        Ok(matches
            .into_iter()
            .map(|m| {
                let mut finding =
                    Finding::new(&m.record, self.region(), "Unused Elastic IP", "Release Elastic IP");
                if let ResourceAttributes::Address {
                    public_ip: Some(ip),
                    ..
                } = &m.record.attributes
                {
                    finding = finding.with_detail("PublicIp", ip.clone());
                }
                finding
            })
            .collect())
    }

    /// Owned snapshots older than the retention window. Retained snapshots
    /// are not reported.
    pub async fn old_snapshots(&self) -> Result<Vec<Finding>> {
        let account_id = self.compute.account_id().await?;
        let predicate = Predicate::OlderThan {
            max_age: Duration::days(i64::from(self.settings.snapshot_days)),
            override_tag: Some(self.settings.retain_tag.clone()),
        };
        let matches = Pipeline::new(self.compute, self.now)
            .scan(
                ResourceKind::Snapshot,
                &ListQuery::new().owned_by(account_id),
                &predicate,
            )
            .await?;

        let recommendation = format!(
            "Delete snapshot (older than {} days)",
            self.settings.snapshot_days
        );
        Ok(matches
            .into_iter()
            .map(|m| {
                let mut finding = Finding::new(
                    &m.record,
                    self.region(),
                    "Old EBS Snapshot",
                    recommendation.clone(),
                );
                if let ResourceAttributes::Snapshot {
                    volume_id,
                    start_time,
                    ..
                } = &m.record.attributes
                {
                    finding = finding
                        .with_detail("VolumeId", volume_id.as_deref().unwrap_or("N/A"));
                    if let Some(start) = start_time {
                        finding = finding
                            .with_detail(
                                "StartTime",
                                start.to_rfc3339_opts(SecondsFormat::Secs, true),
                            )
                            .with_detail("AgeDays", age_days(*start, self.now).to_string());
                    }
                }
                finding
            })
            .collect())
    }

    pub async fn scan_all(&self) -> Result<UnusedReport> {
        info!("Scanning for unused resources in {}", self.region());
        let report = UnusedReport {
            idle_instances: self.idle_instances().await?,
            unattached_volumes: self.unattached_volumes().await?,
            unused_addresses: self.unused_addresses().await?,
            old_snapshots: self.old_snapshots().await?,
        };
        info!("Scan of {} complete: {} findings", self.region(), report.total());
        Ok(report)
    }
}

/// Scan each region in turn and merge the findings. A region whose scan
/// fails is logged and left out.
pub async fn scan_regions<P, F, Fut>(
    regions: &[String],
    settings: &UnusedSettings,
    now: DateTime<Utc>,
    connect: F,
) -> UnusedReport
where
    P: ComputeApi + MetricsApi,
    F: Fn(String) -> Fut,
    Fut: Future<Output = P>,
{
    let mut report = UnusedReport::default();
    for region in regions {
        let provider = connect(region.clone()).await;
        let scanner = UnusedScanner::new(&provider, &provider, settings.clone(), now);
        match scanner.scan_all().await {
            Ok(region_report) => report.merge(region_report),
            Err(e) => warn!("Error scanning region {}: {}", region, e),
        }
    }
    report
}
