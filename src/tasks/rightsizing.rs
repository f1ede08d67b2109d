//! Right-sizing recommendations for running instances
//!
//! An instance is a candidate when its highest hourly CPU maximum over the
//! window stays below the CPU threshold. Memory comes from the CloudWatch
//! agent (`CWAgent/mem_used_percent`); without the agent there is no memory
//! figure, the finding says "unavailable" and the decision rests on CPU alone.

use crate::config::Config;
use crate::error::Result;
use crate::metrics::{MetricProbe, UtilizationProbe, HOURLY};
use crate::pipeline::{Finding, Pipeline, Predicate};
use crate::provider::{ComputeApi, ListQuery, MetricsApi, ResourceKind, Statistic};
use crate::utils::format_percent;
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct RightsizingSettings {
    pub cpu_threshold: f64,
    pub mem_threshold: f64,
    pub days: u32,
}

impl RightsizingSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            cpu_threshold: config.rightsizing.cpu_threshold,
            mem_threshold: config.rightsizing.mem_threshold,
            days: config.rightsizing.days,
        }
    }
}

pub async fn recommend(
    compute: &dyn ComputeApi,
    metrics: &dyn MetricsApi,
    settings: RightsizingSettings,
    now: DateTime<Utc>,
) -> Result<Vec<Finding>> {
    let window = Duration::days(i64::from(settings.days));
    let cpu = UtilizationProbe::cpu(metrics, window, HOURLY, Statistic::Maximum, now);
    let memory = UtilizationProbe::memory(metrics, window, now);

    let candidates = Pipeline::new(compute, now)
        .with_probe(&cpu)
        .scan(
            ResourceKind::Instance,
            &ListQuery::new().instance_states(&["running"]),
            &Predicate::MetricBelow {
                threshold: settings.cpu_threshold,
            },
        )
        .await?;

    let mut findings = Vec::new();
    for candidate in candidates {
        let record = &candidate.record;
        let max_memory = memory.sample(record).await?;
        if let Some(mem) = max_memory {
            if mem >= settings.mem_threshold {
                debug!("{} memory at {:.2}%, not over-provisioned", record.id, mem);
                continue;
            }
        }

        let instance_type = record.instance_type().unwrap_or("unknown");
        let finding = Finding::new(
            record,
            compute.region(),
            "Over-provisioned EC2 Instance",
            format!(
                "Consider smaller instance type (e.g., from {} to a smaller size in the same family)",
                instance_type
            ),
        )
        .with_detail("InstanceType", instance_type)
        .with_detail("MaxCPU", format_percent(candidate.metric.unwrap_or_default()))
        .with_detail(
            "MaxMemory",
            max_memory
                .map(format_percent)
                .unwrap_or_else(|| "unavailable".to_string()),
        );
        findings.push(finding);
    }

    Ok(findings)
}
