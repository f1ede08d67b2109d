//! Metric probes
//!
//! A probe turns a resource into one scalar sample over a bounded window,
//! e.g. the highest hourly maximum CPU over the last 14 days. Samples feed
//! predicates and are never stored.

use crate::error::Result;
use crate::provider::{Datapoint, MetricQuery, MetricsApi, ResourceRecord, Statistic};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

pub const EC2_NAMESPACE: &str = "AWS/EC2";
pub const CPU_UTILIZATION: &str = "CPUUtilization";
/// Published by the CloudWatch agent, absent unless the agent is installed
pub const AGENT_NAMESPACE: &str = "CWAgent";
pub const MEMORY_USED_PERCENT: &str = "mem_used_percent";

pub const HOURLY: i32 = 3600;
pub const DAILY: i32 = 86_400;

/// Source of one metric sample per resource
#[async_trait]
pub trait MetricProbe: Send + Sync {
    /// `Ok(None)` when the metrics API returned no datapoints
    async fn sample(&self, record: &ResourceRecord) -> Result<Option<f64>>;
}

/// Highest datapoint value, `None` for an empty series
pub fn max_value(datapoints: &[Datapoint]) -> Option<f64> {
    datapoints
        .iter()
        .map(|dp| dp.value)
        .fold(None, |acc, v| Some(acc.map_or(v, |m: f64| m.max(v))))
}

/// Utilization of an instance-level metric over `[end - window, end]`,
/// reduced to the maximum of the per-period statistic.
pub struct UtilizationProbe<'a> {
    api: &'a dyn MetricsApi,
    namespace: String,
    metric_name: String,
    window: Duration,
    period_secs: i32,
    statistic: Statistic,
    end: DateTime<Utc>,
}

impl<'a> UtilizationProbe<'a> {
    pub fn new(
        api: &'a dyn MetricsApi,
        namespace: &str,
        metric_name: &str,
        window: Duration,
        period_secs: i32,
        statistic: Statistic,
        end: DateTime<Utc>,
    ) -> Self {
        Self {
            api,
            namespace: namespace.to_string(),
            metric_name: metric_name.to_string(),
            window,
            period_secs,
            statistic,
            end,
        }
    }

    /// EC2 CPU utilization
    pub fn cpu(
        api: &'a dyn MetricsApi,
        window: Duration,
        period_secs: i32,
        statistic: Statistic,
        end: DateTime<Utc>,
    ) -> Self {
        Self::new(api, EC2_NAMESPACE, CPU_UTILIZATION, window, period_secs, statistic, end)
    }

    /// Agent-reported memory utilization
    pub fn memory(api: &'a dyn MetricsApi, window: Duration, end: DateTime<Utc>) -> Self {
        Self::new(
            api,
            AGENT_NAMESPACE,
            MEMORY_USED_PERCENT,
            window,
            HOURLY,
            Statistic::Maximum,
            end,
        )
    }

    pub fn query_for(&self, instance_id: &str) -> MetricQuery {
        MetricQuery {
            namespace: self.namespace.clone(),
            metric_name: self.metric_name.clone(),
            dimension_name: "InstanceId".to_string(),
            dimension_value: instance_id.to_string(),
            start: self
                .end
                .checked_sub_signed(self.window)
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
            end: self.end,
            period_secs: self.period_secs,
            statistic: self.statistic,
        }
    }
}

#[async_trait]
impl MetricProbe for UtilizationProbe<'_> {
    async fn sample(&self, record: &ResourceRecord) -> Result<Option<f64>> {
        let datapoints = self.api.statistics(&self.query_for(&record.id)).await?;
        Ok(max_value(&datapoints))
    }
}
