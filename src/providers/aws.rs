//! AWS implementation of the remote API traits
//!
//! SDK responses are decoded into `crate::provider` records right after each
//! call; nothing outside this file touches SDK types.

use crate::error::{Result, SweepError};
use crate::provider::*;
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_cloudwatch::types::{Dimension, Statistic as CwStatistic};
use aws_sdk_costexplorer::types::{
    DateInterval, Granularity as CeGranularity, GroupDefinition, GroupDefinitionType, MetricValue,
};
use aws_sdk_ec2::error::DisplayErrorContext;
use aws_sdk_ec2::primitives::DateTime as SmithyDateTime;
use aws_sdk_ec2::types::{Address, Instance, Snapshot, Tag, Volume};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::debug;

/// EC2, STS, CloudWatch and Cost Explorer clients for one region
pub struct AwsProvider {
    region: String,
    ec2: aws_sdk_ec2::Client,
    sts: aws_sdk_sts::Client,
    cloudwatch: aws_sdk_cloudwatch::Client,
    cost_explorer: aws_sdk_costexplorer::Client,
}

impl AwsProvider {
    pub async fn new(region: &str) -> Self {
        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;
        debug!("Created AWS clients for {}", region);

        Self {
            region: region.to_string(),
            ec2: aws_sdk_ec2::Client::new(&aws_config),
            sts: aws_sdk_sts::Client::new(&aws_config),
            cloudwatch: aws_sdk_cloudwatch::Client::new(&aws_config),
            cost_explorer: aws_sdk_costexplorer::Client::new(&aws_config),
        }
    }
}

fn query_error<E>(operation: &str, err: E) -> SweepError
where
    E: std::error::Error,
{
    SweepError::query(operation, DisplayErrorContext(err))
}

fn action_error<E>(action: &str, resource_id: Option<&str>, err: E) -> SweepError
where
    E: std::error::Error,
{
    SweepError::action(action, resource_id, DisplayErrorContext(err))
}

fn to_utc(t: &SmithyDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(t.secs(), t.subsec_nanos())
}

fn sdk_filters(filters: &[Filter]) -> Option<Vec<aws_sdk_ec2::types::Filter>> {
    if filters.is_empty() {
        return None;
    }
    Some(
        filters
            .iter()
            .map(|f| {
                aws_sdk_ec2::types::Filter::builder()
                    .name(&f.name)
                    .set_values(Some(f.values.clone()))
                    .build()
            })
            .collect(),
    )
}

fn decode_tags(tags: &[Tag]) -> TagSet {
    tags.iter()
        .filter_map(|t| {
            t.key()
                .map(|k| (k.to_string(), t.value().unwrap_or_default().to_string()))
        })
        .collect()
}

fn decode_instance(instance: &Instance) -> Option<ResourceRecord> {
    let id = instance.instance_id()?.to_string();
    let state = instance
        .state()
        .and_then(|s| s.name())
        .map(|n| normalize_state(n.as_str()))
        .unwrap_or(ResourceState::Unknown);
    let instance_type = instance
        .instance_type()
        .map(|t| t.as_str().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    Some(ResourceRecord {
        id,
        kind: ResourceKind::Instance,
        tags: decode_tags(instance.tags()),
        attributes: ResourceAttributes::Instance {
            state,
            instance_type,
            launch_time: instance.launch_time().and_then(to_utc),
        },
    })
}

fn decode_volume(volume: &Volume) -> Option<ResourceRecord> {
    Some(ResourceRecord {
        id: volume.volume_id()?.to_string(),
        kind: ResourceKind::Volume,
        tags: decode_tags(volume.tags()),
        attributes: ResourceAttributes::Volume {
            state: volume
                .state()
                .map(|s| normalize_state(s.as_str()))
                .unwrap_or(ResourceState::Unknown),
            size_gib: volume.size().unwrap_or(0),
            volume_type: volume.volume_type().map(|t| t.as_str().to_string()),
            create_time: volume.create_time().and_then(to_utc),
        },
    })
}

fn decode_snapshot(snapshot: &Snapshot) -> Option<ResourceRecord> {
    Some(ResourceRecord {
        id: snapshot.snapshot_id()?.to_string(),
        kind: ResourceKind::Snapshot,
        tags: decode_tags(snapshot.tags()),
        attributes: ResourceAttributes::Snapshot {
            volume_id: snapshot.volume_id().map(str::to_string),
            volume_size_gib: snapshot.volume_size(),
            start_time: snapshot.start_time().and_then(to_utc),
        },
    })
}

fn decode_address(address: &Address) -> Option<ResourceRecord> {
    // EC2-Classic addresses have no allocation ID; fall back to the IP
    let id = address
        .allocation_id()
        .or_else(|| address.public_ip())?
        .to_string();
    Some(ResourceRecord {
        id,
        kind: ResourceKind::Address,
        tags: decode_tags(address.tags()),
        attributes: ResourceAttributes::Address {
            public_ip: address.public_ip().map(str::to_string),
            instance_id: address.instance_id().map(str::to_string),
            network_interface_id: address.network_interface_id().map(str::to_string),
        },
    })
}

#[async_trait]
impl ComputeApi for AwsProvider {
    fn region(&self) -> &str {
        &self.region
    }

    async fn list_page(
        &self,
        kind: ResourceKind,
        query: &ListQuery,
        token: Option<String>,
    ) -> Result<Page> {
        let filters = sdk_filters(&query.filters);
        match kind {
            ResourceKind::Instance => {
                let resp = self
                    .ec2
                    .describe_instances()
                    .set_filters(filters)
                    .set_next_token(token)
                    .send()
                    .await
                    .map_err(|e| query_error("describe_instances", e))?;
                Ok(Page {
                    records: resp
                        .reservations()
                        .iter()
                        .flat_map(|r| r.instances())
                        .filter_map(decode_instance)
                        .collect(),
                    next_token: resp.next_token().map(str::to_string),
                })
            }
            ResourceKind::Volume => {
                let resp = self
                    .ec2
                    .describe_volumes()
                    .set_filters(filters)
                    .set_next_token(token)
                    .send()
                    .await
                    .map_err(|e| query_error("describe_volumes", e))?;
                Ok(Page {
                    records: resp.volumes().iter().filter_map(decode_volume).collect(),
                    next_token: resp.next_token().map(str::to_string),
                })
            }
            ResourceKind::Snapshot => {
                let owners = (!query.owner_ids.is_empty()).then(|| query.owner_ids.clone());
                let resp = self
                    .ec2
                    .describe_snapshots()
                    .set_owner_ids(owners)
                    .set_filters(filters)
                    .set_next_token(token)
                    .send()
                    .await
                    .map_err(|e| query_error("describe_snapshots", e))?;
                Ok(Page {
                    records: resp.snapshots().iter().filter_map(decode_snapshot).collect(),
                    next_token: resp.next_token().map(str::to_string),
                })
            }
            ResourceKind::Address => {
                let resp = self
                    .ec2
                    .describe_addresses()
                    .set_filters(filters)
                    .send()
                    .await
                    .map_err(|e| query_error("describe_addresses", e))?;
                Ok(Page {
                    records: resp.addresses().iter().filter_map(decode_address).collect(),
                    next_token: None,
                })
            }
        }
    }

    async fn create_tags(&self, resource_ids: &[ResourceId], tags: &TagSet) -> Result<()> {
        let sdk_tags = tags
            .iter()
            .map(|(k, v)| Tag::builder().key(k).value(v).build())
            .collect();
        self.ec2
            .create_tags()
            .set_resources(Some(resource_ids.to_vec()))
            .set_tags(Some(sdk_tags))
            .send()
            .await
            .map_err(|e| action_error("create_tags", None, e))?;
        Ok(())
    }

    async fn stop_instances(&self, instance_ids: &[ResourceId]) -> Result<()> {
        self.ec2
            .stop_instances()
            .set_instance_ids(Some(instance_ids.to_vec()))
            .send()
            .await
            .map_err(|e| action_error("stop_instances", None, e))?;
        Ok(())
    }

    async fn start_instances(&self, instance_ids: &[ResourceId]) -> Result<()> {
        self.ec2
            .start_instances()
            .set_instance_ids(Some(instance_ids.to_vec()))
            .send()
            .await
            .map_err(|e| action_error("start_instances", None, e))?;
        Ok(())
    }

    async fn delete(&self, kind: ResourceKind, resource_id: &str) -> Result<()> {
        match kind {
            ResourceKind::Snapshot => self
                .ec2
                .delete_snapshot()
                .snapshot_id(resource_id)
                .send()
                .await
                .map(|_| ())
                .map_err(|e| action_error("delete_snapshot", Some(resource_id), e)),
            ResourceKind::Volume => self
                .ec2
                .delete_volume()
                .volume_id(resource_id)
                .send()
                .await
                .map(|_| ())
                .map_err(|e| action_error("delete_volume", Some(resource_id), e)),
            ResourceKind::Address => self
                .ec2
                .release_address()
                .allocation_id(resource_id)
                .send()
                .await
                .map(|_| ())
                .map_err(|e| action_error("release_address", Some(resource_id), e)),
            ResourceKind::Instance => self
                .ec2
                .terminate_instances()
                .instance_ids(resource_id)
                .send()
                .await
                .map(|_| ())
                .map_err(|e| action_error("terminate_instances", Some(resource_id), e)),
        }
    }

    async fn account_id(&self) -> Result<String> {
        let identity = self
            .sts
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| query_error("get_caller_identity", e))?;
        identity
            .account()
            .map(str::to_string)
            .ok_or_else(|| SweepError::query("get_caller_identity", "response has no account"))
    }

    async fn list_regions(&self) -> Result<Vec<String>> {
        let resp = self
            .ec2
            .describe_regions()
            .send()
            .await
            .map_err(|e| query_error("describe_regions", e))?;
        Ok(resp
            .regions()
            .iter()
            .filter_map(|r| r.region_name().map(str::to_string))
            .collect())
    }
}

fn cw_statistic(statistic: Statistic) -> CwStatistic {
    match statistic {
        Statistic::Average => CwStatistic::Average,
        Statistic::Maximum => CwStatistic::Maximum,
        Statistic::Minimum => CwStatistic::Minimum,
        Statistic::Sum => CwStatistic::Sum,
    }
}

#[async_trait]
impl MetricsApi for AwsProvider {
    async fn statistics(&self, query: &MetricQuery) -> Result<Vec<Datapoint>> {
        let resp = self
            .cloudwatch
            .get_metric_statistics()
            .namespace(&query.namespace)
            .metric_name(&query.metric_name)
            .dimensions(
                Dimension::builder()
                    .name(&query.dimension_name)
                    .value(&query.dimension_value)
                    .build(),
            )
            .start_time(SmithyDateTime::from_secs(query.start.timestamp()))
            .end_time(SmithyDateTime::from_secs(query.end.timestamp()))
            .period(query.period_secs)
            .statistics(cw_statistic(query.statistic))
            .send()
            .await
            .map_err(|e| query_error("get_metric_statistics", e))?;

        Ok(resp
            .datapoints()
            .iter()
            .filter_map(|dp| {
                let value = match query.statistic {
                    Statistic::Average => dp.average(),
                    Statistic::Maximum => dp.maximum(),
                    Statistic::Minimum => dp.minimum(),
                    Statistic::Sum => dp.sum(),
                }?;
                Some(Datapoint {
                    timestamp: dp.timestamp().and_then(to_utc),
                    value,
                })
            })
            .collect())
    }
}

fn decode_metric(metrics: Option<&HashMap<String, MetricValue>>, name: &str) -> Option<(f64, String)> {
    let value = metrics?.get(name)?;
    let amount = value.amount()?.parse::<f64>().ok()?;
    Some((amount, value.unit().unwrap_or("USD").to_string()))
}

#[async_trait]
impl CostApi for AwsProvider {
    async fn cost_and_usage(&self, query: &CostQuery) -> Result<Vec<CostPeriod>> {
        let interval = DateInterval::builder()
            .start(query.start.format("%Y-%m-%d").to_string())
            .end(query.end.format("%Y-%m-%d").to_string())
            .build()
            .map_err(|e| SweepError::query("get_cost_and_usage", e))?;
        let granularity = match query.granularity {
            Granularity::Daily => CeGranularity::Daily,
            Granularity::Monthly => CeGranularity::Monthly,
            Granularity::Hourly => CeGranularity::Hourly,
        };
        let group_by = query.group_by.as_ref().map(|key| {
            vec![GroupDefinition::builder()
                .r#type(GroupDefinitionType::Dimension)
                .key(key)
                .build()]
        });

        let mut periods = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let resp = self
                .cost_explorer
                .get_cost_and_usage()
                .time_period(interval.clone())
                .granularity(granularity.clone())
                .metrics(&query.metric)
                .set_group_by(group_by.clone())
                .set_next_page_token(token.take())
                .send()
                .await
                .map_err(|e| query_error("get_cost_and_usage", e))?;

            for result in resp.results_by_time() {
                let (start, end) = result
                    .time_period()
                    .map(|p| (p.start().to_string(), p.end().to_string()))
                    .unwrap_or_default();

                let mut groups: Vec<CostGroup> = result
                    .groups()
                    .iter()
                    .filter_map(|g| {
                        let (amount, unit) = decode_metric(g.metrics(), &query.metric)?;
                        Some(CostGroup {
                            keys: g.keys().to_vec(),
                            amount,
                            unit,
                        })
                    })
                    .collect();

                // Ungrouped queries only carry a total
                if query.group_by.is_none() {
                    if let Some((amount, unit)) = decode_metric(result.total(), &query.metric) {
                        groups.push(CostGroup {
                            keys: Vec::new(),
                            amount,
                            unit,
                        });
                    }
                }

                periods.push(CostPeriod { start, end, groups });
            }

            token = resp.next_page_token().map(str::to_string);
            if token.is_none() {
                break;
            }
        }

        Ok(periods)
    }
}
