//! Predicates and action descriptors
//!
//! A `Policy` is built once per run from configuration: which kind to list,
//! which server-side filters to send, a pure predicate over each record, and
//! what to do with the matches.

use crate::provider::{ListQuery, ResourceAttributes, ResourceKind, ResourceRecord, TagSet};
use chrono::{DateTime, Duration, Utc};

/// Tags from `desired` whose keys are not already present on the resource.
///
/// Existing values are never compared, so an existing tag is never
/// overwritten even when its value differs.
pub fn tag_delta(existing: &TagSet, desired: &TagSet) -> TagSet {
    desired
        .iter()
        .filter(|(k, _)| !existing.contains_key(*k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Pure predicate over a record and an optional metric sample
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Matches everything the listing returned
    Always,
    /// At least one desired tag key is missing
    MissingTags(TagSet),
    /// Tag `key` is present with exactly `value`
    TagEquals { key: String, value: String },
    /// Created strictly before `now - max_age`. A record carrying
    /// `override_tag` never matches, whatever its age.
    OlderThan {
        max_age: Duration,
        override_tag: Option<String>,
    },
    /// Metric sample strictly below `threshold`. No sample never matches.
    MetricBelow { threshold: f64 },
    /// Address associated with neither an instance nor a network interface
    Unassociated,
    /// Every inner predicate matches
    All(Vec<Predicate>),
}

impl Predicate {
    pub fn evaluate(&self, record: &ResourceRecord, metric: Option<f64>, now: DateTime<Utc>) -> bool {
        match self {
            Predicate::Always => true,
            Predicate::MissingTags(desired) => desired.keys().any(|k| !record.has_tag(k)),
            Predicate::TagEquals { key, value } => {
                record.tags.get(key).map(|v| v == value).unwrap_or(false)
            }
            Predicate::OlderThan {
                max_age,
                override_tag,
            } => {
                if let Some(tag) = override_tag {
                    if record.has_tag(tag) {
                        return false;
                    }
                }
                // A cutoff before the representable range means nothing is old enough
                match (record.created_at(), now.checked_sub_signed(*max_age)) {
                    (Some(created), Some(cutoff)) => created < cutoff,
                    _ => false,
                }
            }
            Predicate::MetricBelow { threshold } => metric.map(|v| v < *threshold).unwrap_or(false),
            Predicate::Unassociated => matches!(
                &record.attributes,
                ResourceAttributes::Address {
                    instance_id: None,
                    network_interface_id: None,
                    ..
                }
            ),
            Predicate::All(inner) => inner.iter().all(|p| p.evaluate(record, metric, now)),
        }
    }

    /// Whether evaluating this predicate needs a metric sample
    pub fn needs_metric(&self) -> bool {
        match self {
            Predicate::MetricBelow { .. } => true,
            Predicate::All(inner) => inner.iter().any(Predicate::needs_metric),
            _ => false,
        }
    }

    /// Non-metric part of the predicate. Records failing it are dropped
    /// before any metric query is issued for them.
    pub fn prefilter(&self, record: &ResourceRecord, now: DateTime<Utc>) -> bool {
        match self {
            Predicate::MetricBelow { .. } => true,
            Predicate::All(inner) => inner.iter().all(|p| p.prefilter(record, now)),
            other => other.evaluate(record, None, now),
        }
    }
}

/// What to do with matched resources
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Add the missing subset of these tags to each resource
    MergeTags(TagSet),
    Stop,
    Start,
    Delete,
    ReportOnly,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::MergeTags(_) => "tag",
            Action::Stop => "stop",
            Action::Start => "start",
            Action::Delete => "delete",
            Action::ReportOnly => "report",
        }
    }

    pub fn is_mutating(&self) -> bool {
        !matches!(self, Action::ReportOnly)
    }
}

/// One instantiation of the pipeline
#[derive(Debug, Clone)]
pub struct Policy {
    pub kind: ResourceKind,
    pub query: ListQuery,
    pub predicate: Predicate,
    pub action: Action,
}

impl Policy {
    pub fn new(kind: ResourceKind, query: ListQuery, predicate: Predicate, action: Action) -> Self {
        Self {
            kind,
            query,
            predicate,
            action,
        }
    }

    /// Tag resources missing any of `desired`
    pub fn tag_missing(kind: ResourceKind, query: ListQuery, desired: TagSet) -> Self {
        Self::new(
            kind,
            query,
            Predicate::MissingTags(desired.clone()),
            Action::MergeTags(desired),
        )
    }
}
