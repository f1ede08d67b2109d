//! Stop or start instances selected by a schedule tag

use crate::config::Config;
use crate::error::{Result, SweepError};
use crate::pipeline::{Action, Pipeline, Policy, Predicate};
use crate::provider::{ComputeApi, ListQuery, ResourceId, ResourceKind};
use chrono::Utc;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScheduleAction {
    #[default]
    Stop,
    Start,
}

impl ScheduleAction {
    /// Tag value that selects an instance for this action
    pub fn tag_value(self) -> &'static str {
        match self {
            ScheduleAction::Stop => "stop",
            ScheduleAction::Start => "start",
        }
    }

    /// Instance state the action applies to
    fn source_state(self) -> &'static str {
        match self {
            ScheduleAction::Stop => "running",
            ScheduleAction::Start => "stopped",
        }
    }
}

impl FromStr for ScheduleAction {
    type Err = SweepError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "stop" => Ok(ScheduleAction::Stop),
            "start" => Ok(ScheduleAction::Start),
            other => Err(SweepError::Validation {
                field: "action".to_string(),
                reason: format!("Invalid action specified: {}", other),
            }),
        }
    }
}

impl fmt::Display for ScheduleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag_value())
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub tag_key: String,
    pub dry_run: bool,
}

impl SchedulerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            tag_key: config.scheduler.tag_key.clone(),
            dry_run: config.scheduler.dry_run,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ScheduleResult {
    #[serde(rename = "StoppedInstances")]
    Stopped(Vec<ResourceId>),
    #[serde(rename = "StartedInstances")]
    Started(Vec<ResourceId>),
}

impl ScheduleResult {
    pub fn instances(&self) -> &[ResourceId] {
        match self {
            ScheduleResult::Stopped(ids) | ScheduleResult::Started(ids) => ids,
        }
    }
}

pub async fn run_schedule(
    compute: &dyn ComputeApi,
    action: ScheduleAction,
    settings: SchedulerSettings,
) -> Result<ScheduleResult> {
    let query = ListQuery::new()
        .tag_equals(&settings.tag_key, action.tag_value())
        .instance_states(&[action.source_state()]);
    let predicate = Predicate::TagEquals {
        key: settings.tag_key,
        value: action.tag_value().to_string(),
    };
    let pipeline_action = match action {
        ScheduleAction::Stop => Action::Stop,
        ScheduleAction::Start => Action::Start,
    };

    let summary = Pipeline::new(compute, Utc::now())
        .dry_run(settings.dry_run)
        .run(&Policy::new(ResourceKind::Instance, query, predicate, pipeline_action))
        .await?;

    let ids = summary.outcome.affected;
    Ok(match action {
        ScheduleAction::Stop => ScheduleResult::Stopped(ids),
        ScheduleAction::Start => ScheduleResult::Started(ids),
    })
}
