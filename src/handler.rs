//! Serverless handler surface
//!
//! Maps an invocation event to a `{"statusCode", "body"}` response, the shape
//! scheduled functions return. `body` is a JSON document encoded as a string.
//! Remote failures are not turned into responses; they propagate and fail the
//! invocation.

use crate::config::Config;
use crate::error::Result;
use crate::provider::ComputeApi;
use crate::tasks::{
    cleanup_snapshots, run_schedule, tag_resources, ScheduleAction, SchedulerSettings,
    SnapshotSettings, TaggerSettings,
};
use chrono::Utc;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

pub const INVALID_ACTION: &str = "Invalid action specified";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum HandlerKind {
    Tagger,
    Scheduler,
    Snapshots,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
}

impl HandlerResponse {
    pub fn ok<T: Serialize>(body: &T) -> Result<Self> {
        Ok(Self {
            status_code: 200,
            body: serde_json::to_string(body)?,
        })
    }

    pub fn bad_request(message: &str) -> Self {
        Self {
            status_code: 400,
            body: message.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// `action` from the event, `"stop"` when absent. `None` for anything that
/// is not a known action.
pub fn schedule_action(event: &Value) -> Option<ScheduleAction> {
    match event.get("action") {
        None | Some(Value::Null) => Some(ScheduleAction::default()),
        Some(Value::String(s)) => s.parse().ok(),
        Some(_) => None,
    }
}

pub async fn handle(
    kind: HandlerKind,
    event: &Value,
    compute: &dyn ComputeApi,
    config: &Config,
) -> Result<HandlerResponse> {
    match kind {
        HandlerKind::Tagger => {
            let tagged = tag_resources(compute, TaggerSettings::from_config(config)).await?;
            HandlerResponse::ok(&tagged)
        }
        HandlerKind::Scheduler => {
            let Some(action) = schedule_action(event) else {
                warn!("Rejected scheduler event: {}", event);
                return Ok(HandlerResponse::bad_request(INVALID_ACTION));
            };
            let result =
                run_schedule(compute, action, SchedulerSettings::from_config(config)).await?;
            HandlerResponse::ok(&result)
        }
        HandlerKind::Snapshots => {
            let report =
                cleanup_snapshots(compute, SnapshotSettings::from_config(config), Utc::now())
                    .await?;
            HandlerResponse::ok(&report)
        }
    }
}
