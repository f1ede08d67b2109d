//! Add missing default tags to instances and volumes

use crate::config::Config;
use crate::error::Result;
use crate::pipeline::{Pipeline, Policy};
use crate::provider::{ComputeApi, ListQuery, ResourceId, ResourceKind, TagSet};
use chrono::Utc;
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone)]
pub struct TaggerSettings {
    pub default_tags: TagSet,
    pub dry_run: bool,
}

impl TaggerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            default_tags: config.tagger.default_tags.clone(),
            dry_run: config.tagger.dry_run,
        }
    }
}

/// Resources that received (or in a dry run, would receive) tags
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaggedResources {
    #[serde(rename = "Instances")]
    pub instances: Vec<ResourceId>,
    #[serde(rename = "Volumes")]
    pub volumes: Vec<ResourceId>,
}

/// Running or stopped instances, then every volume. A resource that already
/// carries all default tag keys gets no call and is not reported.
pub async fn tag_resources(
    compute: &dyn ComputeApi,
    settings: TaggerSettings,
) -> Result<TaggedResources> {
    let pipeline = Pipeline::new(compute, Utc::now()).dry_run(settings.dry_run);

    let instances = pipeline
        .run(&Policy::tag_missing(
            ResourceKind::Instance,
            ListQuery::new().instance_states(&["running", "stopped"]),
            settings.default_tags.clone(),
        ))
        .await?;
    let volumes = pipeline
        .run(&Policy::tag_missing(
            ResourceKind::Volume,
            ListQuery::new(),
            settings.default_tags,
        ))
        .await?;

    info!(
        "Tagged {} instances and {} volumes in {}",
        instances.outcome.affected.len(),
        volumes.outcome.affected.len(),
        pipeline.region()
    );

    Ok(TaggedResources {
        instances: instances.outcome.affected,
        volumes: volumes.outcome.affected,
    })
}
