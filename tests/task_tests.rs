//! End-to-end tests of each operational unit against the in-memory fake

mod common;

use chrono::{NaiveDate, Utc};
use common::*;
use sweepctl::error::SweepError;
use sweepctl::metrics::{CPU_UTILIZATION, MEMORY_USED_PERCENT};
use sweepctl::provider::{CostGroup, CostPeriod, ResourceKind, ResourceState};
use sweepctl::tasks::*;

fn unused_settings() -> UnusedSettings {
    UnusedSettings {
        cpu_threshold: 5.0,
        ec2_days: 14,
        snapshot_days: 30,
        retain_tag: "Retain".into(),
    }
}

#[tokio::test]
async fn test_tagger_applies_only_missing_tags() {
    let cloud = FakeCloud::new("us-east-1").with_records(vec![
        instance("i-partial", ResourceState::Running, &[("Name", "x")]),
        instance(
            "i-complete",
            ResourceState::Stopped,
            &[("Environment", "prod"), ("Owner", "bob")],
        ),
        instance("i-gone", ResourceState::Terminated, &[]),
        volume("vol-1", ResourceState::InUse, &[("Owner", "alice")]),
    ]);

    let tagged = tag_resources(
        &cloud,
        TaggerSettings {
            default_tags: default_tags(),
            dry_run: false,
        },
    )
    .await
    .unwrap();

    assert_eq!(tagged.instances, vec!["i-partial"]);
    assert_eq!(tagged.volumes, vec!["vol-1"]);
    assert_eq!(
        cloud.mutating_calls(),
        vec![
            Call::CreateTags {
                ids: vec!["i-partial".into()],
                tags: default_tags(),
            },
            Call::CreateTags {
                ids: vec!["vol-1".into()],
                tags: tags(&[("Environment", "Untagged")]),
            },
        ]
    );

    let body = serde_json::to_value(&tagged).unwrap();
    assert_eq!(body["Instances"][0], "i-partial");
    assert_eq!(body["Volumes"][0], "vol-1");
}

#[tokio::test]
async fn test_tagger_fully_tagged_account_issues_no_calls() {
    let cloud = FakeCloud::new("us-east-1").with_records(vec![instance(
        "i-1",
        ResourceState::Running,
        &[("Environment", "dev"), ("Owner", "dana")],
    )]);

    let tagged = tag_resources(
        &cloud,
        TaggerSettings {
            default_tags: default_tags(),
            dry_run: false,
        },
    )
    .await
    .unwrap();

    assert_eq!(tagged, TaggedResources::default());
    assert!(cloud.mutating_calls().is_empty());
}

#[tokio::test]
async fn test_scheduler_stops_tagged_running_instances() {
    let cloud = FakeCloud::new("us-east-1").with_records(vec![
        instance("i-run", ResourceState::Running, &[("AutoScheduler", "stop")]),
        instance("i-already", ResourceState::Stopped, &[("AutoScheduler", "stop")]),
        instance("i-other", ResourceState::Running, &[("AutoScheduler", "start")]),
        instance("i-untagged", ResourceState::Running, &[]),
    ]);

    let result = run_schedule(
        &cloud,
        ScheduleAction::Stop,
        SchedulerSettings {
            tag_key: "AutoScheduler".into(),
            dry_run: false,
        },
    )
    .await
    .unwrap();

    assert_eq!(result, ScheduleResult::Stopped(vec!["i-run".into()]));
    assert_eq!(cloud.mutating_calls(), vec![Call::Stop(vec!["i-run".into()])]);
}

#[tokio::test]
async fn test_scheduler_start_with_no_matches_issues_no_call() {
    let cloud = FakeCloud::new("us-east-1").with_records(vec![instance(
        "i-run",
        ResourceState::Running,
        &[("AutoScheduler", "start")],
    )]);

    let result = run_schedule(
        &cloud,
        ScheduleAction::Start,
        SchedulerSettings {
            tag_key: "AutoScheduler".into(),
            dry_run: false,
        },
    )
    .await
    .unwrap();

    assert!(result.instances().is_empty());
    assert!(cloud.mutating_calls().is_empty());
}

#[tokio::test]
async fn test_tagger_dry_run_reports_same_resources_without_tagging() {
    let records = vec![
        instance("i-partial", ResourceState::Running, &[("Name", "x")]),
        instance("i-stopped", ResourceState::Stopped, &[("Owner", "bob")]),
        instance("i-complete", ResourceState::Running, &[("Environment", "prod"), ("Owner", "bob")]),
        volume("vol-1", ResourceState::InUse, &[("Owner", "alice")]),
        volume("vol-2", ResourceState::Available, &[]),
    ];
    let dry = FakeCloud::new("us-east-1").with_records(records.clone()).with_page_size(2);
    let live = FakeCloud::new("us-east-1").with_records(records).with_page_size(2);

    let dry_tagged = tag_resources(
        &dry,
        TaggerSettings {
            default_tags: default_tags(),
            dry_run: true,
        },
    )
    .await
    .unwrap();
    let live_tagged = tag_resources(
        &live,
        TaggerSettings {
            default_tags: default_tags(),
            dry_run: false,
        },
    )
    .await
    .unwrap();

    assert!(dry.mutating_calls().is_empty());
    assert!(!live.mutating_calls().is_empty());
    assert_eq!(dry_tagged, live_tagged);
    assert_eq!(dry_tagged.instances, vec!["i-partial", "i-stopped"]);
    assert_eq!(dry_tagged.volumes, vec!["vol-1", "vol-2"]);
}

#[tokio::test]
async fn test_scheduler_dry_run_reports_same_instances_without_calls() {
    let records = vec![
        instance("i-run-1", ResourceState::Running, &[("AutoScheduler", "stop")]),
        instance("i-run-2", ResourceState::Running, &[("AutoScheduler", "stop")]),
        instance("i-idle", ResourceState::Stopped, &[("AutoScheduler", "start")]),
        instance("i-untagged", ResourceState::Running, &[]),
    ];

    for action in [ScheduleAction::Stop, ScheduleAction::Start] {
        let dry = FakeCloud::new("us-east-1").with_records(records.clone());
        let live = FakeCloud::new("us-east-1").with_records(records.clone());

        let dry_result = run_schedule(
            &dry,
            action,
            SchedulerSettings {
                tag_key: "AutoScheduler".into(),
                dry_run: true,
            },
        )
        .await
        .unwrap();
        let live_result = run_schedule(
            &live,
            action,
            SchedulerSettings {
                tag_key: "AutoScheduler".into(),
                dry_run: false,
            },
        )
        .await
        .unwrap();

        assert!(dry.mutating_calls().is_empty(), "{} issued calls in dry run", action);
        assert_eq!(live.mutating_calls().len(), 1);
        assert_eq!(dry_result, live_result);
    }
}

#[tokio::test]
async fn test_snapshot_cleanup_dry_run_reports_without_deleting() {
    let now = Utc::now();
    let cloud = FakeCloud::new("us-east-1").with_records(vec![
        snapshot("snap-45d", 45, &[], now),
        snapshot("snap-10d", 10, &[], now),
        snapshot("snap-keep", 400, &[("Retain", "true")], now),
    ]);

    let report = cleanup_snapshots(
        &cloud,
        SnapshotSettings {
            retention_days: 30,
            retain_tag: "Retain".into(),
            dry_run: true,
        },
        now,
    )
    .await
    .unwrap();

    assert_eq!(report.deleted, vec!["snap-45d"]);
    assert!(report.dry_run);
    assert!(cloud.mutating_calls().is_empty());
    assert!(cloud.calls().contains(&Call::AccountId));

    let body = serde_json::to_value(&report).unwrap();
    assert_eq!(body, serde_json::json!({"DeletedSnapshots": ["snap-45d"], "DryRun": true}));
}

#[tokio::test]
async fn test_snapshot_cleanup_excludes_failed_deletes() {
    let now = Utc::now();
    let cloud = FakeCloud::new("us-east-1")
        .with_records(vec![
            snapshot("snap-a", 60, &[], now),
            snapshot("snap-b", 60, &[], now),
        ])
        .failing_delete("snap-a");

    let report = cleanup_snapshots(
        &cloud,
        SnapshotSettings {
            retention_days: 30,
            retain_tag: "Retain".into(),
            dry_run: false,
        },
        now,
    )
    .await
    .unwrap();

    assert_eq!(report.deleted, vec!["snap-b"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(cloud.mutating_calls().len(), 2);
}

#[tokio::test]
async fn test_idle_instance_reported_with_formatted_value() {
    let now = Utc::now();
    let cloud = FakeCloud::new("eu-west-1")
        .with_records(vec![
            instance("i-idle", ResourceState::Running, &[]),
            instance("i-busy", ResourceState::Running, &[]),
            instance("i-edge", ResourceState::Running, &[]),
            instance("i-nodata", ResourceState::Running, &[]),
        ])
        .with_metric(CPU_UTILIZATION, "i-idle", &[2.5, 3.0, 1.0])
        .with_metric(CPU_UTILIZATION, "i-busy", &[2.0, 60.0])
        .with_metric(CPU_UTILIZATION, "i-edge", &[5.0]);

    let findings = UnusedScanner::new(&cloud, &cloud, unused_settings(), now)
        .idle_instances()
        .await
        .unwrap();

    assert_eq!(findings.len(), 1);
    let f = &findings[0];
    assert_eq!(f.resource_id, "i-idle");
    assert_eq!(f.region, "eu-west-1");
    assert_eq!(f.value.as_deref(), Some("3.00%"));
    assert_eq!(f.metric.as_deref(), Some("Max CPU Utilization (14d)"));
    assert_eq!(f.recommendation, "Stop or terminate instance");
}

#[tokio::test]
async fn test_unused_scan_all_categories() {
    let now = Utc::now();
    let cloud = FakeCloud::new("us-west-2")
        .with_records(vec![
            instance("i-idle", ResourceState::Running, &[]),
            volume("vol-free", ResourceState::Available, &[]),
            volume("vol-used", ResourceState::InUse, &[]),
            address("eipalloc-free", None, None),
            address("eipalloc-eni", None, Some("eni-1")),
            address("eipalloc-inst", Some("i-1"), None),
            snapshot("snap-old", 31, &[], now),
            snapshot("snap-retained", 90, &[("Retain", "")], now),
            snapshot("snap-fresh", 3, &[], now),
        ])
        .with_metric(CPU_UTILIZATION, "i-idle", &[0.4]);

    let report = UnusedScanner::new(&cloud, &cloud, unused_settings(), now)
        .scan_all()
        .await
        .unwrap();

    assert_eq!(report.idle_instances.len(), 1);
    assert_eq!(report.unattached_volumes.len(), 1);
    assert_eq!(report.unattached_volumes[0].details["Size"], "100");
    assert_eq!(report.unused_addresses.len(), 1);
    assert_eq!(report.unused_addresses[0].resource_id, "eipalloc-free");
    assert_eq!(report.old_snapshots.len(), 1);
    assert_eq!(report.old_snapshots[0].resource_id, "snap-old");
    assert_eq!(
        report.old_snapshots[0].recommendation,
        "Delete snapshot (older than 30 days)"
    );
    assert!(cloud.mutating_calls().is_empty());

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["UnusedElasticIPs"][0]["AllocationId"], "eipalloc-free");
    assert_eq!(json["UnusedElasticIPs"][0]["PublicIp"], "203.0.113.10");
    assert_eq!(json["UnattachedEBSVolumes"][0]["VolumeId"], "vol-free");
    assert_eq!(json["IdleEC2Instances"][0]["InstanceId"], "i-idle");
    assert_eq!(json["IdleEC2Instances"][0]["Value"], "0.40%");
    assert_eq!(json["OldEBSSnapshots"][0]["SnapshotId"], "snap-old");
}

#[tokio::test]
async fn test_scan_regions_skips_failing_region() {
    let now = Utc::now();
    let regions = vec!["us-east-1".to_string(), "ap-east-1".to_string()];

    let report = scan_regions(&regions, &unused_settings(), now, |region| async move {
        if region == "ap-east-1" {
            FakeCloud::new(&region).failing_listing()
        } else {
            FakeCloud::new(&region).with_records(vec![volume("vol-1", ResourceState::Available, &[])])
        }
    })
    .await;

    assert_eq!(report.total(), 1);
    assert_eq!(report.unattached_volumes[0].region, "us-east-1");
}

#[tokio::test]
async fn test_rightsizing_memory_handling() {
    let now = Utc::now();
    let cloud = FakeCloud::new("us-east-1")
        .with_records(vec![
            instance("i-no-agent", ResourceState::Running, &[]),
            instance("i-low-mem", ResourceState::Running, &[]),
            instance("i-high-mem", ResourceState::Running, &[]),
            instance("i-busy", ResourceState::Running, &[]),
            instance("i-nodata", ResourceState::Running, &[]),
        ])
        .with_metric(CPU_UTILIZATION, "i-no-agent", &[12.0, 20.0])
        .with_metric(CPU_UTILIZATION, "i-low-mem", &[10.0])
        .with_metric(MEMORY_USED_PERCENT, "i-low-mem", &[22.5])
        .with_metric(CPU_UTILIZATION, "i-high-mem", &[10.0])
        .with_metric(MEMORY_USED_PERCENT, "i-high-mem", &[85.0])
        .with_metric(CPU_UTILIZATION, "i-busy", &[95.0]);

    let findings = recommend(
        &cloud,
        &cloud,
        RightsizingSettings {
            cpu_threshold: 40.0,
            mem_threshold: 40.0,
            days: 14,
        },
        now,
    )
    .await
    .unwrap();

    let ids: Vec<_> = findings.iter().map(|f| f.resource_id.as_str()).collect();
    assert_eq!(ids, vec!["i-no-agent", "i-low-mem"]);
    assert_eq!(findings[0].details["MaxCPU"], "20.00%");
    assert!(findings[0].metric.is_none());
    assert_eq!(findings[0].details["MaxMemory"], "unavailable");
    assert_eq!(findings[1].details["MaxMemory"], "22.50%");
    assert!(findings[0].recommendation.contains("m5.large"));

    let json = serde_json::to_value(&findings[1]).unwrap();
    assert_eq!(json["InstanceId"], "i-low-mem");
    assert_eq!(json["InstanceType"], "m5.large");
    assert_eq!(json["MaxCPU"], "10.00%");
    assert_eq!(json["MaxMemory"], "22.50%");

    // Memory is only queried for CPU candidates
    let memory_queries = cloud
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::Statistics { metric_name, .. } if metric_name == MEMORY_USED_PERCENT))
        .count();
    assert_eq!(memory_queries, 3);
}

fn cost_period(groups: &[(&str, f64)]) -> CostPeriod {
    CostPeriod {
        start: "2024-05-16".into(),
        end: "2024-06-01".into(),
        groups: groups
            .iter()
            .map(|(k, amount)| CostGroup {
                keys: vec![k.to_string()],
                amount: *amount,
                unit: "USD".into(),
            })
            .collect(),
    }
}

#[tokio::test]
async fn test_cost_report_ranked_with_percentages() {
    let cloud = FakeCloud::new("us-east-1").with_cost_periods(vec![cost_period(&[
        ("Amazon Simple Storage Service", 50.0),
        ("Amazon Elastic Compute Cloud - Compute", 100.0),
    ])]);
    let settings = CostSettings {
        days: 30,
        group_by: "SERVICE".into(),
        top: 10,
    };
    let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();

    let report = CostAnalyzer::new(&cloud).analyze(&settings, today).await.unwrap();

    assert_eq!(report.total, 150.0);
    assert_eq!(report.records[0].value, "Amazon Elastic Compute Cloud - Compute");
    assert_eq!(report.records[0].cost, 100.0);
    assert_eq!(report.records[0].percentage, Some(66.67));
    assert_eq!(report.records[1].percentage, Some(33.33));
    assert_eq!(report.currency(), "USD");

    let table = cost_analysis::summary_table(&report, 1).to_string();
    assert!(table.contains("$100.00"));
    assert!(!table.contains("Simple Storage"));
}

#[tokio::test]
async fn test_cost_invalid_dimension_rejected_before_query() {
    let cloud = FakeCloud::new("us-east-1");
    let settings = CostSettings {
        days: 30,
        group_by: "COLOR".into(),
        top: 10,
    };
    let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();

    let result = CostAnalyzer::new(&cloud).analyze(&settings, today).await;

    assert!(matches!(result, Err(SweepError::Config(_))));
    assert!(cloud.calls().is_empty());
}

#[tokio::test]
async fn test_listing_kinds_for_unused_scan() {
    let cloud = FakeCloud::new("us-east-1");
    UnusedScanner::new(&cloud, &cloud, unused_settings(), Utc::now())
        .scan_all()
        .await
        .unwrap();

    for kind in [
        ResourceKind::Instance,
        ResourceKind::Volume,
        ResourceKind::Address,
        ResourceKind::Snapshot,
    ] {
        assert_eq!(cloud.list_calls(kind), 1, "{} listed once", kind);
    }
}
