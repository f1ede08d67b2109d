use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueEnum};
use comfy_table::{presets::UTF8_FULL, Table};
use console::style;
use std::path::PathBuf;
use sweepctl::config::{self, Config, ConfigOverrides, COST_DIMENSIONS};
use sweepctl::error::{Result, SweepError};
use sweepctl::exit_codes;
use sweepctl::export::{self, OutputFormat};
use sweepctl::handler::{self, HandlerKind};
use sweepctl::providers::AwsProvider;
use sweepctl::tasks::{self, cost_analysis, CostAnalyzer, ScheduleAction};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sweepctl")]
#[command(
    about = "Tag, schedule and clean up AWS resources, and report on costs and waste",
    long_about = "sweepctl runs single-pass scan-filter-act jobs against an AWS account.\n\nJobs:\n  - tag        add missing default tags to instances and volumes\n  - schedule   stop or start instances selected by a tag\n  - snapshots  delete owned snapshots past retention\n  - cost       cost and usage report by service, region, ...\n  - rightsize  over-provisioned instance recommendations\n  - unused     idle instances, unattached volumes, unused IPs, old snapshots"
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format
    #[arg(long, global = true, value_enum, default_value = "text")]
    log_format: LogFormat,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// Settings the scheduled functions read from their environment
#[derive(Args)]
struct EnvOverrides {
    /// Region to operate in
    #[arg(long, env = "AWS_REGION")]
    region: Option<String>,
    /// Default tags as a JSON object, e.g. '{"Owner":"Unknown"}'
    #[arg(long, env = "DEFAULT_TAGS")]
    default_tags: Option<String>,
    /// Tag key the scheduler selects on
    #[arg(long, env = "TAG_KEY")]
    tag_key: Option<String>,
    /// Snapshot retention in days
    #[arg(long, env = "RETENTION_DAYS")]
    retention_days: Option<String>,
    /// Report without mutating (`--dry-run`, `--dry-run false`)
    #[arg(long, env = "DRY_RUN", num_args = 0..=1, default_missing_value = "true")]
    dry_run: Option<String>,
}

impl From<EnvOverrides> for ConfigOverrides {
    fn from(o: EnvOverrides) -> Self {
        Self {
            region: o.region,
            default_tags: o.default_tags,
            tag_key: o.tag_key,
            retention_days: o.retention_days,
            dry_run: o.dry_run,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Add missing default tags to instances and volumes
    Tag {
        #[command(flatten)]
        overrides: EnvOverrides,
    },
    /// Stop or start instances tagged for the schedule
    Schedule {
        /// stop or start
        #[arg(long, default_value = "stop")]
        action: String,
        #[command(flatten)]
        overrides: EnvOverrides,
    },
    /// Delete owned EBS snapshots older than the retention window
    Snapshots {
        #[command(flatten)]
        overrides: EnvOverrides,
    },
    /// Cost and usage report
    Cost {
        /// Days to analyze
        #[arg(long)]
        days: Option<u32>,
        /// Dimension to group by
        #[arg(long, value_parser = COST_DIMENSIONS.to_vec())]
        group_by: Option<String>,
        /// Export file (.csv or .json)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Cost Explorer region
        #[arg(long)]
        region: Option<String>,
        /// Items shown in the summary
        #[arg(long)]
        top: Option<usize>,
    },
    /// Right-sizing recommendations for running instances
    Rightsize {
        /// Region to scan
        #[arg(long)]
        region: String,
        /// Output file (.json or .csv)
        #[arg(short, long)]
        output: PathBuf,
        /// Days of utilization to analyze
        #[arg(long)]
        days: Option<u32>,
        /// Max CPU percentage below which an instance is over-provisioned
        #[arg(long)]
        cpu_threshold: Option<f64>,
        /// Max memory percentage below which an instance is over-provisioned
        #[arg(long)]
        mem_threshold: Option<f64>,
    },
    /// Find unused resources in one or all regions
    Unused {
        /// Region to scan
        #[arg(long, conflicts_with = "all_regions", required_unless_present = "all_regions")]
        region: Option<String>,
        /// Scan every enabled region
        #[arg(long)]
        all_regions: bool,
        /// Output file (.json or .csv)
        #[arg(short, long)]
        output: PathBuf,
        /// Daily average CPU percentage below which an instance is idle
        #[arg(long)]
        cpu_threshold: Option<f64>,
        /// Days of CPU history for idle instances
        #[arg(long)]
        ec2_days: Option<u32>,
        /// Snapshot retention in days
        #[arg(long)]
        snapshot_days: Option<u32>,
    },
    /// Run a scheduled function locally and print its response
    Invoke {
        #[arg(value_enum)]
        function: HandlerKind,
        /// Invocation event as JSON
        #[arg(long, default_value = "{}")]
        event: String,
        #[command(flatten)]
        overrides: EnvOverrides,
    },
    /// Initialize configuration
    Init {
        /// Output path for config file
        #[arg(short, long, default_value = config::DEFAULT_CONFIG_FILE)]
        output: PathBuf,
    },
}

fn init_logging(verbose: bool, format: LogFormat) {
    // Suppress INFO by default, only show warnings and errors
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_format);

    match run(cli).await {
        Ok(code) if code != exit_codes::codes::SUCCESS => std::process::exit(code),
        Ok(_) => {}
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            exit_codes::exit_with_code(&e);
        }
    }
}

fn with_overrides(mut config: Config, overrides: EnvOverrides) -> Result<Config> {
    ConfigOverrides::from(overrides).apply(&mut config)?;
    Ok(config)
}

async fn run(cli: Cli) -> Result<i32> {
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Tag { overrides } => {
            let config = with_overrides(config, overrides)?;
            let provider = AwsProvider::new(&config.region).await;
            let tagged =
                tasks::tag_resources(&provider, tasks::TaggerSettings::from_config(&config)).await?;
            println!("{}", serde_json::to_string_pretty(&tagged)?);
        }
        Commands::Schedule { action, overrides } => {
            let action: ScheduleAction = action.parse()?;
            let config = with_overrides(config, overrides)?;
            let provider = AwsProvider::new(&config.region).await;
            let result = tasks::run_schedule(
                &provider,
                action,
                tasks::SchedulerSettings::from_config(&config),
            )
            .await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Snapshots { overrides } => {
            let config = with_overrides(config, overrides)?;
            let provider = AwsProvider::new(&config.region).await;
            let report = tasks::cleanup_snapshots(
                &provider,
                tasks::SnapshotSettings::from_config(&config),
                Utc::now(),
            )
            .await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Cost {
            days,
            group_by,
            output,
            region,
            top,
        } => {
            if let Some(path) = &output {
                OutputFormat::from_path(path)?;
            }
            let mut settings = tasks::CostSettings::from_config(&config);
            settings.days = days.unwrap_or(settings.days);
            config::validate_days("--days", settings.days)?;
            settings.group_by = group_by.unwrap_or(settings.group_by);
            settings.top = top.unwrap_or(settings.top);
            let region = region.unwrap_or_else(|| config.cost.region.clone());

            println!("Analyzing AWS costs for the last {} days...", settings.days);
            let provider = AwsProvider::new(&region).await;
            let report = CostAnalyzer::new(&provider)
                .analyze(&settings, Utc::now().date_naive())
                .await?;
            cost_analysis::print_summary(&report, settings.top);

            if let Some(path) = &output {
                export::write_cost_report(path, &report.records)?;
            }
        }
        Commands::Rightsize {
            region,
            output,
            days,
            cpu_threshold,
            mem_threshold,
        } => {
            OutputFormat::from_path(&output)?;
            let mut settings = tasks::RightsizingSettings::from_config(&config);
            settings.days = days.unwrap_or(settings.days);
            config::validate_days("--days", settings.days)?;
            settings.cpu_threshold = cpu_threshold.unwrap_or(settings.cpu_threshold);
            settings.mem_threshold = mem_threshold.unwrap_or(settings.mem_threshold);

            let provider = AwsProvider::new(&region).await;
            let findings = tasks::recommend(&provider, &provider, settings, Utc::now()).await?;
            println!(
                "{} over-provisioned instances in {}",
                style(findings.len()).bold(),
                region
            );
            export::write_findings(&output, &findings)?;
        }
        Commands::Unused {
            region,
            all_regions,
            output,
            cpu_threshold,
            ec2_days,
            snapshot_days,
        } => {
            OutputFormat::from_path(&output)?;
            let mut settings = tasks::UnusedSettings::from_config(&config);
            settings.cpu_threshold = cpu_threshold.unwrap_or(settings.cpu_threshold);
            settings.ec2_days = ec2_days.unwrap_or(settings.ec2_days);
            settings.snapshot_days = snapshot_days.unwrap_or(settings.snapshot_days);
            config::validate_days("--ec2-days", settings.ec2_days)?;
            config::validate_days("--snapshot-days", settings.snapshot_days)?;

            let regions = match region {
                Some(r) => vec![r],
                None if all_regions => {
                    use sweepctl::provider::ComputeApi;
                    AwsProvider::new(&config.region).await.list_regions().await?
                }
                None => {
                    return Err(SweepError::Validation {
                        field: "region".to_string(),
                        reason: "You must specify either --region or --all-regions".to_string(),
                    })
                }
            };

            let report = tasks::scan_regions(&regions, &settings, Utc::now(), |region| async move {
                AwsProvider::new(&region).await
            })
            .await;

            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["Category", "Findings"]);
            for (category, findings) in report.categories() {
                table.add_row(vec![category.to_string(), findings.len().to_string()]);
            }
            println!("{}", table);
            export::write_unused_report(&output, &report)?;
        }
        Commands::Invoke {
            function,
            event,
            overrides,
        } => {
            let event: serde_json::Value =
                serde_json::from_str(&event).map_err(|e| SweepError::Validation {
                    field: "event".to_string(),
                    reason: e.to_string(),
                })?;
            let config = with_overrides(config, overrides)?;
            let provider = AwsProvider::new(&config.region).await;
            let response = handler::handle(function, &event, &provider, &config).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
            return Ok(exit_codes::exit_code_for_status(response.status_code));
        }
        Commands::Init { output } => {
            config::init_config(&output)?;
        }
    }

    Ok(exit_codes::codes::SUCCESS)
}
