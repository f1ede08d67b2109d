use crate::error::{ConfigError, Result};
use crate::provider::TagSet;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

pub const DEFAULT_CONFIG_FILE: &str = ".sweepctl.toml";

/// Longest window, in days, any job accepts
pub const MAX_WINDOW_DAYS: u32 = 36_500;

/// Group-by dimensions accepted by the cost report
pub const COST_DIMENSIONS: &[&str] = &["SERVICE", "REGION", "USAGE_TYPE", "INSTANCE_TYPE"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Region for the tagger, scheduler and snapshot cleanup
    pub region: String,
    pub tagger: TaggerConfig,
    pub scheduler: SchedulerConfig,
    pub snapshots: SnapshotConfig,
    pub idle: IdleConfig,
    pub rightsizing: RightsizingConfig,
    pub cost: CostConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaggerConfig {
    pub default_tags: TagSet,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Instances whose tag `<tag_key>` equals "stop" / "start" are selected
    pub tag_key: String,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    pub retention_days: u32,
    /// Snapshots carrying this tag key are never deleted
    pub retain_tag: String,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdleConfig {
    pub cpu_threshold: f64,
    pub days: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RightsizingConfig {
    pub cpu_threshold: f64,
    pub mem_threshold: f64,
    pub days: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CostConfig {
    pub days: u32,
    pub group_by: String,
    pub top: usize,
    /// Cost Explorer is served from a single region
    pub region: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            tagger: TaggerConfig::default(),
            scheduler: SchedulerConfig::default(),
            snapshots: SnapshotConfig::default(),
            idle: IdleConfig::default(),
            rightsizing: RightsizingConfig::default(),
            cost: CostConfig::default(),
        }
    }
}

impl Default for TaggerConfig {
    fn default() -> Self {
        Self {
            default_tags: [("Environment", "Untagged"), ("Owner", "Unknown")]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            dry_run: false,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tag_key: "AutoScheduler".to_string(),
            dry_run: false,
        }
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            retention_days: 30,
            retain_tag: "Retain".to_string(),
            dry_run: true,
        }
    }
}

impl Default for IdleConfig {
    fn default() -> Self {
        Self {
            cpu_threshold: 5.0,
            days: 14,
        }
    }
}

impl Default for RightsizingConfig {
    fn default() -> Self {
        Self {
            cpu_threshold: 40.0,
            mem_threshold: 40.0,
            days: 14,
        }
    }
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            days: 30,
            group_by: "SERVICE".to_string(),
            top: 10,
            region: "us-east-1".to_string(),
        }
    }
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = if let Some(p) = path {
            p.to_path_buf()
        } else {
            // Try .sweepctl.toml in current dir, then ~/.config/sweepctl/config.toml
            let local = PathBuf::from(DEFAULT_CONFIG_FILE);
            if local.exists() {
                local
            } else {
                dirs::config_dir()
                    .map(|d| d.join("sweepctl").join("config.toml"))
                    .unwrap_or(local)
            }
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = toml::from_str(&content).map_err(|e| {
                ConfigError::ParseError(format!("{}: {}", config_path.display(), e))
            })?;
            config.validate()?;
            Ok(config)
        } else {
            if path.is_some() {
                warn!(
                    "Config file not found: {}. Using default configuration.",
                    config_path.display()
                );
            }
            Ok(Config::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::ParseError(format!("failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values no run could use
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.region.trim().is_empty() {
            return Err(ConfigError::MissingField("region".to_string()));
        }
        if self.scheduler.tag_key.trim().is_empty() {
            return Err(ConfigError::MissingField("scheduler.tag_key".to_string()));
        }
        if self.snapshots.retain_tag.trim().is_empty() {
            return Err(ConfigError::MissingField("snapshots.retain_tag".to_string()));
        }
        for (field, value) in [
            ("idle.cpu_threshold", self.idle.cpu_threshold),
            ("rightsizing.cpu_threshold", self.rightsizing.cpu_threshold),
            ("rightsizing.mem_threshold", self.rightsizing.mem_threshold),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    reason: format!("{} is not a percentage", value),
                });
            }
        }
        validate_days("snapshots.retention_days", self.snapshots.retention_days)?;
        validate_days("idle.days", self.idle.days)?;
        validate_days("rightsizing.days", self.rightsizing.days)?;
        validate_days("cost.days", self.cost.days)?;
        validate_group_by(&self.cost.group_by)?;
        Ok(())
    }
}

/// Day counts must be between 1 and `MAX_WINDOW_DAYS`
pub fn validate_days(field: &str, days: u32) -> std::result::Result<(), ConfigError> {
    if (1..=MAX_WINDOW_DAYS).contains(&days) {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field: field.to_string(),
            reason: format!("{} is outside 1..={} days", days, MAX_WINDOW_DAYS),
        })
    }
}

pub fn validate_group_by(dimension: &str) -> std::result::Result<(), ConfigError> {
    if COST_DIMENSIONS.contains(&dimension) {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field: "group_by".to_string(),
            reason: format!(
                "{} is not one of {}",
                dimension,
                COST_DIMENSIONS.join(", ")
            ),
        })
    }
}

/// Parse the `DEFAULT_TAGS` override: a JSON object of string values
pub fn parse_tag_json(raw: &str) -> std::result::Result<TagSet, ConfigError> {
    serde_json::from_str::<TagSet>(raw).map_err(|e| ConfigError::InvalidValue {
        field: "DEFAULT_TAGS".to_string(),
        reason: format!("expected a JSON object of strings: {}", e),
    })
}

/// Raw overrides from the command line or the environment, applied on top
/// of the loaded file. Values stay strings until `apply` so a malformed
/// environment variable surfaces as a configuration error.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub region: Option<String>,
    pub default_tags: Option<String>,
    pub tag_key: Option<String>,
    pub retention_days: Option<String>,
    pub dry_run: Option<String>,
}

impl ConfigOverrides {
    pub fn apply(&self, config: &mut Config) -> std::result::Result<(), ConfigError> {
        if let Some(region) = &self.region {
            config.region = region.clone();
        }
        if let Some(raw) = &self.default_tags {
            config.tagger.default_tags = parse_tag_json(raw)?;
        }
        if let Some(tag_key) = &self.tag_key {
            config.scheduler.tag_key = tag_key.clone();
        }
        if let Some(raw) = &self.retention_days {
            config.snapshots.retention_days =
                raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    field: "RETENTION_DAYS".to_string(),
                    reason: format!("{} is not a number of days", raw),
                })?;
        }
        if let Some(raw) = &self.dry_run {
            let dry_run = parse_bool("DRY_RUN", raw)?;
            config.tagger.dry_run = dry_run;
            config.scheduler.dry_run = dry_run;
            config.snapshots.dry_run = dry_run;
        }
        config.validate()
    }
}

fn parse_bool(field: &str, raw: &str) -> std::result::Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            reason: format!("expected true or false, got {}", raw),
        }),
    }
}

pub fn init_config(output: &Path) -> Result<()> {
    let config = Config::default();
    config.save(output)?;
    println!("Created config file: {}", output.display());
    Ok(())
}
