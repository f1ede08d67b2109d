//! Report file output
//!
//! The format follows the file extension: `.csv` or `.json`. Anything else
//! is rejected, and callers check the path before issuing any remote call.

use crate::error::{Result, SweepError};
use crate::pipeline::report::CostRecord;
use crate::pipeline::{Finding, UnusedReport};
use serde::Serialize;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    Json,
}

impl OutputFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("csv") => Ok(OutputFormat::Csv),
            Some("json") => Ok(OutputFormat::Json),
            _ => Err(SweepError::Validation {
                field: "output".to_string(),
                reason: format!(
                    "Output file must have .csv or .json extension: {}",
                    path.display()
                ),
            }),
        }
    }
}

/// Quote a CSV field when it contains a separator, quote or newline
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn csv_row(fields: &[String]) -> String {
    let mut row = fields
        .iter()
        .map(|f| csv_field(f))
        .collect::<Vec<_>>()
        .join(",");
    row.push('\n');
    row
}

pub fn cost_csv(records: &[CostRecord]) -> String {
    let mut csv = String::from("PeriodStart,PeriodEnd,Dimension,Value,Cost,Currency,Percentage\n");
    for r in records {
        csv.push_str(&csv_row(&[
            r.period_start.clone(),
            r.period_end.clone(),
            r.dimension.clone(),
            r.value.clone(),
            format!("{:.2}", r.cost),
            r.currency.clone(),
            r.percentage.map(|p| format!("{:.2}", p)).unwrap_or_default(),
        ]));
    }
    csv
}

/// One row per finding. `category` is left empty for flat lists.
pub fn findings_csv<'a, I>(findings: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a Finding)>,
{
    let mut csv = String::from(
        "Category,ResourceId,Kind,Region,Finding,Recommendation,Metric,Value,Details\n",
    );
    for (category, f) in findings {
        let details = f
            .details
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("; ");
        csv.push_str(&csv_row(&[
            category.to_string(),
            f.resource_id.clone(),
            f.kind.to_string(),
            f.region.clone(),
            f.finding.clone(),
            f.recommendation.clone(),
            f.metric.clone().unwrap_or_default(),
            f.value.clone().unwrap_or_default(),
            details,
        ]));
    }
    csv
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Empty record sets write nothing for CSV (there is no header to take
/// field names from) and an empty array for JSON.
pub fn write_cost_report(path: &Path, records: &[CostRecord]) -> Result<()> {
    match OutputFormat::from_path(path)? {
        OutputFormat::Csv => {
            if records.is_empty() {
                warn!("No cost data to export");
                return Ok(());
            }
            std::fs::write(path, cost_csv(records))?;
        }
        OutputFormat::Json => write_json(path, records)?,
    }
    println!("Cost report exported to {}", path.display());
    Ok(())
}

pub fn write_findings(path: &Path, findings: &[Finding]) -> Result<()> {
    match OutputFormat::from_path(path)? {
        OutputFormat::Csv => {
            std::fs::write(path, findings_csv(findings.iter().map(|f| ("", f))))?
        }
        OutputFormat::Json => write_json(path, findings)?,
    }
    println!("Recommendations saved to {}", path.display());
    Ok(())
}

pub fn write_unused_report(path: &Path, report: &UnusedReport) -> Result<()> {
    match OutputFormat::from_path(path)? {
        OutputFormat::Csv => {
            let rows = report
                .categories()
                .into_iter()
                .flat_map(|(category, findings)| findings.iter().map(move |f| (category, f)));
            std::fs::write(path, findings_csv(rows))?;
        }
        OutputFormat::Json => write_json(path, report)?,
    }
    println!("Results saved to {}", path.display());
    Ok(())
}
