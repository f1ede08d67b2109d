//! Cost and usage report grouped by one dimension

use crate::config::{validate_group_by, Config};
use crate::error::Result;
use crate::pipeline::report::{apply_percentages, cost_records, rank_by_cost, total_cost, CostRecord};
use crate::provider::{CostApi, CostQuery, Granularity};
use crate::utils::{date_window, format_money};
use chrono::NaiveDate;
use comfy_table::{presets::UTF8_FULL, Cell, CellAlignment, Table};
use console::style;
use tracing::info;

pub const COST_METRIC: &str = "UnblendedCost";

#[derive(Debug, Clone)]
pub struct CostSettings {
    pub days: u32,
    pub group_by: String,
    pub top: usize,
}

impl CostSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            days: config.cost.days,
            group_by: config.cost.group_by.clone(),
            top: config.cost.top,
        }
    }
}

/// Ranked cost records for one period
#[derive(Debug, Clone, PartialEq)]
pub struct CostReport {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub dimension: String,
    /// Highest cost first, percentages filled in
    pub records: Vec<CostRecord>,
    pub total: f64,
}

impl CostReport {
    pub fn currency(&self) -> &str {
        self.records
            .first()
            .map(|r| r.currency.as_str())
            .unwrap_or("USD")
    }
}

pub struct CostAnalyzer<'a> {
    api: &'a dyn CostApi,
}

impl<'a> CostAnalyzer<'a> {
    pub fn new(api: &'a dyn CostApi) -> Self {
        Self { api }
    }

    /// `[today - days, today)`, monthly, grouped by the settings dimension
    pub fn query(settings: &CostSettings, today: NaiveDate) -> CostQuery {
        let (start, end) = date_window(today, settings.days);
        CostQuery {
            start,
            end,
            granularity: Granularity::Monthly,
            group_by: Some(settings.group_by.clone()),
            metric: COST_METRIC.to_string(),
        }
    }

    pub async fn analyze(&self, settings: &CostSettings, today: NaiveDate) -> Result<CostReport> {
        validate_group_by(&settings.group_by)?;
        let query = Self::query(settings, today);
        info!(
            "Querying {} from {} to {} grouped by {}",
            query.metric, query.start, query.end, settings.group_by
        );

        let periods = self.api.cost_and_usage(&query).await?;
        let mut records = cost_records(&periods, &settings.group_by);
        rank_by_cost(&mut records);
        apply_percentages(&mut records);

        Ok(CostReport {
            start: query.start,
            end: query.end,
            dimension: settings.group_by.clone(),
            total: total_cost(&records),
            records,
        })
    }
}

/// Top-N table: rank, item, cost, share of total
pub fn summary_table(report: &CostReport, top: usize) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Rank", "Item", "Cost", "Percentage"]);
    for (idx, record) in report.records.iter().take(top).enumerate() {
        table.add_row(vec![
            Cell::new(idx + 1),
            Cell::new(&record.value),
            Cell::new(format_money(record.cost)).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.2}%", record.percentage.unwrap_or(0.0)))
                .set_alignment(CellAlignment::Right),
        ]);
    }
    table
}

pub fn print_summary(report: &CostReport, top: usize) {
    if report.records.is_empty() {
        println!("No cost data available");
        return;
    }

    println!();
    println!("{}", style("Cost Analysis Summary").bold());
    println!(
        "  {} {} {}",
        style("Total Cost:").dim(),
        style(format_money(report.total)).yellow().bold(),
        report.currency()
    );
    println!(
        "  {} {} to {}",
        style("Period:").dim(),
        report.start,
        report.end
    );
    println!("  {} {}", style("Group By:").dim(), report.dimension);
    println!();
    println!("Top {} Cost Items:", top);
    println!("{}", summary_table(report, top));
}
