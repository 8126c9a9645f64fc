//! Loan-level summary statistics: acquisition and performance profiles by
//! origination year, credit losses by disposition and origination year

use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::calendar::{add_months, parse_date, DatePattern};
use crate::error::Result;
use crate::persist::{read_rows, save_table, Cell, SaveOptions, SaveReport, Table};

const MILLION: f64 = 1_000_000.0;

/// Last statuses of loans that are no longer active
const TERMINAL_STATUSES: [&str; 7] = ["P", "R", "N", "F", "S", "T", "L"];

/// One loan of the harmonised loan-level file
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LoanSummaryRecord {
    #[serde(rename = "ORIG_DTE")]
    pub orig_date: Option<String>,
    #[serde(rename = "DISP_DTE")]
    pub disp_date: Option<String>,
    #[serde(rename = "AQSN_DTE")]
    pub acquisition_date: Option<String>,
    pub orig_amt: Option<f64>,
    #[serde(rename = "CSCORE_B")]
    pub cscore_b: Option<f64>,
    #[serde(rename = "CSCORE_C")]
    pub cscore_c: Option<f64>,
    pub oltv: Option<f64>,
    pub ocltv: Option<f64>,
    pub dti: Option<f64>,
    pub orig_rt: Option<f64>,
    #[serde(rename = "LAST_STAT")]
    pub last_stat: Option<String>,
    #[serde(rename = "LAST_UPB")]
    pub last_upb: Option<f64>,
    #[serde(rename = "FMOD_DTE")]
    pub fmod_date: Option<String>,
    #[serde(rename = "F180_UPB")]
    pub f180_upb: Option<f64>,
    #[serde(rename = "NET_LOSS")]
    pub net_loss: Option<f64>,
    /// Non-numeric flags read as missing
    #[serde(rename = "COMPLT_FLG", default, deserialize_with = "csv::invalid_option")]
    pub complete_flag: Option<f64>,
    #[serde(rename = "FCC_COST")]
    pub fcc_cost: Option<f64>,
    #[serde(rename = "PP_COST")]
    pub pp_cost: Option<f64>,
    #[serde(rename = "AR_COST")]
    pub ar_cost: Option<f64>,
    #[serde(rename = "IE_COST")]
    pub ie_cost: Option<f64>,
    #[serde(rename = "TAX_COST")]
    pub tax_cost: Option<f64>,
    #[serde(rename = "INT_COST")]
    pub int_cost: Option<f64>,
    #[serde(rename = "NS_PROCS")]
    pub ns_procs: Option<f64>,
    #[serde(rename = "CE_PROCS")]
    pub ce_procs: Option<f64>,
    #[serde(rename = "RMW_PROCS")]
    pub rmw_procs: Option<f64>,
    #[serde(rename = "O_PROCS")]
    pub o_procs: Option<f64>,
}

/// Dates arrive as `yyyy-mm-dd`, `yyyy-mm` or any other recognised encoding
fn summary_date(text: &str) -> Option<NaiveDate> {
    parse_date(text, None).or_else(|| parse_date(&format!("{}-01", text.trim()), Some(DatePattern::IsoDate)))
}

fn year_of(text: Option<&str>) -> Option<i32> {
    summary_date(text?).map(|d| d.year())
}

fn sum_all(values: &[Option<f64>]) -> Option<f64> {
    values.iter().copied().sum()
}

/// A record with the loss fields derived from its components
#[derive(Debug, Clone)]
struct LoanLoss<'a> {
    record: &'a LoanSummaryRecord,
    orig_year: Option<i32>,
    disp_year: Option<i32>,
    default_upb: Option<f64>,
    liquidation_expense: Option<f64>,
    total_cost: Option<f64>,
    total_proceeds: Option<f64>,
}

impl<'a> LoanLoss<'a> {
    fn new(record: &'a LoanSummaryRecord) -> Self {
        let complete = if record.complete_flag == Some(1.0) { 1.0 } else { 0.0 };
        let default_upb = record.last_upb.map(|upb| upb * complete);
        let liquidation_expense = sum_all(&[
            record.fcc_cost,
            record.pp_cost,
            record.ar_cost,
            record.ie_cost,
            record.tax_cost,
        ]);
        let total_cost = sum_all(&[liquidation_expense, default_upb, record.int_cost]);
        let total_proceeds = sum_all(&[record.ns_procs, record.ce_procs, record.rmw_procs, record.o_procs]);
        Self {
            record,
            orig_year: year_of(record.orig_date.as_deref()),
            disp_year: year_of(record.disp_date.as_deref()),
            default_upb,
            liquidation_expense,
            total_cost,
            total_proceeds,
        }
    }
}

/// Sum over loans, skipping missing values
fn total<F>(loans: &[&LoanLoss], value: F) -> f64
where
    F: Fn(&LoanLoss) -> Option<f64>,
{
    loans.iter().filter_map(|&l| value(l)).sum()
}

/// `orig_amt`-weighted mean over loans where the field is present
fn upb_weighted<F>(loans: &[&LoanLoss], value: F) -> f64
where
    F: Fn(&LoanSummaryRecord) -> Option<f64>,
{
    let (weighted, weight) = loans
        .iter()
        .filter_map(|l| Some((value(l.record)?, l.record.orig_amt?)))
        .fold((0.0, 0.0), |(s, w), (x, amt)| (s + x * amt, w + amt));
    weighted / weight
}

fn mean<F>(loans: &[&LoanLoss], value: F) -> f64
where
    F: Fn(&LoanSummaryRecord) -> Option<f64>,
{
    let present: Vec<f64> = loans.iter().filter_map(|l| value(l.record)).collect();
    present.iter().sum::<f64>() / present.len() as f64
}

fn is_active(record: &LoanSummaryRecord) -> bool {
    !record
        .last_stat
        .as_deref()
        .is_some_and(|s| TERMINAL_STATUSES.contains(&s))
}

fn count_status(loans: &[&LoanLoss], status: &str) -> usize {
    loans
        .iter()
        .filter(|l| l.record.last_stat.as_deref() == Some(status))
        .count()
}

type Field = fn(&LoanSummaryRecord) -> Option<f64>;

const WEIGHTED_FIELDS: [Field; 6] = [
    |r| r.cscore_b,
    |r| r.cscore_c,
    |r| r.oltv,
    |r| r.ocltv,
    |r| r.dti,
    |r| r.orig_rt,
];

/// Group loans by a label, in label order
fn group_by<'a, 'b, F>(loans: &'b [LoanLoss<'a>], label: F) -> BTreeMap<String, Vec<&'b LoanLoss<'a>>>
where
    F: Fn(&LoanLoss) -> Option<String>,
{
    let mut groups: BTreeMap<String, Vec<&LoanLoss>> = BTreeMap::new();
    for loan in loans {
        if let Some(key) = label(loan) {
            groups.entry(key).or_default().push(loan);
        }
    }
    groups
}

/// Years in `pooled` share one label
fn pooled_label(year: Option<i32>, pooled: (i32, i32)) -> Option<String> {
    let year = year?;
    if (pooled.0..=pooled.1).contains(&year) {
        Some(format!("{}-{}", pooled.0, pooled.1))
    } else {
        Some(year.to_string())
    }
}

/// The four summary tables
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryTables {
    pub acquisition: Table,
    pub performance: Table,
    pub disposition_loss: Table,
    pub origination_loss: Table,
}

impl SummaryTables {
    /// Output file name and year column of each table
    pub const FILES: [(&'static str, &'static str); 4] = [
        ("aquisition_stats.csv", "Origination Year"),
        ("performance_stats.csv", "Origination Year"),
        ("disposition_loss_stats.csv", "DISP_YR"),
        ("origination_loss_stats.csv", "ORIG_YR"),
    ];

    /// Build every table from loan-level records
    pub fn from_records(records: &[LoanSummaryRecord]) -> Self {
        let loans: Vec<LoanLoss> = records.iter().map(LoanLoss::new).collect();

        // disposition dates after this are too recent for complete loss data
        let disposition_cutoff = records
            .iter()
            .filter_map(|r| summary_date(r.acquisition_date.as_deref()?))
            .max()
            .map(|d| add_months(d, -3));
        let settled: Vec<LoanLoss> = loans
            .iter()
            .filter(|l| match l.record.disp_date.as_deref().map(str::trim) {
                None | Some("") => true,
                Some(text) => match (summary_date(text), disposition_cutoff) {
                    (_, None) => true,
                    (Some(date), Some(cutoff)) => date <= cutoff,
                    (None, Some(_)) => false,
                },
            })
            .cloned()
            .collect();
        log::info!(
            "Summarising {} loans ({} with settled or no disposition)",
            loans.len(),
            settled.len()
        );

        Self {
            acquisition: acquisition_stats(&loans),
            performance: performance_stats(&loans),
            disposition_loss: loss_stats(&settled, "DISP_YR", |l| pooled_label(l.disp_year, (2000, 2006)), false),
            origination_loss: loss_stats(&settled, "ORIG_YR", |l| pooled_label(l.orig_year, (1999, 2005)), true),
        }
    }

    /// Save all four tables unsorted, keyed by their year column
    pub fn save(self, output_dir: &Path) -> Result<Vec<(PathBuf, SaveReport)>> {
        let tables = [self.acquisition, self.performance, self.disposition_loss, self.origination_loss];
        tables
            .into_iter()
            .zip(Self::FILES)
            .map(|(table, (file, key))| {
                let path = output_dir.join(file);
                let report = save_table(table, &SaveOptions::new(&path, &[key]).unsorted())?;
                Ok((path, report))
            })
            .collect()
    }
}

/// Read the harmonised loan-level CSV
pub fn load_summary_records<P: AsRef<Path>>(path: P) -> Result<Vec<LoanSummaryRecord>> {
    read_rows(path)
}

fn acquisition_stats(loans: &[LoanLoss]) -> Table {
    let mut table = Table::new([
        "Origination Year",
        "Loan Count",
        "Total Orig. UPB ($M)",
        "Avg. Orig UPB ($M)",
        "Borrower Credit Score",
        "Co-Borrower Credit Score",
        "LTV Ratio",
        "CLTV Ratio",
        "DTI",
        "Note Rate",
    ]);

    let groups = group_by(loans, |l| l.orig_year.map(|y| y.to_string()));
    let mut yearly: Vec<(f64, [f64; 6])> = Vec::with_capacity(groups.len());
    for (year, group) in &groups {
        let orig_amt = total(group, |l| l.record.orig_amt);
        let weighted = WEIGHTED_FIELDS.map(|f| upb_weighted(group, f));
        yearly.push((orig_amt, weighted));

        let mut row = vec![
            Cell::from(year.as_str()),
            Cell::from(group.len()),
            Cell::from(orig_amt / MILLION),
            Cell::from(mean(group, |r| r.orig_amt)),
        ];
        row.extend(weighted.map(Cell::from));
        table.push_row(row);
    }

    let all: Vec<&LoanLoss> = loans.iter().collect();
    let total_orig: f64 = yearly.iter().map(|(amt, _)| amt).sum();
    let mut row = vec![
        Cell::from("Total"),
        Cell::from(all.len()),
        Cell::from(total(&all, |l| l.record.orig_amt) / MILLION),
        Cell::from(mean(&all, |r| r.orig_amt)),
    ];
    row.extend((0..WEIGHTED_FIELDS.len()).map(|i| {
        let weighted: f64 = yearly
            .iter()
            .filter(|(_, wm)| wm[i].is_finite())
            .map(|(amt, wm)| wm[i] * amt)
            .sum();
        Cell::from(weighted / total_orig)
    }));
    table.push_row(row);
    table
}

fn performance_row(label: &str, loans: &[&LoanLoss]) -> Vec<Cell> {
    let orig_amt = total(loans, |l| l.record.orig_amt);
    let active: Vec<&LoanLoss> = loans.iter().copied().filter(|l| is_active(l.record)).collect();
    let f180 = total(loans, |l| l.record.f180_upb);
    let mut row = vec![
        Cell::from(label),
        Cell::from(loans.len()),
        Cell::from(orig_amt / MILLION),
        Cell::from(active.len()),
        Cell::from(total(&active, |l| l.record.last_upb) / MILLION),
    ];
    row.extend(["P", "R", "S", "T", "F", "N", "L"].map(|s| Cell::from(count_status(loans, s))));
    row.extend([
        Cell::from(loans.iter().filter(|l| l.record.fmod_date.as_deref().is_some_and(|d| !d.trim().is_empty())).count()),
        Cell::from(f180 / MILLION),
        Cell::from(f180 / orig_amt),
        Cell::from(total(loans, |l| l.default_upb) / MILLION),
        Cell::from(total(loans, |l| l.record.net_loss) / orig_amt),
    ]);
    row
}

fn performance_stats(loans: &[LoanLoss]) -> Table {
    let mut table = Table::new([
        "Origination Year",
        "Loan Count",
        "Total Orig. UPB ($M)",
        "Loan Count (Active)",
        "Active UPB ($M)",
        "Prepaid (01)",
        "Repurchased (06)",
        "Short Sale (03)",
        "Third Party Sale (02)",
        "REO (09)",
        "Non-Performing Loan Sale (15)",
        "Re-Performing Loan Sale (16)",
        "Mod Loan Count",
        "D180 UPB",
        "D180% of Orig. UPB",
        "Default UPB",
        "Loss Rate (%)",
    ]);
    for (year, group) in group_by(loans, |l| l.orig_year.map(|y| y.to_string())) {
        table.push_row(performance_row(&year, &group));
    }
    let all: Vec<&LoanLoss> = loans.iter().collect();
    table.push_row(performance_row("Total", &all));
    table
}

fn loss_row(label: &str, loans: &[&LoanLoss], with_default_rate: bool) -> Vec<Cell> {
    let default_upb = total(loans, |l| l.default_upb);
    let share = |value: fn(&LoanLoss) -> Option<f64>| Cell::from(total(loans, value) / default_upb);

    let mut row = vec![Cell::from(label), Cell::from(default_upb / MILLION)];
    if with_default_rate {
        row.push(Cell::from(default_upb / total(loans, |l| l.record.orig_amt)));
    }
    row.extend([
        share(|l| l.record.int_cost),
        share(|l| l.liquidation_expense),
        share(|l| l.record.fcc_cost),
        share(|l| l.record.pp_cost),
        share(|l| l.record.ar_cost),
        share(|l| l.record.ie_cost),
        share(|l| l.record.tax_cost),
        share(|l| l.total_cost),
        share(|l| l.record.ns_procs),
        share(|l| l.record.ce_procs),
        share(|l| l.record.rmw_procs),
        share(|l| l.record.o_procs),
        share(|l| l.total_proceeds),
        share(|l| l.record.net_loss),
        Cell::from(total(loans, |l| l.record.net_loss) / MILLION),
    ]);
    row
}

fn loss_stats<F>(loans: &[LoanLoss], year_column: &str, label: F, with_default_rate: bool) -> Table
where
    F: Fn(&LoanLoss) -> Option<String>,
{
    let mut columns = vec![year_column, "DFLT_UPB_SUM"];
    if with_default_rate {
        columns.push("DLFT_RT");
    }
    columns.extend([
        "INT_COST", "LIQ_EXP", "FCC_COST", "PP_COST", "AR_COST", "IE_COST", "TAX_COST", "TOT_COST", "NS_PROCS",
        "CE_PROCS", "RMW_PROCS", "O_PROCS", "TOT_PROCS", "NET_SEV", "NET_LOSS",
    ]);
    let mut table = Table::new(columns);
    for (year, group) in group_by(loans, label) {
        table.push_row(loss_row(&year, &group, with_default_rate));
    }
    let all: Vec<&LoanLoss> = loans.iter().collect();
    table.push_row(loss_row("Total", &all, with_default_rate));
    table
}
