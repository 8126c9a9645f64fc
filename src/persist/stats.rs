//! Per-column summary statistics written to the audit log

use std::collections::HashSet;

use super::table::{Cell, Table};

/// Summary of one column
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSummary {
    pub name: String,
    pub kind: &'static str,
    pub count: usize,
    pub unique: Option<usize>,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<String>,
    pub median: Option<f64>,
    pub max: Option<String>,
}

fn column_kind<'a>(cells: impl Iterator<Item = &'a Cell>) -> &'static str {
    let mut kind = "empty";
    for cell in cells {
        let this = match cell {
            Cell::Int(_) => "int",
            Cell::Float(v) if v.is_finite() => "float",
            Cell::Text(_) => "text",
            Cell::Date(_) => "date",
            Cell::List(_) => "list",
            Cell::Float(_) | Cell::Null => continue,
        };
        kind = match (kind, this) {
            ("empty", k) => k,
            (a, b) if a == b => a,
            ("int", "float") | ("float", "int") => "float",
            _ => "mixed",
        };
    }
    kind
}

/// Sample standard deviation (n - 1)
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    Some((ss / (values.len() - 1) as f64).sqrt())
}

/// Median with linear interpolation
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Summaries for every column of `table`
pub fn summarize(table: &Table) -> Vec<ColumnSummary> {
    table
        .columns
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let kind = column_kind(table.column(idx));
            let present: Vec<&Cell> = table.column(idx).filter(|c| !c.is_null()).collect();
            let mut summary = ColumnSummary {
                name: name.clone(),
                kind,
                count: present.len(),
                unique: None,
                mean: None,
                std: None,
                min: None,
                median: None,
                max: None,
            };

            match kind {
                "int" | "float" => {
                    let values: Vec<f64> = present.iter().filter_map(|c| c.as_f64()).collect();
                    if !values.is_empty() {
                        summary.mean = Some(values.iter().sum::<f64>() / values.len() as f64);
                        summary.std = sample_std(&values);
                        summary.median = median(&values);
                        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                        summary.min = Some(format_number(min));
                        summary.max = Some(format_number(max));
                    }
                }
                "date" => {
                    let mut dates: Vec<&Cell> = present.clone();
                    dates.sort_by(|a, b| a.sort_cmp(b));
                    summary.min = dates.first().map(|c| c.to_string());
                    summary.max = dates.last().map(|c| c.to_string());
                    summary.unique = Some(distinct(&present));
                }
                _ => summary.unique = Some(distinct(&present)),
            }
            summary
        })
        .collect()
}

fn distinct(cells: &[&Cell]) -> usize {
    cells.iter().map(|c| c.to_string()).collect::<HashSet<_>>().len()
}

/// `1234567.891` -> `1,234,567.891`
pub fn format_number(value: f64) -> String {
    let rounded = format!("{:.3}", value);
    let (sign, digits) = match rounded.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", rounded.as_str()),
    };
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, "000"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{}{}.{}", sign, grouped, frac_part)
}

/// Fixed-width text rendering of the summaries
pub fn render(summaries: &[ColumnSummary]) -> String {
    let opt_num = |v: Option<f64>| v.map(format_number).unwrap_or_default();
    let header = ["", "type", "count", "unique", "mean", "std", "min", "50%", "max"];
    let mut lines: Vec<Vec<String>> = vec![header.iter().map(|s| s.to_string()).collect()];
    for s in summaries {
        lines.push(vec![
            s.name.clone(),
            s.kind.to_string(),
            format_number(s.count as f64).trim_end_matches(".000").to_string(),
            s.unique.map(|u| u.to_string()).unwrap_or_default(),
            opt_num(s.mean),
            opt_num(s.std),
            s.min.clone().unwrap_or_default(),
            opt_num(s.median),
            s.max.clone().unwrap_or_default(),
        ]);
    }

    let widths: Vec<usize> = (0..header.len())
        .map(|col| lines.iter().map(|l| l[col].len()).max().unwrap_or(0))
        .collect();

    lines
        .iter()
        .map(|line| {
            line.iter()
                .enumerate()
                .map(|(col, value)| {
                    if col == 0 {
                        format!("{:<width$}", value, width = widths[col])
                    } else {
                        format!("{:>width$}", value, width = widths[col])
                    }
                })
                .collect::<Vec<_>>()
                .join("  ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(1234567.891), "1,234,567.891");
        assert_eq!(format_number(-1000.0), "-1,000.000");
        assert_eq!(format_number(12.3456), "12.346");
        assert_eq!(format_number(0.0), "0.000");
    }

    #[test]
    fn test_numeric_summary() {
        let mut table = Table::new(["x", "label"]);
        for (x, label) in [(1.0, "a"), (2.0, "b"), (3.0, "a"), (f64::NAN, "c")] {
            table.push_row(vec![Cell::from(x), Cell::from(label)]);
        }
        let summaries = summarize(&table);

        let x = &summaries[0];
        assert_eq!(x.kind, "float");
        assert_eq!(x.count, 3);
        assert_relative_eq!(x.mean.unwrap(), 2.0);
        assert_relative_eq!(x.std.unwrap(), 1.0);
        assert_relative_eq!(x.median.unwrap(), 2.0);
        assert_eq!(x.max.as_deref(), Some("3.000"));

        let label = &summaries[1];
        assert_eq!(label.kind, "text");
        assert_eq!(label.unique, Some(3));
        assert!(label.mean.is_none());
    }

    #[test]
    fn test_mixed_int_float_is_float() {
        let mut table = Table::new(["x"]);
        table.push_row(vec![Cell::Int(1)]);
        table.push_row(vec![Cell::Float(1.5)]);
        assert_eq!(summarize(&table)[0].kind, "float");
    }
}
