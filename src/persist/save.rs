//! Validation gate in front of every persisted table
//!
//! A table is rejected before anything is written when its key columns are
//! missing, contain nulls or repeat, or when any column holds non-scalar
//! values. Accepted tables are written as CSV, hashed, and summarised into a
//! human-readable log next to the output.

use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::stats;
use super::table::{Cell, Table};
use crate::error::{PipelineError, Result};

/// Where and how to persist a table
#[derive(Debug, Clone)]
pub struct SaveOptions {
    pub keys: Vec<String>,
    pub out_file: PathBuf,
    /// Audit log; `None` skips it
    pub log_file: Option<PathBuf>,
    pub sort_by_key: bool,
    /// Append to an existing log instead of replacing it
    pub append_log: bool,
}

impl SaveOptions {
    /// Sorted by key, with a `.log` file next to the output
    pub fn new<P: Into<PathBuf>>(out_file: P, keys: &[&str]) -> Self {
        let out_file = out_file.into();
        let log_file = Some(out_file.with_extension("log"));
        Self {
            keys: keys.iter().map(|k| k.to_string()).collect(),
            out_file,
            log_file,
            sort_by_key: true,
            append_log: false,
        }
    }

    /// Keep the row order of the table
    pub fn unsorted(mut self) -> Self {
        self.sort_by_key = false;
        self
    }

    pub fn with_log<P: Into<PathBuf>>(mut self, log_file: Option<P>) -> Self {
        self.log_file = log_file.map(Into::into);
        self
    }

    pub fn appending_log(mut self) -> Self {
        self.append_log = true;
        self
    }
}

/// Outcome of a successful save
#[derive(Debug, Clone, PartialEq)]
pub struct SaveReport {
    pub rows: usize,
    pub hash: String,
}

fn check_extension(path: &Path) -> Result<()> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("csv") => Ok(()),
        other => Err(PipelineError::UnsupportedExtension(other.unwrap_or("").to_string())),
    }
}

fn check_row_widths(table: &Table) -> Result<()> {
    let expected = table.columns.len();
    match table.rows.iter().position(|row| row.len() != expected) {
        Some(row) => Err(PipelineError::RaggedRow {
            row,
            found: table.rows[row].len(),
            expected,
        }),
        None => Ok(()),
    }
}

fn check_columns_scalar(table: &Table) -> Result<()> {
    let offending: Vec<&str> = table
        .columns
        .iter()
        .enumerate()
        .filter(|(idx, _)| table.column(*idx).any(|c| !c.is_scalar()))
        .map(|(_, name)| name.as_str())
        .collect();
    if offending.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::NonScalarColumn(offending.join(", ")))
    }
}

/// Key columns must exist, be non-null and jointly unique
pub fn check_keys(table: &Table, keys: &[String]) -> Result<Vec<usize>> {
    check_row_widths(table)?;
    let indices = keys
        .iter()
        .map(|k| table.column_index(k).ok_or_else(|| PipelineError::MissingKeyColumn(k.clone())))
        .collect::<Result<Vec<_>>>()?;

    let with_nulls: Vec<&str> = keys
        .iter()
        .zip(&indices)
        .filter(|(_, idx)| table.column(**idx).any(Cell::is_null))
        .map(|(k, _)| k.as_str())
        .collect();
    if !with_nulls.is_empty() {
        return Err(PipelineError::NullKeys(with_nulls.join(", ")));
    }

    let mut seen = HashSet::with_capacity(table.len());
    for row in &table.rows {
        let key: Vec<String> = indices.iter().map(|&i| row[i].to_string()).collect();
        if !seen.insert(key.clone()) {
            return Err(PipelineError::DuplicateKey {
                keys: keys.join(", "),
                example: key.join(", "),
            });
        }
    }
    Ok(indices)
}

/// Move key columns to the left, preserving the order of the rest
fn reorder_keys_first(table: Table, key_indices: &[usize]) -> Table {
    let order: Vec<usize> = key_indices
        .iter()
        .copied()
        .chain((0..table.columns.len()).filter(|i| !key_indices.contains(i)))
        .collect();

    Table {
        columns: order.iter().map(|&i| table.columns[i].clone()).collect(),
        rows: table
            .rows
            .into_iter()
            .map(|row| order.iter().map(|&i| row[i].clone()).collect())
            .collect(),
    }
}

fn to_csv_bytes(table: &Table) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&table.columns)?;
    for row in &table.rows {
        writer.write_record(row.iter().map(|c| c.to_string()))?;
    }
    writer
        .into_inner()
        .map_err(|e| PipelineError::io("<csv buffer>", e.into_error()))
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))
        }
        _ => Ok(()),
    }
}

fn write_log(options: &SaveOptions, log_file: &Path, hash: &str, table: &Table) -> Result<()> {
    ensure_parent(log_file)?;
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .append(options.append_log)
        .truncate(!options.append_log)
        .open(log_file)
        .map_err(|e| PipelineError::io(log_file, e))?;

    let summary = stats::render(&stats::summarize(table));
    let body = format!(
        "{}File: {}\n\nSHA-256 hash: {}\n\nKeys: {}\n\n{}\n\n",
        if options.append_log { "\n\n" } else { "" },
        options.out_file.display(),
        hash,
        options.keys.join(" "),
        summary
    );
    file.write_all(body.as_bytes())
        .map_err(|e| PipelineError::io(log_file, e))
}

/// Validate, write and log a table
pub fn save_table(table: Table, options: &SaveOptions) -> Result<SaveReport> {
    check_extension(&options.out_file)?;
    check_row_widths(&table)?;
    check_columns_scalar(&table)?;
    let key_indices = check_keys(&table, &options.keys)?;

    let mut table = reorder_keys_first(table, &key_indices);
    if options.sort_by_key {
        let n_keys = key_indices.len();
        table.rows.sort_by(|a, b| {
            a[..n_keys]
                .iter()
                .zip(&b[..n_keys])
                .map(|(x, y)| x.sort_cmp(y))
                .find(|o| o.is_ne())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }

    let bytes = to_csv_bytes(&table)?;
    let hash = format!("{:x}", Sha256::digest(&bytes));

    ensure_parent(&options.out_file)?;
    fs::write(&options.out_file, &bytes).map_err(|e| PipelineError::io(&options.out_file, e))?;
    if let Some(log_file) = &options.log_file {
        write_log(options, log_file, &hash, &table)?;
    }

    log::info!("File '{}' saved successfully ({} rows)", options.out_file.display(), table.len());
    Ok(SaveReport {
        rows: table.len(),
        hash,
    })
}

/// Read a persisted CSV table into typed rows
pub fn read_rows<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<Vec<T>> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for result in reader.deserialize() {
        rows.push(result?);
    }
    log::debug!("Read {} rows from {}", rows.len(), path.display());
    Ok(rows)
}
