//! In-memory tables handed to the persistence gate

use chrono::NaiveDate;
use std::cmp::Ordering;
use std::fmt;

/// A single table cell
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    Null,
    /// Non-scalar value; never allowed through the gate
    List(Vec<Cell>),
}

impl Cell {
    /// Missing values, including non-finite floats
    pub fn is_null(&self) -> bool {
        match self {
            Cell::Null => true,
            Cell::Float(v) => !v.is_finite(),
            _ => false,
        }
    }

    pub fn is_scalar(&self) -> bool {
        !matches!(self, Cell::List(_))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(v) => Some(*v as f64),
            Cell::Float(v) if v.is_finite() => Some(*v),
            _ => None,
        }
    }

    /// Total order used when sorting by key: nulls first, numbers by value,
    /// then dates, then text
    pub fn sort_cmp(&self, other: &Cell) -> Ordering {
        fn rank(cell: &Cell) -> u8 {
            match cell {
                Cell::Null | Cell::List(_) => 0,
                Cell::Int(_) | Cell::Float(_) => 1,
                Cell::Date(_) => 2,
                Cell::Text(_) => 3,
            }
        }
        match (self, other) {
            (Cell::Date(a), Cell::Date(b)) => a.cmp(b),
            (Cell::Text(a), Cell::Text(b)) => a.cmp(b),
            (Cell::Int(a), Cell::Int(b)) => a.cmp(b),
            (a, b) if rank(a) == 1 && rank(b) == 1 => {
                let (x, y) = (a.as_f64().unwrap_or(f64::NAN), b.as_f64().unwrap_or(f64::NAN));
                x.total_cmp(&y)
            }
            (a, b) => rank(a).cmp(&rank(b)),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Int(v) => write!(f, "{}", v),
            Cell::Float(v) if v.is_finite() => write!(f, "{}", v),
            Cell::Float(_) | Cell::Null => Ok(()),
            Cell::Text(s) => write!(f, "{}", s),
            Cell::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Cell::List(items) => {
                let parts: Vec<String> = items.iter().map(|c| c.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

impl From<i64> for Cell {
    fn from(v: i64) -> Self {
        Cell::Int(v)
    }
}

impl From<i32> for Cell {
    fn from(v: i32) -> Self {
        Cell::Int(v as i64)
    }
}

impl From<u32> for Cell {
    fn from(v: u32) -> Self {
        Cell::Int(v as i64)
    }
}

impl From<u8> for Cell {
    fn from(v: u8) -> Self {
        Cell::Int(v as i64)
    }
}

impl From<usize> for Cell {
    fn from(v: usize) -> Self {
        Cell::Int(v as i64)
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        if v.is_finite() {
            Cell::Float(v)
        } else {
            Cell::Null
        }
    }
}

impl From<bool> for Cell {
    fn from(v: bool) -> Self {
        Cell::Int(v as i64)
    }
}

impl From<String> for Cell {
    fn from(v: String) -> Self {
        Cell::Text(v)
    }
}

impl From<&str> for Cell {
    fn from(v: &str) -> Self {
        Cell::Text(v.to_string())
    }
}

impl From<NaiveDate> for Cell {
    fn from(v: NaiveDate) -> Self {
        Cell::Date(v)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(v: Option<T>) -> Self {
        v.map_or(Cell::Null, Into::into)
    }
}

/// A record type that can be laid out as a table row.
///
/// `columns()` must name the cells in the order `cells()` yields them. When
/// the type also derives `Deserialize`, the names must match its fields so
/// persisted tables read back through [`super::read_rows`].
pub trait TableRow {
    fn columns() -> Vec<&'static str>;
    fn cells(&self) -> Vec<Cell>;
}

/// Column-named rows of cells
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn from_rows<R: TableRow>(rows: &[R]) -> Self {
        Self {
            columns: R::columns().into_iter().map(String::from).collect(),
            rows: rows.iter().map(TableRow::cells).collect(),
        }
    }

    /// Append a row; short rows are padded with nulls
    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), Cell::Null);
        self.rows.push(row);
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column(&self, index: usize) -> impl Iterator<Item = &Cell> {
        self.rows.iter().map(move |row| row.get(index).unwrap_or(&Cell::Null))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_conversions() {
        assert_eq!(Cell::from(Some(3u32)), Cell::Int(3));
        assert_eq!(Cell::from(None::<f64>), Cell::Null);
        assert_eq!(Cell::from(f64::NAN), Cell::Null);
        assert!(Cell::Float(f64::INFINITY).is_null());
        assert_eq!(Cell::from(true), Cell::Int(1));
        let d = NaiveDate::from_ymd_opt(2001, 2, 1).unwrap();
        assert_eq!(Cell::from(d).to_string(), "2001-02-01");
        assert_eq!(Cell::Null.to_string(), "");
    }

    #[test]
    fn test_sort_order() {
        let mut cells = vec![Cell::Float(2.5), Cell::Null, Cell::Int(2), Cell::Int(10)];
        cells.sort_by(|a, b| a.sort_cmp(b));
        assert_eq!(cells, vec![Cell::Null, Cell::Int(2), Cell::Float(2.5), Cell::Int(10)]);
    }

    #[test]
    fn test_push_row_pads() {
        let mut table = Table::new(["a", "b", "c"]);
        table.push_row(vec![Cell::Int(1)]);
        assert_eq!(table.rows[0], vec![Cell::Int(1), Cell::Null, Cell::Null]);
    }
}
