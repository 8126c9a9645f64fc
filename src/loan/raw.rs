//! Load raw loan-performance records from the quarterly pipe-delimited files
//!
//! The files carry no header; fields are addressed by their position in the
//! published single-family loan performance layout.

use csv::{ReaderBuilder, StringRecord};
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use crate::error::{PipelineError, Result};

/// Zero-based positions of the fields the pipeline keeps
pub mod position {
    pub const LOAN_ID: usize = 1;
    pub const ACT_PERIOD: usize = 2;
    pub const ORIG_RATE: usize = 7;
    pub const CURR_RATE: usize = 8;
    pub const ORIG_UPB: usize = 9;
    pub const CURRENT_UPB: usize = 11;
    pub const ORIG_TERM: usize = 12;
    pub const ORIG_DATE: usize = 13;
    pub const LOAN_AGE: usize = 15;
    pub const ADJ_REM_MONTHS: usize = 17;
    pub const MATR_DT: usize = 18;
    pub const OLTV: usize = 19;
    pub const NUM_BO: usize = 21;
    pub const DTI: usize = 22;
    pub const CSCORE_B: usize = 23;
    pub const FIRST_FLAG: usize = 25;
    pub const PURPOSE: usize = 26;
    pub const STATE: usize = 30;
    pub const MSA: usize = 31;
    pub const ZIP: usize = 32;
    pub const PRODUCT: usize = 34;
    pub const DLQ_STATUS: usize = 39;
    pub const ZERO_BAL_CODE: usize = 43;
    pub const ZB_DTE: usize = 44;
    pub const CURR_SCOREB: usize = 70;

    /// Records shorter than this cannot hold every kept field
    pub const MIN_FIELDS: usize = CURR_SCOREB + 1;
}

/// The canonical field subset of one raw record.
///
/// Text fields are kept verbatim (dates are still `MMYYYY` strings); numeric
/// fields are parsed, with blanks as `None`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawLoanRecord {
    pub loan_id: String,
    pub act_period: String,
    pub orig_rate: Option<f64>,
    pub curr_rate: Option<f64>,
    pub orig_upb: Option<f64>,
    pub current_upb: Option<f64>,
    pub orig_term: Option<u32>,
    pub orig_date: String,
    pub loan_age: Option<i32>,
    pub adj_rem_months: Option<i32>,
    pub matr_dt: String,
    pub oltv: Option<f64>,
    pub num_bo: Option<u32>,
    pub dti: Option<f64>,
    pub cscore_b: Option<u32>,
    pub first_flag: String,
    pub purpose: String,
    pub state: String,
    pub msa: String,
    pub zip: String,
    pub product: String,
    pub dlq_status: String,
    pub zero_bal_code: String,
    pub zb_dte: String,
    pub curr_scoreb: Option<u32>,
}

struct Fields<'a> {
    record: &'a StringRecord,
    line: u64,
}

impl<'a> Fields<'a> {
    fn text(&self, pos: usize) -> String {
        self.record.get(pos).unwrap_or("").trim().to_string()
    }

    fn number<T: FromStr>(&self, pos: usize, name: &str) -> Result<Option<T>> {
        let raw = self.record.get(pos).unwrap_or("").trim();
        if raw.is_empty() {
            return Ok(None);
        }
        raw.parse().map(Some).map_err(|_| PipelineError::MalformedRecord {
            line: self.line,
            reason: format!("{} is not numeric: '{}'", name, raw),
        })
    }
}

impl RawLoanRecord {
    fn from_record(record: &StringRecord) -> Result<Self> {
        use position::*;

        let line = record.position().map_or(0, |p| p.line());
        if record.len() < MIN_FIELDS {
            return Err(PipelineError::MalformedRecord {
                line,
                reason: format!("expected at least {} fields, found {}", MIN_FIELDS, record.len()),
            });
        }
        let f = Fields { record, line };

        let loan_id = f.text(LOAN_ID);
        let act_period = f.text(ACT_PERIOD);
        if loan_id.is_empty() || act_period.is_empty() {
            return Err(PipelineError::MalformedRecord {
                line,
                reason: "LOAN_ID and ACT_PERIOD are required".to_string(),
            });
        }

        Ok(Self {
            loan_id,
            act_period,
            orig_rate: f.number(ORIG_RATE, "ORIG_RATE")?,
            curr_rate: f.number(CURR_RATE, "CURR_RATE")?,
            orig_upb: f.number(ORIG_UPB, "ORIG_UPB")?,
            current_upb: f.number(CURRENT_UPB, "CURRENT_UPB")?,
            orig_term: f.number(ORIG_TERM, "ORIG_TERM")?,
            orig_date: f.text(ORIG_DATE),
            loan_age: f.number(LOAN_AGE, "LOAN_AGE")?,
            adj_rem_months: f.number(ADJ_REM_MONTHS, "ADJ_REM_MONTHS")?,
            matr_dt: f.text(MATR_DT),
            oltv: f.number(OLTV, "OLTV")?,
            num_bo: f.number(NUM_BO, "NUM_BO")?,
            dti: f.number(DTI, "DTI")?,
            cscore_b: f.number(CSCORE_B, "CSCORE_B")?,
            first_flag: f.text(FIRST_FLAG),
            purpose: f.text(PURPOSE),
            state: f.text(STATE),
            msa: f.text(MSA),
            zip: f.text(ZIP),
            product: f.text(PRODUCT),
            dlq_status: f.text(DLQ_STATUS),
            zero_bal_code: f.text(ZERO_BAL_CODE),
            zb_dte: f.text(ZB_DTE),
            curr_scoreb: f.number(CURR_SCOREB, "CURR_SCOREB")?,
        })
    }
}

/// Load every record of a quarterly file
pub fn load_raw_records<P: AsRef<Path>>(path: P) -> Result<Vec<RawLoanRecord>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|e| PipelineError::io(path, e))?;
    let records = load_raw_records_from_reader(file)?;
    log::info!("Read {} raw records from {}", records.len(), path.display());
    Ok(records)
}

/// Load raw records from any reader (e.g., string buffer)
pub fn load_raw_records_from_reader<R: Read>(reader: R) -> Result<Vec<RawLoanRecord>> {
    let mut csv_reader = ReaderBuilder::new()
        .delimiter(b'|')
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut records = Vec::new();
    let mut record = StringRecord::new();
    while csv_reader.read_record(&mut record)? {
        records.push(RawLoanRecord::from_record(&record)?);
    }
    Ok(records)
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::position::*;
    use super::*;

    #[test]
    fn test_load_from_reader() {
        let data = [
            standard_line("100001", "022000", "0", ""),
            raw_line(&[
                (LOAN_ID, "100001"),
                (ACT_PERIOD, "032000"),
                (ORIG_RATE, "6.0"),
                (CURRENT_UPB, "299500.25"),
                (ZERO_BAL_CODE, "01"),
                (ZB_DTE, "032000"),
                (STATE, "CA"),
            ]),
        ]
        .join("\n");

        let records = load_raw_records_from_reader(data.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.loan_id, "100001");
        assert_eq!(first.act_period, "022000");
        assert_eq!(first.orig_rate, Some(6.0));
        assert_eq!(first.current_upb, None);
        assert_eq!(first.orig_term, Some(360));
        assert_eq!(first.product, "FRM");
        assert_eq!(first.cscore_b, Some(720));

        let second = &records[1];
        assert_eq!(second.current_upb, Some(299500.25));
        assert_eq!(second.zero_bal_code, "01");
        assert_eq!(second.zb_dte, "032000");
    }

    #[test]
    fn test_record_ending_at_current_score_is_accepted() {
        let line = raw_line(&[(LOAN_ID, "7"), (ACT_PERIOD, "012001"), (CURR_SCOREB, "701")]);
        let truncated: Vec<&str> = line.split('|').take(MIN_FIELDS).collect();
        assert_eq!(truncated.len(), CURR_SCOREB + 1);

        let records = load_raw_records_from_reader(truncated.join("|").as_bytes()).unwrap();
        assert_eq!(records[0].loan_id, "7");
        assert_eq!(records[0].curr_scoreb, Some(701));

        let too_short: Vec<&str> = line.split('|').take(MIN_FIELDS - 1).collect();
        assert!(load_raw_records_from_reader(too_short.join("|").as_bytes()).is_err());
    }

    #[test]
    fn test_short_record_is_rejected() {
        let err = load_raw_records_from_reader("1|2|3".as_bytes()).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedRecord { line: 1, .. }));
    }

    #[test]
    fn test_non_numeric_field_names_the_line() {
        let data = [
            standard_line("1", "022000", "0", ""),
            standard_line("2", "022000", "zero", ""),
        ]
        .join("\n");
        let err = load_raw_records_from_reader(data.as_bytes()).unwrap_err();
        match err {
            PipelineError::MalformedRecord { line, reason } => {
                assert_eq!(line, 2);
                assert!(reason.contains("LOAN_AGE"));
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_missing_loan_id_is_rejected() {
        let data = raw_line(&[(ACT_PERIOD, "022000")]);
        assert!(load_raw_records_from_reader(data.as_bytes()).is_err());
    }
}
