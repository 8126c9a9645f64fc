//! Calendar handling: raw date strings, acquisition quarters and the
//! date -> period crosswalk

mod crosswalk;
mod dates;
mod quarters;

pub use crosswalk::{CrosswalkRow, PeriodCrosswalk, PeriodGranularity};
pub use dates::{add_months, month_start, months_between, parse_date, DatePattern};
pub use quarters::{quarters_between, Quarter};
