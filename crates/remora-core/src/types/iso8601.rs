//! ISO-8601 dates on the wire.
//!
//! Output is always UTC with a fixed `+0000` offset. Input must match
//! `YYYY-MM-DDTHH:MM:SS.sss` followed by `Z` or `±HHMM`.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use regex::Regex;

static WIRE_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4})-(\d{2})-(\d{2})T(\d{2}):(\d{2}):(\d{2})\.(\d{3})(?:(Z)|([+-])(\d{2})(\d{2}))$")
        .expect("wire date regex must compile")
});

pub fn is_wire_date(s: &str) -> bool {
    WIRE_DATE.is_match(s)
}

/// Field-by-field UTC parse, then the explicit offset is subtracted.
pub fn parse(s: &str) -> Option<DateTime<Utc>> {
    let caps = WIRE_DATE.captures(s)?;
    let field = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());

    let year = caps.get(1)?.as_str().parse::<i32>().ok()?;
    let naive = NaiveDate::from_ymd_opt(year, field(2)?, field(3)?)?
        .and_hms_milli_opt(field(4)?, field(5)?, field(6)?, field(7)?)?;
    let utc = naive.and_utc();

    if caps.get(8).is_some() {
        return Some(utc);
    }
    let sign = if caps.get(9)?.as_str() == "-" { -1 } else { 1 };
    let offset_minutes = i64::from(field(10)?) * 60 + i64::from(field(11)?);
    utc.checked_sub_signed(TimeDelta::minutes(sign * offset_minutes))
}

pub fn format(date: &DateTime<Utc>) -> String {
    date.format("%Y-%m-%dT%H:%M:%S%.3f+0000").to_string()
}
