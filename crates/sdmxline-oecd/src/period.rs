//! Period labels → integer ordinals.
//!
//! An ordinal counts whole periods of one frequency since 1970
//! (the ISO week containing 1970-01-01 for weekly data). Within a
//! frequency, consecutive periods have consecutive ordinals, so the
//! ordinal is a cheap sortable stand-in for a calendar date.

use std::fmt;

use chrono::{NaiveDate, Weekday};

use crate::error::Error;

const EPOCH_YEAR: i64 = 1970;

/// Supported series frequencies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Frequency {
    Annual,
    Monthly,
    Quarterly,
    Weekly,
    Daily,
}

impl Frequency {
    /// Parse an SDMX frequency code (`A`, `M`, `Q`, `W`, `D`)
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "A" => Some(Self::Annual),
            "M" => Some(Self::Monthly),
            "Q" => Some(Self::Quarterly),
            "W" => Some(Self::Weekly),
            "D" => Some(Self::Daily),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Annual => "A",
            Self::Monthly => "M",
            Self::Quarterly => "Q",
            Self::Weekly => "W",
            Self::Daily => "D",
        }
    }

    /// List all supported frequencies
    pub fn all() -> &'static [Frequency] {
        &[
            Self::Annual,
            Self::Monthly,
            Self::Quarterly,
            Self::Weekly,
            Self::Daily,
        ]
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Ordinal of `period` for `frequency`.
///
/// Accepted forms: `YYYY` (A), `YYYY-MM` or `YYYY-Mmm` (M), `YYYY-Qn` (Q),
/// `YYYY-Www` ISO week (W), `YYYY-MM-DD` (D).
pub fn ordinal(period: &str, frequency: Frequency) -> Result<i64, Error> {
    parse_ordinal(period, frequency).ok_or_else(|| Error::MalformedPeriod {
        period: period.to_string(),
        frequency: frequency.code().to_string(),
    })
}

fn parse_ordinal(period: &str, frequency: Frequency) -> Option<i64> {
    if frequency == Frequency::Annual {
        return parse_year(period).map(|y| y - EPOCH_YEAR);
    }

    let (year, rest) = period.split_once('-')?;
    let year = parse_year(year)?;

    match frequency {
        Frequency::Annual => None,
        Frequency::Monthly => {
            let month = parse_digits(rest.strip_prefix('M').unwrap_or(rest), 2)?;
            in_range(month, 1, 12)?;
            Some((year - EPOCH_YEAR) * 12 + month - 1)
        }
        Frequency::Quarterly => {
            let quarter = parse_digits(rest.strip_prefix('Q')?, 1)?;
            in_range(quarter, 1, 4)?;
            Some((year - EPOCH_YEAR) * 4 + quarter - 1)
        }
        Frequency::Weekly => {
            let week = parse_digits(rest.strip_prefix('W')?, 2)?;
            let monday = NaiveDate::from_isoywd_opt(
                i32::try_from(year).ok()?,
                u32::try_from(week).ok()?,
                Weekday::Mon,
            )?;
            Some(monday.signed_duration_since(epoch_week_monday()).num_days() / 7)
        }
        Frequency::Daily => {
            let (month, day) = rest.split_once('-')?;
            let month = parse_digits(month, 2)?;
            let day = parse_digits(day, 2)?;
            let date = NaiveDate::from_ymd_opt(
                i32::try_from(year).ok()?,
                u32::try_from(month).ok()?,
                u32::try_from(day).ok()?,
            )?;
            Some(date.signed_duration_since(epoch_day()).num_days())
        }
    }
}

fn epoch_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).expect("valid epoch")
}

/// Monday of ISO week 1970-W01
fn epoch_week_monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(1969, 12, 29).expect("valid epoch")
}

fn parse_year(s: &str) -> Option<i64> {
    parse_digits(s, 4)
}

/// Exactly `width` ASCII digits
fn parse_digits(s: &str, width: usize) -> Option<i64> {
    if s.len() != width || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

fn in_range(v: i64, lo: i64, hi: i64) -> Option<()> {
    (lo..=hi).contains(&v).then_some(())
}
