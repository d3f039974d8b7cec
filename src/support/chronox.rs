//-
// Copyright (c) 2024, The Bucketmail Authors
//
// This file is part of Bucketmail.
//
// Bucketmail is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free
// Software Foundation, either version 3 of the License, or (at your option)
// any later version.
//
// Bucketmail is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for
// more details.
//
// You should have received a copy of the GNU General Public License along
// with Bucketmail. If not, see <http://www.gnu.org/licenses/>.

//! Helpers for the two date formats mail storage deals in: the IMAP internal
//! date (`DD-Mon-YYYY HH:MM:SS +ZZZZ`) and the bare calendar days that search
//! compares against.

use chrono::prelude::*;
use lazy_static::lazy_static;
use regex::Regex;

pub const INTERNAL_DATE_FORMAT: &str = "%d-%b-%Y %H:%M:%S %z";

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct",
    "nov", "dec",
];

lazy_static! {
    static ref DAY_MONTH_YEAR: Regex =
        Regex::new(r"(\d{1,2})[\s-]+([A-Za-z]{3})[A-Za-z]*[\s-]+(\d{4})")
            .unwrap();
}

/// Format `date` as an IMAP internal date.
pub fn format_internal_date<Tz: TimeZone>(date: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    date.format(INTERNAL_DATE_FORMAT).to_string()
}

/// The internal date to stamp on messages that arrive without one.
pub fn now_internal_date() -> String {
    format_internal_date(&Local::now())
}

/// Extract the calendar day from a date string.
///
/// This finds the first `DD Mon YYYY` (or `DD-Mon-YYYY`) run in the string
/// and ignores anything around it, such as a leading weekday or the time of
/// day. The day is taken as written; no time zone conversion happens.
pub fn parse_calendar_day(s: &str) -> Option<NaiveDate> {
    let cap = DAY_MONTH_YEAR.captures(s)?;
    let day: u32 = cap[1].parse().ok()?;
    let month = cap[2].to_ascii_lowercase();
    let month = MONTHS.iter().position(|&m| m == month)? as u32 + 1;
    let year: i32 = cap[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn internal_date_format() {
        let date = FixedOffset::east_opt(-5 * 3600)
            .unwrap()
            .with_ymd_and_hms(2020, 3, 7, 9, 5, 1)
            .unwrap();
        assert_eq!("07-Mar-2020 09:05:01 -0500", format_internal_date(&date));
    }

    #[test]
    fn calendar_days() {
        assert_eq!(
            Some(NaiveDate::from_ymd_opt(2020, 3, 7).unwrap()),
            parse_calendar_day("07-Mar-2020 09:05:01 -0500")
        );
        assert_eq!(
            Some(NaiveDate::from_ymd_opt(2024, 12, 25).unwrap()),
            parse_calendar_day("Wed, 25 Dec 2024 23:59:00 +1400")
        );
        assert_eq!(
            Some(NaiveDate::from_ymd_opt(2001, 1, 2).unwrap()),
            parse_calendar_day("2 january 2001")
        );
        assert_eq!(None, parse_calendar_day("31-Feb-2020"));
        assert_eq!(None, parse_calendar_day("yesterday"));
        assert_eq!(None, parse_calendar_day(""));
    }
}
