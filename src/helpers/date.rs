//! Date helper functions

use chrono::{DateTime, Datelike, TimeZone, Utc};
use chrono_tz::Tz;

use crate::i18n::I18n;

/// Parse a CMS timestamp.
///
/// Accepts RFC 3339 as well as the `+0000` offset style the Prismic API uses.
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    DateTime::parse_from_rfc3339(s)
        .or_else(|_| DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%z"))
        .or_else(|_| DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .map(|d| d.with_timezone(&Utc))
        .ok()
}

/// Format a post date as `dd MMM yyyy` with a localized month abbreviation
///
/// # Examples
/// ```ignore
/// post_date(&date, chrono_tz::UTC, &I18n::new("pt-BR")) // -> "15 mar 2021"
/// ```
pub fn post_date(date: &DateTime<Utc>, tz: Tz, i18n: &I18n) -> String {
    let local = tz.from_utc_datetime(&date.naive_utc());
    format!(
        "{:02} {} {}",
        local.day(),
        i18n.month_short(local.month0() as usize),
        local.year()
    )
}

/// Format a date in ISO 8601 / XML format
pub fn date_xml<Tz2: TimeZone>(date: &DateTime<Tz2>) -> String
where
    Tz2::Offset: std::fmt::Display,
{
    date.format("%Y-%m-%dT%H:%M:%S%.3f%:z").to_string()
}
