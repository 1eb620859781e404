//! Date normalization for scraped session dates.
//!
//! The schedule page renders dates in a loose, human-readable style such as
//! `"Jan. 5, 2025 3 p.m."`. [`normalize`] turns those strings into a
//! timestamp in the configured timezone. Sessions always start on the hour:
//! whatever minutes the page shows are replaced with `:00`.

use std::sync::LazyLock;

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use regex::{Captures, Regex};
use thiserror::Error;

/// Timezone sessions are scheduled in unless configured otherwise.
pub const DEFAULT_TIME_ZONE: &str = "America/Chicago";

/// Fixed length of every tutoring session.
pub const SESSION_DURATION: Duration = Duration::hours(1);

/// Format of a normalized date string.
const NORMALIZED_FORMAT: &str = "%B %d %Y %I:%M %p";

/// Abbreviation prefix to full month name.
const MONTHS: [(&str, &str); 12] = [
    ("jan", "January"),
    ("feb", "February"),
    ("mar", "March"),
    ("apr", "April"),
    ("may", "May"),
    ("jun", "June"),
    ("jul", "July"),
    ("aug", "August"),
    ("sep", "September"),
    ("oct", "October"),
    ("nov", "November"),
    ("dec", "December"),
];

static MERIDIEM_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d)\s*([ap])\.?\s?m\b\.?").expect("Invalid meridiem regex")
});

static MONTH_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?")
        .expect("Invalid month regex")
});

static COMMA_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*").expect("Invalid comma regex"));

static HOUR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,2})(?::\d{1,2})?\s*(AM|PM)\b").expect("Invalid hour regex")
});

/// Errors produced while turning a scraped date into a timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateParseError {
    /// The text could not be read as a calendar date and hour.
    #[error("invalid date: {input:?}")]
    InvalidDate { input: String },

    /// The configured timezone is not a known IANA identifier.
    #[error("unknown timezone: {0}")]
    UnknownTimeZone(String),
}

impl DateParseError {
    fn invalid(input: &str) -> Self {
        Self::InvalidDate {
            input: input.to_string(),
        }
    }
}

/// Parses an IANA timezone identifier such as `"America/Chicago"`.
pub fn parse_time_zone(name: &str) -> Result<Tz, DateParseError> {
    name.parse::<Tz>()
        .map_err(|_| DateParseError::UnknownTimeZone(name.to_string()))
}

/// Applies the textual normalization steps without parsing.
///
/// 1. meridiem markers become `AM`/`PM`
/// 2. month abbreviations become full month names
/// 3. commas are replaced by a single space
/// 4. the hour gets explicit `:00` minutes
pub fn normalize_text(input: &str) -> String {
    let text = MERIDIEM_REGEX.replace_all(input, |caps: &Captures<'_>| {
        format!("{} {}M", &caps[1], caps[2].to_ascii_uppercase())
    });

    let text = MONTH_REGEX.replace_all(&text, |caps: &Captures<'_>| {
        let prefix = caps[1].to_ascii_lowercase();
        MONTHS
            .iter()
            .find(|(abbr, _)| *abbr == prefix)
            .map(|(_, full)| (*full).to_string())
            .unwrap_or_else(|| caps[0].to_string())
    });

    let text = COMMA_REGEX.replace_all(&text, " ");
    let text = HOUR_REGEX.replace_all(&text, "$1:00 $2");

    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Converts a scraped date string into a timestamp in `tz`.
///
/// Ambiguous local times (DST fall-back) resolve to the earlier instant.
/// Local times skipped by a DST transition are rejected.
pub fn normalize(input: &str, tz: &Tz) -> Result<DateTime<Tz>, DateParseError> {
    let text = normalize_text(input);
    let naive = NaiveDateTime::parse_from_str(&text, NORMALIZED_FORMAT)
        .map_err(|_| DateParseError::invalid(input))?;

    tz.from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| DateParseError::invalid(input))
}

/// Start and end of a session in its scheduling timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTime {
    /// Session start.
    pub start: DateTime<Tz>,
    /// Session end, always [`SESSION_DURATION`] after the start.
    pub end: DateTime<Tz>,
}

impl SessionTime {
    /// Builds a session time from its start.
    pub fn from_start(start: DateTime<Tz>) -> Self {
        Self {
            start,
            end: start + SESSION_DURATION,
        }
    }

    /// Parses a scraped date string into a session time.
    pub fn parse(input: &str, tz: &Tz) -> Result<Self, DateParseError> {
        normalize(input, tz).map(Self::from_start)
    }

    /// Start instant in UTC, used for existence comparisons.
    pub fn start_utc(&self) -> DateTime<Utc> {
        self.start.with_timezone(&Utc)
    }

    /// IANA name of the scheduling timezone.
    pub fn time_zone_name(&self) -> &'static str {
        self.start.timezone().name()
    }
}
