//! Date normalization command.

use chrono::SecondsFormat;
use serde::Serialize;
use tutorsync_core::{SessionTime, normalize_text, parse_time_zone};

use super::print_json;
use crate::config::ClientConfig;
use crate::error::ClientResult;

/// How a scraped date string is read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedDate {
    pub input: String,
    pub normalized: String,
    pub time_zone: String,
    pub start: String,
    pub end: String,
}

impl NormalizedDate {
    pub fn parse(input: &str, time_zone: &str) -> ClientResult<Self> {
        let tz = parse_time_zone(time_zone)?;
        let time = SessionTime::parse(input, &tz)?;
        Ok(Self {
            input: input.to_string(),
            normalized: normalize_text(input),
            time_zone: time.time_zone_name().to_string(),
            start: time.start.to_rfc3339_opts(SecondsFormat::Secs, false),
            end: time.end.to_rfc3339_opts(SecondsFormat::Secs, false),
        })
    }
}

/// Prints the interpretation of `date`, in `time_zone` or the configured zone.
pub fn normalize(
    config: &ClientConfig,
    date: &str,
    time_zone: Option<&str>,
    json: bool,
) -> ClientResult<()> {
    let time_zone = time_zone.unwrap_or(&config.google.time_zone);
    let normalized = NormalizedDate::parse(date, time_zone)?;

    if json {
        print_json(&normalized)?;
    } else {
        println!("normalized: {}", normalized.normalized);
        println!("start:      {}", normalized.start);
        println!("end:        {}", normalized.end);
        println!("time zone:  {}", normalized.time_zone);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;

    #[test]
    fn abbreviated_date() {
        let date = NormalizedDate::parse("Jan. 5, 2025 3 p.m.", "America/Chicago").unwrap();
        insta::assert_json_snapshot!(date, @r#"
        {
          "input": "Jan. 5, 2025 3 p.m.",
          "normalized": "January 5 2025 3:00 PM",
          "time_zone": "America/Chicago",
          "start": "2025-01-05T15:00:00-06:00",
          "end": "2025-01-05T16:00:00-06:00"
        }
        "#);
    }

    #[test]
    fn summer_offset() {
        let date = NormalizedDate::parse("July 4, 2025 9 a.m.", "America/Chicago").unwrap();
        assert_eq!(date.start, "2025-07-04T09:00:00-05:00");
    }

    #[test]
    fn unparsable_date() {
        let err = NormalizedDate::parse("next tuesday", "America/Chicago").unwrap_err();
        assert!(matches!(err, ClientError::Date(_)));
    }

    #[test]
    fn unknown_zone() {
        assert!(NormalizedDate::parse("Jan 5, 2025 3 PM", "Mars/Olympus").is_err());
    }
}
