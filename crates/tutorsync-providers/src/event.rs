//! Calendar event models in the Google Calendar v3 JSON shape.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tutorsync_core::{SessionRecord, SessionTime};

/// Start or end of an event.
///
/// Timed events carry `dateTime`; all-day events carry `date` only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDateTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl EventDateTime {
    /// A timed instant labelled with its IANA zone.
    pub fn at(instant: DateTime<Tz>) -> Self {
        Self {
            date_time: Some(instant.to_rfc3339()),
            date: None,
            time_zone: Some(instant.timezone().name().to_string()),
        }
    }

    /// The instant in UTC, or `None` for all-day or unparsable values.
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        let raw = self.date_time.as_deref()?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// An event as returned by the calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub start: EventDateTime,
    #[serde(default)]
    pub end: EventDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl CalendarEvent {
    /// Start instant in UTC, if the event is timed.
    pub fn start_instant(&self) -> Option<DateTime<Utc>> {
        self.start.instant()
    }

    /// Returns true if this event has the given summary and starts at the
    /// given instant. Instants are compared, not their textual form.
    pub fn matches(&self, summary: &str, start: DateTime<Utc>) -> bool {
        self.summary.as_deref() == Some(summary) && self.start_instant() == Some(start)
    }

    pub fn is_cancelled(&self) -> bool {
        self.status.as_deref() == Some("cancelled")
    }
}

/// Request body for creating an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    pub summary: String,
    pub description: String,
    pub start: EventDateTime,
    pub end: EventDateTime,
}

impl NewEvent {
    /// Builds the event for a session at an already-normalized time.
    pub fn for_session(record: &SessionRecord, time: &SessionTime) -> Self {
        Self {
            summary: record.summary(),
            description: record.description(),
            start: EventDateTime::at(time.start),
            end: EventDateTime::at(time.end),
        }
    }

    pub fn start_instant(&self) -> Option<DateTime<Utc>> {
        self.start.instant()
    }
}

/// What the calendar reports back after a create.
///
/// Parsed leniently: an unreadable body still counts as a created event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub html_link: Option<String>,
}
