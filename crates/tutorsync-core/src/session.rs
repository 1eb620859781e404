//! Session records scraped from the tutoring schedule page.
//!
//! A [`SessionRecord`] is the unit that flows from the extractor to the
//! synchronizer. Records are identified by their `(date, student, course)`
//! triple; the optional `id` is derived from that triple when the page does
//! not provide one.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Minimum number of cells a scraped row must have to be considered a session.
pub const MIN_ROW_CELLS: usize = 5;

/// Column holding the free-text session date.
const DATE_COLUMN: usize = 1;
/// Column holding the student name.
const STUDENT_COLUMN: usize = 2;
/// Column holding the course name.
const COURSE_COLUMN: usize = 3;

/// Prefix of every calendar event summary created for a session.
pub const SUMMARY_PREFIX: &str = "Tutoring Session with ";

/// A tutoring session as scraped from the schedule page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Opaque identifier. Derived from the triple when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Free-text date, e.g. `"Jan. 5, 2025 3 p.m."`.
    pub date: String,
    /// Student name.
    pub student: String,
    /// Course name.
    pub course: String,
}

/// Borrowed `(date, student, course)` triple used for deduplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionKey<'a> {
    pub date: &'a str,
    pub student: &'a str,
    pub course: &'a str,
}

impl SessionRecord {
    /// Creates a record with a derived identifier.
    pub fn new(
        date: impl Into<String>,
        student: impl Into<String>,
        course: impl Into<String>,
    ) -> Self {
        let mut record = Self {
            id: None,
            date: date.into(),
            student: student.into(),
            course: course.into(),
        };
        record.id = Some(record.derived_id());
        record
    }

    /// Builds a record from the text cells of one table row.
    ///
    /// Returns `None` when the row has fewer than [`MIN_ROW_CELLS`] cells or
    /// when any of date, student or course is blank after trimming.
    pub fn from_row<S: AsRef<str>>(cells: &[S]) -> Option<Self> {
        if cells.len() < MIN_ROW_CELLS {
            return None;
        }

        let date = cells[DATE_COLUMN].as_ref().trim();
        let student = cells[STUDENT_COLUMN].as_ref().trim();
        let course = cells[COURSE_COLUMN].as_ref().trim();

        if date.is_empty() || student.is_empty() || course.is_empty() {
            return None;
        }

        Some(Self::new(date, student, course))
    }

    /// Returns the deduplication key of this record.
    pub fn key(&self) -> SessionKey<'_> {
        SessionKey {
            date: &self.date,
            student: &self.student,
            course: &self.course,
        }
    }

    /// Returns the stored identifier, or the derived one when absent.
    pub fn session_id(&self) -> String {
        self.id.clone().unwrap_or_else(|| self.derived_id())
    }

    /// Fills in the identifier if it is missing.
    pub fn with_derived_id(mut self) -> Self {
        if self.id.is_none() {
            self.id = Some(self.derived_id());
        }
        self
    }

    /// Returns true if `other` has the same `(date, student, course)` triple.
    pub fn same_session(&self, other: &SessionRecord) -> bool {
        self.key() == other.key()
    }

    /// Calendar event summary for this session.
    pub fn summary(&self) -> String {
        format!("{}{}", SUMMARY_PREFIX, self.student)
    }

    /// Calendar event description for this session.
    pub fn description(&self) -> String {
        format!("Course: {}", self.course)
    }

    fn derived_id(&self) -> String {
        derive_session_id(&self.date, &self.student, &self.course)
    }
}

/// Derives a stable session identifier from the session triple.
///
/// Fields are separated by a unit separator so that `("ab", "c")` and
/// `("a", "bc")` hash differently.
pub fn derive_session_id(date: &str, student: &str, course: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(date.as_bytes());
    hasher.update([0x1f]);
    hasher.update(student.as_bytes());
    hasher.update([0x1f]);
    hasher.update(course.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn from_row_maps_columns() {
        let cells = row(&["42", " Jan. 5, 2025 3 p.m. ", "Alice", "Calculus", "Cancel"]);
        let record = SessionRecord::from_row(&cells).unwrap();

        assert_eq!(record.date, "Jan. 5, 2025 3 p.m.");
        assert_eq!(record.student, "Alice");
        assert_eq!(record.course, "Calculus");
        assert!(record.id.is_some());
    }

    #[test]
    fn from_row_rejects_short_rows() {
        let cells = row(&["42", "Jan. 5, 2025 3 p.m.", "Alice", "Calculus"]);
        assert!(SessionRecord::from_row(&cells).is_none());
    }

    #[test]
    fn from_row_rejects_blank_fields() {
        let cells = row(&["", "Jan. 5, 2025 3 p.m.", "   ", "Calculus", ""]);
        assert!(SessionRecord::from_row(&cells).is_none());
    }

    #[test]
    fn derived_id_is_stable() {
        let a = SessionRecord::new("Jan. 5, 2025 3 p.m.", "Alice", "Calculus");
        let b = SessionRecord::new("Jan. 5, 2025 3 p.m.", "Alice", "Calculus");
        assert_eq!(a.id, b.id);
        assert_eq!(a.session_id().len(), 16);
    }

    #[test]
    fn derived_id_differs_per_field() {
        let base = derive_session_id("Jan. 5, 2025 3 p.m.", "Alice", "Calculus");
        assert_ne!(base, derive_session_id("Jan. 6, 2025 3 p.m.", "Alice", "Calculus"));
        assert_ne!(base, derive_session_id("Jan. 5, 2025 3 p.m.", "Bob", "Calculus"));
        assert_ne!(base, derive_session_id("Jan. 5, 2025 3 p.m.", "Alice", "Physics"));
        assert_ne!(derive_session_id("ab", "c", "d"), derive_session_id("a", "bc", "d"));
    }

    #[test]
    fn session_id_prefers_explicit_id() {
        let record = SessionRecord {
            id: Some("row-7".to_string()),
            date: "Jan. 5, 2025 3 p.m.".to_string(),
            student: "Alice".to_string(),
            course: "Calculus".to_string(),
        };
        assert_eq!(record.session_id(), "row-7");
    }

    #[test]
    fn missing_id_is_derived_on_demand() {
        let record: SessionRecord = serde_json::from_str(
            r#"{"date":"Jan. 5, 2025 3 p.m.","student":"Alice","course":"Calculus"}"#,
        )
        .unwrap();
        assert!(record.id.is_none());

        let expected = derive_session_id("Jan. 5, 2025 3 p.m.", "Alice", "Calculus");
        assert_eq!(record.session_id(), expected);
        assert_eq!(record.with_derived_id().id, Some(expected));
    }

    #[test]
    fn same_session_ignores_id() {
        let mut a = SessionRecord::new("Jan. 5, 2025 3 p.m.", "Alice", "Calculus");
        let b = SessionRecord::new("Jan. 5, 2025 3 p.m.", "Alice", "Calculus");
        a.id = Some("other".to_string());
        assert!(a.same_session(&b));
    }

    #[test]
    fn summary_and_description() {
        let record = SessionRecord::new("Jan. 5, 2025 3 p.m.", "Alice", "Calculus");
        assert_eq!(record.summary(), "Tutoring Session with Alice");
        assert_eq!(record.description(), "Course: Calculus");
    }
}
