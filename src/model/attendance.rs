use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Who an attendance row is about. A row names exactly one subject.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AttendanceSubject {
    Student(u64),
    Faculty(u64),
    /// A staff user account.
    Staff(u64),
}

impl AttendanceSubject {
    /// Maps the three nullable reference columns onto a subject. Rows naming
    /// none or more than one subject are rejected.
    pub fn from_columns(
        student_id: Option<u64>,
        faculty_id: Option<u64>,
        staff_id: Option<u64>,
    ) -> Option<Self> {
        match (student_id, faculty_id, staff_id) {
            (Some(id), None, None) => Some(AttendanceSubject::Student(id)),
            (None, Some(id), None) => Some(AttendanceSubject::Faculty(id)),
            (None, None, Some(id)) => Some(AttendanceSubject::Staff(id)),
            _ => None,
        }
    }

    /// `(student_id, faculty_id, staff_id)` column values.
    pub fn columns(self) -> (Option<u64>, Option<u64>, Option<u64>) {
        match self {
            AttendanceSubject::Student(id) => (Some(id), None, None),
            AttendanceSubject::Faculty(id) => (None, Some(id), None),
            AttendanceSubject::Staff(id) => (None, None, Some(id)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: u64,
    pub student_id: Option<u64>,
    pub faculty_id: Option<u64>,
    pub staff_id: Option<u64>,
    #[schema(value_type = String, format = "date", example = "2026-10-19")]
    pub date: NaiveDate,
    pub is_present: bool,
    pub remarks: Option<String>,
    pub uploaded_by: u64,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
}

impl AttendanceRecord {
    pub fn subject(&self) -> Option<AttendanceSubject> {
        AttendanceSubject::from_columns(self.student_id, self.faculty_id, self.staff_id)
    }
}

/// Insert payload for one attendance row.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAttendance {
    pub subject: AttendanceSubject,
    pub date: NaiveDate,
    pub is_present: bool,
    pub remarks: Option<String>,
    pub uploaded_by: u64,
}

/// Present/absent row counts.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct AttendanceTally {
    pub present: i64,
    pub absent: i64,
}

impl AttendanceTally {
    pub fn total(&self) -> i64 {
        self.present + self.absent
    }
}
