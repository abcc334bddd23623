//! Repository seam between the services and the relational store.
//!
//! Joins are never traversed lazily: every scoped read takes an explicit
//! [`Scope`] filter and the implementation applies it against the owning
//! entity table.

pub mod mysql;
#[cfg(test)]
pub mod memory;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    model::{
        attendance::{AttendanceRecord, AttendanceTally, NewAttendance},
        audit_log::{AuditLogEntry, NewAuditLog},
        college::College,
        department::Department,
        faculty::Faculty,
        marks::{MarksRecord, MarksTally, NewMarks},
        student::Student,
    },
    policy::Scope,
};

pub use mysql::MySqlStore;

pub type StoreResult<T> = Result<T, sqlx::Error>;

/// Which entity table an attendance tally joins against.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AttendeeKind {
    Student,
    Faculty,
}

/// Inclusive date window; open ends are unbounded.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    #[schema(value_type = Option<String>, format = "date", example = "2026-06-01")]
    pub start: Option<NaiveDate>,
    #[schema(value_type = Option<String>, format = "date", example = "2026-10-31")]
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start.is_none_or(|s| day >= s) && self.end.is_none_or(|e| day <= e)
    }
}

#[allow(async_fn_in_trait)]
pub trait Store {
    // reference data
    async fn active_colleges(&self, scope: &Scope) -> StoreResult<Vec<College>>;
    async fn college(&self, id: u64) -> StoreResult<Option<College>>;
    async fn active_departments(&self, scope: &Scope) -> StoreResult<Vec<Department>>;

    // people
    async fn student_by_admission_number(&self, admission_number: &str)
    -> StoreResult<Option<Student>>;
    async fn faculty_by_number(&self, faculty_number: &str) -> StoreResult<Option<Faculty>>;
    async fn students(&self, scope: &Scope) -> StoreResult<Vec<Student>>;
    async fn faculty(&self, scope: &Scope) -> StoreResult<Vec<Faculty>>;

    // aggregates
    async fn attendance_tally_on(
        &self,
        kind: AttendeeKind,
        scope: &Scope,
        day: NaiveDate,
    ) -> StoreResult<AttendanceTally>;
    async fn marks_tally(&self, scope: &Scope) -> StoreResult<MarksTally>;
    async fn student_attendance_tally(&self, student_id: u64) -> StoreResult<AttendanceTally>;

    // row listings, newest first
    async fn recent_attendance(
        &self,
        student_id: u64,
        limit: u32,
    ) -> StoreResult<Vec<AttendanceRecord>>;
    async fn student_marks(&self, student_id: u64) -> StoreResult<Vec<MarksRecord>>;
    async fn attendance_in(
        &self,
        scope: &Scope,
        range: &DateRange,
    ) -> StoreResult<Vec<AttendanceRecord>>;
    async fn marks_in(&self, scope: &Scope, range: &DateRange) -> StoreResult<Vec<MarksRecord>>;
    async fn audit_logs(&self, user_id: Option<u64>, limit: u32)
    -> StoreResult<Vec<AuditLogEntry>>;

    // writes
    /// Writes attendance rows, replacing any stored row for the same person
    /// and date. Returns the number of rows written.
    async fn insert_attendance(&self, rows: &[NewAttendance]) -> StoreResult<u64>;
    async fn insert_marks(&self, rows: &[NewMarks]) -> StoreResult<u64>;
    async fn insert_audit_log(&self, entry: &NewAuditLog) -> StoreResult<()>;
}
