//! Bulk attendance and marks import.
//!
//! Rows are validated one at a time. Bad rows are reported and skipped; the
//! valid remainder goes to the store as one batch.

use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

use crate::{
    auth::context::RequestContext,
    error::AppResult,
    model::{
        attendance::{AttendanceSubject, NewAttendance},
        marks::NewMarks,
    },
    policy::{self, Scope},
    store::Store,
    utils::sheet::SheetRow,
};

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct RowError {
    /// 1-based data row number.
    pub row: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub records_processed: usize,
    pub records_created: usize,
    pub errors: Vec<RowError>,
}

/// Accepts `true`/`false`, `"true"`/`"false"` in any case, and `1`/`0`.
pub fn normalize_presence(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        Value::Number(n) => match n.as_f64() {
            Some(x) if x == 1.0 => Some(true),
            Some(x) if x == 0.0 => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Spreadsheet epoch for serial day numbers.
fn excel_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1899, 12, 30).unwrap_or_default()
}

/// `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS`, RFC 3339, or
/// a spreadsheet serial day number.
pub fn parse_date(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .or_else(|| {
                    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                        .ok()
                        .map(|dt| dt.date())
                })
                .or_else(|| {
                    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
                        .ok()
                        .map(|dt| dt.date())
                })
                .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))
        }
        Value::Number(n) => {
            let serial = n.as_f64()?;
            if !(1.0..=2_958_465.0).contains(&serial) {
                return None;
            }
            excel_epoch().checked_add_signed(Duration::days(serial.floor() as i64))
        }
        _ => None,
    }
}

/// A finite number given as a number or a numeric string.
fn number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

/// Non-empty trimmed text; integral numbers are rendered back to text.
fn text(row: &SheetRow, key: &str) -> Option<String> {
    match row.get(key)? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn row_error(errors: &mut Vec<RowError>, row: usize, message: impl Into<String>) {
    errors.push(RowError {
        row,
        message: format!("Row {}: {}", row, message.into()),
    });
}

/// Per-batch lookup cache so repeated ids hit the store once.
struct Resolver<'a, S> {
    store: &'a S,
    scope: Scope,
    students: HashMap<String, Option<(u64, bool)>>,
    faculty: HashMap<String, Option<(u64, bool)>>,
}

/// Outcome of resolving a person: id and whether they are inside scope.
type Resolved = Option<(u64, bool)>;

impl<'a, S: Store> Resolver<'a, S> {
    fn new(store: &'a S, scope: Scope) -> Self {
        Self {
            store,
            scope,
            students: HashMap::new(),
            faculty: HashMap::new(),
        }
    }

    async fn student(&mut self, admission_number: &str) -> AppResult<Resolved> {
        if let Some(hit) = self.students.get(admission_number) {
            return Ok(*hit);
        }
        let found = self
            .store
            .student_by_admission_number(admission_number)
            .await?
            .map(|s| (s.id, self.scope.contains(s.college_id, s.department_id)));
        self.students.insert(admission_number.to_string(), found);
        Ok(found)
    }

    async fn faculty(&mut self, faculty_number: &str) -> AppResult<Resolved> {
        if let Some(hit) = self.faculty.get(faculty_number) {
            return Ok(*hit);
        }
        let found = self
            .store
            .faculty_by_number(faculty_number)
            .await?
            .map(|f| (f.id, self.scope.contains(f.college_id, f.department_id)));
        self.faculty.insert(faculty_number.to_string(), found);
        Ok(found)
    }
}

async fn attendance_row<S: Store>(
    resolver: &mut Resolver<'_, S>,
    row: &SheetRow,
    uploaded_by: u64,
) -> AppResult<Result<NewAttendance, String>> {
    let subject = match (text(row, "admissionNumber"), text(row, "facultyNumber")) {
        (Some(_), Some(_)) => {
            return Ok(Err(
                "Row names both an admission number and a faculty number".into()
            ));
        }
        (None, None) => {
            return Ok(Err("Missing admissionNumber or facultyNumber".into()));
        }
        (Some(number), None) => match resolver.student(&number).await? {
            None => {
                return Ok(Err(format!(
                    "Student not found with admission number {number}"
                )));
            }
            Some((_, false)) => {
                return Ok(Err(format!("Student {number} is outside your scope")));
            }
            Some((id, true)) => AttendanceSubject::Student(id),
        },
        (None, Some(number)) => match resolver.faculty(&number).await? {
            None => {
                return Ok(Err(format!(
                    "Faculty not found with faculty number {number}"
                )));
            }
            Some((_, false)) => {
                return Ok(Err(format!("Faculty {number} is outside your scope")));
            }
            Some((id, true)) => AttendanceSubject::Faculty(id),
        },
    };

    let Some(date) = row.get("date").and_then(parse_date) else {
        return Ok(Err("Invalid or missing date".into()));
    };
    let Some(is_present) = row.get("isPresent").and_then(normalize_presence) else {
        return Ok(Err("isPresent must be true/false or 1/0".into()));
    };

    Ok(Ok(NewAttendance {
        subject,
        date,
        is_present,
        remarks: text(row, "remarks"),
        uploaded_by,
    }))
}

async fn marks_row<S: Store>(
    resolver: &mut Resolver<'_, S>,
    row: &SheetRow,
    uploaded_by: u64,
) -> AppResult<Result<NewMarks, String>> {
    let Some(admission_number) = text(row, "admissionNumber") else {
        return Ok(Err("Missing admissionNumber".into()));
    };
    let student_id = match resolver.student(&admission_number).await? {
        None => {
            return Ok(Err(format!(
                "Student not found with admission number {admission_number}"
            )));
        }
        Some((_, false)) => {
            return Ok(Err(format!(
                "Student {admission_number} is outside your scope"
            )));
        }
        Some((id, true)) => id,
    };

    let Some(subject) = text(row, "subject") else {
        return Ok(Err("Missing subject".into()));
    };
    let semester = match row.get("semester").and_then(number) {
        Some(s) if s.fract() == 0.0 && (1.0..=8.0).contains(&s) => s as u8,
        _ => return Ok(Err("semester must be a whole number from 1 to 8".into())),
    };
    let (Some(marks_obtained), Some(total_marks)) = (
        row.get("marksObtained").and_then(number),
        row.get("totalMarks").and_then(number),
    ) else {
        return Ok(Err("marksObtained and totalMarks must be numbers".into()));
    };
    if total_marks <= 0.0 {
        return Ok(Err("totalMarks must be greater than zero".into()));
    }
    if !(0.0..=total_marks).contains(&marks_obtained) {
        return Ok(Err("marksObtained must be between 0 and totalMarks".into()));
    }

    Ok(Ok(NewMarks {
        student_id,
        subject,
        semester,
        marks_obtained,
        total_marks,
        grade: text(row, "grade"),
        uploaded_by,
    }))
}

pub async fn import_attendance<S: Store>(
    store: &S,
    ctx: &RequestContext,
    rows: &[SheetRow],
) -> AppResult<ImportSummary> {
    let mut resolver = Resolver::new(store, policy::reach_scope(ctx)?);
    let mut valid = Vec::with_capacity(rows.len());
    let mut errors = Vec::new();

    for (i, row) in rows.iter().enumerate() {
        match attendance_row(&mut resolver, row, ctx.actor_id).await? {
            Ok(record) => valid.push(record),
            Err(message) => row_error(&mut errors, i + 1, message),
        }
    }

    let created = store.insert_attendance(&valid).await?;

    tracing::info!(
        actor_id = ctx.actor_id,
        processed = rows.len(),
        created,
        errors = errors.len(),
        "Attendance import finished"
    );

    Ok(ImportSummary {
        records_processed: rows.len(),
        records_created: created as usize,
        errors,
    })
}

pub async fn import_marks<S: Store>(
    store: &S,
    ctx: &RequestContext,
    rows: &[SheetRow],
) -> AppResult<ImportSummary> {
    let mut resolver = Resolver::new(store, policy::reach_scope(ctx)?);
    let mut valid = Vec::with_capacity(rows.len());
    let mut errors = Vec::new();

    for (i, row) in rows.iter().enumerate() {
        match marks_row(&mut resolver, row, ctx.actor_id).await? {
            Ok(record) => valid.push(record),
            Err(message) => row_error(&mut errors, i + 1, message),
        }
    }

    let created = store.insert_marks(&valid).await?;

    tracing::info!(
        actor_id = ctx.actor_id,
        processed = rows.len(),
        created,
        errors = errors.len(),
        "Marks import finished"
    );

    Ok(ImportSummary {
        records_processed: rows.len(),
        records_created: created as usize,
        errors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::context::fixtures::{chairman, hod, staff},
        error::AppError,
        store::memory::MemoryStore,
    };
    use serde_json::json;

    fn rows(value: Value) -> Vec<SheetRow> {
        serde_json::from_value(value).unwrap()
    }

    fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        let college = store.add_college("Bharat Institute", "BIET");
        let cse = store.add_department(college, "CSE");
        let ece = store.add_department(college, "ECE");
        store.add_student("21CSE001", college, cse);
        store.add_student("21ECE001", college, ece);
        store.add_faculty("FAC-1", college, cse);
        store
    }

    #[test]
    fn presence_accepts_bools_strings_and_bits() {
        for v in [json!(true), json!("true"), json!(" TRUE "), json!(1), json!(1.0)] {
            assert_eq!(normalize_presence(&v), Some(true), "{v}");
        }
        for v in [json!(false), json!("false"), json!(0)] {
            assert_eq!(normalize_presence(&v), Some(false), "{v}");
        }
        for v in [json!("yes"), json!(2), json!(null), json!("1")] {
            assert_eq!(normalize_presence(&v), None, "{v}");
        }
    }

    #[test]
    fn dates_accept_common_sheet_forms() {
        let expected = NaiveDate::from_ymd_opt(2026, 10, 19);
        assert_eq!(parse_date(&json!("2026-10-19")), expected);
        assert_eq!(parse_date(&json!("2026-10-19 08:30:00")), expected);
        assert_eq!(parse_date(&json!("2026-10-19T08:30:00+05:30")), expected);
        assert_eq!(parse_date(&json!(46314)), expected);
        assert_eq!(parse_date(&json!("19th October")), None);
        assert_eq!(parse_date(&json!(-4)), None);
    }

    #[actix_web::test]
    async fn attendance_rows_are_created_or_reported() {
        let store = seeded();
        let sheet = rows(json!([
            {"admissionNumber": "21CSE001", "date": "2026-10-19", "isPresent": "true"},
            {"admissionNumber": "21CSE001", "date": "2026-10-18", "isPresent": 1},
            {"facultyNumber": "FAC-1", "date": "2026-10-19", "isPresent": false, "remarks": "leave"},
            {"admissionNumber": "UNKNOWN", "date": "2026-10-19", "isPresent": true},
            {"admissionNumber": "21CSE001", "date": "not a date", "isPresent": true},
            {"admissionNumber": "21CSE001", "facultyNumber": "FAC-1", "date": "2026-10-19", "isPresent": true},
        ]));

        let summary = import_attendance(&store, &chairman(), &sheet).await.unwrap();

        assert_eq!(summary.records_processed, 6);
        assert_eq!(summary.records_created, 3);
        assert_eq!(
            summary.errors.iter().map(|e| e.row).collect::<Vec<_>>(),
            vec![4, 5, 6]
        );
        assert!(summary.errors[0].message.contains("Student not found"));

        let stored = store.attendance_rows();
        assert!(stored[0].is_present && stored[1].is_present);
        assert_eq!(stored[2].subject(), Some(AttendanceSubject::Faculty(1)));
        assert_eq!(stored[2].remarks.as_deref(), Some("leave"));
    }

    #[actix_web::test]
    async fn reuploading_a_day_replaces_the_earlier_mark() {
        let store = seeded();
        let day = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let first = rows(json!([
            {"admissionNumber": "21CSE001", "date": "2026-10-19", "isPresent": true},
        ]));
        let corrected = rows(json!([
            {"admissionNumber": "21CSE001", "date": "2026-10-19", "isPresent": true},
            {"admissionNumber": "21CSE001", "date": "2026-10-19", "isPresent": false, "remarks": "late correction"},
        ]));

        import_attendance(&store, &chairman(), &first).await.unwrap();
        let summary = import_attendance(&store, &chairman(), &corrected).await.unwrap();
        assert_eq!(summary.records_created, 2);
        assert!(summary.errors.is_empty());

        let stored = store.attendance_rows();
        assert_eq!(stored.len(), 1);
        assert!(!stored[0].is_present);
        assert_eq!(stored[0].remarks.as_deref(), Some("late correction"));

        let stats = crate::service::aggregation::attendance_stats(&store, &Scope::college(1), day)
            .await
            .unwrap();
        assert_eq!(stats.students_present + stats.students_absent, 1);
        assert_eq!(stats.students_absent, 1);
    }

    #[actix_web::test]
    async fn rows_outside_the_uploaders_scope_are_rejected() {
        let store = seeded();
        let sheet = rows(json!([
            {"admissionNumber": "21CSE001", "date": "2026-10-19", "isPresent": true},
            {"admissionNumber": "21ECE001", "date": "2026-10-19", "isPresent": true},
        ]));

        let summary = import_attendance(&store, &hod(1, 1), &sheet).await.unwrap();

        assert_eq!(summary.records_created, 1);
        assert!(summary.errors[0].message.contains("outside your scope"));
    }

    #[actix_web::test]
    async fn marks_derive_pass_and_skip_bad_rows() {
        let store = seeded();
        let sheet = rows(json!([
            {"admissionNumber": "21CSE001", "subject": "Maths", "semester": 3, "marksObtained": 40, "totalMarks": 100},
            {"admissionNumber": "21CSE001", "subject": "Physics", "semester": "3", "marksObtained": "39.5", "totalMarks": "100", "grade": "F"},
            {"admissionNumber": "21CSE001", "subject": "Chemistry", "semester": 3, "marksObtained": "abc", "totalMarks": 100},
            {"admissionNumber": "21CSE001", "subject": "Biology", "semester": 9, "marksObtained": 10, "totalMarks": 100},
            {"admissionNumber": "21CSE001", "subject": "Art", "semester": 1, "marksObtained": 120, "totalMarks": 100},
            {"admissionNumber": "GHOST", "subject": "Maths", "semester": 1, "marksObtained": 50, "totalMarks": 100},
        ]));

        let summary = import_marks(&store, &staff(1), &sheet).await.unwrap();

        assert_eq!(summary.records_processed, 6);
        assert_eq!(summary.records_created, 2);
        assert_eq!(summary.errors.len(), 4);

        let stored = store.marks_rows();
        assert!(stored[0].is_passed);
        assert!(!stored[1].is_passed);
        assert_eq!(stored[1].grade.as_deref(), Some("F"));
    }

    #[actix_web::test]
    async fn empty_sheet_is_a_zero_summary() {
        let store = seeded();
        let summary = import_marks(&store, &chairman(), &[]).await.unwrap();
        assert_eq!(summary, ImportSummary::default());
    }

    #[actix_web::test]
    async fn failed_batch_write_fails_the_request() {
        let store = seeded();
        store.fail_writes();
        let sheet = rows(json!([
            {"admissionNumber": "21CSE001", "date": "2026-10-19", "isPresent": true},
        ]));

        let err = import_attendance(&store, &chairman(), &sheet).await.unwrap_err();
        assert!(matches!(err, AppError::Store(_)));
    }
}
