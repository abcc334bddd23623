//! Dashboard KPIs and per-student academic summaries.

use chrono::NaiveDate;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    auth::context::RequestContext,
    error::{AppError, AppResult},
    model::{
        attendance::{AttendanceRecord, AttendanceTally},
        marks::{CREDITS_PER_SUBJECT, MarksRecord, MarksTally, grade_point},
        student::Student,
    },
    policy::{self, Scope, Target},
    store::{AttendeeKind, Store},
};

/// Rows returned in each of the profile's recent lists.
pub const RECENT_LIMIT: u32 = 10;

#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceStats {
    pub students_present: i64,
    pub students_absent: i64,
    pub faculty_present: i64,
    pub faculty_absent: i64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "studentsPresent": 412,
    "studentsAbsent": 37,
    "facultyPresent": 51,
    "facultyAbsent": 3,
    "passPercentage": 86.4
}))]
pub struct DashboardKpis {
    #[serde(flatten)]
    pub attendance: AttendanceStats,
    pub pass_percentage: f64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StudentProfile {
    pub student: Student,
    /// Percentage of attendance rows marked present.
    pub attendance_rate: f64,
    pub cgpa: f64,
    pub total_credits: i64,
    pub recent_attendance: Vec<AttendanceRecord>,
    pub recent_marks: Vec<MarksRecord>,
}

/// present / total × 100, or 0 with no rows.
pub fn attendance_rate(tally: AttendanceTally) -> f64 {
    match tally.total() {
        0 => 0.0,
        total => tally.present as f64 / total as f64 * 100.0,
    }
}

/// passed / total × 100, or 0 with no rows.
pub fn pass_rate(tally: MarksTally) -> f64 {
    if tally.total <= 0 {
        return 0.0;
    }
    (tally.passed as f64 / tally.total as f64 * 100.0).clamp(0.0, 100.0)
}

/// Mean per-subject grade point, or 0 with no rows.
pub fn cgpa(marks: &[MarksRecord]) -> f64 {
    if marks.is_empty() {
        return 0.0;
    }
    let sum: f64 = marks
        .iter()
        .map(|m| grade_point(m.marks_obtained, m.total_marks))
        .sum();
    sum / marks.len() as f64
}

pub fn total_credits(marks: &[MarksRecord]) -> i64 {
    marks.iter().filter(|m| m.is_passed).count() as i64 * CREDITS_PER_SUBJECT
}

/// Counts the day's explicit present/absent rows for students and faculty in
/// scope. People with no row for the day are in neither bucket.
pub async fn attendance_stats<S: Store>(
    store: &S,
    scope: &Scope,
    day: NaiveDate,
) -> AppResult<AttendanceStats> {
    let (students, faculty) = futures::try_join!(
        store.attendance_tally_on(AttendeeKind::Student, scope, day),
        store.attendance_tally_on(AttendeeKind::Faculty, scope, day),
    )?;

    Ok(AttendanceStats {
        students_present: students.present,
        students_absent: students.absent,
        faculty_present: faculty.present,
        faculty_absent: faculty.absent,
    })
}

pub async fn pass_percentage<S: Store>(store: &S, scope: &Scope) -> AppResult<f64> {
    Ok(pass_rate(store.marks_tally(scope).await?))
}

pub async fn dashboard_kpis<S: Store>(
    store: &S,
    scope: &Scope,
    day: NaiveDate,
) -> AppResult<DashboardKpis> {
    let (attendance, pass_percentage) = futures::try_join!(
        attendance_stats(store, scope, day),
        pass_percentage(store, scope),
    )?;

    tracing::debug!(?scope, %day, pass_percentage, "Computed dashboard KPIs");

    Ok(DashboardKpis {
        attendance,
        pass_percentage,
    })
}

async fn find_student<S: Store>(store: &S, admission_number: &str) -> AppResult<Student> {
    store
        .student_by_admission_number(admission_number)
        .await?
        .ok_or_else(|| AppError::not_found("Student not found"))
}

/// Runs the per-student sub-queries for an already resolved student.
async fn profile_for<S: Store>(store: &S, student: Student) -> AppResult<StudentProfile> {
    let (tally, recent_attendance, marks) = futures::try_join!(
        store.student_attendance_tally(student.id),
        store.recent_attendance(student.id, RECENT_LIMIT),
        store.student_marks(student.id),
    )?;

    let cgpa = cgpa(&marks);
    let total_credits = total_credits(&marks);
    let recent_marks = marks.into_iter().take(RECENT_LIMIT as usize).collect();

    Ok(StudentProfile {
        student,
        attendance_rate: attendance_rate(tally),
        cgpa,
        total_credits,
        recent_attendance,
        recent_marks,
    })
}

/// Unscoped profile lookup.
pub async fn student_profile<S: Store>(
    store: &S,
    admission_number: &str,
) -> AppResult<StudentProfile> {
    let student = find_student(store, admission_number).await?;
    profile_for(store, student).await
}

/// Profile lookup checked against the requester's reach. Nothing beyond the
/// student row is read unless the check passes.
pub async fn scoped_student_profile<S: Store>(
    store: &S,
    ctx: &RequestContext,
    admission_number: &str,
) -> AppResult<StudentProfile> {
    let student = find_student(store, admission_number).await?;

    policy::authorize(
        ctx,
        Target {
            college_id: student.college_id,
            department_id: student.department_id,
        },
    )?;

    profile_for(store, student).await
}
