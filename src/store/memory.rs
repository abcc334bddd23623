use std::sync::{
    RwLock,
    atomic::{AtomicBool, Ordering},
};

use chrono::{NaiveDate, NaiveDateTime, Utc};

use super::{AttendeeKind, DateRange, Store, StoreResult};
use crate::{
    model::{
        attendance::{AttendanceRecord, AttendanceSubject, AttendanceTally, NewAttendance},
        audit_log::{AuditLogEntry, NewAuditLog},
        college::College,
        department::Department,
        faculty::Faculty,
        marks::{MarksRecord, MarksTally, NewMarks},
        student::Student,
    },
    policy::Scope,
};

#[derive(Default)]
struct Tables {
    colleges: Vec<College>,
    departments: Vec<Department>,
    students: Vec<Student>,
    faculty: Vec<Faculty>,
    attendance: Vec<AttendanceRecord>,
    marks: Vec<MarksRecord>,
    audit_logs: Vec<AuditLogEntry>,
}

/// Vec-backed store with the same filtering semantics as the MySQL queries.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    fail_writes: AtomicBool,
    fail_audit: AtomicBool,
    fail_history: AtomicBool,
}

fn next_id(len: usize) -> u64 {
    len as u64 + 1
}

fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

fn injected() -> sqlx::Error {
    sqlx::Error::Protocol("injected failure".into())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    pub fn fail_audit_writes(&self) {
        self.fail_audit.store(true, Ordering::SeqCst);
    }

    /// Makes the per-student attendance and marks reads fail.
    pub fn fail_history_reads(&self) {
        self.fail_history.store(true, Ordering::SeqCst);
    }

    fn history_read(&self) -> StoreResult<()> {
        if self.fail_history.load(Ordering::SeqCst) {
            return Err(injected());
        }
        Ok(())
    }

    pub fn add_college(&self, name: &str, short_name: &str) -> u64 {
        let mut t = self.tables.write().unwrap();
        let id = next_id(t.colleges.len());
        t.colleges.push(College {
            id,
            name: name.into(),
            short_name: short_name.into(),
            address: None,
            principal_name: None,
            is_active: true,
            created_at: now(),
        });
        id
    }

    pub fn add_department(&self, college_id: u64, short_name: &str) -> u64 {
        let mut t = self.tables.write().unwrap();
        let id = next_id(t.departments.len());
        t.departments.push(Department {
            id,
            college_id,
            name: short_name.into(),
            short_name: short_name.into(),
            hod_id: None,
            is_active: true,
        });
        id
    }

    pub fn add_student(&self, admission_number: &str, college_id: u64, department_id: u64) -> u64 {
        let mut t = self.tables.write().unwrap();
        let id = next_id(t.students.len());
        t.students.push(Student {
            id,
            admission_number: admission_number.into(),
            first_name: "Student".into(),
            last_name: admission_number.into(),
            email: None,
            phone: None,
            college_id,
            department_id,
            year: 2,
            semester: 3,
            gender: None,
            is_active: true,
        });
        id
    }

    pub fn add_faculty(&self, faculty_number: &str, college_id: u64, department_id: u64) -> u64 {
        let mut t = self.tables.write().unwrap();
        let id = next_id(t.faculty.len());
        t.faculty.push(Faculty {
            id,
            faculty_number: faculty_number.into(),
            first_name: "Faculty".into(),
            last_name: faculty_number.into(),
            email: None,
            phone: None,
            college_id,
            department_id,
            designation: Some("Professor".into()),
            joined_year: 2015,
            is_active: true,
        });
        id
    }

    /// Inserts one attendance row directly, bypassing the write switch.
    pub fn mark(&self, subject: AttendanceSubject, date: NaiveDate, is_present: bool) {
        let mut t = self.tables.write().unwrap();
        push_attendance(
            &mut t,
            &NewAttendance {
                subject,
                date,
                is_present,
                remarks: None,
                uploaded_by: 1,
            },
        );
    }

    /// Inserts one marks row with an explicit creation time.
    pub fn grade(&self, student_id: u64, obtained: f64, total: f64, created_at: NaiveDateTime) {
        let mut t = self.tables.write().unwrap();
        let row = NewMarks {
            student_id,
            subject: format!("Subject {}", t.marks.len() + 1),
            semester: 3,
            marks_obtained: obtained,
            total_marks: total,
            grade: None,
            uploaded_by: 1,
        };
        push_marks(&mut t, &row, created_at);
    }

    pub fn attendance_rows(&self) -> Vec<AttendanceRecord> {
        self.tables.read().unwrap().attendance.clone()
    }

    pub fn marks_rows(&self) -> Vec<MarksRecord> {
        self.tables.read().unwrap().marks.clone()
    }

    pub fn audit_rows(&self) -> Vec<AuditLogEntry> {
        self.tables.read().unwrap().audit_logs.clone()
    }
}

fn push_attendance(t: &mut Tables, row: &NewAttendance) {
    let (student_id, faculty_id, staff_id) = row.subject.columns();
    let id = next_id(t.attendance.len());
    t.attendance.push(AttendanceRecord {
        id,
        student_id,
        faculty_id,
        staff_id,
        date: row.date,
        is_present: row.is_present,
        remarks: row.remarks.clone(),
        uploaded_by: row.uploaded_by,
        created_at: now(),
    });
}

/// One row per subject and date; a repeat replaces the earlier mark.
fn upsert_attendance(t: &mut Tables, row: &NewAttendance) {
    let (student_id, faculty_id, staff_id) = row.subject.columns();
    let existing = t.attendance.iter_mut().find(|r| {
        r.date == row.date
            && r.student_id == student_id
            && r.faculty_id == faculty_id
            && r.staff_id == staff_id
    });
    match existing {
        Some(r) => {
            r.is_present = row.is_present;
            r.remarks = row.remarks.clone();
            r.uploaded_by = row.uploaded_by;
        }
        None => push_attendance(t, row),
    }
}

fn push_marks(t: &mut Tables, row: &NewMarks, created_at: NaiveDateTime) {
    let id = next_id(t.marks.len());
    t.marks.push(MarksRecord {
        id,
        student_id: row.student_id,
        subject: row.subject.clone(),
        semester: row.semester,
        marks_obtained: row.marks_obtained,
        total_marks: row.total_marks,
        grade: row.grade.clone(),
        is_passed: row.is_passed(),
        uploaded_by: row.uploaded_by,
        created_at,
    });
}

impl Tables {
    /// Owning (college, department) of an attendance row, if it joins.
    fn attendance_owner(&self, row: &AttendanceRecord) -> Option<(u64, u64)> {
        match row.subject()? {
            AttendanceSubject::Student(id) => self
                .students
                .iter()
                .find(|s| s.id == id)
                .map(|s| (s.college_id, s.department_id)),
            AttendanceSubject::Faculty(id) => self
                .faculty
                .iter()
                .find(|f| f.id == id)
                .map(|f| (f.college_id, f.department_id)),
            AttendanceSubject::Staff(_) => None,
        }
    }

    fn student_in(&self, student_id: u64, scope: &Scope) -> bool {
        self.students
            .iter()
            .any(|s| s.id == student_id && scope.contains(s.college_id, s.department_id))
    }
}

fn tally<'a>(rows: impl Iterator<Item = &'a AttendanceRecord>) -> AttendanceTally {
    rows.fold(AttendanceTally::default(), |mut acc, r| {
        if r.is_present {
            acc.present += 1;
        } else {
            acc.absent += 1;
        }
        acc
    })
}

impl Store for MemoryStore {
    async fn active_colleges(&self, scope: &Scope) -> StoreResult<Vec<College>> {
        let t = self.tables.read().unwrap();
        Ok(t.colleges
            .iter()
            .filter(|c| c.is_active && scope.college_id.is_none_or(|id| id == c.id))
            .cloned()
            .collect())
    }

    async fn college(&self, id: u64) -> StoreResult<Option<College>> {
        let t = self.tables.read().unwrap();
        Ok(t.colleges.iter().find(|c| c.id == id).cloned())
    }

    async fn active_departments(&self, scope: &Scope) -> StoreResult<Vec<Department>> {
        let t = self.tables.read().unwrap();
        Ok(t.departments
            .iter()
            .filter(|d| d.is_active && scope.contains(d.college_id, d.id))
            .cloned()
            .collect())
    }

    async fn student_by_admission_number(
        &self,
        admission_number: &str,
    ) -> StoreResult<Option<Student>> {
        let t = self.tables.read().unwrap();
        Ok(t.students
            .iter()
            .find(|s| s.admission_number == admission_number)
            .cloned())
    }

    async fn faculty_by_number(&self, faculty_number: &str) -> StoreResult<Option<Faculty>> {
        let t = self.tables.read().unwrap();
        Ok(t.faculty
            .iter()
            .find(|f| f.faculty_number == faculty_number)
            .cloned())
    }

    async fn students(&self, scope: &Scope) -> StoreResult<Vec<Student>> {
        let t = self.tables.read().unwrap();
        Ok(t.students
            .iter()
            .filter(|s| s.is_active && scope.contains(s.college_id, s.department_id))
            .cloned()
            .collect())
    }

    async fn faculty(&self, scope: &Scope) -> StoreResult<Vec<Faculty>> {
        let t = self.tables.read().unwrap();
        Ok(t.faculty
            .iter()
            .filter(|f| f.is_active && scope.contains(f.college_id, f.department_id))
            .cloned()
            .collect())
    }

    async fn attendance_tally_on(
        &self,
        kind: AttendeeKind,
        scope: &Scope,
        day: NaiveDate,
    ) -> StoreResult<AttendanceTally> {
        let t = self.tables.read().unwrap();
        Ok(tally(t.attendance.iter().filter(|r| {
            let kind_matches = match (kind, r.subject()) {
                (AttendeeKind::Student, Some(AttendanceSubject::Student(_))) => true,
                (AttendeeKind::Faculty, Some(AttendanceSubject::Faculty(_))) => true,
                _ => false,
            };
            kind_matches
                && r.date == day
                && t.attendance_owner(r)
                    .is_some_and(|(c, d)| scope.contains(c, d))
        })))
    }

    async fn marks_tally(&self, scope: &Scope) -> StoreResult<MarksTally> {
        let t = self.tables.read().unwrap();
        Ok(t.marks
            .iter()
            .filter(|m| t.student_in(m.student_id, scope))
            .fold(MarksTally::default(), |mut acc, m| {
                acc.total += 1;
                if m.is_passed {
                    acc.passed += 1;
                }
                acc
            }))
    }

    async fn student_attendance_tally(&self, student_id: u64) -> StoreResult<AttendanceTally> {
        self.history_read()?;
        let t = self.tables.read().unwrap();
        Ok(tally(
            t.attendance
                .iter()
                .filter(|r| r.student_id == Some(student_id)),
        ))
    }

    async fn recent_attendance(
        &self,
        student_id: u64,
        limit: u32,
    ) -> StoreResult<Vec<AttendanceRecord>> {
        self.history_read()?;
        let t = self.tables.read().unwrap();
        let mut rows: Vec<_> = t
            .attendance
            .iter()
            .filter(|r| r.student_id == Some(student_id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn student_marks(&self, student_id: u64) -> StoreResult<Vec<MarksRecord>> {
        self.history_read()?;
        let t = self.tables.read().unwrap();
        let mut rows: Vec<_> = t
            .marks
            .iter()
            .filter(|m| m.student_id == student_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    async fn attendance_in(
        &self,
        scope: &Scope,
        range: &DateRange,
    ) -> StoreResult<Vec<AttendanceRecord>> {
        let t = self.tables.read().unwrap();
        let unscoped = *scope == Scope::ALL;
        let mut rows: Vec<_> = t
            .attendance
            .iter()
            .filter(|r| range.contains(r.date))
            .filter(|r| match t.attendance_owner(r) {
                Some((c, d)) => scope.contains(c, d),
                None => unscoped,
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    async fn marks_in(&self, scope: &Scope, range: &DateRange) -> StoreResult<Vec<MarksRecord>> {
        let t = self.tables.read().unwrap();
        let mut rows: Vec<_> = t
            .marks
            .iter()
            .filter(|m| t.student_in(m.student_id, scope) && range.contains(m.created_at.date()))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    async fn audit_logs(&self, user_id: Option<u64>, limit: u32) -> StoreResult<Vec<AuditLogEntry>> {
        let t = self.tables.read().unwrap();
        Ok(t.audit_logs
            .iter()
            .rev()
            .filter(|l| user_id.is_none_or(|u| u == l.user_id))
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn insert_attendance(&self, rows: &[NewAttendance]) -> StoreResult<u64> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(injected());
        }
        let mut t = self.tables.write().unwrap();
        for row in rows {
            upsert_attendance(&mut t, row);
        }
        Ok(rows.len() as u64)
    }

    async fn insert_marks(&self, rows: &[NewMarks]) -> StoreResult<u64> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(injected());
        }
        let mut t = self.tables.write().unwrap();
        for row in rows {
            push_marks(&mut t, row, now());
        }
        Ok(rows.len() as u64)
    }

    async fn insert_audit_log(&self, entry: &NewAuditLog) -> StoreResult<()> {
        if self.fail_audit.load(Ordering::SeqCst) {
            return Err(injected());
        }
        let mut t = self.tables.write().unwrap();
        let id = next_id(t.audit_logs.len());
        t.audit_logs.push(AuditLogEntry {
            id,
            user_id: entry.user_id,
            action: entry.action.clone(),
            entity_type: entry.entity_type.clone(),
            entity_id: entry.entity_id,
            details: sqlx::types::Json(entry.details.clone()),
            ip_address: entry.ip_address.clone(),
            user_agent: entry.user_agent.clone(),
            created_at: now(),
        });
        Ok(())
    }
}
