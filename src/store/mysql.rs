use chrono::NaiveDate;
use sqlx::{MySql, MySqlPool, QueryBuilder};

use super::{AttendeeKind, DateRange, Store, StoreResult};
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
    utils::db_utils::{push_date_range, push_scope},
};

/// Rows per multi-row INSERT; keeps placeholder counts well under MySQL's limit.
const INSERT_CHUNK: usize = 500;

const ATTENDANCE_COLUMNS: &str = "a.id, a.student_id, a.faculty_id, a.staff_id, a.date, \
     a.is_present, a.remarks, a.uploaded_by, a.created_at";

const MARKS_COLUMNS: &str = "m.id, m.student_id, m.subject, m.semester, m.marks_obtained, \
     m.total_marks, m.grade, m.is_passed, m.uploaded_by, m.created_at";

#[derive(Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

impl Store for MySqlStore {
    async fn active_colleges(&self, scope: &Scope) -> StoreResult<Vec<College>> {
        let mut qb = QueryBuilder::<MySql>::new(
            "SELECT id, name, short_name, address, principal_name, is_active, created_at \
             FROM colleges c WHERE c.is_active = TRUE",
        );
        if let Some(college_id) = scope.college_id {
            qb.push(" AND c.id = ");
            qb.push_bind(college_id);
        }
        qb.push(" ORDER BY c.name");

        qb.build_query_as::<College>().fetch_all(&self.pool).await
    }

    async fn college(&self, id: u64) -> StoreResult<Option<College>> {
        sqlx::query_as::<_, College>(
            r#"
            SELECT id, name, short_name, address, principal_name, is_active, created_at
            FROM colleges
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn active_departments(&self, scope: &Scope) -> StoreResult<Vec<Department>> {
        let mut qb = QueryBuilder::<MySql>::new(
            "SELECT id, college_id, name, short_name, hod_id, is_active \
             FROM departments d WHERE d.is_active = TRUE",
        );
        if let Some(college_id) = scope.college_id {
            qb.push(" AND d.college_id = ");
            qb.push_bind(college_id);
        }
        if let Some(department_id) = scope.department_id {
            qb.push(" AND d.id = ");
            qb.push_bind(department_id);
        }
        qb.push(" ORDER BY d.name");

        qb.build_query_as::<Department>().fetch_all(&self.pool).await
    }

    async fn student_by_admission_number(
        &self,
        admission_number: &str,
    ) -> StoreResult<Option<Student>> {
        sqlx::query_as::<_, Student>(
            r#"
            SELECT id, admission_number, first_name, last_name, email, phone,
                   college_id, department_id, year, semester, gender, is_active
            FROM students
            WHERE admission_number = ?
            "#,
        )
        .bind(admission_number)
        .fetch_optional(&self.pool)
        .await
    }

    async fn faculty_by_number(&self, faculty_number: &str) -> StoreResult<Option<Faculty>> {
        sqlx::query_as::<_, Faculty>(
            r#"
            SELECT id, faculty_number, first_name, last_name, email, phone,
                   college_id, department_id, designation, joined_year, is_active
            FROM faculty
            WHERE faculty_number = ?
            "#,
        )
        .bind(faculty_number)
        .fetch_optional(&self.pool)
        .await
    }

    async fn students(&self, scope: &Scope) -> StoreResult<Vec<Student>> {
        let mut qb = QueryBuilder::<MySql>::new(
            "SELECT s.id, s.admission_number, s.first_name, s.last_name, s.email, s.phone, \
             s.college_id, s.department_id, s.year, s.semester, s.gender, s.is_active \
             FROM students s WHERE s.is_active = TRUE",
        );
        push_scope(&mut qb, scope, "s");
        qb.push(" ORDER BY s.admission_number");

        qb.build_query_as::<Student>().fetch_all(&self.pool).await
    }

    async fn faculty(&self, scope: &Scope) -> StoreResult<Vec<Faculty>> {
        let mut qb = QueryBuilder::<MySql>::new(
            "SELECT f.id, f.faculty_number, f.first_name, f.last_name, f.email, f.phone, \
             f.college_id, f.department_id, f.designation, f.joined_year, f.is_active \
             FROM faculty f WHERE f.is_active = TRUE",
        );
        push_scope(&mut qb, scope, "f");
        qb.push(" ORDER BY f.faculty_number");

        qb.build_query_as::<Faculty>().fetch_all(&self.pool).await
    }

    async fn attendance_tally_on(
        &self,
        kind: AttendeeKind,
        scope: &Scope,
        day: NaiveDate,
    ) -> StoreResult<AttendanceTally> {
        let join = match kind {
            AttendeeKind::Student => "JOIN students e ON a.student_id = e.id",
            AttendeeKind::Faculty => "JOIN faculty e ON a.faculty_id = e.id",
        };

        let mut qb = QueryBuilder::<MySql>::new(format!(
            "SELECT COUNT(CASE WHEN a.is_present THEN 1 END) AS present, \
             COUNT(CASE WHEN NOT a.is_present THEN 1 END) AS absent \
             FROM attendance a {join} WHERE a.date = "
        ));
        qb.push_bind(day);
        push_scope(&mut qb, scope, "e");

        let (present, absent): (i64, i64) =
            qb.build_query_as().fetch_one(&self.pool).await?;

        Ok(AttendanceTally { present, absent })
    }

    async fn marks_tally(&self, scope: &Scope) -> StoreResult<MarksTally> {
        let mut qb = QueryBuilder::<MySql>::new(
            "SELECT COUNT(CASE WHEN m.is_passed THEN 1 END) AS passed, COUNT(*) AS total \
             FROM marks m JOIN students s ON m.student_id = s.id WHERE 1 = 1",
        );
        push_scope(&mut qb, scope, "s");

        let (passed, total): (i64, i64) = qb.build_query_as().fetch_one(&self.pool).await?;

        Ok(MarksTally { passed, total })
    }

    async fn student_attendance_tally(&self, student_id: u64) -> StoreResult<AttendanceTally> {
        let (present, absent): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(CASE WHEN is_present THEN 1 END) AS present,
                   COUNT(CASE WHEN NOT is_present THEN 1 END) AS absent
            FROM attendance
            WHERE student_id = ?
            "#,
        )
        .bind(student_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(AttendanceTally { present, absent })
    }

    async fn recent_attendance(
        &self,
        student_id: u64,
        limit: u32,
    ) -> StoreResult<Vec<AttendanceRecord>> {
        sqlx::query_as::<_, AttendanceRecord>(&format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance a \
             WHERE a.student_id = ? ORDER BY a.date DESC, a.id DESC LIMIT ?"
        ))
        .bind(student_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    async fn student_marks(&self, student_id: u64) -> StoreResult<Vec<MarksRecord>> {
        sqlx::query_as::<_, MarksRecord>(&format!(
            "SELECT {MARKS_COLUMNS} FROM marks m \
             WHERE m.student_id = ? ORDER BY m.created_at DESC, m.id DESC"
        ))
        .bind(student_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn attendance_in(
        &self,
        scope: &Scope,
        range: &DateRange,
    ) -> StoreResult<Vec<AttendanceRecord>> {
        // Staff rows belong to no department, so they are only exported unscoped.
        let mut qb = QueryBuilder::<MySql>::new(format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance a \
             LEFT JOIN students s ON a.student_id = s.id \
             LEFT JOIN faculty f ON a.faculty_id = f.id \
             WHERE 1 = 1"
        ));
        if let Some(college_id) = scope.college_id {
            qb.push(" AND COALESCE(s.college_id, f.college_id) = ");
            qb.push_bind(college_id);
        }
        if let Some(department_id) = scope.department_id {
            qb.push(" AND COALESCE(s.department_id, f.department_id) = ");
            qb.push_bind(department_id);
        }
        push_date_range(&mut qb, range, "a.date");
        qb.push(" ORDER BY a.date DESC, a.id DESC");

        qb.build_query_as::<AttendanceRecord>()
            .fetch_all(&self.pool)
            .await
    }

    async fn marks_in(&self, scope: &Scope, range: &DateRange) -> StoreResult<Vec<MarksRecord>> {
        let mut qb = QueryBuilder::<MySql>::new(format!(
            "SELECT {MARKS_COLUMNS} FROM marks m \
             JOIN students s ON m.student_id = s.id WHERE 1 = 1"
        ));
        push_scope(&mut qb, scope, "s");
        push_date_range(&mut qb, range, "m.created_at");
        qb.push(" ORDER BY m.created_at DESC, m.id DESC");

        qb.build_query_as::<MarksRecord>().fetch_all(&self.pool).await
    }

    async fn audit_logs(&self, user_id: Option<u64>, limit: u32) -> StoreResult<Vec<AuditLogEntry>> {
        let mut qb = QueryBuilder::<MySql>::new(
            "SELECT id, user_id, action, entity_type, entity_id, details, ip_address, \
             user_agent, created_at FROM audit_logs l WHERE 1 = 1",
        );
        if let Some(user_id) = user_id {
            qb.push(" AND l.user_id = ");
            qb.push_bind(user_id);
        }
        qb.push(" ORDER BY l.created_at DESC, l.id DESC LIMIT ");
        qb.push_bind(limit);

        qb.build_query_as::<AuditLogEntry>()
            .fetch_all(&self.pool)
            .await
    }

    async fn insert_attendance(&self, rows: &[NewAttendance]) -> StoreResult<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut written = 0;

        for chunk in rows.chunks(INSERT_CHUNK) {
            let mut qb = QueryBuilder::<MySql>::new(
                "INSERT INTO attendance \
                 (student_id, faculty_id, staff_id, date, is_present, remarks, uploaded_by) ",
            );
            qb.push_values(chunk, |mut b, row| {
                let (student_id, faculty_id, staff_id) = row.subject.columns();
                b.push_bind(student_id)
                    .push_bind(faculty_id)
                    .push_bind(staff_id)
                    .push_bind(row.date)
                    .push_bind(row.is_present)
                    .push_bind(row.remarks.clone())
                    .push_bind(row.uploaded_by);
            });
            // A repeated (person, date) replaces the stored mark.
            qb.push(
                " ON DUPLICATE KEY UPDATE is_present = VALUES(is_present), \
                 remarks = VALUES(remarks), uploaded_by = VALUES(uploaded_by)",
            );

            // rows_affected counts an update as 2 and an unchanged row as 0.
            qb.build().execute(&mut *tx).await?;
            written += chunk.len() as u64;
        }

        tx.commit().await?;
        Ok(written)
    }

    async fn insert_marks(&self, rows: &[NewMarks]) -> StoreResult<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for chunk in rows.chunks(INSERT_CHUNK) {
            let mut qb = QueryBuilder::<MySql>::new(
                "INSERT INTO marks \
                 (student_id, subject, semester, marks_obtained, total_marks, grade, is_passed, uploaded_by) ",
            );
            qb.push_values(chunk, |mut b, row| {
                b.push_bind(row.student_id)
                    .push_bind(row.subject.clone())
                    .push_bind(row.semester)
                    .push_bind(row.marks_obtained)
                    .push_bind(row.total_marks)
                    .push_bind(row.grade.clone())
                    .push_bind(row.is_passed())
                    .push_bind(row.uploaded_by);
            });

            inserted += qb.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn insert_audit_log(&self, entry: &NewAuditLog) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs
                (user_id, action, entity_type, entity_id, details, ip_address, user_agent)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.user_id)
        .bind(&entry.action)
        .bind(&entry.entity_type)
        .bind(entry.entity_id)
        .bind(sqlx::types::Json(&entry.details))
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
