use sqlx::{MySql, QueryBuilder};

use crate::{policy::Scope, store::DateRange};

/// Appends ` AND <alias>.college_id = ?` / ` AND <alias>.department_id = ?`
/// for each component the scope restricts. The builder must already hold a
/// `WHERE` clause.
pub fn push_scope(qb: &mut QueryBuilder<'_, MySql>, scope: &Scope, alias: &str) {
    if let Some(college_id) = scope.college_id {
        qb.push(format!(" AND {alias}.college_id = "));
        qb.push_bind(college_id);
    }
    if let Some(department_id) = scope.department_id {
        qb.push(format!(" AND {alias}.department_id = "));
        qb.push_bind(department_id);
    }
}

/// Appends inclusive bounds on a `DATE` (or date-castable) column.
pub fn push_date_range(qb: &mut QueryBuilder<'_, MySql>, range: &DateRange, column: &str) {
    if let Some(start) = range.start {
        qb.push(format!(" AND DATE({column}) >= "));
        qb.push_bind(start);
    }
    if let Some(end) = range.end {
        qb.push(format!(" AND DATE({column}) <= "));
        qb.push_bind(end);
    }
}
