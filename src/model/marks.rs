use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Credits granted per passed subject.
pub const CREDITS_PER_SUBJECT: i64 = 3;

/// Pass iff obtained is at least 40% of total. Compared as
/// `obtained * 5 >= total * 2` so exact thresholds stay exact in `f64`.
pub fn is_passing(marks_obtained: f64, total_marks: f64) -> bool {
    marks_obtained * 5.0 >= total_marks * 2.0
}

/// Per-subject grade point on a 10 point scale; 0 when the total is not positive.
pub fn grade_point(marks_obtained: f64, total_marks: f64) -> f64 {
    if total_marks > 0.0 {
        marks_obtained * 10.0 / total_marks
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MarksRecord {
    pub id: u64,
    pub student_id: u64,
    #[schema(example = "Data Structures")]
    pub subject: String,
    #[schema(example = 3)]
    pub semester: u8,
    #[schema(example = 35.0)]
    pub marks_obtained: f64,
    #[schema(example = 40.0)]
    pub total_marks: f64,
    pub grade: Option<String>,
    pub is_passed: bool,
    pub uploaded_by: u64,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
}

/// Insert payload for one marks row. There is no pass field: it is derived
/// from the marks on the way in.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMarks {
    pub student_id: u64,
    pub subject: String,
    pub semester: u8,
    pub marks_obtained: f64,
    pub total_marks: f64,
    pub grade: Option<String>,
    pub uploaded_by: u64,
}

impl NewMarks {
    pub fn is_passed(&self) -> bool {
        is_passing(self.marks_obtained, self.total_marks)
    }
}

/// Passed/total marks row counts.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct MarksTally {
    pub passed: i64,
    pub total: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forty_percent_is_a_pass() {
        assert!(is_passing(40.0, 100.0));
        assert!(is_passing(16.0, 40.0));
        assert!(!is_passing(39.5, 100.0));
        assert!(is_passing(0.0, 0.0));
    }

    #[test]
    fn grade_point_guards_zero_totals() {
        assert_eq!(grade_point(28.0, 40.0), 7.0);
        assert_eq!(grade_point(5.0, 0.0), 0.0);
    }
}
