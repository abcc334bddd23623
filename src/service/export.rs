//! Scoped data export: one XLSX workbook per data kind, packed into a ZIP
//! archive alongside a JSON manifest.

use std::collections::BTreeMap;
use std::io::{Cursor, Write};

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use serde::{Deserialize, Serialize};
use serde_json::json;
use strum_macros::{AsRefStr, Display};
use utoipa::ToSchema;
use zip::{CompressionMethod, ZipWriter, write::FileOptions};

use crate::{
    auth::context::RequestContext,
    error::{AppError, AppResult},
    policy::{self, Scope},
    service::aggregation,
    store::{DateRange, Store},
};

pub const MANIFEST_ENTRY: &str = "manifest.json";
pub const EXPORT_FORMAT: &str = "campus-dashboard-export-v1";

pub const ATTENDANCE_TEMPLATE: &str = "attendance_template.xlsx";
pub const MARKS_TEMPLATE: &str = "marks_template.xlsx";
pub const TEMPLATE_README: &str = "README.txt";

const README: &str = "\
Upload templates

attendance_template.xlsx
  admissionNumber  student admission number (leave empty for faculty rows)
  facultyNumber    faculty number (leave empty for student rows)
  date             YYYY-MM-DD or a spreadsheet date cell
  isPresent        true/false or 1/0
  remarks          optional

  A second upload for the same person and date replaces the earlier mark.

marks_template.xlsx
  admissionNumber  student admission number
  subject          subject name
  semester         1 to 8
  marksObtained    0 up to totalMarks
  totalMarks       greater than 0
  grade            optional

Rows that fail validation are listed in the upload summary; the rest are saved.
Sheets may also be sent as CSV or JSON with the same column names.
";

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize, Display, AsRefStr, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ExportKind {
    Students,
    Faculty,
    Attendance,
    Marks,
    /// KPI values for the exported scope.
    Summary,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExportOptions {
    #[schema(example = json!(["students", "marks"]))]
    pub data_types: Vec<ExportKind>,
    pub college_id: Option<u64>,
    pub department_id: Option<u64>,
    #[serde(default)]
    pub date_range: DateRange,
}

pub struct ExportArchive {
    pub bytes: Vec<u8>,
    pub scope: Scope,
    pub row_counts: BTreeMap<String, usize>,
}

enum Cell {
    Text(String),
    Number(f64),
    Empty,
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<Option<String>> for Cell {
    fn from(s: Option<String>) -> Self {
        s.map_or(Cell::Empty, Cell::Text)
    }
}

fn num(n: impl Into<f64>) -> Cell {
    Cell::Number(n.into())
}

fn yes_no(b: bool) -> Cell {
    Cell::Text(if b { "Yes" } else { "No" }.to_string())
}

fn id(n: Option<u64>) -> Cell {
    n.map_or(Cell::Empty, |n| Cell::Number(n as f64))
}

struct Sheet {
    name: &'static str,
    headers: &'static [&'static str],
    rows: Vec<Vec<Cell>>,
}

async fn build_sheet<S: Store>(
    store: &S,
    kind: ExportKind,
    scope: &Scope,
    range: &DateRange,
    today: NaiveDate,
) -> AppResult<Sheet> {
    let sheet = match kind {
        ExportKind::Students => Sheet {
            name: "Students",
            headers: &[
                "Admission Number", "First Name", "Last Name", "Email", "Phone", "Year",
                "Semester", "Gender", "College ID", "Department ID",
            ],
            rows: store
                .students(scope)
                .await?
                .into_iter()
                .map(|s| {
                    vec![
                        s.admission_number.into(),
                        s.first_name.into(),
                        s.last_name.into(),
                        s.email.into(),
                        s.phone.into(),
                        num(s.year),
                        num(s.semester),
                        s.gender.into(),
                        id(Some(s.college_id)),
                        id(Some(s.department_id)),
                    ]
                })
                .collect(),
        },
        ExportKind::Faculty => Sheet {
            name: "Faculty",
            headers: &[
                "Faculty Number", "First Name", "Last Name", "Email", "Phone", "Designation",
                "Joined Year", "College ID", "Department ID",
            ],
            rows: store
                .faculty(scope)
                .await?
                .into_iter()
                .map(|f| {
                    vec![
                        f.faculty_number.into(),
                        f.first_name.into(),
                        f.last_name.into(),
                        f.email.into(),
                        f.phone.into(),
                        f.designation.into(),
                        num(f.joined_year),
                        id(Some(f.college_id)),
                        id(Some(f.department_id)),
                    ]
                })
                .collect(),
        },
        ExportKind::Attendance => Sheet {
            name: "Attendance",
            headers: &[
                "Date", "Student ID", "Faculty ID", "Staff ID", "Is Present", "Remarks",
                "Uploaded By", "Created At",
            ],
            rows: store
                .attendance_in(scope, range)
                .await?
                .into_iter()
                .map(|a| {
                    vec![
                        a.date.to_string().into(),
                        id(a.student_id),
                        id(a.faculty_id),
                        id(a.staff_id),
                        yes_no(a.is_present),
                        a.remarks.into(),
                        id(Some(a.uploaded_by)),
                        a.created_at.to_string().into(),
                    ]
                })
                .collect(),
        },
        ExportKind::Marks => Sheet {
            name: "Marks",
            headers: &[
                "Student ID", "Subject", "Semester", "Marks Obtained", "Total Marks", "Grade",
                "Is Passed", "Uploaded By", "Created At",
            ],
            rows: store
                .marks_in(scope, range)
                .await?
                .into_iter()
                .map(|m| {
                    vec![
                        id(Some(m.student_id)),
                        m.subject.into(),
                        num(m.semester),
                        num(m.marks_obtained),
                        num(m.total_marks),
                        m.grade.into(),
                        yes_no(m.is_passed),
                        id(Some(m.uploaded_by)),
                        m.created_at.to_string().into(),
                    ]
                })
                .collect(),
        },
        ExportKind::Summary => {
            let kpis = aggregation::dashboard_kpis(store, scope, today).await?;
            let metric = |name: &str, value: f64| vec![Cell::Text(name.to_string()), num(value)];
            Sheet {
                name: "Summary",
                headers: &["Metric", "Value"],
                rows: vec![
                    metric("Students Present Today", kpis.attendance.students_present as f64),
                    metric("Students Absent Today", kpis.attendance.students_absent as f64),
                    metric("Faculty Present Today", kpis.attendance.faculty_present as f64),
                    metric("Faculty Absent Today", kpis.attendance.faculty_absent as f64),
                    metric("Pass Percentage", kpis.pass_percentage),
                ],
            }
        }
    };

    Ok(sheet)
}

fn workbook_bytes(sheet: &Sheet) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let header_fmt = Format::new().set_bold();

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet.name)?;

    for (col, header) in sheet.headers.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *header, &header_fmt)?;
    }

    for (r, row) in sheet.rows.iter().enumerate() {
        let r = r as u32 + 1;
        for (c, cell) in row.iter().enumerate() {
            let c = c as u16;
            match cell {
                Cell::Text(s) => {
                    worksheet.write_string(r, c, s)?;
                }
                Cell::Number(n) => {
                    worksheet.write_number(r, c, *n)?;
                }
                Cell::Empty => {}
            }
        }
    }
    worksheet.autofit();

    workbook.save_to_buffer()
}

fn attendance_template() -> Sheet {
    Sheet {
        name: "Attendance",
        headers: &["admissionNumber", "facultyNumber", "date", "isPresent", "remarks"],
        rows: vec![
            vec![
                Cell::Text("21CSE001".into()),
                Cell::Empty,
                Cell::Text("2026-10-19".into()),
                num(1),
                Cell::Empty,
            ],
            vec![
                Cell::Empty,
                Cell::Text("FAC-001".into()),
                Cell::Text("2026-10-19".into()),
                Cell::Text("false".into()),
                Cell::Text("On leave".into()),
            ],
        ],
    }
}

fn marks_template() -> Sheet {
    Sheet {
        name: "Marks",
        headers: &[
            "admissionNumber", "subject", "semester", "marksObtained", "totalMarks", "grade",
        ],
        rows: vec![vec![
            Cell::Text("21CSE001".into()),
            Cell::Text("Data Structures".into()),
            num(3),
            num(72),
            num(100),
            Cell::Text("A".into()),
        ]],
    }
}

/// ZIP of blank upload workbooks, each with its header row and sample rows,
/// plus a README describing the columns.
pub fn templates() -> AppResult<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for (entry, sheet) in [
        (ATTENDANCE_TEMPLATE, attendance_template()),
        (MARKS_TEMPLATE, marks_template()),
    ] {
        let bytes = workbook_bytes(&sheet)
            .with_context(|| format!("failed to write {entry}"))?;
        zip.start_file(entry, opts)
            .with_context(|| format!("failed to start {entry}"))?;
        zip.write_all(&bytes)
            .with_context(|| format!("failed to write {entry}"))?;
    }

    zip.start_file(TEMPLATE_README, opts)
        .context("failed to start README entry")?;
    zip.write_all(README.as_bytes())
        .context("failed to write README entry")?;

    Ok(zip
        .finish()
        .context("failed to finish template archive")?
        .into_inner())
}

/// Builds the archive for the requested kinds within the requester's scope.
pub async fn export<S: Store>(
    store: &S,
    ctx: &RequestContext,
    options: &ExportOptions,
    today: NaiveDate,
) -> AppResult<ExportArchive> {
    let mut kinds = options.data_types.clone();
    kinds.sort();
    kinds.dedup();
    if kinds.is_empty() {
        return Err(AppError::validation("Select at least one data type to export"));
    }

    let scope = policy::resolve_scope(
        ctx,
        Scope {
            college_id: options.college_id,
            department_id: options.department_id,
        },
    )?;

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut row_counts = BTreeMap::new();

    for kind in kinds {
        let sheet = build_sheet(store, kind, &scope, &options.date_range, today).await?;
        let bytes = workbook_bytes(&sheet)
            .with_context(|| format!("failed to write {kind} workbook"))?;

        let entry = format!("{kind}.xlsx");
        zip.start_file(entry.as_str(), opts)
            .with_context(|| format!("failed to start {entry}"))?;
        zip.write_all(&bytes)
            .with_context(|| format!("failed to write {entry}"))?;

        row_counts.insert(kind.to_string(), sheet.rows.len());
    }

    let manifest = json!({
        "format": EXPORT_FORMAT,
        "exportedAt": Utc::now().to_rfc3339(),
        "exportedBy": ctx.username,
        "scope": scope,
        "dateRange": options.date_range,
        "rowCounts": row_counts,
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    let bytes = zip
        .finish()
        .context("failed to finish export archive")?
        .into_inner();

    Ok(ExportArchive {
        bytes,
        scope,
        row_counts,
    })
}
