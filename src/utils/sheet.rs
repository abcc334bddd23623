use std::io::Cursor;

use anyhow::{Context, Result, anyhow, bail};
use calamine::{Data, Reader, open_workbook_auto_from_rs};
use csv::{ReaderBuilder, Trim};
use serde_json::{Map, Number, Value};

/// One spreadsheet row keyed by its header cells.
pub type SheetRow = Map<String, Value>;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SheetFormat {
    Csv,
    Json,
    /// First worksheet of an `.xlsx` / `.xls` / `.ods` workbook.
    Workbook,
}

impl SheetFormat {
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type.split(';').next()?.trim().to_ascii_lowercase();
        match essence.as_str() {
            "text/csv" | "application/csv" | "text/plain" => Some(SheetFormat::Csv),
            "application/json" => Some(SheetFormat::Json),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            | "application/vnd.ms-excel"
            | "application/vnd.oasis.opendocument.spreadsheet" => Some(SheetFormat::Workbook),
            _ => None,
        }
    }

    /// Format of a multipart file part, by extension.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let (_, ext) = filename.rsplit_once('.')?;
        match ext.to_ascii_lowercase().as_str() {
            "csv" => Some(SheetFormat::Csv),
            "json" => Some(SheetFormat::Json),
            "xlsx" | "xls" | "ods" => Some(SheetFormat::Workbook),
            _ => None,
        }
    }

    pub fn parse(self, body: &[u8]) -> Result<Vec<SheetRow>> {
        match self {
            SheetFormat::Csv => parse_csv(body),
            SheetFormat::Json => parse_json(body),
            SheetFormat::Workbook => parse_workbook(body),
        }
    }
}

/// Plain decimal literal without a redundant leading zero, e.g. `12`, `-3.5`,
/// `0.25`. Codes such as `007` stay text.
fn looks_numeric(cell: &str) -> bool {
    let digits = cell.strip_prefix('-').unwrap_or(cell);
    let (int, frac) = match digits.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (digits, None),
    };

    !int.is_empty()
        && int.bytes().all(|b| b.is_ascii_digit())
        && (int == "0" || !int.starts_with('0'))
        && frac.is_none_or(|f| !f.is_empty() && f.bytes().all(|b| b.is_ascii_digit()))
}

/// Integers are inferred only when they fit `i64`; longer digit runs stay
/// text so identifiers keep every digit.
fn cell_value(cell: &str) -> Value {
    if looks_numeric(cell) {
        if !cell.contains('.') {
            if let Ok(i) = cell.parse::<i64>() {
                return Value::Number(i.into());
            }
        } else if let Some(n) = cell.parse::<f64>().ok().and_then(Number::from_f64) {
            return Value::Number(n);
        }
    }
    Value::String(cell.to_string())
}

/// Header row gives the keys; empty cells are left out of the row.
pub fn parse_csv(body: &[u8]) -> Result<Vec<SheetRow>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(body);

    let headers = reader.headers().context("failed to read CSV header row")?.clone();

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("failed to read CSV row {}", i + 1))?;
        let row: SheetRow = headers
            .iter()
            .zip(record.iter())
            .filter(|(key, cell)| !key.is_empty() && !cell.is_empty())
            .map(|(key, cell)| (key.to_string(), cell_value(cell)))
            .collect();
        rows.push(row);
    }

    Ok(rows)
}

/// A JSON array whose entries are all objects.
pub fn parse_json(body: &[u8]) -> Result<Vec<SheetRow>> {
    let value: Value = serde_json::from_slice(body).context("body is not valid JSON")?;
    let Value::Array(items) = value else {
        bail!("expected a JSON array of row objects");
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Object(row) => Ok(row),
            _ => Err(anyhow!("row {} is not a JSON object", i + 1)),
        })
        .collect()
}

fn workbook_value(cell: &Data) -> Option<Value> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| Value::String(s.to_string()))
        }
        Data::Bool(b) => Some(Value::Bool(*b)),
        Data::Int(i) => Some(Value::Number((*i).into())),
        // Spreadsheets store every number as a float; whole ones come back as integers.
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => {
            Some(Value::Number((*f as i64).into()))
        }
        Data::Float(f) => Number::from_f64(*f).map(Value::Number),
        // Date cells become serial day numbers.
        Data::DateTime(dt) => Number::from_f64(dt.as_f64()).map(Value::Number),
    }
}

/// Header row of the first worksheet gives the keys; blank cells and fully
/// blank rows are left out.
pub fn parse_workbook(body: &[u8]) -> Result<Vec<SheetRow>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(body.to_vec()))
        .map_err(|e| anyhow!("body is not a readable workbook: {e}"))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| anyhow!("workbook has no worksheets"))?
        .map_err(|e| anyhow!("failed to read the first worksheet: {e}"))?;

    let mut lines = range.rows();
    let Some(header) = lines.next() else {
        return Ok(Vec::new());
    };
    let keys: Vec<String> = header.iter().map(|c| c.to_string().trim().to_string()).collect();

    Ok(lines
        .map(|line| {
            keys.iter()
                .zip(line)
                .filter(|(key, _)| !key.is_empty())
                .filter_map(|(key, cell)| workbook_value(cell).map(|v| (key.clone(), v)))
                .collect::<SheetRow>()
        })
        .filter(|row| !row.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn csv_cells_are_typed_and_blanks_dropped() {
        let body = b"admissionNumber,date,isPresent,remarks\n\
                     21CSE001,2026-10-19,1,\n\
                     0042, 2026-10-19 ,true,late\n";

        let rows = parse_csv(body).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["isPresent"], json!(1));
        assert!(!rows[0].contains_key("remarks"));
        assert_eq!(rows[1]["admissionNumber"], json!("0042"));
        assert_eq!(rows[1]["date"], json!("2026-10-19"));
        assert_eq!(rows[1]["isPresent"], json!("true"));
    }

    #[test]
    fn long_digit_identifiers_stay_text() {
        let body = b"admissionNumber,isPresent\n12345678901234567890,1\n";

        let rows = parse_csv(body).unwrap();

        assert_eq!(rows[0]["admissionNumber"], json!("12345678901234567890"));
        assert_eq!(rows[0]["isPresent"], json!(1));
    }

    #[test]
    fn numeric_detection_is_conservative() {
        assert!(looks_numeric("40"));
        assert!(looks_numeric("-2.5"));
        assert!(looks_numeric("0.4"));
        assert!(!looks_numeric("007"));
        assert!(!looks_numeric("1e3"));
        assert!(!looks_numeric("12."));
        assert!(!looks_numeric("2026-10-19"));
    }

    #[test]
    fn json_rows_must_be_objects() {
        let rows = parse_json(br#"[{"admissionNumber": "A1", "isPresent": true}]"#).unwrap();
        assert_eq!(rows[0]["isPresent"], json!(true));

        assert!(parse_json(br#"{"admissionNumber": "A1"}"#).is_err());
        assert!(parse_json(br#"[1, 2]"#).is_err());
    }

    #[test]
    fn content_types_pick_a_codec() {
        assert_eq!(
            SheetFormat::from_content_type("text/csv; charset=utf-8"),
            Some(SheetFormat::Csv)
        );
        assert_eq!(
            SheetFormat::from_content_type("application/json"),
            Some(SheetFormat::Json)
        );
        assert_eq!(
            SheetFormat::from_content_type(
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            ),
            Some(SheetFormat::Workbook)
        );
        assert_eq!(SheetFormat::from_content_type("image/png"), None);

        assert_eq!(SheetFormat::from_filename("March.XLSX"), Some(SheetFormat::Workbook));
        assert_eq!(SheetFormat::from_filename("marks.csv"), Some(SheetFormat::Csv));
        assert_eq!(SheetFormat::from_filename("notes.txt"), None);
        assert_eq!(SheetFormat::from_filename("noextension"), None);
    }

    #[test]
    fn workbook_cells_are_typed_and_blanks_dropped() {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        for (col, header) in ["admissionNumber", "isPresent", "marksObtained", "remarks", ""]
            .into_iter()
            .enumerate()
        {
            sheet.write_string(0, col as u16, header).unwrap();
        }
        sheet.write_string(1, 0, " 21CSE001 ").unwrap();
        sheet.write_number(1, 1, 1.0).unwrap();
        sheet.write_number(1, 2, 37.5).unwrap();
        sheet.write_string(1, 4, "ignored").unwrap();
        sheet.write_boolean(3, 1, false).unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let rows = parse_workbook(&bytes).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["admissionNumber"], json!("21CSE001"));
        assert_eq!(rows[0]["isPresent"], json!(1));
        assert_eq!(rows[0]["marksObtained"], json!(37.5));
        assert!(!rows[0].contains_key("remarks"));
        assert_eq!(rows[0].len(), 3);
        assert_eq!(rows[1]["isPresent"], json!(false));
    }

    #[test]
    fn unreadable_workbook_is_an_error() {
        assert!(parse_workbook(b"admissionNumber,isPresent\n").is_err());
    }
}
