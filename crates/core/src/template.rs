//! XLSX update template: encoding a field selection, decoding a filled sheet.
//!
//! Layout of the first worksheet (0-based rows):
//!
//! ```text
//! row 0   Record ID | <label 1> | <label 2> | ...   visible headers
//! row 1   record_id | <id 1>    | <id 2>    | ...   hidden, authoritative
//! row 2+  <card id> | <value>   | <value>   | ...   data
//! ```
//!
//! Column 0 is always the record (card) id. Rows 0 and 1 always have the same
//! width, so column *k* of the label row and of the id row describe the same
//! field. On upload only the id row is trusted; users may rename headers.

use std::io::Cursor;

use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use chrono::{NaiveDateTime, Timelike};
use indexmap::IndexMap;
use rust_xlsxwriter::Workbook;
use serde::Serialize;

use crate::error::CoreError;
use crate::pipe::Field;
use crate::selection::resolve_field_ids;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Visible header of the record id column.
pub const RECORD_ID_HEADER: &str = "Record ID";

/// Machine key of the record id column in the hidden id row.
pub const RECORD_ID_KEY: &str = "record_id";

/// Name given to the generated worksheet.
pub const SHEET_NAME: &str = "Updates";

/// MIME type of generated templates.
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// 0-based index of the hidden field-id row.
const ID_ROW: u32 = 1;

/// 0-based index of the first data row.
const FIRST_DATA_ROW: u32 = 2;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from encoding or decoding a template.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    /// The selection could not be resolved against the catalog.
    #[error(transparent)]
    Selection(#[from] CoreError),

    /// Writing the workbook failed.
    #[error("Failed to write template: {0}")]
    Write(#[from] rust_xlsxwriter::XlsxError),

    /// The uploaded bytes are not a readable XLSX workbook.
    #[error("Failed to read uploaded file: {0}")]
    Read(#[from] calamine::XlsxError),

    /// The workbook is readable but not laid out like a generated template.
    #[error("Invalid template: {0}")]
    InvalidLayout(String),
}

// ---------------------------------------------------------------------------
// Update batch
// ---------------------------------------------------------------------------

/// Updates requested for one record (one data row).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordUpdate {
    pub record_id: String,
    /// Field id -> new value, in column order. Empty when the row only
    /// carries a record id.
    pub updates: IndexMap<String, String>,
}

/// Every record update decoded from one uploaded template, in row order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateBatch {
    pub records: Vec<RecordUpdate>,
}

impl UpdateBatch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// The three template rows for a resolved field selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateLayout {
    pub headers: Vec<String>,
    pub field_ids: Vec<String>,
    pub default_row: Vec<String>,
}

impl TemplateLayout {
    /// Resolve `selected_ids` against `all_fields` and build the layout.
    ///
    /// Fails with [`CoreError::UnknownField`] if any id is not in the catalog.
    pub fn new(
        selected_ids: &[String],
        all_fields: &[Field],
        default_assignee: Option<&str>,
    ) -> Result<Self, CoreError> {
        let fields = resolve_field_ids(selected_ids, all_fields)?;
        Ok(Self::from_fields(&fields, default_assignee))
    }

    /// Build the layout for already-resolved fields.
    pub fn from_fields(fields: &[Field], default_assignee: Option<&str>) -> Self {
        let assignee = default_assignee.unwrap_or_default();

        let headers = std::iter::once(RECORD_ID_HEADER.to_string())
            .chain(fields.iter().map(|f| f.label.clone()))
            .collect();
        let field_ids = std::iter::once(RECORD_ID_KEY.to_string())
            .chain(fields.iter().map(|f| f.id.clone()))
            .collect();
        let default_row = std::iter::once(String::new())
            .chain(fields.iter().map(|f| {
                if f.is_assignee() {
                    assignee.to_string()
                } else {
                    String::new()
                }
            }))
            .collect();

        Self {
            headers,
            field_ids,
            default_row,
        }
    }

    /// Render the header and id rows followed by `data_rows` as XLSX bytes.
    pub fn write_xlsx(&self, data_rows: &[Vec<String>]) -> Result<Vec<u8>, TemplateError> {
        let mut workbook = Workbook::new();
        {
            let sheet = workbook.add_worksheet();
            sheet.set_name(SHEET_NAME)?;

            let rows = [&self.headers, &self.field_ids]
                .into_iter()
                .chain(data_rows.iter());
            for (row_idx, row) in rows.enumerate() {
                for (col_idx, value) in row.iter().enumerate() {
                    if !value.is_empty() {
                        sheet.write_string(row_idx as u32, col_idx as u16, value.as_str())?;
                    }
                }
            }

            sheet.set_row_hidden(ID_ROW)?;

            for (col_idx, width) in self.column_widths(data_rows).into_iter().enumerate() {
                sheet.set_column_width(col_idx as u16, width)?;
            }
        }

        Ok(workbook.save_to_buffer()?)
    }

    /// Width per column: `(longest value + 2) * 1.2` characters.
    fn column_widths(&self, data_rows: &[Vec<String>]) -> Vec<f64> {
        (0..self.headers.len())
            .map(|col| {
                let longest = [&self.headers, &self.field_ids]
                    .into_iter()
                    .chain(data_rows.iter())
                    .filter_map(|row| row.get(col))
                    .map(|value| value.chars().count())
                    .max()
                    .unwrap_or(0);
                (longest as f64 + 2.0) * 1.2
            })
            .collect()
    }
}

/// Encode a field selection as an XLSX update template.
///
/// The third row is pre-filled: every `assignee_select` column carries
/// `default_assignee`, every other cell is blank.
pub fn encode_template(
    selected_ids: &[String],
    all_fields: &[Field],
    default_assignee: Option<&str>,
) -> Result<Vec<u8>, TemplateError> {
    let layout = TemplateLayout::new(selected_ids, all_fields, default_assignee)?;
    layout.write_xlsx(std::slice::from_ref(&layout.default_row))
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode an uploaded, filled-in template into an [`UpdateBatch`].
///
/// - Rows whose record id cell is empty are skipped.
/// - Empty cells are skipped: absence means "no change", never "clear".
/// - A row with a record id and no values is kept with zero updates.
pub fn decode_template(bytes: &[u8]) -> Result<UpdateBatch, TemplateError> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| TemplateError::InvalidLayout("workbook has no worksheets".into()))??;

    let (last_row, last_col) = range
        .end()
        .ok_or_else(|| TemplateError::InvalidLayout("worksheet is empty".into()))?;
    if last_row < ID_ROW {
        return Err(TemplateError::InvalidLayout(
            "missing the field id row".into(),
        ));
    }

    let cell = |row: u32, col: u32| range.get_value((row, col)).and_then(cell_to_string);

    match cell(ID_ROW, 0) {
        Some(key) if key.trim() == RECORD_ID_KEY => {}
        other => {
            return Err(TemplateError::InvalidLayout(format!(
                "second row must start with '{RECORD_ID_KEY}', found '{}'",
                other.unwrap_or_default()
            )))
        }
    }

    // Field id per column; `None` for columns with a blank id cell.
    let column_ids: Vec<(u32, String)> = (1..=last_col)
        .filter_map(|col| {
            cell(ID_ROW, col)
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .map(|id| (col, id))
        })
        .collect();

    let mut batch = UpdateBatch::default();
    for row in FIRST_DATA_ROW..=last_row {
        let Some(record_id) = cell(row, 0)
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
        else {
            continue;
        };

        let updates = column_ids
            .iter()
            .filter_map(|(col, field_id)| cell(row, *col).map(|value| (field_id.clone(), value)))
            .collect();

        batch.records.push(RecordUpdate { record_id, updates });
    }

    tracing::debug!(
        records = batch.len(),
        columns = column_ids.len(),
        "Decoded update template"
    );

    Ok(batch)
}

/// Stringify a cell the way a spreadsheet user reads it. `None` for empty.
fn cell_to_string(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) if s.is_empty() => None,
        Data::String(s) => Some(s.clone()),
        Data::Int(i) => Some(i.to_string()),
        Data::Float(f) => Some(format_number(*f)),
        Data::Bool(b) => Some(b.to_string()),
        Data::DateTime(dt) => Some(
            dt.as_datetime()
                .map(format_datetime)
                .unwrap_or_else(|| cell.to_string()),
        ),
        other => Some(other.to_string()),
    }
}

/// Integral floats (card ids typed as numbers) lose their `.0`.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

fn format_datetime(value: NaiveDateTime) -> String {
    if value.time().num_seconds_from_midnight() == 0 {
        value.format("%Y-%m-%d").to_string()
    } else {
        value.format("%Y-%m-%dT%H:%M:%S").to_string()
    }
}
