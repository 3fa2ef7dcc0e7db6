//! CSV export for spreadsheet users.
//!
//! Output starts with a UTF-8 BOM so spreadsheet apps pick the right
//! encoding. A cell containing a comma is wrapped in double quotes; embedded
//! quotes are written as-is, which spreadsheets tolerate for the free text
//! these tickets carry.

use chrono::NaiveDate;
use csv::{QuoteStyle, Terminator, WriterBuilder};

use super::{Record, RecordField};
use crate::error::AppError;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// One exported column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportColumn {
    Field(RecordField),
    /// `category-taskNo`, the identifier people quote in mail.
    QualifiedTaskNo,
}

impl ExportColumn {
    pub fn label(self) -> &'static str {
        match self {
            ExportColumn::Field(field) => field.label(),
            ExportColumn::QualifiedTaskNo => "Task No",
        }
    }

    fn cell(self, record: &Record) -> String {
        match self {
            ExportColumn::Field(field) => field.value(&record.input).to_string(),
            ExportColumn::QualifiedTaskNo => {
                let task_no = record.input.task_no.trim();
                if task_no.is_empty() {
                    String::new()
                } else {
                    format!("{}-{}", record.input.category, task_no)
                }
            }
        }
    }
}

pub const DEFAULT_EXPORT_COLUMNS: [ExportColumn; 11] = [
    ExportColumn::Field(RecordField::Category),
    ExportColumn::QualifiedTaskNo,
    ExportColumn::Field(RecordField::ReceiptDate),
    ExportColumn::Field(RecordField::RequestTeam),
    ExportColumn::Field(RecordField::Requester),
    ExportColumn::Field(RecordField::RequestContent),
    ExportColumn::Field(RecordField::ProcessContent),
    ExportColumn::Field(RecordField::Note),
    ExportColumn::Field(RecordField::SmManager),
    ExportColumn::Field(RecordField::StartDate),
    ExportColumn::Field(RecordField::ActualDeployDate),
];

fn wrap_if_comma(text: &str) -> String {
    if text.contains(',') {
        format!("\"{}\"", text)
    } else {
        text.to_string()
    }
}

/// Render records, in the order given, as a BOM-prefixed CSV document.
pub fn to_delimited_text(records: &[Record], columns: &[ExportColumn]) -> Result<Vec<u8>, AppError> {
    let mut wtr = WriterBuilder::new()
        .quote_style(QuoteStyle::Never)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(UTF8_BOM.to_vec());

    // csv quotes a lone empty field so the row isn't read back as blank;
    // one-column exports keep empty cells empty instead.
    if let [column] = columns {
        let mut out = UTF8_BOM.to_vec();
        let cells = std::iter::once(wrap_if_comma(column.label()))
            .chain(records.iter().map(|r| wrap_if_comma(&column.cell(r))));
        for cell in cells {
            out.extend_from_slice(cell.as_bytes());
            out.push(b'\n');
        }
        return Ok(out);
    }

    let write_err = |e: csv::Error| AppError::Io(format!("CSV write failed: {}", e));

    wtr.write_record(columns.iter().map(|c| wrap_if_comma(c.label())))
        .map_err(write_err)?;
    for record in records {
        wtr.write_record(columns.iter().map(|c| wrap_if_comma(&c.cell(record))))
            .map_err(write_err)?;
    }

    wtr.into_inner()
        .map_err(|e| AppError::Io(format!("CSV flush failed: {}", e)))
}

/// Download name for an export made on `day`.
pub fn export_file_name(day: NaiveDate) -> String {
    format!("SM_history_{}.csv", day.format("%Y-%m-%d"))
}
