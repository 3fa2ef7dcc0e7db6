//! Two-way mapping between the external table's row shape and `Record`.
//!
//! The table stores unquoted column names, which the backend lower-cases
//! (`taskNo` arrives as `taskno`). Rows written through older clients may
//! still carry the camelCase key or a retired column name, so lookups try
//! the column, then the form key, then any legacy names.

use serde_json::{Map, Value};

use super::{Category, Record, RecordField, RecordInput};

/// A row as the external table returns it.
pub type ExternalRow = Map<String, Value>;

const ID_COLUMN: &str = "id";
const CREATED_AT_COLUMN: &str = "createdat";
const CREATED_AT_ALIASES: [&str; 2] = ["createdAt", "created_at"];

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

fn lookup<'n>(row: &ExternalRow, names: impl IntoIterator<Item = &'n str>) -> String {
    names
        .into_iter()
        .find_map(|name| row.get(name).filter(|v| !v.is_null()))
        .map(cell_text)
        .unwrap_or_default()
}

/// Map an external row onto a record. Absent fields become empty strings.
pub fn from_external_row(row: &ExternalRow) -> Record {
    let mut input = RecordInput::default();
    for field in RecordField::all() {
        let names = [field.column(), field.key()]
            .into_iter()
            .chain(field.legacy_columns().iter().copied());
        *field.slot(&mut input) = lookup(row, names);
    }

    if input.category.trim().is_empty() {
        input.category = Category::FALLBACK.as_str().to_string();
    }

    Record {
        id: lookup(row, [ID_COLUMN]),
        input,
        created_at: lookup(
            row,
            std::iter::once(CREATED_AT_COLUMN).chain(CREATED_AT_ALIASES),
        ),
    }
}

/// Map a record onto the external row shape.
pub fn to_external_row(record: &Record) -> ExternalRow {
    let mut row = Map::new();
    row.insert(ID_COLUMN.to_string(), Value::String(record.id.clone()));
    for field in RecordField::all() {
        row.insert(
            field.column().to_string(),
            Value::String(field.value(&record.input).to_string()),
        );
    }
    row.insert(
        CREATED_AT_COLUMN.to_string(),
        Value::String(record.created_at.clone()),
    );
    row
}

/// Row body for a PATCH: mutable columns only.
pub fn to_external_update(input: &RecordInput) -> ExternalRow {
    RecordField::all()
        .map(|field| {
            (
                field.column().to_string(),
                Value::String(field.value(input).to_string()),
            )
        })
        .collect()
}
