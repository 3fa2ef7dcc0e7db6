//! Search and sort for the record table. Export uses the same query, so the
//! CSV always matches what the table is showing.

use serde::{Deserialize, Serialize};

use super::{Record, RecordField};

/// Fields the free-text search box looks at.
const SEARCH_FIELDS: [RecordField; 8] = [
    RecordField::TaskNo,
    RecordField::Category,
    RecordField::RequestTeam,
    RecordField::Requester,
    RecordField::RequestContent,
    RecordField::ProcessContent,
    RecordField::Note,
    RecordField::SmManager,
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecordQuery {
    pub search: Option<String>,
    /// Defaults to the receipt date.
    pub sort: Option<RecordField>,
    pub direction: SortDirection,
}

impl RecordQuery {
    pub fn sort_field(&self) -> RecordField {
        self.sort.unwrap_or(RecordField::ReceiptDate)
    }

    pub fn matches(&self, record: &Record) -> bool {
        let needle = match self.search.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => s.to_lowercase(),
            _ => return true,
        };
        SEARCH_FIELDS
            .iter()
            .any(|field| field.value(&record.input).to_lowercase().contains(&needle))
    }

    /// Filter then sort. The sort is stable: ties keep encounter order.
    pub fn apply(&self, records: &[Record]) -> Vec<Record> {
        let field = self.sort_field();
        let mut rows: Vec<Record> = records.iter().filter(|r| self.matches(r)).cloned().collect();
        rows.sort_by(|a, b| {
            let (a, b) = (field.value(&a.input), field.value(&b.input));
            match self.direction {
                SortDirection::Asc => a.cmp(b),
                SortDirection::Desc => b.cmp(a),
            }
        });
        rows
    }
}
