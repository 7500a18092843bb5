//! Row records shared by the row-returning commands.

use rowrunner::parse::{optional, value};
use rowrunner::{ParseResult, Row, RowParser, SqlValue};
use serde::Serialize;

use crate::output::{format_rows, Outputable};

/// One row with its column names.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub columns: Vec<String>,
    pub values: Vec<SqlValue>,
}

/// Parser decoding every column of a row, NULL cells included.
pub fn record() -> RowParser<Record> {
    RowParser::new(|row: &dyn Row| {
        let mut values = Vec::with_capacity(row.len());
        for index in 0..row.len() {
            match optional(value(index)).parse(row) {
                ParseResult::Success(cell) => values.push(cell.get_or_else(SqlValue::Null)),
                ParseResult::Failure(e) => return ParseResult::Failure(e),
            }
        }
        ParseResult::successful(Record {
            columns: row.columns().to_vec(),
            values,
        })
    })
}

/// Rows of one result set.
#[derive(Debug, Default, Serialize)]
pub struct RowsResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
}

impl RowsResult {
    pub fn from_records(records: Vec<Record>) -> Self {
        let mut result = Self::default();
        for record in records {
            if result.columns.is_empty() {
                result.columns = record.columns;
            }
            result.rows.push(record.values);
        }
        result
    }
}

impl Outputable for RowsResult {
    fn to_table(&self) -> String {
        let table = format_rows(&self.columns, &self.rows, "No rows.");
        if self.rows.is_empty() {
            return table;
        }
        format!("{}\n\n({} row{})", table, self.rows.len(), if self.rows.len() == 1 { "" } else { "s" })
    }
}
