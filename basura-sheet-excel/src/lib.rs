//! Sheet parser for spreadsheet workbooks, backed by calamine.
//!
//! Only the first worksheet is read. Its first row is the header.

use std::io::Cursor;
use std::sync::Arc;

use calamine::{Data, Reader, open_workbook_auto_from_rs};
use tracing::debug;

use basura_core::{
    model::{Cell, RawTable},
    ports::{CoreError, SheetParser},
};

/// Parses `.xlsx`, `.xls`, `.xlsb` and `.ods` workbooks.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkbookSheetParser;

fn cell(data: &Data) -> Cell {
    match data {
        #[expect(
            clippy::cast_precision_loss,
            reason = "waste quantities are far below 2^52"
        )]
        Data::Int(value) => Cell::Number(*value as f64),
        Data::Float(value) if value.is_finite() => Cell::Number(*value),
        Data::Float(_) | Data::Error(_) | Data::Empty => Cell::Empty,
        Data::String(text) => Cell::guess(text),
        Data::Bool(flag) => Cell::Bool(*flag),
        other => Cell::guess(&other.to_string()),
    }
}

impl SheetParser for WorkbookSheetParser {
    fn extensions(&self) -> &[&'static str] {
        &["xlsx", "xls", "xlsb", "ods"]
    }

    fn parse(&self, bytes: &[u8]) -> Result<RawTable, CoreError> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
            .map_err(|err| CoreError::Parse(format!("opening workbook: {err}")))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| CoreError::Parse("workbook has no worksheets".into()))?
            .map_err(|err| CoreError::Parse(format!("reading first worksheet: {err}")))?;

        let mut rows = range.rows();
        let header: Vec<String> = rows
            .next()
            .ok_or_else(|| CoreError::Parse("first worksheet is empty".into()))?
            .iter()
            .map(|data| data.to_string().trim().to_owned())
            .collect();

        let body: Vec<Vec<Cell>> = rows
            .map(|row| row.iter().map(cell).collect::<Vec<_>>())
            .filter(|row| !row.iter().all(Cell::is_empty))
            .collect();

        debug!(columns = header.len(), rows = body.len(), "parsed workbook sheet");
        Ok(RawTable::from_rows(header, body))
    }
}

/// Build the parser bundle for workbook files.
#[must_use]
pub fn plugin() -> Arc<dyn SheetParser> {
    Arc::new(WorkbookSheetParser)
}
