//! Sheet parser for `.csv` files.

use std::sync::Arc;

use csv::{ReaderBuilder, Trim};
use tracing::debug;

use basura_core::{
    model::{Cell, RawTable},
    ports::{CoreError, SheetParser},
};

/// Parses comma-separated sheets with a header row.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvSheetParser;

impl SheetParser for CsvSheetParser {
    fn extensions(&self) -> &[&'static str] {
        &["csv"]
    }

    fn parse(&self, bytes: &[u8]) -> Result<RawTable, CoreError> {
        // Spreadsheet exports often start with a UTF-8 byte order mark.
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

        let mut reader = ReaderBuilder::new()
            .flexible(true)
            .trim(Trim::All)
            .from_reader(bytes);

        let header: Vec<String> = reader
            .headers()
            .map_err(|err| CoreError::Parse(format!("reading CSV header: {err}")))?
            .iter()
            .map(str::to_owned)
            .collect();
        if header.iter().all(|name| name.is_empty()) {
            return Err(CoreError::Parse("CSV file has no header row".into()));
        }

        let mut rows = Vec::new();
        for (row_no, result) in reader.records().enumerate() {
            let record =
                result.map_err(|err| CoreError::Parse(format!("CSV row {row_no}: {err}")))?;
            if record.iter().all(str::is_empty) {
                continue;
            }
            rows.push(record.iter().map(Cell::guess).collect());
        }

        debug!(columns = header.len(), rows = rows.len(), "parsed CSV sheet");
        Ok(RawTable::from_rows(header, rows))
    }
}

/// Build the parser bundle for CSV files.
#[must_use]
pub fn plugin() -> Arc<dyn SheetParser> {
    Arc::new(CsvSheetParser)
}
