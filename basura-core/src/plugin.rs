//! Registry for all spreadsheet parsers, keyed by file extension.

use std::collections::HashMap;
use std::sync::Arc;

use crate::model::RawTable;
use crate::ports::{CoreError, SheetFile, SheetParser};

/// Registry that resolves parsers by file extension.
pub struct ParserRegistry {
    parsers: HashMap<String, Arc<dyn SheetParser>>,
}

impl ParserRegistry {
    /// Build a registry from the provided parser list.
    ///
    /// A later parser claiming an extension already taken replaces the earlier one.
    #[must_use]
    pub fn new(parsers: Vec<Arc<dyn SheetParser>>) -> Self {
        let mut by_extension = HashMap::new();
        for parser in parsers {
            for ext in parser.extensions() {
                by_extension.insert((*ext).to_owned(), Arc::clone(&parser));
            }
        }
        Self {
            parsers: by_extension,
        }
    }

    /// All registered extensions, sorted.
    #[must_use]
    pub fn extensions(&self) -> Vec<String> {
        let mut extensions: Vec<String> = self.parsers.keys().cloned().collect();
        extensions.sort();
        extensions
    }

    /// Look up the parser for a file extension (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnsupportedFormat`] when no parser is registered.
    pub fn parser(&self, extension: &str) -> Result<&Arc<dyn SheetParser>, CoreError> {
        let extension = extension.to_ascii_lowercase();
        self.parsers
            .get(&extension)
            .ok_or_else(|| CoreError::UnsupportedFormat(format!(".{extension}")))
    }

    /// Parse a sheet with the parser registered for its extension.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnsupportedFormat`] for unknown extensions and the parser's error
    /// when decoding fails.
    pub fn parse(&self, sheet: &SheetFile) -> Result<RawTable, CoreError> {
        self.parser(&sheet.extension())?.parse(&sheet.bytes)
    }
}
