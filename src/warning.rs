use std::fmt;

use crate::src_map::{line_column, SourceId};

/// A problem that does not stop parsing or linking, like an import that resolves to nothing.
///
/// Creating a warning also logs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub source: SourceId,
    /// Byte offset in the original source text.
    pub offset: usize,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl Warning {
    /// `text` is the source text that `offset` points into.
    pub fn new(source: &SourceId, text: &str, offset: usize, message: impl Into<String>) -> Self {
        let message = message.into();
        let (line, column) = line_column(text, offset);
        tracing::warn!(source = %source, line, column, "{message}");
        Self {
            source: source.clone(),
            offset,
            line,
            column,
            message,
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: {}",
            self.source, self.line, self.column, self.message
        )
    }
}
