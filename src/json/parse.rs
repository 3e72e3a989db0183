//! Purpose: Decode JSON text into a `serde_json::Value` tree.
//! Exports: `from_str`, `ParseFailureCategory`, `categorize_error`, `hint_for_error`.
//! Role: Parser boundary that maps serde_json failures onto `ErrorKind::Usage`.
//! Invariants: Object key order is preserved (serde_json `preserve_order`).
//! Invariants: Hints name a category and location, never echo the input payload.

use serde_json::Value;
use serde_json::error::Category;

use crate::core::error::{Error, ErrorKind};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ParseFailureCategory {
    Syntax,
    Eof,
    NumericRange,
    DepthLimit,
    Io,
    Unknown,
}

impl ParseFailureCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Syntax => "syntax",
            Self::Eof => "eof",
            Self::NumericRange => "numeric-range",
            Self::DepthLimit => "depth-limit",
            Self::Io => "io",
            Self::Unknown => "unknown",
        }
    }
}

pub fn from_str(input: &str) -> Result<Value, Error> {
    serde_json::from_str(input).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("invalid JSON input")
            .with_hint(hint_for_error(&err, "input"))
            .with_source(err)
    })
}

pub fn categorize_error(err: &serde_json::Error) -> ParseFailureCategory {
    match err.classify() {
        Category::Eof => ParseFailureCategory::Eof,
        Category::Io => ParseFailureCategory::Io,
        Category::Syntax | Category::Data => categorize_message(&err.to_string()),
    }
}

pub fn categorize_message(message: &str) -> ParseFailureCategory {
    let message = message.to_ascii_lowercase();
    if message.contains("recursion limit") {
        ParseFailureCategory::DepthLimit
    } else if message.contains("number out of range") {
        ParseFailureCategory::NumericRange
    } else if message.contains("expected")
        || message.contains("trailing")
        || message.contains("invalid")
        || message.contains("control character")
        || message.contains("key must be a string")
    {
        ParseFailureCategory::Syntax
    } else {
        ParseFailureCategory::Unknown
    }
}

pub fn hint_for_error(err: &serde_json::Error, context: &str) -> String {
    format!(
        "parse category: {}; line {}, column {}; context: {context}",
        categorize_error(err).as_str(),
        err.line(),
        err.column()
    )
}
