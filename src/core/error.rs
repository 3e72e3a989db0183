// Error model shared by descriptor construction, decoding, schema loading and the CLI.
use std::error::Error as StdError;
use std::fmt;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Internal,
    Usage,
    NotFound,
    Io,
    Schema,
    ShapeMismatch,
    TypeMismatch,
    BufferOverflow,
    MissingField,
    DepthLimit,
}

impl ErrorKind {
    /// True for the kinds a decode walk can produce.
    pub fn is_decode(self) -> bool {
        matches!(
            self,
            ErrorKind::ShapeMismatch
                | ErrorKind::TypeMismatch
                | ErrorKind::BufferOverflow
                | ErrorKind::MissingField
                | ErrorKind::DepthLimit
        )
    }
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    hint: Option<String>,
    record: Option<String>,
    field: Option<String>,
    // Innermost segment last; segments are pushed while unwinding so they are
    // stored in reverse and flipped by `path()`.
    path: Vec<String>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            hint: None,
            record: None,
            field: None,
            path: Vec::new(),
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    /// Record type that was being decoded when the failure was detected.
    pub fn record(&self) -> Option<&str> {
        self.record.as_deref()
    }

    /// Field (of `record`) whose value failed to decode.
    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    /// Dotted path from the root record to the failing field, e.g. `items[2].child.a`.
    pub fn path(&self) -> Option<String> {
        if self.path.is_empty() {
            return None;
        }
        let mut out = String::new();
        for segment in self.path.iter().rev() {
            if !out.is_empty() && !segment.starts_with('[') {
                out.push('.');
            }
            out.push_str(segment);
        }
        Some(out)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_record(mut self, record: impl Into<String>) -> Self {
        self.record = Some(record.into());
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        let field = field.into();
        self.path.push(field.clone());
        self.field = Some(field);
        self
    }

    /// Prepends an outer path segment; used when a nested failure unwinds.
    pub fn within(mut self, segment: impl Into<String>) -> Self {
        self.path.push(segment.into());
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(record) = &self.record {
            write!(f, " (record: {record})")?;
        }
        if let Some(path) = self.path() {
            write!(f, " (path: {path})")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

pub fn to_exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Internal => 1,
        ErrorKind::Usage => 2,
        ErrorKind::NotFound => 3,
        ErrorKind::Io => 4,
        ErrorKind::Schema => 5,
        ErrorKind::ShapeMismatch => 10,
        ErrorKind::TypeMismatch => 11,
        ErrorKind::BufferOverflow => 12,
        ErrorKind::MissingField => 13,
        ErrorKind::DepthLimit => 14,
    }
}
