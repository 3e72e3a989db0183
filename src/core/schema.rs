// Field descriptor model: immutable per-record-type metadata consulted by every walk.
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use crate::core::error::{Error, ErrorKind};

/// Storage width of an integer or enum field. Values travel as `i64`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum IntWidth {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
}

impl IntWidth {
    pub fn min(self) -> i64 {
        match self {
            IntWidth::I8 => i8::MIN as i64,
            IntWidth::I16 => i16::MIN as i64,
            IntWidth::I32 => i32::MIN as i64,
            IntWidth::I64 => i64::MIN,
            IntWidth::U8 | IntWidth::U16 | IntWidth::U32 => 0,
        }
    }

    pub fn max(self) -> i64 {
        match self {
            IntWidth::I8 => i8::MAX as i64,
            IntWidth::I16 => i16::MAX as i64,
            IntWidth::I32 => i32::MAX as i64,
            IntWidth::I64 => i64::MAX,
            IntWidth::U8 => u8::MAX as i64,
            IntWidth::U16 => u16::MAX as i64,
            IntWidth::U32 => u32::MAX as i64,
        }
    }

    pub fn contains(self, value: i64) -> bool {
        value >= self.min() && value <= self.max()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            IntWidth::I8 => "i8",
            IntWidth::I16 => "i16",
            IntWidth::I32 => "i32",
            IntWidth::I64 => "i64",
            IntWidth::U8 => "u8",
            IntWidth::U16 => "u16",
            IntWidth::U32 => "u32",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        let width = match name {
            "i8" => IntWidth::I8,
            "i16" => IntWidth::I16,
            "i32" => IntWidth::I32,
            "i64" => IntWidth::I64,
            "u8" => IntWidth::U8,
            "u16" => IntWidth::U16,
            "u32" => IntWidth::U32,
            _ => return None,
        };
        Some(width)
    }
}

impl fmt::Display for IntWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Underlying width plus the declared members of an enumeration.
///
/// Members are informational unless strict enum decoding is requested; the
/// default decode accepts any code that fits `width`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EnumSpec {
    pub width: IntWidth,
    pub members: Vec<(String, i64)>,
}

impl EnumSpec {
    pub fn new(width: IntWidth) -> Self {
        Self {
            width,
            members: Vec::new(),
        }
    }

    pub fn member(mut self, name: impl Into<String>, code: i64) -> Self {
        self.members.push((name.into(), code));
        self
    }

    pub fn is_member(&self, code: i64) -> bool {
        self.members.iter().any(|(_, value)| *value == code)
    }

    pub fn name_of(&self, code: i64) -> Option<&str> {
        self.members
            .iter()
            .find(|(_, value)| *value == code)
            .map(|(name, _)| name.as_str())
    }
}

/// Link from a record, embedded or array field to the record type it holds.
///
/// Links never resolve while a descriptor is being built, so a type may refer
/// to itself (directly or through other types).
#[derive(Clone)]
pub struct NestedType(Link);

#[derive(Clone)]
enum Link {
    Shared(Arc<RecordDescriptor>),
    Static(fn() -> &'static Arc<RecordDescriptor>),
    Deferred {
        name: Arc<str>,
        target: Arc<OnceLock<Binding>>,
    },
}

#[derive(Clone)]
enum Binding {
    Strong(Arc<RecordDescriptor>),
    // Links inside a reference cycle; the owning table keeps the target alive.
    Weak(Weak<RecordDescriptor>),
}

impl NestedType {
    pub fn shared(descriptor: Arc<RecordDescriptor>) -> Self {
        Self(Link::Shared(descriptor))
    }

    /// Link to a type whose descriptor lives in a static, e.g. a typed record.
    pub fn lazy(descriptor: fn() -> &'static Arc<RecordDescriptor>) -> Self {
        Self(Link::Static(descriptor))
    }

    /// Unbound link by name; `bind` or `bind_weak` must run before use.
    pub(crate) fn deferred(name: &str) -> Self {
        Self(Link::Deferred {
            name: Arc::from(name),
            target: Arc::new(OnceLock::new()),
        })
    }

    // The first binding wins; later calls and non-deferred links are no-ops.
    pub(crate) fn bind(&self, descriptor: &Arc<RecordDescriptor>) {
        if let Link::Deferred { target, .. } = &self.0 {
            target.get_or_init(|| Binding::Strong(Arc::clone(descriptor)));
        }
    }

    pub(crate) fn bind_weak(&self, descriptor: &Arc<RecordDescriptor>) {
        if let Link::Deferred { target, .. } = &self.0 {
            target.get_or_init(|| Binding::Weak(Arc::downgrade(descriptor)));
        }
    }

    pub fn name(&self) -> &str {
        match &self.0 {
            Link::Shared(descriptor) => descriptor.name(),
            Link::Static(descriptor) => descriptor().name(),
            Link::Deferred { name, .. } => &**name,
        }
    }

    pub fn resolve(&self) -> Result<Arc<RecordDescriptor>, Error> {
        let resolved = match &self.0 {
            Link::Shared(descriptor) => Some(Arc::clone(descriptor)),
            Link::Static(descriptor) => Some(Arc::clone(descriptor())),
            Link::Deferred { target, .. } => match target.get() {
                Some(Binding::Strong(descriptor)) => Some(Arc::clone(descriptor)),
                Some(Binding::Weak(descriptor)) => descriptor.upgrade(),
                None => None,
            },
        };
        resolved.ok_or_else(|| {
            Error::new(ErrorKind::Internal)
                .with_message(format!("record type `{}` is no longer loaded", self.name()))
                .with_hint("Keep the Schema alive while its descriptors are in use.")
        })
    }

    /// True when `descriptor` has the linked type's shape.
    pub fn matches(&self, descriptor: &RecordDescriptor) -> bool {
        self.resolve()
            .is_ok_and(|nested| nested.same_shape(descriptor))
    }
}

impl From<Arc<RecordDescriptor>> for NestedType {
    fn from(descriptor: Arc<RecordDescriptor>) -> Self {
        Self::shared(descriptor)
    }
}

// Name only; following the link could recurse forever on cyclic types.
impl fmt::Debug for NestedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NestedType").field(&self.name()).finish()
    }
}

#[derive(Clone, Debug)]
pub enum FieldKind {
    Integer(IntWidth),
    Enum(EnumSpec),
    /// Inline byte buffer; capacity counts the terminator.
    FixedString(usize),
    OwnedString,
    /// Optional reference to a child record.
    Record(NestedType),
    /// Required child record stored inline.
    Embedded(NestedType),
    Array(NestedType),
}

impl FieldKind {
    pub fn label(&self) -> &'static str {
        match self {
            FieldKind::Integer(_) => "integer",
            FieldKind::Enum(_) => "enum",
            FieldKind::FixedString(_) => "fixed_string",
            FieldKind::OwnedString => "owned_string",
            FieldKind::Record(_) => "record",
            FieldKind::Embedded(_) => "embedded",
            FieldKind::Array(_) => "array",
        }
    }

    pub fn nested(&self) -> Option<&NestedType> {
        match self {
            FieldKind::Record(nested) | FieldKind::Embedded(nested) | FieldKind::Array(nested) => {
                Some(nested)
            }
            _ => None,
        }
    }

    /// Kinds that decode to "absent" when their key is missing.
    pub fn is_optional(&self) -> bool {
        matches!(self, FieldKind::OwnedString | FieldKind::Record(_))
    }
}

#[derive(Clone, Debug)]
pub struct FieldDescriptor {
    name: String,
    kind: FieldKind,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }
}

#[derive(Debug)]
pub struct RecordDescriptor {
    name: String,
    fields: Vec<FieldDescriptor>,
}

impl RecordDescriptor {
    pub fn builder(name: impl Into<String>) -> RecordDescriptorBuilder {
        RecordDescriptorBuilder {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, index: usize) -> Option<&FieldDescriptor> {
        self.fields.get(index)
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name == name)
    }

    /// Descriptors are compared by identity first; two independently built
    /// descriptors match when names and field layouts agree, following
    /// nested types (cycles included) all the way down.
    pub fn same_shape(&self, other: &RecordDescriptor) -> bool {
        shape_eq(self, other, &mut HashSet::new())
    }
}

// Pairs already on the comparison stack are assumed equal, which keeps the
// walk finite on recursive types.
fn shape_eq(
    a: &RecordDescriptor,
    b: &RecordDescriptor,
    visiting: &mut HashSet<(usize, usize)>,
) -> bool {
    if std::ptr::eq(a, b) {
        return true;
    }
    let key = (a as *const RecordDescriptor as usize, b as *const RecordDescriptor as usize);
    if !visiting.insert(key) {
        return true;
    }
    a.name == b.name
        && a.fields.len() == b.fields.len()
        && a
            .fields
            .iter()
            .zip(b.fields.iter())
            .all(|(x, y)| x.name == y.name && same_kind(&x.kind, &y.kind, visiting))
}

// Enum member names are labels only; the stored width is what matters.
fn same_kind(a: &FieldKind, b: &FieldKind, visiting: &mut HashSet<(usize, usize)>) -> bool {
    match (a, b) {
        (FieldKind::Integer(x), FieldKind::Integer(y)) => x == y,
        (FieldKind::Enum(x), FieldKind::Enum(y)) => x.width == y.width,
        (FieldKind::FixedString(x), FieldKind::FixedString(y)) => x == y,
        (FieldKind::OwnedString, FieldKind::OwnedString) => true,
        (FieldKind::Record(x), FieldKind::Record(y))
        | (FieldKind::Embedded(x), FieldKind::Embedded(y))
        | (FieldKind::Array(x), FieldKind::Array(y)) => match (x.resolve(), y.resolve()) {
            (Ok(x), Ok(y)) => shape_eq(&x, &y, visiting),
            _ => false,
        },
        _ => false,
    }
}

#[derive(Debug)]
pub struct RecordDescriptorBuilder {
    name: String,
    fields: Vec<FieldDescriptor>,
}

impl RecordDescriptorBuilder {
    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(FieldDescriptor::new(name, kind));
        self
    }

    pub fn build(self) -> Result<Arc<RecordDescriptor>, Error> {
        if self.name.is_empty() {
            return Err(Error::new(ErrorKind::Schema).with_message("record name is empty"));
        }
        self.validate_fields()?;
        Ok(Arc::new(RecordDescriptor {
            name: self.name,
            fields: self.fields,
        }))
    }

    fn validate_fields(&self) -> Result<(), Error> {
        let mut seen = HashSet::new();
        for field in &self.fields {
            let invalid = |message: String| {
                Err(Error::new(ErrorKind::Schema)
                    .with_message(message)
                    .with_record(self.name.clone())
                    .with_field(field.name.clone()))
            };
            if field.name.is_empty() {
                return invalid("field name is empty".to_string());
            }
            if !seen.insert(field.name.as_str()) {
                return invalid(format!("duplicate field name `{}`", field.name));
            }
            match &field.kind {
                FieldKind::FixedString(0) => {
                    return invalid("fixed string capacity must be greater than zero".to_string());
                }
                FieldKind::Enum(spec) => {
                    if let Some((member, code)) = spec
                        .members
                        .iter()
                        .find(|(_, code)| !spec.width.contains(*code))
                    {
                        return invalid(format!(
                            "enum member `{member}` = {code} does not fit {}",
                            spec.width
                        ));
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}
