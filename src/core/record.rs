// Record instances: the dynamic in-memory shape plus the read-side access traits
// the serializer walks (implemented by `Record` and by generated typed structs).
use std::fmt;
use std::sync::Arc;

use bstr::ByteSlice;

use crate::core::error::{Error, ErrorKind};
use crate::core::schema::{FieldKind, RecordDescriptor};

/// Borrowed view of one field, as handed to the serializer.
pub enum FieldRef<'a> {
    Integer(i64),
    Enum(i64),
    /// Raw buffer; content ends at the first NUL or at the end of the slice.
    FixedString(&'a [u8]),
    OwnedString(Option<&'a str>),
    Record(Option<&'a dyn RecordAccess>),
    Embedded(&'a dyn RecordAccess),
    Array(&'a dyn RecordSeq),
}

/// Read access to a record laid out according to its descriptor.
pub trait RecordAccess {
    fn descriptor(&self) -> &Arc<RecordDescriptor>;

    /// Field at `index` in declaration order.
    fn field(&self, index: usize) -> Option<FieldRef<'_>>;
}

/// Ordered sequence of child records behind an array field.
pub trait RecordSeq {
    fn len(&self) -> usize;

    fn get(&self, index: usize) -> Option<&dyn RecordAccess>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: RecordAccess> RecordSeq for Vec<T> {
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn get(&self, index: usize) -> Option<&dyn RecordAccess> {
        self.as_slice()
            .get(index)
            .map(|item| item as &dyn RecordAccess)
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct FixedBuf {
    bytes: Box<[u8]>,
}

impl FixedBuf {
    pub fn new(capacity: usize) -> Self {
        Self {
            bytes: vec![0u8; capacity].into_boxed_slice(),
        }
    }

    /// Copies a whole buffer, terminator and trailing bytes included.
    pub(crate) fn from_raw(raw: &[u8]) -> Self {
        Self {
            bytes: Box::from(raw),
        }
    }

    pub fn with_content(capacity: usize, content: &[u8]) -> Result<Self, Error> {
        let mut buf = Self::new(capacity);
        buf.set(content)?;
        Ok(buf)
    }

    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    pub fn raw(&self) -> &[u8] {
        &self.bytes
    }

    /// Bytes before the terminator.
    pub fn content(&self) -> &[u8] {
        terminated(&self.bytes)
    }

    pub fn to_str_lossy(&self) -> std::borrow::Cow<'_, str> {
        self.content().to_str_lossy()
    }

    /// Replaces the content, keeping room for the terminator.
    pub fn set(&mut self, content: &[u8]) -> Result<(), Error> {
        if content.len() >= self.bytes.len() {
            return Err(Error::new(ErrorKind::BufferOverflow).with_message(format!(
                "{} bytes do not fit a {}-byte buffer",
                content.len(),
                self.bytes.len()
            )));
        }
        self.bytes[..content.len()].copy_from_slice(content);
        self.bytes[content.len()..].fill(0);
        Ok(())
    }
}

impl fmt::Debug for FixedBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FixedBuf<{}>({:?})", self.capacity(), self.content().as_bstr())
    }
}

pub(crate) fn terminated(bytes: &[u8]) -> &[u8] {
    match bytes.find_byte(0) {
        Some(end) => &bytes[..end],
        None => bytes,
    }
}

/// Owned children of an array field.
///
/// Length is explicit; `slots()` still offers the null-terminated view with a
/// trailing `None` sentinel.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PointerArray {
    items: Vec<Record>,
}

impl PointerArray {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, record: Record) {
        self.items.push(record);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.items.iter()
    }

    pub fn slots(&self) -> impl Iterator<Item = Option<&Record>> + '_ {
        self.items.iter().map(Some).chain(std::iter::once(None))
    }

    pub fn into_vec(self) -> Vec<Record> {
        self.items
    }

    pub(crate) fn take(&mut self) -> Vec<Record> {
        std::mem::take(&mut self.items)
    }
}

impl From<Vec<Record>> for PointerArray {
    fn from(items: Vec<Record>) -> Self {
        Self { items }
    }
}

impl RecordSeq for PointerArray {
    fn len(&self) -> usize {
        self.items.len()
    }

    fn get(&self, index: usize) -> Option<&dyn RecordAccess> {
        self.items.get(index).map(|item| item as &dyn RecordAccess)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Integer(i64),
    Enum(i64),
    FixedString(FixedBuf),
    OwnedString(Option<String>),
    Record(Option<Box<Record>>),
    Embedded(Box<Record>),
    Array(PointerArray),
}

impl FieldValue {
    /// Zero value for a kind: 0, empty buffer, absent reference, empty array,
    /// zeroed embedded record.
    ///
    /// Fails only when an embedded type link no longer resolves.
    pub fn zero(kind: &FieldKind) -> Result<Self, Error> {
        let value = match kind {
            FieldKind::Integer(_) => FieldValue::Integer(0),
            FieldKind::Enum(_) => FieldValue::Enum(0),
            FieldKind::FixedString(capacity) => FieldValue::FixedString(FixedBuf::new(*capacity)),
            FieldKind::OwnedString => FieldValue::OwnedString(None),
            FieldKind::Record(_) => FieldValue::Record(None),
            FieldKind::Embedded(nested) => {
                FieldValue::Embedded(Box::new(Record::new(nested.resolve()?)?))
            }
            FieldKind::Array(_) => FieldValue::Array(PointerArray::new()),
        };
        Ok(value)
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(value) | FieldValue::Enum(value) => Some(*value),
            _ => None,
        }
    }

    /// String content of a fixed buffer or a present owned string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::FixedString(buf) => std::str::from_utf8(buf.content()).ok(),
            FieldValue::OwnedString(value) => value.as_deref(),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            FieldValue::Record(value) => value.as_deref(),
            FieldValue::Embedded(child) => Some(&**child),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&PointerArray> {
        match self {
            FieldValue::Array(items) => Some(items),
            _ => None,
        }
    }

    fn matches(&self, kind: &FieldKind) -> bool {
        match (self, kind) {
            (FieldValue::Integer(value), FieldKind::Integer(width)) => width.contains(*value),
            (FieldValue::Enum(value), FieldKind::Enum(spec)) => spec.width.contains(*value),
            (FieldValue::FixedString(buf), FieldKind::FixedString(capacity)) => {
                buf.capacity() == *capacity
            }
            (FieldValue::OwnedString(_), FieldKind::OwnedString) => true,
            (FieldValue::Record(None), FieldKind::Record(_)) => true,
            (FieldValue::Record(Some(child)), FieldKind::Record(nested))
            | (FieldValue::Embedded(child), FieldKind::Embedded(nested)) => {
                nested.matches(&child.descriptor)
            }
            (FieldValue::Array(items), FieldKind::Array(nested)) => items
                .iter()
                .all(|child| nested.matches(&child.descriptor)),
            _ => false,
        }
    }
}

/// Dynamically shaped record whose layout is its descriptor.
#[derive(Clone)]
pub struct Record {
    descriptor: Arc<RecordDescriptor>,
    values: Vec<FieldValue>,
    released: bool,
}

impl Record {
    /// Zero-filled record. Embedded children are zero-filled too.
    pub fn new(descriptor: Arc<RecordDescriptor>) -> Result<Self, Error> {
        let values = descriptor
            .fields()
            .iter()
            .map(|field| FieldValue::zero(field.kind()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| err.with_record(descriptor.name()))?;
        Ok(Self {
            descriptor,
            values,
            released: false,
        })
    }

    /// Assembles a record from values in declaration order, checking each
    /// against its field kind.
    pub fn from_values(
        descriptor: Arc<RecordDescriptor>,
        values: Vec<FieldValue>,
    ) -> Result<Self, Error> {
        if values.len() != descriptor.len() {
            return Err(Error::new(ErrorKind::ShapeMismatch)
                .with_message(format!(
                    "expected {} field values, got {}",
                    descriptor.len(),
                    values.len()
                ))
                .with_record(descriptor.name()));
        }
        for (field, value) in descriptor.fields().iter().zip(values.iter()) {
            if !value.matches(field.kind()) {
                return Err(kind_mismatch(&descriptor, field.name(), field.kind()));
            }
        }
        Ok(Self::assembled(descriptor, values))
    }

    pub(crate) fn assembled(descriptor: Arc<RecordDescriptor>, values: Vec<FieldValue>) -> Self {
        debug_assert_eq!(descriptor.len(), values.len());
        Self {
            descriptor,
            values,
            released: false,
        }
    }

    pub fn descriptor(&self) -> &Arc<RecordDescriptor> {
        &self.descriptor
    }

    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    pub fn values(&self) -> &[FieldValue] {
        &self.values
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.descriptor
            .field_index(name)
            .and_then(|index| self.values.get(index))
    }

    pub fn set(&mut self, name: &str, value: FieldValue) -> Result<(), Error> {
        let Some(index) = self.descriptor.field_index(name) else {
            return Err(Error::new(ErrorKind::NotFound)
                .with_message(format!("no field named `{name}`"))
                .with_record(self.descriptor.name()));
        };
        let kind = self.descriptor.fields()[index].kind();
        if !value.matches(kind) {
            return Err(kind_mismatch(&self.descriptor, name, kind));
        }
        self.values[index] = value;
        self.released = false;
        Ok(())
    }

    pub fn into_values(self) -> Vec<FieldValue> {
        self.values
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub(crate) fn values_mut(&mut self) -> &mut [FieldValue] {
        &mut self.values
    }

    pub(crate) fn mark_released(&mut self) {
        self.released = true;
    }
}

fn kind_mismatch(descriptor: &RecordDescriptor, field: &str, kind: &FieldKind) -> Error {
    Error::new(ErrorKind::TypeMismatch)
        .with_message(format!("value does not fit a {} field", kind.label()))
        .with_record(descriptor.name())
        .with_field(field)
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.descriptor.same_shape(&other.descriptor) && self.values == other.values
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct(self.descriptor.name());
        for (field, value) in self.descriptor.fields().iter().zip(self.values.iter()) {
            out.field(field.name(), value);
        }
        out.finish()
    }
}

impl RecordAccess for Record {
    fn descriptor(&self) -> &Arc<RecordDescriptor> {
        &self.descriptor
    }

    fn field(&self, index: usize) -> Option<FieldRef<'_>> {
        let value = self.values.get(index)?;
        let field = match value {
            FieldValue::Integer(value) => FieldRef::Integer(*value),
            FieldValue::Enum(value) => FieldRef::Enum(*value),
            FieldValue::FixedString(buf) => FieldRef::FixedString(buf.raw()),
            FieldValue::OwnedString(value) => FieldRef::OwnedString(value.as_deref()),
            FieldValue::Record(child) => {
                FieldRef::Record(child.as_deref().map(|child| child as &dyn RecordAccess))
            }
            FieldValue::Embedded(child) => FieldRef::Embedded(&**child),
            FieldValue::Array(items) => FieldRef::Array(items),
        };
        Some(field)
    }
}
