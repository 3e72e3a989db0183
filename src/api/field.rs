//! Purpose: Map Rust field types onto descriptor kinds for typed records.
//! Exports: `JsonField`, `Integral`, `FixedString`.
//! Role: Lets `jsonable!` derive a descriptor table from a plain struct definition.
//! Invariants: `kind()` and `as_field()` agree for every implementing type.
//! Invariants: `from_value(into_value(x)) == x` without touching JSON.

use std::fmt;

use bstr::ByteSlice;

use crate::core::error::{Error, ErrorKind};
use crate::core::record::{FieldRef, FieldValue, FixedBuf, PointerArray, RecordAccess};
use crate::core::schema::{FieldKind, IntWidth, NestedType};

use super::typed::Jsonable;

/// A Rust type that can sit in a `jsonable!` struct field.
pub trait JsonField: Sized {
    fn kind() -> FieldKind;

    fn as_field(&self) -> FieldRef<'_>;

    fn into_value(self) -> FieldValue;

    fn from_value(value: FieldValue) -> Result<Self, Error>;
}

/// Integer storage types usable as plain integer fields or enum codes.
pub trait Integral: Copy + Into<i64> + TryFrom<i64> {
    const WIDTH: IntWidth;
}

fn value_mismatch(expected: &str, got: &FieldValue) -> Error {
    let got = match got {
        FieldValue::Integer(_) => "integer",
        FieldValue::Enum(_) => "enum",
        FieldValue::FixedString(_) => "fixed_string",
        FieldValue::OwnedString(_) => "owned_string",
        FieldValue::Record(_) => "record",
        FieldValue::Embedded(_) => "embedded",
        FieldValue::Array(_) => "array",
    };
    Error::new(ErrorKind::TypeMismatch).with_message(format!("expected {expected} value, got {got}"))
}

macro_rules! integral_field {
    ($($ty:ty => $width:ident),* $(,)?) => {
        $(
            impl Integral for $ty {
                const WIDTH: IntWidth = IntWidth::$width;
            }

            impl JsonField for $ty {
                fn kind() -> FieldKind {
                    FieldKind::Integer(IntWidth::$width)
                }

                fn as_field(&self) -> FieldRef<'_> {
                    FieldRef::Integer(i64::from(*self))
                }

                fn into_value(self) -> FieldValue {
                    FieldValue::Integer(i64::from(self))
                }

                fn from_value(value: FieldValue) -> Result<Self, Error> {
                    match value {
                        FieldValue::Integer(raw) => <$ty>::try_from(raw).map_err(|_| {
                            Error::new(ErrorKind::TypeMismatch)
                                .with_message(format!("{raw} does not fit {}", IntWidth::$width))
                        }),
                        other => Err(value_mismatch("integer", &other)),
                    }
                }
            }
        )*
    };
}

integral_field! {
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
}

/// Inline, NUL-terminated byte buffer of `N` bytes (at most `N - 1` bytes of text).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FixedString<const N: usize> {
    bytes: [u8; N],
}

impl<const N: usize> FixedString<N> {
    const NON_EMPTY: () = assert!(N > 0, "FixedString capacity must be non-zero");

    pub fn new() -> Self {
        let () = Self::NON_EMPTY;
        Self { bytes: [0u8; N] }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn as_bytes(&self) -> &[u8] {
        crate::core::record::terminated(&self.bytes)
    }

    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(self.as_bytes()).ok()
    }

    pub fn set(&mut self, content: &[u8]) -> Result<(), Error> {
        if content.len() >= N {
            return Err(Error::new(ErrorKind::BufferOverflow).with_message(format!(
                "{} bytes do not fit a {N}-byte buffer",
                content.len()
            )));
        }
        self.bytes[..content.len()].copy_from_slice(content);
        self.bytes[content.len()..].fill(0);
        Ok(())
    }
}

impl<const N: usize> Default for FixedString<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> TryFrom<&str> for FixedString<N> {
    type Error = Error;

    fn try_from(text: &str) -> Result<Self, Self::Error> {
        let mut out = Self::new();
        out.set(text.as_bytes())?;
        Ok(out)
    }
}

impl<const N: usize> fmt::Debug for FixedString<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_bytes().as_bstr())
    }
}

impl<const N: usize> JsonField for FixedString<N> {
    fn kind() -> FieldKind {
        let () = Self::NON_EMPTY;
        FieldKind::FixedString(N)
    }

    fn as_field(&self) -> FieldRef<'_> {
        FieldRef::FixedString(&self.bytes)
    }

    fn into_value(self) -> FieldValue {
        FieldValue::FixedString(FixedBuf::from_raw(&self.bytes))
    }

    fn from_value(value: FieldValue) -> Result<Self, Error> {
        match value {
            FieldValue::FixedString(buf) => {
                let mut out = Self::new();
                out.set(buf.content())?;
                Ok(out)
            }
            other => Err(value_mismatch("fixed_string", &other)),
        }
    }
}

impl JsonField for Option<String> {
    fn kind() -> FieldKind {
        FieldKind::OwnedString
    }

    fn as_field(&self) -> FieldRef<'_> {
        FieldRef::OwnedString(self.as_deref())
    }

    fn into_value(self) -> FieldValue {
        FieldValue::OwnedString(self)
    }

    fn from_value(value: FieldValue) -> Result<Self, Error> {
        match value {
            FieldValue::OwnedString(text) => Ok(text),
            other => Err(value_mismatch("owned_string", &other)),
        }
    }
}

impl<T: Jsonable> JsonField for Option<Box<T>> {
    fn kind() -> FieldKind {
        FieldKind::Record(NestedType::lazy(T::type_descriptor))
    }

    fn as_field(&self) -> FieldRef<'_> {
        FieldRef::Record(self.as_deref().map(|child| child as &dyn RecordAccess))
    }

    fn into_value(self) -> FieldValue {
        FieldValue::Record(self.map(|child| Box::new((*child).into_record())))
    }

    fn from_value(value: FieldValue) -> Result<Self, Error> {
        match value {
            FieldValue::Record(None) => Ok(None),
            FieldValue::Record(Some(child)) => Ok(Some(Box::new(T::from_record(*child)?))),
            other => Err(value_mismatch("record", &other)),
        }
    }
}

/// A nested `jsonable!` struct held by value: a required, inline child record.
impl<T: Jsonable> JsonField for T {
    fn kind() -> FieldKind {
        FieldKind::Embedded(NestedType::lazy(T::type_descriptor))
    }

    fn as_field(&self) -> FieldRef<'_> {
        FieldRef::Embedded(self)
    }

    fn into_value(self) -> FieldValue {
        FieldValue::Embedded(Box::new(self.into_record()))
    }

    fn from_value(value: FieldValue) -> Result<Self, Error> {
        match value {
            FieldValue::Embedded(child) => T::from_record(*child),
            other => Err(value_mismatch("embedded", &other)),
        }
    }
}

impl<T: Jsonable> JsonField for Vec<T> {
    fn kind() -> FieldKind {
        FieldKind::Array(NestedType::lazy(T::type_descriptor))
    }

    fn as_field(&self) -> FieldRef<'_> {
        FieldRef::Array(self)
    }

    fn into_value(self) -> FieldValue {
        let items: Vec<_> = self.into_iter().map(Jsonable::into_record).collect();
        FieldValue::Array(PointerArray::from(items))
    }

    fn from_value(value: FieldValue) -> Result<Self, Error> {
        match value {
            FieldValue::Array(items) => items
                .into_vec()
                .into_iter()
                .enumerate()
                .map(|(index, child)| {
                    T::from_record(child).map_err(|err| err.within(format!("[{index}]")))
                })
                .collect(),
            other => Err(value_mismatch("array", &other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FixedString, JsonField};
    use crate::core::error::ErrorKind;
    use crate::core::record::FieldValue;
    use crate::core::schema::{FieldKind, IntWidth, NestedType};

    #[test]
    fn integer_fields_report_width() {
        assert!(matches!(<u16 as JsonField>::kind(), FieldKind::Integer(IntWidth::U16)));
        assert_eq!(<i8 as JsonField>::from_value(FieldValue::Integer(-5)).expect("fits"), -5);
        let err = <u8 as JsonField>::from_value(FieldValue::Integer(256)).expect_err("too big");
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn fixed_string_capacity_boundary() {
        let ok = FixedString::<6>::try_from("hello").expect("5 bytes");
        assert_eq!(ok.as_str(), Some("hello"));
        let err = FixedString::<6>::try_from("hello!").expect_err("6 bytes");
        assert_eq!(err.kind(), ErrorKind::BufferOverflow);
    }

    #[test]
    fn fixed_string_value_conversion_keeps_content() {
        let text = FixedString::<16>::try_from("abc").expect("fits");
        let value = text.into_value();
        match &value {
            FieldValue::FixedString(buf) => assert_eq!(buf.capacity(), 16),
            other => panic!("unexpected value {other:?}"),
        }
        assert_eq!(FixedString::<16>::from_value(value).expect("back"), text);
    }

    #[test]
    fn fixed_string_value_copies_whole_buffer() {
        let text = FixedString::<4>::try_from("abc").expect("fits");
        match text.into_value() {
            FieldValue::FixedString(buf) => assert_eq!(buf.raw(), b"abc\0"),
            other => panic!("unexpected value {other:?}"),
        }
    }

    #[test]
    fn owned_string_rejects_other_values() {
        let err = <Option<String> as JsonField>::from_value(FieldValue::Integer(1))
            .expect_err("not a string");
        assert!(err.to_string().contains("expected owned_string value"));
    }
}
