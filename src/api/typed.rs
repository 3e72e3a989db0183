//! Purpose: Per-type marshaling surface for Rust structs with a descriptor table.
//! Exports: `Jsonable`, `to_json`, `to_string`, `from_json`, `from_json_with`, `from_str`, `release`.
//! Role: Thin typed wrappers that route every call through the generic core walks.
//! Invariants: Typed and dynamic records produce identical JSON for the same data.
//! Invariants: Decoding always goes through `Record`; typed values are moved out of it.

use std::sync::Arc;

use serde_json::Value;

use crate::core::de::deserialize;
use crate::core::error::Error;
use crate::core::options::DecodeOptions;
use crate::core::record::{Record, RecordAccess};
use crate::core::release::{self as walker, ReleaseStats};
use crate::core::schema::RecordDescriptor;
use crate::core::ser::serialize;
use crate::json::parse;

/// A record type with a static descriptor and lossless moves to and from `Record`.
///
/// Normally implemented by the `jsonable!` macro.
pub trait Jsonable: RecordAccess + Sized {
    fn type_descriptor() -> &'static Arc<RecordDescriptor>;

    fn into_record(self) -> Record;

    fn from_record(record: Record) -> Result<Self, Error>;
}

pub fn to_json<T: RecordAccess>(value: &T) -> Value {
    serialize(value)
}

pub fn to_string<T: RecordAccess>(value: &T) -> String {
    serialize(value).to_string()
}

pub fn from_json<T: Jsonable>(value: &Value) -> Result<T, Error> {
    from_json_with(value, &DecodeOptions::default())
}

pub fn from_json_with<T: Jsonable>(value: &Value, options: &DecodeOptions) -> Result<T, Error> {
    let record = deserialize(value, T::type_descriptor(), options)?;
    T::from_record(record)
}

pub fn from_str<T: Jsonable>(input: &str) -> Result<T, Error> {
    let value = parse::from_str(input)?;
    from_json(&value)
}

/// Consumes a typed instance through the release walker.
pub fn release<T: Jsonable>(value: T) -> ReleaseStats {
    let mut record = value.into_record();
    walker::release(&mut record)
}

#[doc(hidden)]
pub mod __private {
    //! Support items for `jsonable!` expansions. Not part of the stable API.
    use std::sync::Arc;

    use crate::api::field::JsonField;
    use crate::core::error::{Error, ErrorKind};
    use crate::core::record::{FieldValue, Record};
    use crate::core::schema::{FieldKind, RecordDescriptor, RecordDescriptorBuilder};

    pub use std::sync::OnceLock;

    pub fn builder(name: &str) -> RecordDescriptorBuilder {
        RecordDescriptor::builder(name)
    }

    pub fn kind_of<T: JsonField>() -> FieldKind {
        T::kind()
    }

    pub fn finish(name: &str, builder: RecordDescriptorBuilder) -> Arc<RecordDescriptor> {
        match builder.build() {
            Ok(descriptor) => descriptor,
            // Struct fields are unique and typed kinds are valid by construction.
            Err(err) => panic!("record type {name} has an invalid descriptor: {err}"),
        }
    }

    pub fn assemble(descriptor: &Arc<RecordDescriptor>, values: Vec<FieldValue>) -> Record {
        Record::assembled(Arc::clone(descriptor), values)
    }

    pub fn open(
        descriptor: &Arc<RecordDescriptor>,
        record: Record,
    ) -> Result<std::vec::IntoIter<FieldValue>, Error> {
        if !record.descriptor().same_shape(descriptor) {
            return Err(Error::new(ErrorKind::ShapeMismatch)
                .with_message(format!(
                    "record of type {} cannot become {}",
                    record.name(),
                    descriptor.name()
                ))
                .with_record(descriptor.name()));
        }
        Ok(record.into_values().into_iter())
    }

    pub fn take<T: JsonField>(
        values: &mut std::vec::IntoIter<FieldValue>,
        record: &str,
        field: &str,
    ) -> Result<T, Error> {
        let value = values.next().ok_or_else(|| {
            Error::new(ErrorKind::Internal)
                .with_message("record has fewer values than its descriptor")
                .with_record(record)
                .with_field(field)
        })?;
        T::from_value(value).map_err(|err| {
            if err.record().is_some() {
                err.within(field)
            } else {
                err.with_record(record).with_field(field)
            }
        })
    }
}
