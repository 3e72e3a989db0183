//! Purpose: Define the stable public Rust API boundary for jsonable.
//! Exports: Descriptor model, dynamic records, the three core walks, typed sugar, schema files.
//! Role: Public, additive-only surface; `jsonable!`/`open_enum!` expansions resolve through it.
//! Invariants: Every path used by a macro expansion is re-exported here.
//! Invariants: Typed wrappers never bypass the generic serialize/deserialize/release walks.

mod field;
mod macros;
mod schema_file;
mod typed;

pub use crate::core::de::deserialize;
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::options::DecodeOptions;
pub use crate::core::record::{
    FieldRef, FieldValue, FixedBuf, PointerArray, Record, RecordAccess, RecordSeq,
};
pub use crate::core::release::{ReleaseStats, release as release_record};
pub use crate::core::schema::{
    EnumSpec, FieldDescriptor, FieldKind, IntWidth, NestedType, RecordDescriptor,
    RecordDescriptorBuilder,
};
pub use crate::core::ser::serialize;
pub use field::{FixedString, Integral, JsonField};
pub use schema_file::{Schema, describe_descriptor};
#[doc(hidden)]
pub use typed::__private;
pub use typed::{Jsonable, from_json, from_json_with, from_str, release, to_json, to_string};
