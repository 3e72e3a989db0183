// Serializer: record instance -> JSON object, keys in declaration order.
use bstr::ByteSlice;
use serde_json::{Map, Number, Value};

use crate::core::record::{FieldRef, RecordAccess, terminated};

/// Serializes any record view. Infallible and read-only on the instance.
pub fn serialize(record: &dyn RecordAccess) -> Value {
    let descriptor = record.descriptor();
    let mut obj = Map::with_capacity(descriptor.len());
    for (index, field) in descriptor.fields().iter().enumerate() {
        let value = match record.field(index) {
            Some(field_ref) => field_value(field_ref),
            // A typed view that exposes fewer fields than it declares is a
            // generator bug; emit null rather than dropping the key.
            None => Value::Null,
        };
        obj.insert(field.name().to_string(), value);
    }
    Value::Object(obj)
}

fn field_value(field: FieldRef<'_>) -> Value {
    match field {
        FieldRef::Integer(value) | FieldRef::Enum(value) => Value::Number(Number::from(value)),
        FieldRef::FixedString(raw) => Value::String(terminated(raw).to_str_lossy().into_owned()),
        FieldRef::OwnedString(Some(text)) => Value::String(text.to_string()),
        FieldRef::OwnedString(None) | FieldRef::Record(None) => Value::Null,
        FieldRef::Record(Some(child)) | FieldRef::Embedded(child) => serialize(child),
        FieldRef::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for index in 0..items.len() {
                if let Some(child) = items.get(index) {
                    out.push(serialize(child));
                }
            }
            Value::Array(out)
        }
    }
}
