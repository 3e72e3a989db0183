// Deserializer: JSON object -> freshly allocated record, first failure wins.
// Children are owned by locals until the record is assembled, so an early
// return drops everything built so far.
use std::sync::Arc;

use serde_json::{Map, Number, Value};
use tracing::{Level, debug, trace};

use crate::core::error::{Error, ErrorKind};
use crate::core::options::DecodeOptions;
use crate::core::record::{FieldValue, FixedBuf, PointerArray, Record};
use crate::core::schema::{FieldDescriptor, FieldKind, IntWidth, RecordDescriptor};

pub fn deserialize(
    value: &Value,
    descriptor: &Arc<RecordDescriptor>,
    options: &DecodeOptions,
) -> Result<Record, Error> {
    let result = decode_record(value, descriptor, options, 1);
    if let Err(err) = &result {
        let path = err.path();
        debug!(
            root = descriptor.name(),
            kind = ?err.kind(),
            record = err.record(),
            field = err.field(),
            path = path.as_deref(),
            "decode failed"
        );
    }
    result
}

fn decode_record(
    value: &Value,
    descriptor: &Arc<RecordDescriptor>,
    options: &DecodeOptions,
    depth: usize,
) -> Result<Record, Error> {
    if depth > options.max_depth {
        return Err(Error::new(ErrorKind::DepthLimit)
            .with_message(format!("nesting exceeds {} records", options.max_depth))
            .with_record(descriptor.name()));
    }
    let Value::Object(obj) = value else {
        return Err(Error::new(ErrorKind::ShapeMismatch)
            .with_message(format!("expected object, got {}", json_kind(value)))
            .with_record(descriptor.name()));
    };
    if tracing::enabled!(Level::TRACE) {
        trace_unknown_keys(obj, descriptor);
    }

    let mut values = Vec::with_capacity(descriptor.len());
    for field in descriptor.fields() {
        values.push(decode_field(obj.get(field.name()), field, descriptor, options, depth)?);
    }
    Ok(Record::assembled(descriptor.clone(), values))
}

fn decode_field(
    slot: Option<&Value>,
    field: &FieldDescriptor,
    owner: &RecordDescriptor,
    options: &DecodeOptions,
    depth: usize,
) -> Result<FieldValue, Error> {
    let fail = |kind: ErrorKind, message: String| {
        Error::new(kind)
            .with_message(message)
            .with_record(owner.name())
            .with_field(field.name())
    };

    let Some(value) = slot else {
        if field.kind().is_optional() {
            return FieldValue::zero(field.kind());
        }
        return Err(fail(
            ErrorKind::MissingField,
            format!("required {} key is absent", field.kind().label()),
        ));
    };

    match field.kind() {
        FieldKind::Integer(width) => decode_int(value, *width)
            .map(FieldValue::Integer)
            .map_err(|message| fail(ErrorKind::TypeMismatch, message)),
        FieldKind::Enum(spec) => {
            let code =
                decode_int(value, spec.width).map_err(|message| fail(ErrorKind::TypeMismatch, message))?;
            if options.strict_enums && !spec.is_member(code) {
                return Err(fail(
                    ErrorKind::TypeMismatch,
                    format!("{code} is not a declared enum member"),
                ));
            }
            Ok(FieldValue::Enum(code))
        }
        FieldKind::FixedString(capacity) => {
            let Value::String(text) = value else {
                return Err(fail(
                    ErrorKind::TypeMismatch,
                    format!("expected string, got {}", json_kind(value)),
                ));
            };
            if text.len() + 1 > *capacity {
                return Err(fail(
                    ErrorKind::BufferOverflow,
                    format!(
                        "{} bytes plus terminator exceed capacity {capacity}",
                        text.len()
                    ),
                ));
            }
            FixedBuf::with_content(*capacity, text.as_bytes())
                .map(FieldValue::FixedString)
                .map_err(|err| err.with_record(owner.name()).with_field(field.name()))
        }
        FieldKind::OwnedString => match value {
            Value::String(text) => Ok(FieldValue::OwnedString(Some(text.clone()))),
            Value::Null => Ok(FieldValue::OwnedString(None)),
            other => Err(fail(
                ErrorKind::TypeMismatch,
                format!("expected string or null, got {}", json_kind(other)),
            )),
        },
        FieldKind::Record(nested) => match value {
            Value::Object(_) => {
                let nested = nested
                    .resolve()
                    .map_err(|err| err.with_record(owner.name()).with_field(field.name()))?;
                let child = decode_record(value, &nested, options, depth + 1)
                    .map_err(|err| err.within(field.name()))?;
                Ok(FieldValue::Record(Some(Box::new(child))))
            }
            Value::Null => Ok(FieldValue::Record(None)),
            other => Err(fail(
                ErrorKind::ShapeMismatch,
                format!("expected object or null, got {}", json_kind(other)),
            )),
        },
        FieldKind::Embedded(nested) => {
            if !value.is_object() {
                return Err(fail(
                    ErrorKind::ShapeMismatch,
                    format!("expected object, got {}", json_kind(value)),
                ));
            }
            let nested = nested
                .resolve()
                .map_err(|err| err.with_record(owner.name()).with_field(field.name()))?;
            let child = decode_record(value, &nested, options, depth + 1)
                .map_err(|err| err.within(field.name()))?;
            Ok(FieldValue::Embedded(Box::new(child)))
        }
        FieldKind::Array(nested) => {
            let Value::Array(items) = value else {
                return Err(fail(
                    ErrorKind::ShapeMismatch,
                    format!("expected array, got {}", json_kind(value)),
                ));
            };
            let nested = nested
                .resolve()
                .map_err(|err| err.with_record(owner.name()).with_field(field.name()))?;
            let mut children = PointerArray::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                if !item.is_object() {
                    return Err(Error::new(ErrorKind::TypeMismatch)
                        .with_message(format!("expected object element, got {}", json_kind(item)))
                        .with_record(owner.name())
                        .within(format!("[{index}]"))
                        .with_field(field.name()));
                }
                let child = decode_record(item, &nested, options, depth + 1)
                    .map_err(|err| err.within(format!("[{index}]")).within(field.name()))?;
                children.push(child);
            }
            Ok(FieldValue::Array(children))
        }
    }
}

fn decode_int(value: &Value, width: IntWidth) -> Result<i64, String> {
    let Value::Number(number) = value else {
        return Err(format!("expected number, got {}", json_kind(value)));
    };
    let int = integral(number).ok_or_else(|| format!("{number} is not an integer in i64 range"))?;
    if !width.contains(int) {
        return Err(format!("{int} does not fit {width}"));
    }
    Ok(int)
}

fn integral(number: &Number) -> Option<i64> {
    if let Some(int) = number.as_i64() {
        return Some(int);
    }
    if number.is_u64() {
        return None;
    }
    let float = number.as_f64()?;
    // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive.
    if float.is_finite() && float.fract() == 0.0 && float >= i64::MIN as f64 && float < i64::MAX as f64
    {
        Some(float as i64)
    } else {
        None
    }
}

fn trace_unknown_keys(obj: &Map<String, Value>, descriptor: &RecordDescriptor) {
    for key in obj.keys() {
        if descriptor.field_index(key).is_none() {
            trace!(record = descriptor.name(), key = key.as_str(), "ignoring unknown key");
        }
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
