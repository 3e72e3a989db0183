//! Purpose: Load record descriptors from a hand-authored JSON schema document.
//! Exports: `Schema`, `describe_descriptor`.
//! Role: Descriptor source for tools with no Rust type (CLI, tests, external generators).
//! Invariants: Record references resolve to one shared `Arc` per record type.
//! Invariants: `describe()` output is itself a loadable schema document.
//! Invariants: Types may refer to themselves through record and array fields;
//! only a cycle made entirely of embedded fields is rejected.
//! Notes: Links inside a reference cycle are weak. Keep the `Schema` alive while
//! using descriptors from a cyclic part of it.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::core::error::{Error, ErrorKind};
use crate::core::schema::{EnumSpec, FieldKind, IntWidth, NestedType, RecordDescriptor};
use crate::json::parse;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SchemaDoc {
    records: Vec<RecordDoc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RecordDoc {
    name: String,
    fields: Vec<FieldDoc>,
}

#[derive(Debug, Deserialize)]
struct FieldDoc {
    name: String,
    #[serde(flatten)]
    kind: KindDoc,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum KindDoc {
    Integer {
        #[serde(default)]
        width: Option<String>,
    },
    Enum {
        #[serde(default)]
        width: Option<String>,
        #[serde(default)]
        members: Map<String, Value>,
    },
    FixedString {
        capacity: usize,
    },
    OwnedString,
    Record {
        #[serde(rename = "type")]
        type_name: String,
    },
    Embedded {
        #[serde(rename = "type")]
        type_name: String,
    },
    Array {
        #[serde(rename = "type")]
        type_name: String,
    },
}

/// A resolved set of record descriptors, in document order.
#[derive(Debug, Clone)]
pub struct Schema {
    records: Vec<Arc<RecordDescriptor>>,
    index: HashMap<String, usize>,
}

impl Schema {
    pub fn from_str(input: &str) -> Result<Self, Error> {
        let value = parse::from_str(input).map_err(|err| {
            let mut out = Error::new(ErrorKind::Schema).with_message("schema is not valid JSON");
            if let Some(hint) = err.hint() {
                out = out.with_hint(hint.to_string());
            }
            out.with_source(err)
        })?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Result<Self, Error> {
        let doc = SchemaDoc::deserialize(value).map_err(|err| {
            Error::new(ErrorKind::Schema)
                .with_message(format!("invalid schema document: {err}"))
                .with_hint("Each record needs `name` and `fields`; each field needs `name` and `kind`.")
        })?;
        Resolver::new(&doc)?.resolve_all()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<RecordDescriptor>> {
        self.index.get(name).map(|&slot| &self.records[slot])
    }

    /// Like `get`, but a missing type is a `NotFound` error listing known names.
    pub fn require(&self, name: &str) -> Result<&Arc<RecordDescriptor>, Error> {
        self.get(name).ok_or_else(|| {
            Error::new(ErrorKind::NotFound)
                .with_message(format!("no record type named `{name}`"))
                .with_hint(format!("Known types: {}", self.names().join(", ")))
        })
    }

    pub fn names(&self) -> Vec<&str> {
        self.records.iter().map(|record| record.name()).collect()
    }

    pub fn records(&self) -> &[Arc<RecordDescriptor>] {
        &self.records
    }

    pub fn describe(&self) -> Value {
        let records: Vec<Value> = self
            .records
            .iter()
            .map(|record| describe_descriptor(record))
            .collect();
        json!({ "records": records })
    }
}

/// Schema-document rendition of one descriptor table.
pub fn describe_descriptor(descriptor: &RecordDescriptor) -> Value {
    let fields: Vec<Value> = descriptor
        .fields()
        .iter()
        .map(|field| {
            let mut out = Map::new();
            out.insert("name".to_string(), json!(field.name()));
            out.insert("kind".to_string(), json!(field.kind().label()));
            match field.kind() {
                FieldKind::Integer(width) => {
                    out.insert("width".to_string(), json!(width.as_str()));
                }
                FieldKind::Enum(spec) => {
                    out.insert("width".to_string(), json!(spec.width.as_str()));
                    let members: Map<String, Value> = spec
                        .members
                        .iter()
                        .map(|(name, code)| (name.clone(), json!(code)))
                        .collect();
                    out.insert("members".to_string(), Value::Object(members));
                }
                FieldKind::FixedString(capacity) => {
                    out.insert("capacity".to_string(), json!(capacity));
                }
                FieldKind::OwnedString => {}
                FieldKind::Record(nested)
                | FieldKind::Embedded(nested)
                | FieldKind::Array(nested) => {
                    out.insert("type".to_string(), json!(nested.name()));
                }
            }
            Value::Object(out)
        })
        .collect();
    json!({ "name": descriptor.name(), "fields": fields })
}

// One field that points at another record type.
struct Link {
    from: usize,
    to: usize,
    embedded: bool,
    nested: NestedType,
}

struct Resolver<'a> {
    docs: &'a [RecordDoc],
    by_name: HashMap<&'a str, usize>,
}

impl<'a> Resolver<'a> {
    fn new(doc: &'a SchemaDoc) -> Result<Self, Error> {
        let mut by_name = HashMap::new();
        for (slot, record) in doc.records.iter().enumerate() {
            if by_name.insert(record.name.as_str(), slot).is_some() {
                return Err(Error::new(ErrorKind::Schema)
                    .with_message(format!("duplicate record type `{}`", record.name))
                    .with_record(record.name.clone()));
            }
        }
        Ok(Self {
            docs: &doc.records,
            by_name,
        })
    }

    // Every descriptor is built with unbound links first, then the links are
    // bound once all targets exist, so declaration order and cycles do not matter.
    fn resolve_all(self) -> Result<Schema, Error> {
        let mut links = Vec::new();
        let mut records = Vec::with_capacity(self.docs.len());
        let mut index = HashMap::new();
        for (slot, doc) in self.docs.iter().enumerate() {
            let mut builder = RecordDescriptor::builder(doc.name.clone());
            for field in &doc.fields {
                let kind = self
                    .field_kind(slot, &field.kind, &mut links)
                    .map_err(|err| err.with_record(doc.name.clone()).with_field(field.name.clone()))?;
                builder = builder.field(field.name.clone(), kind);
            }
            index.insert(doc.name.clone(), slot);
            records.push(builder.build()?);
        }
        self.reject_embedding_cycles(&links)?;

        let mut weak = 0usize;
        for link in &links {
            if reaches(&links, link.to, link.from) {
                link.nested.bind_weak(&records[link.to]);
                weak += 1;
            } else {
                link.nested.bind(&records[link.to]);
            }
        }
        tracing::debug!(records = records.len(), links = links.len(), weak, "schema resolved");
        Ok(Schema { records, index })
    }

    fn field_kind(
        &self,
        slot: usize,
        kind: &KindDoc,
        links: &mut Vec<Link>,
    ) -> Result<FieldKind, Error> {
        let kind = match kind {
            KindDoc::Integer { width } => FieldKind::Integer(parse_width(width.as_deref())?),
            KindDoc::Enum { width, members } => {
                let mut spec = EnumSpec::new(parse_width(width.as_deref())?);
                for (name, code) in members {
                    let code = code.as_i64().ok_or_else(|| {
                        Error::new(ErrorKind::Schema)
                            .with_message(format!("enum member `{name}` must be an integer"))
                    })?;
                    spec = spec.member(name.clone(), code);
                }
                FieldKind::Enum(spec)
            }
            KindDoc::FixedString { capacity } => FieldKind::FixedString(*capacity),
            KindDoc::OwnedString => FieldKind::OwnedString,
            KindDoc::Record { type_name } => {
                FieldKind::Record(self.link(slot, type_name, false, links)?)
            }
            KindDoc::Embedded { type_name } => {
                FieldKind::Embedded(self.link(slot, type_name, true, links)?)
            }
            KindDoc::Array { type_name } => {
                FieldKind::Array(self.link(slot, type_name, false, links)?)
            }
        };
        Ok(kind)
    }

    fn link(
        &self,
        from: usize,
        type_name: &str,
        embedded: bool,
        links: &mut Vec<Link>,
    ) -> Result<NestedType, Error> {
        let Some(&to) = self.by_name.get(type_name) else {
            return Err(Error::new(ErrorKind::Schema)
                .with_message(format!("unknown record type `{type_name}`")));
        };
        let nested = NestedType::deferred(type_name);
        links.push(Link {
            from,
            to,
            embedded,
            nested: nested.clone(),
        });
        Ok(nested)
    }

    // A type that embeds itself by value, directly or through other embedded
    // fields, would have infinite size.
    fn reject_embedding_cycles(&self, links: &[Link]) -> Result<(), Error> {
        let embedded: Vec<&Link> = links.iter().filter(|link| link.embedded).collect();
        for link in &embedded {
            let mut stack = vec![link.to];
            let mut seen = vec![false; self.docs.len()];
            while let Some(slot) = stack.pop() {
                if slot == link.from {
                    let name = &self.docs[link.from].name;
                    return Err(Error::new(ErrorKind::Schema)
                        .with_message(format!("record type `{name}` embeds itself"))
                        .with_record(name.clone())
                        .with_hint("Use a `record` or `array` field to break the cycle."));
                }
                if std::mem::replace(&mut seen[slot], true) {
                    continue;
                }
                stack.extend(embedded.iter().filter(|next| next.from == slot).map(|next| next.to));
            }
        }
        Ok(())
    }
}

fn reaches(links: &[Link], start: usize, goal: usize) -> bool {
    let mut stack = vec![start];
    let mut seen = HashSet::new();
    while let Some(slot) = stack.pop() {
        if slot == goal {
            return true;
        }
        if !seen.insert(slot) {
            continue;
        }
        stack.extend(links.iter().filter(|link| link.from == slot).map(|link| link.to));
    }
    false
}

fn parse_width(width: Option<&str>) -> Result<IntWidth, Error> {
    match width {
        None => Ok(IntWidth::I32),
        Some(name) => IntWidth::parse(name).ok_or_else(|| {
            Error::new(ErrorKind::Schema)
                .with_message(format!("unknown integer width `{name}`"))
                .with_hint("Use one of i8, i16, i32, i64, u8, u16, u32.")
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::Schema;
    use crate::core::de::deserialize;
    use crate::core::error::ErrorKind;
    use crate::core::options::DecodeOptions;
    use crate::core::release::release;
    use crate::core::schema::{FieldKind, IntWidth};
    use crate::core::ser::serialize;
    use serde_json::json;
    use std::sync::Arc;

    const SCHEMA: &str = r#"{
        "records": [
            {"name": "nested_var_list", "fields": [
                {"name": "a", "kind": "integer"},
                {"name": "s", "kind": "array", "type": "var_list"}
            ]},
            {"name": "var_list", "fields": [
                {"name": "i", "kind": "integer"},
                {"name": "s", "kind": "array", "type": "scalars"}
            ]},
            {"name": "scalars", "fields": [
                {"name": "a", "kind": "integer", "width": "i32"},
                {"name": "e", "kind": "enum", "members": {"ENUM_VAL_1": 0, "ENUM_VAL_2": 1}},
                {"name": "string", "kind": "fixed_string", "capacity": 500}
            ]}
        ]
    }"#;

    #[test]
    fn forward_references_resolve_to_shared_descriptors() {
        let schema = Schema::from_str(SCHEMA).expect("schema");
        assert_eq!(schema.names(), ["nested_var_list", "var_list", "scalars"]);

        let scalars = schema.get("scalars").expect("scalars");
        let var_list = schema.get("var_list").expect("var_list");
        let nested = var_list.fields()[1].kind().nested().expect("nested");
        assert!(Arc::ptr_eq(&nested.resolve().expect("bound"), scalars));
        assert!(matches!(scalars.fields()[0].kind(), FieldKind::Integer(IntWidth::I32)));
    }

    #[test]
    fn describe_round_trips() {
        let schema = Schema::from_str(SCHEMA).expect("schema");
        let again = Schema::from_value(&schema.describe()).expect("reload");
        assert_eq!(again.describe(), schema.describe());
        for name in schema.names() {
            assert!(schema.get(name).unwrap().same_shape(again.get(name).unwrap()));
        }
    }

    const TREE: &str = r#"{"records": [
        {"name": "node", "fields": [
            {"name": "label", "kind": "owned_string"},
            {"name": "children", "kind": "array", "type": "node"}
        ]},
        {"name": "forest", "fields": [
            {"name": "root", "kind": "record", "type": "node"}
        ]}
    ]}"#;

    #[test]
    fn self_referential_records_round_trip() {
        let schema = Schema::from_str(TREE).expect("recursive schema");
        let doc = json!({
            "label": "a",
            "children": [
                {"label": "b", "children": [{"label": null, "children": []}]},
                {"label": "c", "children": []}
            ]
        });
        let mut record = deserialize(&doc, schema.require("node").unwrap(), &DecodeOptions::default())
            .expect("decode");
        assert_eq!(serialize(&record), doc);

        let stats = release(&mut record);
        assert_eq!((stats.strings, stats.records, stats.arrays), (3, 3, 4));
    }

    #[test]
    fn recursive_documents_respect_depth_limit() {
        let schema = Schema::from_str(TREE).expect("recursive schema");
        let mut doc = json!({"children": []});
        for _ in 0..10 {
            doc = json!({"children": [doc]});
        }
        let limit = DecodeOptions::default().with_max_depth(8).expect("depth");
        let err = deserialize(&doc, schema.require("node").unwrap(), &limit).expect_err("11 levels");
        assert_eq!(err.kind(), ErrorKind::DepthLimit);
        assert!(err.path().unwrap().starts_with("children[0].children[0]"));
    }

    const MUTUAL: &str = r#"{"records": [
        {"name": "a", "fields": [{"name": "b", "kind": "record", "type": "b"}]},
        {"name": "b", "fields": [{"name": "a", "kind": "array", "type": "a"}]}
    ]}"#;

    #[test]
    fn cyclic_links_need_the_schema_alive() {
        let schema = Schema::from_str(TREE).expect("recursive schema");
        let forest = Arc::clone(schema.require("forest").unwrap());
        drop(schema);
        // forest -> node is strong, which also keeps node's link to itself valid.
        let doc = json!({"root": {"label": "x", "children": [{"children": []}]}});
        deserialize(&doc, &forest, &DecodeOptions::default()).expect("decode");

        let schema = Schema::from_str(MUTUAL).expect("mutual recursion");
        let a = Arc::clone(schema.require("a").unwrap());
        drop(schema);
        deserialize(&json!({"b": null}), &a, &DecodeOptions::default()).expect("no link followed");
        let err = deserialize(&json!({"b": {"a": []}}), &a, &DecodeOptions::default())
            .expect_err("b is gone");
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.field(), Some("b"));
    }

    #[test]
    fn same_shape_handles_mutual_recursion() {
        let one = Schema::from_str(MUTUAL).expect("mutual recursion");
        let two = Schema::from_str(MUTUAL).expect("mutual recursion");
        assert!(one.require("a").unwrap().same_shape(two.require("a").unwrap()));
        assert_eq!(one.describe(), two.describe());
    }

    #[test]
    fn rejects_unknown_references_and_embedding_cycles() {
        let unknown = r#"{"records": [{"name": "a", "fields": [
            {"name": "x", "kind": "record", "type": "ghost"}
        ]}]}"#;
        let err = Schema::from_str(unknown).expect_err("unknown type");
        assert_eq!(err.kind(), ErrorKind::Schema);
        assert_eq!(err.record(), Some("a"));

        let embeds = r#"{"records": [
            {"name": "a", "fields": [{"name": "b", "kind": "embedded", "type": "b"}]},
            {"name": "b", "fields": [{"name": "a", "kind": "embedded", "type": "a"}]}
        ]}"#;
        let err = Schema::from_str(embeds).expect_err("infinite size");
        assert_eq!(err.kind(), ErrorKind::Schema);
        assert!(err.to_string().contains("embeds itself"));

        let broken = r#"{"records": [
            {"name": "a", "fields": [{"name": "b", "kind": "embedded", "type": "b"}]},
            {"name": "b", "fields": [{"name": "a", "kind": "record", "type": "a"}]}
        ]}"#;
        Schema::from_str(broken).expect("pointer breaks the cycle");
    }

    #[test]
    fn rejects_duplicates_and_bad_widths() {
        let dup = r#"{"records": [
            {"name": "a", "fields": []},
            {"name": "a", "fields": []}
        ]}"#;
        assert!(Schema::from_str(dup).unwrap_err().to_string().contains("duplicate record"));

        let width = r#"{"records": [{"name": "a", "fields": [
            {"name": "x", "kind": "integer", "width": "u64"}
        ]}]}"#;
        let err = Schema::from_str(width).expect_err("width");
        assert_eq!(err.field(), Some("x"));

        let zero = r#"{"records": [{"name": "a", "fields": [
            {"name": "x", "kind": "fixed_string", "capacity": 0}
        ]}]}"#;
        assert_eq!(Schema::from_str(zero).unwrap_err().kind(), ErrorKind::Schema);
    }

    #[test]
    fn require_lists_known_types() {
        let schema = Schema::from_str(SCHEMA).expect("schema");
        let err = schema.require("nope").expect_err("missing");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.hint().unwrap().contains("var_list"));
    }
}
