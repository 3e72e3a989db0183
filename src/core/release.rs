// Release walker: frees every owned string, child record and pointer array under
// a root. Iterative (explicit work stack) and idempotent via the released flag.
use crate::core::record::{FieldValue, Record};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ReleaseStats {
    pub strings: usize,
    pub records: usize,
    pub arrays: usize,
}

impl ReleaseStats {
    pub fn total(&self) -> usize {
        self.strings + self.records + self.arrays
    }

    fn absorb(&mut self, other: ReleaseStats) {
        self.strings += other.strings;
        self.records += other.records;
        self.arrays += other.arrays;
    }
}

/// Releases everything `root` owns. A second call on the same root is a no-op.
///
/// `root` itself stays valid (inline fields keep their values); only optional
/// references become absent and arrays become empty.
pub fn release(root: &mut Record) -> ReleaseStats {
    if root.is_released() {
        return ReleaseStats::default();
    }
    let (mut stats, mut stack) = detach(root);
    root.mark_released();

    // Each popped child has already lost its own children to the stack, so
    // dropping it at the end of the iteration frees only its inline storage.
    while let Some(mut child) = stack.pop() {
        let (child_stats, grandchildren) = detach(&mut child);
        stats.absorb(child_stats);
        stats.records += 1;
        stack.extend(grandchildren);
    }
    tracing::debug!(
        record = root.name(),
        strings = stats.strings,
        records = stats.records,
        arrays = stats.arrays,
        "released record"
    );
    stats
}

// Takes the owned children out of one record. Strings and array spines are
// dropped here; child records are returned so the caller can keep walking
// without recursion. Embedded records stay in place and are emptied the same
// way; their nesting is bounded by the type graph, not by the data.
fn detach(record: &mut Record) -> (ReleaseStats, Vec<Record>) {
    let mut stats = ReleaseStats::default();
    let mut children = Vec::new();
    detach_into(record, &mut stats, &mut children);
    (stats, children)
}

fn detach_into(record: &mut Record, stats: &mut ReleaseStats, children: &mut Vec<Record>) {
    for value in record.values_mut() {
        match value {
            FieldValue::OwnedString(slot) => {
                if slot.take().is_some() {
                    stats.strings += 1;
                }
            }
            FieldValue::Record(slot) => {
                if let Some(child) = slot.take() {
                    children.push(*child);
                }
            }
            FieldValue::Embedded(child) => {
                detach_into(child, stats, children);
                child.mark_released();
            }
            FieldValue::Array(items) => {
                children.extend(items.take());
                stats.arrays += 1;
            }
            FieldValue::Integer(_) | FieldValue::Enum(_) | FieldValue::FixedString(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ReleaseStats, release};
    use crate::core::de::deserialize;
    use crate::core::options::DecodeOptions;
    use crate::core::record::{FieldValue, PointerArray, Record};
    use crate::core::schema::{FieldKind, IntWidth, NestedType, RecordDescriptor};
    use serde_json::json;
    use std::sync::{Arc, OnceLock};

    fn leaf() -> Arc<RecordDescriptor> {
        RecordDescriptor::builder("leaf")
            .field("a", FieldKind::Integer(IntWidth::I32))
            .field("label", FieldKind::OwnedString)
            .build()
            .expect("descriptor")
    }

    fn branch() -> Arc<RecordDescriptor> {
        RecordDescriptor::builder("branch")
            .field("id", FieldKind::Integer(IntWidth::I32))
            .field("leaves", FieldKind::Array(leaf().into()))
            .build()
            .expect("descriptor")
    }

    fn tree() -> Arc<RecordDescriptor> {
        RecordDescriptor::builder("tree")
            .field("name", FieldKind::OwnedString)
            .field("first", FieldKind::Record(leaf().into()))
            .field("branches", FieldKind::Array(branch().into()))
            .build()
            .expect("descriptor")
    }

    fn decoded() -> Record {
        let doc = json!({
            "name": "root",
            "first": {"a": 1, "label": "first"},
            "branches": [
                {"id": 1, "leaves": [{"a": 10, "label": "x"}, {"a": 11}]},
                {"id": 2, "leaves": []}
            ]
        });
        deserialize(&doc, &tree(), &DecodeOptions::default()).expect("decode")
    }

    #[test]
    fn counts_every_owned_allocation() {
        let mut root = decoded();
        let stats = release(&mut root);
        assert_eq!(
            stats,
            ReleaseStats {
                // "root", "first", "x"
                strings: 3,
                // first + 2 branches + 2 leaves
                records: 5,
                // root.branches + 2 x branch.leaves
                arrays: 3,
            }
        );
        assert_eq!(stats.total(), 11);
    }

    #[test]
    fn release_leaves_optional_fields_absent() {
        let mut root = decoded();
        release(&mut root);
        assert!(root.is_released());
        assert_eq!(root.get("name"), Some(&FieldValue::OwnedString(None)));
        assert!(root.get("first").and_then(FieldValue::as_record).is_none());
        assert!(root.get("branches").and_then(FieldValue::as_array).unwrap().is_empty());
    }

    #[test]
    fn second_release_is_a_no_op() {
        let mut root = decoded();
        let first = release(&mut root);
        assert!(first.total() > 0);
        assert_eq!(release(&mut root), ReleaseStats::default());
    }

    #[test]
    fn tolerates_absent_optionals() {
        let doc = json!({"branches": []});
        let mut root = deserialize(&doc, &tree(), &DecodeOptions::default()).expect("decode");
        let stats = release(&mut root);
        assert_eq!(stats, ReleaseStats { strings: 0, records: 0, arrays: 1 });
    }

    #[test]
    fn wide_arrays_release_every_child() {
        let node = RecordDescriptor::builder("node")
            .field("v", FieldKind::Integer(IntWidth::I32))
            .field("next", FieldKind::Array(leaf().into()))
            .build()
            .expect("descriptor");
        let mut root = Record::new(node).expect("record");
        let mut items = PointerArray::new();
        for a in 0..10_000 {
            let mut child = Record::new(leaf()).expect("record");
            child.set("a", FieldValue::Integer(a)).expect("set");
            items.push(child);
        }
        root.set("next", FieldValue::Array(items)).expect("set");
        let stats = release(&mut root);
        assert_eq!(stats.records, 10_000);
        assert_eq!(stats.arrays, 1);
    }

    fn tree_node() -> &'static Arc<RecordDescriptor> {
        static NODE: OnceLock<Arc<RecordDescriptor>> = OnceLock::new();
        NODE.get_or_init(|| {
            RecordDescriptor::builder("tree_node")
                .field("label", FieldKind::OwnedString)
                .field("children", FieldKind::Array(NestedType::lazy(tree_node)))
                .build()
                .expect("descriptor")
        })
    }

    #[test]
    fn releases_recursive_trees() {
        let doc = json!({
            "label": "root",
            "children": [
                {"label": "a", "children": [{"children": []}, {"label": "a2", "children": []}]},
                {"children": [{"label": "b1", "children": []}]}
            ]
        });
        let mut root = deserialize(&doc, tree_node(), &DecodeOptions::default()).expect("decode");
        let stats = release(&mut root);
        // "root", "a", "a2", "b1"
        assert_eq!(stats.strings, 4);
        assert_eq!(stats.records, 5);
        // one children array per node, root included
        assert_eq!(stats.arrays, 6);
        assert_eq!(release(&mut root), ReleaseStats::default());
    }

    #[test]
    fn deep_recursive_chains_release_without_recursion() {
        let mut root = Record::new(Arc::clone(tree_node())).expect("record");
        for _ in 0..100_000 {
            let mut parent = Record::new(Arc::clone(tree_node())).expect("record");
            parent
                .set("children", FieldValue::Array(PointerArray::from(vec![root])))
                .expect("set");
            root = parent;
        }
        let stats = release(&mut root);
        assert_eq!(stats.records, 100_000);
        assert_eq!(stats.arrays, 100_001);
    }

    #[test]
    fn embedded_children_are_emptied_in_place() {
        let outer = RecordDescriptor::builder("outer")
            .field("inner", FieldKind::Embedded(leaf().into()))
            .field("rest", FieldKind::Array(leaf().into()))
            .build()
            .expect("descriptor");
        let doc = json!({"inner": {"a": 4, "label": "in"}, "rest": [{"a": 5, "label": "r"}]});
        let mut root = deserialize(&doc, &outer, &DecodeOptions::default()).expect("decode");
        let stats = release(&mut root);
        assert_eq!(stats, ReleaseStats { strings: 2, records: 1, arrays: 1 });

        let inner = root.get("inner").and_then(FieldValue::as_record).expect("still inline");
        assert_eq!(inner.get("a"), Some(&FieldValue::Integer(4)));
        assert_eq!(inner.get("label"), Some(&FieldValue::OwnedString(None)));
    }
}
