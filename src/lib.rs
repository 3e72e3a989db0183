//! Purpose: Descriptor-driven marshaling between in-memory records and JSON trees.
//! Exports: `api` (stable surface), `core` (descriptor model and walks), `json` (text boundary).
//! Role: Library backing the `jsonable` CLI and any Rust caller with a descriptor table.
//! Invariants: One generic walk per direction; per-type code only supplies descriptors.
//! Invariants: Decoded records own all nested storage until dropped or released.
pub mod api;
pub mod core;
pub mod json;
