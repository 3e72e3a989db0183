//! Purpose: JSON text boundary shared by the typed API, schema loader and CLI.
//! Exports: `parse` module with the text decode entrypoint and failure categories.
//! Role: Single seam for turning text into `serde_json::Value` with domain errors.
//! Invariants: Text decoding goes through this module; the engine itself only sees `Value`.
//! Invariants: Helper APIs stay small and deterministic (no hidden global state).

pub mod parse;
