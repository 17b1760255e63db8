//! Deterministic, pure logic for the generation pipeline.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod error;
pub mod extract;
pub mod history;
pub mod language;
pub mod repair;
pub mod sanitize;
pub mod types;
