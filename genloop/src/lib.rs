//! Multi-round code generation with a generator/reviewer pair.
//!
//! Each round turns a free-form model response into a named, on-disk file set
//! and appends it to a lineage record. The architecture enforces a strict
//! separation:
//!
//! - **[`core`]**: Pure, deterministic logic (extraction, name sanitizing,
//!   history, repair planning). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (filesystem, child processes,
//!   config, prompts). Isolated so tests can swap the model backend.
//!
//! [`pipeline`] threads one run through both layers; the binaries wrap it and
//! the repair pass in a CLI.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod pipeline;
pub mod presets;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
