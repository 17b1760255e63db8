//! Stable exit codes for genloop CLI commands.

/// Command succeeded; for `genloop run`, every planned round completed.
pub const OK: i32 = 0;
/// Invalid arguments, config, layout, or any other error.
pub const INVALID: i32 = 1;
/// `genloop run` stopped early because a collaborator call failed.
pub const ABORTED: i32 = 3;
