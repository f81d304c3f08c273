//! Exit codes. Part of the public contract of the `testdeck` binary.

pub const OK: i32 = 0;
pub const VALIDATION_FAILED: i32 = 1; // Request or context rejected
pub const CONFIG_ERROR: i32 = 2; // Bad config, unreadable input, unknown project
pub const UPSTREAM_ERROR: i32 = 3; // Dataset could not be loaded or read
