//! Standard exit codes for CLI operations
//!
//! These exit codes follow Unix conventions and sysexits.h where applicable.

#![allow(dead_code)]

/// Success - operation completed without errors
pub const SUCCESS: i32 = 0;

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Parse error - a source identity or manifest id did not parse
pub const PARSE_ERROR: i32 = 2;

/// Validation error - the request contradicts the GDM invariants
pub const VALIDATION_ERROR: i32 = 3;

/// State store error - the GDM store is missing, corrupt, or unwritable
pub const STATE_ERROR: i32 = 4;

/// Conflict error - concurrent updates exhausted the retry budget
pub const CONFLICT_ERROR: i32 = 5;

/// Usage error - invalid arguments or options (following sysexits.h convention)
pub const USAGE_ERROR: i32 = 64;
