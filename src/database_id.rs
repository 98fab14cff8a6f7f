//! Defines the ID type used for database records.

/// Alias for the type used for database IDs.
pub type DatabaseID = i64;
