//! Legacy store access.
//!
//! The legacy store is the old `FFNT.sqlite` file. It is opened read-only
//! through a single-connection SQLx pool, so every query observes the same
//! connection and closing the pool releases the file.

mod sqlite;

pub use sqlite::SqliteSource;
