//! Core abstractions shared by the migrator, sources and destinations.
//!
//! - [`value`]: scalar value representation
//! - [`record`]: source rows, field mappings and renamed records
//! - [`traits`]: [`LegacySource`] and [`DestinationStore`]
//! - [`identifier`]: identifier validation and quoting

pub mod identifier;
pub mod record;
pub mod traits;
pub mod value;

pub use record::{FieldMapping, Record, SourceRow};
pub use traits::{DestinationStore, LegacySource};
pub use value::{SqlNullType, SqlValue};
