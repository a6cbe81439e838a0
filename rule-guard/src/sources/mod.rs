//! Loaders that turn columnar data into [`Table`](crate::dataset::Table)s.
//!
//! The engine works on row-oriented [`Datasets`](crate::dataset::Datasets);
//! producers that already hold Arrow data convert it here instead of
//! round-tripping through JSON.

mod arrow;

pub use self::arrow::{insert_batches, table_from_batches};
