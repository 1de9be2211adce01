//! Data source resolution.
//!
//! Loads tabular files into immutable [`Table`]s, fingerprints them and
//! memoizes parses for the lifetime of one [`TableCache`].

mod cache;
mod fingerprint;
mod loader;
mod table;

pub use cache::{resolve_path, ImageHandle, LoadedTable, TableCache};
pub use fingerprint::{FileStat, Fingerprint};
pub use loader::{read_table, SourceFormat};
pub use table::{format_number, Column, Table, DEFAULT_NA_VALUES};
