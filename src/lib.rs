pub mod analyze;
pub mod config;
pub mod error;
pub mod fetch;
pub mod report;
pub mod table;

pub use analyze::{Analyzer, DerivedTable, DuplicatePolicy, RegionValue};
pub use error::{TableError, TableResult};
pub use table::{load_table, read_table, RawTable, ReaderOptions};
