//! Tabular persistence for target records.
//!
//! The working dataset lives in two places:
//! - [`SheetClient`]: the remote spreadsheet behind a REST endpoint, read at
//!   the start of a run and updated with scraped content afterwards
//! - [`CsvStore`]: the local CSV file holding the fully enriched batch, which
//!   doubles as the resume point for interrupted runs
//!
//! Both map rows to `TargetRecord`s with the same column rules.

mod row;
pub mod sheet;
pub mod table;

pub use sheet::{BatchReceipt, SheetClient};
pub use table::CsvStore;
