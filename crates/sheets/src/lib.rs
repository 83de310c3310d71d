//! Spreadsheet-backed data-source adapter.
//!
//! [`source::DataSource`] is the seam the pipeline executes against; the
//! production implementation reads and writes a spreadsheet service via
//! [`client::SheetsClient`], and tests substitute in-memory fakes.

pub mod client;
pub mod error;
pub mod parse;
pub mod source;
pub mod spreadsheet;
