//! Spreadsheet-host capability consumed by the collection engine.
//!
//! The engine drives an opaque spreadsheet application through the traits in this crate.
//! [`memory`] provides a self-contained backend used by the CLI and the test suites.

mod capability;
mod error;
mod fs;
pub mod memory;
mod session;

pub use capability::{Clip, HostFactory, PasteKind, Sheet, SpreadsheetHost, Workbook};
pub use error::HostError;
pub use fs::atomic_write;
pub use session::{HostSession, OpenWorkbook};
