//! Core data model for collection-ledger workbooks.
//!
//! This crate is intentionally host-agnostic: it knows about cells, page setup and vendor
//! blocks, but nothing about how a spreadsheet application is driven.

pub mod address;
pub mod page;
pub mod text;
pub mod value;
pub mod vendor;

pub use address::{column_index, column_label, A1ParseError, CellAddr, CellRange, ColRange, RowRange};
pub use page::{
    HeaderFooterText, Orientation, PageAttribute, PageMargins, PageSetup, PageValue, PageValueError,
    PaperSize, Scaling,
};
pub use value::CellValue;
pub use vendor::{BlockId, TotalsTuple, VendorBlock, VendorTotals};
