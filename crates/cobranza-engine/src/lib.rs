//! Collection-ledger engine.
//!
//! Two workflows run on top of the spreadsheet-host capability in `cobranza-host`:
//!
//! - **copy**: paste a route ledger into the master workbook, drop its banner rows, restamp
//!   dates and titles, and push each vendor's balance into the route sheets
//!   ([`CopyPipeline`]).
//! - **export**: split a ledger into one PDF per vendor block, export the full route sheets,
//!   and merge the results into a summary and a consolidated document
//!   ([`DocumentAssembler`]).
//!
//! Each job drives its own host instance on its own thread ([`JobRunner`]).

pub mod alias;
pub mod archive;
pub mod assemble;
pub mod blocks;
pub mod config;
pub mod dates;
mod error;
pub mod grid;
pub mod job;
pub mod layout;
pub mod merge;
pub mod order;
pub mod pipeline;
pub mod progress;
pub mod redistribute;
pub mod report;

pub use alias::AliasResolver;
pub use archive::{archive_name, package_zip};
pub use assemble::{export, DocumentAssembler, DocumentId, ExportJob, GeneratedDocument};
pub use blocks::{BlockDetector, Markers};
pub use config::{resolve_default_master, Config};
pub use dates::{date_from_filename, date_tag, DateStamper};
pub use error::{Error, Result};
pub use grid::Grid;
pub use job::{JobHandle, JobRunner};
pub use layout::{clone_layout, LayoutSnapshot, ScratchSheet};
pub use merge::merge_pdfs;
pub use order::{preview_blocks, BlockSummary, DefaultOrder};
pub use pipeline::{CopyOptions, CopyOutcome, CopyPipeline, PasteStrategy, PipelineState};
pub use progress::{Progress, ProgressEvent, ProgressSink};
pub use redistribute::ValueRedistributor;
pub use report::{PartialFailure, StepReport};
