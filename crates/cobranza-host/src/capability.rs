//! The spreadsheet-host capability.
//!
//! A host is an opaque, single-apartment application that opens workbooks and exposes sheets
//! through a narrow set of typed operations. Indexing conventions:
//! - sheets are addressed by **0-based** position within a workbook
//! - rows and columns are **1-based**, as in the host itself

use std::path::Path;

use cobranza_model::{text, CellAddr, CellRange, CellValue, PageAttribute, PageValue, RowRange};
use serde::{Deserialize, Serialize};

use crate::HostError;

/// A rectangular copy of a sheet region, as held on the host clipboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    /// Row-major values; every row has the same length.
    pub values: Vec<Vec<CellValue>>,
    /// Merged regions, relative to the clip's top-left cell (`A1`).
    pub merged: Vec<CellRange>,
}

impl Clip {
    pub fn height(&self) -> u32 {
        self.values.len() as u32
    }

    pub fn width(&self) -> u32 {
        self.values.first().map(|r| r.len() as u32).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasteKind {
    /// Values and formats (`xlPasteAll`).
    All,
    /// Values only; merges are not reproduced.
    Values,
}

pub trait Sheet {
    fn name(&self) -> &str;

    fn rename(&mut self, name: &str) -> Result<(), HostError>;

    /// Bounding box of all non-empty cells, or `None` for a blank sheet.
    fn used_range(&self) -> Option<CellRange>;

    /// Row-major values of `range`; blanks are [`CellValue::Empty`].
    fn read_cells(&self, range: CellRange) -> Result<Vec<Vec<CellValue>>, HostError>;

    fn cell(&self, addr: CellAddr) -> Result<CellValue, HostError> {
        let mut rows = self.read_cells(CellRange::new(addr, addr))?;
        Ok(rows
            .pop()
            .and_then(|mut row| row.pop())
            .unwrap_or_default())
    }

    fn write_cell(&mut self, addr: CellAddr, value: CellValue) -> Result<(), HostError>;

    /// Remove all cell contents and merges.
    fn clear(&mut self) -> Result<(), HostError>;

    /// Copy `range` straight into `dest` with its top-left cell at `at`.
    fn copy_range_to(&self, range: CellRange, dest: &mut dyn Sheet, at: CellAddr) -> Result<(), HostError>;

    /// Receiving end of [`Sheet::copy_range_to`]: values and merges land at `at` without
    /// passing through the clipboard.
    fn receive_copy(&mut self, clip: &Clip, at: CellAddr) -> Result<(), HostError>;

    /// Copy `range` onto the application clipboard.
    fn copy_range(&self, range: CellRange) -> Result<Clip, HostError>;

    fn paste(&mut self, clip: &Clip, at: CellAddr) -> Result<(), HostError>;

    fn paste_special(&mut self, clip: &Clip, at: CellAddr, kind: PasteKind) -> Result<(), HostError>;

    /// Delete whole rows, shifting the rows below up.
    fn delete_rows(&mut self, rows: RowRange) -> Result<(), HostError>;

    fn unmerge_all(&mut self) -> Result<(), HostError>;

    /// Points.
    fn row_height(&self, row: u32) -> Result<f64, HostError>;
    fn set_row_height(&mut self, row: u32, height: f64) -> Result<(), HostError>;

    /// Character units.
    fn column_width(&self, col: u32) -> Result<f64, HostError>;
    fn set_column_width(&mut self, col: u32, width: f64) -> Result<(), HostError>;

    /// Number of drawing objects (text boxes and the like).
    fn shape_count(&self) -> usize;
    /// Text of a drawing object, or `None` if it carries no text frame.
    fn shape_text(&self, index: usize) -> Result<Option<String>, HostError>;
    fn set_shape_text(&mut self, index: usize, text: &str) -> Result<(), HostError>;

    fn page_attribute(&self, attribute: PageAttribute) -> Result<PageValue, HostError>;
    fn set_page_attribute(&mut self, attribute: PageAttribute, value: PageValue) -> Result<(), HostError>;

    /// Render the sheet as a paginated PDF honouring its current page setup.
    fn export_fixed_format(&self, path: &Path) -> Result<(), HostError>;
}

pub trait Workbook {
    fn path(&self) -> &Path;

    fn sheet_count(&self) -> usize;

    fn sheet(&self, index: usize) -> Result<&dyn Sheet, HostError>;

    fn sheet_mut(&mut self, index: usize) -> Result<&mut dyn Sheet, HostError>;

    /// Append a new blank sheet and return its index.
    fn add_sheet(&mut self, name: &str) -> Result<usize, HostError>;

    fn delete_sheet(&mut self, index: usize) -> Result<(), HostError>;

    fn save_as(&mut self, path: &Path) -> Result<(), HostError>;

    /// Close the workbook, writing it back to [`Workbook::path`] first when `save` is set.
    fn close(self: Box<Self>, save: bool) -> Result<(), HostError>;

    fn sheet_names(&self) -> Vec<String> {
        (0..self.sheet_count())
            .filter_map(|i| self.sheet(i).ok().map(|s| s.name().to_string()))
            .collect()
    }

    /// Index of the sheet whose name matches `name` case-insensitively.
    fn find_sheet(&self, name: &str) -> Option<usize> {
        (0..self.sheet_count()).find(|&i| {
            self.sheet(i)
                .map(|s| text::sheet_name_eq(s.name(), name))
                .unwrap_or(false)
        })
    }
}

/// One running host application instance.
pub trait SpreadsheetHost {
    fn open(&mut self, path: &Path, read_only: bool) -> Result<Box<dyn Workbook>, HostError>;

    /// Terminate the application. Calling it twice is a no-op.
    fn quit(&mut self) -> Result<(), HostError>;
}

/// Launches isolated host instances; shared across job workers.
pub trait HostFactory: Send + Sync {
    fn launch(&self) -> Result<Box<dyn SpreadsheetHost>, HostError>;
}
