//! Rectangular read access to a sheet's used range.

use cobranza_host::{HostError, Sheet};
use cobranza_model::{CellAddr, CellRange, CellValue};

/// Values of a sheet's used range, read in one host call.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    range: CellRange,
    rows: Vec<Vec<CellValue>>,
}

impl Grid {
    /// Read the whole used range; `None` for a blank sheet.
    pub fn capture(sheet: &dyn Sheet) -> Result<Option<Self>, HostError> {
        let Some(range) = sheet.used_range() else {
            return Ok(None);
        };
        let rows = sheet.read_cells(range)?;
        Ok(Some(Self { range, rows }))
    }

    pub fn from_rows(range: CellRange, rows: Vec<Vec<CellValue>>) -> Self {
        Self { range, rows }
    }

    pub fn range(&self) -> CellRange {
        self.range
    }

    pub fn get(&self, addr: CellAddr) -> &CellValue {
        static EMPTY: CellValue = CellValue::Empty;
        if !self.range.contains(addr) {
            return &EMPTY;
        }
        let r = (addr.row - self.range.start_row) as usize;
        let c = (addr.col - self.range.start_col) as usize;
        self.rows
            .get(r)
            .and_then(|row| row.get(c))
            .unwrap_or(&EMPTY)
    }

    /// `(sheet row, cells)` pairs, top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = (u32, &[CellValue])> + '_ {
        let start = self.range.start_row;
        self.rows
            .iter()
            .enumerate()
            .map(move |(i, row)| (start + i as u32, row.as_slice()))
    }

    /// Space-joined rendering of a row's cells, trimmed. Blank cells contribute `""`.
    pub fn row_text(cells: &[CellValue]) -> String {
        cells
            .iter()
            .map(CellValue::display)
            .collect::<Vec<_>>()
            .join(" ")
            .trim()
            .to_string()
    }
}
