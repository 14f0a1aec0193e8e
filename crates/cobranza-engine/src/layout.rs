//! Per-vendor layout cloning into a scratch sheet.
//!
//! A source sheet and its scratch copy live in the same workbook, so a clone runs in two
//! phases: [`LayoutSnapshot::capture`] reads everything it needs from the source, then
//! [`LayoutSnapshot::apply`] writes it into the scratch sheet.

use std::sync::OnceLock;

use cobranza_host::{Clip, HostError, Sheet, Workbook};
use cobranza_model::{column_index, CellAddr, CellRange, PageAttribute, PageValue, RowRange};
use regex::Regex;

use crate::report::StepReport;

fn a1_cell_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$?([A-Z]+)\$?(\d+)").expect("valid regex"))
}

/// Rightmost column of a print area such as `$A$1:$H$40`.
///
/// Needs at least two cell references; the last one supplies the column.
pub fn print_area_last_col(area: &str) -> Option<u32> {
    let refs: Vec<_> = a1_cell_re().captures_iter(area).collect();
    if refs.len() < 2 {
        return None;
    }
    column_index(&refs.last()?[1]).ok()
}

/// Rightmost column a clone preserves: from the print area, else the used range.
pub fn preserved_last_col(source: &dyn Sheet) -> u32 {
    let from_area = match source.page_attribute(PageAttribute::PrintArea) {
        Ok(PageValue::Text(area)) => print_area_last_col(&area),
        _ => None,
    };
    from_area
        .or_else(|| source.used_range().map(|r| r.end_col))
        .unwrap_or(1)
        .max(1)
}

#[derive(Debug, Clone)]
struct RowsCopy {
    clip: Clip,
    heights: Vec<Option<f64>>,
}

/// Everything a clone needs from its source sheet.
#[derive(Debug, Clone)]
pub struct LayoutSnapshot {
    last_col: u32,
    header: Option<RowsCopy>,
    block: RowsCopy,
    widths: Vec<Option<f64>>,
    page: Vec<(PageAttribute, PageValue)>,
    report: StepReport,
}

impl LayoutSnapshot {
    /// Copy `block` (and `header`, placed above it) out of `source`.
    ///
    /// Copy failures are fatal. Unreadable heights, widths and page attributes are
    /// recorded and skipped at apply time.
    pub fn capture(source: &dyn Sheet, block: RowRange, header: Option<RowRange>) -> Result<Self, HostError> {
        let last_col = preserved_last_col(source);
        let mut report = StepReport::new("layout");

        let copy_rows = |rows: RowRange, report: &mut StepReport| -> Result<RowsCopy, HostError> {
            let range = CellRange::new(CellAddr::new(rows.start, 1), CellAddr::new(rows.end, last_col));
            let clip = source.copy_range(range)?;
            let heights = rows
                .iter()
                .map(|row| match source.row_height(row) {
                    Ok(h) => Some(h),
                    Err(err) => {
                        report.fail(format!("{}!row {row}", source.name()), err.to_string());
                        None
                    }
                })
                .collect();
            Ok(RowsCopy { clip, heights })
        };

        let header = header.map(|rows| copy_rows(rows, &mut report)).transpose()?;
        let block = copy_rows(block, &mut report)?;

        let widths = (1..=last_col)
            .map(|col| match source.column_width(col) {
                Ok(w) => Some(w),
                Err(err) => {
                    report.fail(format!("{}!col {col}", source.name()), err.to_string());
                    None
                }
            })
            .collect();

        let page = PageAttribute::MIRRORED
            .into_iter()
            .filter_map(|attribute| match source.page_attribute(attribute) {
                Ok(value) => Some((attribute, value)),
                Err(err) => {
                    report.fail(format!("page:{attribute}"), err.to_string());
                    None
                }
            })
            .collect();

        Ok(Self {
            last_col,
            header,
            block,
            widths,
            page,
            report,
        })
    }

    pub fn last_col(&self) -> u32 {
        self.last_col
    }

    pub fn header_rows(&self) -> u32 {
        self.header.as_ref().map_or(0, |h| h.clip.height())
    }

    /// Rows of the copied region on the scratch sheet.
    pub fn total_rows(&self) -> u32 {
        (self.header_rows() + self.block.clip.height()).max(1)
    }

    /// Paste header and block at `A1`, then replicate heights, widths and page setup.
    ///
    /// The print area covers exactly the copied region; print-title rows repeat the header.
    pub fn apply(self, scratch: &mut dyn Sheet) -> Result<StepReport, HostError> {
        let header_rows = self.header_rows();
        let total_rows = self.total_rows();
        let Self {
            last_col,
            header,
            block,
            widths,
            page,
            mut report,
        } = self;
        let name = scratch.name().to_string();

        let mut next_row = 1;
        for rows in header.iter().chain(std::iter::once(&block)) {
            scratch.paste(&rows.clip, CellAddr::new(next_row, 1))?;
            for (offset, height) in rows.heights.iter().enumerate() {
                let row = next_row + offset as u32;
                if let Some(height) = height {
                    let result = scratch.set_row_height(row, *height);
                    report.record(|| format!("{name}!row {row}"), result);
                }
            }
            next_row += rows.clip.height();
        }

        for (i, width) in widths.iter().enumerate() {
            let col = i as u32 + 1;
            if let Some(width) = width {
                let result = scratch.set_column_width(col, *width);
                report.record(|| format!("{name}!col {col}"), result);
            }
        }

        let title_rows = if header_rows > 0 {
            RowRange::new(1, header_rows).to_a1_absolute()
        } else {
            String::new()
        };
        let area = CellRange::new(CellAddr::new(1, 1), CellAddr::new(total_rows, last_col));

        let computed = [
            (PageAttribute::PrintTitleRows, PageValue::Text(title_rows)),
            (PageAttribute::PrintArea, PageValue::Text(area.to_a1_absolute())),
        ];
        for (attribute, value) in page.into_iter().chain(computed) {
            let result = scratch.set_page_attribute(attribute, value);
            report.record(|| format!("page:{attribute}"), result);
        }

        Ok(report)
    }
}

/// Clone `block` of sheet `source` into sheet `scratch` of the same workbook.
pub fn clone_layout(
    workbook: &mut dyn Workbook,
    source: usize,
    scratch: usize,
    block: RowRange,
    header: Option<RowRange>,
) -> Result<StepReport, HostError> {
    let snapshot = LayoutSnapshot::capture(workbook.sheet(source)?, block, header)?;
    snapshot.apply(workbook.sheet_mut(scratch)?)
}

const SCRATCH_PREFIX: &str = "_tmp_";

/// A temporary sheet deleted when the guard drops.
pub struct ScratchSheet<'a> {
    workbook: &'a mut dyn Workbook,
    index: usize,
}

impl<'a> ScratchSheet<'a> {
    /// Append a sheet named `_tmp_<label>`, suffixing `_<n>` while the name is taken.
    pub fn create(workbook: &'a mut dyn Workbook, label: &str) -> Result<Self, HostError> {
        let label: String = label.chars().take(20).collect();
        let label = if label.is_empty() { "VEN".to_string() } else { label };
        let base = format!("{SCRATCH_PREFIX}{label}");
        let short: String = base.chars().take(18).collect();

        let mut name = base.clone();
        let mut suffix = 1;
        loop {
            match workbook.add_sheet(&name) {
                Ok(index) => {
                    log::debug!("[layout] created scratch sheet {name}");
                    return Ok(Self { workbook, index });
                }
                Err(HostError::DuplicateSheetName(_)) if suffix < 100 => {
                    name = format!("{short}_{suffix}");
                    suffix += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn workbook(&mut self) -> &mut dyn Workbook {
        &mut *self.workbook
    }

    pub fn sheet(&self) -> Result<&dyn Sheet, HostError> {
        self.workbook.sheet(self.index)
    }
}

impl Drop for ScratchSheet<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.workbook.delete_sheet(self.index) {
            log::warn!("[layout] failed to delete scratch sheet #{}: {err}", self.index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn print_area_column_comes_from_last_reference() {
        assert_eq!(print_area_last_col("$A$1:$H$40"), Some(8));
        assert_eq!(print_area_last_col("A1:AB9"), Some(28));
        assert_eq!(print_area_last_col("$C$3"), None);
        assert_eq!(print_area_last_col(""), None);
    }
}
