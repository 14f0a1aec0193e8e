//! Vendor-block segmentation.
//!
//! A block opens on a row containing the vendor marker and closes on the first later row
//! matching `<balance phrase> <label>`. Rows outside blocks are ignored.

use cobranza_host::{HostError, Sheet};
use cobranza_model::VendorBlock;
use regex::Regex;

use crate::config::MarkerConfig;
use crate::grid::Grid;
use crate::{Error, Result};

/// Marker patterns compiled from [`MarkerConfig`].
#[derive(Debug, Clone)]
pub struct Markers {
    /// `\bVendor\b[:\s]*`, case-insensitive.
    pub vendor: Regex,
    /// `\bBalance\s*for\b[:\s]*(label)`, case-insensitive, anywhere in a row.
    pub block_end: Regex,
    /// `^\s*Balance\s+for\s+(label)\s*$`, case-insensitive, a whole cell.
    pub balance_cell: Regex,
}

impl Markers {
    pub fn compile(markers: &MarkerConfig) -> Result<Self> {
        let words: Vec<String> = markers
            .balance
            .split_whitespace()
            .map(regex::escape)
            .collect();
        if words.is_empty() {
            return Err(Error::Config("balance marker is empty".to_string()));
        }
        let vendor = regex::escape(markers.vendor.trim());

        let build = |pattern: String| Regex::new(&pattern).map_err(|err| Error::Config(err.to_string()));
        Ok(Self {
            vendor: build(format!(r"(?i)\b{vendor}\b[:\s]*"))?,
            block_end: build(format!(r"(?i)\b{}\b[:\s]*(.+?)\s*$", words.join(r"\s*")))?,
            balance_cell: build(format!(r"(?i)^\s*{}\s+(.+?)\s*$", words.join(r"\s+")))?,
        })
    }
}

#[derive(Debug)]
enum ScanState {
    SeekingStart,
    InBlock { row_start: u32, label: Option<String> },
}

#[derive(Debug, Clone)]
pub struct BlockDetector {
    markers: Markers,
}

impl BlockDetector {
    pub fn new(markers: Markers) -> Self {
        Self { markers }
    }

    pub fn detect_sheet(&self, sheet: &dyn Sheet) -> Result<Vec<VendorBlock>, HostError> {
        Ok(match Grid::capture(sheet)? {
            Some(grid) => self.detect(sheet.name(), &grid),
            None => Vec::new(),
        })
    }

    /// Blocks of `grid` in scan order.
    ///
    /// A row matching both markers only opens a block: the end pattern is not evaluated on the
    /// row that opened it.
    pub fn detect(&self, sheet_name: &str, grid: &Grid) -> Vec<VendorBlock> {
        let mut blocks = Vec::new();
        let mut state = ScanState::SeekingStart;

        for (row, cells) in grid.rows() {
            let text = Grid::row_text(cells);
            match &mut state {
                ScanState::SeekingStart => {
                    if text.is_empty() {
                        continue;
                    }
                    if let Some(m) = self.markers.vendor.find(&text) {
                        let after = text[m.end()..].trim();
                        let label = if after.is_empty() { text.clone() } else { after.to_string() };
                        state = ScanState::InBlock {
                            row_start: row,
                            label: Some(label),
                        };
                    }
                }
                ScanState::InBlock { row_start, label } => {
                    if let Some(caps) = self.markers.block_end.captures(&text) {
                        let end_label = caps.get(1).map(|m| m.as_str().trim().to_string());
                        let name = label
                            .take()
                            .filter(|l| !l.is_empty())
                            .or(end_label.filter(|l| !l.is_empty()))
                            .unwrap_or_else(|| text.clone());
                        blocks.push(VendorBlock::new(sheet_name, name.trim(), *row_start, row));
                        state = ScanState::SeekingStart;
                    }
                }
            }
        }

        if let ScanState::InBlock { row_start, label } = state {
            let name = label
                .filter(|l| !l.trim().is_empty())
                .unwrap_or_else(|| format!("Vendor_{row_start}"));
            let last_row = grid.range().end_row;
            blocks.push(VendorBlock::new(sheet_name, name.trim(), row_start, last_row));
        }

        blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cobranza_model::{CellAddr, CellRange, CellValue};
    use pretty_assertions::assert_eq;

    fn detector() -> BlockDetector {
        BlockDetector::new(Markers::compile(&MarkerConfig::default()).unwrap())
    }

    fn grid(rows: &[&[&str]]) -> Grid {
        let width = rows.iter().map(|r| r.len()).max().unwrap_or(1).max(1) as u32;
        let range = CellRange::new(CellAddr::new(1, 1), CellAddr::new(rows.len() as u32, width));
        let values = rows
            .iter()
            .map(|r| {
                let mut row: Vec<CellValue> = r.iter().map(|s| CellValue::from(*s)).collect();
                row.resize(width as usize, CellValue::Empty);
                row
            })
            .collect();
        Grid::from_rows(range, values)
    }

    fn spans(blocks: &[VendorBlock]) -> Vec<(String, u32, u32)> {
        blocks
            .iter()
            .map(|b| (b.vendor_name.clone(), b.row_start, b.row_end))
            .collect()
    }

    #[test]
    fn single_block_spans_marker_rows() {
        let g = grid(&[&["Vendor A"], &["item", "10"], &["Balance for A", "10"]]);
        let blocks = detector().detect("Hoja1", &g);
        assert_eq!(spans(&blocks), vec![("A".to_string(), 1, 3)]);
        assert_eq!(blocks[0].sheet_name, "Hoja1");
    }

    #[test]
    fn start_label_wins_over_end_label() {
        let g = grid(&[&["Vendor:", "PITER HUAYTA"], &["Balance for PITER"]]);
        assert_eq!(spans(&detector().detect("S", &g)), vec![("PITER HUAYTA".to_string(), 1, 2)]);
    }

    #[test]
    fn bare_marker_uses_full_row_text() {
        let g = grid(&[&["Vendor"], &["Balance for X"]]);
        assert_eq!(spans(&detector().detect("S", &g)), vec![("Vendor".to_string(), 1, 2)]);
    }

    #[test]
    fn unterminated_block_runs_to_last_row() {
        let g = grid(&[
            &["Vendor A"],
            &["Balance for A"],
            &["Vendor B"],
            &["x"],
            &["y"],
        ]);
        assert_eq!(
            spans(&detector().detect("S", &g)),
            vec![("A".to_string(), 1, 2), ("B".to_string(), 3, 5)]
        );
    }

    #[test]
    fn rows_outside_blocks_are_ignored() {
        let g = grid(&[&["title"], &[""], &["Balance for nobody"], &["Vendor C"], &["Balance for C"]]);
        assert_eq!(spans(&detector().detect("S", &g)), vec![("C".to_string(), 4, 5)]);
    }

    #[test]
    fn row_with_both_markers_only_opens() {
        // The opening row is never tested for the end pattern; the block closes later.
        let g = grid(&[&["Vendor A Balance for A"], &["x"], &["Balance for A"]]);
        let blocks = detector().detect("S", &g);
        assert_eq!(spans(&blocks), vec![("A Balance for A".to_string(), 1, 3)]);
    }

    #[test]
    fn markers_are_case_insensitive_and_configurable() {
        let markers = MarkerConfig {
            vendor: "Vendedor".to_string(),
            balance: "Saldo para".to_string(),
            ..MarkerConfig::default()
        };
        let detector = BlockDetector::new(Markers::compile(&markers).unwrap());
        let g = grid(&[&["VENDEDOR: ROSA"], &["saldo para ROSA"]]);
        assert_eq!(spans(&detector.detect("S", &g)), vec![("ROSA".to_string(), 1, 2)]);
    }

    #[test]
    fn ids_are_unique_within_a_pass() {
        let g = grid(&[&["Vendor A"], &["Balance for A"], &["Vendor A"], &["Balance for A"]]);
        let blocks = detector().detect("S", &g);
        assert_ne!(blocks[0].id, blocks[1].id);
    }
}
