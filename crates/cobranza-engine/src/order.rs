//! Block preview and the default consolidated ordering.

use std::collections::HashMap;
use std::path::Path;

use cobranza_host::{HostFactory, HostSession, Workbook};
use cobranza_model::text::{self, strip_leading_code};
use cobranza_model::{BlockId, VendorBlock};
use serde::Serialize;

use crate::assemble::{display_name, open_error};
use crate::blocks::{BlockDetector, Markers};
use crate::config::{Config, OrderEntry};
use crate::{Error, Result};

/// Name used when comparing against the default order: code stripped, then normalized.
pub fn order_key(name: &str) -> String {
    text::normalize(strip_leading_code(name))
}

/// Rank lookup built from the configured default order; aliases share their entry's rank.
#[derive(Debug, Clone, Default)]
pub struct DefaultOrder {
    ranks: HashMap<String, usize>,
}

impl DefaultOrder {
    pub fn new(entries: &[OrderEntry]) -> Self {
        let mut ranks = HashMap::new();
        for (rank, entry) in entries.iter().enumerate() {
            for name in std::iter::once(&entry.name).chain(&entry.aliases) {
                ranks.entry(order_key(name)).or_insert(rank);
            }
        }
        Self { ranks }
    }

    pub fn rank(&self, name: &str) -> Option<usize> {
        self.ranks.get(&order_key(name)).copied()
    }

    /// Stable sort: known names by rank, unknown names after them in their current order.
    pub fn sort_by_key<T>(&self, items: &mut [T], name: impl Fn(&T) -> &str) {
        items.sort_by_key(|item| self.rank(name(item)).unwrap_or(usize::MAX));
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockSummary {
    pub id: BlockId,
    /// Vendor name without its leading code.
    pub name: String,
    pub sheet: String,
    pub row_start: u32,
    pub row_end: u32,
}

impl From<&VendorBlock> for BlockSummary {
    fn from(block: &VendorBlock) -> Self {
        Self {
            id: block.id,
            name: display_name(&block.vendor_name).to_string(),
            sheet: block.sheet_name.clone(),
            row_start: block.row_start,
            row_end: block.row_end,
        }
    }
}

/// Blocks of every eligible sheet of an open workbook, in default consolidated order.
///
/// Sheets listed as full sheets are skipped; `target_sheet` restricts the scan to one sheet.
pub fn list_blocks(workbook: &dyn Workbook, config: &Config, target_sheet: Option<&str>) -> Result<Vec<BlockSummary>> {
    let detector = BlockDetector::new(Markers::compile(&config.markers)?);
    let target = match target_sheet {
        Some(name) => Some(
            workbook
                .find_sheet(name)
                .ok_or_else(|| Error::SheetNotFound(name.to_string()))?,
        ),
        None => None,
    };

    let mut summaries = Vec::new();
    for index in 0..workbook.sheet_count() {
        if target.is_some_and(|t| t != index) {
            continue;
        }
        let sheet = workbook.sheet(index).map_err(Error::host("read sheet"))?;
        let full = config
            .export
            .full_sheets
            .iter()
            .any(|full| text::sheet_name_eq(full, sheet.name()));
        if full {
            continue;
        }
        let blocks = detector
            .detect_sheet(sheet)
            .map_err(Error::host(format!("scan sheet {}", sheet.name())))?;
        summaries.extend(blocks.iter().map(BlockSummary::from));
    }

    DefaultOrder::new(&config.consolidated_order).sort_by_key(&mut summaries, |s| s.name.as_str());
    Ok(summaries)
}

/// Open `path` read-only in a fresh host and list its blocks.
pub fn preview_blocks(
    factory: &dyn HostFactory,
    config: &Config,
    path: &Path,
    target_sheet: Option<&str>,
) -> Result<Vec<BlockSummary>> {
    if !path.is_file() {
        return Err(Error::HostOpen {
            path: path.to_path_buf(),
            reason: "file not found".to_string(),
        });
    }
    let mut session = HostSession::launch(factory).map_err(Error::host("launch host"))?;
    let workbook = session.open(path, true).map_err(|err| open_error(path, err))?;
    list_blocks(&*workbook, config, target_sheet)
}
