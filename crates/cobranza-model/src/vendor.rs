use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::address::RowRange;

/// Namespace for deterministic block ids.
const BLOCK_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6c1f_5a0e_93d2_4b7a_8e41_2f0b_c7d9_a316);

/// Stable identifier of a [`VendorBlock`].
///
/// Derived from `(sheet, row_start, row_end, vendor_name)` so the same input yields the same
/// ids across runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(pub Uuid);

impl BlockId {
    pub fn derive(sheet_name: &str, row_start: u32, row_end: u32, vendor_name: &str) -> Self {
        let key = format!("{sheet_name}\0{row_start}\0{row_end}\0{vendor_name}");
        BlockId(Uuid::new_v5(&BLOCK_ID_NAMESPACE, key.as_bytes()))
    }

    /// Parse the hyphenated form produced by `Display`.
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s.trim()).ok().map(BlockId)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.hyphenated(), f)
    }
}

/// One vendor's ledger record inside a sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorBlock {
    pub id: BlockId,
    /// Raw label as found in the sheet.
    pub vendor_name: String,
    pub sheet_name: String,
    pub row_start: u32,
    pub row_end: u32,
}

impl VendorBlock {
    /// Build a block; `row_start`/`row_end` are swapped if given out of order.
    pub fn new(sheet_name: impl Into<String>, vendor_name: impl Into<String>, row_start: u32, row_end: u32) -> Self {
        let sheet_name = sheet_name.into();
        let vendor_name = vendor_name.into();
        let rows = RowRange::new(row_start, row_end);
        Self {
            id: BlockId::derive(&sheet_name, rows.start, rows.end, &vendor_name),
            vendor_name,
            sheet_name,
            row_start: rows.start,
            row_end: rows.end,
        }
    }

    pub fn rows(&self) -> RowRange {
        RowRange::new(self.row_start, self.row_end)
    }
}

/// Up to three numbers read to the right of a balance label; missing slots are `None`.
pub type TotalsTuple = [Option<f64>; 3];

/// Normalized vendor key -> totals read from a balance row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VendorTotals {
    entries: BTreeMap<String, TotalsTuple>,
}

impl VendorTotals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert, overwriting any earlier entry for the same key.
    pub fn insert(&mut self, key: impl Into<String>, values: TotalsTuple) {
        self.entries.insert(key.into(), values);
    }

    pub fn get(&self, key: &str) -> Option<&TotalsTuple> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TotalsTuple)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl FromIterator<(String, TotalsTuple)> for VendorTotals {
    fn from_iter<I: IntoIterator<Item = (String, TotalsTuple)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
