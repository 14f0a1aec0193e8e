use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use cobranza_model::{CellAddr, CellRange, CellValue, PageAttribute, PageSetup, PageValue, RowRange};
use serde::{Deserialize, Serialize};

use super::fault::{FaultPlan, HostOp};
use super::pdf;
use crate::{Clip, HostError, PasteKind, Sheet};

/// Default row height in points.
pub const DEFAULT_ROW_HEIGHT: f64 = 15.0;
/// Default column width in character units.
pub const DEFAULT_COLUMN_WIDTH: f64 = 8.43;

/// A drawing object with an optional text frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub name: String,
    #[serde(default)]
    pub text: Option<String>,
}

/// Persisted form of one sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetData {
    pub name: String,
    #[serde(default, with = "cell_entries")]
    pub cells: BTreeMap<CellAddr, CellValue>,
    #[serde(default)]
    pub row_heights: BTreeMap<u32, f64>,
    #[serde(default)]
    pub column_widths: BTreeMap<u32, f64>,
    #[serde(default)]
    pub merged: Vec<CellRange>,
    #[serde(default)]
    pub shapes: Vec<Shape>,
    #[serde(default)]
    pub page_setup: PageSetup,
}

impl SheetData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cells: BTreeMap::new(),
            row_heights: BTreeMap::new(),
            column_widths: BTreeMap::new(),
            merged: Vec::new(),
            shapes: Vec::new(),
            page_setup: PageSetup::default(),
        }
    }

    pub fn get(&self, addr: CellAddr) -> CellValue {
        self.cells.get(&addr).cloned().unwrap_or_default()
    }

    /// Set one cell; empty values remove the cell.
    pub fn set(&mut self, row: u32, col: u32, value: impl Into<CellValue>) {
        let value = value.into();
        let addr = CellAddr::new(row, col);
        if value.is_empty() {
            self.cells.remove(&addr);
        } else {
            self.cells.insert(addr, value);
        }
    }

    /// Set consecutive cells of `row` starting at column `A`.
    pub fn set_row<V: Into<CellValue>>(&mut self, row: u32, values: impl IntoIterator<Item = V>) {
        for (i, value) in values.into_iter().enumerate() {
            self.set(row, i as u32 + 1, value);
        }
    }

    pub fn with_row<V: Into<CellValue>>(mut self, row: u32, values: impl IntoIterator<Item = V>) -> Self {
        self.set_row(row, values);
        self
    }

    pub fn merge(&mut self, range: CellRange) {
        self.merged.push(range.normalized());
    }

    pub fn add_shape(&mut self, name: impl Into<String>, text: Option<&str>) {
        self.shapes.push(Shape {
            name: name.into(),
            text: text.map(str::to_string),
        });
    }

    pub fn row_height(&self, row: u32) -> f64 {
        self.row_heights.get(&row).copied().unwrap_or(DEFAULT_ROW_HEIGHT)
    }

    pub fn column_width(&self, col: u32) -> f64 {
        self.column_widths.get(&col).copied().unwrap_or(DEFAULT_COLUMN_WIDTH)
    }

    pub fn used_range(&self) -> Option<CellRange> {
        let mut iter = self.cells.keys();
        let first = iter.next()?;
        let (mut r1, mut c1, mut r2, mut c2) = (first.row, first.col, first.row, first.col);
        for addr in iter {
            r1 = r1.min(addr.row);
            c1 = c1.min(addr.col);
            r2 = r2.max(addr.row);
            c2 = c2.max(addr.col);
        }
        Some(CellRange::new(CellAddr::new(r1, c1), CellAddr::new(r2, c2)))
    }

    fn clip(&self, range: CellRange) -> Clip {
        let range = range.normalized();
        let values = (range.start_row..=range.end_row)
            .map(|r| {
                (range.start_col..=range.end_col)
                    .map(|c| self.get(CellAddr::new(r, c)))
                    .collect()
            })
            .collect();
        let merged = self
            .merged
            .iter()
            .filter(|m| range.contains(m.start()) && range.contains(m.end()))
            .map(|m| {
                CellRange::new(
                    CellAddr::new(m.start_row - range.start_row + 1, m.start_col - range.start_col + 1),
                    CellAddr::new(m.end_row - range.start_row + 1, m.end_col - range.start_col + 1),
                )
            })
            .collect();
        Clip { values, merged }
    }

    fn apply_clip(&mut self, clip: &Clip, at: CellAddr, kind: PasteKind) {
        if clip.height() == 0 || clip.width() == 0 {
            return;
        }
        let target = CellRange::new(
            at,
            CellAddr::new(at.row + clip.height() - 1, at.col + clip.width() - 1),
        );
        self.merged.retain(|m| !overlaps(m, &target));

        for (dr, row) in clip.values.iter().enumerate() {
            for (dc, value) in row.iter().enumerate() {
                self.set(at.row + dr as u32, at.col + dc as u32, value.clone());
            }
        }

        if kind == PasteKind::All {
            for m in &clip.merged {
                self.merged.push(CellRange::new(
                    CellAddr::new(at.row + m.start_row - 1, at.col + m.start_col - 1),
                    CellAddr::new(at.row + m.end_row - 1, at.col + m.end_col - 1),
                ));
            }
        }
    }

    fn delete_rows_in(&mut self, rows: RowRange) -> Result<(), String> {
        if let Some(m) = self.merged.iter().find(|m| {
            let overlap = m.start_row <= rows.end && m.end_row >= rows.start;
            let contained = m.start_row >= rows.start && m.end_row <= rows.end;
            overlap && !contained
        }) {
            return Err(format!("cannot change part of merged cell {m}"));
        }

        let n = rows.count();
        self.cells = std::mem::take(&mut self.cells)
            .into_iter()
            .filter(|(addr, _)| addr.row < rows.start || addr.row > rows.end)
            .map(|(addr, v)| {
                if addr.row > rows.end {
                    (CellAddr::new(addr.row - n, addr.col), v)
                } else {
                    (addr, v)
                }
            })
            .collect();
        self.row_heights = std::mem::take(&mut self.row_heights)
            .into_iter()
            .filter(|(row, _)| *row < rows.start || *row > rows.end)
            .map(|(row, h)| if row > rows.end { (row - n, h) } else { (row, h) })
            .collect();
        self.merged = std::mem::take(&mut self.merged)
            .into_iter()
            .filter(|m| m.end_row < rows.start || m.start_row > rows.end)
            .map(|m| {
                if m.start_row > rows.end {
                    CellRange {
                        start_row: m.start_row - n,
                        end_row: m.end_row - n,
                        ..m
                    }
                } else {
                    m
                }
            })
            .collect();
        Ok(())
    }
}

fn overlaps(a: &CellRange, b: &CellRange) -> bool {
    a.start_row <= b.end_row && a.end_row >= b.start_row && a.start_col <= b.end_col && a.end_col >= b.start_col
}

fn check_addr(sheet: &str, op: &'static str, addr: CellAddr) -> Result<(), HostError> {
    if addr.row == 0 || addr.col == 0 {
        return Err(HostError::operation(op, sheet, format!("invalid cell R{}C{}", addr.row, addr.col)));
    }
    Ok(())
}

/// A live sheet inside a [`super::MemoryWorkbook`].
#[derive(Debug)]
pub struct MemorySheet {
    pub(crate) data: SheetData,
    pub(crate) faults: Arc<FaultPlan>,
}

impl MemorySheet {
    pub fn data(&self) -> &SheetData {
        &self.data
    }

    fn check(&self, op: HostOp) -> Result<(), HostError> {
        self.faults.check(&self.data.name, op)
    }
}

impl Sheet for MemorySheet {
    fn name(&self) -> &str {
        &self.data.name
    }

    fn rename(&mut self, name: &str) -> Result<(), HostError> {
        let name = name.trim();
        if name.is_empty() || name.chars().count() > 31 || name.contains(['[', ']', ':', '*', '?', '/', '\\']) {
            return Err(HostError::operation("rename", &self.data.name, format!("invalid sheet name {name:?}")));
        }
        self.data.name = name.to_string();
        Ok(())
    }

    fn used_range(&self) -> Option<CellRange> {
        self.data.used_range()
    }

    fn read_cells(&self, range: CellRange) -> Result<Vec<Vec<CellValue>>, HostError> {
        check_addr(&self.data.name, "read_cells", range.start())?;
        Ok(self.data.clip(range).values)
    }

    fn write_cell(&mut self, addr: CellAddr, value: CellValue) -> Result<(), HostError> {
        self.check(HostOp::WriteCell)?;
        check_addr(&self.data.name, "write_cell", addr)?;
        self.data.set(addr.row, addr.col, value);
        Ok(())
    }

    fn clear(&mut self) -> Result<(), HostError> {
        self.data.cells.clear();
        self.data.merged.clear();
        Ok(())
    }

    fn copy_range_to(&self, range: CellRange, dest: &mut dyn Sheet, at: CellAddr) -> Result<(), HostError> {
        self.check(HostOp::CopyTo)?;
        let clip = self.data.clip(range);
        dest.receive_copy(&clip, at)
    }

    fn receive_copy(&mut self, clip: &Clip, at: CellAddr) -> Result<(), HostError> {
        check_addr(&self.data.name, "copy_range_to", at)?;
        self.data.apply_clip(clip, at, PasteKind::All);
        Ok(())
    }

    fn copy_range(&self, range: CellRange) -> Result<Clip, HostError> {
        self.check(HostOp::Copy)?;
        Ok(self.data.clip(range))
    }

    fn paste(&mut self, clip: &Clip, at: CellAddr) -> Result<(), HostError> {
        self.check(HostOp::Paste)?;
        check_addr(&self.data.name, "paste", at)?;
        self.data.apply_clip(clip, at, PasteKind::All);
        Ok(())
    }

    fn paste_special(&mut self, clip: &Clip, at: CellAddr, kind: PasteKind) -> Result<(), HostError> {
        self.check(HostOp::PasteSpecial)?;
        check_addr(&self.data.name, "paste_special", at)?;
        self.data.apply_clip(clip, at, kind);
        Ok(())
    }

    fn delete_rows(&mut self, rows: RowRange) -> Result<(), HostError> {
        self.check(HostOp::DeleteRows)?;
        let rows = rows.normalized();
        if rows.start == 0 {
            return Err(HostError::operation("delete_rows", &self.data.name, "row 0"));
        }
        self.data
            .delete_rows_in(rows)
            .map_err(|reason| HostError::operation("delete_rows", &self.data.name, reason))
    }

    fn unmerge_all(&mut self) -> Result<(), HostError> {
        self.check(HostOp::Unmerge)?;
        self.data.merged.clear();
        Ok(())
    }

    fn row_height(&self, row: u32) -> Result<f64, HostError> {
        Ok(self.data.row_height(row))
    }

    fn set_row_height(&mut self, row: u32, height: f64) -> Result<(), HostError> {
        self.check(HostOp::SetRowHeight)?;
        if !(0.0..=409.0).contains(&height) {
            return Err(HostError::operation("set_row_height", &self.data.name, format!("height {height}")));
        }
        self.data.row_heights.insert(row, height);
        Ok(())
    }

    fn column_width(&self, col: u32) -> Result<f64, HostError> {
        Ok(self.data.column_width(col))
    }

    fn set_column_width(&mut self, col: u32, width: f64) -> Result<(), HostError> {
        self.check(HostOp::SetColumnWidth)?;
        if !(0.0..=255.0).contains(&width) {
            return Err(HostError::operation("set_column_width", &self.data.name, format!("width {width}")));
        }
        self.data.column_widths.insert(col, width);
        Ok(())
    }

    fn shape_count(&self) -> usize {
        self.data.shapes.len()
    }

    fn shape_text(&self, index: usize) -> Result<Option<String>, HostError> {
        self.data
            .shapes
            .get(index)
            .map(|s| s.text.clone())
            .ok_or_else(|| HostError::operation("shape_text", &self.data.name, format!("no shape {index}")))
    }

    fn set_shape_text(&mut self, index: usize, text: &str) -> Result<(), HostError> {
        self.check(HostOp::SetShapeText)?;
        let name = self.data.name.clone();
        let shape = self
            .data
            .shapes
            .get_mut(index)
            .ok_or_else(|| HostError::operation("set_shape_text", &name, format!("no shape {index}")))?;
        if shape.text.is_none() {
            return Err(HostError::operation("set_shape_text", &name, "shape has no text frame"));
        }
        shape.text = Some(text.to_string());
        Ok(())
    }

    fn page_attribute(&self, attribute: PageAttribute) -> Result<PageValue, HostError> {
        Ok(self.data.page_setup.get(attribute))
    }

    fn set_page_attribute(&mut self, attribute: PageAttribute, value: PageValue) -> Result<(), HostError> {
        self.check(HostOp::SetPageAttribute(attribute))
            .map_err(|_| HostError::UnsupportedAttribute(attribute))?;
        self.data.page_setup.set(attribute, value)?;
        Ok(())
    }

    fn export_fixed_format(&self, path: &Path) -> Result<(), HostError> {
        self.check(HostOp::Export)?;
        pdf::export_sheet(&self.data, path)
    }
}

/// Cells persist as a flat list so the JSON map keys stay plain strings.
mod cell_entries {
    use std::collections::BTreeMap;

    use cobranza_model::{CellAddr, CellValue};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct Entry {
        row: u32,
        col: u32,
        value: CellValue,
    }

    pub(super) fn serialize<S: Serializer>(cells: &BTreeMap<CellAddr, CellValue>, s: S) -> Result<S::Ok, S::Error> {
        let entries: Vec<Entry> = cells
            .iter()
            .map(|(addr, value)| Entry {
                row: addr.row,
                col: addr.col,
                value: value.clone(),
            })
            .collect();
        entries.serialize(s)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<BTreeMap<CellAddr, CellValue>, D::Error> {
        let entries = Vec::<Entry>::deserialize(d)?;
        Ok(entries
            .into_iter()
            .filter(|e| !e.value.is_empty())
            .map(|e| (CellAddr::new(e.row, e.col), e.value))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Fault;
    use pretty_assertions::assert_eq;

    fn sheet(data: SheetData) -> MemorySheet {
        MemorySheet {
            data,
            faults: Arc::new(FaultPlan::default()),
        }
    }

    #[test]
    fn used_range_is_bounding_box() {
        let mut data = SheetData::new("S");
        data.set(3, 2, "a");
        data.set(7, 5, 1.0);
        assert_eq!(
            data.used_range(),
            Some(CellRange::new(CellAddr::new(3, 2), CellAddr::new(7, 5)))
        );
        assert_eq!(SheetData::new("E").used_range(), None);
    }

    #[test]
    fn delete_rows_shifts_cells_heights_and_merges() {
        let mut data = SheetData::new("S")
            .with_row(1, ["drop"])
            .with_row(2, ["drop"])
            .with_row(3, ["keep"]);
        data.row_heights.insert(3, 30.0);
        data.merge(CellRange::from_a1("A3:B3").unwrap());
        let mut s = sheet(data);

        s.delete_rows(RowRange::new(1, 2)).unwrap();
        assert_eq!(s.cell(CellAddr::new(1, 1)).unwrap(), CellValue::from("keep"));
        assert_eq!(s.row_height(1).unwrap(), 30.0);
        assert_eq!(s.data.merged, vec![CellRange::from_a1("A1:B1").unwrap()]);
    }

    #[test]
    fn delete_rows_blocked_by_straddling_merge() {
        let mut data = SheetData::new("S").with_row(1, ["a"]).with_row(5, ["b"]);
        data.merge(CellRange::from_a1("A2:A4").unwrap());
        let mut s = sheet(data);
        assert!(s.delete_rows(RowRange::new(1, 3)).is_err());
        s.unmerge_all().unwrap();
        s.delete_rows(RowRange::new(1, 3)).unwrap();
        assert_eq!(s.cell(CellAddr::new(2, 1)).unwrap(), CellValue::from("b"));
    }

    #[test]
    fn copy_range_to_reproduces_values_and_merges() {
        let mut src_data = SheetData::new("Src").with_row(1, ["x", "y"]).with_row(2, ["z"]);
        src_data.merge(CellRange::from_a1("A2:B2").unwrap());
        let src = sheet(src_data);
        let mut dst = sheet(SheetData::new("Dst").with_row(9, ["old"]));

        src.copy_range_to(src.used_range().unwrap(), &mut dst, CellAddr::new(4, 1))
            .unwrap();
        assert_eq!(dst.cell(CellAddr::new(4, 2)).unwrap(), CellValue::from("y"));
        assert_eq!(dst.cell(CellAddr::new(5, 1)).unwrap(), CellValue::from("z"));
        assert_eq!(dst.data.merged, vec![CellRange::from_a1("A5:B5").unwrap()]);
        assert_eq!(dst.cell(CellAddr::new(9, 1)).unwrap(), CellValue::from("old"));
    }

    #[test]
    fn direct_copy_does_not_depend_on_the_clipboard_paste() {
        let faults = Arc::new(FaultPlan::new(vec![Fault::on(HostOp::Paste)]));
        let src = MemorySheet {
            data: SheetData::new("Src").with_row(1, ["x", "y"]),
            faults: Arc::clone(&faults),
        };
        let mut dst = MemorySheet {
            data: SheetData::new("Dst"),
            faults,
        };

        src.copy_range_to(src.used_range().unwrap(), &mut dst, CellAddr::new(1, 1))
            .unwrap();
        assert_eq!(dst.cell(CellAddr::new(1, 2)).unwrap(), CellValue::from("y"));

        let clip = src.copy_range(src.used_range().unwrap()).unwrap();
        assert!(dst.paste(&clip, CellAddr::new(3, 1)).is_err());
        dst.paste_special(&clip, CellAddr::new(3, 1), PasteKind::All).unwrap();
        assert_eq!(dst.cell(CellAddr::new(3, 1)).unwrap(), CellValue::from("x"));
    }

    #[test]
    fn shapes_without_text_frames_reject_writes() {
        let mut data = SheetData::new("S");
        data.add_shape("Picture 1", None);
        data.add_shape("TextBox 2", Some("01/02/2023"));
        let mut s = sheet(data);
        assert!(s.set_shape_text(0, "x").is_err());
        s.set_shape_text(1, "15/03/2024").unwrap();
        assert_eq!(s.shape_text(1).unwrap().as_deref(), Some("15/03/2024"));
    }

    #[test]
    fn cells_serialize_as_flat_entries() {
        let data = SheetData::new("S").with_row(2, ["Vendor A"]);
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(
            json["cells"],
            serde_json::json!([{ "row": 2, "col": 1, "value": { "type": "text", "value": "Vendor A" } }])
        );
        let back: SheetData = serde_json::from_value(json).unwrap();
        assert_eq!(back, data);
    }
}
