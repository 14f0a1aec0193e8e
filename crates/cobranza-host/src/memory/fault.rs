use std::sync::Mutex;

use cobranza_model::{text, PageAttribute};

use crate::HostError;

/// Host operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOp {
    Open,
    CopyTo,
    Copy,
    Paste,
    PasteSpecial,
    WriteCell,
    DeleteRows,
    Unmerge,
    SetRowHeight,
    SetColumnWidth,
    SetShapeText,
    SetPageAttribute(PageAttribute),
    Export,
    AddSheet,
    DeleteSheet,
    SaveAs,
}

impl HostOp {
    pub(crate) fn label(self) -> &'static str {
        match self {
            HostOp::Open => "open",
            HostOp::CopyTo => "copy_range_to",
            HostOp::Copy => "copy_range",
            HostOp::Paste => "paste",
            HostOp::PasteSpecial => "paste_special",
            HostOp::WriteCell => "write_cell",
            HostOp::DeleteRows => "delete_rows",
            HostOp::Unmerge => "unmerge_all",
            HostOp::SetRowHeight => "set_row_height",
            HostOp::SetColumnWidth => "set_column_width",
            HostOp::SetShapeText => "set_shape_text",
            HostOp::SetPageAttribute(_) => "set_page_attribute",
            HostOp::Export => "export_fixed_format",
            HostOp::AddSheet => "add_sheet",
            HostOp::DeleteSheet => "delete_sheet",
            HostOp::SaveAs => "save_as",
        }
    }
}

/// An injected failure.
///
/// `sheet = None` matches every sheet (and workbook-level operations); `times = None` fails
/// forever, `Some(n)` fails the first `n` matching calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub sheet: Option<String>,
    pub op: HostOp,
    pub times: Option<u32>,
}

impl Fault {
    pub fn on(op: HostOp) -> Self {
        Self {
            sheet: None,
            op,
            times: None,
        }
    }

    pub fn on_sheet(sheet: impl Into<String>, op: HostOp) -> Self {
        Self {
            sheet: Some(sheet.into()),
            op,
            times: None,
        }
    }

    pub fn times(mut self, n: u32) -> Self {
        self.times = Some(n);
        self
    }
}

/// Faults shared by every host launched from one factory.
#[derive(Debug, Default)]
pub(crate) struct FaultPlan {
    faults: Mutex<Vec<Fault>>,
}

impl FaultPlan {
    pub(crate) fn new(faults: Vec<Fault>) -> Self {
        Self {
            faults: Mutex::new(faults),
        }
    }

    /// Fail with an injected error if a fault matches `op` on `sheet`.
    pub(crate) fn check(&self, sheet: &str, op: HostOp) -> Result<(), HostError> {
        let mut faults = match self.faults.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let hit = faults.iter_mut().find(|f| {
            f.op == op
                && f.times != Some(0)
                && f.sheet.as_deref().map_or(true, |s| text::sheet_name_eq(s, sheet))
        });
        match hit {
            Some(fault) => {
                if let Some(n) = fault.times.as_mut() {
                    *n -= 1;
                }
                Err(HostError::operation(op.label(), sheet, "injected fault"))
            }
            None => Ok(()),
        }
    }
}
