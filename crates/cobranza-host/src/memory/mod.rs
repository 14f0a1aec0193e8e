//! Reference in-memory host.
//!
//! Workbooks live on disk as pretty-printed JSON snapshots ([`WorkbookData`]); opening one loads
//! it into memory, `save_as`/`close(true)` write it back atomically. Fixed-format exports are
//! real PDF files. Every host launched from one [`MemoryHostFactory`] shares its fault plan and
//! instance counters, which makes release guarantees observable from tests.

mod fault;
pub(crate) mod pdf;
mod sheet;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use fault::{Fault, HostOp};
pub use sheet::{MemorySheet, Shape, SheetData, DEFAULT_COLUMN_WIDTH, DEFAULT_ROW_HEIGHT};

use crate::fs::atomic_write;
use crate::{HostError, HostFactory, Sheet, SpreadsheetHost, Workbook};
use fault::FaultPlan;

/// On-disk workbook snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkbookData {
    pub sheets: Vec<SheetData>,
}

impl WorkbookData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sheet(mut self, sheet: SheetData) -> Self {
        self.sheets.push(sheet);
        self
    }

    pub fn sheet(&self, name: &str) -> Option<&SheetData> {
        self.sheets
            .iter()
            .find(|s| cobranza_model::text::sheet_name_eq(&s.name, name))
    }

    pub fn load(path: &Path) -> Result<Self, HostError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), HostError> {
        atomic_write(path, |w| serde_json::to_writer_pretty(w, self).map_err(HostError::from))
    }
}

/// Instance and workbook counters shared by one factory.
#[derive(Debug, Default)]
pub struct HostStats {
    launched: AtomicUsize,
    live_hosts: AtomicUsize,
    open_workbooks: AtomicUsize,
}

impl HostStats {
    pub fn launched(&self) -> usize {
        self.launched.load(Ordering::SeqCst)
    }

    /// Hosts launched but not yet quit.
    pub fn live_hosts(&self) -> usize {
        self.live_hosts.load(Ordering::SeqCst)
    }

    /// Workbooks opened but not yet closed.
    pub fn open_workbooks(&self) -> usize {
        self.open_workbooks.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryHostFactory {
    faults: Arc<FaultPlan>,
    stats: Arc<HostStats>,
}

impl MemoryHostFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_faults(faults: Vec<Fault>) -> Self {
        Self {
            faults: Arc::new(FaultPlan::new(faults)),
            stats: Arc::default(),
        }
    }

    pub fn stats(&self) -> Arc<HostStats> {
        Arc::clone(&self.stats)
    }
}

impl HostFactory for MemoryHostFactory {
    fn launch(&self) -> Result<Box<dyn SpreadsheetHost>, HostError> {
        self.stats.launched.fetch_add(1, Ordering::SeqCst);
        self.stats.live_hosts.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryHost {
            faults: Arc::clone(&self.faults),
            stats: Arc::clone(&self.stats),
            running: true,
        }))
    }
}

#[derive(Debug)]
pub struct MemoryHost {
    faults: Arc<FaultPlan>,
    stats: Arc<HostStats>,
    running: bool,
}

impl SpreadsheetHost for MemoryHost {
    fn open(&mut self, path: &Path, read_only: bool) -> Result<Box<dyn Workbook>, HostError> {
        let open_err = |reason: String| HostError::Open {
            path: path.to_path_buf(),
            reason,
        };
        if !self.running {
            return Err(open_err("host has quit".to_string()));
        }
        self.faults
            .check("", HostOp::Open)
            .map_err(|err| open_err(err.to_string()))?;
        if !path.is_file() {
            return Err(open_err("file not found".to_string()));
        }
        let data = WorkbookData::load(path).map_err(|err| open_err(format!("unreadable workbook: {err}")))?;

        self.stats.open_workbooks.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryWorkbook {
            path: path.to_path_buf(),
            read_only,
            sheets: data
                .sheets
                .into_iter()
                .map(|data| MemorySheet {
                    data,
                    faults: Arc::clone(&self.faults),
                })
                .collect(),
            faults: Arc::clone(&self.faults),
            stats: Arc::clone(&self.stats),
        }))
    }

    fn quit(&mut self) -> Result<(), HostError> {
        if std::mem::replace(&mut self.running, false) {
            self.stats.live_hosts.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

impl Drop for MemoryHost {
    fn drop(&mut self) {
        let _ = self.quit();
    }
}

#[derive(Debug)]
pub struct MemoryWorkbook {
    path: PathBuf,
    read_only: bool,
    sheets: Vec<MemorySheet>,
    faults: Arc<FaultPlan>,
    stats: Arc<HostStats>,
}

impl MemoryWorkbook {
    fn snapshot(&self) -> WorkbookData {
        WorkbookData {
            sheets: self.sheets.iter().map(|s| s.data().clone()).collect(),
        }
    }

    fn index_err(&self, index: usize) -> HostError {
        HostError::SheetIndex {
            index,
            count: self.sheets.len(),
        }
    }
}

impl Workbook for MemoryWorkbook {
    fn path(&self) -> &Path {
        &self.path
    }

    fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    fn sheet(&self, index: usize) -> Result<&dyn Sheet, HostError> {
        self.sheets
            .get(index)
            .map(|s| s as &dyn Sheet)
            .ok_or_else(|| self.index_err(index))
    }

    fn sheet_mut(&mut self, index: usize) -> Result<&mut dyn Sheet, HostError> {
        let count = self.sheets.len();
        self.sheets
            .get_mut(index)
            .map(|s| s as &mut dyn Sheet)
            .ok_or(HostError::SheetIndex { index, count })
    }

    fn add_sheet(&mut self, name: &str) -> Result<usize, HostError> {
        self.faults.check(name, HostOp::AddSheet)?;
        if self.find_sheet(name).is_some() {
            return Err(HostError::DuplicateSheetName(name.to_string()));
        }
        let mut sheet = MemorySheet {
            data: SheetData::new("Sheet"),
            faults: Arc::clone(&self.faults),
        };
        sheet.rename(name)?;
        self.sheets.push(sheet);
        Ok(self.sheets.len() - 1)
    }

    fn delete_sheet(&mut self, index: usize) -> Result<(), HostError> {
        let name = self.sheet(index)?.name().to_string();
        self.faults.check(&name, HostOp::DeleteSheet)?;
        if self.sheets.len() == 1 {
            return Err(HostError::operation("delete_sheet", &name, "a workbook must keep one sheet"));
        }
        self.sheets.remove(index);
        Ok(())
    }

    fn save_as(&mut self, path: &Path) -> Result<(), HostError> {
        self.faults.check("", HostOp::SaveAs)?;
        self.snapshot().save(path)
    }

    fn close(self: Box<Self>, save: bool) -> Result<(), HostError> {
        if save {
            if self.read_only {
                return Err(HostError::ReadOnly(self.path.clone()));
            }
            self.snapshot().save(&self.path)?;
        }
        Ok(())
    }
}

impl Drop for MemoryWorkbook {
    fn drop(&mut self) {
        self.stats.open_workbooks.fetch_sub(1, Ordering::SeqCst);
    }
}
