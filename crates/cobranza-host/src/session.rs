//! Scoped ownership of host instances and open workbooks.
//!
//! Both guards release their resource on drop: workbooks close without saving, hosts quit.
//! Declare the [`HostSession`] before any [`OpenWorkbook`] so workbooks drop first.

use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};

use crate::{HostError, HostFactory, SpreadsheetHost, Workbook};

pub struct HostSession {
    host: Option<Box<dyn SpreadsheetHost>>,
}

impl HostSession {
    pub fn launch(factory: &dyn HostFactory) -> Result<Self, HostError> {
        let host = factory.launch()?;
        log::debug!("[host] launched instance");
        Ok(Self { host: Some(host) })
    }

    pub fn open(&mut self, path: &Path, read_only: bool) -> Result<OpenWorkbook, HostError> {
        let host = self
            .host
            .as_mut()
            .ok_or_else(|| HostError::Launch("host already quit".to_string()))?;
        let workbook = host.open(path, read_only)?;
        Ok(OpenWorkbook {
            path: path.to_path_buf(),
            workbook: Some(workbook),
        })
    }

    /// Quit now and surface the failure, instead of logging it on drop.
    pub fn quit(mut self) -> Result<(), HostError> {
        match self.host.take() {
            Some(mut host) => host.quit(),
            None => Ok(()),
        }
    }
}

impl Drop for HostSession {
    fn drop(&mut self) {
        if let Some(mut host) = self.host.take() {
            if let Err(err) = host.quit() {
                log::warn!("[host] failed to quit instance: {err}");
            }
        }
    }
}

pub struct OpenWorkbook {
    path: PathBuf,
    workbook: Option<Box<dyn Workbook>>,
}

impl OpenWorkbook {
    pub fn close(mut self, save: bool) -> Result<(), HostError> {
        match self.workbook.take() {
            Some(workbook) => workbook.close(save),
            None => Ok(()),
        }
    }
}

impl Deref for OpenWorkbook {
    type Target = dyn Workbook;

    fn deref(&self) -> &Self::Target {
        // Only `close` and `drop` take the workbook, and both consume the guard.
        match self.workbook.as_deref() {
            Some(workbook) => workbook,
            None => unreachable!("workbook guard used after close"),
        }
    }
}

impl DerefMut for OpenWorkbook {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match self.workbook.as_deref_mut() {
            Some(workbook) => workbook,
            None => unreachable!("workbook guard used after close"),
        }
    }
}

impl Drop for OpenWorkbook {
    fn drop(&mut self) {
        if let Some(workbook) = self.workbook.take() {
            if let Err(err) = workbook.close(false) {
                log::warn!("[host] failed to close {}: {err}", self.path.display());
            }
        }
    }
}
