//! Master-copy workflow: paste the ledger into the master, trim, date, redistribute, save.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use cobranza_host::{HostFactory, HostSession, Sheet, Workbook};
use cobranza_model::{CellAddr, CellRange, RowRange};
use serde::Serialize;

use crate::assemble::open_error;
use crate::config::Config;
use crate::dates::DateStamper;
use crate::progress::Progress;
use crate::redistribute::ValueRedistributor;
use crate::report::{PartialFailure, StepReport};
use crate::{Error, Result};

/// Copy pipeline states, in order. `Saved` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Init,
    Opened,
    Pasted,
    RowsDeleted,
    Dated,
    Redistributed,
    Saved,
    Failed,
}

impl PipelineState {
    /// The state the running step leads to.
    fn next(self) -> Self {
        match self {
            PipelineState::Init => PipelineState::Opened,
            PipelineState::Opened => PipelineState::Pasted,
            PipelineState::Pasted => PipelineState::RowsDeleted,
            PipelineState::RowsDeleted => PipelineState::Dated,
            PipelineState::Dated => PipelineState::Redistributed,
            PipelineState::Redistributed => PipelineState::Saved,
            PipelineState::Saved | PipelineState::Failed => self,
        }
    }
}

/// Renders the step that leads into the state, as used in failure messages.
impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PipelineState::Init => "initializing",
            PipelineState::Opened => "opening workbooks",
            PipelineState::Pasted => "pasting the source sheet",
            PipelineState::RowsDeleted => "deleting leading rows",
            PipelineState::Dated => "updating dates",
            PipelineState::Redistributed => "redistributing balances",
            PipelineState::Saved => "saving the result",
            PipelineState::Failed => "failed",
        })
    }
}

/// Which of the three paste strategies succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PasteStrategy {
    /// Range copy straight into the destination.
    Direct,
    /// Clipboard copy, then a sheet paste.
    Clipboard,
    /// Clipboard copy, then paste-special with everything.
    PasteSpecial,
}

impl fmt::Display for PasteStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PasteStrategy::Direct => "copy(destination)",
            PasteStrategy::Clipboard => "worksheet.paste",
            PasteStrategy::PasteSpecial => "paste_special(all)",
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct CopyOptions {
    /// Date written into the header and the sheet titles.
    pub date: Option<NaiveDate>,
    /// Overrides the configured number of leading rows to delete.
    pub delete_rows: Option<u32>,
    /// Final file name; the configured extension is added when missing.
    pub output_name: Option<String>,
    /// Directory for the result; a fresh temporary directory when unset.
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CopyOutcome {
    pub path: PathBuf,
    pub paste: PasteStrategy,
    /// Cosmetic writes that were skipped.
    pub skipped: Vec<PartialFailure>,
}

/// Paste the used range of `src` into `dst` at `A1`, trying each strategy in turn.
pub fn paste_robust(src: &dyn Sheet, dst: &mut dyn Sheet) -> Result<PasteStrategy> {
    let a1 = CellAddr::new(1, 1);
    let range = src.used_range().unwrap_or_else(|| CellRange::new(a1, a1));
    let mut attempts = Vec::with_capacity(3);

    match src.copy_range_to(range, dst, a1) {
        Ok(()) => return Ok(PasteStrategy::Direct),
        Err(err) => attempts.push(format!("{} -> {err}", PasteStrategy::Direct)),
    }
    match src.copy_range(range).and_then(|clip| dst.paste(&clip, a1)) {
        Ok(()) => return Ok(PasteStrategy::Clipboard),
        Err(err) => attempts.push(format!("{} -> {err}", PasteStrategy::Clipboard)),
    }
    match src
        .copy_range(range)
        .and_then(|clip| dst.paste_special(&clip, a1, cobranza_host::PasteKind::All))
    {
        Ok(()) => return Ok(PasteStrategy::PasteSpecial),
        Err(err) => attempts.push(format!("{} -> {err}", PasteStrategy::PasteSpecial)),
    }
    Err(Error::PasteFailure(attempts.join(" | ")))
}

/// Delete rows `1..=count`, unmerging once if merged cells block it. Gives up quietly.
pub fn delete_leading_rows(sheet: &mut dyn Sheet, count: u32) -> bool {
    let rows = RowRange::new(1, count);
    let Err(first) = sheet.delete_rows(rows) else {
        return true;
    };
    log::debug!("[copy] deleting rows {} failed ({first}); unmerging and retrying", rows.to_a1_absolute());
    match sheet.unmerge_all().and_then(|()| sheet.delete_rows(rows)) {
        Ok(()) => true,
        Err(err) => {
            log::warn!("[copy] leaving rows {} in place: {err}", rows.to_a1_absolute());
            false
        }
    }
}

/// Copy widths for the columns both used ranges span.
pub fn copy_column_widths(src: &dyn Sheet, dst: &mut dyn Sheet) -> StepReport {
    let mut report = StepReport::new("widths");
    let (Some(src_used), Some(dst_used)) = (src.used_range(), dst.used_range()) else {
        return report;
    };
    let name = dst.name().to_string();
    for col in 1..=src_used.width().min(dst_used.width()) {
        let result = src
            .column_width(col)
            .and_then(|width| dst.set_column_width(col, width));
        report.record(|| format!("{name}!col {col}"), result);
    }
    report
}

pub struct CopyPipeline<'a> {
    factory: &'a dyn HostFactory,
    config: &'a Config,
}

impl<'a> CopyPipeline<'a> {
    pub fn new(factory: &'a dyn HostFactory, config: &'a Config) -> Self {
        Self { factory, config }
    }

    /// Run the whole copy. Progress ends at 100 on success and on failure; a failure
    /// carries the step that was running.
    pub fn run(&self, source: &Path, master: &Path, options: &CopyOptions, progress: &Progress<'_>) -> Result<CopyOutcome> {
        progress.report(5, "Inicializando...");
        let mut state = PipelineState::Init;
        let result = self.execute(source, master, options, progress, &mut state);
        match result {
            Ok(outcome) => {
                progress.report(100, "Archivo listo.");
                Ok(outcome)
            }
            Err(err) => {
                let phase = state.next();
                log::error!("[copy] failed while {phase}: {err}");
                log::info!("[copy] {state:?} -> {:?}", PipelineState::Failed);
                progress.report(100, format!("Error: {err}"));
                Err(Error::PipelineFailed {
                    phase,
                    source: Box::new(err),
                })
            }
        }
    }

    fn execute(
        &self,
        source: &Path,
        master: &Path,
        options: &CopyOptions,
        progress: &Progress<'_>,
        state: &mut PipelineState,
    ) -> Result<CopyOutcome> {
        let mut advance = |to: PipelineState| {
            log::info!("[copy] {:?} -> {to:?}", *state);
            *state = to;
        };

        for (path, role) in [(source, "source"), (master, "master")] {
            if !path.is_file() {
                return Err(Error::HostOpen {
                    path: path.to_path_buf(),
                    reason: format!("{role} workbook not found"),
                });
            }
        }
        let redistributor = ValueRedistributor::new(self.config)?;
        let stamper = DateStamper::new(self.config);
        let mut cosmetic = StepReport::new("copy");
        let mut keep = |report: StepReport| {
            report.log();
            cosmetic.merge(report);
        };

        let mut session = HostSession::launch(self.factory).map_err(Error::host("launch host"))?;
        let src = session.open(source, true).map_err(|err| open_error(source, err))?;
        let mut dst = session.open(master, false).map_err(|err| open_error(master, err))?;
        advance(PipelineState::Opened);
        progress.report(25, "Libros abiertos.");

        progress.report(45, "Copiando hoja de origen...");
        let src_sheet = src.sheet(0).map_err(Error::host("source sheet"))?;
        let paste = {
            let dst_sheet = dst.sheet_mut(0).map_err(Error::host("master sheet"))?;
            dst_sheet.clear().map_err(Error::host("clear master sheet"))?;
            paste_robust(src_sheet, dst_sheet)?
        };
        log::info!("[copy] pasted with {paste}");
        advance(PipelineState::Pasted);
        progress.report(60, "Pegado completo. Aplicando ajustes...");

        let delete = options.delete_rows.unwrap_or(self.config.copy.delete_rows);
        if delete > 0 {
            let dst_sheet = dst.sheet_mut(0).map_err(Error::host("master sheet"))?;
            delete_leading_rows(dst_sheet, delete);
        }
        advance(PipelineState::RowsDeleted);
        progress.report(70, "Filas iniciales eliminadas.");

        if let Some(date) = options.date {
            let dst_sheet = dst.sheet_mut(0).map_err(Error::host("master sheet"))?;
            keep(stamper.stamp_header(dst_sheet, date));
            for name in &self.config.copy.title_sheets {
                let Some(index) = dst.find_sheet(name) else {
                    continue;
                };
                match dst.sheet_mut(index) {
                    Ok(sheet) => keep(stamper.retitle(sheet, date)),
                    Err(err) => log::warn!("[copy] cannot retitle {name}: {err}"),
                }
            }
        }
        advance(PipelineState::Dated);
        progress.report(75, "Fechas actualizadas.");

        {
            let dst_sheet = dst.sheet_mut(0).map_err(Error::host("master sheet"))?;
            keep(copy_column_widths(src_sheet, dst_sheet));
        }
        let totals = redistributor
            .collect(dst.sheet(0).map_err(Error::host("master sheet"))?)
            .map_err(Error::host("read balances"))?;
        log::info!("[copy] found {} vendor balances", totals.len());
        keep(redistributor.distribute(&mut *dst, &totals));
        advance(PipelineState::Redistributed);
        progress.report(80, "Hojas destino actualizadas.");

        progress.report(90, "Guardando archivo resultado...");
        let out_dir = match &options.output_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                dir.clone()
            }
            None => tempfile::Builder::new().prefix("cobranza_xls_").tempdir()?.keep(),
        };
        let mut path = self.save_unique(&mut *dst, &out_dir)?;
        advance(PipelineState::Saved);

        if let Some(name) = options.output_name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            match self.rename_output(&path, name) {
                Ok(renamed) => path = renamed,
                Err(err) => {
                    log::warn!("[copy] keeping {}: {err}", path.display());
                    progress.report(95, format!("No se pudo renombrar el archivo: {err}"));
                }
            }
        }

        if let Err(err) = src.close(false) {
            log::warn!("[copy] failed to close {}: {err}", source.display());
        }
        if let Err(err) = dst.close(false) {
            log::warn!("[copy] failed to close {}: {err}", master.display());
        }
        if let Err(err) = session.quit() {
            log::warn!("[copy] failed to quit host: {err}");
        }

        log::debug!(
            "[copy] cosmetic writes: {} applied, {} skipped",
            cosmetic.applied,
            cosmetic.failures.len()
        );
        Ok(CopyOutcome {
            path,
            paste,
            skipped: cosmetic.failures,
        })
    }

    /// Save under `<stem>_<timestamp>.<ext>`, retrying once with a random suffix.
    fn save_unique(&self, workbook: &mut dyn Workbook, dir: &Path) -> Result<PathBuf> {
        let copy = &self.config.copy;
        let stamp = Local::now().format("%Y%m%d_%H%M%S_%6f");
        let first = dir.join(format!("{}_{stamp}.{}", copy.output_stem, copy.output_extension));
        match workbook.save_as(&first) {
            Ok(()) => return Ok(first),
            Err(err) => log::warn!("[copy] save to {} failed ({err}); retrying", first.display()),
        }

        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let retry = dir.join(format!(
            "{}_{stamp}_{}.{}",
            copy.output_stem,
            &suffix[..8],
            copy.output_extension
        ));
        workbook
            .save_as(&retry)
            .map(|()| retry.clone())
            .map_err(|source| Error::SaveCollision { path: retry, source })
    }

    fn rename_output(&self, saved: &Path, name: &str) -> std::io::Result<PathBuf> {
        let mut file_name = PathBuf::from(name);
        if file_name.extension().is_none() {
            file_name.set_extension(&self.config.copy.output_extension);
        }
        let Some(file_name) = file_name.file_name() else {
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty output name"));
        };
        let target = saved.with_file_name(file_name);
        std::fs::rename(saved, &target)?;
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_phase_names_the_running_step() {
        assert_eq!(PipelineState::Init.next(), PipelineState::Opened);
        assert_eq!(PipelineState::Redistributed.next(), PipelineState::Saved);
        assert_eq!(PipelineState::Pasted.next().to_string(), "deleting leading rows");
    }
}
