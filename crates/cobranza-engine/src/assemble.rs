//! Per-vendor PDF export, summary grouping and the consolidated document.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use cobranza_host::{HostError, HostFactory, HostSession, Workbook};
use cobranza_model::text::{self, sanitize_file_name, strip_leading_code};
use cobranza_model::{BlockId, RowRange, VendorBlock};
use serde::Serialize;

use crate::blocks::{BlockDetector, Markers};
use crate::config::Config;
use crate::layout::{LayoutSnapshot, ScratchSheet};
use crate::merge::merge_pdfs;
use crate::progress::Progress;
use crate::{Error, Result};

const SHEET_ID_PREFIX: &str = "sheet:";

/// Identity of a generated document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DocumentId {
    Block(BlockId),
    FullSheet(String),
    SummaryGroup,
    Consolidated,
}

impl DocumentId {
    /// Parse the `Display` form. The configured summary id is also accepted for
    /// [`DocumentId::SummaryGroup`].
    pub fn parse(raw: &str, summary_id: &str) -> Option<Self> {
        let raw = raw.trim();
        if let Some(id) = BlockId::parse(raw) {
            return Some(Self::Block(id));
        }
        if let Some(name) = raw.strip_prefix(SHEET_ID_PREFIX) {
            return Some(Self::FullSheet(name.trim().to_string()));
        }
        match raw.to_ascii_lowercase().as_str() {
            "summary" => Some(Self::SummaryGroup),
            "consolidated" => Some(Self::Consolidated),
            _ if !summary_id.is_empty() && text::normalize(raw) == text::normalize(summary_id) => {
                Some(Self::SummaryGroup)
            }
            _ => None,
        }
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentId::Block(id) => write!(f, "{id}"),
            DocumentId::FullSheet(name) => write!(f, "{SHEET_ID_PREFIX}{name}"),
            DocumentId::SummaryGroup => f.write_str("summary"),
            DocumentId::Consolidated => f.write_str("consolidated"),
        }
    }
}

impl Serialize for DocumentId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone)]
pub struct ExportJob {
    pub source_path: PathBuf,
    pub output_dir: PathBuf,
    /// Sheets exported verbatim instead of being split into blocks.
    pub full_sheets: Vec<String>,
    /// Restrict block detection to this sheet.
    pub target_sheet: Option<String>,
    /// Explicit consolidated order; listed blocks also take the lowest sequence numbers.
    pub order: Vec<DocumentId>,
    pub excluded_ids: HashSet<DocumentId>,
    /// Names left out of the consolidated file on top of `excluded_ids`.
    pub excluded_names: Vec<String>,
    /// Appended to every document name, e.g. `15-03-2024`.
    pub date_tag: Option<String>,
}

impl ExportJob {
    pub fn new(source_path: impl Into<PathBuf>, output_dir: impl Into<PathBuf>, config: &Config) -> Self {
        Self {
            source_path: source_path.into(),
            output_dir: output_dir.into(),
            full_sheets: config.export.full_sheets.clone(),
            target_sheet: None,
            order: Vec::new(),
            excluded_ids: HashSet::new(),
            excluded_names: config.export.excluded.clone(),
            date_tag: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedDocument {
    pub id: DocumentId,
    pub path: PathBuf,
    /// Display name: sheet name, vendor name without its code, or the group name.
    pub name: String,
    /// 1-based position in the final block order; blocks only.
    pub sequence: Option<u32>,
}

/// Blocks of one sheet plus the rows repeated above each of them.
#[derive(Debug)]
struct SheetPlan {
    index: usize,
    header: Option<RowRange>,
    blocks: Vec<VendorBlock>,
}

/// Explicitly ordered blocks first, then the rest in detection order.
pub fn final_block_order(detected: &[&VendorBlock], order: &[DocumentId]) -> Vec<BlockId> {
    let known: HashSet<BlockId> = detected.iter().map(|b| b.id).collect();
    let mut out: Vec<BlockId> = Vec::with_capacity(detected.len());
    let mut seen = HashSet::new();
    for id in order {
        if let DocumentId::Block(id) = id {
            if known.contains(id) && seen.insert(*id) {
                out.push(*id);
            }
        }
    }
    out.extend(detected.iter().map(|b| b.id).filter(|id| seen.insert(*id)));
    out
}

/// Vendor name as shown in document names: leading numeric code removed.
pub fn display_name(vendor_name: &str) -> &str {
    strip_leading_code(vendor_name.trim())
}

pub struct DocumentAssembler<'c> {
    config: &'c Config,
    detector: BlockDetector,
}

impl<'c> DocumentAssembler<'c> {
    pub fn new(config: &'c Config) -> Result<Self> {
        Ok(Self {
            config,
            detector: BlockDetector::new(Markers::compile(&config.markers)?),
        })
    }

    fn file_name(&self, stem: &str, tag: &str) -> String {
        format!("{}_{stem}{tag}.pdf", self.config.export.file_prefix)
    }

    /// Export every document of `job` from an already open workbook.
    pub fn assemble(
        &self,
        workbook: &mut dyn Workbook,
        job: &ExportJob,
        progress: &Progress<'_>,
    ) -> Result<Vec<GeneratedDocument>> {
        let tag = job
            .date_tag
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .map(|t| format!(" {}", t.trim()))
            .unwrap_or_default();
        let target = match &job.target_sheet {
            Some(name) => Some(
                workbook
                    .find_sheet(name)
                    .ok_or_else(|| Error::SheetNotFound(name.clone()))?,
            ),
            None => None,
        };

        let mut generated = Vec::new();
        let mut plans = Vec::new();

        for index in 0..workbook.sheet_count() {
            let sheet = workbook.sheet(index).map_err(Error::host("read sheet"))?;
            let name = sheet.name().trim().to_string();

            if job.full_sheets.iter().any(|full| text::sheet_name_eq(full, &name)) {
                let path = job.output_dir.join(self.file_name(&sanitize_file_name(&name), &tag));
                sheet
                    .export_fixed_format(&path)
                    .map_err(Error::host(format!("export sheet {name}")))?;
                log::info!("[export] sheet {name} -> {}", path.display());
                generated.push(GeneratedDocument {
                    id: DocumentId::FullSheet(name.clone()),
                    path,
                    name,
                    sequence: None,
                });
                continue;
            }
            if target.is_some_and(|t| t != index) {
                continue;
            }

            let blocks = self
                .detector
                .detect_sheet(sheet)
                .map_err(Error::host(format!("scan sheet {name}")))?;
            let Some(first) = blocks.iter().map(|b| b.row_start).min() else {
                continue;
            };
            log::debug!("[export] {name}: {} vendor blocks", blocks.len());
            plans.push(SheetPlan {
                index,
                header: (first > 1).then(|| RowRange::new(1, first - 1)),
                blocks,
            });
        }
        progress.report(20, "Hojas completas exportadas");

        let detected: Vec<&VendorBlock> = plans.iter().flat_map(|p| p.blocks.iter()).collect();
        let sequence: HashMap<BlockId, u32> = final_block_order(&detected, &job.order)
            .into_iter()
            .zip(1..)
            .collect();

        let total = detected.len().max(1);
        let mut done = 0;
        let mut block_docs: HashMap<BlockId, usize> = HashMap::new();
        for plan in &plans {
            for block in &plan.blocks {
                let seq = sequence.get(&block.id).copied().unwrap_or_default();
                let doc = self.export_block(&mut *workbook, plan, block, seq, job, &tag)?;
                block_docs.insert(block.id, generated.len());
                generated.push(doc);

                done += 1;
                progress.report(
                    20 + (done * 65 / total) as i32,
                    format!("Exportado {}", display_name(&block.vendor_name)),
                );
            }
        }

        let (summary, absorbed) = self.merge_summary(&generated, &tag, job)?;
        if let Some(summary) = summary {
            generated.push(summary);
        }
        progress.report(90, "Consolidando");

        if let Some(consolidated) = self.merge_consolidated(&generated, &detected, &block_docs, &absorbed, job, &tag)? {
            generated.push(consolidated);
        }
        Ok(generated)
    }

    fn export_block(
        &self,
        workbook: &mut dyn Workbook,
        plan: &SheetPlan,
        block: &VendorBlock,
        seq: u32,
        job: &ExportJob,
        tag: &str,
    ) -> Result<GeneratedDocument> {
        let name = display_name(&block.vendor_name).to_string();
        let safe = match sanitize_file_name(&name) {
            s if s.is_empty() => "SIN_NOMBRE".to_string(),
            s => s,
        };
        let path = job.output_dir.join(self.file_name(&format!("{seq:06} {safe}"), tag));
        let context = || format!("export vendor {name}");

        let source = workbook.sheet(plan.index).map_err(Error::host(context()))?;
        let snapshot = LayoutSnapshot::capture(source, block.rows(), plan.header).map_err(Error::host(context()))?;

        let mut scratch = ScratchSheet::create(workbook, &sanitize_file_name(&block.vendor_name))
            .map_err(Error::host(context()))?;
        let index = scratch.index();
        let exported = scratch
            .workbook()
            .sheet_mut(index)
            .and_then(|sheet| snapshot.apply(sheet))
            .and_then(|report| {
                report.log();
                scratch.sheet()?.export_fixed_format(&path)
            });
        drop(scratch);
        exported.map_err(Error::host(context()))?;

        log::info!("[export] {seq:06} {name} -> {}", path.display());
        Ok(GeneratedDocument {
            id: DocumentId::Block(block.id),
            path,
            name,
            sequence: Some(seq),
        })
    }

    /// Merge the configured summary members that were generated, in configured order.
    ///
    /// Returns the merged document and the member block ids it absorbs.
    fn merge_summary(
        &self,
        generated: &[GeneratedDocument],
        tag: &str,
        job: &ExportJob,
    ) -> Result<(Option<GeneratedDocument>, HashSet<BlockId>)> {
        let export = &self.config.export;
        let mut inputs = Vec::new();
        let mut absorbed = HashSet::new();

        for member in &export.summary_members {
            let wanted = text::normalize(strip_leading_code(member));
            let found = generated.iter().find(|doc| match &doc.id {
                DocumentId::FullSheet(sheet) => text::sheet_name_eq(sheet, member),
                DocumentId::Block(_) => text::normalize(&doc.name) == wanted,
                _ => false,
            });
            if let Some(doc) = found {
                if let DocumentId::Block(id) = doc.id {
                    absorbed.insert(id);
                }
                inputs.push(doc.path.clone());
            }
        }
        if inputs.is_empty() {
            return Ok((None, absorbed));
        }

        let path = job
            .output_dir
            .join(self.file_name(&sanitize_file_name(&export.summary_id), tag));
        let merged = merge_pdfs(&inputs, &path)?.map(|path| GeneratedDocument {
            id: DocumentId::SummaryGroup,
            path,
            name: export.summary_id.clone(),
            sequence: None,
        });
        Ok((merged, absorbed))
    }

    fn merge_consolidated(
        &self,
        generated: &[GeneratedDocument],
        detected: &[&VendorBlock],
        block_docs: &HashMap<BlockId, usize>,
        absorbed: &HashSet<BlockId>,
        job: &ExportJob,
        tag: &str,
    ) -> Result<Option<GeneratedDocument>> {
        let mut ids: Vec<DocumentId> = Vec::new();
        let mut push = |id: DocumentId| {
            if !ids.contains(&id) {
                ids.push(id);
            }
        };
        for id in &job.order {
            match id {
                DocumentId::SummaryGroup => push(id.clone()),
                DocumentId::Block(block) if block_docs.contains_key(block) => push(id.clone()),
                _ => {}
            }
        }
        push(DocumentId::SummaryGroup);
        for block in detected {
            push(DocumentId::Block(block.id));
        }

        let excluded_names: HashSet<String> = job
            .excluded_names
            .iter()
            .map(|name| text::normalize(strip_leading_code(name.trim())))
            .collect();
        let summary = generated.iter().find(|d| d.id == DocumentId::SummaryGroup);
        let inputs: Vec<PathBuf> = ids
            .iter()
            .filter(|id| !job.excluded_ids.contains(*id))
            .filter_map(|id| match id {
                DocumentId::SummaryGroup => summary,
                DocumentId::Block(block) if !absorbed.contains(block) => block_docs.get(block).map(|&i| &generated[i]),
                _ => None,
            })
            .filter(|doc| {
                let excluded = excluded_names.contains(&text::normalize(&doc.name));
                if excluded {
                    log::debug!("[export] {} left out of the consolidated file", doc.name);
                }
                !excluded
            })
            .map(|doc| doc.path.clone())
            .collect();
        if inputs.is_empty() {
            return Ok(None);
        }

        let export = &self.config.export;
        let path = job
            .output_dir
            .join(self.file_name(&sanitize_file_name(&export.consolidated_name), tag));
        Ok(merge_pdfs(&inputs, &path)?.map(|path| GeneratedDocument {
            id: DocumentId::Consolidated,
            path,
            name: export.consolidated_name.clone(),
            sequence: None,
        }))
    }
}

pub(crate) fn open_error(path: &Path, err: HostError) -> Error {
    match err {
        HostError::Open { path, reason } => Error::HostOpen { path, reason },
        other => Error::HostOpen {
            path: path.to_path_buf(),
            reason: other.to_string(),
        },
    }
}

/// Open `job.source_path` in a fresh host and export every document.
///
/// The host and workbook are released before this returns, on success and on failure.
/// Documents written before a failure stay on disk.
pub fn export(
    factory: &dyn HostFactory,
    config: &Config,
    job: &ExportJob,
    progress: &Progress<'_>,
) -> Result<Vec<GeneratedDocument>> {
    let result = run_export(factory, config, job, progress);
    match &result {
        Ok(docs) => progress.report(100, format!("{} documentos generados", docs.len())),
        Err(err) => progress.report(100, format!("Error: {err}")),
    }
    result
}

fn run_export(
    factory: &dyn HostFactory,
    config: &Config,
    job: &ExportJob,
    progress: &Progress<'_>,
) -> Result<Vec<GeneratedDocument>> {
    if !job.source_path.is_file() {
        return Err(Error::HostOpen {
            path: job.source_path.clone(),
            reason: "file not found".to_string(),
        });
    }
    let assembler = DocumentAssembler::new(config)?;
    std::fs::create_dir_all(&job.output_dir)?;
    progress.report(5, "Abriendo libro");

    let mut session = HostSession::launch(factory).map_err(Error::host("launch host"))?;
    let mut workbook = session
        .open(&job.source_path, true)
        .map_err(|err| open_error(&job.source_path, err))?;
    progress.report(10, "Libro abierto");

    let docs = assembler.assemble(&mut *workbook, job, progress)?;

    if let Err(err) = workbook.close(false) {
        log::warn!("[export] failed to close {}: {err}", job.source_path.display());
    }
    if let Err(err) = session.quit() {
        log::warn!("[export] failed to quit host: {err}");
    }
    Ok(docs)
}
