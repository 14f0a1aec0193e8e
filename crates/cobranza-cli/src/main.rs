use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use cobranza_engine::{
    archive_name, date_from_filename, date_tag, package_zip, preview_blocks, resolve_default_master, Config,
    CopyOptions, DocumentId, ExportJob, JobRunner, ProgressSink,
};
use cobranza_host::memory::MemoryHostFactory;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "cobranza", about = "Copy collection ledgers into the master workbook and export per-vendor PDFs.")]
struct Cli {
    /// JSON configuration layered over the built-in defaults (default: `$COBRANZA_CONFIG`).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Hide progress lines on stderr.
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Paste a ledger into the master workbook and redistribute vendor balances.
    Copy(CopyArgs),
    /// Export one PDF per vendor block plus the summary and consolidated documents.
    Export(ExportArgs),
    /// List the vendor blocks of a workbook in default consolidated order.
    Blocks(BlocksArgs),
}

#[derive(Args)]
struct DateArgs {
    /// Date written into headers, titles and document names (YYYY-MM-DD).
    #[arg(long, conflicts_with = "date_from_name")]
    date: Option<NaiveDate>,

    /// Infer the date from a `DD-MM-YY` fragment of the workbook's file name.
    #[arg(long)]
    date_from_name: bool,
}

impl DateArgs {
    fn resolve(&self, workbook: &Path) -> Result<Option<NaiveDate>> {
        if !self.date_from_name {
            return Ok(self.date);
        }
        let name = workbook
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let date = date_from_filename(name).with_context(|| format!("no date in file name {name:?}"))?;
        Ok(Some(date))
    }
}

#[derive(Args)]
struct CopyArgs {
    /// Route ledger to copy from.
    #[arg(long)]
    source: PathBuf,

    /// Master workbook (default: `$COBRANZA_DEFAULT_MASTER`, then `COBRANZA-formateado.*`
    /// next to the source).
    #[arg(long)]
    master: Option<PathBuf>,

    #[command(flatten)]
    date: DateArgs,

    /// Leading rows to delete after pasting (default from config).
    #[arg(long, value_name = "N")]
    delete_rows: Option<u32>,

    /// Final file name for the result.
    #[arg(long)]
    name: Option<String>,

    /// Directory for the result (default: a fresh temporary directory).
    #[arg(long, value_name = "DIR")]
    out_dir: Option<PathBuf>,
}

#[derive(Args)]
struct ExportArgs {
    /// Workbook to export.
    workbook: PathBuf,

    #[arg(long, value_name = "DIR")]
    out_dir: PathBuf,

    /// Only split blocks from this sheet.
    #[arg(long)]
    sheet: Option<String>,

    /// Document id placed next in the consolidated file (repeatable).
    #[arg(long = "order", value_name = "ID")]
    order: Vec<String>,

    /// Document id left out of the consolidated file (repeatable).
    #[arg(long = "exclude", value_name = "ID")]
    exclude: Vec<String>,

    #[command(flatten)]
    date: DateArgs,

    /// Also package every document into a zip (default name: `PDFS_<stem>.zip` in the output
    /// directory).
    #[arg(long, value_name = "PATH", num_args = 0..=1)]
    zip: Option<Option<PathBuf>>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(Args)]
struct BlocksArgs {
    workbook: PathBuf,

    #[arg(long)]
    sheet: Option<String>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path).with_context(|| format!("load config {}", path.display()))?,
        None => Config::from_env().context("load config from environment")?,
    };
    let runner = JobRunner::new(Arc::new(MemoryHostFactory::new()), Arc::new(config));
    let sink = (!cli.quiet).then(progress_sink);

    let mut out = io::stdout().lock();
    let result = match cli.command {
        Command::Copy(args) => run_copy(&runner, args, sink, &mut out),
        Command::Export(args) => run_export(&runner, args, sink, &mut out),
        Command::Blocks(args) => run_blocks(&runner, args, &mut out),
    };
    match result {
        // A consumer such as `head` closing the pipe early is not a failure.
        Err(err) if is_broken_pipe(&err) => Ok(()),
        other => other,
    }
}

fn is_broken_pipe(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<io::Error>())
        .any(|e| e.kind() == io::ErrorKind::BrokenPipe)
}

fn progress_sink() -> Arc<dyn ProgressSink> {
    Arc::new(|percent: u8, message: &str| {
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(stderr, "[{percent:>3}%] {message}");
    })
}

fn run_copy(
    runner: &JobRunner,
    args: CopyArgs,
    sink: Option<Arc<dyn ProgressSink>>,
    out: &mut impl Write,
) -> Result<()> {
    let master = match args.master {
        Some(master) => master,
        None => {
            let dir = args
                .source
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            resolve_default_master(dir)
                .with_context(|| format!("no --master given and no default master in {}", dir.display()))?
        }
    };
    log::debug!("master workbook: {}", master.display());
    let options = CopyOptions {
        date: args.date.resolve(&args.source)?,
        delete_rows: args.delete_rows,
        output_name: args.name,
        output_dir: args.out_dir,
    };

    let outcome = runner
        .spawn_copy(args.source.clone(), master.clone(), options, sink)?
        .join()
        .with_context(|| format!("copy {} into {}", args.source.display(), master.display()))?;

    writeln!(out, "{}", outcome.path.display())?;
    writeln!(out, "  paste: {}", outcome.paste)?;
    if !outcome.skipped.is_empty() {
        writeln!(out, "  skipped cosmetic writes: {}", outcome.skipped.len())?;
    }
    Ok(())
}

fn parse_ids(raw: &[String], summary_id: &str, flag: &str) -> Result<Vec<DocumentId>> {
    raw.iter()
        .map(|id| {
            DocumentId::parse(id, summary_id).with_context(|| format!("invalid --{flag} id {id:?}"))
        })
        .collect()
}

fn run_export(
    runner: &JobRunner,
    args: ExportArgs,
    sink: Option<Arc<dyn ProgressSink>>,
    out: &mut impl Write,
) -> Result<()> {
    let config = runner.config();
    let summary_id = &config.export.summary_id;

    let mut job = ExportJob::new(&args.workbook, &args.out_dir, config);
    job.target_sheet = args.sheet;
    job.order = parse_ids(&args.order, summary_id, "order")?;
    job.excluded_ids
        .extend(parse_ids(&args.exclude, summary_id, "exclude")?);
    job.date_tag = args.date.resolve(&args.workbook)?.map(date_tag);

    let docs = runner
        .spawn_export(job, sink)?
        .join()
        .with_context(|| format!("export {}", args.workbook.display()))?;

    let archive = match args.zip {
        Some(dest) => {
            let dest = dest.unwrap_or_else(|| args.out_dir.join(archive_name(&args.workbook)));
            let archive = package_zip(&docs, &dest).with_context(|| format!("write {}", dest.display()))?;
            log::info!("packaged {} documents into {}", docs.len(), archive.display());
            Some(archive)
        }
        None => None,
    };

    match args.format {
        OutputFormat::Json => {
            let report = serde_json::json!({ "documents": docs, "archive": archive });
            writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
        }
        OutputFormat::Text => {
            for doc in &docs {
                let seq = doc.sequence.map(|s| format!("{s:06}")).unwrap_or_else(|| "-".repeat(6));
                writeln!(out, "{seq}  {:<24}  {}", doc.name, doc.path.display())?;
            }
            if let Some(archive) = archive {
                writeln!(out, "archive: {}", archive.display())?;
            }
        }
    }
    Ok(())
}

fn run_blocks(runner: &JobRunner, args: BlocksArgs, out: &mut impl Write) -> Result<()> {
    let factory = MemoryHostFactory::new();
    let blocks = preview_blocks(&factory, runner.config(), &args.workbook, args.sheet.as_deref())
        .with_context(|| format!("scan {}", args.workbook.display()))?;

    match args.format {
        OutputFormat::Json => writeln!(out, "{}", serde_json::to_string_pretty(&blocks)?)?,
        OutputFormat::Text => {
            for block in &blocks {
                writeln!(
                    out,
                    "{}  {:<24}  {}!{}:{}",
                    block.id, block.name, block.sheet, block.row_start, block.row_end
                )?;
            }
        }
    }
    Ok(())
}
