use std::path::PathBuf;
use std::sync::Mutex;

use chrono::NaiveDate;
use cobranza_engine::{CopyOptions, CopyOutcome, CopyPipeline, Config, Error, PasteStrategy, PipelineState, Progress, ValueRedistributor};
use cobranza_host::memory::{Fault, HostOp, MemoryHostFactory, SheetData, WorkbookData};
use cobranza_host::HostSession;
use cobranza_model::{CellAddr, CellValue};
use pretty_assertions::assert_eq;

fn ledger() -> SheetData {
    let mut sheet = SheetData::new("Hoja1")
        .with_row(1, ["EMPRESA DISTRIBUIDORA SAC"])
        .with_row(2, ["REPORTE DE COBRANZA"])
        .with_row(3, ["Usuario: admin"])
        .with_row(4, ["-"])
        .with_row(5, ["-"])
        .with_row(6, ["-"])
        .with_row(7, ["Fecha:", "01/02/2024"])
        .with_row(8, ["Vendor", "000002 PITER HUAYTA"])
        .with_row(9, ["CLIENTE UNO", "F001-22"])
        .with_row(10, ["Balance for PITER HUAYTA"]);
    sheet.set(10, 2, 100.0);
    sheet.set(10, 3, 50.0);
    sheet
}

fn master() -> WorkbookData {
    let mut sur = SheetData::new("SUR");
    sur.set(1, 2, "COBRANZA AL 01 ENERO 2024");
    sur.set(3, 2, "PITER");
    sur.set(3, 3, 1.0);
    sur.set(3, 4, 2.0);
    sur.set(4, 2, "MANUEL");
    let mut norte = SheetData::new("NORTE");
    norte.set(2, 2, "OFICINA");

    WorkbookData::new()
        .with_sheet(SheetData::new("Hoja1").with_row(1, ["contenido anterior"]))
        .with_sheet(sur)
        .with_sheet(norte)
}

struct Fixture {
    dir: tempfile::TempDir,
    source: PathBuf,
    master: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("ruta 15-03-24.json");
        let master_path = dir.path().join("COBRANZA-formateado.json");
        WorkbookData::new().with_sheet(ledger()).save(&source).unwrap();
        master().save(&master_path).unwrap();
        Self {
            dir,
            source,
            master: master_path,
        }
    }

    fn options(&self) -> CopyOptions {
        CopyOptions {
            date: NaiveDate::from_ymd_opt(2024, 3, 15),
            output_dir: Some(self.dir.path().join("out")),
            ..CopyOptions::default()
        }
    }

    fn outputs(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(self.dir.path().join("out"))
            .map(|entries| entries.map(|e| e.unwrap().path()).collect())
            .unwrap_or_default();
        files.sort();
        files
    }
}

fn cell(book: &WorkbookData, sheet: &str, row: u32, col: u32) -> CellValue {
    book.sheet(sheet).unwrap().get(CellAddr::new(row, col))
}

fn run(factory: &MemoryHostFactory, fx: &Fixture, options: &CopyOptions) -> Result<CopyOutcome, Error> {
    let config = Config::builtin();
    CopyPipeline::new(factory, &config).run(&fx.source, &fx.master, options, &Progress::silent())
}

#[test]
fn copies_trims_dates_and_redistributes() {
    let fx = Fixture::new();
    let factory = MemoryHostFactory::new();

    let outcome = run(&factory, &fx, &fx.options()).unwrap();
    assert_eq!(outcome.paste, PasteStrategy::Direct);
    assert_eq!(fx.outputs(), vec![outcome.path.clone()]);

    let name = outcome.path.file_name().unwrap().to_str().unwrap();
    assert!(name.starts_with("maestro_copiado_") && name.ends_with(".xls"), "{name}");

    let book = WorkbookData::load(&outcome.path).unwrap();
    // Six banner rows are gone; the date row is now row 1.
    assert_eq!(cell(&book, "Hoja1", 1, 2), CellValue::from("15/03/2024"));
    assert_eq!(cell(&book, "Hoja1", 2, 2), CellValue::from("000002 PITER HUAYTA"));
    assert_eq!(cell(&book, "SUR", 1, 2), CellValue::from("COBRANZA AL 15 MARZO 2024"));
    assert_eq!(cell(&book, "SUR", 3, 3), CellValue::Number(100.0));
    assert_eq!(cell(&book, "SUR", 3, 4), CellValue::Number(50.0));
    assert_eq!(cell(&book, "SUR", 4, 3), CellValue::Empty);
    assert_eq!(cell(&book, "NORTE", 2, 3), CellValue::Empty);

    // The master on disk is untouched.
    let original = WorkbookData::load(&fx.master).unwrap();
    assert_eq!(cell(&original, "SUR", 3, 3), CellValue::Number(1.0));
}

#[test]
fn without_a_date_titles_stay() {
    let fx = Fixture::new();
    let options = CopyOptions {
        date: None,
        ..fx.options()
    };
    let outcome = run(&MemoryHostFactory::new(), &fx, &options).unwrap();
    let book = WorkbookData::load(&outcome.path).unwrap();
    assert_eq!(cell(&book, "SUR", 1, 2), CellValue::from("COBRANZA AL 01 ENERO 2024"));
    assert_eq!(cell(&book, "Hoja1", 1, 2), CellValue::from("01/02/2024"));
}

#[test]
fn output_is_renamed_when_a_name_is_given() {
    let fx = Fixture::new();
    let options = CopyOptions {
        output_name: Some(" resultado ".to_string()),
        ..fx.options()
    };
    let outcome = run(&MemoryHostFactory::new(), &fx, &options).unwrap();
    assert_eq!(outcome.path, fx.dir.path().join("out").join("resultado.xls"));
    assert_eq!(fx.outputs(), vec![outcome.path]);
}

#[test]
fn paste_falls_back_to_the_clipboard() {
    let fx = Fixture::new();
    let factory = MemoryHostFactory::with_faults(vec![Fault::on(HostOp::CopyTo)]);
    let outcome = run(&factory, &fx, &fx.options()).unwrap();
    assert_eq!(outcome.paste, PasteStrategy::Clipboard);

    let book = WorkbookData::load(&outcome.path).unwrap();
    assert_eq!(cell(&book, "SUR", 3, 3), CellValue::Number(100.0));
}

#[test]
fn each_paste_tier_fails_independently() {
    let fx = Fixture::new();
    let factory = MemoryHostFactory::with_faults(vec![Fault::on(HostOp::Paste)]);
    assert_eq!(run(&factory, &fx, &fx.options()).unwrap().paste, PasteStrategy::Direct);

    let factory = MemoryHostFactory::with_faults(vec![Fault::on(HostOp::CopyTo), Fault::on(HostOp::Paste)]);
    let outcome = run(&factory, &fx, &fx.options()).unwrap();
    assert_eq!(outcome.paste, PasteStrategy::PasteSpecial);
    let book = WorkbookData::load(&outcome.path).unwrap();
    assert_eq!(cell(&book, "SUR", 3, 3), CellValue::Number(100.0));
}

#[test]
fn paste_failure_lists_every_attempt_and_releases_the_host() {
    let fx = Fixture::new();
    let factory = MemoryHostFactory::with_faults(vec![
        Fault::on(HostOp::CopyTo),
        Fault::on(HostOp::Copy),
    ]);
    let stats = factory.stats();

    let err = run(&factory, &fx, &fx.options()).unwrap_err();
    let Error::PipelineFailed { phase, .. } = &err else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(*phase, PipelineState::Pasted);
    let Error::PasteFailure(attempts) = err.root() else {
        panic!("unexpected root: {}", err.root());
    };
    assert_eq!(attempts.matches(" | ").count(), 2, "{attempts}");
    assert!(attempts.contains("copy(destination)"));
    assert!(attempts.contains("paste_special(all)"));

    assert!(fx.outputs().is_empty());
    assert_eq!(stats.live_hosts(), 0);
    assert_eq!(stats.open_workbooks(), 0);
}

#[test]
fn missing_source_is_an_open_error() {
    let fx = Fixture::new();
    std::fs::remove_file(&fx.source).unwrap();
    let seen = Mutex::new(Vec::new());
    let sink = |percent: u8, _: &str| seen.lock().unwrap().push(percent);
    let progress = Progress::new(Some(&sink));

    let config = Config::builtin();
    let factory = MemoryHostFactory::new();
    let err = CopyPipeline::new(&factory, &config)
        .run(&fx.source, &fx.master, &fx.options(), &progress)
        .unwrap_err();

    assert!(matches!(err.root(), Error::HostOpen { path, .. } if path == &fx.source), "{err}");
    assert_eq!(progress.last(), 100);
    assert_eq!(seen.lock().unwrap().last(), Some(&100));
    assert_eq!(factory.stats().launched(), 0);
}

#[test]
fn save_retries_once_then_reports_a_collision() {
    let fx = Fixture::new();
    let factory = MemoryHostFactory::with_faults(vec![Fault::on(HostOp::SaveAs).times(1)]);
    let outcome = run(&factory, &fx, &fx.options()).unwrap();
    let name = outcome.path.file_stem().unwrap().to_str().unwrap().to_string();
    // maestro_copiado_<date>_<time>_<micros>_<suffix>
    assert_eq!(name.split('_').count(), 6, "{name}");

    let factory = MemoryHostFactory::with_faults(vec![Fault::on(HostOp::SaveAs)]);
    let err = run(&factory, &fx, &fx.options()).unwrap_err();
    assert!(matches!(err.root(), Error::SaveCollision { .. }), "{err}");
    assert_eq!(factory.stats().live_hosts(), 0);
    assert_eq!(factory.stats().open_workbooks(), 0);
}

#[test]
fn cosmetic_failures_are_reported_not_fatal() {
    let fx = Fixture::new();
    let factory = MemoryHostFactory::with_faults(vec![Fault::on_sheet("Hoja1", HostOp::SetColumnWidth)]);
    let outcome = run(&factory, &fx, &fx.options()).unwrap();
    assert!(!outcome.skipped.is_empty());
    assert!(outcome.skipped.iter().all(|f| f.target.starts_with("Hoja1!col")));
}

#[test]
fn distributing_twice_gives_the_same_workbook() {
    let fx = Fixture::new();
    let outcome = run(&MemoryHostFactory::new(), &fx, &fx.options()).unwrap();

    let config = Config::builtin();
    let redistributor = ValueRedistributor::new(&config).unwrap();
    let factory = MemoryHostFactory::new();
    let mut session = HostSession::launch(&factory).unwrap();
    let mut book = session.open(&outcome.path, false).unwrap();
    let totals = redistributor.collect(book.sheet(0).unwrap()).unwrap();
    assert!(redistributor.distribute(&mut *book, &totals).is_clean());

    let again = outcome.path.with_extension("again");
    book.save_as(&again).unwrap();
    assert_eq!(WorkbookData::load(&again).unwrap(), WorkbookData::load(&outcome.path).unwrap());
}
