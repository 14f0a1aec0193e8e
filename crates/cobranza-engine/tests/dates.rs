use chrono::NaiveDate;
use cobranza_engine::{Config, DateStamper};
use cobranza_host::memory::{Fault, HostOp, MemoryHostFactory, SheetData, WorkbookData};
use cobranza_host::{HostSession, Sheet};
use cobranza_model::{CellAddr, CellValue, PageAttribute, PageValue};
use pretty_assertions::assert_eq;

fn ledger() -> SheetData {
    let mut sheet = SheetData::new("Hoja1")
        .with_row(1, ["Fecha:", "01/02/2024"])
        .with_row(2, ["Vendor", "000002 PITER HUAYTA"]);
    sheet.set(20, 1, "Vence 01/02/2024");
    sheet.add_shape("corte", Some("Corte 01/02/2024"));
    sheet.add_shape("nota", Some("otra 02/02/2024"));
    sheet.add_shape("linea", None);
    sheet.add_shape("titulo", Some("Cobranza al 01 enero 2024"));
    sheet.page_setup.header.center = "RUTA SUR".to_string();
    sheet.page_setup.footer.right = "Impreso 01/01/2024".to_string();
    sheet
}

fn with_sheet(factory: &MemoryHostFactory, test: impl FnOnce(&mut dyn Sheet)) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ruta.json");
    WorkbookData::new().with_sheet(ledger()).save(&path).unwrap();
    let mut session = HostSession::launch(factory).unwrap();
    let mut book = session.open(&path, true).unwrap();
    test(book.sheet_mut(0).unwrap());
}

fn march_15() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
}

fn page_text(sheet: &dyn Sheet, attribute: PageAttribute) -> PageValue {
    sheet.page_attribute(attribute).unwrap()
}

#[test]
fn header_dates_are_rewritten_in_cells_shapes_and_footers() {
    let factory = MemoryHostFactory::with_faults(vec![Fault::on(HostOp::SetShapeText).times(1)]);
    with_sheet(&factory, |sheet| {
        let stamper = DateStamper::new(&Config::builtin());
        let report = stamper.stamp_header(sheet, march_15());

        let targets: Vec<&str> = report.failures.iter().map(|f| f.target.as_str()).collect();
        assert_eq!(targets, vec!["shape #0"]);
        assert_eq!(report.applied, 3);

        assert_eq!(sheet.cell(CellAddr::new(1, 2)).unwrap(), CellValue::from("15/03/2024"));
        // Below the scanned header rows.
        assert_eq!(sheet.cell(CellAddr::new(20, 1)).unwrap(), CellValue::from("Vence 01/02/2024"));

        assert_eq!(sheet.shape_text(0).unwrap().as_deref(), Some("Corte 01/02/2024"));
        assert_eq!(sheet.shape_text(1).unwrap().as_deref(), Some("otra 15/03/2024"));
        assert_eq!(sheet.shape_text(2).unwrap(), None);
        assert_eq!(
            page_text(sheet, PageAttribute::RightFooter),
            PageValue::Text("Impreso 15/03/2024".to_string())
        );
        assert_eq!(page_text(sheet, PageAttribute::CenterHeader), PageValue::Text("RUTA SUR".to_string()));
    });
}

#[test]
fn stamping_twice_changes_nothing_more() {
    with_sheet(&MemoryHostFactory::new(), |sheet| {
        let stamper = DateStamper::new(&Config::builtin());
        assert!(stamper.stamp_header(sheet, march_15()).is_clean());
        let again = stamper.stamp_header(sheet, march_15());
        assert!(again.is_clean());
        assert_eq!(again.applied, 0);
    });
}

#[test]
fn retitle_reaches_shapes() {
    with_sheet(&MemoryHostFactory::new(), |sheet| {
        let report = DateStamper::new(&Config::builtin()).retitle(sheet, march_15());
        assert!(report.is_clean(), "{:?}", report.failures);
        assert_eq!(sheet.shape_text(3).unwrap().as_deref(), Some("COBRANZA AL 15 MARZO 2024"));
        assert_eq!(sheet.shape_text(1).unwrap().as_deref(), Some("otra 02/02/2024"));
    });
}
