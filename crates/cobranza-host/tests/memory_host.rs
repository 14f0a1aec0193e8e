use cobranza_host::memory::{Fault, HostOp, MemoryHostFactory, SheetData, WorkbookData};
use cobranza_host::{HostError, HostSession, PasteKind};
use cobranza_model::{CellAddr, CellValue, PageAttribute, PageValue};
use pretty_assertions::assert_eq;

fn fixture(dir: &std::path::Path) -> std::path::PathBuf {
    let path = dir.join("book.json");
    WorkbookData::new()
        .with_sheet(SheetData::new("Hoja1").with_row(1, ["Vendor A"]).with_row(2, ["Balance for A"]))
        .with_sheet(SheetData::new("SUR"))
        .save(&path)
        .unwrap();
    path
}

#[test]
fn missing_workbook_is_an_open_error() {
    let dir = tempfile::tempdir().unwrap();
    let factory = MemoryHostFactory::new();
    let mut session = HostSession::launch(&factory).unwrap();
    let err = session.open(&dir.path().join("nope.json"), true).err().unwrap();
    assert!(matches!(err, HostError::Open { .. }), "{err}");
}

#[test]
fn guards_release_workbooks_and_hosts() {
    let dir = tempfile::tempdir().unwrap();
    let path = fixture(dir.path());
    let factory = MemoryHostFactory::new();
    let stats = factory.stats();
    {
        let mut session = HostSession::launch(&factory).unwrap();
        let _a = session.open(&path, true).unwrap();
        let _b = session.open(&path, false).unwrap();
        assert_eq!(stats.open_workbooks(), 2);
        assert_eq!(stats.live_hosts(), 1);
    }
    assert_eq!(stats.open_workbooks(), 0);
    assert_eq!(stats.live_hosts(), 0);
    assert_eq!(stats.launched(), 1);
}

#[test]
fn read_only_workbooks_cannot_save_in_place_but_can_save_as() {
    let dir = tempfile::tempdir().unwrap();
    let path = fixture(dir.path());
    let factory = MemoryHostFactory::new();
    let mut session = HostSession::launch(&factory).unwrap();

    let mut wb = session.open(&path, true).unwrap();
    wb.sheet_mut(1)
        .unwrap()
        .write_cell(CellAddr::new(1, 2), CellValue::from("PITER"))
        .unwrap();
    let copy = dir.path().join("copy.json");
    wb.save_as(&copy).unwrap();
    assert!(matches!(wb.close(true), Err(HostError::ReadOnly(_))));

    let saved = WorkbookData::load(&copy).unwrap();
    assert_eq!(
        saved.sheet("sur").unwrap().get(CellAddr::new(1, 2)),
        CellValue::from("PITER")
    );
    let original = WorkbookData::load(&path).unwrap();
    assert!(original.sheet("SUR").unwrap().cells.is_empty());
}

#[test]
fn faults_fail_the_configured_number_of_times() {
    let dir = tempfile::tempdir().unwrap();
    let path = fixture(dir.path());
    let factory = MemoryHostFactory::with_faults(vec![Fault::on(HostOp::SaveAs).times(1)]);
    let mut session = HostSession::launch(&factory).unwrap();
    let mut wb = session.open(&path, false).unwrap();

    let out = dir.path().join("out.json");
    assert!(wb.save_as(&out).is_err());
    wb.save_as(&out).unwrap();
    assert!(out.is_file());
}

#[test]
fn unsupported_page_attributes_are_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = fixture(dir.path());
    let factory = MemoryHostFactory::with_faults(vec![Fault::on(HostOp::SetPageAttribute(
        PageAttribute::ScaleWithDocHeaderFooter,
    ))]);
    let mut session = HostSession::launch(&factory).unwrap();
    let mut wb = session.open(&path, false).unwrap();
    let sheet = wb.sheet_mut(0).unwrap();

    let err = sheet
        .set_page_attribute(PageAttribute::ScaleWithDocHeaderFooter, PageValue::Flag(false))
        .unwrap_err();
    assert!(matches!(err, HostError::UnsupportedAttribute(_)));
    sheet
        .set_page_attribute(PageAttribute::CenterHeader, PageValue::Text("&P".into()))
        .unwrap();
}

#[test]
fn clipboard_paste_and_paste_special_fill_the_destination() {
    let dir = tempfile::tempdir().unwrap();
    let path = fixture(dir.path());
    let factory = MemoryHostFactory::new();
    let mut session = HostSession::launch(&factory).unwrap();
    let mut wb = session.open(&path, false).unwrap();

    let clip = {
        let src = wb.sheet(0).unwrap();
        src.copy_range(src.used_range().unwrap()).unwrap()
    };
    let dst = wb.sheet_mut(1).unwrap();
    dst.paste(&clip, CellAddr::new(1, 1)).unwrap();
    dst.paste_special(&clip, CellAddr::new(5, 1), PasteKind::All).unwrap();
    assert_eq!(dst.cell(CellAddr::new(2, 1)).unwrap(), CellValue::from("Balance for A"));
    assert_eq!(dst.cell(CellAddr::new(5, 1)).unwrap(), CellValue::from("Vendor A"));
}

#[test]
fn scratch_sheets_are_appended_and_deletable() {
    let dir = tempfile::tempdir().unwrap();
    let path = fixture(dir.path());
    let factory = MemoryHostFactory::new();
    let mut session = HostSession::launch(&factory).unwrap();
    let mut wb = session.open(&path, false).unwrap();

    let idx = wb.add_sheet("_tmp_A").unwrap();
    assert_eq!(idx, 2);
    assert!(matches!(wb.add_sheet("_TMP_a"), Err(HostError::DuplicateSheetName(_))));
    wb.delete_sheet(idx).unwrap();
    assert_eq!(wb.sheet_names(), vec!["Hoja1".to_string(), "SUR".to_string()]);
}

#[test]
fn export_writes_a_loadable_pdf() {
    let dir = tempfile::tempdir().unwrap();
    let path = fixture(dir.path());
    let factory = MemoryHostFactory::new();
    let mut session = HostSession::launch(&factory).unwrap();
    let wb = session.open(&path, true).unwrap();

    let pdf = dir.path().join("out").join("Hoja1.pdf");
    wb.sheet(0).unwrap().export_fixed_format(&pdf).unwrap();
    let doc = lopdf::Document::load(&pdf).unwrap();
    assert_eq!(doc.get_pages().len(), 1);
}
