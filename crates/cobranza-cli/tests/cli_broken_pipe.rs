use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use cobranza_host::memory::{SheetData, WorkbookData};

/// Enough blocks that the listing overflows a pipe buffer.
fn large_workbook(dir: &Path) -> PathBuf {
    let mut sheet = SheetData::new("CUADRE");
    for i in 0..3000u32 {
        let name = format!("{:06} VENDEDOR {i}", i + 1);
        sheet.set_row(i * 2 + 1, ["Vendor".to_string(), name.clone()]);
        sheet.set_row(i * 2 + 2, [format!("Balance for {name}"), "1".to_string()]);
    }
    let path = dir.join("grande.json");
    WorkbookData::new().with_sheet(sheet).save(&path).unwrap();
    path
}

fn assert_survives_closed_stdout(args: &[&str]) {
    let dir = tempfile::tempdir().unwrap();
    let workbook = large_workbook(dir.path());

    // Simulate a downstream consumer exiting early (e.g. `cobranza blocks ... | head`).
    let mut child = Command::new(env!("CARGO_BIN_EXE_cobranza"))
        .arg("blocks")
        .arg(&workbook)
        .args(args)
        .env_remove("COBRANZA_CONFIG")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn cobranza");

    drop(child.stdout.take());

    let output = child.wait_with_output().expect("wait for cobranza to finish");
    assert!(
        output.status.success(),
        "expected success even when stdout is closed\nstderr:\n{}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn text_output_does_not_panic_on_broken_pipe() {
    assert_survives_closed_stdout(&[]);
}

#[test]
fn json_output_does_not_panic_on_broken_pipe() {
    assert_survives_closed_stdout(&["--format", "json"]);
}
