//! Date and title rewriting in cells, shapes and page headers/footers.

use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate};
use cobranza_host::Sheet;
use cobranza_model::{CellAddr, CellRange, CellValue, PageAttribute, PageValue};
use regex::Regex;

use crate::config::Config;
use crate::report::StepReport;

fn date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d{1,2})[/-](\d{1,2})[/-](\d{2,4})\b").expect("valid regex"))
}

fn file_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{2})[-_](\d{2})[-_](\d{2,4})").expect("valid regex"))
}

/// `DD/MM/YYYY`.
pub fn format_dmy(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// Tag appended to exported document names: `DD-MM-YYYY`.
pub fn date_tag(date: NaiveDate) -> String {
    date.format("%d-%m-%Y").to_string()
}

/// Infer a date from `DD-MM-YY`, `DD_MM_YYYY` and similar fragments of a file name.
///
/// Two-digit years are read as 20xx; three-digit years and impossible dates are rejected.
pub fn date_from_filename(name: &str) -> Option<NaiveDate> {
    file_date_re().captures_iter(name).find_map(|caps| {
        let day: u32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let year = match caps[3].len() {
            2 => 2000 + caps[3].parse::<i32>().ok()?,
            4 => caps[3].parse().ok()?,
            _ => return None,
        };
        NaiveDate::from_ymd_opt(year, month, day)
    })
}

/// A scan window anchored at `A1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanWindow {
    pub rows: u32,
    pub cols: u32,
}

impl ScanWindow {
    /// The window clipped to the bottom-right corner of `used`; `None` when nothing is left.
    fn clip(self, used: Option<CellRange>) -> Option<CellRange> {
        let end = used?.end();
        let rows = self.rows.min(end.row);
        let cols = self.cols.min(end.col);
        (rows > 0 && cols > 0).then(|| CellRange::new(CellAddr::new(1, 1), CellAddr::new(rows, cols)))
    }
}

#[derive(Debug, Clone)]
pub struct DateStamper {
    title_marker: String,
    month_names: [String; 12],
    header_window: ScanWindow,
    title_window: ScanWindow,
}

impl DateStamper {
    pub fn new(config: &Config) -> Self {
        Self {
            title_marker: config.markers.title.trim().to_uppercase(),
            month_names: config.markers.month_names.clone(),
            header_window: ScanWindow {
                rows: config.copy.header_scan_rows,
                cols: config.copy.header_scan_cols,
            },
            title_window: ScanWindow {
                rows: config.copy.title_scan_rows,
                cols: config.copy.title_scan_cols,
            },
        }
    }

    /// `text` with every embedded date replaced, or `None` when nothing would change.
    pub fn stamp_text(&self, text: &str, date: NaiveDate) -> Option<String> {
        if !date_re().is_match(text) {
            return None;
        }
        let replaced = date_re().replace_all(text, format_dmy(date).as_str());
        (replaced != text).then(|| replaced.into_owned())
    }

    /// `"<MARKER> DD <MONTH> YYYY"`.
    pub fn title(&self, date: NaiveDate) -> String {
        let month = &self.month_names[date.month0() as usize];
        format!("{} {:02} {} {}", self.title_marker, date.day(), month, date.year())
    }

    /// The generated title when `text` carries the title marker and differs from it.
    pub fn retitle_text(&self, text: &str, date: NaiveDate) -> Option<String> {
        if self.title_marker.is_empty() || !text.to_uppercase().contains(&self.title_marker) {
            return None;
        }
        let title = self.title(date);
        (title != text).then_some(title)
    }

    /// Rewrite dates in the header window, shapes and the six header/footer strings.
    pub fn stamp_header(&self, sheet: &mut dyn Sheet, date: NaiveDate) -> StepReport {
        let mut report = StepReport::new("dates");
        self.rewrite_cells(sheet, self.header_window, &mut report, |text| self.stamp_text(text, date));
        self.rewrite_shapes(sheet, &mut report, |text| self.stamp_text(text, date));

        for attribute in PageAttribute::HEADER_FOOTER_TEXT {
            let current = match sheet.page_attribute(attribute) {
                Ok(PageValue::Text(text)) => text,
                Ok(_) => continue,
                Err(err) => {
                    report.fail(format!("page:{attribute}"), err.to_string());
                    continue;
                }
            };
            if let Some(updated) = self.stamp_text(&current, date) {
                let result = sheet.set_page_attribute(attribute, PageValue::Text(updated));
                report.record(|| format!("page:{attribute}"), result);
            }
        }
        report
    }

    /// Replace any title-marker text in the title window and in shapes.
    pub fn retitle(&self, sheet: &mut dyn Sheet, date: NaiveDate) -> StepReport {
        let mut report = StepReport::new("title");
        self.rewrite_cells(sheet, self.title_window, &mut report, |text| self.retitle_text(text, date));
        self.rewrite_shapes(sheet, &mut report, |text| self.retitle_text(text, date));
        report
    }

    fn rewrite_cells(
        &self,
        sheet: &mut dyn Sheet,
        window: ScanWindow,
        report: &mut StepReport,
        rewrite: impl Fn(&str) -> Option<String>,
    ) {
        let Some(range) = window.clip(sheet.used_range()) else {
            return;
        };
        let rows = match sheet.read_cells(range) {
            Ok(rows) => rows,
            Err(err) => {
                report.fail(format!("{}!{range}", sheet.name()), err.to_string());
                return;
            }
        };
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                let Some(updated) = value.as_text().and_then(&rewrite) else {
                    continue;
                };
                let addr = CellAddr::new(range.start_row + r as u32, range.start_col + c as u32);
                let result = sheet.write_cell(addr, CellValue::Text(updated));
                let name = sheet.name().to_string();
                report.record(|| format!("{name}!{}", addr.to_a1()), result);
            }
        }
    }

    fn rewrite_shapes(
        &self,
        sheet: &mut dyn Sheet,
        report: &mut StepReport,
        rewrite: impl Fn(&str) -> Option<String>,
    ) {
        for index in 0..sheet.shape_count() {
            let text = match sheet.shape_text(index) {
                Ok(Some(text)) => text,
                Ok(None) => continue,
                Err(err) => {
                    report.fail(format!("shape #{index}"), err.to_string());
                    continue;
                }
            };
            if let Some(updated) = rewrite(&text) {
                let result = sheet.set_shape_text(index, &updated);
                report.record(|| format!("shape #{index}"), result);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn stamp_replaces_every_date_and_is_idempotent() {
        let stamper = DateStamper::new(&Config::builtin());
        let date = ymd(2024, 3, 15);
        let once = stamper.stamp_text("Collection as of 01/02/2023", date).unwrap();
        assert_eq!(once, "Collection as of 15/03/2024");
        assert_eq!(stamper.stamp_text(&once, date), None);
        assert_eq!(
            stamper.stamp_text("del 1-2-23 al 28/02/2023", date).as_deref(),
            Some("del 15/03/2024 al 15/03/2024")
        );
        assert_eq!(stamper.stamp_text("no dates", date), None);
    }

    #[test]
    fn title_replaces_whole_string() {
        let stamper = DateStamper::new(&Config::builtin());
        let date = ymd(2024, 9, 5);
        assert_eq!(
            stamper.retitle_text("Cobranza al 31 agosto 2024 - sur", date).as_deref(),
            Some("COBRANZA AL 05 SETIEMBRE 2024")
        );
        assert_eq!(stamper.retitle_text("COBRANZA AL 05 SETIEMBRE 2024", date), None);
        assert_eq!(stamper.retitle_text("RESUMEN", date), None);
    }

    #[test]
    fn scan_window_stops_at_the_used_range() {
        let window = ScanWindow { rows: 8, cols: 60 };
        let used = |r1, c1, r2, c2| Some(CellRange::new(CellAddr::new(r1, c1), CellAddr::new(r2, c2)));
        assert_eq!(window.clip(used(2, 2, 40, 3)), used(1, 1, 8, 3));
        assert_eq!(window.clip(used(1, 1, 3, 90)), used(1, 1, 3, 60));
        assert_eq!(window.clip(None), None);
        assert_eq!(ScanWindow { rows: 0, cols: 60 }.clip(used(1, 1, 3, 3)), None);
    }

    #[test]
    fn filename_dates() {
        assert_eq!(date_from_filename("COBRANZA 15-03-24.xls"), Some(ymd(2024, 3, 15)));
        assert_eq!(date_from_filename("ruta_01_12_2023.xlsx"), Some(ymd(2023, 12, 1)));
        assert_eq!(date_from_filename("x 01-02-202.xls"), None);
        assert_eq!(date_from_filename("31-02-2024"), None);
        assert_eq!(date_from_filename("sin fecha.xls"), None);
        assert_eq!(date_tag(ymd(2024, 3, 5)), "05-03-2024");
    }
}
