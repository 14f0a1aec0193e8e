//! Fixed-format (PDF) export of a sheet.
//!
//! Pagination follows the host's print model:
//! - the print area (or the used range) is split into row pages and column bands
//! - pages run down, then over
//! - print-title rows repeat at the top of every page
//! - orientation, paper size, margins, centering and scaling come from the page setup

use std::path::Path;

use cobranza_model::{CellAddr, CellRange, Orientation, PageSetup, RowRange, Scaling};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

use super::sheet::SheetData;
use crate::fs::atomic_write;
use crate::HostError;

const FONT_SIZE: f64 = 9.0;
const CELL_PADDING: f64 = 2.0;

/// Column width in points for a width in character units.
pub(crate) fn column_points(width_chars: f64) -> f64 {
    if width_chars <= 0.0 {
        return 0.0;
    }
    (width_chars * 7.0 + 5.0) * 0.75
}

struct PageGeometry {
    width: f64,
    height: f64,
    left: f64,
    top: f64,
    avail_w: f64,
    avail_h: f64,
}

impl PageGeometry {
    fn from_setup(setup: &PageSetup) -> Self {
        let (w, h) = setup.paper_size.dimensions_in_points();
        let (width, height) = match setup.orientation {
            Orientation::Portrait => (w, h),
            Orientation::Landscape => (h, w),
        };
        let m = &setup.margins;
        Self {
            width,
            height,
            left: m.left,
            top: height - m.top,
            avail_w: (width - m.left - m.right).max(36.0),
            avail_h: (height - m.top - m.bottom).max(36.0),
        }
    }
}

struct PagePlan {
    rows: Vec<u32>,
    cols: Vec<u32>,
}

fn print_area(sheet: &SheetData) -> Option<CellRange> {
    let raw = sheet.page_setup.print_area.trim();
    if !raw.is_empty() {
        // Multi-area print ranges print their first area.
        if let Ok(range) = CellRange::from_a1(raw.split(',').next().unwrap_or(raw)) {
            return Some(range);
        }
    }
    sheet.used_range()
}

fn title_rows(sheet: &SheetData) -> Vec<u32> {
    let raw = sheet.page_setup.print_title_rows.trim();
    if raw.is_empty() {
        return Vec::new();
    }
    RowRange::from_a1(raw).map(|r| r.iter().collect()).unwrap_or_default()
}

fn scale_for(setup: &PageSetup, geom: &PageGeometry, total_w: f64, total_h: f64) -> f64 {
    let scale = match setup.scaling {
        Scaling::Percent { zoom } => f64::from(zoom) / 100.0,
        Scaling::FitTo { wide, tall } => {
            let sx = if wide > 0 && total_w > 0.0 {
                geom.avail_w * f64::from(wide) / total_w
            } else {
                f64::INFINITY
            };
            let sy = if tall > 0 && total_h > 0.0 {
                geom.avail_h * f64::from(tall) / total_h
            } else {
                f64::INFINITY
            };
            sx.min(sy).min(1.0)
        }
    };
    scale.clamp(0.1, 4.0)
}

/// Greedy split of `items` into runs whose scaled extent fits in `avail`; never empty runs.
fn split_runs(items: &[u32], extent: impl Fn(u32) -> f64, avail: f64) -> Vec<Vec<u32>> {
    let mut runs = Vec::new();
    let mut current = Vec::new();
    let mut used = 0.0;
    for &item in items {
        let size = extent(item);
        if !current.is_empty() && used + size > avail {
            runs.push(std::mem::take(&mut current));
            used = 0.0;
        }
        current.push(item);
        used += size;
    }
    if !current.is_empty() {
        runs.push(current);
    }
    runs
}

fn plan_pages(sheet: &SheetData, geom: &PageGeometry, scale: &mut f64) -> Vec<PagePlan> {
    let Some(area) = print_area(sheet) else {
        return vec![PagePlan {
            rows: Vec::new(),
            cols: Vec::new(),
        }];
    };

    let titles = title_rows(sheet);
    let body: Vec<u32> = (area.start_row..=area.end_row)
        .filter(|r| !titles.contains(r))
        .collect();
    let cols: Vec<u32> = (area.start_col..=area.end_col).collect();

    let total_w: f64 = cols.iter().map(|&c| column_points(sheet.column_width(c))).sum();
    let titles_h: f64 = titles.iter().map(|&r| sheet.row_height(r)).sum();
    let body_h: f64 = body.iter().map(|&r| sheet.row_height(r)).sum();
    *scale = scale_for(&sheet.page_setup, geom, total_w, titles_h + body_h);
    let s = *scale;

    let bands = split_runs(&cols, |c| column_points(sheet.column_width(c)) * s, geom.avail_w);
    let body_avail = (geom.avail_h - titles_h * s).max(sheet.row_height(1) * s);
    let row_pages = if body.is_empty() {
        vec![Vec::new()]
    } else {
        split_runs(&body, |r| sheet.row_height(r) * s, body_avail)
    };

    let mut pages = Vec::new();
    for band in &bands {
        for rows in &row_pages {
            let mut page_rows = titles.clone();
            page_rows.extend(rows.iter().copied());
            pages.push(PagePlan {
                rows: page_rows,
                cols: band.clone(),
            });
        }
    }
    pages
}

/// Map to WinAnsi bytes; characters outside Latin-1 become `?`.
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c as u32 {
            0x20..=0x7e | 0xa0..=0xff => c as u32 as u8,
            _ => b'?',
        })
        .collect()
}

fn real(v: f64) -> Object {
    Object::Real(v as _)
}

fn text_op(ops: &mut Vec<Operation>, x: f64, y: f64, size: f64, text: &str) {
    if text.is_empty() {
        return;
    }
    ops.push(Operation::new("BT", vec![]));
    ops.push(Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), real(size)]));
    ops.push(Operation::new("Td", vec![real(x), real(y)]));
    ops.push(Operation::new("Tj", vec![Object::string_literal(win_ansi(text))]));
    ops.push(Operation::new("ET", vec![]));
}

/// Expand `&P` (page), `&N` (page count) and `&&`; other codes are dropped.
fn expand_header_codes(raw: &str, page: usize, total: usize) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '&' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('P') => out.push_str(&page.to_string()),
            Some('N') => out.push_str(&total.to_string()),
            Some('&') => out.push('&'),
            Some('"') => {
                // Font selector: `&"Arial,Bold"`.
                for d in chars.by_ref() {
                    if d == '"' {
                        break;
                    }
                }
            }
            Some(d) if d.is_ascii_digit() => {
                while chars.peek().is_some_and(|n| n.is_ascii_digit()) {
                    chars.next();
                }
            }
            _ => {}
        }
    }
    out
}

fn draw_header_footer(
    ops: &mut Vec<Operation>,
    setup: &PageSetup,
    geom: &PageGeometry,
    page: usize,
    total: usize,
) {
    let header_y = geom.height - setup.margins.header - FONT_SIZE;
    let footer_y = setup.margins.footer;
    let right_x = geom.width - setup.margins.right;
    for (parts, y) in [(&setup.header, header_y), (&setup.footer, footer_y)] {
        let left = expand_header_codes(&parts.left, page, total);
        let center = expand_header_codes(&parts.center, page, total);
        let right = expand_header_codes(&parts.right, page, total);
        let approx = |s: &str| s.chars().count() as f64 * FONT_SIZE * 0.5;
        text_op(ops, geom.left, y, FONT_SIZE, &left);
        text_op(ops, (geom.width - approx(&center)) / 2.0, y, FONT_SIZE, &center);
        text_op(ops, right_x - approx(&right), y, FONT_SIZE, &right);
    }
}

fn draw_page(ops: &mut Vec<Operation>, sheet: &SheetData, geom: &PageGeometry, plan: &PagePlan, scale: f64) {
    let setup = &sheet.page_setup;
    let content_w: f64 = plan
        .cols
        .iter()
        .map(|&c| column_points(sheet.column_width(c)) * scale)
        .sum();
    let content_h: f64 = plan.rows.iter().map(|&r| sheet.row_height(r) * scale).sum();
    let x0 = if setup.center_horizontally {
        geom.left + ((geom.avail_w - content_w) / 2.0).max(0.0)
    } else {
        geom.left
    };
    let y0 = if setup.center_vertically {
        geom.top - ((geom.avail_h - content_h) / 2.0).max(0.0)
    } else {
        geom.top
    };

    let font = (FONT_SIZE * scale).max(4.0);
    let mut y = y0;
    for &row in &plan.rows {
        let h = sheet.row_height(row) * scale;
        y -= h;
        let mut x = x0;
        for &col in &plan.cols {
            let w = column_points(sheet.column_width(col)) * scale;
            if setup.print_gridlines {
                ops.push(Operation::new("re", vec![real(x), real(y), real(w), real(h)]));
                ops.push(Operation::new("S", vec![]));
            }
            let text = sheet.get(CellAddr::new(row, col)).display();
            text_op(ops, x + CELL_PADDING * scale, y + (h - font) / 2.0 + 1.0, font, &text);
            x += w;
        }
    }
}

pub(crate) fn render_sheet(sheet: &SheetData) -> Result<Document, HostError> {
    let setup = &sheet.page_setup;
    let geom = PageGeometry::from_setup(setup);
    let mut scale = 1.0;
    let plans = plan_pages(sheet, &geom, &mut scale);

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let total = plans.len();
    let mut kids = Vec::with_capacity(total);
    for (i, plan) in plans.iter().enumerate() {
        let mut ops = Vec::new();
        draw_page(&mut ops, sheet, &geom, plan, scale);
        draw_header_footer(&mut ops, setup, &geom, i + 1, total);
        let content = Content { operations: ops };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => Object::Integer(total as i64),
        "Resources" => resources_id,
        "MediaBox" => vec![real(0.0), real(0.0), real(geom.width), real(geom.height)],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    Ok(doc)
}

pub(crate) fn export_sheet(sheet: &SheetData, path: &Path) -> Result<(), HostError> {
    let mut doc = render_sheet(sheet)?;
    atomic_write(path, |w| doc.save_to(w).map_err(HostError::from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cobranza_model::PaperSize;

    fn sheet_with_rows(n: u32) -> SheetData {
        let mut data = SheetData::new("S");
        for r in 1..=n {
            data.set_row(r, [format!("row {r}"), "x".to_string()]);
        }
        data
    }

    #[test]
    fn long_sheets_paginate_and_repeat_titles() {
        let mut data = sheet_with_rows(200);
        data.page_setup.print_title_rows = "$1:$2".to_string();
        let doc = render_sheet(&data).unwrap();
        let pages = doc.get_pages();
        assert!(pages.len() > 1);

        let second = *pages.get(&2).unwrap();
        let content = doc.get_page_content(second).unwrap();
        let content = String::from_utf8_lossy(&content);
        assert!(content.contains("(row 1)"), "titles missing from second page");
        assert!(!content.contains("(row 3)"));
    }

    #[test]
    fn print_area_limits_output() {
        let mut data = sheet_with_rows(200);
        data.page_setup.print_area = "$A$1:$B$5".to_string();
        let doc = render_sheet(&data).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn landscape_swaps_media_box() {
        let mut data = sheet_with_rows(1);
        data.page_setup.orientation = Orientation::Landscape;
        data.page_setup.paper_size = PaperSize::LETTER;
        let geom = PageGeometry::from_setup(&data.page_setup);
        assert_eq!((geom.width, geom.height), (792.0, 612.0));
    }

    #[test]
    fn blank_sheet_exports_one_page() {
        let doc = render_sheet(&SheetData::new("Blank")).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn header_codes_expand() {
        assert_eq!(expand_header_codes("Page &P of &N", 2, 5), "Page 2 of 5");
        assert_eq!(expand_header_codes("&\"Arial,Bold\"&12Title && co", 1, 1), "Title & co");
    }
}
