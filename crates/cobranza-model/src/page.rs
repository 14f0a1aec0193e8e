//! Page setup as seen through the spreadsheet host.
//!
//! The host exposes page setup as a bag of independently readable/writable attributes.
//! [`PageSetup`] is the in-memory form; [`PageAttribute`] + [`PageValue`] are the
//! per-attribute view used when mirroring one sheet's layout onto another, where each
//! attribute may fail on its own.

use core::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperSize {
    /// Host paper-size code (`1` = Letter, `9` = A4).
    pub code: u16,
}

impl PaperSize {
    pub const LETTER: Self = Self { code: 1 };
    pub const LEGAL: Self = Self { code: 5 };
    pub const A4: Self = Self { code: 9 };

    /// Portrait `(width, height)` in points.
    pub fn dimensions_in_points(self) -> (f64, f64) {
        match self.code {
            5 => (612.0, 1008.0),
            9 => (595.28, 841.89),
            _ => (612.0, 792.0),
        }
    }
}

impl Default for PaperSize {
    fn default() -> Self {
        Self::A4
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageMargins {
    /// Points.
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
    pub header: f64,
    pub footer: f64,
}

impl Default for PageMargins {
    fn default() -> Self {
        Self {
            left: 50.4,
            right: 50.4,
            top: 54.0,
            bottom: 54.0,
            header: 21.6,
            footer: 21.6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scaling {
    Percent { zoom: u16 },
    FitTo { wide: u16, tall: u16 },
}

impl Default for Scaling {
    fn default() -> Self {
        Self::Percent { zoom: 100 }
    }
}

/// Left/center/right header or footer strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderFooterText {
    #[serde(default)]
    pub left: String,
    #[serde(default)]
    pub center: String,
    #[serde(default)]
    pub right: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageSetup {
    pub orientation: Orientation,
    pub paper_size: PaperSize,
    pub scaling: Scaling,
    pub margins: PageMargins,
    pub center_horizontally: bool,
    pub center_vertically: bool,
    pub print_headings: bool,
    pub print_gridlines: bool,
    /// Raw host string, e.g. `$1:$4` (empty when unset).
    pub print_title_rows: String,
    /// Raw host string, e.g. `$A:$B` (empty when unset).
    pub print_title_columns: String,
    /// Raw host string, e.g. `$A$1:$H$40` (empty when unset).
    pub print_area: String,
    pub header: HeaderFooterText,
    pub footer: HeaderFooterText,
    pub odd_and_even_pages_header_footer: bool,
    pub different_first_page_header_footer: bool,
    pub scale_with_doc_header_footer: bool,
    pub align_margins_header_footer: bool,
}

impl Default for PageSetup {
    fn default() -> Self {
        Self {
            orientation: Orientation::default(),
            paper_size: PaperSize::default(),
            scaling: Scaling::default(),
            margins: PageMargins::default(),
            center_horizontally: false,
            center_vertically: false,
            print_headings: false,
            print_gridlines: false,
            print_title_rows: String::new(),
            print_title_columns: String::new(),
            print_area: String::new(),
            header: HeaderFooterText::default(),
            footer: HeaderFooterText::default(),
            odd_and_even_pages_header_footer: false,
            different_first_page_header_footer: false,
            scale_with_doc_header_footer: true,
            align_margins_header_footer: true,
        }
    }
}

/// Every page-setup attribute the host exposes individually.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageAttribute {
    Orientation,
    PaperSize,
    Zoom,
    FitToPagesWide,
    FitToPagesTall,
    LeftMargin,
    RightMargin,
    TopMargin,
    BottomMargin,
    HeaderMargin,
    FooterMargin,
    CenterHorizontally,
    CenterVertically,
    PrintHeadings,
    PrintGridlines,
    PrintTitleRows,
    PrintTitleColumns,
    PrintArea,
    LeftHeader,
    CenterHeader,
    RightHeader,
    LeftFooter,
    CenterFooter,
    RightFooter,
    OddAndEvenPagesHeaderFooter,
    DifferentFirstPageHeaderFooter,
    ScaleWithDocHeaderFooter,
    AlignMarginsHeaderFooter,
}

impl PageAttribute {
    /// Attributes mirrored from a source sheet onto a cloned sheet, in write order.
    ///
    /// `Zoom` is written before the fit-to-pages pair: setting a zoom percentage on a
    /// host disables fit-to-pages, so the pair must land last to win.
    /// `PrintArea` and `PrintTitleRows` are not mirrored; the cloner computes them.
    pub const MIRRORED: [PageAttribute; 26] = [
        PageAttribute::Orientation,
        PageAttribute::PaperSize,
        PageAttribute::Zoom,
        PageAttribute::FitToPagesWide,
        PageAttribute::FitToPagesTall,
        PageAttribute::LeftMargin,
        PageAttribute::RightMargin,
        PageAttribute::TopMargin,
        PageAttribute::BottomMargin,
        PageAttribute::HeaderMargin,
        PageAttribute::FooterMargin,
        PageAttribute::CenterHorizontally,
        PageAttribute::CenterVertically,
        PageAttribute::PrintHeadings,
        PageAttribute::PrintGridlines,
        PageAttribute::PrintTitleColumns,
        PageAttribute::OddAndEvenPagesHeaderFooter,
        PageAttribute::DifferentFirstPageHeaderFooter,
        PageAttribute::ScaleWithDocHeaderFooter,
        PageAttribute::AlignMarginsHeaderFooter,
        PageAttribute::LeftHeader,
        PageAttribute::CenterHeader,
        PageAttribute::RightHeader,
        PageAttribute::LeftFooter,
        PageAttribute::CenterFooter,
        PageAttribute::RightFooter,
    ];

    /// The six header/footer strings.
    pub const HEADER_FOOTER_TEXT: [PageAttribute; 6] = [
        PageAttribute::LeftHeader,
        PageAttribute::CenterHeader,
        PageAttribute::RightHeader,
        PageAttribute::LeftFooter,
        PageAttribute::CenterFooter,
        PageAttribute::RightFooter,
    ];
}

impl fmt::Display for PageAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Value of a single [`PageAttribute`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PageValue {
    Text(String),
    Number(f64),
    Flag(bool),
    Orientation(Orientation),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("page attribute {attribute} cannot take value {value:?}")]
pub struct PageValueError {
    pub attribute: PageAttribute,
    pub value: PageValue,
}

impl PageSetup {
    /// Read one attribute.
    ///
    /// `Zoom` reads as `Flag(false)` while fit-to-pages scaling is active, and the
    /// fit-to-pages pair reads as `Flag(false)` while percentage scaling is active.
    pub fn get(&self, attribute: PageAttribute) -> PageValue {
        use PageAttribute as A;
        match attribute {
            A::Orientation => PageValue::Orientation(self.orientation),
            A::PaperSize => PageValue::Number(f64::from(self.paper_size.code)),
            A::Zoom => match self.scaling {
                Scaling::Percent { zoom } => PageValue::Number(f64::from(zoom)),
                Scaling::FitTo { .. } => PageValue::Flag(false),
            },
            A::FitToPagesWide => match self.scaling {
                Scaling::FitTo { wide, .. } => PageValue::Number(f64::from(wide)),
                Scaling::Percent { .. } => PageValue::Flag(false),
            },
            A::FitToPagesTall => match self.scaling {
                Scaling::FitTo { tall, .. } => PageValue::Number(f64::from(tall)),
                Scaling::Percent { .. } => PageValue::Flag(false),
            },
            A::LeftMargin => PageValue::Number(self.margins.left),
            A::RightMargin => PageValue::Number(self.margins.right),
            A::TopMargin => PageValue::Number(self.margins.top),
            A::BottomMargin => PageValue::Number(self.margins.bottom),
            A::HeaderMargin => PageValue::Number(self.margins.header),
            A::FooterMargin => PageValue::Number(self.margins.footer),
            A::CenterHorizontally => PageValue::Flag(self.center_horizontally),
            A::CenterVertically => PageValue::Flag(self.center_vertically),
            A::PrintHeadings => PageValue::Flag(self.print_headings),
            A::PrintGridlines => PageValue::Flag(self.print_gridlines),
            A::PrintTitleRows => PageValue::Text(self.print_title_rows.clone()),
            A::PrintTitleColumns => PageValue::Text(self.print_title_columns.clone()),
            A::PrintArea => PageValue::Text(self.print_area.clone()),
            A::LeftHeader => PageValue::Text(self.header.left.clone()),
            A::CenterHeader => PageValue::Text(self.header.center.clone()),
            A::RightHeader => PageValue::Text(self.header.right.clone()),
            A::LeftFooter => PageValue::Text(self.footer.left.clone()),
            A::CenterFooter => PageValue::Text(self.footer.center.clone()),
            A::RightFooter => PageValue::Text(self.footer.right.clone()),
            A::OddAndEvenPagesHeaderFooter => PageValue::Flag(self.odd_and_even_pages_header_footer),
            A::DifferentFirstPageHeaderFooter => {
                PageValue::Flag(self.different_first_page_header_footer)
            }
            A::ScaleWithDocHeaderFooter => PageValue::Flag(self.scale_with_doc_header_footer),
            A::AlignMarginsHeaderFooter => PageValue::Flag(self.align_margins_header_footer),
        }
    }

    /// Write one attribute, rejecting values of the wrong shape.
    pub fn set(&mut self, attribute: PageAttribute, value: PageValue) -> Result<(), PageValueError> {
        use PageAttribute as A;
        let reject = |value: PageValue| PageValueError { attribute, value };

        match (attribute, value) {
            (A::Orientation, PageValue::Orientation(o)) => self.orientation = o,
            (A::PaperSize, PageValue::Number(n)) => {
                self.paper_size = PaperSize {
                    code: to_u16(n).ok_or_else(|| reject(PageValue::Number(n)))?,
                }
            }
            (A::Zoom, PageValue::Number(n)) => {
                let zoom = to_u16(n)
                    .filter(|z| (10..=400).contains(z))
                    .ok_or_else(|| reject(PageValue::Number(n)))?;
                self.scaling = Scaling::Percent { zoom };
            }
            // `Zoom = false` means "scale by fit-to-pages"; the pair follows separately.
            (A::Zoom, PageValue::Flag(false)) => {
                if let Scaling::Percent { .. } = self.scaling {
                    self.scaling = Scaling::FitTo { wide: 1, tall: 1 };
                }
            }
            (A::FitToPagesWide, PageValue::Number(n)) => {
                let wide = to_u16(n).ok_or_else(|| reject(PageValue::Number(n)))?;
                if let Scaling::FitTo { tall, .. } = self.scaling {
                    self.scaling = Scaling::FitTo { wide, tall };
                }
            }
            (A::FitToPagesTall, PageValue::Number(n)) => {
                let tall = to_u16(n).ok_or_else(|| reject(PageValue::Number(n)))?;
                if let Scaling::FitTo { wide, .. } = self.scaling {
                    self.scaling = Scaling::FitTo { wide, tall };
                }
            }
            (A::FitToPagesWide | A::FitToPagesTall, PageValue::Flag(false)) => {}
            (A::LeftMargin, PageValue::Number(n)) => self.margins.left = margin(n, attribute)?,
            (A::RightMargin, PageValue::Number(n)) => self.margins.right = margin(n, attribute)?,
            (A::TopMargin, PageValue::Number(n)) => self.margins.top = margin(n, attribute)?,
            (A::BottomMargin, PageValue::Number(n)) => self.margins.bottom = margin(n, attribute)?,
            (A::HeaderMargin, PageValue::Number(n)) => self.margins.header = margin(n, attribute)?,
            (A::FooterMargin, PageValue::Number(n)) => self.margins.footer = margin(n, attribute)?,
            (A::CenterHorizontally, PageValue::Flag(b)) => self.center_horizontally = b,
            (A::CenterVertically, PageValue::Flag(b)) => self.center_vertically = b,
            (A::PrintHeadings, PageValue::Flag(b)) => self.print_headings = b,
            (A::PrintGridlines, PageValue::Flag(b)) => self.print_gridlines = b,
            (A::PrintTitleRows, PageValue::Text(s)) => self.print_title_rows = s,
            (A::PrintTitleColumns, PageValue::Text(s)) => self.print_title_columns = s,
            (A::PrintArea, PageValue::Text(s)) => self.print_area = s,
            (A::LeftHeader, PageValue::Text(s)) => self.header.left = s,
            (A::CenterHeader, PageValue::Text(s)) => self.header.center = s,
            (A::RightHeader, PageValue::Text(s)) => self.header.right = s,
            (A::LeftFooter, PageValue::Text(s)) => self.footer.left = s,
            (A::CenterFooter, PageValue::Text(s)) => self.footer.center = s,
            (A::RightFooter, PageValue::Text(s)) => self.footer.right = s,
            (A::OddAndEvenPagesHeaderFooter, PageValue::Flag(b)) => {
                self.odd_and_even_pages_header_footer = b
            }
            (A::DifferentFirstPageHeaderFooter, PageValue::Flag(b)) => {
                self.different_first_page_header_footer = b
            }
            (A::ScaleWithDocHeaderFooter, PageValue::Flag(b)) => self.scale_with_doc_header_footer = b,
            (A::AlignMarginsHeaderFooter, PageValue::Flag(b)) => self.align_margins_header_footer = b,
            (_, value) => return Err(reject(value)),
        }
        Ok(())
    }
}

fn to_u16(n: f64) -> Option<u16> {
    if n.is_finite() && n.fract() == 0.0 && (0.0..=f64::from(u16::MAX)).contains(&n) {
        Some(n as u16)
    } else {
        None
    }
}

fn margin(n: f64, attribute: PageAttribute) -> Result<f64, PageValueError> {
    if n.is_finite() && n >= 0.0 {
        Ok(n)
    } else {
        Err(PageValueError {
            attribute,
            value: PageValue::Number(n),
        })
    }
}
