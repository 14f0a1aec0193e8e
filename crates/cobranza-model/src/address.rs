use core::fmt;

use serde::{Deserialize, Serialize};

/// Largest row number accepted by A1 parsing (Excel-compatible).
pub const MAX_ROWS: u32 = 1_048_576;
/// Largest column number accepted by A1 parsing (`XFD`).
pub const MAX_COLS: u32 = 16_384;

/// A single cell within a worksheet.
///
/// Rows and columns are **1-based**, matching the spreadsheet host:
/// - `row = 1` is the first row
/// - `col = 1` is column `A`
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellAddr {
    pub row: u32,
    pub col: u32,
}

impl CellAddr {
    #[inline]
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// `A1` style, relative.
    pub fn to_a1(self) -> String {
        format!("{}{}", column_label(self.col), self.row)
    }

    /// `$A$1` style, absolute.
    pub fn to_a1_absolute(self) -> String {
        format!("${}${}", column_label(self.col), self.row)
    }

    /// Parse an A1-style reference (`A1`, `$B$2`).
    pub fn from_a1(a1: &str) -> Result<Self, A1ParseError> {
        let s = a1.trim();
        if s.is_empty() {
            return Err(A1ParseError::Empty);
        }

        let bytes = s.as_bytes();
        let mut idx = 0usize;
        if bytes.get(idx) == Some(&b'$') {
            idx += 1;
        }

        let col_start = idx;
        while idx < bytes.len() && bytes[idx].is_ascii_alphabetic() {
            idx += 1;
        }
        if idx == col_start {
            return Err(A1ParseError::MissingColumn);
        }
        let col = column_index(&s[col_start..idx])?;

        if bytes.get(idx) == Some(&b'$') {
            idx += 1;
        }

        let row_start = idx;
        while idx < bytes.len() && bytes[idx].is_ascii_digit() {
            idx += 1;
        }
        if idx == row_start {
            return Err(A1ParseError::MissingRow);
        }
        if idx != bytes.len() {
            return Err(A1ParseError::TrailingCharacters);
        }

        let row: u32 = s[row_start..idx]
            .parse()
            .map_err(|_| A1ParseError::InvalidRow)?;
        if row == 0 || row > MAX_ROWS {
            return Err(A1ParseError::InvalidRow);
        }

        Ok(Self { row, col })
    }
}

impl fmt::Display for CellAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_a1())
    }
}

/// Inclusive rectangular region, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellRange {
    pub start_row: u32,
    pub end_row: u32,
    pub start_col: u32,
    pub end_col: u32,
}

impl CellRange {
    pub fn new(start: CellAddr, end: CellAddr) -> Self {
        Self {
            start_row: start.row,
            end_row: end.row,
            start_col: start.col,
            end_col: end.col,
        }
        .normalized()
    }

    pub fn normalized(self) -> Self {
        Self {
            start_row: self.start_row.min(self.end_row),
            end_row: self.start_row.max(self.end_row),
            start_col: self.start_col.min(self.end_col),
            end_col: self.start_col.max(self.end_col),
        }
    }

    #[inline]
    pub fn start(&self) -> CellAddr {
        CellAddr::new(self.start_row, self.start_col)
    }

    #[inline]
    pub fn end(&self) -> CellAddr {
        CellAddr::new(self.end_row, self.end_col)
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.end_row - self.start_row + 1
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.end_col - self.start_col + 1
    }

    pub fn contains(&self, cell: CellAddr) -> bool {
        cell.row >= self.start_row
            && cell.row <= self.end_row
            && cell.col >= self.start_col
            && cell.col <= self.end_col
    }

    pub fn rows(&self) -> RowRange {
        RowRange {
            start: self.start_row,
            end: self.end_row,
        }
    }

    /// `$A$1:$H$40` (a single cell renders as `$A$1`).
    pub fn to_a1_absolute(&self) -> String {
        let r = self.normalized();
        if r.start_row == r.end_row && r.start_col == r.end_col {
            return r.start().to_a1_absolute();
        }
        format!("{}:{}", r.start().to_a1_absolute(), r.end().to_a1_absolute())
    }

    /// Parse `A1:B2`, `$A$1:$H$40` or a single cell, optionally sheet-qualified
    /// (`Sheet1!$A$1:$H$40`, `'My Sheet'!A1`).
    pub fn from_a1(a1: &str) -> Result<Self, A1ParseError> {
        let s = strip_sheet_prefix(a1.trim());
        if s.is_empty() {
            return Err(A1ParseError::Empty);
        }
        match s.split_once(':') {
            None => {
                let cell = CellAddr::from_a1(s)?;
                Ok(Self::new(cell, cell))
            }
            Some((a, b)) => Ok(Self::new(CellAddr::from_a1(a)?, CellAddr::from_a1(b)?)),
        }
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_a1_absolute())
    }
}

/// Inclusive row span, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RowRange {
    pub start: u32,
    pub end: u32,
}

impl RowRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }.normalized()
    }

    pub fn normalized(self) -> Self {
        Self {
            start: self.start.min(self.end),
            end: self.start.max(self.end),
        }
    }

    /// Number of rows in the span.
    pub fn count(&self) -> u32 {
        self.end - self.start + 1
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> {
        self.start..=self.end
    }

    /// `$1:$3`
    pub fn to_a1_absolute(&self) -> String {
        let r = self.normalized();
        format!("${}:${}", r.start, r.end)
    }

    /// Parse `$1:$3`, `1:3` or a single `$5`.
    pub fn from_a1(a1: &str) -> Result<Self, A1ParseError> {
        let s = strip_sheet_prefix(a1.trim());
        if s.is_empty() {
            return Err(A1ParseError::Empty);
        }
        let parse = |part: &str| -> Result<u32, A1ParseError> {
            let digits = part.trim().trim_start_matches('$');
            let row: u32 = digits.parse().map_err(|_| A1ParseError::InvalidRow)?;
            if row == 0 || row > MAX_ROWS {
                return Err(A1ParseError::InvalidRow);
            }
            Ok(row)
        };
        match s.split_once(':') {
            None => {
                let row = parse(s)?;
                Ok(Self::new(row, row))
            }
            Some((a, b)) => Ok(Self::new(parse(a)?, parse(b)?)),
        }
    }
}

/// Inclusive column span, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColRange {
    pub start: u32,
    pub end: u32,
}

impl ColRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self {
            start: start.min(end),
            end: start.max(end),
        }
    }

    /// `$A:$C`
    pub fn to_a1_absolute(&self) -> String {
        format!("${}:${}", column_label(self.start), column_label(self.end))
    }

    pub fn from_a1(a1: &str) -> Result<Self, A1ParseError> {
        let s = strip_sheet_prefix(a1.trim());
        if s.is_empty() {
            return Err(A1ParseError::Empty);
        }
        let parse = |part: &str| column_index(part.trim().trim_start_matches('$'));
        match s.split_once(':') {
            None => {
                let col = parse(s)?;
                Ok(Self::new(col, col))
            }
            Some((a, b)) => Ok(Self::new(parse(a)?, parse(b)?)),
        }
    }
}

/// Errors that can occur when parsing an A1 reference.
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum A1ParseError {
    #[error("empty A1 reference")]
    Empty,
    #[error("missing column in A1 reference")]
    MissingColumn,
    #[error("missing row in A1 reference")]
    MissingRow,
    #[error("invalid column in A1 reference")]
    InvalidColumn,
    #[error("invalid row in A1 reference")]
    InvalidRow,
    #[error("trailing characters in A1 reference")]
    TrailingCharacters,
}

/// Column letters for a 1-based column number (`1` -> `A`, `28` -> `AB`).
pub fn column_label(col: u32) -> String {
    let mut n = col.max(1);
    let mut out = Vec::<u8>::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        out.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    out.reverse();
    out.into_iter().map(char::from).collect()
}

/// 1-based column number for column letters (`A` -> `1`, `aa` -> `27`).
pub fn column_index(letters: &str) -> Result<u32, A1ParseError> {
    if letters.is_empty() {
        return Err(A1ParseError::MissingColumn);
    }
    let mut col: u32 = 0;
    for b in letters.bytes() {
        if !b.is_ascii_alphabetic() {
            return Err(A1ParseError::InvalidColumn);
        }
        let v = u32::from(b.to_ascii_uppercase() - b'A') + 1;
        col = col
            .checked_mul(26)
            .and_then(|c| c.checked_add(v))
            .ok_or(A1ParseError::InvalidColumn)?;
    }
    if col > MAX_COLS {
        return Err(A1ParseError::InvalidColumn);
    }
    Ok(col)
}

fn strip_sheet_prefix(s: &str) -> &str {
    // Print areas read back from a host are often sheet-qualified; the sheet part is
    // irrelevant once the caller already holds the sheet.
    match s.rfind('!') {
        Some(idx) => &s[idx + 1..],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a1_roundtrip() {
        let c = CellAddr::new(1, 1);
        assert_eq!(c.to_a1(), "A1");
        assert_eq!(CellAddr::from_a1("A1").unwrap(), c);
        assert_eq!(CellAddr::from_a1("$A$1").unwrap(), c);

        let c2 = CellAddr::new(32, 55);
        assert_eq!(c2.to_a1(), "BC32");
        assert_eq!(CellAddr::from_a1("bc32").unwrap(), c2);
    }

    #[test]
    fn parses_absolute_print_area() {
        let r = CellRange::from_a1("$A$1:$H$40").unwrap();
        assert_eq!(
            r,
            CellRange {
                start_row: 1,
                end_row: 40,
                start_col: 1,
                end_col: 8
            }
        );
        assert_eq!(r.to_a1_absolute(), "$A$1:$H$40");
    }

    #[test]
    fn parses_sheet_qualified_ranges() {
        let r = CellRange::from_a1("'Hoja 1'!$B$2:$C$3").unwrap();
        assert_eq!(r.start(), CellAddr::new(2, 2));
        assert_eq!(r.end(), CellAddr::new(3, 3));
    }

    #[test]
    fn row_ranges_parse_and_format() {
        let r = RowRange::from_a1("$1:$4").unwrap();
        assert_eq!(r, RowRange { start: 1, end: 4 });
        assert_eq!(r.to_a1_absolute(), "$1:$4");
        assert!(RowRange::from_a1("$0:$1").is_err());
    }

    #[test]
    fn col_ranges_parse_and_format() {
        let r = ColRange::from_a1("$A:$C").unwrap();
        assert_eq!(r, ColRange { start: 1, end: 3 });
        assert_eq!(r.to_a1_absolute(), "$A:$C");
    }

    #[test]
    fn a1_bounds_are_excel_compatible() {
        assert!(CellAddr::from_a1("XFD1048576").is_ok());
        assert!(CellAddr::from_a1("XFE1").is_err());
        assert!(CellAddr::from_a1("A1048577").is_err());
        assert_eq!(CellAddr::from_a1("A1B"), Err(A1ParseError::TrailingCharacters));
    }
}
