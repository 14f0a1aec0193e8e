//! Balance extraction from the pasted ledger and write-back into the route sheets.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use cobranza_host::{HostError, Sheet, Workbook};
use cobranza_model::{text, CellAddr, CellRange, CellValue, TotalsTuple, VendorTotals};
use regex::Regex;

use crate::alias::AliasResolver;
use crate::blocks::Markers;
use crate::config::Config;
use crate::grid::Grid;
use crate::report::StepReport;
use crate::Result;

fn number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Thousands-grouped with an optional decimal comma, else a plain decimal.
    RE.get_or_init(|| {
        Regex::new(r"[-+]?(?:\d{1,3}(?:\.\d{3})+(?:,\d+)?|\d+(?:[.,]\d+)?)").expect("valid regex")
    })
}

/// First number embedded in `raw`, reading `.` as a thousands separator when it groups
/// digits in threes and `,` as the decimal mark.
pub fn parse_number(raw: &str) -> Option<f64> {
    let token = number_re().find(raw)?.as_str();
    let grouped = token.contains(',') || token.matches('.').count() > 1 || is_grouped(token);
    let cleaned = if grouped {
        token.replace('.', "").replace(',', ".")
    } else {
        token.to_string()
    };
    cleaned.parse().ok()
}

fn is_grouped(token: &str) -> bool {
    token
        .split_once('.')
        .is_some_and(|(_, frac)| frac.len() == 3)
}

fn cell_number(value: &CellValue) -> Option<f64> {
    match value {
        CellValue::Number(n) => Some(*n),
        CellValue::Text(s) => parse_number(s),
        CellValue::Empty | CellValue::Boolean(_) => None,
    }
}

#[derive(Debug, Clone)]
pub struct ValueRedistributor {
    balance_cell: Regex,
    aliases: AliasResolver,
    name_column: u32,
    value_columns: [u32; 2],
    lookahead: u32,
    preferred_sheets: Vec<String>,
}

impl ValueRedistributor {
    pub fn new(config: &Config) -> Result<Self> {
        let markers = Markers::compile(&config.markers)?;
        Ok(Self {
            balance_cell: markers.balance_cell,
            aliases: AliasResolver::from_config(config),
            name_column: config.copy.name_column,
            value_columns: config.copy.value_columns,
            lookahead: config.copy.lookahead,
            preferred_sheets: config.copy.preferred_sheets.clone(),
        })
    }

    pub fn collect(&self, sheet: &dyn Sheet) -> Result<VendorTotals, HostError> {
        Ok(match Grid::capture(sheet)? {
            Some(grid) => self.collect_grid(&grid),
            None => VendorTotals::new(),
        })
    }

    /// Totals keyed by normalized vendor name. A later balance row for the same key wins.
    pub fn collect_grid(&self, grid: &Grid) -> VendorTotals {
        let range = grid.range();
        let mut totals = VendorTotals::new();

        for (row, cells) in grid.rows() {
            let label = cells.iter().enumerate().find_map(|(i, value)| {
                let caps = self.balance_cell.captures(value.as_text()?)?;
                Some((range.start_col + i as u32, caps.get(1)?.as_str().to_string()))
            });
            let Some((col, name)) = label else {
                continue;
            };

            let mut values: TotalsTuple = [None; 3];
            let last_col = col.saturating_add(self.lookahead).min(range.end_col);
            let found = (col + 1..=last_col)
                .filter_map(|c| cell_number(grid.get(CellAddr::new(row, c))))
                .take(values.len());
            for (slot, value) in values.iter_mut().zip(found) {
                *slot = Some(value);
            }

            let key = text::normalize(&name);
            log::debug!("[redistribute] {key}: {values:?} (row {row})");
            totals.insert(key, values);
        }
        totals
    }

    /// Destination sheet indices: preferred names first, then the rest in workbook order.
    /// The first sheet is the ledger itself and is never a destination.
    pub fn destination_order(&self, workbook: &dyn Workbook) -> Vec<usize> {
        let mut order: Vec<usize> = Vec::new();
        for name in &self.preferred_sheets {
            if let Some(index) = workbook.find_sheet(name) {
                if index > 0 && !order.contains(&index) {
                    order.push(index);
                }
            }
        }
        for index in 1..workbook.sheet_count() {
            if !order.contains(&index) {
                order.push(index);
            }
        }
        order
    }

    /// Write the first two values of every total into the rows naming its vendor.
    ///
    /// Only text cells in the name column are matched, exactly after normalization. The
    /// third value is never written.
    pub fn distribute(&self, workbook: &mut dyn Workbook, totals: &VendorTotals) -> StepReport {
        let mut report = StepReport::new("redistribute");

        let mut targets: BTreeMap<String, TotalsTuple> = BTreeMap::new();
        for (key, values) in totals.iter() {
            targets.insert(self.aliases.resolve(key).to_string(), *values);
        }
        if targets.is_empty() {
            return report;
        }

        for index in self.destination_order(workbook) {
            let sheet = match workbook.sheet_mut(index) {
                Ok(sheet) => sheet,
                Err(err) => {
                    report.fail(format!("sheet #{index}"), err.to_string());
                    continue;
                }
            };
            let Some(used) = sheet.used_range() else {
                continue;
            };
            let names = CellRange::new(
                CellAddr::new(used.start_row, self.name_column),
                CellAddr::new(used.end_row, self.name_column),
            );
            let column = match sheet.read_cells(names) {
                Ok(column) => column,
                Err(err) => {
                    report.fail(format!("{}!names", sheet.name()), err.to_string());
                    continue;
                }
            };

            for (offset, cells) in column.iter().enumerate() {
                let Some(name) = cells.first().and_then(CellValue::as_text) else {
                    continue;
                };
                let normalized = text::normalize(name);
                let Some(values) = targets
                    .iter()
                    .find(|(target, _)| text::labels_match(target, &normalized))
                    .map(|(_, values)| values)
                else {
                    continue;
                };

                let row = used.start_row + offset as u32;
                for (col, value) in self.value_columns.iter().zip(values.iter()) {
                    if let Some(value) = value {
                        let addr = CellAddr::new(row, *col);
                        let result = sheet.write_cell(addr, CellValue::Number(*value));
                        let sheet_name = sheet.name().to_string();
                        report.record(|| format!("{sheet_name}!{}", addr.to_a1()), result);
                    }
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_grouped_and_plain_numbers() {
        assert_eq!(parse_number("1.234,56"), Some(1234.56));
        assert_eq!(parse_number("S/ 12.345.678"), Some(12_345_678.0));
        assert_eq!(parse_number("78"), Some(78.0));
        assert_eq!(parse_number("-3,5"), Some(-3.5));
        assert_eq!(parse_number("12.5"), Some(12.5));
        assert_eq!(parse_number("n/a"), None);
    }

    #[test]
    fn collect_reads_up_to_three_values() {
        let redistributor = ValueRedistributor::new(&Config::builtin()).unwrap();
        let grid = Grid::from_rows(
            CellRange::from_a1("A1:F2").unwrap(),
            vec![
                vec![
                    "Balance for OFICINA (VES)".into(),
                    CellValue::Empty,
                    "1.234,56".into(),
                    "78".into(),
                    CellValue::Empty,
                    CellValue::Empty,
                ],
                vec![
                    "x".into(),
                    "Balance for  ana".into(),
                    1.0.into(),
                    2.0.into(),
                    3.0.into(),
                    4.0.into(),
                ],
            ],
        );
        let totals = redistributor.collect_grid(&grid);
        assert_eq!(totals.get("OFICINA (VES)"), Some(&[Some(1234.56), Some(78.0), None]));
        assert_eq!(totals.get("ANA"), Some(&[Some(1.0), Some(2.0), Some(3.0)]));
    }

    #[test]
    fn later_balance_row_overwrites() {
        let redistributor = ValueRedistributor::new(&Config::builtin()).unwrap();
        let grid = Grid::from_rows(
            CellRange::from_a1("A1:B2").unwrap(),
            vec![
                vec!["Balance for A".into(), 1.0.into()],
                vec!["Balance for a".into(), 2.0.into()],
            ],
        );
        assert_eq!(redistributor.collect_grid(&grid).get("A"), Some(&[Some(2.0), None, None]));
    }

    #[test]
    fn lookahead_is_bounded() {
        let mut config = Config::builtin();
        config.copy.lookahead = 1;
        let redistributor = ValueRedistributor::new(&config).unwrap();
        let grid = Grid::from_rows(
            CellRange::from_a1("A1:C1").unwrap(),
            vec![vec!["Balance for A".into(), CellValue::Empty, 5.0.into()]],
        );
        assert_eq!(redistributor.collect_grid(&grid).get("A"), Some(&[None, None, None]));
    }
}
