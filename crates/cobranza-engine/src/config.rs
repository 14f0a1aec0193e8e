//! Runtime configuration.
//!
//! Everything has a default matching the collection-route workbooks this engine was built
//! for; a JSON file only needs the keys it overrides. Configuration is read-only once built
//! and shared between jobs behind an `Arc`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Environment variable naming a JSON config file.
pub const CONFIG_ENV: &str = "COBRANZA_CONFIG";
/// Environment variable naming the default master workbook.
pub const DEFAULT_MASTER_ENV: &str = "COBRANZA_DEFAULT_MASTER";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub markers: MarkerConfig,
    /// Raw balance label -> label used in the destination sheets' name column.
    pub aliases: BTreeMap<String, String>,
    pub copy: CopyConfig,
    pub export: ExportConfig,
    /// Default ordering of documents in the consolidated output.
    pub consolidated_order: Vec<OrderEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerConfig {
    /// Word opening a vendor block.
    pub vendor: String,
    /// Phrase closing a vendor block and labelling its totals row.
    pub balance: String,
    /// Phrase identifying a sheet title to regenerate.
    pub title: String,
    pub month_names: [String; 12],
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            vendor: "Vendor".to_string(),
            balance: "Balance for".to_string(),
            title: "COBRANZA AL".to_string(),
            month_names: [
                "ENERO",
                "FEBRERO",
                "MARZO",
                "ABRIL",
                "MAYO",
                "JUNIO",
                "JULIO",
                "AGOSTO",
                "SETIEMBRE",
                "OCTUBRE",
                "NOVIEMBRE",
                "DICIEMBRE",
            ]
            .map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CopyConfig {
    /// Leading rows removed from the pasted sheet.
    pub delete_rows: u32,
    pub header_scan_rows: u32,
    pub header_scan_cols: u32,
    pub title_scan_rows: u32,
    pub title_scan_cols: u32,
    /// Sheets whose title is regenerated when a date is supplied.
    pub title_sheets: Vec<String>,
    /// Column holding vendor names in destination sheets.
    pub name_column: u32,
    /// Columns receiving the first and second balance values.
    pub value_columns: [u32; 2],
    /// Cells scanned to the right of a balance label.
    pub lookahead: u32,
    /// Destination sheets visited first, in this order.
    pub preferred_sheets: Vec<String>,
    pub output_stem: String,
    pub output_extension: String,
}

impl Default for CopyConfig {
    fn default() -> Self {
        Self {
            delete_rows: 6,
            header_scan_rows: 8,
            header_scan_cols: 60,
            title_scan_rows: 6,
            title_scan_cols: 30,
            title_sheets: vec!["SUR".to_string(), "NORTE".to_string()],
            name_column: 2,
            value_columns: [3, 4],
            lookahead: 20,
            preferred_sheets: vec!["SUR".to_string(), "NORTE".to_string(), "SURQUILLO".to_string()],
            output_stem: "maestro_copiado".to_string(),
            output_extension: "xls".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub file_prefix: String,
    /// Sheets exported verbatim instead of being split into blocks.
    pub full_sheets: Vec<String>,
    /// Documents merged into the summary group, in merge order.
    pub summary_members: Vec<String>,
    /// Id and display name of the summary group.
    pub summary_id: String,
    pub consolidated_name: String,
    /// Documents always left out of the consolidated file, by name (a leading code is
    /// ignored). Callers add their own ids on top of these.
    pub excluded: Vec<String>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            file_prefix: "COBRANZA".to_string(),
            full_sheets: vec!["SUR".to_string(), "NORTE".to_string()],
            summary_members: vec![
                "IMPORTE CUENTA SALDO".to_string(),
                "SUR".to_string(),
                "NORTE".to_string(),
            ],
            summary_id: "SALDOS COBRANZA".to_string(),
            consolidated_name: "CONSOLIDADO".to_string(),
            excluded: vec![
                "IMPORTE CUENTA SALDO".to_string(),
                "000020 SURQUILLO_SURCO - (OSCAR)".to_string(),
                "000000 OFICINA (VES)".to_string(),
            ],
        }
    }
}

/// One slot of the default consolidated order and the block names that fill it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderEntry {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl OrderEntry {
    fn new(name: &str, aliases: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        }
    }
}

fn default_aliases() -> BTreeMap<String, String> {
    [
        ("OFICINA (VES)", "OFICINA"),
        ("MANUEL CARRASCO", "MANUEL"),
        ("PITER HUAYTA", "PITER"),
        ("BEATRIZ ROJAS", "BEATRIZ"),
        ("LEONEL MEZA", "LEONEL"),
        ("CAÑETE - (MANUEL)", "CAÑETE"),
        ("CIUDAD - (ROSA)", "CIUDAD"),
        ("LURIN - (ROSA)", "LURIN"),
        ("MANCHAY - (ROSA)", "MANCHAY"),
        ("UNICACHI SUR - (ROSA)", "UNICACHI"),
        ("SURQ/SURCO - (OSCAR)", "SURQ/SURCO"),
        ("SAN LUIS (OSCAR)", "SAN LUIS"),
        ("CAQUETA (ROSA)", "CAQUETA"),
        ("SURQUILLO (OSCAR)", "SURQUILLO"),
        ("SURCO (OSCAR)", "SURCO"),
        ("NORTE - ROSA", "NORTE"),
        ("RAUL ARROYO", "RAUL"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_consolidated_order() -> Vec<OrderEntry> {
    vec![
        OrderEntry::new("SALDOS COBRANZA", &[]),
        OrderEntry::new("MANUEL CARRASCO", &[]),
        OrderEntry::new("PITER HUAYTA", &[]),
        OrderEntry::new("LEONEL MEZA", &[]),
        OrderEntry::new(
            "CANETE",
            &["CANETE - (MANUEL)", "CANETE (MANUEL)", "CAÑETE", "CAÑETE - (MANUEL)", "CAÑETE (MANUEL)"],
        ),
        OrderEntry::new("BEATRIZ ROJAS", &[]),
        OrderEntry::new("LURIN", &["LURIN - (ROSA)"]),
        OrderEntry::new("MANCHAY", &["MANCHAY - (ROSA)"]),
        OrderEntry::new("CIUDAD", &["CIUDAD - (ROSA)"]),
        OrderEntry::new("UNICACHI", &["UNICACHI SUR - (ROSA)", "UNICACHI SUR (ROSA)"]),
        OrderEntry::new("NORTE - ROSA", &["NORTE ROSA", "NORTE-ROSA"]),
        OrderEntry::new("CAQUETA (ROSA)", &["CAQUETA - (ROSA)", "CAQUETA ROSA"]),
        OrderEntry::new("SURCO (OSCAR)", &["SURCO - (OSCAR)", "SURCO OSCAR"]),
        OrderEntry::new("SURQUILLO (OSCAR)", &["SURQ/SURCO - (OSCAR)", "SURQ/SURCO (OSCAR)"]),
        OrderEntry::new("SAN LUIS (OSCAR)", &["SAN LUIS - (OSCAR)", "SAN LUIS OSCAR"]),
        OrderEntry::new("RAUL ARROYO", &[]),
    ]
}

impl Default for Config {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Config {
    /// Built-in defaults, including the alias table and consolidated order.
    pub fn builtin() -> Self {
        Self {
            markers: MarkerConfig::default(),
            aliases: default_aliases(),
            copy: CopyConfig::default(),
            export: ExportConfig::default(),
            consolidated_order: default_consolidated_order(),
        }
    }

    /// Parse a JSON document layered over the built-in defaults.
    ///
    /// Top-level keys that are present replace the default wholesale (an `aliases` object
    /// replaces the whole alias table).
    pub fn from_json(raw: &str) -> Result<Self> {
        let overrides: serde_json::Value = serde_json::from_str(raw)?;
        let serde_json::Value::Object(overrides) = overrides else {
            return Err(Error::Config("config root must be a JSON object".to_string()));
        };
        let mut base = serde_json::to_value(Self::builtin())?;
        if let serde_json::Value::Object(base_map) = &mut base {
            for (key, value) in overrides {
                if !base_map.contains_key(&key) {
                    return Err(Error::Config(format!("unknown config key {key:?}")));
                }
                match (base_map.get_mut(&key), value) {
                    (Some(serde_json::Value::Object(section)), serde_json::Value::Object(patch))
                        if key != "aliases" =>
                    {
                        section.extend(patch);
                    }
                    (_, value) => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        let config: Self = serde_json::from_value(base)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|err| Error::Config(format!("read {}: {err}", path.display())))?;
        Self::from_json(&raw)
    }

    /// Load from `COBRANZA_CONFIG` when set, else the built-in defaults.
    pub fn from_env() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) if !path.is_empty() => Self::load(Path::new(&path)),
            _ => Ok(Self::builtin()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.markers.vendor.trim().is_empty() || self.markers.balance.trim().is_empty() {
            return Err(Error::Config("block markers must not be empty".to_string()));
        }
        if self.copy.name_column == 0 || self.copy.value_columns.contains(&0) {
            return Err(Error::Config("columns are 1-based".to_string()));
        }
        if self.copy.output_stem.trim().is_empty() {
            return Err(Error::Config("output stem must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Master workbook used when the caller supplies none.
///
/// `COBRANZA_DEFAULT_MASTER` wins; otherwise the first `COBRANZA-formateado.*` file in
/// `data_dir` (by name) is used.
pub fn resolve_default_master(data_dir: &Path) -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(DEFAULT_MASTER_ENV).filter(|p| !p.is_empty()) {
        let path = PathBuf::from(path);
        if path.is_file() {
            return Some(path);
        }
        log::warn!("[config] {DEFAULT_MASTER_ENV} points at a missing file: {}", path.display());
    }

    let mut candidates: Vec<PathBuf> = std::fs::read_dir(data_dir)
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.file_stem()
                    .and_then(|s| s.to_str())
                    .is_some_and(|s| s.eq_ignore_ascii_case("COBRANZA-formateado"))
        })
        .collect();
    candidates.sort();
    candidates.into_iter().next()
}
