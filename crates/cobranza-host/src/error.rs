use std::path::PathBuf;

use cobranza_model::{PageAttribute, PageValueError};

/// Errors surfaced by a spreadsheet host.
///
/// Backends translate their native failure shapes into these variants so callers never see
/// host-specific error types.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("cannot open workbook {path}: {reason}")]
    Open { path: PathBuf, reason: String },

    #[error("host could not be launched: {0}")]
    Launch(String),

    #[error("sheet index {index} out of range (workbook has {count} sheets)")]
    SheetIndex { index: usize, count: usize },

    #[error("a sheet named {0:?} already exists")]
    DuplicateSheetName(String),

    #[error("{op} failed on sheet {sheet:?}: {reason}")]
    Operation {
        op: &'static str,
        sheet: String,
        reason: String,
    },

    #[error("page attribute {0} is not supported by this host")]
    UnsupportedAttribute(PageAttribute),

    #[error(transparent)]
    PageValue(#[from] PageValueError),

    #[error("workbook {0} was opened read-only")]
    ReadOnly(PathBuf),

    #[error("pdf error: {0}")]
    Pdf(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl HostError {
    pub(crate) fn operation(op: &'static str, sheet: &str, reason: impl Into<String>) -> Self {
        HostError::Operation {
            op,
            sheet: sheet.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<lopdf::Error> for HostError {
    fn from(err: lopdf::Error) -> Self {
        HostError::Pdf(err.to_string())
    }
}
