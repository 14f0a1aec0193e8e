use std::path::PathBuf;

use cobranza_host::HostError;

use crate::pipeline::PipelineState;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Source, master or export workbook is missing or unreadable.
    #[error("cannot open {path}: {reason}")]
    HostOpen { path: PathBuf, reason: String },

    /// Every paste strategy failed; the message lists each attempt.
    #[error("could not paste source sheet: {0}")]
    PasteFailure(String),

    #[error("sheet not found: {0}")]
    SheetNotFound(String),

    #[error("could not save {path} (retried with a random suffix): {source}")]
    SaveCollision {
        path: PathBuf,
        #[source]
        source: HostError,
    },

    #[error("{context}: {source}")]
    Host {
        context: String,
        #[source]
        source: HostError,
    },

    #[error("pdf merge failed: {0}")]
    Merge(String),

    #[error("zip error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("copy failed while {phase}: {source}")]
    PipelineFailed {
        phase: PipelineState,
        #[source]
        source: Box<Error>,
    },

    #[error("job worker panicked: {0}")]
    WorkerPanicked(String),
}

impl Error {
    pub(crate) fn host(context: impl Into<String>) -> impl FnOnce(HostError) -> Error {
        let context = context.into();
        move |source| Error::Host { context, source }
    }

    /// The error that started the failure, looking through pipeline wrappers.
    pub fn root(&self) -> &Error {
        match self {
            Error::PipelineFailed { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        Error::Merge(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(err.to_string())
    }
}
