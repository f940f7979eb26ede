use std::path::{Path, PathBuf};

/// Broad classes of load failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Usage,
    Decode,
    Depth,
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeFailure {
    #[error("is empty")]
    Empty,
    #[error("has invalid syntax: {0}")]
    Syntax(#[source] serde_json::Error),
    #[error("does not hold a JSON object or array")]
    NotAggregate,
    #[error("has invalid syntax: the document holds no entries")]
    NoEntries,
    #[error("has nothing at JSON pointer {0}")]
    PointerMissing(String),
}

/// A fatal load failure. A failed load yields no object.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("the input path is empty")]
    EmptyPath,

    #[error("`{0}` is not a registered type")]
    UnknownType(String),

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} {failure}", subject(.path.as_deref()))]
    Decode {
        path: Option<PathBuf>,
        #[source]
        failure: DecodeFailure,
    },

    #[error("nesting deeper than {limit} levels while constructing `{type_name}`")]
    DepthExceeded { type_name: String, limit: usize },
}

impl LoadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyPath | Self::UnknownType(_) => ErrorKind::Usage,
            Self::Read { .. } | Self::Decode { .. } => ErrorKind::Decode,
            Self::DepthExceeded { .. } => ErrorKind::Depth,
        }
    }
}

fn subject(path: Option<&Path>) -> String {
    match path {
        Some(path) => format!("the JSON file {}", path.display()),
        None => "the JSON value provided".to_string(),
    }
}

pub type Result<T> = std::result::Result<T, LoadError>;
