use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Error type for reading, converting and writing map documents
#[derive(Debug, Error)]
pub enum MapError {
    /// Source unreadable or destination unwritable
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },
    /// Runtime document is not valid JSON for the room schema
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    /// Authoring document is not well-formed XML
    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),
    /// A required structural field is absent or unparsable
    #[error("malformed input: {0}")]
    MalformedInput(String),
    /// File extension is neither `.tmx` nor `.json`
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),
}

impl MapError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        MapError::Io {
            path: path.into(),
            source,
        }
    }

    /// True for syntax errors and missing/unparsable required fields.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            MapError::Json(_) | MapError::Xml(_) | MapError::MalformedInput(_)
        )
    }
}

impl From<quick_xml::events::attributes::AttrError> for MapError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        MapError::Xml(err.into())
    }
}
