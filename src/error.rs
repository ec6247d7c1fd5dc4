use thiserror::Error;

/// Result type used across the public API.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures reported to the caller. All of them are recoverable at the call
/// boundary: a failing file or sheet never prevents work on its siblings.
#[derive(Error, Debug)]
pub enum Error {
    /// Source bytes could not be turned into a grid (corrupt file, unsupported
    /// format, missing sheet, permission denied).
    #[error("File '{path}' could not be read: {reason}")]
    UnreadableFile { path: String, reason: String },

    /// The sheet has no usable data once empty rows and columns are pruned.
    #[error("Sheet '{sheet}' has no usable data")]
    MalformedSheet { sheet: String },

    /// A chart or aggregate request names a missing or type-incompatible column.
    #[error("Invalid column '{column}': {reason}")]
    InvalidColumn { column: String, reason: String },

    /// A cross-sheet rollup was requested over inputs that share no column.
    #[error("Incompatible schema: {0}")]
    IncompatibleSchema(String),
}

impl Error {
    pub(crate) fn invalid_column(column: &str, reason: impl Into<String>) -> Self {
        Error::InvalidColumn {
            column: column.to_owned(),
            reason: reason.into(),
        }
    }
}

/// Internal error raised while decoding a spreadsheet file.
/// Aggregates library errors so readers can use `?` freely; it is turned into
/// [`Error::UnreadableFile`] at the loader boundary.
#[derive(Error, Debug)]
pub(crate) enum ReadError {
    #[error("{0}")]
    WithContextError(String),

    // Standard library errors
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    ParseIntError(#[from] std::num::ParseIntError),

    // Third-party library errors
    #[error("{0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("{0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("{0}")]
    XmlEncodingError(#[from] quick_xml::encoding::EncodingError),

    #[error("{0}")]
    XmlAttributeError(#[from] quick_xml::events::attributes::AttrError),

    #[error("{0}")]
    CsvError(#[from] csv::Error),

    // Helper module errors
    #[error("{0}")]
    XmlHelperError(#[from] crate::helpers::xml::XmlError),

    // Spreadsheet module errors
    #[error("{0}")]
    SpreadsheetError(#[from] crate::spreadsheet::SpreadsheetError),
}

impl ReadError {
    /// Converts into the public error, naming the file that failed.
    pub(crate) fn into_unreadable(self, path: &str) -> Error {
        Error::UnreadableFile {
            path: path.to_owned(),
            reason: self.to_string(),
        }
    }
}

pub(crate) trait ResultMessage {
    fn with_prefix(self, message: &str) -> Self;
}

impl<T> ResultMessage for std::result::Result<T, ReadError> {
    fn with_prefix(self, message: &str) -> Self {
        self.map_err(|e| ReadError::WithContextError(format!("{}: {}", message, e)))
    }
}

pub(crate) trait ReadResult<T> {
    fn or_unreadable(self, path: &str) -> Result<T>;
}

impl<T> ReadResult<T> for std::result::Result<T, ReadError> {
    fn or_unreadable(self, path: &str) -> Result<T> {
        self.map_err(|e| e.into_unreadable(path))
    }
}
