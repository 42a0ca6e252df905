//! Error types for the ypbank_interchange library.

use std::io;
use thiserror::Error;

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Structural and syntactic failures while decoding a message.
///
/// Every variant carries enough context (byte offset or tag name) to locate
/// the fault in the input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A mandatory block (`{1:`, `{2:`, `{4:`) or the `:20:` statement marker is absent.
    #[error("missing mandatory block {0}")]
    MissingMandatoryBlock(String),

    /// Unbalanced braces, duplicate blocks or a header that breaks its grammar.
    #[error("malformed block at byte {offset}: {message}")]
    MalformedBlock { offset: usize, message: String },

    /// A tag the message type does not define. Reported, never fatal.
    #[error("unrecognized tag :{tag}: in MT{message_type}")]
    UnrecognizedTag { tag: String, message_type: String },

    /// A mandatory field is absent.
    #[error("missing mandatory field :{tag}:")]
    MissingField { tag: String },

    /// A field is present but does not follow its grammar.
    #[error("invalid field :{tag}: {message}")]
    InvalidField { tag: String, message: String },

    /// Unknown message or format version.
    #[error("unrecognized version: {0}")]
    UnrecognizedVersion(String),
}

impl ParseError {
    pub(crate) fn invalid(tag: &str, message: impl Into<String>) -> Self {
        ParseError::InvalidField {
            tag: tag.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn missing(tag: &str) -> Self {
        ParseError::MissingField {
            tag: tag.to_string(),
        }
    }
}

/// Error types that can occur during parsing, encoding and conversion.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error occurred during read or write operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Error reading or writing CSV rows.
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// Error parsing or generating XML.
    #[error("XML error: {0}")]
    XmlError(String),

    /// Structural parse failure.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A value violates its field's pattern, length or domain.
    #[error("Validation error in {field}: {message}")]
    Validation { field: String, message: String },

    /// A DATEV value exceeds its column width under the reject policy.
    #[error("Field {field} too long: {length} characters, maximum {max}")]
    FieldTooLong {
        field: String,
        length: usize,
        max: usize,
    },

    /// Unknown DATEV version or category.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid column policy configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid format specified.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Conversion error between formats.
    #[error("Conversion error: {0}")]
    ConversionError(String),
}

impl Error {
    pub(crate) fn validation(field: &str, message: impl Into<String>) -> Self {
        Error::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::XmlError(err.to_string())
    }
}

impl From<quick_xml::DeError> for Error {
    fn from(err: quick_xml::DeError) -> Self {
        Error::XmlError(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}
