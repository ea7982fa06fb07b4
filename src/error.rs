//! Error types for label package processing
//!
//! All errors include error codes for categorization and detailed context to
//! help with debugging.
//!
//! # Error Codes
//!
//! Error codes follow the pattern: `E<category><number>`
//!
//! Categories:
//! - **E1xxx**: I/O and archive errors
//! - **E2xxx**: XML parsing, structure, and serialization errors
//! - **E3xxx**: Numeric parse errors
//!
//! ## Common Error Codes
//!
//! - `E1001`: I/O error reading the container
//! - `E1002`: ZIP archive format error
//! - `E1003`: Missing required file in archive
//! - `E2001`: XML parsing error
//! - `E2002`: XML attribute error
//! - `E2003`: Invalid XML structure
//! - `E2004`: Invalid package format
//! - `E2005`: XML writing error
//! - `E2006`: JSON writing error
//! - `E3002`: Numeric parse error

use std::io;
use thiserror::Error;

/// Result type for label package operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while rewriting a label package
#[derive(Error, Debug)]
pub enum Error {
    /// IO error occurred while reading or writing the container
    ///
    /// **Error Code**: E1001
    ///
    /// **Common Causes**:
    /// - File not found
    /// - Insufficient permissions
    /// - Disk read error
    #[error("[E1001] I/O error: {0}")]
    Io(#[from] io::Error),

    /// ZIP archive error
    ///
    /// **Error Code**: E1002
    ///
    /// **Common Causes**:
    /// - Corrupted ZIP file
    /// - Unsupported compression method
    /// - Truncated archive
    #[error("[E1002] ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// XML parsing error
    ///
    /// **Error Code**: E2001
    #[error("[E2001] XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// XML attribute error
    ///
    /// **Error Code**: E2002
    #[error("[E2002] XML attribute error: {0}")]
    XmlAttr(String),

    /// Missing required file in the archive
    ///
    /// **Error Code**: E1003
    ///
    /// **Common Causes**:
    /// - Incomplete package
    /// - Missing model document entry
    #[error("[E1003] Missing required file: {0}")]
    MissingFile(String),

    /// Invalid package format
    ///
    /// **Error Code**: E2004
    ///
    /// **Common Causes**:
    /// - Non-compliant container structure
    /// - Model document not valid UTF-8
    #[error("[E2004] Invalid package format: {0}")]
    InvalidFormat(String),

    /// Invalid XML structure
    ///
    /// **Error Code**: E2003
    ///
    /// **Common Causes**:
    /// - Missing required XML elements or attributes
    /// - Invalid element nesting
    #[error("[E2003] Invalid XML structure: {0}")]
    InvalidXml(String),

    /// Parse error for numeric values
    ///
    /// **Error Code**: E3002
    #[error("[E3002] Parse error: {0}")]
    ParseError(String),

    /// XML writing error
    ///
    /// **Error Code**: E2005
    #[error("[E2005] XML writing error: {0}")]
    XmlWrite(String),

    /// JSON writing error for sidecar documents
    ///
    /// **Error Code**: E2006
    #[error("[E2006] JSON writing error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<std::num::ParseFloatError> for Error {
    fn from(err: std::num::ParseFloatError) -> Self {
        Error::ParseError(format!("Failed to parse floating-point number: {}", err))
    }
}

impl From<std::num::ParseIntError> for Error {
    fn from(err: std::num::ParseIntError) -> Self {
        Error::ParseError(format!("Failed to parse integer: {}", err))
    }
}

impl From<quick_xml::events::attributes::AttrError> for Error {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Error::XmlAttr(format!("Attribute parsing failed: {}", err))
    }
}

impl Error {
    /// Create an InvalidXml error for a missing required attribute
    ///
    /// # Arguments
    /// * `element` - The XML element name
    /// * `attribute` - The missing attribute name
    pub fn missing_attribute(element: &str, attribute: &str) -> Self {
        Error::InvalidXml(format!(
            "Element '<{}>' is missing required attribute '{}'",
            element, attribute
        ))
    }

    /// Create an InvalidFormat error with context about what is invalid
    ///
    /// # Arguments
    /// * `context` - What part of the format is invalid (e.g., "container", "model document")
    /// * `message` - Description of the error
    pub fn invalid_format_context(context: &str, message: &str) -> Self {
        Error::InvalidFormat(format!("{}: {}", context, message))
    }
}
