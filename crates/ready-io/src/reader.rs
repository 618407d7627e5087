//! File-level entry points and I/O errors
//!
//! RD files are VTK XML files with an extra `RD` element. Opening one is a
//! two-stage affair: [`sniff_output_type`] peeks at the root tag to learn the
//! dataset kind without reading the payload, then [`read_file`] parses the
//! whole document once.

use crate::element::{self, ElementError};
use crate::vtk_reader::{self, VtkDocument};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during I/O operations
#[derive(Debug, Error)]
pub enum IoError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Failed to open file: {0}")]
    OpenFailed(String),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<ElementError> for IoError {
    fn from(err: ElementError) -> Self {
        match err {
            ElementError::Read { path, message } => {
                IoError::OpenFailed(format!("{}: {}", path, message))
            }
            other => IoError::InvalidFormat(other.to_string()),
        }
    }
}

impl From<std::io::Error> for IoError {
    fn from(err: std::io::Error) -> Self {
        IoError::Io(err.to_string())
    }
}

/// Result type for I/O operations
pub type IoResult<T> = Result<T, IoError>;

/// Dataset kind declared by a VTK XML file's root element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataObjectType {
    ImageData,
    UnstructuredGrid,
    /// Anything else, carrying the declared type name
    Other(String),
}

impl DataObjectType {
    pub fn from_type_name(name: &str) -> Self {
        match name {
            "ImageData" => DataObjectType::ImageData,
            "UnstructuredGrid" => DataObjectType::UnstructuredGrid,
            other => DataObjectType::Other(other.to_string()),
        }
    }

    pub fn type_name(&self) -> &str {
        match self {
            DataObjectType::ImageData => "ImageData",
            DataObjectType::UnstructuredGrid => "UnstructuredGrid",
            DataObjectType::Other(name) => name,
        }
    }
}

/// Read only the root start tag and report the declared dataset kind
///
/// The rest of the file is not read, so unsupported files are rejected
/// without materializing their payload.
pub fn sniff_output_type(path: impl AsRef<Path>) -> IoResult<DataObjectType> {
    let path = path.as_ref();
    let file = open(path)?;
    let mut reader = Reader::from_reader(BufReader::new(file));
    let mut buf = Vec::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| IoError::InvalidFormat(e.to_string()))?;
        match event {
            Event::Start(start) | Event::Empty(start) => {
                if start.name().as_ref() != b"VTKFile" {
                    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                    return Ok(DataObjectType::Other(name));
                }
                for attr in start.attributes() {
                    let attr = attr.map_err(|e| IoError::InvalidFormat(e.to_string()))?;
                    if attr.key.as_ref() == b"type" {
                        let value = attr
                            .unescape_value()
                            .map_err(|e| IoError::InvalidFormat(e.to_string()))?;
                        return Ok(DataObjectType::from_type_name(&value));
                    }
                }
                return Ok(DataObjectType::Other(String::new()));
            }
            Event::Text(text) => {
                let raw = text.into_inner();
                if !raw.iter().all(u8::is_ascii_whitespace) {
                    return Err(IoError::InvalidFormat(
                        "text before the root element".to_string(),
                    ));
                }
            }
            Event::Eof => {
                return Err(IoError::InvalidFormat(format!(
                    "{} has no root element",
                    path.display()
                )))
            }
            _ => {}
        }
        buf.clear();
    }
}

/// Parse a whole RD/VTK XML file
pub fn read_file(path: impl AsRef<Path>) -> IoResult<VtkDocument> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(IoError::FileNotFound(path.display().to_string()));
    }
    let content =
        std::fs::read_to_string(path).map_err(|e| IoError::OpenFailed(e.to_string()))?;
    tracing::debug!(path = %path.display(), bytes = content.len(), "parsing VTK XML file");
    read_str(&content)
}

/// Parse an RD/VTK XML document held in memory
pub fn read_str(content: &str) -> IoResult<VtkDocument> {
    let root = element::parse_str(content)?;
    vtk_reader::document_from_element(root)
}

fn open(path: &Path) -> IoResult<File> {
    if !path.exists() {
        return Err(IoError::FileNotFound(path.display().to_string()));
    }
    File::open(path).map_err(|e| IoError::OpenFailed(e.to_string()))
}

/// List supported file extensions
pub fn supported_extensions() -> Vec<&'static str> {
    vec!["vti", "vtu"]
}
