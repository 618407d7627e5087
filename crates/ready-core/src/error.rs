//! Error types for ready-core
//!
//! Loading a system fails in a small number of distinct ways, and callers
//! (the CLI, a GUI) present each one differently:
//! - I/O failures
//! - Malformed or unsupported files
//! - Files whose data section is missing or empty
//! - Rules this build does not know
//! - Rules that need a compute device when none is available

use ready_formula::{EvalError, ParseError};
use ready_io::{ElementError, IoError};
use thiserror::Error;

/// Main error type for ready operations
#[derive(Error, Debug)]
pub enum ReadyError {
    /// File could not be found, opened or written
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Descriptor or container content is malformed or unsupported
    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    /// The container lacks the chemical data a system needs
    #[error("Missing data: {kind} in {topology} file")]
    MissingData {
        kind: MissingDataKind,
        topology: String,
    },

    /// An inbuilt rule name this build does not implement
    #[error("Unsupported inbuilt implementation: {name}")]
    UnsupportedRule { name: String },

    /// A rule type other than inbuilt, formula or kernel
    #[error("Unsupported rule type: {rule_type}")]
    UnsupportedRuleType { rule_type: String },

    /// The rule needs a compute device and none is available
    #[error("This file needs a compute device, but none is available.\n{hints}")]
    ComputeUnavailable { hints: String },

    /// Compute backend failures while compiling or stepping
    #[error("Compute error: {0}")]
    Compute(#[from] ComputeError),
}

impl From<std::io::Error> for ReadyError {
    fn from(err: std::io::Error) -> Self {
        ReadyError::Io {
            message: err.to_string(),
        }
    }
}

impl From<IoError> for ReadyError {
    fn from(err: IoError) -> Self {
        match err {
            IoError::FileNotFound(msg) => ReadyError::Io {
                message: format!("file not found: {}", msg),
            },
            IoError::OpenFailed(msg) | IoError::Io(msg) => ReadyError::Io { message: msg },
            IoError::InvalidFormat(msg) => ReadyError::Format(FormatError::Malformed(msg)),
            IoError::UnsupportedFormat(msg) => {
                ReadyError::Format(FormatError::UnsupportedContainer(msg))
            }
        }
    }
}

impl From<ElementError> for ReadyError {
    fn from(err: ElementError) -> Self {
        ReadyError::Format(err.into())
    }
}

/// Errors in descriptor or container content
#[derive(Error, Debug, PartialEq)]
pub enum FormatError {
    #[error("Malformed file: {0}")]
    Malformed(String),

    #[error("Unsupported data type: {0}")]
    UnsupportedContainer(String),

    #[error("Invalid value in <{element}>: {message}")]
    InvalidValue { element: String, message: String },

    #[error("Rule '{rule}' works on exactly {declared} chemicals but the data has {found}")]
    ChemicalCountMismatch {
        rule: String,
        declared: usize,
        found: usize,
    },

    #[error("Unreadable format version {version}")]
    UnreadableVersion { version: i64 },

    #[error("No RD element found in file")]
    MissingDescriptor,
}

impl From<ElementError> for FormatError {
    fn from(err: ElementError) -> Self {
        match err {
            ElementError::Malformed(msg) => FormatError::Malformed(msg),
            ElementError::Read { path, message } => {
                FormatError::Malformed(format!("{}: {}", path, message))
            }
            ElementError::MissingAttribute { element, attribute } => FormatError::InvalidValue {
                element,
                message: format!("missing attribute '{}'", attribute),
            },
            ElementError::InvalidAttribute {
                element,
                attribute,
                value,
            } => FormatError::InvalidValue {
                element,
                message: format!("cannot parse {}=\"{}\"", attribute, value),
            },
            ElementError::InvalidContent { element, message } => {
                FormatError::InvalidValue { element, message }
            }
        }
    }
}

/// Which part of the data section is missing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingDataKind {
    /// No point or cell data section at all
    NoDataSection,
    /// A data section with no arrays in it
    NoArrays,
    /// The first array's scalar type is not understood
    UnknownScalarType,
}

impl std::fmt::Display for MissingDataKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MissingDataKind::NoDataSection => write!(f, "no data section"),
            MissingDataKind::NoArrays => write!(f, "no data arrays"),
            MissingDataKind::UnknownScalarType => write!(f, "unknown scalar type"),
        }
    }
}

/// Errors from compute backends
#[derive(Error, Debug, PartialEq)]
pub enum ComputeError {
    #[error("Unsupported program: {0}")]
    Unsupported(String),

    #[error("Compilation failed: {0}")]
    Compile(String),

    #[error("Execution failed: {0}")]
    Run(String),

    #[error("Device {platform}/{device} unavailable: {message}")]
    Device {
        platform: usize,
        device: usize,
        message: String,
    },

    #[error("Kernel has not been compiled")]
    NotCompiled,
}

impl From<ParseError> for ComputeError {
    fn from(err: ParseError) -> Self {
        ComputeError::Compile(err.to_string())
    }
}

impl From<EvalError> for ComputeError {
    fn from(err: EvalError) -> Self {
        ComputeError::Run(err.to_string())
    }
}

/// Result type alias for ready operations
pub type ReadyResult<T> = Result<T, ReadyError>;

/// Result type alias for format checks
pub type FormatResult<T> = Result<T, FormatError>;

/// Result type alias for compute operations
pub type ComputeResult<T> = Result<T, ComputeError>;

/// Validation utilities
pub mod validation {
    use super::*;

    /// Dimensions must all be positive
    pub fn validate_dimensions(dimensions: [usize; 3]) -> FormatResult<()> {
        if dimensions.iter().any(|&d| d == 0) {
            return Err(FormatError::InvalidValue {
                element: "ImageData".to_string(),
                message: format!(
                    "dimensions must be positive, got {}x{}x{}",
                    dimensions[0], dimensions[1], dimensions[2]
                ),
            });
        }
        Ok(())
    }

    /// A rule's declared chemical count must match the data
    pub fn validate_chemical_count(
        rule: &str,
        declared: Option<usize>,
        found: usize,
    ) -> FormatResult<()> {
        match declared {
            Some(declared) if declared != found => {
                Err(FormatError::ChemicalCountMismatch {
                    rule: rule.to_string(),
                    declared,
                    found,
                })
            }
            _ => Ok(()),
        }
    }
}
