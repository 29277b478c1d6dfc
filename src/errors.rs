//! Error types for label extraction and the transfer runner

use std::fmt;

pub type Result<T> = std::result::Result<T, TransferError>;

#[derive(Debug)]
pub enum TransferError {
    /// IO operation failed
    Io(std::io::Error),

    /// JSON serialization/deserialization failed
    Json(serde_json::Error),

    /// Configuration error
    Config(String),

    /// Too many input lines could not be decoded
    MalformedInput { malformed: u64, limit: u64 },
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferError::Io(err) => write!(f, "IO error: {}", err),
            TransferError::Json(err) => write!(f, "JSON error: {}", err),
            TransferError::Config(msg) => write!(f, "Configuration error: {}", msg),
            TransferError::MalformedInput { malformed, limit } => write!(
                f,
                "Malformed input: {} undecodable lines exceeds limit of {}",
                malformed, limit
            ),
        }
    }
}

impl std::error::Error for TransferError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransferError::Io(err) => Some(err),
            TransferError::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for TransferError {
    fn from(err: std::io::Error) -> Self {
        TransferError::Io(err)
    }
}

impl From<serde_json::Error> for TransferError {
    fn from(err: serde_json::Error) -> Self {
        TransferError::Json(err)
    }
}

/// Failure while reading a label out of a source document.
///
/// Never leaves the extractor: it is logged and only the affected label
/// is left out.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionFault {
    pub label: &'static str,
    pub path: String,
    pub found: &'static str,
}

impl fmt::Display for ExtractionFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "label '{}' at '{}' holds {}, expected a scalar",
            self.label, self.path, self.found
        )
    }
}

impl std::error::Error for ExtractionFault {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_display() {
        let fault = ExtractionFault {
            label: "app",
            path: "kubernetes.labels.app".to_string(),
            found: "an object",
        };
        assert_eq!(
            fault.to_string(),
            "label 'app' at 'kubernetes.labels.app' holds an object, expected a scalar"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let err: TransferError = std::io::Error::other("disk gone").into();
        assert!(matches!(err, TransferError::Io(_)));
        assert!(std::error::Error::source(&err).is_some());
    }
}
