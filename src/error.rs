//! Error types for the torrent core
//!
//! This module defines the error kinds shared by the descriptor,
//! storage, and manager components.

use std::fmt;

/// Error type covering all core operations
#[derive(Debug, Clone)]
pub enum CoreError {
    /// Name parsing and shape errors
    NameError {
        message: String,
        name: Option<String>,
    },

    /// Descriptor encoding/decoding errors
    DescriptorError {
        message: String,
        source: Option<String>,
    },

    /// Signature verification failures
    VerificationError {
        message: String,
        name: Option<String>,
    },

    /// File I/O and storage errors
    StorageError {
        message: String,
        path: Option<String>,
        source: Option<String>,
    },

    /// Transport-level errors
    TransportError {
        message: String,
        name: Option<String>,
        source: Option<String>,
    },

    /// Configuration errors
    ConfigError {
        message: String,
        field: Option<String>,
    },
}

impl CoreError {
    /// Create a new NameError
    pub fn name_error(message: impl Into<String>) -> Self {
        CoreError::NameError {
            message: message.into(),
            name: None,
        }
    }

    /// Create a new NameError for a specific name
    pub fn name_error_for(message: impl Into<String>, name: impl Into<String>) -> Self {
        CoreError::NameError {
            message: message.into(),
            name: Some(name.into()),
        }
    }

    /// Create a new DescriptorError
    pub fn descriptor_error(message: impl Into<String>) -> Self {
        CoreError::DescriptorError {
            message: message.into(),
            source: None,
        }
    }

    /// Create a new DescriptorError with source
    pub fn descriptor_error_with_source(
        message: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        CoreError::DescriptorError {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a new VerificationError for a specific name
    pub fn verification_error(message: impl Into<String>, name: impl Into<String>) -> Self {
        CoreError::VerificationError {
            message: message.into(),
            name: Some(name.into()),
        }
    }

    /// Create a new StorageError
    pub fn storage_error(message: impl Into<String>) -> Self {
        CoreError::StorageError {
            message: message.into(),
            path: None,
            source: None,
        }
    }

    /// Create a new StorageError with path
    pub fn storage_error_with_path(message: impl Into<String>, path: impl Into<String>) -> Self {
        CoreError::StorageError {
            message: message.into(),
            path: Some(path.into()),
            source: None,
        }
    }

    /// Create a new StorageError with path and source
    pub fn storage_error_full(
        message: impl Into<String>,
        path: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        CoreError::StorageError {
            message: message.into(),
            path: Some(path.into()),
            source: Some(source.into()),
        }
    }

    /// Create a new TransportError for a specific request name
    pub fn transport_error(message: impl Into<String>, name: impl Into<String>) -> Self {
        CoreError::TransportError {
            message: message.into(),
            name: Some(name.into()),
            source: None,
        }
    }

    /// Create a new ConfigError
    pub fn config_error(message: impl Into<String>) -> Self {
        CoreError::ConfigError {
            message: message.into(),
            field: None,
        }
    }

    /// Create a new ConfigError with field
    pub fn config_error_with_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        CoreError::ConfigError {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::NameError { message, name } => {
                if let Some(n) = name {
                    write!(f, "Name error: {} (name: {})", message, n)
                } else {
                    write!(f, "Name error: {}", message)
                }
            }
            CoreError::DescriptorError { message, source } => {
                if let Some(src) = source {
                    write!(f, "Descriptor error: {} (source: {})", message, src)
                } else {
                    write!(f, "Descriptor error: {}", message)
                }
            }
            CoreError::VerificationError { message, name } => {
                if let Some(n) = name {
                    write!(f, "Verification error: {} (name: {})", message, n)
                } else {
                    write!(f, "Verification error: {}", message)
                }
            }
            CoreError::StorageError { message, path, source } => match (path, source) {
                (Some(p), Some(s)) => {
                    write!(f, "Storage error: {} (path: {}, source: {})", message, p, s)
                }
                (Some(p), None) => write!(f, "Storage error: {} (path: {})", message, p),
                (None, Some(s)) => write!(f, "Storage error: {} (source: {})", message, s),
                (None, None) => write!(f, "Storage error: {}", message),
            },
            CoreError::TransportError { message, name, source } => match (name, source) {
                (Some(n), Some(s)) => {
                    write!(f, "Transport error: {} (name: {}, source: {})", message, n, s)
                }
                (Some(n), None) => write!(f, "Transport error: {} (name: {})", message, n),
                (None, Some(s)) => write!(f, "Transport error: {} (source: {})", message, s),
                (None, None) => write!(f, "Transport error: {}", message),
            },
            CoreError::ConfigError { message, field } => {
                if let Some(field_val) = field {
                    write!(f, "Config error: {} (field: {})", message, field_val)
                } else {
                    write!(f, "Config error: {}", message)
                }
            }
        }
    }
}

impl std::error::Error for CoreError {}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        CoreError::storage_error_full(err.to_string(), "unknown", err.kind().to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::descriptor_error_with_source("Failed to decode descriptor", err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_error() {
        let err = CoreError::name_error("Missing digest component");
        assert_eq!(err.to_string(), "Name error: Missing digest component");
    }

    #[test]
    fn test_name_error_for() {
        let err = CoreError::name_error_for("Missing digest component", "/swarm/demo");
        assert!(err.to_string().contains("Missing digest component"));
        assert!(err.to_string().contains("/swarm/demo"));
    }

    #[test]
    fn test_descriptor_error_with_source() {
        let err = CoreError::descriptor_error_with_source("Bad segment", "eof");
        assert!(err.to_string().contains("Descriptor error"));
        assert!(err.to_string().contains("Bad segment"));
        assert!(err.to_string().contains("eof"));
    }

    #[test]
    fn test_verification_error() {
        let err = CoreError::verification_error("Signature mismatch", "/swarm/demo/torrent-file");
        assert!(err.to_string().contains("Verification error"));
        assert!(err.to_string().contains("/swarm/demo/torrent-file"));
    }

    #[test]
    fn test_storage_error_with_path() {
        let err = CoreError::storage_error_with_path("File not found", "/tmp/data");
        assert!(err.to_string().contains("Storage error"));
        assert!(err.to_string().contains("/tmp/data"));
    }

    #[test]
    fn test_config_error_with_field() {
        let err = CoreError::config_error_with_field("Must be nonzero", "window_size");
        assert!(err.to_string().contains("Config error"));
        assert!(err.to_string().contains("window_size"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let err: CoreError = io_err.into();
        assert!(matches!(err, CoreError::StorageError { .. }));
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: CoreError = json_err.into();
        assert!(matches!(err, CoreError::DescriptorError { .. }));
    }
}
