use std::path::PathBuf;
use thiserror::Error;

pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// Structured error types for the garment analysis pipeline.
///
/// Each variant carries the context of its domain (filesystem, image decoding,
/// model inference, ...) and maps onto one documented process exit code, see
/// [`GarmentError::exit_code`].
#[derive(Error, Debug)]
pub enum GarmentError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Filesystem error: {operation} failed for {path:?}")]
    FileSystem {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot decode image {path:?}")]
    ImageDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Model error: {operation} failed")]
    Model {
        operation: String,
        #[source]
        source: BoxedError,
    },

    #[error("Validation error: {field} {reason}")]
    Validation { field: String, reason: String },
}

pub type Result<T> = std::result::Result<T, GarmentError>;

/// Process exit codes, one per outcome class.
pub mod exit_code {
    pub const SUCCESS: u8 = 0;
    pub const FAILURE: u8 = 1;
    pub const NOTHING_DETECTED: u8 = 10;
    pub const INVALID_BOX: u8 = 11;
    pub const IMAGE_DECODE: u8 = 20;
    pub const INFERENCE: u8 = 21;
}

impl GarmentError {
    pub fn model(operation: impl Into<String>, source: impl Into<BoxedError>) -> Self {
        Self::Model {
            operation: operation.into(),
            source: source.into(),
        }
    }

    pub fn shape_mismatch(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        let reason: String = reason.into();
        Self::model(operation, reason)
    }

    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::ImageDecode { .. } => exit_code::IMAGE_DECODE,
            Self::Model { .. } | Self::Validation { .. } => exit_code::INFERENCE,
            Self::Configuration { .. } | Self::FileSystem { .. } => exit_code::FAILURE,
        }
    }
}

/// anyhow errors only reach the library from configuration helpers.
impl From<anyhow::Error> for GarmentError {
    fn from(err: anyhow::Error) -> Self {
        GarmentError::Configuration {
            message: format!("{err:#}"),
        }
    }
}

/// Fallback for I/O errors raised without path context. Code that knows the
/// path should build [`GarmentError::FileSystem`] itself.
impl From<std::io::Error> for GarmentError {
    fn from(err: std::io::Error) -> Self {
        Self::FileSystem {
            path: PathBuf::from("unknown"),
            operation: "unknown".to_string(),
            source: err,
        }
    }
}

impl From<ort::Error> for GarmentError {
    fn from(err: ort::Error) -> Self {
        Self::model("ort operation", err)
    }
}

/// Shape errors come out of tensor reshaping around inference, so they are
/// reported as model errors.
impl From<ndarray::ShapeError> for GarmentError {
    fn from(err: ndarray::ShapeError) -> Self {
        Self::model("tensor shape conversion", err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct_per_outcome_class() {
        let decode = GarmentError::ImageDecode {
            path: PathBuf::from("missing.jpg"),
            source: image::ImageError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "not found",
            )),
        };
        assert_eq!(decode.exit_code(), exit_code::IMAGE_DECODE);

        let model = GarmentError::shape_mismatch("style head", "expected 4 scores, got 3");
        assert_eq!(model.exit_code(), exit_code::INFERENCE);

        let validation = GarmentError::Validation {
            field: "class_id".to_string(),
            reason: "is unknown".to_string(),
        };
        assert_eq!(validation.exit_code(), exit_code::INFERENCE);

        let config = GarmentError::Configuration {
            message: "bad".to_string(),
        };
        assert_eq!(config.exit_code(), exit_code::FAILURE);
    }

    #[test]
    fn test_source_chain_is_preserved() {
        let err = GarmentError::shape_mismatch("season head", "expected 4 scores, got 2");
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("expected 4 scores, got 2"));
    }
}
