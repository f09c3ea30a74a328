//! Error type shared by every module of the crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Image decoding error: {0}")]
    Image(#[from] image::ImageError),

    /// Two sequences that must be paired element-by-element differ in length.
    #[error("Length mismatch for {what}: expected {expected}, got {actual}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Label {label} is out of range for {num_classes} classes")]
    InvalidLabel { label: usize, num_classes: usize },

    #[error("Shape error: {0}")]
    Shape(String),

    #[error("Ensemble is empty: at least one model is required")]
    EmptyEnsemble,

    #[error("Ensemble models disagree on class count: expected {expected}, found {found}")]
    ClassCountMismatch { expected: usize, found: usize },

    /// An operation was called in a state where it is not defined,
    /// e.g. restoring a best snapshot before any epoch was observed.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Model state mismatch: {0}")]
    StateMismatch(String),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidLabel { label: 9, num_classes: 7 };
        assert_eq!(err.to_string(), "Label 9 is out of range for 7 classes");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
