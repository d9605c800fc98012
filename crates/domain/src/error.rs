use thiserror::Error;

/// Coarse category of a failure, used to pick the HTTP status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MissingFile,
    Decode,
    Shape,
    Inference,
    Storage,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::MissingFile => "missing_file",
            ErrorKind::Decode => "decode",
            ErrorKind::Shape => "shape",
            ErrorKind::Inference => "inference",
            ErrorKind::Storage => "storage",
        }
    }

    /// Only a missing upload is the caller's fault.
    pub fn is_client_error(self) -> bool {
        matches!(self, ErrorKind::MissingFile)
    }
}

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("no file part named `file` in the request")]
    MissingFile,
    #[error("failed to decode audio: {0}")]
    Decode(String),
    #[error("shape mismatch: expected {expected:?}, got {actual:?}")]
    Shape {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("failed to store upload: {0}")]
    Storage(#[from] std::io::Error),
}

impl ClassifyError {
    pub fn decode<T: Into<String>>(message: T) -> Self {
        Self::Decode(message.into())
    }

    pub fn inference<T: Into<String>>(message: T) -> Self {
        Self::Inference(message.into())
    }

    pub fn shape(expected: &[usize], actual: &[usize]) -> Self {
        Self::Shape {
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ClassifyError::MissingFile => ErrorKind::MissingFile,
            ClassifyError::Decode(_) => ErrorKind::Decode,
            ClassifyError::Shape { .. } => ErrorKind::Shape,
            ClassifyError::Inference(_) => ErrorKind::Inference,
            ClassifyError::Storage(_) => ErrorKind::Storage,
        }
    }
}
