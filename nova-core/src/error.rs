use thiserror::Error;

#[derive(Error, Debug)]
pub enum NovaError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Format error: {0}")]
    Format(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Schema violation: {0}")]
    Schema(String),

    #[error("Unsupported encoding: {0}")]
    Encoding(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Stable numeric error codes surfaced through the result envelope.
#[repr(i32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    MalformedInput = 1,
    NotFound = 2,
    SchemaViolation = 3,
    UnsupportedEncoding = 4,
    IoFailure = 5,
    InvalidArgument = 6,
}

impl NovaError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            NovaError::Io(e) => match e.kind() {
                std::io::ErrorKind::NotFound => ErrorKind::NotFound,
                std::io::ErrorKind::UnexpectedEof
                | std::io::ErrorKind::InvalidData
                | std::io::ErrorKind::InvalidInput => {
                    ErrorKind::MalformedInput
                }
                _ => ErrorKind::IoFailure,
            },
            NovaError::Format(_) | NovaError::Json(_) => ErrorKind::MalformedInput,
            NovaError::NotFound(_) => ErrorKind::NotFound,
            NovaError::Schema(_) => ErrorKind::SchemaViolation,
            NovaError::Encoding(_) => ErrorKind::UnsupportedEncoding,
            NovaError::InvalidArgument(_) => ErrorKind::InvalidArgument,
        }
    }

    pub fn code(&self) -> i32 {
        self.kind() as i32
    }
}

// Convenient crate-wide result type
pub type Result<T> = std::result::Result<T, NovaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_route_by_kind() {
        let missing = NovaError::from(std::io::Error::from(std::io::ErrorKind::NotFound));
        assert_eq!(missing.kind(), ErrorKind::NotFound);

        let short = NovaError::from(std::io::Error::from(std::io::ErrorKind::UnexpectedEof));
        assert_eq!(short.code(), 1);

        let denied = NovaError::from(std::io::Error::from(std::io::ErrorKind::PermissionDenied));
        assert_eq!(denied.kind(), ErrorKind::IoFailure);
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(NovaError::Format("x".into()).code(), 1);
        assert_eq!(NovaError::NotFound("x".into()).code(), 2);
        assert_eq!(NovaError::Schema("x".into()).code(), 3);
        assert_eq!(NovaError::Encoding("x".into()).code(), 4);
        assert_eq!(NovaError::InvalidArgument("x".into()).code(), 6);
    }
}
