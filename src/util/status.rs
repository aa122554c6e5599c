use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Code {
    Corruption,
    InvalidArgument,
    IOError,
    Closed,
}

#[derive(Debug, Clone)]
pub struct Status {
    code: Code,
    message: Option<String>,
    /// Set for I/O errors raised by a fault injector rather than a real
    /// device. A retrying consumer may reissue the failed operation.
    injected: bool,
}

impl Status {
    fn with_code(code: Code, msg: impl Into<String>) -> Self {
        Status {
            code,
            message: Some(msg.into()),
            injected: false,
        }
    }

    pub fn corruption(msg: impl Into<String>) -> Self {
        Self::with_code(Code::Corruption, msg)
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::with_code(Code::InvalidArgument, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::with_code(Code::IOError, msg)
    }

    pub fn injected_io_error(msg: impl Into<String>) -> Self {
        Status {
            injected: true,
            ..Self::with_code(Code::IOError, msg)
        }
    }

    pub fn closed(msg: impl Into<String>) -> Self {
        Self::with_code(Code::Closed, msg)
    }

    pub fn is_corruption(&self) -> bool {
        self.code == Code::Corruption
    }

    pub fn is_invalid_argument(&self) -> bool {
        self.code == Code::InvalidArgument
    }

    pub fn is_io_error(&self) -> bool {
        self.code == Code::IOError
    }

    pub fn is_injected(&self) -> bool {
        self.code == Code::IOError && self.injected
    }

    pub fn is_closed(&self) -> bool {
        self.code == Code::Closed
    }

    pub fn code(&self) -> &Code {
        &self.code
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let injected = if self.injected { " (injected)" } else { "" };
        match &self.message {
            Some(msg) => write!(f, "{:?}{injected}: {}", self.code, msg),
            None => write!(f, "{:?}{injected}", self.code),
        }
    }
}

impl std::error::Error for Status {}

impl From<std::io::Error> for Status {
    fn from(err: std::io::Error) -> Self {
        Status::io_error(err.to_string())
    }
}

impl From<serde_json::Error> for Status {
    fn from(err: serde_json::Error) -> Self {
        Status::invalid_argument(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Status>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_corruption() {
        let status = Status::corruption("overlapping fragments");
        assert!(status.is_corruption());
        assert_eq!(status.code(), &Code::Corruption);
    }

    #[test]
    fn test_status_invalid_argument() {
        let status = Status::invalid_argument("inverted range");
        assert!(status.is_invalid_argument());
        assert_eq!(status.message(), Some("inverted range"));
    }

    #[test]
    fn test_status_display() {
        let status = Status::io_error("disk full");
        assert_eq!(status.to_string(), "IOError: disk full");

        let status = Status::injected_io_error("read failed");
        assert_eq!(status.to_string(), "IOError (injected): read failed");
    }

    #[test]
    fn test_injected_only_for_io() {
        assert!(Status::injected_io_error("x").is_injected());
        assert!(!Status::io_error("x").is_injected());
        assert!(!Status::closed("x").is_injected());
    }
}
