use thiserror::Error;

/// Substitute diagnostic code used when the OS did not supply one.
///
/// A failure must never be reported with a zero/absent code, so error paths
/// that cannot recover the real OS code fall back to this sentinel.
pub const FALLBACK_OS_CODE: i32 = -1;

/// Error taxonomy for process operations
#[derive(Debug, Error)]
pub enum ProcError {
    #[error("process not found")]
    NotFound,

    #[error("access denied")]
    AccessDenied,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("platform error {code}: {message}")]
    Platform { code: i32, message: String },

    #[error("operation timed out")]
    Timeout,
}

impl ProcError {
    /// Wrap a raw OS failure. A zero code is replaced by
    /// [`FALLBACK_OS_CODE`] so failures always carry a usable diagnostic.
    pub fn platform(code: i32, message: impl Into<String>) -> Self {
        let code = if code == 0 { FALLBACK_OS_CODE } else { code };
        ProcError::Platform {
            code,
            message: message.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        ProcError::InvalidArgument(message.into())
    }

    /// The underlying OS error code, when one is attached.
    pub fn os_code(&self) -> Option<i32> {
        match self {
            ProcError::Platform { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Check if this error means the target was absent at time of use.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ProcError::NotFound)
    }

    /// Check if this error is a rights problem rather than a missing target.
    pub fn is_access_denied(&self) -> bool {
        matches!(self, ProcError::AccessDenied)
    }
}

impl From<std::io::Error> for ProcError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => ProcError::NotFound,
            std::io::ErrorKind::PermissionDenied => ProcError::AccessDenied,
            _ => ProcError::platform(
                err.raw_os_error().unwrap_or(FALLBACK_OS_CODE),
                err.to_string(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = ProcError::platform(5, "open failed");
        let display = format!("{error}");
        assert!(display.contains("platform error 5"));
        assert!(display.contains("open failed"));

        let error = ProcError::invalid("zero-capacity buffer");
        assert!(format!("{error}").contains("zero-capacity buffer"));
    }

    #[test]
    fn test_zero_code_is_replaced() {
        // Reporting a failure with code 0 is itself a defect to guard against.
        let error = ProcError::platform(0, "lost the real code");
        assert_eq!(error.os_code(), Some(FALLBACK_OS_CODE));
    }

    #[test]
    fn test_io_error_conversion() {
        let error: ProcError = std::io::Error::from(std::io::ErrorKind::NotFound).into();
        assert!(error.is_not_found());

        let error: ProcError = std::io::Error::from(std::io::ErrorKind::PermissionDenied).into();
        assert!(error.is_access_denied());

        let error: ProcError = std::io::Error::from_raw_os_error(13).into();
        // EACCES maps through the PermissionDenied kind, not Platform
        assert!(error.is_access_denied());

        let error: ProcError = std::io::Error::from_raw_os_error(22).into();
        assert_eq!(error.os_code(), Some(22));
    }

    #[test]
    fn test_categorization() {
        assert!(ProcError::NotFound.is_not_found());
        assert!(!ProcError::NotFound.is_access_denied());
        assert!(ProcError::AccessDenied.is_access_denied());
        assert_eq!(ProcError::Timeout.os_code(), None);
    }
}
