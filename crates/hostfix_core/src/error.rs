use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreErrorCode {
    Io,
    PathArgumentInvalid,
    InvalidIdentity,
    FormatMismatch,
    UnknownSaveType,
    UnsupportedSaveType,
    LengthMismatch,
    UncompressedLengthMismatch,
    CorruptPayload,
    ExternalCodecFailure,
    TreeParse,
    PathNotFound,
    TypeMismatch,
    InvalidConfig,
}

impl CoreErrorCode {
    /// Container validation failures: the file is structurally not a save we can handle.
    pub fn is_container_error(&self) -> bool {
        matches!(
            self,
            Self::FormatMismatch
                | Self::UnknownSaveType
                | Self::UnsupportedSaveType
                | Self::LengthMismatch
                | Self::UncompressedLengthMismatch
                | Self::CorruptPayload
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreError {
    pub code: CoreErrorCode,
    pub message: String,
}

impl CoreError {
    pub fn new(code: CoreErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn io(context: impl fmt::Display, err: std::io::Error) -> Self {
        Self::new(CoreErrorCode::Io, format!("{context}: {err}"))
    }

    /// Prefixes the message with the file or field the error was raised for.
    pub fn with_context(mut self, context: impl fmt::Display) -> Self {
        self.message = format!("{context}: {}", self.message);
        self
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl Error for CoreError {}
