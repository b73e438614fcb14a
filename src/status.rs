use serde::{Deserialize, Serialize};
use std::fmt;

/// Return code attached to every engine [`Status`].
///
/// Codes the crate does not name are preserved verbatim in
/// [`RetCode::Other`] so callers can still diagnose them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum RetCode {
    /// The call succeeded.
    Success,
    /// The request or a parameter was rejected.
    InvalidArgument,
    /// The engine ran out of device or host memory.
    OutOfMemory,
    /// A runtime failure inside the engine.
    Runtime,
    /// An internal failure of this crate or the worker pool.
    Internal,
    /// The iterator has no more items.
    StopIteration,
    /// Any other code reported by the engine.
    Other(i32),
}

impl RetCode {
    /// Numeric value of the code.
    pub fn as_i32(self) -> i32 {
        match self {
            RetCode::Success => 0,
            RetCode::InvalidArgument => 1,
            RetCode::OutOfMemory => 2,
            RetCode::Runtime => 3,
            RetCode::Internal => 4,
            RetCode::StopIteration => 5,
            RetCode::Other(code) => code,
        }
    }
}

impl From<i32> for RetCode {
    fn from(code: i32) -> Self {
        match code {
            0 => RetCode::Success,
            1 => RetCode::InvalidArgument,
            2 => RetCode::OutOfMemory,
            3 => RetCode::Runtime,
            4 => RetCode::Internal,
            5 => RetCode::StopIteration,
            other => RetCode::Other(other),
        }
    }
}

impl From<RetCode> for i32 {
    fn from(code: RetCode) -> Self {
        code.as_i32()
    }
}

impl fmt::Display for RetCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_i32())
    }
}

/// Outcome of a single engine call: a code and a human readable message.
///
/// ```
/// use serving_rs::{RetCode, Status};
/// let status = Status::new(7, "oom");
/// assert_eq!(status.code(), RetCode::Other(7));
/// assert!(!status.is_ok());
/// assert!(Status::stop_iteration().is_stop_iteration());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    code: RetCode,
    message: String,
}

impl Status {
    /// Creates a status from any code representation.
    pub fn new(code: impl Into<RetCode>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// A successful status with an empty message.
    pub fn ok() -> Self {
        Self::new(RetCode::Success, "")
    }

    /// The status an iterator reports once it has no more items.
    pub fn stop_iteration() -> Self {
        Self::new(RetCode::StopIteration, "iterator finished")
    }

    pub fn code(&self) -> RetCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_ok(&self) -> bool {
        self.code == RetCode::Success
    }

    pub fn is_stop_iteration(&self) -> bool {
        self.code == RetCode::StopIteration
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ret code {}, message {}", self.code, self.message)
    }
}
