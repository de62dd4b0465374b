#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,

    /// The run completed but a unit or scenario missed its success criteria.
    Failed = 10,

    /// Invalid CLI flags or plan (bad YAML, unknown strategy, dependency cycle, budget too small, etc.).
    InvalidInput = 30,

    /// Internal/runtime error (IO errors, task join failures).
    RuntimeError = 40,
}

impl ExitCode {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    #[must_use]
    pub fn from_success(success: bool) -> Self {
        if success { Self::Success } else { Self::Failed }
    }
}
