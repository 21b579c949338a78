//! Launch failure type.
//!
//! Every failure carries the name of the OS operation that failed and the
//! Win32 error code, enough for the alert box to render the system's own
//! error text. No failure is retryable: a half-initialized process tree
//! cannot be safely resumed, so each one aborts the launch.

/// Which stage of the launch failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// A job object, completion port or crypto provider could not be created.
    ResourceCreation,
    /// A created resource could not be configured (kill-on-close, port association).
    Configuration,
    /// CreateProcessW failed.
    Launch,
    /// The suspended child could not be assigned to the job object.
    Attachment,
    /// ResumeThread failed after a successful attach.
    Resume,
    /// A handle became invalid while waiting for the group to empty.
    Wait,
}

/// An unrecoverable launch failure: the failed operation plus the OS code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskError {
    pub kind: FailureKind,
    pub task: &'static str,
    pub code: u32,
}

impl TaskError {
    pub fn new(kind: FailureKind, task: &'static str, code: u32) -> Self {
        Self { kind, task, code }
    }
}

impl std::fmt::Display for TaskError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unable to {} (error code {})", self.task, self.code)
    }
}

impl std::error::Error for TaskError {}

/// Extract the Win32 error code from a `windows::core::Error`.
///
/// The windows crate wraps `GetLastError` into an HRESULT
/// (FACILITY_WIN32); the low 16 bits are the original code.
pub fn win32_code(e: &windows::core::Error) -> u32 {
    (e.code().0 as u32) & 0xFFFF
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_task_and_code() {
        let e = TaskError::new(FailureKind::Launch, "run CreateProcessW", 2);
        assert_eq!(e.to_string(), "unable to run CreateProcessW (error code 2)");
    }

    #[test]
    fn kind_is_preserved() {
        let e = TaskError::new(FailureKind::Attachment, "run AssignProcessToJobObject", 5);
        assert_eq!(e.kind, FailureKind::Attachment);
        assert_eq!(e.task, "run AssignProcessToJobObject");
        assert_eq!(e.code, 5);
    }
}
