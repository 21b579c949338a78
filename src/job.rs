//! Job object and completion port wrappers.
//!
//! The job object is the process-group container: every process assigned to
//! it, and everything those processes spawn, is terminated when the job
//! handle closes (kill-on-close). The completion port is the channel the
//! job posts lifecycle messages into, in particular "active process count
//! reached zero". Both handles close on drop, so every exit path of the
//! launch releases them exactly once.

use windows::Win32::Foundation::{CloseHandle, HANDLE, INVALID_HANDLE_VALUE, WAIT_TIMEOUT};
use windows::Win32::System::JobObjects::{
    AssignProcessToJobObject, CreateJobObjectW, JobObjectAssociateCompletionPortInformation,
    JobObjectBasicAccountingInformation, JobObjectExtendedLimitInformation,
    QueryInformationJobObject, SetInformationJobObject, JOBOBJECT_ASSOCIATE_COMPLETION_PORT,
    JOBOBJECT_BASIC_ACCOUNTING_INFORMATION, JOBOBJECT_EXTENDED_LIMIT_INFORMATION,
    JOB_OBJECT_LIMIT_KILL_ON_JOB_CLOSE, JOB_OBJECT_MSG_ACTIVE_PROCESS_ZERO,
};
use windows::Win32::System::IO::{CreateIoCompletionPort, GetQueuedCompletionStatus, OVERLAPPED};
use windows::core::PCWSTR;

use crate::error::{win32_code, FailureKind, TaskError};
use crate::util::encode_wide;

/// A named job object configured as a kill-on-close process group.
pub struct ProcessGroup {
    handle: HANDLE,
}

impl ProcessGroup {
    /// Create a new, uniquely named job object.
    pub fn create(name: &str) -> Result<Self, TaskError> {
        let name_wide = encode_wide(name);
        let handle = unsafe { CreateJobObjectW(None, PCWSTR(name_wide.as_ptr())) }.map_err(
            |e| {
                TaskError::new(
                    FailureKind::ResourceCreation,
                    "run CreateJobObjectW",
                    win32_code(&e),
                )
            },
        )?;
        Ok(Self { handle })
    }

    /// Configure the group so closing its handle terminates every member.
    /// Must succeed before any process is attached.
    pub fn set_kill_on_close(&self) -> Result<(), TaskError> {
        let mut info = JOBOBJECT_EXTENDED_LIMIT_INFORMATION::default();
        info.BasicLimitInformation.LimitFlags = JOB_OBJECT_LIMIT_KILL_ON_JOB_CLOSE;
        unsafe {
            SetInformationJobObject(
                self.handle,
                JobObjectExtendedLimitInformation,
                &info as *const _ as *const _,
                std::mem::size_of::<JOBOBJECT_EXTENDED_LIMIT_INFORMATION>() as u32,
            )
        }
        .map_err(|e| {
            TaskError::new(
                FailureKind::Configuration,
                "run SetInformationJobObject",
                win32_code(&e),
            )
        })
    }

    /// Bind a process to the group. The process must still be alive
    /// (suspended, in this design) for the assignment to succeed.
    pub fn attach(&self, process: HANDLE) -> Result<(), TaskError> {
        unsafe { AssignProcessToJobObject(self.handle, process) }.map_err(|e| {
            TaskError::new(
                FailureKind::Attachment,
                "run AssignProcessToJobObject",
                win32_code(&e),
            )
        })
    }

    /// Number of processes still alive in the group, or None if the query
    /// failed (callers treat that as "still active" and retry).
    pub fn active_count(&self) -> Option<u32> {
        let mut accounting = JOBOBJECT_BASIC_ACCOUNTING_INFORMATION::default();
        let result = unsafe {
            QueryInformationJobObject(
                Some(self.handle),
                JobObjectBasicAccountingInformation,
                &mut accounting as *mut _ as *mut _,
                std::mem::size_of::<JOBOBJECT_BASIC_ACCOUNTING_INFORMATION>() as u32,
                None,
            )
        };
        match result {
            Ok(()) => Some(accounting.ActiveProcesses),
            Err(_) => None,
        }
    }

    /// The completion key the group posts with: its own handle value.
    pub fn key(&self) -> usize {
        self.handle.0 as usize
    }

    pub(crate) fn handle(&self) -> HANDLE {
        self.handle
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseHandle(self.handle);
        }
    }
}

/// Outcome of one bounded wait on the completion channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitSignal {
    /// The associated group reported its last active process gone.
    GroupEmpty,
    /// A message from the associated group other than active-process-zero.
    Other,
    /// A message carrying some other completion key; ignored.
    Foreign,
    /// No message arrived within the timeout.
    TimedOut,
    /// The port or group handle is no longer valid; carries the OS code.
    Invalid(u32),
}

/// An I/O completion port receiving job lifecycle messages.
pub struct CompletionChannel {
    port: HANDLE,
    group_key: usize,
}

impl CompletionChannel {
    /// Create an unassociated completion port (single concurrent consumer).
    pub fn create() -> Result<Self, TaskError> {
        let port = unsafe { CreateIoCompletionPort(INVALID_HANDLE_VALUE, None, 0, 1) }.map_err(
            |e| {
                TaskError::new(
                    FailureKind::ResourceCreation,
                    "run CreateIoCompletionPort",
                    win32_code(&e),
                )
            },
        )?;
        Ok(Self { port, group_key: 0 })
    }

    /// Associate the port with a group so the group posts lifecycle
    /// messages here, keyed by its own handle. Must happen before any
    /// process is attached to the group.
    pub fn associate(&mut self, group: &ProcessGroup) -> Result<(), TaskError> {
        let association = JOBOBJECT_ASSOCIATE_COMPLETION_PORT {
            CompletionKey: group.handle().0,
            CompletionPort: self.port,
        };
        unsafe {
            SetInformationJobObject(
                group.handle(),
                JobObjectAssociateCompletionPortInformation,
                &association as *const _ as *const _,
                std::mem::size_of::<JOBOBJECT_ASSOCIATE_COMPLETION_PORT>() as u32,
            )
        }
        .map_err(|e| {
            TaskError::new(
                FailureKind::Configuration,
                "run SetInformationJobObject",
                win32_code(&e),
            )
        })?;
        self.group_key = group.key();
        Ok(())
    }

    /// Wait up to `timeout_ms` for the next message and classify it.
    pub fn wait(&self, timeout_ms: u32) -> WaitSignal {
        let mut message = 0u32;
        let mut key = 0usize;
        let mut overlapped: *mut OVERLAPPED = std::ptr::null_mut();

        let result = unsafe {
            GetQueuedCompletionStatus(self.port, &mut message, &mut key, &mut overlapped, timeout_ms)
        };

        match result {
            Ok(()) => {
                if key != self.group_key {
                    WaitSignal::Foreign
                } else if message == JOB_OBJECT_MSG_ACTIVE_PROCESS_ZERO {
                    WaitSignal::GroupEmpty
                } else {
                    WaitSignal::Other
                }
            }
            Err(e) => {
                let code = win32_code(&e);
                if code == WAIT_TIMEOUT.0 {
                    WaitSignal::TimedOut
                } else if overlapped.is_null() {
                    // No packet was dequeued: the port itself failed.
                    WaitSignal::Invalid(code)
                } else {
                    // A failed packet was dequeued; not ours, keep polling.
                    WaitSignal::TimedOut
                }
            }
        }
    }
}

impl Drop for CompletionChannel {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseHandle(self.port);
        }
    }
}
