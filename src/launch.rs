//! Hidden launch of a process tree and the wait for it to empty.
//!
//! The race this module exists to close: a child that starts running
//! before it is inside the job object can spawn (or exit) untracked. So
//! the child is created CREATE_SUSPENDED, assigned to the group, and only
//! then resumed. The strict order is group created, kill-on-close set,
//! completion port associated, attach, resume. After resume the child's
//! own handles are closed; its lifetime (and its descendants') is observed
//! solely through the group.

use windows::Win32::Foundation::{CloseHandle, GetLastError, HANDLE};
use windows::Win32::System::Threading::{
    CreateProcessW, ResumeThread, TerminateProcess, CREATE_SUSPENDED, PROCESS_INFORMATION,
    STARTF_USESHOWWINDOW, STARTUPINFOW,
};
use windows::Win32::UI::WindowsAndMessaging::SW_HIDE;
use windows::core::PWSTR;

use crate::debug_log;
use crate::error::{win32_code, FailureKind, TaskError};
use crate::job::{CompletionChannel, ProcessGroup, WaitSignal};
use crate::random::RandomSource;
use crate::{cmdline, util};

/// How long one bounded wait on the completion channel may block before
/// the fallback active-count probe runs.
const POLL_INTERVAL_MS: u32 = 250;

/// What to launch: an executable path plus its arguments, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchRequest {
    pub executable: String,
    pub args: Vec<String>,
}

/// A spawned child, still suspended until `resume` is called.
/// Both handles close on drop; dropping does not terminate the process.
struct ChildProcess {
    info: PROCESS_INFORMATION,
}

impl ChildProcess {
    fn process_handle(&self) -> HANDLE {
        self.info.hProcess
    }

    fn pid(&self) -> u32 {
        self.info.dwProcessId
    }

    fn resume(&self) -> Result<(), TaskError> {
        let previous = unsafe { ResumeThread(self.info.hThread) };
        if previous == u32::MAX {
            let code = unsafe { GetLastError() }.0;
            return Err(TaskError::new(FailureKind::Resume, "run ResumeThread", code));
        }
        Ok(())
    }

    /// Kill the suspended child. Only used when attachment failed: a
    /// suspended process outside the group would otherwise leak forever.
    fn terminate(&self) {
        unsafe {
            let _ = TerminateProcess(self.info.hProcess, 0);
        }
    }
}

impl Drop for ChildProcess {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseHandle(self.info.hThread);
            let _ = CloseHandle(self.info.hProcess);
        }
    }
}

/// Create the child suspended with its window hidden.
fn spawn_suspended(command_line: &str) -> Result<ChildProcess, TaskError> {
    let mut cmd_wide = util::encode_wide(command_line);

    let si = STARTUPINFOW {
        cb: std::mem::size_of::<STARTUPINFOW>() as u32,
        dwFlags: STARTF_USESHOWWINDOW,
        wShowWindow: SW_HIDE.0 as u16,
        ..Default::default()
    };

    let mut pi = PROCESS_INFORMATION::default();

    unsafe {
        CreateProcessW(
            None,
            Some(PWSTR(cmd_wide.as_mut_ptr())),
            None,
            None,
            false,
            CREATE_SUSPENDED,
            None,
            None,
            &si,
            &mut pi,
        )
    }
    .map_err(|e| TaskError::new(FailureKind::Launch, "run CreateProcessW", win32_code(&e)))?;

    Ok(ChildProcess { info: pi })
}

/// The wait loop's view of the group: a bounded event wait plus an
/// active-count probe. Abstracted so the loop's termination behavior is
/// testable without a live job object.
pub trait GroupMonitor {
    fn wait_event(&mut self, timeout_ms: u32) -> WaitSignal;
    fn active_count(&mut self) -> Option<u32>;
}

struct JobMonitor<'a> {
    group: &'a ProcessGroup,
    channel: &'a CompletionChannel,
}

impl GroupMonitor for JobMonitor<'_> {
    fn wait_event(&mut self, timeout_ms: u32) -> WaitSignal {
        self.channel.wait(timeout_ms)
    }

    fn active_count(&mut self) -> Option<u32> {
        self.group.active_count()
    }
}

/// Block until the group is empty. The zero-message is the primary
/// signal; on any other outcome the active count is probed, so a dropped
/// or delayed message delays completion by at most one poll interval.
/// Probe failures mean "assume still active and keep polling".
pub fn wait_until_empty<M: GroupMonitor>(
    monitor: &mut M,
    timeout_ms: u32,
) -> Result<(), TaskError> {
    loop {
        match monitor.wait_event(timeout_ms) {
            WaitSignal::GroupEmpty => return Ok(()),
            WaitSignal::Foreign => continue,
            WaitSignal::Invalid(code) => {
                return Err(TaskError::new(
                    FailureKind::Wait,
                    "run GetQueuedCompletionStatus",
                    code,
                ));
            }
            WaitSignal::Other | WaitSignal::TimedOut => {
                if let Some(0) = monitor.active_count() {
                    return Ok(());
                }
            }
        }
    }
}

/// Launch the request hidden and block until its whole process tree has
/// terminated. All OS handles release by drop on every exit path. On the
/// success path the group handle closes only after emptiness was
/// observed, so kill-on-close never fires on a tree that finished on its
/// own; on failure paths it fires and reaps whatever was attached.
pub fn run_hidden(request: &LaunchRequest) -> Result<(), TaskError> {
    let random = RandomSource::acquire()?;
    let group_name = format!("bgtask-jo-{}", random.next_u32()?);
    debug_log!("group name: {}", group_name);

    let group = ProcessGroup::create(&group_name)?;
    group.set_kill_on_close()?;

    let mut channel = CompletionChannel::create()?;
    channel.associate(&group)?;

    let command_line = cmdline::build(&request.executable, &request.args);
    debug_log!("command line: {}", command_line);

    let child = spawn_suspended(&command_line)?;
    debug_log!("child pid: {}", child.pid());

    if let Err(e) = group.attach(child.process_handle()) {
        // A suspended process outside the group is untracked; reap it
        // before propagating.
        child.terminate();
        return Err(e);
    }

    // From here on the group owns the tree: even a resume failure leaves
    // the child inside it, reaped by kill-on-close when `group` drops.
    child.resume()?;
    drop(child);

    let mut monitor = JobMonitor {
        group: &group,
        channel: &channel,
    };
    wait_until_empty(&mut monitor, POLL_INTERVAL_MS)?;
    debug_log!("group {} is empty", group_name);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scripted monitor: pops one signal per iteration and one count per
    /// probe. Panics if the loop runs longer than the script, which is
    /// exactly the bounded-termination property under test.
    struct FakeMonitor {
        signals: Vec<WaitSignal>,
        counts: Vec<Option<u32>>,
        probes: usize,
    }

    impl FakeMonitor {
        fn new(signals: Vec<WaitSignal>, counts: Vec<Option<u32>>) -> Self {
            Self {
                signals,
                counts,
                probes: 0,
            }
        }
    }

    impl GroupMonitor for FakeMonitor {
        fn wait_event(&mut self, _timeout_ms: u32) -> WaitSignal {
            if self.signals.is_empty() {
                panic!("wait loop did not terminate within the scripted iterations");
            }
            self.signals.remove(0)
        }

        fn active_count(&mut self) -> Option<u32> {
            self.probes += 1;
            if self.counts.is_empty() {
                panic!("more probes than scripted");
            }
            self.counts.remove(0)
        }
    }

    #[test]
    fn zero_message_completes_without_probing() {
        let mut monitor = FakeMonitor::new(vec![WaitSignal::GroupEmpty], vec![]);
        assert!(wait_until_empty(&mut monitor, 250).is_ok());
        assert_eq!(monitor.probes, 0);
    }

    #[test]
    fn dropped_message_converges_through_fallback_probe() {
        // The zero-message never arrives; the count probe alone must
        // finish the wait once it reads zero.
        let mut monitor = FakeMonitor::new(
            vec![
                WaitSignal::TimedOut,
                WaitSignal::TimedOut,
                WaitSignal::TimedOut,
            ],
            vec![Some(2), Some(1), Some(0)],
        );
        assert!(wait_until_empty(&mut monitor, 250).is_ok());
        assert_eq!(monitor.probes, 3);
    }

    #[test]
    fn other_message_triggers_probe() {
        let mut monitor = FakeMonitor::new(vec![WaitSignal::Other], vec![Some(0)]);
        assert!(wait_until_empty(&mut monitor, 250).is_ok());
        assert_eq!(monitor.probes, 1);
    }

    #[test]
    fn foreign_messages_are_ignored() {
        let mut monitor = FakeMonitor::new(
            vec![
                WaitSignal::Foreign,
                WaitSignal::Foreign,
                WaitSignal::GroupEmpty,
            ],
            vec![],
        );
        assert!(wait_until_empty(&mut monitor, 250).is_ok());
        assert_eq!(monitor.probes, 0);
    }

    #[test]
    fn failed_probe_keeps_polling() {
        let mut monitor = FakeMonitor::new(
            vec![WaitSignal::TimedOut, WaitSignal::TimedOut],
            vec![None, Some(0)],
        );
        assert!(wait_until_empty(&mut monitor, 250).is_ok());
        assert_eq!(monitor.probes, 2);
    }

    #[test]
    fn invalid_channel_is_fatal() {
        let mut monitor = FakeMonitor::new(vec![WaitSignal::Invalid(6)], vec![]);
        let err = wait_until_empty(&mut monitor, 250).unwrap_err();
        assert_eq!(err.kind, FailureKind::Wait);
        assert_eq!(err.code, 6);
    }
}
