use std::ops::BitOr;
use std::time::Duration;

use crate::{Pid, PriorityClass, ProcError, ProcessInfo, Snapshot, SpawnSpec};

/// Access rights a process handle is opened with.
///
/// A small bit set composed the way the Win32 masks compose; backends
/// without per-handle rights treat them as intent when probing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessRights(u32);

impl AccessRights {
    pub const QUERY: AccessRights = AccessRights(0b0001);
    pub const TERMINATE: AccessRights = AccessRights(0b0010);
    pub const SET_INFORMATION: AccessRights = AccessRights(0b0100);
    pub const SYNCHRONIZE: AccessRights = AccessRights(0b1000);

    pub const fn empty() -> Self {
        AccessRights(0)
    }

    pub const fn all() -> Self {
        AccessRights(0b1111)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: AccessRights) -> bool {
        self.0 & other.0 == other.0
    }
}

impl Default for AccessRights {
    fn default() -> Self {
        AccessRights::QUERY
    }
}

impl BitOr for AccessRights {
    type Output = AccessRights;

    fn bitor(self, rhs: AccessRights) -> AccessRights {
        AccessRights(self.0 | rhs.0)
    }
}

/// Outcome of a bounded wait on a handle.
///
/// Timeout is a distinct return value here, not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The process terminated (or was already gone).
    Signaled,
    /// The timeout elapsed with the process still alive.
    TimedOut,
}

impl WaitOutcome {
    pub fn is_signaled(self) -> bool {
        matches!(self, WaitOutcome::Signaled)
    }
}

/// Convert the classic milliseconds timeout convention, where a negative
/// value means "block forever".
pub fn timeout_from_millis(timeout_ms: i64) -> Option<Duration> {
    (timeout_ms >= 0).then(|| Duration::from_millis(timeout_ms as u64))
}

/// Result of a create call. Ownership of the handle transfers to the
/// caller, who is responsible for releasing it (dropping it suffices).
#[derive(Debug)]
pub struct Spawned<H> {
    pub pid: Pid,
    pub handle: H,
}

/// A held reference to a process, opened with specific access rights.
///
/// Exclusively owned by whichever call frame opened it. Release happens on
/// every exit path: `release` is idempotent and `Drop` implementations call
/// it as well.
pub trait ProcessHandle {
    fn pid(&self) -> Pid;

    fn access(&self) -> AccessRights;

    /// Non-blocking liveness probe.
    fn is_alive(&mut self) -> bool;

    /// Block until the process terminates or the timeout elapses. `None`
    /// blocks indefinitely. Safe on a process that already exited; that
    /// returns [`WaitOutcome::Signaled`] immediately.
    fn wait_for_exit(&mut self, timeout: Option<Duration>) -> Result<WaitOutcome, ProcError>;

    /// Idempotent release of the underlying OS resource.
    fn release(&mut self);
}

/// Platform seam: the OS-touching primitives the lifecycle operations are
/// built on. One implementation per platform.
pub trait ProcessBackend {
    type Handle: ProcessHandle;

    /// Enumerate all processes visible to the caller's security context.
    ///
    /// Processes the caller cannot inspect are omitted, not errors. Fails
    /// only on catastrophic enumeration failure.
    fn capture(&self) -> Result<Snapshot, ProcError>;

    /// Open a live process. `NotFound` for a dead PID, `AccessDenied` for
    /// missing rights, `Platform` (with the OS code) for anything else.
    fn open(&self, pid: Pid, access: AccessRights) -> Result<Self::Handle, ProcError>;

    /// Start a process; the returned handle belongs to the caller.
    fn spawn(&self, spec: &SpawnSpec) -> Result<Spawned<Self::Handle>, ProcError>;

    /// Start a process under a privileged system identity. Without the
    /// necessary privilege this fails with the OS permission code, surfaced
    /// rather than wrapped into a generic failure.
    fn spawn_elevated(&self, spec: &SpawnSpec) -> Result<Spawned<Self::Handle>, ProcError>;

    /// Request termination. The exit code applies where the OS supports one.
    fn terminate(&self, pid: Pid, exit_code: u32) -> Result<(), ProcError>;

    fn set_priority(&self, pid: Pid, class: PriorityClass) -> Result<(), ProcError>;

    /// Combined info query; fails cleanly with `NotFound` when the PID is
    /// not live, never returning a partial struct.
    fn query_info(&self, pid: Pid) -> Result<ProcessInfo, ProcError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_rights_compose() {
        let rights = AccessRights::QUERY | AccessRights::TERMINATE;
        assert!(rights.contains(AccessRights::QUERY));
        assert!(rights.contains(AccessRights::TERMINATE));
        assert!(!rights.contains(AccessRights::SYNCHRONIZE));
        assert!(AccessRights::all().contains(rights));
        assert!(!AccessRights::empty().contains(AccessRights::QUERY));
    }

    #[test]
    fn test_timeout_convention() {
        assert_eq!(timeout_from_millis(-1), None);
        assert_eq!(timeout_from_millis(0), Some(Duration::ZERO));
        assert_eq!(timeout_from_millis(500), Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_wait_outcome() {
        assert!(WaitOutcome::Signaled.is_signaled());
        assert!(!WaitOutcome::TimedOut.is_signaled());
    }
}
