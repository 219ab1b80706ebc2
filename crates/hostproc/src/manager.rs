use std::time::{Duration, Instant};

use tracing::{debug, warn};

use hostproc_core::{
    AccessRights, Pid, PriorityClass, ProcError, ProcessBackend, ProcessHandle, ProcessInfo,
    Snapshot, SpawnSpec, Spawned, Target, WaitOutcome,
};

use crate::PlatformBackend;

/// Sleep between snapshot refreshes in the polling waits. Small enough that
/// a 500 ms timeout is observed well within its tolerance.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// The public lifecycle operations, built on a platform backend.
///
/// Every operation captures its own snapshot and owns its own handles;
/// nothing is shared or cached across calls. Operations shaped as
/// `bool`/`0` sentinels treat "not found" as a routine outcome; `Result`
/// shaped queries propagate enumeration failures instead of passing them
/// off as empty results.
pub struct ProcessManager<B: ProcessBackend = PlatformBackend> {
    backend: B,
    poll_interval: Duration,
}

impl ProcessManager<PlatformBackend> {
    pub fn new() -> Self {
        Self::with_backend(crate::create_platform_backend())
    }
}

impl Default for ProcessManager<PlatformBackend> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: ProcessBackend> ProcessManager<B> {
    pub fn with_backend(backend: B) -> Self {
        Self {
            backend,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Adjust the snapshot polling interval used by the waiting operations.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    // -- discovery --

    /// PID of the first process matching `descriptor`, 0 when none does.
    pub fn exists(&self, descriptor: &str) -> Result<Pid, ProcError> {
        let Some(target) = Target::parse(descriptor) else {
            return Ok(0);
        };
        let snapshot = self.backend.capture()?;
        Ok(snapshot.resolve_first(&target).unwrap_or(0))
    }

    /// Count all matches of `descriptor` and fill `out` with up to its
    /// capacity of PIDs.
    ///
    /// The return value is always the true total match count, regardless of
    /// capacity; `None` (or an empty slice) is count-only mode. Callers ask
    /// for the count first, then call again with a large enough buffer.
    pub fn find_all(&self, descriptor: &str, out: Option<&mut [Pid]>) -> Result<usize, ProcError> {
        let Some(target) = Target::parse(descriptor) else {
            return Ok(0);
        };
        let snapshot = self.backend.capture()?;
        let matches = snapshot.resolve_all(&target);
        if let Some(out) = out {
            let filled = matches.len().min(out.len());
            out[..filled].copy_from_slice(&matches[..filled]);
        }
        Ok(matches.len())
    }

    /// Parent PID of the resolved target, per the same snapshot; 0 when the
    /// target is not found.
    pub fn parent_of(&self, descriptor: &str) -> Result<Pid, ProcError> {
        let Some(target) = Target::parse(descriptor) else {
            return Ok(0);
        };
        let snapshot = self.backend.capture()?;
        let Some(pid) = snapshot.resolve_first(&target) else {
            return Ok(0);
        };
        Ok(snapshot.parent_of(pid).unwrap_or(0))
    }

    // -- creation --

    /// Launch a new process. The caller owns the returned handle and is
    /// responsible for releasing it (dropping it suffices).
    pub fn create(&self, spec: &SpawnSpec) -> Result<Spawned<B::Handle>, ProcError> {
        self.backend.spawn(spec)
    }

    /// Fire-and-forget launch: the internal handle is released immediately
    /// once the PID is captured.
    pub fn launch(&self, spec: &SpawnSpec) -> Result<Pid, ProcError> {
        let spawned = self.backend.spawn(spec)?;
        let pid = spawned.pid;
        let mut handle = spawned.handle;
        handle.release();
        Ok(pid)
    }

    /// Launch under a privileged system identity. Without the privilege
    /// this fails with the OS permission code surfaced in the error.
    pub fn create_elevated(&self, spec: &SpawnSpec) -> Result<Spawned<B::Handle>, ProcError> {
        self.backend.spawn_elevated(spec)
    }

    // -- handles --

    pub fn open_by_pid(&self, pid: Pid, access: AccessRights) -> Result<B::Handle, ProcError> {
        self.backend.open(pid, access)
    }

    /// Resolve `descriptor` against a fresh snapshot, then open the first
    /// match.
    pub fn open_by_name(
        &self,
        descriptor: &str,
        access: AccessRights,
    ) -> Result<B::Handle, ProcError> {
        let Some(target) = Target::parse(descriptor) else {
            return Err(ProcError::NotFound);
        };
        let snapshot = self.backend.capture()?;
        let pid = snapshot.resolve_first(&target).ok_or(ProcError::NotFound)?;
        self.backend.open(pid, access)
    }

    // -- introspection --

    /// Combined info query; `NotFound` when the PID is not live, never a
    /// partial struct.
    pub fn get_info(&self, pid: Pid) -> Result<ProcessInfo, ProcError> {
        self.backend.query_info(pid)
    }

    pub fn command_line(&self, pid: Pid) -> Result<String, ProcError> {
        Ok(self.backend.query_info(pid)?.command_line)
    }

    pub fn path(&self, pid: Pid) -> Result<String, ProcError> {
        Ok(self.backend.query_info(pid)?.exe_path)
    }

    /// Copy the command line into a caller-sized buffer, NUL-terminated.
    /// A buffer with zero capacity or too small for content plus terminator
    /// fails with `InvalidArgument` and is left untouched.
    pub fn command_line_into(&self, pid: Pid, out: &mut [u8]) -> Result<usize, ProcError> {
        if out.is_empty() {
            return Err(ProcError::invalid("zero-capacity buffer"));
        }
        let text = self.command_line(pid)?;
        copy_bounded(&text, out)
    }

    /// Copy the executable path into a caller-sized buffer; same buffer
    /// contract as [`Self::command_line_into`].
    pub fn path_into(&self, pid: Pid, out: &mut [u8]) -> Result<usize, ProcError> {
        if out.is_empty() {
            return Err(ProcError::invalid("zero-capacity buffer"));
        }
        let text = self.path(pid)?;
        copy_bounded(&text, out)
    }

    // -- control --

    /// Resolve and terminate with the given exit code; false on any failure
    /// to resolve or open.
    pub fn close(&self, descriptor: &str, exit_code: u32) -> bool {
        let Some(target) = Target::parse(descriptor) else {
            return false;
        };
        let snapshot = match self.backend.capture() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "snapshot capture failed");
                return false;
            }
        };
        let Some(pid) = snapshot.resolve_first(&target) else {
            return false;
        };
        self.terminate_by_pid(pid, exit_code)
    }

    /// Open with termination rights and request termination.
    pub fn terminate_by_pid(&self, pid: Pid, exit_code: u32) -> bool {
        let mut handle = match self.backend.open(pid, AccessRights::TERMINATE) {
            Ok(handle) => handle,
            Err(e) => {
                debug!(pid = %pid, error = %e, "open for terminate failed");
                return false;
            }
        };
        let ok = match self.backend.terminate(pid, exit_code) {
            Ok(()) => true,
            Err(e) => {
                warn!(pid = %pid, error = %e, "terminate failed");
                false
            }
        };
        handle.release();
        ok
    }

    /// Resolve a root and terminate its whole tree.
    pub fn close_tree(&self, descriptor: &str) -> bool {
        let Some(target) = Target::parse(descriptor) else {
            return false;
        };
        let snapshot = match self.backend.capture() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "snapshot capture failed");
                return false;
            }
        };
        let Some(root) = snapshot.resolve_first(&target) else {
            return false;
        };
        self.terminate_tree(root, &snapshot)
    }

    /// Terminate `root` and every descendant captured in one snapshot.
    ///
    /// True iff the root was found and signaled. Descendants that are
    /// already gone by the time their turn comes are tolerated; the tree
    /// membership is not re-validated after the snapshot.
    pub fn terminate_tree_by_pid(&self, root: Pid) -> bool {
        if root == 0 {
            return false;
        }
        let snapshot = match self.backend.capture() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "snapshot capture failed");
                return false;
            }
        };
        self.terminate_tree(root, &snapshot)
    }

    fn terminate_tree(&self, root: Pid, snapshot: &Snapshot) -> bool {
        let members = snapshot.descendants_of(root);
        if members.is_empty() {
            return false;
        }
        debug!(root = %root, members = members.len(), "terminating process tree");
        // Children first, deepest first; the root goes last so it cannot
        // respawn children into a half-collapsed tree.
        for &pid in members.iter().skip(1).rev() {
            match self.backend.terminate(pid, 1) {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => warn!(pid = %pid, error = %e, "failed to terminate descendant"),
            }
        }
        match self.backend.terminate(root, 1) {
            Ok(()) => true,
            // Found in the snapshot but gone before the signal: closed.
            Err(e) if e.is_not_found() => true,
            Err(e) => {
                warn!(root = %root, error = %e, "failed to terminate tree root");
                false
            }
        }
    }

    /// Map a single-letter priority code onto the OS priority class of the
    /// resolved target. An unrecognized code is a validation failure.
    pub fn set_priority(&self, descriptor: &str, code: char) -> bool {
        let Some(class) = PriorityClass::from_code(code) else {
            return false;
        };
        let Some(target) = Target::parse(descriptor) else {
            return false;
        };
        let snapshot = match self.backend.capture() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "snapshot capture failed");
                return false;
            }
        };
        let Some(pid) = snapshot.resolve_first(&target) else {
            return false;
        };
        match self.backend.set_priority(pid, class) {
            Ok(()) => true,
            Err(e) => {
                warn!(pid = %pid, error = %e, "set_priority failed");
                false
            }
        }
    }

    // -- waits --

    /// Poll fresh snapshots until a match for `descriptor` appears.
    /// `None` timeout blocks indefinitely; `Ok(None)` means the timeout
    /// elapsed first. An empty descriptor can never appear.
    pub fn wait_appear(
        &self,
        descriptor: &str,
        timeout: Option<Duration>,
    ) -> Result<Option<Pid>, ProcError> {
        let Some(target) = Target::parse(descriptor) else {
            return Ok(None);
        };
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            let snapshot = self.backend.capture()?;
            if let Some(pid) = snapshot.resolve_first(&target) {
                return Ok(Some(pid));
            }
            match self.nap(deadline) {
                Some(nap) => std::thread::sleep(nap),
                None => return Ok(None),
            }
        }
    }

    /// Poll until no match for `descriptor` remains. A target that never
    /// existed is vacuously closed and returns true immediately.
    pub fn wait_close(
        &self,
        descriptor: &str,
        timeout: Option<Duration>,
    ) -> Result<bool, ProcError> {
        let Some(target) = Target::parse(descriptor) else {
            return Ok(true);
        };
        let deadline = timeout.map(|t| Instant::now() + t);
        // When the initial resolution finds a PID, wait on a handle to it
        // between snapshots instead of sleeping blind.
        let mut watched: Option<B::Handle> = None;
        let mut first = true;
        loop {
            let snapshot = self.backend.capture()?;
            let resolved = snapshot.resolve_first(&target);
            let Some(pid) = resolved else {
                return Ok(true);
            };
            if first {
                first = false;
                watched = self.backend.open(pid, AccessRights::SYNCHRONIZE).ok();
            }
            let Some(nap) = self.nap(deadline) else {
                return Ok(false);
            };
            match watched.as_mut() {
                Some(handle) => {
                    if let Ok(WaitOutcome::Signaled) = handle.wait_for_exit(Some(nap)) {
                        // The watched instance is gone; others may share the
                        // name, fall back to plain polling.
                        watched = None;
                    }
                }
                None => std::thread::sleep(nap),
            }
        }
    }

    /// Remaining sleep slice before `deadline`, `None` once it has passed.
    fn nap(&self, deadline: Option<Instant>) -> Option<Duration> {
        match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    None
                } else {
                    Some(self.poll_interval.min(deadline - now))
                }
            }
            None => Some(self.poll_interval),
        }
    }
}

/// Copy `text` plus a terminating NUL into `out`; `InvalidArgument` and no
/// write at all when it does not fit.
fn copy_bounded(text: &str, out: &mut [u8]) -> Result<usize, ProcError> {
    let bytes = text.as_bytes();
    if bytes.len() + 1 > out.len() {
        return Err(ProcError::invalid(format!(
            "buffer of {} bytes cannot hold {} bytes plus terminator",
            out.len(),
            bytes.len()
        )));
    }
    out[..bytes.len()].copy_from_slice(bytes);
    out[bytes.len()] = 0;
    Ok(bytes.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostproc_core::ProcessRecord;
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::path::Path;
    use std::rc::Rc;

    #[derive(Debug, Default)]
    struct FakeState {
        procs: Vec<ProcessRecord>,
        // In snapshots, but gone by the time a signal arrives.
        ghosts: HashSet<Pid>,
        deny_terminate: HashSet<Pid>,
        deny_open: HashSet<Pid>,
        vanish: Vec<(Pid, usize)>,
        appear: Vec<(ProcessRecord, usize)>,
        captures: usize,
        terminated: Vec<(Pid, u32)>,
        priorities: Vec<(Pid, PriorityClass)>,
        releases: usize,
        fail_capture: bool,
        next_pid: Pid,
    }

    #[derive(Debug)]
    struct FakeHandle {
        pid: Pid,
        access: AccessRights,
        state: Rc<RefCell<FakeState>>,
        released: bool,
    }

    impl ProcessHandle for FakeHandle {
        fn pid(&self) -> Pid {
            self.pid
        }

        fn access(&self) -> AccessRights {
            self.access
        }

        fn is_alive(&mut self) -> bool {
            self.state
                .borrow()
                .procs
                .iter()
                .any(|r| r.pid == self.pid)
        }

        fn wait_for_exit(&mut self, timeout: Option<Duration>) -> Result<WaitOutcome, ProcError> {
            let deadline = timeout.map(|t| Instant::now() + t);
            loop {
                if !self.is_alive() {
                    return Ok(WaitOutcome::Signaled);
                }
                match deadline {
                    Some(deadline) if Instant::now() >= deadline => {
                        return Ok(WaitOutcome::TimedOut);
                    }
                    _ => std::thread::sleep(Duration::from_millis(1)),
                }
            }
        }

        fn release(&mut self) {
            if self.released {
                return;
            }
            self.released = true;
            self.state.borrow_mut().releases += 1;
        }
    }

    impl Drop for FakeHandle {
        fn drop(&mut self) {
            self.release();
        }
    }

    struct FakeBackend {
        state: Rc<RefCell<FakeState>>,
    }

    impl FakeBackend {
        fn with(procs: Vec<ProcessRecord>) -> Self {
            let next_pid = procs.iter().map(|r| r.pid).max().unwrap_or(100);
            Self {
                state: Rc::new(RefCell::new(FakeState {
                    procs,
                    next_pid,
                    ..Default::default()
                })),
            }
        }

        fn state_handle(&self) -> Rc<RefCell<FakeState>> {
            Rc::clone(&self.state)
        }

        fn handle(&self, pid: Pid, access: AccessRights) -> FakeHandle {
            FakeHandle {
                pid,
                access,
                state: Rc::clone(&self.state),
                released: false,
            }
        }
    }

    impl ProcessBackend for FakeBackend {
        type Handle = FakeHandle;

        fn capture(&self) -> Result<Snapshot, ProcError> {
            let mut st = self.state.borrow_mut();
            if st.fail_capture {
                return Err(ProcError::platform(5, "enumeration failed"));
            }
            st.captures += 1;
            let n = st.captures;
            let vanish: Vec<Pid> = st
                .vanish
                .iter()
                .filter(|(_, at)| *at <= n)
                .map(|(pid, _)| *pid)
                .collect();
            st.procs.retain(|r| !vanish.contains(&r.pid));
            let appear: Vec<ProcessRecord> = st
                .appear
                .iter()
                .filter(|(_, at)| *at <= n)
                .map(|(r, _)| r.clone())
                .collect();
            for record in appear {
                if !st.procs.iter().any(|r| r.pid == record.pid) {
                    st.procs.push(record);
                }
            }
            Ok(Snapshot::from_records(st.procs.clone()))
        }

        fn open(&self, pid: Pid, access: AccessRights) -> Result<FakeHandle, ProcError> {
            if pid == 0 {
                return Err(ProcError::invalid("pid 0"));
            }
            let st = self.state.borrow();
            if st.deny_open.contains(&pid) {
                return Err(ProcError::AccessDenied);
            }
            if !st.procs.iter().any(|r| r.pid == pid) {
                return Err(ProcError::NotFound);
            }
            drop(st);
            Ok(self.handle(pid, access))
        }

        fn spawn(&self, spec: &SpawnSpec) -> Result<Spawned<FakeHandle>, ProcError> {
            if spec.command.is_empty() {
                return Err(ProcError::invalid("empty command"));
            }
            let mut st = self.state.borrow_mut();
            st.next_pid += 1;
            let pid = st.next_pid;
            let name = Path::new(&spec.command)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| spec.command.clone());
            st.procs.push(ProcessRecord {
                pid,
                parent_pid: 1,
                name,
            });
            drop(st);
            Ok(Spawned {
                pid,
                handle: self.handle(pid, AccessRights::all()),
            })
        }

        fn spawn_elevated(&self, _spec: &SpawnSpec) -> Result<Spawned<FakeHandle>, ProcError> {
            Err(ProcError::platform(1, "operation not permitted"))
        }

        fn terminate(&self, pid: Pid, exit_code: u32) -> Result<(), ProcError> {
            let mut st = self.state.borrow_mut();
            if st.deny_terminate.contains(&pid) {
                return Err(ProcError::AccessDenied);
            }
            if st.ghosts.contains(&pid) {
                return Err(ProcError::NotFound);
            }
            let before = st.procs.len();
            st.procs.retain(|r| r.pid != pid);
            if st.procs.len() == before {
                return Err(ProcError::NotFound);
            }
            st.terminated.push((pid, exit_code));
            Ok(())
        }

        fn set_priority(&self, pid: Pid, class: PriorityClass) -> Result<(), ProcError> {
            let mut st = self.state.borrow_mut();
            if !st.procs.iter().any(|r| r.pid == pid) {
                return Err(ProcError::NotFound);
            }
            st.priorities.push((pid, class));
            Ok(())
        }

        fn query_info(&self, pid: Pid) -> Result<ProcessInfo, ProcError> {
            let st = self.state.borrow();
            let record = st
                .procs
                .iter()
                .find(|r| r.pid == pid)
                .ok_or(ProcError::NotFound)?;
            Ok(ProcessInfo {
                pid,
                parent_pid: record.parent_pid,
                session_id: 1,
                exe_path: format!("/usr/bin/{}", record.name),
                command_line: format!("/usr/bin/{} --serve", record.name),
                memory_usage_bytes: 4096,
                thread_count: 2,
            })
        }
    }

    fn record(pid: Pid, parent_pid: Pid, name: &str) -> ProcessRecord {
        ProcessRecord {
            pid,
            parent_pid,
            name: name.to_string(),
        }
    }

    fn fixture() -> (ProcessManager<FakeBackend>, Rc<RefCell<FakeState>>) {
        let backend = FakeBackend::with(vec![
            record(1, 0, "init"),
            record(10, 1, "worker"),
            record(11, 10, "worker"),
            record(12, 10, "helper"),
            record(13, 12, "helper"),
            record(40, 1, "other"),
        ]);
        let state = backend.state_handle();
        let manager =
            ProcessManager::with_backend(backend).poll_interval(Duration::from_millis(5));
        (manager, state)
    }

    #[test]
    fn test_exists_by_name_and_pid() {
        let (manager, _) = fixture();
        assert_eq!(manager.exists("worker").unwrap(), 10);
        assert_eq!(manager.exists("WORKER").unwrap(), 10);
        assert_eq!(manager.exists("10").unwrap(), 10);
        assert_eq!(manager.exists("nope").unwrap(), 0);
        assert_eq!(manager.exists("999").unwrap(), 0);
        assert_eq!(manager.exists("").unwrap(), 0);
    }

    #[test]
    fn test_capture_failure_propagates() {
        let (manager, state) = fixture();
        state.borrow_mut().fail_capture = true;
        let err = manager.exists("worker").unwrap_err();
        assert_eq!(err.os_code(), Some(5));
    }

    #[test]
    fn test_find_all_capacity_protocol() {
        let (manager, _) = fixture();

        // Count-only mode.
        assert_eq!(manager.find_all("worker", None).unwrap(), 2);
        assert_eq!(manager.find_all("worker", Some(&mut [])).unwrap(), 2);

        // Capacity below total: true total, exactly capacity slots filled.
        let mut one = [0u32; 1];
        assert_eq!(manager.find_all("worker", Some(&mut one)).unwrap(), 2);
        assert_eq!(one[0], 10);

        // Capacity above total: untouched tail.
        let mut many = [0u32; 4];
        assert_eq!(manager.find_all("worker", Some(&mut many)).unwrap(), 2);
        assert_eq!(&many[..2], &[10, 11]);
        assert_eq!(&many[2..], &[0, 0]);

        assert_eq!(manager.find_all("", None).unwrap(), 0);
        assert_eq!(manager.find_all("nope", None).unwrap(), 0);
    }

    #[test]
    fn test_parent_of() {
        let (manager, _) = fixture();
        assert_eq!(manager.parent_of("helper").unwrap(), 10);
        assert_eq!(manager.parent_of("13").unwrap(), 12);
        assert_eq!(manager.parent_of("nope").unwrap(), 0);
        assert_eq!(manager.parent_of("").unwrap(), 0);
    }

    #[test]
    fn test_get_info() {
        let (manager, _) = fixture();
        let info = manager.get_info(12).unwrap();
        assert_eq!(info.pid, 12);
        assert_eq!(info.parent_pid, 10);
        assert!(info.exe_path.ends_with("helper"));

        assert!(manager.get_info(999).unwrap_err().is_not_found());
    }

    #[test]
    fn test_bounded_buffer_contract() {
        let (manager, _) = fixture();
        let text = manager.command_line(12).unwrap();

        // Zero capacity: refused, untouched.
        let mut empty: [u8; 0] = [];
        assert!(matches!(
            manager.command_line_into(12, &mut empty),
            Err(ProcError::InvalidArgument(_))
        ));

        // Exactly content-sized: no room for the terminator, untouched.
        let mut tight = vec![0xAA; text.len()];
        assert!(matches!(
            manager.command_line_into(12, &mut tight),
            Err(ProcError::InvalidArgument(_))
        ));
        assert!(tight.iter().all(|&b| b == 0xAA));

        // One spare byte: fits, NUL-terminated.
        let mut buf = vec![0xAA; text.len() + 1];
        let written = manager.command_line_into(12, &mut buf).unwrap();
        assert_eq!(written, text.len());
        assert_eq!(&buf[..written], text.as_bytes());
        assert_eq!(buf[written], 0);

        let mut path_buf = [0u8; 64];
        let written = manager.path_into(12, &mut path_buf).unwrap();
        assert_eq!(&path_buf[..written], b"/usr/bin/helper");
    }

    #[test]
    fn test_close_and_terminate() {
        let (manager, state) = fixture();
        assert!(manager.close("other", 7));
        assert_eq!(state.borrow().terminated, vec![(40, 7)]);
        // Handle opened for termination was released again.
        assert_eq!(state.borrow().releases, 1);

        assert!(!manager.close("other", 0)); // already gone
        assert!(!manager.close("nope", 0));
        assert!(!manager.close("", 0));
        assert!(!manager.terminate_by_pid(999, 0));

        state.borrow_mut().deny_open.insert(1);
        assert!(!manager.terminate_by_pid(1, 0));
    }

    #[test]
    fn test_close_tree_children_first() {
        let (manager, state) = fixture();
        assert!(manager.close_tree("10"));

        let terminated: Vec<Pid> = state.borrow().terminated.iter().map(|(p, _)| *p).collect();
        assert_eq!(terminated.len(), 4);
        // The root is signaled last.
        assert_eq!(*terminated.last().unwrap(), 10);
        // Children go before their parents.
        let pos = |pid: Pid| terminated.iter().position(|&p| p == pid).unwrap();
        assert!(pos(13) < pos(12));
        assert!(pos(12) < pos(10));
        assert!(pos(11) < pos(10));

        assert_eq!(manager.exists("10").unwrap(), 0);
        assert_eq!(manager.exists("helper").unwrap(), 0);
    }

    #[test]
    fn test_close_tree_tolerates_vanished_descendant() {
        let (manager, state) = fixture();
        // 13 is captured in the snapshot but exits before its signal.
        state.borrow_mut().ghosts.insert(13);
        assert!(manager.close_tree("10"));
        let terminated: Vec<Pid> = state.borrow().terminated.iter().map(|(p, _)| *p).collect();
        assert!(!terminated.contains(&13));
        assert!(terminated.contains(&10));
    }

    #[test]
    fn test_close_tree_missing_root() {
        let (manager, _) = fixture();
        assert!(!manager.close_tree("999"));
        assert!(!manager.close_tree("nope"));
        assert!(!manager.close_tree(""));
        assert!(!manager.terminate_tree_by_pid(0));
    }

    #[test]
    fn test_set_priority() {
        let (manager, state) = fixture();
        assert!(manager.set_priority("worker", 'L'));
        assert!(manager.set_priority("worker", 'l')); // idempotent re-set
        assert!(manager.set_priority("40", 'H'));
        assert_eq!(
            state.borrow().priorities,
            vec![
                (10, PriorityClass::Idle),
                (10, PriorityClass::Idle),
                (40, PriorityClass::High)
            ]
        );

        assert!(!manager.set_priority("worker", 'X'));
        assert!(!manager.set_priority("nope", 'L'));
        assert!(!manager.set_priority("", 'L'));
    }

    #[test]
    fn test_launch_releases_handle() {
        let (manager, state) = fixture();
        let pid = manager.launch(&SpawnSpec::new("svc")).unwrap();
        assert!(pid > 0);
        assert_eq!(state.borrow().releases, 1);
        assert_eq!(manager.exists("svc").unwrap(), pid);
    }

    #[test]
    fn test_create_transfers_handle_ownership() {
        let (manager, state) = fixture();
        let spawned = manager.create(&SpawnSpec::new("svc")).unwrap();
        assert_eq!(spawned.handle.pid(), spawned.pid);
        assert_eq!(state.borrow().releases, 0);
        drop(spawned);
        assert_eq!(state.borrow().releases, 1);
    }

    #[test]
    fn test_create_elevated_surfaces_permission_code() {
        let (manager, _) = fixture();
        let err = manager.create_elevated(&SpawnSpec::new("svc")).unwrap_err();
        let code = err.os_code().expect("failure must carry a code");
        assert_ne!(code, 0);
    }

    #[test]
    fn test_open_by_name() {
        let (manager, _) = fixture();
        let handle = manager
            .open_by_name("helper", AccessRights::QUERY | AccessRights::SYNCHRONIZE)
            .unwrap();
        assert_eq!(handle.pid(), 12);
        assert!(handle.access().contains(AccessRights::SYNCHRONIZE));

        assert!(
            manager
                .open_by_name("nope", AccessRights::QUERY)
                .unwrap_err()
                .is_not_found()
        );
        assert!(
            manager
                .open_by_name("", AccessRights::QUERY)
                .unwrap_err()
                .is_not_found()
        );
    }

    #[test]
    fn test_wait_appear() {
        let (manager, state) = fixture();
        // Already present: immediate.
        assert_eq!(
            manager
                .wait_appear("worker", Some(Duration::ZERO))
                .unwrap(),
            Some(10)
        );

        // Appears at the third capture.
        let at = state.borrow().captures + 3;
        state.borrow_mut().appear.push((record(70, 1, "late"), at));
        let started = Instant::now();
        let pid = manager
            .wait_appear("late", Some(Duration::from_secs(5)))
            .unwrap();
        assert_eq!(pid, Some(70));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_wait_appear_timeout() {
        let (manager, _) = fixture();
        let started = Instant::now();
        let pid = manager
            .wait_appear("never", Some(Duration::from_millis(40)))
            .unwrap();
        assert_eq!(pid, None);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(40));
        assert!(elapsed < Duration::from_millis(500));

        // Empty descriptor can never appear.
        assert_eq!(manager.wait_appear("", None).unwrap(), None);
    }

    #[test]
    fn test_wait_close_vacuous() {
        let (manager, _) = fixture();
        let started = Instant::now();
        assert!(
            manager
                .wait_close("never-existed", Some(Duration::from_secs(5)))
                .unwrap()
        );
        assert!(started.elapsed() < Duration::from_millis(100));
        assert!(manager.wait_close("", None).unwrap());
    }

    #[test]
    fn test_wait_close_observes_exit() {
        let (manager, state) = fixture();
        let at = state.borrow().captures + 3;
        state.borrow_mut().vanish.push((40, at));
        assert!(
            manager
                .wait_close("other", Some(Duration::from_secs(5)))
                .unwrap()
        );
    }

    #[test]
    fn test_wait_close_timeout() {
        let (manager, _) = fixture();
        assert!(
            !manager
                .wait_close("worker", Some(Duration::from_millis(40)))
                .unwrap()
        );
    }
}
