#[cfg(unix)]
mod unix_impl {
    use hostproc_core::{
        AccessRights, FALLBACK_OS_CODE, Pid, PriorityClass, ProcError, ProcessBackend,
        ProcessHandle, ProcessInfo, ProcessRecord, Snapshot, SpawnSpec, Spawned, WaitOutcome,
    };
    use nix::errno::Errno;
    use nix::libc;
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid as NixPid;
    use std::os::unix::process::CommandExt;
    use std::process::{Child, Command};
    use std::time::{Duration, Instant};
    use sysinfo::{ProcessStatus, System};
    use tracing::{debug, info, warn};

    /// Sleep between liveness probes while waiting on a handle.
    const PROBE_INTERVAL: Duration = Duration::from_millis(20);

    /// Unix process handle.
    ///
    /// Handles produced by spawn own the underlying child and reap it; a
    /// handle opened on a foreign PID only carries the PID and probes it
    /// with signal 0.
    #[derive(Debug)]
    pub struct UnixHandle {
        pid: Pid,
        access: AccessRights,
        child: Option<Child>,
        released: bool,
    }

    impl UnixHandle {
        fn opened(pid: Pid, access: AccessRights) -> Self {
            Self {
                pid,
                access,
                child: None,
                released: false,
            }
        }

        fn from_child(child: Child, access: AccessRights) -> Self {
            Self {
                pid: child.id(),
                access,
                child: Some(child),
                released: false,
            }
        }

        fn probe_alive(&mut self) -> Result<bool, ProcError> {
            if let Some(child) = self.child.as_mut() {
                // try_wait reaps the child once and caches the status after.
                return match child.try_wait() {
                    Ok(Some(_)) => Ok(false),
                    Ok(None) => Ok(true),
                    Err(e) => Err(ProcError::from(e)),
                };
            }
            match signal::kill(NixPid::from_raw(self.pid as i32), None) {
                Ok(()) => Ok(true),
                // Not permitted to signal it, but it exists.
                Err(Errno::EPERM) => Ok(true),
                Err(Errno::ESRCH) => Ok(false),
                Err(e) => Err(ProcError::platform(e as i32, format!("kill probe failed: {e}"))),
            }
        }
    }

    impl ProcessHandle for UnixHandle {
        fn pid(&self) -> Pid {
            self.pid
        }

        fn access(&self) -> AccessRights {
            self.access
        }

        fn is_alive(&mut self) -> bool {
            self.probe_alive().unwrap_or(false)
        }

        fn wait_for_exit(&mut self, timeout: Option<Duration>) -> Result<WaitOutcome, ProcError> {
            let deadline = timeout.map(|t| Instant::now() + t);
            loop {
                if !self.probe_alive()? {
                    return Ok(WaitOutcome::Signaled);
                }
                let nap = match deadline {
                    Some(deadline) => {
                        let now = Instant::now();
                        if now >= deadline {
                            return Ok(WaitOutcome::TimedOut);
                        }
                        PROBE_INTERVAL.min(deadline - now)
                    }
                    None => PROBE_INTERVAL,
                };
                std::thread::sleep(nap);
            }
        }

        fn release(&mut self) {
            if self.released {
                return;
            }
            self.released = true;
            if let Some(mut child) = self.child.take() {
                // Reap if it already exited. A still-running process keeps
                // running detached; the snapshot provider does not report
                // zombies, so a later unreaped exit stays invisible to
                // resolution.
                let _ = child.try_wait();
            }
        }
    }

    impl Drop for UnixHandle {
        fn drop(&mut self) {
            self.release();
        }
    }

    /// Unix backend: sysinfo for enumeration and queries, signals for
    /// control.
    pub struct UnixBackend {
        system: std::sync::Mutex<System>,
    }

    impl UnixBackend {
        pub fn new() -> Self {
            debug!("initializing Unix process backend");
            Self {
                system: std::sync::Mutex::new(System::new_all()),
            }
        }

        fn build_command(spec: &SpawnSpec) -> Result<Command, ProcError> {
            if spec.command.is_empty() {
                return Err(ProcError::invalid("empty command"));
            }
            let mut cmd = Command::new(&spec.command);
            cmd.args(&spec.args);
            if let Some(dir) = &spec.working_dir {
                cmd.current_dir(dir);
            }
            for (key, value) in &spec.env {
                cmd.env(key, value);
            }
            // Own process group, so a tree rooted here is cleanly separable.
            cmd.process_group(0);
            Ok(cmd)
        }

        fn spawn_error(context: &str, err: std::io::Error) -> ProcError {
            // Creation failures keep the raw OS code; a failure without a
            // diagnostic code is a contract violation.
            ProcError::platform(
                err.raw_os_error().unwrap_or(FALLBACK_OS_CODE),
                format!("{context}: {err}"),
            )
        }

        fn thread_count(process: &sysinfo::Process) -> u32 {
            #[cfg(target_os = "linux")]
            {
                process.tasks().map(|t| t.len() as u32).unwrap_or(0)
            }
            #[cfg(not(target_os = "linux"))]
            {
                let _ = process;
                0
            }
        }
    }

    impl Default for UnixBackend {
        fn default() -> Self {
            Self::new()
        }
    }

    impl ProcessBackend for UnixBackend {
        type Handle = UnixHandle;

        fn capture(&self) -> Result<Snapshot, ProcError> {
            let mut system = self.system.lock().unwrap();
            system.refresh_processes_specifics(
                sysinfo::ProcessesToUpdate::All,
                true,
                sysinfo::ProcessRefreshKind::everything(),
            );

            let mut records = Vec::with_capacity(system.processes().len());
            for (pid, process) in system.processes() {
                // An exited-but-unreaped process is gone for every consumer
                // of this library.
                if matches!(process.status(), ProcessStatus::Zombie | ProcessStatus::Dead) {
                    continue;
                }
                records.push(ProcessRecord {
                    pid: pid.as_u32(),
                    parent_pid: process.parent().map(|p| p.as_u32()).unwrap_or(0),
                    name: process.name().to_string_lossy().into_owned(),
                });
            }
            Ok(Snapshot::from_records(records))
        }

        fn open(&self, pid: Pid, access: AccessRights) -> Result<UnixHandle, ProcError> {
            if pid == 0 {
                return Err(ProcError::invalid("pid 0 cannot be opened"));
            }
            match signal::kill(NixPid::from_raw(pid as i32), None) {
                Ok(()) => Ok(UnixHandle::opened(pid, access)),
                Err(Errno::ESRCH) => Err(ProcError::NotFound),
                Err(Errno::EPERM) => {
                    // The process exists; signal 0 only proves we cannot
                    // signal it. Mutating rights are refused, query intent
                    // can still be served from the process table.
                    if access.contains(AccessRights::TERMINATE)
                        || access.contains(AccessRights::SET_INFORMATION)
                    {
                        Err(ProcError::AccessDenied)
                    } else {
                        Ok(UnixHandle::opened(pid, access))
                    }
                }
                Err(e) => Err(ProcError::platform(
                    e as i32,
                    format!("open probe for pid {pid} failed: {e}"),
                )),
            }
        }

        fn spawn(&self, spec: &SpawnSpec) -> Result<Spawned<UnixHandle>, ProcError> {
            let mut cmd = Self::build_command(spec)?;
            let child = cmd
                .spawn()
                .map_err(|e| Self::spawn_error("spawn failed", e))?;
            let pid = child.id();
            info!(pid = %pid, command = %spec.command, "spawned process");
            Ok(Spawned {
                pid,
                handle: UnixHandle::from_child(child, AccessRights::all()),
            })
        }

        fn spawn_elevated(&self, spec: &SpawnSpec) -> Result<Spawned<UnixHandle>, ProcError> {
            let mut cmd = Self::build_command(spec)?;
            // Run under the superuser identity. Without the privilege the
            // spawn fails in the pre-exec stage with EPERM/EACCES, which is
            // exactly the code callers are told to expect.
            cmd.uid(0).gid(0);
            match cmd.spawn() {
                Ok(child) => {
                    let pid = child.id();
                    info!(pid = %pid, command = %spec.command, "spawned elevated process");
                    Ok(Spawned {
                        pid,
                        handle: UnixHandle::from_child(child, AccessRights::all()),
                    })
                }
                Err(e) => {
                    warn!(command = %spec.command, error = %e, "elevated spawn failed");
                    Err(Self::spawn_error("elevated spawn failed", e))
                }
            }
        }

        fn terminate(&self, pid: Pid, exit_code: u32) -> Result<(), ProcError> {
            if pid == 0 {
                return Err(ProcError::invalid("pid 0 cannot be terminated"));
            }
            // The requested exit code is a Windows concept; a SIGKILL death
            // carries the signal instead.
            let _ = exit_code;
            match signal::kill(NixPid::from_raw(pid as i32), Signal::SIGKILL) {
                Ok(()) => {
                    info!(pid = %pid, "sent SIGKILL");
                    Ok(())
                }
                Err(Errno::ESRCH) => {
                    debug!(pid = %pid, "process already gone");
                    Err(ProcError::NotFound)
                }
                Err(Errno::EPERM) => {
                    warn!(pid = %pid, "permission denied terminating process");
                    Err(ProcError::AccessDenied)
                }
                Err(e) => Err(ProcError::platform(
                    e as i32,
                    format!("SIGKILL to pid {pid} failed: {e}"),
                )),
            }
        }

        fn set_priority(&self, pid: Pid, class: PriorityClass) -> Result<(), ProcError> {
            if pid == 0 {
                return Err(ProcError::invalid("pid 0 cannot be reprioritized"));
            }
            let level = class.nice_level();
            // SAFETY: plain syscall on scalar arguments, no pointers.
            let rc = unsafe { libc::setpriority(libc::PRIO_PROCESS as _, pid as _, level) };
            if rc == -1 {
                let errno = Errno::last();
                return Err(match errno {
                    Errno::ESRCH => ProcError::NotFound,
                    Errno::EPERM | Errno::EACCES => ProcError::AccessDenied,
                    e => ProcError::platform(
                        e as i32,
                        format!("setpriority for pid {pid} failed: {e}"),
                    ),
                });
            }
            info!(pid = %pid, class = ?class, nice = level, "priority set");
            Ok(())
        }

        fn query_info(&self, pid: Pid) -> Result<ProcessInfo, ProcError> {
            if pid == 0 {
                return Err(ProcError::invalid("pid 0 cannot be queried"));
            }
            let mut system = self.system.lock().unwrap();
            system.refresh_processes_specifics(
                sysinfo::ProcessesToUpdate::All,
                true,
                sysinfo::ProcessRefreshKind::everything(),
            );
            let process = system
                .processes()
                .get(&sysinfo::Pid::from_u32(pid))
                .ok_or(ProcError::NotFound)?;
            if matches!(process.status(), ProcessStatus::Zombie | ProcessStatus::Dead) {
                return Err(ProcError::NotFound);
            }

            let command_line = process
                .cmd()
                .iter()
                .map(|a| a.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ");

            Ok(ProcessInfo {
                pid,
                parent_pid: process.parent().map(|p| p.as_u32()).unwrap_or(0),
                session_id: process.session_id().map(|s| s.as_u32()).unwrap_or(0),
                exe_path: process
                    .exe()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
                command_line,
                memory_usage_bytes: process.memory(),
                thread_count: Self::thread_count(process),
            })
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn sleeper() -> Spawned<UnixHandle> {
            let backend = UnixBackend::new();
            let spec = SpawnSpec::builder()
                .command("sleep")
                .args(["30"])
                .build()
                .unwrap();
            backend.spawn(&spec).unwrap()
        }

        #[test]
        fn test_capture_includes_self() {
            let backend = UnixBackend::new();
            let snapshot = backend.capture().unwrap();
            assert!(snapshot.contains(std::process::id()));
        }

        #[test]
        fn test_open_pid_zero_is_invalid() {
            let backend = UnixBackend::new();
            let err = backend.open(0, AccessRights::QUERY).unwrap_err();
            assert!(matches!(err, ProcError::InvalidArgument(_)));
        }

        #[test]
        fn test_open_self() {
            let backend = UnixBackend::new();
            let mut handle = backend
                .open(std::process::id(), AccessRights::QUERY)
                .unwrap();
            assert!(handle.is_alive());
            handle.release();
            handle.release(); // idempotent
        }

        #[test]
        fn test_spawn_terminate_wait() {
            let backend = UnixBackend::new();
            let mut spawned = sleeper();
            assert!(spawned.handle.is_alive());

            let outcome = spawned
                .handle
                .wait_for_exit(Some(Duration::from_millis(80)))
                .unwrap();
            assert_eq!(outcome, WaitOutcome::TimedOut);

            backend.terminate(spawned.pid, 0).unwrap();
            let outcome = spawned
                .handle
                .wait_for_exit(Some(Duration::from_secs(5)))
                .unwrap();
            assert_eq!(outcome, WaitOutcome::Signaled);
            assert!(!spawned.handle.is_alive());

            // Safe to wait on an already-exited process.
            let outcome = spawned.handle.wait_for_exit(None).unwrap();
            assert_eq!(outcome, WaitOutcome::Signaled);
        }

        #[test]
        fn test_spawn_missing_binary_carries_os_code() {
            let backend = UnixBackend::new();
            let spec = SpawnSpec::new("/nonexistent/hostproc-no-such-binary");
            let err = backend.spawn(&spec).unwrap_err();
            let code = err.os_code().expect("spawn failure must carry a code");
            assert_ne!(code, 0);
        }

        #[test]
        fn test_spawn_empty_command_is_invalid() {
            let backend = UnixBackend::new();
            let err = backend.spawn(&SpawnSpec::default()).unwrap_err();
            assert!(matches!(err, ProcError::InvalidArgument(_)));
        }

        #[test]
        fn test_lower_priority_of_own_child() {
            let backend = UnixBackend::new();
            let mut spawned = sleeper();
            backend
                .set_priority(spawned.pid, PriorityClass::Idle)
                .unwrap();
            // Re-setting the same class is allowed.
            backend
                .set_priority(spawned.pid, PriorityClass::Idle)
                .unwrap();
            backend.terminate(spawned.pid, 0).unwrap();
            spawned.handle.wait_for_exit(None).unwrap();
        }

        #[test]
        fn test_query_info_self() {
            let backend = UnixBackend::new();
            let info = backend.query_info(std::process::id()).unwrap();
            assert_eq!(info.pid, std::process::id());
            assert!(!info.exe_path.is_empty());
            assert!(info.memory_usage_bytes > 0);
        }

        #[test]
        fn test_query_info_gone_pid_is_not_found() {
            let backend = UnixBackend::new();
            let mut spawned = sleeper();
            backend.terminate(spawned.pid, 0).unwrap();
            spawned.handle.wait_for_exit(None).unwrap();
            // The child is reaped, so its PID is no longer live.
            let err = backend.query_info(spawned.pid).unwrap_err();
            assert!(err.is_not_found());
        }
    }
}

#[cfg(unix)]
pub use unix_impl::{UnixBackend, UnixHandle};

// Compile-only stubs so the crate builds on non-Unix targets.
#[cfg(not(unix))]
pub struct UnixHandle;

#[cfg(not(unix))]
pub struct UnixBackend;

#[cfg(not(unix))]
impl UnixBackend {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(not(unix))]
impl Default for UnixBackend {
    fn default() -> Self {
        Self::new()
    }
}
