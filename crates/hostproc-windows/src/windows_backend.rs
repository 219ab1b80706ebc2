#[cfg(windows)]
mod windows_impl {
    use hostproc_core::{
        AccessRights, FALLBACK_OS_CODE, Pid, PriorityClass, ProcError, ProcessBackend,
        ProcessHandle, ProcessInfo, ProcessRecord, Snapshot, SpawnSpec, Spawned, WaitOutcome,
    };
    use std::os::windows::process::CommandExt;
    use std::process::{Child, Command};
    use std::time::Duration;
    use sysinfo::System;
    use tracing::{debug, info, warn};
    use windows::Win32::Foundation::{
        CloseHandle, ERROR_ACCESS_DENIED, ERROR_INVALID_PARAMETER, ERROR_NO_TOKEN, HANDLE,
        WAIT_OBJECT_0, WAIT_TIMEOUT,
    };
    use windows::Win32::Security::{
        DuplicateTokenEx, SecurityIdentification, TOKEN_ALL_ACCESS, TokenPrimary,
    };
    use windows::Win32::System::Environment::{CreateEnvironmentBlock, DestroyEnvironmentBlock};
    use windows::Win32::System::RemoteDesktop::{
        WTSGetActiveConsoleSessionId, WTSQueryUserToken,
    };
    use windows::Win32::System::Threading::{
        ABOVE_NORMAL_PRIORITY_CLASS, BELOW_NORMAL_PRIORITY_CLASS, CREATE_UNICODE_ENVIRONMENT,
        CreateProcessAsUserW, HIGH_PRIORITY_CLASS, IDLE_PRIORITY_CLASS, INFINITE,
        NORMAL_PRIORITY_CLASS, OpenProcess, PROCESS_ACCESS_RIGHTS, PROCESS_INFORMATION,
        PROCESS_QUERY_LIMITED_INFORMATION, PROCESS_SET_INFORMATION, PROCESS_SYNCHRONIZE,
        PROCESS_TERMINATE, REALTIME_PRIORITY_CLASS, STARTF_USESHOWWINDOW, STARTUPINFOW,
        SetPriorityClass, TerminateProcess, WaitForSingleObject,
    };
    use windows::core::PWSTR;

    // CREATE_NO_WINDOW, for background children without a console popup.
    const CREATE_NO_WINDOW: u32 = 0x0800_0000;

    fn win32_code(err: &windows::core::Error) -> i32 {
        let code = (err.code().0 & 0xFFFF) as i32;
        if code == 0 { FALLBACK_OS_CODE } else { code }
    }

    fn open_error(context: &str, err: windows::core::Error) -> ProcError {
        let code = win32_code(&err);
        if code == ERROR_ACCESS_DENIED.0 as i32 {
            ProcError::AccessDenied
        } else if code == ERROR_INVALID_PARAMETER.0 as i32 {
            // OpenProcess reports a dead PID as an invalid parameter.
            ProcError::NotFound
        } else {
            ProcError::platform(code, format!("{context}: {err}"))
        }
    }

    /// Windows process handle: an owned OS handle for opened processes, or
    /// the spawned child itself.
    pub struct WindowsHandle {
        pid: Pid,
        access: AccessRights,
        child: Option<Child>,
        raw: Option<HANDLE>,
        released: bool,
    }

    impl WindowsHandle {
        fn opened(pid: Pid, access: AccessRights, raw: HANDLE) -> Self {
            Self {
                pid,
                access,
                child: None,
                raw: Some(raw),
                released: false,
            }
        }

        fn from_child(child: Child, access: AccessRights) -> Self {
            Self {
                pid: child.id(),
                access,
                child: Some(child),
                raw: None,
                released: false,
            }
        }

        fn wait_raw(&self, raw: HANDLE, timeout: Option<Duration>) -> Result<WaitOutcome, ProcError> {
            let millis = timeout
                .map(|t| t.as_millis().min(u128::from(INFINITE - 1)) as u32)
                .unwrap_or(INFINITE);
            let event = unsafe { WaitForSingleObject(raw, millis) };
            if event == WAIT_OBJECT_0 {
                Ok(WaitOutcome::Signaled)
            } else if event == WAIT_TIMEOUT {
                Ok(WaitOutcome::TimedOut)
            } else {
                let err = windows::core::Error::from_win32();
                Err(ProcError::platform(
                    win32_code(&err),
                    format!("wait on pid {} failed: {err}", self.pid),
                ))
            }
        }
    }

    impl ProcessHandle for WindowsHandle {
        fn pid(&self) -> Pid {
            self.pid
        }

        fn access(&self) -> AccessRights {
            self.access
        }

        fn is_alive(&mut self) -> bool {
            if let Some(child) = self.child.as_mut() {
                return matches!(child.try_wait(), Ok(None));
            }
            match self.raw {
                Some(raw) => matches!(
                    self.wait_raw(raw, Some(Duration::ZERO)),
                    Ok(WaitOutcome::TimedOut)
                ),
                None => false,
            }
        }

        fn wait_for_exit(&mut self, timeout: Option<Duration>) -> Result<WaitOutcome, ProcError> {
            if let Some(child) = self.child.as_mut() {
                let deadline = timeout.map(|t| std::time::Instant::now() + t);
                loop {
                    match child.try_wait() {
                        Ok(Some(_)) => return Ok(WaitOutcome::Signaled),
                        Ok(None) => {}
                        Err(e) => return Err(ProcError::from(e)),
                    }
                    match deadline {
                        Some(deadline) => {
                            let now = std::time::Instant::now();
                            if now >= deadline {
                                return Ok(WaitOutcome::TimedOut);
                            }
                            std::thread::sleep(Duration::from_millis(20).min(deadline - now));
                        }
                        None => std::thread::sleep(Duration::from_millis(20)),
                    }
                }
            }
            match self.raw {
                Some(raw) => self.wait_raw(raw, timeout),
                // Released already; the process was given away, treat as gone.
                None => Ok(WaitOutcome::Signaled),
            }
        }

        fn release(&mut self) {
            if self.released {
                return;
            }
            self.released = true;
            if let Some(mut child) = self.child.take() {
                let _ = child.try_wait();
            }
            if let Some(raw) = self.raw.take() {
                unsafe {
                    let _ = CloseHandle(raw);
                }
            }
        }
    }

    impl Drop for WindowsHandle {
        fn drop(&mut self) {
            self.release();
        }
    }

    /// Windows backend: sysinfo for enumeration and queries, Win32 process
    /// APIs for handles and control.
    pub struct WindowsBackend {
        system: std::sync::Mutex<System>,
    }

    impl WindowsBackend {
        pub fn new() -> Self {
            debug!("initializing Windows process backend");
            Self {
                system: std::sync::Mutex::new(System::new_all()),
            }
        }

        fn access_mask(access: AccessRights) -> PROCESS_ACCESS_RIGHTS {
            let mut mask = PROCESS_ACCESS_RIGHTS(0);
            if access.contains(AccessRights::QUERY) {
                mask |= PROCESS_QUERY_LIMITED_INFORMATION;
            }
            if access.contains(AccessRights::TERMINATE) {
                mask |= PROCESS_TERMINATE;
            }
            if access.contains(AccessRights::SET_INFORMATION) {
                mask |= PROCESS_SET_INFORMATION;
            }
            if access.contains(AccessRights::SYNCHRONIZE) {
                mask |= PROCESS_SYNCHRONIZE;
            }
            mask
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
            if spec.show_mode == hostproc_core::ShowMode::Hidden {
                cmd.creation_flags(CREATE_NO_WINDOW);
            }
            Ok(cmd)
        }

        fn wide(text: &str) -> Vec<u16> {
            text.encode_utf16().chain(std::iter::once(0)).collect()
        }
    }

    impl Default for WindowsBackend {
        fn default() -> Self {
            Self::new()
        }
    }

    impl ProcessBackend for WindowsBackend {
        type Handle = WindowsHandle;

        fn capture(&self) -> Result<Snapshot, ProcError> {
            let mut system = self.system.lock().unwrap();
            system.refresh_processes_specifics(
                sysinfo::ProcessesToUpdate::All,
                true,
                sysinfo::ProcessRefreshKind::everything(),
            );
            let mut records = Vec::with_capacity(system.processes().len());
            for (pid, process) in system.processes() {
                records.push(ProcessRecord {
                    pid: pid.as_u32(),
                    parent_pid: process.parent().map(|p| p.as_u32()).unwrap_or(0),
                    name: process.name().to_string_lossy().into_owned(),
                });
            }
            Ok(Snapshot::from_records(records))
        }

        fn open(&self, pid: Pid, access: AccessRights) -> Result<WindowsHandle, ProcError> {
            if pid == 0 {
                return Err(ProcError::invalid("pid 0 cannot be opened"));
            }
            let raw = unsafe { OpenProcess(Self::access_mask(access), false, pid) }
                .map_err(|e| open_error("OpenProcess failed", e))?;
            Ok(WindowsHandle::opened(pid, access, raw))
        }

        fn spawn(&self, spec: &SpawnSpec) -> Result<Spawned<WindowsHandle>, ProcError> {
            let mut cmd = Self::build_command(spec)?;
            let child = cmd.spawn().map_err(|e| {
                ProcError::platform(
                    e.raw_os_error().unwrap_or(FALLBACK_OS_CODE),
                    format!("spawn failed: {e}"),
                )
            })?;
            let pid = child.id();
            info!(pid = %pid, command = %spec.command, "spawned process");
            Ok(Spawned {
                pid,
                handle: WindowsHandle::from_child(child, AccessRights::all()),
            })
        }

        fn spawn_elevated(&self, spec: &SpawnSpec) -> Result<Spawned<WindowsHandle>, ProcError> {
            if spec.command.is_empty() {
                return Err(ProcError::invalid("empty command"));
            }

            // Start the process with the token of the active console
            // session, the way service-hosted launchers do. Each step fails
            // with a permission/token code when the caller is not privileged
            // (ERROR_ACCESS_DENIED, ERROR_NO_TOKEN, ERROR_PRIVILEGE_NOT_HELD),
            // and that code is surfaced verbatim.
            unsafe {
                let session_id = WTSGetActiveConsoleSessionId();
                if session_id == u32::MAX {
                    return Err(ProcError::platform(
                        ERROR_NO_TOKEN.0 as i32,
                        "no active console session",
                    ));
                }

                let mut user_token = HANDLE::default();
                WTSQueryUserToken(session_id, &mut user_token).map_err(|e| {
                    warn!(error = %e, "WTSQueryUserToken failed");
                    ProcError::platform(win32_code(&e), format!("WTSQueryUserToken failed: {e}"))
                })?;

                let mut primary_token = HANDLE::default();
                let duplicated = DuplicateTokenEx(
                    user_token,
                    TOKEN_ALL_ACCESS,
                    None,
                    SecurityIdentification,
                    TokenPrimary,
                    &mut primary_token,
                );
                let _ = CloseHandle(user_token);
                duplicated.map_err(|e| {
                    ProcError::platform(win32_code(&e), format!("DuplicateTokenEx failed: {e}"))
                })?;

                let mut env_block: *mut core::ffi::c_void = core::ptr::null_mut();
                if let Err(e) = CreateEnvironmentBlock(&mut env_block, Some(primary_token), false) {
                    let _ = CloseHandle(primary_token);
                    return Err(ProcError::platform(
                        win32_code(&e),
                        format!("CreateEnvironmentBlock failed: {e}"),
                    ));
                }

                let mut command_line = Self::wide(&format!(
                    "{} {}",
                    spec.command,
                    spec.args.join(" ")
                ));
                let working_dir = spec
                    .working_dir
                    .as_ref()
                    .map(|d| Self::wide(&d.display().to_string()));
                let mut desktop = Self::wide("winsta0\\default");

                let mut startup = STARTUPINFOW::default();
                startup.cb = std::mem::size_of::<STARTUPINFOW>() as u32;
                startup.dwFlags = STARTF_USESHOWWINDOW;
                startup.wShowWindow = match spec.show_mode {
                    hostproc_core::ShowMode::Hidden => 0,
                    hostproc_core::ShowMode::Normal => 1,
                    hostproc_core::ShowMode::Minimized => 2,
                    hostproc_core::ShowMode::Maximized => 3,
                };
                startup.lpDesktop = PWSTR(desktop.as_mut_ptr());

                let mut proc_info = PROCESS_INFORMATION::default();
                let created = CreateProcessAsUserW(
                    Some(primary_token),
                    None,
                    Some(PWSTR(command_line.as_mut_ptr())),
                    None,
                    None,
                    false,
                    CREATE_UNICODE_ENVIRONMENT,
                    Some(env_block),
                    working_dir
                        .as_ref()
                        .map(|d| windows::core::PCWSTR(d.as_ptr()))
                        .unwrap_or(windows::core::PCWSTR::null()),
                    &startup,
                    &mut proc_info,
                );

                let _ = DestroyEnvironmentBlock(env_block);
                let _ = CloseHandle(primary_token);

                created.map_err(|e| {
                    warn!(error = %e, "CreateProcessAsUserW failed");
                    ProcError::platform(
                        win32_code(&e),
                        format!("CreateProcessAsUserW failed: {e}"),
                    )
                })?;

                let _ = CloseHandle(proc_info.hThread);
                info!(pid = %proc_info.dwProcessId, command = %spec.command, "spawned elevated process");
                Ok(Spawned {
                    pid: proc_info.dwProcessId,
                    handle: WindowsHandle::opened(
                        proc_info.dwProcessId,
                        AccessRights::all(),
                        proc_info.hProcess,
                    ),
                })
            }
        }

        fn terminate(&self, pid: Pid, exit_code: u32) -> Result<(), ProcError> {
            if pid == 0 {
                return Err(ProcError::invalid("pid 0 cannot be terminated"));
            }
            let raw = unsafe { OpenProcess(PROCESS_TERMINATE, false, pid) }
                .map_err(|e| open_error("OpenProcess for terminate failed", e))?;
            let result = unsafe { TerminateProcess(raw, exit_code) };
            unsafe {
                let _ = CloseHandle(raw);
            }
            result.map_err(|e| {
                warn!(pid = %pid, error = %e, "TerminateProcess failed");
                ProcError::platform(win32_code(&e), format!("TerminateProcess failed: {e}"))
            })?;
            info!(pid = %pid, exit_code = %exit_code, "terminated process");
            Ok(())
        }

        fn set_priority(&self, pid: Pid, class: PriorityClass) -> Result<(), ProcError> {
            if pid == 0 {
                return Err(ProcError::invalid("pid 0 cannot be reprioritized"));
            }
            let priority_class = match class {
                PriorityClass::Idle => IDLE_PRIORITY_CLASS,
                PriorityClass::BelowNormal => BELOW_NORMAL_PRIORITY_CLASS,
                PriorityClass::Normal => NORMAL_PRIORITY_CLASS,
                PriorityClass::AboveNormal => ABOVE_NORMAL_PRIORITY_CLASS,
                PriorityClass::High => HIGH_PRIORITY_CLASS,
                PriorityClass::Realtime => REALTIME_PRIORITY_CLASS,
            };
            let raw = unsafe { OpenProcess(PROCESS_SET_INFORMATION, false, pid) }
                .map_err(|e| open_error("OpenProcess for set_priority failed", e))?;
            let result = unsafe { SetPriorityClass(raw, priority_class) };
            unsafe {
                let _ = CloseHandle(raw);
            }
            result.map_err(|e| {
                ProcError::platform(win32_code(&e), format!("SetPriorityClass failed: {e}"))
            })?;
            info!(pid = %pid, class = ?class, "priority set");
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
                thread_count: 0,
            })
        }
    }
}

#[cfg(windows)]
pub use windows_impl::{WindowsBackend, WindowsHandle};

// Compile-only stubs so the crate builds on non-Windows targets.
#[cfg(not(windows))]
pub struct WindowsHandle;

#[cfg(not(windows))]
pub struct WindowsBackend;

#[cfg(not(windows))]
impl WindowsBackend {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(not(windows))]
impl Default for WindowsBackend {
    fn default() -> Self {
        Self::new()
    }
}
