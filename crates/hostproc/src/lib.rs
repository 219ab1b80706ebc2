//! hostproc - process discovery, creation, control and introspection on a
//! single host.
//!
//! Every public operation captures a fresh point-in-time snapshot of the
//! process table, resolves its target against it, and then opens a handle
//! or walks descendants before acting. The re-query race windows (a process
//! exiting between snapshot and action) are explicit in the API: "already
//! gone" is a routine outcome, not a fault.
//!
//! ```no_run
//! use hostproc::ProcessManager;
//!
//! let manager = ProcessManager::new();
//! let pid = manager.exists("sshd").unwrap();
//! if pid != 0 {
//!     println!("sshd is running as {pid}");
//! }
//! ```

mod manager;

pub use hostproc_core::*;
pub use manager::{DEFAULT_POLL_INTERVAL, ProcessManager};

/// Backend for the compilation target.
#[cfg(unix)]
pub type PlatformBackend = hostproc_unix::UnixBackend;

#[cfg(windows)]
pub type PlatformBackend = hostproc_windows::WindowsBackend;

/// Platform name, for logging and diagnostics.
pub fn platform_name() -> &'static str {
    #[cfg(unix)]
    {
        hostproc_unix::UnixBackendFactory::platform_name()
    }
    #[cfg(windows)]
    {
        hostproc_windows::WindowsBackendFactory::platform_name()
    }
}

pub(crate) fn create_platform_backend() -> PlatformBackend {
    #[cfg(unix)]
    {
        hostproc_unix::UnixBackendFactory::create_backend()
    }
    #[cfg(windows)]
    {
        hostproc_windows::WindowsBackendFactory::create_backend()
    }
}
