//! Windows backend for hostproc.

mod windows_backend;

pub use windows_backend::{WindowsBackend, WindowsHandle};

pub struct WindowsBackendFactory;

impl WindowsBackendFactory {
    pub fn create_backend() -> WindowsBackend {
        WindowsBackend::new()
    }

    pub fn platform_name() -> &'static str {
        "Windows"
    }
}
