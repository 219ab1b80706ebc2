//! Unix backend for hostproc.

mod unix_backend;

pub use unix_backend::{UnixBackend, UnixHandle};

pub struct UnixBackendFactory;

impl UnixBackendFactory {
    pub fn create_backend() -> UnixBackend {
        UnixBackend::new()
    }

    pub fn platform_name() -> &'static str {
        "Unix"
    }
}
