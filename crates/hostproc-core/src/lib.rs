//! hostproc core - platform-independent process model
//!
//! This crate provides the data model, target resolution, tree walking,
//! error types and backend traits shared by the platform-specific
//! implementations. Nothing in here touches the OS.

mod backend;
mod error;
mod info;
mod priority;
mod snapshot;
mod spawn;
mod target;
mod tree;

pub use backend::*;
pub use error::*;
pub use info::*;
pub use priority::*;
pub use snapshot::*;
pub use spawn::*;
pub use target::*;
