//! Errors reported by the component host.
//!
//! The bridge itself has no error channel: its invariants hold by
//! construction. What can fail is driving the host: rendering an instance
//! that is gone, or a component body that panics.

use thiserror::Error;

use crate::host::InstanceId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("{0} has been unmounted")]
    Unmounted(InstanceId),
    #[error("{0} is not mounted on this host")]
    UnknownInstance(InstanceId),
    #[error("render of {id} panicked: {message}")]
    RenderPanicked { id: InstanceId, message: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
