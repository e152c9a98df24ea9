//! Placement of bridged primitives.
//!
//! Every bridged primitive asks the same question before creating anything:
//! who will own it?

use std::fmt;

use super::mode;
use crate::host::{Instance, InstanceId};

/// Where a primitive created right now belongs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Inside a tracked scope. The running computation owns it.
    Tracked,
    /// Rendering a component. It lives as long as the instance.
    Host(InstanceId),
    /// Neither. It is created natively, like a module-level primitive.
    Detached,
}

impl Placement {
    pub fn current() -> Self {
        if mode::is_tracked() {
            return Placement::Tracked;
        }
        match Instance::current() {
            Some(instance) => Placement::Host(instance.id()),
            None => Placement::Detached,
        }
    }

    /// Whether the engine's own constructor should be used as is.
    pub fn is_native(self) -> bool {
        !matches!(self, Placement::Host(_))
    }

    pub(crate) fn log_creation(self, primitive: &'static str) {
        match self {
            Placement::Tracked => tracing::trace!(primitive, "created in tracked scope"),
            Placement::Detached => {
                tracing::debug!(primitive, "no tracked scope or rendering component; created natively")
            }
            Placement::Host(instance) => {
                tracing::trace!(primitive, %instance, "created for component")
            }
        }
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Placement::Tracked => write!(f, "tracked"),
            Placement::Host(instance) => write!(f, "host({instance})"),
            Placement::Detached => write!(f, "detached"),
        }
    }
}
