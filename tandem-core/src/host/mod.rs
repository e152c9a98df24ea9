//! Component Host
//!
//! A minimal render-callback host in the style of React. Components are
//! plain closures that run once per render; state that must survive between
//! renders lives in hook slots on the component's instance.
//!
//! The host supplies what the bridge needs from a component framework:
//!
//! - identity-stable storage ([`use_ref`], [`use_memo`])
//! - a mount effect with an unmount teardown ([`use_mount_effect`],
//!   [`use_unmount`])
//! - an external-store subscription that forces re-renders
//!   ([`use_sync_external_store`])
//!
//! Re-renders are requested by hooks and performed by [`Host::flush`].

mod hooks;
mod instance;
mod renderer;
mod runtime;
mod store;

pub use hooks::{
    is_rendering, use_memo, use_mount_effect, use_ref, use_sync_external_store, use_unmount,
};
pub use instance::{InstanceId, Teardown};
pub use renderer::Mounted;
pub use runtime::Host;
pub use store::{ExternalStore, Notify, Unsubscribe};

pub(crate) use instance::Instance;
