#![doc = r"Core runtime for hook-based scene components: positional hook slots, a batching re-render scheduler and the tree renderer."]

pub mod collections;
pub mod error;
pub mod hash;
pub mod hooks;
pub mod instance;
pub mod node;
pub mod platform;
pub mod renderer;
pub mod runtime;
pub mod slots;

pub use error::{DispatchError, HookError, RenderError};
pub use hooks::{
    use_cell, use_effect, use_node_ref, use_state, use_state_with, CellHandle, Deps,
    EffectCleanup, NodeRef, StateSetter,
};
pub use instance::{has_active_instance, spawn_task, ComponentInstance, InstanceId};
pub use node::{
    build_node, Child, Component, ComponentId, NodeBuilder, NodeDescription, NodeKind, Props,
};
pub use platform::RuntimeScheduler;
pub use renderer::{
    mount, LogContainer, MountHandle, RenderedNode, Renderer, SceneContainer, SubscriptionId,
};
pub use runtime::{DefaultScheduler, FlushOutcome, FlushTarget, Runtime, RuntimeHandle};
pub use slots::HookStore;

#[cfg(test)]
pub use runtime::TestScheduler;

pub type Key = u64;

#[doc(hidden)]
pub mod __private {
    pub use serde_json;
}
