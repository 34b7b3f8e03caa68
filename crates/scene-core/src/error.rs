//! Error taxonomy shared by the hook API, the renderer and the scheduler.

use thiserror::Error;

/// Failures raised by hook operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HookError {
    /// A hook ran while no component body was executing.
    #[error("hook called with no active component instance")]
    NoActiveInstance,
    /// The slot at `index` was allocated by a different hook kind or value type.
    ///
    /// This is what a conditional hook call looks like at runtime.
    #[error("hook slot {index} holds {found}, but {expected} was requested")]
    SlotMismatch {
        index: usize,
        expected: &'static str,
        found: &'static str,
    },
}

/// Failures that abort a render pass.
#[derive(Debug, Error)]
pub enum RenderError {
    /// A component body returned an error; the pass is abandoned as a whole.
    #[error("component `{component}` failed to render")]
    Component {
        component: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl RenderError {
    /// Returns the hook failure behind this error, if one caused it.
    pub fn hook_error(&self) -> Option<&HookError> {
        match self {
            RenderError::Component { source, .. } => source.downcast_ref::<HookError>(),
        }
    }
}

/// Dispatch problems that are reported but never propagated.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A flush fired while no renderer was registered with the runtime.
    #[error("flush requested but no renderer is registered")]
    SchedulerUnavailable,
    /// A tree-update subscriber failed; other subscribers still run.
    #[error("tree update subscriber {subscriber} failed")]
    Subscriber {
        subscriber: u64,
        #[source]
        source: anyhow::Error,
    },
}
