//! Host integration for the render scheduler.
//!
//! The runtime never runs deferred work by itself. It tells the host that a
//! cycle is due and the host calls back into [`Runtime::run_cycle`] once the
//! current call stack has unwound.
//!
//! [`Runtime::run_cycle`]: crate::Runtime::run_cycle

/// Receives "a cycle is due" notifications from the runtime.
///
/// Implementations must be safe to share across threads so hosts can wake an
/// event loop from elsewhere.
pub trait RuntimeScheduler: Send + Sync {
    /// Request that the host run a scheduling cycle after the current turn.
    fn schedule_cycle(&self);
}
