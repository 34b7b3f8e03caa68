//! Stateful hooks available to component bodies.
//!
//! Every hook binds to the component instance whose body is currently
//! executing and consumes the next positional slot of its [`HookStore`].
//! Calling a hook outside a body fails with [`HookError::NoActiveInstance`].
//!
//! [`HookStore`]: crate::slots::HookStore

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

use serde_json::Value;

use crate::error::HookError;
use crate::instance::{current_instance, WeakInstance};
use crate::renderer::RenderedNode;
use crate::slots::SlotKind;

/// Stable mutable cell returned by [`use_cell`].
///
/// The handle keeps its identity across re-renders, so code outside the
/// component can read or write `current` between passes.
pub struct CellHandle<T> {
    inner: Rc<RefCell<Option<T>>>,
}

/// Capability binding that receives the rendered node of a leaf.
pub type NodeRef = CellHandle<Rc<RenderedNode>>;

impl<T> CellHandle<T> {
    pub fn new(initial: Option<T>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(initial)),
        }
    }

    pub fn set(&self, value: Option<T>) {
        *self.inner.borrow_mut() = value;
    }

    pub fn replace(&self, value: T) -> Option<T> {
        self.inner.borrow_mut().replace(value)
    }

    pub fn take(&self) -> Option<T> {
        self.inner.borrow_mut().take()
    }

    pub fn with<R>(&self, f: impl FnOnce(Option<&T>) -> R) -> R {
        f(self.inner.borrow().as_ref())
    }

    pub fn is_set(&self) -> bool {
        self.inner.borrow().is_some()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: Clone> CellHandle<T> {
    pub fn current(&self) -> Option<T> {
        self.inner.borrow().clone()
    }
}

impl<T> Clone for CellHandle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> PartialEq for CellHandle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<T> Eq for CellHandle<T> {}

impl<T: fmt::Debug> fmt::Debug for CellHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CellHandle")
            .field("current", &*self.inner.borrow())
            .finish()
    }
}

enum StateUpdate<T> {
    Replace(T),
    Apply(Box<dyn FnOnce(&T) -> T>),
}

pub(crate) struct StateCell<T> {
    state: RefCell<T>,
    pending: RefCell<VecDeque<StateUpdate<T>>>,
}

impl<T> StateCell<T> {
    fn new(state: T) -> Self {
        Self {
            state: RefCell::new(state),
            pending: RefCell::new(VecDeque::new()),
        }
    }

    /// Applies queued updates in FIFO order.
    ///
    /// Each entry is popped before it runs so an updater may enqueue more
    /// work; that work is picked up by the same drain.
    fn drain(&self) {
        loop {
            let Some(update) = self.pending.borrow_mut().pop_front() else {
                break;
            };
            let next = match update {
                StateUpdate::Replace(value) => value,
                StateUpdate::Apply(apply) => apply(&*self.state.borrow()),
            };
            *self.state.borrow_mut() = next;
        }
    }

    fn pending_len(&self) -> usize {
        self.pending.borrow().len()
    }
}

/// Setter half of [`use_state`].
///
/// Updates are queued on the slot and the owning instance is flagged for
/// re-render; the state itself only changes when the owning component runs
/// again.
pub struct StateSetter<T> {
    cell: Weak<StateCell<T>>,
    instance: WeakInstance,
}

impl<T: 'static> StateSetter<T> {
    /// Queues a replacement value.
    pub fn set(&self, value: T) {
        self.enqueue(StateUpdate::Replace(value));
    }

    /// Queues an updater that receives the latest accumulated state.
    pub fn update(&self, apply: impl FnOnce(&T) -> T + 'static) {
        self.enqueue(StateUpdate::Apply(Box::new(apply)));
    }

    /// Number of updates waiting for the next invocation of the owner.
    pub fn pending(&self) -> usize {
        self.cell.upgrade().map_or(0, |cell| cell.pending_len())
    }

    fn enqueue(&self, update: StateUpdate<T>) {
        let Some(cell) = self.cell.upgrade() else {
            log::debug!("state update dropped: owning instance was unmounted");
            return;
        };
        cell.pending.borrow_mut().push_back(update);
        self.instance.request_rerender();
    }
}

impl<T> Clone for StateSetter<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Weak::clone(&self.cell),
            instance: self.instance.clone(),
        }
    }
}

impl<T> fmt::Debug for StateSetter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateSetter")
            .field("instance", &self.instance.id())
            .field("live", &(self.cell.strong_count() > 0))
            .finish()
    }
}

/// Dependency list of [`use_effect`].
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Deps {
    /// No list given: the effect re-runs on every invocation.
    #[default]
    Always,
    /// Positional values compared against the previous run.
    Values(Vec<Value>),
}

impl Deps {
    /// Empty list: the effect runs once per instance.
    pub fn once() -> Self {
        Deps::Values(Vec::new())
    }
}

/// Builds [`Deps::Values`] from anything convertible into a JSON value.
#[macro_export]
macro_rules! deps {
    () => {
        $crate::Deps::once()
    };
    ($($dep:expr),+ $(,)?) => {
        $crate::Deps::Values(::std::vec![$($crate::__private::serde_json::Value::from($dep)),+])
    };
}

/// Cleanup returned from an effect; runs before the next run of the same
/// effect and when the owning instance is unmounted.
#[derive(Default)]
pub struct EffectCleanup {
    cleanup: Option<Box<dyn FnOnce()>>,
}

impl EffectCleanup {
    pub fn new(cleanup: impl FnOnce() + 'static) -> Self {
        Self {
            cleanup: Some(Box::new(cleanup)),
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_set(&self) -> bool {
        self.cleanup.is_some()
    }

    pub(crate) fn run(self) {
        if let Some(cleanup) = self.cleanup {
            cleanup();
        }
    }
}

impl From<()> for EffectCleanup {
    fn from(_: ()) -> Self {
        Self::none()
    }
}

impl fmt::Debug for EffectCleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectCleanup")
            .field("set", &self.is_set())
            .finish()
    }
}

/// Returns the cell at the current slot, allocating it with `initial` on the
/// first invocation.
pub fn use_cell<T: 'static>(initial: Option<T>) -> Result<CellHandle<T>, HookError> {
    let instance = current_instance()?;
    let inner = instance
        .hooks_mut()
        .shared(SlotKind::Cell, || Rc::new(RefCell::new(initial)))?;
    Ok(CellHandle { inner })
}

/// Empty cell suitable as a leaf's capability binding.
pub fn use_node_ref() -> Result<NodeRef, HookError> {
    use_cell(None)
}

/// State hook seeded with a value.
pub fn use_state<T: Clone + 'static>(initial: T) -> Result<(T, StateSetter<T>), HookError> {
    use_state_with(move || initial)
}

/// State hook seeded lazily; `init` only runs when the slot is allocated.
///
/// Pending updates are drained on every call, including the allocating one.
pub fn use_state_with<T: Clone + 'static>(
    init: impl FnOnce() -> T,
) -> Result<(T, StateSetter<T>), HookError> {
    let instance = current_instance()?;
    let cell = instance
        .hooks_mut()
        .shared(SlotKind::State, || Rc::new(StateCell::new(init())))?;
    cell.drain();
    let value = cell.state.borrow().clone();
    let setter = StateSetter {
        cell: Rc::downgrade(&cell),
        instance: instance.downgrade(),
    };
    Ok((value, setter))
}

/// Runs `effect` during this invocation when `deps` call for it.
///
/// The previous cleanup runs first. The effect itself executes after the
/// slot has been released, so it may freely use state setters.
pub fn use_effect<F, C>(deps: Deps, effect: F) -> Result<(), HookError>
where
    F: FnOnce() -> C,
    C: Into<EffectCleanup>,
{
    let instance = current_instance()?;
    let (index, previous) = {
        let mut hooks = instance.hooks_mut();
        let (index, slot) = hooks.effect()?;
        if !slot.should_run(&deps) {
            return Ok(());
        }
        (index, slot.begin_run(&deps))
    };
    previous.run();
    let cleanup = effect().into();
    let orphaned = match instance.hooks_mut().effect_at(index) {
        Some(slot) => {
            slot.set_cleanup(cleanup);
            None
        }
        None => Some(cleanup),
    };
    // The instance was disposed while the effect ran.
    if let Some(cleanup) = orphaned {
        cleanup.run();
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/hooks_tests.rs"]
mod tests;
