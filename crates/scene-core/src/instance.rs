use std::cell::{RefCell, RefMut};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread_local;

use crate::error::{HookError, RenderError};
use crate::node::{Component, NodeDescription, Props};
use crate::runtime::RuntimeHandle;
use crate::slots::HookStore;

pub type InstanceId = usize;

static NEXT_INSTANCE_ID: AtomicUsize = AtomicUsize::new(1);

fn next_instance_id() -> InstanceId {
    NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed)
}

pub(crate) struct InstanceInner {
    id: InstanceId,
    component: Component,
    hooks: RefCell<HookStore>,
    last_produced: RefCell<Option<NodeDescription>>,
    runtime: RuntimeHandle,
}

/// Persistent state container for one registered component.
#[derive(Clone)]
pub struct ComponentInstance {
    inner: Rc<InstanceInner>,
}

impl ComponentInstance {
    pub(crate) fn new(component: Component, runtime: RuntimeHandle) -> Self {
        Self {
            inner: Rc::new(InstanceInner {
                id: next_instance_id(),
                component,
                hooks: RefCell::new(HookStore::new()),
                last_produced: RefCell::new(None),
                runtime,
            }),
        }
    }

    pub fn id(&self) -> InstanceId {
        self.inner.id
    }

    pub fn component(&self) -> &Component {
        &self.inner.component
    }

    /// Description returned by the most recent invocation of the body.
    pub fn last_produced(&self) -> Option<NodeDescription> {
        self.inner.last_produced.borrow().clone()
    }

    pub fn hook_count(&self) -> usize {
        self.inner.hooks.borrow().len()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Flags this instance for the next batched flush.
    pub fn request_rerender(&self) {
        self.inner
            .runtime
            .request_rerender(self.inner.id, self.downgrade());
    }

    pub(crate) fn hooks_mut(&self) -> RefMut<'_, HookStore> {
        self.inner.hooks.borrow_mut()
    }

    pub(crate) fn downgrade(&self) -> WeakInstance {
        WeakInstance {
            id: self.inner.id,
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub(crate) fn runtime(&self) -> RuntimeHandle {
        self.inner.runtime.clone()
    }

    /// Runs the component body with this instance installed as the active
    /// context and records the produced description.
    ///
    /// The context is popped when this returns, before the caller expands
    /// the result, and also when the body fails or panics.
    pub(crate) fn invoke(&self, props: &Props) -> Result<NodeDescription, RenderError> {
        let produced = {
            let _active = ActiveInstanceGuard::enter(self);
            self.inner.hooks.borrow_mut().reset();
            self.inner.component.invoke(props)
        };
        let produced = produced.map_err(|source| RenderError::Component {
            component: self.inner.component.name(),
            source,
        })?;
        *self.inner.last_produced.borrow_mut() = Some(produced.clone());
        Ok(produced)
    }

    /// Releases hook state, running outstanding effect cleanups in slot order.
    pub(crate) fn dispose(&self) {
        let cleanups = self.inner.hooks.borrow_mut().dispose();
        for cleanup in cleanups {
            cleanup.run();
        }
        self.inner.last_produced.borrow_mut().take();
    }
}

impl fmt::Debug for ComponentInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInstance")
            .field("id", &self.inner.id)
            .field("component", &self.inner.component.name())
            .field("hooks", &self.hook_count())
            .finish()
    }
}

#[derive(Clone)]
pub(crate) struct WeakInstance {
    id: InstanceId,
    inner: Weak<InstanceInner>,
}

impl WeakInstance {
    pub(crate) fn id(&self) -> InstanceId {
        self.id
    }

    pub(crate) fn upgrade(&self) -> Option<ComponentInstance> {
        self.inner
            .upgrade()
            .map(|inner| ComponentInstance { inner })
    }

    pub(crate) fn request_rerender(&self) {
        match self.upgrade() {
            Some(instance) => instance.request_rerender(),
            None => log::debug!("re-render request for dropped instance {}", self.id),
        }
    }
}

thread_local! {
    static ACTIVE_INSTANCES: RefCell<Vec<ComponentInstance>> = RefCell::new(Vec::new());
}

struct ActiveInstanceGuard;

impl ActiveInstanceGuard {
    fn enter(instance: &ComponentInstance) -> Self {
        ACTIVE_INSTANCES.with(|stack| stack.borrow_mut().push(instance.clone()));
        ActiveInstanceGuard
    }
}

impl Drop for ActiveInstanceGuard {
    fn drop(&mut self) {
        ACTIVE_INSTANCES.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// The instance whose body is executing on this thread.
pub(crate) fn current_instance() -> Result<ComponentInstance, HookError> {
    ACTIVE_INSTANCES
        .with(|stack| stack.borrow().last().cloned())
        .ok_or(HookError::NoActiveInstance)
}

/// Whether a component body is executing on this thread.
pub fn has_active_instance() -> bool {
    ACTIVE_INSTANCES.with(|stack| !stack.borrow().is_empty())
}

/// Defers `task` to the next cycle of the runtime that owns the active
/// instance. This is the component-side stand-in for a timer callback.
pub fn spawn_task(task: impl FnOnce() + 'static) -> Result<(), HookError> {
    let instance = current_instance()?;
    instance.runtime().spawn_task(Box::new(task));
    Ok(())
}
