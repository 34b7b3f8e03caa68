use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use crate::collections::IndexMap;
use crate::error::{DispatchError, RenderError};
use crate::instance::{InstanceId, WeakInstance};
use crate::platform::RuntimeScheduler;
use crate::renderer::RenderedNode;

type Task = Box<dyn FnOnce() + 'static>;

/// Whatever the scheduler re-expands when a flush fires.
pub trait FlushTarget {
    /// Re-expand the root and notify subscribers.
    fn force_update(&self) -> Result<Option<Rc<RenderedNode>>, RenderError>;
}

/// Result of one flush attempt.
#[derive(Clone, Debug)]
pub enum FlushOutcome {
    /// Nothing was armed.
    Idle,
    /// A batch was pending but no renderer was registered.
    NoRenderer { batch: usize },
    /// The renderer re-expanded the tree.
    Rendered {
        batch: usize,
        tree: Option<Rc<RenderedNode>>,
    },
}

impl FlushOutcome {
    pub fn is_idle(&self) -> bool {
        matches!(self, FlushOutcome::Idle)
    }

    pub fn tree(&self) -> Option<&Rc<RenderedNode>> {
        match self {
            FlushOutcome::Rendered { tree, .. } => tree.as_ref(),
            _ => None,
        }
    }
}

struct RuntimeInner {
    scheduler: Arc<dyn RuntimeScheduler>,
    flush_armed: Cell<bool>,
    pending: RefCell<IndexMap<InstanceId, WeakInstance>>,
    tasks: RefCell<VecDeque<Task>>,
    target: RefCell<Option<Weak<dyn FlushTarget>>>,
    flushes: Cell<u64>,
}

impl RuntimeInner {
    fn new(scheduler: Arc<dyn RuntimeScheduler>) -> Self {
        Self {
            scheduler,
            flush_armed: Cell::new(false),
            pending: RefCell::new(IndexMap::new()),
            tasks: RefCell::new(VecDeque::new()),
            target: RefCell::new(None),
            flushes: Cell::new(0),
        }
    }

    fn request_rerender(&self, id: InstanceId, instance: WeakInstance) {
        self.pending.borrow_mut().insert(id, instance);
        if !self.flush_armed.replace(true) {
            log::trace!("flush armed by instance {id}");
            self.scheduler.schedule_cycle();
        }
    }

    fn cancel_rerender(&self, id: InstanceId) {
        self.pending.borrow_mut().shift_remove(&id);
    }

    fn enqueue_task(&self, task: Task) {
        self.tasks.borrow_mut().push_back(task);
        self.scheduler.schedule_cycle();
    }

    /// Runs the tasks queued before this call; tasks they spawn wait for the
    /// next cycle.
    fn drain_tasks(&self) -> usize {
        let tasks: Vec<Task> = self.tasks.borrow_mut().drain(..).collect();
        let count = tasks.len();
        for task in tasks {
            task();
        }
        count
    }

    fn flush(&self) -> Result<FlushOutcome, RenderError> {
        if !self.flush_armed.get() {
            return Ok(FlushOutcome::Idle);
        }
        let batch = std::mem::take(&mut *self.pending.borrow_mut());
        self.flush_armed.set(false);
        self.flushes.set(self.flushes.get() + 1);

        if log::log_enabled!(log::Level::Debug) {
            let names: Vec<&'static str> = batch
                .values()
                .filter_map(WeakInstance::upgrade)
                .map(|instance| instance.component().name())
                .collect();
            log::debug!("flushing batch of {} instance(s): {names:?}", batch.len());
        }

        let target = self.target.borrow().as_ref().and_then(Weak::upgrade);
        let Some(target) = target else {
            log::error!("{}", DispatchError::SchedulerUnavailable);
            return Ok(FlushOutcome::NoRenderer { batch: batch.len() });
        };
        let tree = target.force_update()?;
        Ok(FlushOutcome::Rendered {
            batch: batch.len(),
            tree,
        })
    }
}

/// Batching render scheduler shared by every instance of one renderer.
///
/// Any number of re-render requests issued before the next cycle collapse
/// into a single flush, and every flush re-expands from the root.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Runtime {
    pub fn new(scheduler: Arc<dyn RuntimeScheduler>) -> Self {
        Self {
            inner: Rc::new(RuntimeInner::new(scheduler)),
        }
    }

    pub fn handle(&self) -> RuntimeHandle {
        RuntimeHandle(Rc::downgrade(&self.inner))
    }

    /// Registers the renderer that flushes re-expand. Replaces any previous one.
    pub fn set_flush_target(&self, target: Weak<dyn FlushTarget>) {
        *self.inner.target.borrow_mut() = Some(target);
    }

    pub fn clear_flush_target(&self) {
        self.inner.target.borrow_mut().take();
    }

    pub fn has_flush_target(&self) -> bool {
        self.inner
            .target
            .borrow()
            .as_ref()
            .is_some_and(|target| target.strong_count() > 0)
    }

    pub fn is_flush_armed(&self) -> bool {
        self.inner.flush_armed.get()
    }

    /// Number of distinct instances waiting for the armed flush.
    pub fn pending_len(&self) -> usize {
        self.inner.pending.borrow().len()
    }

    pub fn has_pending_tasks(&self) -> bool {
        !self.inner.tasks.borrow().is_empty()
    }

    pub fn has_pending_work(&self) -> bool {
        self.is_flush_armed() || self.has_pending_tasks()
    }

    /// Total flushes performed, including ones without a renderer.
    pub fn flush_count(&self) -> u64 {
        self.inner.flushes.get()
    }

    pub fn spawn_task(&self, task: impl FnOnce() + 'static) {
        self.inner.enqueue_task(Box::new(task));
    }

    pub fn drain_tasks(&self) -> usize {
        self.inner.drain_tasks()
    }

    /// Performs the armed flush immediately, if any.
    pub fn flush_now(&self) -> Result<FlushOutcome, RenderError> {
        self.inner.flush()
    }

    /// One scheduling cycle: deferred tasks first, then at most one flush.
    pub fn run_cycle(&self) -> Result<FlushOutcome, RenderError> {
        self.inner.drain_tasks();
        self.inner.flush()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("flush_armed", &self.inner.flush_armed.get())
            .field("pending", &self.inner.pending.borrow().len())
            .field("tasks", &self.inner.tasks.borrow().len())
            .field("flushes", &self.inner.flushes.get())
            .finish()
    }
}

#[derive(Default)]
pub struct DefaultScheduler;

impl RuntimeScheduler for DefaultScheduler {
    fn schedule_cycle(&self) {}
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(Arc::new(DefaultScheduler))
    }
}

#[derive(Clone)]
pub struct RuntimeHandle(pub(crate) Weak<RuntimeInner>);

impl RuntimeHandle {
    pub fn upgrade(&self) -> Option<Runtime> {
        self.0.upgrade().map(|inner| Runtime { inner })
    }

    pub(crate) fn request_rerender(&self, id: InstanceId, instance: WeakInstance) {
        if let Some(inner) = self.0.upgrade() {
            inner.request_rerender(id, instance);
        }
    }

    pub(crate) fn cancel_rerender(&self, id: InstanceId) {
        if let Some(inner) = self.0.upgrade() {
            inner.cancel_rerender(id);
        }
    }

    /// Queues `task` for the next cycle. Once the runtime is released the
    /// task is dropped unrun.
    pub fn spawn_task(&self, task: Box<dyn FnOnce() + 'static>) {
        match self.0.upgrade() {
            Some(inner) => inner.enqueue_task(task),
            None => log::debug!("deferred task dropped: runtime was released"),
        }
    }

    pub fn is_flush_armed(&self) -> bool {
        self.0
            .upgrade()
            .map(|inner| inner.flush_armed.get())
            .unwrap_or(false)
    }
}

#[cfg(test)]
#[derive(Default)]
pub struct TestScheduler {
    cycles: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl TestScheduler {
    pub fn requested_cycles(&self) -> usize {
        self.cycles.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl RuntimeScheduler for TestScheduler {
    fn schedule_cycle(&self) {
        self.cycles
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(test)]
#[path = "tests/runtime_tests.rs"]
mod tests;
