//! Host-side driver for the `scene-core` render scheduler.
//!
//! The core runtime arms at most one flush per batch of re-render requests and
//! asks its scheduler for a cycle whenever a flush is armed or a deferred task
//! is queued. [`StdScheduler`] turns those requests into a flag the host can
//! poll, plus an optional waker for hosts that sleep between cycles. Each
//! [`StdRuntime::run_cycle`] drains the tasks queued so far and then performs
//! the armed flush; [`StdRuntime::run_until_idle`] repeats that until nothing
//! is left or the cycle limit is hit.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use scene_core::{FlushOutcome, RenderError, Runtime, RuntimeHandle, RuntimeScheduler};

/// Cycle limit used by [`StdRuntime::run_until_idle_default`].
pub const DEFAULT_MAX_CYCLES: usize = 1_000;

type Waker = Arc<dyn Fn() + Send + Sync + 'static>;

/// Records cycle requests from the core runtime.
///
/// Requests collapse: any number of `schedule_cycle` calls between two
/// [`take_cycle_request`](Self::take_cycle_request) calls read as one.
pub struct StdScheduler {
    cycle_requested: AtomicBool,
    cycle_waker: RwLock<Option<Waker>>,
}

impl StdScheduler {
    pub fn new() -> Self {
        Self {
            cycle_requested: AtomicBool::new(false),
            cycle_waker: RwLock::new(None),
        }
    }

    /// Clears the pending request, returning whether one was set. A host loop
    /// calls `run_cycle` when this is true.
    pub fn take_cycle_request(&self) -> bool {
        self.cycle_requested.swap(false, Ordering::SeqCst)
    }

    /// Registers a callback fired on every cycle request, for hosts that
    /// block between cycles. Replaces any previous waker.
    pub fn set_cycle_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        match self.cycle_waker.write() {
            Ok(mut slot) => *slot = Some(Arc::new(waker)),
            Err(poisoned) => *poisoned.into_inner() = Some(Arc::new(waker)),
        }
    }

    pub fn clear_cycle_waker(&self) {
        match self.cycle_waker.write() {
            Ok(mut slot) => *slot = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }

    fn wake(&self) {
        let waker = match self.cycle_waker.read() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        if let Some(waker) = waker {
            waker();
        }
    }
}

impl Default for StdScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StdScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdScheduler")
            .field(
                "cycle_requested",
                &self.cycle_requested.load(Ordering::SeqCst),
            )
            .finish()
    }
}

impl RuntimeScheduler for StdScheduler {
    fn schedule_cycle(&self) {
        self.cycle_requested.store(true, Ordering::SeqCst);
        self.wake();
    }
}

/// What [`StdRuntime::run_until_idle`] did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IdleReport {
    /// Scheduling cycles executed.
    pub cycles: usize,
    /// Cycles that ended in a flush.
    pub flushes: usize,
    /// False when the cycle limit stopped the loop with work still queued.
    pub settled: bool,
}

/// Convenience container bundling the standard scheduler with a runtime.
#[derive(Clone)]
pub struct StdRuntime {
    scheduler: Arc<StdScheduler>,
    runtime: Runtime,
}

impl StdRuntime {
    pub fn new() -> Self {
        let scheduler = Arc::new(StdScheduler::default());
        let runtime = Runtime::new(scheduler.clone());
        Self { scheduler, runtime }
    }

    /// Returns a [`scene_core::Runtime`] configured with the standard scheduler.
    pub fn runtime(&self) -> Runtime {
        self.runtime.clone()
    }

    pub fn runtime_handle(&self) -> RuntimeHandle {
        self.runtime.handle()
    }

    pub fn scheduler(&self) -> Arc<StdScheduler> {
        Arc::clone(&self.scheduler)
    }

    /// Returns whether a cycle was requested since the last poll.
    pub fn take_cycle_request(&self) -> bool {
        self.scheduler.take_cycle_request()
    }

    pub fn set_cycle_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        self.scheduler.set_cycle_waker(waker);
    }

    pub fn clear_cycle_waker(&self) {
        self.scheduler.clear_cycle_waker();
    }

    /// Runs one cycle: queued tasks, then the armed flush if there is one.
    pub fn run_cycle(&self) -> Result<FlushOutcome, RenderError> {
        self.scheduler.take_cycle_request();
        self.runtime.run_cycle()
    }

    /// Runs cycles until no task or flush is pending, or `max_cycles` is hit.
    ///
    /// Components that keep scheduling work forever stop at the limit with a
    /// warning instead of spinning.
    pub fn run_until_idle(&self, max_cycles: usize) -> Result<IdleReport, RenderError> {
        let mut report = IdleReport::default();
        while self.runtime.has_pending_work() {
            if report.cycles == max_cycles {
                log::warn!(
                    "scene still busy after {max_cycles} cycle(s); {} instance(s) pending",
                    self.runtime.pending_len()
                );
                return Ok(report);
            }
            let outcome = self.run_cycle()?;
            report.cycles += 1;
            if !outcome.is_idle() {
                report.flushes += 1;
            }
        }
        report.settled = true;
        log::debug!(
            "scene settled after {} cycle(s) and {} flush(es)",
            report.cycles,
            report.flushes
        );
        Ok(report)
    }

    pub fn run_until_idle_default(&self) -> Result<IdleReport, RenderError> {
        self.run_until_idle(DEFAULT_MAX_CYCLES)
    }
}

impl fmt::Debug for StdRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdRuntime")
            .field("scheduler", &self.scheduler)
            .field("runtime", &self.runtime)
            .finish()
    }
}

impl Default for StdRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use serde_json::json;

    use scene_core::{
        deps, mount, spawn_task, use_effect, use_state, Component, LogContainer, NodeDescription,
        StateSetter,
    };

    use super::StdRuntime;

    fn hosted(component: &Component) -> NodeDescription {
        let component = component.clone();
        let host = Component::new("Host", move |_props| {
            Ok(NodeDescription::component(&component).build())
        });
        NodeDescription::component(&host).build()
    }

    #[test]
    fn state_change_requests_a_cycle_and_wakes() {
        let runtime = StdRuntime::new();
        let wakes = Arc::new(AtomicUsize::new(0));
        {
            let wakes = Arc::clone(&wakes);
            runtime.set_cycle_waker(move || {
                wakes.fetch_add(1, Ordering::SeqCst);
            });
        }
        let setter: Rc<RefCell<Option<StateSetter<i32>>>> = Rc::new(RefCell::new(None));
        let counter = {
            let setter = Rc::clone(&setter);
            Component::new("Counter", move |_props| {
                let (value, set) = use_state(0)?;
                setter.borrow_mut().replace(set);
                Ok(NodeDescription::leaf("counter").prop("value", value).build())
            })
        };
        let mounted = mount(&hosted(&counter), LogContainer::default(), &runtime.runtime())
            .expect("initial render");
        assert!(!runtime.take_cycle_request());

        let set = setter.borrow().clone().expect("setter captured");
        set.set(1);
        set.set(2);
        assert!(runtime.take_cycle_request(), "state.set should request a cycle");
        assert_eq!(wakes.load(Ordering::SeqCst), 1);

        let outcome = runtime.run_cycle().expect("cycle");
        let tree = outcome.tree().expect("rendered");
        assert_eq!(tree.prop("value"), Some(&json!(2)));
        assert_eq!(mounted.current_tree().as_ref(), Some(tree));

        runtime.clear_cycle_waker();
        set.set(3);
        assert_eq!(wakes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn queued_tasks_collapse_into_one_cycle_request() {
        let runtime = StdRuntime::new();
        let ran = Rc::new(RefCell::new(Vec::new()));
        for step in 0..3 {
            let ran = Rc::clone(&ran);
            runtime.runtime().spawn_task(move || ran.borrow_mut().push(step));
        }
        assert!(runtime.take_cycle_request());
        assert!(!runtime.take_cycle_request());

        assert!(runtime.run_cycle().expect("cycle").is_idle());
        assert_eq!(*ran.borrow(), vec![0, 1, 2]);
        assert!(!runtime.runtime().has_pending_work());
    }

    #[test]
    fn run_until_idle_settles_deferred_updates() {
        let runtime = StdRuntime::new();
        let model = Component::new("Stepper", |_props| {
            let (step, set_step) = use_state(0)?;
            use_effect(deps![step], move || {
                if step < 4 {
                    let set_step = set_step.clone();
                    if let Err(err) = spawn_task(move || set_step.update(|s| s + 1)) {
                        log::error!("{err}");
                    }
                }
            })?;
            Ok(NodeDescription::leaf("step").prop("value", step).build())
        });
        let mounted = mount(&hosted(&model), LogContainer::default(), &runtime.runtime())
            .expect("initial render");

        let report = runtime.run_until_idle(100).expect("settle");
        assert!(report.settled);
        assert_eq!(report.flushes, 4);
        assert_eq!(report.cycles, 4);
        let tree = mounted.current_tree().expect("tree");
        assert_eq!(tree.prop("value"), Some(&json!(4)));
    }

    #[test]
    fn run_until_idle_stops_at_the_cycle_limit() {
        let runtime = StdRuntime::new();
        let model = Component::new("Restless", |_props| {
            let (tick, set_tick) = use_state(0_u64)?;
            use_effect(deps![tick], move || {
                let set_tick = set_tick.clone();
                if let Err(err) = spawn_task(move || set_tick.update(|t| t + 1)) {
                    log::error!("{err}");
                }
            })?;
            Ok(NodeDescription::leaf("tick").prop("value", tick).build())
        });
        let _mounted = mount(&hosted(&model), LogContainer::default(), &runtime.runtime())
            .expect("initial render");

        let report = runtime.run_until_idle(5).expect("bounded run");
        assert!(!report.settled);
        assert_eq!(report.cycles, 5);
        assert!(runtime.runtime().has_pending_work());
    }
}
