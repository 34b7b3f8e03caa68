use std::cell::RefCell;
use std::rc::Rc;

use scene_core::{
    mount, Component, LogContainer, MountHandle, NodeDescription, RenderError, RenderedNode,
    Renderer, Runtime, SubscriptionId,
};
use scene_runtime_std::{IdleReport, StdRuntime, DEFAULT_MAX_CYCLES};

/// Headless harness for mounting scenes in tests.
///
/// Owns a [`StdRuntime`], records every tree emitted after the initial
/// mount and drives scheduling cycles until the scene settles.
pub struct SceneTestRule {
    runtime: StdRuntime,
    mounted: Option<MountHandle>,
    subscription: Option<SubscriptionId>,
    emissions: Rc<RefCell<Vec<Rc<RenderedNode>>>>,
    max_cycles: usize,
}

impl SceneTestRule {
    pub fn new() -> Self {
        Self {
            runtime: StdRuntime::new(),
            mounted: None,
            subscription: None,
            emissions: Rc::new(RefCell::new(Vec::new())),
            max_cycles: DEFAULT_MAX_CYCLES,
        }
    }

    /// Caps the cycles run by [`SceneTestRule::pump_until_idle`].
    pub fn with_max_cycles(mut self, max_cycles: usize) -> Self {
        self.max_cycles = max_cycles;
        self
    }

    /// Mounts `content` and starts recording emitted trees.
    ///
    /// Replaces whatever was mounted before; earlier emissions are discarded.
    pub fn set_content(
        &mut self,
        content: &NodeDescription,
    ) -> Result<Rc<RenderedNode>, RenderError> {
        self.clear_content();
        let mounted = mount(content, LogContainer::new("test"), &self.runtime.runtime())?;
        let emissions = Rc::clone(&self.emissions);
        let subscription = mounted.subscribe(move |tree| {
            emissions.borrow_mut().push(Rc::clone(tree));
            Ok(())
        });
        let initial = Rc::clone(mounted.initial_tree());
        self.subscription = Some(subscription);
        self.mounted = Some(mounted);
        Ok(initial)
    }

    /// Mounts `component` beneath a stateless host so that flushes re-invoke it.
    pub fn set_hosted_content(
        &mut self,
        component: &Component,
    ) -> Result<Rc<RenderedNode>, RenderError> {
        let component = component.clone();
        let host = Component::new("TestHost", move |_props| {
            Ok(NodeDescription::component(&component).build())
        });
        self.set_content(&NodeDescription::component(&host).build())
    }

    /// Runs a single scheduling cycle.
    pub fn run_cycle(&mut self) -> Result<(), RenderError> {
        self.runtime.run_cycle().map(|_| ())
    }

    /// Drives the runtime until no task or flush remains.
    pub fn pump_until_idle(&mut self) -> Result<IdleReport, RenderError> {
        self.runtime.run_until_idle(self.max_cycles)
    }

    pub fn has_content(&self) -> bool {
        self.mounted.is_some()
    }

    /// The most recently rendered tree.
    pub fn tree(&self) -> Option<Rc<RenderedNode>> {
        self.mounted.as_ref().and_then(MountHandle::current_tree)
    }

    /// Trees delivered to subscribers since the content was set.
    pub fn emissions(&self) -> Vec<Rc<RenderedNode>> {
        self.emissions.borrow().clone()
    }

    pub fn emission_count(&self) -> usize {
        self.emissions.borrow().len()
    }

    pub fn flush_count(&self) -> u64 {
        self.runtime.runtime().flush_count()
    }

    pub fn runtime(&self) -> Runtime {
        self.runtime.runtime()
    }

    pub fn std_runtime(&self) -> &StdRuntime {
        &self.runtime
    }

    pub fn renderer(&self) -> Option<&Renderer> {
        self.mounted.as_ref().map(MountHandle::renderer)
    }

    fn clear_content(&mut self) {
        if let (Some(mounted), Some(id)) = (self.mounted.take(), self.subscription.take()) {
            mounted.unsubscribe(id);
        }
        self.emissions.borrow_mut().clear();
    }
}

impl Default for SceneTestRule {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience helper for tests that only need temporary access to a
/// `SceneTestRule`.
pub fn run_test_scene<R>(f: impl FnOnce(&mut SceneTestRule) -> R) -> R {
    let mut rule = SceneTestRule::new();
    f(&mut rule)
}
