use std::fmt;
use std::path::Path;
use std::rc::Rc;

use scene_core::{
    build_node, mount, Child, DispatchError, LogContainer, MountHandle, RenderError, RenderedNode,
    SubscriptionId,
};
use scene_runtime_std::{IdleReport, StdRuntime};

use crate::config::ShellConfig;
use crate::error::ShellError;
use crate::module::ModuleRegistry;

type TreeCallback = Box<dyn Fn(&Rc<RenderedNode>) -> anyhow::Result<()>>;
type JsonCallback = Box<dyn Fn(&str) -> anyhow::Result<()>>;

/// Receivers for every tree the running scene produces.
#[derive(Default)]
pub struct RenderCallbacks {
    on_tree_update: Option<TreeCallback>,
    on_json_update: Option<JsonCallback>,
}

impl RenderCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_tree_update(
        mut self,
        callback: impl Fn(&Rc<RenderedNode>) -> anyhow::Result<()> + 'static,
    ) -> Self {
        self.on_tree_update = Some(Box::new(callback));
        self
    }

    /// Receives the serialized form of every tree.
    pub fn on_json_update(
        mut self,
        callback: impl Fn(&str) -> anyhow::Result<()> + 'static,
    ) -> Self {
        self.on_json_update = Some(Box::new(callback));
        self
    }

    fn is_empty(&self) -> bool {
        self.on_tree_update.is_none() && self.on_json_update.is_none()
    }

    fn deliver(&self, tree: &Rc<RenderedNode>, pretty_json: bool) -> anyhow::Result<()> {
        if let Some(on_tree_update) = &self.on_tree_update {
            on_tree_update(tree)?;
        }
        if let Some(on_json_update) = &self.on_json_update {
            let json = if pretty_json {
                tree.to_json_pretty()?
            } else {
                tree.to_json()?
            };
            on_json_update(&json)?;
        }
        Ok(())
    }
}

impl fmt::Debug for RenderCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderCallbacks")
            .field("on_tree_update", &self.on_tree_update.is_some())
            .field("on_json_update", &self.on_json_update.is_some())
            .finish()
    }
}

/// Loads root components from a [`ModuleRegistry`] and starts scenes.
#[derive(Debug)]
pub struct Shell {
    registry: ModuleRegistry,
    config: ShellConfig,
}

impl Shell {
    pub fn new(registry: ModuleRegistry) -> Self {
        Self::with_config(registry, ShellConfig::default())
    }

    pub fn with_config(registry: ModuleRegistry, config: ShellConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ModuleRegistry {
        &mut self.registry
    }

    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    /// Mounts the default export of the module at `path`.
    ///
    /// The initial tree is delivered to `callbacks` before this returns; later
    /// trees arrive once per flush while the caller drives the scene.
    pub fn start_renderer(
        &self,
        path: impl AsRef<Path>,
        callbacks: RenderCallbacks,
    ) -> Result<RunningScene, ShellError> {
        let path = path.as_ref();
        let root = self.registry.load_root(path)?;
        let description = build_node(root, None, std::iter::empty::<Child>());

        let runtime = StdRuntime::new();
        let mounted = mount(
            &description,
            LogContainer::new(path.display().to_string()),
            &runtime.runtime(),
        )?;

        let pretty_json = self.config.pretty_json;
        let subscription = if callbacks.is_empty() {
            None
        } else {
            let callbacks = Rc::new(callbacks);
            let subscriber = Rc::clone(&callbacks);
            let id = mounted.subscribe(move |tree| subscriber.deliver(tree, pretty_json));
            if let Err(source) = callbacks.deliver(mounted.initial_tree(), pretty_json) {
                let error = anyhow::Error::from(DispatchError::Subscriber {
                    subscriber: id,
                    source,
                });
                log::error!("{error:#}");
            }
            Some(id)
        };

        log::info!("started renderer for `{}`", path.display());
        Ok(RunningScene {
            runtime,
            mounted,
            subscription,
            max_cycles: self.config.max_cycles,
            pretty_json,
            stopped: false,
        })
    }
}

/// A mounted scene returned by [`Shell::start_renderer`].
pub struct RunningScene {
    runtime: StdRuntime,
    mounted: MountHandle,
    subscription: Option<SubscriptionId>,
    max_cycles: usize,
    pretty_json: bool,
    stopped: bool,
}

impl RunningScene {
    /// Drives deferred work and flushes until the scene settles or the
    /// configured cycle limit is reached.
    pub fn run_until_idle(&self) -> Result<IdleReport, RenderError> {
        self.runtime.run_until_idle(self.max_cycles)
    }

    pub fn run_cycle(&self) -> Result<(), RenderError> {
        self.runtime.run_cycle().map(|_| ())
    }

    pub fn initial_tree(&self) -> &Rc<RenderedNode> {
        self.mounted.initial_tree()
    }

    pub fn current_tree(&self) -> Option<Rc<RenderedNode>> {
        self.mounted.current_tree()
    }

    pub fn current_json(&self) -> Result<Option<String>, ShellError> {
        let Some(tree) = self.current_tree() else {
            return Ok(None);
        };
        let json = if self.pretty_json {
            tree.to_json_pretty()?
        } else {
            tree.to_json()?
        };
        Ok(Some(json))
    }

    pub fn runtime(&self) -> &StdRuntime {
        &self.runtime
    }

    pub fn is_running(&self) -> bool {
        !self.stopped
    }

    /// Detaches the callbacks. Later flushes still update the current tree
    /// but are no longer delivered.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        if let Some(id) = self.subscription.take() {
            self.mounted.unsubscribe(id);
        }
        self.stopped = true;
        log::info!("renderer stopped");
    }
}

impl fmt::Debug for RunningScene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunningScene")
            .field("mounted", &self.mounted)
            .field("running", &self.is_running())
            .field("max_cycles", &self.max_cycles)
            .finish()
    }
}
