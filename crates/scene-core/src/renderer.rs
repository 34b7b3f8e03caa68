use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::collections::map::HashMap;
use crate::error::{DispatchError, RenderError};
use crate::instance::ComponentInstance;
use crate::node::{Component, ComponentId, NodeDescription, NodeKind, Props};
use crate::runtime::{FlushTarget, Runtime, RuntimeHandle};

/// Output node produced for every leaf description.
///
/// Trees are immutable snapshots; each flush builds a new one.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RenderedNode {
    #[serde(rename = "type")]
    tag: Rc<str>,
    #[serde(rename = "props")]
    properties: Map<String, Value>,
    children: Vec<Rc<RenderedNode>>,
}

impl RenderedNode {
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn properties(&self) -> &Map<String, Value> {
        &self.properties
    }

    pub fn prop(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    pub fn children(&self) -> &[Rc<RenderedNode>] {
        &self.children
    }

    /// Depth-first search for the first node with `tag`, including `self`.
    pub fn find(&self, tag: &str) -> Option<&RenderedNode> {
        if &*self.tag == tag {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(tag))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// The scene the rendered tree is handed to.
pub trait SceneContainer {
    /// Called once with the initial tree.
    fn mount(&mut self, tree: &Rc<RenderedNode>);

    /// Called with every tree produced by a forced update.
    fn update(&mut self, _tree: &Rc<RenderedNode>) {}
}

/// Container that only records what it was given in the log.
#[derive(Debug, Default)]
pub struct LogContainer {
    name: String,
}

impl LogContainer {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl SceneContainer for LogContainer {
    fn mount(&mut self, tree: &Rc<RenderedNode>) {
        log::info!(
            "mounted `{}` into container `{}` ({} child node(s))",
            tree.tag(),
            self.name,
            tree.children().len()
        );
    }

    fn update(&mut self, tree: &Rc<RenderedNode>) {
        log::debug!("container `{}` received updated `{}`", self.name, tree.tag());
    }
}

pub type SubscriptionId = u64;

type Subscriber = Rc<dyn Fn(&Rc<RenderedNode>) -> anyhow::Result<()>>;

struct RendererInner {
    runtime: RuntimeHandle,
    container: RefCell<Box<dyn SceneContainer>>,
    instances: RefCell<HashMap<ComponentId, ComponentInstance>>,
    root: RefCell<Option<ComponentInstance>>,
    current_tree: RefCell<Option<Rc<RenderedNode>>>,
    subscribers: RefCell<Vec<(SubscriptionId, Subscriber)>>,
    next_subscription: Cell<SubscriptionId>,
}

impl RendererInner {
    fn expand(&self, node: &NodeDescription) -> Result<Rc<RenderedNode>, RenderError> {
        match node.kind() {
            NodeKind::Component(component) => self.expand_component(component, node.props()),
            NodeKind::Leaf(tag) => self.expand_leaf(tag, node.props()),
        }
    }

    fn expand_component(
        &self,
        component: &Component,
        props: &Props,
    ) -> Result<Rc<RenderedNode>, RenderError> {
        let instance = self.instance_for(component);
        // Hooks of `produced`'s components bind to their own instances, not this one.
        let produced = instance.invoke(props)?;
        self.expand(&produced)
    }

    fn expand_leaf(&self, tag: &Rc<str>, props: &Props) -> Result<Rc<RenderedNode>, RenderError> {
        let children = props
            .children()
            .iter()
            .map(|child| self.expand(child))
            .collect::<Result<Vec<_>, _>>()?;
        let rendered = Rc::new(RenderedNode {
            tag: Rc::clone(tag),
            properties: props.values().clone(),
            children,
        });
        if let Some(binding) = props.node_ref() {
            binding.set(Some(Rc::clone(&rendered)));
        }
        Ok(rendered)
    }

    fn instance_for(&self, component: &Component) -> ComponentInstance {
        if let Some(existing) = self.instances.borrow().get(&component.id()) {
            return existing.clone();
        }
        let instance = ComponentInstance::new(component.clone(), self.runtime.clone());
        log::debug!(
            "created instance {} for component `{}`",
            instance.id(),
            component.name()
        );
        self.instances
            .borrow_mut()
            .insert(component.id(), instance.clone());
        let mut root = self.root.borrow_mut();
        if root.is_none() {
            *root = Some(instance.clone());
        }
        instance
    }

    fn render(&self, node: &NodeDescription) -> Result<Rc<RenderedNode>, RenderError> {
        let tree = self.expand(node)?;
        *self.current_tree.borrow_mut() = Some(Rc::clone(&tree));
        Ok(tree)
    }

    fn emit_tree_update(&self, tree: &Rc<RenderedNode>) {
        let subscribers: Vec<(SubscriptionId, Subscriber)> = self.subscribers.borrow().clone();
        for (id, subscriber) in subscribers {
            if let Err(source) = subscriber(tree) {
                let error = anyhow::Error::from(DispatchError::Subscriber {
                    subscriber: id,
                    source,
                });
                log::error!("{error:#}");
            }
        }
    }
}

impl FlushTarget for RendererInner {
    fn force_update(&self) -> Result<Option<Rc<RenderedNode>>, RenderError> {
        let description = self
            .root
            .borrow()
            .as_ref()
            .and_then(ComponentInstance::last_produced);
        let Some(description) = description else {
            return Ok(None);
        };
        let tree = self.render(&description)?;
        self.container.borrow_mut().update(&tree);
        self.emit_tree_update(&tree);
        Ok(Some(tree))
    }
}

/// Expands node descriptions into rendered trees and owns the persistent
/// component instances.
#[derive(Clone)]
pub struct Renderer {
    inner: Rc<RendererInner>,
}

impl Renderer {
    pub fn new(runtime: RuntimeHandle, container: impl SceneContainer + 'static) -> Self {
        Self {
            inner: Rc::new(RendererInner {
                runtime,
                container: RefCell::new(Box::new(container)),
                instances: RefCell::new(HashMap::new()),
                root: RefCell::new(None),
                current_tree: RefCell::new(None),
                subscribers: RefCell::new(Vec::new()),
                next_subscription: Cell::new(1),
            }),
        }
    }

    /// Expands `node` without touching the recorded current tree.
    ///
    /// Errors raised by component bodies abort the whole expansion.
    pub fn expand(&self, node: &NodeDescription) -> Result<Rc<RenderedNode>, RenderError> {
        self.inner.expand(node)
    }

    /// Expands `node` and records the result as the current tree.
    pub fn render(&self, node: &NodeDescription) -> Result<Rc<RenderedNode>, RenderError> {
        self.inner.render(node)
    }

    /// Renders `node` and hands the tree to the container.
    pub fn mount(&self, node: &NodeDescription) -> Result<Rc<RenderedNode>, RenderError> {
        let tree = self.inner.render(node)?;
        self.inner.container.borrow_mut().mount(&tree);
        Ok(tree)
    }

    /// Re-expands the root instance's last produced description and notifies
    /// subscribers. Returns `None` before any root instance exists.
    pub fn force_update(&self) -> Result<Option<Rc<RenderedNode>>, RenderError> {
        self.inner.force_update()
    }

    pub fn current_tree(&self) -> Option<Rc<RenderedNode>> {
        self.inner.current_tree.borrow().clone()
    }

    pub fn root_instance(&self) -> Option<ComponentInstance> {
        self.inner.root.borrow().clone()
    }

    pub fn instance(&self, component: &Component) -> Option<ComponentInstance> {
        self.inner.instances.borrow().get(&component.id()).cloned()
    }

    pub fn instance_count(&self) -> usize {
        self.inner.instances.borrow().len()
    }

    pub fn subscribe(
        &self,
        subscriber: impl Fn(&Rc<RenderedNode>) -> anyhow::Result<()> + 'static,
    ) -> SubscriptionId {
        let id = self.inner.next_subscription.get();
        self.inner.next_subscription.set(id + 1);
        self.inner
            .subscribers
            .borrow_mut()
            .push((id, Rc::new(subscriber)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.inner.subscribers.borrow_mut();
        let before = subscribers.len();
        subscribers.retain(|(existing, _)| *existing != id);
        subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.borrow().len()
    }

    /// Drops the persistent state of `component`.
    ///
    /// Effect cleanups run, any pending re-render request for the instance is
    /// withdrawn, and if it was the root the renderer forgets its root.
    pub fn unmount(&self, component: &Component) -> bool {
        let Some(instance) = self.inner.instances.borrow_mut().remove(&component.id()) else {
            return false;
        };
        {
            let mut root = self.inner.root.borrow_mut();
            if root.as_ref().is_some_and(|root| root.ptr_eq(&instance)) {
                root.take();
            }
        }
        self.inner.runtime.cancel_rerender(instance.id());
        instance.dispose();
        log::debug!("unmounted component `{}`", component.name());
        true
    }

    pub fn flush_target(&self) -> Weak<dyn FlushTarget> {
        let weak: Weak<RendererInner> = Rc::downgrade(&self.inner);
        weak
    }
}

impl fmt::Debug for Renderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderer")
            .field("instances", &self.instance_count())
            .field("subscribers", &self.subscriber_count())
            .field("has_tree", &self.inner.current_tree.borrow().is_some())
            .finish()
    }
}

/// Live mount returned by [`mount`].
pub struct MountHandle {
    initial_tree: Rc<RenderedNode>,
    renderer: Renderer,
}

impl MountHandle {
    pub fn initial_tree(&self) -> &Rc<RenderedNode> {
        &self.initial_tree
    }

    pub fn current_tree(&self) -> Option<Rc<RenderedNode>> {
        self.renderer.current_tree()
    }

    /// Registers a callback for every tree produced by later flushes.
    pub fn subscribe(
        &self,
        on_tree_update: impl Fn(&Rc<RenderedNode>) -> anyhow::Result<()> + 'static,
    ) -> SubscriptionId {
        self.renderer.subscribe(on_tree_update)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.renderer.unsubscribe(id)
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }
}

impl fmt::Debug for MountHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountHandle")
            .field("initial_tree", &self.initial_tree.tag())
            .field("renderer", &self.renderer)
            .finish()
    }
}

/// Creates a renderer bound to `runtime`, registers it as the flush target
/// and performs the initial render.
pub fn mount(
    root: &NodeDescription,
    container: impl SceneContainer + 'static,
    runtime: &Runtime,
) -> Result<MountHandle, RenderError> {
    let renderer = Renderer::new(runtime.handle(), container);
    runtime.set_flush_target(renderer.flush_target());
    let initial_tree = renderer.mount(root)?;
    Ok(MountHandle {
        initial_tree,
        renderer,
    })
}

#[cfg(test)]
#[path = "tests/renderer_tests.rs"]
mod tests;
