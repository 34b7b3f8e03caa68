//! Immutable node descriptions and component registration handles.
//!
//! A [`NodeDescription`] is the declarative input of the renderer: either a
//! leaf tag with JSON properties, or a reference to a registered
//! [`Component`]. Descriptions are rebuilt on every render pass and never
//! mutated after construction.

use std::fmt;
use std::hash::Hash;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::{Map, Value};

use crate::hash::hash_key;
use crate::hooks::NodeRef;
use crate::Key;

pub type ComponentId = usize;

static NEXT_COMPONENT_ID: AtomicUsize = AtomicUsize::new(1);

fn next_component_id() -> ComponentId {
    NEXT_COMPONENT_ID.fetch_add(1, Ordering::Relaxed)
}

type ComponentBody = dyn Fn(&Props) -> anyhow::Result<NodeDescription>;

struct ComponentDef {
    id: ComponentId,
    name: &'static str,
    body: Box<ComponentBody>,
}

/// Stable handle for a registered function component.
///
/// The runtime keys persistent instance state on [`Component::id`], so the
/// same handle must be reused for every description that refers to the
/// component. Cloning the handle keeps the identity.
#[derive(Clone)]
pub struct Component {
    def: Rc<ComponentDef>,
}

impl Component {
    pub fn new(
        name: &'static str,
        body: impl Fn(&Props) -> anyhow::Result<NodeDescription> + 'static,
    ) -> Self {
        Self {
            def: Rc::new(ComponentDef {
                id: next_component_id(),
                name,
                body: Box::new(body),
            }),
        }
    }

    pub fn id(&self) -> ComponentId {
        self.def.id
    }

    pub fn name(&self) -> &'static str {
        self.def.name
    }

    pub(crate) fn invoke(&self, props: &Props) -> anyhow::Result<NodeDescription> {
        (self.def.body)(props)
    }
}

impl PartialEq for Component {
    fn eq(&self, other: &Self) -> bool {
        self.def.id == other.def.id
    }
}

impl Eq for Component {}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("id", &self.def.id)
            .field("name", &self.def.name)
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    Leaf(Rc<str>),
    Component(Component),
}

impl From<&str> for NodeKind {
    fn from(tag: &str) -> Self {
        NodeKind::Leaf(Rc::from(tag))
    }
}

impl From<String> for NodeKind {
    fn from(tag: String) -> Self {
        NodeKind::Leaf(Rc::from(tag))
    }
}

impl From<Component> for NodeKind {
    fn from(component: Component) -> Self {
        NodeKind::Component(component)
    }
}

impl From<&Component> for NodeKind {
    fn from(component: &Component) -> Self {
        NodeKind::Component(component.clone())
    }
}

/// Properties handed to a component body or copied onto a rendered leaf.
///
/// `children` and the capability binding travel next to the JSON values
/// rather than inside them.
#[derive(Clone, Default)]
pub struct Props {
    values: Map<String, Value>,
    children: Vec<NodeDescription>,
    node_ref: Option<NodeRef>,
}

impl Props {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn children(&self) -> &[NodeDescription] {
        &self.children
    }

    pub fn node_ref(&self) -> Option<&NodeRef> {
        self.node_ref.as_ref()
    }
}

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Props")
            .field("values", &self.values)
            .field("children", &self.children.len())
            .field("node_ref", &self.node_ref.is_some())
            .finish()
    }
}

struct NodeData {
    kind: NodeKind,
    props: Props,
    key: Option<Key>,
}

#[derive(Clone)]
pub struct NodeDescription {
    data: Rc<NodeData>,
}

impl NodeDescription {
    pub fn leaf(tag: impl Into<String>) -> NodeBuilder {
        NodeBuilder::new(NodeKind::from(tag.into()))
    }

    pub fn component(component: &Component) -> NodeBuilder {
        NodeBuilder::new(NodeKind::from(component))
    }

    pub fn kind(&self) -> &NodeKind {
        &self.data.kind
    }

    pub fn props(&self) -> &Props {
        &self.data.props
    }

    pub fn children(&self) -> &[NodeDescription] {
        self.data.props.children()
    }

    /// Stable-identity hint. Carried through but not used for matching.
    pub fn key(&self) -> Option<Key> {
        self.data.key
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.data, &other.data)
    }
}

impl fmt::Debug for NodeDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("NodeDescription");
        match &self.data.kind {
            NodeKind::Leaf(tag) => debug.field("leaf", tag),
            NodeKind::Component(component) => debug.field("component", &component.name()),
        };
        debug
            .field("props", &self.data.props)
            .field("key", &self.data.key)
            .finish()
    }
}

/// Fluent constructor for [`NodeDescription`].
pub struct NodeBuilder {
    kind: NodeKind,
    values: Map<String, Value>,
    children: Vec<NodeDescription>,
    node_ref: Option<NodeRef>,
    key: Option<Key>,
}

impl NodeBuilder {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            values: Map::new(),
            children: Vec::new(),
            node_ref: None,
            key: None,
        }
    }

    pub fn prop(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn child(mut self, child: impl Into<Child>) -> Self {
        child.into().flatten_into(&mut self.children);
        self
    }

    pub fn children<C: Into<Child>>(mut self, children: impl IntoIterator<Item = C>) -> Self {
        for child in children {
            child.into().flatten_into(&mut self.children);
        }
        self
    }

    pub fn node_ref(mut self, node_ref: &NodeRef) -> Self {
        self.node_ref = Some(node_ref.clone());
        self
    }

    pub fn key<K: Hash + ?Sized>(mut self, key: &K) -> Self {
        self.key = Some(hash_key(key));
        self
    }

    /// A `"children"` property is dropped; children only come from
    /// [`NodeBuilder::child`] and [`NodeBuilder::children`].
    pub fn build(self) -> NodeDescription {
        let (values, _) = take_entry(self.values, "children");
        NodeDescription {
            data: Rc::new(NodeData {
                kind: self.kind,
                props: Props {
                    values,
                    children: self.children,
                    node_ref: self.node_ref,
                },
                key: self.key,
            }),
        }
    }
}

impl From<NodeBuilder> for NodeDescription {
    fn from(builder: NodeBuilder) -> Self {
        builder.build()
    }
}

/// One child argument of [`build_node`]: a node, a nested list, or nothing.
pub enum Child {
    Node(NodeDescription),
    List(Vec<Child>),
    Empty,
}

impl Child {
    fn flatten_into(self, out: &mut Vec<NodeDescription>) {
        match self {
            Child::Node(node) => out.push(node),
            Child::List(children) => {
                for child in children {
                    child.flatten_into(out);
                }
            }
            Child::Empty => {}
        }
    }
}

impl From<NodeDescription> for Child {
    fn from(node: NodeDescription) -> Self {
        Child::Node(node)
    }
}

impl From<NodeBuilder> for Child {
    fn from(builder: NodeBuilder) -> Self {
        Child::Node(builder.build())
    }
}

impl From<Option<NodeDescription>> for Child {
    fn from(node: Option<NodeDescription>) -> Self {
        node.map_or(Child::Empty, Child::Node)
    }
}

impl From<Vec<NodeDescription>> for Child {
    fn from(nodes: Vec<NodeDescription>) -> Self {
        Child::List(nodes.into_iter().map(Child::Node).collect())
    }
}

impl From<Vec<Child>> for Child {
    fn from(children: Vec<Child>) -> Self {
        Child::List(children)
    }
}

impl From<()> for Child {
    fn from(_: ()) -> Self {
        Child::Empty
    }
}

/// Removes `name` from `values` without disturbing the order of the rest.
fn take_entry(values: Map<String, Value>, name: &str) -> (Map<String, Value>, Option<Value>) {
    if !values.contains_key(name) {
        return (values, None);
    }
    let mut taken = None;
    let rest = values
        .into_iter()
        .filter_map(|(entry, value)| {
            if entry == name {
                taken = Some(value);
                None
            } else {
                Some((entry, value))
            }
        })
        .collect();
    (rest, taken)
}

/// Plain data constructor for node descriptions.
///
/// Nested child lists are flattened and empty children dropped. A `"key"`
/// entry is lifted out of `properties` and hashed into the identity hint; a
/// `null` key counts as absent. A `"children"` entry is discarded in favour
/// of `children`.
pub fn build_node<C: Into<Child>>(
    kind: impl Into<NodeKind>,
    properties: Option<Map<String, Value>>,
    children: impl IntoIterator<Item = C>,
) -> NodeDescription {
    let (values, lifted) = take_entry(properties.unwrap_or_default(), "key");
    let key = match lifted {
        None | Some(Value::Null) => None,
        Some(Value::String(key)) => Some(hash_key(key.as_str())),
        Some(other) => Some(hash_key(&other.to_string())),
    };
    let mut builder = NodeBuilder::new(kind.into()).children(children);
    builder.values = values;
    builder.key = key;
    builder.build()
}

#[cfg(test)]
#[path = "tests/node_tests.rs"]
mod tests;
