use super::*;
use crate::{
    deps, has_active_instance, use_effect, use_node_ref, use_state, EffectCleanup, FlushOutcome,
    HookError, NodeRef, Runtime, StateSetter, TestScheduler,
};
use serde_json::json;
use std::sync::Arc;

fn runtime() -> Runtime {
    Runtime::new(Arc::new(TestScheduler::default()))
}

#[derive(Default)]
struct RecordingContainer {
    mounted: Rc<RefCell<Vec<Rc<RenderedNode>>>>,
    updated: Rc<RefCell<Vec<Rc<RenderedNode>>>>,
}

impl SceneContainer for RecordingContainer {
    fn mount(&mut self, tree: &Rc<RenderedNode>) {
        self.mounted.borrow_mut().push(Rc::clone(tree));
    }

    fn update(&mut self, tree: &Rc<RenderedNode>) {
        self.updated.borrow_mut().push(Rc::clone(tree));
    }
}

#[test]
fn leaf_props_are_copied_verbatim() {
    let runtime = runtime();
    let renderer = Renderer::new(runtime.handle(), LogContainer::default());
    let description = NodeDescription::leaf("rectangle")
        .prop("width", 100)
        .prop("height", 50)
        .build();

    let tree = renderer.expand(&description).expect("expand");
    assert_eq!(tree.tag(), "rectangle");
    assert_eq!(tree.prop("width"), Some(&json!(100)));
    assert_eq!(tree.prop("height"), Some(&json!(50)));
    assert!(tree.children().is_empty());
    assert_eq!(
        serde_json::to_value(&*tree).expect("serialize"),
        json!({"type": "rectangle", "props": {"width": 100, "height": 50}, "children": []})
    );
    assert!(renderer.current_tree().is_none(), "expand does not record");
}

#[test]
fn children_property_never_reaches_the_rendered_leaf() {
    let runtime = runtime();
    let mut properties = Map::new();
    properties.insert("width".into(), json!(1));
    properties.insert("children".into(), json!(["x"]));
    let description = crate::build_node(
        "rectangle",
        Some(properties),
        [NodeDescription::leaf("circle").build()],
    );

    let mounted = mount(&description, LogContainer::default(), &runtime).expect("mount");
    let tree = mounted.initial_tree();
    assert_eq!(tree.properties().len(), 1);
    assert!(tree.prop("children").is_none());
    assert_eq!(tree.children().len(), 1);
    assert_eq!(
        serde_json::to_value(&**tree).expect("serialize")["props"],
        json!({"width": 1})
    );
}

#[test]
fn component_expands_to_what_its_body_produced() {
    let runtime = runtime();
    let sketch = Component::new("Sketch", |props| {
        let plane = props.get("plane").cloned().unwrap_or(Value::Null);
        Ok(NodeDescription::leaf("sketch")
            .prop("plane", plane)
            .children(props.children().iter().cloned())
            .build())
    });
    let description = NodeDescription::component(&sketch)
        .prop("plane", "XY")
        .child(NodeDescription::leaf("line").prop("length", 3))
        .build();

    let container = RecordingContainer::default();
    let mounted_trees = Rc::clone(&container.mounted);
    let mounted = mount(&description, container, &runtime).expect("mount");

    let tree = mounted.initial_tree();
    assert_eq!(tree.tag(), "sketch");
    assert_eq!(tree.prop("plane"), Some(&json!("XY")));
    assert_eq!(tree.children().len(), 1);
    assert_eq!(tree.children()[0].tag(), "line");
    assert_eq!(mounted_trees.borrow().len(), 1);
    assert!(runtime.has_flush_target());
}

#[test]
fn node_ref_receives_the_rendered_node() {
    let runtime = runtime();
    let captured: Rc<RefCell<Option<NodeRef>>> = Rc::new(RefCell::new(None));
    let model = {
        let captured = Rc::clone(&captured);
        Component::new("Model", move |_props| {
            let binding = use_node_ref()?;
            captured.borrow_mut().replace(binding.clone());
            Ok(NodeDescription::leaf("sketch")
                .node_ref(&binding)
                .prop("plane", "XY")
                .build())
        })
    };

    let mounted = mount(
        &NodeDescription::component(&model).build(),
        LogContainer::default(),
        &runtime,
    )
    .expect("mount");

    let binding = captured.borrow().clone().expect("binding captured");
    let bound = binding.current().expect("binding populated");
    assert!(Rc::ptr_eq(&bound, mounted.initial_tree()));
    assert!(bound.properties().get("ref").is_none());
}

#[test]
fn hook_context_does_not_leak_into_children() {
    let runtime = runtime();
    let child = Component::new("Child", |_props| {
        use_state(0)?;
        Ok(NodeDescription::leaf("child").build())
    });
    let parent = {
        let child = child.clone();
        Component::new("Parent", move |_props| {
            use_state("parent")?;
            use_state(1.5)?;
            Ok(NodeDescription::leaf("group")
                .child(NodeDescription::component(&child))
                .build())
        })
    };
    let mounted = mount(
        &NodeDescription::component(&parent).build(),
        LogContainer::default(),
        &runtime,
    )
    .expect("mount");
    mounted.renderer().force_update().expect("update");

    let renderer = mounted.renderer();
    assert_eq!(renderer.instance(&parent).map(|i| i.hook_count()), Some(2));
    assert_eq!(renderer.instance(&child).map(|i| i.hook_count()), Some(1));
    assert!(!has_active_instance());
}

#[test]
fn first_component_becomes_the_root() {
    let runtime = runtime();
    let inner = Component::new("Inner", |_props| Ok(NodeDescription::leaf("inner").build()));
    let outer = {
        let inner = inner.clone();
        Component::new("Outer", move |_props| {
            Ok(NodeDescription::component(&inner).build())
        })
    };
    let mounted = mount(
        &NodeDescription::component(&outer).build(),
        LogContainer::default(),
        &runtime,
    )
    .expect("mount");

    let root = mounted.renderer().root_instance().expect("root");
    assert_eq!(root.component(), &outer);
    assert_eq!(mounted.renderer().instance_count(), 2);
    assert_eq!(mounted.initial_tree().tag(), "inner");
}

#[test]
fn body_errors_abort_the_expansion() {
    let runtime = runtime();
    let broken = Component::new("Broken", |_props| {
        anyhow::bail!("cannot resolve sketch plane")
    });
    let parent = {
        let broken = broken.clone();
        Component::new("Parent", move |_props| {
            Ok(NodeDescription::leaf("group")
                .child(NodeDescription::component(&broken))
                .build())
        })
    };

    let err = mount(
        &NodeDescription::component(&parent).build(),
        LogContainer::default(),
        &runtime,
    )
    .unwrap_err();
    let RenderError::Component { component, source } = &err;
    assert_eq!(*component, "Broken");
    assert_eq!(source.to_string(), "cannot resolve sketch plane");
    assert!(err.hook_error().is_none());
    assert!(!has_active_instance());
}

#[test]
fn hook_errors_surface_through_render_errors() {
    let runtime = runtime();
    let bad = Component::new("Bad", |_props| {
        Err(HookError::NoActiveInstance.into())
    });
    let renderer = Renderer::new(runtime.handle(), LogContainer::default());
    let err = renderer
        .render(&NodeDescription::component(&bad).build())
        .unwrap_err();
    assert_eq!(err.hook_error(), Some(&HookError::NoActiveInstance));
}

#[test]
fn force_update_without_root_is_none() {
    let runtime = runtime();
    let renderer = Renderer::new(runtime.handle(), LogContainer::default());
    renderer
        .render(&NodeDescription::leaf("plain").build())
        .expect("leaf render");
    assert!(renderer.force_update().expect("update").is_none());
    assert!(renderer.root_instance().is_none());
}

#[test]
fn failing_subscriber_does_not_stop_the_others() {
    let runtime = runtime();
    let app = Component::new("App", |_props| Ok(NodeDescription::leaf("group").build()));
    let container = RecordingContainer::default();
    let updates = Rc::clone(&container.updated);
    let mounted = mount(&NodeDescription::component(&app).build(), container, &runtime)
        .expect("mount");

    let delivered = Rc::new(Cell::new(0));
    mounted.subscribe(|_tree| anyhow::bail!("viewer disconnected"));
    {
        let delivered = Rc::clone(&delivered);
        mounted.subscribe(move |_tree| {
            delivered.set(delivered.get() + 1);
            Ok(())
        });
    }
    assert_eq!(mounted.renderer().subscriber_count(), 2);

    mounted.renderer().force_update().expect("update");
    assert_eq!(delivered.get(), 1);
    assert_eq!(updates.borrow().len(), 1);
}

#[test]
fn unsubscribed_callbacks_stop_receiving_trees() {
    let runtime = runtime();
    let app = Component::new("App", |_props| Ok(NodeDescription::leaf("group").build()));
    let mounted = mount(
        &NodeDescription::component(&app).build(),
        LogContainer::default(),
        &runtime,
    )
    .expect("mount");
    let delivered = Rc::new(Cell::new(0));
    let id = {
        let delivered = Rc::clone(&delivered);
        mounted.subscribe(move |_tree| {
            delivered.set(delivered.get() + 1);
            Ok(())
        })
    };

    mounted.renderer().force_update().expect("update");
    assert!(mounted.unsubscribe(id));
    assert!(!mounted.unsubscribe(id));
    mounted.renderer().force_update().expect("update");
    assert_eq!(delivered.get(), 1);
}

#[test]
fn unmount_runs_cleanups_and_withdraws_requests() {
    let runtime = runtime();
    let cleaned = Rc::new(Cell::new(false));
    let setter: Rc<RefCell<Option<StateSetter<i32>>>> = Rc::new(RefCell::new(None));
    let tracked = {
        let cleaned = Rc::clone(&cleaned);
        let setter = Rc::clone(&setter);
        Component::new("Tracked", move |_props| {
            let (_, set) = use_state(0)?;
            setter.borrow_mut().replace(set);
            let cleaned = Rc::clone(&cleaned);
            use_effect(deps![], move || {
                EffectCleanup::new(move || cleaned.set(true))
            })?;
            Ok(NodeDescription::leaf("group").build())
        })
    };
    let mounted = mount(
        &NodeDescription::component(&tracked).build(),
        LogContainer::default(),
        &runtime,
    )
    .expect("mount");

    if let Some(set) = setter.borrow().as_ref() {
        set.set(9);
    }
    assert_eq!(runtime.pending_len(), 1);

    assert!(mounted.renderer().unmount(&tracked));
    assert!(cleaned.get());
    assert_eq!(runtime.pending_len(), 0);
    assert!(mounted.renderer().root_instance().is_none());
    assert!(!mounted.renderer().unmount(&tracked));

    let outcome = runtime.flush_now().expect("flush");
    assert!(matches!(outcome, FlushOutcome::Rendered { tree: None, .. }));
}
