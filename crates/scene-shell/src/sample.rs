//! Sample CAD models used by the demo binary and the integration tests.

use scene_core::{
    deps, spawn_task, use_effect, use_node_ref, use_state, Component, NodeDescription,
};

use crate::module::{Module, ModuleRegistry};

/// Path of the counting model module.
pub const MODEL_PATH: &str = "models/model1";
/// Path of the static sketch module.
pub const SKETCH_PATH: &str = "models/sketch";

/// Last value the counting model steps to.
pub const FINAL_PLANE: i64 = 3;

/// A sketch with one rectangle and one circle.
pub fn static_sketch() -> Component {
    Component::new("Test", |_props| {
        Ok(NodeDescription::leaf("sketch")
            .prop("plane", "Byeeee")
            .child(
                NodeDescription::leaf("rectangle")
                    .prop("width", 100)
                    .prop("height", 50),
            )
            .child(NodeDescription::leaf("circle").prop("radius", 25))
            .build())
    })
}

/// Counts its plane from 1 up to [`FINAL_PLANE`], one deferred step per cycle.
pub fn my_model() -> Component {
    Component::new("MyModel", |_props| {
        let sketch = use_node_ref()?;
        let (state, set_state) = use_state(1_i64)?;

        let bound = sketch.clone();
        use_effect(deps![state], move || {
            log::debug!(
                "sketch ref: {:?}",
                bound.current().map(|node| node.prop("plane").cloned())
            );
            if state < FINAL_PLANE {
                let set_state = set_state.clone();
                if let Err(err) = spawn_task(move || set_state.update(|prev| prev + 1)) {
                    log::error!("could not defer plane update: {err}");
                }
            }
        })?;

        Ok(NodeDescription::leaf("sketch")
            .node_ref(&sketch)
            .prop("plane", state.to_string())
            .build())
    })
}

/// Stateless entry point wrapping [`my_model`].
pub fn main_component(model: &Component) -> Component {
    let model = model.clone();
    Component::new("Main", move |_props| {
        Ok(NodeDescription::component(&model).build())
    })
}

/// Registers the sample modules under [`MODEL_PATH`] and [`SKETCH_PATH`].
pub fn register(registry: &mut ModuleRegistry) {
    let model = my_model();
    let sketch = static_sketch();
    registry.register(
        MODEL_PATH,
        Module::new(main_component(&model))
            .with_export("MyModel", model)
            .with_export("Test", sketch.clone()),
    );
    registry.register(SKETCH_PATH, Module::new(sketch));
}

/// A fresh registry holding only the sample modules.
pub fn registry() -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    register(&mut registry);
    registry
}
