use std::cell::RefCell;
use std::rc::Rc;

use scene_core::{NodeDescription, RenderedNode};
use scene_shell::{sample, Module, RenderCallbacks, Shell, ShellConfig, ShellError};
use scene_testing::SceneTestRule;
use serde_json::{json, Value};

fn recording_callbacks() -> (
    RenderCallbacks,
    Rc<RefCell<Vec<Rc<RenderedNode>>>>,
    Rc<RefCell<Vec<String>>>,
) {
    let trees = Rc::new(RefCell::new(Vec::new()));
    let jsons = Rc::new(RefCell::new(Vec::new()));
    let callbacks = {
        let trees = Rc::clone(&trees);
        let jsons = Rc::clone(&jsons);
        RenderCallbacks::new()
            .on_tree_update(move |tree| {
                trees.borrow_mut().push(Rc::clone(tree));
                Ok(())
            })
            .on_json_update(move |json| {
                jsons.borrow_mut().push(json.to_string());
                Ok(())
            })
    };
    (callbacks, trees, jsons)
}

fn planes(trees: &[Rc<RenderedNode>]) -> Vec<Value> {
    trees
        .iter()
        .map(|tree| tree.prop("plane").cloned().unwrap_or(Value::Null))
        .collect()
}

#[test]
fn counting_model_settles_at_its_final_plane() {
    let shell = Shell::new(sample::registry());
    let (callbacks, trees, jsons) = recording_callbacks();

    let scene = shell
        .start_renderer(sample::MODEL_PATH, callbacks)
        .expect("start");
    assert_eq!(trees.borrow().len(), 1, "initial tree is delivered synchronously");
    assert_eq!(jsons.borrow().len(), 1);

    let report = scene.run_until_idle().expect("settle");
    assert!(report.settled);
    assert_eq!(report.flushes, 2);

    assert_eq!(planes(&trees.borrow()), vec![json!("1"), json!("2"), json!("3")]);
    let last: Value = serde_json::from_str(jsons.borrow().last().expect("json")).expect("parse");
    assert_eq!(
        last,
        json!({"type": "sketch", "props": {"plane": "3"}, "children": []})
    );
    assert!(!scene.runtime().runtime().has_pending_work());
}

#[test]
fn static_sketch_serializes_its_children() {
    let shell = Shell::with_config(
        sample::registry(),
        ShellConfig::default().with_pretty_json(false),
    );
    let (callbacks, _trees, jsons) = recording_callbacks();
    let scene = shell
        .start_renderer(sample::SKETCH_PATH, callbacks)
        .expect("start");

    assert_eq!(
        jsons.borrow()[0],
        r#"{"type":"sketch","props":{"plane":"Byeeee"},"children":[{"type":"rectangle","props":{"width":100,"height":50},"children":[]},{"type":"circle","props":{"radius":25},"children":[]}]}"#
    );
    assert_eq!(
        scene.current_json().expect("json").as_deref(),
        Some(jsons.borrow()[0].as_str())
    );
}

#[test]
fn stopped_scene_no_longer_delivers() {
    let shell = Shell::new(sample::registry());
    let (callbacks, trees, _jsons) = recording_callbacks();
    let mut scene = shell
        .start_renderer(sample::MODEL_PATH, callbacks)
        .expect("start");

    scene.run_cycle().expect("first cycle");
    assert_eq!(trees.borrow().len(), 2);
    scene.stop();
    assert!(!scene.is_running());
    scene.run_until_idle().expect("settle");

    assert_eq!(trees.borrow().len(), 2);
    let current = scene.current_tree().expect("tree");
    assert_eq!(current.prop("plane"), Some(&json!("3")));
}

#[test]
fn failing_callback_does_not_abort_the_scene() {
    let shell = Shell::new(sample::registry());
    let jsons = Rc::new(RefCell::new(Vec::new()));
    let callbacks = {
        let jsons = Rc::clone(&jsons);
        RenderCallbacks::new()
            .on_tree_update(|_tree| anyhow::bail!("viewer went away"))
            .on_json_update(move |json| {
                jsons.borrow_mut().push(json.to_string());
                Ok(())
            })
    };
    let scene = shell
        .start_renderer(sample::MODEL_PATH, callbacks)
        .expect("start despite callback failure");
    scene.run_until_idle().expect("settle");

    assert!(jsons.borrow().is_empty(), "tree callback failure skips the JSON form");
    assert_eq!(
        scene.current_tree().and_then(|tree| tree.prop("plane").cloned()),
        Some(json!("3"))
    );
}

#[test]
fn value_default_export_is_an_invalid_root() {
    let mut registry = sample::registry();
    registry.register("models/config", Module::new(json!({"units": "mm"})));
    let shell = Shell::new(registry);

    let err = shell
        .start_renderer("models/config", RenderCallbacks::new())
        .unwrap_err();
    assert!(matches!(err, ShellError::InvalidRootExport { found: "object", .. }));
    assert!(matches!(
        shell.start_renderer("models/missing", RenderCallbacks::new()),
        Err(ShellError::ModuleNotFound { .. })
    ));
}

#[test]
fn sample_model_runs_under_the_test_rule() {
    let mut rule = SceneTestRule::new();
    let model = sample::my_model();
    let root = NodeDescription::component(&sample::main_component(&model)).build();
    let initial = rule.set_content(&root).expect("mount");
    assert_eq!(initial.prop("plane"), Some(&json!("1")));

    rule.pump_until_idle().expect("settle");
    assert_eq!(rule.emission_count(), 2);
    assert_eq!(rule.flush_count(), 2);
    assert_eq!(
        rule.tree().and_then(|tree| tree.prop("plane").cloned()),
        Some(json!(sample::FINAL_PLANE.to_string()))
    );
}
