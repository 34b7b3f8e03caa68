use super::*;
use scene_core::NodeDescription;
use serde_json::json;

fn leaf(name: &'static str) -> Component {
    Component::new(name, |_props| Ok(NodeDescription::leaf("group").build()))
}

#[test]
fn paths_are_normalized_lexically() {
    assert_eq!(normalize(Path::new("./models/model1")), PathBuf::from("models/model1"));
    assert_eq!(
        normalize(Path::new("models/parts/../model1")),
        PathBuf::from("models/model1")
    );
    assert_eq!(normalize(Path::new("../shared")), PathBuf::from("../shared"));
    assert_eq!(normalize(Path::new("../../shared")), PathBuf::from("../../shared"));
}

#[test]
fn load_root_returns_the_default_component() {
    let main = leaf("Main");
    let mut registry = ModuleRegistry::new();
    registry.register(
        "models/model1",
        Module::new(main.clone()).with_export("MyModel", leaf("MyModel")),
    );

    let root = registry.load_root("./models/model1").expect("root");
    assert_eq!(root, main);
    let module = registry.get("models/model1").expect("module");
    assert_eq!(module.export_names().collect::<Vec<_>>(), vec!["MyModel"]);
}

#[test]
fn missing_module_is_reported() {
    let registry = ModuleRegistry::new();
    match registry.load_root("nowhere") {
        Err(ShellError::ModuleNotFound { path }) => assert_eq!(path, PathBuf::from("nowhere")),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn non_component_default_export_is_rejected() {
    let mut registry = ModuleRegistry::new();
    registry.register("settings", Module::new(json!({"units": "mm"})));
    registry.register("empty", Module::new(Value::Null));

    let err = registry.load_root("settings").unwrap_err();
    assert!(matches!(
        err,
        ShellError::InvalidRootExport { found: "object", .. }
    ));
    assert_eq!(
        err.to_string(),
        "expected the default export of `settings` to be a component, got object"
    );
    assert!(matches!(
        registry.load_root("empty"),
        Err(ShellError::InvalidRootExport { found: "null", .. })
    ));
}

#[test]
fn registering_twice_replaces_the_module() {
    let mut registry = ModuleRegistry::new();
    assert!(registry.register("a", Module::new(json!(1))).is_none());
    let replaced = registry.register("./a", Module::new(leaf("A")));
    assert_eq!(replaced.map(|m| m.default_export().kind()), Some("number"));
    assert_eq!(registry.len(), 1);
}
