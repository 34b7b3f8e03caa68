use std::fmt;
use std::path::{Component as PathComponent, Path, PathBuf};

use indexmap::IndexMap;
use scene_core::collections::map::HashMap;
use scene_core::Component;
use serde_json::Value;

use crate::error::ShellError;

/// A value a module makes available to the shell.
#[derive(Clone)]
pub enum Export {
    Component(Component),
    Value(Value),
}

impl Export {
    /// Short description of the export's kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Export::Component(_) => "component",
            Export::Value(Value::Null) => "null",
            Export::Value(Value::Bool(_)) => "boolean",
            Export::Value(Value::Number(_)) => "number",
            Export::Value(Value::String(_)) => "string",
            Export::Value(Value::Array(_)) => "array",
            Export::Value(Value::Object(_)) => "object",
        }
    }

    pub fn as_component(&self) -> Option<&Component> {
        match self {
            Export::Component(component) => Some(component),
            Export::Value(_) => None,
        }
    }
}

impl fmt::Debug for Export {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Export::Component(component) => f.debug_tuple("Component").field(component).finish(),
            Export::Value(value) => f.debug_tuple("Value").field(value).finish(),
        }
    }
}

impl From<Component> for Export {
    fn from(component: Component) -> Self {
        Export::Component(component)
    }
}

impl From<Value> for Export {
    fn from(value: Value) -> Self {
        Export::Value(value)
    }
}

/// A loadable unit: one default export plus any named ones.
#[derive(Clone, Debug)]
pub struct Module {
    default_export: Export,
    named: IndexMap<String, Export>,
}

impl Module {
    pub fn new(default_export: impl Into<Export>) -> Self {
        Self {
            default_export: default_export.into(),
            named: IndexMap::new(),
        }
    }

    pub fn with_export(mut self, name: impl Into<String>, export: impl Into<Export>) -> Self {
        self.named.insert(name.into(), export.into());
        self
    }

    pub fn default_export(&self) -> &Export {
        &self.default_export
    }

    pub fn export(&self, name: &str) -> Option<&Export> {
        self.named.get(name)
    }

    pub fn export_names(&self) -> impl Iterator<Item = &str> {
        self.named.keys().map(String::as_str)
    }
}

/// Modules addressable by path.
///
/// Paths are normalized lexically, so `./models/../models/a` and `models/a`
/// name the same module. The file system is never consulted.
#[derive(Default)]
pub struct ModuleRegistry {
    modules: HashMap<PathBuf, Module>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `module` at `path`, returning the module it replaced.
    pub fn register(&mut self, path: impl AsRef<Path>, module: Module) -> Option<Module> {
        let path = normalize(path.as_ref());
        log::debug!("registered module `{}`", path.display());
        self.modules.insert(path, module)
    }

    pub fn get(&self, path: impl AsRef<Path>) -> Option<&Module> {
        self.modules.get(&normalize(path.as_ref()))
    }

    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        self.get(path).is_some()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Resolves the default export of the module at `path` as the root component.
    pub fn load_root(&self, path: impl AsRef<Path>) -> Result<Component, ShellError> {
        let path = normalize(path.as_ref());
        let module = self
            .modules
            .get(&path)
            .ok_or_else(|| ShellError::ModuleNotFound { path: path.clone() })?;
        match module.default_export() {
            Export::Component(component) => Ok(component.clone()),
            other => Err(ShellError::InvalidRootExport {
                path,
                found: other.kind(),
            }),
        }
    }
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.modules.keys()).finish()
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for part in path.components() {
        match part {
            PathComponent::CurDir => {}
            PathComponent::ParentDir => {
                let above_start = matches!(
                    normalized.components().next_back(),
                    None | Some(PathComponent::ParentDir)
                );
                if above_start || !normalized.pop() {
                    normalized.push(part);
                }
            }
            other => normalized.push(other),
        }
    }
    normalized
}

#[cfg(test)]
#[path = "tests/module_tests.rs"]
mod tests;
