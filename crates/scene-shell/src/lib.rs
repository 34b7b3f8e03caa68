//! Application shell: resolves a root component from the module registry,
//! mounts it and forwards every rendered tree to the caller.

mod config;
mod error;
mod module;
mod shell;

pub mod sample;

pub use config::ShellConfig;
pub use error::ShellError;
pub use module::{Export, Module, ModuleRegistry};
pub use shell::{RenderCallbacks, RunningScene, Shell};
