use std::path::PathBuf;

use scene_core::RenderError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShellError {
    #[error("no module registered at `{}`", path.display())]
    ModuleNotFound { path: PathBuf },
    /// The default export of the root module is not a component.
    #[error("expected the default export of `{}` to be a component, got {found}", path.display())]
    InvalidRootExport { path: PathBuf, found: &'static str },
    #[error("invalid value {value:?} for {variable}")]
    InvalidConfig {
        variable: &'static str,
        value: String,
    },
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("failed to serialize rendered tree")]
    Json(#[from] serde_json::Error),
}
