//! Map types shared by the renderer and the module shell.

/// Unordered map used for the renderer's instance table and the shell's
/// module registry. Backed by `hashbrown` unless `std-hash` is enabled.
pub mod map {
    #[cfg(feature = "std-hash")]
    pub use std::collections::HashMap;

    #[cfg(not(feature = "std-hash"))]
    pub use hashbrown::HashMap;
}

/// Insertion-ordered map; the scheduler's pending set relies on its order.
pub use indexmap::IndexMap;
