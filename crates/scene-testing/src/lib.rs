//! Testing utilities and harness for scene-core components

pub mod testing;

pub use testing::*;

pub mod prelude {
    pub use crate::testing::*;
}
