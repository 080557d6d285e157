//! Shared building blocks for the VKVL validation layer: configuration,
//! the core error type, typed handles for reports, and the concurrent
//! handle table every tracked Vulkan object lives in.

pub mod config;
pub mod error;
pub mod handle;
pub mod object_map;

pub use error::CoreError;
pub use handle::TypedHandle;
pub use object_map::ObjectMap;
