//! Resource management
//!
//! Ownership of native textures and views, the proxy creating them from
//! decoded images and typed arrays, and the texture cache.

mod arena;
mod cache;
pub mod dds;
mod proxy;
mod texture;

pub use arena::*;
pub use cache::*;
pub use proxy::*;
pub use texture::*;
