//! Device resources materialized from the resource graph.
//!
//! - [`DeviceTexture`] - a cached device object for one logical resource
//! - [`ResourceCache`] - name-keyed cache with creation, resize and eviction

mod cache;
mod texture;

pub use cache::{ResolveOutcome, ResourceCache};
pub use texture::{DeviceObject, DeviceTexture};
