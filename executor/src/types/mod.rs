//! Common types and descriptors for device resources.
//!
//! This module contains format enums, usage flags, and descriptor structs
//! used throughout the executor.

mod buffer;
mod common;
mod sampler;
mod texture;

pub use buffer::{BufferDescriptor, BufferUsage};
pub use common::{Color, Extent3d, NormalizedRect, ScissorRect, Viewport};
pub use sampler::{AddressMode, FilterMode, SamplerDescriptor};
pub use texture::{TextureDescriptor, TextureDimension, TextureFormat, TextureUsage};
