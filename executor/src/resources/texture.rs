//! Device texture cache entries.

use crate::backend::{FramebufferId, TextureId};
use crate::graph::{ResourceDesc, ResourceTraits, SwapchainTarget};
use crate::types::SamplerDescriptor;

/// The device object behind a logical resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceObject {
    /// Texture created and owned by the cache.
    Managed(TextureId),
    /// Texture supplied by the caller.
    Persistent(TextureId),
    /// Externally supplied framebuffer.
    Framebuffer(FramebufferId),
    /// Presentation surface.
    Swapchain(SwapchainTarget),
}

impl DeviceObject {
    /// Returns true if the cache created this object and must destroy it.
    pub fn is_owned(&self) -> bool {
        matches!(self, Self::Managed(_))
    }
}

/// A materialized logical resource.
///
/// Holds the device object together with the description and traits it
/// was created or last refreshed from.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceTexture {
    pub object: DeviceObject,
    pub desc: ResourceDesc,
    pub traits: ResourceTraits,
    pub sampler: SamplerDescriptor,
}

impl DeviceTexture {
    /// The sampleable texture, if the object has one.
    pub fn texture(&self) -> Option<TextureId> {
        match self.object {
            DeviceObject::Managed(texture) | DeviceObject::Persistent(texture) => Some(texture),
            DeviceObject::Swapchain(target) => Some(target.color_texture),
            DeviceObject::Framebuffer(_) => None,
        }
    }

    pub fn framebuffer(&self) -> Option<FramebufferId> {
        match self.object {
            DeviceObject::Framebuffer(framebuffer) => Some(framebuffer),
            _ => None,
        }
    }

    pub fn swapchain(&self) -> Option<&SwapchainTarget> {
        match &self.object {
            DeviceObject::Swapchain(target) => Some(target),
            _ => None,
        }
    }

    /// Returns true if a swapchain or framebuffer provides the attachment.
    pub fn is_backed(&self) -> bool {
        matches!(
            self.object,
            DeviceObject::Framebuffer(_) | DeviceObject::Swapchain(_)
        )
    }

    /// Extent of the render target this resource provides.
    pub fn extent(&self) -> (u32, u32) {
        match &self.object {
            DeviceObject::Swapchain(target) => (target.width, target.height),
            _ => (self.desc.width, self.desc.height),
        }
    }
}
