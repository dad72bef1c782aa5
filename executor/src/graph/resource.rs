//! Resource graph: named logical resources and their descriptions.
//!
//! The vertex name is the stable identity the executor uses to cache device
//! objects across frames. Descriptions may change between frames (e.g. on
//! window resize); the resource cache reconciles its device objects with the
//! current description every time a resource is resolved.

use std::collections::HashMap;

use bitflags::bitflags;

use crate::backend::{BufferId, FramebufferId, TextureId};
use crate::error::ExecutorError;
use crate::types::{
    SamplerDescriptor, TextureDescriptor, TextureDimension, TextureFormat, TextureUsage,
};

/// Handle to a vertex of the [`ResourceGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceId(u32);

impl ResourceId {
    /// Get the index of this resource.
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Render target owned by a presentation surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SwapchainTarget {
    pub color_texture: TextureId,
    pub depth_stencil_texture: Option<TextureId>,
    pub width: u32,
    pub height: u32,
}

/// What backs a logical resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceKind {
    /// Texture created and owned by the executor.
    ManagedTexture,
    /// Buffer created and owned by the executor.
    ManagedBuffer,
    /// Externally owned texture.
    PersistentTexture(TextureId),
    /// Externally owned buffer.
    PersistentBuffer(BufferId),
    /// Externally supplied framebuffer.
    Framebuffer(FramebufferId),
    /// Presentation surface.
    Swapchain(SwapchainTarget),
    /// Reinterpretation of another resource with a different format.
    FormatView { parent: String, format: TextureFormat },
    /// Mip/slice range of another resource.
    SubresourceView {
        parent: String,
        first_mip: u32,
        first_slice: u32,
    },
}

impl ResourceKind {
    /// Short name of the kind, for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ManagedTexture => "managed texture",
            Self::ManagedBuffer => "managed buffer",
            Self::PersistentTexture(_) => "persistent texture",
            Self::PersistentBuffer(_) => "persistent buffer",
            Self::Framebuffer(_) => "framebuffer",
            Self::Swapchain(_) => "swapchain",
            Self::FormatView { .. } => "format view",
            Self::SubresourceView { .. } => "subresource view",
        }
    }
}

bitflags! {
    /// How a resource is used by passes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ResourceFlags: u32 {
        const COLOR_ATTACHMENT = 1 << 0;
        const DEPTH_STENCIL_ATTACHMENT = 1 << 1;
        const INPUT_ATTACHMENT = 1 << 2;
        const SAMPLED = 1 << 3;
        const STORAGE = 1 << 4;
        const TRANSFER_SRC = 1 << 5;
        const TRANSFER_DST = 1 << 6;
        const SHADING_RATE = 1 << 7;
    }
}

impl ResourceFlags {
    /// Device usage mask implied by the flags.
    pub fn texture_usage(self) -> TextureUsage {
        const MAPPING: [(ResourceFlags, TextureUsage); 8] = [
            (ResourceFlags::COLOR_ATTACHMENT, TextureUsage::COLOR_ATTACHMENT),
            (
                ResourceFlags::DEPTH_STENCIL_ATTACHMENT,
                TextureUsage::DEPTH_STENCIL_ATTACHMENT,
            ),
            (ResourceFlags::INPUT_ATTACHMENT, TextureUsage::INPUT_ATTACHMENT),
            (ResourceFlags::SAMPLED, TextureUsage::TEXTURE_BINDING),
            (ResourceFlags::STORAGE, TextureUsage::STORAGE_BINDING),
            (ResourceFlags::TRANSFER_SRC, TextureUsage::COPY_SRC),
            (ResourceFlags::TRANSFER_DST, TextureUsage::COPY_DST),
            (ResourceFlags::SHADING_RATE, TextureUsage::SHADING_RATE),
        ];
        MAPPING
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .fold(TextureUsage::empty(), |usage, (_, bit)| usage | *bit)
    }
}

/// Description of a logical resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceDesc {
    pub dimension: TextureDimension,
    pub format: TextureFormat,
    pub width: u32,
    pub height: u32,
    pub depth_or_array_size: u32,
    pub mip_levels: u32,
    pub sample_count: u32,
    pub flags: ResourceFlags,
}

impl ResourceDesc {
    /// A single-sampled 2D texture.
    pub fn texture_2d(width: u32, height: u32, format: TextureFormat, flags: ResourceFlags) -> Self {
        Self {
            dimension: TextureDimension::D2,
            format,
            width,
            height,
            depth_or_array_size: 1,
            mip_levels: 1,
            sample_count: 1,
            flags,
        }
    }

    /// Device texture descriptor for this description.
    pub fn texture_descriptor(&self, label: &str) -> TextureDescriptor {
        let mut descriptor =
            TextureDescriptor::new_2d(self.width, self.height, self.format, self.flags.texture_usage())
                .with_label(label);
        descriptor.dimension = self.dimension;
        descriptor.size.depth = self.depth_or_array_size.max(1);
        descriptor.mip_level_count = self.mip_levels.max(1);
        descriptor.sample_count = self.sample_count.max(1);
        descriptor
    }
}

/// Lifetime policy of a logical resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Residency {
    /// Lives while the frame graph uses it.
    #[default]
    Managed,
    /// Lives until explicitly released.
    Persistent,
    /// Owned outside the executor.
    External,
    /// Presentation surface.
    Backbuffer,
    /// Transient attachment with no backing memory.
    Memoryless,
}

/// Traits of a logical resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ResourceTraits {
    pub residency: Residency,
}

impl ResourceTraits {
    pub fn new(residency: Residency) -> Self {
        Self { residency }
    }

    /// Returns true if unused frames may evict the resource.
    pub fn is_evictable(&self) -> bool {
        matches!(self.residency, Residency::Managed | Residency::Memoryless)
    }
}

/// A vertex of the resource graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub name: String,
    pub kind: ResourceKind,
    pub desc: ResourceDesc,
    pub traits: ResourceTraits,
    pub sampler: SamplerDescriptor,
}

/// Named logical resources of the render pipeline.
#[derive(Debug, Clone, Default)]
pub struct ResourceGraph {
    resources: Vec<Resource>,
    index: HashMap<String, ResourceId>,
}

impl ResourceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource, or replace the resource with the same name in place.
    pub fn add_resource(
        &mut self,
        name: impl Into<String>,
        kind: ResourceKind,
        desc: ResourceDesc,
        traits: ResourceTraits,
    ) -> ResourceId {
        let name = name.into();
        let resource = Resource {
            name: name.clone(),
            kind,
            desc,
            traits,
            sampler: SamplerDescriptor::linear(),
        };
        if let Some(&id) = self.index.get(&name) {
            self.resources[id.index()] = resource;
            return id;
        }
        let id = ResourceId(self.resources.len() as u32);
        self.resources.push(resource);
        self.index.insert(name, id);
        id
    }

    /// Add a texture the executor creates on first use.
    pub fn add_managed_texture(&mut self, name: impl Into<String>, desc: ResourceDesc) -> ResourceId {
        self.add_resource(
            name,
            ResourceKind::ManagedTexture,
            desc,
            ResourceTraits::new(Residency::Managed),
        )
    }

    /// Add an externally owned texture.
    pub fn add_persistent_texture(
        &mut self,
        name: impl Into<String>,
        texture: TextureId,
        desc: ResourceDesc,
    ) -> ResourceId {
        self.add_resource(
            name,
            ResourceKind::PersistentTexture(texture),
            desc,
            ResourceTraits::new(Residency::Persistent),
        )
    }

    /// Add an externally supplied framebuffer.
    pub fn add_framebuffer(
        &mut self,
        name: impl Into<String>,
        framebuffer: FramebufferId,
        desc: ResourceDesc,
    ) -> ResourceId {
        self.add_resource(
            name,
            ResourceKind::Framebuffer(framebuffer),
            desc,
            ResourceTraits::new(Residency::External),
        )
    }

    /// Add a presentation surface.
    pub fn add_swapchain(
        &mut self,
        name: impl Into<String>,
        target: SwapchainTarget,
        format: TextureFormat,
    ) -> ResourceId {
        let desc = ResourceDesc::texture_2d(
            target.width,
            target.height,
            format,
            ResourceFlags::COLOR_ATTACHMENT,
        );
        self.add_resource(
            name,
            ResourceKind::Swapchain(target),
            desc,
            ResourceTraits::new(Residency::Backbuffer),
        )
    }

    /// Look up a resource id by name.
    pub fn vertex(&self, name: &str) -> Option<ResourceId> {
        self.index.get(name).copied()
    }

    /// Look up a resource by name.
    pub fn get(&self, name: &str) -> Option<&Resource> {
        self.vertex(name).map(|id| &self.resources[id.index()])
    }

    /// Look up a resource by name, failing with a configuration error.
    pub fn require(&self, name: &str) -> Result<&Resource, ExecutorError> {
        self.get(name)
            .ok_or_else(|| ExecutorError::ResourceNotFound(name.to_string()))
    }

    /// Change the extent of a resource between frames.
    pub fn set_extent(&mut self, name: &str, width: u32, height: u32) -> Result<(), ExecutorError> {
        let id = self
            .vertex(name)
            .ok_or_else(|| ExecutorError::ResourceNotFound(name.to_string()))?;
        let desc = &mut self.resources[id.index()].desc;
        desc.width = width;
        desc.height = height;
        Ok(())
    }

    /// Change what backs a resource between frames, e.g. a new framebuffer.
    pub fn set_kind(&mut self, name: &str, kind: ResourceKind) -> Result<(), ExecutorError> {
        let id = self
            .vertex(name)
            .ok_or_else(|| ExecutorError::ResourceNotFound(name.to_string()))?;
        self.resources[id.index()].kind = kind;
        Ok(())
    }

    /// Set the sampler used when the resource is bound for sampling.
    pub fn set_sampler(&mut self, name: &str, sampler: SamplerDescriptor) -> Result<(), ExecutorError> {
        let id = self
            .vertex(name)
            .ok_or_else(|| ExecutorError::ResourceNotFound(name.to_string()))?;
        self.resources[id.index()].sampler = sampler;
        Ok(())
    }

    /// Number of resources.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Returns true if the graph has no resources.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Iterate over all resources.
    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.resources.iter()
    }
}
