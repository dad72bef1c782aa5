//! Name-keyed cache of device textures.

use std::collections::HashMap;

use redlilium_core::profiling::profile_scope;

use crate::backend::GpuDevice;
use crate::error::ExecutorError;
use crate::graph::{FrameGraph, Resource, ResourceGraph, ResourceKind};

use super::{DeviceObject, DeviceTexture};

/// How [`ResourceCache::resolve`] obtained its entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// Unchanged since the last resolve.
    Cached,
    /// Created on first use.
    Created,
    /// Same device object, new extent.
    Resized,
    /// The device object behind the name changed.
    Replaced,
}

impl ResolveOutcome {
    /// Returns true if attachments built from the entry must be rebuilt.
    pub fn is_changed(self) -> bool {
        !matches!(self, Self::Cached)
    }
}

/// Cache mapping logical resource names to device objects.
///
/// There is at most one device object per name. Textures the cache creates
/// are resized in place when the description's extent changes; adopted
/// objects (persistent textures, framebuffers, swapchains) are replaced
/// when the resource graph points at a different object.
#[derive(Debug, Default)]
pub struct ResourceCache {
    textures: HashMap<String, DeviceTexture>,
}

impl ResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a logical resource to its device object, creating or
    /// refreshing the cache entry.
    pub fn resolve(
        &mut self,
        device: &dyn GpuDevice,
        resources: &ResourceGraph,
        name: &str,
    ) -> Result<(&DeviceTexture, ResolveOutcome), ExecutorError> {
        let resource = resources.require(name)?;
        let adopted = match &resource.kind {
            ResourceKind::ManagedTexture => None,
            ResourceKind::PersistentTexture(texture) => Some(DeviceObject::Persistent(*texture)),
            ResourceKind::Framebuffer(framebuffer) => Some(DeviceObject::Framebuffer(*framebuffer)),
            ResourceKind::Swapchain(target) => Some(DeviceObject::Swapchain(*target)),
            other => {
                return Err(ExecutorError::UnsupportedResource {
                    name: name.to_string(),
                    kind: other.name(),
                });
            }
        };

        let outcome = if let Some(entry) = self.textures.get_mut(name) {
            Self::refresh(device, entry, resource, adopted)?
        } else {
            let object = match adopted {
                Some(object) => object,
                None => DeviceObject::Managed(
                    device.create_texture(&resource.desc.texture_descriptor(name))?,
                ),
            };
            log::debug!("ResourceCache: created {} as {:?}", name, object);
            self.textures.insert(
                name.to_string(),
                DeviceTexture {
                    object,
                    desc: resource.desc,
                    traits: resource.traits,
                    sampler: resource.sampler,
                },
            );
            ResolveOutcome::Created
        };

        let entry = self
            .textures
            .get(name)
            .ok_or_else(|| ExecutorError::ResourceNotFound(name.to_string()))?;
        Ok((entry, outcome))
    }

    fn refresh(
        device: &dyn GpuDevice,
        entry: &mut DeviceTexture,
        resource: &Resource,
        adopted: Option<DeviceObject>,
    ) -> Result<ResolveOutcome, ExecutorError> {
        let name = resource.name.as_str();
        let resized =
            entry.desc.width != resource.desc.width || entry.desc.height != resource.desc.height;

        let outcome = match (adopted, entry.object) {
            (Some(object), current) if object != current => {
                log::debug!("ResourceCache: replacing {} ({:?} -> {:?})", name, current, object);
                if let DeviceObject::Managed(texture) = current {
                    device.destroy_texture(texture);
                }
                entry.object = object;
                ResolveOutcome::Replaced
            }
            (Some(_), _) if resized => ResolveOutcome::Resized,
            (Some(_), _) => ResolveOutcome::Cached,
            (None, DeviceObject::Managed(texture)) => {
                let recreate = entry.desc.format != resource.desc.format
                    || entry.desc.dimension != resource.desc.dimension
                    || entry.desc.sample_count != resource.desc.sample_count
                    || entry.desc.flags != resource.desc.flags;
                if recreate {
                    log::debug!("ResourceCache: recreating {} with a new description", name);
                    device.destroy_texture(texture);
                    entry.object = DeviceObject::Managed(
                        device.create_texture(&resource.desc.texture_descriptor(name))?,
                    );
                    ResolveOutcome::Replaced
                } else if resized {
                    log::debug!(
                        "ResourceCache: resizing {} to {}x{}",
                        name,
                        resource.desc.width,
                        resource.desc.height
                    );
                    device.resize_texture(texture, resource.desc.width, resource.desc.height);
                    ResolveOutcome::Resized
                } else {
                    ResolveOutcome::Cached
                }
            }
            (None, current) => {
                log::debug!("ResourceCache: {} is no longer adopted ({:?})", name, current);
                entry.object = DeviceObject::Managed(
                    device.create_texture(&resource.desc.texture_descriptor(name))?,
                );
                ResolveOutcome::Replaced
            }
        };

        entry.desc = resource.desc;
        entry.traits = resource.traits;
        entry.sampler = resource.sampler;
        Ok(outcome)
    }

    pub fn get(&self, name: &str) -> Option<&DeviceTexture> {
        self.textures.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.textures.contains_key(name)
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    /// Names of every cached entry, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.textures.keys().map(String::as_str)
    }

    /// Drop one entry, destroying the device object if the cache owns it.
    ///
    /// Returns false if the name was not cached.
    pub fn release(&mut self, device: &dyn GpuDevice, name: &str) -> bool {
        match self.textures.remove(name) {
            Some(entry) => {
                Self::destroy(device, name, &entry);
                true
            }
            None => false,
        }
    }

    /// Release entries the current frame does not use.
    ///
    /// Only resources with evictable residency are released. A cached name
    /// that vanished from the resource graph counts as evictable. Returns
    /// the number of released entries.
    pub fn evict_unused(
        &mut self,
        device: &dyn GpuDevice,
        resources: &ResourceGraph,
        graph: &FrameGraph,
    ) -> usize {
        profile_scope!("ResourceCache::evict_unused");

        let before = self.textures.len();
        self.textures.retain(|name, entry| {
            let evictable = resources
                .get(name)
                .is_none_or(|resource| resource.traits.is_evictable());
            if evictable && !graph.is_resource_used(name) {
                log::debug!("ResourceCache: evicting {}", name);
                Self::destroy(device, name, entry);
                false
            } else {
                true
            }
        });
        before - self.textures.len()
    }

    /// Release every entry.
    pub fn release_all(&mut self, device: &dyn GpuDevice) {
        for (name, entry) in self.textures.drain() {
            Self::destroy(device, &name, &entry);
        }
    }

    fn destroy(device: &dyn GpuDevice, name: &str, entry: &DeviceTexture) {
        if let DeviceObject::Managed(texture) = entry.object {
            log::trace!("ResourceCache: destroying texture {:?} of {}", texture, name);
            device.destroy_texture(texture);
        }
    }
}
