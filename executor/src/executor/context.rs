//! Mutable state shared by every component of one executor.

use std::collections::HashMap;
use std::sync::Arc;

use crate::backend::{BufferId, DescriptorSetId, GpuDevice};
use crate::config::ExecutorConfig;
use crate::device::{BlitInfo, StatisticsOverlay};
use crate::error::ExecutorError;
use crate::graph::{LayoutGraph, RenderData, ResourceGraph, UpdateFrequency};
use crate::resources::ResourceCache;
use crate::scene::SubmissionTable;
use crate::types::{BufferDescriptor, BufferUsage};

/// Smallest uniform buffer allocated for a render data block.
const MIN_UNIFORM_SIZE: u64 = 16;

/// The global descriptor set and the uniform buffers behind it.
///
/// Render data blocks of passes and queues are uploaded into one buffer per
/// binding. A buffer is recreated only when a block outgrows it.
#[derive(Debug, Default)]
pub struct GlobalDescriptor {
    descriptor_set: Option<DescriptorSetId>,
    uniform_buffers: HashMap<u32, (BufferId, u64)>,
    dirty: bool,
}

impl GlobalDescriptor {
    /// Use the set of the global stage, creating it if the layout graph
    /// declares a layout without a set.
    pub fn new(device: &dyn GpuDevice, layouts: &LayoutGraph) -> Result<Self, ExecutorError> {
        let data = layouts
            .locate_child(None, LayoutGraph::GLOBAL_STAGE)
            .and_then(|stage| layouts.descriptor_set(stage, UpdateFrequency::PerPass));
        let descriptor_set = match data {
            Some(data) => match data.descriptor_set {
                Some(set) => Some(set),
                None => Some(device.create_descriptor_set(data.layout)?),
            },
            None => None,
        };
        Ok(Self {
            descriptor_set,
            ..Self::default()
        })
    }

    pub fn descriptor_set(&self) -> Option<DescriptorSetId> {
        self.descriptor_set
    }

    /// Uniform buffer currently bound at `binding`.
    pub fn uniform_buffer(&self, binding: u32) -> Option<BufferId> {
        self.uniform_buffers.get(&binding).map(|(buffer, _)| *buffer)
    }

    /// Upload every block of `data` in command order.
    pub fn upload(&mut self, device: &dyn GpuDevice, data: &RenderData) -> Result<(), ExecutorError> {
        let Some(set) = self.descriptor_set else {
            return Ok(());
        };
        for (binding, values) in &data.blocks {
            let bytes: &[u8] = bytemuck::cast_slice(values);
            let size = bytes.len() as u64;
            let buffer = match self.uniform_buffers.get(binding).copied() {
                Some((buffer, capacity)) if capacity >= size => buffer,
                previous => {
                    if let Some((old, _)) = previous {
                        device.destroy_buffer(old);
                    }
                    let capacity = size.max(MIN_UNIFORM_SIZE);
                    let buffer = device.create_buffer(
                        &BufferDescriptor::new(capacity, BufferUsage::UNIFORM | BufferUsage::COPY_DST)
                            .with_label(format!("global_ubo_{binding}")),
                    )?;
                    device.bind_buffer(set, *binding, buffer);
                    self.uniform_buffers.insert(*binding, (buffer, capacity));
                    self.dirty = true;
                    buffer
                }
            };
            device.command_buffer().update_buffer(buffer, bytes);
        }
        Ok(())
    }

    /// Flush bindings changed since the last flush.
    pub fn flush(&mut self, device: &dyn GpuDevice) {
        if let (true, Some(set)) = (self.dirty, self.descriptor_set) {
            device.update_descriptor_set(set);
        }
        self.dirty = false;
    }

    pub fn release(&mut self, device: &dyn GpuDevice) {
        for (_, (buffer, _)) in self.uniform_buffers.drain() {
            device.destroy_buffer(buffer);
        }
        self.dirty = false;
    }
}

/// Explicit context handed to passes, queues and tasks.
///
/// Fields are public so callers can borrow them independently, e.g. the
/// resource cache mutably while reading the resource graph.
pub struct ExecutorContext {
    pub device: Arc<dyn GpuDevice>,
    pub resource_graph: ResourceGraph,
    pub layout_graph: LayoutGraph,
    pub resource_cache: ResourceCache,
    pub submissions: SubmissionTable,
    pub config: ExecutorConfig,
    pub global: GlobalDescriptor,
    /// Shared blit geometry, created by the first blit.
    pub blit_info: Option<BlitInfo>,
    pub statistics_overlay: Option<Arc<dyn StatisticsOverlay>>,
}

impl ExecutorContext {
    pub fn new(
        device: Arc<dyn GpuDevice>,
        resource_graph: ResourceGraph,
        layout_graph: LayoutGraph,
        config: ExecutorConfig,
    ) -> Result<Self, ExecutorError> {
        let global = GlobalDescriptor::new(&*device, &layout_graph)?;
        Ok(Self {
            device,
            resource_graph,
            layout_graph,
            resource_cache: ResourceCache::new(),
            submissions: SubmissionTable::new(),
            config,
            global,
            blit_info: None,
            statistics_overlay: None,
        })
    }

    /// Current target extent.
    pub fn extent(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    /// Device and blit geometry, creating the geometry on first use.
    pub fn blit_parts(&mut self) -> Result<(&dyn GpuDevice, &mut BlitInfo), ExecutorError> {
        if self.blit_info.is_none() {
            let info = BlitInfo::new(
                &*self.device,
                self.extent(),
                self.config.lights_per_pass as usize,
                self.config.surface_transform,
            )?;
            log::debug!("ExecutorContext: created blit geometry for {:?}", self.extent());
            self.blit_info = Some(info);
        }
        let info = self
            .blit_info
            .as_mut()
            .ok_or_else(|| ExecutorError::InvalidGraph("blit geometry unavailable".into()))?;
        Ok((&*self.device, info))
    }

    /// Set a new target extent and regenerate the blit quad.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.config.width = width;
        self.config.height = height;
        if let Some(info) = self.blit_info.as_mut() {
            info.resize(&*self.device, width, height);
        }
    }

    /// Destroy cached textures, blit buffers and global uniform buffers.
    pub fn release(&mut self) {
        let device = &*self.device;
        self.resource_cache.release_all(device);
        if let Some(mut info) = self.blit_info.take() {
            info.destroy(device);
        }
        self.global.release(device);
        self.submissions.reset();
    }
}
