//! Dummy GPU device for testing and development.
//!
//! This device doesn't perform actual GPU operations. It hands out unique
//! handles, tracks which objects are alive, and records every command so
//! tests can assert on the exact sequence the executor produced.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;

use crate::error::ExecutorError;
use crate::types::{
    BufferDescriptor, Color, SamplerDescriptor, ScissorRect, TextureDescriptor, Viewport,
};

use super::{
    BufferId, CommandBuffer, DescriptorSetId, DescriptorSetLayoutId, DeviceCapabilities,
    FramebufferId, FramebufferInfo, GpuDevice, InputAssemblerId, InputAssemblerInfo,
    PipelineKey, PipelineStateId, RenderPassId, RenderPassInfo, SamplerId, SetIndex, TextureId,
};

/// A command recorded by [`DummyDevice`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    Begin,
    End,
    BeginRenderPass {
        render_pass: RenderPassId,
        framebuffer: FramebufferId,
        render_area: ScissorRect,
        clear_colors: Vec<Color>,
        clear_depth: f32,
        clear_stencil: u32,
    },
    EndRenderPass,
    BindPipelineState(PipelineStateId),
    BindDescriptorSet {
        index: SetIndex,
        set: DescriptorSetId,
        dynamic_offsets: Vec<u32>,
    },
    BindInputAssembler(InputAssemblerId),
    Draw(InputAssemblerId),
    UpdateBuffer {
        buffer: BufferId,
        size: usize,
    },
    SetViewport(Viewport),
    SetScissor(ScissorRect),
}

/// A resource bound into a descriptor set slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorBinding {
    Texture(TextureId),
    Buffer(BufferId),
}

/// One descriptor slot. A combined image sampler fills both halves.
#[derive(Debug, Clone, Copy, Default)]
struct SlotBinding {
    resource: Option<DescriptorBinding>,
    sampler: Option<SamplerId>,
}

#[derive(Debug, Default)]
struct DummyState {
    next_handle: u64,
    textures: HashMap<TextureId, TextureDescriptor>,
    buffers: HashMap<BufferId, Vec<u8>>,
    framebuffers: HashMap<FramebufferId, FramebufferInfo>,
    render_passes: HashMap<RenderPassId, RenderPassInfo>,
    descriptor_sets: HashMap<DescriptorSetId, HashMap<u32, SlotBinding>>,
    updated_sets: HashSet<DescriptorSetId>,
    samplers: HashMap<SamplerDescriptor, SamplerId>,
    pipelines: HashMap<PipelineKey, PipelineStateId>,
    commands: Vec<RecordedCommand>,
    submissions: usize,
}

impl DummyState {
    fn next(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }
}

/// Dummy GPU device.
#[derive(Debug)]
pub struct DummyDevice {
    capabilities: DeviceCapabilities,
    state: Mutex<DummyState>,
}

impl DummyDevice {
    /// Create a new dummy device.
    pub fn new() -> Self {
        Self::with_capabilities(DeviceCapabilities::default())
    }

    /// Create a dummy device reporting the given capabilities.
    pub fn with_capabilities(capabilities: DeviceCapabilities) -> Self {
        Self {
            capabilities,
            state: Mutex::new(DummyState::default()),
        }
    }

    /// Every command recorded since creation or the last [`clear_commands`](Self::clear_commands).
    pub fn commands(&self) -> Vec<RecordedCommand> {
        self.state.lock().commands.clone()
    }

    /// Forget recorded commands.
    pub fn clear_commands(&self) {
        self.state.lock().commands.clear();
    }

    /// Number of times [`GpuDevice::submit`] was called.
    pub fn submit_count(&self) -> usize {
        self.state.lock().submissions
    }

    /// Number of live textures.
    pub fn live_texture_count(&self) -> usize {
        self.state.lock().textures.len()
    }

    /// Descriptor of a live texture, reflecting in-place resizes.
    pub fn texture_descriptor(&self, texture: TextureId) -> Option<TextureDescriptor> {
        self.state.lock().textures.get(&texture).cloned()
    }

    /// Number of live buffers.
    pub fn live_buffer_count(&self) -> usize {
        self.state.lock().buffers.len()
    }

    /// Contents of a buffer as `f32` values.
    pub fn buffer_f32(&self, buffer: BufferId) -> Option<Vec<f32>> {
        self.state
            .lock()
            .buffers
            .get(&buffer)
            .map(|bytes| {
                bytes
                    .chunks_exact(4)
                    .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
                    .collect()
            })
    }

    /// Description of a live framebuffer.
    pub fn framebuffer_info(&self, framebuffer: FramebufferId) -> Option<FramebufferInfo> {
        self.state.lock().framebuffers.get(&framebuffer).cloned()
    }

    /// Number of live framebuffers.
    pub fn live_framebuffer_count(&self) -> usize {
        self.state.lock().framebuffers.len()
    }

    /// Description a render pass object was created with.
    pub fn render_pass_info(&self, render_pass: RenderPassId) -> Option<RenderPassInfo> {
        self.state.lock().render_passes.get(&render_pass).cloned()
    }

    /// Number of render pass objects ever created.
    pub fn render_pass_count(&self) -> usize {
        self.state.lock().render_passes.len()
    }

    /// Texture or buffer bound at a descriptor set slot.
    pub fn binding(&self, set: DescriptorSetId, binding: u32) -> Option<DescriptorBinding> {
        self.slot(set, binding).and_then(|slot| slot.resource)
    }

    /// Sampler bound at a descriptor set slot.
    pub fn sampler(&self, set: DescriptorSetId, binding: u32) -> Option<SamplerId> {
        self.slot(set, binding).and_then(|slot| slot.sampler)
    }

    fn slot(&self, set: DescriptorSetId, binding: u32) -> Option<SlotBinding> {
        self.state
            .lock()
            .descriptor_sets
            .get(&set)
            .and_then(|slots| slots.get(&binding).copied())
    }

    fn bind(&self, set: DescriptorSetId, binding: u32, update: impl FnOnce(&mut SlotBinding)) {
        let mut state = self.state.lock();
        update(state.descriptor_sets.entry(set).or_default().entry(binding).or_default());
    }

    /// Returns true if the descriptor set was flushed at least once.
    pub fn is_descriptor_set_updated(&self, set: DescriptorSetId) -> bool {
        self.state.lock().updated_sets.contains(&set)
    }

    fn record(&self, command: RecordedCommand) {
        log::trace!("DummyDevice: {:?}", command);
        self.state.lock().commands.push(command);
    }
}

impl Default for DummyDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandBuffer for DummyDevice {
    fn begin(&self) {
        self.record(RecordedCommand::Begin);
    }

    fn end(&self) {
        self.record(RecordedCommand::End);
    }

    fn begin_render_pass(
        &self,
        render_pass: RenderPassId,
        framebuffer: FramebufferId,
        render_area: ScissorRect,
        clear_colors: &[Color],
        clear_depth: f32,
        clear_stencil: u32,
    ) {
        self.record(RecordedCommand::BeginRenderPass {
            render_pass,
            framebuffer,
            render_area,
            clear_colors: clear_colors.to_vec(),
            clear_depth,
            clear_stencil,
        });
    }

    fn end_render_pass(&self) {
        self.record(RecordedCommand::EndRenderPass);
    }

    fn bind_pipeline_state(&self, pipeline: PipelineStateId) {
        self.record(RecordedCommand::BindPipelineState(pipeline));
    }

    fn bind_descriptor_set(&self, index: SetIndex, set: DescriptorSetId, dynamic_offsets: &[u32]) {
        self.record(RecordedCommand::BindDescriptorSet {
            index,
            set,
            dynamic_offsets: dynamic_offsets.to_vec(),
        });
    }

    fn bind_input_assembler(&self, input_assembler: InputAssemblerId) {
        self.record(RecordedCommand::BindInputAssembler(input_assembler));
    }

    fn draw(&self, input_assembler: InputAssemblerId) {
        self.record(RecordedCommand::Draw(input_assembler));
    }

    fn update_buffer(&self, buffer: BufferId, data: &[u8]) {
        let mut state = self.state.lock();
        if let Some(contents) = state.buffers.get_mut(&buffer) {
            contents.clear();
            contents.extend_from_slice(data);
        }
        log::trace!("DummyDevice: updating buffer {:?} ({} bytes)", buffer, data.len());
        state.commands.push(RecordedCommand::UpdateBuffer {
            buffer,
            size: data.len(),
        });
    }

    fn set_viewport(&self, viewport: Viewport) {
        self.record(RecordedCommand::SetViewport(viewport));
    }

    fn set_scissor(&self, rect: ScissorRect) {
        self.record(RecordedCommand::SetScissor(rect));
    }
}

impl GpuDevice for DummyDevice {
    fn name(&self) -> &'static str {
        "Dummy"
    }

    fn capabilities(&self) -> DeviceCapabilities {
        self.capabilities
    }

    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ExecutorError> {
        if descriptor.size.width == 0 || descriptor.size.height == 0 {
            return Err(ExecutorError::ResourceCreationFailed(format!(
                "texture {:?} has zero extent",
                descriptor.label
            )));
        }
        log::trace!(
            "DummyDevice: creating texture {:?} ({}x{}x{})",
            descriptor.label,
            descriptor.size.width,
            descriptor.size.height,
            descriptor.size.depth
        );
        let mut state = self.state.lock();
        let id = TextureId(state.next());
        state.textures.insert(id, descriptor.clone());
        Ok(id)
    }

    fn resize_texture(&self, texture: TextureId, width: u32, height: u32) {
        log::trace!("DummyDevice: resizing texture {:?} to {}x{}", texture, width, height);
        if let Some(descriptor) = self.state.lock().textures.get_mut(&texture) {
            descriptor.size.width = width;
            descriptor.size.height = height;
        }
    }

    fn destroy_texture(&self, texture: TextureId) {
        log::trace!("DummyDevice: destroying texture {:?}", texture);
        self.state.lock().textures.remove(&texture);
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ExecutorError> {
        log::trace!(
            "DummyDevice: creating buffer {:?} (size: {})",
            descriptor.label,
            descriptor.size
        );
        let mut state = self.state.lock();
        let id = BufferId(state.next());
        state.buffers.insert(id, vec![0; descriptor.size as usize]);
        Ok(id)
    }

    fn destroy_buffer(&self, buffer: BufferId) {
        log::trace!("DummyDevice: destroying buffer {:?}", buffer);
        self.state.lock().buffers.remove(&buffer);
    }

    fn write_buffer(&self, buffer: BufferId, offset: u64, data: &[u8]) {
        log::trace!(
            "DummyDevice: writing {} bytes to buffer {:?} at offset {}",
            data.len(),
            buffer,
            offset
        );
        if let Some(contents) = self.state.lock().buffers.get_mut(&buffer) {
            let start = offset as usize;
            let end = start + data.len();
            if contents.len() < end {
                contents.resize(end, 0);
            }
            contents[start..end].copy_from_slice(data);
        }
    }

    fn create_render_pass(&self, info: &RenderPassInfo) -> Result<RenderPassId, ExecutorError> {
        log::trace!(
            "DummyDevice: creating render pass ({} colors, depth: {})",
            info.colors.len(),
            info.depth_stencil.is_some()
        );
        let mut state = self.state.lock();
        let id = RenderPassId(state.next());
        state.render_passes.insert(id, info.clone());
        Ok(id)
    }

    fn create_framebuffer(&self, info: &FramebufferInfo) -> Result<FramebufferId, ExecutorError> {
        let mut state = self.state.lock();
        if !state.render_passes.contains_key(&info.render_pass) {
            return Err(ExecutorError::ResourceCreationFailed(format!(
                "framebuffer references unknown render pass {:?}",
                info.render_pass
            )));
        }
        let id = FramebufferId(state.next());
        log::trace!("DummyDevice: creating framebuffer {:?}", id);
        state.framebuffers.insert(id, info.clone());
        Ok(id)
    }

    fn destroy_framebuffer(&self, framebuffer: FramebufferId) {
        log::trace!("DummyDevice: destroying framebuffer {:?}", framebuffer);
        self.state.lock().framebuffers.remove(&framebuffer);
    }

    fn create_descriptor_set(
        &self,
        layout: DescriptorSetLayoutId,
    ) -> Result<DescriptorSetId, ExecutorError> {
        let mut state = self.state.lock();
        let id = DescriptorSetId(state.next());
        log::trace!("DummyDevice: creating descriptor set {:?} for {:?}", id, layout);
        state.descriptor_sets.insert(id, HashMap::new());
        Ok(id)
    }

    fn bind_texture(&self, set: DescriptorSetId, binding: u32, texture: TextureId) {
        self.bind(set, binding, |slot| {
            slot.resource = Some(DescriptorBinding::Texture(texture));
        });
    }

    fn bind_sampler(&self, set: DescriptorSetId, binding: u32, sampler: SamplerId) {
        self.bind(set, binding, |slot| slot.sampler = Some(sampler));
    }

    fn bind_buffer(&self, set: DescriptorSetId, binding: u32, buffer: BufferId) {
        self.bind(set, binding, |slot| {
            slot.resource = Some(DescriptorBinding::Buffer(buffer));
        });
    }

    fn update_descriptor_set(&self, set: DescriptorSetId) {
        log::trace!("DummyDevice: updating descriptor set {:?}", set);
        self.state.lock().updated_sets.insert(set);
    }

    fn get_sampler(&self, descriptor: &SamplerDescriptor) -> SamplerId {
        let mut state = self.state.lock();
        if let Some(id) = state.samplers.get(descriptor) {
            return *id;
        }
        let id = SamplerId(state.next());
        state.samplers.insert(*descriptor, id);
        id
    }

    fn create_input_assembler(
        &self,
        info: &InputAssemblerInfo,
    ) -> Result<InputAssemblerId, ExecutorError> {
        let mut state = self.state.lock();
        if let Some(missing) = info
            .vertex_buffers
            .iter()
            .chain(info.index_buffer.iter())
            .find(|buffer| !state.buffers.contains_key(*buffer))
        {
            return Err(ExecutorError::ResourceCreationFailed(format!(
                "input assembler references unknown buffer {missing:?}"
            )));
        }
        Ok(InputAssemblerId(state.next()))
    }

    fn get_pipeline_state(&self, key: &PipelineKey) -> PipelineStateId {
        let mut state = self.state.lock();
        if let Some(id) = state.pipelines.get(key) {
            return *id;
        }
        let id = PipelineStateId(state.next());
        state.pipelines.insert(*key, id);
        id
    }

    fn command_buffer(&self) -> &dyn CommandBuffer {
        self
    }

    fn submit(&self) {
        log::trace!("DummyDevice: submitting command buffer");
        self.state.lock().submissions += 1;
    }
}

static_assertions::assert_impl_all!(DummyDevice: Send, Sync);
