//! GPU abstraction consumed by the executor.
//!
//! The executor never talks to a graphics API directly. It drives a
//! [`GpuDevice`] through a fixed set of operations (create, destroy, bind,
//! draw) and records into the device's single [`CommandBuffer`]. Devices hand
//! out opaque, copyable handles; what a handle refers to is the device's
//! business.
//!
//! # Available Devices
//!
//! - `dummy` (default): records every call for inspection in tests

#[cfg(feature = "dummy")]
pub mod dummy;

use bitflags::bitflags;

use crate::error::ExecutorError;
use crate::graph::{LoadOp, StoreOp};
use crate::types::{
    BufferDescriptor, Color, SamplerDescriptor, ScissorRect, TextureDescriptor, TextureFormat,
    Viewport,
};

#[cfg(feature = "dummy")]
pub use dummy::{DescriptorBinding, DummyDevice, RecordedCommand};

// ============================================================================
// Handles
// ============================================================================

macro_rules! device_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);

        impl $name {
            /// Get the raw handle value.
            pub fn raw(&self) -> u64 {
                self.0
            }
        }
    };
}

device_handle!(
    /// Handle to a device texture.
    TextureId
);
device_handle!(
    /// Handle to a device buffer.
    BufferId
);
device_handle!(
    /// Handle to a framebuffer.
    FramebufferId
);
device_handle!(
    /// Handle to a render pass object.
    RenderPassId
);
device_handle!(
    /// Handle to a descriptor set.
    DescriptorSetId
);
device_handle!(
    /// Handle to a descriptor set layout.
    DescriptorSetLayoutId
);
device_handle!(
    /// Handle to a cached sampler.
    SamplerId
);
device_handle!(
    /// Handle to a pipeline state object.
    PipelineStateId
);
device_handle!(
    /// Handle to an input assembler (vertex + index buffer binding).
    InputAssemblerId
);
device_handle!(
    /// Handle to a compiled shader variant.
    ShaderId
);
device_handle!(
    /// Handle to a material pass.
    ShaderPassId
);

// ============================================================================
// Descriptor set slots
// ============================================================================

/// Descriptor set indices used when binding sets on the command buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetIndex {
    /// Pass-global data (camera, lights, render data).
    Global = 0,
    /// Material pass data.
    Material = 1,
    /// Per-draw local data.
    Local = 2,
    /// Per-phase data of the queue's layout.
    Phase = 3,
}

/// Well-known bindings of the local descriptor set.
pub mod local_binding {
    /// Per-draw local uniform block.
    pub const LOCAL: u32 = 0;
    /// Forward light uniform block (volumetric light gather).
    pub const FORWARD_LIGHT: u32 = 1;
}

// ============================================================================
// Render pass description
// ============================================================================

bitflags! {
    /// Memory access flags used for attachment barriers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessFlags: u32 {
        const COLOR_ATTACHMENT_WRITE = 1 << 0;
        const DEPTH_STENCIL_ATTACHMENT_WRITE = 1 << 1;
        const SHADER_READ = 1 << 2;
    }
}

impl AccessFlags {
    /// No access.
    pub const NONE: Self = Self::empty();
}

/// Access transition around a render pass attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeneralBarrier {
    /// Access that must be preserved when the pass begins.
    pub prev_access: AccessFlags,
    /// Access that must be visible after the pass ends.
    pub next_access: AccessFlags,
}

impl GeneralBarrier {
    /// Derive the barrier for an attachment from its load and store ops.
    ///
    /// Loading requires the previous write to be preserved; storing makes the
    /// write visible to later passes.
    pub fn for_attachment(load_op: LoadOp, store_op: StoreOp, write: AccessFlags) -> Self {
        Self {
            prev_access: if load_op == LoadOp::Load {
                write
            } else {
                AccessFlags::NONE
            },
            next_access: if store_op == StoreOp::Store {
                write
            } else {
                AccessFlags::NONE
            },
        }
    }
}

/// Color attachment of a render pass object.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorAttachmentInfo {
    pub format: TextureFormat,
    pub sample_count: u32,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    pub barrier: GeneralBarrier,
}

impl Default for ColorAttachmentInfo {
    fn default() -> Self {
        Self {
            format: TextureFormat::Rgba8Unorm,
            sample_count: 1,
            load_op: LoadOp::Clear,
            store_op: StoreOp::Store,
            barrier: GeneralBarrier::for_attachment(
                LoadOp::Clear,
                StoreOp::Store,
                AccessFlags::COLOR_ATTACHMENT_WRITE,
            ),
        }
    }
}

/// Depth-stencil attachment of a render pass object.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthStencilAttachmentInfo {
    pub format: TextureFormat,
    pub sample_count: u32,
    pub depth_load_op: LoadOp,
    pub depth_store_op: StoreOp,
    pub stencil_load_op: LoadOp,
    pub stencil_store_op: StoreOp,
    pub barrier: GeneralBarrier,
}

/// Description of a render pass object.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenderPassInfo {
    pub colors: Vec<ColorAttachmentInfo>,
    pub depth_stencil: Option<DepthStencilAttachmentInfo>,
}

/// Description of a framebuffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramebufferInfo {
    pub render_pass: RenderPassId,
    pub color_textures: Vec<TextureId>,
    pub depth_stencil_texture: Option<TextureId>,
}

/// Vertex and index buffers bound together for drawing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputAssemblerInfo {
    pub vertex_buffers: Vec<BufferId>,
    pub index_buffer: Option<BufferId>,
    pub index_count: u32,
}

/// Everything that selects a pipeline state object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub shader_pass: ShaderPassId,
    pub shader: ShaderId,
    pub render_pass: RenderPassId,
    pub input_assembler: InputAssemblerId,
}

/// Device properties the executor depends on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceCapabilities {
    /// `1.0` if screen space Y points up, `-1.0` if it points down.
    pub screen_space_sign_y: f32,
    /// `-1.0` for OpenGL-style clip depth, `0.0` for `[0, 1]`.
    pub clip_space_min_z: f32,
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self {
            screen_space_sign_y: -1.0,
            clip_space_min_z: 0.0,
        }
    }
}

// ============================================================================
// Device and command buffer
// ============================================================================

/// Command recording interface.
///
/// The executor begins the buffer once per frame, appends every pass into
/// it, and ends it before submitting.
pub trait CommandBuffer: Send + Sync {
    fn begin(&self);

    fn end(&self);

    fn begin_render_pass(
        &self,
        render_pass: RenderPassId,
        framebuffer: FramebufferId,
        render_area: ScissorRect,
        clear_colors: &[Color],
        clear_depth: f32,
        clear_stencil: u32,
    );

    fn end_render_pass(&self);

    fn bind_pipeline_state(&self, pipeline: PipelineStateId);

    fn bind_descriptor_set(&self, index: SetIndex, set: DescriptorSetId, dynamic_offsets: &[u32]);

    fn bind_input_assembler(&self, input_assembler: InputAssemblerId);

    fn draw(&self, input_assembler: InputAssemblerId);

    /// Upload data into a buffer in command order.
    fn update_buffer(&self, buffer: BufferId, data: &[u8]);

    fn set_viewport(&self, viewport: Viewport);

    fn set_scissor(&self, rect: ScissorRect);
}

/// Device interface.
///
/// All methods take `&self`; implementations synchronize internally.
pub trait GpuDevice: Send + Sync + 'static {
    /// Get the device name.
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> DeviceCapabilities;

    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ExecutorError>;

    /// Resize a texture in place, keeping its handle.
    fn resize_texture(&self, texture: TextureId, width: u32, height: u32);

    fn destroy_texture(&self, texture: TextureId);

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ExecutorError>;

    fn destroy_buffer(&self, buffer: BufferId);

    /// Upload data to a buffer immediately, outside command recording.
    fn write_buffer(&self, buffer: BufferId, offset: u64, data: &[u8]);

    fn create_render_pass(&self, info: &RenderPassInfo) -> Result<RenderPassId, ExecutorError>;

    fn create_framebuffer(&self, info: &FramebufferInfo) -> Result<FramebufferId, ExecutorError>;

    fn destroy_framebuffer(&self, framebuffer: FramebufferId);

    fn create_descriptor_set(
        &self,
        layout: DescriptorSetLayoutId,
    ) -> Result<DescriptorSetId, ExecutorError>;

    fn bind_texture(&self, set: DescriptorSetId, binding: u32, texture: TextureId);

    fn bind_sampler(&self, set: DescriptorSetId, binding: u32, sampler: SamplerId);

    fn bind_buffer(&self, set: DescriptorSetId, binding: u32, buffer: BufferId);

    /// Flush pending bindings of a descriptor set.
    fn update_descriptor_set(&self, set: DescriptorSetId);

    /// Get a cached sampler matching the descriptor.
    fn get_sampler(&self, descriptor: &SamplerDescriptor) -> SamplerId;

    fn create_input_assembler(
        &self,
        info: &InputAssemblerInfo,
    ) -> Result<InputAssemblerId, ExecutorError>;

    /// Get or create the pipeline state for a pass/shader/render pass/geometry combination.
    fn get_pipeline_state(&self, key: &PipelineKey) -> PipelineStateId;

    /// The device's primary command buffer.
    fn command_buffer(&self) -> &dyn CommandBuffer;

    /// Submit the primary command buffer to the device queue.
    fn submit(&self);
}
