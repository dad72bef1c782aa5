//! Device passes: render pass objects, framebuffers and their queues.
//!
//! A [`DevicePass`] is the device-side counterpart of a raster pass node.
//! Passes are cached across frames under a structural key, so the render
//! pass object and framebuffer survive as long as the pass shape and its
//! attachments stay the same.

use redlilium_core::pool::RecyclePool;

use crate::backend::{
    AccessFlags, ColorAttachmentInfo, DepthStencilAttachmentInfo, DescriptorSetId,
    FramebufferId, FramebufferInfo, GeneralBarrier, GpuDevice, RenderPassId, RenderPassInfo,
    SetIndex, TextureId,
};
use crate::error::ExecutorError;
use crate::executor::ExecutorContext;
use crate::graph::{
    AttachmentType, FrameGraph, LayoutId, NodeId, RasterPass, SwapchainTarget, UpdateFrequency,
};
use crate::types::{Color, ScissorRect, TextureDescriptor, TextureFormat, TextureUsage, Viewport};

use super::{DeviceQueue, FrameContext};

/// Resolved layout of a pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassLayoutInfo {
    pub name: String,
    /// Render stage of the layout graph, `None` for an unnamed layout.
    pub stage: Option<LayoutId>,
    /// Per-pass descriptor set of the stage.
    pub descriptor_set: Option<DescriptorSetId>,
}

/// Per-frame view of a pass handed to its queues and tasks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassFrame {
    pub node: NodeId,
    pub render_pass: RenderPassId,
    pub extent: (u32, u32),
    /// The pass sets an explicit viewport, so scenes keep it.
    pub has_viewport: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DefaultTexture {
    texture: TextureId,
    extent: (u32, u32),
}

/// Attachments gathered from the raster views of a pass.
#[derive(Debug, Default)]
struct Attachments {
    info: RenderPassInfo,
    colors: Vec<TextureId>,
    depth: Option<TextureId>,
    clear_colors: Vec<Color>,
    clear_depth: f32,
    clear_stencil: u32,
    swapchain: Option<SwapchainTarget>,
    framebuffer: Option<FramebufferId>,
    extent: Option<(u32, u32)>,
    changed: bool,
}

/// Device state of a raster pass.
#[derive(Debug)]
pub struct DevicePass {
    node: NodeId,
    layout: PassLayoutInfo,
    render_pass: Option<RenderPassId>,
    render_pass_info: Option<RenderPassInfo>,
    framebuffer: Option<FramebufferId>,
    framebuffer_info: Option<FramebufferInfo>,
    /// Attachment extent the framebuffer was built at.
    framebuffer_extent: (u32, u32),
    default_texture: Option<DefaultTexture>,
    extent: (u32, u32),
    viewport: Viewport,
    has_viewport: bool,
    show_statistics: bool,
    clear_colors: Vec<Color>,
    clear_depth: f32,
    clear_stencil: u32,
    queues: Vec<usize>,
}

impl DevicePass {
    pub fn new(node: NodeId) -> Self {
        Self {
            node,
            layout: PassLayoutInfo::default(),
            render_pass: None,
            render_pass_info: None,
            framebuffer: None,
            framebuffer_info: None,
            framebuffer_extent: (0, 0),
            default_texture: None,
            extent: (0, 0),
            viewport: Viewport::default(),
            has_viewport: false,
            show_statistics: false,
            clear_colors: Vec::new(),
            clear_depth: 1.0,
            clear_stencil: 0,
            queues: Vec::new(),
        }
    }

    /// Bring the pass up to date with its node for this frame.
    ///
    /// Resolves the layout and every attachment, then rebuilds the render
    /// pass object and framebuffer only where their inputs changed.
    pub fn refresh(
        &mut self,
        ctx: &mut ExecutorContext,
        graph: &FrameGraph,
        node: NodeId,
        pass: &RasterPass,
    ) -> Result<(), ExecutorError> {
        self.node = node;
        self.queues.clear();
        self.viewport = pass.viewport;
        self.has_viewport = pass.has_explicit_viewport();
        self.show_statistics = pass.show_statistics;

        self.apply_layout(ctx, graph.layout(node), pass)?;
        let mut attachments = Self::resolve_attachments(ctx, pass)?;
        self.ensure_default_target(ctx, graph.name(node), pass, &mut attachments)?;

        let device = &*ctx.device;
        if self.render_pass_info.as_ref() != Some(&attachments.info) {
            let render_pass = device.create_render_pass(&attachments.info)?;
            log::debug!(
                "DevicePass: created render pass {:?} for {}",
                render_pass,
                graph.name(node)
            );
            self.render_pass = Some(render_pass);
            self.render_pass_info = Some(attachments.info.clone());
            attachments.changed = true;
        }
        self.extent = attachments.extent.unwrap_or_else(|| ctx.extent());
        self.ensure_framebuffer(device, &attachments, self.extent)?;

        self.clear_colors = attachments.clear_colors;
        self.clear_depth = attachments.clear_depth;
        self.clear_stencil = attachments.clear_stencil;
        Ok(())
    }

    /// Resolve the pass layout and bind its compute views.
    fn apply_layout(
        &mut self,
        ctx: &mut ExecutorContext,
        layout_name: &str,
        pass: &RasterPass,
    ) -> Result<(), ExecutorError> {
        let stage = if layout_name.is_empty() {
            None
        } else {
            let stage = ctx.layout_graph.locate_child(None, layout_name).ok_or_else(|| {
                ExecutorError::LayoutNotFound {
                    parent: "<root>".to_string(),
                    name: layout_name.to_string(),
                }
            })?;
            Some(stage)
        };
        let per_pass = stage.and_then(|stage| {
            ctx.layout_graph
                .descriptor_set(stage, UpdateFrequency::PerPass)
        });
        self.layout = PassLayoutInfo {
            name: layout_name.to_string(),
            stage,
            descriptor_set: per_pass.and_then(|data| data.descriptor_set),
        };

        for (name, views) in &pass.compute_views {
            let (entry, _) =
                ctx.resource_cache
                    .resolve(&*ctx.device, &ctx.resource_graph, name)?;
            let texture = entry
                .texture()
                .ok_or_else(|| ExecutorError::UnsupportedResource {
                    name: name.clone(),
                    kind: "framebuffer",
                })?;
            let sampler = ctx.device.get_sampler(&entry.sampler);
            for view in views {
                let descriptor = ctx
                    .layout_graph
                    .descriptor_id(&view.name)
                    .ok_or_else(|| ExecutorError::UnknownDescriptor(view.name.clone()))?;
                let Some(data) = per_pass else { continue };
                let Some(set) = data.descriptor_set else { continue };
                for binding in data.bindings_of(descriptor) {
                    ctx.device.bind_texture(set, binding, texture);
                    ctx.device.bind_sampler(set, binding, sampler);
                }
            }
        }
        if let Some(set) = self.layout.descriptor_set {
            ctx.device.update_descriptor_set(set);
        }
        Ok(())
    }

    fn resolve_attachments(
        ctx: &mut ExecutorContext,
        pass: &RasterPass,
    ) -> Result<Attachments, ExecutorError> {
        let mut out = Attachments {
            clear_depth: 1.0,
            ..Attachments::default()
        };
        for (name, view) in &pass.raster_views {
            let (entry, outcome) =
                ctx.resource_cache
                    .resolve(&*ctx.device, &ctx.resource_graph, name)?;
            out.changed |= outcome.is_changed();

            match view.attachment {
                AttachmentType::RenderTarget => {
                    if entry.desc.format.is_depth_stencil() {
                        return Err(ExecutorError::InvalidGraph(format!(
                            "depth resource {name} bound as a render target"
                        )));
                    }
                    out.info.colors.push(ColorAttachmentInfo {
                        format: entry.desc.format,
                        sample_count: entry.desc.sample_count,
                        load_op: view.load_op,
                        store_op: view.store_op,
                        barrier: GeneralBarrier::for_attachment(
                            view.load_op,
                            view.store_op,
                            AccessFlags::COLOR_ATTACHMENT_WRITE,
                        ),
                    });
                    out.clear_colors.push(view.clear_color);
                    if !entry.is_backed() {
                        out.colors.extend(entry.texture());
                    }
                    if out.extent.is_none() {
                        out.extent = Some(entry.extent());
                    }
                }
                AttachmentType::DepthStencil => {
                    out.info.depth_stencil = Some(DepthStencilAttachmentInfo {
                        format: entry.desc.format,
                        sample_count: entry.desc.sample_count,
                        depth_load_op: view.load_op,
                        depth_store_op: view.store_op,
                        stencil_load_op: view.load_op,
                        stencil_store_op: view.store_op,
                        barrier: GeneralBarrier::for_attachment(
                            view.load_op,
                            view.store_op,
                            AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
                        ),
                    });
                    out.clear_depth = view.clear_depth;
                    out.clear_stencil = view.clear_stencil;
                    if !entry.is_backed() {
                        out.depth = entry.texture();
                    }
                }
                AttachmentType::ShadingRate => {}
            }

            if out.swapchain.is_none() {
                out.swapchain = entry.swapchain().copied();
            }
            if out.framebuffer.is_none() {
                out.framebuffer = entry.framebuffer();
            }
        }
        Ok(out)
    }

    /// Give a pass without any color target a texture of its own.
    fn ensure_default_target(
        &mut self,
        ctx: &ExecutorContext,
        name: &str,
        pass: &RasterPass,
        out: &mut Attachments,
    ) -> Result<(), ExecutorError> {
        if out.info.colors.is_empty() {
            out.info.colors.push(ColorAttachmentInfo::default());
            out.clear_colors.push(Color::default());
        }
        if !out.colors.is_empty() || out.swapchain.is_some() || out.framebuffer.is_some() {
            return Ok(());
        }

        let extent = if pass.width == 0 || pass.height == 0 {
            ctx.extent()
        } else {
            (pass.width, pass.height)
        };
        let device = &*ctx.device;
        let texture = match self.default_texture {
            Some(current) if current.extent == extent => current.texture,
            Some(current) => {
                device.resize_texture(current.texture, extent.0, extent.1);
                out.changed = true;
                current.texture
            }
            None => {
                let descriptor = TextureDescriptor::new_2d(
                    extent.0,
                    extent.1,
                    TextureFormat::Rgba8Unorm,
                    TextureUsage::COLOR_ATTACHMENT,
                )
                .with_label(format!("{name}_default"));
                out.changed = true;
                device.create_texture(&descriptor)?
            }
        };
        self.default_texture = Some(DefaultTexture { texture, extent });
        out.colors.push(texture);
        out.extent.get_or_insert(extent);
        Ok(())
    }

    /// Rebuild the owned framebuffer when its attachments or their extent
    /// differ from the last build. Attachments resized in place keep their
    /// ids, so the extent is part of the key.
    fn ensure_framebuffer(
        &mut self,
        device: &dyn GpuDevice,
        out: &Attachments,
        extent: (u32, u32),
    ) -> Result<(), ExecutorError> {
        if let Some(adopted) = out.framebuffer {
            if self.framebuffer != Some(adopted) {
                self.destroy_framebuffer(device);
                self.framebuffer = Some(adopted);
            }
            return Ok(());
        }

        let render_pass = self.render_pass.ok_or_else(|| {
            ExecutorError::InvalidGraph("framebuffer requested before render pass".into())
        })?;
        let info = match out.swapchain {
            Some(target) => FramebufferInfo {
                render_pass,
                color_textures: vec![target.color_texture],
                depth_stencil_texture: target.depth_stencil_texture,
            },
            None => FramebufferInfo {
                render_pass,
                color_textures: out.colors.clone(),
                depth_stencil_texture: out.depth,
            },
        };
        if out.changed
            || self.framebuffer_extent != extent
            || self.framebuffer_info.as_ref() != Some(&info)
        {
            self.destroy_framebuffer(device);
            let framebuffer = device.create_framebuffer(&info)?;
            log::trace!(
                "DevicePass: rebuilt framebuffer {:?} at {}x{}",
                framebuffer,
                extent.0,
                extent.1
            );
            self.framebuffer = Some(framebuffer);
            self.framebuffer_info = Some(info);
            self.framebuffer_extent = extent;
        }
        Ok(())
    }

    /// Destroy the framebuffer if this pass created it.
    fn destroy_framebuffer(&mut self, device: &dyn GpuDevice) {
        if let (Some(framebuffer), Some(_)) = (self.framebuffer, self.framebuffer_info.take()) {
            device.destroy_framebuffer(framebuffer);
        }
        self.framebuffer = None;
    }

    pub fn add_queue(&mut self, queue: usize) {
        self.queues.push(queue);
    }

    pub fn queues(&self) -> &[usize] {
        &self.queues
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn layout(&self) -> &PassLayoutInfo {
        &self.layout
    }

    pub fn render_pass(&self) -> Option<RenderPassId> {
        self.render_pass
    }

    pub fn framebuffer(&self) -> Option<FramebufferId> {
        self.framebuffer
    }

    /// Returns true if the framebuffer was created by this pass.
    pub fn owns_framebuffer(&self) -> bool {
        self.framebuffer_info.is_some()
    }

    pub fn default_texture(&self) -> Option<TextureId> {
        self.default_texture.map(|t| t.texture)
    }

    pub fn extent(&self) -> (u32, u32) {
        self.extent
    }

    pub fn frame(&self) -> Result<PassFrame, ExecutorError> {
        let render_pass = self.render_pass.ok_or_else(|| {
            ExecutorError::InvalidGraph("pass recorded before it was refreshed".into())
        })?;
        Ok(PassFrame {
            node: self.node,
            render_pass,
            extent: self.extent,
            has_viewport: self.has_viewport,
        })
    }

    /// Render area of the pass: the explicit viewport if set, else the target.
    pub fn render_area(&self) -> ScissorRect {
        if self.has_viewport {
            let v = &self.viewport;
            ScissorRect::new(v.x as i32, v.y as i32, v.width as u32, v.height as u32)
        } else {
            ScissorRect::from_dimensions(self.extent.0, self.extent.1)
        }
    }

    /// Run every queue's pre-scene tasks.
    pub fn pre_pass(
        &mut self,
        frame: &mut FrameContext<'_>,
        queues: &mut RecyclePool<DeviceQueue>,
    ) -> Result<(), ExecutorError> {
        let pass = self.frame()?;
        for &index in &self.queues {
            queue_mut(queues, index)?.pre_record(frame, &pass)?;
        }
        Ok(())
    }

    /// Record the render pass and every queue inside it.
    pub fn record(
        &mut self,
        frame: &mut FrameContext<'_>,
        queues: &mut RecyclePool<DeviceQueue>,
    ) -> Result<(), ExecutorError> {
        let pass = self.frame()?;
        let framebuffer = self.framebuffer.ok_or_else(|| {
            ExecutorError::InvalidGraph("pass recorded without a framebuffer".into())
        })?;
        let area = self.render_area();
        let device = frame.ctx.device.clone();
        let cmd = device.command_buffer();

        cmd.begin_render_pass(
            pass.render_pass,
            framebuffer,
            area,
            &self.clear_colors,
            self.clear_depth,
            self.clear_stencil,
        );
        if let Some(set) = frame.ctx.global.descriptor_set() {
            cmd.bind_descriptor_set(SetIndex::Global, set, &[]);
        }
        for &index in &self.queues {
            queue_mut(queues, index)?.record(frame, &pass)?;
        }
        if self.show_statistics {
            if let Some(overlay) = frame.ctx.statistics_overlay.clone() {
                overlay.render(pass.render_pass, area, cmd);
            }
        }
        cmd.end_render_pass();
        Ok(())
    }

    /// Drop per-pass submissions and run every queue's post-scene tasks.
    pub fn post_pass(
        &mut self,
        frame: &mut FrameContext<'_>,
        queues: &mut RecyclePool<DeviceQueue>,
    ) -> Result<(), ExecutorError> {
        frame.ctx.submissions.clear_per_pass();
        let pass = self.frame()?;
        for &index in &self.queues {
            queue_mut(queues, index)?.post_record(frame, &pass)?;
        }
        Ok(())
    }

    /// Destroy the device objects this pass owns.
    pub fn release(&mut self, device: &dyn GpuDevice) {
        self.destroy_framebuffer(device);
        if let Some(default) = self.default_texture.take() {
            device.destroy_texture(default.texture);
        }
        self.render_pass = None;
        self.render_pass_info = None;
        self.queues.clear();
    }
}

fn queue_mut(
    queues: &mut RecyclePool<DeviceQueue>,
    index: usize,
) -> Result<&mut DeviceQueue, ExecutorError> {
    queues
        .get_mut(index)
        .ok_or_else(|| ExecutorError::InvalidGraph(format!("queue {index} is not live")))
}
