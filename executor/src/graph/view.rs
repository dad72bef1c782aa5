//! Attachment and descriptor views declared by frame graph passes.
//!
//! A [`RasterView`] binds a named resource as a render pass attachment, a
//! [`ComputeView`] binds it into a descriptor slot of the pass layout.

use bitflags::bitflags;

use crate::types::Color;

/// Operation to perform when loading an attachment at the start of a render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LoadOp {
    /// Load the existing contents of the attachment.
    #[default]
    Load,
    /// Clear the attachment with the view's clear value.
    Clear,
    /// Don't care about the existing contents (may be undefined).
    DontCare,
}

/// Operation to perform when storing an attachment at the end of a render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StoreOp {
    /// Store the attachment contents for later use.
    #[default]
    Store,
    /// Don't care about the contents after the pass (may be discarded).
    DontCare,
}

/// How a raster view is attached to the render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AttachmentType {
    #[default]
    RenderTarget,
    DepthStencil,
    /// Variable shading rate image. Accepted but not attached.
    ShadingRate,
}

/// Access of a view by the pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AccessType {
    Read,
    ReadWrite,
    #[default]
    Write,
}

bitflags! {
    /// Which aspects of an attachment are cleared.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ClearFlags: u32 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

/// A resource attached to a raster pass.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterView {
    /// Shader-visible slot name.
    pub slot_name: String,
    pub attachment: AttachmentType,
    pub access: AccessType,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    pub clear_flags: ClearFlags,
    pub clear_color: Color,
    pub clear_depth: f32,
    pub clear_stencil: u32,
    /// Attachment slot index within the pass.
    pub slot_id: u32,
}

impl RasterView {
    /// A color attachment.
    pub fn render_target(slot_name: impl Into<String>, load_op: LoadOp, store_op: StoreOp) -> Self {
        Self {
            slot_name: slot_name.into(),
            attachment: AttachmentType::RenderTarget,
            access: AccessType::Write,
            load_op,
            store_op,
            clear_flags: if load_op == LoadOp::Clear {
                ClearFlags::COLOR
            } else {
                ClearFlags::empty()
            },
            clear_color: Color::BLACK,
            clear_depth: 1.0,
            clear_stencil: 0,
            slot_id: 0,
        }
    }

    /// A depth-stencil attachment.
    pub fn depth_stencil(slot_name: impl Into<String>, load_op: LoadOp, store_op: StoreOp) -> Self {
        Self {
            attachment: AttachmentType::DepthStencil,
            clear_flags: if load_op == LoadOp::Clear {
                ClearFlags::DEPTH | ClearFlags::STENCIL
            } else {
                ClearFlags::empty()
            },
            ..Self::render_target(slot_name, load_op, store_op)
        }
    }

    /// A shading rate attachment.
    pub fn shading_rate(slot_name: impl Into<String>) -> Self {
        Self {
            attachment: AttachmentType::ShadingRate,
            access: AccessType::Read,
            clear_flags: ClearFlags::empty(),
            ..Self::render_target(slot_name, LoadOp::Load, StoreOp::DontCare)
        }
    }

    pub fn with_clear_color(mut self, color: Color) -> Self {
        self.clear_color = color;
        self
    }

    pub fn with_clear_depth_stencil(mut self, depth: f32, stencil: u32) -> Self {
        self.clear_depth = depth;
        self.clear_stencil = stencil;
        self
    }

    pub fn with_slot_id(mut self, slot_id: u32) -> Self {
        self.slot_id = slot_id;
        self
    }
}

/// A resource bound into a descriptor of the pass layout.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputeView {
    /// Descriptor name in the layout graph's attribute index.
    pub name: String,
    pub access: AccessType,
    pub clear_flags: ClearFlags,
    pub clear_color: Color,
}

impl ComputeView {
    /// A sampled (read-only) view.
    pub fn sampled(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            access: AccessType::Read,
            clear_flags: ClearFlags::empty(),
            clear_color: Color::TRANSPARENT,
        }
    }

    pub fn with_access(mut self, access: AccessType) -> Self {
        self.access = access;
        self
    }
}
