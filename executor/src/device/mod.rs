//! Device-side objects built from frame graph nodes.
//!
//! - [`DevicePass`] - render pass, framebuffer and queues of one raster pass
//! - [`DeviceQueue`] - task lists of one graph queue
//! - [`BlitInfo`] / [`BlitDescriptor`] - screen quad and volumetric lights
//! - [`SceneTask`] - the start/join/submit protocol of scene work

mod blit;
mod pass;
mod queue;
mod task;

use crate::backend::{CommandBuffer, RenderPassId};
use crate::types::ScissorRect;

pub use blit::{
    gather_volume_lights, quad_vertices, BlitDescriptor, BlitInfo, ScreenVertex, QUAD_INDICES,
    VOLUME_LIGHT_FIELDS,
};
pub use pass::{DevicePass, PassFrame, PassLayoutInfo};
pub use queue::{DeviceQueue, QueueState};
pub use task::{
    render_area, DeviceSceneTask, FrameContext, GraphScene, PostSceneTask, PreSceneTask,
    SceneTask, TaskContext,
};

/// Draws the statistics overlay at the end of a pass.
pub trait StatisticsOverlay: Send + Sync {
    fn render(&self, render_pass: RenderPassId, area: ScissorRect, cmd: &dyn CommandBuffer);
}
