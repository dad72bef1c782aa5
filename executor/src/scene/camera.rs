//! Cameras.

use std::fmt;
use std::sync::Arc;

use redlilium_core::math::Frustum;

use crate::backend::{CommandBuffer, RenderPassId};
use crate::types::NormalizedRect;

use super::RenderScene;

/// Identifier of a camera in the submission table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct CameraId(pub u32);

/// Draws debug geometry into an open render pass.
pub trait GeometryRenderer: Send + Sync {
    fn render(&self, render_pass: RenderPassId, cmd: &dyn CommandBuffer);
}

/// A camera as seen by the executor.
#[derive(Clone)]
pub struct Camera {
    pub id: CameraId,
    /// Viewport as a fraction of the render target.
    pub viewport: NormalizedRect,
    pub frustum: Frustum,
    pub exposure: f32,
    /// Visibility mask matched against UI batches.
    pub visibility: u32,
    pub scene: Option<Arc<RenderScene>>,
    pub geometry_renderer: Option<Arc<dyn GeometryRenderer>>,
}

impl Camera {
    pub fn new(id: CameraId) -> Self {
        Self {
            id,
            viewport: NormalizedRect::FULL,
            frustum: Frustum::default(),
            exposure: 1.0,
            visibility: u32::MAX,
            scene: None,
            geometry_renderer: None,
        }
    }

    pub fn with_viewport(mut self, viewport: NormalizedRect) -> Self {
        self.viewport = viewport;
        self
    }

    pub fn with_frustum(mut self, frustum: Frustum) -> Self {
        self.frustum = frustum;
        self
    }

    pub fn with_exposure(mut self, exposure: f32) -> Self {
        self.exposure = exposure;
        self
    }

    pub fn with_visibility(mut self, visibility: u32) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_scene(mut self, scene: Arc<RenderScene>) -> Self {
        self.scene = Some(scene);
        self
    }

    pub fn with_geometry_renderer(mut self, renderer: Arc<dyn GeometryRenderer>) -> Self {
        self.geometry_renderer = Some(renderer);
        self
    }
}

impl fmt::Debug for Camera {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Camera")
            .field("id", &self.id)
            .field("viewport", &self.viewport)
            .field("exposure", &self.exposure)
            .field("visibility", &self.visibility)
            .field("scene", &self.scene)
            .field("geometry_renderer", &self.geometry_renderer.is_some())
            .finish_non_exhaustive()
    }
}
