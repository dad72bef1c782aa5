//! Frame graph node kinds.

use std::sync::Arc;

use bitflags::bitflags;

use crate::scene::{Camera, LightInfo, Material};
use crate::types::Viewport;

use super::pass::{
    ClearPass, ComputePass, ComputeSubpass, CopyPass, Dispatch, MovePass, RasterPass,
    RasterSubpass, RaytracePass, ResolvePass,
};

/// Sorting hint of a render queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QueueHint {
    #[default]
    None,
    Opaque,
    Mask,
    Blend,
}

/// A render queue inside a raster pass.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct QueueNode {
    pub hint: QueueHint,
    /// Overrides the per-scene render area when set.
    pub viewport: Option<Viewport>,
}

impl QueueNode {
    pub fn new(hint: QueueHint) -> Self {
        Self {
            hint,
            viewport: None,
        }
    }

    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = Some(viewport);
        self
    }
}

bitflags! {
    /// Semantic content of a scene or blit node.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SceneFlags: u32 {
        const OPAQUE = 1 << 0;
        const MASK = 1 << 1;
        const BLEND = 1 << 2;
        const SHADOW_CASTER = 1 << 3;
        const UI = 1 << 4;
        const GEOMETRY = 1 << 5;
        const REFLECTION_PROBE = 1 << 6;
        const VOLUMETRIC_LIGHTING = 1 << 7;
        const DEFAULT_LIGHTING = 1 << 8;
        const CUTOUT = 1 << 9;

        const OPAQUE_OBJECT = Self::OPAQUE.bits();
        const CUTOUT_OBJECT = Self::MASK.bits() | Self::CUTOUT.bits();
        const TRANSPARENT_OBJECT = Self::BLEND.bits();
    }
}

/// A camera's scene drawn into a queue.
#[derive(Debug, Clone)]
pub struct SceneData {
    pub camera: Arc<Camera>,
    /// Light the scene is rendered for, e.g. the caster of a shadow map.
    pub light: LightInfo,
    pub flags: SceneFlags,
}

impl SceneData {
    pub fn new(camera: Arc<Camera>, flags: SceneFlags) -> Self {
        Self {
            camera,
            light: LightInfo::default(),
            flags,
        }
    }

    pub fn with_light(mut self, light: LightInfo) -> Self {
        self.light = light;
        self
    }
}

/// A full-screen or camera-quad draw with a material pass.
#[derive(Debug, Clone)]
pub struct Blit {
    pub material: Arc<Material>,
    pub pass_index: usize,
    pub flags: SceneFlags,
    pub camera: Option<Arc<Camera>>,
}

impl Blit {
    pub fn new(material: Arc<Material>, pass_index: usize, flags: SceneFlags) -> Self {
        Self {
            material,
            pass_index,
            flags,
            camera: None,
        }
    }

    pub fn with_camera(mut self, camera: Arc<Camera>) -> Self {
        self.camera = Some(camera);
        self
    }
}

/// Payload of a frame graph node.
#[derive(Debug, Clone)]
pub enum Node {
    RasterPass(RasterPass),
    RasterSubpass(RasterSubpass),
    ComputeSubpass(ComputeSubpass),
    Compute(ComputePass),
    Queue(QueueNode),
    Scene(SceneData),
    Blit(Blit),
    Dispatch(Dispatch),
    Copy(CopyPass),
    Move(MovePass),
    Resolve(ResolvePass),
    Raytrace(RaytracePass),
    Clear(ClearPass),
}

impl Node {
    /// Short name of the node kind, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::RasterPass(_) => "raster pass",
            Self::RasterSubpass(_) => "raster subpass",
            Self::ComputeSubpass(_) => "compute subpass",
            Self::Compute(_) => "compute pass",
            Self::Queue(_) => "queue",
            Self::Scene(_) => "scene",
            Self::Blit(_) => "blit",
            Self::Dispatch(_) => "dispatch",
            Self::Copy(_) => "copy",
            Self::Move(_) => "move",
            Self::Resolve(_) => "resolve",
            Self::Raytrace(_) => "raytrace",
            Self::Clear(_) => "clear",
        }
    }

    /// Names of the resources the node references.
    pub fn resource_names(&self) -> Vec<&str> {
        fn compute(views: &[(String, Vec<super::ComputeView>)]) -> impl Iterator<Item = &str> {
            views.iter().map(|(name, _)| name.as_str())
        }
        fn pairs(pairs: &[super::TransferPair]) -> impl Iterator<Item = &str> {
            pairs
                .iter()
                .flat_map(|p| [p.source.as_str(), p.target.as_str()])
        }
        match self {
            Self::RasterPass(pass) => pass.resource_names().collect(),
            Self::RasterSubpass(sub) => sub
                .raster_views
                .iter()
                .map(|(name, _)| name.as_str())
                .chain(compute(&sub.compute_views))
                .collect(),
            Self::ComputeSubpass(sub) => compute(&sub.compute_views).collect(),
            Self::Compute(pass) => compute(&pass.compute_views).collect(),
            Self::Raytrace(pass) => compute(&pass.compute_views).collect(),
            Self::Copy(pass) => pairs(&pass.pairs).collect(),
            Self::Move(pass) => pairs(&pass.pairs).collect(),
            Self::Resolve(pass) => pairs(&pass.pairs).collect(),
            Self::Clear(pass) => pass.views.iter().map(|(name, _)| name.as_str()).collect(),
            Self::Queue(_) | Self::Scene(_) | Self::Blit(_) | Self::Dispatch(_) => Vec::new(),
        }
    }
}
