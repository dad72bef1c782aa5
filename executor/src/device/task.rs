//! Scene tasks and the start/join/submit protocol.
//!
//! Every scene or blit node added to a queue becomes three tasks: a
//! [`PreSceneTask`] run before the render pass begins, a [`DeviceSceneTask`]
//! that records draws inside it, and a [`PostSceneTask`] run after it ends.
//!
//! `start` prepares state that does not depend on previously recorded
//! commands, `join` waits for that preparation, and `submit` records. Tasks
//! currently run strictly in sequence, so `join` is a no-op boundary; a
//! parallel implementation must finish every `start` before any `submit`.

use std::sync::Arc;

use redlilium_core::pool::{Poolable, RecyclePool};

use crate::error::ExecutorError;
use crate::executor::ExecutorContext;
use crate::graph::{Blit, FrameGraph, NodeId, SceneData, SceneFlags};
use crate::scene::{Camera, LightInfo, RenderItem, ShadowLight};
use crate::types::{ScissorRect, Viewport};

use super::{PassFrame, QueueState};

// ============================================================================
// Graph scene
// ============================================================================

/// A scene or blit node copied into a pooled record for the frame.
#[derive(Debug, Default)]
pub struct GraphScene {
    pub node: Option<NodeId>,
    pub scene: Option<SceneData>,
    pub blit: Option<Blit>,
}

impl Poolable for GraphScene {
    fn new_empty() -> Self {
        Self::default()
    }

    fn reset(&mut self) {
        self.node = None;
        self.scene = None;
        self.blit = None;
    }
}

impl GraphScene {
    pub fn init(&mut self, node: NodeId, scene: Option<&SceneData>, blit: Option<&Blit>) {
        self.node = Some(node);
        self.scene = scene.cloned();
        self.blit = blit.cloned();
    }

    /// Camera of the scene, or of the blit when it has one.
    pub fn camera(&self) -> Option<&Arc<Camera>> {
        match (&self.scene, &self.blit) {
            (Some(scene), _) => Some(&scene.camera),
            (None, Some(blit)) => blit.camera.as_ref(),
            (None, None) => None,
        }
    }
}

// ============================================================================
// Task contexts
// ============================================================================

/// Frame-wide state shared by every pass record.
pub struct FrameContext<'a> {
    pub ctx: &'a mut ExecutorContext,
    pub graph: &'a FrameGraph,
    pub scenes: &'a RecyclePool<GraphScene>,
}

/// Everything a task may touch while it runs.
pub struct TaskContext<'a> {
    pub ctx: &'a mut ExecutorContext,
    pub graph: &'a FrameGraph,
    pub scenes: &'a RecyclePool<GraphScene>,
    pub pass: &'a PassFrame,
    pub queue: &'a mut QueueState,
}

impl TaskContext<'_> {
    fn scene(&self, index: usize) -> Result<&GraphScene, ExecutorError> {
        self.scenes
            .get(index)
            .ok_or_else(|| ExecutorError::InvalidGraph(format!("scene {index} is not live")))
    }
}

/// Three-phase unit of scene work.
pub trait SceneTask {
    fn start(&mut self, _cx: &mut TaskContext<'_>) -> Result<(), ExecutorError> {
        Ok(())
    }

    fn join(&mut self, _cx: &mut TaskContext<'_>) -> Result<(), ExecutorError> {
        Ok(())
    }

    fn submit(&mut self, _cx: &mut TaskContext<'_>) -> Result<(), ExecutorError> {
        Ok(())
    }
}

/// Run tasks in list order, each through start, join and submit.
pub(crate) fn run_tasks<T: SceneTask>(
    tasks: &mut [T],
    cx: &mut TaskContext<'_>,
) -> Result<(), ExecutorError> {
    for task in tasks {
        task.start(cx)?;
        task.join(cx)?;
        task.submit(cx)?;
    }
    Ok(())
}

// ============================================================================
// Render area
// ============================================================================

/// Pixel area a scene renders to inside a target of `extent`.
///
/// Shadow-map scenes of a directional light with several cascades render
/// into one quadrant per cascade level. Other shadow-map scenes use the
/// full extent. Regular scenes use the camera's normalized viewport.
pub fn render_area(
    camera: Option<&Camera>,
    extent: (u32, u32),
    shadow: Option<&LightInfo>,
    screen_space_sign_y: f32,
) -> ScissorRect {
    let (width, height) = extent;
    let full = ScissorRect::from_dimensions(width, height);

    if let Some(info) = shadow {
        match info.light {
            Some(ShadowLight::Directional(light)) => {
                if light.csm_level == 1 || light.shadow_fixed_area {
                    return full;
                }
                let (w, h) = (width / 2, height / 2);
                let level = info.level;
                let x = (level % 2) * w;
                let y = if screen_space_sign_y > 0.0 {
                    1u32.saturating_sub(level / 2) * h
                } else {
                    (level / 2) * h
                };
                return ScissorRect::new(x as i32, y as i32, w, h);
            }
            Some(ShadowLight::Spot(_)) => return full,
            None => {}
        }
    }

    match camera {
        Some(camera) => camera.viewport.to_pixels(width, height),
        None => full,
    }
}

// ============================================================================
// Tasks
// ============================================================================

/// Prepares blits before the render pass begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreSceneTask {
    pub scene: usize,
}

impl SceneTask for PreSceneTask {
    fn start(&mut self, cx: &mut TaskContext<'_>) -> Result<(), ExecutorError> {
        let scenes = cx.scenes;
        let Some(blit) = scenes.get(self.scene).and_then(|s| s.blit.as_ref()) else {
            return Ok(());
        };
        let pass = *blit_pass(blit)?;
        let (device, info) = cx.ctx.blit_parts()?;
        let stage = info.stage_desc(
            device,
            &pass,
            blit.flags.contains(SceneFlags::VOLUMETRIC_LIGHTING),
        )?;
        cx.queue.blit.activate().retarget(blit, stage);
        Ok(())
    }

    fn submit(&mut self, cx: &mut TaskContext<'_>) -> Result<(), ExecutorError> {
        if cx.scene(self.scene)?.blit.is_none() {
            return Ok(());
        }
        let ctx = &mut *cx.ctx;
        let (Some(info), Some(descriptor)) = (ctx.blit_info.as_ref(), cx.queue.blit.get_mut())
        else {
            return Ok(());
        };
        descriptor.update(
            &*ctx.device,
            info,
            &ctx.config.scene,
            ctx.config.light_meter_scale,
        );
        Ok(())
    }
}

/// Records a scene's draws, or a blit, inside the render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceSceneTask {
    pub scene: usize,
}

impl DeviceSceneTask {
    fn update_render_data(cx: &mut TaskContext<'_>) -> Result<(), ExecutorError> {
        if cx.queue.render_data_updated {
            return Ok(());
        }
        let ctx = &mut *cx.ctx;
        let device = &*ctx.device;
        ctx.global.upload(device, cx.graph.render_data(cx.pass.node))?;
        if let Some(queue_node) = cx.queue.node {
            ctx.global.upload(device, cx.graph.render_data(queue_node))?;
        }
        ctx.global.flush(device);
        cx.queue.render_data_updated = true;
        Ok(())
    }

    fn apply_viewport(cx: &TaskContext<'_>, scene: &GraphScene) {
        let device = &*cx.ctx.device;
        let cmd = device.command_buffer();
        if let (Some(viewport), Some(scissor)) = (cx.queue.viewport, cx.queue.scissor) {
            cmd.set_viewport(viewport);
            cmd.set_scissor(scissor);
            return;
        }
        if cx.pass.has_viewport {
            return;
        }
        let shadow = scene
            .scene
            .as_ref()
            .filter(|data| is_shadow_map(&*cx.ctx, data))
            .map(|data| &data.light);
        let area = render_area(
            scene.camera().map(Arc::as_ref),
            cx.pass.extent,
            shadow,
            device.capabilities().screen_space_sign_y,
        );
        cmd.set_viewport(Viewport::from_rect(area));
        cmd.set_scissor(area);
    }

    fn record_blit(cx: &TaskContext<'_>, blit: &Blit) -> Result<(), ExecutorError> {
        let pass = blit_pass(blit)?;
        let info = cx.ctx.blit_info.as_ref().ok_or_else(|| {
            ExecutorError::InvalidGraph("blit recorded before its resources were created".into())
        })?;
        let stage = info.cached_stage_desc(pass.id).ok_or_else(|| {
            ExecutorError::InvalidGraph(format!(
                "blit of material {} has no stage descriptor",
                blit.material.name
            ))
        })?;
        RenderItem {
            pass: *pass,
            local_set: stage,
            input_assembler: info.input_assembler(),
        }
        .record(&*cx.ctx.device, cx.pass.render_pass);
        Ok(())
    }

    fn record_scene(cx: &TaskContext<'_>, data: &SceneData) {
        let device = &*cx.ctx.device;
        let render_pass = cx.pass.render_pass;
        let camera = &data.camera;
        let flags = data.flags;

        if let Some(info) = cx.ctx.submissions.get(camera.id, cx.queue.phase) {
            if flags.intersects(SceneFlags::OPAQUE | SceneFlags::MASK | SceneFlags::CUTOUT) {
                let shadow_queue = data
                    .light
                    .light
                    .filter(|_| is_shadow_map(&*cx.ctx, data))
                    .and_then(|light| info.shadow_maps.get(&light.id()));
                match shadow_queue {
                    Some(queue) => queue.record(device, render_pass),
                    None => info.opaque_list.record(device, render_pass),
                }
            }
            info.opaque_instances.record(device, render_pass);
            info.transparent_instances.record(device, render_pass);
            if flags.contains(SceneFlags::BLEND) {
                info.transparent_list.record(device, render_pass);
            }
        }

        if flags.contains(SceneFlags::GEOMETRY) {
            if let Some(renderer) = &camera.geometry_renderer {
                renderer.render(render_pass, device.command_buffer());
            }
        }
        if flags.contains(SceneFlags::UI) {
            if let Some(scene) = camera.scene.as_deref() {
                let visible = scene
                    .ui_batches
                    .iter()
                    .filter(|batch| batch.visibility & camera.visibility != 0);
                for batch in visible {
                    for item in batch.items.iter().filter(|i| i.pass.phase == cx.queue.phase) {
                        item.record(device, render_pass);
                    }
                }
            }
        }
        if flags.contains(SceneFlags::REFLECTION_PROBE) {
            if let Some(info) = cx.ctx.submissions.get(camera.id, cx.queue.phase) {
                info.reflection_probe.record(device, render_pass);
            }
        }
    }
}

impl SceneTask for DeviceSceneTask {
    fn submit(&mut self, cx: &mut TaskContext<'_>) -> Result<(), ExecutorError> {
        Self::update_render_data(cx)?;
        let scenes = cx.scenes;
        let scene = scenes
            .get(self.scene)
            .ok_or_else(|| ExecutorError::InvalidGraph(format!("scene {} is not live", self.scene)))?;
        Self::apply_viewport(cx, scene);
        if let Some(blit) = &scene.blit {
            return Self::record_blit(cx, blit);
        }
        if let Some(data) = &scene.scene {
            Self::record_scene(cx, data);
        }
        Ok(())
    }
}

/// Runs after the render pass ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostSceneTask {
    pub scene: usize,
}

impl SceneTask for PostSceneTask {
    fn submit(&mut self, cx: &mut TaskContext<'_>) -> Result<(), ExecutorError> {
        log::trace!("PostSceneTask: scene {} done", self.scene);
        cx.scene(self.scene).map(|_| ())
    }
}

fn blit_pass(blit: &Blit) -> Result<&crate::scene::MaterialPass, ExecutorError> {
    blit.material.pass(blit.pass_index).ok_or_else(|| {
        ExecutorError::InvalidGraph(format!(
            "material {} has no pass {}",
            blit.material.name, blit.pass_index
        ))
    })
}

fn is_shadow_map(ctx: &ExecutorContext, data: &SceneData) -> bool {
    ctx.config.scene.shadows.uses_shadow_maps() && data.flags.contains(SceneFlags::SHADOW_CASTER)
}
