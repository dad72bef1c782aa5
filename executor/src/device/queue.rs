//! Device-side render queues.

use redlilium_core::pool::{Poolable, Pooled};

use crate::backend::{DescriptorSetId, SetIndex};
use crate::error::ExecutorError;
use crate::graph::{LayoutGraph, LayoutId, NodeId, PhaseId, QueueHint, QueueNode, UpdateFrequency};
use crate::types::{ScissorRect, Viewport};

use super::task::run_tasks;
use super::{BlitDescriptor, DeviceSceneTask, FrameContext, PassFrame, PostSceneTask, PreSceneTask, TaskContext};

/// Queue state visible to the tasks of the queue.
#[derive(Debug, Default)]
pub struct QueueState {
    pub node: Option<NodeId>,
    pub hint: QueueHint,
    pub viewport: Option<Viewport>,
    pub scissor: Option<ScissorRect>,
    pub phase: PhaseId,
    pub layout: Option<LayoutId>,
    /// Per-phase descriptor set bound before the scene tasks record.
    pub phase_set: Option<DescriptorSetId>,
    /// Render data of the pass and queue is uploaded once per queue.
    pub render_data_updated: bool,
    pub blit: Pooled<BlitDescriptor>,
}

impl QueueState {
    fn reset(&mut self) {
        self.node = None;
        self.hint = QueueHint::None;
        self.viewport = None;
        self.scissor = None;
        self.phase = PhaseId::DEFAULT;
        self.layout = None;
        self.phase_set = None;
        self.render_data_updated = false;
        self.blit.release();
    }
}

/// A render queue of a device pass, pooled per frame.
///
/// Holds the pre, scene and post tasks of every scene or blit node under
/// the queue, in graph order.
#[derive(Debug, Default)]
pub struct DeviceQueue {
    pre_tasks: Vec<PreSceneTask>,
    scene_tasks: Vec<DeviceSceneTask>,
    post_tasks: Vec<PostSceneTask>,
    pub state: QueueState,
}

impl Poolable for DeviceQueue {
    fn new_empty() -> Self {
        Self::default()
    }

    fn reset(&mut self) {
        self.pre_tasks.clear();
        self.scene_tasks.clear();
        self.post_tasks.clear();
        self.state.reset();
    }
}

impl DeviceQueue {
    /// Bind the queue to its graph node and resolve its phase layout.
    ///
    /// An empty layout name selects the default phase. A named layout must
    /// exist under the pass stage.
    pub fn init(
        &mut self,
        layouts: &LayoutGraph,
        pass_stage: Option<LayoutId>,
        pass_layout_name: &str,
        node: NodeId,
        queue: &QueueNode,
        layout_name: &str,
    ) -> Result<(), ExecutorError> {
        self.state.node = Some(node);
        self.state.hint = queue.hint;
        // An empty viewport falls back to the camera viewport.
        self.state.viewport = queue.viewport.filter(Viewport::has_area);
        self.state.scissor = self.state.viewport.map(|v| {
            ScissorRect::new(v.x as i32, v.y as i32, v.width as u32, v.height as u32)
        });

        if layout_name.is_empty() {
            self.state.phase = PhaseId::DEFAULT;
            self.state.layout = None;
            self.state.phase_set = None;
            return Ok(());
        }

        let layout = pass_stage
            .and_then(|stage| layouts.locate_child(Some(stage), layout_name))
            .ok_or_else(|| ExecutorError::LayoutNotFound {
                parent: pass_layout_name.to_string(),
                name: layout_name.to_string(),
            })?;
        self.state.layout = Some(layout);
        self.state.phase = layouts.phase_id(layout).unwrap_or_default();
        self.state.phase_set = layouts
            .descriptor_set(layout, UpdateFrequency::PerPhase)
            .and_then(|data| data.descriptor_set);
        log::trace!(
            "DeviceQueue: {} -> phase {:?}",
            layout_name,
            self.state.phase
        );
        Ok(())
    }

    /// Append the three tasks of a scene record.
    pub fn add_scene_task(&mut self, scene: usize) {
        self.pre_tasks.push(PreSceneTask { scene });
        self.scene_tasks.push(DeviceSceneTask { scene });
        self.post_tasks.push(PostSceneTask { scene });
    }

    pub fn task_count(&self) -> usize {
        self.scene_tasks.len()
    }

    /// Run the pre-scene tasks, before the render pass begins.
    pub fn pre_record(
        &mut self,
        frame: &mut FrameContext<'_>,
        pass: &PassFrame,
    ) -> Result<(), ExecutorError> {
        let Self {
            pre_tasks, state, ..
        } = self;
        let mut cx = task_context(frame, pass, state);
        run_tasks(pre_tasks, &mut cx)
    }

    /// Bind the phase set and record every scene task.
    pub fn record(
        &mut self,
        frame: &mut FrameContext<'_>,
        pass: &PassFrame,
    ) -> Result<(), ExecutorError> {
        if let Some(set) = self.state.phase_set {
            frame
                .ctx
                .device
                .command_buffer()
                .bind_descriptor_set(SetIndex::Phase, set, &[]);
        }
        let Self {
            scene_tasks, state, ..
        } = self;
        let mut cx = task_context(frame, pass, state);
        run_tasks(scene_tasks, &mut cx)
    }

    /// Run the post-scene tasks, after the render pass ends.
    pub fn post_record(
        &mut self,
        frame: &mut FrameContext<'_>,
        pass: &PassFrame,
    ) -> Result<(), ExecutorError> {
        let Self {
            post_tasks, state, ..
        } = self;
        let mut cx = task_context(frame, pass, state);
        run_tasks(post_tasks, &mut cx)
    }
}

fn task_context<'a>(
    frame: &'a mut FrameContext<'_>,
    pass: &'a PassFrame,
    queue: &'a mut QueueState,
) -> TaskContext<'a> {
    TaskContext {
        ctx: &mut *frame.ctx,
        graph: frame.graph,
        scenes: frame.scenes,
        pass,
        queue,
    }
}
