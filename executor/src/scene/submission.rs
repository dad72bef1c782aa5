//! Culled draw lists, keyed by camera and render phase.

use std::collections::HashMap;

use crate::backend::{
    DescriptorSetId, GpuDevice, InputAssemblerId, PipelineKey, RenderPassId, SetIndex,
};
use crate::graph::{FrameGraph, LayoutGraph, PhaseId};

use super::{CameraId, LightId, MaterialPass};

/// A single draw: material pass, per-draw local set and geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderItem {
    pub pass: MaterialPass,
    pub local_set: DescriptorSetId,
    pub input_assembler: InputAssemblerId,
}

impl RenderItem {
    /// Record the draw: pipeline, material set, local set, geometry.
    pub fn record(&self, device: &dyn GpuDevice, render_pass: RenderPassId) {
        let pipeline = device.get_pipeline_state(&PipelineKey {
            shader_pass: self.pass.id,
            shader: self.pass.shader,
            render_pass,
            input_assembler: self.input_assembler,
        });
        let cmd = device.command_buffer();
        cmd.bind_pipeline_state(pipeline);
        cmd.bind_descriptor_set(SetIndex::Material, self.pass.descriptor_set, &[]);
        cmd.bind_descriptor_set(SetIndex::Local, self.local_set, &[]);
        cmd.bind_input_assembler(self.input_assembler);
        cmd.draw(self.input_assembler);
    }
}

/// An ordered list of draws.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DrawList {
    pub items: Vec<RenderItem>,
}

impl DrawList {
    pub fn push(&mut self, item: RenderItem) {
        self.items.push(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Record every item in list order.
    pub fn record(&self, device: &dyn GpuDevice, render_pass: RenderPassId) {
        for item in &self.items {
            item.record(device, render_pass);
        }
    }
}

impl FromIterator<RenderItem> for DrawList {
    fn from_iter<I: IntoIterator<Item = RenderItem>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

/// Instances sharing one draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceBatch {
    pub item: RenderItem,
    pub instance_count: u32,
}

/// Instance batches collected for one pass.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InstanceQueue {
    pub batches: Vec<InstanceBatch>,
}

impl InstanceQueue {
    pub fn push(&mut self, batch: InstanceBatch) {
        self.batches.push(batch);
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn clear(&mut self) {
        self.batches.clear();
    }

    /// Record one draw per non-empty batch.
    pub fn record(&self, device: &dyn GpuDevice, render_pass: RenderPassId) {
        for batch in self.batches.iter().filter(|b| b.instance_count > 0) {
            batch.item.record(device, render_pass);
        }
    }
}

/// Draw lists of one camera in one render phase.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SubmitInfo {
    pub opaque_list: DrawList,
    pub transparent_list: DrawList,
    pub opaque_instances: InstanceQueue,
    pub transparent_instances: InstanceQueue,
    /// Shadow caster queues keyed by the light they render for.
    pub shadow_maps: HashMap<LightId, DrawList>,
    pub additive_lights: DrawList,
    pub reflection_probe: DrawList,
}

impl SubmitInfo {
    /// Clear every list, keeping allocations.
    pub fn reset(&mut self) {
        self.opaque_list.clear();
        self.transparent_list.clear();
        self.opaque_instances.clear();
        self.transparent_instances.clear();
        for list in self.shadow_maps.values_mut() {
            list.clear();
        }
        self.additive_lights.clear();
        self.reflection_probe.clear();
    }

    /// Clear the lists that are only valid for the pass that consumed them.
    pub fn clear_per_pass(&mut self) {
        self.additive_lights.clear();
        self.opaque_instances.clear();
        self.transparent_instances.clear();
    }
}

/// Camera id -> phase id -> [`SubmitInfo`].
#[derive(Debug, Clone, Default)]
pub struct SubmissionTable {
    entries: HashMap<CameraId, HashMap<PhaseId, SubmitInfo>>,
}

impl SubmissionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear every entry, keeping allocations.
    pub fn reset(&mut self) {
        for info in self.entries.values_mut().flat_map(|phases| phases.values_mut()) {
            info.reset();
        }
    }

    pub fn get(&self, camera: CameraId, phase: PhaseId) -> Option<&SubmitInfo> {
        self.entries.get(&camera)?.get(&phase)
    }

    pub fn get_mut(&mut self, camera: CameraId, phase: PhaseId) -> Option<&mut SubmitInfo> {
        self.entries.get_mut(&camera)?.get_mut(&phase)
    }

    /// Get or create the entry of a camera and phase.
    pub fn entry(&mut self, camera: CameraId, phase: PhaseId) -> &mut SubmitInfo {
        self.entries.entry(camera).or_default().entry(phase).or_default()
    }

    /// Clear the per-pass lists of every entry.
    pub fn clear_per_pass(&mut self) {
        for info in self.entries.values_mut().flat_map(|phases| phases.values_mut()) {
            info.clear_per_pass();
        }
    }
}

/// Fills the submission table for a frame.
///
/// Called by the executor once per `execute`, after the table has been
/// reset and before the frame graph is traversed.
pub trait SceneCulling: Send {
    fn build_submissions(
        &mut self,
        graph: &FrameGraph,
        layouts: &LayoutGraph,
        table: &mut SubmissionTable,
    );
}

impl<F> SceneCulling for F
where
    F: FnMut(&FrameGraph, &LayoutGraph, &mut SubmissionTable) + Send,
{
    fn build_submissions(
        &mut self,
        graph: &FrameGraph,
        layouts: &LayoutGraph,
        table: &mut SubmissionTable,
    ) {
        self(graph, layouts, table)
    }
}
