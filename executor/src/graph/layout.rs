//! Layout graph: descriptor-set layouts of render stages and phases.
//!
//! The layout graph is static for the lifetime of an executor. Top-level
//! vertices are render stages (one per pass layout name), their children are
//! render phases (one per queue layout name). Each vertex carries the
//! descriptor sets of its layout, partitioned by [`UpdateFrequency`].

use std::collections::HashMap;

use crate::backend::{DescriptorSetId, DescriptorSetLayoutId};

/// Handle to a vertex of the [`LayoutGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayoutId(u32);

impl LayoutId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Render phase identifier, the key of the per-camera submission table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct PhaseId(pub u32);

impl PhaseId {
    /// Phase of queues that have no layout of their own.
    pub const DEFAULT: Self = Self(0);
}

/// Descriptor identifier from the layout graph's attribute index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorId(pub u32);

/// How often a descriptor set changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateFrequency {
    PerInstance,
    PerBatch,
    PerPhase,
    PerPass,
}

/// A contiguous range of descriptors in a set, starting at `offset`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DescriptorBlock {
    pub offset: u32,
    pub descriptors: Vec<DescriptorId>,
}

/// One descriptor set of a layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorSetData {
    pub layout: DescriptorSetLayoutId,
    pub blocks: Vec<DescriptorBlock>,
    /// Device set, when the pipeline has created one for this layout.
    pub descriptor_set: Option<DescriptorSetId>,
}

impl DescriptorSetData {
    pub fn new(layout: DescriptorSetLayoutId) -> Self {
        Self {
            layout,
            blocks: Vec::new(),
            descriptor_set: None,
        }
    }

    pub fn with_block(mut self, block: DescriptorBlock) -> Self {
        self.blocks.push(block);
        self
    }

    pub fn with_descriptor_set(mut self, set: DescriptorSetId) -> Self {
        self.descriptor_set = Some(set);
        self
    }

    /// Binding slots of a descriptor in this set.
    pub fn bindings_of(&self, descriptor: DescriptorId) -> impl Iterator<Item = u32> + '_ {
        self.blocks.iter().flat_map(move |block| {
            block
                .descriptors
                .iter()
                .enumerate()
                .filter(move |(_, id)| **id == descriptor)
                .map(move |(i, _)| block.offset + i as u32)
        })
    }
}

/// Kind of a layout vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutKind {
    RenderStage { pass_id: u32 },
    RenderPhase { phase_id: PhaseId },
}

#[derive(Debug, Clone)]
struct LayoutVertex {
    name: String,
    kind: LayoutKind,
    children: Vec<LayoutId>,
    descriptor_sets: HashMap<UpdateFrequency, DescriptorSetData>,
}

/// Static descriptor layout information.
#[derive(Debug, Clone, Default)]
pub struct LayoutGraph {
    vertices: Vec<LayoutVertex>,
    stages: Vec<LayoutId>,
    attribute_index: HashMap<String, DescriptorId>,
    next_phase: u32,
}

impl LayoutGraph {
    /// Name of the stage whose per-pass set is the global descriptor layout.
    pub const GLOBAL_STAGE: &'static str = "default";

    pub fn new() -> Self {
        Self::default()
    }

    /// Add a render stage (pass layout).
    pub fn add_stage(&mut self, name: impl Into<String>) -> LayoutId {
        let id = LayoutId(self.vertices.len() as u32);
        self.vertices.push(LayoutVertex {
            name: name.into(),
            kind: LayoutKind::RenderStage {
                pass_id: self.stages.len() as u32,
            },
            children: Vec::new(),
            descriptor_sets: HashMap::new(),
        });
        self.stages.push(id);
        id
    }

    /// Add a render phase (queue layout) under a stage.
    pub fn add_phase(&mut self, stage: LayoutId, name: impl Into<String>) -> LayoutId {
        self.next_phase += 1;
        let id = LayoutId(self.vertices.len() as u32);
        self.vertices.push(LayoutVertex {
            name: name.into(),
            kind: LayoutKind::RenderPhase {
                phase_id: PhaseId(self.next_phase),
            },
            children: Vec::new(),
            descriptor_sets: HashMap::new(),
        });
        self.vertices[stage.index()].children.push(id);
        id
    }

    /// Attach a descriptor set to a layout.
    pub fn set_descriptor_set(
        &mut self,
        layout: LayoutId,
        frequency: UpdateFrequency,
        data: DescriptorSetData,
    ) {
        self.vertices[layout.index()]
            .descriptor_sets
            .insert(frequency, data);
    }

    /// Register a descriptor name in the attribute index.
    pub fn register_descriptor(&mut self, name: impl Into<String>) -> DescriptorId {
        let next = DescriptorId(self.attribute_index.len() as u32);
        *self.attribute_index.entry(name.into()).or_insert(next)
    }

    /// Look up a descriptor id by name.
    pub fn descriptor_id(&self, name: &str) -> Option<DescriptorId> {
        self.attribute_index.get(name).copied()
    }

    /// Find a stage by name (`parent == None`) or a phase under a stage.
    pub fn locate_child(&self, parent: Option<LayoutId>, name: &str) -> Option<LayoutId> {
        let candidates = match parent {
            None => &self.stages,
            Some(parent) => &self.vertices.get(parent.index())?.children,
        };
        candidates
            .iter()
            .copied()
            .find(|id| self.vertices[id.index()].name == name)
    }

    pub fn name(&self, layout: LayoutId) -> &str {
        &self.vertices[layout.index()].name
    }

    pub fn kind(&self, layout: LayoutId) -> LayoutKind {
        self.vertices[layout.index()].kind
    }

    /// Phase id of a phase layout.
    pub fn phase_id(&self, layout: LayoutId) -> Option<PhaseId> {
        match self.kind(layout) {
            LayoutKind::RenderPhase { phase_id } => Some(phase_id),
            LayoutKind::RenderStage { .. } => None,
        }
    }

    pub fn descriptor_set(
        &self,
        layout: LayoutId,
        frequency: UpdateFrequency,
    ) -> Option<&DescriptorSetData> {
        self.vertices[layout.index()].descriptor_sets.get(&frequency)
    }

    /// Layout of the global descriptor set, if the graph declares one.
    pub fn global_set_layout(&self) -> Option<DescriptorSetLayoutId> {
        let stage = self.locate_child(None, Self::GLOBAL_STAGE)?;
        self.descriptor_set(stage, UpdateFrequency::PerPass)
            .map(|data| data.layout)
    }
}
