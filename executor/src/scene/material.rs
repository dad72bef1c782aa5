//! Materials resolved to shader passes.

use crate::backend::{DescriptorSetId, DescriptorSetLayoutId, ShaderId, ShaderPassId};
use crate::graph::PhaseId;

/// One pass of a material, already resolved to device objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialPass {
    pub id: ShaderPassId,
    pub phase: PhaseId,
    pub shader: ShaderId,
    /// Material-frequency descriptor set.
    pub descriptor_set: DescriptorSetId,
    /// Layout of the per-draw local set.
    pub local_set_layout: DescriptorSetLayoutId,
}

/// A material with its passes in order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Material {
    pub name: String,
    pub passes: Vec<MaterialPass>,
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passes: Vec::new(),
        }
    }

    pub fn with_pass(mut self, pass: MaterialPass) -> Self {
        self.passes.push(pass);
        self
    }

    pub fn pass(&self, index: usize) -> Option<&MaterialPass> {
        self.passes.get(index)
    }
}
