//! Frame graph infrastructure.
//!
//! A [`FrameGraph`] is the per-frame, declarative description of rendering
//! work the executor consumes. Nodes are typed ([`Node`]) and nested by
//! containment: raster passes own queues, queues own scenes and blits. Every
//! node carries a layout name that links it to the [`LayoutGraph`], and the
//! named resources its views reference live in the [`ResourceGraph`].
//!
//! Traversal order is declaration order. The executor performs no
//! dependency analysis of its own.
//!
//! # Example
//!
//! ```ignore
//! let mut graph = FrameGraph::new();
//! let pass = graph.add_raster_pass("main", "forward", RasterPass::new(1280, 720)
//!     .with_raster_view("color", RasterView::render_target("_", LoadOp::Clear, StoreOp::Store)));
//! let queue = graph.add_queue(pass, "default", QueueNode::new(QueueHint::Opaque));
//! graph.add_scene(queue, "camera", SceneData::new(camera, SceneFlags::OPAQUE));
//! ```

mod layout;
mod node;
mod pass;
mod resource;
mod view;

use std::collections::HashSet;

pub use layout::{
    DescriptorBlock, DescriptorId, DescriptorSetData, LayoutGraph, LayoutId, LayoutKind, PhaseId,
    UpdateFrequency,
};
pub use node::{Blit, Node, QueueHint, QueueNode, SceneData, SceneFlags};
pub use pass::{
    ClearPass, ComputePass, ComputeSubpass, CopyPass, Dispatch, MovePass, RasterPass,
    RasterSubpass, RaytracePass, ResolvePass, TransferPair,
};
pub use resource::{
    Residency, Resource, ResourceDesc, ResourceFlags, ResourceGraph, ResourceId, ResourceKind,
    ResourceTraits, SwapchainTarget,
};
pub use view::{AccessType, AttachmentType, ClearFlags, ComputeView, LoadOp, RasterView, StoreOp};

/// Handle to a node in the frame graph.
///
/// `NodeId` is `Copy` and cheap to pass around. It is only valid within
/// the `FrameGraph` that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    /// Get the index of this node.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Per-node uniform data pushed into the global descriptor set.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenderData {
    /// Uniform blocks keyed by binding of the global set.
    pub blocks: Vec<(u32, Vec<f32>)>,
}

impl RenderData {
    /// Set a uniform block, replacing an earlier value for the same binding.
    pub fn set_block(&mut self, binding: u32, values: impl Into<Vec<f32>>) {
        let values = values.into();
        match self.blocks.iter_mut().find(|(b, _)| *b == binding) {
            Some((_, existing)) => *existing = values,
            None => self.blocks.push((binding, values)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

#[derive(Debug, Clone)]
struct NodeEntry {
    name: String,
    layout: String,
    node: Node,
    data: RenderData,
    valid: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// The frame graph describes one frame's rendering work.
#[derive(Debug, Clone, Default)]
pub struct FrameGraph {
    nodes: Vec<NodeEntry>,
    roots: Vec<NodeId>,
    resource_uses: Vec<String>,
    used: HashSet<String>,
}

impl FrameGraph {
    /// Create a new empty frame graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node under `parent`, or as a root.
    ///
    /// Resources referenced by the node's views are added to the frame's
    /// resource-use list.
    pub fn add_node(
        &mut self,
        name: impl Into<String>,
        layout: impl Into<String>,
        node: Node,
        parent: Option<NodeId>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        let names: Vec<String> = node
            .resource_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        for name in names {
            self.use_resource(name);
        }
        self.nodes.push(NodeEntry {
            name: name.into(),
            layout: layout.into(),
            node,
            data: RenderData::default(),
            valid: true,
            parent,
            children: Vec::new(),
        });
        match parent {
            Some(parent) => self.nodes[parent.index()].children.push(id),
            None => self.roots.push(id),
        }
        id
    }

    /// Add a top-level raster pass.
    pub fn add_raster_pass(
        &mut self,
        name: impl Into<String>,
        layout: impl Into<String>,
        pass: RasterPass,
    ) -> NodeId {
        self.add_node(name, layout, Node::RasterPass(pass), None)
    }

    /// Add a render queue to a pass.
    pub fn add_queue(&mut self, pass: NodeId, layout: impl Into<String>, queue: QueueNode) -> NodeId {
        let layout = layout.into();
        self.add_node(layout.clone(), layout, Node::Queue(queue), Some(pass))
    }

    /// Add a scene to a queue.
    pub fn add_scene(&mut self, queue: NodeId, name: impl Into<String>, scene: SceneData) -> NodeId {
        self.add_node(name, "", Node::Scene(scene), Some(queue))
    }

    /// Add a blit to a queue.
    pub fn add_blit(&mut self, queue: NodeId, name: impl Into<String>, blit: Blit) -> NodeId {
        self.add_node(name, "", Node::Blit(blit), Some(queue))
    }

    /// Mark a resource as used this frame.
    pub fn use_resource(&mut self, name: impl Into<String>) {
        let name = name.into();
        if self.used.insert(name.clone()) {
            self.resource_uses.push(name);
        }
    }

    /// Resources used this frame, in first-use order.
    pub fn resource_uses(&self) -> &[String] {
        &self.resource_uses
    }

    /// Returns true if the resource is used this frame.
    pub fn is_resource_used(&self, name: &str) -> bool {
        self.used.contains(name)
    }

    pub fn set_valid(&mut self, node: NodeId, valid: bool) {
        self.nodes[node.index()].valid = valid;
    }

    pub fn is_valid(&self, node: NodeId) -> bool {
        self.nodes[node.index()].valid
    }

    pub fn render_data_mut(&mut self, node: NodeId) -> &mut RenderData {
        &mut self.nodes[node.index()].data
    }

    pub fn render_data(&self, node: NodeId) -> &RenderData {
        &self.nodes[node.index()].data
    }

    pub fn node(&self, node: NodeId) -> &Node {
        &self.nodes[node.index()].node
    }

    pub fn name(&self, node: NodeId) -> &str {
        &self.nodes[node.index()].name
    }

    /// Layout name linking the node to the layout graph.
    pub fn layout(&self, node: NodeId) -> &str {
        &self.nodes[node.index()].layout
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.index()].parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.index()].children
    }

    /// Top-level nodes in declaration order.
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Remove all nodes, keeping allocations.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.roots.clear();
        self.resource_uses.clear();
        self.used.clear();
    }
}
