//! Shared fixtures for executor integration tests.
//!
//! Builds a forward-rendering setup on the recording dummy device: a
//! `forward` stage with an `opaque` phase, color and depth targets, and a
//! culling closure that fills the submission table from a fixed list of
//! draws.

#![allow(dead_code)]

use std::sync::Arc;

use redlilium_executor::backend::{
    DescriptorSetId, DescriptorSetLayoutId, DummyDevice, GpuDevice, InputAssemblerId,
    RecordedCommand, SetIndex, ShaderId, ShaderPassId, TextureId,
};
use redlilium_executor::graph::{
    DescriptorBlock, DescriptorSetData, FrameGraph, LayoutGraph, LoadOp, NodeId, PhaseId,
    QueueNode, RasterPass, RasterView, ResourceDesc, ResourceFlags, ResourceGraph, SceneData,
    SceneFlags, StoreOp, UpdateFrequency,
};
use redlilium_executor::scene::{
    Camera, CameraId, LightId, MaterialPass, RenderItem, SubmissionTable, SubmitInfo,
};
use redlilium_executor::types::TextureFormat;
use redlilium_executor::{Executor, ExecutorConfig};

pub const WIDTH: u32 = 320;
pub const HEIGHT: u32 = 180;

/// Pre-created per-phase set of the `opaque` phase.
pub const PHASE_SET: DescriptorSetId = DescriptorSetId(9000);
/// Pre-created per-pass set of the `forward` stage.
pub const FORWARD_SET: DescriptorSetId = DescriptorSetId(9001);
pub const CAMERA: CameraId = CameraId(0);

/// Install a test logger once.
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ============================================================================
// Layouts and resources
// ============================================================================

pub struct Layouts {
    pub graph: LayoutGraph,
    pub opaque: PhaseId,
    pub transparent: PhaseId,
}

/// Global stage, plus `forward` with `opaque` and `transparent` phases.
///
/// The `forward` per-pass set binds the `history` descriptor at binding 4.
pub fn layouts() -> Layouts {
    let mut graph = LayoutGraph::new();
    let global = graph.add_stage(LayoutGraph::GLOBAL_STAGE);
    graph.set_descriptor_set(
        global,
        UpdateFrequency::PerPass,
        DescriptorSetData::new(DescriptorSetLayoutId(1)),
    );

    let history = graph.register_descriptor("history");
    let forward = graph.add_stage("forward");
    graph.set_descriptor_set(
        forward,
        UpdateFrequency::PerPass,
        DescriptorSetData::new(DescriptorSetLayoutId(2))
            .with_block(DescriptorBlock {
                offset: 4,
                descriptors: vec![history],
            })
            .with_descriptor_set(FORWARD_SET),
    );

    let opaque = graph.add_phase(forward, "opaque");
    graph.set_descriptor_set(
        opaque,
        UpdateFrequency::PerPhase,
        DescriptorSetData::new(DescriptorSetLayoutId(3)).with_descriptor_set(PHASE_SET),
    );
    let transparent = graph.add_phase(forward, "transparent");

    let opaque = graph.phase_id(opaque).unwrap_or_default();
    let transparent = graph.phase_id(transparent).unwrap_or_default();
    Layouts {
        graph,
        opaque,
        transparent,
    }
}

/// Managed `color` and `depth` targets of the default extent.
pub fn resources() -> ResourceGraph {
    let mut graph = ResourceGraph::new();
    graph.add_managed_texture(
        "color",
        ResourceDesc::texture_2d(
            WIDTH,
            HEIGHT,
            TextureFormat::Rgba8Unorm,
            ResourceFlags::COLOR_ATTACHMENT | ResourceFlags::SAMPLED,
        ),
    );
    graph.add_managed_texture(
        "depth",
        ResourceDesc::texture_2d(
            WIDTH,
            HEIGHT,
            TextureFormat::Depth32Float,
            ResourceFlags::DEPTH_STENCIL_ATTACHMENT,
        ),
    );
    graph
}

// ============================================================================
// Draws
// ============================================================================

pub fn material_pass(phase: PhaseId) -> MaterialPass {
    MaterialPass {
        id: ShaderPassId(1),
        phase,
        shader: ShaderId(1),
        descriptor_set: DescriptorSetId(500),
        local_set_layout: DescriptorSetLayoutId(50),
    }
}

/// A draw identified by its input assembler id.
pub fn item(phase: PhaseId, id: u64) -> RenderItem {
    RenderItem {
        pass: material_pass(phase),
        local_set: DescriptorSetId(600 + id),
        input_assembler: InputAssemblerId(id),
    }
}

/// Draws the culling step hands to the executor every frame.
#[derive(Debug, Clone, Default)]
pub struct Draws {
    pub opaque: Vec<u64>,
    pub transparent: Vec<u64>,
    pub opaque_instances: Vec<u64>,
    pub transparent_instances: Vec<u64>,
    pub shadow: Vec<(LightId, Vec<u64>)>,
    pub reflection_probe: Vec<u64>,
}

impl Draws {
    pub fn fill(&self, phase: PhaseId, info: &mut SubmitInfo) {
        use redlilium_executor::scene::InstanceBatch;

        info.opaque_list.items.extend(self.opaque.iter().map(|&id| item(phase, id)));
        info.transparent_list
            .items
            .extend(self.transparent.iter().map(|&id| item(phase, id)));
        for &id in &self.opaque_instances {
            info.opaque_instances.push(InstanceBatch {
                item: item(phase, id),
                instance_count: 2,
            });
        }
        for &id in &self.transparent_instances {
            info.transparent_instances.push(InstanceBatch {
                item: item(phase, id),
                instance_count: 2,
            });
        }
        for (light, ids) in &self.shadow {
            let list = info.shadow_maps.entry(*light).or_default();
            list.items.extend(ids.iter().map(|&id| item(phase, id)));
        }
        info.reflection_probe
            .items
            .extend(self.reflection_probe.iter().map(|&id| item(phase, id)));
    }
}

/// Culling that submits `draws` for [`CAMERA`] in `phase`.
pub fn culling(
    phase: PhaseId,
    draws: Draws,
) -> impl FnMut(&FrameGraph, &LayoutGraph, &mut SubmissionTable) + Send + 'static {
    move |_: &FrameGraph, _: &LayoutGraph, table: &mut SubmissionTable| {
        draws.fill(phase, table.entry(CAMERA, phase));
    }
}

// ============================================================================
// Frame graphs
// ============================================================================

pub fn camera() -> Arc<Camera> {
    Arc::new(Camera::new(CAMERA))
}

/// A `forward` pass over `color` and `depth`.
pub fn forward_pass() -> RasterPass {
    RasterPass::new(WIDTH, HEIGHT)
        .with_raster_view("color", RasterView::render_target("color", LoadOp::Clear, StoreOp::Store))
        .with_raster_view(
            "depth",
            RasterView::depth_stencil("depth", LoadOp::Clear, StoreOp::DontCare),
        )
}

/// One forward pass, one `opaque` queue, one scene.
pub fn single_scene_graph(scene: SceneData) -> (FrameGraph, NodeId) {
    let mut graph = FrameGraph::new();
    let pass = graph.add_raster_pass("main", "forward", forward_pass());
    let queue = graph.add_queue(pass, "opaque", QueueNode::default());
    graph.add_scene(queue, "scene", scene);
    (graph, pass)
}

pub fn opaque_scene(flags: SceneFlags) -> SceneData {
    SceneData::new(camera(), flags)
}

// ============================================================================
// Executor
// ============================================================================

pub struct TestContext {
    pub device: Arc<DummyDevice>,
    pub executor: Executor,
    pub opaque: PhaseId,
    pub transparent: PhaseId,
}

impl TestContext {
    pub fn new(draws: Draws) -> Self {
        Self::with_config(draws, ExecutorConfig::default().with_extent(WIDTH, HEIGHT))
    }

    pub fn with_config(draws: Draws, config: ExecutorConfig) -> Self {
        Self::with_resources(draws, config, resources())
    }

    pub fn with_resources(draws: Draws, config: ExecutorConfig, resources: ResourceGraph) -> Self {
        init_logger();
        let device = Arc::new(DummyDevice::new());
        let layouts = layouts();
        let (opaque, transparent) = (layouts.opaque, layouts.transparent);
        let executor = Executor::new(
            device.clone() as Arc<dyn GpuDevice>,
            resources,
            layouts.graph,
            culling(opaque, draws),
            config,
        )
        .unwrap();
        Self {
            device,
            executor,
            opaque,
            transparent,
        }
    }

    /// Create a texture on the device outside the cache.
    pub fn external_texture(&self) -> TextureId {
        use redlilium_executor::types::{TextureDescriptor, TextureUsage};

        self.device
            .create_texture(&TextureDescriptor::new_2d(
                64,
                64,
                TextureFormat::Rgba8Unorm,
                TextureUsage::TEXTURE_BINDING,
            ))
            .unwrap()
    }

    /// Input assemblers of recorded draws, in order.
    pub fn draws(&self) -> Vec<u64> {
        self.device
            .commands()
            .iter()
            .filter_map(|c| match c {
                RecordedCommand::Draw(ia) => Some(ia.raw()),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, matches: impl Fn(&RecordedCommand) -> bool) -> usize {
        self.device.commands().iter().filter(|c| matches(c)).count()
    }
}

/// Short label of a command, dropping per-draw state.
pub fn label(command: &RecordedCommand) -> Option<&'static str> {
    Some(match command {
        RecordedCommand::Begin => "begin",
        RecordedCommand::End => "end",
        RecordedCommand::BeginRenderPass { .. } => "begin_render_pass",
        RecordedCommand::EndRenderPass => "end_render_pass",
        RecordedCommand::BindDescriptorSet { index, .. } => match index {
            SetIndex::Global => "bind_global",
            SetIndex::Phase => "bind_phase",
            SetIndex::Material | SetIndex::Local => return None,
        },
        RecordedCommand::Draw(_) => "draw",
        RecordedCommand::SetViewport(_) => "set_viewport",
        RecordedCommand::SetScissor(_) => "set_scissor",
        RecordedCommand::UpdateBuffer { .. } => "update_buffer",
        RecordedCommand::BindPipelineState(_) | RecordedCommand::BindInputAssembler(_) => {
            return None;
        }
    })
}
