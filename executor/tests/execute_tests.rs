//! Integration tests running whole frames through the executor.
//!
//! Every test drives the recording dummy device and inspects the command
//! log, the live device objects and the executor's caches.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rstest::rstest;

use common::{
    CAMERA, Draws, FORWARD_SET, HEIGHT, PHASE_SET, TestContext, WIDTH, camera, forward_pass,
    item, label, material_pass, opaque_scene, resources, single_scene_graph,
};
use redlilium_core::math::Vec3;
use redlilium_executor::backend::{
    CommandBuffer, DescriptorBinding, FramebufferId, GpuDevice, RecordedCommand, RenderPassId,
    SetIndex, ShaderPassId,
};
use redlilium_executor::device::StatisticsOverlay;
use redlilium_executor::graph::{
    Blit, ComputePass, ComputeView, FrameGraph, LoadOp, Node, QueueNode, RasterPass, RasterView,
    ResourceDesc, ResourceFlags, SceneData, SceneFlags, StoreOp, SwapchainTarget,
};
use redlilium_executor::scene::{
    Camera, CameraId, DirectionalLight, GeometryRenderer, LightId, LightInfo, Material,
    MaterialPass, RenderScene, SphereLight, SpotLight, UiBatch,
};
use redlilium_executor::types::{SamplerDescriptor, ScissorRect, TextureFormat, Viewport};
use redlilium_executor::{ExecutorConfig, ShadowType};

fn begin_pass(t: &TestContext) -> Vec<(RenderPassId, FramebufferId, ScissorRect)> {
    t.device
        .commands()
        .into_iter()
        .filter_map(|c| match c {
            RecordedCommand::BeginRenderPass {
                render_pass,
                framebuffer,
                render_area,
                ..
            } => Some((render_pass, framebuffer, render_area)),
            _ => None,
        })
        .collect()
}

fn blit_graph(blit: Blit) -> FrameGraph {
    let mut graph = FrameGraph::new();
    let pass = graph.add_raster_pass("post", "forward", forward_pass());
    let queue = graph.add_queue(pass, "opaque", QueueNode::default());
    graph.add_blit(queue, "blit", blit);
    graph
}

// ============================================================================
// End to end
// ============================================================================

#[test]
fn test_single_scene_command_sequence() {
    let mut t = TestContext::new(Draws {
        opaque: vec![1, 2],
        transparent: vec![3],
        ..Draws::default()
    });
    let (graph, _) = single_scene_graph(opaque_scene(SceneFlags::OPAQUE));

    t.executor.execute(&graph).unwrap();

    let labels: Vec<_> = t.device.commands().iter().filter_map(label).collect();
    assert_eq!(
        labels,
        [
            "begin",
            "begin_render_pass",
            "bind_global",
            "bind_phase",
            "set_viewport",
            "set_scissor",
            "draw",
            "draw",
            "end_render_pass",
            "end",
        ]
    );
    assert_eq!(t.draws(), [1, 2]);
    assert!(t.device.commands().contains(&RecordedCommand::BindDescriptorSet {
        index: SetIndex::Phase,
        set: PHASE_SET,
        dynamic_offsets: Vec::new(),
    }));

    let cache = t.executor.resource_cache();
    assert_eq!(cache.len(), 2);
    assert!(cache.contains("color"));
    assert!(cache.contains("depth"));
    assert_eq!(t.device.submit_count(), 1);
    assert_eq!(t.executor.frame_count(), 1);
}

#[test]
fn test_render_pass_from_views() {
    let mut t = TestContext::new(Draws::default());
    let (graph, _) = single_scene_graph(opaque_scene(SceneFlags::OPAQUE));
    t.executor.execute(&graph).unwrap();

    let (render_pass, framebuffer, area) = begin_pass(&t)[0];
    assert_eq!(area, ScissorRect::from_dimensions(WIDTH, HEIGHT));

    let info = t.device.render_pass_info(render_pass).unwrap();
    assert_eq!(info.colors.len(), 1);
    assert_eq!(info.colors[0].format, TextureFormat::Rgba8Unorm);
    assert_eq!(info.colors[0].load_op, LoadOp::Clear);
    let depth = info.depth_stencil.unwrap();
    assert_eq!(depth.format, TextureFormat::Depth32Float);
    assert_eq!(depth.depth_store_op, StoreOp::DontCare);

    let cache = t.executor.resource_cache();
    let fb = t.device.framebuffer_info(framebuffer).unwrap();
    assert_eq!(fb.color_textures, vec![cache.get("color").unwrap().texture().unwrap()]);
    assert_eq!(fb.depth_stencil_texture, cache.get("depth").unwrap().texture());
}

// ============================================================================
// Resource cache across frames
// ============================================================================

#[test]
fn test_resolve_is_idempotent_across_frames() {
    let mut t = TestContext::new(Draws::default());
    let (graph, _) = single_scene_graph(opaque_scene(SceneFlags::OPAQUE));

    t.executor.execute(&graph).unwrap();
    let color = t.executor.resource_cache().get("color").unwrap().object;
    let first = begin_pass(&t)[0];
    t.device.clear_commands();

    t.executor.execute(&graph).unwrap();
    assert_eq!(t.executor.resource_cache().get("color").unwrap().object, color);
    assert_eq!(begin_pass(&t)[0], first);
    assert_eq!(t.device.live_texture_count(), 2);
    assert_eq!(t.device.live_framebuffer_count(), 1);
    assert_eq!(t.device.render_pass_count(), 1);
    assert_eq!(t.executor.device_pass_count(), 1);
}

#[test]
fn test_resize_preserves_identity() {
    let mut t = TestContext::new(Draws::default());
    let (graph, _) = single_scene_graph(opaque_scene(SceneFlags::OPAQUE));
    t.executor.execute(&graph).unwrap();
    let color = t
        .executor
        .resource_cache()
        .get("color")
        .unwrap()
        .texture()
        .unwrap();
    let (render_pass, framebuffer, _) = begin_pass(&t)[0];
    t.device.clear_commands();

    let resources = t.executor.resource_graph_mut();
    resources.set_extent("color", 640, 360).unwrap();
    resources.set_extent("depth", 640, 360).unwrap();
    t.executor.resize(640, 360).unwrap();
    t.executor.execute(&graph).unwrap();

    let entry = t.executor.resource_cache().get("color").unwrap();
    assert_eq!(entry.texture(), Some(color));
    let size = t.device.texture_descriptor(color).unwrap().size;
    assert_eq!((size.width, size.height), (640, 360));

    let (same_pass, rebuilt, area) = begin_pass(&t)[0];
    assert_eq!(same_pass, render_pass);
    assert_ne!(rebuilt, framebuffer);
    assert_eq!(area, ScissorRect::from_dimensions(640, 360));
    assert_eq!(t.device.live_framebuffer_count(), 1);
}

#[test]
fn test_resize_rebuilds_every_pass_sharing_an_attachment() {
    let mut t = TestContext::new(Draws::default());
    let mut graph = FrameGraph::new();
    let main = graph.add_raster_pass("main", "forward", forward_pass());
    let queue = graph.add_queue(main, "opaque", QueueNode::default());
    graph.add_scene(queue, "scene", opaque_scene(SceneFlags::OPAQUE));
    let overlay = RasterPass::new(WIDTH, HEIGHT)
        .with_raster_view("color", RasterView::render_target("color", LoadOp::Load, StoreOp::Store));
    let overlay = graph.add_raster_pass("overlay", "forward", overlay);
    let queue = graph.add_queue(overlay, "opaque", QueueNode::default());
    graph.add_scene(queue, "scene", opaque_scene(SceneFlags::OPAQUE));

    t.executor.execute(&graph).unwrap();
    let before: Vec<FramebufferId> = begin_pass(&t).into_iter().map(|(_, fb, _)| fb).collect();
    assert_eq!(before.len(), 2);
    assert_eq!(t.device.live_framebuffer_count(), 2);
    t.device.clear_commands();

    let resources = t.executor.resource_graph_mut();
    resources.set_extent("color", 640, 360).unwrap();
    resources.set_extent("depth", 640, 360).unwrap();
    t.executor.resize(640, 360).unwrap();
    t.executor.execute(&graph).unwrap();

    let after = begin_pass(&t);
    assert_eq!(after.len(), 2);
    for (&old, &(_, rebuilt, area)) in before.iter().zip(&after) {
        assert_ne!(rebuilt, old);
        assert!(t.device.framebuffer_info(rebuilt).is_some());
        assert_eq!(area, ScissorRect::from_dimensions(640, 360));
    }
    assert_eq!(t.device.live_framebuffer_count(), 2);
}

#[test]
fn test_passes_missing_from_a_frame_are_released() {
    let mut t = TestContext::new(Draws::default());
    let two_passes = || {
        let (mut graph, _) = single_scene_graph(opaque_scene(SceneFlags::OPAQUE));
        let overlay = RasterPass::new(WIDTH, HEIGHT).with_raster_view(
            "color",
            RasterView::render_target("color", LoadOp::Load, StoreOp::Store),
        );
        graph.add_raster_pass("overlay", "forward", overlay);
        graph
    };
    let (one_pass, _) = single_scene_graph(opaque_scene(SceneFlags::OPAQUE));

    t.executor.execute(&two_passes()).unwrap();
    assert_eq!(t.executor.device_pass_count(), 2);
    assert_eq!(t.device.live_framebuffer_count(), 2);

    t.executor.execute(&one_pass).unwrap();
    assert_eq!(t.executor.device_pass_count(), 1);
    assert_eq!(t.device.live_framebuffer_count(), 1);

    t.executor.execute(&two_passes()).unwrap();
    assert_eq!(t.executor.device_pass_count(), 2);
    assert_eq!(t.device.live_framebuffer_count(), 2);
}

#[test]
fn test_unused_managed_resources_are_evicted() {
    let mut t = TestContext::new(Draws::default());
    let history = t.external_texture();
    let desc = ResourceDesc::texture_2d(64, 64, TextureFormat::Rgba8Unorm, ResourceFlags::SAMPLED);
    t.executor
        .resource_graph_mut()
        .add_persistent_texture("history", history, desc);

    let mut first = FrameGraph::new();
    let pass = first.add_raster_pass(
        "main",
        "forward",
        forward_pass().with_compute_view("history", ComputeView::sampled("history")),
    );
    let queue = first.add_queue(pass, "opaque", QueueNode::default());
    first.add_scene(queue, "scene", opaque_scene(SceneFlags::OPAQUE));
    t.executor.execute(&first).unwrap();

    assert_eq!(
        t.device.binding(FORWARD_SET, 4),
        Some(DescriptorBinding::Texture(history))
    );
    assert_eq!(
        t.device.sampler(FORWARD_SET, 4),
        Some(t.device.get_sampler(&SamplerDescriptor::linear()))
    );
    assert!(t.device.is_descriptor_set_updated(FORWARD_SET));
    assert_eq!(t.executor.resource_cache().len(), 3);

    let mut second = FrameGraph::new();
    let color_only = RasterPass::new(WIDTH, HEIGHT)
        .with_raster_view("color", RasterView::render_target("color", LoadOp::Load, StoreOp::Store));
    let pass = second.add_raster_pass("main", "forward", color_only);
    let queue = second.add_queue(pass, "opaque", QueueNode::default());
    second.add_scene(queue, "scene", opaque_scene(SceneFlags::OPAQUE));
    t.executor.execute(&second).unwrap();

    let cache = t.executor.resource_cache();
    assert!(cache.contains("color"));
    assert!(!cache.contains("depth"));
    assert!(cache.contains("history"));
    assert!(t.device.texture_descriptor(history).is_some());
    assert_eq!(t.device.live_texture_count(), 2);
}

// ============================================================================
// Scene recording
// ============================================================================

#[rstest]
#[case::opaque(SceneFlags::OPAQUE, vec![1, 2, 10, 11])]
#[case::blend(SceneFlags::BLEND, vec![10, 11, 3])]
#[case::opaque_and_blend(SceneFlags::OPAQUE | SceneFlags::BLEND, vec![1, 2, 10, 11, 3])]
#[case::cutout(SceneFlags::CUTOUT_OBJECT, vec![1, 2, 10, 11])]
#[case::reflection_probe(SceneFlags::REFLECTION_PROBE, vec![10, 11, 20])]
#[case::everything(
    SceneFlags::OPAQUE | SceneFlags::BLEND | SceneFlags::REFLECTION_PROBE,
    vec![1, 2, 10, 11, 3, 20]
)]
fn test_draw_order(#[case] flags: SceneFlags, #[case] expected: Vec<u64>) {
    let mut t = TestContext::new(Draws {
        opaque: vec![1, 2],
        transparent: vec![3],
        opaque_instances: vec![10],
        transparent_instances: vec![11],
        reflection_probe: vec![20],
        ..Draws::default()
    });
    let (graph, _) = single_scene_graph(opaque_scene(flags));
    t.executor.execute(&graph).unwrap();
    assert_eq!(t.draws(), expected);
}

#[test]
fn test_missing_submission_entry_draws_nothing() {
    let mut t = TestContext::new(Draws {
        opaque: vec![1],
        ..Draws::default()
    });
    let other = Arc::new(Camera::new(CameraId(5)));
    let (graph, _) = single_scene_graph(SceneData::new(other, SceneFlags::OPAQUE));
    t.executor.execute(&graph).unwrap();
    assert!(t.draws().is_empty());
}

#[test]
fn test_instances_are_cleared_after_each_pass() {
    let mut t = TestContext::new(Draws {
        opaque: vec![1],
        opaque_instances: vec![10],
        ..Draws::default()
    });
    let mut graph = FrameGraph::new();
    for name in ["first", "second"] {
        let pass = graph.add_raster_pass(name, "forward", forward_pass());
        let queue = graph.add_queue(pass, "opaque", QueueNode::default());
        graph.add_scene(queue, "scene", opaque_scene(SceneFlags::OPAQUE));
    }
    t.executor.execute(&graph).unwrap();
    assert_eq!(t.draws(), [1, 10, 1]);

    // The table is rebuilt every frame.
    t.device.clear_commands();
    t.executor.execute(&graph).unwrap();
    assert_eq!(t.draws(), [1, 10, 1]);
}

#[rstest]
#[case::shadow_maps(ShadowType::ShadowMap, vec![30, 31], Viewport::new(160.0, 0.0, 160.0, 90.0))]
#[case::planar(ShadowType::Planar, vec![1], Viewport::new(0.0, 0.0, 320.0, 180.0))]
fn test_shadow_caster(
    #[case] kind: ShadowType,
    #[case] expected: Vec<u64>,
    #[case] viewport: Viewport,
) {
    let config = ExecutorConfig::default()
        .with_extent(WIDTH, HEIGHT)
        .with_shadows(kind);
    let mut t = TestContext::with_config(
        Draws {
            opaque: vec![1],
            shadow: vec![(LightId(7), vec![30, 31])],
            ..Draws::default()
        },
        config,
    );
    let sun = DirectionalLight {
        id: LightId(7),
        csm_level: 4,
        shadow_fixed_area: false,
    };
    let scene = SceneData::new(camera(), SceneFlags::OPAQUE | SceneFlags::SHADOW_CASTER)
        .with_light(LightInfo::directional(sun, 1));
    let (graph, _) = single_scene_graph(scene);
    t.executor.execute(&graph).unwrap();

    assert_eq!(t.draws(), expected);
    assert!(t.device.commands().contains(&RecordedCommand::SetViewport(viewport)));
}

#[derive(Default)]
struct CountingRenderer(AtomicUsize);

impl GeometryRenderer for CountingRenderer {
    fn render(&self, _render_pass: RenderPassId, _cmd: &dyn CommandBuffer) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }
}

#[test]
fn test_ui_and_geometry() {
    let mut t = TestContext::new(Draws::default());
    let (opaque, transparent) = (t.opaque, t.transparent);
    let scene = RenderScene::new()
        .with_ui_batch(UiBatch {
            visibility: 0b01,
            items: vec![item(opaque, 40), item(transparent, 41)],
        })
        .with_ui_batch(UiBatch {
            visibility: 0b10,
            items: vec![item(opaque, 42)],
        });
    let renderer = Arc::new(CountingRenderer::default());
    let camera = Camera::new(CAMERA)
        .with_visibility(0b01)
        .with_scene(Arc::new(scene))
        .with_geometry_renderer(renderer.clone());
    let (graph, _) = single_scene_graph(SceneData::new(
        Arc::new(camera),
        SceneFlags::UI | SceneFlags::GEOMETRY,
    ));
    t.executor.execute(&graph).unwrap();

    assert_eq!(t.draws(), [40]);
    assert_eq!(renderer.0.load(Ordering::Relaxed), 1);
}

#[test]
fn test_viewport_overrides() {
    let mut t = TestContext::new(Draws::default());

    let mut graph = FrameGraph::new();
    let explicit = forward_pass().with_viewport(Viewport::new(10.0, 20.0, 100.0, 50.0));
    let pass = graph.add_raster_pass("explicit", "forward", explicit);
    let queue = graph.add_queue(pass, "opaque", QueueNode::default());
    graph.add_scene(queue, "scene", opaque_scene(SceneFlags::OPAQUE));
    t.executor.execute(&graph).unwrap();

    assert_eq!(begin_pass(&t)[0].2, ScissorRect::new(10, 20, 100, 50));
    assert_eq!(
        t.count(|c| matches!(c, RecordedCommand::SetViewport(_))),
        0
    );

    t.device.clear_commands();
    let mut graph = FrameGraph::new();
    let pass = graph.add_raster_pass("main", "forward", forward_pass());
    let queue_viewport = Viewport::new(0.0, 0.0, 64.0, 32.0);
    let queue = graph.add_queue(
        pass,
        "opaque",
        QueueNode::default().with_viewport(queue_viewport),
    );
    graph.add_scene(queue, "scene", opaque_scene(SceneFlags::OPAQUE));
    t.executor.execute(&graph).unwrap();

    let commands = t.device.commands();
    assert!(commands.contains(&RecordedCommand::SetViewport(queue_viewport)));
    assert!(commands.contains(&RecordedCommand::SetScissor(ScissorRect::new(0, 0, 64, 32))));
}

#[test]
fn test_render_data_uploaded_once_per_queue() {
    let mut t = TestContext::new(Draws::default());
    let mut graph = FrameGraph::new();
    let pass = graph.add_raster_pass("main", "forward", forward_pass());
    let opaque = graph.add_queue(pass, "opaque", QueueNode::default());
    graph.add_scene(opaque, "a", opaque_scene(SceneFlags::OPAQUE));
    graph.add_scene(opaque, "b", opaque_scene(SceneFlags::BLEND));
    let transparent = graph.add_queue(pass, "transparent", QueueNode::default());
    graph.add_scene(transparent, "c", opaque_scene(SceneFlags::BLEND));
    graph.render_data_mut(pass).set_block(0, vec![1.0; 16]);
    graph.render_data_mut(opaque).set_block(1, vec![2.0; 4]);

    t.executor.execute(&graph).unwrap();

    // Opaque queue: pass block and queue block. Transparent queue: pass block.
    assert_eq!(
        t.count(|c| matches!(c, RecordedCommand::UpdateBuffer { .. })),
        3
    );
    let global = t.executor.global();
    let set = global.descriptor_set().unwrap();
    let block = global.uniform_buffer(0).unwrap();
    assert_eq!(t.device.binding(set, 0), Some(DescriptorBinding::Buffer(block)));
    assert_eq!(t.device.buffer_f32(block), Some(vec![1.0; 16]));
}

struct CountingOverlay {
    calls: AtomicUsize,
}

impl StatisticsOverlay for CountingOverlay {
    fn render(&self, _render_pass: RenderPassId, area: ScissorRect, _cmd: &dyn CommandBuffer) {
        assert_eq!(area, ScissorRect::from_dimensions(WIDTH, HEIGHT));
        self.calls.fetch_add(1, Ordering::Relaxed);
    }
}

#[test]
fn test_statistics_overlay() {
    let mut t = TestContext::new(Draws::default());
    let overlay = Arc::new(CountingOverlay {
        calls: AtomicUsize::new(0),
    });
    t.executor.set_statistics_overlay(Some(overlay.clone()));

    let mut graph = FrameGraph::new();
    let quiet = graph.add_raster_pass("quiet", "forward", forward_pass());
    graph.add_queue(quiet, "opaque", QueueNode::default());
    let loud = graph.add_raster_pass("loud", "forward", forward_pass().with_statistics(true));
    graph.add_queue(loud, "opaque", QueueNode::default());
    t.executor.execute(&graph).unwrap();

    assert_eq!(overlay.calls.load(Ordering::Relaxed), 1);
}

// ============================================================================
// Attachments
// ============================================================================

#[test]
fn test_depth_only_pass_gets_default_target() {
    let mut t = TestContext::new(Draws::default());
    let mut graph = FrameGraph::new();
    let depth_only = RasterPass::new(0, 0).with_raster_view(
        "depth",
        RasterView::depth_stencil("depth", LoadOp::Clear, StoreOp::Store),
    );
    graph.add_raster_pass("shadow", "forward", depth_only);
    t.executor.execute(&graph).unwrap();

    let (render_pass, framebuffer, area) = begin_pass(&t)[0];
    assert_eq!(area, ScissorRect::from_dimensions(WIDTH, HEIGHT));
    assert_eq!(t.device.render_pass_info(render_pass).unwrap().colors.len(), 1);

    let fb = t.device.framebuffer_info(framebuffer).unwrap();
    assert_eq!(fb.color_textures.len(), 1);
    let default = t.device.texture_descriptor(fb.color_textures[0]).unwrap();
    assert_eq!((default.size.width, default.size.height), (WIDTH, HEIGHT));
    assert_eq!(t.device.live_texture_count(), 2);

    t.executor.release();
    assert_eq!(t.device.live_texture_count(), 0);
}

#[test]
fn test_swapchain_target() {
    let mut t = TestContext::new(Draws::default());
    let backbuffer = t.external_texture();
    t.executor.resource_graph_mut().add_swapchain(
        "backbuffer",
        SwapchainTarget {
            color_texture: backbuffer,
            depth_stencil_texture: None,
            width: 800,
            height: 600,
        },
        TextureFormat::Bgra8Unorm,
    );
    let mut graph = FrameGraph::new();
    let present = RasterPass::new(800, 600).with_raster_view(
        "backbuffer",
        RasterView::render_target("backbuffer", LoadOp::Clear, StoreOp::Store),
    );
    graph.add_raster_pass("present", "forward", present);
    t.executor.execute(&graph).unwrap();

    let (render_pass, framebuffer, area) = begin_pass(&t)[0];
    assert_eq!(area, ScissorRect::from_dimensions(800, 600));
    assert_eq!(
        t.device.render_pass_info(render_pass).unwrap().colors[0].format,
        TextureFormat::Bgra8Unorm
    );
    let fb = t.device.framebuffer_info(framebuffer).unwrap();
    assert_eq!(fb.color_textures, vec![backbuffer]);
    assert_eq!(t.device.live_texture_count(), 1);

    t.executor.release();
    assert!(t.device.texture_descriptor(backbuffer).is_some());
}

#[test]
fn test_adopted_framebuffer() {
    let mut t = TestContext::new(Draws::default());
    let desc = ResourceDesc::texture_2d(
        WIDTH,
        HEIGHT,
        TextureFormat::Rgba8Unorm,
        ResourceFlags::COLOR_ATTACHMENT,
    );
    t.executor
        .resource_graph_mut()
        .add_framebuffer("screen", FramebufferId(777), desc);
    let mut graph = FrameGraph::new();
    let pass = RasterPass::new(WIDTH, HEIGHT).with_raster_view(
        "screen",
        RasterView::render_target("screen", LoadOp::Load, StoreOp::Store),
    );
    graph.add_raster_pass("screen", "forward", pass);
    t.executor.execute(&graph).unwrap();

    assert_eq!(begin_pass(&t)[0].1, FramebufferId(777));
    assert_eq!(t.device.live_framebuffer_count(), 0);
    assert_eq!(t.device.live_texture_count(), 0);
}

// ============================================================================
// Blits
// ============================================================================

#[rstest]
#[case::under_capacity(2, 1, 3)]
#[case::over_capacity(3, 3, 4)]
#[case::exactly_capacity(4, 0, 4)]
#[case::no_lights(0, 0, 0)]
fn test_blit_light_count(#[case] spheres: usize, #[case] spots: usize, #[case] expected: u32) {
    const CAPACITY: usize = 4;
    let config = ExecutorConfig::default()
        .with_extent(WIDTH, HEIGHT)
        .with_lights_per_pass(CAPACITY as u32);
    let mut t = TestContext::with_config(Draws::default(), config);

    let mut scene = RenderScene::new();
    for i in 0..spheres {
        scene = scene.with_sphere_light(SphereLight::new(LightId(i as u32), Vec3::zeros(), 2.0));
    }
    for i in 0..spots {
        let light = SphereLight::new(LightId(100 + i as u32), Vec3::zeros(), 2.0);
        scene = scene.with_spot_light(SpotLight::new(light, Vec3::new(0.0, -1.0, 0.0), 0.5));
    }
    let camera = Arc::new(Camera::new(CAMERA).with_scene(Arc::new(scene)));
    let material = Arc::new(Material::new("fog").with_pass(material_pass(t.opaque)));
    let blit = Blit::new(material, 0, SceneFlags::VOLUMETRIC_LIGHTING).with_camera(camera);
    t.executor.execute(&blit_graph(blit)).unwrap();

    let info = t.executor.blit_info().unwrap();
    let data = t.device.buffer_f32(info.light_buffer()).unwrap();
    assert_eq!(data[3 * CAPACITY * 4 + 3], expected as f32);
    assert_eq!(t.draws(), [info.input_assembler().raw()]);
}

#[test]
fn test_every_blit_in_a_queue_flushes_its_stage_set() {
    let mut t = TestContext::new(Draws::default());
    let tonemap = Arc::new(Material::new("tonemap").with_pass(material_pass(t.opaque)));
    let grade = Arc::new(Material::new("grade").with_pass(MaterialPass {
        id: ShaderPassId(2),
        ..material_pass(t.opaque)
    }));

    let mut graph = FrameGraph::new();
    let pass = graph.add_raster_pass("post", "forward", forward_pass());
    let queue = graph.add_queue(pass, "opaque", QueueNode::default());
    graph.add_blit(queue, "tonemap", Blit::new(tonemap, 0, SceneFlags::empty()));
    graph.add_blit(queue, "grade", Blit::new(grade, 0, SceneFlags::empty()));
    t.executor.execute(&graph).unwrap();

    let info = t.executor.blit_info().unwrap();
    let first = info.cached_stage_desc(ShaderPassId(1)).unwrap();
    let second = info.cached_stage_desc(ShaderPassId(2)).unwrap();
    assert_ne!(first, second);
    assert!(t.device.is_descriptor_set_updated(first));
    assert!(t.device.is_descriptor_set_updated(second));
    let quad = info.input_assembler().raw();
    assert_eq!(t.draws(), [quad, quad]);
}

#[test]
fn test_blit_geometry_follows_resize() {
    let mut t = TestContext::new(Draws::default());
    let material = Arc::new(Material::new("tonemap").with_pass(material_pass(t.opaque)));
    let graph = blit_graph(Blit::new(material, 0, SceneFlags::empty()));
    assert!(t.executor.blit_info().is_none());

    t.executor.execute(&graph).unwrap();
    assert_eq!(t.executor.blit_info().unwrap().extent(), (WIDTH, HEIGHT));

    t.executor.resize(640, 360).unwrap();
    assert_eq!(t.executor.blit_info().unwrap().extent(), (640, 360));
    assert!(t.executor.resize(0, 360).is_err());
}

// ============================================================================
// Traversal
// ============================================================================

#[test]
fn test_traversal_records_every_valid_pass_once() {
    let mut t = TestContext::new(Draws {
        opaque: vec![1],
        ..Draws::default()
    });
    let mut graph = FrameGraph::new();
    graph.add_node("prepass", "", Node::Compute(ComputePass::default()), None);
    for name in ["a", "b", "disabled"] {
        let pass = graph.add_raster_pass(name, "forward", forward_pass());
        let queue = graph.add_queue(pass, "opaque", QueueNode::default());
        graph.add_scene(queue, "scene", opaque_scene(SceneFlags::OPAQUE));
        if name == "disabled" {
            graph.set_valid(pass, false);
        }
    }
    t.executor.execute(&graph).unwrap();

    let labels: Vec<_> = t
        .device
        .commands()
        .iter()
        .filter_map(label)
        .filter(|l| l.ends_with("render_pass"))
        .collect();
    assert_eq!(
        labels,
        [
            "begin_render_pass",
            "end_render_pass",
            "begin_render_pass",
            "end_render_pass"
        ]
    );
    let stats = t.executor.last_frame_stats();
    assert_eq!(stats.passes_recorded, 2);
    assert_eq!(stats.queues, 2);
    assert_eq!(stats.scenes, 2);
    assert_eq!(stats.nodes_discovered, 7);
    // Structurally identical passes still get their own device pass.
    assert_eq!(t.executor.device_pass_count(), 2);
    assert_eq!(t.draws(), [1, 1]);
}

// ============================================================================
// Errors and release
// ============================================================================

fn missing_resource() -> FrameGraph {
    let mut graph = FrameGraph::new();
    let pass = RasterPass::new(WIDTH, HEIGHT).with_raster_view(
        "missing",
        RasterView::render_target("missing", LoadOp::Clear, StoreOp::Store),
    );
    graph.add_raster_pass("main", "forward", pass);
    graph
}

fn depth_as_render_target() -> FrameGraph {
    let mut graph = FrameGraph::new();
    let pass = RasterPass::new(WIDTH, HEIGHT).with_raster_view(
        "depth",
        RasterView::render_target("depth", LoadOp::Clear, StoreOp::Store),
    );
    graph.add_raster_pass("main", "forward", pass);
    graph
}

fn unknown_pass_layout() -> FrameGraph {
    let mut graph = FrameGraph::new();
    graph.add_raster_pass("main", "deferred", forward_pass());
    graph
}

fn unknown_queue_layout() -> FrameGraph {
    let mut graph = FrameGraph::new();
    let pass = graph.add_raster_pass("main", "forward", forward_pass());
    graph.add_queue(pass, "shadow", QueueNode::default());
    graph
}

fn queue_outside_pass() -> FrameGraph {
    let mut graph = FrameGraph::new();
    graph.add_node("q", "opaque", Node::Queue(QueueNode::default()), None);
    graph
}

fn scene_outside_queue() -> FrameGraph {
    let mut graph = FrameGraph::new();
    let pass = graph.add_raster_pass("main", "forward", forward_pass());
    graph.add_scene(pass, "s", opaque_scene(SceneFlags::OPAQUE));
    graph
}

fn blit_without_pass() -> FrameGraph {
    blit_graph(Blit::new(
        Arc::new(Material::new("empty")),
        0,
        SceneFlags::empty(),
    ))
}

#[rstest]
#[case::missing_resource(missing_resource, "resource not found: missing")]
#[case::depth_as_render_target(
    depth_as_render_target,
    "invalid frame graph: depth resource depth bound as a render target"
)]
#[case::unknown_pass_layout(unknown_pass_layout, "layout deferred not found under <root>")]
#[case::unknown_queue_layout(unknown_queue_layout, "layout shadow not found under forward")]
#[case::queue_outside_pass(queue_outside_pass, "invalid frame graph: queue q is outside a raster pass")]
#[case::scene_outside_queue(scene_outside_queue, "invalid frame graph: scene s is outside a queue")]
#[case::blit_without_pass(blit_without_pass, "invalid frame graph: material empty has no pass 0")]
fn test_configuration_errors_abort_frame(#[case] build: fn() -> FrameGraph, #[case] message: &str) {
    let mut t = TestContext::with_resources(
        Draws::default(),
        ExecutorConfig::default().with_extent(WIDTH, HEIGHT),
        resources(),
    );
    let err = t.executor.execute(&build()).unwrap_err();
    assert_eq!(err.to_string(), message);
    assert_eq!(t.device.submit_count(), 0);
    assert_eq!(t.executor.frame_count(), 0);
}

#[test]
fn test_release_destroys_cached_objects() {
    let mut t = TestContext::new(Draws {
        opaque: vec![1],
        ..Draws::default()
    });
    let material = Arc::new(Material::new("fog").with_pass(material_pass(t.opaque)));
    let mut graph = blit_graph(Blit::new(material, 0, SceneFlags::VOLUMETRIC_LIGHTING));
    let pass = graph.roots()[0];
    let queue = graph.children(pass)[0];
    graph.add_scene(queue, "scene", opaque_scene(SceneFlags::OPAQUE));
    graph.render_data_mut(pass).set_block(0, vec![0.0; 4]);

    t.executor.execute(&graph).unwrap();
    assert!(t.device.live_texture_count() > 0);
    assert!(t.device.live_buffer_count() > 0);

    t.executor.release();
    assert_eq!(t.device.live_texture_count(), 0);
    assert_eq!(t.device.live_framebuffer_count(), 0);
    assert_eq!(t.device.live_buffer_count(), 0);
    assert_eq!(t.executor.device_pass_count(), 0);
    assert!(t.executor.resource_cache().is_empty());
    assert!(t.executor.blit_info().is_none());

    t.executor.execute(&graph).unwrap();
    assert_eq!(t.executor.frame_count(), 2);
    assert_eq!(t.device.live_framebuffer_count(), 1);
}
