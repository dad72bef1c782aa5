//! The render-graph executor.
//!
//! [`Executor`] owns the [`ExecutorContext`] and the object pools and runs
//! one frame per [`Executor::execute`] call:
//!
//! 1. reset the per-frame arenas and the submission table
//! 2. let the scene culling fill the submission table
//! 3. evict cached resources the frame does not use
//! 4. begin the command buffer, traverse the graph, end it
//! 5. submit
//!
//! An error anywhere aborts the frame before submission.

mod context;
mod pools;
mod traversal;

pub use context::{ExecutorContext, GlobalDescriptor};
pub use pools::ExecutorPools;
pub use traversal::FrameStats;

use std::sync::Arc;

use redlilium_core::profiling::{frame_mark, profile_scope};

use crate::backend::GpuDevice;
use crate::config::{ExecutorConfig, SceneSettings};
use crate::device::{BlitInfo, StatisticsOverlay};
use crate::error::ExecutorError;
use crate::graph::{FrameGraph, LayoutGraph, ResourceGraph};
use crate::resources::ResourceCache;
use crate::scene::SceneCulling;

/// Executes frame graphs on a device.
pub struct Executor {
    ctx: ExecutorContext,
    pools: ExecutorPools,
    culling: Box<dyn SceneCulling>,
    frame_count: u64,
    last_stats: FrameStats,
}

impl Executor {
    pub fn new(
        device: Arc<dyn GpuDevice>,
        resource_graph: ResourceGraph,
        layout_graph: LayoutGraph,
        culling: impl SceneCulling + 'static,
        config: ExecutorConfig,
    ) -> Result<Self, ExecutorError> {
        config.validate()?;
        log::info!(
            "Executor: created on {} ({}x{})",
            device.name(),
            config.width,
            config.height
        );
        let pools = ExecutorPools::with_capacity(config.pool_capacity);
        let ctx = ExecutorContext::new(device, resource_graph, layout_graph, config)?;
        Ok(Self {
            ctx,
            pools,
            culling: Box::new(culling),
            frame_count: 0,
            last_stats: FrameStats::default(),
        })
    }

    /// Run one frame.
    pub fn execute(&mut self, graph: &FrameGraph) -> Result<(), ExecutorError> {
        profile_scope!("Executor::execute");

        self.pools.reset_frame();
        self.ctx.submissions.reset();
        self.culling
            .build_submissions(graph, &self.ctx.layout_graph, &mut self.ctx.submissions);

        let evicted = self.ctx.resource_cache.evict_unused(
            &*self.ctx.device,
            &self.ctx.resource_graph,
            graph,
        );
        if evicted > 0 {
            log::debug!("Executor: evicted {} unused resources", evicted);
        }

        let device = Arc::clone(&self.ctx.device);
        let cmd = device.command_buffer();
        cmd.begin();
        let result = traversal::traverse(&mut self.ctx, &mut self.pools, graph);
        cmd.end();
        let stats = result?;

        device.submit();
        self.frame_count += 1;
        self.last_stats = stats;
        log::trace!(
            "Executor: frame {} recorded {} passes",
            self.frame_count,
            stats.passes_recorded
        );
        frame_mark!();
        Ok(())
    }

    /// Propagate a new target extent to the blit geometry.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), ExecutorError> {
        if width == 0 || height == 0 {
            return Err(ExecutorError::InvalidParameter(format!(
                "cannot resize to {width}x{height}"
            )));
        }
        log::debug!("Executor: resize to {}x{}", width, height);
        self.ctx.resize(width, height);
        Ok(())
    }

    /// Destroy every cached device object.
    ///
    /// The executor stays usable; the next frame recreates what it needs.
    pub fn release(&mut self) {
        log::info!(
            "Executor: releasing {} passes and {} resources",
            self.pools.passes.len(),
            self.ctx.resource_cache.len()
        );
        self.pools.release(&*self.ctx.device);
        self.ctx.release();
    }

    pub fn resource_graph(&self) -> &ResourceGraph {
        &self.ctx.resource_graph
    }

    /// Resource graph, for changing descriptions between frames.
    pub fn resource_graph_mut(&mut self) -> &mut ResourceGraph {
        &mut self.ctx.resource_graph
    }

    pub fn layout_graph(&self) -> &LayoutGraph {
        &self.ctx.layout_graph
    }

    pub fn scene_settings_mut(&mut self) -> &mut SceneSettings {
        &mut self.ctx.config.scene
    }

    pub fn set_statistics_overlay(&mut self, overlay: Option<Arc<dyn StatisticsOverlay>>) {
        self.ctx.statistics_overlay = overlay;
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.ctx.config
    }

    pub fn device(&self) -> &Arc<dyn GpuDevice> {
        &self.ctx.device
    }

    pub fn resource_cache(&self) -> &ResourceCache {
        &self.ctx.resource_cache
    }

    pub fn global(&self) -> &GlobalDescriptor {
        &self.ctx.global
    }

    pub fn blit_info(&self) -> Option<&BlitInfo> {
        self.ctx.blit_info.as_ref()
    }

    /// Number of device passes cached across frames.
    pub fn device_pass_count(&self) -> usize {
        self.pools.passes.len()
    }

    /// Number of frames submitted.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Counters of the last submitted frame.
    pub fn last_frame_stats(&self) -> FrameStats {
        self.last_stats
    }
}
