//! Object pools of the executor.

use std::collections::{HashMap, HashSet};

use redlilium_core::pool::RecyclePool;

use crate::backend::GpuDevice;
use crate::device::{DevicePass, DeviceQueue, GraphScene};

/// Device passes cached across frames plus per-frame arenas.
///
/// Queues and scenes are addressed by index into their arena; `reset_frame`
/// frees every slot without dropping backing storage.
#[derive(Debug, Default)]
pub struct ExecutorPools {
    /// Device passes keyed by structural hash and occurrence.
    pub passes: HashMap<u64, DevicePass>,
    pub queues: RecyclePool<DeviceQueue>,
    pub scenes: RecyclePool<GraphScene>,
}

impl ExecutorPools {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            passes: HashMap::with_capacity(capacity),
            queues: RecyclePool::with_capacity(capacity),
            scenes: RecyclePool::with_capacity(capacity),
        }
    }

    pub fn reset_frame(&mut self) {
        self.queues.reset();
        self.scenes.reset();
    }

    /// Release device passes whose key is not in `keep`.
    ///
    /// Returns how many were released.
    pub fn prune(&mut self, keep: &HashSet<u64>, device: &dyn GpuDevice) -> usize {
        let before = self.passes.len();
        self.passes.retain(|key, pass| {
            let alive = keep.contains(key);
            if !alive {
                pass.release(device);
            }
            alive
        });
        before - self.passes.len()
    }

    /// Release every device pass and drop all pooled storage.
    pub fn release(&mut self, device: &dyn GpuDevice) {
        for (_, mut pass) in self.passes.drain() {
            pass.release(device);
        }
        self.queues.clear();
        self.scenes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[cfg(feature = "dummy")]
    use crate::graph::{FrameGraph, RasterPass};

    #[test]
    fn test_reset_frame_keeps_storage() {
        let mut pools = ExecutorPools::with_capacity(2);
        assert_eq!(pools.queues.allocated(), 2);
        pools.queues.add();
        pools.queues.add();
        pools.queues.add();
        pools.scenes.add();
        pools.reset_frame();
        assert!(pools.queues.is_empty());
        assert!(pools.scenes.is_empty());
        assert_eq!(pools.queues.allocated(), 3);
    }

    #[test]
    #[cfg(feature = "dummy")]
    fn test_prune_keeps_visited_passes() {
        let device = crate::backend::DummyDevice::new();
        let mut graph = FrameGraph::new();
        let node = graph.add_raster_pass("main", "", RasterPass::new(8, 8));
        let mut pools = ExecutorPools::default();
        pools.passes.insert(1, DevicePass::new(node));
        pools.passes.insert(2, DevicePass::new(node));

        let keep = HashSet::from([1]);
        assert_eq!(pools.prune(&keep, &device), 1);
        assert!(pools.passes.contains_key(&1));
        assert_eq!(pools.prune(&keep, &device), 0);
    }
}
