//! Depth-first traversal of the frame graph.
//!
//! Every valid node is visited twice: `discover` when the walk first
//! reaches it and `finish` when the walk backtracks past it. Discovering a
//! raster pass refreshes its device pass, discovering a queue attaches a
//! device queue to the current pass, and discovering a scene or blit adds a
//! task to the current queue. Finishing a raster pass records it, so a pass
//! records only after everything beneath it has been discovered.
//!
//! The current pass and queue live in [`TraversalState`], passed down the
//! walk explicitly.

use std::collections::{HashMap, HashSet};
use std::collections::hash_map::{DefaultHasher, Entry};
use std::hash::{Hash, Hasher};

use redlilium_core::profiling::profile_scope;

use crate::device::{DevicePass, FrameContext};
use crate::error::ExecutorError;
use crate::graph::{FrameGraph, Node, NodeId};

use super::{ExecutorContext, ExecutorPools};

/// Counters of one traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameStats {
    /// Valid nodes discovered.
    pub nodes_discovered: usize,
    /// Raster passes recorded.
    pub passes_recorded: usize,
    pub queues: usize,
    /// Scene and blit tasks.
    pub scenes: usize,
}

/// State threaded through the walk.
#[derive(Debug, Default)]
pub(crate) struct TraversalState {
    pass: Option<u64>,
    queue: Option<usize>,
    occurrences: HashMap<u64, u32>,
    /// Keys of the device passes refreshed this frame.
    visited: HashSet<u64>,
    stats: FrameStats,
}

impl TraversalState {
    /// Cache key of a pass: its structural hash mixed with how many
    /// structurally identical passes came before it this frame.
    fn pass_key(&mut self, structural: u64) -> u64 {
        let occurrence = self.occurrences.entry(structural).or_insert(0);
        let mut hasher = DefaultHasher::new();
        structural.hash(&mut hasher);
        occurrence.hash(&mut hasher);
        *occurrence += 1;
        hasher.finish()
    }
}

/// Walk every root of the graph in declaration order.
///
/// After a complete walk, device passes the frame did not reach are
/// released. A failed walk keeps them all.
pub(crate) fn traverse(
    ctx: &mut ExecutorContext,
    pools: &mut ExecutorPools,
    graph: &FrameGraph,
) -> Result<FrameStats, ExecutorError> {
    let mut state = TraversalState::default();
    for &root in graph.roots() {
        visit(root, &mut state, ctx, pools, graph)?;
    }
    let pruned = pools.prune(&state.visited, &*ctx.device);
    if pruned > 0 {
        log::debug!("Traversal: released {} stale device passes", pruned);
    }
    Ok(state.stats)
}

fn visit(
    node: NodeId,
    state: &mut TraversalState,
    ctx: &mut ExecutorContext,
    pools: &mut ExecutorPools,
    graph: &FrameGraph,
) -> Result<(), ExecutorError> {
    if !graph.is_valid(node) {
        log::trace!("Traversal: skipping invalid node {}", graph.name(node));
        return Ok(());
    }
    discover(node, state, ctx, pools, graph)?;
    for &child in graph.children(node) {
        visit(child, state, ctx, pools, graph)?;
    }
    finish(node, state, ctx, pools, graph)
}

fn discover(
    node: NodeId,
    state: &mut TraversalState,
    ctx: &mut ExecutorContext,
    pools: &mut ExecutorPools,
    graph: &FrameGraph,
) -> Result<(), ExecutorError> {
    state.stats.nodes_discovered += 1;
    match graph.node(node) {
        Node::RasterPass(pass) => {
            let key = state.pass_key(pass.structural_hash(graph.layout(node)));
            let device_pass = match pools.passes.entry(key) {
                Entry::Occupied(entry) => {
                    log::trace!("Traversal: reusing device pass for {}", graph.name(node));
                    entry.into_mut()
                }
                Entry::Vacant(entry) => {
                    log::debug!("Traversal: created device pass for {}", graph.name(node));
                    entry.insert(DevicePass::new(node))
                }
            };
            device_pass.refresh(ctx, graph, node, pass)?;
            state.visited.insert(key);
            state.pass = Some(key);
            state.queue = None;
        }
        Node::Queue(queue) => {
            let device_pass = state
                .pass
                .and_then(|key| pools.passes.get_mut(&key))
                .ok_or_else(|| {
                    ExecutorError::InvalidGraph(format!(
                        "queue {} is outside a raster pass",
                        graph.name(node)
                    ))
                })?;
            let index = pools.queues.add();
            let layout = device_pass.layout();
            pools.queues[index].init(
                &ctx.layout_graph,
                layout.stage,
                &layout.name,
                node,
                queue,
                graph.layout(node),
            )?;
            device_pass.add_queue(index);
            state.queue = Some(index);
            state.stats.queues += 1;
        }
        Node::Scene(_) | Node::Blit(_) => {
            let queue = state
                .queue
                .and_then(|index| pools.queues.get_mut(index))
                .ok_or_else(|| {
                    ExecutorError::InvalidGraph(format!(
                        "{} {} is outside a queue",
                        graph.node(node).kind_name(),
                        graph.name(node)
                    ))
                })?;
            let index = pools.scenes.add();
            match graph.node(node) {
                Node::Scene(scene) => pools.scenes[index].init(node, Some(scene), None),
                Node::Blit(blit) => pools.scenes[index].init(node, None, Some(blit)),
                _ => {}
            }
            queue.add_scene_task(index);
            state.stats.scenes += 1;
        }
        Node::RasterSubpass(_)
        | Node::ComputeSubpass(_)
        | Node::Compute(_)
        | Node::Dispatch(_)
        | Node::Copy(_)
        | Node::Move(_)
        | Node::Resolve(_)
        | Node::Raytrace(_)
        | Node::Clear(_) => {}
    }
    Ok(())
}

fn finish(
    node: NodeId,
    state: &mut TraversalState,
    ctx: &mut ExecutorContext,
    pools: &mut ExecutorPools,
    graph: &FrameGraph,
) -> Result<(), ExecutorError> {
    match graph.node(node) {
        Node::RasterPass(_) => {
            let ExecutorPools {
                passes,
                queues,
                scenes,
            } = pools;
            let device_pass = state
                .pass
                .and_then(|key| passes.get_mut(&key))
                .ok_or_else(|| {
                    ExecutorError::InvalidGraph(format!(
                        "pass {} finished before it was discovered",
                        graph.name(node)
                    ))
                })?;
            let mut frame = FrameContext { ctx, graph, scenes };
            device_pass.pre_pass(&mut frame, queues)?;
            {
                profile_scope!("DevicePass::record");
                device_pass.record(&mut frame, queues)?;
            }
            device_pass.post_pass(&mut frame, queues)?;
            state.pass = None;
            state.queue = None;
            state.stats.passes_recorded += 1;
        }
        Node::Queue(_) => state.queue = None,
        _ => {}
    }
    Ok(())
}
