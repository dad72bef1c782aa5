//! Pass node payloads.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::scene::Material;
use crate::types::Viewport;

use super::view::{ComputeView, RasterView};

/// A raster pass: attachments, input descriptors and the render area.
///
/// Views are kept in declaration order, which is also the attachment order
/// of the render pass object built for it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RasterPass {
    pub width: u32,
    pub height: u32,
    /// Explicit render area. An all-zero viewport means "full target".
    pub viewport: Viewport,
    /// Draw the statistics overlay at the end of the pass.
    pub show_statistics: bool,
    /// Attachments keyed by resource name.
    pub raster_views: Vec<(String, RasterView)>,
    /// Descriptor inputs keyed by resource name.
    pub compute_views: Vec<(String, Vec<ComputeView>)>,
}

impl RasterPass {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = viewport;
        self
    }

    pub fn with_statistics(mut self, show: bool) -> Self {
        self.show_statistics = show;
        self
    }

    /// Attach a resource.
    pub fn with_raster_view(mut self, resource: impl Into<String>, view: RasterView) -> Self {
        self.raster_views.push((resource.into(), view));
        self
    }

    /// Bind a resource into one or more descriptors of the pass layout.
    pub fn with_compute_view(mut self, resource: impl Into<String>, view: ComputeView) -> Self {
        let resource = resource.into();
        match self.compute_views.iter_mut().find(|(name, _)| *name == resource) {
            Some((_, views)) => views.push(view),
            None => self.compute_views.push((resource, vec![view])),
        }
        self
    }

    /// Returns true if the explicit viewport is set.
    pub fn has_explicit_viewport(&self) -> bool {
        let v = &self.viewport;
        v.x != 0.0 || v.y != 0.0 || v.width != 0.0 || v.height != 0.0
    }

    /// Hash of the pass shape: layout name and attachment configuration.
    ///
    /// Extent, viewport and clear values are excluded so a pass keeps its
    /// cache entry across resizes.
    pub fn structural_hash(&self, layout_name: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        layout_name.hash(&mut hasher);
        self.raster_views.len().hash(&mut hasher);
        for (resource, view) in &self.raster_views {
            resource.hash(&mut hasher);
            view.slot_name.hash(&mut hasher);
            view.attachment.hash(&mut hasher);
            view.access.hash(&mut hasher);
            view.load_op.hash(&mut hasher);
            view.store_op.hash(&mut hasher);
            view.clear_flags.hash(&mut hasher);
            view.slot_id.hash(&mut hasher);
        }
        self.compute_views.len().hash(&mut hasher);
        for (resource, views) in &self.compute_views {
            resource.hash(&mut hasher);
            for view in views {
                view.name.hash(&mut hasher);
                view.access.hash(&mut hasher);
            }
        }
        hasher.finish()
    }

    /// Names of every resource the pass references.
    pub fn resource_names(&self) -> impl Iterator<Item = &str> {
        self.raster_views
            .iter()
            .map(|(name, _)| name.as_str())
            .chain(self.compute_views.iter().map(|(name, _)| name.as_str()))
    }
}

/// A subpass of a raster pass.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RasterSubpass {
    pub raster_views: Vec<(String, RasterView)>,
    pub compute_views: Vec<(String, Vec<ComputeView>)>,
}

/// A compute subpass of a raster pass.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ComputeSubpass {
    pub compute_views: Vec<(String, Vec<ComputeView>)>,
}

/// A standalone compute pass.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ComputePass {
    pub compute_views: Vec<(String, Vec<ComputeView>)>,
}

/// A compute dispatch inside a compute pass.
#[derive(Debug, Clone, Default)]
pub struct Dispatch {
    pub material: Option<Arc<Material>>,
    pub pass_index: usize,
    pub thread_groups: [u32; 3],
}

/// Source and target of a copy, move or resolve.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransferPair {
    pub source: String,
    pub target: String,
    pub mip_levels: u32,
    pub num_slices: u32,
}

impl TransferPair {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            mip_levels: 1,
            num_slices: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CopyPass {
    pub pairs: Vec<TransferPair>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MovePass {
    pub pairs: Vec<TransferPair>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResolvePass {
    pub pairs: Vec<TransferPair>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RaytracePass {
    pub compute_views: Vec<(String, Vec<ComputeView>)>,
}

/// Standalone clears of named resources.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClearPass {
    pub views: Vec<(String, ComputeView)>,
}
