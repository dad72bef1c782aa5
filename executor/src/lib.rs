//! # RedLilium Executor
//!
//! Render-graph executor for the RedLilium engine.
//!
//! ## Overview
//!
//! A caller builds a [`FrameGraph`] of raster passes, queues, scenes and
//! blits each frame. The [`Executor`] turns it into device objects and an
//! ordered command stream:
//!
//! - [`resources`] - name-keyed cache of device textures with in-place resize
//!   and residency-based eviction
//! - [`device`] - device passes, queues, blits and the scene task protocol
//! - [`executor`] - the explicit context, object pools and the depth-first
//!   traversal that compiles passes on discover and records them on finish
//! - [`backend`] - the device interface the executor drives, plus a
//!   recording dummy device for tests
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use redlilium_executor::{DummyDevice, Executor, ExecutorConfig, FrameGraph};
//!
//! let device = Arc::new(DummyDevice::new());
//! let mut executor = Executor::new(device, resources, layouts, culling, ExecutorConfig::default())?;
//! executor.execute(&graph)?;
//! ```

pub mod backend;
pub mod config;
pub mod device;
pub mod error;
pub mod executor;
pub mod graph;
pub mod resources;
pub mod scene;
pub mod types;

pub use backend::{CommandBuffer, GpuDevice};
#[cfg(feature = "dummy")]
pub use backend::{DummyDevice, RecordedCommand};
pub use config::{ExecutorConfig, SceneSettings, ShadowSettings, ShadowType, SurfaceTransform};
pub use error::ExecutorError;
pub use executor::{Executor, FrameStats};
pub use graph::{Blit, FrameGraph, LayoutGraph, Node, NodeId, RasterPass, ResourceGraph, SceneData, SceneFlags};
pub use resources::ResourceCache;
pub use scene::{Camera, SceneCulling, SubmissionTable};

/// Executor library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
