//! # RedLilium Core
//!
//! Engine-agnostic utilities shared by the RedLilium render-graph executor:
//! object pools, culling math, and optional Tracy instrumentation.

pub mod math;
pub mod pool;
pub mod profiling;

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
