//! Executor error types.

use std::fmt;

/// Errors that can occur while executing a frame graph.
///
/// Every variant aborts the current `execute` call. Resource-state
/// mismatches (resizes, swapped framebuffers) are handled in place by the
/// resource cache and never surface here, and light lists that exceed the
/// blit capacity are truncated silently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    /// A named resource is absent from the resource graph.
    ResourceNotFound(String),
    /// A resource of the wrong kind was used as a texture attachment.
    UnsupportedResource { name: String, kind: &'static str },
    /// A layout name could not be located in the layout graph.
    LayoutNotFound { parent: String, name: String },
    /// A compute view names a descriptor the layout graph does not know.
    UnknownDescriptor(String),
    /// The frame graph is structurally inconsistent.
    InvalidGraph(String),
    /// The device failed to create a resource.
    ResourceCreationFailed(String),
    /// An invalid parameter was provided.
    InvalidParameter(String),
}

impl fmt::Display for ExecutorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResourceNotFound(name) => write!(f, "resource not found: {name}"),
            Self::UnsupportedResource { name, kind } => {
                write!(f, "resource {name} of kind {kind} cannot be used as a texture")
            }
            Self::LayoutNotFound { parent, name } => {
                write!(f, "layout {name} not found under {parent}")
            }
            Self::UnknownDescriptor(name) => write!(f, "unknown descriptor: {name}"),
            Self::InvalidGraph(msg) => write!(f, "invalid frame graph: {msg}"),
            Self::ResourceCreationFailed(msg) => write!(f, "resource creation failed: {msg}"),
            Self::InvalidParameter(msg) => write!(f, "invalid parameter: {msg}"),
        }
    }
}

impl std::error::Error for ExecutorError {}
