//! Executor configuration.
//!
//! # Example
//!
//! ```ignore
//! let config = ExecutorConfig::default()
//!     .with_extent(1920, 1080)
//!     .with_lights_per_pass(16)
//!     .with_shadows(ShadowType::ShadowMap);
//! config.validate()?;
//! ```

use crate::error::ExecutorError;

/// Rotation of the presentation surface relative to the render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SurfaceTransform {
    #[default]
    Identity,
    Rotate90,
    Rotate180,
    Rotate270,
}

/// How shadows are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ShadowType {
    /// Projected onto a plane. Shadow casters draw their regular opaque list.
    #[default]
    Planar,
    /// Rendered into per-light shadow maps.
    ShadowMap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShadowSettings {
    pub enabled: bool,
    pub kind: ShadowType,
}

impl ShadowSettings {
    /// Returns true if shadow casters render into shadow maps.
    pub fn uses_shadow_maps(&self) -> bool {
        self.enabled && self.kind == ShadowType::ShadowMap
    }
}

/// Pipeline-wide scene settings, mutable between frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SceneSettings {
    pub shadows: ShadowSettings,
    /// Lights use HDR luminance scaled by camera exposure.
    pub hdr: bool,
}

/// Configuration for creating an executor.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorConfig {
    /// Initial width of the render target in pixels.
    pub width: u32,
    /// Initial height of the render target in pixels.
    pub height: u32,
    /// Capacity of the volumetric light buffer of a blit.
    pub lights_per_pass: u32,
    /// Multiplier applied to HDR light luminance.
    pub light_meter_scale: f32,
    /// Initial slot count of the per-frame pools.
    pub pool_capacity: usize,
    pub surface_transform: SurfaceTransform,
    pub scene: SceneSettings,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            lights_per_pass: 10,
            light_meter_scale: 10000.0,
            pool_capacity: 16,
            surface_transform: SurfaceTransform::Identity,
            scene: SceneSettings::default(),
        }
    }
}

impl ExecutorConfig {
    /// Set the initial render target extent.
    pub fn with_extent(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_lights_per_pass(mut self, lights: u32) -> Self {
        self.lights_per_pass = lights;
        self
    }

    pub fn with_light_meter_scale(mut self, scale: f32) -> Self {
        self.light_meter_scale = scale;
        self
    }

    pub fn with_pool_capacity(mut self, capacity: usize) -> Self {
        self.pool_capacity = capacity;
        self
    }

    pub fn with_surface_transform(mut self, transform: SurfaceTransform) -> Self {
        self.surface_transform = transform;
        self
    }

    /// Enable shadows of the given type.
    pub fn with_shadows(mut self, kind: ShadowType) -> Self {
        self.scene.shadows = ShadowSettings {
            enabled: true,
            kind,
        };
        self
    }

    pub fn with_hdr(mut self, hdr: bool) -> Self {
        self.scene.hdr = hdr;
        self
    }

    /// Check the configuration for values the executor cannot work with.
    pub fn validate(&self) -> Result<(), ExecutorError> {
        if self.width == 0 || self.height == 0 {
            return Err(ExecutorError::InvalidParameter(format!(
                "render target extent must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if self.lights_per_pass == 0 {
            return Err(ExecutorError::InvalidParameter(
                "lights_per_pass must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
