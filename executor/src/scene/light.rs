//! Lights and the per-camera render scene.

use redlilium_core::math::{Sphere, Vec3};

use super::RenderItem;

/// Identifier of a light, also the key of its shadow-map queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct LightId(pub u32);

/// A point light with a spherical emitter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphereLight {
    pub id: LightId,
    pub position: Vec3,
    /// Emitter radius.
    pub size: f32,
    pub range: f32,
    pub color: Vec3,
    pub luminance_hdr: f32,
    pub luminance_ldr: f32,
    /// Multiply `color` by [`color_temperature_rgb`](Self::color_temperature_rgb).
    pub use_color_temperature: bool,
    pub color_temperature_rgb: Vec3,
}

impl SphereLight {
    pub fn new(id: LightId, position: Vec3, range: f32) -> Self {
        Self {
            id,
            position,
            size: 0.15,
            range,
            color: Vec3::new(1.0, 1.0, 1.0),
            luminance_hdr: 1.0,
            luminance_ldr: 1.0,
            use_color_temperature: false,
            color_temperature_rgb: Vec3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn with_size(mut self, size: f32) -> Self {
        self.size = size;
        self
    }

    pub fn with_color(mut self, color: Vec3) -> Self {
        self.color = color;
        self
    }

    pub fn with_luminance(mut self, hdr: f32, ldr: f32) -> Self {
        self.luminance_hdr = hdr;
        self.luminance_ldr = ldr;
        self
    }

    pub fn with_color_temperature(mut self, rgb: Vec3) -> Self {
        self.use_color_temperature = true;
        self.color_temperature_rgb = rgb;
        self
    }

    /// Bounding sphere of the light's influence.
    pub fn bounds(&self) -> Sphere {
        Sphere::new(self.position, self.range)
    }

    /// Light color with the color temperature applied.
    pub fn final_color(&self) -> Vec3 {
        if self.use_color_temperature {
            self.color.component_mul(&self.color_temperature_rgb)
        } else {
            self.color
        }
    }
}

/// A spot light: a sphere light with a direction and cone angle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpotLight {
    pub light: SphereLight,
    pub direction: Vec3,
    /// Cone angle in radians.
    pub spot_angle: f32,
}

impl SpotLight {
    pub fn new(light: SphereLight, direction: Vec3, spot_angle: f32) -> Self {
        Self {
            light,
            direction,
            spot_angle,
        }
    }
}

/// A directional light with cascaded shadow maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectionalLight {
    pub id: LightId,
    /// Number of shadow cascades.
    pub csm_level: u32,
    /// Every cascade covers the full shadow map.
    pub shadow_fixed_area: bool,
}

/// A light that can cast shadow maps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShadowLight {
    Directional(DirectionalLight),
    Spot(SpotLight),
}

impl ShadowLight {
    pub fn id(&self) -> LightId {
        match self {
            Self::Directional(light) => light.id,
            Self::Spot(light) => light.light.id,
        }
    }
}

/// The light a scene is rendered for, with its cascade level.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LightInfo {
    pub light: Option<ShadowLight>,
    pub level: u32,
}

impl LightInfo {
    pub fn directional(light: DirectionalLight, level: u32) -> Self {
        Self {
            light: Some(ShadowLight::Directional(light)),
            level,
        }
    }

    pub fn spot(light: SpotLight) -> Self {
        Self {
            light: Some(ShadowLight::Spot(light)),
            level: 0,
        }
    }
}

/// A batch of UI draws.
///
/// Only items whose material pass belongs to the recording queue's phase
/// are drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct UiBatch {
    /// Matched against the camera's visibility mask.
    pub visibility: u32,
    pub items: Vec<RenderItem>,
}

/// Everything a camera sees beyond its culled draw lists.
#[derive(Debug, Clone, Default)]
pub struct RenderScene {
    pub sphere_lights: Vec<SphereLight>,
    pub spot_lights: Vec<SpotLight>,
    pub ui_batches: Vec<UiBatch>,
}

impl RenderScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sphere_light(mut self, light: SphereLight) -> Self {
        self.sphere_lights.push(light);
        self
    }

    pub fn with_spot_light(mut self, light: SpotLight) -> Self {
        self.spot_lights.push(light);
        self
    }

    pub fn with_ui_batch(mut self, batch: UiBatch) -> Self {
        self.ui_batches.push(batch);
        self
    }
}
