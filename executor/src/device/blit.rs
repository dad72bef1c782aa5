//! Full-screen blits: the shared screen quad and volumetric light data.

use std::collections::HashMap;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use redlilium_core::pool::Poolable;

use crate::backend::{
    local_binding, BufferId, DescriptorSetId, GpuDevice, InputAssemblerId, InputAssemblerInfo,
    ShaderPassId,
};
use crate::config::{SceneSettings, SurfaceTransform};
use crate::error::ExecutorError;
use crate::graph::{Blit, SceneFlags};
use crate::scene::{Camera, MaterialPass};
use crate::types::{BufferDescriptor, BufferUsage, ScissorRect};

/// Index order of the screen quad.
pub const QUAD_INDICES: [u8; 6] = [0, 1, 2, 1, 3, 2];

/// Number of vec4 fields stored per light: position, color, size/range/angle, direction.
pub const VOLUME_LIGHT_FIELDS: usize = 4;

const EMPTY_LOCAL_UBO_SIZE: u64 = 256;

/// Vertex of the screen quad: clip-space position and texture coordinate.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ScreenVertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
}

static_assertions::const_assert_eq!(std::mem::size_of::<ScreenVertex>(), 16);

impl ScreenVertex {
    const fn new(x: f32, y: f32, u: f32, v: f32) -> Self {
        Self {
            position: [x, y],
            uv: [u, v],
        }
    }
}

/// Screen quad covering `area` of a target of the given extent.
///
/// V is flipped on devices whose screen space Y points up, and the texture
/// coordinates are rotated to match the surface transform.
pub fn quad_vertices(
    transform: SurfaceTransform,
    area: ScissorRect,
    extent: (u32, u32),
    screen_space_sign_y: f32,
) -> [ScreenVertex; 4] {
    let (width, height) = (extent.0.max(1) as f32, extent.1.max(1) as f32);
    let min_x = area.x as f32 / width;
    let max_x = (area.x as f32 + area.width as f32) / width;
    let mut min_y = area.y as f32 / height;
    let mut max_y = (area.y as f32 + area.height as f32) / height;
    if screen_space_sign_y > 0.0 {
        std::mem::swap(&mut min_y, &mut max_y);
    }

    match transform {
        SurfaceTransform::Identity => [
            ScreenVertex::new(-1.0, -1.0, min_x, max_y),
            ScreenVertex::new(1.0, -1.0, max_x, max_y),
            ScreenVertex::new(-1.0, 1.0, min_x, min_y),
            ScreenVertex::new(1.0, 1.0, max_x, min_y),
        ],
        SurfaceTransform::Rotate90 => [
            ScreenVertex::new(-1.0, -1.0, max_x, max_y),
            ScreenVertex::new(1.0, -1.0, max_x, min_y),
            ScreenVertex::new(-1.0, 1.0, min_x, max_y),
            ScreenVertex::new(1.0, 1.0, min_x, min_y),
        ],
        SurfaceTransform::Rotate180 => [
            ScreenVertex::new(-1.0, -1.0, min_x, min_y),
            ScreenVertex::new(1.0, -1.0, max_x, min_y),
            ScreenVertex::new(-1.0, 1.0, min_x, max_y),
            ScreenVertex::new(1.0, 1.0, max_x, max_y),
        ],
        SurfaceTransform::Rotate270 => [
            ScreenVertex::new(-1.0, -1.0, min_x, min_y),
            ScreenVertex::new(1.0, -1.0, min_x, max_y),
            ScreenVertex::new(-1.0, 1.0, max_x, min_y),
            ScreenVertex::new(1.0, 1.0, max_x, max_y),
        ],
    }
}

/// Gather the lights of `camera`'s scene that intersect its frustum.
///
/// Sphere lights are visited before spot lights, each in scene order, and
/// at most `capacity` lights are written. Field `f` of light `i` starts at
/// float `f * capacity * 4 + i * 4`; the light count is stored at
/// `3 * capacity * 4 + 3`. Returns the number of lights written.
pub fn gather_volume_lights(
    data: &mut [f32],
    capacity: usize,
    camera: &Camera,
    hdr: bool,
    light_meter_scale: f32,
) -> u32 {
    data.fill(0.0);
    let field_len = 4 * capacity;
    let count_offset = field_len * 3 + 3;
    if data.len() <= count_offset {
        return 0;
    }
    let Some(scene) = camera.scene.as_deref() else {
        return 0;
    };

    let mut write = |slot: usize, field: usize, value: [f32; 4]| {
        let start = field * field_len + slot * 4;
        data[start..start + 4].copy_from_slice(&value);
    };
    let luminance = |hdr_value: f32, ldr_value: f32| {
        if hdr {
            hdr_value * camera.exposure * light_meter_scale
        } else {
            ldr_value
        }
    };

    let sphere_lights = scene.sphere_lights.iter().map(|light| (light, None));
    let spot_lights = scene
        .spot_lights
        .iter()
        .map(|spot| (&spot.light, Some(spot)));

    let mut count = 0;
    for (light, spot) in sphere_lights.chain(spot_lights) {
        if count == capacity {
            break;
        }
        if !camera.frustum.intersects_sphere(&light.bounds()) {
            continue;
        }
        let p = light.position;
        let c = light.final_color();
        let kind = if spot.is_some() { 1.0 } else { 0.0 };
        let angle = spot.map_or(0.0, |s| s.spot_angle);
        write(count, 0, [p.x, p.y, p.z, kind]);
        write(
            count,
            1,
            [c.x, c.y, c.z, luminance(light.luminance_hdr, light.luminance_ldr)],
        );
        write(count, 2, [light.size, light.range, angle, 0.0]);
        if let Some(spot) = spot {
            let d = spot.direction;
            write(count, 3, [d.x, d.y, d.z, 0.0]);
        }
        count += 1;
    }

    data[count_offset] = count as f32;
    count as u32
}

/// Device objects shared by every blit of an executor.
#[derive(Debug)]
pub struct BlitInfo {
    vertex_buffer: BufferId,
    index_buffer: BufferId,
    input_assembler: InputAssemblerId,
    light_buffer: BufferId,
    empty_local_ubo: BufferId,
    stage_descs: HashMap<ShaderPassId, DescriptorSetId>,
    light_capacity: usize,
    extent: (u32, u32),
    transform: SurfaceTransform,
}

impl BlitInfo {
    pub fn new(
        device: &dyn GpuDevice,
        extent: (u32, u32),
        light_capacity: usize,
        transform: SurfaceTransform,
    ) -> Result<Self, ExecutorError> {
        let stride = std::mem::size_of::<ScreenVertex>() as u32;
        let vertex_buffer = device.create_buffer(
            &BufferDescriptor::new(u64::from(stride) * 4, BufferUsage::VERTEX | BufferUsage::COPY_DST)
                .with_stride(stride)
                .with_label("blit_quad_vb"),
        )?;
        let index_buffer = device.create_buffer(
            &BufferDescriptor::new(QUAD_INDICES.len() as u64, BufferUsage::INDEX | BufferUsage::COPY_DST)
                .with_stride(1)
                .with_label("blit_quad_ib"),
        )?;
        device.write_buffer(index_buffer, 0, &QUAD_INDICES);
        let input_assembler = device.create_input_assembler(&InputAssemblerInfo {
            vertex_buffers: vec![vertex_buffer],
            index_buffer: Some(index_buffer),
            index_count: QUAD_INDICES.len() as u32,
        })?;

        let light_floats = VOLUME_LIGHT_FIELDS * 4 * light_capacity;
        let light_buffer = device.create_buffer(
            &BufferDescriptor::new(
                (light_floats * std::mem::size_of::<f32>()) as u64,
                BufferUsage::UNIFORM | BufferUsage::COPY_DST,
            )
            .with_label("blit_volume_lights"),
        )?;
        let empty_local_ubo = device.create_buffer(
            &BufferDescriptor::new(EMPTY_LOCAL_UBO_SIZE, BufferUsage::UNIFORM | BufferUsage::COPY_DST)
                .with_label("blit_local"),
        )?;

        let info = Self {
            vertex_buffer,
            index_buffer,
            input_assembler,
            light_buffer,
            empty_local_ubo,
            stage_descs: HashMap::new(),
            light_capacity,
            extent,
            transform,
        };
        info.write_quad(device);
        Ok(info)
    }

    fn write_quad(&self, device: &dyn GpuDevice) {
        let area = ScissorRect::from_dimensions(self.extent.0, self.extent.1);
        let vertices = quad_vertices(
            self.transform,
            area,
            self.extent,
            device.capabilities().screen_space_sign_y,
        );
        device.write_buffer(self.vertex_buffer, 0, bytemuck::cast_slice(&vertices));
    }

    /// Regenerate the quad for a new target extent.
    ///
    /// Returns false if the extent did not change.
    pub fn resize(&mut self, device: &dyn GpuDevice, width: u32, height: u32) -> bool {
        if self.extent == (width, height) {
            return false;
        }
        self.extent = (width, height);
        self.write_quad(device);
        true
    }

    pub fn extent(&self) -> (u32, u32) {
        self.extent
    }

    pub fn input_assembler(&self) -> InputAssemblerId {
        self.input_assembler
    }

    pub fn vertex_buffer(&self) -> BufferId {
        self.vertex_buffer
    }

    pub fn light_buffer(&self) -> BufferId {
        self.light_buffer
    }

    pub fn light_capacity(&self) -> usize {
        self.light_capacity
    }

    /// Float count of the volumetric light buffer.
    pub fn light_floats(&self) -> usize {
        VOLUME_LIGHT_FIELDS * 4 * self.light_capacity
    }

    /// Get or create the local descriptor set of a material pass.
    pub fn stage_desc(
        &mut self,
        device: &dyn GpuDevice,
        pass: &MaterialPass,
        volumetric: bool,
    ) -> Result<DescriptorSetId, ExecutorError> {
        let set = match self.stage_descs.get(&pass.id) {
            Some(set) => *set,
            None => {
                let set = device.create_descriptor_set(pass.local_set_layout)?;
                log::debug!("BlitInfo: created stage descriptor {:?} for {:?}", set, pass.id);
                self.stage_descs.insert(pass.id, set);
                set
            }
        };
        if volumetric {
            device.bind_buffer(set, local_binding::FORWARD_LIGHT, self.light_buffer);
        }
        device.bind_buffer(set, local_binding::LOCAL, self.empty_local_ubo);
        Ok(set)
    }

    pub fn cached_stage_desc(&self, pass: ShaderPassId) -> Option<DescriptorSetId> {
        self.stage_descs.get(&pass).copied()
    }

    /// Destroy the shared buffers.
    pub fn destroy(&mut self, device: &dyn GpuDevice) {
        for buffer in [
            self.vertex_buffer,
            self.index_buffer,
            self.light_buffer,
            self.empty_local_ubo,
        ] {
            device.destroy_buffer(buffer);
        }
        self.stage_descs.clear();
    }
}

/// Per-queue state of a blit: target, gathered light data and update flags.
///
/// The flags are cleared by [`Poolable::reset`], so lights are gathered
/// and uploaded at most once per frame.
#[derive(Debug, Default)]
pub struct BlitDescriptor {
    flags: SceneFlags,
    camera: Option<Arc<Camera>>,
    stage_desc: Option<DescriptorSetId>,
    light_data: Vec<f32>,
    light_count: u32,
    is_gathered: bool,
    is_updated: bool,
}

impl Poolable for BlitDescriptor {
    fn new_empty() -> Self {
        Self::default()
    }

    fn reset(&mut self) {
        self.camera = None;
        self.stage_desc = None;
        self.is_gathered = false;
        self.is_updated = false;
    }
}

impl BlitDescriptor {
    /// Point the descriptor at a blit and its stage descriptor set.
    ///
    /// A different stage set has never been flushed by this descriptor, so
    /// switching to one schedules another update.
    pub fn retarget(&mut self, blit: &Blit, stage_desc: DescriptorSetId) {
        self.flags = blit.flags;
        self.camera = blit.camera.clone();
        if self.stage_desc != Some(stage_desc) {
            self.is_updated = false;
        }
        self.stage_desc = Some(stage_desc);
    }

    /// Gather and upload light data and flush the stage descriptor set,
    /// each at most once until the next reset.
    pub fn update(
        &mut self,
        device: &dyn GpuDevice,
        info: &BlitInfo,
        settings: &SceneSettings,
        light_meter_scale: f32,
    ) {
        if self.flags.contains(SceneFlags::VOLUMETRIC_LIGHTING) && !self.is_gathered {
            if let Some(camera) = self.camera.as_deref() {
                self.light_data.resize(info.light_floats(), 0.0);
                self.light_count = gather_volume_lights(
                    &mut self.light_data,
                    info.light_capacity(),
                    camera,
                    settings.hdr,
                    light_meter_scale,
                );
                log::trace!("BlitDescriptor: gathered {} volume lights", self.light_count);
                device
                    .command_buffer()
                    .update_buffer(info.light_buffer(), bytemuck::cast_slice(&self.light_data));
                self.is_gathered = true;
                self.is_updated = false;
            }
        }
        if !self.is_updated {
            if let Some(set) = self.stage_desc {
                device.update_descriptor_set(set);
            }
            self.is_updated = true;
        }
    }

    pub fn light_count(&self) -> u32 {
        self.light_count
    }

    pub fn light_data(&self) -> &[f32] {
        &self.light_data
    }

    pub fn is_gathered(&self) -> bool {
        self.is_gathered
    }

    pub fn is_updated(&self) -> bool {
        self.is_updated
    }
}
