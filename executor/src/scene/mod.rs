//! Scene data consumed read-only by the executor.
//!
//! Cameras, lights and materials are authored elsewhere. Culling turns them
//! into a [`SubmissionTable`] of ready-to-record draw lists, one entry per
//! camera and render phase, which the scene tasks replay into the command
//! buffer.

mod camera;
mod light;
mod material;
mod submission;

pub use camera::{Camera, CameraId, GeometryRenderer};
pub use light::{
    DirectionalLight, LightId, LightInfo, RenderScene, ShadowLight, SphereLight, SpotLight,
    UiBatch,
};
pub use material::{Material, MaterialPass};
pub use submission::{
    DrawList, InstanceBatch, InstanceQueue, RenderItem, SceneCulling, SubmissionTable, SubmitInfo,
};
