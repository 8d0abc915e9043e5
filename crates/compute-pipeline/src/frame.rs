//! Per-frame camera, timing and accumulation state
//!
//! The application owns a [`FrameState`], advances it once per frame and hands
//! it to the pipeline by reference; every pass receives the same values.

use crate::backend::{GpuBackend, ProgramHandle, UniformValue};
use glam::{Mat4, Vec3};

/// Camera pose for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub view: Mat4,
    pub projection: Mat4,
    pub position: Vec3,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            position: Vec3::ZERO,
        }
    }
}

/// Global per-frame context pushed as uniforms to every pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameState {
    pub camera: Camera,
    pub previous_camera: Camera,
    /// Wall-clock time in seconds
    pub current_frame: f32,
    pub should_accumulate: bool,
    pub frame_index: u32,
    /// Consecutive frames accumulated so far; 0 when accumulation restarts
    pub accumulation_index: u32,
}

impl Default for FrameState {
    fn default() -> Self {
        Self {
            camera: Camera::default(),
            previous_camera: Camera::default(),
            current_frame: 0.0,
            should_accumulate: false,
            frame_index: 0,
            accumulation_index: 0,
        }
    }
}

impl FrameState {
    pub fn new(camera: Camera) -> Self {
        Self {
            camera,
            previous_camera: camera,
            ..Self::default()
        }
    }

    /// Moves to the next frame
    ///
    /// The current camera becomes the previous one, the frame index increments,
    /// and the accumulation index increments while accumulating or resets to 0.
    pub fn advance(&mut self, camera: Camera, time: f32, should_accumulate: bool) {
        self.previous_camera = self.camera;
        self.camera = camera;
        self.current_frame = time;
        self.should_accumulate = should_accumulate;
        self.frame_index = self.frame_index.wrapping_add(1);
        self.accumulation_index = if should_accumulate { self.accumulation_index.wrapping_add(1) } else { 0 };
    }

    /// Named uniform values in push order
    pub fn uniforms(&self) -> [(&'static str, UniformValue); 14] {
        let mat4 = |m: Mat4| UniformValue::Mat4(m.to_cols_array());
        let vec3 = |v: Vec3| UniformValue::Vec3(v.to_array());
        [
            ("cameraViewMatrix", mat4(self.camera.view)),
            ("cameraViewMatrixInverse", mat4(self.camera.view.inverse())),
            ("cameraProjectionMatrix", mat4(self.camera.projection)),
            ("cameraProjectionMatrixInverse", mat4(self.camera.projection.inverse())),
            ("previousCameraViewMatrix", mat4(self.previous_camera.view)),
            ("previousCameraViewMatrixInverse", mat4(self.previous_camera.view.inverse())),
            ("previousCameraProjectionMatrix", mat4(self.previous_camera.projection)),
            ("previousCameraProjectionMatrixInverse", mat4(self.previous_camera.projection.inverse())),
            ("cameraPosition", vec3(self.camera.position)),
            ("previousCameraPosition", vec3(self.previous_camera.position)),
            ("currentFrame", UniformValue::Float(self.current_frame)),
            // A uint member on wgpu, where bool is not host-shareable
            ("shouldAccumulate", UniformValue::Bool(self.should_accumulate)),
            ("frameIndex", UniformValue::UInt(self.frame_index)),
            ("accumulationIndex", UniformValue::UInt(self.accumulation_index)),
        ]
    }

    /// Pushes every frame uniform to `program`
    pub fn push<B: GpuBackend>(&self, backend: &mut B, program: ProgramHandle) {
        for (name, value) in self.uniforms() {
            backend.set_uniform(program, name, value);
        }
    }
}
