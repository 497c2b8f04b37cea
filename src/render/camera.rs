use crate::engine::{Aabb, Ray};
use glam::{Vec2, Vec3};

/// Orbit camera state. Rendering is external; this holds what the
/// interaction core needs from the camera: eye placement, screen→world rays
/// and whether orbit/pan input is currently allowed.
#[derive(Debug, Clone, Copy)]
pub struct CameraController {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub fov_y: f32,
    pub viewport: Vec2,
    controls_enabled: bool,
}

impl CameraController {
    pub fn new(position: Vec3, yaw: f32, pitch: f32) -> Self {
        Self {
            position,
            yaw,
            pitch,
            fov_y: 50f32.to_radians(),
            viewport: Vec2::new(1280.0, 720.0),
            controls_enabled: true,
        }
    }

    pub fn from_bounds(bounds: &Aabb) -> Self {
        let center = bounds.center();
        let distance = framing_distance(bounds);
        let position = center + Vec3::new(distance, distance * 0.4, distance);
        let (yaw, pitch) = forward_to_yaw_pitch(center - position);
        Self::new(position, yaw, pitch)
    }

    pub fn frame_bounds_preserve_orientation(&mut self, bounds: &Aabb) {
        let distance = framing_distance(bounds);
        let (forward, _, _) = self.basis();
        self.position = bounds.center() - forward * distance;
    }

    pub fn controls_enabled(&self) -> bool {
        self.controls_enabled
    }

    /// Orbit and pan are suspended while a gizmo drag owns the pointer.
    pub fn set_controls_enabled(&mut self, enabled: bool) {
        if self.controls_enabled != enabled {
            log::debug!("Camera controls {}", if enabled { "enabled" } else { "disabled" });
        }
        self.controls_enabled = enabled;
    }

    pub fn set_viewport(&mut self, width: f32, height: f32) {
        self.viewport = Vec2::new(width.max(1.0), height.max(1.0));
    }

    pub fn nudge(&mut self, yaw_delta: f32, pitch_delta: f32, zoom_delta: f32) {
        if !self.controls_enabled {
            return;
        }
        self.yaw += yaw_delta;
        self.pitch += pitch_delta;
        wrap_angles(&mut self.yaw, &mut self.pitch);
        if zoom_delta != 0.0 {
            let (forward, _, _) = self.basis();
            self.position += forward * zoom_delta;
        }
    }

    pub fn orbit_around(&mut self, pivot: Vec3, yaw_delta: f32, pitch_delta: f32) {
        if !self.controls_enabled {
            return;
        }
        self.yaw += yaw_delta;
        self.pitch += pitch_delta;
        wrap_angles(&mut self.yaw, &mut self.pitch);

        let distance = (self.position - pivot).length().max(0.05);
        let (dir, _, _) = self.basis();
        self.position = pivot - dir * distance;
    }

    /// (forward, right, up)
    pub fn basis(&self) -> (Vec3, Vec3, Vec3) {
        camera_basis(self.yaw, self.pitch)
    }

    /// Pixel coordinates (origin top-left) to normalised device coordinates.
    pub fn screen_to_ndc(&self, position: Vec2) -> Vec2 {
        Vec2::new(
            position.x / self.viewport.x * 2.0 - 1.0,
            1.0 - position.y / self.viewport.y * 2.0,
        )
    }

    pub fn ray_from_ndc(&self, ndc: Vec2) -> Ray {
        let (forward, right, up) = self.basis();
        let half_height = (self.fov_y * 0.5).tan();
        let aspect = self.viewport.x / self.viewport.y;
        let direction = forward + right * (ndc.x * half_height * aspect) + up * (ndc.y * half_height);
        Ray::new(self.position, direction)
    }

    pub fn ray_from_screen(&self, position: Vec2) -> Ray {
        self.ray_from_ndc(self.screen_to_ndc(position))
    }
}

fn framing_distance(bounds: &Aabb) -> f32 {
    let radius = bounds.size().max_element() * 0.5;
    if radius > 0.0 {
        radius * 3.0
    } else {
        3.0
    }
}

fn forward_to_yaw_pitch(forward: Vec3) -> (f32, f32) {
    let n = forward / forward.length().max(1e-6);
    let yaw = n.z.atan2(n.x);
    let pitch = n.y.clamp(-1.0, 1.0).asin();
    (yaw, pitch)
}

fn camera_basis(yaw: f32, pitch: f32) -> (Vec3, Vec3, Vec3) {
    let cos_pitch = pitch.cos();
    let forward = Vec3::new(yaw.cos() * cos_pitch, pitch.sin(), yaw.sin() * cos_pitch);
    let right = Vec3::new(-yaw.sin(), 0.0, yaw.cos());
    let up = right.cross(forward).normalize_or_zero();
    (forward, right, up)
}

fn wrap_angles(yaw: &mut f32, pitch: &mut f32) {
    const TWO_PI: f32 = std::f32::consts::PI * 2.0;
    if yaw.is_finite() {
        *yaw = (*yaw + std::f32::consts::PI).rem_euclid(TWO_PI) - std::f32::consts::PI;
    }
    if pitch.is_finite() {
        *pitch = (*pitch + std::f32::consts::PI).rem_euclid(TWO_PI) - std::f32::consts::PI;
    }
}
