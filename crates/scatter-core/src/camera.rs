use glam::{Mat4, Vec2, Vec3, Vec4Swizzles};

/// Vertical field of view of the perspective camera, degrees.
pub const PERSP_CAMERA_FOV_VERTICAL: f32 = 70.0;
pub const PERSP_CAMERA_NEAR_CLIP_PLANE: f32 = 0.01;
pub const PERSP_CAMERA_FAR_CLIP_PLANE: f32 = 100.0;
/// Half of the vertical world extent shown by the orthographic camera at zoom 1.
pub const ORTHO_CAMERA_FRUSTUM_HALF_EXTENT: f32 = 1.2;
const ORTHO_NEAR_FAR: f32 = 1000.0;

pub const START_CAMERA_POS_3D: Vec3 = Vec3::new(0.45, 0.9, 1.6);
pub const START_CAMERA_TARGET_3D: Vec3 = Vec3::ZERO;
pub const START_CAMERA_POS_2D: Vec3 = Vec3::new(0.0, 0.0, 4.0);
pub const START_CAMERA_TARGET_2D: Vec3 = Vec3::ZERO;

const MIN_ZOOM: f32 = 0.01;
const MAX_ZOOM: f32 = 1000.0;
const MIN_DISTANCE: f32 = 0.05;
const MAX_DISTANCE: f32 = 50.0;
/// Keeps the orbit away from the poles where `look_at` degenerates.
const POLAR_EPSILON: f32 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    /// Used for 2D scenes.
    Orthographic,
    /// Used for 3D scenes.
    Perspective,
}

impl Projection {
    pub fn for_dimensions(dimensions: u8) -> Self {
        if dimensions == 3 {
            Projection::Perspective
        } else {
            Projection::Orthographic
        }
    }
}

/// Everything needed to rebuild a camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraDef {
    pub projection: Projection,
    pub position: Vec3,
    pub target: Vec3,
    pub zoom: f32,
}

impl CameraDef {
    /// Default framing for a scene of the given projection kind.
    pub fn default_for(projection: Projection) -> Self {
        match projection {
            Projection::Perspective => Self {
                projection,
                position: START_CAMERA_POS_3D,
                target: START_CAMERA_TARGET_3D,
                zoom: 1.0,
            },
            Projection::Orthographic => Self {
                projection,
                position: START_CAMERA_POS_2D,
                target: START_CAMERA_TARGET_2D,
                zoom: 1.0,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct Camera {
    pub projection: Projection,
    /// Camera position in world space.
    pub position: Vec3,
    /// Point the camera looks at and orbits around.
    pub target: Vec3,
    pub up: Vec3,
    /// Magnification; narrows the frustum as it grows.
    pub zoom: f32,
    /// Viewport width / height.
    pub aspect: f32,
}

impl Camera {
    pub fn new(def: &CameraDef, aspect: f32) -> Self {
        Self {
            projection: def.projection,
            position: def.position,
            target: def.target,
            up: Vec3::Y,
            zoom: def.zoom,
            aspect: aspect.max(f32::EPSILON),
        }
    }

    pub fn def(&self) -> CameraDef {
        CameraDef {
            projection: self.projection,
            position: self.position,
            target: self.target,
            zoom: self.zoom,
        }
    }

    pub fn is_perspective(&self) -> bool {
        self.projection == Projection::Perspective
    }

    /// Effective vertical field of view in radians, accounting for zoom.
    pub fn fov_y(&self) -> f32 {
        let half = (PERSP_CAMERA_FOV_VERTICAL.to_radians() * 0.5).tan() / self.zoom;
        2.0 * half.atan()
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    /// Projection matrix with depth in [0, 1].
    pub fn proj(&self) -> Mat4 {
        match self.projection {
            Projection::Perspective => Mat4::perspective_rh(
                self.fov_y(),
                self.aspect,
                PERSP_CAMERA_NEAR_CLIP_PLANE,
                PERSP_CAMERA_FAR_CLIP_PLANE,
            ),
            Projection::Orthographic => {
                let half_h = ORTHO_CAMERA_FRUSTUM_HALF_EXTENT / self.zoom;
                let half_w = half_h * self.aspect;
                Mat4::orthographic_rh(
                    -half_w,
                    half_w,
                    -half_h,
                    half_h,
                    -ORTHO_NEAR_FAR,
                    ORTHO_NEAR_FAR,
                )
            }
        }
    }

    pub fn view_proj(&self) -> Mat4 {
        self.proj() * self.view()
    }

    /// Projects a world point to screen pixels (top-left origin). Returns
    /// `None` for points behind a perspective camera.
    pub fn world_to_screen(&self, view_proj: &Mat4, point: Vec3, width: f32, height: f32) -> Option<Vec2> {
        let clip = *view_proj * point.extend(1.0);
        if clip.w <= 0.0 {
            return None;
        }
        let ndc = clip.xyz() / clip.w;
        Some(Vec2::new(
            (ndc.x + 1.0) * 0.5 * width,
            (1.0 - ndc.y) * 0.5 * height,
        ))
    }

    /// Height of the visible world at the target distance, in world units.
    fn visible_height_at_target(&self) -> f32 {
        match self.projection {
            Projection::Perspective => {
                let distance = (self.position - self.target).length();
                2.0 * distance * (self.fov_y() * 0.5).tan()
            }
            Projection::Orthographic => 2.0 * ORTHO_CAMERA_FRUSTUM_HALF_EXTENT / self.zoom,
        }
    }
}

/// What a primary-button drag does to the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragAction {
    Orbit,
    Pan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
}

#[derive(Debug, Clone, Copy)]
struct Drag {
    action: DragAction,
    last: Vec2,
}

/// Orbit/pan/zoom camera manipulation driven by pointer drags and the wheel.
#[derive(Debug, Clone)]
pub struct OrbitControls {
    /// When false every input is ignored; cleared while a selection gesture runs.
    pub enabled: bool,
    pub enable_rotate: bool,
    pub enable_pan: bool,
    pub enable_zoom: bool,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    /// Action bound to the primary button.
    pub primary_action: DragAction,
    drag: Option<Drag>,
}

impl OrbitControls {
    /// Controls for a freshly built camera. Rotation is only allowed in 3D.
    pub fn new(projection: Projection) -> Self {
        let rotate = projection == Projection::Perspective;
        Self {
            enabled: true,
            enable_rotate: rotate,
            enable_pan: true,
            enable_zoom: true,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            primary_action: if rotate { DragAction::Orbit } else { DragAction::Pan },
            drag: None,
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Starts a drag. Returns true when a manual camera interaction began.
    pub fn pointer_down(&mut self, position: Vec2, button: PointerButton) -> bool {
        if !self.enabled {
            return false;
        }
        let action = match button {
            PointerButton::Primary => self.primary_action,
            PointerButton::Secondary => match self.primary_action {
                DragAction::Orbit => DragAction::Pan,
                DragAction::Pan if self.enable_rotate => DragAction::Orbit,
                DragAction::Pan => DragAction::Pan,
            },
            PointerButton::Middle => return false,
        };
        let allowed = match action {
            DragAction::Orbit => self.enable_rotate,
            DragAction::Pan => self.enable_pan,
        };
        if !allowed {
            return false;
        }
        self.drag = Some(Drag {
            action,
            last: position,
        });
        true
    }

    /// Applies drag motion. Returns true when the camera moved.
    pub fn pointer_move(&mut self, position: Vec2, camera: &mut Camera, viewport: Vec2) -> bool {
        if !self.enabled {
            return false;
        }
        let Some(drag) = self.drag.as_mut() else {
            return false;
        };
        let delta = position - drag.last;
        drag.last = position;
        if delta == Vec2::ZERO {
            return false;
        }
        match drag.action {
            DragAction::Orbit => {
                let height = viewport.y.max(1.0);
                let d_theta = -std::f32::consts::TAU * delta.x / height * self.rotate_speed;
                let d_phi = -std::f32::consts::TAU * delta.y / height * self.rotate_speed;
                rotate(camera, d_theta, d_phi);
            }
            DragAction::Pan => pan(camera, delta, viewport),
        }
        true
    }

    pub fn pointer_up(&mut self) {
        self.drag = None;
    }

    /// Zooms on wheel input. Positive delta zooms in.
    pub fn wheel(&mut self, delta: f32, camera: &mut Camera) -> bool {
        if !self.enabled || !self.enable_zoom || delta == 0.0 {
            return false;
        }
        let scale = 1.1_f32.powf(-delta * self.zoom_speed);
        match camera.projection {
            Projection::Perspective => {
                let offset = camera.position - camera.target;
                let distance = (offset.length() * scale).clamp(MIN_DISTANCE, MAX_DISTANCE);
                camera.position = camera.target + offset.normalize_or_zero() * distance;
            }
            Projection::Orthographic => {
                camera.zoom = (camera.zoom / scale).clamp(MIN_ZOOM, MAX_ZOOM);
            }
        }
        true
    }

    /// Rotates the camera around the up axis; used by the orbit animation.
    pub fn rotate_left(&self, angle: f32, camera: &mut Camera) {
        if self.enable_rotate {
            rotate(camera, -angle, 0.0);
        }
    }
}

/// Rotates the camera position around the target by spherical deltas.
fn rotate(camera: &mut Camera, d_theta: f32, d_phi: f32) {
    let offset = camera.position - camera.target;
    let radius = offset.length();
    if radius <= f32::EPSILON {
        return;
    }
    let theta = offset.x.atan2(offset.z) + d_theta;
    let phi = ((offset.y / radius).clamp(-1.0, 1.0).acos() + d_phi)
        .clamp(POLAR_EPSILON, std::f32::consts::PI - POLAR_EPSILON);
    let (sin_phi, cos_phi) = phi.sin_cos();
    let (sin_theta, cos_theta) = theta.sin_cos();
    camera.position = camera.target
        + Vec3::new(
            radius * sin_phi * sin_theta,
            radius * cos_phi,
            radius * sin_phi * cos_theta,
        );
}

/// Translates camera and target so the world follows the pointer.
fn pan(camera: &mut Camera, delta: Vec2, viewport: Vec2) {
    let height = viewport.y.max(1.0);
    let world_per_px = camera.visible_height_at_target() / height;
    let forward = (camera.target - camera.position).normalize_or_zero();
    let right = forward.cross(camera.up).normalize_or_zero();
    let up = right.cross(forward);
    let shift = (-right * delta.x + up * delta.y) * world_per_px;
    camera.position += shift;
    camera.target += shift;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-4
    }

    #[test]
    fn target_projects_to_screen_center() {
        for projection in [Projection::Orthographic, Projection::Perspective] {
            let cam = Camera::new(&CameraDef::default_for(projection), 800.0 / 600.0);
            let vp = cam.view_proj();
            let p = cam.world_to_screen(&vp, cam.target, 800.0, 600.0).unwrap();
            assert!((p - Vec2::new(400.0, 300.0)).length() < 1e-3, "{projection:?}: {p}");
        }
    }

    #[test]
    fn orthographic_screen_axes() {
        let cam = Camera::new(&CameraDef::default_for(Projection::Orthographic), 1.0);
        let vp = cam.view_proj();
        let right = cam.world_to_screen(&vp, Vec3::X, 600.0, 600.0).unwrap();
        let up = cam.world_to_screen(&vp, Vec3::Y, 600.0, 600.0).unwrap();
        assert!(right.x > 300.0 && (right.y - 300.0).abs() < 1e-3);
        assert!(up.y < 300.0 && (up.x - 300.0).abs() < 1e-3);
    }

    #[test]
    fn points_behind_perspective_camera_are_culled() {
        let cam = Camera::new(&CameraDef::default_for(Projection::Perspective), 1.0);
        let vp = cam.view_proj();
        let behind = cam.position + (cam.position - cam.target);
        assert!(cam.world_to_screen(&vp, behind, 100.0, 100.0).is_none());
    }

    #[test]
    fn rotation_disabled_in_2d() {
        let mut controls = OrbitControls::new(Projection::Orthographic);
        let mut cam = Camera::new(&CameraDef::default_for(Projection::Orthographic), 1.0);
        let before = cam.position;
        controls.rotate_left(1.0, &mut cam);
        assert!(approx(cam.position, before));
        assert_eq!(controls.primary_action, DragAction::Pan);
    }

    #[test]
    fn orbit_keeps_distance_to_target() {
        let mut controls = OrbitControls::new(Projection::Perspective);
        let mut cam = Camera::new(&CameraDef::default_for(Projection::Perspective), 1.0);
        let radius = (cam.position - cam.target).length();
        assert!(controls.pointer_down(Vec2::new(10.0, 10.0), PointerButton::Primary));
        assert!(controls.pointer_move(Vec2::new(60.0, 30.0), &mut cam, Vec2::new(400.0, 400.0)));
        controls.pointer_up();
        assert!(((cam.position - cam.target).length() - radius).abs() < 1e-4);
        assert!(!controls.is_dragging());
    }

    #[test]
    fn pan_moves_camera_and_target_together() {
        let mut controls = OrbitControls::new(Projection::Orthographic);
        let mut cam = Camera::new(&CameraDef::default_for(Projection::Orthographic), 1.0);
        let offset = cam.position - cam.target;
        controls.pointer_down(Vec2::ZERO, PointerButton::Primary);
        controls.pointer_move(Vec2::new(100.0, 0.0), &mut cam, Vec2::new(400.0, 400.0));
        assert!(approx(cam.position - cam.target, offset));
        assert!(cam.target.x < 0.0);
    }

    #[test]
    fn disabled_controls_ignore_input() {
        let mut controls = OrbitControls::new(Projection::Perspective);
        controls.enabled = false;
        let mut cam = Camera::new(&CameraDef::default_for(Projection::Perspective), 1.0);
        assert!(!controls.pointer_down(Vec2::ZERO, PointerButton::Primary));
        assert!(!controls.wheel(1.0, &mut cam));
    }

    #[test]
    fn wheel_zooms_by_projection_kind() {
        let mut controls = OrbitControls::new(Projection::Orthographic);
        let mut cam = Camera::new(&CameraDef::default_for(Projection::Orthographic), 1.0);
        controls.wheel(1.0, &mut cam);
        assert!(cam.zoom > 1.0);

        let mut controls = OrbitControls::new(Projection::Perspective);
        let mut cam = Camera::new(&CameraDef::default_for(Projection::Perspective), 1.0);
        let before = (cam.position - cam.target).length();
        controls.wheel(1.0, &mut cam);
        assert!((cam.position - cam.target).length() < before);
    }
}
