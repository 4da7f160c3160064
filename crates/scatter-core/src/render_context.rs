//! Immutable per-frame snapshot passed to every visualizer call.

use crate::camera::Camera;
use crate::error::{Result, ScatterError};
use glam::{Mat4, Vec3};

/// The sparse set of labels currently on screen (hover point plus selection).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelRenderParams {
    pub point_indices: Vec<usize>,
    pub label_strings: Vec<String>,
    pub scale_factors: Vec<f32>,
    /// Fade the label with camera distance in 3D scenes.
    pub use_scene_opacity_flags: Vec<bool>,
    pub default_font_size: f32,
    pub fill_colors: Vec<[u8; 3]>,
    pub stroke_colors: Vec<[u8; 3]>,
}

impl LabelRenderParams {
    pub fn len(&self) -> usize {
        self.point_indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.point_indices.is_empty()
    }

    /// Every per-label field must line up with `point_indices`, and every
    /// index must name an existing point.
    pub fn validate(&self, point_count: usize) -> Result<()> {
        let expected = self.len();
        let fields = [
            ("label_strings", self.label_strings.len()),
            ("scale_factors", self.scale_factors.len()),
            ("use_scene_opacity_flags", self.use_scene_opacity_flags.len()),
            ("fill_colors", self.fill_colors.len()),
            ("stroke_colors", self.stroke_colors.len()),
        ];
        for (field, actual) in fields {
            if actual != expected {
                return Err(ScatterError::LabelParamsMismatch {
                    field,
                    expected,
                    actual,
                });
            }
        }
        if let Some(&bad) = self.point_indices.iter().find(|&&i| i >= point_count) {
            return Err(ScatterError::BufferLengthMismatch {
                buffer: "label point index",
                expected: point_count,
                actual: bad,
            });
        }
        Ok(())
    }
}

pub struct RenderContext<'a> {
    pub camera: &'a Camera,
    /// `camera.view_proj()`, computed once per frame.
    pub view_proj: Mat4,
    pub camera_target: Vec3,
    /// Logical (CSS) pixel size of the surface.
    pub screen_width: u32,
    pub screen_height: u32,
    pub device_pixel_ratio: f32,
    /// Distance from the camera to the nearest point in front of it.
    pub nearest_camera_space_point_z: f32,
    /// Distance from the camera to the farthest point in front of it.
    pub farthest_camera_space_point_z: f32,
    pub background_color: [f32; 3],
    /// Per-point RGBA; empty when the facade supplied none.
    pub point_colors: &'a [[f32; 4]],
    /// Per-point scale factor; empty when the facade supplied none.
    pub point_scale_factors: &'a [f32],
    pub labels: Option<&'a LabelRenderParams>,
    /// Per-sequence RGB; empty means default.
    pub polyline_colors: &'a [[f32; 3]],
    pub polyline_opacities: &'a [f32],
    pub polyline_widths: &'a [f32],
}

impl RenderContext<'_> {
    pub fn is_3d(&self) -> bool {
        self.camera.is_perspective()
    }

    pub fn point_color(&self, index: usize, default: [f32; 4]) -> [f32; 4] {
        self.point_colors.get(index).copied().unwrap_or(default)
    }

    pub fn point_scale(&self, index: usize) -> f32 {
        self.point_scale_factors.get(index).copied().unwrap_or(1.0)
    }
}

/// Distances to the nearest and farthest points in front of the camera.
/// Returns `(0, 0)` when no point is in front.
pub fn near_far_points(positions: &[Vec3], camera_position: Vec3, camera_target: Vec3) -> (f32, f32) {
    let view_dir = (camera_target - camera_position).normalize_or_zero();
    let mut nearest = f32::INFINITY;
    let mut farthest = 0.0f32;
    for p in positions {
        let to_point = *p - camera_position;
        if view_dir.dot(to_point) < 0.0 {
            continue;
        }
        let distance = to_point.length();
        nearest = nearest.min(distance);
        farthest = farthest.max(distance);
    }
    if nearest.is_finite() {
        (nearest, farthest)
    } else {
        (0.0, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(n: usize) -> LabelRenderParams {
        LabelRenderParams {
            point_indices: (0..n).collect(),
            label_strings: vec!["x".into(); n],
            scale_factors: vec![1.0; n],
            use_scene_opacity_flags: vec![false; n],
            default_font_size: 10.0,
            fill_colors: vec![[0, 0, 0]; n],
            stroke_colors: vec![[255, 255, 255]; n],
        }
    }

    #[test]
    fn label_params_must_line_up() {
        assert!(params(3).validate(3).is_ok());
        let mut p = params(3);
        p.fill_colors.pop();
        assert_eq!(
            p.validate(3),
            Err(ScatterError::LabelParamsMismatch {
                field: "fill_colors",
                expected: 3,
                actual: 2
            })
        );
        assert!(params(3).validate(2).is_err());
    }

    #[test]
    fn near_far_ignores_points_behind_camera() {
        let cam = Vec3::new(0.0, 0.0, 5.0);
        let pts = [
            Vec3::new(0.0, 0.0, 4.0),
            Vec3::new(0.0, 0.0, -3.0),
            Vec3::new(0.0, 0.0, 10.0),
        ];
        let (near, far) = near_far_points(&pts, cam, Vec3::ZERO);
        assert!((near - 1.0).abs() < 1e-6);
        assert!((far - 8.0).abs() < 1e-6);
        assert_eq!(near_far_points(&pts[2..], cam, Vec3::ZERO), (0.0, 0.0));
    }
}
