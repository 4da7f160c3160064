//! Screen-space labels for the hovered and selected points, decluttered with a
//! [`CollisionGrid`] so no two labels overlap.

use super::{ScatterVisualizer, TextMeasure, VisualizerKind};
use crate::collision_grid::{BoundingBox, CollisionGrid};
use crate::render_context::RenderContext;
use crate::scene::{Drawable, ObjectId, SceneHandle, SceneObject, ScreenLabel};
use crate::style::Style;
use glam::{Vec2, Vec3};
use std::rc::Rc;

pub const MAX_LABELS_ON_SCREEN: usize = 10_000;
const LABEL_MARGIN_PX: f32 = 2.0;
const LABEL_X_SHIFT_PX: f32 = 4.0;
/// The grid is split into this many columns and rows.
const GRID_COLUMNS: f32 = 25.0;
const GRID_ROWS: f32 = 50.0;
const MIN_LABEL_OPACITY: f32 = 0.1;

/// Maps camera distance onto label opacity: the farthest point gets
/// [`MIN_LABEL_OPACITY`], the nearest full opacity, along a power curve.
fn distance_opacity(distance: f32, nearest: f32, farthest: f32) -> f32 {
    let e = std::f32::consts::E;
    let (d0, d1) = (farthest.powf(e), nearest.powf(e));
    if (d1 - d0).abs() <= f32::EPSILON {
        return 1.0;
    }
    let t = (distance.powf(e) - d0) / (d1 - d0);
    (MIN_LABEL_OPACITY + (1.0 - MIN_LABEL_OPACITY) * t).clamp(MIN_LABEL_OPACITY, 1.0)
}

fn rgb_with_alpha(rgb: [u8; 3], alpha: f32) -> [f32; 4] {
    [
        rgb[0] as f32 / 255.0,
        rgb[1] as f32 / 255.0,
        rgb[2] as f32 / 255.0,
        alpha,
    ]
}

pub struct CanvasLabelsVisualizer {
    style: Style,
    measure: Rc<dyn TextMeasure>,
    scene: Option<SceneHandle>,
    object: Option<ObjectId>,
    positions: Vec<Vec3>,
}

impl CanvasLabelsVisualizer {
    pub fn new(style: Style, measure: Rc<dyn TextMeasure>) -> Self {
        Self {
            style,
            measure,
            scene: None,
            object: None,
            positions: Vec::new(),
        }
    }

    fn detach(&mut self) {
        if let (Some(scene), Some(id)) = (&self.scene, self.object.take()) {
            scene.borrow_mut().remove(id);
        }
    }

    fn attach(&mut self) {
        if let Some(scene) = &self.scene {
            let object = SceneObject::new(Drawable::ScreenLabels(Vec::new()));
            self.object = Some(scene.borrow_mut().add(object));
        }
    }

    fn set_labels(&self, labels: Vec<ScreenLabel>) {
        let (Some(scene), Some(id)) = (&self.scene, self.object) else {
            return;
        };
        if let Some(object) = scene.borrow_mut().get_mut(id) {
            object.drawable = Drawable::ScreenLabels(labels);
        }
    }

    /// Places labels in priority order, dropping any that would overlap one
    /// already placed.
    fn layout(&self, ctx: &RenderContext) -> Vec<ScreenLabel> {
        let Some(params) = ctx.labels else {
            return Vec::new();
        };
        let dpr = ctx.device_pixel_ratio;
        let width = ctx.screen_width as f32 * dpr;
        let height = ctx.screen_height as f32 * dpr;
        let mut grid = CollisionGrid::new(
            BoundingBox::new(0.0, 0.0, width, height),
            width / GRID_COLUMNS,
            height / GRID_ROWS,
        );
        let camera_position = ctx.camera.position;
        let cam_to_target = ctx.camera_target - camera_position;
        let is_3d = ctx.is_3d();

        let mut placed = Vec::new();
        let n = params.len().min(MAX_LABELS_ON_SCREEN);
        for i in 0..n {
            let Some(&point) = self.positions.get(params.point_indices[i]) else {
                continue;
            };
            let cam_to_point = point - camera_position;
            if cam_to_target.dot(cam_to_point) < 0.0 {
                continue;
            }
            let Some(screen) = ctx.camera.world_to_screen(&ctx.view_proj, point, width, height) else {
                continue;
            };
            let x = screen.x + LABEL_X_SHIFT_PX;
            let y = screen.y;
            let font_size_px = params.default_font_size * params.scale_factors[i] * dpr;

            // Measuring text is the costly step, so first test a one pixel
            // wide box and only measure labels that could still fit.
            let mut bbox = BoundingBox::new(
                x - LABEL_MARGIN_PX,
                y - font_size_px / 2.0 - LABEL_MARGIN_PX,
                x + 1.0 + LABEL_MARGIN_PX,
                y + font_size_px / 2.0 + LABEL_MARGIN_PX,
            );
            if !grid.insert(bbox, true) {
                continue;
            }
            let text = &params.label_strings[i];
            bbox.hi_x += self.measure.text_width(text, font_size_px) - 1.0;
            if !grid.insert(bbox, false) {
                continue;
            }

            let opacity = if is_3d && params.use_scene_opacity_flags[i] {
                distance_opacity(
                    cam_to_point.length(),
                    ctx.nearest_camera_space_point_z,
                    ctx.farthest_camera_space_point_z,
                )
            } else {
                1.0
            };
            placed.push(ScreenLabel {
                text: text.clone(),
                position: Vec2::new(x, y),
                font_size_px,
                fill: rgb_with_alpha(params.fill_colors[i], opacity),
                stroke: rgb_with_alpha(params.stroke_colors[i], opacity),
                stroke_width: self.style.label_stroke_width * dpr,
            });
        }
        placed
    }
}

impl ScatterVisualizer for CanvasLabelsVisualizer {
    fn kind(&self) -> VisualizerKind {
        VisualizerKind::CanvasLabels
    }

    fn set_scene(&mut self, scene: SceneHandle) {
        self.detach();
        self.scene = Some(scene);
        self.attach();
    }

    fn on_point_positions_changed(&mut self, positions: &[Vec3]) {
        self.positions = positions.to_vec();
        self.set_labels(Vec::new());
    }

    fn on_resize(&mut self, _width: u32, _height: u32) {
        self.set_labels(Vec::new());
    }

    /// Labels never take part in picking.
    fn on_picking_render(&mut self, _ctx: &RenderContext) {
        if let (Some(scene), Some(id)) = (&self.scene, self.object) {
            scene.borrow_mut().set_visible(id, false);
        }
    }

    fn on_render(&mut self, ctx: &RenderContext) {
        let labels = self.layout(ctx);
        self.set_labels(labels);
        if let (Some(scene), Some(id)) = (&self.scene, self.object) {
            scene.borrow_mut().set_visible(id, true);
        }
    }

    fn dispose(&mut self) {
        self.detach();
        self.scene = None;
        self.positions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{Camera, CameraDef, Projection};
    use crate::render_context::LabelRenderParams;
    use crate::scene::Scene;
    use crate::visualizers::EstimatedTextMeasure;

    fn params(indices: &[usize], use_opacity: bool) -> LabelRenderParams {
        let n = indices.len();
        LabelRenderParams {
            point_indices: indices.to_vec(),
            label_strings: (0..n).map(|i| format!("label {i}")).collect(),
            scale_factors: vec![1.0; n],
            use_scene_opacity_flags: vec![use_opacity; n],
            default_font_size: 10.0,
            fill_colors: vec![[0, 0, 0]; n],
            stroke_colors: vec![[255, 255, 255]; n],
        }
    }

    fn render(vis: &mut CanvasLabelsVisualizer, camera: &Camera, labels: &LabelRenderParams) {
        let ctx = RenderContext {
            camera,
            view_proj: camera.view_proj(),
            camera_target: camera.target,
            screen_width: 400,
            screen_height: 400,
            device_pixel_ratio: 1.0,
            nearest_camera_space_point_z: 1.0,
            farthest_camera_space_point_z: 3.0,
            background_color: [1.0; 3],
            point_colors: &[],
            point_scale_factors: &[],
            labels: Some(labels),
            polyline_colors: &[],
            polyline_opacities: &[],
            polyline_widths: &[],
        };
        vis.on_render(&ctx);
    }

    fn placed(scene: &SceneHandle) -> Vec<ScreenLabel> {
        scene.borrow().screen_labels().cloned().collect()
    }

    fn visualizer(scene: &SceneHandle, positions: &[Vec3]) -> CanvasLabelsVisualizer {
        let mut vis = CanvasLabelsVisualizer::new(Style::default(), Rc::new(EstimatedTextMeasure::default()));
        vis.set_scene(scene.clone());
        vis.on_point_positions_changed(positions);
        vis
    }

    #[test]
    fn overlapping_labels_keep_the_first() {
        let scene = Scene::new_handle([1.0; 4]);
        let positions = [Vec3::ZERO, Vec3::new(0.001, 0.0, 0.0), Vec3::new(0.8, 0.8, 0.0)];
        let mut vis = visualizer(&scene, &positions);
        let camera = Camera::new(&CameraDef::default_for(Projection::Orthographic), 1.0);
        render(&mut vis, &camera, &params(&[0, 1, 2], false));

        let labels = placed(&scene);
        assert_eq!(labels.len(), 2);
        assert_eq!(labels[0].text, "label 0");
        assert_eq!(labels[1].text, "label 2");
        // Anchored right of the point, vertically centered on it.
        assert_eq!(labels[0].position, Vec2::new(200.0 + LABEL_X_SHIFT_PX, 200.0));
    }

    #[test]
    fn labels_behind_the_camera_are_skipped() {
        let scene = Scene::new_handle([1.0; 4]);
        let def = CameraDef::default_for(Projection::Perspective);
        let behind = def.position + (def.position - def.target);
        let mut vis = visualizer(&scene, &[Vec3::ZERO, behind]);
        let camera = Camera::new(&def, 1.0);
        render(&mut vis, &camera, &params(&[1, 0], false));
        let labels = placed(&scene);
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].text, "label 1");
    }

    #[test]
    fn scene_opacity_fades_distant_labels() {
        assert!((distance_opacity(1.0, 1.0, 3.0) - 1.0).abs() < 1e-5);
        assert!((distance_opacity(3.0, 1.0, 3.0) - MIN_LABEL_OPACITY).abs() < 1e-5);
        let mid = distance_opacity(2.0, 1.0, 3.0);
        assert!(mid > MIN_LABEL_OPACITY && mid < 1.0);
        assert_eq!(distance_opacity(2.0, 2.0, 2.0), 1.0);
    }

    #[test]
    fn hidden_during_picking() {
        let scene = Scene::new_handle([1.0; 4]);
        let mut vis = visualizer(&scene, &[Vec3::ZERO]);
        let camera = Camera::new(&CameraDef::default_for(Projection::Orthographic), 1.0);
        render(&mut vis, &camera, &params(&[0], false));
        assert_eq!(placed(&scene).len(), 1);
        let ctx = RenderContext {
            camera: &camera,
            view_proj: camera.view_proj(),
            camera_target: camera.target,
            screen_width: 400,
            screen_height: 400,
            device_pixel_ratio: 1.0,
            nearest_camera_space_point_z: 0.0,
            farthest_camera_space_point_z: 0.0,
            background_color: [1.0; 3],
            point_colors: &[],
            point_scale_factors: &[],
            labels: None,
            polyline_colors: &[],
            polyline_opacities: &[],
            polyline_widths: &[],
        };
        vis.on_picking_render(&ctx);
        assert_eq!(placed(&scene).len(), 0);
        vis.dispose();
        assert!(scene.borrow().is_empty());
    }
}
