use super::{auto_point_size, ScatterVisualizer, VisualizerKind};
use crate::picking::index_to_rgba;
use crate::render_context::RenderContext;
use crate::scene::{Drawable, Fog, ObjectId, PointShape, PointsObject, SceneHandle, SceneObject};
use crate::style::Style;
use glam::Vec3;

/// Below this many points the fog thins out proportionally.
const NUM_POINTS_FOG_THRESHOLD: usize = 5000;

/// Fog spanning the point cloud's depth range in 3D scenes; `None` in 2D.
pub(crate) fn scene_fog(ctx: &RenderContext, point_count: usize) -> Option<Fog> {
    if !ctx.is_3d() {
        return None;
    }
    // Fewer points get less fog by pushing the far edge out.
    let multiplier =
        2.0 - point_count.min(NUM_POINTS_FOG_THRESHOLD) as f32 / NUM_POINTS_FOG_THRESHOLD as f32;
    Some(Fog {
        color: ctx.background_color,
        near: ctx.nearest_camera_space_point_z,
        far: ctx.farthest_camera_space_point_z * multiplier,
    })
}

/// Renders every point as a round dot.
pub struct PointsVisualizer {
    style: Style,
    scene: Option<SceneHandle>,
    object: Option<ObjectId>,
    positions: Vec<Vec3>,
}

impl PointsVisualizer {
    pub fn new(style: Style) -> Self {
        Self {
            style,
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
        let Some(scene) = &self.scene else { return };
        if self.positions.is_empty() {
            return;
        }
        let n = self.positions.len();
        let object = PointsObject {
            positions: self.positions.clone(),
            colors: vec![self.style.point_color; n],
            sizes: vec![auto_point_size(n, true); n],
            size_attenuation: true,
            shape: PointShape::Circle,
            fog: None,
            transparent: true,
        };
        self.object = Some(scene.borrow_mut().add(SceneObject::new(Drawable::Points(object))));
    }

    fn update(&mut self, f: impl FnOnce(&mut PointsObject)) {
        let (Some(scene), Some(id)) = (&self.scene, self.object) else {
            return;
        };
        let mut scene = scene.borrow_mut();
        if let Some(object) = scene.get_mut(id) {
            object.visible = true;
            if let Drawable::Points(points) = &mut object.drawable {
                f(points);
            }
        }
    }

    fn sizes(&self, ctx: &RenderContext) -> Vec<f32> {
        let base = auto_point_size(self.positions.len(), ctx.is_3d());
        (0..self.positions.len())
            .map(|i| base * ctx.point_scale(i))
            .collect()
    }
}

impl ScatterVisualizer for PointsVisualizer {
    fn kind(&self) -> VisualizerKind {
        VisualizerKind::Points
    }

    fn set_scene(&mut self, scene: SceneHandle) {
        self.detach();
        self.scene = Some(scene);
        self.attach();
    }

    fn on_point_positions_changed(&mut self, positions: &[Vec3]) {
        self.detach();
        self.positions = positions.to_vec();
        self.attach();
    }

    fn on_resize(&mut self, _width: u32, _height: u32) {}

    fn on_picking_render(&mut self, ctx: &RenderContext) {
        let sizes = self.sizes(ctx);
        let is_3d = ctx.is_3d();
        self.update(|points| {
            points.colors = (0..points.positions.len()).map(index_to_rgba).collect();
            points.sizes = sizes;
            points.size_attenuation = is_3d;
            points.fog = None;
            points.transparent = false;
        });
    }

    fn on_render(&mut self, ctx: &RenderContext) {
        let sizes = self.sizes(ctx);
        let is_3d = ctx.is_3d();
        let fog = if self.style.fog {
            scene_fog(ctx, self.positions.len())
        } else {
            None
        };
        let default_color = self.style.point_color;
        self.update(|points| {
            points.colors = (0..points.positions.len())
                .map(|i| ctx.point_color(i, default_color))
                .collect();
            points.sizes = sizes;
            points.size_attenuation = is_3d;
            points.fog = fog;
            points.transparent = true;
        });
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
    use crate::scene::Scene;

    fn ctx<'a>(camera: &'a Camera, colors: &'a [[f32; 4]]) -> RenderContext<'a> {
        RenderContext {
            camera,
            view_proj: camera.view_proj(),
            camera_target: camera.target,
            screen_width: 100,
            screen_height: 100,
            device_pixel_ratio: 1.0,
            nearest_camera_space_point_z: 1.0,
            farthest_camera_space_point_z: 2.0,
            background_color: [1.0; 3],
            point_colors: colors,
            point_scale_factors: &[],
            labels: None,
            polyline_colors: &[],
            polyline_opacities: &[],
            polyline_widths: &[],
        }
    }

    fn points(scene: &SceneHandle) -> PointsObject {
        let scene = scene.borrow();
        let found = scene.visible().find_map(|o| match &o.drawable {
            Drawable::Points(p) => Some(p.clone()),
            _ => None,
        });
        found.expect("points object")
    }

    #[test]
    fn picking_pass_encodes_ids_without_fog() {
        let scene = Scene::new_handle([1.0; 4]);
        let mut vis = PointsVisualizer::new(Style::default());
        vis.set_scene(scene.clone());
        vis.on_point_positions_changed(&[Vec3::ZERO, Vec3::X]);
        let camera = Camera::new(&CameraDef::default_for(Projection::Perspective), 1.0);
        let colors = [[1.0, 0.0, 0.0, 1.0], [0.0, 1.0, 0.0, 1.0]];

        vis.on_picking_render(&ctx(&camera, &colors));
        let p = points(&scene);
        assert_eq!(p.colors[1], index_to_rgba(1));
        assert!(p.fog.is_none());
        assert!(!p.transparent);

        vis.on_render(&ctx(&camera, &colors));
        let p = points(&scene);
        assert_eq!(p.colors, colors);
        let fog = p.fog.expect("3d scenes are fogged");
        // Two points is far below the threshold, so the far edge is pushed out.
        assert!(fog.far > 2.0 * 1.99);
    }

    #[test]
    fn no_fog_in_2d() {
        let camera = Camera::new(&CameraDef::default_for(Projection::Orthographic), 1.0);
        assert!(scene_fog(&ctx(&camera, &[]), 10).is_none());
    }

    #[test]
    fn repositioning_replaces_the_object() {
        let scene = Scene::new_handle([1.0; 4]);
        let mut vis = PointsVisualizer::new(Style::default());
        vis.set_scene(scene.clone());
        vis.on_point_positions_changed(&[Vec3::ZERO]);
        vis.on_point_positions_changed(&[Vec3::ZERO, Vec3::Y, Vec3::X]);
        assert_eq!(scene.borrow().len(), 1);
        assert_eq!(points(&scene).positions.len(), 3);
        vis.dispose();
        vis.dispose();
        assert!(scene.borrow().is_empty());
    }
}
