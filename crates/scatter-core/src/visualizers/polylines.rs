use super::{ScatterVisualizer, Sequence, VisualizerKind};
use crate::render_context::RenderContext;
use crate::scene::{Drawable, LinesObject, ObjectId, SceneHandle, SceneObject};
use crate::style::Style;
use glam::Vec3;

/// Connects the points of each sequence in order. Lines are not pickable.
pub struct PolylinesVisualizer {
    style: Style,
    scene: Option<SceneHandle>,
    /// One object per sequence, in sequence order.
    objects: Vec<ObjectId>,
    sequences: Vec<Sequence>,
    positions: Vec<Vec3>,
}

impl PolylinesVisualizer {
    pub fn new(style: Style) -> Self {
        Self {
            style,
            scene: None,
            objects: Vec::new(),
            sequences: Vec::new(),
            positions: Vec::new(),
        }
    }

    fn detach(&mut self) {
        if let Some(scene) = &self.scene {
            let mut scene = scene.borrow_mut();
            for id in self.objects.drain(..) {
                scene.remove(id);
            }
        }
        self.objects.clear();
    }

    fn rebuild(&mut self) {
        self.detach();
        let Some(scene) = &self.scene else { return };
        if self.positions.is_empty() {
            return;
        }
        let mut scene = scene.borrow_mut();
        let [r, g, b] = self.style.polyline_color;
        for sequence in &self.sequences {
            let segments = sequence
                .indices
                .windows(2)
                .filter_map(|pair| {
                    let a = self.positions.get(pair[0])?;
                    let b = self.positions.get(pair[1])?;
                    Some([*a, *b])
                })
                .collect();
            let object = LinesObject {
                segments,
                color: [r, g, b, self.style.polyline_opacity],
                width_px: self.style.polyline_width,
            };
            self.objects.push(scene.add(SceneObject::new(Drawable::Lines(object))));
        }
        log::debug!("built {} polylines", self.objects.len());
    }

    fn set_visible(&self, visible: bool) {
        if let Some(scene) = &self.scene {
            let mut scene = scene.borrow_mut();
            for id in &self.objects {
                scene.set_visible(*id, visible);
            }
        }
    }
}

impl ScatterVisualizer for PolylinesVisualizer {
    fn kind(&self) -> VisualizerKind {
        VisualizerKind::Polylines
    }

    fn set_scene(&mut self, scene: SceneHandle) {
        self.detach();
        self.scene = Some(scene);
        self.rebuild();
    }

    fn on_sequences_changed(&mut self, sequences: &[Sequence]) {
        self.sequences = sequences.to_vec();
        self.rebuild();
    }

    fn on_point_positions_changed(&mut self, positions: &[Vec3]) {
        self.positions = positions.to_vec();
        self.rebuild();
    }

    fn on_resize(&mut self, _width: u32, _height: u32) {}

    fn on_picking_render(&mut self, _ctx: &RenderContext) {
        self.set_visible(false);
    }

    fn on_render(&mut self, ctx: &RenderContext) {
        let Some(scene) = &self.scene else { return };
        let mut scene = scene.borrow_mut();
        for (i, id) in self.objects.iter().enumerate() {
            let Some(object) = scene.get_mut(*id) else { continue };
            object.visible = true;
            if let Drawable::Lines(lines) = &mut object.drawable {
                let [r, g, b] = ctx
                    .polyline_colors
                    .get(i)
                    .copied()
                    .unwrap_or(self.style.polyline_color);
                let opacity = ctx
                    .polyline_opacities
                    .get(i)
                    .copied()
                    .unwrap_or(self.style.polyline_opacity);
                lines.color = [r, g, b, opacity];
                lines.width_px = ctx
                    .polyline_widths
                    .get(i)
                    .copied()
                    .unwrap_or(self.style.polyline_width);
            }
        }
    }

    fn dispose(&mut self) {
        self.detach();
        self.scene = None;
        self.sequences.clear();
        self.positions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{Camera, CameraDef, Projection};
    use crate::scene::Scene;

    fn lines(scene: &SceneHandle) -> Vec<LinesObject> {
        scene
            .borrow()
            .visible()
            .filter_map(|o| match &o.drawable {
                Drawable::Lines(l) => Some(l.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn one_object_per_sequence_styled_per_frame() {
        let scene = Scene::new_handle([1.0; 4]);
        let mut vis = PolylinesVisualizer::new(Style::default());
        vis.set_scene(scene.clone());
        vis.on_sequences_changed(&[
            Sequence {
                indices: vec![0, 1, 2],
            },
            Sequence { indices: vec![2, 0] },
        ]);
        vis.on_point_positions_changed(&[Vec3::ZERO, Vec3::X, Vec3::Y]);

        let built = lines(&scene);
        assert_eq!(built.len(), 2);
        assert_eq!(built[0].segments, vec![[Vec3::ZERO, Vec3::X], [Vec3::X, Vec3::Y]]);

        let camera = Camera::new(&CameraDef::default_for(Projection::Orthographic), 1.0);
        let ctx = RenderContext {
            camera: &camera,
            view_proj: camera.view_proj(),
            camera_target: camera.target,
            screen_width: 10,
            screen_height: 10,
            device_pixel_ratio: 1.0,
            nearest_camera_space_point_z: 0.0,
            farthest_camera_space_point_z: 0.0,
            background_color: [1.0; 3],
            point_colors: &[],
            point_scale_factors: &[],
            labels: None,
            polyline_colors: &[[1.0, 0.0, 0.0]],
            polyline_opacities: &[],
            polyline_widths: &[5.0, 1.0],
        };
        vis.on_picking_render(&ctx);
        assert!(lines(&scene).is_empty());

        vis.on_render(&ctx);
        let styled = lines(&scene);
        assert_eq!(styled[0].color, [1.0, 0.0, 0.0, Style::default().polyline_opacity]);
        assert_eq!(styled[1].width_px, 1.0);

        vis.dispose();
        assert!(scene.borrow().is_empty());
    }
}
