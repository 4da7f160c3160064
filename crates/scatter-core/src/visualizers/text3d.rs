use super::{ScatterVisualizer, TextMeasure, VisualizerKind};
use crate::picking::index_to_rgba;
use crate::render_context::RenderContext;
use crate::scene::{Drawable, ObjectId, SceneHandle, SceneObject, TextBillboard, TextObject};
use crate::style::Style;
use glam::{Vec2, Vec3};
use std::rc::Rc;

/// Draws every point as its label text, facing the camera.
///
/// In the picking pass each billboard becomes a solid rectangle in its point's
/// ID color, so clicking anywhere on the text picks the point.
pub struct Text3dVisualizer {
    style: Style,
    measure: Rc<dyn TextMeasure>,
    scene: Option<SceneHandle>,
    object: Option<ObjectId>,
    positions: Vec<Vec3>,
    labels: Vec<String>,
}

impl Text3dVisualizer {
    pub fn new(style: Style, measure: Rc<dyn TextMeasure>) -> Self {
        Self {
            style,
            measure,
            scene: None,
            object: None,
            positions: Vec::new(),
            labels: Vec::new(),
        }
    }

    fn detach(&mut self) {
        if let (Some(scene), Some(id)) = (&self.scene, self.object.take()) {
            scene.borrow_mut().remove(id);
        }
    }

    fn rebuild(&mut self) {
        self.detach();
        let Some(scene) = &self.scene else { return };
        let font_size_px = self.style.text3d_font_size;
        let billboards: Vec<_> = self
            .positions
            .iter()
            .zip(&self.labels)
            .enumerate()
            .filter(|(_, (_, text))| !text.is_empty())
            .map(|(point_index, (anchor, text))| TextBillboard {
                point_index,
                anchor: *anchor,
                text: text.clone(),
                font_size_px,
                extent_px: Vec2::new(self.measure.text_width(text, font_size_px), font_size_px),
                color: self.style.text3d_color,
            })
            .collect();
        if billboards.is_empty() {
            return;
        }
        let object = TextObject {
            billboards,
            solid: false,
        };
        self.object = Some(scene.borrow_mut().add(SceneObject::new(Drawable::Text(object))));
    }

    /// Switches between solid ID rectangles and colored glyphs.
    fn restyle(&self, ctx: &RenderContext, picking: bool) {
        let (Some(scene), Some(id)) = (&self.scene, self.object) else {
            return;
        };
        let mut scene = scene.borrow_mut();
        let Some(SceneObject {
            drawable: Drawable::Text(text),
            ..
        }) = scene.get_mut(id)
        else {
            return;
        };
        text.solid = picking;
        for billboard in &mut text.billboards {
            self.apply_scale(ctx, billboard);
            billboard.color = if picking {
                index_to_rgba(billboard.point_index)
            } else {
                ctx.point_color(billboard.point_index, self.style.text3d_color)
            };
        }
    }

    /// Rescales billboards by the per-point scale factor.
    fn apply_scale(&self, ctx: &RenderContext, billboard: &mut TextBillboard) {
        let font_size_px = self.style.text3d_font_size * ctx.point_scale(billboard.point_index);
        billboard.font_size_px = font_size_px;
        billboard.extent_px = Vec2::new(
            self.measure.text_width(&billboard.text, font_size_px),
            font_size_px,
        );
    }
}

impl ScatterVisualizer for Text3dVisualizer {
    fn kind(&self) -> VisualizerKind {
        VisualizerKind::Text3d
    }

    fn set_scene(&mut self, scene: SceneHandle) {
        self.detach();
        self.scene = Some(scene);
        self.rebuild();
    }

    fn on_label_strings_changed(&mut self, labels: &[String]) {
        self.labels = labels.to_vec();
        self.rebuild();
    }

    fn on_point_positions_changed(&mut self, positions: &[Vec3]) {
        self.positions = positions.to_vec();
        self.rebuild();
    }

    fn on_resize(&mut self, _width: u32, _height: u32) {}

    fn on_picking_render(&mut self, ctx: &RenderContext) {
        self.restyle(ctx, true);
    }

    fn on_render(&mut self, ctx: &RenderContext) {
        self.restyle(ctx, false);
    }

    fn dispose(&mut self) {
        self.detach();
        self.scene = None;
        self.positions.clear();
        self.labels.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{Camera, CameraDef, Projection};
    use crate::scene::Scene;
    use crate::visualizers::EstimatedTextMeasure;

    fn ctx(camera: &Camera) -> RenderContext<'_> {
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
            point_colors: &[],
            point_scale_factors: &[],
            labels: None,
            polyline_colors: &[],
            polyline_opacities: &[],
            polyline_widths: &[],
        }
    }

    fn billboards(scene: &SceneHandle) -> Vec<TextBillboard> {
        scene
            .borrow()
            .visible()
            .filter_map(|o| match &o.drawable {
                Drawable::Text(t) => Some(t.billboards.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    #[test]
    fn skips_unlabeled_points_and_encodes_ids_for_picking() {
        let scene = Scene::new_handle([1.0; 4]);
        let mut vis = Text3dVisualizer::new(Style::default(), Rc::new(EstimatedTextMeasure::default()));
        vis.set_scene(scene.clone());
        vis.on_label_strings_changed(&["a".into(), String::new(), "ccc".into()]);
        vis.on_point_positions_changed(&[Vec3::ZERO, Vec3::X, Vec3::Y]);

        let camera = Camera::new(&CameraDef::default_for(Projection::Perspective), 1.0);
        vis.on_picking_render(&ctx(&camera));
        let picked = billboards(&scene);
        assert_eq!(picked.len(), 2);
        assert_eq!(picked[1].point_index, 2);
        assert_eq!(picked[1].color, index_to_rgba(2));
        assert!(picked[1].extent_px.x > picked[0].extent_px.x);

        vis.on_render(&ctx(&camera));
        assert_eq!(billboards(&scene)[0].color, Style::default().text3d_color);

        vis.dispose();
        assert!(scene.borrow().is_empty());
    }
}
