//! Flattens the scene into per-pipeline instance lists, in scene order.

use crate::data::types::{
    LineInstance, QuadInstance, QUAD_MODE_CIRCLE, QUAD_MODE_SPRITE, QUAD_MODE_SPRITE_MASK, QUAD_MODE_SQUARE,
};
use scatter_core::backend::{point_size_px, FrameParams};
use scatter_core::scene::{Drawable, PointShape, Scene, SpriteMode, SpriteSheet};
use std::rc::Rc;

pub enum Batch {
    Quads {
        instances: Vec<QuadInstance>,
        /// Bound for sprite modes; plain quads use the blank texture.
        sheet: Option<Rc<SpriteSheet>>,
    },
    Lines(Vec<LineInstance>),
}

impl Batch {
    fn is_empty(&self) -> bool {
        match self {
            Batch::Quads { instances, .. } => instances.is_empty(),
            Batch::Lines(lines) => lines.is_empty(),
        }
    }
}

fn quad(position: glam::Vec3, mode: u32, extent_px: [f32; 2], color: [f32; 4], uv_rect: [f32; 4]) -> QuadInstance {
    QuadInstance {
        position: position.to_array(),
        mode,
        extent_px,
        _pad: [0.0; 2],
        color,
        uv_rect,
    }
}

/// Builds one batch per visible drawable. Text glyphs and screen labels are
/// left to the overlay painter.
pub fn build_batches(scene: &Scene, frame: &FrameParams) -> Vec<Batch> {
    let dpr = frame.device_pixel_ratio;
    let mut batches = Vec::new();
    for object in scene.visible() {
        let batch = match &object.drawable {
            Drawable::Points(points) => {
                let mode = match points.shape {
                    PointShape::Circle => QUAD_MODE_CIRCLE,
                    PointShape::Square => QUAD_MODE_SQUARE,
                };
                let instances = points
                    .positions
                    .iter()
                    .enumerate()
                    .map(|(i, position)| {
                        let distance = (*position - frame.camera_position).length();
                        let size = point_size_px(points.sizes[i], points.size_attenuation, distance, dpr);
                        let mut color = points.colors[i];
                        if let Some(fog) = points.fog {
                            let f = fog.factor(distance);
                            for c in 0..3 {
                                color[c] += (fog.color[c] - color[c]) * f;
                            }
                        }
                        quad(*position, mode, [size, size], color, [0.0; 4])
                    })
                    .collect();
                Batch::Quads { instances, sheet: None }
            }
            Drawable::Sprites(sprites) => {
                let mode = match sprites.mode {
                    SpriteMode::Textured => QUAD_MODE_SPRITE,
                    SpriteMode::Mask => QUAD_MODE_SPRITE_MASK,
                };
                let instances = sprites
                    .positions
                    .iter()
                    .enumerate()
                    .map(|(i, position)| {
                        let distance = (*position - frame.camera_position).length();
                        let size = point_size_px(sprites.sizes[i], sprites.size_attenuation, distance, dpr);
                        let uv = sprites.sheet.uv_rect(sprites.sprite_indices[i]);
                        quad(*position, mode, [size, size], sprites.colors[i], uv)
                    })
                    .collect();
                Batch::Quads {
                    instances,
                    sheet: Some(sprites.sheet.clone()),
                }
            }
            Drawable::Text(text) if text.solid => {
                let instances = text
                    .billboards
                    .iter()
                    .map(|b| {
                        let extent = b.extent_px * dpr;
                        quad(b.anchor, QUAD_MODE_SQUARE, extent.to_array(), b.color, [0.0; 4])
                    })
                    .collect();
                Batch::Quads { instances, sheet: None }
            }
            Drawable::Lines(lines) => Batch::Lines(
                lines
                    .segments
                    .iter()
                    .map(|[a, b]| LineInstance {
                        a: a.to_array(),
                        width_px: lines.width_px * dpr,
                        b: b.to_array(),
                        _pad: 0.0,
                        color: lines.color,
                    })
                    .collect(),
            ),
            Drawable::Text(_) | Drawable::ScreenLabels(_) => continue,
        };
        if !batch.is_empty() {
            batches.push(batch);
        }
    }
    batches
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Mat4, Vec2, Vec3};
    use scatter_core::scene::{Fog, LinesObject, PointsObject, SceneObject, TextBillboard, TextObject};

    fn frame() -> FrameParams {
        FrameParams {
            view_proj: Mat4::IDENTITY,
            camera_position: Vec3::new(0.0, 0.0, 2.0),
            width_px: 100,
            height_px: 100,
            device_pixel_ratio: 2.0,
        }
    }

    #[test]
    fn points_are_sized_in_device_pixels_and_fogged() {
        let mut scene = Scene::new([1.0; 4]);
        scene.add(SceneObject::new(Drawable::Points(PointsObject {
            positions: vec![Vec3::ZERO],
            colors: vec![[0.0, 0.0, 0.0, 1.0]],
            sizes: vec![4.0],
            size_attenuation: true,
            shape: PointShape::Circle,
            fog: Some(Fog {
                color: [1.0; 3],
                near: 1.0,
                far: 3.0,
            }),
            transparent: true,
        })));
        let batches = build_batches(&scene, &frame());
        let Batch::Quads { instances, sheet } = &batches[0] else {
            panic!("expected quads");
        };
        assert!(sheet.is_none());
        assert_eq!(instances[0].mode, QUAD_MODE_CIRCLE);
        // 4px at distance 2, doubled for the pixel ratio.
        assert_eq!(instances[0].extent_px, [4.0, 4.0]);
        assert_eq!(instances[0].color, [0.5, 0.5, 0.5, 1.0]);
    }

    #[test]
    fn glyph_text_and_hidden_objects_are_skipped() {
        let mut scene = Scene::new([1.0; 4]);
        let billboard = TextBillboard {
            point_index: 0,
            anchor: Vec3::ZERO,
            text: "a".into(),
            font_size_px: 10.0,
            extent_px: Vec2::new(6.0, 10.0),
            color: [0.0; 4],
        };
        scene.add(SceneObject::new(Drawable::Text(TextObject {
            billboards: vec![billboard.clone()],
            solid: false,
        })));
        let hidden = scene.add(SceneObject::new(Drawable::Lines(LinesObject {
            segments: vec![[Vec3::ZERO, Vec3::X]],
            color: [0.0; 4],
            width_px: 1.0,
        })));
        scene.set_visible(hidden, false);
        assert!(build_batches(&scene, &frame()).is_empty());

        scene.add(SceneObject::new(Drawable::Text(TextObject {
            billboards: vec![billboard],
            solid: true,
        })));
        let batches = build_batches(&scene, &frame());
        let Batch::Quads { instances, .. } = &batches[0] else {
            panic!("expected quads");
        };
        assert_eq!(instances[0].extent_px, [12.0, 20.0]);
    }
}
