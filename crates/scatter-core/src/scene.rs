//! Shared scene graph that visualizers attach their drawables to.
//!
//! The scene is backend-neutral: each drawable is plain CPU-side data that a
//! [`RenderBackend`](crate::backend::RenderBackend) rasterizes. Visualizers own
//! the objects they add and rewrite them between the picking and display
//! passes; the core only hands the whole scene to the backend.

use glam::{Vec2, Vec3};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

pub type ObjectId = u64;

/// Single-threaded shared handle to the scene root.
pub type SceneHandle = Rc<RefCell<Scene>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointShape {
    Circle,
    Square,
}

/// Linear distance fog: colors fade toward `color` between `near` and `far`
/// camera distances.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fog {
    pub color: [f32; 3],
    pub near: f32,
    pub far: f32,
}

impl Fog {
    /// Blend factor toward the fog color at `distance`.
    pub fn factor(&self, distance: f32) -> f32 {
        if !self.far.is_finite() || self.far <= self.near {
            return 0.0;
        }
        ((distance - self.near) / (self.far - self.near)).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone)]
pub struct PointsObject {
    pub positions: Vec<Vec3>,
    pub colors: Vec<[f32; 4]>,
    /// Diameter in pixels; divided by camera distance when attenuated.
    pub sizes: Vec<f32>,
    pub size_attenuation: bool,
    pub shape: PointShape,
    pub fog: Option<Fog>,
    /// Alpha blending on; off for the picking pass.
    pub transparent: bool,
}

/// Grid of equally sized images packed into one RGBA texture.
#[derive(Debug, Clone)]
pub struct SpriteSheet {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub sprite_width: u32,
    pub sprite_height: u32,
}

impl SpriteSheet {
    pub fn sprites_per_row(&self) -> u32 {
        (self.width / self.sprite_width.max(1)).max(1)
    }

    pub fn sprite_count(&self) -> u32 {
        self.sprites_per_row() * (self.height / self.sprite_height.max(1)).max(1)
    }

    /// Normalized `[u0, v0, u1, v1]` texture rectangle of a sprite.
    pub fn uv_rect(&self, sprite: u32) -> [f32; 4] {
        let per_row = self.sprites_per_row();
        let col = sprite % per_row;
        let row = sprite / per_row;
        let u0 = (col * self.sprite_width) as f32 / self.width as f32;
        let v0 = (row * self.sprite_height) as f32 / self.height as f32;
        [
            u0,
            v0,
            u0 + self.sprite_width as f32 / self.width as f32,
            v0 + self.sprite_height as f32 / self.height as f32,
        ]
    }

    /// Alpha of a sprite at normalized in-sprite coordinates.
    pub fn alpha_at(&self, sprite: u32, u: f32, v: f32) -> u8 {
        let [u0, v0, u1, v1] = self.uv_rect(sprite);
        let x = ((u0 + (u1 - u0) * u.clamp(0.0, 1.0)) * self.width as f32) as u32;
        let y = ((v0 + (v1 - v0) * v.clamp(0.0, 1.0)) * self.height as f32) as u32;
        let x = x.min(self.width.saturating_sub(1));
        let y = y.min(self.height.saturating_sub(1));
        let i = ((y * self.width + x) * 4 + 3) as usize;
        self.rgba.get(i).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpriteMode {
    /// Sample the sheet and multiply by the tint color.
    Textured,
    /// Fill opaque sprite texels with the flat color; used for picking.
    Mask,
}

#[derive(Debug, Clone)]
pub struct SpritesObject {
    pub positions: Vec<Vec3>,
    pub colors: Vec<[f32; 4]>,
    pub sizes: Vec<f32>,
    pub sprite_indices: Vec<u32>,
    pub sheet: Rc<SpriteSheet>,
    pub size_attenuation: bool,
    pub mode: SpriteMode,
}

/// Screen-facing text anchored at a world position.
#[derive(Debug, Clone)]
pub struct TextBillboard {
    pub point_index: usize,
    pub anchor: Vec3,
    pub text: String,
    pub font_size_px: f32,
    /// Pixel extent of the rendered text, centered on the anchor.
    pub extent_px: Vec2,
    pub color: [f32; 4],
}

#[derive(Debug, Clone)]
pub struct TextObject {
    pub billboards: Vec<TextBillboard>,
    /// Fill each billboard rectangle with its color instead of drawing glyphs.
    pub solid: bool,
}

#[derive(Debug, Clone)]
pub struct LinesObject {
    pub segments: Vec<[Vec3; 2]>,
    pub color: [f32; 4],
    pub width_px: f32,
}

/// Already-placed overlay text in device pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenLabel {
    pub text: String,
    /// Left edge, vertical middle.
    pub position: Vec2,
    pub font_size_px: f32,
    pub fill: [f32; 4],
    pub stroke: [f32; 4],
    pub stroke_width: f32,
}

#[derive(Debug, Clone)]
pub enum Drawable {
    Points(PointsObject),
    Sprites(SpritesObject),
    Text(TextObject),
    Lines(LinesObject),
    /// Drawn on the 2D overlay; never part of the picking pass.
    ScreenLabels(Vec<ScreenLabel>),
}

#[derive(Debug, Clone)]
pub struct SceneObject {
    pub drawable: Drawable,
    pub visible: bool,
}

impl SceneObject {
    pub fn new(drawable: Drawable) -> Self {
        Self {
            drawable,
            visible: true,
        }
    }
}

#[derive(Debug)]
pub struct Scene {
    objects: BTreeMap<ObjectId, SceneObject>,
    next_id: ObjectId,
    /// Clear color of the display pass.
    pub background: [f32; 4],
}

impl Scene {
    pub fn new(background: [f32; 4]) -> Self {
        Self {
            objects: BTreeMap::new(),
            next_id: 1,
            background,
        }
    }

    pub fn new_handle(background: [f32; 4]) -> SceneHandle {
        Rc::new(RefCell::new(Self::new(background)))
    }

    pub fn add(&mut self, object: SceneObject) -> ObjectId {
        let id = self.next_id;
        self.next_id += 1;
        self.objects.insert(id, object);
        id
    }

    pub fn remove(&mut self, id: ObjectId) -> Option<SceneObject> {
        self.objects.remove(&id)
    }

    pub fn get(&self, id: ObjectId) -> Option<&SceneObject> {
        self.objects.get(&id)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut SceneObject> {
        self.objects.get_mut(&id)
    }

    pub fn set_visible(&mut self, id: ObjectId, visible: bool) {
        if let Some(object) = self.objects.get_mut(&id) {
            object.visible = visible;
        }
    }

    /// Visible objects in insertion order.
    pub fn visible(&self) -> impl Iterator<Item = &SceneObject> {
        self.objects.values().filter(|o| o.visible)
    }

    /// All overlay labels currently visible, for the host's 2D painter.
    pub fn screen_labels(&self) -> impl Iterator<Item = &ScreenLabel> {
        self.visible().flat_map(|o| match &o.drawable {
            Drawable::ScreenLabels(labels) => labels.as_slice(),
            _ => &[][..],
        })
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet() -> SpriteSheet {
        // 4x2 texels, two 2x2 sprites; only the second sprite is opaque.
        let mut rgba = vec![0u8; 4 * 2 * 4];
        for y in 0..2 {
            for x in 2..4 {
                rgba[(y * 4 + x) * 4 + 3] = 255;
            }
        }
        SpriteSheet {
            rgba,
            width: 4,
            height: 2,
            sprite_width: 2,
            sprite_height: 2,
        }
    }

    #[test]
    fn sprite_sheet_geometry() {
        let s = sheet();
        assert_eq!(s.sprites_per_row(), 2);
        assert_eq!(s.sprite_count(), 2);
        assert_eq!(s.uv_rect(1), [0.5, 0.0, 1.0, 1.0]);
        assert_eq!(s.alpha_at(0, 0.5, 0.5), 0);
        assert_eq!(s.alpha_at(1, 0.5, 0.5), 255);
    }

    #[test]
    fn objects_keep_insertion_order_and_visibility() {
        let mut scene = Scene::new([0.0; 4]);
        let labels = |t: &str| {
            Drawable::ScreenLabels(vec![ScreenLabel {
                text: t.into(),
                position: Vec2::ZERO,
                font_size_px: 10.0,
                fill: [1.0; 4],
                stroke: [0.0; 4],
                stroke_width: 1.0,
            }])
        };
        let a = scene.add(SceneObject::new(labels("a")));
        let b = scene.add(SceneObject::new(labels("b")));
        let texts: Vec<_> = scene.screen_labels().map(|l| l.text.clone()).collect();
        assert_eq!(texts, ["a", "b"]);
        scene.set_visible(a, false);
        assert_eq!(scene.screen_labels().count(), 1);
        assert!(scene.remove(b).is_some());
        assert_eq!(scene.len(), 1);
    }

    #[test]
    fn fog_factor_is_clamped() {
        let fog = Fog {
            color: [0.0; 3],
            near: 1.0,
            far: 3.0,
        };
        assert_eq!(fog.factor(0.5), 0.0);
        assert_eq!(fog.factor(2.0), 0.5);
        assert_eq!(fog.factor(9.0), 1.0);
        let off = Fog {
            far: f32::INFINITY,
            ..fog
        };
        assert_eq!(off.factor(9.0), 0.0);
    }
}
