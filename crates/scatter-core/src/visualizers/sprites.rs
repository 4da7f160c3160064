use super::points::scene_fog;
use super::{ScatterVisualizer, SpriteSheetSlot, VisualizerKind};
use crate::picking::index_to_rgba;
use crate::render_context::RenderContext;
use crate::scene::{Drawable, ObjectId, SceneHandle, SceneObject, SpriteMode, SpritesObject};
use crate::style::Style;
use glam::Vec3;

/// 2D sprites are drawn at a fixed fraction of the 3D image size.
const SPRITE_SIZE_2D_DIVISOR: f32 = 1.5;

/// Renders point `i` as image `i` of a sprite sheet. Draws nothing until the
/// sheet has loaded.
pub struct SpritesVisualizer {
    style: Style,
    sheet: SpriteSheetSlot,
    scene: Option<SceneHandle>,
    object: Option<ObjectId>,
    positions: Vec<Vec3>,
}

impl SpritesVisualizer {
    pub fn new(style: Style, sheet: SpriteSheetSlot) -> Self {
        Self {
            style,
            sheet,
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

    /// Adds the sprite object once both positions and the sheet are present.
    fn ensure_attached(&mut self) -> bool {
        if self.object.is_some() {
            return true;
        }
        let (Some(scene), Some(sheet)) = (&self.scene, self.sheet.get()) else {
            return false;
        };
        if self.positions.is_empty() {
            return false;
        }
        let n = self.positions.len();
        let count = sheet.sprite_count().max(1);
        let object = SpritesObject {
            positions: self.positions.clone(),
            colors: vec![[1.0; 4]; n],
            sizes: vec![self.style.sprite_image_size; n],
            sprite_indices: (0..n).map(|i| i as u32 % count).collect(),
            sheet,
            size_attenuation: true,
            mode: SpriteMode::Textured,
        };
        log::debug!("sprite sheet ready, attaching {n} sprites");
        self.object = Some(scene.borrow_mut().add(SceneObject::new(Drawable::Sprites(object))));
        true
    }

    fn update(&mut self, f: impl FnOnce(&mut SpritesObject)) {
        if !self.ensure_attached() {
            return;
        }
        let (Some(scene), Some(id)) = (&self.scene, self.object) else {
            return;
        };
        if let Some(SceneObject {
            drawable: Drawable::Sprites(sprites),
            ..
        }) = scene.borrow_mut().get_mut(id)
        {
            f(sprites);
        }
    }

    fn sizes(&self, ctx: &RenderContext) -> Vec<f32> {
        let base = if ctx.is_3d() {
            self.style.sprite_image_size
        } else {
            self.style.sprite_image_size / SPRITE_SIZE_2D_DIVISOR
        };
        (0..self.positions.len())
            .map(|i| base * ctx.point_scale(i))
            .collect()
    }
}

impl ScatterVisualizer for SpritesVisualizer {
    fn kind(&self) -> VisualizerKind {
        VisualizerKind::Sprites
    }

    fn set_scene(&mut self, scene: SceneHandle) {
        self.detach();
        self.scene = Some(scene);
    }

    fn on_point_positions_changed(&mut self, positions: &[Vec3]) {
        self.detach();
        self.positions = positions.to_vec();
    }

    fn on_resize(&mut self, _width: u32, _height: u32) {}

    fn on_picking_render(&mut self, ctx: &RenderContext) {
        let sizes = self.sizes(ctx);
        let is_3d = ctx.is_3d();
        self.update(|sprites| {
            sprites.colors = (0..sprites.positions.len()).map(index_to_rgba).collect();
            sprites.sizes = sizes;
            sprites.size_attenuation = is_3d;
            sprites.mode = SpriteMode::Mask;
        });
    }

    fn on_render(&mut self, ctx: &RenderContext) {
        let sizes = self.sizes(ctx);
        let is_3d = ctx.is_3d();
        // Sprites keep their own colors; fog still tints distant ones.
        let fog = if self.style.fog {
            scene_fog(ctx, self.positions.len())
        } else {
            None
        };
        let camera_position = ctx.camera.position;
        self.update(|sprites| {
            sprites.colors = sprites
                .positions
                .iter()
                .map(|p| {
                    let keep = fog.map_or(1.0, |f| 1.0 - f.factor(p.distance(camera_position)));
                    [1.0, 1.0, 1.0, keep]
                })
                .collect();
            sprites.sizes = sizes;
            sprites.size_attenuation = is_3d;
            sprites.mode = SpriteMode::Textured;
        });
    }

    fn dispose(&mut self) {
        self.detach();
        self.scene = None;
        self.positions.clear();
    }
}
