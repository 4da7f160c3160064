//! Pluggable renderers sharing one scene and one per-frame [`RenderContext`].

pub mod canvas_labels;
pub mod points;
pub mod polylines;
pub mod sprites;
pub mod text3d;

use crate::render_context::RenderContext;
use crate::scene::{SceneHandle, SpriteSheet};
use crate::style::Style;
use glam::Vec3;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

pub use self::canvas_labels::CanvasLabelsVisualizer;
pub use self::points::PointsVisualizer;
pub use self::polylines::PolylinesVisualizer;
pub use self::sprites::SpritesVisualizer;
pub use self::text3d::Text3dVisualizer;

/// Stable identity tag; the core keeps at most one visualizer per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VisualizerKind {
    Points,
    Sprites,
    Text3d,
    CanvasLabels,
    Polylines,
}

/// An ordered list of point indices drawn as connected segments.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Sequence {
    pub indices: Vec<usize>,
}

pub trait ScatterVisualizer {
    fn kind(&self) -> VisualizerKind;

    /// Receives the scene root the visualizer attaches its objects to.
    fn set_scene(&mut self, scene: SceneHandle);

    /// Rebuilds geometry for a new position buffer, of any length.
    fn on_point_positions_changed(&mut self, positions: &[Vec3]);

    /// Logical pixel size of the surface.
    fn on_resize(&mut self, width: u32, height: u32);

    /// Configures the scene objects for the ID-encoding pass.
    fn on_picking_render(&mut self, ctx: &RenderContext);

    /// Configures the scene objects for the visible pass.
    fn on_render(&mut self, ctx: &RenderContext);

    /// Detaches from the scene and frees resources. Safe to call twice.
    fn dispose(&mut self);

    /// Per-point label text, delivered before positions.
    fn on_label_strings_changed(&mut self, _labels: &[String]) {}

    /// Polyline sequences, delivered before positions.
    fn on_sequences_changed(&mut self, _sequences: &[Sequence]) {}
}

/// Measures rendered text width in pixels.
pub trait TextMeasure {
    fn text_width(&self, text: &str, font_size_px: f32) -> f32;
}

/// Width estimate from an average glyph advance.
#[derive(Debug, Clone, Copy)]
pub struct EstimatedTextMeasure {
    pub advance_per_em: f32,
}

impl Default for EstimatedTextMeasure {
    fn default() -> Self {
        Self {
            advance_per_em: 0.6,
        }
    }
}

impl TextMeasure for EstimatedTextMeasure {
    fn text_width(&self, text: &str, font_size_px: f32) -> f32 {
        text.chars().count() as f32 * font_size_px * self.advance_per_em
    }
}

#[derive(Default)]
struct SlotState {
    sheet: Option<Rc<SpriteSheet>>,
    on_loaded: Option<Box<dyn FnOnce()>>,
}

/// Sprite sheet that may still be loading. Filling it fires the pending
/// `on_loaded` callback exactly once.
#[derive(Clone, Default)]
pub struct SpriteSheetSlot {
    state: Rc<RefCell<SlotState>>,
}

impl fmt::Debug for SpriteSheetSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpriteSheetSlot")
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

impl SpriteSheetSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn loaded(sheet: SpriteSheet) -> Self {
        let slot = Self::new();
        slot.state.borrow_mut().sheet = Some(Rc::new(sheet));
        slot
    }

    pub fn get(&self) -> Option<Rc<SpriteSheet>> {
        self.state.borrow().sheet.clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.state.borrow().sheet.is_some()
    }

    /// Registers the one-shot callback; runs at once if already loaded.
    pub fn on_loaded(&self, callback: impl FnOnce() + 'static) {
        if self.is_loaded() {
            callback();
        } else {
            self.state.borrow_mut().on_loaded = Some(Box::new(callback));
        }
    }

    pub fn fulfill(&self, sheet: SpriteSheet) {
        let callback = {
            let mut state = self.state.borrow_mut();
            state.sheet = Some(Rc::new(sheet));
            state.on_loaded.take()
        };
        if let Some(callback) = callback {
            callback();
        }
    }
}

/// Builds visualizers on demand when the active set changes.
pub trait VisualizerFactory {
    fn create(&self, kind: VisualizerKind) -> Box<dyn ScatterVisualizer>;
}

/// Factory for the built-in visualizers.
pub struct DefaultVisualizerFactory {
    pub style: Style,
    pub sprite_sheet: SpriteSheetSlot,
    pub text_measure: Rc<dyn TextMeasure>,
}

impl DefaultVisualizerFactory {
    pub fn new(style: Style) -> Self {
        Self {
            style,
            sprite_sheet: SpriteSheetSlot::new(),
            text_measure: Rc::new(EstimatedTextMeasure::default()),
        }
    }
}

impl VisualizerFactory for DefaultVisualizerFactory {
    fn create(&self, kind: VisualizerKind) -> Box<dyn ScatterVisualizer> {
        match kind {
            VisualizerKind::Points => Box::new(PointsVisualizer::new(self.style.clone())),
            VisualizerKind::Sprites => Box::new(SpritesVisualizer::new(
                self.style.clone(),
                self.sprite_sheet.clone(),
            )),
            VisualizerKind::Text3d => Box::new(Text3dVisualizer::new(
                self.style.clone(),
                self.text_measure.clone(),
            )),
            VisualizerKind::CanvasLabels => Box::new(CanvasLabelsVisualizer::new(
                self.style.clone(),
                self.text_measure.clone(),
            )),
            VisualizerKind::Polylines => Box::new(PolylinesVisualizer::new(self.style.clone())),
        }
    }
}

/// Base point diameter in pixels, shrinking logarithmically with the count.
pub(crate) fn auto_point_size(point_count: usize, is_3d: bool) -> f32 {
    const SCALE: f32 = 200.0;
    const LOG_BASE: f32 = 8.0;
    const DIVISOR_2D: f32 = 1.5;
    let n = (point_count.max(2)) as f32;
    let size = SCALE / n.ln() / LOG_BASE.ln();
    if is_3d {
        size
    } else {
        size / DIVISOR_2D
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn sheet() -> SpriteSheet {
        SpriteSheet {
            rgba: vec![255; 16],
            width: 2,
            height: 2,
            sprite_width: 2,
            sprite_height: 2,
        }
    }

    #[test]
    fn sprite_slot_fires_callback_once() {
        let slot = SpriteSheetSlot::new();
        let calls = Rc::new(Cell::new(0));
        let c = calls.clone();
        slot.on_loaded(move || c.set(c.get() + 1));
        assert!(!slot.is_loaded());
        slot.fulfill(sheet());
        slot.fulfill(sheet());
        assert_eq!(calls.get(), 1);
        assert!(slot.get().is_some());
    }

    #[test]
    fn callback_runs_immediately_when_already_loaded() {
        let slot = SpriteSheetSlot::loaded(sheet());
        let calls = Rc::new(Cell::new(0));
        let c = calls.clone();
        slot.on_loaded(move || c.set(c.get() + 1));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn point_size_shrinks_with_count_and_in_2d() {
        assert!(auto_point_size(100, true) > auto_point_size(10_000, true));
        assert!(auto_point_size(100, false) < auto_point_size(100, true));
    }

    #[test]
    fn factory_builds_every_kind() {
        let factory = DefaultVisualizerFactory::new(Style::default());
        for kind in [
            VisualizerKind::Points,
            VisualizerKind::Sprites,
            VisualizerKind::Text3d,
            VisualizerKind::CanvasLabels,
            VisualizerKind::Polylines,
        ] {
            assert_eq!(factory.create(kind).kind(), kind);
        }
    }
}
