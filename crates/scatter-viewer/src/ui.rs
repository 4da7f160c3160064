// src/ui.rs
//! egui overlay: screen labels, glyph text, the selection outline and the HUD.

use egui::{Align2, Color32, FontId, Pos2, Stroke};
use scatter_core::camera::Camera;
use scatter_core::scene::{Drawable, Scene, ScreenLabel, TextBillboard};
use scatter_core::selection::{SelectionOverlay, SelectionShape};
use scatter_core::style::Style;
use scatter_core::visualizers::{EstimatedTextMeasure, TextMeasure};
use scatter_core::InteractionMode;
use std::cell::Cell;

/// Measures text with egui's font atlas once it exists.
pub struct EguiTextMeasure {
    ctx: egui::Context,
    /// Fonts are only available after the first egui frame.
    ready: Cell<bool>,
    fallback: EstimatedTextMeasure,
}

impl EguiTextMeasure {
    pub fn new(ctx: egui::Context) -> Self {
        Self {
            ctx,
            ready: Cell::new(false),
            fallback: EstimatedTextMeasure::default(),
        }
    }

    pub fn mark_ready(&self) {
        self.ready.set(true);
    }
}

impl TextMeasure for EguiTextMeasure {
    fn text_width(&self, text: &str, font_size_px: f32) -> f32 {
        if !self.ready.get() {
            return self.fallback.text_width(text, font_size_px);
        }
        let galley = self.ctx.fonts(|fonts| {
            fonts.layout_no_wrap(text.to_owned(), FontId::proportional(font_size_px), Color32::WHITE)
        });
        galley.size().x
    }
}

pub fn color32([r, g, b, a]: [f32; 4]) -> Color32 {
    let byte = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
    Color32::from_rgba_unmultiplied(byte(r), byte(g), byte(b), byte(a))
}

/// Text with an outline drawn as offset copies underneath.
fn outlined_text(
    painter: &egui::Painter,
    pos: Pos2,
    anchor: Align2,
    text: &str,
    font: FontId,
    fill: Color32,
    outline: Option<(f32, Color32)>,
) {
    if let Some((radius, color)) = outline.filter(|(radius, _)| *radius > 0.0) {
        for i in 0..8 {
            let angle = i as f32 * std::f32::consts::FRAC_PI_4;
            let offset = egui::vec2(angle.cos(), angle.sin()) * radius;
            painter.text(pos + offset, anchor, text, font.clone(), color);
        }
    }
    painter.text(pos, anchor, text, font, fill);
}

fn paint_screen_label(painter: &egui::Painter, label: &ScreenLabel, pixels_per_point: f32) {
    let pos = Pos2::new(label.position.x / pixels_per_point, label.position.y / pixels_per_point);
    outlined_text(
        painter,
        pos,
        Align2::LEFT_CENTER,
        &label.text,
        FontId::proportional(label.font_size_px / pixels_per_point),
        color32(label.fill),
        Some((label.stroke_width / pixels_per_point / 2.0, color32(label.stroke))),
    );
}

/// Paints everything the GPU passes leave to the overlay: placed labels and
/// billboard glyphs (farthest first), then the live selection outline.
pub fn paint_scene_overlay(
    ctx: &egui::Context,
    scene: &Scene,
    camera: &Camera,
    selection: Option<SelectionOverlay>,
    style: &Style,
) {
    let painter = ctx.layer_painter(egui::LayerId::new(
        egui::Order::Background,
        egui::Id::new("scatter_overlay"),
    ));
    let ppp = ctx.pixels_per_point();
    let screen = ctx.screen_rect();
    let view_proj = camera.view_proj();

    let mut billboards: Vec<&TextBillboard> = Vec::new();
    for object in scene.visible() {
        match &object.drawable {
            Drawable::ScreenLabels(labels) => {
                for label in labels {
                    paint_screen_label(&painter, label, ppp);
                }
            }
            Drawable::Text(text) if !text.solid => billboards.extend(&text.billboards),
            _ => {}
        }
    }
    billboards.sort_by(|a, b| {
        let da = a.anchor.distance_squared(camera.position);
        let db = b.anchor.distance_squared(camera.position);
        db.total_cmp(&da)
    });
    for billboard in billboards {
        let Some(p) = camera.world_to_screen(&view_proj, billboard.anchor, screen.width(), screen.height()) else {
            continue;
        };
        outlined_text(
            &painter,
            Pos2::new(p.x, p.y),
            Align2::CENTER_CENTER,
            &billboard.text,
            FontId::proportional(billboard.font_size_px),
            color32(billboard.color),
            None,
        );
    }

    let stroke = Stroke::new(style.selection_stroke_width, color32(style.selection_stroke_color));
    match selection {
        Some(SelectionOverlay::Rectangle(rect)) => {
            let rect = egui::Rect::from_min_size(Pos2::new(rect.x, rect.y), egui::vec2(rect.width, rect.height));
            painter.rect(rect, 0.0, color32(style.selection_fill_color), stroke);
        }
        Some(SelectionOverlay::Path(path)) if path.len() > 1 => {
            let points = path.iter().map(|p| Pos2::new(p.x, p.y)).collect();
            painter.add(egui::Shape::closed_line(points, stroke));
        }
        _ => {}
    }
}

/// Snapshot of plot state shown in the HUD.
pub struct HudState {
    pub point_count: usize,
    pub dimensions: u8,
    pub mode: InteractionMode,
    pub shape: SelectionShape,
    pub hover: Option<String>,
    pub selected: usize,
    pub orbiting: bool,
}

/// What the user asked for through the HUD this frame.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct HudActions {
    pub dimensions: Option<u8>,
    pub orbit: Option<bool>,
    pub mode: Option<InteractionMode>,
    pub shape: Option<SelectionShape>,
    pub reset_zoom: bool,
    pub clear_selection: bool,
}

pub fn draw_hud(ctx: &egui::Context, state: &HudState) -> HudActions {
    use egui::{Area, Frame, RichText};

    let mut actions = HudActions::default();
    Area::new("hud".into())
        .movable(false)
        .order(egui::Order::Foreground)
        .fixed_pos(egui::pos2(12.0, 12.0))
        .show(ctx, |ui| {
            Frame::popup(ui.style()).show(ui, |ui| {
                ui.label(RichText::new(format!("{} points, {}D", state.point_count, state.dimensions)).monospace());
                let hover = state.hover.as_deref().unwrap_or("-");
                ui.label(RichText::new(format!("hover: {hover}")).monospace());
                ui.label(RichText::new(format!("selected: {}", state.selected)).monospace());
                ui.separator();

                ui.horizontal(|ui| {
                    let other = if state.dimensions == 3 { 2 } else { 3 };
                    if ui.button(format!("Switch to {other}D")).clicked() {
                        actions.dimensions = Some(other);
                    }
                    if ui.button("Reset zoom").clicked() {
                        actions.reset_zoom = true;
                    }
                });

                if state.dimensions == 3 {
                    let mut orbiting = state.orbiting;
                    if ui.checkbox(&mut orbiting, "Orbit").changed() {
                        actions.orbit = Some(orbiting);
                    }
                }

                ui.horizontal(|ui| {
                    let mut mode = state.mode;
                    ui.selectable_value(&mut mode, InteractionMode::Pan, "Pan");
                    ui.selectable_value(&mut mode, InteractionMode::Select, "Select");
                    if mode != state.mode {
                        actions.mode = Some(mode);
                    }
                });
                ui.horizontal(|ui| {
                    let mut shape = state.shape;
                    ui.radio_value(&mut shape, SelectionShape::Rectangle, "Rectangle");
                    ui.radio_value(&mut shape, SelectionShape::Lasso, "Lasso");
                    if shape != state.shape {
                        actions.shape = Some(shape);
                    }
                });
                if state.selected > 0 && ui.button("Clear selection").clicked() {
                    actions.clear_selection = true;
                }
                ui.label(RichText::new("shift: select, ctrl: pan").small().weak());
            });
        });
    actions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colors_convert_to_bytes() {
        assert_eq!(color32([1.0, 0.0, 0.0, 1.0]), Color32::from_rgb(255, 0, 0));
        assert_eq!(color32([2.0, -1.0, 0.5, 1.0]), Color32::from_rgb(255, 0, 128));
    }

    #[test]
    fn measure_falls_back_until_fonts_exist() {
        let measure = EguiTextMeasure::new(egui::Context::default());
        let estimate = EstimatedTextMeasure::default().text_width("abc", 10.0);
        assert_eq!(measure.text_width("abc", 10.0), estimate);
    }

    #[test]
    fn hud_reports_no_actions_without_input() {
        let ctx = egui::Context::default();
        let state = HudState {
            point_count: 3,
            dimensions: 3,
            mode: InteractionMode::Pan,
            shape: SelectionShape::Rectangle,
            hover: None,
            selected: 0,
            orbiting: false,
        };
        let mut actions = None;
        let _ = ctx.run(egui::RawInput::default(), |ctx| {
            actions = Some(draw_hud(ctx, &state));
        });
        assert_eq!(actions, Some(HudActions::default()));
    }
}
