/// Visual defaults shared by the core and its visualizers.
#[derive(Debug, Clone, PartialEq)]
pub struct Style {
    pub background_color: [f32; 3],
    /// Point color when the facade supplies none.
    pub point_color: [f32; 4],
    pub label_font_size: f32,
    pub label_fill_color: [u8; 3],
    pub label_stroke_color: [u8; 3],
    pub label_stroke_width: f32,
    pub text3d_color: [f32; 4],
    pub text3d_font_size: f32,
    pub polyline_color: [f32; 3],
    pub polyline_opacity: f32,
    pub polyline_width: f32,
    pub selection_fill_color: [f32; 4],
    pub selection_stroke_color: [f32; 4],
    pub selection_stroke_width: f32,
    /// Sprite diameter in pixels for 3D scenes.
    pub sprite_image_size: f32,
    pub fog: bool,
    pub axes_colors: [[f32; 4]; 3],
}

impl Default for Style {
    fn default() -> Self {
        Self {
            background_color: [1.0, 1.0, 1.0],
            point_color: [0.466, 0.466, 0.466, 1.0],
            label_font_size: 10.0,
            label_fill_color: [0, 0, 0],
            label_stroke_color: [255, 255, 255],
            label_stroke_width: 3.0,
            text3d_color: [0.2, 0.2, 0.2, 1.0],
            text3d_font_size: 14.0,
            polyline_color: [0.6, 0.6, 0.6],
            polyline_opacity: 0.5,
            polyline_width: 2.0,
            selection_fill_color: [0.8, 0.8, 0.8, 0.3],
            selection_stroke_color: [0.6, 0.6, 0.6, 0.9],
            selection_stroke_width: 1.5,
            sprite_image_size: 30.0,
            fog: true,
            axes_colors: [
                [0.9, 0.2, 0.2, 1.0],
                [0.2, 0.8, 0.2, 1.0],
                [0.2, 0.3, 0.9, 1.0],
            ],
        }
    }
}

impl Style {
    pub fn background_rgba(&self) -> [f32; 4] {
        let [r, g, b] = self.background_color;
        [r, g, b, 1.0]
    }
}
