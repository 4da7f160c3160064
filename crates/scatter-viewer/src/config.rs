use crate::data::sprites::parse_sprite_dims;
use clap::{Parser, ValueEnum};
use scatter_core::visualizers::VisualizerKind;
use std::path::PathBuf;

/// How each point is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RenderMode {
    /// Flat dots with hover and selection labels.
    Points,
    /// Sprite sheet images with hover and selection labels.
    Sprites,
    /// Each point's label text.
    Text,
}

/// `scatter-viewer` - interactive point cloud scatter plot.
///
/// Plots a seeded demo spiral. Hover a point to label it, click to select it,
/// hold Shift and drag to select a region.
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Number of demo points.
    #[arg(long, env = "SCATTER_POINTS", default_value_t = 5_000)]
    pub points: usize,

    /// 2 for an orthographic top-down plot, 3 for an orbiting perspective one.
    #[arg(long, env = "SCATTER_DIMENSIONS", default_value_t = 3, value_parser = clap::value_parser!(u8).range(2..=3))]
    pub dimensions: u8,

    #[arg(long, value_enum, default_value_t = RenderMode::Points)]
    pub render_mode: RenderMode,

    /// PNG sprite sheet for `--render-mode sprites`. A generated sheet is used
    /// when absent.
    #[arg(long, env = "SCATTER_SPRITE_SHEET")]
    pub sprite_sheet: Option<PathBuf>,

    /// Size of one sprite in the sheet, as WxH pixels.
    #[arg(long, default_value = "32x32", value_parser = parse_sprite_dims)]
    pub sprite_dims: (u32, u32),

    /// Connect the points of each spiral arm.
    #[arg(long)]
    pub polylines: bool,

    /// Start with the camera orbiting (3D only).
    #[arg(long)]
    pub orbit: bool,

    /// Seed for the demo dataset.
    #[arg(long, env = "SCATTER_SEED", default_value_t = 7)]
    pub seed: u64,
}

impl Config {
    /// Visualizers for the chosen render mode.
    pub fn visualizers(&self) -> Vec<VisualizerKind> {
        let mut kinds = match self.render_mode {
            RenderMode::Points => vec![VisualizerKind::Points, VisualizerKind::CanvasLabels],
            RenderMode::Sprites => vec![VisualizerKind::Sprites, VisualizerKind::CanvasLabels],
            RenderMode::Text => vec![VisualizerKind::Text3d],
        };
        if self.polylines {
            kinds.push(VisualizerKind::Polylines);
        }
        kinds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags_and_picks_visualizers() {
        let config = Config::try_parse_from([
            "scatter-viewer",
            "--dimensions",
            "2",
            "--render-mode",
            "sprites",
            "--sprite-dims",
            "16x24",
            "--polylines",
        ])
        .unwrap();
        assert_eq!(config.dimensions, 2);
        assert_eq!(config.sprite_dims, (16, 24));
        assert_eq!(
            config.visualizers(),
            vec![VisualizerKind::Sprites, VisualizerKind::CanvasLabels, VisualizerKind::Polylines]
        );
    }

    #[test]
    fn rejects_unsupported_dimensions() {
        assert!(Config::try_parse_from(["scatter-viewer", "--dimensions", "4"]).is_err());
    }
}
