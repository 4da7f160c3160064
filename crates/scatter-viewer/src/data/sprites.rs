//! Sprite sheet sources: a PNG on disk or a generated sheet of simple glyphs.

use anyhow::{bail, Context, Result};
use scatter_core::scene::SpriteSheet;
use std::path::Path;

pub fn load_sprite_sheet(path: &Path, sprite_width: u32, sprite_height: u32) -> Result<SpriteSheet> {
    let image = image::open(path)
        .with_context(|| format!("reading sprite sheet {}", path.display()))?
        .to_rgba8();
    let (width, height) = image.dimensions();
    if sprite_width == 0 || sprite_height == 0 || sprite_width > width || sprite_height > height {
        bail!("sprite size {sprite_width}x{sprite_height} does not fit a {width}x{height} sheet");
    }
    Ok(SpriteSheet {
        rgba: image.into_raw(),
        width,
        height,
        sprite_width,
        sprite_height,
    })
}

/// Four white glyphs in a row: disc, ring, diamond, cross.
pub fn procedural_sprite_sheet(sprite_size: u32) -> SpriteSheet {
    const GLYPHS: u32 = 4;
    let size = sprite_size.max(4);
    let width = size * GLYPHS;
    let mut rgba = vec![0u8; (width * size * 4) as usize];
    let half = size as f32 / 2.0;
    for glyph in 0..GLYPHS {
        for y in 0..size {
            for x in 0..size {
                let dx = (x as f32 + 0.5 - half) / half;
                let dy = (y as f32 + 0.5 - half) / half;
                let r = (dx * dx + dy * dy).sqrt();
                let inside = match glyph {
                    0 => r <= 1.0,
                    1 => (0.6..=1.0).contains(&r),
                    2 => dx.abs() + dy.abs() <= 1.0,
                    _ => dx.abs() <= 0.25 || dy.abs() <= 0.25,
                };
                if inside {
                    let i = ((y * width + glyph * size + x) * 4) as usize;
                    rgba[i..i + 4].copy_from_slice(&[0xFF; 4]);
                }
            }
        }
    }
    SpriteSheet {
        rgba,
        width,
        height: size,
        sprite_width: size,
        sprite_height: size,
    }
}

/// Parses `WxH`.
pub fn parse_sprite_dims(s: &str) -> std::result::Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(|c| c == 'x' || c == 'X')
        .ok_or_else(|| format!("expected WxH, got `{s}`"))?;
    let parse = |v: &str| v.trim().parse::<u32>().map_err(|e| format!("`{v}`: {e}"));
    Ok((parse(w)?, parse(h)?))
}
