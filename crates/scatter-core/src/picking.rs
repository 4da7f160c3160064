//! Point identity encoded as 24-bit color for the picking pass.
//!
//! Each identifiable object is drawn with its point index split into three
//! bytes (high, middle, low) so a pixel read back from the picking surface
//! decodes straight to a point index. `0xFFFFFF` is the background and is
//! never produced by a valid index.

use crate::error::{Result, ScatterError};

/// Decoded value of a background pixel.
pub const NO_POINT: u32 = 0x00FF_FFFF;

/// Largest point count whose indices all stay below [`NO_POINT`].
pub const MAX_PICKABLE_POINTS: usize = NO_POINT as usize;

/// Clear color of the picking surface, as normalized RGBA.
pub const BACKGROUND_RGBA: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

/// Splits a point index into its high, middle and low bytes.
#[inline]
pub fn encode_index(index: usize) -> [u8; 3] {
    debug_assert!(index < MAX_PICKABLE_POINTS, "index {index} collides with background");
    let id = index as u32;
    [(id >> 16) as u8, (id >> 8) as u8, id as u8]
}

/// Normalized RGBA color a picking-pass object is drawn with.
#[inline]
pub fn index_to_rgba(index: usize) -> [f32; 4] {
    let [r, g, b] = encode_index(index);
    [r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0, 1.0]
}

/// Decodes one RGBA pixel. Returns `None` for the background value.
#[inline]
pub fn decode_pixel(pixel: &[u8; 4]) -> Option<usize> {
    let id = (u32::from(pixel[0]) << 16) | (u32::from(pixel[1]) << 8) | u32::from(pixel[2]);
    (id != NO_POINT).then_some(id as usize)
}

/// Splits RGBA bytes into whole pixels; a trailing partial pixel is ignored.
fn whole_pixels(rgba: &[u8]) -> impl Iterator<Item = &[u8; 4]> {
    rgba.chunks_exact(4).filter_map(|chunk| chunk.try_into().ok())
}

/// Decodes a block of RGBA bytes into the distinct point indices it covers,
/// in the order they are first met. Ids at or above `point_count` are stale
/// pixels from an earlier, larger dataset and are dropped.
pub fn decode_region(rgba: &[u8], point_count: usize) -> Vec<usize> {
    let mut seen = vec![false; point_count];
    let mut hits = Vec::new();
    for pixel in whole_pixels(rgba) {
        if let Some(index) = decode_pixel(pixel) {
            if index < point_count && !seen[index] {
                seen[index] = true;
                hits.push(index);
            }
        }
    }
    hits
}

/// First point index found in a block of RGBA bytes.
pub fn first_hit(rgba: &[u8], point_count: usize) -> Option<usize> {
    whole_pixels(rgba)
        .filter_map(decode_pixel)
        .find(|&index| index < point_count)
}

/// Rejects point counts the encoding cannot represent.
pub fn check_point_count(point_count: usize) -> Result<()> {
    if point_count > MAX_PICKABLE_POINTS {
        return Err(ScatterError::TooManyPoints(point_count));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgba(index: usize) -> [u8; 4] {
        let [r, g, b] = encode_index(index);
        [r, g, b, 255]
    }

    #[test]
    fn round_trip_over_sampled_range() {
        let n = 1 << 20;
        let mut samples: Vec<usize> = (0..n).step_by(997).collect();
        samples.extend([0, 1, 255, 256, 65_535, 65_536, n - 1]);
        for index in samples {
            assert_eq!(decode_pixel(&rgba(index)), Some(index));
        }
    }

    #[test]
    fn largest_valid_index_is_not_background() {
        let last = MAX_PICKABLE_POINTS - 1;
        assert_ne!(encode_index(last), [0xFF, 0xFF, 0xFF]);
        assert_eq!(decode_pixel(&rgba(last)), Some(last));
    }

    #[test]
    fn background_decodes_to_none() {
        assert_eq!(decode_pixel(&[255, 255, 255, 255]), None);
    }

    #[test]
    fn truncated_buffers_decode_whole_pixels_only() {
        let mut bytes = rgba(7).to_vec();
        bytes.extend_from_slice(&[0, 0]);
        assert_eq!(decode_region(&bytes, 10), vec![7]);
        assert_eq!(first_hit(&[0, 0, 1], 10), None);
    }

    #[test]
    fn normalized_color_matches_bytes() {
        let c = index_to_rgba(0x01_02_03);
        assert_eq!((c[0] * 255.0).round() as u8, 1);
        assert_eq!((c[1] * 255.0).round() as u8, 2);
        assert_eq!((c[2] * 255.0).round() as u8, 3);
        assert_eq!(c[3], 1.0);
    }

    #[test]
    fn region_is_deduplicated_in_first_seen_order() {
        let mut pixels = Vec::new();
        for index in [7, 3, 7, 3, 9] {
            pixels.extend_from_slice(&rgba(index));
        }
        pixels.extend_from_slice(&[255, 255, 255, 255]);
        assert_eq!(decode_region(&pixels, 10), vec![7, 3, 9]);
    }

    #[test]
    fn stale_ids_beyond_point_count_are_ignored() {
        let mut pixels = Vec::new();
        pixels.extend_from_slice(&rgba(12));
        pixels.extend_from_slice(&rgba(2));
        assert_eq!(decode_region(&pixels, 5), vec![2]);
        assert_eq!(first_hit(&pixels, 5), Some(2));
        assert_eq!(first_hit(&pixels[..4], 5), None);
    }

    #[test]
    fn point_count_limit() {
        assert!(check_point_count(MAX_PICKABLE_POINTS).is_ok());
        assert_eq!(
            check_point_count(MAX_PICKABLE_POINTS + 1),
            Err(ScatterError::TooManyPoints(MAX_PICKABLE_POINTS + 1))
        );
    }
}
