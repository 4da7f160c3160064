//! Seeded demo dataset: a three-armed spiral.

use rand::{rngs::StdRng, Rng, SeedableRng};
use scatter_core::visualizers::Sequence;

const ARMS: usize = 3;
const TURNS: f32 = 2.0;
const JITTER: f32 = 0.04;

pub struct DemoDataset {
    /// `dimensions` floats per point.
    pub flat_positions: Vec<f32>,
    pub dimensions: u8,
    pub colors: Vec<[f32; 4]>,
    pub labels: Vec<String>,
    /// One sequence per spiral arm, ordered outward.
    pub sequences: Vec<Sequence>,
}

impl DemoDataset {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> [f32; 3] {
    let h = h.rem_euclid(1.0) * 6.0;
    let c = v * s;
    let x = c * (1.0 - (h % 2.0 - 1.0).abs());
    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = v - c;
    [r + m, g + m, b + m]
}

pub fn spiral(count: usize, dimensions: u8, seed: u64) -> DemoDataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let components = dimensions as usize;
    let mut flat_positions = Vec::with_capacity(count * components);
    let mut colors = Vec::with_capacity(count);
    let mut sequences = vec![Sequence { indices: Vec::new() }; ARMS];

    for i in 0..count {
        let t = i as f32 / count.max(1) as f32;
        let arm = i % ARMS;
        let angle = t * TURNS * std::f32::consts::TAU + arm as f32 * std::f32::consts::TAU / ARMS as f32;
        let radius = 0.1 + 0.9 * t;
        let mut jitter = || rng.gen_range(-JITTER..JITTER);
        flat_positions.push(radius * angle.cos() + jitter());
        flat_positions.push(radius * angle.sin() + jitter());
        if components == 3 {
            flat_positions.push((t - 0.5) * 1.2 + jitter());
        }
        let [r, g, b] = hsv_to_rgb(arm as f32 / ARMS as f32 + t * 0.3, 0.7, 0.85);
        colors.push([r, g, b, 1.0]);
        sequences[arm].indices.push(i);
    }

    DemoDataset {
        flat_positions,
        dimensions,
        colors,
        labels: (0..count).map(|i| format!("point {i}")).collect(),
        sequences,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scatter_core::positions_from_flat;

    #[test]
    fn same_seed_same_points() {
        let a = spiral(300, 3, 7);
        let b = spiral(300, 3, 7);
        assert_eq!(a.flat_positions, b.flat_positions);
        assert_ne!(a.flat_positions, spiral(300, 3, 8).flat_positions);
    }

    #[test]
    fn flat_buffer_matches_dimensions() {
        let data = spiral(100, 2, 1);
        assert_eq!(data.flat_positions.len(), 200);
        let positions = positions_from_flat(&data.flat_positions, 2).unwrap();
        assert!(positions.iter().all(|p| p.z == 0.0));
        assert_eq!(data.len(), 100);
    }

    #[test]
    fn sequences_cover_every_point_once() {
        let data = spiral(10, 3, 1);
        let mut all: Vec<usize> = data.sequences.iter().flat_map(|s| s.indices.clone()).collect();
        all.sort_unstable();
        assert_eq!(all, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn hue_wheel_primaries() {
        assert_eq!(hsv_to_rgb(0.0, 1.0, 1.0), [1.0, 0.0, 0.0]);
        assert_eq!(hsv_to_rgb(1.0 / 3.0, 1.0, 1.0), [0.0, 1.0, 0.0]);
    }
}
